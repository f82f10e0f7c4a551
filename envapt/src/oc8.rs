//! OC8 steganographic byte codec
//!
//! A payload is framed as `OC8F` + little-endian `u32` length + payload, then
//! packed three bytes per pixel into the RGB channels of a square RGBA PNG.
//! Each pixel's alpha holds the CRC-8 of its RGB triple; decoding keeps only
//! pixels whose checksum matches.
//!
//! Padding pixels are written as `(0, 0, 0, 0xFF)`. CRC-8 of `(0, 0, 0)` is
//! zero, so all-zero padding would pass the checksum filter.

use crate::error::EnvaptError;
use image::codecs::png::PngEncoder;
use image::error::{LimitError, LimitErrorKind};
use image::{ExtendedColorType, ImageEncoder, ImageError, ImageFormat};

/// Frame tag.
pub const MAGIC: &[u8; 4] = b"OC8F";

const HEADER_LEN: usize = 8;
const CRC8_POLY: u8 = 0x07;
const PADDING_PIXEL: [u8; 4] = [0, 0, 0, 0xFF];

/// CRC-8 with polynomial `0x07` and initial value `0`.
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn dimension_error() -> EnvaptError {
    EnvaptError::MalformedImage(ImageError::Limits(LimitError::from_kind(
        LimitErrorKind::DimensionError,
    )))
}

/// Packs `payload` into a PNG image.
///
/// # Errors
///
/// Fails only when the payload is too large for a single image.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, EnvaptError> {
    let length = u32::try_from(payload.len()).map_err(|_| dimension_error())?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(payload);

    let used = frame.len().div_ceil(3);
    let side = canvas_side(used);
    let total = side
        .checked_mul(side)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(dimension_error)?;

    let mut pixels = Vec::with_capacity(total * 4);
    for group in frame.chunks(3) {
        let mut rgb = [0u8; 3];
        rgb[..group.len()].copy_from_slice(group);
        pixels.extend_from_slice(&rgb);
        pixels.push(crc8(&rgb));
    }
    for _ in used..total {
        pixels.extend_from_slice(&PADDING_PIXEL);
    }

    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(&pixels, side, side, ExtendedColorType::Rgba8)?;

    tracing::debug!(payload = payload.len(), side, "encoded OC8 image");
    Ok(out)
}

fn canvas_side(pixels: usize) -> u32 {
    let mut side = (pixels as f64).sqrt().ceil() as u32;
    while (side as usize) * (side as usize) < pixels {
        side += 1;
    }
    side.max(1)
}

// Collects the RGB bytes of every checksum-valid pixel, in raster order.
fn recover(image: &[u8]) -> Result<Vec<u8>, EnvaptError> {
    let rgba = image::load_from_memory_with_format(image, ImageFormat::Png)?.into_rgba8();

    let mut recovered = Vec::new();
    let mut dropped = 0usize;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if crc8(&[r, g, b]) == a {
            recovered.extend_from_slice(&[r, g, b]);
        } else {
            dropped += 1;
        }
    }

    tracing::debug!(
        valid = recovered.len() / 3,
        dropped,
        "filtered OC8 pixels"
    );
    Ok(recovered)
}

/// Recovers the payload from an image produced by [`encode`].
///
/// # Errors
///
/// - [`EnvaptError::MalformedImage`]: not a readable PNG
/// - [`EnvaptError::InvalidMagic`]: the recovered stream does not start with `OC8F`
/// - [`EnvaptError::InsufficientData`]: fewer bytes survived than the frame declares
pub fn decode(image: &[u8]) -> Result<Vec<u8>, EnvaptError> {
    let recovered = recover(image)?;
    if recovered.len() < HEADER_LEN || &recovered[..4] != MAGIC {
        return Err(EnvaptError::InvalidMagic);
    }

    let declared = u32::from_le_bytes([recovered[4], recovered[5], recovered[6], recovered[7]]) as usize;
    let available = recovered.len() - HEADER_LEN;
    if available < declared {
        return Err(EnvaptError::InsufficientData {
            declared,
            available,
        });
    }

    Ok(recovered[HEADER_LEN..HEADER_LEN + declared].to_vec())
}

/// Whether `image` holds a complete OC8 frame. Never fails.
pub fn verify(image: &[u8]) -> bool {
    decode(image).is_ok()
}
