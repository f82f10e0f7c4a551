//! OC8 codec tests against real PNG data

use envapt::oc8::{crc8, decode, encode, verify, MAGIC};
use envapt::EnvaptError;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

fn to_png(img: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn from_png(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().into_rgba8()
}

#[test]
fn test_round_trip_sizes() {
    for len in [0usize, 1, 3, 100] {
        let payload: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        let image = encode(&payload).unwrap();
        assert!(verify(&image), "payload of {len} bytes should verify");
        assert_eq!(decode(&image).unwrap(), payload);
    }
}

#[test]
fn test_image_is_square() {
    let img = from_png(&encode(&[0xAB; 100]).unwrap());
    // 108 frame bytes fill 36 pixels
    assert_eq!(img.dimensions(), (6, 6));
}

#[test]
fn test_every_pixel_carries_checksum() {
    let img = from_png(&encode(b"checksum").unwrap());
    let used = (MAGIC.len() + 4 + 8_usize).div_ceil(3);
    for pixel in img.pixels().take(used) {
        let [r, g, b, a] = pixel.0;
        assert_eq!(crc8(&[r, g, b]), a);
    }
}

#[test]
fn test_corrupted_pixel_breaks_frame() {
    let mut img = from_png(&encode(b"tamper-evident secret").unwrap());
    let pixel = img.get_pixel_mut(3, 0);
    pixel.0[3] ^= 0xFF;

    let corrupted = to_png(&img);
    assert!(!verify(&corrupted));
    assert!(matches!(
        decode(&corrupted),
        Err(EnvaptError::InsufficientData { .. }) | Err(EnvaptError::InvalidMagic)
    ));
}

#[test]
fn test_corrupted_magic_is_rejected() {
    let mut img = from_png(&encode(b"payload").unwrap());
    img.get_pixel_mut(0, 0).0[3] ^= 0x01;

    let err = decode(&to_png(&img)).unwrap_err();
    assert!(matches!(err, EnvaptError::InvalidMagic));
}

#[test]
fn test_random_image_does_not_verify() {
    let mut state: u32 = 0x1234_5678;
    let mut next = || {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (state >> 24) as u8
    };

    let mut img = RgbaImage::new(16, 16);
    for pixel in img.pixels_mut() {
        *pixel = Rgba([next(), next(), next(), next()]);
    }
    assert!(!verify(&to_png(&img)));
}

#[test]
fn test_non_png_input() {
    assert!(!verify(&[]));
    assert!(matches!(
        decode(b"GIF89a").unwrap_err(),
        EnvaptError::MalformedImage(_)
    ));
}
