//! Secret pointers
//!
//! A value such as `nez:./secrets/token.png` points at a file holding the
//! secret. `nez:id:<id>` asks a resolver for the path instead. The file is
//! read and handed to a [`SecretDecoder`].

use crate::oc8;
use crate::parser::ConverterSpec;
use crate::store::{EnvSource, Envapter, KeyInput};
use crate::error::EnvaptError;
use crate::value::EnvValue;
use anyhow::{anyhow, Context};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default pointer marker.
pub const DEFAULT_MARKER: &str = "nez:";

const ID_PREFIX: &str = "id:";

/// Turns the bytes of a secret file into the secret.
pub trait SecretDecoder: Send + Sync {
    fn decode(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<String>;
}

impl<F> SecretDecoder for F
where
    F: Fn(&Path, &[u8]) -> anyhow::Result<String> + Send + Sync,
{
    fn decode(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<String> {
        self(path, bytes)
    }
}

/// Decodes OC8 images, and reads anything else as trimmed UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecoder;

impl SecretDecoder for DefaultDecoder {
    fn decode(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<String> {
        if oc8::verify(bytes) {
            let payload = oc8::decode(bytes)?;
            return String::from_utf8(payload)
                .with_context(|| format!("OC8 payload in {} is not UTF-8", path.display()));
        }

        let text = std::str::from_utf8(bytes)
            .with_context(|| format!("secret file {} is not UTF-8", path.display()))?;
        Ok(text.trim().to_string())
    }
}

type IdResolver = dyn Fn(&str) -> Option<PathBuf> + Send + Sync;

/// How pointers are recognised and resolved.
#[derive(Clone)]
pub struct SecretOptions {
    marker: String,
    base_dir: Option<PathBuf>,
    decoder: Arc<dyn SecretDecoder>,
    resolve_id: Option<Arc<IdResolver>>,
}

impl Default for SecretOptions {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            base_dir: None,
            decoder: Arc::new(DefaultDecoder),
            resolve_id: None,
        }
    }
}

impl fmt::Debug for SecretOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretOptions")
            .field("marker", &self.marker)
            .field("base_dir", &self.base_dir)
            .field("resolve_id", &self.resolve_id.is_some())
            .finish_non_exhaustive()
    }
}

impl SecretOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Directory relative paths are resolved against. Default: the current directory.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn decoder(mut self, decoder: impl SecretDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Maps `nez:id:<id>` pointers to paths.
    pub fn resolve_id<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf> + Send + Sync + 'static,
    {
        self.resolve_id = Some(Arc::new(resolver));
        self
    }

    pub fn is_pointer(&self, value: &str) -> bool {
        value.starts_with(&self.marker)
    }

    /// Reads the secret behind `pointer`.
    ///
    /// # Errors
    ///
    /// - `pointer` does not start with the marker
    /// - An id has no resolver or the resolver does not know it
    /// - The file cannot be read or decoded
    pub fn read(&self, pointer: &str) -> anyhow::Result<String> {
        let target = pointer
            .strip_prefix(self.marker.as_str())
            .ok_or_else(|| anyhow!("value is not a secret pointer"))?
            .trim();

        let path = match target.strip_prefix(ID_PREFIX) {
            Some(id) => {
                let resolver = self
                    .resolve_id
                    .as_ref()
                    .ok_or_else(|| anyhow!("no resolver configured for secret id '{id}'"))?;
                resolver(id).ok_or_else(|| anyhow!("unknown secret id '{id}'"))?
            }
            None => PathBuf::from(target),
        };

        let path = self.absolute(path)?;
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read secret file {}", path.display()))?;
        self.decoder.decode(&path, &bytes)
    }

    fn absolute(&self, path: PathBuf) -> anyhow::Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path);
        }
        let base = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("failed to determine current directory")?,
        };
        Ok(base.join(path))
    }
}

/// Resolves `raw` if it is a pointer.
///
/// Plain values pass through. A pointer that cannot be resolved yields the
/// fallback, or the pointer itself when there is no fallback.
pub fn resolve_secret(raw: &str, fallback: Option<&str>, options: &SecretOptions) -> String {
    if raw.is_empty() {
        return fallback.unwrap_or_default().to_string();
    }
    if !options.is_pointer(raw) {
        return raw.to_string();
    }

    match options.read(raw) {
        Ok(secret) => secret,
        Err(e) => {
            tracing::warn!(pointer = raw, error = %e, "failed to resolve secret pointer");
            fallback.unwrap_or(raw).to_string()
        }
    }
}

/// A custom converter that resolves secret pointers.
pub fn secret_converter(options: SecretOptions) -> ConverterSpec {
    ConverterSpec::custom(move |raw, fallback| {
        let fallback = fallback.and_then(EnvValue::as_str);
        Ok(EnvValue::String(resolve_secret(raw, fallback, &options)))
    })
}

impl Envapter {
    /// Reads a secret, following pointers.
    ///
    /// With a single key, an unresolvable pointer yields the fallback or the
    /// pointer itself. With several keys, unresolvable pointers are skipped
    /// and the fallback (or an empty string) is returned when nothing resolves.
    pub fn get_secret(
        &self,
        keys: impl Into<KeyInput>,
        fallback: Option<&str>,
        options: &SecretOptions,
    ) -> Result<String, EnvaptError> {
        let keys = keys.into();
        let (key, _) = keys.resolve(self)?;

        let KeyInput::Many(names) = &keys else {
            return Ok(match EnvSource::get(self, &key, None) {
                Some(value) => resolve_secret(&value, fallback, options),
                None => fallback.unwrap_or_default().to_string(),
            });
        };

        for name in names {
            let Some(value) = EnvSource::get(self, name, None) else {
                continue;
            };
            if !options.is_pointer(&value) {
                return Ok(value);
            }
            match options.read(&value) {
                Ok(secret) => return Ok(secret),
                Err(e) => {
                    tracing::warn!(key = %name, error = %e, "skipping unresolvable secret pointer");
                }
            }
        }
        Ok(fallback.unwrap_or_default().to_string())
    }
}
