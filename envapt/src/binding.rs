//! Lazily converted, memoized variables

use crate::de::{deserialize_field, FromEnvValue};
use crate::error::EnvaptError;
use crate::parser::{ConversionRequest, ConverterSpec};
use crate::store::Envapter;
use crate::value::EnvValue;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A handle to one converted variable.
///
/// The value is converted on first access and memoized together with the
/// generation of the snapshot it came from. Reading through a reloaded
/// snapshot converts again. Configuration errors surface on access and are
/// never memoized.
///
/// ```rust
/// use envapt::{Binding, Envapter};
///
/// static PORT: Binding<u16> = Binding::new("PORT");
///
/// let env = Envapter::from_vars([("PORT", "8080")]);
/// assert_eq!(PORT.get(&env).unwrap(), 8080);
/// ```
#[derive(Debug)]
pub struct Binding<T> {
    key: &'static str,
    fallback: Option<fn() -> EnvValue>,
    converter: Option<fn() -> ConverterSpec>,
    memo: Mutex<Option<(u64, T)>>,
}

impl<T> Binding<T> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            fallback: None,
            converter: None,
            memo: Mutex::new(None),
        }
    }

    /// Supplies the fallback through a constructor, so bindings stay usable in statics.
    pub const fn with_fallback(mut self, fallback: fn() -> EnvValue) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub const fn with_converter(mut self, converter: fn() -> ConverterSpec) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Drops the memoized value.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<(u64, T)>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self) -> ConversionRequest {
        let mut request = ConversionRequest::new(self.key);
        if let Some(fallback) = self.fallback {
            request = request.with_fallback(fallback());
        }
        if let Some(converter) = self.converter {
            request = request.with_converter(converter());
        }
        request
    }
}

impl<T: FromEnvValue + Clone> Binding<T> {
    /// Current value for `env`.
    ///
    /// The memo is not locked while converting, so a custom converter may
    /// read the same binding.
    pub fn get(&self, env: &Envapter) -> Result<T, EnvaptError> {
        if let Some((generation, value)) = self.lock().as_ref() {
            if *generation == env.generation() {
                return Ok(value.clone());
            }
        }

        let value: T = deserialize_field(env, &self.request())?;
        tracing::trace!(key = self.key, generation = env.generation(), "memoized binding");
        *self.lock() = Some((env.generation(), value.clone()));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::kind::ConverterKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_memoized_per_generation() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let binding: Binding<String> = Binding::new("NAME").with_converter(|| {
            ConverterSpec::custom(|raw, _| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(EnvValue::from(raw))
            })
        });

        let env = Envapter::from_vars([("NAME", "first")]);
        assert_eq!(binding.get(&env).unwrap(), "first");
        assert_eq!(binding.get(&env).unwrap(), "first");
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);

        let other = Envapter::from_vars([("NAME", "second")]);
        assert_eq!(binding.get(&other).unwrap(), "second");
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reload_invalidates() {
        let binding: Binding<f64> = Binding::new("RATE").with_fallback(|| EnvValue::Number(1.0));
        let env = Envapter::from_vars([("RATE", "2.5")]);
        assert_eq!(binding.get(&env).unwrap(), 2.5);

        let reloaded = env.reload().unwrap();
        assert_ne!(reloaded.generation(), env.generation());
        assert_eq!(binding.get(&reloaded).unwrap(), 2.5);
    }

    #[test]
    fn test_errors_surface_on_access() {
        let binding: Binding<f64> = Binding::new("RATE")
            .with_fallback(|| EnvValue::from("fast"))
            .with_converter(|| ConverterKind::Number.into());
        let env = Envapter::from_vars([("RATE", "2.5")]);

        for _ in 0..2 {
            let err = binding.get(&env).unwrap_err();
            assert_eq!(err.code(), ErrorCode::FallbackConverterTypeMismatch);
        }
    }

    #[test]
    fn test_converter_may_read_same_binding() {
        static GREETING: Binding<String> = Binding::new("GREETING").with_converter(|| {
            ConverterSpec::custom(|raw, _| {
                if raw == "outer" {
                    let inner = Envapter::from_vars([("GREETING", "inner")]);
                    let nested = GREETING.get(&inner)?;
                    return Ok(EnvValue::from(format!("{raw}+{nested}")));
                }
                Ok(EnvValue::from(raw))
            })
        });

        let env = Envapter::from_vars([("GREETING", "outer")]);
        assert_eq!(GREETING.get(&env).unwrap(), "outer+inner");
        assert_eq!(GREETING.get(&env).unwrap(), "outer+inner");
    }

    #[test]
    fn test_missing_without_fallback() {
        let binding: Binding<String> = Binding::new("ABSENT");
        let env = Envapter::from_vars([("OTHER", "x")]);
        assert!(matches!(binding.get(&env), Err(EnvaptError::MissingValue { .. })));

        let optional: Binding<Option<String>> = Binding::new("ABSENT");
        assert_eq!(optional.get(&env).unwrap(), None);
    }
}
