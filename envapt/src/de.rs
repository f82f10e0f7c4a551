//! Mapping converted values onto Rust types
//!
//! Used by `Binding` and by code generated from `#[derive(Envapt)]`.

use crate::error::EnvaptError;
use crate::kind::ConverterKind;
use crate::parser::{ArrayConverter, ConversionOutcome, ConversionRequest, ConverterSpec, Parser};
use crate::store::EnvSource;
use crate::value::{EnvRegex, EnvValue, Symbol};
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use std::time::Duration;
use url::Url;

/// A Rust type a converted value can be read as.
pub trait FromEnvValue: Sized {
    /// Reads a converted value.
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError>;

    /// Reads a conversion outcome. Null and undefined are [`EnvaptError::MissingValue`].
    fn from_outcome(key: &str, outcome: ConversionOutcome) -> Result<Self, EnvaptError> {
        match outcome.into_option() {
            Some(value) => Self::from_env_value(key, value),
            None => Err(EnvaptError::missing(key)),
        }
    }

    /// Converter used when none is configured.
    fn default_converter() -> Option<ConverterSpec> {
        None
    }
}

fn mismatch<T>(key: &str, value: &EnvValue) -> EnvaptError {
    EnvaptError::unexpected::<T>(key, value.type_name())
}

impl FromEnvValue for EnvValue {
    fn from_env_value(_key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        Ok(value)
    }
}

impl FromEnvValue for String {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::String(s) | EnvValue::Json(serde_json::Value::String(s)) => Ok(s),
            other => Err(mismatch::<Self>(key, &other)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::String.into())
    }
}

impl FromEnvValue for bool {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::Boolean(b) | EnvValue::Json(serde_json::Value::Bool(b)) => Ok(b),
            other => Err(mismatch::<Self>(key, &other)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Boolean.into())
    }
}

fn number(key: &str, value: &EnvValue) -> Option<f64> {
    match value {
        EnvValue::Number(n) => Some(*n),
        EnvValue::Json(serde_json::Value::Number(n)) => n.as_f64(),
        _ => {
            tracing::trace!(key, found = value.type_name(), "value is not a number");
            None
        }
    }
}

impl FromEnvValue for f64 {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        number(key, &value).ok_or_else(|| mismatch::<Self>(key, &value))
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Number.into())
    }
}

impl FromEnvValue for f32 {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        number(key, &value)
            .map(|n| n as f32)
            .ok_or_else(|| mismatch::<Self>(key, &value))
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Number.into())
    }
}

macro_rules! impl_from_env_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromEnvValue for $ty {
                fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
                    // `MAX as f64` rounds up for 64-bit types; range-check through i128
                    number(key, &value)
                        .filter(|n| n.is_finite() && n.fract() == 0.0)
                        .and_then(|n| <$ty>::try_from(n as i128).ok())
                        .ok_or_else(|| mismatch::<Self>(key, &value))
                }

                fn default_converter() -> Option<ConverterSpec> {
                    Some(ConverterKind::Integer.into())
                }
            }
        )*
    };
}

impl_from_env_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromEnvValue for BigInt {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::BigInt(n) => Ok(n),
            other => Err(mismatch::<Self>(key, &other)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::BigInt.into())
    }
}

impl FromEnvValue for Symbol {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::Symbol(s) => Ok(s),
            other => Err(mismatch::<Self>(key, &other)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Symbol.into())
    }
}

impl FromEnvValue for serde_json::Value {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::Json(v) => Ok(v),
            other => other.to_json().ok_or_else(|| mismatch::<Self>(key, &other)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Json.into())
    }
}

impl FromEnvValue for Url {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::Url(u) => Ok(u),
            other => Err(mismatch::<Self>(key, &other)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Url.into())
    }
}

impl FromEnvValue for EnvRegex {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::Regex(r) => Ok(r),
            other => Err(mismatch::<Self>(key, &other)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Regexp.into())
    }
}

impl FromEnvValue for regex::Regex {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        EnvRegex::from_env_value(key, value).map(EnvRegex::into_regex)
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Regexp.into())
    }
}

impl FromEnvValue for DateTime<Utc> {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::Date(d) => Ok(d),
            other => Err(mismatch::<Self>(key, &other)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Date.into())
    }
}

/// Read from milliseconds.
impl FromEnvValue for Duration {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match number(key, &value) {
            Some(ms) if ms >= 0.0 => Duration::try_from_secs_f64(ms / 1000.0)
                .map_err(|_| mismatch::<Self>(key, &value)),
            _ => Err(mismatch::<Self>(key, &value)),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        Some(ConverterKind::Time.into())
    }
}

impl<T: FromEnvValue> FromEnvValue for Vec<T> {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        match value {
            EnvValue::Array(items) => items
                .into_iter()
                .map(|item| T::from_env_value(key, item))
                .collect(),
            EnvValue::Json(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|item| T::from_env_value(key, EnvValue::Json(item)))
                .collect(),
            other => Err(mismatch::<Self>(key, &other)),
        }
    }

    /// Comma separated, items converted with `T`'s converter when it is a scalar kind.
    fn default_converter() -> Option<ConverterSpec> {
        let converter = match T::default_converter() {
            Some(ConverterSpec::BuiltIn(kind)) if kind.is_array_element_kind() => {
                ArrayConverter::default().of(kind)
            }
            _ => ArrayConverter::default(),
        };
        Some(converter.into())
    }
}

impl<T: FromEnvValue> FromEnvValue for Option<T> {
    fn from_env_value(key: &str, value: EnvValue) -> Result<Self, EnvaptError> {
        T::from_env_value(key, value).map(Some)
    }

    fn from_outcome(key: &str, outcome: ConversionOutcome) -> Result<Self, EnvaptError> {
        match outcome.into_option() {
            Some(value) => T::from_env_value(key, value).map(Some),
            None => Ok(None),
        }
    }

    fn default_converter() -> Option<ConverterSpec> {
        T::default_converter()
    }
}

/// Runs `request` against `source` and reads the outcome as `T`.
///
/// `T`'s default converter applies when the request has none.
#[doc(hidden)]
pub fn deserialize_field<T, S>(source: &S, request: &ConversionRequest) -> Result<T, EnvaptError>
where
    T: FromEnvValue,
    S: EnvSource + ?Sized,
{
    let outcome = match (request.converter(), T::default_converter()) {
        (None, Some(converter)) => {
            let request = request.clone().with_converter(converter);
            Parser::new(source).convert(&request)?
        }
        _ => Parser::new(source).convert(request)?,
    };
    T::from_outcome(request.key(), outcome)
}
