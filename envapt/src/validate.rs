//! Runtime validation of converter setup and fallback values

use crate::converters::{parse_bigint, parse_number_literal};
use crate::error::{ArrayFallbackMismatch, EnvaptError};
use crate::kind::{ConverterKind, PrimitiveKind};
use crate::parser::{ArrayConverter, ConverterSpec};
use crate::value::{EnvValue, Symbol};
use num_bigint::BigInt;
use std::str::FromStr;

/// True iff `spec` is the delimiter-based array converter.
pub fn is_array_converter(spec: &ConverterSpec) -> bool {
    matches!(spec, ConverterSpec::Array(_))
}

/// Checks that an array converter has a delimiter and, when it declares an
/// element kind, that the kind is a scalar one.
pub fn assert_array_converter(converter: &ArrayConverter) -> Result<(), EnvaptError> {
    if converter.delimiter().is_empty() {
        return Err(EnvaptError::MissingDelimiter);
    }

    match converter.element() {
        Some(kind) if !kind.is_array_element_kind() => Err(EnvaptError::InvalidArrayConverterType {
            kind: kind.name().to_string(),
        }),
        _ => Ok(()),
    }
}

/// Resolves a converter name against the registry.
pub fn assert_builtin_converter(name: &str) -> Result<ConverterKind, EnvaptError> {
    ConverterKind::from_str(name)
}

/// Rejects a fallback the converter for `kind` could never have produced.
pub fn validate_builtin_fallback(kind: ConverterKind, fallback: &EnvValue) -> Result<(), EnvaptError> {
    if kind.accepts(fallback) {
        Ok(())
    } else {
        Err(EnvaptError::FallbackConverterTypeMismatch {
            converter: kind.name(),
        })
    }
}

/// Every element of an array fallback must share one runtime class.
pub fn validate_array_fallback_elements(fallback: &[EnvValue]) -> Result<(), EnvaptError> {
    let Some(first) = fallback.first() else {
        return Ok(());
    };

    let class = first.class();
    if fallback.iter().skip(1).any(|item| item.class() != class) {
        return Err(EnvaptError::ArrayFallbackElementTypeMismatch {
            reason: ArrayFallbackMismatch::MixedElementTypes,
        });
    }
    Ok(())
}

/// The first fallback element must be a value of the declared element kind.
pub fn validate_array_fallback_kind(
    element: ConverterKind,
    fallback: &[EnvValue],
) -> Result<(), EnvaptError> {
    match fallback.first() {
        Some(first) if !element.accepts(first) => {
            Err(EnvaptError::ArrayFallbackElementTypeMismatch {
                reason: ArrayFallbackMismatch::ElementKind,
            })
        }
        _ => Ok(()),
    }
}

/// Coerces a fallback into the primitive type of `kind`.
///
/// Values that already have the primitive type are returned unchanged.
pub fn coerce(kind: PrimitiveKind, fallback: EnvValue) -> Result<EnvValue, EnvaptError> {
    if kind.kind().accepts(&fallback) {
        return Ok(fallback);
    }

    let coerced = match kind {
        PrimitiveKind::String => EnvValue::String(fallback.to_string()),
        PrimitiveKind::Number => EnvValue::Number(to_number(&fallback).map_err(|message| {
            EnvaptError::PrimitiveCoercionFailed {
                constructor: kind.name(),
                message,
            }
        })?),
        PrimitiveKind::Boolean => EnvValue::Boolean(is_truthy(&fallback)),
        PrimitiveKind::BigInt => EnvValue::BigInt(to_bigint(&fallback).map_err(|message| {
            EnvaptError::PrimitiveCoercionFailed {
                constructor: kind.name(),
                message,
            }
        })?),
        PrimitiveKind::Symbol => EnvValue::Symbol(Symbol::new(&fallback.to_string())),
    };

    tracing::debug!(
        constructor = kind.name(),
        from = fallback.type_name(),
        "coerced fallback"
    );
    Ok(coerced)
}

fn to_number(value: &EnvValue) -> Result<f64, String> {
    let n = match value {
        EnvValue::Number(n) => *n,
        EnvValue::String(s) => parse_number_literal(s),
        EnvValue::Boolean(b) => f64::from(u8::from(*b)),
        EnvValue::BigInt(n) => n.to_string().parse::<f64>().unwrap_or(f64::NAN),
        EnvValue::Symbol(_) => return Err("cannot convert a symbol value to a number".to_string()),
        EnvValue::Date(d) => d.timestamp_millis() as f64,
        EnvValue::Json(serde_json::Value::Null) => 0.0,
        EnvValue::Json(serde_json::Value::Bool(b)) => f64::from(u8::from(*b)),
        EnvValue::Json(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        EnvValue::Json(serde_json::Value::String(s)) => parse_number_literal(s),
        EnvValue::Array(_) => parse_number_literal(&value.to_string()),
        EnvValue::Json(_) | EnvValue::Url(_) | EnvValue::Regex(_) => f64::NAN,
    };
    Ok(n)
}

fn is_truthy(value: &EnvValue) -> bool {
    match value {
        EnvValue::String(s) => !s.is_empty(),
        EnvValue::Number(n) => *n != 0.0 && !n.is_nan(),
        EnvValue::Boolean(b) => *b,
        EnvValue::BigInt(n) => *n != BigInt::from(0),
        EnvValue::Json(serde_json::Value::Null) => false,
        EnvValue::Json(serde_json::Value::Bool(b)) => *b,
        EnvValue::Json(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        EnvValue::Json(serde_json::Value::String(s)) => !s.is_empty(),
        _ => true,
    }
}

fn to_bigint(value: &EnvValue) -> Result<BigInt, String> {
    match value {
        EnvValue::BigInt(n) => Ok(n.clone()),
        EnvValue::Boolean(b) => Ok(BigInt::from(u8::from(*b))),
        EnvValue::Number(n) => number_to_bigint(*n),
        EnvValue::Json(serde_json::Value::Number(n)) => {
            number_to_bigint(n.as_f64().unwrap_or(f64::NAN))
        }
        EnvValue::Symbol(_) => Err("cannot convert a symbol value to a bigint".to_string()),
        other => {
            let text = match other {
                EnvValue::Json(serde_json::Value::String(s)) => s.clone(),
                _ => other.to_string(),
            };
            parse_bigint(&text).ok_or_else(|| format!("cannot convert {text} to a bigint"))
        }
    }
}

fn number_to_bigint(n: f64) -> Result<BigInt, String> {
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(format!(
            "the number {} cannot be converted to a bigint because it is not an integer",
            crate::value::format_number(n)
        ));
    }
    BigInt::from_str(&format!("{n:.0}")).map_err(|e| e.to_string())
}
