//! Registry of built-in converter kinds

use crate::error::EnvaptError;
use crate::value::{EnvValue, ValueClass};
use std::fmt;
use std::str::FromStr;

/// A built-in conversion kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    String,
    Number,
    Boolean,
    #[serde(rename = "bigint")]
    BigInt,
    Symbol,
    Integer,
    Float,
    Json,
    Array,
    Url,
    Regexp,
    Date,
    Time,
}

impl ConverterKind {
    /// Every kind, in registry order.
    pub const ALL: [ConverterKind; 13] = [
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::BigInt,
        Self::Symbol,
        Self::Integer,
        Self::Float,
        Self::Json,
        Self::Array,
        Self::Url,
        Self::Regexp,
        Self::Date,
        Self::Time,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::BigInt => "bigint",
            Self::Symbol => "symbol",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Json => "json",
            Self::Array => "array",
            Self::Url => "url",
            Self::Regexp => "regexp",
            Self::Date => "date",
            Self::Time => "time",
        }
    }

    /// Looks a kind up by its registry name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether this kind may convert the elements of an array converter.
    ///
    /// Container kinds (`array`, `json`, `regexp`) are excluded.
    pub fn is_array_element_kind(self) -> bool {
        !matches!(self, Self::Array | Self::Json | Self::Regexp)
    }

    /// Whether `value` is something this kind's converter could have produced.
    ///
    /// Used to reject fallbacks that disagree with the declared converter
    /// before any variable is read.
    pub fn accepts(self, value: &EnvValue) -> bool {
        match self {
            Self::String => matches!(value, EnvValue::String(_)),
            Self::Number | Self::Float | Self::Time => matches!(value, EnvValue::Number(_)),
            Self::Integer => {
                matches!(value, EnvValue::Number(n) if n.is_finite() && n.fract() == 0.0)
            }
            Self::Boolean => matches!(value, EnvValue::Boolean(_)),
            Self::BigInt => matches!(value, EnvValue::BigInt(_)),
            Self::Symbol => matches!(value, EnvValue::Symbol(_)),
            Self::Json => value.to_json().is_some(),
            Self::Array => matches!(value, EnvValue::Array(_)),
            Self::Url => matches!(value, EnvValue::Url(_)),
            Self::Regexp => matches!(value, EnvValue::Regex(_)),
            Self::Date => matches!(value, EnvValue::Date(_)),
        }
    }

    pub(crate) fn valid_names() -> String {
        Self::ALL.map(Self::name).join(",")
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConverterKind {
    type Err = EnvaptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(EnvaptError::InvalidConverterType {
                found: s.to_string(),
            });
        }

        Self::from_name(s).ok_or_else(|| EnvaptError::InvalidBuiltInConverter {
            name: s.to_string(),
            valid: Self::valid_names(),
        })
    }
}

/// True iff `name` names a built-in kind usable for array elements.
pub fn is_valid_array_element_kind(name: &str) -> bool {
    ConverterKind::from_name(name).is_some_and(ConverterKind::is_array_element_kind)
}

/// A boxed-primitive style converter.
///
/// Selecting a primitive converter coerces the fallback into the primitive
/// type instead of rejecting a mismatched fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    BigInt,
    Symbol,
}

impl PrimitiveKind {
    /// Constructor-style name, used in coercion errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::BigInt => "BigInt",
            Self::Symbol => "Symbol",
        }
    }

    /// The built-in kind this primitive converts with.
    pub fn kind(self) -> ConverterKind {
        match self {
            Self::String => ConverterKind::String,
            Self::Number => ConverterKind::Number,
            Self::Boolean => ConverterKind::Boolean,
            Self::BigInt => ConverterKind::BigInt,
            Self::Symbol => ConverterKind::Symbol,
        }
    }

    pub(crate) fn class(self) -> ValueClass {
        match self {
            Self::String => ValueClass::String,
            Self::Number => ValueClass::Number,
            Self::Boolean => ValueClass::Boolean,
            Self::BigInt => ValueClass::BigInt,
            Self::Symbol => ValueClass::Symbol,
        }
    }
}
