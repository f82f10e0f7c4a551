//! Dynamically typed values produced by converters

use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigInt;
use regex::{Regex, RegexBuilder};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A converted environment value.
///
/// Every built-in converter produces exactly one variant; `integer`, `float`
/// and `time` all produce [`EnvValue::Number`].
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    String(String),
    Number(f64),
    Boolean(bool),
    BigInt(BigInt),
    Symbol(Symbol),
    Json(serde_json::Value),
    Array(Vec<EnvValue>),
    Url(Url),
    Regex(EnvRegex),
    Date(DateTime<Utc>),
}

/// Coarse runtime classification, the granularity at which array fallback
/// elements must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    String,
    Number,
    Boolean,
    BigInt,
    Symbol,
    Object,
}

impl ValueClass {
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::BigInt => "bigint",
            Self::Symbol => "symbol",
            Self::Object => "object",
        }
    }
}

impl EnvValue {
    /// Runtime class of the value. JSON scalars classify as the scalar they hold.
    pub fn class(&self) -> ValueClass {
        match self {
            Self::String(_) => ValueClass::String,
            Self::Number(_) => ValueClass::Number,
            Self::Boolean(_) => ValueClass::Boolean,
            Self::BigInt(_) => ValueClass::BigInt,
            Self::Symbol(_) => ValueClass::Symbol,
            Self::Json(serde_json::Value::String(_)) => ValueClass::String,
            Self::Json(serde_json::Value::Number(_)) => ValueClass::Number,
            Self::Json(serde_json::Value::Bool(_)) => ValueClass::Boolean,
            Self::Json(_) | Self::Array(_) | Self::Url(_) | Self::Regex(_) | Self::Date(_) => {
                ValueClass::Object
            }
        }
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::BigInt(_) => "bigint",
            Self::Symbol(_) => "symbol",
            Self::Json(_) => "json",
            Self::Array(_) => "array",
            Self::Url(_) => "url",
            Self::Regex(_) => "regexp",
            Self::Date(_) => "date",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[EnvValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// JSON form of the value, `None` when the value has no JSON representation.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::BigInt(n) => write!(f, "{n}"),
            Self::Symbol(s) => write!(f, "{s}"),
            Self::Json(v) => write!(f, "{v}"),
            Self::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Url(u) => f.write_str(u.as_str()),
            Self::Regex(r) => write!(f, "{r}"),
            Self::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Formats a number the way it would be written back into an env file.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        n.to_string()
    }
}

impl serde::Serialize for EnvValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::BigInt(_) => Err(S::Error::custom("bigint values have no JSON representation")),
            Self::Symbol(_) => serializer.serialize_unit(),
            Self::Json(v) => v.serialize(serializer),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Url(u) => serializer.serialize_str(u.as_str()),
            Self::Regex(_) => serializer.serialize_map(Some(0))?.end(),
            Self::Date(d) => {
                serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for EnvValue {
                fn from(value: $ty) -> Self {
                    Self::Number(value as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for EnvValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<BigInt> for EnvValue {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<Symbol> for EnvValue {
    fn from(value: Symbol) -> Self {
        Self::Symbol(value)
    }
}

impl From<serde_json::Value> for EnvValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Url> for EnvValue {
    fn from(value: Url) -> Self {
        Self::Url(value)
    }
}

impl From<EnvRegex> for EnvValue {
    fn from(value: EnvRegex) -> Self {
        Self::Regex(value)
    }
}

impl From<DateTime<Utc>> for EnvValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Duration> for EnvValue {
    fn from(value: Duration) -> Self {
        Self::Number(value.as_secs_f64() * 1000.0)
    }
}

impl<T: Into<EnvValue>> From<Vec<T>> for EnvValue {
    fn from(value: Vec<T>) -> Self {
        Self::Array(value.into_iter().map(Into::into).collect())
    }
}

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque token carrying a description.
///
/// [`Symbol::for_key`] returns the registered symbol for a key: two calls with
/// the same key compare equal. [`Symbol::new`] returns a symbol equal only to
/// its own clones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    description: Arc<str>,
    // 0 marks registered symbols
    id: u64,
}

impl Symbol {
    pub fn for_key(key: &str) -> Self {
        Self {
            description: Arc::from(key),
            id: 0,
        }
    }

    pub fn new(description: &str) -> Self {
        Self {
            description: Arc::from(description),
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_registered(&self) -> bool {
        self.id == 0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// Flags accepted in `/pattern/flags` literals.
const REGEX_FLAGS: &str = "dgimsuvy";

/// A compiled regular expression that remembers its source and flags.
///
/// `i`, `m` and `s` change matching; the remaining accepted flags are kept
/// for display only.
#[derive(Debug, Clone)]
pub struct EnvRegex {
    regex: Regex,
    source: String,
    flags: String,
}

impl EnvRegex {
    /// Compiles `source` with `flags`. Returns `None` on an invalid pattern,
    /// an unknown flag, or a repeated flag.
    pub fn new(source: &str, flags: &str) -> Option<Self> {
        let mut seen = String::with_capacity(flags.len());
        for flag in flags.chars() {
            if !REGEX_FLAGS.contains(flag) || seen.contains(flag) {
                return None;
            }
            seen.push(flag);
        }

        let regex = RegexBuilder::new(source)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()
            .ok()?;

        Some(Self {
            regex,
            source: source.to_string(),
            flags: flags.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }

    pub fn into_regex(self) -> Regex {
        self.regex
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

impl PartialEq for EnvRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for EnvRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_symbols_compare_equal() {
        assert_eq!(Symbol::for_key("app"), Symbol::for_key("app"));
        assert_ne!(Symbol::for_key("app"), Symbol::for_key("other"));
        assert!(Symbol::for_key("app").is_registered());
    }

    #[test]
    fn test_unique_symbols_differ() {
        let a = Symbol::new("app");
        let b = Symbol::new("app");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, Symbol::for_key("app"));
        assert_eq!(a.to_string(), "Symbol(app)");
    }

    #[test]
    fn test_class_of_json_scalars() {
        assert_eq!(EnvValue::Json(serde_json::json!("x")).class(), ValueClass::String);
        assert_eq!(EnvValue::Json(serde_json::json!(1)).class(), ValueClass::Number);
        assert_eq!(EnvValue::Json(serde_json::json!(null)).class(), ValueClass::Object);
        assert_eq!(EnvValue::Array(vec![]).class(), ValueClass::Object);
    }

    #[test]
    fn test_display() {
        assert_eq!(EnvValue::Number(42.0).to_string(), "42");
        assert_eq!(EnvValue::Number(3.5).to_string(), "3.5");
        assert_eq!(EnvValue::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(EnvValue::from(vec!["a", "b"]).to_string(), "a,b");

        let date = DateTime::from_timestamp_millis(0).unwrap();
        assert_eq!(EnvValue::Date(date).to_string(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_to_json() {
        assert_eq!(
            EnvValue::from(vec![1, 2]).to_json(),
            Some(serde_json::json!([1.0, 2.0]))
        );
        assert_eq!(EnvValue::BigInt(BigInt::from(5)).to_json(), None);
        assert_eq!(
            EnvValue::Array(vec![EnvValue::BigInt(BigInt::from(5))]).to_json(),
            None
        );
    }

    #[test]
    fn test_regex_flags() {
        let re = EnvRegex::new("^hello$", "i").unwrap();
        assert!(re.is_match("HELLO"));
        assert_eq!(re.to_string(), "/^hello$/i");

        assert!(EnvRegex::new("a", "gg").is_none());
        assert!(EnvRegex::new("a", "x").is_none());
        assert!(EnvRegex::new("(", "").is_none());
    }

    #[test]
    fn test_duration_into_millis() {
        assert_eq!(EnvValue::from(Duration::from_secs(2)), EnvValue::Number(2000.0));
    }
}
