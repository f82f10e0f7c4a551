//! Built-in converter functions
//!
//! Each converter turns a raw string into a typed value and returns the
//! supplied fallback when the string cannot be converted. None of them fail:
//! bad data is recovered through the fallback, which may itself be `None`.

use crate::kind::ConverterKind;
use crate::value::{EnvRegex, EnvValue, Symbol};
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use url::Url;

/// Delimiter used by the plain `array` kind.
pub const DEFAULT_DELIMITER: &str = ",";

const TRUTHY: [&str; 4] = ["1", "yes", "true", "on"];
const FALSY: [&str; 4] = ["0", "no", "false", "off"];

const MS_PER_SECOND: f64 = 1000.0;
const MS_PER_MINUTE: f64 = 60.0 * MS_PER_SECOND;
const MS_PER_HOUR: f64 = 60.0 * MS_PER_MINUTE;

// Largest distance from the epoch a date may have, in milliseconds.
const MAX_EPOCH_MS: i64 = 8_640_000_000_000_000;

static DECIMAL_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("valid regex")
});
static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid regex")
});
static INTEGER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+").expect("valid regex"));
static REGEX_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(.+)/([dgimsuvy]*)$").expect("valid regex"));
static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{3})?Z$").expect("valid regex")
});
static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(ms|s|m|h)?$").expect("valid regex"));

/// Returns `raw`, or the fallback when `raw` is empty.
pub fn string(raw: &str, fallback: Option<String>) -> Option<String> {
    if raw.is_empty() {
        fallback
    } else {
        Some(raw.to_string())
    }
}

/// Parses a whole numeric literal.
///
/// Accepts surrounding whitespace, decimal and exponent forms, and `0x`,
/// `0o`, `0b` prefixed integers. Whitespace-only input is zero. NaN and
/// infinite results yield the fallback.
pub fn number(raw: &str, fallback: Option<f64>) -> Option<f64> {
    let parsed = parse_number_literal(raw);
    if parsed.is_finite() {
        Some(parsed)
    } else {
        fallback
    }
}

pub(crate) fn parse_number_literal(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }

    if let Some(radix) = radix_prefix(s) {
        let digits = &s[2..];
        return parse_radix_digits(digits, radix)
            .and_then(|n| n.to_string().parse::<f64>().ok())
            .unwrap_or(f64::NAN);
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    if !DECIMAL_LITERAL.is_match(s) {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parses the leading base-10 integer of `raw`, ignoring anything after it.
pub fn integer(raw: &str, fallback: Option<f64>) -> Option<f64> {
    INTEGER_PREFIX
        .find(raw.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .or(fallback)
}

/// Parses the leading decimal number of `raw`, ignoring anything after it.
pub fn float(raw: &str, fallback: Option<f64>) -> Option<f64> {
    FLOAT_PREFIX
        .find(raw.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .or(fallback)
}

/// Case-insensitive truthy/falsy match.
///
/// `1`, `yes`, `true`, `on` are true; `0`, `no`, `false`, `off` are false.
/// Anything else yields the fallback.
pub fn boolean(raw: &str, fallback: Option<bool>) -> Option<bool> {
    let lower = raw.trim().to_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Some(true)
    } else if FALSY.contains(&lower.as_str()) {
        Some(false)
    } else {
        fallback
    }
}

/// Exact arbitrary-precision integer parse.
pub fn bigint(raw: &str, fallback: Option<BigInt>) -> Option<BigInt> {
    parse_bigint(raw).or(fallback)
}

pub(crate) fn parse_bigint(raw: &str) -> Option<BigInt> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(BigInt::from(0));
    }

    if let Some(radix) = radix_prefix(s) {
        return parse_radix_digits(&s[2..], radix);
    }

    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigInt::from_str(s).ok()
}

fn radix_prefix(s: &str) -> Option<u32> {
    let prefix = s.get(..2)?;
    match prefix {
        "0x" | "0X" => Some(16),
        "0o" | "0O" => Some(8),
        "0b" | "0B" => Some(2),
        _ => None,
    }
}

fn parse_radix_digits(digits: &str, radix: u32) -> Option<BigInt> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    BigInt::parse_bytes(digits.as_bytes(), radix)
}

/// Registered symbol keyed by `raw`; empty input yields the fallback.
pub fn symbol(raw: &str, fallback: Option<Symbol>) -> Option<Symbol> {
    if raw.is_empty() {
        fallback
    } else {
        Some(Symbol::for_key(raw))
    }
}

/// Parses `raw` as a JSON document.
pub fn json(raw: &str, fallback: Option<serde_json::Value>) -> Option<serde_json::Value> {
    serde_json::from_str(raw).ok().or(fallback)
}

/// Splits on `delimiter`, trimming items and dropping empty ones.
///
/// Blank input is an empty list. Non-blank input that leaves no items
/// yields the fallback.
pub fn array(raw: &str, fallback: Option<Vec<String>>, delimiter: &str) -> Option<Vec<String>> {
    if raw.trim().is_empty() {
        return Some(Vec::new());
    }

    let items = split_items(raw, delimiter);
    if items.is_empty() {
        fallback
    } else {
        Some(items)
    }
}

fn split_items(raw: &str, delimiter: &str) -> Vec<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses an absolute URL.
pub fn url(raw: &str, fallback: Option<Url>) -> Option<Url> {
    Url::parse(raw).ok().or(fallback)
}

/// Compiles a bare pattern or a `/pattern/flags` literal.
pub fn regexp(raw: &str, fallback: Option<EnvRegex>) -> Option<EnvRegex> {
    let compiled = match REGEX_LITERAL.captures(raw) {
        Some(caps) => EnvRegex::new(&caps[1], &caps[2]),
        None => EnvRegex::new(raw, ""),
    };
    compiled.or(fallback)
}

/// Parses epoch milliseconds (all digits) or a strict ISO-8601 UTC timestamp
/// such as `2023-12-25T00:00:00.000Z`.
///
/// Loosely formatted dates are never guessed at; they yield the fallback.
pub fn date(raw: &str, fallback: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    parse_date(raw).or(fallback)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis = raw.parse::<i64>().ok().filter(|ms| *ms <= MAX_EPOCH_MS)?;
        return DateTime::from_timestamp_millis(millis);
    }

    if !ISO_TIMESTAMP.is_match(raw) {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Parses `<number><unit>` into milliseconds. Units are `ms`, `s`, `m`, `h`;
/// a bare number is milliseconds.
pub fn time(raw: &str, fallback: Option<f64>) -> Option<f64> {
    parse_duration_ms(raw).or(fallback)
}

fn parse_duration_ms(raw: &str) -> Option<f64> {
    let caps = DURATION.captures(raw)?;
    let value = caps[1].parse::<f64>().ok()?;
    let factor = match caps.get(2).map(|m| m.as_str()) {
        None | Some("ms") => 1.0,
        Some("s") => MS_PER_SECOND,
        Some("m") => MS_PER_MINUTE,
        _ => MS_PER_HOUR,
    };
    Some(value * factor)
}

/// Runs the converter for `kind` against `raw`.
///
/// A fallback of the wrong variant is returned as-is on failure; callers
/// validate fallbacks before converting.
pub fn convert(kind: ConverterKind, raw: &str, fallback: Option<EnvValue>) -> Option<EnvValue> {
    let converted = match kind {
        ConverterKind::String => string(raw, None).map(EnvValue::String),
        ConverterKind::Number => number(raw, None).map(EnvValue::Number),
        ConverterKind::Integer => integer(raw, None).map(EnvValue::Number),
        ConverterKind::Float => float(raw, None).map(EnvValue::Number),
        ConverterKind::Boolean => boolean(raw, None).map(EnvValue::Boolean),
        ConverterKind::BigInt => bigint(raw, None).map(EnvValue::BigInt),
        ConverterKind::Symbol => symbol(raw, None).map(EnvValue::Symbol),
        ConverterKind::Json => json(raw, None).map(EnvValue::Json),
        ConverterKind::Array => array(raw, None, DEFAULT_DELIMITER).map(EnvValue::from),
        ConverterKind::Url => url(raw, None).map(EnvValue::Url),
        ConverterKind::Regexp => regexp(raw, None).map(EnvValue::Regex),
        ConverterKind::Date => date(raw, None).map(EnvValue::Date),
        ConverterKind::Time => time(raw, None).map(EnvValue::Number),
    };

    if converted.is_none() {
        tracing::trace!(kind = kind.name(), "conversion failed, using fallback");
    }
    converted.or(fallback)
}

/// Splits `raw` on `delimiter` and converts every item with `element`.
///
/// Items that fail to convert keep their trimmed string form. Blank input is
/// an empty list; non-blank input that leaves no items yields the fallback.
pub fn convert_array(
    raw: &str,
    fallback: Option<EnvValue>,
    delimiter: &str,
    element: Option<ConverterKind>,
) -> Option<EnvValue> {
    if raw.trim().is_empty() {
        return Some(EnvValue::Array(Vec::new()));
    }

    let items = split_items(raw, delimiter);
    if items.is_empty() {
        return fallback;
    }

    let Some(kind) = element else {
        return Some(EnvValue::from(items));
    };

    let converted = items
        .into_iter()
        .map(|item| convert(kind, &item, None).unwrap_or(EnvValue::String(item)))
        .collect();
    Some(EnvValue::Array(converted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_empty_uses_fallback() {
        assert_eq!(string("", Some("d".into())), Some("d".to_string()));
        assert_eq!(string("v", Some("d".into())), Some("v".to_string()));
        assert_eq!(string("", None), None);
    }

    #[test]
    fn test_number() {
        assert_eq!(number("42", None), Some(42.0));
        assert_eq!(number(" -3.5e2 ", None), Some(-350.0));
        assert_eq!(number("0x1F", None), Some(31.0));
        assert_eq!(number("0b101", None), Some(5.0));
        assert_eq!(number("12abc", Some(7.0)), Some(7.0));
        assert_eq!(number("Infinity", Some(1.0)), Some(1.0));
        assert_eq!(number("nan", None), None);
        assert_eq!(number("inf", None), None);
    }

    #[test]
    fn test_integer_takes_leading_digits() {
        assert_eq!(integer("42", None), Some(42.0));
        assert_eq!(integer("3.9", None), Some(3.0));
        assert_eq!(integer("  -7px", None), Some(-7.0));
        assert_eq!(integer("px7", Some(0.0)), Some(0.0));
        assert_eq!(integer(&"9".repeat(400), Some(1.0)), Some(1.0));
        assert_eq!(integer(&"9".repeat(400), None), None);
    }

    #[test]
    fn test_float_takes_leading_number() {
        assert_eq!(float("3.14", None), Some(3.14));
        assert_eq!(float("3.14abc", None), Some(3.14));
        assert_eq!(float(".5", None), Some(0.5));
        assert_eq!(float("1e3x", None), Some(1000.0));
        assert_eq!(float("abc", Some(2.0)), Some(2.0));
    }

    #[test]
    fn test_boolean_table() {
        for raw in ["1", "yes", "TRUE", "On"] {
            assert_eq!(boolean(raw, None), Some(true), "{raw}");
        }
        for raw in ["0", "No", "false", "OFF"] {
            assert_eq!(boolean(raw, None), Some(false), "{raw}");
        }
        assert_eq!(boolean("maybe", Some(false)), Some(false));
        assert_eq!(boolean("maybe", None), None);
    }

    #[test]
    fn test_bigint() {
        let big = "123456789012345678901234567890";
        assert_eq!(bigint(big, None), Some(BigInt::from_str(big).unwrap()));
        assert_eq!(bigint("-42", None), Some(BigInt::from(-42)));
        assert_eq!(bigint("0xff", None), Some(BigInt::from(255)));
        assert_eq!(bigint("1.5", Some(BigInt::from(9))), Some(BigInt::from(9)));
        assert_eq!(bigint("-0x10", None), None);
        assert_eq!(bigint("1_000", None), None);
    }

    #[test]
    fn test_symbol() {
        assert_eq!(symbol("app", None), Some(Symbol::for_key("app")));
        assert_eq!(symbol("", None), None);
    }

    #[test]
    fn test_json() {
        assert_eq!(
            json(r#"{"a":[1,2]}"#, None),
            Some(serde_json::json!({"a": [1, 2]}))
        );
        assert_eq!(json("{oops", Some(serde_json::json!({}))), Some(serde_json::json!({})));
    }

    #[test]
    fn test_array_blank_is_empty_not_fallback() {
        let fallback = Some(vec!["fb".to_string()]);
        assert_eq!(array("   ", fallback.clone(), ","), Some(vec![]));
        assert_eq!(array(" , , ", fallback.clone(), ","), fallback);
        assert_eq!(
            array("a, b ,,c", None, ","),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_url() {
        assert_eq!(
            url("https://example.com/x", None).map(|u| u.to_string()),
            Some("https://example.com/x".to_string())
        );
        assert_eq!(url("not a url", None), None);
        assert_eq!(url("/relative/path", None), None);
    }

    #[test]
    fn test_regexp_forms() {
        let literal = regexp("/^abc$/i", None).unwrap();
        assert!(literal.is_match("ABC"));
        assert_eq!(literal.flags(), "i");

        let bare = regexp("^abc$", None).unwrap();
        assert!(bare.is_match("abc"));
        assert!(!bare.is_match("ABC"));

        assert_eq!(regexp("([", None), None);
    }

    #[test]
    fn test_date_strictness() {
        let parsed = date("2023-12-25T00:00:00.000Z", None).unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_703_462_400_000);
        assert_eq!(date("2023-12-25T00:00:00Z", None), Some(parsed));
        assert_eq!(date("0", None).unwrap().timestamp_millis(), 0);
        assert_eq!(date("Dec 25 2023", None), None);
        assert_eq!(date("2023-12-25", None), None);
        assert_eq!(date("2023-13-45T00:00:00Z", None), None);
        assert_eq!(date("99999999999999999999", None), None);
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(time("10s", None), Some(10_000.0));
        assert_eq!(time("5", None), Some(5.0));
        assert_eq!(time("250ms", None), Some(250.0));
        assert_eq!(time("2m", None), Some(120_000.0));
        assert_eq!(time("2h", None), Some(7_200_000.0));
        assert_eq!(time("1.5s", None), Some(1500.0));
        assert_eq!(time("10 s", Some(1.0)), Some(1.0));
        assert_eq!(time("-5s", None), None);
    }

    #[test]
    fn test_convert_array_with_element_kind_degrades_per_item() {
        let converted = convert_array("1, two, 3", None, ",", Some(ConverterKind::Number)).unwrap();
        assert_eq!(
            converted,
            EnvValue::Array(vec![
                EnvValue::Number(1.0),
                EnvValue::from("two"),
                EnvValue::Number(3.0),
            ])
        );
    }

    #[test]
    fn test_convert_array_custom_delimiter() {
        let converted = convert_array("a | b", None, " | ", None).unwrap();
        assert_eq!(converted, EnvValue::from(vec!["a", "b"]));
        assert_eq!(
            convert_array("  ", Some(EnvValue::from(vec!["x"])), ";", None),
            Some(EnvValue::Array(vec![]))
        );
        assert_eq!(convert_array(";;", None, ";", None), None);
    }

    #[test]
    fn test_convert_uses_fallback_on_failure() {
        assert_eq!(
            convert(ConverterKind::Number, "abc", Some(EnvValue::Number(5.0))),
            Some(EnvValue::Number(5.0))
        );
        assert_eq!(convert(ConverterKind::Url, "nope", None), None);
    }
}
