//! Conversion orchestrator
//!
//! [`Parser::convert`] ties the pieces together for one lookup: it picks the
//! converter, validates the fallback against it, reads and template-expands
//! the raw value, converts it, and finally decides between the converted
//! value, the fallback, and null.

use crate::converters;
use crate::error::EnvaptError;
use crate::kind::{ConverterKind, PrimitiveKind};
use crate::store::EnvSource;
use crate::template::TemplateResolver;
use crate::validate;
use crate::value::EnvValue;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Signature of a user-supplied converter.
///
/// Receives the template-expanded raw value and the fallback, if any.
pub type ConverterFn = dyn Fn(&str, Option<&EnvValue>) -> anyhow::Result<EnvValue> + Send + Sync;

/// A user-supplied conversion function.
///
/// Errors it returns reach the caller unchanged as [`EnvaptError::Converter`].
#[derive(Clone)]
pub struct CustomConverter(Arc<ConverterFn>);

impl CustomConverter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, Option<&EnvValue>) -> anyhow::Result<EnvValue> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, raw: &str, fallback: Option<&EnvValue>) -> anyhow::Result<EnvValue> {
        (self.0)(raw, fallback)
    }
}

impl fmt::Debug for CustomConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomConverter(..)")
    }
}

/// Splits a value on a delimiter, optionally converting each item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayConverter {
    delimiter: String,
    element: Option<ConverterKind>,
}

impl ArrayConverter {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            element: None,
        }
    }

    /// Converts every item with `kind`.
    pub fn of(mut self, kind: ConverterKind) -> Self {
        self.element = Some(kind);
        self
    }

    /// Like [`ArrayConverter::of`], looking the kind up by name.
    pub fn of_name(self, name: &str) -> Result<Self, EnvaptError> {
        match ConverterKind::from_name(name) {
            Some(kind) if kind.is_array_element_kind() => Ok(self.of(kind)),
            _ => Err(EnvaptError::InvalidArrayConverterType {
                kind: name.to_string(),
            }),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn element(&self) -> Option<ConverterKind> {
        self.element
    }
}

impl Default for ArrayConverter {
    fn default() -> Self {
        Self::new(converters::DEFAULT_DELIMITER)
    }
}

/// How to turn a raw string into a value.
#[derive(Debug, Clone)]
pub enum ConverterSpec {
    /// Coerces the fallback into the primitive type and skips fallback validation.
    Primitive(PrimitiveKind),
    BuiltIn(ConverterKind),
    Array(ArrayConverter),
    Custom(CustomConverter),
}

impl ConverterSpec {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, Option<&EnvValue>) -> anyhow::Result<EnvValue> + Send + Sync + 'static,
    {
        Self::Custom(CustomConverter::new(f))
    }

    pub fn array(delimiter: impl Into<String>) -> Self {
        Self::Array(ArrayConverter::new(delimiter))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Primitive(kind) => kind.name(),
            Self::BuiltIn(kind) => kind.name(),
            Self::Array(_) => "array converter",
            Self::Custom(_) => "custom",
        }
    }
}

impl From<ConverterKind> for ConverterSpec {
    fn from(kind: ConverterKind) -> Self {
        Self::BuiltIn(kind)
    }
}

impl From<PrimitiveKind> for ConverterSpec {
    fn from(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }
}

impl From<ArrayConverter> for ConverterSpec {
    fn from(converter: ArrayConverter) -> Self {
        Self::Array(converter)
    }
}

impl From<CustomConverter> for ConverterSpec {
    fn from(converter: CustomConverter) -> Self {
        Self::Custom(converter)
    }
}

impl FromStr for ConverterSpec {
    type Err = EnvaptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate::assert_builtin_converter(s).map(Self::BuiltIn)
    }
}

/// A single lookup to run through [`Parser::convert`].
///
/// Whether a fallback was supplied is tracked separately from the fallback
/// itself: [`ConversionRequest::with_undefined_fallback`] supplies a fallback
/// that has no value.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    key: String,
    fallback: Option<EnvValue>,
    converter: Option<ConverterSpec>,
    has_fallback: bool,
}

impl ConversionRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fallback: None,
            converter: None,
            has_fallback: false,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<EnvValue>) -> Self {
        self.fallback = Some(fallback.into());
        self.has_fallback = true;
        self
    }

    /// Marks a fallback as supplied without giving it a value.
    pub fn with_undefined_fallback(mut self) -> Self {
        self.fallback = None;
        self.has_fallback = true;
        self
    }

    /// Supplies `fallback`, which may have no value.
    pub fn with_optional_fallback(mut self, fallback: Option<EnvValue>) -> Self {
        self.fallback = fallback;
        self.has_fallback = true;
        self
    }

    pub fn with_converter(mut self, converter: impl Into<ConverterSpec>) -> Self {
        self.converter = Some(converter.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fallback(&self) -> Option<&EnvValue> {
        self.fallback.as_ref()
    }

    pub fn converter(&self) -> Option<&ConverterSpec> {
        self.converter.as_ref()
    }

    pub fn has_fallback(&self) -> bool {
        self.has_fallback
    }
}

/// Result of a conversion.
///
/// `Undefined` is a supplied-but-empty fallback; `Null` means no value could
/// be produced and no fallback was supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Value(EnvValue),
    Undefined,
    Null,
}

impl ConversionOutcome {
    pub fn into_option(self) -> Option<EnvValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Undefined | Self::Null => None,
        }
    }

    pub fn as_value(&self) -> Option<&EnvValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Undefined | Self::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn absent(has_fallback: bool, fallback: Option<EnvValue>) -> Self {
        match (has_fallback, fallback) {
            (false, _) => Self::Null,
            (true, Some(value)) => Self::Value(value),
            (true, None) => Self::Undefined,
        }
    }

    fn converted(has_fallback: bool, result: Option<EnvValue>) -> Self {
        match result {
            Some(value) => Self::Value(value),
            None if has_fallback => Self::Undefined,
            None => Self::Null,
        }
    }
}

/// Runs conversions against an [`EnvSource`].
pub struct Parser<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: EnvSource + ?Sized> Parser<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Expands `${NAME}` placeholders in `value`, the raw value of `key`.
    pub fn resolve_template(&self, key: &str, value: &str) -> String {
        TemplateResolver::new(self.source).resolve(key, value)
    }

    /// Converts the variable named by `request`.
    ///
    /// # Errors
    ///
    /// - The converter or fallback is misconfigured
    /// - A custom converter fails
    pub fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutcome, EnvaptError> {
        let key = request.key();
        let has_fallback = request.has_fallback();
        let fallback = request.fallback.clone();
        let converter = request
            .converter
            .clone()
            .unwrap_or_else(|| infer_converter(fallback.as_ref()));

        tracing::trace!(key, converter = converter.label(), has_fallback, "converting");

        match converter {
            ConverterSpec::Primitive(primitive) => {
                let fallback = fallback
                    .map(|value| validate::coerce(primitive, value))
                    .transpose()?;
                self.convert_builtin(key, fallback, primitive.kind(), has_fallback, true)
            }
            ConverterSpec::BuiltIn(kind) => {
                self.convert_builtin(key, fallback, kind, has_fallback, false)
            }
            ConverterSpec::Array(array) => self.convert_array(key, fallback, &array, has_fallback),
            ConverterSpec::Custom(custom) => {
                let Some(raw) = self.source.get(key, None) else {
                    return Ok(ConversionOutcome::absent(has_fallback, fallback));
                };
                let value = custom.call(&raw, fallback.as_ref())?;
                Ok(ConversionOutcome::Value(value))
            }
        }
    }

    fn convert_builtin(
        &self,
        key: &str,
        fallback: Option<EnvValue>,
        kind: ConverterKind,
        has_fallback: bool,
        from_primitive: bool,
    ) -> Result<ConversionOutcome, EnvaptError> {
        if has_fallback && !from_primitive {
            if let Some(value) = &fallback {
                validate::validate_builtin_fallback(kind, value)?;
                if let EnvValue::Array(items) = value {
                    validate::validate_array_fallback_elements(items)?;
                }
            }
        }

        let Some(raw) = self.source.get(key, None) else {
            return Ok(ConversionOutcome::absent(has_fallback, fallback));
        };

        let result = converters::convert(kind, &raw, fallback);
        Ok(ConversionOutcome::converted(has_fallback, result))
    }

    fn convert_array(
        &self,
        key: &str,
        fallback: Option<EnvValue>,
        converter: &ArrayConverter,
        has_fallback: bool,
    ) -> Result<ConversionOutcome, EnvaptError> {
        validate::assert_array_converter(converter)?;

        match &fallback {
            Some(EnvValue::Array(items)) => {
                validate::validate_array_fallback_elements(items)?;
                if let Some(element) = converter.element() {
                    validate::validate_array_fallback_kind(element, items)?;
                }
            }
            Some(other) => {
                return Err(EnvaptError::InvalidFallback {
                    found: other.type_name(),
                })
            }
            None => {}
        }

        let Some(raw) = self.source.get(key, None) else {
            return Ok(ConversionOutcome::absent(has_fallback, fallback));
        };

        let result = converters::convert_array(
            &raw,
            fallback,
            converter.delimiter(),
            converter.element(),
        );
        Ok(ConversionOutcome::converted(has_fallback, result))
    }
}

fn infer_converter(fallback: Option<&EnvValue>) -> ConverterSpec {
    let kind = match fallback {
        Some(EnvValue::Number(_)) => ConverterKind::Number,
        Some(EnvValue::Boolean(_)) => ConverterKind::Boolean,
        Some(EnvValue::BigInt(_)) => ConverterKind::BigInt,
        Some(EnvValue::Symbol(_)) => ConverterKind::Symbol,
        _ => ConverterKind::String,
    };
    ConverterSpec::BuiltIn(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use num_bigint::BigInt;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_with_and_without_fallback() {
        let env = env(&[]);
        let parser = Parser::new(&env);

        let with = ConversionRequest::new("MISSING")
            .with_fallback(5)
            .with_converter(ConverterKind::Number);
        assert_eq!(
            parser.convert(&with).unwrap(),
            ConversionOutcome::Value(EnvValue::Number(5.0))
        );

        let without = ConversionRequest::new("MISSING").with_converter(ConverterKind::Number);
        assert_eq!(parser.convert(&without).unwrap(), ConversionOutcome::Null);

        let undefined = ConversionRequest::new("MISSING")
            .with_undefined_fallback()
            .with_converter(ConverterKind::Number);
        assert_eq!(parser.convert(&undefined).unwrap(), ConversionOutcome::Undefined);
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let env = env(&[("EMPTY", "")]);
        let request = ConversionRequest::new("EMPTY").with_fallback("dflt");
        assert_eq!(
            Parser::new(&env).convert(&request).unwrap(),
            ConversionOutcome::Value(EnvValue::from("dflt"))
        );
    }

    #[test]
    fn test_converter_inferred_from_fallback() {
        let env = env(&[("PORT", "8080"), ("DEBUG", "yes"), ("BIG", "12")]);
        let parser = Parser::new(&env);

        let port = parser
            .convert(&ConversionRequest::new("PORT").with_fallback(3000))
            .unwrap();
        assert_eq!(port, ConversionOutcome::Value(EnvValue::Number(8080.0)));

        let debug = parser
            .convert(&ConversionRequest::new("DEBUG").with_fallback(false))
            .unwrap();
        assert_eq!(debug, ConversionOutcome::Value(EnvValue::Boolean(true)));

        let big = parser
            .convert(&ConversionRequest::new("BIG").with_fallback(BigInt::from(0)))
            .unwrap();
        assert_eq!(big, ConversionOutcome::Value(EnvValue::BigInt(BigInt::from(12))));

        let plain = parser.convert(&ConversionRequest::new("PORT")).unwrap();
        assert_eq!(plain, ConversionOutcome::Value(EnvValue::from("8080")));
    }

    #[test]
    fn test_present_but_unparseable_without_fallback_is_null() {
        let env = env(&[("PORT", "abc")]);
        let request = ConversionRequest::new("PORT").with_converter(ConverterKind::Number);
        assert_eq!(Parser::new(&env).convert(&request).unwrap(), ConversionOutcome::Null);
    }

    #[test]
    fn test_present_but_unparseable_uses_fallback() {
        let env = env(&[("PORT", "abc")]);
        let request = ConversionRequest::new("PORT")
            .with_fallback(1)
            .with_converter(ConverterKind::Integer);
        assert_eq!(
            Parser::new(&env).convert(&request).unwrap(),
            ConversionOutcome::Value(EnvValue::Number(1.0))
        );
    }

    #[test]
    fn test_fallback_mismatch_fails_even_when_variable_missing() {
        let env = env(&[]);
        let request = ConversionRequest::new("MISSING")
            .with_fallback("not-a-number")
            .with_converter(ConverterKind::Number);
        let err = Parser::new(&env).convert(&request).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FallbackConverterTypeMismatch);
    }

    #[test]
    fn test_primitive_converter_coerces_fallback() {
        let env = env(&[]);
        let request = ConversionRequest::new("MISSING")
            .with_fallback("42")
            .with_converter(PrimitiveKind::Number);
        assert_eq!(
            Parser::new(&env).convert(&request).unwrap(),
            ConversionOutcome::Value(EnvValue::Number(42.0))
        );
    }

    #[test]
    fn test_primitive_coercion_failure() {
        let env = env(&[]);
        let request = ConversionRequest::new("MISSING")
            .with_fallback(2.5)
            .with_converter(PrimitiveKind::BigInt);
        let err = Parser::new(&env).convert(&request).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PrimitiveCoercionFailed);
    }

    #[test]
    fn test_template_expanded_before_conversion() {
        let env = env(&[("BASE", "8000"), ("PORT", "${BASE}")]);
        let request = ConversionRequest::new("PORT").with_converter(ConverterKind::Number);
        assert_eq!(
            Parser::new(&env).convert(&request).unwrap(),
            ConversionOutcome::Value(EnvValue::Number(8000.0))
        );
    }

    #[test]
    fn test_array_converter_requires_array_fallback() {
        let env = env(&[]);
        let request = ConversionRequest::new("LIST")
            .with_fallback("a,b")
            .with_converter(ArrayConverter::default());
        let err = Parser::new(&env).convert(&request).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFallback);
    }

    #[test]
    fn test_array_converter_checks_fallback_elements() {
        let env = env(&[]);
        let parser = Parser::new(&env);

        let mixed = ConversionRequest::new("LIST")
            .with_fallback(EnvValue::Array(vec![EnvValue::from("a"), EnvValue::Number(1.0)]))
            .with_converter(ArrayConverter::default());
        assert_eq!(
            parser.convert(&mixed).unwrap_err().code(),
            ErrorCode::ArrayFallbackElementTypeMismatch
        );

        let wrong_kind = ConversionRequest::new("LIST")
            .with_fallback(vec!["a"])
            .with_converter(ArrayConverter::new(",").of(ConverterKind::Number));
        assert_eq!(
            parser.convert(&wrong_kind).unwrap_err().code(),
            ErrorCode::ArrayFallbackElementTypeMismatch
        );
    }

    #[test]
    fn test_array_converter_blank_and_fallback() {
        let env = env(&[("BLANK", "   "), ("COMMAS", " , , "), ("PORTS", "80; 443")]);
        let parser = Parser::new(&env);
        let fallback = EnvValue::from(vec!["x"]);

        let blank = ConversionRequest::new("BLANK")
            .with_fallback(fallback.clone())
            .with_converter(ArrayConverter::default());
        assert_eq!(
            parser.convert(&blank).unwrap(),
            ConversionOutcome::Value(EnvValue::Array(vec![]))
        );

        let commas = ConversionRequest::new("COMMAS")
            .with_fallback(fallback.clone())
            .with_converter(ArrayConverter::default());
        assert_eq!(parser.convert(&commas).unwrap(), ConversionOutcome::Value(fallback));

        let ports = ConversionRequest::new("PORTS")
            .with_converter(ArrayConverter::new(";").of(ConverterKind::Number));
        assert_eq!(
            parser.convert(&ports).unwrap(),
            ConversionOutcome::Value(EnvValue::from(vec![80, 443]))
        );
    }

    #[test]
    fn test_missing_delimiter_is_rejected() {
        let env = env(&[("LIST", "a")]);
        let request = ConversionRequest::new("LIST").with_converter(ConverterSpec::array(""));
        assert_eq!(
            Parser::new(&env).convert(&request).unwrap_err().code(),
            ErrorCode::MissingDelimiter
        );
    }

    #[test]
    fn test_custom_converter_receives_expanded_value() {
        let env = env(&[("NAME", "world"), ("GREETING", "hello ${NAME}")]);
        let request = ConversionRequest::new("GREETING")
            .with_converter(ConverterSpec::custom(|raw, _| Ok(EnvValue::from(raw.to_uppercase()))));
        assert_eq!(
            Parser::new(&env).convert(&request).unwrap(),
            ConversionOutcome::Value(EnvValue::from("HELLO WORLD"))
        );
    }

    #[test]
    fn test_custom_converter_errors_propagate() {
        let env = env(&[("VALUE", "x")]);
        let request = ConversionRequest::new("VALUE")
            .with_fallback("fb")
            .with_converter(ConverterSpec::custom(|_, _| anyhow::bail!("custom failure")));
        let err = Parser::new(&env).convert(&request).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Converter);
        assert_eq!(err.to_string(), "custom failure");
    }

    #[test]
    fn test_custom_converter_not_called_when_missing() {
        let env = env(&[]);
        let request = ConversionRequest::new("VALUE")
            .with_converter(ConverterSpec::custom(|_, _| anyhow::bail!("should not run")));
        assert_eq!(Parser::new(&env).convert(&request).unwrap(), ConversionOutcome::Null);
    }

    #[test]
    fn test_converter_spec_from_name() {
        assert!(matches!(
            "url".parse::<ConverterSpec>().unwrap(),
            ConverterSpec::BuiltIn(ConverterKind::Url)
        ));
        let err = "nope".parse::<ConverterSpec>().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidBuiltInConverter);
    }

    #[test]
    fn test_array_element_by_name() {
        assert!(ArrayConverter::new(",").of_name("integer").is_ok());
        let err = ArrayConverter::new(",").of_name("json").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArrayConverterType);
    }
}
