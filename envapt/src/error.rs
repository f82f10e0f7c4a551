//! Error types for environment variable conversion and the OC8 codec

use std::fmt;

/// Stable, machine-readable error codes.
///
/// Codes are grouped by hundreds: `1xx` fallback problems, `2xx` converter
/// problems, `3xx` store and binding problems, `4xx` codec and file problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    InvalidFallback = 101,
    ArrayFallbackElementTypeMismatch = 103,
    FallbackConverterTypeMismatch = 104,
    InvalidArrayConverterType = 201,
    InvalidBuiltInConverter = 202,
    InvalidConverterType = 204,
    PrimitiveCoercionFailed = 205,
    MissingDelimiter = 301,
    EnvFilesNotFound = 303,
    InvalidKeyInput = 304,
    MissingValue = 305,
    UnexpectedValueType = 306,
    InvalidMagic = 401,
    InsufficientData = 402,
    MalformedImage = 403,
    EnvFileRead = 404,
    /// Raised by a user-supplied converter; the wrapped error is untouched.
    Converter = 900,
}

impl ErrorCode {
    /// Numeric value of the code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Why an array fallback was rejected.
///
/// Both reasons share [`ErrorCode::ArrayFallbackElementTypeMismatch`]; the
/// reason keeps them apart for callers that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayFallbackMismatch {
    /// Elements of the fallback array do not share one runtime type.
    MixedElementTypes,
    /// The first fallback element is not a value of the declared element kind.
    ElementKind,
}

impl fmt::Display for ArrayFallbackMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MixedElementTypes => {
                write!(f, "all elements in array fallback must have the same type")
            }
            Self::ElementKind => write!(f, "fallback elements do not match the element kind"),
        }
    }
}

/// Errors raised by the conversion engine, the snapshot store and the codec.
///
/// Configuration errors (bad converter setup, mismatched fallbacks) are
/// programmer mistakes and always surface here. Unparseable values never do:
/// converters fall back instead.
#[derive(Debug, thiserror::Error)]
pub enum EnvaptError {
    /// An array converter was given a fallback that is not an array.
    #[error("array converter requires an array fallback, got {found}")]
    InvalidFallback {
        /// Runtime type of the offending fallback
        found: &'static str,
    },

    /// An array fallback failed element validation.
    #[error("invalid array fallback: {reason}")]
    ArrayFallbackElementTypeMismatch {
        /// Which check failed
        reason: ArrayFallbackMismatch,
    },

    /// A fallback is not a value the declared converter could produce.
    #[error("fallback type does not match converter \"{converter}\", expected a {converter} compatible value")]
    FallbackConverterTypeMismatch {
        /// Name of the converter kind
        converter: &'static str,
    },

    /// An array converter declared a container kind (or an unknown kind) for its elements.
    #[error("\"{kind}\" is not a valid array element converter type")]
    InvalidArrayConverterType {
        /// Requested element kind
        kind: String,
    },

    /// A converter name is not one of the built-in kinds.
    #[error("\"{name}\" is not a valid converter type. Valid types are: {valid}")]
    InvalidBuiltInConverter {
        /// Name that failed to resolve
        name: String,
        /// Comma separated list of accepted names
        valid: String,
    },

    /// A converter name was not a usable identifier.
    #[error("converter type must be a non-empty name, got {found:?}")]
    InvalidConverterType {
        /// Raw input
        found: String,
    },

    /// A fallback could not be coerced by a primitive constructor.
    #[error("failed to coerce fallback value using {constructor}: {message}")]
    PrimitiveCoercionFailed {
        /// Primitive constructor name
        constructor: &'static str,
        /// Underlying failure
        message: String,
    },

    /// An array converter has no delimiter.
    #[error("array converter must have a non-empty delimiter")]
    MissingDelimiter,

    /// Explicitly configured env files do not exist.
    #[error("environment file not found at path: {}", .paths.join(", "))]
    EnvFilesNotFound {
        /// Every missing path, in configuration order
        paths: Vec<String>,
    },

    /// A key list was empty or contained a blank key.
    #[error("invalid key input: {message}")]
    InvalidKeyInput {
        /// What was wrong with the keys
        message: &'static str,
    },

    /// A non-optional target received no value.
    #[error("environment variable '{key}' has no value and no fallback")]
    MissingValue {
        /// Key that was looked up
        key: String,
    },

    /// A converted value cannot be represented by the requested Rust type.
    #[error("environment variable '{key}' converted to {found}, which cannot be read as {expected}")]
    UnexpectedValueType {
        /// Key that was looked up
        key: String,
        /// Rust type that was requested
        expected: &'static str,
        /// Runtime type that was produced
        found: &'static str,
    },

    /// Recovered bytes do not start with the `OC8F` tag.
    #[error("invalid OC8 magic")]
    InvalidMagic,

    /// Fewer checksum-valid bytes were recovered than the frame declares.
    #[error("insufficient OC8 data: declared {declared} bytes, recovered {available}")]
    InsufficientData {
        /// Length from the frame header
        declared: usize,
        /// Payload bytes actually recovered
        available: usize,
    },

    /// The buffer is not a readable image.
    #[error("malformed OC8 image: {0}")]
    MalformedImage(#[from] image::ImageError),

    /// An env file exists but could not be read.
    #[error("failed to read env file '{path}': {source}")]
    EnvFileRead {
        /// Path of the env file
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Error raised by a user-supplied converter, passed through unmodified.
    #[error(transparent)]
    Converter(#[from] anyhow::Error),
}

impl EnvaptError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidFallback { .. } => ErrorCode::InvalidFallback,
            Self::ArrayFallbackElementTypeMismatch { .. } => {
                ErrorCode::ArrayFallbackElementTypeMismatch
            }
            Self::FallbackConverterTypeMismatch { .. } => ErrorCode::FallbackConverterTypeMismatch,
            Self::InvalidArrayConverterType { .. } => ErrorCode::InvalidArrayConverterType,
            Self::InvalidBuiltInConverter { .. } => ErrorCode::InvalidBuiltInConverter,
            Self::InvalidConverterType { .. } => ErrorCode::InvalidConverterType,
            Self::PrimitiveCoercionFailed { .. } => ErrorCode::PrimitiveCoercionFailed,
            Self::MissingDelimiter => ErrorCode::MissingDelimiter,
            Self::EnvFilesNotFound { .. } => ErrorCode::EnvFilesNotFound,
            Self::InvalidKeyInput { .. } => ErrorCode::InvalidKeyInput,
            Self::MissingValue { .. } => ErrorCode::MissingValue,
            Self::UnexpectedValueType { .. } => ErrorCode::UnexpectedValueType,
            Self::InvalidMagic => ErrorCode::InvalidMagic,
            Self::InsufficientData { .. } => ErrorCode::InsufficientData,
            Self::MalformedImage(_) => ErrorCode::MalformedImage,
            Self::EnvFileRead { .. } => ErrorCode::EnvFileRead,
            Self::Converter(_) => ErrorCode::Converter,
        }
    }

    /// True for programmer mistakes in converter or fallback setup.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self.code().as_u16(), 100..=299 | 301)
    }

    #[doc(hidden)]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingValue { key: key.into() }
    }

    #[doc(hidden)]
    pub fn unexpected<T>(key: impl Into<String>, found: &'static str) -> Self {
        Self::UnexpectedValueType {
            key: key.into(),
            expected: std::any::type_name::<T>(),
            found,
        }
    }
}
