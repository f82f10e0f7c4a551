//! Typed environment variable access with template resolution
//!
//! `envapt` reads environment variables (process variables plus `.env` files)
//! into a snapshot and converts them through fallback-aware converters.
//!
//! # Features
//!
//! - **Templates**: `${NAME}` placeholders are expanded against the snapshot, with cycle detection
//! - **Converters**: built-in converters for numbers, booleans, JSON, URLs, regular expressions, dates, durations and arrays
//! - **Fallback validation**: a fallback that does not fit its converter is a configuration error
//! - **Bindings**: memoized per-variable handles, and `#[derive(Envapt)]` for whole structs
//! - **Secret pointers**: `nez:path/to/file` values resolve to file contents or OC8 image payloads
//!
//! # Example
//!
//! ```rust
//! use envapt::{ConverterKind, EnvValue, Envapter};
//!
//! let env = Envapter::from_vars([
//!     ("HOST", "localhost"),
//!     ("PORT", "8080"),
//!     ("URL", "http://${HOST}:${PORT}"),
//!     ("TIMEOUT", "5s"),
//! ]);
//!
//! assert_eq!(env.get("URL").unwrap().as_deref(), Some("http://localhost:8080"));
//! assert_eq!(env.get_number_or("PORT", 3000.0).unwrap(), 8080.0);
//!
//! let timeout = env
//!     .get_using("TIMEOUT", ConverterKind::Time, Some(EnvValue::Number(1000.0)))
//!     .unwrap();
//! assert_eq!(timeout, Some(EnvValue::Number(5000.0)));
//! ```
//!
//! # Derive
//!
//! ```rust
//! use envapt::{Envapt, Envapter};
//!
//! #[derive(Debug, Envapt)]
//! #[envapt(prefix = "APP_")]
//! struct Config {
//!     #[envapt(fallback = 8080)]
//!     port: u16,
//!
//!     // APP_ALLOWED_HOSTS
//!     #[envapt(name = "ALLOWED_HOSTS", converter = envapt::ArrayConverter::default())]
//!     hosts: Vec<String>,
//!
//!     debug: Option<bool>,
//! }
//!
//! let env = Envapter::from_vars([("APP_ALLOWED_HOSTS", "a.example, b.example")]);
//! let config = Config::from_source(&env).unwrap();
//! assert_eq!(config.port, 8080);
//! assert_eq!(config.hosts, vec!["a.example", "b.example"]);
//! assert_eq!(config.debug, None);
//! ```

mod binding;
pub mod converters;
#[doc(hidden)]
pub mod de;
pub mod dotenv;
mod environment;
mod error;
mod kind;
pub mod oc8;
mod parser;
mod secret;
mod store;
mod template;
pub mod validate;
mod value;

pub use binding::Binding;
pub use de::FromEnvValue;
pub use environment::{Environment, ENVIRONMENT_KEYS};
pub use error::{ArrayFallbackMismatch, EnvaptError, ErrorCode};
pub use kind::{is_valid_array_element_kind, ConverterKind, PrimitiveKind};
pub use parser::{
    ArrayConverter, ConversionOutcome, ConversionRequest, ConverterFn, ConverterSpec,
    CustomConverter, Parser,
};
pub use secret::{
    resolve_secret, secret_converter, DefaultDecoder, SecretDecoder, SecretOptions, DEFAULT_MARKER,
};
pub use store::{EnvSource, Envapter, EnvapterBuilder, KeyInput, DEFAULT_ENV_FILE};
pub use template::{resolve_template, TemplateResolver};
pub use value::{EnvRegex, EnvValue, Symbol, ValueClass};

pub use envapt_derive::Envapt;

// Re-export for macro-generated code
#[doc(hidden)]
pub use anyhow;
pub use num_bigint::BigInt;
