//! Configuration snapshots and typed getters

use crate::converters;
use crate::dotenv;
use crate::environment::Environment;
use crate::error::EnvaptError;
use crate::parser::{ConversionOutcome, ConversionRequest, ConverterSpec, Parser};
use crate::template::resolve_template;
use crate::value::{EnvValue, Symbol};
use num_bigint::BigInt;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default env file, read only when present.
pub const DEFAULT_ENV_FILE: &str = ".env";

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Read access to a set of raw variables.
pub trait EnvSource {
    /// Raw value of `key`, without template expansion.
    fn get_raw(&self, key: &str) -> Option<&str>;

    /// Template-expanded value of `key`.
    ///
    /// An empty raw value counts as absent, in which case `fallback` is
    /// returned as-is.
    fn get(&self, key: &str, fallback: Option<&str>) -> Option<String> {
        match self.get_raw(key).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(resolve_template(self, key, raw)),
            None => fallback.map(str::to_string),
        }
    }
}

impl EnvSource for HashMap<String, String> {
    fn get_raw(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn get_raw(&self, key: &str) -> Option<&str> {
        BTreeMap::get(self, key).map(String::as_str)
    }
}

/// One variable name, or several tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    Single(String),
    Many(Vec<String>),
}

impl KeyInput {
    fn names(&self) -> &[String] {
        match self {
            Self::Single(key) => std::slice::from_ref(key),
            Self::Many(keys) => keys,
        }
    }

    /// Picks the first name that has a value.
    ///
    /// Falls back to the first name when none is set. Returns the chosen name
    /// and its raw value.
    pub fn resolve<'s, S: EnvSource + ?Sized>(
        &self,
        source: &'s S,
    ) -> Result<(String, Option<&'s str>), EnvaptError> {
        let names = self.names();
        let Some(first) = names.first() else {
            return Err(EnvaptError::InvalidKeyInput {
                message: "at least one environment key must be provided",
            });
        };
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(EnvaptError::InvalidKeyInput {
                message: "environment keys cannot be empty strings",
            });
        }

        for name in names {
            if let Some(value) = source.get_raw(name) {
                return Ok((name.clone(), Some(value)));
            }
        }
        Ok((first.clone(), None))
    }
}

impl From<&str> for KeyInput {
    fn from(key: &str) -> Self {
        Self::Single(key.to_string())
    }
}

impl From<String> for KeyInput {
    fn from(key: String) -> Self {
        Self::Single(key)
    }
}

impl From<&String> for KeyInput {
    fn from(key: &String) -> Self {
        Self::Single(key.clone())
    }
}

impl From<&[&str]> for KeyInput {
    fn from(keys: &[&str]) -> Self {
        Self::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeyInput {
    fn from(keys: [&str; N]) -> Self {
        Self::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl From<Vec<&str>> for KeyInput {
    fn from(keys: Vec<&str>) -> Self {
        Self::Many(keys.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for KeyInput {
    fn from(keys: Vec<String>) -> Self {
        Self::Many(keys)
    }
}

#[derive(Debug, Clone)]
struct LoadOptions {
    env_paths: Option<Vec<PathBuf>>,
    include_process_env: bool,
    override_existing: bool,
    environment: Option<Environment>,
    vars: Vec<(String, String)>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            env_paths: None,
            include_process_env: true,
            override_existing: false,
            environment: None,
            vars: Vec::new(),
        }
    }
}

/// Configures how an [`Envapter`] snapshot is loaded.
#[derive(Debug, Clone, Default)]
pub struct EnvapterBuilder {
    options: LoadOptions,
}

impl EnvapterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an env file. Files added here must exist.
    pub fn env_path(mut self, path: impl AsRef<Path>) -> Self {
        self.options
            .env_paths
            .get_or_insert_with(Vec::new)
            .push(path.as_ref().to_path_buf());
        self
    }

    /// Replaces the env file list. Every file must exist; an empty list reads no files.
    pub fn env_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.options.env_paths = Some(
            paths
                .into_iter()
                .map(|p| p.as_ref().to_path_buf())
                .collect(),
        );
        self
    }

    /// Whether process environment variables are part of the snapshot. Default: `true`.
    pub fn include_process_env(mut self, include: bool) -> Self {
        self.options.include_process_env = include;
        self
    }

    /// Whether env file values replace process values and earlier files.
    /// Default: `false`, the first definition wins.
    pub fn override_existing(mut self, override_existing: bool) -> Self {
        self.options.override_existing = override_existing;
        self
    }

    /// Fixes the environment instead of detecting it.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.options.environment = Some(environment);
        self
    }

    /// Like [`EnvapterBuilder::environment`], classifying `name`.
    pub fn environment_name(self, name: &str) -> Self {
        self.environment(Environment::from_name(name))
    }

    /// Sets a variable directly. Direct variables take precedence over every other source.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.vars.push((key.into(), value.into()));
        self
    }

    /// Sets several variables directly.
    pub fn vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options
            .vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Loads the snapshot.
    ///
    /// # Errors
    ///
    /// - An explicitly configured env file does not exist
    /// - An env file cannot be read
    pub fn build(self) -> Result<Envapter, EnvaptError> {
        Envapter::load_with(self.options)
    }
}

/// An immutable snapshot of configuration variables.
///
/// Process variables and env files are read once, at load time. Call
/// [`Envapter::reload`] to pick up changes; every load gets a new
/// generation number, which [`crate::Binding`] uses to drop stale values.
#[derive(Debug, Clone)]
pub struct Envapter {
    vars: HashMap<String, String>,
    env_paths: Vec<PathBuf>,
    environment: Environment,
    generation: u64,
    options: LoadOptions,
}

impl Envapter {
    /// Loads process variables and `.env` (when present).
    pub fn load() -> Result<Self, EnvaptError> {
        Self::builder().build()
    }

    pub fn builder() -> EnvapterBuilder {
        EnvapterBuilder::new()
    }

    /// A snapshot holding exactly `vars`, without process variables or env files.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let options = LoadOptions {
            env_paths: Some(Vec::new()),
            include_process_env: false,
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..LoadOptions::default()
        };
        let vars = options.vars.iter().cloned().collect();
        Self::from_parts(vars, Vec::new(), options)
    }

    /// Loads a fresh snapshot with the options this one was loaded with.
    pub fn reload(&self) -> Result<Self, EnvaptError> {
        Self::load_with(self.options.clone())
    }

    fn load_with(options: LoadOptions) -> Result<Self, EnvaptError> {
        let (paths, explicit) = match &options.env_paths {
            Some(paths) => (paths.clone(), true),
            None => (vec![PathBuf::from(DEFAULT_ENV_FILE)], false),
        };

        if explicit {
            let missing: Vec<String> = paths
                .iter()
                .filter(|path| !path.exists())
                .map(|path| path.display().to_string())
                .collect();
            if !missing.is_empty() {
                return Err(EnvaptError::EnvFilesNotFound { paths: missing });
            }
        }

        let mut vars = HashMap::new();
        if options.include_process_env {
            vars.extend(env::vars_os().filter_map(|(key, value)| {
                Some((key.into_string().ok()?, value.into_string().ok()?))
            }));
        }

        let mut loaded = Vec::new();
        for path in paths {
            if !path.exists() {
                tracing::debug!(path = %path.display(), "env file not found, skipping");
                continue;
            }
            for (key, value) in dotenv::read_file(&path)? {
                if options.override_existing {
                    vars.insert(key, value);
                } else {
                    vars.entry(key).or_insert(value);
                }
            }
            loaded.push(path);
        }

        vars.extend(options.vars.iter().cloned());
        Ok(Self::from_parts(vars, loaded, options))
    }

    fn from_parts(vars: HashMap<String, String>, env_paths: Vec<PathBuf>, options: LoadOptions) -> Self {
        let environment = options
            .environment
            .unwrap_or_else(|| Environment::detect(|key| vars.get(key).map(String::as_str)));
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            vars = vars.len(),
            files = env_paths.len(),
            %environment,
            generation,
            "loaded environment snapshot"
        );

        Self {
            vars,
            env_paths,
            environment,
            generation,
            options,
        }
    }

    /// Monotonic load counter; differs between any two loads.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Env files that were actually read, in order.
    pub fn env_paths(&self) -> &[PathBuf] {
        &self.env_paths
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_staging(&self) -> bool {
        self.environment == Environment::Staging
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Conversion engine bound to this snapshot.
    pub fn parser(&self) -> Parser<'_, Self> {
        Parser::new(self)
    }

    fn primitive<T>(
        &self,
        keys: KeyInput,
        convert: impl FnOnce(&str) -> Option<T>,
    ) -> Result<Option<T>, EnvaptError> {
        let (key, raw) = keys.resolve(self)?;
        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            return Ok(None);
        };
        let expanded = resolve_template(self, &key, raw);
        Ok(convert(&expanded))
    }

    /// Template-expanded string value.
    pub fn get(&self, keys: impl Into<KeyInput>) -> Result<Option<String>, EnvaptError> {
        self.primitive(keys.into(), |raw| converters::string(raw, None))
    }

    pub fn get_or(&self, keys: impl Into<KeyInput>, fallback: &str) -> Result<String, EnvaptError> {
        Ok(self.get(keys)?.unwrap_or_else(|| fallback.to_string()))
    }

    pub fn get_number(&self, keys: impl Into<KeyInput>) -> Result<Option<f64>, EnvaptError> {
        self.primitive(keys.into(), |raw| converters::number(raw, None))
    }

    pub fn get_number_or(&self, keys: impl Into<KeyInput>, fallback: f64) -> Result<f64, EnvaptError> {
        Ok(self.get_number(keys)?.unwrap_or(fallback))
    }

    pub fn get_boolean(&self, keys: impl Into<KeyInput>) -> Result<Option<bool>, EnvaptError> {
        self.primitive(keys.into(), |raw| converters::boolean(raw, None))
    }

    pub fn get_boolean_or(&self, keys: impl Into<KeyInput>, fallback: bool) -> Result<bool, EnvaptError> {
        Ok(self.get_boolean(keys)?.unwrap_or(fallback))
    }

    pub fn get_bigint(&self, keys: impl Into<KeyInput>) -> Result<Option<BigInt>, EnvaptError> {
        self.primitive(keys.into(), |raw| converters::bigint(raw, None))
    }

    pub fn get_bigint_or(
        &self,
        keys: impl Into<KeyInput>,
        fallback: BigInt,
    ) -> Result<BigInt, EnvaptError> {
        Ok(self.get_bigint(keys)?.unwrap_or(fallback))
    }

    pub fn get_symbol(&self, keys: impl Into<KeyInput>) -> Result<Option<Symbol>, EnvaptError> {
        self.primitive(keys.into(), |raw| converters::symbol(raw, None))
    }

    pub fn get_symbol_or(
        &self,
        keys: impl Into<KeyInput>,
        fallback: Symbol,
    ) -> Result<Symbol, EnvaptError> {
        Ok(self.get_symbol(keys)?.unwrap_or(fallback))
    }

    /// Converts with a built-in, primitive, or array converter.
    ///
    /// The fallback is validated against the converter even when the variable is set.
    pub fn get_using(
        &self,
        keys: impl Into<KeyInput>,
        converter: impl Into<ConverterSpec>,
        fallback: Option<EnvValue>,
    ) -> Result<Option<EnvValue>, EnvaptError> {
        let (key, _) = keys.into().resolve(self)?;
        let request = ConversionRequest::new(key)
            .with_converter(converter)
            .with_optional_fallback(fallback);
        Ok(self.convert(&request)?.into_option())
    }

    /// Converts with a custom function. The function is not called when the variable is missing.
    pub fn get_with<F>(
        &self,
        keys: impl Into<KeyInput>,
        converter: F,
        fallback: Option<EnvValue>,
    ) -> Result<Option<EnvValue>, EnvaptError>
    where
        F: Fn(&str, Option<&EnvValue>) -> anyhow::Result<EnvValue> + Send + Sync + 'static,
    {
        self.get_using(keys, ConverterSpec::custom(converter), fallback)
    }

    /// Runs a full conversion request against this snapshot.
    pub fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutcome, EnvaptError> {
        self.parser().convert(request)
    }

    /// Expands `${NAME}` placeholders in `value`, the raw value of `key`.
    pub fn resolve_template(&self, key: &str, value: &str) -> String {
        resolve_template(self, key, value)
    }

    /// Interleaves `fragments` with the values of `keys`.
    ///
    /// `fragments[i]` is followed by the value of `keys[i]`; missing variables
    /// become empty strings. Surplus keys or fragments are appended in order.
    pub fn tagged(&self, fragments: &[&str], keys: &[&str]) -> String {
        let mut out = String::new();
        for i in 0..fragments.len().max(keys.len()) {
            if let Some(fragment) = fragments.get(i) {
                out.push_str(fragment);
            }
            if let Some(key) = keys.get(i) {
                let value = EnvSource::get(self, key, None).unwrap_or_default();
                out.push_str(&value);
            }
        }
        out
    }
}

impl EnvSource for Envapter {
    fn get_raw(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}
