//! Deployment environment classification

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Variables consulted, in order, to classify the environment.
pub const ENVIRONMENT_KEYS: [&str; 3] = ["ENVIRONMENT", "ENV", "APP_ENV"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Classifies a name. Anything other than `production` or `staging`
    /// (ignoring case) is development.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case("production") {
            Self::Production
        } else if name.eq_ignore_ascii_case("staging") {
            Self::Staging
        } else {
            Self::Development
        }
    }

    /// Classifies from the first non-empty value of [`ENVIRONMENT_KEYS`].
    pub fn detect<'a>(mut lookup: impl FnMut(&str) -> Option<&'a str>) -> Self {
        ENVIRONMENT_KEYS
            .into_iter()
            .find_map(|key| lookup(key).filter(|value| !value.is_empty()))
            .map(Self::from_name)
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_name() {
        assert_eq!(Environment::from_name("PRODUCTION"), Environment::Production);
        assert_eq!(Environment::from_name("Staging"), Environment::Staging);
        assert_eq!(Environment::from_name("dev"), Environment::Development);
        assert_eq!(Environment::from_name(""), Environment::Development);
    }

    #[test]
    fn test_detect_order() {
        let vars: HashMap<&str, &str> =
            [("ENV", "staging"), ("APP_ENV", "production")].into_iter().collect();
        assert_eq!(
            Environment::detect(|key| vars.get(key).copied()),
            Environment::Staging
        );

        let vars: HashMap<&str, &str> =
            [("ENVIRONMENT", ""), ("APP_ENV", "production")].into_iter().collect();
        assert_eq!(
            Environment::detect(|key| vars.get(key).copied()),
            Environment::Production
        );
    }

    #[test]
    fn test_detect_defaults_to_development() {
        assert_eq!(Environment::detect(|_| None), Environment::Development);
    }

    #[test]
    fn test_display_round_trip() {
        for env in [
            Environment::Development,
            Environment::Staging,
            Environment::Production,
        ] {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
    }
}
