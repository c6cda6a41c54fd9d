//! App-environment identifiers.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between application and environment in a key.
pub const SEPARATOR: char = ':';

/// One deployable target: an application in one environment.
///
/// Serialized as `application:environment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppEnvKey {
    app: String,
    env: String,
}

impl AppEnvKey {
    pub fn new(app: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            env: env.into(),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn env(&self) -> &str {
        &self.env
    }
}

impl fmt::Display for AppEnvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.app, SEPARATOR, self.env)
    }
}

impl FromStr for AppEnvKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(app), Some(env), None) if !app.is_empty() && !env.is_empty() => {
                Ok(Self::new(app, env))
            }
            _ => Err(ConfigError::InvalidKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for AppEnvKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AppEnvKey> for String {
    fn from(key: AppEnvKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let key: AppEnvKey = "awesomeapp:staging".parse().unwrap();
        assert_eq!(key.app(), "awesomeapp");
        assert_eq!(key.env(), "staging");
        assert_eq!(key.to_string(), "awesomeapp:staging");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["awesomeapp", "awesomeapp:", ":staging", "a:b:c", ""] {
            assert!(bad.parse::<AppEnvKey>().is_err(), "{bad} should not parse");
        }
    }
}
