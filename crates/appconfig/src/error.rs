//! Error types for configuration loading and resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or querying the layered configuration.
///
/// Every variant is a configuration error: it is reported before any
/// remote call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read
    #[error("could not read {path}: {source}")]
    Io {
        /// File that failed to read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Variable substitution failed (usually an unset variable)
    #[error("template error in {path}: {message}")]
    Template {
        /// File being substituted
        path: PathBuf,
        /// Description from the expander
        message: String,
    },

    /// A config file is not valid YAML
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        /// File that failed to parse
        path: PathBuf,
        /// Parser error
        source: serde_yaml::Error,
    },

    /// A document root is not a mapping
    #[error("{path} must contain a mapping at the top level")]
    NotAMapping {
        /// Offending file
        path: PathBuf,
    },

    /// An `app:env` string could not be parsed
    #[error("invalid app environment '{0}', expected <app>:<environment>")]
    InvalidKey(String),

    /// No remote app name is mapped for this key
    #[error("no remote app is configured for '{key}' (add it under `apps` in your config)")]
    UnknownApp {
        /// The `app:env` key that was looked up
        key: String,
    },

    /// A value has the wrong shape for its category
    #[error("invalid value for {category} of '{key}': {message}")]
    InvalidValue {
        /// Category being resolved
        category: String,
        /// The `app:env` key being resolved
        key: String,
        /// What was wrong
        message: String,
    },
}
