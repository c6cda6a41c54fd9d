//! Environment selection.
//!
//! Turns `-s` arguments into an ordered, deduplicated list of app
//! environment keys. Production environments are only ever selected by
//! naming them: `all` skips them, and so does the default selection.

use appconfig::{AppEnvKey, LayeredConfig};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static PRODUCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(production|prod|live)\b").expect("production pattern is valid")
});

static STAGING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(staging|stage)\b").expect("staging pattern is valid"));

/// Environment classification by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvClass {
    Production,
    Staging,
    Other,
}

impl EnvClass {
    pub fn of(env: &str) -> Self {
        if PRODUCTION.is_match(env) {
            Self::Production
        } else if STAGING.is_match(env) {
            Self::Staging
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for EnvClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Other => "-",
        })
    }
}

pub fn is_production(key: &AppEnvKey) -> bool {
    EnvClass::of(key.env()) == EnvClass::Production
}

/// One `-s` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// `app:env`
    Key(AppEnvKey),
    /// `all:<env>`
    Environment(String),
    /// `all`, every non-production key
    All,
}

impl FromStr for Selection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == appconfig::layered::ALL {
            return Ok(Self::All);
        }
        if let Some(env) = s.strip_prefix("all:") {
            if env.is_empty() || env.contains(':') {
                return Err(SelectionError::Invalid(s.to_string()));
            }
            return Ok(Self::Environment(env.to_string()));
        }
        s.parse::<AppEnvKey>()
            .map(Self::Key)
            .map_err(|_| SelectionError::Invalid(s.to_string()))
    }
}

/// Reasons a selection cannot be turned into keys.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no apps are configured")]
    NoApps,

    #[error("invalid selection `{0}`")]
    Invalid(String),

    #[error("unknown app environment `{0}`")]
    UnknownKey(String),

    #[error("no app has an environment named `{0}`")]
    UnknownEnvironment(String),

    #[error("no app environment selected")]
    NothingSelected,

    #[error("`{command}` works on one app environment at a time, {count} selected")]
    TooMany { command: &'static str, count: usize },
}

impl SelectionError {
    /// What the user can do about it.
    pub fn guidance(&self) -> String {
        match self {
            Self::NoApps => "\
Declare apps in config/hoist.yml under the configuration root (--root or HOIST_ROOT):

  apps:
    awesomeapp:
      staging: awesomeapp-staging
      production: awesomeapp"
                .to_string(),
            Self::Invalid(_) | Self::UnknownKey(_) | Self::NothingSelected => "\
Select at least one app environment:
  hoist -s <app>:<env> [-s <app>:<env>] <command>
  hoist -s awesomeapp:production restart
  hoist -s demo:staging deploy

Select every app environment except production:
  hoist -s all setup

List the configured environments with `hoist envs`."
                .to_string(),
            Self::UnknownEnvironment(_) => {
                "List the configured environments with `hoist envs`.".to_string()
            }
            Self::TooMany { .. } => "Pass a single `-s <app>:<env>`.".to_string(),
        }
    }
}

/// Resolve selections against the configured keys.
///
/// With no selections, the first non-production key is chosen.
pub fn resolve(
    config: &LayeredConfig,
    selections: &[Selection],
) -> Result<Vec<AppEnvKey>, SelectionError> {
    if !config.has_apps() {
        return Err(SelectionError::NoApps);
    }

    let known = config.keys(None);

    if selections.is_empty() {
        return known
            .into_iter()
            .find(|key| !is_production(key))
            .map(|key| vec![key])
            .ok_or(SelectionError::NothingSelected);
    }

    let mut selected: Vec<AppEnvKey> = Vec::new();
    let mut push = |key: AppEnvKey| {
        if !selected.contains(&key) {
            selected.push(key);
        }
    };

    for selection in selections {
        match selection {
            Selection::Key(key) => {
                if !known.contains(key) {
                    return Err(SelectionError::UnknownKey(key.to_string()));
                }
                push(key.clone());
            }
            Selection::Environment(env) => {
                let keys = config.keys(Some(env));
                if keys.is_empty() {
                    return Err(SelectionError::UnknownEnvironment(env.clone()));
                }
                keys.into_iter().for_each(&mut push);
            }
            Selection::All => known
                .iter()
                .filter(|key| !is_production(key))
                .cloned()
                .for_each(&mut push),
        }
    }

    if selected.is_empty() {
        return Err(SelectionError::NothingSelected);
    }
    Ok(selected)
}

/// Parse raw `-s` arguments.
pub fn parse_all(raw: &[String]) -> Result<Vec<Selection>, SelectionError> {
    raw.iter().map(|s| s.parse()).collect()
}

/// Require exactly one key.
pub fn single(keys: Vec<AppEnvKey>, command: &'static str) -> Result<AppEnvKey, SelectionError> {
    let count = keys.len();
    let mut keys = keys.into_iter();
    match (keys.next(), keys.next()) {
        (Some(key), None) => Ok(key),
        (None, _) => Err(SelectionError::NothingSelected),
        (Some(_), Some(_)) => Err(SelectionError::TooMany { command, count }),
    }
}
