//! Materialized settings for one app environment.

use crate::key::AppEnvKey;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// An add-on subscription: service name plus optional tier (`name:tier`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AddonSpec {
    pub name: String,
    pub tier: Option<String>,
}

impl AddonSpec {
    /// Split `name:tier` at the first separator.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((name, tier)) if !tier.is_empty() => Self {
                name: name.to_string(),
                tier: Some(tier.to_string()),
            },
            Some((name, _)) => Self {
                name: name.to_string(),
                tier: None,
            },
            None => Self {
                name: s.to_string(),
                tier: None,
            },
        }
    }
}

impl fmt::Display for AddonSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tier {
            Some(tier) => write!(f, "{}:{}", self.name, tier),
            None => f.write_str(&self.name),
        }
    }
}

/// Desired state of one app environment after the cascade.
///
/// Cheap to build; callers resolve again instead of caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAppSettings {
    pub key: AppEnvKey,
    /// App name on the remote platform
    pub remote_name: String,
    pub stack: Option<String>,
    pub region: Option<String>,
    pub domains: Vec<String>,
    pub collaborators: Vec<String>,
    pub addons: Vec<AddonSpec>,
    pub config: BTreeMap<String, String>,
    /// Process type to instance count
    pub scale: BTreeMap<String, u32>,
}

impl ResolvedAppSettings {
    /// Add-ons rendered as `name:tier` identifiers.
    pub fn addon_ids(&self) -> Vec<String> {
        self.addons.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addon_parse() {
        let spec = AddonSpec::parse("heroku-postgresql:essential-0");
        assert_eq!(spec.name, "heroku-postgresql");
        assert_eq!(spec.tier.as_deref(), Some("essential-0"));
        assert_eq!(spec.to_string(), "heroku-postgresql:essential-0");

        let bare = AddonSpec::parse("papertrail");
        assert_eq!(bare.tier, None);
        assert_eq!(bare.to_string(), "papertrail");
    }
}
