//! The layered configuration cascade.
//!
//! Settings are stored per category as a three-level mapping:
//!
//! ```yaml
//! config:
//!   all:                  # global default
//!     LOG_LEVEL: info
//!   awesomeapp:
//!     LOG_LEVEL: warn     # app-wide key (not a map)
//!     production:         # environment-specific override
//!       LOG_LEVEL: error
//! ```
//!
//! Resolution for one [`AppEnvKey`] always ends in a flat value.

use crate::error::{ConfigError, Result};
use crate::key::AppEnvKey;
use crate::resolved::{AddonSpec, ResolvedAppSettings};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Namespace holding global defaults inside each category.
pub const ALL: &str = "all";

/// Setting categories understood by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Apps,
    Config,
    Scale,
    Hooks,
    Addons,
    Collaborators,
    Domains,
    Stacks,
    Region,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apps => "apps",
            Self::Config => "config",
            Self::Scale => "scale",
            Self::Hooks => "hooks",
            Self::Addons => "addons",
            Self::Collaborators => "collaborators",
            Self::Domains => "domains",
            Self::Stacks => "stacks",
            Self::Region => "region",
        }
    }
}

/// Immutable, fully merged settings loaded from the config files.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    settings: Mapping,
}

impl LayeredConfig {
    /// Wrap an already-namespaced settings mapping.
    pub fn from_mapping(settings: Mapping) -> Self {
        Self { settings }
    }

    fn category(&self, category: Category) -> Option<&Mapping> {
        self.settings
            .get(category.as_str())
            .and_then(Value::as_mapping)
    }

    fn apps(&self) -> Option<&Mapping> {
        self.category(Category::Apps)
    }

    /// Whether any application is configured at all.
    pub fn has_apps(&self) -> bool {
        self.apps().is_some_and(|apps| !apps.is_empty())
    }

    /// Configured application names, in file order.
    pub fn app_names(&self) -> Vec<String> {
        self.apps()
            .map(|apps| apps.keys().filter_map(scalar_string).collect())
            .unwrap_or_default()
    }

    /// Every configured key, optionally restricted to one environment name.
    pub fn keys(&self, env_filter: Option<&str>) -> Vec<AppEnvKey> {
        let Some(apps) = self.apps() else {
            return Vec::new();
        };

        let mut keys = Vec::new();
        for (app, envs) in apps {
            let (Some(app), Some(envs)) = (scalar_string(app), envs.as_mapping()) else {
                continue;
            };
            for env in envs.keys().filter_map(scalar_string) {
                if env_filter.is_none_or(|filter| filter.is_empty() || filter == env) {
                    keys.push(AppEnvKey::new(app.clone(), env));
                }
            }
        }
        keys
    }

    /// Distinct environment names across all apps, first-seen order.
    pub fn environments(&self) -> Vec<String> {
        let mut envs: Vec<String> = Vec::new();
        for key in self.keys(None) {
            if !envs.iter().any(|e| e == key.env()) {
                envs.push(key.env().to_string());
            }
        }
        envs
    }

    /// Remote platform app name for a key. Missing mappings are a hard error.
    pub fn remote_name(&self, key: &AppEnvKey) -> Result<String> {
        self.apps()
            .and_then(|apps| apps.get(key.app()))
            .and_then(|envs| envs.get(key.env()))
            .and_then(scalar_string)
            .ok_or_else(|| ConfigError::UnknownApp {
                key: key.to_string(),
            })
    }

    pub fn stack(&self, key: &AppEnvKey) -> Option<String> {
        self.resolve_scalar(Category::Stacks, key)
    }

    pub fn region(&self, key: &AppEnvKey) -> Option<String> {
        self.resolve_scalar(Category::Region, key)
    }

    pub fn domains(&self, key: &AppEnvKey) -> Result<Vec<String>> {
        Ok(dedup(self.resolve_list(Category::Domains, key)?))
    }

    pub fn collaborators(&self, key: &AppEnvKey) -> Result<Vec<String>> {
        Ok(dedup(self.resolve_list(Category::Collaborators, key)?))
    }

    /// Add-ons deduplicated by name; the tier applied last wins.
    pub fn addons(&self, key: &AppEnvKey) -> Result<Vec<AddonSpec>> {
        let mut addons: Vec<AddonSpec> = Vec::new();
        for entry in self.resolve_list(Category::Addons, key)? {
            let spec = AddonSpec::parse(&entry);
            match addons.iter_mut().find(|a| a.name == spec.name) {
                Some(existing) => existing.tier = spec.tier,
                None => addons.push(spec),
            }
        }
        Ok(addons)
    }

    /// Config variables: `all ⊕ app-wide ⊕ app:env`.
    pub fn config(&self, key: &AppEnvKey) -> Result<BTreeMap<String, String>> {
        self.resolve_strings(Category::Config, key)
    }

    /// Hook commands for one key, cascaded like config variables.
    pub fn hooks(&self, key: &AppEnvKey) -> Result<BTreeMap<String, String>> {
        self.resolve_strings(Category::Hooks, key)
    }

    /// Hook commands defined globally (used for run-wide hooks).
    pub fn global_hooks(&self) -> Result<BTreeMap<String, String>> {
        let Some(all) = self
            .category(Category::Hooks)
            .and_then(|c| c.get(ALL))
            .and_then(Value::as_mapping)
        else {
            return Ok(BTreeMap::new());
        };

        let mut hooks = BTreeMap::new();
        for (name, command) in all {
            let (Some(name), Some(command)) = (scalar_string(name), scalar_string(command))
            else {
                return Err(ConfigError::InvalidValue {
                    category: Category::Hooks.as_str().to_string(),
                    key: ALL.to_string(),
                    message: "hook entries must be `name: command` strings".to_string(),
                });
            };
            hooks.insert(name, command);
        }
        Ok(hooks)
    }

    /// Process type to instance count.
    pub fn scale(&self, key: &AppEnvKey) -> Result<BTreeMap<String, u32>> {
        let mut scale = BTreeMap::new();
        for (process, count) in self.resolve_hash(Category::Scale, key) {
            let parsed = count
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .or_else(|| count.as_str().and_then(|s| s.trim().parse().ok()));
            let Some(parsed) = parsed else {
                return Err(ConfigError::InvalidValue {
                    category: Category::Scale.as_str().to_string(),
                    key: key.to_string(),
                    message: format!("'{process}' must be a non-negative integer"),
                });
            };
            scale.insert(process, parsed);
        }
        Ok(scale)
    }

    /// Materialize every category for one key.
    pub fn resolve(&self, key: &AppEnvKey) -> Result<ResolvedAppSettings> {
        let settings = ResolvedAppSettings {
            key: key.clone(),
            remote_name: self.remote_name(key)?,
            stack: self.stack(key),
            region: self.region(key),
            domains: self.domains(key)?,
            collaborators: self.collaborators(key)?,
            addons: self.addons(key)?,
            config: self.config(key)?,
            scale: self.scale(key)?,
        };
        log::trace!("resolved {key}: {settings:?}");
        Ok(settings)
    }

    // =========================================================================
    // Cascade primitives
    // =========================================================================

    /// `app[env]` if present, else `all`.
    fn resolve_scalar(&self, category: Category, key: &AppEnvKey) -> Option<String> {
        let layer = self.category(category)?;
        layer
            .get(key.app())
            .and_then(|app| app.get(key.env()))
            .and_then(scalar_string)
            .or_else(|| layer.get(ALL).and_then(scalar_string))
    }

    /// `all ++ app[env]`, not yet deduplicated.
    fn resolve_list(&self, category: Category, key: &AppEnvKey) -> Result<Vec<String>> {
        let Some(layer) = self.category(category) else {
            return Ok(Vec::new());
        };

        let default = layer.get(ALL);
        let specific = layer.get(key.app()).and_then(|app| app.get(key.env()));

        let mut items = Vec::new();
        for value in [default, specific].into_iter().flatten() {
            match value {
                Value::Sequence(seq) => {
                    for item in seq {
                        items.push(scalar_string(item).ok_or_else(|| {
                            ConfigError::InvalidValue {
                                category: category.as_str().to_string(),
                                key: key.to_string(),
                                message: "list entries must be strings".to_string(),
                            }
                        })?);
                    }
                }
                Value::Null => {}
                scalar => {
                    if let Some(item) = scalar_string(scalar) {
                        items.push(item);
                    }
                }
            }
        }
        Ok(items)
    }

    /// `all ⊕ app-wide non-map keys ⊕ app[env]`, right-biased.
    fn resolve_hash(&self, category: Category, key: &AppEnvKey) -> BTreeMap<String, Value> {
        let mut merged = BTreeMap::new();
        let Some(layer) = self.category(category) else {
            return merged;
        };

        let mut merge = |mapping: &Mapping, skip_maps: bool| {
            for (k, v) in mapping {
                if skip_maps && v.is_mapping() {
                    continue;
                }
                if let Some(k) = scalar_string(k) {
                    merged.insert(k, v.clone());
                }
            }
        };

        if let Some(all) = layer.get(ALL).and_then(Value::as_mapping) {
            merge(all, false);
        }
        if let Some(app) = layer.get(key.app()).and_then(Value::as_mapping) {
            merge(app, true);
            if let Some(env) = app.get(key.env()).and_then(Value::as_mapping) {
                merge(env, false);
            }
        }
        merged
    }

    fn resolve_strings(
        &self,
        category: Category,
        key: &AppEnvKey,
    ) -> Result<BTreeMap<String, String>> {
        self.resolve_hash(category, key)
            .into_iter()
            .map(|(k, v)| match scalar_string(&v) {
                Some(s) => Ok((k, s)),
                None => Err(ConfigError::InvalidValue {
                    category: category.as_str().to_string(),
                    key: key.to_string(),
                    message: format!("'{k}' must be a scalar value"),
                }),
            })
            .collect()
    }
}

/// Stringify a YAML scalar; `None` for null, sequences and maps.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Drop repeated entries, keeping the first position.
fn dedup(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
