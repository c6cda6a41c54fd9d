//! Loading the layered configuration from disk.
//!
//! Layout under the project root:
//!
//! ```text
//! config/hoist.yml          defaults, every key scoped under `all`
//! config/hoist/<app>.yml    per-application overrides, scoped under `<app>`
//! ```
//!
//! Files go through `${VAR}` substitution from the process environment
//! before they are parsed. A bare `$` is left alone.

use crate::error::{ConfigError, Result};
use crate::layered::{ALL, Category, LayeredConfig};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level key in an app file that is renamed to `apps`.
const APP_FILE_ENV_KEY: &str = "env";

/// Where the config files live. Passed explicitly instead of a global root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    /// Default settings file
    pub default_file: PathBuf,
    /// Directory of per-application files
    pub app_dir: PathBuf,
}

impl ConfigSources {
    /// Conventional locations below a project root.
    pub fn from_root(root: &Path) -> Self {
        let config_dir = root.join("config");
        Self {
            default_file: config_dir.join("hoist.yml"),
            app_dir: config_dir.join("hoist"),
        }
    }

    /// Per-application files, sorted by file name.
    pub fn app_files(&self) -> Result<Vec<PathBuf>> {
        if !self.app_dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.app_dir).map_err(|source| ConfigError::Io {
            path: self.app_dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext == "yml" || ext == "yaml")
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Read, substitute, namespace and merge every file.
    pub fn load(&self) -> Result<LayeredConfig> {
        let mut settings = Mapping::new();

        for path in self.app_files()? {
            let Some(app_name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(doc) = read_document(&path)? {
                log::debug!("loaded app config {}", path.display());
                deep_merge(&mut settings, namespace_app(app_name, doc));
            }
        }

        if let Some(doc) = read_document(&self.default_file)? {
            log::debug!("loaded default config {}", self.default_file.display());
            deep_merge(&mut settings, namespace_default(doc));
        }

        Ok(LayeredConfig::from_mapping(settings))
    }
}

/// Read one YAML document. Missing files are not an error.
fn read_document(path: &Path) -> Result<Option<Mapping>> {
    if !path.exists() {
        log::debug!("config file {} not found, skipping", path.display());
        return Ok(None);
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let expanded = substitute(&raw).map_err(|message| ConfigError::Template {
        path: path.to_path_buf(),
        message,
    })?;

    let value: Value = serde_yaml::from_str(&expanded).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Null => Ok(Some(Mapping::new())),
        Value::Mapping(mapping) => Ok(Some(mapping)),
        _ => Err(ConfigError::NotAMapping {
            path: path.to_path_buf(),
        }),
    }
}

/// Expand `${VAR}` references from the process environment.
///
/// A `$` outside `${...}` is literal, so passwords and hook commands such
/// as `echo $HOIST_APP_ENV` pass through untouched.
pub fn substitute(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let end = start + len + 1;
        out.push_str(&rest[..start]);
        let value = shellexpand::env(&rest[start..end]).map_err(|e| e.to_string())?;
        out.push_str(&value);
        rest = &rest[end..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Scope every key of the default file under `all`. `apps` already names
/// applications and is kept as is.
fn namespace_default(doc: Mapping) -> Mapping {
    doc.into_iter()
        .map(|(key, value)| {
            if key.as_str() == Some(Category::Apps.as_str()) {
                (key, value)
            } else {
                (key, scoped(ALL, value))
            }
        })
        .collect()
}

/// Scope every key of an app file under the app name.
fn namespace_app(app_name: &str, doc: Mapping) -> Mapping {
    doc.into_iter()
        .map(|(key, value)| {
            let key = if key.as_str() == Some(APP_FILE_ENV_KEY) {
                Value::from(Category::Apps.as_str())
            } else {
                key
            };
            (key, scoped(app_name, value))
        })
        .collect()
}

fn scoped(namespace: &str, value: Value) -> Value {
    let mut wrapper = Mapping::new();
    wrapper.insert(Value::from(namespace), value);
    Value::Mapping(wrapper)
}

/// Recursively merge `overlay` into `base`; overlay wins on scalar conflicts.
fn deep_merge(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
