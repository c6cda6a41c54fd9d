//! Backend abstraction for the remote platform.
//!
//! The [`Backend`] trait is the fixed capability table the orchestrator
//! consumes: typed list/create/update/delete methods per resource. Every
//! method either returns the decoded value or a structured [`Error`].
//!
//! - [`heroku::HerokuBackend`]: Heroku Platform API v3 over HTTPS
//! - [`memory::MemoryBackend`]: in-process fake for tests and dry runs
//!
//! [`Error`]: crate::error::Error

pub mod heroku;
pub mod memory;

use crate::error::{Error, Result};
use crate::types::{Addon, App, Dyno, Formation, LogOptions, NewApp, RemoteAppSnapshot};
use std::collections::BTreeMap;

/// Backend trait for remote platform operations.
pub trait Backend: Send + Sync {
    // Apps

    fn list_apps(&self) -> Result<Vec<App>>;

    fn create_app(&self, app: &NewApp) -> Result<App>;

    fn get_app(&self, app: &str) -> Result<App>;

    /// Change the stack used by the next build.
    fn set_stack(&self, app: &str, stack: &str) -> Result<()>;

    fn set_maintenance(&self, app: &str, enabled: bool) -> Result<()>;

    // Add-ons (identified by `service:tier` plan)

    fn list_addons(&self, app: &str) -> Result<Vec<Addon>>;

    fn create_addon(&self, app: &str, plan: &str) -> Result<()>;

    fn delete_addon(&self, app: &str, plan: &str) -> Result<()>;

    // Collaborators (identified by email)

    fn list_collaborators(&self, app: &str) -> Result<Vec<String>>;

    fn create_collaborator(&self, app: &str, email: &str) -> Result<()>;

    fn delete_collaborator(&self, app: &str, email: &str) -> Result<()>;

    // Domains (identified by hostname)

    fn list_domains(&self, app: &str) -> Result<Vec<String>>;

    fn create_domain(&self, app: &str, hostname: &str) -> Result<()>;

    fn delete_domain(&self, app: &str, hostname: &str) -> Result<()>;

    // Config vars

    fn config_vars(&self, app: &str) -> Result<BTreeMap<String, String>>;

    /// Set several variables in one call.
    fn set_config_vars(&self, app: &str, vars: &BTreeMap<String, String>) -> Result<()>;

    fn delete_config_var(&self, app: &str, key: &str) -> Result<()>;

    // Dynos

    fn formation(&self, app: &str) -> Result<Vec<Formation>>;

    fn scale(&self, app: &str, process_type: &str, quantity: u32) -> Result<()>;

    /// Restart every process of the app.
    fn restart(&self, app: &str) -> Result<()>;

    /// Start a detached one-off process.
    fn run_command(&self, app: &str, command: &str) -> Result<Dyno>;

    /// Stream log lines to `on_line` until the stream ends.
    fn stream_logs(
        &self,
        app: &str,
        options: &LogOptions,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<()>;

    /// Whether the app exists on the remote.
    fn app_exists(&self, app: &str) -> Result<bool> {
        match self.get_app(app) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch the full observed state of an app.
    fn snapshot(&self, app: &str) -> Result<RemoteAppSnapshot> {
        let remote = self.get_app(app)?;
        Ok(RemoteAppSnapshot {
            addons: self.list_addons(app)?.into_iter().map(|a| a.plan).collect(),
            collaborators: self.list_collaborators(app)?.into_iter().collect(),
            domains: self.list_domains(app)?.into_iter().collect(),
            config_vars: self.config_vars(app)?,
            stack: remote.effective_stack().map(str::to_string),
            formation: self
                .formation(app)?
                .into_iter()
                .map(|f| (f.process_type, f.quantity))
                .collect(),
        })
    }
}

/// Get the default backend (Heroku, token from the environment or netrc).
pub fn default_backend() -> Result<heroku::HerokuBackend> {
    let token = crate::auth::api_token()?;
    Ok(heroku::HerokuBackend::new(token))
}

pub(crate) fn not_found(resource: &'static str, name: &str) -> Error {
    Error::NotFound {
        resource,
        name: name.to_string(),
    }
}
