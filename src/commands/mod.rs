//! Command implementations.
//!
//! Every command loads and resolves the configuration for the selected
//! environments before it makes any remote call, so configuration and
//! selection errors abort the whole run up front.

pub mod deploy;
pub mod info;
pub mod logs;
pub mod ops;
pub mod remotes;
pub mod setup;

use anyhow::{Context as AnyhowContext, Result};
use appconfig::{AppEnvKey, ConfigSources, LayeredConfig, ResolvedAppSettings};
use platform::{Backend, HerokuBackend};

use crate::Context;
use crate::engine::sync::Reconciler;
use crate::engine::{BackendFactory, EnvOutcome, Executor, RunReport};
use crate::output::OutputSink;
use crate::selector;

/// Set to `1` or `true` to skip TLS verification when streaming logs.
pub const LOGS_INSECURE_ENV: &str = "HOIST_LOGS_INSECURE";

/// Load the layered configuration below the project root.
pub fn load_config(ctx: &Context) -> Result<LayeredConfig> {
    let sources = ConfigSources::from_root(&ctx.root);
    log::debug!(
        "loading {} and {}",
        sources.default_file.display(),
        sources.app_dir.display()
    );
    Ok(sources.load()?)
}

/// Turn the `-s` arguments into keys.
pub fn select(ctx: &Context, config: &LayeredConfig) -> Result<Vec<AppEnvKey>> {
    let selections = selector::parse_all(&ctx.selections)?;
    let keys = selector::resolve(config, &selections)?;
    log::info!(
        "selected {}",
        keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    Ok(keys)
}

/// Resolve the settings of every key before any remote work starts.
pub fn resolve_all(config: &LayeredConfig, keys: &[AppEnvKey]) -> Result<Vec<ResolvedAppSettings>> {
    keys.iter()
        .map(|key| config.resolve(key).map_err(anyhow::Error::from))
        .collect()
}

/// Load, select and resolve in one step.
pub fn selected_settings(ctx: &Context) -> Result<(LayeredConfig, Vec<ResolvedAppSettings>)> {
    let config = load_config(ctx)?;
    let keys = select(ctx, &config)?;
    let settings = resolve_all(&config, &keys)?;
    Ok((config, settings))
}

pub fn keys_of(settings: &[ResolvedAppSettings]) -> Vec<AppEnvKey> {
    settings.iter().map(|s| s.key.clone()).collect()
}

pub fn settings_for<'a>(
    settings: &'a [ResolvedAppSettings],
    key: &AppEnvKey,
) -> Result<&'a ResolvedAppSettings> {
    settings
        .iter()
        .find(|s| &s.key == key)
        .with_context(|| format!("no resolved settings for {key}"))
}

/// Builds Heroku backends sharing one token.
pub struct HerokuFactory {
    token: String,
    insecure_logs: bool,
}

impl HerokuFactory {
    /// Look the token up once; a missing token fails before any fan-out.
    pub fn from_env() -> Result<Self> {
        let token = platform::auth::api_token()?;
        let insecure_logs = std::env::var(LOGS_INSECURE_ENV)
            .is_ok_and(|v| matches!(v.as_str(), "1" | "true"));
        if insecure_logs {
            log::warn!("TLS verification is disabled for log streaming");
        }
        Ok(Self {
            token,
            insecure_logs,
        })
    }

    pub fn backend(&self) -> HerokuBackend {
        HerokuBackend::new(&self.token).with_insecure_log_streaming(self.insecure_logs)
    }
}

impl BackendFactory for HerokuFactory {
    fn create(&self) -> Result<Box<dyn Backend>> {
        Ok(Box::new(self.backend()))
    }
}

/// Run `op` with a [`Reconciler`] for every environment in `settings`.
pub fn with_reconciler<F>(
    executor: &Executor<'_>,
    settings: &[ResolvedAppSettings],
    op: F,
) -> Result<RunReport>
where
    F: Fn(&Reconciler<'_>, &mut dyn OutputSink) -> Result<()> + Sync,
{
    executor.for_each(&keys_of(settings), |key, backend, sink| {
        let settings = settings_for(settings, key)?;
        op(&Reconciler::new(backend, settings), sink)?;
        Ok(EnvOutcome::Completed)
    })
}

/// Run `op` on every selected environment against Heroku and report.
pub fn run_on_selected<F>(ctx: &Context, action: &str, op: F) -> Result<()>
where
    F: Fn(&Reconciler<'_>, &mut dyn OutputSink) -> Result<()> + Sync,
{
    let (_, settings) = selected_settings(ctx)?;
    let factory = HerokuFactory::from_env()?;
    let executor = Executor::new(ctx.jobs, &factory);
    with_reconciler(&executor, &settings, op)?.finish(action)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::output::MemorySink;
    use platform::MemoryBackend;
    use std::fs;
    use std::path::Path;

    pub const FLEET: &str = r"
apps:
  demo:
    staging: demo-staging
    production: demo
  api:
    staging: api-staging
config:
  RACK_ENV: production
scale:
  web: 1
";

    pub fn write_config(root: &Path, yaml: &str) {
        fs::create_dir_all(root.join("config")).unwrap();
        fs::write(root.join("config/hoist.yml"), yaml).unwrap();
    }

    pub fn context(root: &Path, selections: &[&str]) -> Context {
        Context {
            verbose: 0,
            quiet: true,
            root: root.to_path_buf(),
            jobs: 2,
            selections: selections.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn memory_factory(backend: &MemoryBackend) -> impl BackendFactory + use<> {
        let backend = backend.clone();
        move || -> Result<Box<dyn Backend>> { Ok(Box::new(backend.clone())) }
    }

    pub fn executor<'a>(factory: &'a dyn BackendFactory, sink: &MemorySink) -> Executor<'a> {
        let sink = sink.clone();
        Executor::new(2, factory).with_sinks(move |_, _| Box::new(sink.clone()))
    }
}
