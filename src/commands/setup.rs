//! `hoist setup`: create apps and converge their declared settings.

use anyhow::Result;
use appconfig::ResolvedAppSettings;
use colored::Colorize;

use super::{HerokuFactory, keys_of, selected_settings, settings_for};
use crate::Context;
use crate::cli::{SetupArgs, SetupTarget};
use crate::engine::sync::{Reconciler, SETUP_ORDER, SetupStage};
use crate::engine::{EnvOutcome, Executor, RunReport};
use crate::ui;

impl From<SetupTarget> for SetupStage {
    fn from(target: SetupTarget) -> Self {
        match target {
            SetupTarget::App => Self::App,
            SetupTarget::Stack => Self::Stack,
            SetupTarget::Collaborators => Self::Collaborators,
            SetupTarget::Config => Self::Config,
            SetupTarget::Addons => Self::Addons,
            SetupTarget::Domains => Self::Domains,
        }
    }
}

pub fn run(ctx: &Context, args: &SetupArgs) -> Result<()> {
    let (_, settings) = selected_settings(ctx)?;
    let stages: Vec<SetupStage> = match args.target {
        Some(target) => vec![target.into()],
        None => SETUP_ORDER.to_vec(),
    };

    if args.dry_run && !ctx.quiet {
        ui::info("Dry run: no changes will be made");
    }

    let factory = HerokuFactory::from_env()?;
    let report = setup(
        &Executor::new(ctx.jobs, &factory),
        &settings,
        &stages,
        args.dry_run,
    )?;
    report.finish("setup")
}

/// Run `stages` in order for every environment.
pub fn setup(
    executor: &Executor<'_>,
    settings: &[ResolvedAppSettings],
    stages: &[SetupStage],
    dry_run: bool,
) -> Result<RunReport> {
    executor.for_each(&keys_of(settings), |key, backend, sink| {
        let settings = settings_for(settings, key)?;
        let reconciler = Reconciler::new(backend, settings).dry_run(dry_run);

        let mut changed = 0;
        for &stage in stages {
            let count = reconciler.setup(stage, sink)?;
            changed += count;
            // Later stages read the app, which a dry run never created.
            if dry_run && stage == SetupStage::App && count > 0 {
                sink.line(&"Skipping remaining stages until the app exists".dimmed().to_string());
                break;
            }
        }

        if changed == 0 {
            sink.line(&format!("{} {}", "✓".green(), "Already up to date".dimmed()));
        }
        Ok(EnvOutcome::Completed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::*;
    use crate::output::MemorySink;
    use platform::MemoryBackend;
    use tempfile::TempDir;

    const SETUP: &str = r"
apps:
  demo:
    staging: demo-staging
stacks: heroku-24
region: eu
collaborators:
  - dev@example.com
addons:
  - redis:mini
domains:
  - staging.example.com
config:
  RACK_ENV: staging
";

    fn settings() -> Vec<ResolvedAppSettings> {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), SETUP);
        selected_settings(&context(dir.path(), &["demo:staging"])).unwrap().1
    }

    #[test]
    fn test_full_setup_creates_and_converges() {
        let settings = settings();
        let backend = MemoryBackend::new();
        let factory = memory_factory(&backend);
        let sink = MemorySink::new();

        let report = setup(&executor(&factory, &sink), &settings, &SETUP_ORDER, false).unwrap();
        assert!(report.is_success());

        let state = backend.app_state("demo-staging").unwrap();
        assert_eq!(state.app.region.as_deref(), Some("eu"));
        assert_eq!(state.app.effective_stack(), Some("heroku-24"));
        assert!(state.collaborators.contains("dev@example.com"));
        assert!(state.domains.contains("staging.example.com"));
        assert_eq!(state.config.get("RACK_ENV").map(String::as_str), Some("staging"));
        assert_eq!(state.addons.len(), 2);

        // A second run has nothing left to do.
        let again = MemorySink::new();
        setup(&executor(&factory, &again), &settings, &SETUP_ORDER, false).unwrap();
        assert!(again.contains("Already up to date"));
    }

    #[test]
    fn test_dry_run_for_missing_app_stops_after_app_stage() {
        let settings = settings();
        let backend = MemoryBackend::new();
        let factory = memory_factory(&backend);
        let sink = MemorySink::new();

        let report = setup(&executor(&factory, &sink), &settings, &SETUP_ORDER, true).unwrap();
        assert!(report.is_success());
        assert!(backend.app_state("demo-staging").is_none());
        assert!(sink.contains("Creating app: "));
        assert!(sink.contains("Skipping remaining stages"));
    }

    #[test]
    fn test_single_stage() {
        let settings = settings();
        let backend = MemoryBackend::new().with_app("demo-staging");
        let factory = memory_factory(&backend);

        setup(
            &executor(&factory, &MemorySink::new()),
            &settings,
            &[SetupTarget::Domains.into()],
            false,
        )
        .unwrap();

        let state = backend.app_state("demo-staging").unwrap();
        assert!(state.domains.contains("staging.example.com"));
        assert!(state.config.is_empty());
        assert!(state.collaborators.is_empty());
    }
}
