//! Single-stage operations on the selected environments.

use anyhow::Result;
use colored::Colorize;

use super::run_on_selected;
use crate::Context;
use crate::cli::DbCommand;
use crate::engine::sync::Reconciler;
use crate::output::OutputSink;

pub fn restart(ctx: &Context) -> Result<()> {
    run_on_selected(ctx, "restart", |r, sink| r.restart(sink))
}

pub fn scale(ctx: &Context) -> Result<()> {
    run_on_selected(ctx, "scale", scale_env)
}

pub fn maintenance(ctx: &Context, enabled: bool) -> Result<()> {
    run_on_selected(ctx, "maintenance", |r, sink| r.set_maintenance(enabled, sink))
}

pub fn exec(ctx: &Context, command: &[String]) -> Result<()> {
    let command = command.join(" ");
    run_on_selected(ctx, "exec", |r, sink| r.run_command(&command, sink))
}

pub fn db(ctx: &Context, cmd: DbCommand) -> Result<()> {
    match cmd {
        DbCommand::Migrate { command } => {
            run_on_selected(ctx, "db migrate", |r, sink| migrate(r, &command, sink))
        }
    }
}

fn scale_env(reconciler: &Reconciler<'_>, sink: &mut dyn OutputSink) -> Result<()> {
    if reconciler.scale(sink)? == 0 {
        sink.line(&"No process types configured under `scale`".dimmed().to_string());
    }
    Ok(())
}

/// Run the migration, then restart so processes pick up the new schema.
fn migrate(reconciler: &Reconciler<'_>, command: &str, sink: &mut dyn OutputSink) -> Result<()> {
    reconciler.run_command(command, sink)?;
    reconciler.restart(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::*;
    use crate::commands::{selected_settings, with_reconciler};
    use crate::output::MemorySink;
    use platform::MemoryBackend;
    use tempfile::TempDir;

    #[test]
    fn test_migrate_runs_then_restarts() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), FLEET);
        let (_, settings) = selected_settings(&context(dir.path(), &["api:staging"])).unwrap();
        let backend = MemoryBackend::new().with_app("api-staging");
        let factory = memory_factory(&backend);

        let report = with_reconciler(&executor(&factory, &MemorySink::new()), &settings, |r, sink| {
            migrate(r, "rake db:migrate", sink)
        })
        .unwrap();

        assert!(report.is_success());
        assert_eq!(
            backend.calls(),
            vec!["run_command api-staging rake db:migrate", "restart api-staging"]
        );
    }

    #[test]
    fn test_failed_migration_skips_restart() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), FLEET);
        let (_, settings) = selected_settings(&context(dir.path(), &["api:staging"])).unwrap();
        let backend = MemoryBackend::new().with_app("api-staging");
        backend.fail("run_command", "api-staging", 503);
        let factory = memory_factory(&backend);

        let report = with_reconciler(&executor(&factory, &MemorySink::new()), &settings, |r, sink| {
            migrate(r, "rake db:migrate", sink)
        })
        .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(backend.app_state("api-staging").unwrap().restarts, 0);
    }

    #[test]
    fn test_scale_without_configuration_reports_it() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "apps:\n  demo:\n    staging: demo-staging\n");
        let (_, settings) = selected_settings(&context(dir.path(), &[])).unwrap();
        let backend = MemoryBackend::new().with_app("demo-staging");
        let factory = memory_factory(&backend);
        let sink = MemorySink::new();

        with_reconciler(&executor(&factory, &sink), &settings, scale_env).unwrap();
        assert!(sink.contains("No process types configured"));
        assert!(backend.calls().is_empty());
    }
}
