//! `hoist info` and `hoist apps`.

use anyhow::Result;
use appconfig::ResolvedAppSettings;
use chrono::Utc;
use colored::Colorize;
use platform::Backend;
use std::collections::BTreeMap;

use super::{HerokuFactory, keys_of, load_config, resolve_all, selected_settings, settings_for};
use crate::Context;
use crate::engine::{EnvOutcome, Executor, RunReport};
use crate::ui::{self, Table};

pub fn info(ctx: &Context) -> Result<()> {
    let (_, settings) = selected_settings(ctx)?;
    let factory = HerokuFactory::from_env()?;
    describe_all(&Executor::new(ctx.jobs, &factory), &settings)?.finish("info")
}

pub fn describe_all(executor: &Executor<'_>, settings: &[ResolvedAppSettings]) -> Result<RunReport> {
    executor.for_each(&keys_of(settings), |key, backend, sink| {
        for line in describe(backend, settings_for(settings, key)?)? {
            sink.line(&line);
        }
        Ok(EnvOutcome::Completed)
    })
}

/// Remote details of one app as table lines.
pub fn describe(backend: &dyn Backend, settings: &ResolvedAppSettings) -> Result<Vec<String>> {
    let remote = &settings.remote_name;
    let app = backend.get_app(remote)?;
    let snapshot = backend.snapshot(remote)?;
    let now = Utc::now();

    let maintenance = if app.maintenance {
        "on".yellow().to_string()
    } else {
        "off".to_string()
    };

    let mut table = Table::new();
    table
        .row("Name", app.name.clone())
        .optional("Web URL", app.web_url.clone())
        .row("Git URL", app.git_url.clone())
        .optional("Owner", app.owner_email.clone())
        .optional("Region", app.region.clone())
        .optional("Stack", snapshot.stack.clone())
        .row("Maintenance", maintenance)
        .optional("Repo size", app.repo_size.map(ui::format_size))
        .optional("Slug size", app.slug_size.map(ui::format_size))
        .optional("Created", app.created_at.map(|at| ui::format_timestamp(at, now)))
        .optional("Released", app.released_at.map(|at| ui::format_timestamp(at, now)))
        .list("Addons", snapshot.addons)
        .list("Collaborators", snapshot.collaborators)
        .list("Domains", snapshot.domains)
        .list(
            "Dynos",
            snapshot
                .formation
                .iter()
                .map(|(process, quantity)| format!("{process}: {quantity}")),
        )
        .list("Config vars", snapshot.config_vars.into_keys());
    Ok(table.render())
}

pub fn apps(ctx: &Context) -> Result<()> {
    // Config is optional here: apps are marked when the file declares them.
    let configured = match load_config(ctx) {
        Ok(config) => {
            let keys = config.keys(None);
            resolve_all(&config, &keys)?
        }
        Err(e) => {
            log::debug!("no configuration loaded: {e:#}");
            Vec::new()
        }
    };

    let backend = HerokuFactory::from_env()?.backend();
    for line in app_lines(&backend, &configured)? {
        println!("{line}");
    }
    Ok(())
}

/// One line per remote app, with the configured key when there is one.
pub fn app_lines(backend: &dyn Backend, configured: &[ResolvedAppSettings]) -> Result<Vec<String>> {
    let by_remote: BTreeMap<&str, String> = configured
        .iter()
        .map(|s| (s.remote_name.as_str(), s.key.to_string()))
        .collect();

    let mut apps = backend.list_apps()?;
    apps.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(apps
        .iter()
        .map(|app| match by_remote.get(app.name.as_str()) {
            Some(key) => format!("  {} {} {}", "✓".green(), app.name, format!("({key})").dimmed()),
            None => format!("  {} {}", "·".dimmed(), app.name),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::*;
    use crate::output::MemorySink;
    use platform::MemoryBackend;
    use tempfile::TempDir;

    fn settings(selection: &str) -> Vec<ResolvedAppSettings> {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), FLEET);
        selected_settings(&context(dir.path(), &[selection])).unwrap().1
    }

    #[test]
    fn test_describe_lists_remote_state() {
        let backend = MemoryBackend::new();
        backend.seed("demo-staging", |a| {
            a.app.region = Some("eu".into());
            a.app.slug_size = Some(2 * 1024 * 1024);
            a.domains.insert("staging.example.com".into());
            a.formation.insert("web".into(), 2);
            a.config.insert("SECRET_KEY".into(), "hidden".into());
        });

        let lines = describe(&backend, &settings("demo:staging")[0]).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("demo-staging"));
        assert!(text.contains("2.0 MB"));
        assert!(text.contains("staging.example.com"));
        assert!(text.contains("web: 2"));
        assert!(text.contains("SECRET_KEY"));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn test_missing_app_fails_only_its_environment() {
        let backend = MemoryBackend::new().with_app("demo-staging");
        let factory = memory_factory(&backend);
        let sink = MemorySink::new();

        let report = describe_all(&executor(&factory, &sink), &settings("all")).unwrap();
        assert_eq!(report.completed(), 1);
        assert_eq!(report.failed(), 1);
        assert!(sink.contains("app not found: api-staging"));
    }

    #[test]
    fn test_app_lines_mark_configured_apps() {
        let backend = MemoryBackend::new()
            .with_app("demo-staging")
            .with_app("unrelated");
        let lines = app_lines(&backend, &settings("demo:staging")).unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("demo-staging") && lines[0].contains("(demo:staging)"));
        assert!(lines[1].contains("unrelated") && !lines[1].contains('('));
    }
}
