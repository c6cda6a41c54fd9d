//! Reconciliation stages for one app environment.
//!
//! Every stage fetches the remote state it compares against right before
//! diffing, prints each element it is about to change, then issues one
//! call per element: additions first, removals second. In dry-run mode
//! the same lines are printed and no mutating call is made.

use anyhow::{Context, Result};
use appconfig::ResolvedAppSettings;
use colored::Colorize;
use declarative::{
    Delta, config_delta, delta_of, ensure_database_addon, pin_untiered_addons, render_assignment,
    scale_order,
};
use platform::{Backend, NewApp, ignore_not_found};

use crate::output::OutputSink;

/// Stages run by `setup`, in order.
pub const SETUP_ORDER: [SetupStage; 6] = [
    SetupStage::App,
    SetupStage::Stack,
    SetupStage::Collaborators,
    SetupStage::Config,
    SetupStage::Addons,
    SetupStage::Domains,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    App,
    Stack,
    Collaborators,
    Config,
    Addons,
    Domains,
}

/// Applies desired settings of one environment to its remote app.
pub struct Reconciler<'a> {
    backend: &'a dyn Backend,
    settings: &'a ResolvedAppSettings,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(backend: &'a dyn Backend, settings: &'a ResolvedAppSettings) -> Self {
        Self {
            backend,
            settings,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend
    }

    fn remote(&self) -> &str {
        &self.settings.remote_name
    }

    pub fn setup(&self, stage: SetupStage, sink: &mut dyn OutputSink) -> Result<usize> {
        match stage {
            SetupStage::App => self.create_app(sink).map(usize::from),
            SetupStage::Stack => self.sync_stack(sink).map(usize::from),
            SetupStage::Collaborators => self.sync_collaborators(sink),
            SetupStage::Config => self.sync_config(sink),
            SetupStage::Addons => self.sync_addons(sink),
            SetupStage::Domains => self.sync_domains(sink),
        }
    }

    /// Create the remote app when missing.
    pub fn create_app(&self, sink: &mut dyn OutputSink) -> Result<bool> {
        let remote = self.remote();
        if self.backend.app_exists(remote)? {
            log::debug!("{remote} already exists");
            return Ok(false);
        }

        sink.line(&format!("Creating app: {}", remote.green()));
        if let Some(region) = &self.settings.region {
            sink.line(&format!("\tRegion: {}", region.green()));
        }
        if let Some(stack) = &self.settings.stack {
            sink.line(&format!("\tStack: {}", stack.green()));
        }

        if !self.dry_run {
            self.backend
                .create_app(&NewApp {
                    name: remote.to_string(),
                    region: self.settings.region.clone(),
                    stack: self.settings.stack.clone(),
                })
                .with_context(|| format!("creating app {remote}"))?;
        }
        Ok(true)
    }

    /// Move the app to the desired stack.
    pub fn sync_stack(&self, sink: &mut dyn OutputSink) -> Result<bool> {
        let Some(desired) = &self.settings.stack else {
            return Ok(false);
        };
        let remote = self.remote();
        let app = self.backend.get_app(remote)?;
        if app.effective_stack() == Some(desired.as_str()) {
            return Ok(false);
        }

        sink.line(&format!(
            "Migrating {remote} to the stack: {}",
            desired.green()
        ));
        if !self.dry_run {
            self.backend
                .set_stack(remote, desired)
                .with_context(|| format!("setting stack {desired}"))?;
        }
        Ok(true)
    }

    pub fn sync_collaborators(&self, sink: &mut dyn OutputSink) -> Result<usize> {
        let remote = self.remote();
        let owner = self.backend.get_app(remote)?.owner_email;
        // The owner is listed as a collaborator but can never be removed.
        let observed: Vec<String> = self
            .backend
            .list_collaborators(remote)?
            .into_iter()
            .filter(|email| owner.as_ref() != Some(email))
            .collect();
        let delta = delta_of(self.settings.collaborators.iter().cloned(), observed);

        self.apply(
            sink,
            "collaborator",
            &delta,
            |email| self.backend.create_collaborator(remote, email),
            |email| self.backend.delete_collaborator(remote, email),
        )
    }

    pub fn sync_addons(&self, sink: &mut dyn OutputSink) -> Result<usize> {
        let remote = self.remote();
        let mut desired = self.settings.addon_ids();
        if ensure_database_addon(&mut desired) {
            log::debug!("{remote}: no database add-on configured, adding the default");
        }
        let observed: Vec<String> = self
            .backend
            .list_addons(remote)?
            .into_iter()
            .map(|addon| addon.plan)
            .collect();
        pin_untiered_addons(&mut desired, &observed);
        let delta = delta_of(desired, observed);

        self.apply(
            sink,
            "addon",
            &delta,
            |plan| self.backend.create_addon(remote, plan),
            |plan| self.backend.delete_addon(remote, plan),
        )
    }

    pub fn sync_domains(&self, sink: &mut dyn OutputSink) -> Result<usize> {
        let remote = self.remote();
        let observed = self.backend.list_domains(remote)?;
        let delta = delta_of(self.settings.domains.iter().cloned(), observed);

        self.apply(
            sink,
            "domain",
            &delta,
            |hostname| self.backend.create_domain(remote, hostname),
            |hostname| self.backend.delete_domain(remote, hostname),
        )
    }

    pub fn sync_config(&self, sink: &mut dyn OutputSink) -> Result<usize> {
        let remote = self.remote();
        let observed = self.backend.config_vars(remote)?;
        let delta = config_delta(&self.settings.config, &observed);

        if !delta.to_set.is_empty() {
            sink.line("Adding config(s):");
            for (key, value) in &delta.to_set {
                for line in render_assignment(key, value) {
                    sink.line(&line);
                }
            }
            if !self.dry_run {
                self.backend
                    .set_config_vars(remote, &delta.to_set)
                    .context("setting config vars")?;
            }
        }

        if !delta.to_remove.is_empty() {
            sink.line("Deleting config(s):");
            for key in &delta.to_remove {
                sink.line(&format!("\t{key}"));
                if !self.dry_run {
                    ignore_not_found(self.backend.delete_config_var(remote, key))
                        .with_context(|| format!("deleting config var {key}"))?;
                }
            }
        }

        Ok(delta.to_set.len() + delta.to_remove.len())
    }

    pub fn set_maintenance(&self, enabled: bool, sink: &mut dyn OutputSink) -> Result<()> {
        let display = if enabled { "ON".green() } else { "OFF".red() };
        sink.line(&format!("{} maintenance mode {display}", self.remote()));
        self.backend
            .set_maintenance(self.remote(), enabled)
            .context("toggling maintenance mode")?;
        Ok(())
    }

    pub fn restart(&self, sink: &mut dyn OutputSink) -> Result<()> {
        self.backend
            .restart(self.remote())
            .with_context(|| format!("restarting {}", self.remote()))?;
        sink.line(&format!("Restarting {}... {}", self.remote(), "OK".green()));
        Ok(())
    }

    /// Scale every configured process type, `clock` last.
    pub fn scale(&self, sink: &mut dyn OutputSink) -> Result<usize> {
        let order = scale_order(&self.settings.scale);
        if order.is_empty() {
            return Ok(0);
        }
        for (process, quantity) in &order {
            sink.line(&format!("Scaling {process} to {quantity}"));
            self.backend
                .scale(self.remote(), process, *quantity)
                .with_context(|| format!("scaling {process}"))?;
        }
        sink.line(&format!("Scaling {}... {}", self.remote(), "OK".green()));
        Ok(order.len())
    }

    /// Start a detached one-off command.
    pub fn run_command(&self, command: &str, sink: &mut dyn OutputSink) -> Result<()> {
        let dyno = self
            .backend
            .run_command(self.remote(), command)
            .with_context(|| format!("running `{command}`"))?;
        sink.line(&format!(
            "{}: {} ({})",
            self.remote(),
            dyno.command.green(),
            dyno.name
        ));
        Ok(())
    }

    fn apply(
        &self,
        sink: &mut dyn OutputSink,
        what: &str,
        delta: &Delta<String>,
        add: impl Fn(&str) -> platform::Result<()>,
        remove: impl Fn(&str) -> platform::Result<()>,
    ) -> Result<usize> {
        if !delta.to_add.is_empty() {
            sink.line(&format!("Adding {what}(s):"));
            for item in &delta.to_add {
                sink.line(&format!("\t{item}"));
                if !self.dry_run {
                    add(item).with_context(|| format!("adding {what} {item}"))?;
                }
            }
        }

        if !delta.to_remove.is_empty() {
            sink.line(&format!("Deleting {what}(s):"));
            for item in &delta.to_remove {
                sink.line(&format!("\t{item}"));
                if !self.dry_run
                    && !ignore_not_found(remove(item))
                        .with_context(|| format!("deleting {what} {item}"))?
                {
                    log::debug!("{what} {item} was already gone");
                }
            }
        }

        Ok(delta.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use appconfig::{AddonSpec, AppEnvKey};
    use platform::MemoryBackend;
    use std::collections::BTreeMap;

    fn settings() -> ResolvedAppSettings {
        ResolvedAppSettings {
            key: AppEnvKey::new("demo", "staging"),
            remote_name: "demo-staging".into(),
            stack: Some("heroku-24".into()),
            region: Some("eu".into()),
            domains: vec!["staging.example.com".into()],
            collaborators: vec!["dev@example.com".into()],
            addons: vec![AddonSpec::parse("redis:mini")],
            config: [("RACK_ENV", "staging"), ("LEGACY", "DELETE"), ("GONE", "DELETE")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            scale: [("web", 2), ("clock", 1), ("worker", 1)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.seed("demo-staging", |a| {
            a.app.owner_email = Some("owner@example.com".into());
            a.collaborators.insert("owner@example.com".into());
            a.collaborators.insert("former@example.com".into());
            a.domains.insert("old.example.com".into());
            a.config.insert("RACK_ENV".into(), "development".into());
            a.config.insert("LEGACY".into(), "1".into());
        });
        backend
    }

    #[test]
    fn test_collaborators_add_then_remove_and_keep_owner() {
        let backend = seeded();
        let settings = settings();
        let mut sink = MemorySink::new();

        let changed = Reconciler::new(&backend, &settings)
            .sync_collaborators(&mut sink)
            .unwrap();
        assert_eq!(changed, 2);

        let state = backend.app_state("demo-staging").unwrap();
        assert!(state.collaborators.contains("dev@example.com"));
        assert!(state.collaborators.contains("owner@example.com"));
        assert!(!state.collaborators.contains("former@example.com"));

        let mutations: Vec<String> = backend
            .calls()
            .into_iter()
            .filter(|c| c.contains("_collaborator "))
            .collect();
        assert_eq!(
            mutations,
            vec![
                "create_collaborator demo-staging dev@example.com",
                "delete_collaborator demo-staging former@example.com",
            ]
        );
        assert_eq!(
            sink.lines(),
            vec![
                "Adding collaborator(s):",
                "\tdev@example.com",
                "Deleting collaborator(s):",
                "\tformer@example.com",
            ]
        );
    }

    #[test]
    fn test_addons_inject_database() {
        let backend = seeded();
        let settings = settings();
        Reconciler::new(&backend, &settings)
            .sync_addons(&mut MemorySink::new())
            .unwrap();

        let plans: Vec<String> = backend
            .app_state("demo-staging")
            .unwrap()
            .addons
            .into_iter()
            .map(|a| a.plan)
            .collect();
        assert_eq!(
            plans,
            vec![
                declarative::DEFAULT_DATABASE_ADDON.to_string(),
                "redis:mini".to_string(),
            ]
        );
    }

    #[test]
    fn test_untiered_addon_keeps_installed_plan() {
        let backend = seeded();
        backend.seed("demo-staging", |a| {
            a.addons.push(platform::Addon {
                name: "postgresql-curved-12345".into(),
                plan: "heroku-postgresql:essential-0".into(),
            });
        });
        let mut settings = settings();
        settings.addons = vec![AddonSpec::parse("heroku-postgresql")];

        let changed = Reconciler::new(&backend, &settings)
            .sync_addons(&mut MemorySink::new())
            .unwrap();

        assert_eq!(changed, 0);
        assert!(backend.calls().iter().all(|c| !c.contains("_addon ")));
        let plans: Vec<String> = backend
            .app_state("demo-staging")
            .unwrap()
            .addons
            .into_iter()
            .map(|a| a.plan)
            .collect();
        assert_eq!(plans, vec!["heroku-postgresql:essential-0"]);
    }

    #[test]
    fn test_config_delete_marker_and_equal_values() {
        let backend = seeded();
        let settings = settings();
        let mut sink = MemorySink::new();

        let changed = Reconciler::new(&backend, &settings)
            .sync_config(&mut sink)
            .unwrap();
        assert_eq!(changed, 2);

        let config = backend.app_state("demo-staging").unwrap().config;
        assert_eq!(config.get("RACK_ENV").map(String::as_str), Some("staging"));
        assert!(!config.contains_key("LEGACY"));
        // GONE was never on the remote, so nothing is deleted for it.
        assert!(
            !backend
                .calls()
                .iter()
                .any(|c| c == "delete_config_var demo-staging GONE")
        );

        // Second pass finds nothing to do.
        let again = Reconciler::new(&backend, &settings)
            .sync_config(&mut MemorySink::new())
            .unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn test_domains_and_already_absent_delete() {
        let backend = seeded();
        backend.fail("delete_domain", "demo-staging", 404);
        let settings = settings();

        let changed = Reconciler::new(&backend, &settings)
            .sync_domains(&mut MemorySink::new())
            .unwrap();
        assert_eq!(changed, 2);
        assert!(
            backend
                .app_state("demo-staging")
                .unwrap()
                .domains
                .contains("staging.example.com")
        );
    }

    #[test]
    fn test_remote_error_propagates() {
        let backend = seeded();
        backend.fail("create_domain", "demo-staging", 422);
        let settings = settings();

        let err = Reconciler::new(&backend, &settings)
            .sync_domains(&mut MemorySink::new())
            .unwrap_err();
        assert!(format!("{err:#}").contains("adding domain staging.example.com"));
    }

    #[test]
    fn test_dry_run_makes_no_mutating_calls() {
        let backend = MemoryBackend::new();
        let settings = settings();
        let mut sink = MemorySink::new();
        let reconciler = Reconciler::new(&backend, &settings).dry_run(true);

        assert!(reconciler.create_app(&mut sink).unwrap());
        assert!(backend.app_state("demo-staging").is_none());

        let backend = seeded();
        let reconciler = Reconciler::new(&backend, &settings).dry_run(true);
        for stage in SETUP_ORDER {
            reconciler.setup(stage, &mut sink).unwrap();
        }
        let mutating = ["create_", "delete_", "set_"];
        assert!(
            backend
                .calls()
                .iter()
                .all(|c| !mutating.iter().any(|m| c.starts_with(m)))
        );
        assert!(sink.contains("Migrating demo-staging to the stack"));
        assert!(sink.contains("former@example.com"));
    }

    #[test]
    fn test_create_app_and_stack() {
        let backend = MemoryBackend::new();
        let settings = settings();
        let mut sink = MemorySink::new();
        let reconciler = Reconciler::new(&backend, &settings);

        assert!(reconciler.create_app(&mut sink).unwrap());
        assert!(!reconciler.create_app(&mut sink).unwrap());
        let app = backend.app_state("demo-staging").unwrap().app;
        assert_eq!(app.region.as_deref(), Some("eu"));
        assert!(!reconciler.sync_stack(&mut sink).unwrap());

        backend.seed("demo-staging", |a| a.app.build_stack = Some("heroku-22".into()));
        assert!(reconciler.sync_stack(&mut sink).unwrap());
        assert_eq!(
            backend.app_state("demo-staging").unwrap().app.build_stack.as_deref(),
            Some("heroku-24")
        );
    }

    #[test]
    fn test_scale_applies_clock_last() {
        let backend = MemoryBackend::new().with_app("demo-staging");
        let settings = settings();
        Reconciler::new(&backend, &settings)
            .scale(&mut MemorySink::new())
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![
                "scale demo-staging web=2",
                "scale demo-staging worker=1",
                "scale demo-staging clock=1",
            ]
        );
    }

    #[test]
    fn test_scale_without_configuration_is_a_no_op() {
        let backend = MemoryBackend::new().with_app("demo-staging");
        let mut settings = settings();
        settings.scale = BTreeMap::new();
        let changed = Reconciler::new(&backend, &settings)
            .scale(&mut MemorySink::new())
            .unwrap();
        assert_eq!(changed, 0);
        assert!(backend.calls().is_empty());
    }
}
