//! In-process backend.
//!
//! Holds remote state in memory and records every call in order, so tests
//! can assert on both the resulting state and the sequence of operations.
//! Failures can be injected per operation and app.

use crate::backend::{Backend, not_found};
use crate::error::{Error, Result};
use crate::types::{Addon, App, Dyno, Formation, LogOptions, NewApp};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Matches every app when injecting failures.
pub const ANY_APP: &str = "*";

/// Observable state of one app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryApp {
    pub app: App,
    pub addons: Vec<Addon>,
    pub collaborators: BTreeSet<String>,
    pub domains: BTreeSet<String>,
    pub config: BTreeMap<String, String>,
    pub formation: BTreeMap<String, u32>,
    pub restarts: u32,
    pub commands: Vec<String>,
    pub log_lines: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    apps: BTreeMap<String, MemoryApp>,
    calls: Vec<String>,
    failures: BTreeMap<(String, String), u16>,
}

/// Shared in-memory backend. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryBackend::add_app`].
    pub fn with_app(self, name: &str) -> Self {
        self.add_app(name);
        self
    }

    /// Create an empty app without recording a call.
    pub fn add_app(&self, name: &str) {
        self.lock()
            .apps
            .insert(name.to_string(), fresh_app(name, None, None));
    }

    /// Mutate an app's state directly, without recording a call.
    pub fn seed(&self, name: &str, f: impl FnOnce(&mut MemoryApp)) {
        let mut state = self.lock();
        let entry = state
            .apps
            .entry(name.to_string())
            .or_insert_with(|| fresh_app(name, None, None));
        f(entry);
    }

    /// Make `op` fail with `status` for `app` (or [`ANY_APP`]).
    pub fn fail(&self, op: &str, app: &str, status: u16) {
        self.lock()
            .failures
            .insert((op.to_string(), app.to_string()), status);
    }

    /// Every call made so far, as `op app [detail]`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls that targeted `app`.
    pub fn calls_for(&self, app: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').nth(1) == Some(app))
            .cloned()
            .collect()
    }

    /// Snapshot of an app's state.
    pub fn app_state(&self, name: &str) -> Option<MemoryApp> {
        self.lock().apps.get(name).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(
        &self,
        op: &str,
        app: &str,
        detail: &str,
        f: impl FnOnce(&mut MemoryApp) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.lock();
        record(&mut state, op, app, detail)?;
        let entry = state
            .apps
            .get_mut(app)
            .ok_or_else(|| not_found("app", app))?;
        f(entry)
    }
}

fn fresh_app(name: &str, region: Option<String>, stack: Option<String>) -> MemoryApp {
    MemoryApp {
        app: App {
            name: name.to_string(),
            git_url: format!("https://git.heroku.com/{name}.git"),
            web_url: Some(format!("https://{name}.herokuapp.com/")),
            stack: stack.clone(),
            build_stack: stack,
            region,
            ..App::default()
        },
        ..MemoryApp::default()
    }
}

fn record(state: &mut State, op: &str, app: &str, detail: &str) -> Result<()> {
    let call: Vec<&str> = [op, app, detail]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    state.calls.push(call.join(" "));

    let status = state
        .failures
        .get(&(op.to_string(), app.to_string()))
        .or_else(|| state.failures.get(&(op.to_string(), ANY_APP.to_string())));
    match status {
        Some(&status) => Err(Error::Api {
            status,
            id: None,
            message: format!("injected failure for {op}"),
        }),
        None => Ok(()),
    }
}

impl Backend for MemoryBackend {
    fn list_apps(&self) -> Result<Vec<App>> {
        let mut state = self.lock();
        record(&mut state, "list_apps", "", "")?;
        Ok(state.apps.values().map(|a| a.app.clone()).collect())
    }

    fn create_app(&self, app: &NewApp) -> Result<App> {
        let mut state = self.lock();
        record(&mut state, "create_app", &app.name, "")?;
        if state.apps.contains_key(&app.name) {
            return Err(Error::Api {
                status: 422,
                id: Some("invalid_params".into()),
                message: "Name is already taken.".into(),
            });
        }
        let created = fresh_app(&app.name, app.region.clone(), app.stack.clone());
        let result = created.app.clone();
        state.apps.insert(app.name.clone(), created);
        Ok(result)
    }

    fn get_app(&self, app: &str) -> Result<App> {
        self.mutate("get_app", app, "", |a| Ok(a.app.clone()))
    }

    fn set_stack(&self, app: &str, stack: &str) -> Result<()> {
        self.mutate("set_stack", app, stack, |a| {
            a.app.build_stack = Some(stack.to_string());
            Ok(())
        })
    }

    fn set_maintenance(&self, app: &str, enabled: bool) -> Result<()> {
        let detail = if enabled { "on" } else { "off" };
        self.mutate("set_maintenance", app, detail, |a| {
            a.app.maintenance = enabled;
            Ok(())
        })
    }

    fn list_addons(&self, app: &str) -> Result<Vec<Addon>> {
        self.mutate("list_addons", app, "", |a| Ok(a.addons.clone()))
    }

    fn create_addon(&self, app: &str, plan: &str) -> Result<()> {
        self.mutate("create_addon", app, plan, |a| {
            if !a.addons.iter().any(|x| x.plan == plan) {
                let service = plan.split(':').next().unwrap_or(plan);
                a.addons.push(Addon {
                    name: format!("{service}-{}", a.addons.len() + 1),
                    plan: plan.to_string(),
                });
            }
            Ok(())
        })
    }

    fn delete_addon(&self, app: &str, plan: &str) -> Result<()> {
        self.mutate("delete_addon", app, plan, |a| {
            let before = a.addons.len();
            a.addons.retain(|x| x.plan != plan && x.name != plan);
            if a.addons.len() == before {
                return Err(not_found("addon", plan));
            }
            Ok(())
        })
    }

    fn list_collaborators(&self, app: &str) -> Result<Vec<String>> {
        self.mutate("list_collaborators", app, "", |a| {
            Ok(a.collaborators.iter().cloned().collect())
        })
    }

    fn create_collaborator(&self, app: &str, email: &str) -> Result<()> {
        self.mutate("create_collaborator", app, email, |a| {
            a.collaborators.insert(email.to_string());
            Ok(())
        })
    }

    fn delete_collaborator(&self, app: &str, email: &str) -> Result<()> {
        self.mutate("delete_collaborator", app, email, |a| {
            if a.collaborators.remove(email) {
                Ok(())
            } else {
                Err(not_found("collaborator", email))
            }
        })
    }

    fn list_domains(&self, app: &str) -> Result<Vec<String>> {
        self.mutate("list_domains", app, "", |a| {
            Ok(a.domains.iter().cloned().collect())
        })
    }

    fn create_domain(&self, app: &str, hostname: &str) -> Result<()> {
        self.mutate("create_domain", app, hostname, |a| {
            a.domains.insert(hostname.to_string());
            Ok(())
        })
    }

    fn delete_domain(&self, app: &str, hostname: &str) -> Result<()> {
        self.mutate("delete_domain", app, hostname, |a| {
            if a.domains.remove(hostname) {
                Ok(())
            } else {
                Err(not_found("domain", hostname))
            }
        })
    }

    fn config_vars(&self, app: &str) -> Result<BTreeMap<String, String>> {
        self.mutate("config_vars", app, "", |a| Ok(a.config.clone()))
    }

    fn set_config_vars(&self, app: &str, vars: &BTreeMap<String, String>) -> Result<()> {
        let keys: Vec<&str> = vars.keys().map(String::as_str).collect();
        self.mutate("set_config_vars", app, &keys.join(","), |a| {
            a.config
                .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        })
    }

    fn delete_config_var(&self, app: &str, key: &str) -> Result<()> {
        self.mutate("delete_config_var", app, key, |a| {
            a.config.remove(key);
            Ok(())
        })
    }

    fn formation(&self, app: &str) -> Result<Vec<Formation>> {
        self.mutate("formation", app, "", |a| {
            Ok(a.formation
                .iter()
                .map(|(process_type, &quantity)| Formation {
                    process_type: process_type.clone(),
                    quantity,
                    size: None,
                })
                .collect())
        })
    }

    fn scale(&self, app: &str, process_type: &str, quantity: u32) -> Result<()> {
        let detail = format!("{process_type}={quantity}");
        self.mutate("scale", app, &detail, |a| {
            a.formation.insert(process_type.to_string(), quantity);
            Ok(())
        })
    }

    fn restart(&self, app: &str) -> Result<()> {
        self.mutate("restart", app, "", |a| {
            a.restarts += 1;
            Ok(())
        })
    }

    fn run_command(&self, app: &str, command: &str) -> Result<Dyno> {
        self.mutate("run_command", app, command, |a| {
            a.commands.push(command.to_string());
            Ok(Dyno {
                name: format!("run.{}", a.commands.len()),
                command: command.to_string(),
                state: Some("starting".into()),
            })
        })
    }

    fn stream_logs(
        &self,
        app: &str,
        options: &LogOptions,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<()> {
        let lines = self.mutate("stream_logs", app, "", |a| Ok(a.log_lines.clone()))?;
        let skip = options
            .lines
            .map_or(0, |n| lines.len().saturating_sub(n as usize));
        for line in &lines[skip..] {
            on_line(line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get_app() {
        let backend = MemoryBackend::new();
        let created = backend
            .create_app(&NewApp {
                name: "demo".into(),
                region: Some("eu".into()),
                stack: Some("heroku-24".into()),
            })
            .unwrap();
        assert_eq!(created.git_url, "https://git.heroku.com/demo.git");

        let app = backend.get_app("demo").unwrap();
        assert_eq!(app.region.as_deref(), Some("eu"));
        assert!(backend.app_exists("demo").unwrap());
        assert!(!backend.app_exists("missing").unwrap());

        let err = backend.create_app(&NewApp {
            name: "demo".into(),
            ..NewApp::default()
        });
        assert_eq!(err.unwrap_err().status(), Some(422));
    }

    #[test]
    fn test_unknown_app_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.restart("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_absent_resource_is_not_found() {
        let backend = MemoryBackend::new().with_app("demo");
        assert!(backend.delete_domain("demo", "www.example.com").unwrap_err().is_not_found());
        assert!(backend.delete_addon("demo", "redis:mini").unwrap_err().is_not_found());

        backend.create_addon("demo", "redis:mini").unwrap();
        backend.delete_addon("demo", "redis:mini").unwrap();
        assert!(backend.app_state("demo").unwrap().addons.is_empty());
    }

    #[test]
    fn test_calls_are_recorded_in_order() {
        let backend = MemoryBackend::new().with_app("a").with_app("b");
        backend.scale("a", "web", 2).unwrap();
        backend.restart("b").unwrap();
        backend.scale("a", "clock", 1).unwrap();

        assert_eq!(
            backend.calls(),
            vec!["scale a web=2", "restart b", "scale a clock=1"]
        );
        assert_eq!(backend.calls_for("a"), vec!["scale a web=2", "scale a clock=1"]);
    }

    #[test]
    fn test_injected_failure() {
        let backend = MemoryBackend::new().with_app("a").with_app("b");
        backend.fail("restart", "a", 503);

        let err = backend.restart("a").unwrap_err();
        assert_eq!(err.status(), Some(503));
        backend.restart("b").unwrap();

        backend.fail("scale", ANY_APP, 500);
        assert!(backend.scale("b", "web", 1).is_err());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let backend = MemoryBackend::new();
        backend.seed("demo", |a| {
            a.collaborators.insert("dev@example.com".into());
            a.config.insert("RACK_ENV".into(), "staging".into());
            a.formation.insert("web".into(), 2);
            a.app.build_stack = Some("heroku-24".into());
        });
        backend.create_addon("demo", "heroku-postgresql:essential-0").unwrap();

        let snapshot = backend.snapshot("demo").unwrap();
        assert!(snapshot.addons.contains("heroku-postgresql:essential-0"));
        assert!(snapshot.collaborators.contains("dev@example.com"));
        assert_eq!(snapshot.config_vars["RACK_ENV"], "staging");
        assert_eq!(snapshot.formation["web"], 2);
        assert_eq!(snapshot.stack.as_deref(), Some("heroku-24"));
    }

    #[test]
    fn test_stream_logs_respects_line_count() {
        let backend = MemoryBackend::new();
        backend.seed("demo", |a| {
            a.log_lines = vec!["one".into(), "two".into(), "three".into()];
        });

        let mut seen = Vec::new();
        let options = LogOptions {
            tail: false,
            lines: Some(2),
            dyno: None,
        };
        backend
            .stream_logs("demo", &options, &mut |line| seen.push(line.to_string()))
            .unwrap();
        assert_eq!(seen, vec!["two", "three"]);
    }
}
