//! Deploy hooks.
//!
//! Hooks are shell commands declared under the `hooks` config category:
//!
//! ```yaml
//! hooks:
//!   before_deploy: ./script/notify "deploy starting"
//!   after_each_deploy: ./script/smoke-test
//! ```
//!
//! Run-wide hooks come from the global layer only. Per-environment hooks
//! cascade like config variables and receive the environment in
//! `HOIST_APP_ENV`, `HOIST_REMOTE_NAME` and `HOIST_CONFIG` (JSON).

use anyhow::{Context, Result, bail};
use appconfig::{AppEnvKey, LayeredConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::output::OutputSink;
use crate::runner;

/// Points in a deploy where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HookPoint {
    /// Once, before any environment starts
    BeforeDeploy,
    /// Per environment, before its stages
    BeforeEachDeploy,
    /// Per environment, only when every stage ran
    AfterEachDeploy,
    /// Per environment, always
    EnsureEachDeploy,
    /// Once, after every environment finished
    AfterDeploy,
}

impl HookPoint {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeforeDeploy => "before_deploy",
            Self::BeforeEachDeploy => "before_each_deploy",
            Self::AfterEachDeploy => "after_each_deploy",
            Self::EnsureEachDeploy => "ensure_each_deploy",
            Self::AfterDeploy => "after_deploy",
        }
    }
}

/// What a per-environment hook knows about its environment.
#[derive(Debug, Clone, Serialize)]
pub struct HookContext<'a> {
    pub key: &'a AppEnvKey,
    pub remote_name: &'a str,
    pub config: &'a BTreeMap<String, String>,
}

/// Hook runner used by the deploy pipeline.
pub trait DeployHooks: Send + Sync {
    fn run_wide(&self, point: HookPoint, sink: &mut dyn OutputSink) -> Result<()>;

    fn per_env(
        &self,
        point: HookPoint,
        ctx: &HookContext<'_>,
        sink: &mut dyn OutputSink,
    ) -> Result<()>;
}

/// Hooks that do nothing.
#[cfg(test)]
pub struct NoHooks;

#[cfg(test)]
impl DeployHooks for NoHooks {
    fn run_wide(&self, _point: HookPoint, _sink: &mut dyn OutputSink) -> Result<()> {
        Ok(())
    }

    fn per_env(
        &self,
        _point: HookPoint,
        _ctx: &HookContext<'_>,
        _sink: &mut dyn OutputSink,
    ) -> Result<()> {
        Ok(())
    }
}

/// Hooks run with `sh -c` from the configuration root.
pub struct ShellHooks {
    root: PathBuf,
    global: BTreeMap<String, String>,
    per_env: BTreeMap<AppEnvKey, BTreeMap<String, String>>,
}

impl ShellHooks {
    /// Resolve hook commands for `keys` up front.
    pub fn load(
        config: &LayeredConfig,
        keys: &[AppEnvKey],
        root: &Path,
    ) -> appconfig::Result<Self> {
        let mut per_env = BTreeMap::new();
        for key in keys {
            per_env.insert(key.clone(), config.hooks(key)?);
        }
        Ok(Self {
            root: root.to_path_buf(),
            global: config.global_hooks()?,
            per_env,
        })
    }

    fn run(
        &self,
        point: HookPoint,
        command: &str,
        env: &[(&str, String)],
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        sink.line(&format!("Running {} hook: {command}", point.name()));

        let mut shell = Command::new("sh");
        // Hook stdout is folded into stderr so both reach the sink.
        shell
            .arg("-c")
            .arg(format!("exec 1>&2\n{command}"))
            .current_dir(&self.root)
            .env("HOIST_HOOK", point.name());
        for (name, value) in env {
            shell.env(name, value);
        }

        let status = runner::run_streaming(&mut shell, &mut |line| sink.line(line))
            .with_context(|| format!("running {} hook", point.name()))?;
        if !status.success() {
            bail!("{} hook failed ({status})", point.name());
        }
        Ok(())
    }
}

impl DeployHooks for ShellHooks {
    fn run_wide(&self, point: HookPoint, sink: &mut dyn OutputSink) -> Result<()> {
        match self.global.get(point.name()) {
            Some(command) => self.run(point, command, &[], sink),
            None => Ok(()),
        }
    }

    fn per_env(
        &self,
        point: HookPoint,
        ctx: &HookContext<'_>,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        let Some(command) = self
            .per_env
            .get(ctx.key)
            .and_then(|hooks| hooks.get(point.name()))
        else {
            return Ok(());
        };

        let env = [
            ("HOIST_APP_ENV", ctx.key.to_string()),
            ("HOIST_REMOTE_NAME", ctx.remote_name.to_string()),
            (
                "HOIST_CONFIG",
                serde_json::to_string(ctx.config).context("encoding hook config")?,
            ),
        ];
        self.run(point, command, &env, sink)
    }
}
