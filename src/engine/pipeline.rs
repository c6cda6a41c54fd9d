//! Per-environment deploy pipeline.
//!
//! Stages run in the order of [`DeployStage::ORDER`]. The ref to deploy is
//! selected once for the whole run before fan-out; every other stage runs
//! inside the environment. A failing stage stops the remaining stages of
//! its environment only. The ensure hook always runs.

use anyhow::{Context, Result, bail};
use appconfig::{AppEnvKey, ResolvedAppSettings};
use colored::Colorize;
use platform::Backend;
use std::collections::BTreeMap;
use std::fmt;

use super::executor::EnvOutcome;
use super::hooks::{DeployHooks, HookContext, HookPoint};
use super::sync::Reconciler;
use crate::git::{self, GitRef, PushOutcome};
use crate::output::OutputSink;

/// Migration command run after the code push.
pub const DEFAULT_MIGRATE_COMMAND: &str = "rake db:migrate";

/// Branch on the remote that receives pushes.
pub const DEFAULT_REMOTE_BRANCH: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeployStage {
    SelectRef,
    VerifyAppExists,
    PushCode,
    EnterMaintenance,
    SyncCollaborators,
    SyncAddons,
    SyncDomains,
    SyncConfig,
    RunMigration,
    Scale,
    Restart,
    ExitMaintenance,
}

impl DeployStage {
    pub const ORDER: [Self; 12] = [
        Self::SelectRef,
        Self::VerifyAppExists,
        Self::PushCode,
        Self::EnterMaintenance,
        Self::SyncCollaborators,
        Self::SyncAddons,
        Self::SyncDomains,
        Self::SyncConfig,
        Self::RunMigration,
        Self::Scale,
        Self::Restart,
        Self::ExitMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelectRef => "select ref",
            Self::VerifyAppExists => "verify app",
            Self::PushCode => "push code",
            Self::EnterMaintenance => "enter maintenance",
            Self::SyncCollaborators => "sync collaborators",
            Self::SyncAddons => "sync addons",
            Self::SyncDomains => "sync domains",
            Self::SyncConfig => "sync config",
            Self::RunMigration => "run migration",
            Self::Scale => "scale",
            Self::Restart => "restart",
            Self::ExitMaintenance => "exit maintenance",
        }
    }

    /// Whether the app is in maintenance mode once this stage is reached.
    fn in_maintenance(self) -> bool {
        self > Self::EnterMaintenance && self <= Self::ExitMaintenance
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pushes code to a remote app.
pub trait CodePusher: Send + Sync {
    fn push(
        &self,
        git_url: &str,
        git_ref: &GitRef,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<PushOutcome>;
}

/// Pushes with the `git` binary.
pub struct GitPusher {
    pub remote_branch: String,
}

impl CodePusher for GitPusher {
    fn push(
        &self,
        git_url: &str,
        git_ref: &GitRef,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<PushOutcome> {
        git::push(git_url, git_ref, &self.remote_branch, on_line)
    }
}

/// Deploy settings shared by every environment.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// `None` skips the migration stage
    pub migrate_command: Option<String>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            migrate_command: Some(DEFAULT_MIGRATE_COMMAND.to_string()),
        }
    }
}

/// One environment's deploy attempt.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub key: AppEnvKey,
    pub remote_name: String,
    pub git_ref: GitRef,
    pub config: BTreeMap<String, String>,
    /// Last stage entered
    pub stage: DeployStage,
    /// Every stage ran
    pub continued: bool,
    pub interrupted: bool,
    pub error: Option<String>,
    git_url: Option<String>,
}

impl PipelineRun {
    fn new(settings: &ResolvedAppSettings, git_ref: GitRef) -> Self {
        Self {
            key: settings.key.clone(),
            remote_name: settings.remote_name.clone(),
            git_ref,
            config: settings.config.clone(),
            stage: DeployStage::SelectRef,
            continued: false,
            interrupted: false,
            error: None,
            git_url: None,
        }
    }

    pub fn outcome(&self) -> EnvOutcome {
        if let Some(error) = &self.error {
            EnvOutcome::Failed(error.clone())
        } else if self.interrupted {
            EnvOutcome::Interrupted
        } else {
            EnvOutcome::Completed
        }
    }

    fn hook_context(&self) -> HookContext<'_> {
        HookContext {
            key: &self.key,
            remote_name: &self.remote_name,
            config: &self.config,
        }
    }

    /// Keep the first error; later ones are only logged.
    fn record(&mut self, error: &anyhow::Error) {
        if self.error.is_none() {
            self.error = Some(format!("{error:#}"));
        } else {
            log::warn!("{}: {error:#}", self.key);
        }
    }
}

enum Flow {
    Continue,
    Interrupted,
}

/// Drives one environment through the deploy stages.
pub struct Pipeline<'a> {
    pub git_ref: &'a GitRef,
    pub pusher: &'a dyn CodePusher,
    pub hooks: &'a dyn DeployHooks,
    pub options: &'a DeployOptions,
}

impl Pipeline<'_> {
    pub fn run(
        &self,
        settings: &ResolvedAppSettings,
        backend: &dyn Backend,
        sink: &mut dyn OutputSink,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(settings, self.git_ref.clone());
        sink.line(&format!(
            "Deploying {} to {}...",
            self.git_ref,
            settings.remote_name.green()
        ));

        match self.hook(HookPoint::BeforeEachDeploy, &run, sink) {
            Ok(()) => {
                if let Err(e) = self.stages(&mut run, settings, backend, sink) {
                    sink.line(&format!(
                        "Deploy of {} stopped at stage {}",
                        settings.remote_name.yellow(),
                        run.stage
                    ));
                    run.record(&e);
                }
            }
            Err(e) => run.record(&e),
        }

        if !run.continued && run.stage.in_maintenance() {
            sink.line(&format!(
                "{} {} was left in maintenance mode",
                "⚠".yellow(),
                settings.remote_name
            ));
        }

        let ensure = self.hook(HookPoint::EnsureEachDeploy, &run, sink);
        if let Err(e) = ensure {
            run.record(&e);
        }

        if run.continued {
            let after = self.hook(HookPoint::AfterEachDeploy, &run, sink);
            if let Err(e) = after {
                run.record(&e);
            }
        }

        run
    }

    fn hook(&self, point: HookPoint, run: &PipelineRun, sink: &mut dyn OutputSink) -> Result<()> {
        self.hooks.per_env(point, &run.hook_context(), sink)
    }

    fn stages(
        &self,
        run: &mut PipelineRun,
        settings: &ResolvedAppSettings,
        backend: &dyn Backend,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        let reconciler = Reconciler::new(backend, settings);

        // The ref was selected before fan-out.
        for stage in DeployStage::ORDER.into_iter().skip(1) {
            run.stage = stage;
            log::debug!("{}: {stage}", run.key);

            if let Flow::Interrupted = self.stage(stage, run, &reconciler, sink)? {
                run.interrupted = true;
                return Ok(());
            }
        }

        run.continued = true;
        Ok(())
    }

    fn stage(
        &self,
        stage: DeployStage,
        run: &mut PipelineRun,
        reconciler: &Reconciler<'_>,
        sink: &mut dyn OutputSink,
    ) -> Result<Flow> {
        match stage {
            DeployStage::SelectRef => {}
            DeployStage::VerifyAppExists => {
                let app = reconciler
                    .backend()
                    .get_app(&run.remote_name)
                    .with_context(|| {
                        format!(
                            "app {} is not reachable; run `hoist setup app` first",
                            run.remote_name
                        )
                    })?;
                run.git_url = Some(app.git_url);
            }
            DeployStage::PushCode => {
                let Some(url) = run.git_url.as_deref() else {
                    bail!("no git URL known for {}", run.remote_name);
                };
                log::info!("{}: pushing {}", run.key, run.git_ref.name());
                match self.pusher.push(url, &run.git_ref, &mut |line| sink.line(line))? {
                    PushOutcome::Success => {}
                    PushOutcome::Interrupted => return Ok(Flow::Interrupted),
                    PushOutcome::Failed(Some(code)) => bail!("git push exited with status {code}"),
                    PushOutcome::Failed(None) => bail!("git push was terminated"),
                }
            }
            DeployStage::EnterMaintenance => reconciler.set_maintenance(true, sink)?,
            DeployStage::SyncCollaborators => {
                reconciler.sync_collaborators(sink)?;
            }
            DeployStage::SyncAddons => {
                reconciler.sync_addons(sink)?;
            }
            DeployStage::SyncDomains => {
                reconciler.sync_domains(sink)?;
            }
            DeployStage::SyncConfig => {
                reconciler.sync_config(sink)?;
            }
            DeployStage::RunMigration => {
                if let Some(command) = &self.options.migrate_command {
                    reconciler.run_command(command, sink)?;
                }
            }
            DeployStage::Scale => {
                reconciler.scale(sink)?;
            }
            DeployStage::Restart => reconciler.restart(sink)?,
            DeployStage::ExitMaintenance => reconciler.set_maintenance(false, sink)?,
        }
        Ok(Flow::Continue)
    }
}
