//! `hoist deploy`: push code to the selected environments and converge them.

use anyhow::{Context as AnyhowContext, Result, bail};
use appconfig::{AppEnvKey, ResolvedAppSettings};

use super::{HerokuFactory, keys_of, selected_settings, settings_for};
use crate::Context;
use crate::cli::DeployArgs;
use crate::engine::hooks::{DeployHooks, HookPoint, ShellHooks};
use crate::engine::pipeline::{DeployOptions, GitPusher, Pipeline};
use crate::engine::{Executor, RunReport};
use crate::git::{self, GitRef};
use crate::output::{LabeledSink, OutputSink};
use crate::{interrupt, prompts, selector, ui};

pub fn run(ctx: &Context, args: DeployArgs) -> Result<()> {
    let (config, settings) = selected_settings(ctx)?;
    let keys = keys_of(&settings);
    let hooks = ShellHooks::load(&config, &keys, &ctx.root)?;
    let factory = HerokuFactory::from_env()?;

    let git_ref = select_ref(&keys, args.tag)?;
    if !ctx.quiet {
        ui::info(&format!("Deploying {git_ref} to {} environment(s)", keys.len()));
    }

    let options = DeployOptions {
        migrate_command: (!args.no_migrate).then_some(args.migrate),
    };
    let pusher = GitPusher {
        remote_branch: args.remote_branch,
    };

    let _guard = interrupt::install();
    let pipeline = Pipeline {
        git_ref: &git_ref,
        pusher: &pusher,
        hooks: &hooks,
        options: &options,
    };

    let mut sink = LabeledSink::new("deploy", keys.len());
    let report = deploy(
        &Executor::new(ctx.jobs, &factory),
        &settings,
        &pipeline,
        &hooks,
        &mut sink,
    )?;
    if interrupt::interrupted() {
        ui::warn("Interrupted; environments whose push was cut short skipped their remaining stages");
    }
    report.finish("deploy")
}

/// Pick what to deploy, once for the whole run.
///
/// `--tag` wins. Production environments prompt for a tag; everything else
/// deploys the current branch.
pub fn select_ref(keys: &[AppEnvKey], tag: Option<String>) -> Result<GitRef> {
    if let Some(tag) = tag {
        return Ok(GitRef::Tag(tag));
    }

    if keys.iter().any(selector::is_production) {
        let tags = git::tags().context("Failed to list git tags")?;
        let default = git::latest_tag();
        return prompts::tag_to_deploy(&tags, default.as_deref()).map(GitRef::Tag);
    }

    match git::current_branch().context("Failed to read the current branch")? {
        Some(branch) => Ok(GitRef::Branch(branch)),
        None => bail!("HEAD is detached; check out a branch or pass --tag"),
    }
}

/// Run the pipeline for every environment between the run-wide hooks.
///
/// A failing `before_deploy` hook aborts before any environment starts.
pub fn deploy(
    executor: &Executor<'_>,
    settings: &[ResolvedAppSettings],
    pipeline: &Pipeline<'_>,
    hooks: &dyn DeployHooks,
    sink: &mut dyn OutputSink,
) -> Result<RunReport> {
    hooks.run_wide(HookPoint::BeforeDeploy, sink)?;

    let report = executor.for_each(&keys_of(settings), |key, backend, sink| {
        let settings = settings_for(settings, key)?;
        Ok(pipeline.run(settings, backend, sink).outcome())
    })?;

    hooks.run_wide(HookPoint::AfterDeploy, sink)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::*;
    use crate::engine::EnvOutcome;
    use crate::engine::hooks::NoHooks;
    use crate::engine::pipeline::CodePusher;
    use crate::git::PushOutcome;
    use crate::output::MemorySink;
    use platform::MemoryBackend;
    use tempfile::TempDir;

    struct RejectingPusher(&'static str);

    impl CodePusher for RejectingPusher {
        fn push(
            &self,
            git_url: &str,
            _git_ref: &GitRef,
            on_line: &mut dyn FnMut(&str),
        ) -> Result<PushOutcome> {
            if git_url.contains(self.0) {
                on_line("! [remote rejected] main -> main (pre-receive hook declined)");
                return Ok(PushOutcome::Failed(Some(1)));
            }
            Ok(PushOutcome::Success)
        }
    }

    const HOOKED: &str = r"
apps:
  demo:
    staging: demo-staging
  api:
    staging: api-staging
hooks:
  before_deploy: echo fleet-start
  after_deploy: echo fleet-done
";

    #[test]
    fn test_explicit_tag_wins() {
        let keys = vec![AppEnvKey::new("demo", "production")];
        assert_eq!(
            select_ref(&keys, Some("v2.0.0".into())).unwrap(),
            GitRef::Tag("v2.0.0".into())
        );
    }

    #[test]
    fn test_deploy_runs_wide_hooks_around_environments() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), HOOKED);
        let ctx = context(dir.path(), &["all"]);
        let (config, settings) = selected_settings(&ctx).unwrap();
        let hooks = ShellHooks::load(&config, &keys_of(&settings), dir.path()).unwrap();

        let backend = MemoryBackend::new()
            .with_app("demo-staging")
            .with_app("api-staging");
        let factory = memory_factory(&backend);
        let env_sink = MemorySink::new();
        let mut wide_sink = MemorySink::new();

        let git_ref = GitRef::Branch("main".into());
        let options = DeployOptions {
            migrate_command: None,
        };
        let pusher = RejectingPusher("api-staging");
        let pipeline = Pipeline {
            git_ref: &git_ref,
            pusher: &pusher,
            hooks: &hooks,
            options: &options,
        };

        let report = deploy(
            &executor(&factory, &env_sink),
            &settings,
            &pipeline,
            &hooks,
            &mut wide_sink,
        )
        .unwrap();

        assert_eq!(report.completed(), 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.envs[1].outcome, EnvOutcome::Failed(_)));
        assert!(env_sink.contains("pre-receive hook declined"));
        assert_eq!(backend.app_state("demo-staging").unwrap().restarts, 1);
        assert_eq!(backend.app_state("api-staging").unwrap().restarts, 0);

        let wide = wide_sink.lines();
        assert!(wide.iter().any(|l| l == "fleet-start"));
        assert_eq!(wide.last().map(String::as_str), Some("fleet-done"));
    }

    #[test]
    fn test_failing_before_deploy_hook_aborts_the_run() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "apps:\n  demo:\n    staging: demo-staging\nhooks:\n  before_deploy: exit 1\n",
        );
        let ctx = context(dir.path(), &[]);
        let (config, settings) = selected_settings(&ctx).unwrap();
        let hooks = ShellHooks::load(&config, &keys_of(&settings), dir.path()).unwrap();

        let backend = MemoryBackend::new().with_app("demo-staging");
        let factory = memory_factory(&backend);
        let git_ref = GitRef::Branch("main".into());
        let options = DeployOptions::default();
        let pusher = RejectingPusher("nothing");
        let pipeline = Pipeline {
            git_ref: &git_ref,
            pusher: &pusher,
            hooks: &NoHooks,
            options: &options,
        };

        let err = deploy(
            &executor(&factory, &MemorySink::new()),
            &settings,
            &pipeline,
            &hooks,
            &mut MemorySink::new(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("before_deploy hook failed"));
        assert!(backend.calls().is_empty());
    }
}
