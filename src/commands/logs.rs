//! `hoist logs` and `hoist console`, which work on one environment at a time.

use anyhow::{Context as AnyhowContext, Result, bail};
use appconfig::ResolvedAppSettings;
use platform::{Backend, LogOptions};

use super::{HerokuFactory, load_config};
use crate::Context;
use crate::cli::LogsArgs;
use crate::{runner, selector};

/// Resolve the single selected environment.
fn single_settings(ctx: &Context, command: &'static str) -> Result<ResolvedAppSettings> {
    let config = load_config(ctx)?;
    let selections = selector::parse_all(&ctx.selections)?;
    let keys = selector::resolve(&config, &selections)?;
    let key = selector::single(keys, command)?;
    Ok(config.resolve(&key)?)
}

pub fn logs(ctx: &Context, args: LogsArgs) -> Result<()> {
    let settings = single_settings(ctx, "logs")?;
    let backend = HerokuFactory::from_env()?.backend();
    let options = LogOptions {
        tail: !args.no_tail,
        lines: Some(args.lines),
        dyno: args.dyno,
    };
    stream(&backend, &settings.remote_name, &options, &mut |line| {
        println!("{line}");
    })
}

pub fn stream(
    backend: &dyn Backend,
    remote: &str,
    options: &LogOptions,
    on_line: &mut dyn FnMut(&str),
) -> Result<()> {
    log::debug!("streaming logs of {remote} ({options:?})");
    backend
        .stream_logs(remote, options, on_line)
        .with_context(|| format!("streaming logs of {remote}"))
}

pub fn console(ctx: &Context) -> Result<()> {
    let settings = single_settings(ctx, "console")?;
    if !runner::command_exists("heroku") {
        bail!("The heroku CLI is required for `hoist console`");
    }

    let status = runner::run(
        "heroku",
        &["run", "console", "--app", &settings.remote_name],
    )?;
    if !status.success() {
        bail!("console exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::*;
    use crate::selector::SelectionError;
    use platform::MemoryBackend;
    use tempfile::TempDir;

    #[test]
    fn test_logs_refuse_several_environments() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), FLEET);

        let err = single_settings(&context(dir.path(), &["all"]), "logs").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SelectionError>(),
            Some(SelectionError::TooMany { command: "logs", count: 2 })
        ));

        let one = single_settings(&context(dir.path(), &["api:staging"]), "logs").unwrap();
        assert_eq!(one.remote_name, "api-staging");
    }

    #[test]
    fn test_stream_honors_line_count() {
        let backend = MemoryBackend::new();
        backend.seed("demo-staging", |a| {
            a.log_lines = (1..=5).map(|i| format!("line {i}")).collect();
        });

        let mut seen = Vec::new();
        let options = LogOptions {
            tail: false,
            lines: Some(2),
            dyno: None,
        };
        stream(&backend, "demo-staging", &options, &mut |line| {
            seen.push(line.to_string());
        })
        .unwrap();
        assert_eq!(seen, vec!["line 4", "line 5"]);
    }
}
