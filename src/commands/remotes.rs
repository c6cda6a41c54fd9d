//! `hoist remotes` and `hoist envs`: local views of the configuration.

use anyhow::{Context as AnyhowContext, Result};
use appconfig::{AppEnvKey, LayeredConfig};
use colored::Colorize;
use platform::HerokuBackend;

use super::{load_config, select};
use crate::Context;
use crate::git;
use crate::selector::EnvClass;
use crate::ui;

/// Add a git remote per environment: the selected ones, or all when none
/// is selected.
pub fn remotes(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;
    let keys = if ctx.selections.is_empty() {
        config.keys(None)
    } else {
        select(ctx, &config)?
    };

    for (name, url) in remote_plan(&config, &keys)? {
        let added = git::add_remote(&name, &url)
            .with_context(|| format!("Failed to add git remote {name}"))?;
        if added {
            ui::success(&format!("Added remote {} -> {url}", name.green()));
        } else if !ctx.quiet {
            ui::dim(&format!("Remote {name} already exists"));
        }
    }
    Ok(())
}

/// Remote name and git URL per key. The Heroku app name doubles as the
/// git remote name.
pub fn remote_plan(config: &LayeredConfig, keys: &[AppEnvKey]) -> Result<Vec<(String, String)>> {
    keys.iter()
        .map(|key| {
            let remote = config.remote_name(key)?;
            let url = HerokuBackend::git_url_for(&remote);
            Ok((remote, url))
        })
        .collect()
}

pub fn envs(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;
    if !ctx.quiet {
        ui::header("App environments");
    }
    for line in env_lines(&config)? {
        println!("{line}");
    }
    Ok(())
}

/// `key  remote  class` rows, keys padded to a common width.
pub fn env_lines(config: &LayeredConfig) -> Result<Vec<String>> {
    let keys = config.keys(None);
    let width = keys.iter().map(|k| k.to_string().len()).max().unwrap_or(0);

    keys.iter()
        .map(|key| {
            let remote = config.remote_name(key)?;
            let class = match EnvClass::of(key.env()) {
                EnvClass::Production => EnvClass::Production.to_string().red().to_string(),
                EnvClass::Staging => EnvClass::Staging.to_string().yellow().to_string(),
                EnvClass::Other => EnvClass::Other.to_string().dimmed().to_string(),
            };
            Ok(format!("  {:<width$}  {remote}  {class}", key.to_string()))
        })
        .collect()
}
