mod cli;
mod commands;
mod engine;
mod git;
mod interrupt;
mod output;
mod prompts;
mod runner;
mod selector;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Project root holding the config directory
    pub root: PathBuf,
    pub jobs: usize,
    /// Raw `-s` arguments
    pub selections: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        root: cli.root,
        jobs: cli.jobs,
        selections: cli.select,
    };

    if let Err(e) = run(&ctx, cli.command) {
        report(&e);
        std::process::exit(1);
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    log::debug!(
        "root {} with {} job(s), verbosity {}",
        ctx.root.display(),
        ctx.jobs,
        ctx.verbose
    );

    match command {
        Command::Setup(args) => commands::setup::run(ctx, &args),
        Command::Deploy(args) => commands::deploy::run(ctx, args),
        Command::Restart => commands::ops::restart(ctx),
        Command::Scale => commands::ops::scale(ctx),
        Command::Maintenance { state } => commands::ops::maintenance(ctx, state.enabled()),
        Command::Info => commands::info::info(ctx),
        Command::Apps => commands::info::apps(ctx),
        Command::Logs(args) => commands::logs::logs(ctx, args),
        Command::Console => commands::logs::console(ctx),
        Command::Exec { command } => commands::ops::exec(ctx, &command),
        Command::Db(cmd) => commands::ops::db(ctx, cmd),
        Command::Remotes => commands::remotes::remotes(ctx),
        Command::Envs => commands::remotes::envs(ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "hoist", &mut io::stdout());
            Ok(())
        }
    }
}

/// Print the error with whatever guidance its type carries.
fn report(e: &anyhow::Error) {
    ui::error(&format!("{e:#}"));

    if let Some(selection) = e.downcast_ref::<selector::SelectionError>() {
        eprintln!();
        eprintln!("{}", selection.guidance());
    } else if let Some(config) = e.downcast_ref::<appconfig::ConfigError>() {
        log::debug!("configuration error: {config:?}");
        ui::dim("Fix the configuration under config/ and run the command again");
    } else if let Some(remote) = e.downcast_ref::<platform::Error>() {
        ui::dim(remote.category().advice());
    }
}
