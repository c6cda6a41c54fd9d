use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::engine::DEFAULT_JOBS;
use crate::engine::pipeline::{DEFAULT_MIGRATE_COMMAND, DEFAULT_REMOTE_BRANCH};

#[derive(Parser)]
#[command(name = "hoist")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative setup and deploys for a fleet of Heroku apps", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// App environments to act on: <app>:<env>, all:<env>, or all (non-production).
    /// Repeatable; goes before the command
    #[arg(short, long = "select", value_name = "SELECTION")]
    pub select: Vec<String>,

    /// Number of environments processed in parallel
    #[arg(
        short,
        long,
        env = "HOIST_JOBS",
        default_value_t = DEFAULT_JOBS,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from),
        global = true
    )]
    pub jobs: usize,

    /// Project root holding config/hoist.yml
    #[arg(long, env = "HOIST_ROOT", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create and configure apps (all stages, or a single one)
    Setup(SetupArgs),

    /// Push code and reconcile the selected environments
    Deploy(DeployArgs),

    /// Restart all dynos
    Restart,

    /// Scale process types as configured
    Scale,

    /// Turn maintenance mode on or off
    Maintenance {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Show remote app details
    Info,

    /// List apps visible to the API token
    Apps,

    /// Stream logs of one environment
    Logs(LogsArgs),

    /// Open a console on one environment
    Console,

    /// Run a one-off command in a detached dyno
    Exec {
        /// Command to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Database tasks
    #[command(subcommand)]
    Db(DbCommand),

    /// Add a git remote for each selected environment
    Remotes,

    /// List configured app environments
    Envs,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Setup
// ============================================================================

#[derive(Parser)]
pub struct SetupArgs {
    #[command(subcommand)]
    pub target: Option<SetupTarget>,

    /// Print what would change without changing anything
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand, Clone, Copy)]
pub enum SetupTarget {
    /// Create the app when missing
    App,
    /// Migrate to the configured stack
    Stack,
    /// Sync collaborators
    Collaborators,
    /// Sync config variables
    Config,
    /// Sync add-ons
    Addons,
    /// Sync custom domains
    Domains,
}

// ============================================================================
// Deploy
// ============================================================================

#[derive(Parser)]
pub struct DeployArgs {
    /// Tag to deploy (skips the prompt for production)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Branch on the remote that receives the push
    #[arg(long, default_value = DEFAULT_REMOTE_BRANCH)]
    pub remote_branch: String,

    /// Migration command run after the push
    #[arg(long, default_value = DEFAULT_MIGRATE_COMMAND, conflicts_with = "no_migrate")]
    pub migrate: String,

    /// Skip the migration stage
    #[arg(long)]
    pub no_migrate: bool,
}

// ============================================================================
// Logs / Db / Maintenance
// ============================================================================

#[derive(Parser)]
pub struct LogsArgs {
    /// Number of recent lines to show
    #[arg(short = 'n', long, default_value = "100")]
    pub lines: u32,

    /// Only show lines from this dyno (e.g. web.1)
    #[arg(short, long)]
    pub dyno: Option<String>,

    /// Print recent lines and exit instead of following
    #[arg(long)]
    pub no_tail: bool,
}

#[derive(Subcommand)]
pub enum DbCommand {
    /// Run the migration command, then restart
    Migrate {
        /// Migration command
        #[arg(long, default_value = DEFAULT_MIGRATE_COMMAND)]
        command: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_selection_and_jobs() {
        let cli = Cli::try_parse_from([
            "hoist", "-s", "demo:staging", "-s", "all:qa", "deploy", "-j", "2", "--tag", "v1",
        ])
        .unwrap();
        assert_eq!(cli.select, vec!["demo:staging", "all:qa"]);
        assert_eq!(cli.jobs, 2);
        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.tag.as_deref(), Some("v1"));
        assert_eq!(args.remote_branch, "main");
        assert!(!args.no_migrate);
    }

    #[test]
    fn test_selection_after_command_is_rejected() {
        assert!(Cli::try_parse_from(["hoist", "-s", "demo:staging", "deploy", "-s", "all:qa"]).is_err());
    }

    #[test]
    fn test_zero_jobs_is_rejected() {
        assert!(Cli::try_parse_from(["hoist", "-j", "0", "restart"]).is_err());
    }

    #[test]
    fn test_setup_subcommand_with_dry_run() {
        let cli = Cli::try_parse_from(["hoist", "setup", "config", "--dry-run"]).unwrap();
        let Command::Setup(args) = cli.command else {
            panic!("expected setup");
        };
        assert!(args.dry_run);
        assert!(matches!(args.target, Some(SetupTarget::Config)));
    }

    #[test]
    fn test_exec_keeps_trailing_arguments() {
        let cli = Cli::try_parse_from(["hoist", "exec", "rake", "cache:clear", "--trace"]).unwrap();
        let Command::Exec { command } = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(command, vec!["rake", "cache:clear", "--trace"]);
    }
}
