//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Preflight - layered build-and-verification pipeline
///
/// Compiles a project's dependencies once per (lock state, platform),
/// caches the result, and runs every verification task against it.
#[derive(Parser, Debug)]
#[command(name = "preflight")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PREFLIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .preflight.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every applicable task and report the outcome
    Run(RunArgs),

    /// List the task registry
    Tasks(TasksArgs),

    /// Describe a development environment sharing the dependency cache
    Env(EnvArgs),

    /// Inspect the dependency artifact cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Project directory (defaults to current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Platform tag, e.g. x86_64-linux (defaults to the host)
    #[arg(long)]
    pub platform: Option<String>,

    /// Tasks run in parallel (0 = number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Report format on stdout
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Arguments for the tasks command
#[derive(Parser, Debug)]
pub struct TasksArgs {
    /// Platform tag (defaults to the host)
    #[arg(long)]
    pub platform: Option<String>,

    /// Include tasks not offered on the platform
    #[arg(short, long)]
    pub all: bool,
}

/// Arguments for the env command
#[derive(Parser, Debug)]
pub struct EnvArgs {
    /// Project directory (defaults to current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Platform tag (defaults to the host)
    #[arg(long)]
    pub platform: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: EnvFormat,
}

/// Pipeline report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary
    Text,
    /// JSON report
    Json,
}

/// Environment description format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnvFormat {
    /// Human-readable summary
    Text,
    /// JSON description
    Json,
    /// `export` lines for a POSIX shell
    Shell,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List complete cache entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the cache entry for a project
    Info {
        /// Project directory (defaults to current directory)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Platform tag (defaults to the host)
        #[arg(long)]
        platform: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_defaults() {
        let cli = Cli::parse_from(["preflight", "run"]);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.project.is_none());
                assert!(args.jobs.is_none());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::parse_from([
            "preflight",
            "run",
            "--platform",
            "aarch64-darwin",
            "-j",
            "4",
            "--format",
            "json",
            "--report",
            "out.json",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.platform.as_deref(), Some("aarch64-darwin"));
                assert_eq!(args.jobs, Some(4));
                assert_eq!(args.format, ReportFormat::Json);
                assert_eq!(args.report, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_env_shell() {
        let cli = Cli::parse_from(["preflight", "env", "--format", "shell"]);
        match cli.command {
            Commands::Env(args) => assert_eq!(args.format, EnvFormat::Shell),
            _ => panic!("expected Env command"),
        }
    }

    #[test]
    fn cli_parses_cache_info() {
        let cli = Cli::parse_from(["preflight", "cache", "info", "--platform", "x86_64-linux"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Info { platform, .. },
            }) => assert_eq!(platform.as_deref(), Some("x86_64-linux")),
            _ => panic!("expected Cache Info command"),
        }
    }

    #[test]
    fn cli_parses_config_init_force() {
        let cli = Cli::parse_from(["preflight", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Init { force }),
            }) => assert!(force),
            _ => panic!("expected Config Init command"),
        }
    }

    #[test]
    fn cli_no_local_flag() {
        let cli = Cli::parse_from(["preflight", "--no-local", "tasks"]);
        assert!(cli.no_local);
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["preflight", "tasks"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["preflight", "-v", "tasks"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["preflight", "-vv", "tasks"]);
        assert_eq!(cli.verbose, 2);
    }
}
