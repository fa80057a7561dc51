//! Preflight - layered build-and-verification pipeline
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use preflight::cli::{Cli, Commands};
use preflight::config::{Config, ConfigManager};
use preflight::error::{PreflightError, PreflightResult};
use preflight::pipeline::cancel_pair;
use preflight::ui::{self, UiContext};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> PreflightResult<u8> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let start = match project_arg(&cli.command) {
            Some(dir) => dir,
            None => std::env::current_dir()
                .map_err(|e| PreflightError::io("getting current directory", e))?,
        };
        ConfigManager::find_local_config(&start)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
    } else if let Some(ref path) = local_config_path {
        debug!("Found local config: {}", path.display());
    }

    if UiContext::detect().use_fancy_output() {
        ui::init_theme();
    }

    match cli.command {
        Commands::Run(args) => {
            let (handle, cancel) = cancel_pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling run");
                    handle.cancel();
                }
            });
            preflight::cli::commands::run(args, &config, cancel).await
        }
        Commands::Tasks(args) => preflight::cli::commands::tasks(args, &config).await.map(|_| 0),
        Commands::Env(args) => preflight::cli::commands::env(args, &config).await.map(|_| 0),
        Commands::Cache(args) => preflight::cli::commands::cache(args, &config).await.map(|_| 0),
        Commands::Config(args) => preflight::cli::commands::config(args, &config, &config_manager)
            .await
            .map(|_| 0),
    }
}

/// Project directory named on the command line, if the command takes one
fn project_arg(command: &Commands) -> Option<PathBuf> {
    use preflight::cli::args::CacheAction;

    match command {
        Commands::Run(args) => args.project.clone(),
        Commands::Env(args) => args.project.clone(),
        Commands::Cache(args) => match &args.action {
            CacheAction::Info { project, .. } => project.clone(),
            CacheAction::List { .. } => None,
        },
        Commands::Tasks(_) | Commands::Config(_) => None,
    }
}

/// 0 = warn (spinners only), 1 = info, 2+ = debug; logs go to stderr
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("preflight=warn"),
        1 => EnvFilter::new("preflight=info"),
        _ => EnvFilter::new("preflight=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
