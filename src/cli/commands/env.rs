//! Env command - describe a development shell sharing the dependency cache

use super::{load_sources, project_dir, resolve_platform};
use crate::cache::DependencyCache;
use crate::cli::args::{EnvArgs, EnvFormat};
use crate::config::{Config, ConfigManager};
use crate::environment::{EnvironmentComposer, EnvironmentSpec};
use crate::error::PreflightResult;
use crate::task::TaskRegistry;
use crate::toolchain::CommandToolchain;
use console::style;
use std::sync::Arc;

/// Execute the env command
pub async fn execute(args: EnvArgs, config: &Config) -> PreflightResult<()> {
    let registry = Arc::new(TaskRegistry::from_config(&config.tasks)?);
    let platform = resolve_platform(args.platform);
    let sources = load_sources(project_dir(args.project)?).await?;

    let toolchain = CommandToolchain::detect(&config.toolchain).await;
    let cache = Arc::new(DependencyCache::new(ConfigManager::cache_dir(config)));
    let composer = EnvironmentComposer::new(
        cache,
        registry,
        Arc::new(toolchain),
        config.toolchain.stubs.clone(),
        config.toolchain.artifact_env.clone(),
    );

    let spec = composer.compose(&sources, &platform).await;

    match args.format {
        EnvFormat::Json => println!("{}", serde_json::to_string_pretty(&spec)?),
        EnvFormat::Shell => print!("{}", spec.to_shell()),
        EnvFormat::Text => print_environment(&spec),
    }

    Ok(())
}

fn print_environment(spec: &EnvironmentSpec) {
    println!("Platform: {}", spec.platform);
    println!();

    let cache = &spec.dependency_cache;
    let state = if cache.present {
        style("present").green()
    } else {
        style("missing (run `preflight run` to build)").yellow()
    };
    println!("Dependency cache:");
    println!("  fingerprint: {}", cache.fingerprint.short());
    println!("  path:        {}", cache.path.display());
    println!("  state:       {}", state);
    println!();

    println!("Tools:");
    for tool in &spec.tools {
        println!("  {} {}", style("•").cyan(), tool);
    }
    println!();

    println!("Environment:");
    for (key, value) in &spec.env {
        println!("  {}={}", key, value);
    }
    println!();

    println!("Tasks: {}", spec.tasks.join(", "));
}
