//! Cache command - inspect the dependency artifact store

use super::{load_sources, project_dir, resolve_platform};
use crate::cache::{detect_lockfiles, format_bytes, CacheState, DependencyCache, StoredEntry};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::PreflightResult;
use crate::pipeline::plan_dependencies;
use crate::toolchain::CommandToolchain;
use console::style;
use std::path::PathBuf;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> PreflightResult<()> {
    let cache = DependencyCache::new(ConfigManager::cache_dir(config));

    match args.action {
        CacheAction::List { format } => list_entries(&cache, format),
        CacheAction::Info { project, platform } => {
            show_project_info(&cache, config, project, platform).await
        }
    }
}

/// List all complete entries
fn list_entries(cache: &DependencyCache, format: OutputFormat) -> PreflightResult<()> {
    let entries = cache.list()?;

    if entries.is_empty() && format != OutputFormat::Json {
        println!("No cache entries found in {}.", cache.root().display());
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => print_entry_json(&entries)?,
        OutputFormat::Plain => print_entry_plain(&entries),
    }

    Ok(())
}

fn print_entry_table(entries: &[StoredEntry]) {
    println!(
        "{:<14} {:<16} {:<28} {:<10} {:<20}",
        "FINGERPRINT", "PLATFORM", "TOOLCHAIN", "SIZE", "CREATED"
    );
    println!("{}", "-".repeat(90));

    for entry in entries {
        let metadata = &entry.metadata;
        let created = metadata.created_at.format("%Y-%m-%d %H:%M").to_string();

        println!(
            "{:<14} {:<16} {:<28} {:<10} {:<20}",
            metadata.fingerprint.short(),
            metadata.platform.as_str(),
            metadata.toolchain_version,
            format_bytes(entry.size_bytes),
            created
        );
    }

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!();
    println!(
        "Total: {} entr{} ({})",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        format_bytes(total)
    );
}

fn print_entry_json(entries: &[StoredEntry]) -> PreflightResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson {
        fingerprint: String,
        platform: String,
        toolchain: String,
        toolchain_version: String,
        size_bytes: u64,
        created_at: String,
        path: PathBuf,
    }

    let json_entries: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            fingerprint: e.metadata.fingerprint.to_hex(),
            platform: e.metadata.platform.to_string(),
            toolchain: e.metadata.toolchain.clone(),
            toolchain_version: e.metadata.toolchain_version.clone(),
            size_bytes: e.size_bytes,
            created_at: e.metadata.created_at.to_rfc3339(),
            path: e.dir.clone(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_entries)?);
    Ok(())
}

fn print_entry_plain(entries: &[StoredEntry]) {
    for entry in entries {
        println!("{}", entry.dir.display());
    }
}

/// Show which entry a project maps to and whether it exists
async fn show_project_info(
    cache: &DependencyCache,
    config: &Config,
    project: Option<PathBuf>,
    platform: Option<String>,
) -> PreflightResult<()> {
    let project_dir = project_dir(project)?;
    let platform = resolve_platform(platform);
    let sources = load_sources(project_dir.clone()).await?;
    let toolchain = CommandToolchain::detect(&config.toolchain).await;

    let plan = plan_dependencies(&sources, &platform, &config.toolchain.stubs, &toolchain);
    let lock = detect_lockfiles(&plan.sources);

    println!("Project:  {}", project_dir.display());
    println!("Platform: {}", platform);
    println!();

    if lock.is_empty() {
        println!("No lockfiles detected in this project.");
    } else {
        println!("Detected lockfiles:");
        for lockfile in &lock.lockfiles {
            println!(
                "  {} {} ({})",
                style("•").cyan(),
                lockfile.path,
                lockfile.ecosystem
            );
        }
    }
    println!();

    let (marker, state) = match cache.state(&plan.key).await {
        CacheState::Complete => (style("✓").green(), "complete"),
        CacheState::Incomplete => (style("~").yellow(), "incomplete (will rebuild)"),
        CacheState::Miss => (style("○").dim(), "miss (will build)"),
    };

    println!("Cache status:");
    println!(
        "  {} {} [{}]",
        marker,
        plan.key.fingerprint.short(),
        state
    );
    println!("  {}", cache.entry_dir(&plan.key).display());

    Ok(())
}
