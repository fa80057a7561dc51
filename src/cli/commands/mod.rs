//! CLI command implementations

pub mod cache;
pub mod config;
pub mod env;
pub mod run;
pub mod tasks;

pub use cache::execute as cache;
pub use config::execute as config;
pub use env::execute as env;
pub use run::execute as run;
pub use tasks::execute as tasks;

use crate::error::{PreflightError, PreflightResult};
use crate::source::SourceSet;
use crate::task::Platform;
use std::env as std_env;
use std::path::PathBuf;
use tracing::debug;

/// Resolve `--project`, falling back to the current directory
pub(crate) fn project_dir(project: Option<PathBuf>) -> PreflightResult<PathBuf> {
    let dir = match project {
        Some(p) => p,
        None => std_env::current_dir()
            .map_err(|e| PreflightError::io("getting current directory", e))?,
    };

    if !dir.is_dir() {
        return Err(PreflightError::PathNotFound(dir));
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}

/// `--platform` or the host tag
pub(crate) fn resolve_platform(platform: Option<String>) -> Platform {
    platform.map(Platform::new).unwrap_or_else(Platform::current)
}

/// Load a project tree off the async runtime
pub(crate) async fn load_sources(dir: PathBuf) -> PreflightResult<SourceSet> {
    debug!("Loading sources from {}", dir.display());
    tokio::task::spawn_blocking(move || SourceSet::load(&dir))
        .await
        .map_err(|e| PreflightError::Internal(format!("source loader panicked: {}", e)))?
        .map_err(PreflightError::from)
}
