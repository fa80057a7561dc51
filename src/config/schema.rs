//! Configuration schema for Preflight
//!
//! Global configuration is stored at `~/.config/preflight/config.toml`;
//! a project may add `.preflight.toml` at its root to override it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Dependency cache settings
    pub cache: CacheConfig,

    /// Pipeline execution settings
    pub pipeline: PipelineConfig,

    /// Dependency toolchain
    pub toolchain: ToolchainConfig,

    /// Task catalog adjustments
    pub tasks: TasksConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append a line to the run history after every pipeline run
    pub history: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            history: true,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Artifact store directory (default: platform cache dir)
    pub dir: Option<PathBuf>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tasks run in parallel (0 = number of CPUs)
    pub jobs: usize,

    /// Lines of diagnostic output kept per task in the report
    pub excerpt_lines: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            excerpt_lines: 20,
        }
    }
}

impl PipelineConfig {
    /// Effective parallelism
    pub fn effective_jobs(&self) -> usize {
        resolve_jobs(self.jobs)
    }
}

/// Parallel task count for a requested value; 0 means one per CPU
pub fn resolve_jobs(jobs: usize) -> usize {
    if jobs == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        jobs
    }
}

/// Toolchain that compiles the dependency closure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Display name recorded in cache metadata
    pub name: String,

    /// Executable to invoke
    pub program: String,

    /// Arguments for the dependency build
    pub build_args: Vec<String>,

    /// Environment variable pointing builds and tasks at the artifact dir
    pub artifact_env: String,

    /// Placeholder sources injected into the dependency-only view
    pub stubs: BTreeMap<String, String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        let stubs = [
            ("src/lib.rs", ""),
            ("src/main.rs", "fn main() {}\n"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "cargo".to_string(),
            program: "cargo".to_string(),
            build_args: vec![
                "build".to_string(),
                "--release".to_string(),
                "--locked".to_string(),
                "--all-targets".to_string(),
            ],
            artifact_env: "CARGO_TARGET_DIR".to_string(),
            stubs,
        }
    }
}

/// Task catalog adjustments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Include the built-in catalog
    pub builtin: bool,

    /// Task names to drop
    pub disabled: Vec<String>,

    /// Command overrides (task name -> argv)
    pub commands: BTreeMap<String, Vec<String>>,

    /// Additional tasks appended after the built-in ones
    pub custom: Vec<CustomTaskConfig>,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            disabled: vec![],
            commands: BTreeMap::new(),
            custom: vec![],
        }
    }
}

/// A user-defined task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomTaskConfig {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Full argv
    pub command: Vec<String>,

    /// Source filter text (see `preflight::source::filter`)
    #[serde(default = "default_sources")]
    pub sources: String,

    #[serde(default)]
    pub uses_dependency_cache: bool,

    /// Platform tags; empty = every platform
    #[serde(default)]
    pub platforms: Vec<String>,
}

fn default_sources() -> String {
    "all".to_string()
}
