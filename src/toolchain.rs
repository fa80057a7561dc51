//! Dependency toolchain
//!
//! The toolchain compiles the dependency-only view of a project into an
//! artifact directory. The pipeline treats it as opaque: it only needs an
//! identity (folded into the fingerprint) and a build entry point.

use crate::config::schema::ToolchainConfig;
use crate::error::BuildFailure;
use crate::pipeline::{collect_output, excerpt, ARTIFACT_DIR_ENV, PLATFORM_ENV};
use crate::source::SourceSet;
use crate::task::Platform;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Max number of output lines kept in a build failure
const BUILD_FAILURE_TAIL_LINES: usize = 50;

/// Compiles a dependency closure
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Display name recorded in cache metadata
    fn name(&self) -> &str;

    /// Version string recorded in cache metadata
    fn version(&self) -> &str;

    /// Executable the toolchain invokes
    fn program(&self) -> &str;

    /// Stable identity; a change here must invalidate cached artifacts
    fn identity(&self) -> String {
        format!("{} {}", self.name(), self.version())
    }

    /// Build the dependencies in `sources` for `platform` into `out_dir`
    async fn build_dependencies(
        &self,
        sources: &SourceSet,
        platform: &Platform,
        out_dir: &Path,
    ) -> Result<(), BuildFailure>;
}

/// Toolchain backed by an external command
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    name: String,
    program: String,
    build_args: Vec<String>,
    artifact_env: String,
    version: String,
    work_root: PathBuf,
}

impl CommandToolchain {
    /// Create a toolchain from configuration, detecting its version
    pub async fn detect(config: &ToolchainConfig) -> Self {
        let version = detect_version(&config.program)
            .await
            .unwrap_or_else(|| "unknown".to_string());
        debug!("Toolchain {} version: {}", config.name, version);

        Self {
            name: config.name.clone(),
            program: config.program.clone(),
            build_args: config.build_args.clone(),
            artifact_env: config.artifact_env.clone(),
            version,
            work_root: std::env::temp_dir().join("preflight"),
        }
    }

    /// Use `dir` for temporary build trees instead of the system temp dir
    pub fn with_work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = dir.into();
        self
    }

    fn failure(&self, reason: impl Into<String>) -> BuildFailure {
        BuildFailure::new(self.name.clone(), reason)
    }
}

async fn detect_version(program: &str) -> Option<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout);
    version.lines().next().map(|l| l.trim().to_string())
}

#[async_trait]
impl Toolchain for CommandToolchain {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn identity(&self) -> String {
        format!("{} {} {}", self.name, self.version, self.build_args.join(" "))
    }

    async fn build_dependencies(
        &self,
        sources: &SourceSet,
        platform: &Platform,
        out_dir: &Path,
    ) -> Result<(), BuildFailure> {
        let work_dir = self.work_root.join(format!("deps-{}", uuid::Uuid::new_v4()));
        sources
            .materialize(&work_dir)
            .await
            .map_err(|e| self.failure(e.to_string()))?;

        let result = self.run_build(&work_dir, platform, out_dir).await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            debug!("Failed to remove build dir {}: {}", work_dir.display(), e);
        }
        result
    }
}

impl CommandToolchain {
    async fn run_build(&self, work_dir: &Path, platform: &Platform, out_dir: &Path) -> Result<(), BuildFailure> {
        info!(
            "Running {} {} for {}",
            self.program,
            self.build_args.join(" "),
            platform
        );

        let mut child = Command::new(&self.program)
            .args(&self.build_args)
            .current_dir(work_dir)
            .env(&self.artifact_env, out_dir)
            .env(ARTIFACT_DIR_ENV, out_dir)
            .env(PLATFORM_ENV, platform.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failure(format!("failed to launch {}: {}", self.program, e)))?;

        let output = collect_output(child.stdout.take(), child.stderr.take(), &|line: &str| {
            debug!("[deps] {}", line)
        })
        .await;

        let status = child
            .wait()
            .await
            .map_err(|e| self.failure(format!("failed to wait for {}: {}", self.program, e)))?;

        if status.success() {
            return Ok(());
        }

        let code = status
            .code()
            .map(|c| format!("code {}", c))
            .unwrap_or_else(|| "a signal".to_string());
        let tail = excerpt(&output.join("\n"), BUILD_FAILURE_TAIL_LINES);
        Err(self.failure(if tail.is_empty() {
            format!("{} exited with {}", self.program, code)
        } else {
            format!("{} exited with {}\n{}", self.program, code, tail)
        }))
    }
}
