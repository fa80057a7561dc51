//! Task command execution
//!
//! An executor runs one task's command against its filtered sources and,
//! when the task declares it, the shared dependency artifact. The artifact
//! is borrowed read-only: the process executor hands the command a private
//! copy so the cached entry is never touched.

use crate::cache::ArtifactCacheEntry;
use crate::error::TaskExecutionFailure;
use crate::pipeline::cancel::CancelSignal;
use crate::pipeline::{collect_output, DEPS_DIR_ENV, PLATFORM_ENV};
use crate::source::SourceSet;
use crate::task::{Platform, TaskSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

/// Everything a task execution may read
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub task: &'a TaskSpec,
    /// The task's filtered view of the project
    pub sources: &'a SourceSet,
    pub platform: &'a Platform,
    /// Shared dependency entry, present only for cache-consuming tasks
    pub artifact: Option<&'a ArtifactCacheEntry>,
}

/// How an execution that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// Command exited zero
    Passed { output: String },
    /// Run cancelled; the command was stopped
    Cancelled,
}

/// Runs task commands
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        context: TaskContext<'_>,
        cancel: &CancelSignal,
    ) -> Result<Execution, TaskExecutionFailure>;
}

/// Executor that runs each task as a local process in a fresh work dir
pub struct ProcessExecutor {
    artifact_env: String,
    work_root: PathBuf,
}

impl ProcessExecutor {
    /// `artifact_env` names the variable the task's tooling reads its
    /// build directory from (e.g. `CARGO_TARGET_DIR`).
    pub fn new(artifact_env: impl Into<String>) -> Self {
        Self {
            artifact_env: artifact_env.into(),
            work_root: std::env::temp_dir().join("preflight"),
        }
    }

    pub fn with_work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = dir.into();
        self
    }

    async fn prepare(&self, context: &TaskContext<'_>, base: &Path) -> Result<PathBuf, TaskExecutionFailure> {
        let src = base.join("src");
        context
            .sources
            .materialize(&src)
            .await
            .map_err(|e| TaskExecutionFailure::Workspace(e.to_string()))?;

        if let Some(entry) = context.artifact {
            let from = entry.artifact_path();
            let to = base.join("deps");
            tokio::task::spawn_blocking(move || copy_dir(&from, &to))
                .await
                .map_err(|e| TaskExecutionFailure::Workspace(e.to_string()))?
                .map_err(|e| TaskExecutionFailure::Workspace(format!("copying dependency artifact: {}", e)))?;
        }

        Ok(src)
    }

    async fn run(
        &self,
        context: &TaskContext<'_>,
        base: &Path,
        cancel: &CancelSignal,
    ) -> Result<Execution, TaskExecutionFailure> {
        let src = self.prepare(context, base).await?;
        let command = &context.task.command;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&src)
            .env(PLATFORM_ENV, context.platform.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(entry) = context.artifact {
            cmd.env(&self.artifact_env, base.join("deps"))
                .env(DEPS_DIR_ENV, entry.artifact_path());
        }

        debug!("Executing task {}: {}", context.task.name, command);
        let mut child = cmd.spawn().map_err(|e| TaskExecutionFailure::Launch {
            program: command.program.clone(),
            source: Arc::new(e),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let task_name = context.task.name.as_str();
        let on_line = |line: &str| debug!("[{}] {}", task_name, line);

        let finished = tokio::select! {
            result = async {
                let lines = collect_output(stdout, stderr, &on_line).await;
                (lines, child.wait().await)
            } => Some(result),
            _ = cancel.cancelled() => None,
        };

        let Some((lines, status)) = finished else {
            debug!("Cancelling task {}", context.task.name);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill task {}: {}", context.task.name, e);
            }
            return Ok(Execution::Cancelled);
        };

        let output = lines.join("\n");
        let status = status.map_err(|e| TaskExecutionFailure::Launch {
            program: command.program.clone(),
            source: Arc::new(e),
        })?;

        if status.success() {
            Ok(Execution::Passed { output })
        } else {
            Err(TaskExecutionFailure::Exit {
                command: command.to_string(),
                code: status.code(),
                output,
            })
        }
    }
}

#[async_trait]
impl TaskExecutor for ProcessExecutor {
    async fn execute(
        &self,
        context: TaskContext<'_>,
        cancel: &CancelSignal,
    ) -> Result<Execution, TaskExecutionFailure> {
        let base = self
            .work_root
            .join(format!("{}-{}", context.task.name, uuid::Uuid::new_v4()));

        let result = self.run(&context, &base, cancel).await;

        if let Err(e) = tokio::fs::remove_dir_all(&base).await {
            debug!("Failed to remove work dir {}: {}", base.display(), e);
        }
        result
    }
}

fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{fingerprint, BuildInfo, CacheKey, DependencyCache, LockState};
    use crate::error::BuildFailure;
    use crate::pipeline::cancel::cancel_pair;
    use crate::task::TaskCommand;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sh(name: &str, script: &str) -> TaskSpec {
        TaskSpec::new(name, TaskCommand::new("sh", &["-c", script]))
    }

    fn context<'a>(task: &'a TaskSpec, sources: &'a SourceSet, platform: &'a Platform) -> TaskContext<'a> {
        TaskContext {
            task,
            sources,
            platform,
            artifact: None,
        }
    }

    #[tokio::test]
    async fn passing_command_captures_output() {
        let temp = TempDir::new().unwrap();
        let executor = ProcessExecutor::new("DEPS").with_work_root(temp.path());
        let task = sh("cat", "cat src/lib.rs; echo \"on $PREFLIGHT_PLATFORM\"");
        let sources = SourceSet::from_pairs([("src/lib.rs", "pub fn x() {}")]);
        let platform = Platform::new("x86_64-linux");

        let result = executor
            .execute(context(&task, &sources, &platform), &CancelSignal::never())
            .await
            .unwrap();

        let Execution::Passed { output } = result else {
            panic!("expected pass");
        };
        assert!(output.contains("pub fn x() {}"));
        assert!(output.contains("on x86_64-linux"));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code() {
        let temp = TempDir::new().unwrap();
        let executor = ProcessExecutor::new("DEPS").with_work_root(temp.path());
        let task = sh("lint", "echo 'warning: unused' >&2; exit 3");
        let sources = SourceSet::new();
        let platform = Platform::new("x");

        let err = executor
            .execute(context(&task, &sources, &platform), &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, TaskExecutionFailure::Exit { code: Some(3), .. }));
        assert!(err.output().contains("warning: unused"));
    }

    #[tokio::test]
    async fn non_utf8_output_followed_by_bulk_output_does_not_hang() {
        let temp = TempDir::new().unwrap();
        let executor = ProcessExecutor::new("DEPS").with_work_root(temp.path());
        let task = sh(
            "noisy",
            "printf '\\377\\n'; head -c 300000 /dev/zero | tr '\\0' a; echo; echo done",
        );
        let sources = SourceSet::new();
        let platform = Platform::new("x");

        let result = tokio::time::timeout(
            Duration::from_secs(30),
            executor.execute(context(&task, &sources, &platform), &CancelSignal::never()),
        )
        .await
        .expect("task must finish")
        .unwrap();

        let Execution::Passed { output } = result else {
            panic!("expected pass");
        };
        assert!(output.starts_with('\u{FFFD}'));
        assert!(output.ends_with("done"));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_failure() {
        let temp = TempDir::new().unwrap();
        let executor = ProcessExecutor::new("DEPS").with_work_root(temp.path());
        let task = TaskSpec::new("audit", TaskCommand::new("preflight-no-such-tool", &[]));
        let sources = SourceSet::new();
        let platform = Platform::new("x");

        let err = executor
            .execute(context(&task, &sources, &platform), &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, TaskExecutionFailure::Launch { ref program, .. } if program == "preflight-no-such-tool"));
    }

    #[tokio::test]
    async fn artifact_is_copied_and_cache_left_untouched() {
        let temp = TempDir::new().unwrap();
        let cache = DependencyCache::new(temp.path().join("cache"));
        let key = CacheKey::new(
            fingerprint(&SourceSet::new(), &LockState::default()),
            Platform::new("x"),
        );
        let info = BuildInfo {
            toolchain: "fake".to_string(),
            toolchain_version: "1".to_string(),
        };
        let resolved = cache
            .get_or_build(key, info, |dir: PathBuf| async move {
                tokio::fs::write(dir.join("libdep.rlib"), b"compiled")
                    .await
                    .map_err(|e| BuildFailure::new("fake", e.to_string()))
            })
            .await
            .unwrap();

        let executor = ProcessExecutor::new("DEPS").with_work_root(temp.path().join("work"));
        let task = sh("build", "cat \"$DEPS/libdep.rlib\" && echo changed > \"$DEPS/libdep.rlib\"");
        let sources = SourceSet::new();
        let platform = Platform::new("x");
        let ctx = TaskContext {
            artifact: Some(resolved.entry.as_ref()),
            ..context(&task, &sources, &platform)
        };

        let result = executor.execute(ctx, &CancelSignal::never()).await.unwrap();

        assert_eq!(result, Execution::Passed { output: "compiled".to_string() });
        let cached = std::fs::read(resolved.entry.artifact_path().join("libdep.rlib")).unwrap();
        assert_eq!(cached, b"compiled");
    }

    #[tokio::test]
    async fn cancel_kills_running_command() {
        let temp = TempDir::new().unwrap();
        let executor = ProcessExecutor::new("DEPS").with_work_root(temp.path());
        let task = sh("slow", "sleep 30");
        let sources = SourceSet::new();
        let platform = Platform::new("x");
        let (handle, signal) = cancel_pair();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            executor.execute(context(&task, &sources, &platform), &signal),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result, Execution::Cancelled);
    }
}
