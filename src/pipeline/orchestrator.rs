//! Pipeline orchestrator
//!
//! One run:
//!
//! 1. Select the tasks that apply to the platform, in declared order.
//! 2. If any of them consumes the dependency cache, derive the
//!    dependency-only view (manifests, lock files, build stubs), fingerprint
//!    it and obtain the shared entry once.
//! 3. Run every task against its own filtered sources. A failing task
//!    never stops the others; a dependency build failure becomes the
//!    failure of every cache-consuming task.
//! 4. Aggregate results in declared order, whatever order they finished in.

use crate::cache::{
    detect_lockfiles, fingerprint_salted, ArtifactCacheEntry, BuildInfo, CacheKey, DependencyCache,
};
use crate::error::BuildFailure;
use crate::pipeline::cancel::CancelSignal;
use crate::pipeline::executor::{Execution, TaskContext, TaskExecutor};
use crate::pipeline::report::{PipelineReport, TaskResult, TaskStatus, CANCELLED};
use crate::source::{SourceFilter, SourceSet};
use crate::task::{Platform, TaskRegistry, TaskSpec};
use crate::toolchain::Toolchain;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tunables for a run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Tasks executed concurrently
    pub jobs: usize,
    /// Placeholder sources added to the dependency-only view
    pub stubs: BTreeMap<String, String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            stubs: BTreeMap::new(),
        }
    }
}

/// Dependency-only view of a project and the cache key it maps to
#[derive(Debug, Clone)]
pub struct DependencyPlan {
    pub sources: SourceSet,
    pub key: CacheKey,
}

/// Derive the dependency view of `full` and its cache key.
///
/// The toolchain identity is part of the fingerprint, so a different
/// compiler never reuses another's artifacts.
pub fn plan_dependencies(
    full: &SourceSet,
    platform: &Platform,
    stubs: &BTreeMap<String, String>,
    toolchain: &dyn Toolchain,
) -> DependencyPlan {
    let sources = SourceFilter::Manifests.apply(full).with_stubs(stubs);
    let lock = detect_lockfiles(&sources);
    let identity = toolchain.identity();
    let fingerprint = fingerprint_salted(&sources, &lock, Some(&identity));

    DependencyPlan {
        sources,
        key: CacheKey::new(fingerprint, platform.clone()),
    }
}

/// Outcome of step 2, shared by every task
enum Dependencies {
    NotNeeded,
    Ready(Arc<ArtifactCacheEntry>),
    Failed(BuildFailure),
    Cancelled,
}

/// Callback invoked as each task finishes, in completion order
pub type TaskObserver = Arc<dyn Fn(&TaskResult) + Send + Sync>;

/// Runs the registry's tasks against a project
pub struct Orchestrator {
    cache: Arc<DependencyCache>,
    registry: Arc<TaskRegistry>,
    toolchain: Arc<dyn Toolchain>,
    executor: Arc<dyn TaskExecutor>,
    options: PipelineOptions,
    observer: Option<TaskObserver>,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<DependencyCache>,
        registry: Arc<TaskRegistry>,
        toolchain: Arc<dyn Toolchain>,
        executor: Arc<dyn TaskExecutor>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            cache,
            registry,
            toolchain,
            executor,
            options,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: TaskObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Execute every applicable task and aggregate the outcomes
    pub async fn run(&self, full: &SourceSet, platform: &Platform, cancel: &CancelSignal) -> PipelineReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let tasks = self.registry.applicable_tasks(platform);
        info!("Running {} task(s) on {}", tasks.len(), platform);

        let needs_cache = tasks.iter().any(|t| t.uses_dependency_cache);
        let (dependencies, fingerprint, cache_hit) = if needs_cache {
            let plan = plan_dependencies(full, platform, &self.options.stubs, self.toolchain.as_ref());
            let fingerprint = plan.key.fingerprint;
            let (deps, hit) = self.resolve_dependencies(plan, cancel).await;
            (deps, Some(fingerprint), hit)
        } else {
            debug!("No task consumes the dependency cache, skipping dependency build");
            (Dependencies::NotNeeded, None, None)
        };

        let jobs = self.options.jobs.max(1);
        let results: Vec<TaskResult> = stream::iter(tasks)
            .map(|task| async {
                let result = self.run_task(task, full, platform, &dependencies, cancel).await;
                if let Some(observer) = &self.observer {
                    observer(&result);
                }
                result
            })
            .buffered(jobs)
            .collect()
            .await;

        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!("Run cancelled");
        }

        PipelineReport::new(
            platform.clone(),
            started_at,
            clock.elapsed(),
            fingerprint,
            cache_hit,
            cancelled,
            results,
        )
    }

    async fn resolve_dependencies(&self, plan: DependencyPlan, cancel: &CancelSignal) -> (Dependencies, Option<bool>) {
        let info = BuildInfo {
            toolchain: self.toolchain.name().to_string(),
            toolchain_version: self.toolchain.version().to_string(),
        };
        let toolchain = Arc::clone(&self.toolchain);
        let sources = plan.sources;
        let platform = plan.key.platform.clone();
        let build = move |out_dir: PathBuf| async move {
            toolchain.build_dependencies(&sources, &platform, &out_dir).await
        };

        // The build itself keeps running on cancel and still publishes its entry
        let resolved = tokio::select! {
            resolved = self.cache.get_or_build(plan.key, info, build) => resolved,
            _ = cancel.cancelled() => return (Dependencies::Cancelled, None),
        };

        match resolved {
            Ok(resolved) => {
                info!(
                    "Dependencies {} ({:?})",
                    resolved.entry.key(),
                    resolved.resolution
                );
                let hit = resolved.resolution.is_hit();
                (Dependencies::Ready(resolved.entry), Some(hit))
            }
            Err(failure) => {
                warn!("{}", failure);
                (Dependencies::Failed(failure), Some(false))
            }
        }
    }

    async fn run_task(
        &self,
        task: &TaskSpec,
        full: &SourceSet,
        platform: &Platform,
        dependencies: &Dependencies,
        cancel: &CancelSignal,
    ) -> TaskResult {
        if cancel.is_cancelled() {
            return TaskResult::cancelled(&task.name);
        }

        let artifact = if task.uses_dependency_cache {
            match dependencies {
                Dependencies::Ready(entry) => Some(entry.as_ref()),
                Dependencies::Failed(failure) => {
                    return TaskResult::new(
                        &task.name,
                        TaskStatus::failure(failure.to_string()),
                        failure.reason.clone(),
                        std::time::Duration::ZERO,
                    );
                }
                Dependencies::Cancelled => return TaskResult::cancelled(&task.name),
                Dependencies::NotNeeded => None,
            }
        } else {
            None
        };

        let sources = task.sources.apply(full);
        let context = TaskContext {
            task,
            sources: &sources,
            platform,
            artifact,
        };

        debug!("Starting task {} ({} files)", task.name, sources.len());
        let start = Instant::now();
        let outcome = self.executor.execute(context, cancel).await;
        let duration = start.elapsed();

        let result = match outcome {
            Ok(Execution::Passed { output }) => TaskResult::new(&task.name, TaskStatus::Success, output, duration),
            Ok(Execution::Cancelled) => {
                TaskResult::new(&task.name, TaskStatus::skipped(CANCELLED), String::new(), duration)
            }
            Err(failure) => {
                let diagnostics = match failure.output() {
                    "" => failure.to_string(),
                    output => output.to_string(),
                };
                TaskResult::new(&task.name, TaskStatus::failure(failure.to_string()), diagnostics, duration)
            }
        };

        info!("Task {} finished: {}", task.name, result.status.label());
        result
    }
}
