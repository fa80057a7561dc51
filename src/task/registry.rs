//! Static task catalog
//!
//! The registry is assembled once at startup from the built-in catalog and
//! configuration overrides. It never executes anything; it only answers
//! which tasks apply to a platform, in declared order.

use crate::config::schema::{CustomTaskConfig, TasksConfig};
use crate::error::{PreflightError, PreflightResult};
use crate::source::SourceFilter;
use crate::task::platform::{Platform, PlatformSet};
use crate::task::spec::{TaskCommand, TaskSpec};
use std::collections::HashSet;
use tracing::debug;

/// Platforms the coverage task is offered on
pub const COVERAGE_PLATFORMS: &[&str] = &["x86_64-linux", "aarch64-linux"];

/// Ordered, immutable list of tasks
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<TaskSpec>,
}

impl TaskRegistry {
    /// Build a registry, rejecting duplicate names
    pub fn from_tasks(tasks: Vec<TaskSpec>) -> PreflightResult<Self> {
        let mut seen = HashSet::new();
        for task in &tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(PreflightError::DuplicateTask(task.name.clone()));
            }
        }
        Ok(Self { tasks })
    }

    /// The built-in verification catalog
    pub fn builtin() -> Self {
        Self {
            tasks: builtin_tasks(),
        }
    }

    /// Built-in catalog with configuration applied: disabled tasks removed,
    /// command overrides substituted, custom tasks appended.
    pub fn from_config(config: &TasksConfig) -> PreflightResult<Self> {
        let mut tasks = if config.builtin {
            builtin_tasks()
        } else {
            Vec::new()
        };

        for (name, argv) in &config.commands {
            let task = tasks
                .iter_mut()
                .find(|t| &t.name == name)
                .ok_or_else(|| PreflightError::UnknownTask(name.clone()))?;
            task.command = TaskCommand::from_argv(argv)
                .ok_or_else(|| PreflightError::EmptyCommand { name: name.clone() })?;
        }

        for custom in &config.custom {
            tasks.push(custom_task(custom)?);
        }

        for name in &config.disabled {
            let before = tasks.len();
            tasks.retain(|t| &t.name != name);
            if tasks.len() == before {
                return Err(PreflightError::UnknownTask(name.clone()));
            }
            debug!("Task disabled by configuration: {}", name);
        }

        Self::from_tasks(tasks)
    }

    /// All tasks in declared order
    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Tasks offered on `platform`, in declared order. Tasks restricted to
    /// other platforms are omitted entirely.
    pub fn applicable_tasks(&self, platform: &Platform) -> Vec<&TaskSpec> {
        self.tasks.iter().filter(|t| t.applies_to(platform)).collect()
    }
}

fn custom_task(config: &CustomTaskConfig) -> PreflightResult<TaskSpec> {
    let command = TaskCommand::from_argv(&config.command).ok_or_else(|| {
        PreflightError::EmptyCommand {
            name: config.name.clone(),
        }
    })?;
    let sources: SourceFilter = config.sources.parse()?;
    let platforms = if config.platforms.is_empty() {
        PlatformSet::All
    } else {
        PlatformSet::only(config.platforms.iter().map(|p| Platform::new(p.as_str())))
    };

    let mut spec = TaskSpec::new(config.name.clone(), command)
        .describe(config.description.clone().unwrap_or_default())
        .reads(sources)
        .only_on(platforms);
    spec.uses_dependency_cache = config.uses_dependency_cache;
    Ok(spec)
}

fn builtin_tasks() -> Vec<TaskSpec> {
    let manifests_and = |extra: SourceFilter| SourceFilter::AnyOf(vec![SourceFilter::Manifests, extra]);

    vec![
        TaskSpec::new("build", TaskCommand::new("cargo", &["build", "--release", "--locked"]))
            .describe("Build the workspace")
            .reads(SourceFilter::cargo_sources())
            .uses_dependency_cache(),
        TaskSpec::new(
            "clippy",
            TaskCommand::new("cargo", &["clippy", "--all-targets", "--locked", "--", "--deny", "warnings"]),
        )
        .describe("Lint with clippy, warnings denied")
        .reads(SourceFilter::cargo_sources())
        .uses_dependency_cache(),
        TaskSpec::new("doc", TaskCommand::new("cargo", &["doc", "--no-deps", "--locked"]))
            .describe("Generate documentation")
            .reads(SourceFilter::cargo_sources())
            .uses_dependency_cache(),
        TaskSpec::new("fmt", TaskCommand::new("cargo", &["fmt", "--all", "--check"]))
            .describe("Check formatting")
            .reads(manifests_and(SourceFilter::extensions(["rs"]))),
        TaskSpec::new("audit", TaskCommand::new("cargo", &["audit"]))
            .describe("Audit dependencies for known advisories")
            .reads(SourceFilter::Manifests),
        TaskSpec::new("deny", TaskCommand::new("cargo", &["deny", "check", "licenses"]))
            .describe("Check dependency licenses")
            .reads(manifests_and(SourceFilter::file_names(["deny.toml"]))),
        TaskSpec::new("test", TaskCommand::new("cargo", &["nextest", "run", "--locked"]))
            .describe("Run the test suite")
            .reads(SourceFilter::cargo_sources())
            .uses_dependency_cache(),
        TaskSpec::new("coverage", TaskCommand::new("cargo", &["llvm-cov", "nextest", "--locked"]))
            .describe("Measure test coverage")
            .reads(SourceFilter::cargo_sources())
            .uses_dependency_cache()
            .only_on(PlatformSet::only(COVERAGE_PLATFORMS.iter().copied())),
    ]
}
