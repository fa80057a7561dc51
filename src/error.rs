//! Error types for Preflight
//!
//! All modules use `PreflightResult<T>` as their return type. The three
//! pipeline-level failures (`BuildFailure`, `TaskExecutionFailure`,
//! `FilterError`) are separate types because each has its own
//! propagation rule: build failures fan out, task failures stay local,
//! filter errors abort the run.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for Preflight operations
pub type PreflightResult<T> = Result<T, PreflightError>;

/// The dependency toolchain failed to produce an artifact.
///
/// Cloneable so a single failure can be handed to every waiter on a
/// shared build and recorded as the cause for every dependent task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency build failed ({toolchain}): {reason}")]
pub struct BuildFailure {
    /// Toolchain that was invoked
    pub toolchain: String,
    /// Human-readable cause, usually the tail of the toolchain output
    pub reason: String,
}

impl BuildFailure {
    pub fn new(toolchain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            toolchain: toolchain.into(),
            reason: reason.into(),
        }
    }
}

/// A task's command returned non-zero or could not be launched.
#[derive(Error, Debug, Clone)]
pub enum TaskExecutionFailure {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("{command} exited with {}", exit_label(.code))]
    Exit {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("failed to prepare workspace: {0}")]
    Workspace(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

impl TaskExecutionFailure {
    /// Captured command output, if any
    pub fn output(&self) -> &str {
        match self {
            Self::Exit { output, .. } => output,
            _ => "",
        }
    }
}

/// A source predicate is malformed or the source tree could not be read.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid source filter '{spec}': {reason}")]
    Malformed { spec: String, reason: String },

    #[error("unreadable source path {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors that can occur in Preflight
#[derive(Error, Debug)]
pub enum PreflightError {
    // Pipeline errors
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Build(#[from] BuildFailure),

    #[error("Duplicate task name in registry: {0}")]
    DuplicateTask(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Task {name} has an empty command")]
    EmptyCommand { name: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file already exists: {0}")]
    ConfigExists(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PreflightError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error is a registry/config problem detected before any task ran
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Filter(_)
                | Self::DuplicateTask(_)
                | Self::UnknownTask(_)
                | Self::EmptyCommand { .. }
                | Self::ConfigInvalid { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Filter(FilterError::Malformed { .. }) => Some(
                "Source filters look like: all, manifests, ext:rs,toml, name:deny.toml, dir:src (join with '+')",
            ),
            Self::DuplicateTask(_) => Some("Rename the custom task or disable the built-in one"),
            Self::ConfigExists(_) => Some("Use --force to overwrite"),
            Self::UnknownTask(_) => Some("Run: preflight tasks --all"),
            Self::PathNotFound(_) => Some("Pass an existing directory with --project"),
            _ => None,
        }
    }
}
