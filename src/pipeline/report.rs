//! Task results and the aggregated pipeline report

use crate::cache::Fingerprint;
use crate::task::Platform;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Reason recorded for tasks stopped or never started by a cancelled run
pub const CANCELLED: &str = "cancelled";

/// Outcome of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failure { reason: String },
    Skipped { reason: String },
}

impl TaskStatus {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Failure { .. } => "FAILED",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Outcome of one task execution
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub name: String,
    #[serde(flatten)]
    pub status: TaskStatus,
    /// Captured command output, or the cause of a failure
    pub diagnostics: String,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl TaskResult {
    pub fn new(name: impl Into<String>, status: TaskStatus, diagnostics: String, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status,
            diagnostics,
            duration,
        }
    }

    /// A task that never ran because the run was cancelled
    pub fn cancelled(name: impl Into<String>) -> Self {
        Self::new(name, TaskStatus::skipped(CANCELLED), String::new(), Duration::ZERO)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis().try_into().unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Success,
    Failure,
}

/// Aggregated result of one pipeline run. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub platform: Platform,
    pub overall: OverallStatus,
    /// Fingerprint of the dependency view, when any task needed it
    pub dependency_fingerprint: Option<Fingerprint>,
    /// Whether the dependency entry already existed before this run
    pub cache_hit: Option<bool>,
    pub started_at: DateTime<Utc>,
    /// Wall-clock time of the whole run, dependency build included
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub cancelled: bool,
    pub results: Vec<TaskResult>,
}

impl PipelineReport {
    pub fn new(
        platform: Platform,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        dependency_fingerprint: Option<Fingerprint>,
        cache_hit: Option<bool>,
        cancelled: bool,
        results: Vec<TaskResult>,
    ) -> Self {
        // Skipped tasks never count against the run
        let overall = if results.iter().any(|r| r.status.is_failure()) {
            OverallStatus::Failure
        } else {
            OverallStatus::Success
        };

        Self {
            platform,
            overall,
            dependency_fingerprint,
            cache_hit,
            started_at,
            elapsed,
            cancelled,
            results,
        }
    }

    pub fn is_success(&self) -> bool {
        self.overall == OverallStatus::Success
    }

    /// Process exit code: 0 success, 1 any failure, 130 interrupted
    pub fn exit_code(&self) -> u8 {
        if self.cancelled {
            130
        } else if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn count(&self, predicate: impl Fn(&TaskStatus) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.status)).count()
    }

    /// Sum of task durations; exceeds `elapsed` when tasks ran in parallel
    pub fn task_time(&self) -> Duration {
        self.results.iter().map(|r| r.duration).sum()
    }
}

/// Last `max_lines` lines of `output`, for report excerpts
pub fn excerpt(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: TaskStatus) -> TaskResult {
        TaskResult::new(name, status, String::new(), Duration::from_millis(5))
    }

    fn report(results: Vec<TaskResult>, cancelled: bool) -> PipelineReport {
        PipelineReport::new(
            Platform::new("x"),
            Utc::now(),
            Duration::from_millis(900),
            None,
            None,
            cancelled,
            results,
        )
    }

    #[test]
    fn any_failure_fails_the_run() {
        let report = report(
            vec![
                result("build", TaskStatus::Success),
                result("lint", TaskStatus::failure("exit 1")),
                result("audit", TaskStatus::Success),
            ],
            false,
        );
        assert_eq!(report.overall, OverallStatus::Failure);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.results.len(), 3);
    }

    #[test]
    fn skipped_tasks_do_not_fail_the_run() {
        let report = report(
            vec![
                result("build", TaskStatus::Success),
                result("lint", TaskStatus::skipped("not needed")),
            ],
            false,
        );
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn cancelled_run_exits_130() {
        let report = report(vec![TaskResult::cancelled("build")], true);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 130);
    }

    #[test]
    fn excerpt_keeps_tail() {
        let output = "one\ntwo\nthree\nfour";
        assert_eq!(excerpt(output, 2), "three\nfour");
        assert_eq!(excerpt(output, 10), output);
        assert_eq!(excerpt("", 3), "");
    }

    #[test]
    fn json_shape() {
        let report = report(
            vec![TaskResult::new(
                "fmt",
                TaskStatus::failure("cargo fmt exited with code 1"),
                "Diff in src/lib.rs".to_string(),
                Duration::from_millis(1500),
            )],
            false,
        );
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["overall"], "failure");
        assert_eq!(json["platform"], "x");
        assert_eq!(json["results"][0]["status"], "failure");
        assert_eq!(json["results"][0]["reason"], "cargo fmt exited with code 1");
        assert_eq!(json["results"][0]["duration_ms"], 1500);
        assert_eq!(json["elapsed_ms"], 900);
    }
}
