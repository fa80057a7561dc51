//! Run history
//!
//! Appends one JSON line per completed pipeline run to
//! `<state_dir>/preflight/history.log`. Disabled with `general.history = false`.

use crate::config::{schema::Config, ConfigManager};
use crate::pipeline::{PipelineReport, TaskStatus};
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Event name recorded after every run
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";

/// Append-only JSON-lines log of pipeline runs
pub struct RunHistory {
    enabled: bool,
    path: PathBuf,
}

impl RunHistory {
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.history,
            path: ConfigManager::history_path(),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Record a finished run
    pub async fn record(&self, report: &PipelineReport) {
        let failed: Vec<&str> = report
            .results
            .iter()
            .filter(|r| r.status.is_failure())
            .map(|r| r.name.as_str())
            .collect();

        let data = serde_json::json!({
            "platform": report.platform,
            "overall": report.overall,
            "exit_code": report.exit_code(),
            "cancelled": report.cancelled,
            "dependency_fingerprint": report.dependency_fingerprint,
            "cache_hit": report.cache_hit,
            "tasks": report.results.len(),
            "passed": report.count(TaskStatus::is_success),
            "skipped": report.count(TaskStatus::is_skipped),
            "failed": failed,
            "duration_ms": u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        });

        self.log(PIPELINE_COMPLETED, &data).await;
    }

    /// Log an event as a JSON line. Write failures are only warned about.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize history event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write run history {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TaskResult;
    use crate::task::Platform;
    use std::time::Duration;
    use tempfile::TempDir;

    fn history(dir: &TempDir, enabled: bool) -> RunHistory {
        RunHistory {
            enabled,
            path: dir.path().join("state").join("history.log"),
        }
    }

    fn report() -> PipelineReport {
        PipelineReport::new(
            Platform::new("x86_64-linux"),
            Utc::now(),
            Duration::from_millis(1200),
            None,
            Some(true),
            false,
            vec![
                TaskResult::new("fmt", TaskStatus::Success, String::new(), Duration::from_millis(10)),
                TaskResult::new(
                    "clippy",
                    TaskStatus::failure("cargo clippy exited with code 101"),
                    String::new(),
                    Duration::from_millis(20),
                ),
            ],
        )
    }

    #[tokio::test]
    async fn records_completed_run() {
        let dir = TempDir::new().unwrap();
        let history = history(&dir, true);

        history.record(&report()).await;

        let content = tokio::fs::read_to_string(history.path()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();

        assert_eq!(parsed["event"], PIPELINE_COMPLETED);
        assert_eq!(parsed["data"]["platform"], "x86_64-linux");
        assert_eq!(parsed["data"]["overall"], "failure");
        assert_eq!(parsed["data"]["failed"][0], "clippy");
        assert_eq!(parsed["data"]["duration_ms"], 1200);
        assert!(parsed["timestamp"].is_string());
    }

    #[tokio::test]
    async fn appends_multiple_lines() {
        let dir = TempDir::new().unwrap();
        let history = history(&dir, true);

        history.record(&report()).await;
        history.record(&report()).await;

        let content = tokio::fs::read_to_string(history.path()).await.unwrap();
        assert_eq!(content.trim().lines().count(), 2);
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let dir = TempDir::new().unwrap();
        let history = history(&dir, false);

        history.record(&report()).await;

        assert!(!history.path().exists());
    }
}
