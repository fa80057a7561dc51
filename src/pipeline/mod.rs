//! Pipeline execution
//!
//! The orchestrator resolves the tasks for a platform, obtains the shared
//! dependency artifact once, runs every task (fail-open) and aggregates
//! the outcomes into a `PipelineReport` in declared order.

pub mod cancel;
pub mod executor;
pub mod orchestrator;
pub mod report;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use executor::{Execution, ProcessExecutor, TaskContext, TaskExecutor};
pub use orchestrator::{plan_dependencies, DependencyPlan, Orchestrator, PipelineOptions, TaskObserver};
pub use report::{excerpt, OverallStatus, PipelineReport, TaskResult, TaskStatus};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tracing::debug;

/// Environment variable naming the platform a command runs for
pub const PLATFORM_ENV: &str = "PREFLIGHT_PLATFORM";

/// Environment variable pointing at the artifact directory a build fills
pub const ARTIFACT_DIR_ENV: &str = "PREFLIGHT_ARTIFACT_DIR";

/// Environment variable pointing at the read-only cached dependency entry
pub const DEPS_DIR_ENV: &str = "PREFLIGHT_DEPS_DIR";

/// Read stdout and stderr of a child line by line until both close.
///
/// Lines are interleaved in arrival order and passed to `on_line` as they
/// come in. Missing pipes count as already closed. Bytes that are not
/// UTF-8 are replaced, never treated as end of output.
pub(crate) async fn collect_output(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    on_line: &(dyn Fn(&str) + Send + Sync),
) -> Vec<String> {
    let mut stdout_lines = stdout.map(RawLines::new);
    let mut stderr_lines = stderr.map(RawLines::new);

    let mut all_output = Vec::new();

    while stdout_lines.is_some() || stderr_lines.is_some() {
        let stdout_open = stdout_lines.is_some();
        let stderr_open = stderr_lines.is_some();
        tokio::select! {
            line = next_line(&mut stdout_lines), if stdout_open => {
                if let Some(line) = line {
                    on_line(&line);
                    all_output.push(line);
                }
            },
            line = next_line(&mut stderr_lines), if stderr_open => {
                if let Some(line) = line {
                    on_line(&line);
                    all_output.push(line);
                }
            },
        }
    }

    all_output
}

/// Newline-delimited reader that keeps partial lines across cancelled reads
struct RawLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> RawLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// Next line of a stream; the stream is closed (set to `None`) at EOF or on
/// a read error, so a child never blocks on a pipe nobody reads
async fn next_line<R>(lines: &mut Option<RawLines<R>>) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let stream = lines.as_mut()?;
    match stream.next_line().await {
        Ok(Some(line)) => Some(line),
        Ok(None) => {
            *lines = None;
            None
        }
        Err(e) => {
            debug!("Dropping child output stream after read error: {}", e);
            *lines = None;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use std::time::Duration;
    use tokio::process::Command;

    #[tokio::test]
    async fn invalid_utf8_is_replaced_and_reading_continues() {
        let mut child = Command::new("sh")
            .args(["-c", "printf 'ok\\n\\377\\376\\nafter\\r\\nlast'"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let lines = tokio::time::timeout(
            Duration::from_secs(10),
            collect_output(child.stdout.take(), child.stderr.take(), &|_: &str| {}),
        )
        .await
        .unwrap();
        child.wait().await.unwrap();

        assert_eq!(lines, vec!["ok", "\u{FFFD}\u{FFFD}", "after", "last"]);
    }
}
