//! `rclone sync` driver.
//!
//! rclone is started with `--use-json-log`, which makes every stderr line a
//! JSON object. Periodic stats lines carry a `stats` object whose `transfers`
//! and `bytes` fields are cumulative for the run, so the last one seen is the
//! final tally.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;

use guardian_core::TransferStats;

use super::{io_err, Executor, ExecutorError, SyncFailure};

const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// How long to wait for the log reader once rclone has exited or been killed.
const LOG_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RcloneExecutor {
    binary: PathBuf,
    stats_interval: Duration,
    extra_args: Vec<String>,
}

impl RcloneExecutor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            stats_interval: DEFAULT_STATS_INTERVAL,
            extra_args: Vec::new(),
        }
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Extra flags appended after the built-in ones (e.g. `--fast-list`).
    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }

    fn command(&self, source: &str, destination: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("sync")
            .arg(source)
            .arg(destination)
            .arg("--use-json-log")
            .arg("--verbose")
            .arg("--stats")
            .arg(format!("{}ms", self.stats_interval.as_millis().max(1)))
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for RcloneExecutor {
    fn default() -> Self {
        Self::new("rclone")
    }
}

#[async_trait]
impl Executor for RcloneExecutor {
    async fn sync(
        &self,
        cancel: CancellationToken,
        source: &str,
        destination: &str,
    ) -> Result<TransferStats, SyncFailure> {
        let started = Instant::now();
        let program = self.program();

        let mut child = self
            .command(source, destination)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: program.clone(),
                source,
            })?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutorError::other("rclone stderr was not captured"))?;
        let reader = tokio::spawn(read_log(stderr).with_current_subscriber());

        let exit = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        let exit = match exit {
            Some(status) => status.map_err(|e| io_err(&self.binary, e)),
            None => {
                tracing::info!(program = %program, "cancellation requested, stopping rclone");
                if let Err(err) = child.kill().await {
                    tracing::warn!(error = %err, "failed to kill rclone");
                }
                let summary = drain(reader).await;
                return Err(SyncFailure::with_progress(
                    ExecutorError::Cancelled,
                    summary.stats(started.elapsed()),
                ));
            }
        };

        let summary = drain(reader).await;
        let stats = summary.stats(started.elapsed());
        match exit {
            Ok(status) if status.success() => Ok(stats),
            Ok(status) => Err(SyncFailure::with_progress(
                ExecutorError::Exit {
                    program,
                    status: status.to_string(),
                    detail: summary
                        .last_error
                        .unwrap_or_else(|| "no error output".to_string()),
                },
                stats,
            )),
            Err(err) => Err(SyncFailure::with_progress(err, stats)),
        }
    }
}

// ---------------------------------------------------------------------------
// Log parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
struct RcloneStats {
    #[serde(default)]
    transfers: u64,
    #[serde(default)]
    bytes: u64,
}

#[derive(Debug, Deserialize)]
struct LogLine {
    #[serde(default)]
    level: String,
    #[serde(default)]
    msg: String,
    stats: Option<RcloneStats>,
}

/// What the stderr stream told us by the time it closed.
#[derive(Debug, Default)]
struct LogSummary {
    stats: Option<RcloneStats>,
    last_error: Option<String>,
}

impl LogSummary {
    fn observe(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<LogLine>(line) {
            Ok(entry) => {
                if let Some(stats) = entry.stats {
                    self.stats = Some(stats);
                }
                if matches!(entry.level.as_str(), "error" | "critical") && !entry.msg.is_empty() {
                    self.last_error = Some(entry.msg.trim().to_string());
                }
            }
            // Usage errors are printed before the JSON logger is set up.
            Err(_) => self.last_error = Some(line.to_string()),
        }
    }

    fn stats(&self, duration: Duration) -> TransferStats {
        let stats = self.stats.unwrap_or_default();
        TransferStats {
            files_transferred: stats.transfers,
            bytes_transferred: stats.bytes,
            duration,
        }
    }
}

async fn read_log<R: AsyncRead + Unpin>(stream: R) -> LogSummary {
    let mut summary = LogSummary::default();
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::trace!(line = %line, "rclone");
                summary.observe(&line);
            }
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(error = %err, "stopped reading rclone output");
                break;
            }
        }
    }
    summary
}

async fn drain(mut reader: tokio::task::JoinHandle<LogSummary>) -> LogSummary {
    match tokio::time::timeout(LOG_DRAIN_GRACE, &mut reader).await {
        Ok(Ok(summary)) => summary,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "rclone log reader failed");
            LogSummary::default()
        }
        Err(_) => {
            reader.abort();
            tracing::warn!("rclone output still open after exit, ignoring the rest");
            LogSummary::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_stats_line() {
        let mut summary = LogSummary::default();
        summary.observe(r#"{"level":"info","msg":"Copied (new)","object":"a.txt"}"#);
        summary.observe(r#"{"level":"info","msg":"stats","stats":{"bytes":10,"transfers":1,"errors":0}}"#);
        summary.observe(r#"{"level":"info","msg":"stats","stats":{"bytes":4096,"transfers":7,"errors":0}}"#);

        let stats = summary.stats(Duration::from_secs(2));
        assert_eq!(stats.files_transferred, 7);
        assert_eq!(stats.bytes_transferred, 4096);
        assert_eq!(stats.duration, Duration::from_secs(2));
        assert!(summary.last_error.is_none());
    }

    #[test]
    fn records_last_error_message() {
        let mut summary = LogSummary::default();
        summary.observe(r#"{"level":"error","msg":"Failed to sync: directory not found\n"}"#);
        assert_eq!(
            summary.last_error.as_deref(),
            Some("Failed to sync: directory not found")
        );
    }

    #[test]
    fn plain_text_lines_count_as_errors() {
        let mut summary = LogSummary::default();
        summary.observe("Usage: rclone sync source:path dest:path [flags]");
        summary.observe("");
        assert_eq!(
            summary.last_error.as_deref(),
            Some("Usage: rclone sync source:path dest:path [flags]")
        );
        assert_eq!(summary.stats(Duration::ZERO), TransferStats::default());
    }

    #[test]
    fn command_line_shape() {
        let exec = RcloneExecutor::new("/opt/rclone")
            .with_stats_interval(Duration::from_secs(1))
            .with_extra_args(["--fast-list"]);
        let cmd = exec.command("gdrive:", "s3:bucket");
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "/opt/rclone");
        let args: Vec<_> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "sync",
                "gdrive:",
                "s3:bucket",
                "--use-json-log",
                "--verbose",
                "--stats",
                "1000ms",
                "--fast-list"
            ]
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn stuck_log_reader_is_aborted_after_grace() {
        let reader = tokio::spawn(async {
            std::future::pending::<()>().await;
            LogSummary::default()
        });
        let abort = reader.abort_handle();

        let summary = drain(reader).await;
        assert!(summary.stats.is_none());
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished(), "reader task must not outlive drain");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let exec = RcloneExecutor::new("/nonexistent/rclone-binary");
        let failure = exec
            .sync(CancellationToken::new(), "a", "b")
            .await
            .unwrap_err();
        assert!(matches!(failure.error, ExecutorError::Spawn { .. }));
        assert!(failure.partial.is_none());
    }

    #[cfg(unix)]
    mod with_fake_binary {
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        use tempfile::TempDir;

        use super::*;

        fn fake_rclone(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("rclone");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn success_reports_final_stats() {
            let tmp = TempDir::new().unwrap();
            let bin = fake_rclone(
                tmp.path(),
                r#"echo '{"level":"info","msg":"stats","stats":{"bytes":100,"transfers":10}}' >&2
exit 0"#,
            );

            let stats = RcloneExecutor::new(bin)
                .sync(CancellationToken::new(), "source", "dest")
                .await
                .unwrap();
            assert_eq!(stats.files_transferred, 10);
            assert_eq!(stats.bytes_transferred, 100);
        }

        #[tokio::test]
        async fn non_zero_exit_carries_error_and_partial_stats() {
            let tmp = TempDir::new().unwrap();
            let bin = fake_rclone(
                tmp.path(),
                r#"echo '{"level":"info","msg":"stats","stats":{"bytes":5,"transfers":1}}' >&2
echo '{"level":"error","msg":"Failed to sync: quota exceeded"}' >&2
exit 3"#,
            );

            let failure = RcloneExecutor::new(bin)
                .sync(CancellationToken::new(), "source", "dest")
                .await
                .unwrap_err();
            let text = failure.to_string();
            assert!(text.contains("quota exceeded"), "got: {text}");
            assert_eq!(failure.partial.map(|s| s.files_transferred), Some(1));
        }

        #[tokio::test]
        async fn cancellation_kills_the_process() {
            let tmp = TempDir::new().unwrap();
            let bin = fake_rclone(tmp.path(), "exec sleep 30");

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.cancel();
            });

            let failure = tokio::time::timeout(
                Duration::from_secs(5),
                RcloneExecutor::new(bin).sync(cancel, "source", "dest"),
            )
            .await
            .expect("sync returns promptly after cancel")
            .unwrap_err();
            assert!(matches!(failure.error, ExecutorError::Cancelled));
        }
    }
}
