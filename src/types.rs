//! Core types and events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One (URL, destination) pair derived from a manifest record
///
/// Immutable once created. The same destination may appear in several tasks; nothing
/// deduplicates them and concurrent writers to one path race.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Remote resource to fetch
    pub url: String,
    /// Local path the body is written to
    pub dest: PathBuf,
    /// File name of the manifest this task came from (diagnostic only)
    pub source: String,
}

impl DownloadTask {
    /// Create a task
    pub fn new(
        url: impl Into<String>,
        dest: impl Into<PathBuf>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            source: source.into(),
        }
    }
}

/// Terminal result of processing one task
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// The task this outcome belongs to
    pub task: DownloadTask,
    /// Whether the body was written to `task.dest`
    pub success: bool,
    /// Attempts made, between 1 and the retry budget
    pub attempts: u32,
    /// Description of the last error when `success` is false
    pub error: Option<String>,
}

impl DownloadOutcome {
    pub(crate) fn succeeded(task: DownloadTask, attempts: u32) -> Self {
        Self {
            task,
            success: true,
            attempts,
            error: None,
        }
    }

    pub(crate) fn failed(task: DownloadTask, attempts: u32, error: String) -> Self {
        Self {
            task,
            success: false,
            attempts,
            error: Some(error),
        }
    }

    /// Console diagnostic for a failed outcome: `Failed: <url> -> <dest> (<error>)`
    pub fn failure_line(&self) -> Option<String> {
        if self.success {
            return None;
        }
        Some(failure_line(
            &self.task.url,
            &self.task.dest,
            self.error.as_deref().unwrap_or("unknown error"),
        ))
    }
}

/// Format the per-failure console line
pub fn failure_line(url: &str, dest: &Path, error: &str) -> String {
    format!("Failed: {url} -> {} ({error})", dest.display())
}

/// Aggregate counts for a run
///
/// Without an interrupt `attempted + skipped == total` and `succeeded + failed == attempted`.
/// Tasks that never started because of a shutdown are counted in `cancelled`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tasks considered (skipped or submitted)
    pub total: usize,
    /// Tasks skipped because their destination already existed
    pub skipped: usize,
    /// Tasks that made at least one attempt
    pub attempted: usize,
    /// Attempted tasks that ended in success
    pub succeeded: usize,
    /// Attempted tasks that ended in failure
    pub failed: usize,
    /// Submitted tasks that never started because of shutdown
    pub cancelled: usize,
}

impl RunSummary {
    /// Fold one outcome into the counts
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        self.attempted += 1;
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Number of tasks that reached a terminal state or were cancelled
    pub fn finished(&self) -> usize {
        self.attempted + self.cancelled
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Summary: Success: {} | Failed: {}", self.succeeded, self.failed)?;
        if self.cancelled > 0 {
            write!(f, " | Cancelled: {}", self.cancelled)?;
        }
        Ok(())
    }
}

/// Event emitted by the downloader
///
/// Consumers subscribe via [`Downloader::subscribe`](crate::Downloader::subscribe).
/// `completed` counts are monotonically increasing across a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Run started with this many tasks to fetch
    RunStarted {
        /// Tasks submitted to workers
        pending: usize,
        /// Tasks skipped by the existing-file filter
        skipped: usize,
    },

    /// A worker acquired its permit and is about to make the first attempt
    TaskStarted {
        /// Task URL
        url: String,
    },

    /// An attempt failed and the task will be retried after `delay_ms`
    Retrying {
        /// Task URL
        url: String,
        /// The attempt that failed
        attempt: u32,
        /// Backoff before the next attempt
        delay_ms: u64,
        /// Error description
        error: String,
    },

    /// Task finished successfully
    TaskCompleted {
        /// Task URL
        url: String,
        /// Destination written
        dest: PathBuf,
        /// Attempts taken
        attempts: u32,
        /// Tasks finished so far in this run
        completed: usize,
    },

    /// Task failed after exhausting its retries
    TaskFailed {
        /// Task URL
        url: String,
        /// Destination that was not written
        dest: PathBuf,
        /// Attempts taken
        attempts: u32,
        /// Last error description
        error: String,
        /// Tasks finished so far in this run
        completed: usize,
    },

    /// All workers joined
    RunFinished {
        /// Final counts
        summary: RunSummary,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> DownloadTask {
        DownloadTask::new("https://img.example.com/a.jpg", "/out/a.jpg", "train.json")
    }

    #[test]
    fn failure_line_names_url_dest_and_error() {
        let outcome = DownloadOutcome::failed(task(), 3, "HTTP status 404".to_string());
        assert_eq!(
            outcome.failure_line().as_deref(),
            Some("Failed: https://img.example.com/a.jpg -> /out/a.jpg (HTTP status 404)")
        );
    }

    #[test]
    fn successful_outcome_has_no_failure_line() {
        let outcome = DownloadOutcome::succeeded(task(), 1);
        assert!(outcome.failure_line().is_none());
    }

    #[test]
    fn summary_records_keep_counts_consistent() {
        let mut summary = RunSummary {
            total: 4,
            skipped: 1,
            ..RunSummary::default()
        };
        summary.record(&DownloadOutcome::succeeded(task(), 1));
        summary.record(&DownloadOutcome::succeeded(task(), 2));
        summary.record(&DownloadOutcome::failed(task(), 3, "boom".to_string()));

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded + summary.failed, summary.attempted);
        assert_eq!(summary.attempted + summary.skipped, summary.total);
    }

    #[test]
    fn summary_display_matches_console_format() {
        let summary = RunSummary {
            succeeded: 2,
            failed: 1,
            ..RunSummary::default()
        };
        assert_eq!(summary.to_string(), "Summary: Success: 2 | Failed: 1");

        let interrupted = RunSummary {
            cancelled: 5,
            ..summary
        };
        assert_eq!(
            interrupted.to_string(),
            "Summary: Success: 2 | Failed: 1 | Cancelled: 5"
        );
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::TaskStarted {
            url: "https://img.example.com/a.jpg".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "task_started");
    }
}
