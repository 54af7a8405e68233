//! Fetch worker: one URL to file transfer with bounded retries.
//!
//! Lifecycle of a single task:
//! 1. Create the destination's parent directory
//! 2. Wait for an admission gate permit (or bail out on shutdown)
//! 3. Fetch and write, retrying with linear backoff
//! 4. Drop the permit and return the outcome

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::gate::AdmissionGate;
use crate::retry::{Sleeper, retry_linear};
use crate::types::{DownloadOutcome, DownloadTask, Event};

/// Shared state every worker of a run needs (cheap to clone)
#[derive(Clone)]
pub struct FetchWorker {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) gate: AdmissionGate,
    pub(crate) retry: RetryConfig,
    pub(crate) cancel: CancellationToken,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl FetchWorker {
    /// Process one task
    ///
    /// Returns `None` if shutdown was requested before the task acquired a permit; such a
    /// task made no attempt and has no outcome.
    pub async fn run(&self, task: DownloadTask) -> Option<DownloadOutcome> {
        if self.cancel.is_cancelled() {
            return None;
        }

        if let Err(e) = ensure_parent_dir(&task.dest).await {
            // The write below fails the same way and goes through the retry path
            tracing::warn!(
                dest = %task.dest.display(),
                error = %e,
                "Failed to create parent directory"
            );
        }

        let permit = self.gate.acquire_or_cancel(&self.cancel).await?;

        tracing::debug!(url = %task.url, dest = %task.dest.display(), "Task admitted");
        self.event_tx
            .send(Event::TaskStarted {
                url: task.url.clone(),
            })
            .ok();

        let (result, attempts) = retry_linear(
            &self.retry,
            self.sleeper.as_ref(),
            &self.cancel,
            |_attempt| self.attempt(&task),
            |attempt, delay, error| self.notify_retry(&task, attempt, delay, error),
        )
        .await;

        permit.release();

        match result {
            Ok(bytes) => {
                tracing::debug!(url = %task.url, attempts, bytes, "Downloaded");
                Some(DownloadOutcome::succeeded(task, attempts))
            }
            Err(e) => {
                tracing::warn!(
                    url = %task.url,
                    dest = %task.dest.display(),
                    attempts,
                    error = %e,
                    "Download failed"
                );
                Some(DownloadOutcome::failed(task, attempts, e.to_string()))
            }
        }
    }

    /// One fetch-and-write attempt; returns the number of bytes written
    async fn attempt(&self, task: &DownloadTask) -> Result<usize> {
        let body = self.fetcher.fetch(&task.url).await?;
        write_body(&task.dest, &body).await?;
        Ok(body.len())
    }

    fn notify_retry(&self, task: &DownloadTask, attempt: u32, delay: Duration, error: &Error) {
        self.event_tx
            .send(Event::Retrying {
                url: task.url.clone(),
                attempt,
                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error: error.to_string(),
            })
            .ok();
    }
}

/// Create the parent directory of `dest` if it has one
pub async fn ensure_parent_dir(dest: &Path) -> std::io::Result<()> {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

/// Write the whole body to `dest`, replacing any existing file
///
/// This is a direct write, not write-then-rename: a concurrent reader of the same path
/// can observe a partial file, and two tasks sharing a destination race.
async fn write_body(dest: &Path, body: &[u8]) -> Result<()> {
    tokio::fs::write(dest, body)
        .await
        .map_err(|source| Error::Write {
            path: dest.to_path_buf(),
            source,
        })
}
