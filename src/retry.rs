//! Retry logic with linear backoff
//!
//! An operation is attempted up to [`RetryConfig::max_attempts`] times. After failed attempt
//! `n` the caller sleeps `base_delay * n` before trying again, so the default policy
//! (3 attempts, 200 ms) waits 200 ms and then 400 ms.
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can observe the exact delays
//! without waiting on a real clock.
//!
//! # Example
//!
//! ```no_run
//! use manifest_dl::config::RetryConfig;
//! use manifest_dl::error::Error;
//! use manifest_dl::retry::{TokioSleeper, retry_linear};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let (result, attempts) = retry_linear(
//!     &config,
//!     &TokioSleeper,
//!     &cancel,
//!     |_attempt| async { Ok::<_, Error>(42) },
//!     |_attempt, _delay, _error| {},
//! )
//! .await;
//! assert_eq!(result?, 42);
//! assert_eq!(attempts, 1);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, bad statuses, disk hiccups) should return
/// `true`. Failures that cannot change between attempts should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Anything that goes wrong on the wire is worth another attempt
            Error::Network(_) | Error::HttpStatus { .. } => true,
            // Write failures are retried like fetch failures
            Error::Write { .. } | Error::Io(_) => true,
            // A URL that does not parse will not parse next time either
            Error::InvalidUrl { .. } => false,
            Error::ShuttingDown => false,
            Error::Config { .. }
            | Error::ManifestNotFound(_)
            | Error::NoManifests
            | Error::Manifest { .. } => false,
            Error::Other(_) => false,
        }
    }
}

/// Abstraction over waiting, enabling deterministic backoff tests
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Production [`Sleeper`] backed by the tokio timer
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Delay inserted after failed attempt `attempt` (1-based)
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let delay = config.base_delay.saturating_mul(attempt);
    if config.jitter { add_jitter(delay) } else { delay }
}

/// Execute an async operation with linear backoff retry logic
///
/// `operation` receives the 1-based attempt number. `on_retry` is called with the failed
/// attempt, the delay about to be slept, and the error, before each backoff. Returns the
/// final result together with the number of attempts made (always at least 1).
///
/// Cancellation is checked between attempts: once `cancel` fires the current attempt is
/// allowed to finish, a pending backoff sleep is cut short, and a failure that would have
/// been retried is reported as [`Error::ShuttingDown`].
pub async fn retry_linear<F, Fut, T, R>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    mut operation: F,
    mut on_retry: R,
) -> (Result<T, Error>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
    R: FnMut(u32, Duration, &Error),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "Operation succeeded after retry");
                }
                return (Ok(value), attempt);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                if cancel.is_cancelled() {
                    return (Err(Error::ShuttingDown), attempt);
                }

                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, retrying"
                );
                on_retry(attempt, delay, &e);

                tokio::select! {
                    _ = sleeper.sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return (Err(Error::ShuttingDown), attempt);
                    }
                }

                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::debug!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return (Err(e), attempt);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
