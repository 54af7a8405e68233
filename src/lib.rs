//! # manifest-dl
//!
//! Bulk image downloader driven by JSON manifests.
//!
//! ## Pipeline
//!
//! - [`manifest`] reads manifests into [`DownloadTask`]s
//! - [`filter`] drops tasks whose destination already exists (optional)
//! - [`Downloader`] runs one [`worker::FetchWorker`] per task, at most
//!   [`Config::concurrency`] at a time, and folds the outcomes into a [`RunSummary`]
//!
//! Individual task failures never abort a run; they are retried with linear backoff and
//! then reported as failed outcomes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use manifest_dl::{Config, Downloader, manifest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         manifests: vec!["train.json".into()],
//!         skip_existing: true,
//!         ..Default::default()
//!     };
//!
//!     let tasks = manifest::load_tasks(&config.manifests, &config.output_root)
//!         .await?
//!         .ensure_loaded()?;
//!
//!     let downloader = Downloader::new(config)?;
//!     let summary = downloader.run(tasks.tasks).await;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// HTTP fetching
pub mod fetcher;
/// Existing-file filter
pub mod filter;
/// Admission gate
pub mod gate;
/// Manifest parsing
pub mod manifest;
/// Download orchestration
pub mod orchestrator;
/// Console progress reporting
pub mod progress;
/// Retry logic with linear backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Per-task fetch worker
pub mod worker;

// Re-export commonly used types
pub use config::{Config, HttpConfig, RetryConfig};
pub use error::{Error, Result};
pub use fetcher::{Fetcher, HttpFetcher};
pub use gate::{AdmissionGate, GatePermit};
pub use orchestrator::Downloader;
pub use progress::{FailurePrinter, ProgressReporter};
pub use retry::{IsRetryable, Sleeper, TokioSleeper};
pub use types::{DownloadOutcome, DownloadTask, Event, RunSummary};

/// Wait for a termination signal, then ask the downloader to stop.
///
/// In-flight attempts finish; tasks still waiting for a permit are cancelled.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn shutdown_on_signal(downloader: Downloader) {
    wait_for_signal().await;
    downloader.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for SIGINT only"
            );
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGINT handler, waiting for SIGTERM only"
            );
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
