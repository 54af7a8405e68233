//! Download orchestrator. Fans out one fetch worker per task and aggregates outcomes.
//!
//! Every task becomes its own tokio task; the admission gate decides how many of them are
//! inside a fetch at once. Outcomes are drained by a single loop that owns the
//! [`RunSummary`], so no outcome is lost or counted twice regardless of completion order.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::filter;
use crate::gate::AdmissionGate;
use crate::retry::{Sleeper, TokioSleeper};
use crate::types::{DownloadOutcome, DownloadTask, Event, RunSummary};
use crate::worker::FetchWorker;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Downloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Worker template cloned into every spawned task
    pub(crate) worker: FetchWorker,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancelled on shutdown; stops new attempts from starting
    pub(crate) cancel: CancellationToken,
    /// Tasks finished in the current run
    pub(crate) completed: Arc<AtomicUsize>,
}

impl Downloader {
    /// Create a downloader that fetches over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.http)?;
        Self::with_fetcher(config, Arc::new(fetcher), Arc::new(TokioSleeper))
    }

    /// Create a downloader with custom fetch and sleep implementations
    pub fn with_fetcher(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        config.validate_engine()?;

        let gate = AdmissionGate::new(config.concurrency)?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let worker = FetchWorker {
            fetcher,
            sleeper,
            gate,
            retry: config.retry.clone(),
            cancel: cancel.clone(),
            event_tx: event_tx.clone(),
        };

        Ok(Self {
            config: Arc::new(config),
            worker,
            event_tx,
            cancel,
            completed: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Stop starting new work; in-flight attempts are allowed to finish
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Shutdown requested, finishing in-flight attempts");
        }
        self.cancel.cancel();
    }

    /// Configuration this downloader was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The admission gate shared by all workers
    pub fn gate(&self) -> &AdmissionGate {
        &self.worker.gate
    }

    /// Tasks finished so far in the current run
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Apply the existing-file filter from the configuration, then download
    pub async fn run(&self, tasks: Vec<DownloadTask>) -> RunSummary {
        let (pending, skipped) = filter::partition(tasks, self.config.skip_existing);
        self.execute(pending, skipped).await
    }

    /// Download already-filtered tasks
    ///
    /// `skipped` is only carried into the summary. Returns once every spawned worker has
    /// been joined.
    pub async fn execute(&self, pending: Vec<DownloadTask>, skipped: usize) -> RunSummary {
        self.execute_with(pending, skipped, |_| {}).await
    }

    /// Download already-filtered tasks, handing every outcome to `on_outcome`
    ///
    /// `on_outcome` runs on the aggregation loop once per attempted task, in completion
    /// order. Unlike event subscribers it cannot lag, so it is where failures get printed.
    pub async fn execute_with<F>(
        &self,
        pending: Vec<DownloadTask>,
        skipped: usize,
        mut on_outcome: F,
    ) -> RunSummary
    where
        F: FnMut(&DownloadOutcome),
    {
        let mut summary = RunSummary {
            total: pending.len() + skipped,
            skipped,
            ..RunSummary::default()
        };
        self.completed.store(0, Ordering::SeqCst);

        self.event_tx
            .send(Event::RunStarted {
                pending: pending.len(),
                skipped,
            })
            .ok();
        tracing::info!(
            total = summary.total,
            pending = pending.len(),
            skipped,
            concurrency = self.worker.gate.capacity(),
            "Starting downloads"
        );

        let mut workers = JoinSet::new();
        for task in pending {
            if self.cancel.is_cancelled() {
                summary.cancelled += 1;
                continue;
            }
            workers.spawn(supervise(self.worker.clone(), task));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Some(outcome)) => {
                    on_outcome(&outcome);
                    self.record(&mut summary, outcome);
                }
                Ok(None) => summary.cancelled += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Download supervisor task failed");
                    summary.attempted += 1;
                    summary.failed += 1;
                    self.completed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Downloads finished"
        );
        self.event_tx.send(Event::RunFinished { summary }).ok();

        summary
    }

    fn record(&self, summary: &mut RunSummary, outcome: DownloadOutcome) {
        summary.record(&outcome);
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        let DownloadOutcome {
            task,
            success,
            attempts,
            error,
        } = outcome;

        let event = if success {
            Event::TaskCompleted {
                url: task.url,
                dest: task.dest,
                attempts,
                completed,
            }
        } else {
            Event::TaskFailed {
                url: task.url,
                dest: task.dest,
                attempts,
                error: error.unwrap_or_default(),
                completed,
            }
        };
        self.event_tx.send(event).ok();
    }
}

/// Run the worker in its own task so a panic still yields a failed outcome for its task
async fn supervise(worker: FetchWorker, task: DownloadTask) -> Option<DownloadOutcome> {
    let fallback = task.clone();
    match tokio::spawn(async move { worker.run(task).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(url = %fallback.url, error = %e, "Download worker panicked");
            Some(DownloadOutcome::failed(
                fallback,
                1,
                format!("worker panicked: {e}"),
            ))
        }
    }
}
