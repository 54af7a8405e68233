//! Console progress reporting driven by downloader events.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::types::{DownloadOutcome, Event};

const BAR_TEMPLATE: &str =
    "Downloading {percent:>3}%|{bar:40.cyan/blue}| {pos}/{len} [{elapsed_precise}<{eta_precise}]";

/// Renders a live progress bar from downloader events
pub struct ProgressReporter {
    bar: ProgressBar,
}

/// Prints one `Failed:` line per failed outcome, above the bar when one is drawn
#[derive(Clone)]
pub struct FailurePrinter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Reporter for a run of `total` tasks
    pub fn new(total: u64, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉ "),
            );
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    /// Printer sharing this reporter's bar
    pub fn failure_printer(&self) -> FailurePrinter {
        FailurePrinter {
            bar: self.bar.clone(),
        }
    }

    /// Consume events until the run finishes; resolves to the final bar position
    pub fn spawn(self, mut events: broadcast::Receiver<Event>) -> JoinHandle<u64> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Event::TaskCompleted { completed, .. })
                    | Ok(Event::TaskFailed { completed, .. }) => {
                        self.bar.set_position(completed as u64);
                    }
                    Ok(Event::RunFinished { summary }) => {
                        self.bar.set_position(summary.finished() as u64);
                        break;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "Progress reporter fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            self.bar.finish();
            self.bar.position()
        })
    }
}

impl FailurePrinter {
    /// Print the diagnostic for `outcome` if it failed; returns whether a line was printed
    pub fn report(&self, outcome: &DownloadOutcome) -> bool {
        let Some(line) = outcome.failure_line() else {
            return false;
        };
        if self.bar.is_hidden() {
            println!("{line}");
        } else {
            self.bar.println(line);
        }
        true
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DownloadTask, RunSummary};
    use std::path::PathBuf;

    #[tokio::test]
    async fn reporter_tracks_position_and_stops_on_run_finished() {
        let (tx, rx) = broadcast::channel(16);
        let handle = ProgressReporter::new(2, false).spawn(rx);

        tx.send(Event::TaskCompleted {
            url: "https://img.example.com/a".to_string(),
            dest: PathBuf::from("out/a.jpg"),
            attempts: 1,
            completed: 1,
        })
        .unwrap();
        tx.send(Event::TaskFailed {
            url: "https://img.example.com/b".to_string(),
            dest: PathBuf::from("out/b.jpg"),
            attempts: 3,
            error: "HTTP status 404".to_string(),
            completed: 2,
        })
        .unwrap();
        tx.send(Event::RunFinished {
            summary: RunSummary {
                total: 3,
                attempted: 2,
                succeeded: 1,
                failed: 1,
                cancelled: 1,
                ..RunSummary::default()
            },
        })
        .unwrap();

        assert_eq!(handle.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reporter_exits_when_sender_is_dropped() {
        let (tx, rx) = broadcast::channel::<Event>(4);
        let handle = ProgressReporter::new(0, false).spawn(rx);
        drop(tx);

        assert_eq!(handle.await.unwrap(), 0);
    }

    #[test]
    fn printer_reports_only_failures() {
        let printer = ProgressReporter::new(2, false).failure_printer();
        let task = DownloadTask::new("https://img.example.com/a", "out/a.jpg", "m.json");

        assert!(!printer.report(&DownloadOutcome::succeeded(task.clone(), 1)));
        assert!(printer.report(&DownloadOutcome::failed(task, 3, "HTTP status 404".into())));
    }
}
