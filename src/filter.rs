//! Existing-file filter applied before any task is submitted.
//!
//! The check happens once, before the run starts. A file that appears or disappears
//! afterwards is not noticed; that race is accepted.

use crate::types::DownloadTask;

/// Whether `task` should be skipped under the given policy
pub fn should_skip(task: &DownloadTask, skip_existing: bool) -> bool {
    skip_existing && task.dest.exists()
}

/// Split tasks into (to download, skipped count)
pub fn partition(tasks: Vec<DownloadTask>, skip_existing: bool) -> (Vec<DownloadTask>, usize) {
    if !skip_existing {
        return (tasks, 0);
    }

    let total = tasks.len();
    let pending: Vec<DownloadTask> = tasks
        .into_iter()
        .filter(|task| !should_skip(task, skip_existing))
        .collect();
    let skipped = total - pending.len();

    if skipped > 0 {
        tracing::debug!(skipped, "Skipping tasks whose destination already exists");
    }

    (pending, skipped)
}
