//! Progress reporting trait.
//!
//! Decouples the engine from any specific front-end. All callbacks are
//! invoked from the scheduler thread, in the order the scheduler observes
//! events; no ordering is implied between files of different jobs.

use std::path::Path;

use crate::model::{FileOutcome, RunSummary, TransferJob};

/// Trait for receiving progress updates from a migration run.
///
/// The CLI provides a stderr implementation; tests use recording fakes
/// (also the basis of the bounded-concurrency assertion).
pub trait ProgressCallback: Send {
    /// Called once after classification, before any job is submitted.
    fn on_run_started(&self, subtree_jobs: usize, inline_files: usize) {
        let _ = (subtree_jobs, inline_files);
    }

    /// Called when a subtree job is handed to a worker.
    fn on_job_started(&self, subtree: &str) {
        let _ = subtree;
    }

    /// Called for every processed item as its outcome reaches the scheduler.
    fn on_file_completed(&self, subtree: &str, path: &Path, outcome: &FileOutcome) {
        let _ = (subtree, path, outcome);
    }

    /// Called when a subtree job reaches a terminal state.
    fn on_job_completed(&self, job: &TransferJob) {
        let _ = job;
    }

    /// Called once with the final summary, even after partial failures.
    fn on_run_completed(&self, summary: &RunSummary) {
        let _ = summary;
    }
}
