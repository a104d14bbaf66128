//! Core data model for migration runs.
//!
//! This module defines the main data structures shared across the engine:
//! - TransferJob: one subtree migration, owned by a single worker
//! - FileItem: a single file or directory within a job
//! - RunTotals / RunSummary: run-wide aggregate counters
//! - WorkerEvent / FileOutcome: the worker-to-scheduler reporting protocol

use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A top-level entry of the source root, read once per run.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// Entry name as it appears in the source root
    pub name: String,
    /// Absolute path of the entry
    pub path: PathBuf,
    /// True if the entry is a directory (one migration job per directory)
    pub is_dir: bool,
}

/// The operation mode for a migration run.
///
/// The mode is an explicit configuration choice for the whole run; it is
/// never inferred, and Copy and Move cannot be mixed within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Copy files; the source tree is left untouched
    Copy,
    /// Move files; a source file is removed only after its target copy is
    /// verified written, and emptied source directories are pruned afterwards
    Move,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Copy => write!(f, "Copy"),
            Mode::Move => write!(f, "Move"),
        }
    }
}

/// The state of an individual file within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Not yet processed
    Pending,
    /// Currently transferring
    Copying,
    /// Successfully copied or directory created
    Done,
    /// Content already present at the target (hash-identical), or symlink
    Skipped,
    /// Target existed with different content; preserved under a
    /// disambiguated name
    Conflict,
    /// Error occurred; file not transferred
    Failed,
}

impl FileState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Done | FileState::Skipped | FileState::Conflict | FileState::Failed
        )
    }
}

/// The state of an entire subtree job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created, not yet started
    Pending,
    /// Currently executing on a worker
    Running,
    /// All files processed (individual files may still have failed)
    Completed,
    /// The job itself could not run (e.g. target root not creatable)
    Failed,
}

/// Represents a single file or directory within a subtree job.
#[derive(Debug, Clone)]
pub struct FileItem {
    /// Full source path
    pub source_path: PathBuf,
    /// Resolved full target path
    pub target_path: PathBuf,
    /// Path relative to the subtree root; feeds the enumeration digest
    pub rel_path: PathBuf,
    /// File size in bytes (0 for directories)
    pub file_size: u64,
    /// True if this item represents a directory
    pub is_dir: bool,
    /// True if this item is a symbolic link / reparse point
    pub is_symlink: bool,
    /// Current state of this item
    pub state: FileState,
    /// Outcome detail: rename target for conflicts, reason for failures
    pub detail: Option<String>,
}

/// Per-job result counters.
///
/// Each worker owns its job's totals exclusively; the scheduler folds them
/// into the run-wide [`RunTotals`] only after the worker has finished, so no
/// counter is ever shared between threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobTotals {
    pub files: u64,
    pub copied: u64,
    pub skipped: u64,
    pub conflicts: u64,
    pub errors: u64,
    pub symlinks_skipped: u64,
    pub empty_dirs_created: u64,
    pub bytes_copied: u64,
}

/// One subtree migration: a top-level source directory and everything
/// beneath it, copied into its resolved target location.
///
/// A TransferJob is created and planned by the scheduler, then handed to a
/// worker thread which owns it exclusively until completion.
#[derive(Debug)]
pub struct TransferJob {
    /// Unique identifier for this job
    pub id: Uuid,
    /// Top-level source entry name (the subtree key)
    pub name: String,
    /// Subtree root in the source tree
    pub source_root: PathBuf,
    /// Resolved subtree root in the target tree
    pub target_root: PathBuf,
    /// All files and directories, in deterministic enumeration order
    pub files: Vec<FileItem>,
    /// Current job state
    pub state: JobState,
    /// Job-level failure reason, if the job itself could not run
    pub error: Option<String>,
    /// Result counters, owned by the worker until completion
    pub totals: JobTotals,
    /// Hex digest of the ordered relative path list; resume validity check
    pub enumeration_digest: String,
    /// When the job was created
    pub created_at: SystemTime,
}

/// Run-wide aggregate counters, written only by the scheduler thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunTotals {
    /// Files observed across all processed items
    pub total: u64,
    pub copied: u64,
    pub skipped: u64,
    pub conflicts: u64,
    pub errors: u64,
    pub symlinks_skipped: u64,
    pub empty_dirs_created: u64,
    pub bytes_copied: u64,
    /// Top-level entries matched by a mapping rule
    pub mapped: u64,
    /// Top-level entries routed to the fallback bucket
    pub fallback: u64,
    /// Top-level entries excluded by the ignore set
    pub ignored: u64,
}

/// Machine-readable final summary, written to `summary.json` in the run's
/// log directory and returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: Mode,
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    pub totals: RunTotals,
    pub duration_secs: u64,
}

impl RunSummary {
    /// Whether any permanent error was recorded anywhere in the run.
    ///
    /// This drives the process exit status: a run with partial failures
    /// still produces a full summary, but must not report success.
    pub fn has_errors(&self) -> bool {
        self.totals.errors > 0 || self.failed > 0
    }
}

/// Terminal outcome of one processed item, as reported to the scheduler.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// Target did not exist; content copied directly
    Copied { bytes: u64 },
    /// Hash-identical content already present at the target
    Skipped,
    /// Differing content preserved under a disambiguated name
    Conflict { renamed_to: PathBuf, bytes: u64 },
    /// Permanent per-file failure
    Failed { error: String },
    /// Symlink detected; recorded to the skip log, never followed
    SymlinkSkipped,
    /// Directory created at the target
    DirCreated { empty: bool },
}

/// Progress message sent from a worker to the scheduler.
///
/// The scheduler is the single writer of the run log and the checkpoint;
/// workers only describe what happened to each item, in enumeration order.
#[derive(Debug)]
pub enum WorkerEvent {
    FileDone {
        job_id: Uuid,
        subtree: String,
        index: usize,
        path: PathBuf,
        outcome: FileOutcome,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_state_terminal() {
        assert!(!FileState::Pending.is_terminal());
        assert!(!FileState::Copying.is_terminal());
        assert!(FileState::Done.is_terminal());
        assert!(FileState::Skipped.is_terminal());
        assert!(FileState::Conflict.is_terminal());
        assert!(FileState::Failed.is_terminal());
    }

    #[test]
    fn test_summary_error_signal() {
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            mode: Mode::Copy,
            submitted: 3,
            completed: 3,
            failed: 0,
            totals: RunTotals::default(),
            duration_secs: 1,
        };
        assert!(!summary.has_errors());

        let mut with_errors = summary.clone();
        with_errors.totals.errors = 1;
        assert!(with_errors.has_errors());

        let mut with_failed_job = summary;
        with_failed_job.failed = 1;
        assert!(with_failed_job.has_errors());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Copy.to_string(), "Copy");
        assert_eq!(Mode::Move.to_string(), "Move");
    }
}
