//! Durable run checkpoints.
//!
//! A checkpoint is an internal, opaque progress marker written periodically
//! by the scheduler (its single writer) and consumed only by this engine on
//! resume. It records which subtrees completed, where processing stood
//! inside in-flight subtrees, and a snapshot of the aggregate counters.
//! Clean completion deletes the file so a later fresh invocation is not
//! mistaken for a resume.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::RunTotals;

/// File name of the checkpoint inside the run's log directory.
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Progress cursor for one in-flight subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubtreeCursor {
    /// Index of the next unprocessed file in the deterministic enumeration
    pub next_index: usize,
    /// Digest of the ordered enumeration the cursor indexes into
    pub enumeration_digest: String,
}

/// Durable progress marker for one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Run identifier; resumed runs keep it
    pub run_id: Uuid,
    /// Name of the run's log directory under the target's log root
    pub log_dir: String,
    /// Subtrees fully processed in a prior pass; skipped wholesale on resume
    pub completed: Vec<String>,
    /// Cursors for subtrees interrupted mid-flight (BTreeMap: stable JSON)
    pub in_progress: BTreeMap<String, SubtreeCursor>,
    /// Aggregate counters at the time of the last write
    pub totals: RunTotals,
}

impl Checkpoint {
    pub fn new(run_id: Uuid, log_dir: String) -> Self {
        Checkpoint {
            run_id,
            log_dir,
            completed: Vec::new(),
            in_progress: BTreeMap::new(),
            totals: RunTotals::default(),
        }
    }

    /// Location of the checkpoint file inside a run log directory.
    pub fn path_in(log_dir: &Path) -> PathBuf {
        log_dir.join(CHECKPOINT_FILE)
    }

    /// True if the named subtree was fully processed in a prior pass.
    pub fn is_completed(&self, subtree: &str) -> bool {
        self.completed.iter().any(|s| s == subtree)
    }

    /// Mark a subtree fully processed and drop its cursor.
    pub fn mark_completed(&mut self, subtree: &str) {
        self.in_progress.remove(subtree);
        if !self.is_completed(subtree) {
            self.completed.push(subtree.to_string());
        }
    }

    /// Advance the cursor of an in-flight subtree.
    pub fn advance(&mut self, subtree: &str, next_index: usize, digest: &str) {
        let cursor = self
            .in_progress
            .entry(subtree.to_string())
            .or_insert_with(|| SubtreeCursor {
                next_index: 0,
                enumeration_digest: digest.to_string(),
            });
        if next_index > cursor.next_index {
            cursor.next_index = next_index;
        }
        cursor.enumeration_digest = digest.to_string();
    }

    /// Write the checkpoint atomically (temp file + rename).
    ///
    /// # Errors
    /// Returns `EngineError::CheckpointIo` on any filesystem failure; the
    /// scheduler logs and continues, since a missed checkpoint only costs
    /// resume granularity.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| EngineError::Unknown {
            message: format!("checkpoint serialization failed: {}", e),
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| EngineError::CheckpointIo {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, path).map_err(|e| EngineError::CheckpointIo {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load a checkpoint from disk.
    ///
    /// # Errors
    /// `CheckpointMissing` if the file does not exist, `CheckpointIo` if it
    /// cannot be read, `Unknown` if it does not parse.
    pub fn load(path: &Path) -> Result<Checkpoint, EngineError> {
        if !path.exists() {
            return Err(EngineError::CheckpointMissing {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|e| EngineError::CheckpointIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| EngineError::Unknown {
            message: format!("checkpoint parse failed: {}", e),
        })
    }

    /// Delete the checkpoint after clean completion.
    pub fn remove(path: &Path) -> Result<(), EngineError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::CheckpointIo {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Validate a stored cursor against a freshly re-enumerated digest.
    ///
    /// # Errors
    /// `CheckpointDrift` when the subtree's enumeration no longer matches;
    /// the resume must fail loudly rather than skip or duplicate work.
    pub fn validate_cursor(
        &self,
        subtree: &str,
        current_digest: &str,
    ) -> Result<usize, EngineError> {
        match self.in_progress.get(subtree) {
            Some(cursor) => {
                if cursor.enumeration_digest != current_digest {
                    Err(EngineError::CheckpointDrift {
                        subtree: subtree.to_string(),
                        expected: cursor.enumeration_digest.clone(),
                        actual: current_digest.to_string(),
                    })
                } else {
                    Ok(cursor.next_index)
                }
            }
            None => Ok(0),
        }
    }
}
