//! Run configuration.
//!
//! Everything a migration run needs is decided up front: roots, mapping
//! table, concurrency limit, Copy/Move mode, hash algorithm, checkpoint
//! cadence. Validation is fatal-at-startup only; after `validate` passes,
//! nothing in the configuration can abort a run.

use std::path::PathBuf;

use crate::checksums::ChecksumAlgorithm;
use crate::classify::MappingTable;
use crate::error::EngineError;
use crate::model::Mode;

/// Default bound on concurrently running subtree jobs.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default checkpoint write cadence, in processed files.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 25;

/// Configuration for one migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Root of the tree being migrated
    pub source_root: PathBuf,
    /// Root the classified subtrees are migrated into
    pub target_root: PathBuf,
    /// Ordered mapping table, ignore set and fallback bucket
    pub mapping: MappingTable,
    /// Bound on concurrently running subtree jobs
    pub max_concurrent: usize,
    /// Copy or Move; explicit, never inferred, fixed for the whole run
    pub mode: Mode,
    /// Content-hash algorithm for conflict resolution
    pub algorithm: ChecksumAlgorithm,
    /// Checkpoint write cadence in processed files; a trade-off between
    /// resume granularity and write cost
    pub checkpoint_interval: usize,
}

impl MigrationConfig {
    /// Build a configuration with the default limits.
    pub fn new(source_root: PathBuf, target_root: PathBuf, mapping: MappingTable) -> Self {
        MigrationConfig {
            source_root,
            target_root,
            mapping,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            mode: Mode::Copy,
            algorithm: ChecksumAlgorithm::default(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }

    /// Validate the configuration before any job is submitted.
    ///
    /// # Errors
    /// - `SourceNotFound` / `InvalidPath` for an unusable source root
    /// - `InvalidMapping` for an empty mapping table
    /// - `InvalidConfig` for a zero concurrency limit or cadence
    pub fn validate(&self) -> Result<(), EngineError> {
        match std::fs::metadata(&self.source_root) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                return Err(EngineError::InvalidPath {
                    path: self.source_root.clone(),
                    reason: "source root is not a directory".to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::SourceNotFound {
                    path: self.source_root.clone(),
                })
            }
            Err(e) => {
                return Err(EngineError::SourceAccessDenied {
                    path: self.source_root.clone(),
                    source: e,
                })
            }
        }

        if self.mapping.is_empty() {
            return Err(EngineError::InvalidMapping {
                reason: "mapping table has no rules".to_string(),
            });
        }
        if self.max_concurrent == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "max_concurrent must be at least 1".to_string(),
            });
        }
        if self.checkpoint_interval == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "checkpoint_interval must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
