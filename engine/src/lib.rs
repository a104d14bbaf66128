//! # Vault Migration Engine
//!
//! A headless engine for consolidating legacy file shares into a structured
//! target tree. Designed as the foundation for multiple front-ends (CLI,
//! automation).
//!
//! ## Overview
//!
//! The engine migrates the top-level entries of a source root into mapped
//! locations under a target root. It features:
//! - Rule-based path classification with a fallback bucket for the unmapped
//! - One isolated job per subtree, run on a bounded worker pool
//! - Content-hash conflict resolution that never overwrites or loses data
//! - Periodic checkpoints and exact resume over deterministic enumeration
//! - Per-run logs, an appendable integrity manifest, and a verification pass
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use engine::{run_migration, MappingTable, MigrationConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mapping = MappingTable::load(&PathBuf::from("mapping.json"))?;
//! let config = MigrationConfig::new(
//!     PathBuf::from("/mnt/old-share"),
//!     PathBuf::from("/mnt/vault"),
//!     mapping,
//! );
//!
//! let report = run_migration(&config, None)?;
//! println!(
//!     "copied {} files, {} conflicts, {} errors",
//!     report.summary.totals.copied,
//!     report.summary.totals.conflicts,
//!     report.summary.totals.errors,
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (TransferJob, FileItem, run counters)
//! - **error**: Error types and handling
//! - **config**: Run configuration and validation
//! - **classify**: Mapping-table path classification
//! - **fs_ops**: Low-level filesystem operations and enumeration
//! - **conflict**: Content-hash conflict resolution
//! - **checkpoint**: Durable resume markers
//! - **job**: Per-subtree transfer jobs
//! - **scheduler**: Run orchestration and the worker pool
//! - **runlog**: Per-run log directory
//! - **manifest**: Integrity manifest builder
//! - **verify**: Post-migration verification
//! - **progress**: Progress callback trait
//! - **checksums**: Checksum computation

pub mod checkpoint;
pub mod checksums;
pub mod classify;
pub mod config;
pub mod conflict;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod manifest;
pub mod model;
pub mod progress;
pub mod runlog;
pub mod scheduler;
pub mod verify;

// Re-export main types and functions
pub use checkpoint::Checkpoint;
pub use checksums::{compute_file_checksum, ChecksumAlgorithm, ChecksumValue};
pub use classify::{Classification, MappingRule, MappingTable};
pub use config::MigrationConfig;
pub use error::EngineError;
pub use manifest::{build_manifest, ManifestOptions, ManifestReport, RetryPolicy};
pub use model::{
    FileItem, FileOutcome, FileState, JobState, Mode, RunSummary, RunTotals, TransferJob,
};
pub use progress::ProgressCallback;
pub use scheduler::{resume_migration, run_migration, RunReport};
pub use verify::{verify_tree, DiscrepancyStatus, VerifyOptions, VerifyReport};
