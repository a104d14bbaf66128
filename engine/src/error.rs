//! Error types for the migration engine.
//!
//! The primary error type is `EngineError`, which represents run-level errors
//! that prevent a migration from starting or resuming. Per-file failures are
//! recorded on the `FileItem` they belong to, not raised as EngineError:
//! a single unreadable file must never abort a job, and a failed job must
//! never abort the run.

use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

/// Errors that can occur at the run or job level.
///
/// These are the only errors that propagate out of the engine's public entry
/// points. Everything that can be isolated to one file is isolated to one
/// file and surfaced through the run log and the summary counters instead.
///
/// Note: EngineError wraps io::Error and is therefore not serializable; the
/// checkpoint and summary files store rendered message strings where needed.
#[derive(Debug)]
pub enum EngineError {
    /// Source root does not exist
    SourceNotFound { path: PathBuf },

    /// Source root is not accessible (permissions)
    SourceAccessDenied { path: PathBuf, source: io::Error },

    /// Failed to read from a source file
    ReadError { path: PathBuf, source: io::Error },

    /// Failed to write to a target file
    WriteError { path: PathBuf, source: io::Error },

    /// Resolved target path exceeds the platform path-length threshold
    PathTooLong { path: PathBuf },

    /// Path is malformed or unusable for the requested operation
    InvalidPath { path: PathBuf, reason: String },

    /// Failed to enumerate a source directory
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Failed to create a target directory
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Mapping table is empty, has duplicate keys, or failed to parse
    InvalidMapping { reason: String },

    /// Configuration value out of range (zero concurrency, zero cadence)
    InvalidConfig { reason: String },

    /// Checkpoint file could not be read or written
    CheckpointIo { path: PathBuf, source: io::Error },

    /// A resume was requested but no checkpoint exists
    CheckpointMissing { path: PathBuf },

    /// The re-enumerated subtree no longer matches the checkpointed ordering.
    ///
    /// Resuming against a drifted enumeration could silently skip or
    /// duplicate work, so this is a hard error rather than a warning.
    CheckpointDrift {
        subtree: String,
        expected: String,
        actual: String,
    },

    /// Catch-all for unexpected errors
    Unknown { message: String },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceNotFound { path } => {
                write!(f, "Source root not found: {}", path.display())
            }
            Self::SourceAccessDenied { path, .. } => {
                write!(f, "Source root access denied: {}", path.display())
            }
            Self::ReadError { path, .. } => {
                write!(f, "Failed to read file: {}", path.display())
            }
            Self::WriteError { path, .. } => {
                write!(f, "Failed to write file: {}", path.display())
            }
            Self::PathTooLong { path } => {
                write!(f, "Target path exceeds maximum length: {}", path.display())
            }
            Self::InvalidPath { path, reason } => {
                write!(f, "Invalid path: {} ({})", path.display(), reason)
            }
            Self::EnumerationFailed { path, .. } => {
                write!(f, "Failed to enumerate directory: {}", path.display())
            }
            Self::DirectoryCreationFailed { path, .. } => {
                write!(f, "Failed to create directory: {}", path.display())
            }
            Self::InvalidMapping { reason } => {
                write!(f, "Invalid mapping table: {}", reason)
            }
            Self::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            Self::CheckpointIo { path, .. } => {
                write!(f, "Checkpoint read/write failed: {}", path.display())
            }
            Self::CheckpointMissing { path } => {
                write!(f, "No checkpoint found at: {}", path.display())
            }
            Self::CheckpointDrift {
                subtree,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Enumeration drift detected in subtree '{}': checkpoint digest {} \
                     but current digest {}; refusing to resume",
                    subtree, expected, actual
                )
            }
            Self::Unknown { message } => {
                write!(f, "Engine error: {}", message)
            }
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SourceAccessDenied { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::CheckpointIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<u32> {
        match self {
            Self::SourceAccessDenied { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::CheckpointIo { source, .. } => source.raw_os_error().map(|e| e as u32),
            _ => None,
        }
    }

    /// True for failures that retrying cannot fix: path-too-long, permission
    /// denied, malformed input. Transient lock contention is not permanent.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::PathTooLong { .. } | Self::InvalidPath { .. } | Self::InvalidMapping { .. } => {
                true
            }
            Self::ReadError { source, .. } | Self::WriteError { source, .. } => {
                source.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        EngineError::Unknown {
            message: err.to_string(),
        }
    }
}
