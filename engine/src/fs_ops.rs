//! Filesystem operations.
//!
//! Low-level primitives shared by the workers, the scheduler, the manifest
//! builder and the verifier:
//! - top-level and subtree enumeration in a stable, deterministic order
//! - file copy with metadata preservation and a small fixed retry count
//! - directory creation, path-length checks, move-mode cleanup
//!
//! Enumeration determinism is a correctness requirement, not a convenience:
//! the checkpoint stores file indices into the enumeration, and a resumed
//! run must observe the exact same ordered list.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksums;
use crate::error::EngineError;
use crate::model::{FileItem, FileState, SourceEntry};

/// Platform path-length threshold for resolved target paths.
///
/// Entries whose target path would exceed this are failed up front with an
/// explicit reason instead of letting the underlying copy fail opaquely.
pub const MAX_TARGET_PATH: usize = 250;

/// Re-attempts after the first failed copy of a file.
pub const COPY_RETRIES: u32 = 2;

/// Pause between copy re-attempts.
const COPY_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Enumerate the immediate children of the source root, sorted by name.
///
/// Symlinked entries are reported with `is_dir = false` so they are handled
/// inline (and skipped) rather than spawned as subtree jobs.
///
/// # Errors
/// Returns `SourceNotFound` / `SourceAccessDenied` / `EnumerationFailed`
/// depending on why the root could not be listed.
pub fn list_top_level(source_root: &Path) -> Result<Vec<SourceEntry>, EngineError> {
    let read = fs::read_dir(source_root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EngineError::SourceNotFound {
            path: source_root.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => EngineError::SourceAccessDenied {
            path: source_root.to_path_buf(),
            source: e,
        },
        _ => EngineError::EnumerationFailed {
            path: source_root.to_path_buf(),
            source: e,
        },
    })?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| EngineError::EnumerationFailed {
            path: source_root.to_path_buf(),
            source: e,
        })?;
        let file_type = entry.file_type().map_err(|e| EngineError::EnumerationFailed {
            path: entry.path(),
            source: e,
        })?;
        entries.push(SourceEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            is_dir: file_type.is_dir() && !file_type.is_symlink(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Enumerate one subtree depth-first in deterministic order.
///
/// At every level entries are sorted byte-wise by file name; a directory is
/// emitted before its contents. Symlinks are emitted as items (so they land
/// in the skip log) but never followed.
///
/// # Arguments
/// * `source` - subtree root to enumerate
/// * `target_root` - resolved target subtree root, for building target paths
///
/// # Errors
/// Returns `EngineError::EnumerationFailed` only if the subtree root itself
/// cannot be read; unreadable nested directories are recorded as Failed
/// items and enumeration continues.
pub fn enumerate_subtree(
    source: &Path,
    target_root: &Path,
) -> Result<Vec<FileItem>, EngineError> {
    fn recurse(
        dir: &Path,
        rel: &Path,
        target_root: &Path,
        items: &mut Vec<FileItem>,
    ) -> Result<(), EngineError> {
        let read = fs::read_dir(dir).map_err(|e| EngineError::EnumerationFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut entries: Vec<fs::DirEntry> = Vec::new();
        for entry in read {
            entries.push(entry.map_err(|e| EngineError::EnumerationFailed {
                path: dir.to_path_buf(),
                source: e,
            })?);
        }
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name();
            let rel_path = rel.join(&name);
            let source_path = entry.path();
            let target_path = target_root.join(&rel_path);

            // symlink_metadata so links are seen as links, not their targets
            let metadata = match fs::symlink_metadata(&source_path) {
                Ok(m) => m,
                Err(e) => {
                    items.push(FileItem {
                        source_path,
                        target_path,
                        rel_path,
                        file_size: 0,
                        is_dir: false,
                        is_symlink: false,
                        state: FileState::Failed,
                        detail: Some(format!("stat failed: {}", e)),
                    });
                    continue;
                }
            };

            let file_type = metadata.file_type();
            if file_type.is_symlink() {
                items.push(FileItem {
                    source_path,
                    target_path,
                    rel_path,
                    file_size: 0,
                    is_dir: false,
                    is_symlink: true,
                    state: FileState::Pending,
                    detail: None,
                });
            } else if file_type.is_dir() {
                items.push(FileItem {
                    source_path: source_path.clone(),
                    target_path,
                    rel_path: rel_path.clone(),
                    file_size: 0,
                    is_dir: true,
                    is_symlink: false,
                    state: FileState::Pending,
                    detail: None,
                });
                if let Err(e) = recurse(&source_path, &rel_path, target_root, items) {
                    if let Some(last) = items.iter_mut().rev().find(|i| i.source_path == source_path)
                    {
                        last.state = FileState::Failed;
                        last.detail = Some(e.to_string());
                    }
                }
            } else {
                items.push(FileItem {
                    source_path,
                    target_path,
                    rel_path,
                    file_size: metadata.len(),
                    is_dir: false,
                    is_symlink: false,
                    state: FileState::Pending,
                    detail: None,
                });
            }
        }
        Ok(())
    }

    let mut items = Vec::new();
    recurse(source, Path::new(""), target_root, &mut items)?;
    Ok(items)
}

/// Digest of the ordered relative path list of an enumeration.
///
/// Two enumerations of the same unchanged subtree produce the same digest;
/// any rename, addition or removal changes it. The checkpoint stores this
/// per subtree so a drifted resume fails loudly instead of silently
/// skipping or duplicating work.
pub fn enumeration_digest(items: &[FileItem]) -> String {
    let mut joined = Vec::new();
    for item in items {
        joined.extend_from_slice(item.rel_path.to_string_lossy().as_bytes());
        joined.push(b'\n');
    }
    checksums::digest_hex(&joined)
}

/// True if the resolved target path exceeds [`MAX_TARGET_PATH`].
pub fn target_path_too_long(path: &Path) -> bool {
    path.as_os_str().len() > MAX_TARGET_PATH
}

/// Ensure a directory exists, creating it (and parents) if necessary.
pub fn ensure_dir_exists(path: &Path) -> Result<(), EngineError> {
    match fs::metadata(path) {
        Ok(metadata) => {
            if metadata.is_dir() {
                Ok(())
            } else {
                Err(EngineError::DirectoryCreationFailed {
                    path: path.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "Path exists but is not a directory",
                    ),
                })
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Ensure the parent directory of a path exists.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Copy a file from source to target, preserving the modification time.
///
/// # Returns
/// Number of bytes copied
///
/// # Errors
/// Returns `ReadError` or `WriteError` depending on which side failed.
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_metadata = src_file.metadata().map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;
    let src_mtime = src_metadata.modified().ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            EngineError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// Copy with a small fixed retry count for transient failures.
///
/// Permanent failures (permission denied) are not retried. This is the
/// coarse counterpart of the manifest builder's tiered retry policy.
pub fn copy_with_retries(src: &Path, dst: &Path, retries: u32) -> Result<u64, EngineError> {
    let mut attempt = 0;
    loop {
        match copy_file_with_metadata(src, dst) {
            Ok(bytes) => return Ok(bytes),
            Err(e) if attempt < retries && !e.is_permanent() => {
                log::debug!(
                    "copy attempt {} failed for {}: {}; retrying",
                    attempt + 1,
                    src.display(),
                    e
                );
                attempt += 1;
                std::thread::sleep(COPY_RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Remove a source file after verifying the written target's size.
///
/// Move-mode only: the source is dropped only when the target holds the
/// expected number of bytes.
///
/// # Errors
/// Returns `WriteError` when the target cannot be verified and `ReadError`
/// when the source cannot be removed.
pub fn remove_source_after_verify(
    src: &Path,
    dst: &Path,
    expected_bytes: u64,
) -> Result<(), EngineError> {
    let dst_len = fs::metadata(dst)
        .map_err(|e| EngineError::WriteError {
            path: dst.to_path_buf(),
            source: e,
        })?
        .len();
    if dst_len != expected_bytes {
        return Err(EngineError::WriteError {
            path: dst.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("target has {} bytes, expected {}", dst_len, expected_bytes),
            ),
        });
    }
    fs::remove_file(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })
}

/// Remove directories under `root` (and `root` itself) that ended up empty.
///
/// Best-effort cleanup after a Move run; `remove_dir` refuses non-empty
/// directories, which is exactly the guard needed, so errors are ignored.
pub fn prune_empty_dirs(root: &Path) {
    fn recurse(dir: &Path) {
        if let Ok(read) = fs::read_dir(dir) {
            for entry in read.flatten() {
                if entry.file_type().map(|t| t.is_dir() && !t.is_symlink()).unwrap_or(false) {
                    recurse(&entry.path());
                }
            }
        }
        let _ = fs::remove_dir(dir);
    }
    recurse(root);
}
