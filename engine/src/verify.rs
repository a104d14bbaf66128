//! Post-migration verification.
//!
//! Walks the source tree again and proves every file is present at one of
//! its candidate target locations: the mapping rule's primary target first,
//! then any declared legacy targets, then the fallback bucket. A file whose
//! occupant differs may still live next to it under its conflict-copy name,
//! so that variant is consulted before anything is reported.
//!
//! Checks run cheapest-first: existence, then size, then (in deep mode) a
//! full content hash. Verification never mutates either tree.

use std::fs;
use std::path::{Path, PathBuf};

use crate::checksums::{self, ChecksumAlgorithm};
use crate::classify::{Classification, MappingTable};
use crate::conflict;
use crate::error::EngineError;
use crate::fs_ops;
use crate::runlog::csv_field;

/// Verification settings.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Compare content hashes, not just sizes
    pub deep: bool,
    pub algorithm: ChecksumAlgorithm,
}

/// Why a source file failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscrepancyStatus {
    /// No candidate location holds the file
    Missing,
    /// A candidate exists but its size differs
    SizeMismatch,
    /// Size matches but the content hash does not (deep mode)
    Corrupt,
}

impl std::fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyStatus::Missing => write!(f, "MISSING"),
            DiscrepancyStatus::SizeMismatch => write!(f, "SIZE_MISMATCH"),
            DiscrepancyStatus::Corrupt => write!(f, "CORRUPT"),
        }
    }
}

/// One source file that could not be verified.
#[derive(Debug, Clone)]
pub struct DiscrepancyRecord {
    pub source_path: PathBuf,
    /// The primary candidate location the file was expected at
    pub target_path: PathBuf,
    pub status: DiscrepancyStatus,
    /// Human-readable explanation: the sizes, the hashes, or the candidate
    /// locations that were tried
    pub detail: String,
}

/// Result of a verification pass.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub files_checked: u64,
    pub matched: u64,
    pub symlinks_skipped: u64,
    /// Top-level entries excluded by the ignore set
    pub ignored_entries: u64,
    /// Source files that could not be read or hashed during verification
    pub read_errors: u64,
    pub discrepancies: Vec<DiscrepancyRecord>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty() && self.read_errors == 0
    }

    /// Write the discrepancy list as `status,source_path,target_path,detail`
    /// CSV.
    pub fn write_csv(&self, path: &Path) -> Result<(), EngineError> {
        let mut out = String::from("status,source_path,target_path,detail\n");
        for record in &self.discrepancies {
            out.push_str(&format!(
                "{},{},{},{}\n",
                record.status,
                csv_field(&record.source_path.display().to_string()),
                csv_field(&record.target_path.display().to_string()),
                csv_field(&record.detail),
            ));
        }
        fs::write(path, out).map_err(|e| EngineError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// What comparing one candidate path produced.
enum Finding {
    Match,
    SizeMismatch { found: u64 },
    Corrupt { detail: String },
}

/// Verify a migrated source tree against its target.
///
/// # Errors
/// Returns an error only when the source root or a subtree cannot be
/// enumerated; individual files always end up as either matched, a
/// discrepancy record, or a read-error count.
pub fn verify_tree(
    source_root: &Path,
    target_root: &Path,
    mapping: &MappingTable,
    options: &VerifyOptions,
) -> Result<VerifyReport, EngineError> {
    let entries = fs_ops::list_top_level(source_root)?;
    let mut report = VerifyReport::default();

    for entry in &entries {
        if let Classification::Ignored = mapping.classify(&entry.name) {
            report.ignored_entries += 1;
            continue;
        }
        if entry.is_dir {
            let roots: Vec<PathBuf> = mapping
                .candidates(&entry.name)
                .iter()
                .map(|rel| target_root.join(rel))
                .collect();
            // enumeration target paths are unused; only rel paths matter here
            let items = fs_ops::enumerate_subtree(&entry.path, &roots[0])?;
            for item in &items {
                if item.is_symlink {
                    report.symlinks_skipped += 1;
                    continue;
                }
                if item.is_dir {
                    continue;
                }
                let candidates: Vec<PathBuf> =
                    roots.iter().map(|r| r.join(&item.rel_path)).collect();
                check_file(&item.source_path, candidates, options, &mut report);
            }
        } else {
            let is_symlink = fs::symlink_metadata(&entry.path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            if is_symlink {
                report.symlinks_skipped += 1;
                continue;
            }
            let candidates: Vec<PathBuf> = mapping
                .file_candidates(&entry.name)
                .iter()
                .map(|rel| target_root.join(rel))
                .collect();
            check_file(&entry.path, candidates, options, &mut report);
        }
    }

    Ok(report)
}

/// Check one source file against its candidate locations, in priority order.
fn check_file(
    source: &Path,
    candidates: Vec<PathBuf>,
    options: &VerifyOptions,
    report: &mut VerifyReport,
) {
    report.files_checked += 1;

    let src_len = match fs::metadata(source) {
        Ok(m) => m.len(),
        Err(e) => {
            log::warn!("verify: cannot stat {}: {}", source.display(), e);
            report.read_errors += 1;
            return;
        }
    };

    let mut src_hash: Option<String> = None;
    let mut worst: Option<(DiscrepancyStatus, String)> = None;

    for candidate in &candidates {
        match compare(source, candidate, src_len, options, &mut src_hash) {
            Some(Finding::Match) => {
                report.matched += 1;
                return;
            }
            Some(finding) => {
                // a mismatched occupant may coexist with a conflict copy
                if let Some(hash) = source_hash(source, options, &mut src_hash) {
                    let variant = conflict::disambiguated_path(candidate, &hash);
                    if let Some(Finding::Match) =
                        compare(source, &variant, src_len, options, &mut src_hash)
                    {
                        report.matched += 1;
                        return;
                    }
                }
                let (status, detail) = match finding {
                    Finding::Corrupt { detail } => (DiscrepancyStatus::Corrupt, detail),
                    Finding::SizeMismatch { found } => (
                        DiscrepancyStatus::SizeMismatch,
                        format!("expected {} bytes, found {}", src_len, found),
                    ),
                    Finding::Match => continue,
                };
                // corruption outranks a size mismatch at another candidate
                worst = Some(match worst.take() {
                    Some(kept @ (DiscrepancyStatus::Corrupt, _)) => kept,
                    _ => (status, detail),
                });
            }
            None => {}
        }
    }

    let (status, detail) = worst.unwrap_or_else(|| {
        let tried: Vec<String> = candidates.iter().map(|c| c.display().to_string()).collect();
        (
            DiscrepancyStatus::Missing,
            format!("not found at: {}", tried.join("; ")),
        )
    });
    report.discrepancies.push(DiscrepancyRecord {
        source_path: source.to_path_buf(),
        target_path: candidates
            .first()
            .cloned()
            .unwrap_or_else(|| source.to_path_buf()),
        status,
        detail,
    });
}

/// Compare source against one candidate. `None` means the candidate does
/// not exist.
fn compare(
    source: &Path,
    candidate: &Path,
    src_len: u64,
    options: &VerifyOptions,
    src_hash: &mut Option<String>,
) -> Option<Finding> {
    let meta = fs::metadata(candidate).ok()?;
    if meta.len() != src_len {
        return Some(Finding::SizeMismatch { found: meta.len() });
    }
    if options.deep {
        let want = source_hash(source, options, src_hash)?;
        let got = match checksums::compute_file_checksum(candidate, options.algorithm) {
            Ok(v) => v.hex().to_string(),
            Err(e) => {
                log::warn!("verify: cannot hash {}: {}", candidate.display(), e);
                return Some(Finding::Corrupt {
                    detail: format!("target could not be hashed: {}", e),
                });
            }
        };
        if got != want {
            return Some(Finding::Corrupt {
                detail: format!("target hash {} does not match source hash {}", got, want),
            });
        }
    }
    Some(Finding::Match)
}

/// Lazily computed source hash, shared across all candidate checks of one
/// file.
fn source_hash(
    source: &Path,
    options: &VerifyOptions,
    cache: &mut Option<String>,
) -> Option<String> {
    if cache.is_none() {
        match checksums::compute_file_checksum(source, options.algorithm) {
            Ok(v) => *cache = Some(v.hex().to_string()),
            Err(e) => {
                log::warn!("verify: cannot hash {}: {}", source.display(), e);
                return None;
            }
        }
    }
    cache.clone()
}
