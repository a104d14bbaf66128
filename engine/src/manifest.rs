//! Integrity manifest builder.
//!
//! Walks a migrated tree in deterministic order and appends one CSV row per
//! file: `path,size,modified_time,content_hash`. The manifest file itself is
//! the resume ledger: paths already present are skipped, every new row is
//! flushed as soon as it is written, so an interrupted build loses at most
//! the row in flight.
//!
//! Unreadable files get a tiered retry: a burst of immediate attempts, then
//! one delayed round for files held open by other processes, then a last
//! no-delay sweep before giving up. Whatever still fails is recorded in a
//! separate failures table with a sentinel hash. A permanent failure never
//! produces a manifest row.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::checksums::{self, ChecksumAlgorithm};
use crate::error::EngineError;
use crate::runlog::{csv_field, parse_csv_line, LOG_ROOT_DIR};

/// Hash-column sentinel for files that stayed unreadable.
pub const UNREADABLE_SENTINEL: &str = "<unreadable>";

/// Manifest CSV header.
pub const MANIFEST_HEADER: &str = "path,size,modified_time,content_hash";

/// Directory names never walked into.
const EXCLUDED_DIRS: [&str; 3] = ["$RECYCLE.BIN", "System Volume Information", LOG_ROOT_DIR];

/// Tiered retry schedule for unreadable files.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Back-to-back attempts before a file is deferred
    pub immediate_attempts: u32,
    /// Delayed rounds over the deferred files
    pub delayed_rounds: u32,
    /// Pause before each delayed round
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            immediate_attempts: 3,
            delayed_rounds: 1,
            retry_delay: Duration::from_secs(30),
        }
    }
}

/// What one manifest build pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ManifestReport {
    /// Rows appended this pass
    pub written: u64,
    /// Files skipped because the ledger already had them
    pub skipped_existing: u64,
    /// Files recorded in the failures table
    pub failed: u64,
    /// Symlinks detected and skipped
    pub symlinks_skipped: u64,
}

/// Inputs for one manifest build pass.
#[derive(Debug, Clone)]
pub struct ManifestOptions {
    /// Tree to walk
    pub root: PathBuf,
    /// Manifest CSV; also the resume ledger
    pub manifest_path: PathBuf,
    /// Failures table; rows reuse the manifest schema with a sentinel hash
    pub failures_path: PathBuf,
    pub algorithm: ChecksumAlgorithm,
    pub retry: RetryPolicy,
}

impl ManifestOptions {
    pub fn new(root: PathBuf, manifest_path: PathBuf) -> Self {
        let failures_path = manifest_path.with_extension("failures.csv");
        ManifestOptions {
            root,
            manifest_path,
            failures_path,
            algorithm: ChecksumAlgorithm::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// One file the walk decided to hash.
struct WalkedFile {
    path: PathBuf,
    /// Root-relative path with `/` separators; the manifest key
    rel: String,
}

/// A file that survived every retry tier.
struct FailedFile {
    file: WalkedFile,
    error: String,
    /// Permanent failures skip the delayed rounds
    permanent: bool,
}

/// Build (or continue) the manifest for a tree.
///
/// # Errors
/// Returns an error only when the root cannot be enumerated or the manifest
/// files cannot be opened; per-file hash failures end up in the failures
/// table instead.
pub fn build_manifest(options: &ManifestOptions) -> Result<ManifestReport, EngineError> {
    let algorithm = options.algorithm;
    build_manifest_with(options, std::thread::sleep, |path| {
        checksums::compute_file_checksum(path, algorithm).map(|v| v.hex().to_string())
    })
}

fn build_manifest_with<S, H>(
    options: &ManifestOptions,
    sleep: S,
    mut hash: H,
) -> Result<ManifestReport, EngineError>
where
    S: Fn(Duration),
    H: FnMut(&Path) -> Result<String, EngineError>,
{
    let mut report = ManifestReport::default();

    let ledger = load_ledger(&options.manifest_path)?;
    let fresh = ledger.is_empty() && !options.manifest_path.exists();
    let mut manifest = open_append(&options.manifest_path)?;
    if fresh {
        writeln!(manifest, "{}", MANIFEST_HEADER).map_err(|e| EngineError::WriteError {
            path: options.manifest_path.clone(),
            source: e,
        })?;
    }

    let mut files = Vec::new();
    collect_files(
        &options.root,
        String::new(),
        &mut files,
        &mut report.symlinks_skipped,
    )?;

    // First tier: immediate attempts, back to back.
    let mut deferred: Vec<FailedFile> = Vec::new();
    for file in files {
        if ledger.contains(&file.rel) {
            report.skipped_existing += 1;
            continue;
        }
        match try_hash(&file.path, options.retry.immediate_attempts, &mut hash) {
            Ok(hex) => {
                append_row(&mut manifest, &options.manifest_path, &file, &hex)?;
                report.written += 1;
            }
            Err(e) => {
                log::debug!("deferring {}: {}", file.path.display(), e);
                deferred.push(FailedFile {
                    permanent: e.is_permanent(),
                    error: e.to_string(),
                    file,
                });
            }
        }
    }

    // Second tier: delayed rounds for files that may have been held open.
    for _ in 0..options.retry.delayed_rounds {
        let (permanent, retryable): (Vec<_>, Vec<_>) =
            deferred.into_iter().partition(|f| f.permanent);
        deferred = permanent;
        if retryable.is_empty() {
            break;
        }
        sleep(options.retry.retry_delay);
        for failed in retryable {
            match hash(&failed.file.path) {
                Ok(hex) => {
                    append_row(&mut manifest, &options.manifest_path, &failed.file, &hex)?;
                    report.written += 1;
                }
                Err(e) => deferred.push(FailedFile {
                    permanent: e.is_permanent(),
                    error: e.to_string(),
                    file: failed.file,
                }),
            }
        }
    }

    // Last sweep: one more try without a pause before giving up.
    let (permanent, retryable): (Vec<_>, Vec<_>) = deferred.into_iter().partition(|f| f.permanent);
    deferred = permanent;
    for failed in retryable {
        match hash(&failed.file.path) {
            Ok(hex) => {
                append_row(&mut manifest, &options.manifest_path, &failed.file, &hex)?;
                report.written += 1;
            }
            Err(e) => deferred.push(FailedFile {
                permanent: e.is_permanent(),
                error: e.to_string(),
                file: failed.file,
            }),
        }
    }

    // Everything still failing goes to the failures table.
    if !deferred.is_empty() {
        let mut failures = open_append(&options.failures_path)?;
        let fresh_failures = fs::metadata(&options.failures_path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        if fresh_failures {
            writeln!(failures, "{}", MANIFEST_HEADER).map_err(|e| EngineError::WriteError {
                path: options.failures_path.clone(),
                source: e,
            })?;
        }
        for failed in &deferred {
            log::warn!(
                "manifest: giving up on {}: {}",
                failed.file.path.display(),
                failed.error
            );
            append_failure(&mut failures, &options.failures_path, &failed.file)?;
            report.failed += 1;
        }
    }

    Ok(report)
}

/// Attempt a hash up to `attempts` times; permanent errors stop the burst.
fn try_hash<H>(path: &Path, attempts: u32, hash: &mut H) -> Result<String, EngineError>
where
    H: FnMut(&Path) -> Result<String, EngineError>,
{
    let mut attempt = 0;
    loop {
        match hash(path) {
            Ok(hex) => return Ok(hex),
            Err(e) if attempt + 1 < attempts && !e.is_permanent() => {
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read the manifest back as a set of already-recorded relative paths.
fn load_ledger(manifest_path: &Path) -> Result<HashSet<String>, EngineError> {
    let mut ledger = HashSet::new();
    if !manifest_path.exists() {
        return Ok(ledger);
    }
    let text = fs::read_to_string(manifest_path).map_err(|e| EngineError::ReadError {
        path: manifest_path.to_path_buf(),
        source: e,
    })?;
    for line in text.lines().skip(1) {
        if line.is_empty() {
            continue;
        }
        let fields = parse_csv_line(line);
        if let Some(path) = fields.into_iter().next() {
            ledger.insert(path);
        }
    }
    Ok(ledger)
}

fn open_append(path: &Path) -> Result<File, EngineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| EngineError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EngineError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Deterministic walk: names byte-sorted per level, directories descended
/// after files of the same level are collected, excluded names and symlinks
/// never entered.
fn collect_files(
    dir: &Path,
    rel_prefix: String,
    out: &mut Vec<WalkedFile>,
    symlinks_skipped: &mut u64,
) -> Result<(), EngineError> {
    let read = fs::read_dir(dir).map_err(|e| EngineError::EnumerationFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut entries: Vec<_> = read.flatten().collect();
    entries.sort_by_key(|e| e.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if rel_prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", rel_prefix, name)
        };
        let meta = match entry.path().symlink_metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("manifest: cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if meta.file_type().is_symlink() {
            *symlinks_skipped += 1;
            continue;
        }
        if meta.is_dir() {
            if !EXCLUDED_DIRS.contains(&name.as_str()) {
                subdirs.push((entry.path(), rel));
            }
            continue;
        }
        out.push(WalkedFile {
            path: entry.path(),
            rel,
        });
    }
    for (path, rel) in subdirs {
        // a vanished subdirectory mid-walk is logged, not fatal
        if let Err(e) = collect_files(&path, rel, out, symlinks_skipped) {
            log::warn!("manifest: {}", e);
        }
    }
    Ok(())
}

fn append_row(
    manifest: &mut File,
    manifest_path: &Path,
    file: &WalkedFile,
    hex: &str,
) -> Result<(), EngineError> {
    let (size, modified) = file_meta(&file.path);
    writeln!(
        manifest,
        "{},{},{},{}",
        csv_field(&file.rel),
        size,
        modified,
        hex
    )
    .and_then(|_| manifest.flush())
    .map_err(|e| EngineError::WriteError {
        path: manifest_path.to_path_buf(),
        source: e,
    })
}

fn append_failure(
    failures: &mut File,
    failures_path: &Path,
    file: &WalkedFile,
) -> Result<(), EngineError> {
    let (size, modified) = file_meta(&file.path);
    writeln!(
        failures,
        "{},{},{},{}",
        csv_field(&file.rel),
        size,
        modified,
        UNREADABLE_SENTINEL
    )
    .and_then(|_| failures.flush())
    .map_err(|e| EngineError::WriteError {
        path: failures_path.to_path_buf(),
        source: e,
    })
}

/// Best-effort size and RFC 3339 mtime; a failed stat yields zero and an
/// empty string rather than aborting the row.
fn file_meta(path: &Path) -> (u64, String) {
    match fs::metadata(path) {
        Ok(meta) => {
            let modified = meta
                .modified()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
                .unwrap_or_default();
            (meta.len(), modified)
        }
        Err(_) => (0, String::new()),
    }
}
