//! Conflict resolution for occupied target paths.
//!
//! When a file is about to be copied onto a path that already exists, the
//! outcome is decided by content hashing: identical content is skipped,
//! differing content is preserved under a disambiguated name, and any hash
//! failure is a failure, never a silent skip. No content is ever lost.

use std::path::{Path, PathBuf};

use crate::checksums::{self, ChecksumAlgorithm};
use crate::fs_ops::{self, COPY_RETRIES};

/// The decided outcome of copying onto an occupied target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// Content is hash-identical; nothing was written
    Skipped,
    /// Differing content written under the disambiguated path
    Renamed(PathBuf),
    /// Hashing or the disambiguated write failed
    Failed(String),
}

/// Disambiguated sibling path for a conflicting arrival.
///
/// The marker is derived from the arriving file's content hash rather than
/// the run id, so a re-run of the same source resolves to the same name and
/// recognizes its own prior conflict copy as already present.
pub fn disambiguated_path(target: &Path, source_hash_hex: &str) -> PathBuf {
    let marker = &source_hash_hex[..8.min(source_hash_hex.len())];
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let name = format!("{}.conflict-{}{}", stem, marker, ext);
    match target.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Decide and execute the outcome for source file `src` arriving at the
/// occupied target path `dst`.
///
/// Hashes both sides with the configured algorithm. Identical content is a
/// Skip. Differing content is written next to the occupant under
/// [`disambiguated_path`]; if that path already holds the identical content
/// (a prior run's conflict copy), the outcome is a Skip as well, which is
/// what makes re-runs produce zero new conflict copies.
pub fn resolve(src: &Path, dst: &Path, algorithm: ChecksumAlgorithm) -> ConflictOutcome {
    let src_hash = match checksums::compute_file_checksum(src, algorithm) {
        Ok(h) => h,
        Err(e) => return ConflictOutcome::Failed(format!("hashing source failed: {}", e)),
    };
    let dst_hash = match checksums::compute_file_checksum(dst, algorithm) {
        Ok(h) => h,
        Err(e) => return ConflictOutcome::Failed(format!("hashing target failed: {}", e)),
    };

    if src_hash.hex() == dst_hash.hex() {
        return ConflictOutcome::Skipped;
    }

    let renamed = disambiguated_path(dst, src_hash.hex());
    if renamed.exists() {
        match checksums::compute_file_checksum(&renamed, algorithm) {
            Ok(existing) if existing.hex() == src_hash.hex() => return ConflictOutcome::Skipped,
            Ok(_) => {
                // Same marker, different content: hash-prefix collision.
                // Never overwrite; surface it for human review.
                return ConflictOutcome::Failed(format!(
                    "disambiguated path {} already occupied by different content",
                    renamed.display()
                ));
            }
            Err(e) => {
                return ConflictOutcome::Failed(format!(
                    "hashing existing conflict copy failed: {}",
                    e
                ))
            }
        }
    }

    match fs_ops::copy_with_retries(src, &renamed, COPY_RETRIES) {
        Ok(_) => ConflictOutcome::Renamed(renamed),
        Err(e) => ConflictOutcome::Failed(format!("writing conflict copy failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_identical_content_is_skipped() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src.txt");
        let dst = temp_dir.path().join("dst.txt");
        fs::write(&src, b"same bytes").expect("Failed to write src");
        fs::write(&dst, b"same bytes").expect("Failed to write dst");

        let outcome = resolve(&src, &dst, ChecksumAlgorithm::Sha256);
        assert_eq!(outcome, ConflictOutcome::Skipped);
        // exactly one file at the target; no rename happened
        let siblings: Vec<_> = fs::read_dir(temp_dir.path())
            .expect("Failed to read dir")
            .collect();
        assert_eq!(siblings.len(), 2);
    }

    #[test]
    fn test_differing_content_is_renamed_and_both_retained() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("a.txt");
        let dst = temp_dir.path().join("target").join("a.txt");
        fs::create_dir_all(dst.parent().expect("parent")).expect("Failed to create dir");
        fs::write(&src, b"new content").expect("Failed to write src");
        fs::write(&dst, b"old content").expect("Failed to write dst");

        let outcome = resolve(&src, &dst, ChecksumAlgorithm::Sha256);
        let renamed = match outcome {
            ConflictOutcome::Renamed(p) => p,
            other => panic!("Expected Renamed, got {:?}", other),
        };

        // pre-existing target untouched, arrival preserved next to it
        assert_eq!(
            fs::read_to_string(&dst).expect("Failed to read dst"),
            "old content"
        );
        assert_eq!(
            fs::read_to_string(&renamed).expect("Failed to read renamed"),
            "new content"
        );
        assert!(renamed
            .file_name()
            .expect("file name")
            .to_string_lossy()
            .contains(".conflict-"));
        assert!(renamed.to_string_lossy().ends_with(".txt"));
    }

    #[test]
    fn test_rerun_recognizes_prior_conflict_copy() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("a.txt");
        let dst = temp_dir.path().join("target").join("a.txt");
        fs::create_dir_all(dst.parent().expect("parent")).expect("Failed to create dir");
        fs::write(&src, b"new content").expect("Failed to write src");
        fs::write(&dst, b"old content").expect("Failed to write dst");

        let first = resolve(&src, &dst, ChecksumAlgorithm::Sha256);
        assert!(matches!(first, ConflictOutcome::Renamed(_)));

        // second run: no new copy, no second rename
        let second = resolve(&src, &dst, ChecksumAlgorithm::Sha256);
        assert_eq!(second, ConflictOutcome::Skipped);

        let count = fs::read_dir(dst.parent().expect("parent"))
            .expect("Failed to read dir")
            .count();
        assert_eq!(count, 2, "exactly the occupant and one conflict copy");
    }

    #[test]
    fn test_unreadable_source_is_failed_not_skipped() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("missing.txt");
        let dst = temp_dir.path().join("dst.txt");
        fs::write(&dst, b"content").expect("Failed to write dst");

        let outcome = resolve(&src, &dst, ChecksumAlgorithm::Sha256);
        assert!(matches!(outcome, ConflictOutcome::Failed(_)));
    }

    #[test]
    fn test_disambiguated_path_shape() {
        let p = disambiguated_path(Path::new("/t/report.pdf"), "deadbeefcafef00d");
        assert_eq!(p, PathBuf::from("/t/report.conflict-deadbeef.pdf"));

        let no_ext = disambiguated_path(Path::new("/t/README"), "0123456789abcdef");
        assert_eq!(no_ext, PathBuf::from("/t/README.conflict-01234567"));
    }
}
