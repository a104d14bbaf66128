//! Subtree transfer jobs.
//!
//! A job copies one resolved subtree, preserving directory structure. The
//! scheduler plans it (deterministic enumeration plus digest), then a worker
//! thread owns it exclusively: per item it pre-creates directories, skips
//! symlinks into the skip log, guards the target path length, copies files
//! that have no occupant, and delegates occupied targets to the conflict
//! resolver. Per-file failures are recorded and never stop the job.

use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use uuid::Uuid;

use crate::checksums::ChecksumAlgorithm;
use crate::conflict::{self, ConflictOutcome};
use crate::error::EngineError;
use crate::fs_ops::{self, COPY_RETRIES};
use crate::model::{
    FileItem, FileOutcome, FileState, JobState, JobTotals, Mode, TransferJob, WorkerEvent,
};

/// Create and plan a job for one subtree.
///
/// Enumerates the subtree in deterministic order and computes the
/// enumeration digest the checkpoint will validate on resume.
///
/// # Errors
/// Returns `EngineError::EnumerationFailed` if the subtree root cannot be
/// read; the scheduler records such a job as Failed and the run proceeds.
pub fn plan_job(
    name: &str,
    source_root: &Path,
    target_root: &Path,
) -> Result<TransferJob, EngineError> {
    let files = fs_ops::enumerate_subtree(source_root, target_root)?;
    let enumeration_digest = fs_ops::enumeration_digest(&files);
    Ok(TransferJob {
        id: Uuid::new_v4(),
        name: name.to_string(),
        source_root: source_root.to_path_buf(),
        target_root: target_root.to_path_buf(),
        files,
        state: JobState::Pending,
        error: None,
        totals: JobTotals::default(),
        enumeration_digest,
        created_at: SystemTime::now(),
    })
}

/// Process one planned file item and return its outcome.
///
/// Shared between subtree workers and the scheduler's inline handling of
/// top-level files; mutates the item's state and the job-private totals.
pub fn process_item(
    item: &mut FileItem,
    totals: &mut JobTotals,
    mode: Mode,
    algorithm: ChecksumAlgorithm,
) -> FileOutcome {
    totals.files += 1;

    if item.is_symlink {
        item.state = FileState::Skipped;
        item.detail = Some("symlink; not followed".to_string());
        totals.symlinks_skipped += 1;
        return FileOutcome::SymlinkSkipped;
    }

    if fs_ops::target_path_too_long(&item.target_path) {
        let reason = EngineError::PathTooLong {
            path: item.target_path.clone(),
        }
        .to_string();
        item.state = FileState::Failed;
        item.detail = Some(reason.clone());
        totals.errors += 1;
        return FileOutcome::Failed { error: reason };
    }

    if item.is_dir {
        return match fs_ops::ensure_dir_exists(&item.target_path) {
            Ok(()) => {
                item.state = FileState::Done;
                let empty = std::fs::read_dir(&item.source_path)
                    .map(|mut entries| entries.next().is_none())
                    .unwrap_or(false);
                if empty {
                    totals.empty_dirs_created += 1;
                }
                FileOutcome::DirCreated { empty }
            }
            Err(e) => {
                let reason = e.to_string();
                item.state = FileState::Failed;
                item.detail = Some(reason.clone());
                totals.errors += 1;
                FileOutcome::Failed { error: reason }
            }
        };
    }

    item.state = FileState::Copying;

    if !item.target_path.exists() {
        return match fs_ops::copy_with_retries(&item.source_path, &item.target_path, COPY_RETRIES)
        {
            Ok(bytes) => {
                if mode == Mode::Move {
                    if let Err(e) = fs_ops::remove_source_after_verify(
                        &item.source_path,
                        &item.target_path,
                        bytes,
                    ) {
                        log::warn!(
                            "move: source not removed for {}: {}",
                            item.source_path.display(),
                            e
                        );
                    }
                }
                item.state = FileState::Done;
                totals.copied += 1;
                totals.bytes_copied += bytes;
                FileOutcome::Copied { bytes }
            }
            Err(e) => {
                let reason = e.to_string();
                item.state = FileState::Failed;
                item.detail = Some(reason.clone());
                totals.errors += 1;
                FileOutcome::Failed { error: reason }
            }
        };
    }

    // Occupied target: the conflict resolver decides
    match conflict::resolve(&item.source_path, &item.target_path, algorithm) {
        ConflictOutcome::Skipped => {
            // Content already present; in Move mode the source may go
            if mode == Mode::Move {
                if let Err(e) = std::fs::remove_file(&item.source_path) {
                    log::warn!(
                        "move: source not removed for {}: {}",
                        item.source_path.display(),
                        e
                    );
                }
            }
            item.state = FileState::Skipped;
            totals.skipped += 1;
            FileOutcome::Skipped
        }
        ConflictOutcome::Renamed(renamed) => {
            let bytes = item.file_size;
            if mode == Mode::Move {
                if let Err(e) =
                    fs_ops::remove_source_after_verify(&item.source_path, &renamed, bytes)
                {
                    log::warn!(
                        "move: source not removed for {}: {}",
                        item.source_path.display(),
                        e
                    );
                }
            }
            item.state = FileState::Conflict;
            item.detail = Some(renamed.display().to_string());
            totals.conflicts += 1;
            totals.bytes_copied += bytes;
            FileOutcome::Conflict {
                renamed_to: renamed,
                bytes,
            }
        }
        ConflictOutcome::Failed(reason) => {
            item.state = FileState::Failed;
            item.detail = Some(reason.clone());
            totals.errors += 1;
            FileOutcome::Failed { error: reason }
        }
    }
}

/// Run a planned job, starting at `start_index` (non-zero on resume).
///
/// The job transitions Pending → Running → Completed; it becomes Failed
/// only when the target subtree root itself cannot be created. Outcomes are
/// reported to the scheduler through `events` in enumeration order.
pub fn run_job(
    mut job: TransferJob,
    mode: Mode,
    algorithm: ChecksumAlgorithm,
    start_index: usize,
    events: Option<Sender<WorkerEvent>>,
) -> TransferJob {
    job.state = JobState::Running;

    if let Err(e) = fs_ops::ensure_dir_exists(&job.target_root) {
        job.state = JobState::Failed;
        job.error = Some(e.to_string());
        return job;
    }

    for index in start_index..job.files.len() {
        let outcome = process_item(&mut job.files[index], &mut job.totals, mode, algorithm);

        if let Some(tx) = events.as_ref() {
            // Receiver gone means the scheduler died; keep going, the job
            // record still carries the totals.
            let _ = tx.send(WorkerEvent::FileDone {
                job_id: job.id,
                subtree: job.name.clone(),
                index,
                path: job.files[index].source_path.clone(),
                outcome,
            });
        }
    }

    if mode == Mode::Move {
        fs_ops::prune_empty_dirs(&job.source_root);
    }

    job.state = JobState::Completed;
    job
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;

    fn write(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    #[test]
    fn test_plan_job_digest_and_order() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("b.txt"), b"b");
        write(&src.join("a.txt"), b"a");

        let job = plan_job("src", &src, &temp_dir.path().join("dst")).expect("Failed to plan");
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.files.len(), 2);
        assert_eq!(job.files[0].rel_path, Path::new("a.txt"));
        assert!(!job.enumeration_digest.is_empty());
    }

    #[test]
    fn test_run_job_copies_tree() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("one.txt"), b"hello");
        write(&src.join("sub").join("two.txt"), b"world!");
        fs::create_dir(src.join("empty")).expect("Failed to create empty dir");

        let dst = temp_dir.path().join("dst");
        let job = plan_job("src", &src, &dst).expect("Failed to plan");
        let job = run_job(job, Mode::Copy, ChecksumAlgorithm::Sha256, 0, None);

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.totals.copied, 2);
        assert_eq!(job.totals.bytes_copied, 11);
        assert_eq!(job.totals.empty_dirs_created, 1);
        assert_eq!(job.totals.errors, 0);
        assert_eq!(
            fs::read_to_string(dst.join("one.txt")).expect("copied file"),
            "hello"
        );
        assert_eq!(
            fs::read_to_string(dst.join("sub").join("two.txt")).expect("copied file"),
            "world!"
        );
        assert!(dst.join("empty").is_dir(), "empty directory structure kept");
        assert!(src.join("one.txt").exists(), "Copy mode retains the source");
    }

    #[test]
    fn test_run_job_move_removes_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("sub").join("f.txt"), b"payload");

        let dst = temp_dir.path().join("dst");
        let job = plan_job("src", &src, &dst).expect("Failed to plan");
        let job = run_job(job, Mode::Move, ChecksumAlgorithm::Sha256, 0, None);

        assert_eq!(job.state, JobState::Completed);
        assert!(dst.join("sub").join("f.txt").exists());
        assert!(!src.exists(), "moved-out subtree is pruned");
    }

    #[test]
    fn test_identical_existing_target_is_skipped() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("a.txt"), b"same");
        write(&dst.join("a.txt"), b"same");

        let job = plan_job("src", &src, &dst).expect("Failed to plan");
        let job = run_job(job, Mode::Copy, ChecksumAlgorithm::Sha256, 0, None);

        assert_eq!(job.totals.skipped, 1);
        assert_eq!(job.totals.copied, 0);
        assert_eq!(job.totals.conflicts, 0);
    }

    #[test]
    fn test_differing_existing_target_is_conflict() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("a.txt"), b"new");
        write(&dst.join("a.txt"), b"old");

        let job = plan_job("src", &src, &dst).expect("Failed to plan");
        let job = run_job(job, Mode::Copy, ChecksumAlgorithm::Sha256, 0, None);

        assert_eq!(job.totals.conflicts, 1);
        assert_eq!(
            fs::read_to_string(dst.join("a.txt")).expect("occupant"),
            "old"
        );
        let conflict_item = &job.files[0];
        assert_eq!(conflict_item.state, FileState::Conflict);
        let renamed = conflict_item.detail.as_ref().expect("rename detail");
        assert_eq!(
            fs::read_to_string(renamed).expect("conflict copy"),
            "new"
        );
    }

    #[test]
    fn test_path_too_long_is_explicit_failure() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let long_name = "x".repeat(fs_ops::MAX_TARGET_PATH);
        write(&src.join(&long_name), b"data");

        let dst = temp_dir.path().join("dst");
        let job = plan_job("src", &src, &dst).expect("Failed to plan");
        let job = run_job(job, Mode::Copy, ChecksumAlgorithm::Sha256, 0, None);

        assert_eq!(job.totals.errors, 1);
        let item = &job.files[0];
        assert_eq!(item.state, FileState::Failed);
        assert!(item
            .detail
            .as_ref()
            .expect("failure detail")
            .contains("maximum length"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_skipped_not_followed() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("real.txt"), b"data");
        std::os::unix::fs::symlink(src.join("real.txt"), src.join("link.txt"))
            .expect("Failed to create symlink");

        let dst = temp_dir.path().join("dst");
        let job = plan_job("src", &src, &dst).expect("Failed to plan");
        let job = run_job(job, Mode::Copy, ChecksumAlgorithm::Sha256, 0, None);

        assert_eq!(job.totals.symlinks_skipped, 1);
        assert!(!dst.join("link.txt").exists(), "links are never copied");
        assert!(dst.join("real.txt").exists());
    }

    #[test]
    fn test_resume_start_index_skips_processed_prefix() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("a.txt"), b"aa");
        write(&src.join("b.txt"), b"bb");
        write(&src.join("c.txt"), b"cc");

        let dst = temp_dir.path().join("dst");
        let job = plan_job("src", &src, &dst).expect("Failed to plan");
        // resume at index 1: a.txt must not be touched
        let job = run_job(job, Mode::Copy, ChecksumAlgorithm::Sha256, 1, None);

        assert!(!dst.join("a.txt").exists());
        assert!(dst.join("b.txt").exists());
        assert!(dst.join("c.txt").exists());
        assert_eq!(job.totals.copied, 2);
    }

    #[test]
    fn test_events_carry_enumeration_order() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("a.txt"), b"a");
        write(&src.join("b.txt"), b"b");

        let (tx, rx) = mpsc::channel();
        let job = plan_job("src", &src, &temp_dir.path().join("dst")).expect("Failed to plan");
        let _job = run_job(job, Mode::Copy, ChecksumAlgorithm::Sha256, 0, Some(tx));

        let indices: Vec<usize> = rx
            .iter()
            .map(|e| match e {
                WorkerEvent::FileDone { index, .. } => index,
            })
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_job_failure_when_target_root_not_creatable() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("a.txt"), b"a");

        // a file where the target root should be
        let blocked = temp_dir.path().join("blocked");
        fs::write(&blocked, b"not a dir").expect("Failed to write blocker");

        let job = plan_job("src", &src, &blocked).expect("Failed to plan");
        let job = run_job(job, Mode::Copy, ChecksumAlgorithm::Sha256, 0, None);

        assert_eq!(job.state, JobState::Failed);
        assert!(job.error.is_some());
    }
}
