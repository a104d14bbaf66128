//! Run orchestration.
//!
//! The scheduler owns a migration run end to end: it classifies the
//! top-level entries, processes loose top-level files inline, submits one
//! job per subtree to a bounded pool of worker threads, and is the single
//! writer of the run log and the checkpoint. Workers report per-item
//! outcomes over a channel; the scheduler folds them into the run totals,
//! advances the per-subtree cursors, and persists the checkpoint at a
//! configured cadence.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::checkpoint::Checkpoint;
use crate::checksums;
use crate::classify::Classification;
use crate::config::MigrationConfig;
use crate::error::EngineError;
use crate::fs_ops;
use crate::job;
use crate::model::{
    FileItem, FileOutcome, FileState, JobState, JobTotals, RunSummary, RunTotals, TransferJob,
    WorkerEvent,
};
use crate::progress::ProgressCallback;
use crate::runlog::{RunLog, LOG_ROOT_DIR};

/// Checkpoint key for loose top-level files, processed inline by the
/// scheduler rather than by a worker.
const INLINE_SUBTREE: &str = ".";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Everything a finished run hands back to the caller.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Per-subtree job records, in completion order
    pub jobs: Vec<TransferJob>,
    /// The run's log directory
    pub log_dir: PathBuf,
}

/// Execute a fresh migration run.
///
/// # Errors
/// Returns an error only for run-level failures: invalid configuration,
/// unreadable source root, unusable target root or log directory. Per-file
/// and per-job failures are recorded in the run log and counted in the
/// summary instead.
pub fn run_migration(
    config: &MigrationConfig,
    progress: Option<&dyn ProgressCallback>,
) -> Result<RunReport, EngineError> {
    config.validate()?;
    execute(config, None, progress)
}

/// Resume an interrupted run from its checkpoint.
///
/// The most recent checkpoint under the target's log root is used; completed
/// subtrees are skipped wholesale, in-flight subtrees continue from their
/// recorded cursor after the enumeration digest has been revalidated.
///
/// # Errors
/// `CheckpointMissing` when no checkpoint exists, `CheckpointDrift` when a
/// subtree's enumeration no longer matches its recorded cursor.
pub fn resume_migration(
    config: &MigrationConfig,
    progress: Option<&dyn ProgressCallback>,
) -> Result<RunReport, EngineError> {
    config.validate()?;
    let checkpoint = find_checkpoint(&config.target_root)?;
    log::info!(
        "resuming run {} from {}",
        checkpoint.run_id,
        checkpoint.log_dir
    );
    execute(config, Some(checkpoint), progress)
}

/// Locate the most recently written checkpoint under the target's log root.
fn find_checkpoint(target_root: &Path) -> Result<Checkpoint, EngineError> {
    let log_root = target_root.join(LOG_ROOT_DIR);
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    if let Ok(read) = fs::read_dir(&log_root) {
        for entry in read.flatten() {
            let candidate = Checkpoint::path_in(&entry.path());
            if let Ok(meta) = fs::metadata(&candidate) {
                let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                    newest = Some((modified, candidate));
                }
            }
        }
    }

    match newest {
        Some((_, path)) => Checkpoint::load(&path),
        None => Err(EngineError::CheckpointMissing {
            path: log_root.join(crate::checkpoint::CHECKPOINT_FILE),
        }),
    }
}

/// Enumeration digest for the loose top-level files: their sorted names,
/// newline-joined. The inline cursor is validated against it on resume,
/// exactly like a worker subtree's cursor.
fn inline_digest(inline: &[(PathBuf, String, PathBuf)]) -> String {
    let names: Vec<&str> = inline.iter().map(|(_, name, _)| name.as_str()).collect();
    checksums::digest_hex(names.join("\n").as_bytes())
}

/// A top-level directory entry after classification.
struct PlannedSubtree {
    name: String,
    source: PathBuf,
    target: PathBuf,
}

/// Mutable run state, owned by the scheduler thread.
struct RunState<'a> {
    config: &'a MigrationConfig,
    progress: Option<&'a dyn ProgressCallback>,
    runlog: RunLog,
    checkpoint: Checkpoint,
    checkpoint_path: PathBuf,
    totals: RunTotals,
    /// Enumeration digest per spawned subtree; cursor advances need it
    digests: HashMap<String, String>,
    events_since_save: usize,
    jobs: Vec<TransferJob>,
    completed_jobs: usize,
    failed_jobs: usize,
}

impl RunState<'_> {
    /// Fold one item outcome into the totals and the run log, advance the
    /// subtree cursor, and checkpoint when the cadence is due.
    fn record_outcome(&mut self, subtree: &str, index: usize, path: &Path, outcome: &FileOutcome) {
        self.totals.total += 1;
        match outcome {
            FileOutcome::Copied { bytes } => {
                self.totals.copied += 1;
                self.totals.bytes_copied += bytes;
                self.runlog.record_success("COPIED", path);
            }
            FileOutcome::Skipped => {
                self.totals.skipped += 1;
                self.runlog.record_success("SKIPPED", path);
            }
            FileOutcome::Conflict { renamed_to, bytes } => {
                self.totals.conflicts += 1;
                self.totals.bytes_copied += bytes;
                self.runlog.record_success("RENAMED", renamed_to);
            }
            FileOutcome::Failed { error } => {
                self.totals.errors += 1;
                self.runlog.record_error(path, error);
            }
            FileOutcome::SymlinkSkipped => {
                self.totals.symlinks_skipped += 1;
                self.runlog.record_symlink(path);
            }
            FileOutcome::DirCreated { empty } => {
                if *empty {
                    self.totals.empty_dirs_created += 1;
                }
                self.runlog.record_success("MKDIR", path);
            }
        }

        if let Some(p) = self.progress {
            p.on_file_completed(subtree, path, outcome);
        }

        if let Some(digest) = self.digests.get(subtree) {
            let digest = digest.clone();
            self.checkpoint.advance(subtree, index + 1, &digest);
        }

        self.events_since_save += 1;
        if self.events_since_save >= self.config.checkpoint_interval {
            self.events_since_save = 0;
            self.save_checkpoint();
        }
    }

    fn save_checkpoint(&mut self) {
        self.checkpoint.totals = self.totals.clone();
        if let Err(e) = self.checkpoint.save(&self.checkpoint_path) {
            // a missed checkpoint only costs resume granularity
            log::warn!("checkpoint write failed: {}", e);
        }
    }

    fn drain_events(&mut self, rx: &Receiver<WorkerEvent>) {
        while let Ok(event) = rx.try_recv() {
            let WorkerEvent::FileDone {
                subtree,
                index,
                path,
                outcome,
                ..
            } = event;
            self.record_outcome(&subtree, index, &path, &outcome);
        }
    }

    /// Join every worker whose thread has finished.
    fn reap_finished(&mut self, running: &mut Vec<(String, JoinHandle<TransferJob>)>) {
        let mut i = 0;
        while i < running.len() {
            if running[i].1.is_finished() {
                let (name, handle) = running.swap_remove(i);
                self.finish_job(name, handle.join());
            } else {
                i += 1;
            }
        }
    }

    fn finish_job(&mut self, name: String, result: thread::Result<TransferJob>) {
        match result {
            Ok(job) => {
                if job.state == JobState::Completed {
                    self.checkpoint.mark_completed(&name);
                    self.completed_jobs += 1;
                } else {
                    // job-level failure: no completed marker, so a resume
                    // retries the whole subtree
                    let reason = job
                        .error
                        .clone()
                        .unwrap_or_else(|| "job failed".to_string());
                    self.runlog.record_error(&job.source_root, &reason);
                    self.totals.errors += 1;
                    self.failed_jobs += 1;
                }
                if let Some(p) = self.progress {
                    p.on_job_completed(&job);
                }
                self.jobs.push(job);
            }
            Err(_) => {
                self.runlog
                    .record_error(Path::new(&name), "worker thread panicked");
                self.totals.errors += 1;
                self.failed_jobs += 1;
            }
        }
        self.save_checkpoint();
    }

    /// Drain and reap until every running worker has been joined.
    fn wait_all(
        &mut self,
        running: &mut Vec<(String, JoinHandle<TransferJob>)>,
        rx: &Receiver<WorkerEvent>,
    ) {
        while !running.is_empty() {
            self.drain_events(rx);
            self.reap_finished(running);
            if !running.is_empty() {
                thread::sleep(POLL_INTERVAL);
            }
        }
        self.drain_events(rx);
    }
}

fn execute(
    config: &MigrationConfig,
    resume: Option<Checkpoint>,
    progress: Option<&dyn ProgressCallback>,
) -> Result<RunReport, EngineError> {
    let started = Instant::now();
    fs_ops::ensure_dir_exists(&config.target_root)?;

    let entries = fs_ops::list_top_level(&config.source_root)?;

    let mut subtrees: Vec<PlannedSubtree> = Vec::new();
    let mut inline: Vec<(PathBuf, String, PathBuf)> = Vec::new();
    let (mut mapped, mut fallback, mut ignored) = (0u64, 0u64, 0u64);

    for entry in &entries {
        // never migrate our own log root, even when source and target overlap
        if entry.name == LOG_ROOT_DIR {
            continue;
        }
        let classification = config.mapping.classify(&entry.name);
        let rel = match classification {
            Classification::Ignored => {
                ignored += 1;
                log::debug!("ignoring top-level entry '{}'", entry.name);
                continue;
            }
            Classification::Mapped(rel) => {
                mapped += 1;
                if entry.is_dir {
                    rel
                } else {
                    // a mapped loose file lands inside the rule's target
                    rel.join(&entry.name)
                }
            }
            Classification::Fallback(rel) => {
                fallback += 1;
                rel
            }
        };
        if entry.is_dir {
            subtrees.push(PlannedSubtree {
                name: entry.name.clone(),
                source: entry.path.clone(),
                target: config.target_root.join(rel),
            });
        } else {
            inline.push((
                entry.path.clone(),
                entry.name.clone(),
                config.target_root.join(rel),
            ));
        }
    }

    let (checkpoint, runlog) = match resume {
        Some(cp) => {
            let log = RunLog::reopen(&config.target_root, &cp.log_dir)?;
            (cp, log)
        }
        None => {
            let run_id = Uuid::new_v4();
            let log = RunLog::create(&config.target_root, run_id)?;
            (Checkpoint::new(run_id, log.dir_name()), log)
        }
    };
    let checkpoint_path = Checkpoint::path_in(runlog.dir());

    let mut totals = checkpoint.totals.clone();
    // classification counts describe this invocation's source listing
    totals.mapped = mapped;
    totals.fallback = fallback;
    totals.ignored = ignored;

    let mut state = RunState {
        config,
        progress,
        runlog,
        checkpoint,
        checkpoint_path,
        totals,
        digests: HashMap::new(),
        events_since_save: 0,
        jobs: Vec::new(),
        completed_jobs: 0,
        failed_jobs: 0,
    };

    if let Some(p) = progress {
        p.on_run_started(subtrees.len(), inline.len());
    }

    // Loose top-level files, tracked as one pseudo-subtree in the checkpoint
    // with the same digest-guarded cursor the worker subtrees get.
    if !inline.is_empty() && !state.checkpoint.is_completed(INLINE_SUBTREE) {
        let digest = inline_digest(&inline);
        // no workers are running yet, so drift here can abort directly
        let start_index = state.checkpoint.validate_cursor(INLINE_SUBTREE, &digest)?;
        state.digests.insert(INLINE_SUBTREE.to_string(), digest.clone());
        state.checkpoint.advance(INLINE_SUBTREE, start_index, &digest);
        for (index, (source, name, target)) in inline.iter().enumerate().skip(start_index) {
            let meta = fs::symlink_metadata(source);
            let is_symlink = meta
                .as_ref()
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            let file_size = meta.map(|m| m.len()).unwrap_or(0);
            let mut item = FileItem {
                source_path: source.clone(),
                target_path: target.clone(),
                rel_path: PathBuf::from(name),
                file_size,
                is_dir: false,
                is_symlink,
                state: FileState::Pending,
                detail: None,
            };
            let mut scratch = JobTotals::default();
            let outcome = job::process_item(&mut item, &mut scratch, config.mode, config.algorithm);
            state.record_outcome(INLINE_SUBTREE, index, source, &outcome);
        }
        state.checkpoint.mark_completed(INLINE_SUBTREE);
        state.save_checkpoint();
    }

    let (tx, rx) = mpsc::channel::<WorkerEvent>();
    let mut running: Vec<(String, JoinHandle<TransferJob>)> = Vec::new();
    let mut submitted = 0usize;

    for subtree in subtrees {
        if state.checkpoint.is_completed(&subtree.name) {
            log::info!("subtree '{}' already completed; skipping", subtree.name);
            continue;
        }
        submitted += 1;

        let planned = match job::plan_job(&subtree.name, &subtree.source, &subtree.target) {
            Ok(j) => j,
            Err(e) => {
                let reason = e.to_string();
                state.runlog.record_error(&subtree.source, &reason);
                state.totals.errors += 1;
                state.failed_jobs += 1;
                continue;
            }
        };

        let start_index = match state
            .checkpoint
            .validate_cursor(&subtree.name, &planned.enumeration_digest)
        {
            Ok(i) => i,
            Err(e) => {
                // drift is a hard stop, but running workers are joined first
                state.wait_all(&mut running, &rx);
                state.save_checkpoint();
                return Err(e);
            }
        };
        state
            .digests
            .insert(subtree.name.clone(), planned.enumeration_digest.clone());
        state
            .checkpoint
            .advance(&subtree.name, start_index, &planned.enumeration_digest);

        while running.len() >= config.max_concurrent {
            state.drain_events(&rx);
            state.reap_finished(&mut running);
            if running.len() >= config.max_concurrent {
                thread::sleep(POLL_INTERVAL);
            }
        }

        if let Some(p) = progress {
            p.on_job_started(&subtree.name);
        }
        log::info!(
            "starting subtree '{}' ({} items, from index {})",
            subtree.name,
            planned.files.len(),
            start_index
        );
        let events = tx.clone();
        let mode = config.mode;
        let algorithm = config.algorithm;
        let handle =
            thread::spawn(move || job::run_job(planned, mode, algorithm, start_index, Some(events)));
        running.push((subtree.name, handle));
    }

    state.wait_all(&mut running, &rx);
    drop(tx);

    if state.failed_jobs == 0 {
        // clean completion: a later fresh run must not look resumable
        if let Err(e) = Checkpoint::remove(&state.checkpoint_path) {
            log::warn!("checkpoint cleanup failed: {}", e);
        }
    } else {
        state.save_checkpoint();
    }

    let summary = RunSummary {
        run_id: state.checkpoint.run_id,
        mode: config.mode,
        submitted,
        completed: state.completed_jobs,
        failed: state.failed_jobs,
        totals: state.totals.clone(),
        duration_secs: started.elapsed().as_secs(),
    };
    if let Err(e) = state.runlog.write_summary(&summary) {
        log::warn!("summary write failed: {}", e);
    }
    if let Some(p) = progress {
        p.on_run_completed(&summary);
    }

    Ok(RunReport {
        summary,
        jobs: state.jobs,
        log_dir: state.runlog.dir().to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicI64, Ordering};

    use crate::classify::{MappingRule, MappingTable};

    fn write(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    fn mapping() -> MappingTable {
        MappingTable::new(
            vec![MappingRule {
                key: "Photos".to_string(),
                target: PathBuf::from("Media/Photos"),
                legacy_targets: vec![],
            }],
            vec!["$RECYCLE.BIN".to_string()],
            PathBuf::from("_Unsorted"),
        )
        .expect("Failed to build mapping")
    }

    fn config(src: &Path, dst: &Path) -> MigrationConfig {
        MigrationConfig::new(src.to_path_buf(), dst.to_path_buf(), mapping())
    }

    #[test]
    fn test_full_run_routes_by_mapping() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("Photos").join("img.jpg"), b"jpeg");
        write(&src.join("Random").join("x.txt"), b"x");
        write(&src.join("$RECYCLE.BIN").join("junk"), b"junk");
        write(&src.join("note.txt"), b"loose file");

        let report = run_migration(&config(&src, &dst), None).expect("Failed to run migration");

        assert!(dst.join("Media/Photos/img.jpg").exists());
        assert!(dst.join("_Unsorted/Random/x.txt").exists());
        assert!(dst.join("_Unsorted/note.txt").exists());
        assert!(
            !dst.join("_Unsorted/$RECYCLE.BIN").exists(),
            "ignored entries produce no job"
        );

        assert_eq!(report.summary.totals.mapped, 1);
        assert_eq!(report.summary.totals.fallback, 2);
        assert_eq!(report.summary.totals.ignored, 1);
        assert_eq!(report.summary.totals.copied, 3);
        assert!(!report.summary.has_errors());

        assert!(report.log_dir.join("summary.json").exists());
        assert!(
            !Checkpoint::path_in(&report.log_dir).exists(),
            "clean completion removes the checkpoint"
        );
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("Photos").join("a.jpg"), b"aaa");
        write(&src.join("Photos").join("b.jpg"), b"bbb");

        let cfg = config(&src, &dst);
        run_migration(&cfg, None).expect("Failed to run first migration");
        let second = run_migration(&cfg, None).expect("Failed to run second migration");

        assert_eq!(second.summary.totals.copied, 0);
        assert_eq!(second.summary.totals.skipped, 2);
        assert_eq!(second.summary.totals.conflicts, 0, "no duplicate copies");
    }

    #[test]
    fn test_bounded_concurrency() {
        struct Gauge {
            current: AtomicI64,
            max: AtomicI64,
        }
        impl ProgressCallback for Gauge {
            fn on_job_started(&self, _subtree: &str) {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.max.fetch_max(now, Ordering::SeqCst);
            }
            fn on_job_completed(&self, _job: &TransferJob) {
                self.current.fetch_sub(1, Ordering::SeqCst);
            }
        }

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        for dir in ["D1", "D2", "D3", "D4", "D5"] {
            for file in 0..4 {
                write(&src.join(dir).join(format!("f{}.bin", file)), b"payload");
            }
        }

        let mut cfg = config(&src, &dst);
        cfg.max_concurrent = 2;
        let gauge = Gauge {
            current: AtomicI64::new(0),
            max: AtomicI64::new(0),
        };
        let report = run_migration(&cfg, Some(&gauge)).expect("Failed to run migration");

        assert_eq!(report.summary.completed, 5);
        assert!(
            gauge.max.load(Ordering::SeqCst) <= 2,
            "at most MaxConcurrent jobs in flight"
        );
    }

    #[test]
    fn test_resume_skips_completed_subtrees() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("Done").join("a.txt"), b"a");
        write(&src.join("Rest").join("b.txt"), b"b");

        // fake an interrupted prior run that finished "Done" only
        let run_id = Uuid::new_v4();
        let log = RunLog::create(&dst, run_id).expect("Failed to create run log");
        let mut cp = Checkpoint::new(run_id, log.dir_name());
        cp.mark_completed("Done");
        cp.save(&Checkpoint::path_in(log.dir()))
            .expect("Failed to save checkpoint");
        drop(log);

        let report = resume_migration(&config(&src, &dst), None).expect("Failed to resume");

        assert!(
            !dst.join("_Unsorted/Done/a.txt").exists(),
            "completed subtree is skipped wholesale"
        );
        assert!(dst.join("_Unsorted/Rest/b.txt").exists());
        assert_eq!(report.summary.run_id, run_id, "resume keeps the run id");
        assert_eq!(report.summary.submitted, 1);
    }

    #[test]
    fn test_resume_continues_loose_files_from_cursor() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("a.txt"), b"first");
        write(&src.join("b.txt"), b"second");

        // fake an interruption after the first loose file was recorded
        let run_id = Uuid::new_v4();
        let log = RunLog::create(&dst, run_id).expect("Failed to create run log");
        let mut cp = Checkpoint::new(run_id, log.dir_name());
        let digest = inline_digest(&[
            (src.join("a.txt"), "a.txt".to_string(), dst.join("_Unsorted/a.txt")),
            (src.join("b.txt"), "b.txt".to_string(), dst.join("_Unsorted/b.txt")),
        ]);
        cp.advance(INLINE_SUBTREE, 1, &digest);
        cp.save(&Checkpoint::path_in(log.dir()))
            .expect("Failed to save checkpoint");
        drop(log);

        let report = resume_migration(&config(&src, &dst), None).expect("Failed to resume");

        assert!(
            !dst.join("_Unsorted/a.txt").exists(),
            "the recorded loose file is not reprocessed"
        );
        assert!(dst.join("_Unsorted/b.txt").exists());
        assert_eq!(report.summary.totals.copied, 1);
    }

    #[test]
    fn test_resume_fails_on_enumeration_drift() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("Photos").join("a.jpg"), b"a");

        let run_id = Uuid::new_v4();
        let log = RunLog::create(&dst, run_id).expect("Failed to create run log");
        let mut cp = Checkpoint::new(run_id, log.dir_name());
        cp.advance("Photos", 3, "digest-from-another-world");
        cp.save(&Checkpoint::path_in(log.dir()))
            .expect("Failed to save checkpoint");
        drop(log);

        let result = resume_migration(&config(&src, &dst), None);
        assert!(matches!(result, Err(EngineError::CheckpointDrift { .. })));
    }

    #[test]
    fn test_resume_without_checkpoint_is_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("Photos").join("a.jpg"), b"a");

        let result = resume_migration(&config(&src, &dst), None);
        assert!(matches!(result, Err(EngineError::CheckpointMissing { .. })));
    }

    #[test]
    fn test_failed_job_keeps_checkpoint_and_flags_summary() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write(&src.join("Photos").join("a.jpg"), b"a");
        // block the resolved target root with a file
        write(&dst.join("Media"), b"not a dir");

        let report = run_migration(&config(&src, &dst), None).expect("Failed to run migration");

        assert_eq!(report.summary.failed, 1);
        assert!(report.summary.has_errors());
        assert!(
            Checkpoint::path_in(&report.log_dir).exists(),
            "failed jobs leave the run resumable"
        );
    }

    #[test]
    fn test_symlinked_top_level_entry_is_skipped_inline() {
        #[cfg(unix)]
        {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let src = temp_dir.path().join("src");
            let dst = temp_dir.path().join("dst");
            write(&src.join("Photos").join("a.jpg"), b"a");
            std::os::unix::fs::symlink(src.join("Photos"), src.join("link"))
                .expect("Failed to create symlink");

            let report = run_migration(&config(&src, &dst), None).expect("Failed to run");

            assert_eq!(report.summary.totals.symlinks_skipped, 1);
            assert!(!dst.join("_Unsorted/link").exists());
        }
    }
}
