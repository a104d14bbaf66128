//! migrate - Command-line interface for the vault migration engine.
//!
//! Provides argument parsing, progress reporting to stderr, and exit codes
//! for automation: 0 for a clean run, 1 when permanent per-file errors or
//! discrepancies were recorded, 2 for fatal configuration problems.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use engine::{
    build_manifest, resume_migration, run_migration, verify_tree, ChecksumAlgorithm,
    FileOutcome, ManifestOptions, MappingTable, MigrationConfig, Mode, ProgressCallback,
    RunSummary, TransferJob, VerifyOptions,
};

/// migrate - consolidate a legacy file share into a structured vault
#[derive(Parser, Debug)]
#[command(name = "migrate")]
#[command(version = "0.1.0")]
#[command(about = "Migrate, verify and fingerprint file trees")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a migration (use --resume to continue an interrupted one)
    Run {
        /// Source root
        #[arg(long, value_name = "PATH")]
        src: PathBuf,

        /// Target root
        #[arg(long, value_name = "PATH")]
        dst: PathBuf,

        /// Mapping table (JSON)
        #[arg(long, value_name = "FILE")]
        mapping: PathBuf,

        /// Operation mode: copy or move
        #[arg(long, value_name = "MODE", default_value = "copy")]
        mode: String,

        /// Maximum concurrent subtree jobs
        #[arg(long, value_name = "N", default_value_t = engine::config::DEFAULT_MAX_CONCURRENT)]
        jobs: usize,

        /// Checksum algorithm for conflict resolution: md5, sha256, blake3
        #[arg(long, value_name = "ALGORITHM", default_value = "sha256")]
        hash: String,

        /// Checkpoint write cadence, in processed files
        #[arg(long, value_name = "N", default_value_t = engine::config::DEFAULT_CHECKPOINT_INTERVAL)]
        checkpoint_interval: usize,

        /// Resume from the most recent checkpoint instead of starting fresh
        #[arg(long)]
        resume: bool,

        /// Print every file operation
        #[arg(long)]
        verbose: bool,
    },

    /// Verify a finished migration against its source
    Verify {
        /// Source root
        #[arg(long, value_name = "PATH")]
        src: PathBuf,

        /// Target root
        #[arg(long, value_name = "PATH")]
        dst: PathBuf,

        /// Mapping table (JSON)
        #[arg(long, value_name = "FILE")]
        mapping: PathBuf,

        /// Compare content hashes, not just sizes
        #[arg(long)]
        deep: bool,

        /// Checksum algorithm for --deep: md5, sha256, blake3
        #[arg(long, value_name = "ALGORITHM", default_value = "sha256")]
        hash: String,

        /// Write discrepancies to this CSV file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Build or continue the integrity manifest for a tree
    Manifest {
        /// Tree to fingerprint
        #[arg(long, value_name = "PATH")]
        root: PathBuf,

        /// Manifest CSV; re-running appends only missing rows
        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        /// Checksum algorithm: md5, sha256, blake3
        #[arg(long, value_name = "ALGORITHM", default_value = "sha256")]
        hash: String,
    },
}

/// CLI implementation of ProgressCallback for displaying run progress
struct CliProgress {
    verbose: bool,
    start_time: Instant,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(secs: u64) -> String {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_run_started(&self, subtree_jobs: usize, inline_files: usize) {
        eprintln!(
            "Starting migration: {} subtree jobs, {} loose files",
            subtree_jobs, inline_files
        );
    }

    fn on_job_started(&self, subtree: &str) {
        eprintln!("==> {}", subtree);
    }

    fn on_file_completed(&self, _subtree: &str, path: &Path, outcome: &FileOutcome) {
        if !self.verbose {
            return;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("(unknown)");
        match outcome {
            FileOutcome::Copied { .. } => eprintln!("  copied   {}", name),
            FileOutcome::Skipped => eprintln!("  skipped  {}", name),
            FileOutcome::Conflict { renamed_to, .. } => {
                eprintln!("  conflict {} -> {}", name, renamed_to.display())
            }
            FileOutcome::Failed { error } => eprintln!("  FAILED   {}: {}", name, error),
            FileOutcome::SymlinkSkipped => eprintln!("  symlink  {}", name),
            FileOutcome::DirCreated { .. } => {}
        }
    }

    fn on_job_completed(&self, job: &TransferJob) {
        eprintln!(
            "<== {}: {} copied, {} skipped, {} conflicts, {} errors",
            job.name,
            job.totals.copied,
            job.totals.skipped,
            job.totals.conflicts,
            job.totals.errors
        );
    }

    fn on_run_completed(&self, summary: &RunSummary) {
        let elapsed = self.start_time.elapsed().as_secs();
        eprintln!();
        eprintln!("Migration finished ({} mode)", summary.mode);
        eprintln!(
            "Summary: {} copied, {} skipped, {} conflicts, {} errors, {} symlinks skipped",
            summary.totals.copied,
            summary.totals.skipped,
            summary.totals.conflicts,
            summary.totals.errors,
            summary.totals.symlinks_skipped
        );
        eprintln!(
            "Bytes copied: {}",
            Self::format_bytes(summary.totals.bytes_copied)
        );
        eprintln!("Elapsed: {}", Self::format_duration(elapsed));
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let exit_code = match run_cli(args.command) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability. Returns the process exit code.
fn run_cli(command: Command) -> Result<i32, String> {
    match command {
        Command::Run {
            src,
            dst,
            mapping,
            mode,
            jobs,
            hash,
            checkpoint_interval,
            resume,
            verbose,
        } => {
            let mode = parse_mode(&mode)?;
            let algorithm = parse_algorithm(&hash)?;
            let mapping = MappingTable::load(&mapping).map_err(|e| e.to_string())?;

            let mut config = MigrationConfig::new(src, dst, mapping);
            config.mode = mode;
            config.algorithm = algorithm;
            config.max_concurrent = jobs;
            config.checkpoint_interval = checkpoint_interval;

            let progress = CliProgress::new(verbose);
            let report = if resume {
                resume_migration(&config, Some(&progress))
            } else {
                run_migration(&config, Some(&progress))
            }
            .map_err(|e| e.to_string())?;

            eprintln!("Run log: {}", report.log_dir.display());
            Ok(if report.summary.has_errors() { 1 } else { 0 })
        }

        Command::Verify {
            src,
            dst,
            mapping,
            deep,
            hash,
            report,
        } => {
            let algorithm = parse_algorithm(&hash)?;
            let mapping = MappingTable::load(&mapping).map_err(|e| e.to_string())?;
            let options = VerifyOptions { deep, algorithm };

            let result = verify_tree(&src, &dst, &mapping, &options).map_err(|e| e.to_string())?;

            eprintln!(
                "Verified {} files: {} matched, {} discrepancies, {} read errors",
                result.files_checked,
                result.matched,
                result.discrepancies.len(),
                result.read_errors
            );
            for record in &result.discrepancies {
                eprintln!(
                    "  {} {} (expected at {}): {}",
                    record.status,
                    record.source_path.display(),
                    record.target_path.display(),
                    record.detail
                );
            }
            if let Some(path) = report {
                result.write_csv(&path).map_err(|e| e.to_string())?;
                eprintln!("Report written to {}", path.display());
            }
            Ok(if result.is_clean() { 0 } else { 1 })
        }

        Command::Manifest { root, output, hash } => {
            let algorithm = parse_algorithm(&hash)?;
            let mut options = ManifestOptions::new(root, output);
            options.algorithm = algorithm;

            let report = build_manifest(&options).map_err(|e| e.to_string())?;

            eprintln!(
                "Manifest: {} rows written, {} already recorded, {} failed, {} symlinks skipped",
                report.written, report.skipped_existing, report.failed, report.symlinks_skipped
            );
            if report.failed > 0 {
                eprintln!("Failures recorded in {}", options.failures_path.display());
            }
            Ok(if report.failed > 0 { 1 } else { 0 })
        }
    }
}

fn parse_mode(mode: &str) -> Result<Mode, String> {
    match mode.to_lowercase().as_str() {
        "copy" => Ok(Mode::Copy),
        "move" => Ok(Mode::Move),
        _ => Err(format!("Invalid mode '{}'. Must be 'copy' or 'move'", mode)),
    }
}

fn parse_algorithm(hash: &str) -> Result<ChecksumAlgorithm, String> {
    ChecksumAlgorithm::parse(hash).ok_or_else(|| {
        format!(
            "Invalid hash algorithm '{}'. Must be 'md5', 'sha256', or 'blake3'",
            hash
        )
    })
}
