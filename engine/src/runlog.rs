//! Per-run log directory.
//!
//! Every run gets its own directory under `<target_root>/_migration_logs`
//! holding the outputs external dashboards consume:
//! - `success.log`: one line per completed file operation
//! - `errors.csv`: `time,file,error` rows
//! - `symlinks.log`: skip log for links that were detected, never followed
//! - `summary.json`: machine-readable run summary
//! - `checkpoint.json`: internal progress marker (see [`crate::checkpoint`])
//!
//! All log files are written by the scheduler thread only and flushed per
//! row, so an interrupted run leaves a usable record.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::RunSummary;

/// Directory under the target root that collects all run log directories.
pub const LOG_ROOT_DIR: &str = "_migration_logs";

const SUCCESS_LOG: &str = "success.log";
const ERROR_TABLE: &str = "errors.csv";
const SYMLINK_LOG: &str = "symlinks.log";
const SUMMARY_FILE: &str = "summary.json";

/// Escape one CSV field: quote when it contains a comma, quote or newline.
pub(crate) fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Parse one CSV line written by [`csv_field`] escaping.
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            ',' if !quoted => {
                fields.push(std::mem::take(&mut field));
            }
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Writers for one run's log directory.
pub struct RunLog {
    dir: PathBuf,
    success: File,
    errors: File,
    symlinks: File,
}

impl RunLog {
    /// Directory name for a fresh run.
    pub fn dir_name_for(run_id: Uuid) -> String {
        format!("run-{}", &run_id.simple().to_string()[..8])
    }

    /// Create a fresh log directory for a new run.
    pub fn create(target_root: &Path, run_id: Uuid) -> Result<RunLog, EngineError> {
        let dir = target_root.join(LOG_ROOT_DIR).join(Self::dir_name_for(run_id));
        std::fs::create_dir_all(&dir).map_err(|e| EngineError::DirectoryCreationFailed {
            path: dir.clone(),
            source: e,
        })?;
        let mut log = Self::open_files(dir)?;
        log.write_error_header()?;
        Ok(log)
    }

    /// Reopen an existing log directory in append mode (resume).
    pub fn reopen(target_root: &Path, dir_name: &str) -> Result<RunLog, EngineError> {
        let dir = target_root.join(LOG_ROOT_DIR).join(dir_name);
        if !dir.is_dir() {
            return Err(EngineError::InvalidPath {
                path: dir,
                reason: "run log directory missing".to_string(),
            });
        }
        Self::open_files(dir)
    }

    fn open_files(dir: PathBuf) -> Result<RunLog, EngineError> {
        let open = |name: &str| -> Result<File, EngineError> {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
                .map_err(|e| EngineError::WriteError {
                    path: dir.join(name),
                    source: e,
                })
        };
        Ok(RunLog {
            success: open(SUCCESS_LOG)?,
            errors: open(ERROR_TABLE)?,
            symlinks: open(SYMLINK_LOG)?,
            dir,
        })
    }

    fn write_error_header(&mut self) -> Result<(), EngineError> {
        writeln!(self.errors, "time,file,error").map_err(|e| EngineError::WriteError {
            path: self.dir.join(ERROR_TABLE),
            source: e,
        })
    }

    /// The run's log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name of the run's log directory (stored in the checkpoint).
    pub fn dir_name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Record one completed file operation.
    pub fn record_success(&mut self, action: &str, path: &Path) {
        let _ = writeln!(
            self.success,
            "{} {} {}",
            Utc::now().to_rfc3339(),
            action,
            path.display()
        );
        let _ = self.success.flush();
    }

    /// Record one per-file error as a `time,file,error` row.
    pub fn record_error(&mut self, path: &Path, error: &str) {
        let _ = writeln!(
            self.errors,
            "{},{},{}",
            Utc::now().to_rfc3339(),
            csv_field(&path.display().to_string()),
            csv_field(error)
        );
        let _ = self.errors.flush();
    }

    /// Record a detected symlink to the dedicated skip log.
    pub fn record_symlink(&mut self, path: &Path) {
        let _ = writeln!(self.symlinks, "{}", path.display());
        let _ = self.symlinks.flush();
    }

    /// Write the machine-readable summary.
    pub fn write_summary(&self, summary: &RunSummary) -> Result<(), EngineError> {
        let path = self.dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(summary).map_err(|e| EngineError::Unknown {
            message: format!("summary serialization failed: {}", e),
        })?;
        std::fs::write(&path, json).map_err(|e| EngineError::WriteError { path, source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mode, RunTotals};

    #[test]
    fn test_csv_field_escaping() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_roundtrip() {
        let fields = vec!["x/y, z.txt", "error: \"locked\"", "plain"];
        let line = fields
            .iter()
            .map(|f| csv_field(f))
            .collect::<Vec<_>>()
            .join(",");
        assert_eq!(parse_csv_line(&line), fields);
    }

    #[test]
    fn test_create_and_record() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let run_id = Uuid::new_v4();
        let mut log = RunLog::create(temp_dir.path(), run_id).expect("Failed to create run log");

        log.record_success("COPIED", Path::new("/src/a.txt"));
        log.record_error(Path::new("/src/b,c.txt"), "permission denied");
        log.record_symlink(Path::new("/src/link"));

        let dir = log.dir().to_path_buf();
        assert!(dir.starts_with(temp_dir.path().join(LOG_ROOT_DIR)));

        let success = std::fs::read_to_string(dir.join("success.log")).expect("success log");
        assert!(success.contains("COPIED /src/a.txt"));

        let errors = std::fs::read_to_string(dir.join("errors.csv")).expect("error table");
        let mut lines = errors.lines();
        assert_eq!(lines.next(), Some("time,file,error"));
        let row = parse_csv_line(lines.next().expect("one error row"));
        assert_eq!(row[1], "/src/b,c.txt");
        assert_eq!(row[2], "permission denied");

        let symlinks = std::fs::read_to_string(dir.join("symlinks.log")).expect("symlink log");
        assert_eq!(symlinks.trim(), "/src/link");
    }

    #[test]
    fn test_reopen_appends() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let run_id = Uuid::new_v4();
        let mut log = RunLog::create(temp_dir.path(), run_id).expect("Failed to create run log");
        log.record_success("COPIED", Path::new("/a"));
        let name = log.dir_name();
        drop(log);

        let mut reopened = RunLog::reopen(temp_dir.path(), &name).expect("Failed to reopen");
        reopened.record_success("COPIED", Path::new("/b"));

        let success =
            std::fs::read_to_string(reopened.dir().join("success.log")).expect("success log");
        assert!(success.contains("/a"));
        assert!(success.contains("/b"));
        // header not duplicated on reopen
        let errors =
            std::fs::read_to_string(reopened.dir().join("errors.csv")).expect("error table");
        assert_eq!(errors.matches("time,file,error").count(), 1);
    }

    #[test]
    fn test_write_summary() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let run_id = Uuid::new_v4();
        let log = RunLog::create(temp_dir.path(), run_id).expect("Failed to create run log");

        let summary = RunSummary {
            run_id,
            mode: Mode::Copy,
            submitted: 2,
            completed: 2,
            failed: 0,
            totals: RunTotals::default(),
            duration_secs: 3,
        };
        log.write_summary(&summary).expect("Failed to write summary");

        let text =
            std::fs::read_to_string(log.dir().join("summary.json")).expect("summary file");
        assert!(text.contains("\"submitted\": 2"));
        assert!(text.contains(&run_id.to_string()));
    }
}
