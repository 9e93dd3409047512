//! Companion diagnostic files written next to failed artifacts.
//!
//! Each failed file gets `<name>.log` beside its relocated copy under the
//! error root. Each quarantined directory gets [`QUARANTINE_LOG_NAME`]
//! inside it. Both are plain text so they can be read without the
//! application log.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use super::error::{FsError, FsResult};

/// Fixed file name of the log placed inside quarantined directories.
pub const QUARANTINE_LOG_NAME: &str = "empty_folder.log";

/// Reason recorded for directories quarantined by the startup scan.
pub const EMPTY_AT_STARTUP_REASON: &str = "directory was empty at startup scan";

/// Diagnostic details for one terminal failure.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Local>,
    pub source: PathBuf,
    pub message: String,
    pub detail: Option<String>,
    pub context: Vec<(String, String)>,
}

impl ErrorRecord {
    pub fn new(source: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            source: source.into(),
            message: message.into(),
            detail: None,
            context: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.push((key.into(), value.to_string()));
        self
    }

    /// Add size and modification time of `path` when they can be read.
    pub fn with_file_context(mut self, path: &Path) -> Self {
        if let Ok(metadata) = fs::metadata(path) {
            self = self.with_context("size_bytes", metadata.len());
            if let Ok(modified) = metadata.modified() {
                self = self.with_context("modified", format_system_time(modified));
            }
        }
        self
    }

    /// Plain-text rendering of the record.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "timestamp: {}", self.timestamp.to_rfc3339());
        let _ = writeln!(out, "file: {}", self.source.display());
        let _ = writeln!(out, "error: {}", self.message);

        if let Some(detail) = &self.detail {
            let _ = writeln!(out, "detail:");
            for line in detail.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }

        if !self.context.is_empty() {
            let _ = writeln!(out, "context:");
            for (key, value) in &self.context {
                let _ = writeln!(out, "  {key}: {value}");
            }
        }

        out
    }
}

/// Path of the companion log for a relocated failed file.
pub fn log_path_for(relocated: &Path) -> PathBuf {
    let mut name = relocated
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".log");
    relocated.with_file_name(name)
}

/// Writes error and quarantine logs.
#[derive(Debug, Clone, Default)]
pub struct ErrorLogWriter;

impl ErrorLogWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write `<relocated>.log` and return its path.
    pub fn write_failure(&self, relocated: &Path, record: &ErrorRecord) -> FsResult<PathBuf> {
        let log_path = log_path_for(relocated);
        fs::write(&log_path, record.render())
            .map_err(|e| FsError::io("write_error_log", &log_path, e))?;
        Ok(log_path)
    }

    /// Write the quarantine log inside `quarantined`.
    pub fn write_quarantine(
        &self,
        original: &Path,
        quarantined: &Path,
        reason: &str,
    ) -> FsResult<PathBuf> {
        let log_path = quarantined.join(QUARANTINE_LOG_NAME);
        let mut body = String::new();
        let _ = writeln!(body, "timestamp: {}", Local::now().to_rfc3339());
        let _ = writeln!(body, "original: {}", original.display());
        let _ = writeln!(body, "destination: {}", quarantined.display());
        let _ = writeln!(body, "reason: {reason}");

        fs::write(&log_path, body).map_err(|e| FsError::io("write_quarantine_log", &log_path, e))?;
        Ok(log_path)
    }
}

fn format_system_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_path_appends_suffix() {
        assert_eq!(
            log_path_for(Path::new("/error/x/fail.txt")),
            PathBuf::from("/error/x/fail.txt.log")
        );
        assert_eq!(
            log_path_for(Path::new("/error/README")),
            PathBuf::from("/error/README.log")
        );
    }

    #[test]
    fn test_render_includes_all_sections() {
        let record = ErrorRecord::new("/src/x/fail.txt", "bad format")
            .with_detail("line 1\nline 2")
            .with_context("attempts", 2);

        let text = record.render();
        assert!(text.starts_with("timestamp: "));
        assert!(text.contains("file: /src/x/fail.txt"));
        assert!(text.contains("error: bad format"));
        assert!(text.contains("detail:\n  line 1\n  line 2\n"));
        assert!(text.contains("context:\n  attempts: 2\n"));
    }

    #[test]
    fn test_render_omits_empty_sections() {
        let text = ErrorRecord::new("/src/a", "boom").render();
        assert!(!text.contains("detail:"));
        assert!(!text.contains("context:"));
    }

    #[test]
    fn test_write_failure_next_to_file() {
        let temp = TempDir::new().unwrap();
        let relocated = temp.path().join("fail.txt");
        fs::write(&relocated, "data").unwrap();

        let record = ErrorRecord::new("/src/fail.txt", "bad format").with_file_context(&relocated);
        let log = ErrorLogWriter::new().write_failure(&relocated, &record).unwrap();

        assert_eq!(log, temp.path().join("fail.txt.log"));
        let text = fs::read_to_string(log).unwrap();
        assert!(text.contains("bad format"));
        assert!(text.contains("size_bytes: 4"));
        assert!(text.contains("modified: "));
    }

    #[test]
    fn test_write_quarantine_log() {
        let temp = TempDir::new().unwrap();
        let log = ErrorLogWriter::new()
            .write_quarantine(Path::new("/src/empty"), temp.path(), EMPTY_AT_STARTUP_REASON)
            .unwrap();

        assert_eq!(log.file_name().unwrap(), QUARANTINE_LOG_NAME);
        let text = fs::read_to_string(log).unwrap();
        assert!(text.contains("original: /src/empty"));
        assert!(text.contains(&format!("destination: {}", temp.path().display())));
        assert!(text.contains("reason: directory was empty at startup scan"));
    }
}
