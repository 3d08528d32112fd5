//! Log writer module
//!
//! Provides thread-safe log writing to files or stdout/stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use crate::config::LogLevel;

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// Log output target
enum LogTarget {
    Stdout,
    Stderr,
    File(Mutex<File>),
}

/// Thread-safe log writer
pub struct LogWriter {
    access: LogTarget,
    error: LogTarget,
    level: LogLevel,
}

impl LogWriter {
    fn new(
        access_log_file: Option<&str>,
        error_log_file: Option<&str>,
        level: LogLevel,
    ) -> io::Result<Self> {
        let access = match access_log_file {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Stdout,
        };

        let error = match error_log_file {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Stderr,
        };

        Ok(Self {
            access,
            error,
            level,
        })
    }

    /// Write to access log
    pub fn write_access(&self, message: &str) {
        write_to_target(&self.access, message);
    }

    /// Write to error log
    pub fn write_error(&self, message: &str) {
        write_to_target(&self.error, message);
    }

    /// Write warning message (to error log target), dropped below `warn`
    pub fn write_warning(&self, message: &str) {
        if self.level >= LogLevel::Warn {
            write_to_target(&self.error, message);
        }
    }

    /// Write info message (to access log target), dropped below `info`
    pub fn write_info(&self, message: &str) {
        if self.level >= LogLevel::Info {
            write_to_target(&self.access, message);
        }
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

fn write_to_target(target: &LogTarget, message: &str) {
    match target {
        LogTarget::Stdout => println!("{message}"),
        LogTarget::Stderr => eprintln!("{message}"),
        LogTarget::File(file) => {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "{message}");
            }
        }
    }
}

/// Initialize the global log writer
///
/// Returns error if log files cannot be opened or the writer was already set.
pub fn init(
    access_log_file: Option<&str>,
    error_log_file: Option<&str>,
    level: LogLevel,
) -> io::Result<()> {
    let writer = LogWriter::new(access_log_file, error_log_file, level)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// Get the global log writer, if `init()` has run
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_targets_and_info_filter() {
        let dir = TempDir::new().unwrap();
        let access = dir.path().join("logs/access.log");
        let error = dir.path().join("logs/error.log");
        let writer = LogWriter::new(access.to_str(), error.to_str(), LogLevel::Error).unwrap();

        writer.write_info("startup banner");
        writer.write_warning("[WARN] slow query");
        writer.write_access("GET /bigquery_example_list 200");
        writer.write_error("[ERROR] disk full");

        let access_text = std::fs::read_to_string(&access).unwrap();
        assert!(!access_text.contains("startup banner"));
        assert!(access_text.contains("GET /bigquery_example_list 200"));
        assert_eq!(
            std::fs::read_to_string(&error).unwrap(),
            "[ERROR] disk full\n"
        );
    }

    #[test]
    fn test_warn_level_keeps_warnings_only() {
        let dir = TempDir::new().unwrap();
        let access = dir.path().join("access.log");
        let error = dir.path().join("error.log");
        let writer = LogWriter::new(access.to_str(), error.to_str(), LogLevel::Warn).unwrap();

        writer.write_info("startup banner");
        writer.write_warning("[WARN] slow query");
        writer.write_error("[ERROR] disk full");

        assert!(std::fs::read_to_string(&access).unwrap().is_empty());
        assert_eq!(
            std::fs::read_to_string(&error).unwrap(),
            "[WARN] slow query\n[ERROR] disk full\n"
        );
    }
}
