//! Attempt Log Implementation

use crate::StorageError;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Default log location, relative to the working directory
pub const DEFAULT_LOG_PATH: &str = "logs/cheating_log.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only log with one line per cheating attempt:
/// `Cheating attempt <n> at <local timestamp>`
pub struct AttemptLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AttemptLog {
    /// Open for appending, creating the file and its parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StorageError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        info!("Opened attempt log at {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one attempt line stamped with the current local time
    pub fn record(&self, attempt_number: u32) -> Result<(), StorageError> {
        let line = format!(
            "Cheating attempt {} at {}\n",
            attempt_number,
            Local::now().format(TIMESTAMP_FORMAT)
        );

        let mut file = self
            .file
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|source| StorageError::Io {
                path: self.path.display().to_string(),
                source,
            })?;

        debug!("Recorded attempt {}", attempt_number);
        Ok(())
    }

    /// Read back all lines written so far, across sessions
    pub fn entries(&self) -> Result<Vec<String>, StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let file = File::open(&self.path).map_err(io_err)?;
        BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/cheating_log.txt");

        let log = AttemptLog::open(&path).unwrap();
        assert!(path.exists());
        assert!(log.entries().unwrap().is_empty());
    }

    #[test]
    fn test_record_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let log = AttemptLog::open(dir.path().join("log.txt")).unwrap();

        log.record(1).unwrap();
        log.record(2).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        for (i, line) in entries.iter().enumerate() {
            let prefix = format!("Cheating attempt {} at ", i + 1);
            let stamp = line.strip_prefix(&prefix).unwrap();
            assert!(NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
        }
    }

    #[test]
    fn test_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");

        AttemptLog::open(&path).unwrap().record(1).unwrap();
        let log = AttemptLog::open(&path).unwrap();
        log.record(1).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|l| l.starts_with("Cheating attempt 1 at ")));
    }

    #[test]
    fn test_open_fails_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AttemptLog::open(dir.path()),
            Err(StorageError::Io { .. })
        ));
    }
}
