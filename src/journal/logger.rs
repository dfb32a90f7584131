//! Journal writers.
//!
//! Entries are appended as JSON lines (one JSON object per line).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CharmError;

use super::entry::PassEntry;

/// Destination of pass entries.
pub trait Journal {
    fn record(&mut self, entry: &PassEntry) -> Result<(), CharmError>;
}

/// Appends entries to a file.
pub struct JournalLogger {
    file: File,
    path: PathBuf,
}

impl JournalLogger {
    /// Open `path` for appending, creating its parent directory if needed.
    pub fn new(path: &Path) -> Result<Self, CharmError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!(path = %parent.display(), "Creating journal directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Pass journal opened");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Journal for JournalLogger {
    fn record(&mut self, entry: &PassEntry) -> Result<(), CharmError> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.file, "{}", json)?;

        if let Err(e) = self.file.sync_data() {
            warn!(error = %e, "Failed to sync pass journal");
        }

        debug!(pass_id = %entry.pass_id, hook = %entry.hook, "Pass recorded");
        Ok(())
    }
}

/// Journal used when journaling is disabled.
#[derive(Debug, Default)]
pub struct NullJournal;

impl NullJournal {
    pub fn new() -> Self {
        Self
    }
}

impl Journal for NullJournal {
    fn record(&mut self, _entry: &PassEntry) -> Result<(), CharmError> {
        Ok(())
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    pub entries: Vec<PassEntry>,
}

impl Journal for MemoryJournal {
    fn record(&mut self, entry: &PassEntry) -> Result<(), CharmError> {
        self.entries.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn entry(hook: &str) -> PassEntry {
        PassEntry::success(
            "2026-01-15T10:30:45.123Z".to_string(),
            Uuid::nil(),
            hook.to_string(),
            serde_json::json!({"port": 9103}),
            vec!["install".to_string()],
            vec!["installed".to_string()],
            "active: ready".to_string(),
            10,
        )
    }

    #[test]
    fn test_logger_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("subdir/passes.log");

        let logger = JournalLogger::new(&log_path).unwrap();
        assert!(log_path.parent().unwrap().exists());
        assert_eq!(logger.path(), log_path);
    }

    #[test]
    fn test_logger_appends_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("passes.log");

        {
            let mut logger = JournalLogger::new(&log_path).unwrap();
            logger.record(&entry("install")).unwrap();
        }
        {
            let mut logger = JournalLogger::new(&log_path).unwrap();
            logger.record(&entry("config-changed")).unwrap();
        }

        let content = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["hook"], "config-changed");
        assert_eq!(second["result"]["status"], "converged");
    }

    #[test]
    fn test_null_and_memory_journals() {
        assert!(NullJournal::new().record(&entry("start")).is_ok());

        let mut memory = MemoryJournal::default();
        memory.record(&entry("start")).unwrap();
        assert_eq!(memory.entries.len(), 1);
        assert_eq!(memory.entries[0].hook, "start");
    }
}
