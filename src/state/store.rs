//! Key-value state that survives between invocations.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::CharmError;

/// Flat key-value store injected into every handler.
pub trait StateStore {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`.
    fn set(&mut self, key: &str, value: Value) -> Result<(), CharmError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn unset(&mut self, key: &str) -> Result<(), CharmError>;

    /// Get an unsigned integer value.
    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_u64())
    }

    /// Get a string value.
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(|s| s.to_string()))
    }
}

/// In-memory store, used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored entries.
    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), CharmError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn unset(&mut self, key: &str) -> Result<(), CharmError> {
        self.values.remove(key);
        Ok(())
    }
}

/// JSON-file backed store.
///
/// The whole file is rewritten through a temporary file and a rename on every
/// mutation, so a crash leaves either the old or the new content.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl FileStateStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, CharmError> {
        let values = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| CharmError::State {
                message: format!("Corrupt state file '{}': {}", path.display(), e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(CharmError::State {
                    message: format!("Failed to read state file '{}': {}", path.display(), e),
                })
            }
        };

        debug!(path = %path.display(), keys = values.len(), "State store opened");

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), CharmError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.values)?;
        let temp_path = self.path.with_file_name(format!(
            ".{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        let write = || -> Result<(), std::io::Error> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            CharmError::State {
                message: format!("Failed to write state file '{}': {}", self.path.display(), e),
            }
        })
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), CharmError> {
        if self.values.get(key) == Some(&value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value);
        self.persist()
    }

    fn unset(&mut self, key: &str) -> Result<(), CharmError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}
