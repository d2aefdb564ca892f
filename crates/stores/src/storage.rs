//! Persistence behind the activity log: a flat JSON array under one key.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sf_core::ActivityLogEntry;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored log is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Where the log store keeps its list. `Ok(None)` means nothing has been stored yet.
pub trait LogStorage: Send + Sync {
    fn load(&self) -> Result<Option<Vec<ActivityLogEntry>>, StorageError>;

    fn save(&self, entries: &[ActivityLogEntry]) -> Result<(), StorageError>;
}

/// JSON file on disk. Writes go to a sibling temp file first and are renamed
/// into place, so a crash never leaves a half-written list.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.clone(), source }
    }
}

impl LogStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<Vec<ActivityLogEntry>>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| self.io(e))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, entries: &[ActivityLogEntry]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }
        let json = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io(e))?;
        Ok(())
    }
}

/// In-process stand-in for browser local storage. Clones share the same slot,
/// which lets tests reopen a store over "the same" storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with raw text, valid JSON or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { slot: Arc::new(Mutex::new(Some(raw.into()))) }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

impl LogStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<ActivityLogEntry>>, StorageError> {
        match self.slot.lock().as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, entries: &[ActivityLogEntry]) -> Result<(), StorageError> {
        let json = serde_json::to_string(entries)?;
        *self.slot.lock() = Some(json);
        Ok(())
    }
}
