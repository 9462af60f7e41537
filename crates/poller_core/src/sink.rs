use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;

use crate::Item;

/// One row of the append-only record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: String,
    pub created_at: String,
    pub created_timestamp: i64,
    pub payload_json: String,
    pub counter: u64,
}

impl StoredRecord {
    pub fn from_item(item: &Item, counter: u64) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: item.id.clone(),
            created_at: item.created_at.clone(),
            created_timestamp: item.created_timestamp,
            payload_json: serde_json::to_string(&item.payload)?,
            counter,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record store query failed: {0}")]
    Query(String),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only structured record store.
pub trait RecordSink {
    fn insert(&mut self, record: &StoredRecord) -> Result<(), StorageError>;

    /// Delete every row, returning how many were removed.
    fn clear(&mut self) -> Result<usize, StorageError>;

    fn count(&self) -> Result<usize, StorageError>;
}

/// One JSON file per saved item, named by sequence counter.
pub trait ArtifactSink {
    fn dir(&self) -> &Path;

    fn write(&self, counter: u64, payload: &Value) -> Result<PathBuf, PersistError>;

    /// Delete every artifact file, returning how many were removed.
    fn clear(&self) -> Result<usize, PersistError>;

    fn count(&self) -> Result<usize, PersistError>;
}

/// `<counter>.json`
pub fn artifact_filename(counter: u64) -> String {
    format!("{counter}.json")
}

/// Wrap the payload in a one-element array, the shape the upstream list API uses.
pub fn encode_artifact(payload: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(&[payload])
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    rows: Vec<StoredRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[StoredRecord] {
        &self.rows
    }
}

impl RecordSink for MemoryRecordStore {
    fn insert(&mut self, record: &StoredRecord) -> Result<(), StorageError> {
        self.rows.push(record.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<usize, StorageError> {
        let removed = self.rows.len();
        self.rows.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize, StorageError> {
        Ok(self.rows.len())
    }
}

/// Keeps artifact contents in memory under a nominal directory.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    dir: PathBuf,
    files: Mutex<BTreeMap<u64, String>>,
}

impl MemoryArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn contents(&self, counter: u64) -> Option<String> {
        self.lock().get(&counter).cloned()
    }

    pub fn counters(&self) -> Vec<u64> {
        self.lock().keys().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, String>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ArtifactSink for MemoryArtifactStore {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, counter: u64, payload: &Value) -> Result<PathBuf, PersistError> {
        let content = encode_artifact(payload)?;
        self.lock().insert(counter, content);
        Ok(self.dir.join(artifact_filename(counter)))
    }

    fn clear(&self) -> Result<usize, PersistError> {
        let mut files = self.lock();
        let removed = files.len();
        files.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize, PersistError> {
        Ok(self.lock().len())
    }
}
