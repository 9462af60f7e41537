use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use poller_core::{PersistError, StateStore, StoreError};
use poller_logging::{poller_info, poller_warn};
use serde::{Deserialize, Serialize};

use crate::AtomicFileWriter;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    values: BTreeMap<String, String>,
}

/// Key-value state kept in a RON file, rewritten atomically on every change.
#[derive(Debug)]
pub struct RonStateStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl RonStateStore {
    /// Load the state file, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => {
                let state: PersistedState = ron::from_str(&text).map_err(|err| {
                    poller_warn!("Failed to parse persisted state from {:?}: {}", path, err);
                    StoreError::Encoding(err.to_string())
                })?;
                poller_info!("Loaded persisted state from {:?}", path);
                state.values
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(StoreError::Io(err)),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let state = PersistedState {
            values: self.values.clone(),
        };
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(&state, pretty)
            .map_err(|err| StoreError::Encoding(err.to_string()))?;

        let (dir, filename) = split_path(&self.path)?;
        AtomicFileWriter::new(dir)
            .write(&filename, &content)
            .map_err(|err| match err {
                PersistError::Io(io) => StoreError::Io(io),
                other => StoreError::Unwritable(other.to_string()),
            })?;
        Ok(())
    }
}

impl StateStore for RonStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

fn split_path(path: &Path) -> Result<(PathBuf, String), StoreError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| StoreError::Unwritable(format!("{path:?} has no file name")))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, filename))
}
