use std::collections::BTreeMap;

use thiserror::Error;

/// Key holding the id of the newest processed item.
pub const SINCE_ID_KEY: &str = "since_id";
/// Key holding the last assigned sequence counter.
pub const COUNTER_KEY: &str = "count";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state encoding error: {0}")]
    Encoding(String),
    #[error("state file unwritable: {0}")]
    Unwritable(String),
    #[error("state value for {key:?} is corrupt: {value:?}")]
    Corrupt { key: String, value: String },
}

/// Durable key-value storage for process-wide settings.
pub trait StateStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

/// Typed access to the watermark and the sequence counter.
pub trait WatermarkStore {
    fn since_id(&self) -> Option<String>;

    fn set_since_id(&mut self, since_id: Option<&str>) -> Result<(), StoreError>;

    fn counter(&self) -> Result<Option<u64>, StoreError>;

    fn set_counter(&mut self, counter: Option<u64>) -> Result<(), StoreError>;
}

impl<S: StateStore + ?Sized> WatermarkStore for S {
    fn since_id(&self) -> Option<String> {
        self.get(SINCE_ID_KEY).filter(|id| !id.is_empty())
    }

    fn set_since_id(&mut self, since_id: Option<&str>) -> Result<(), StoreError> {
        match since_id {
            Some(id) => self.set(SINCE_ID_KEY, id),
            None => self.remove(SINCE_ID_KEY),
        }
    }

    fn counter(&self) -> Result<Option<u64>, StoreError> {
        match self.get(COUNTER_KEY) {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| StoreError::Corrupt {
                    key: COUNTER_KEY.to_string(),
                    value: raw,
                }),
        }
    }

    fn set_counter(&mut self, counter: Option<u64>) -> Result<(), StoreError> {
        match counter {
            Some(value) => self.set(COUNTER_KEY, &value.to_string()),
            None => self.remove(COUNTER_KEY),
        }
    }
}

/// Non-durable store for tests and dry runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStateStore {
    values: BTreeMap<String, String>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}
