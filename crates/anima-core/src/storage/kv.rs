use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// Durable key-value access. Every call is independently atomic; there are
/// no multi-key transactions.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Add one to the decimal counter at `key` (absent counts as 0) and
    /// return the new value. Concurrent callers never lose an increment.
    fn increment(&self, key: &str) -> Result<u64, StoreError>;
}

/// Next value of the counter stored as `current`.
pub(crate) fn next_count(key: &str, current: Option<&str>) -> Result<u64, StoreError> {
    let count = match current {
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            value: raw.to_string(),
        })?,
        None => 0,
    };
    Ok(count.saturating_add(1))
}

/// Process-local store, used by tests and by hosts that keep settings
/// elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.map.lock().map_err(|_| StoreError::Locked)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().map_err(|_| StoreError::Locked)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().map_err(|_| StoreError::Locked)?;
        map.remove(key);
        Ok(())
    }

    fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut map = self.map.lock().map_err(|_| StoreError::Locked)?;
        let next = next_count(key, map.get(key).map(String::as_str))?;
        map.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}
