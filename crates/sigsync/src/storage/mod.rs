//! Local key/value storage abstraction

#[cfg(feature = "fs")]
mod file;
#[cfg(feature = "fs")]
pub use file::FileKeyValueStore;

use crate::error::LocalStoreError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Synchronous string key/value storage scoped to one client
///
/// Every call completes without touching the network, so callers may hold
/// locks across it.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// Remove `key`; no-op when absent
    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}

/// In-memory storage implementation for testing
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Get all stored keys (useful for testing)
    pub fn keys(&self) -> Vec<String> {
        self.data
            .lock()
            .map(|data| data.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        let data = self.data.lock().map_err(|_| LocalStoreError::Poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut data = self.data.lock().map_err(|_| LocalStoreError::Poisoned)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut data = self.data.lock().map_err(|_| LocalStoreError::Poisoned)?;
        data.remove(key);
        Ok(())
    }
}

impl<S: KeyValueStore> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        (**self).remove(key)
    }
}
