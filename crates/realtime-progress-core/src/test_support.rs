//! Store fixtures for tests.

use std::{collections::HashMap, sync::Mutex};

use crate::{KeyedStore, StoreError};

/// Store that keeps every write, in order.
#[derive(Default)]
pub struct RecordingStore {
    values: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
}

impl RecordingStore {
    /// Values written to `key`, oldest first.
    ///
    /// # Panics
    /// Panics if a lock is poisoned.
    pub fn writes_to(&self, key: &str) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Writes to any key.
    ///
    /// # Panics
    /// Panics if a lock is poisoned.
    pub fn total_writes(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

impl KeyedStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }
}

/// Store whose writes always fail; reads see nothing.
pub struct FailingStore;

impl KeyedStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Internal("store is read-only".to_string()))
    }
}
