//! In-memory keyed store.

use std::{collections::HashMap, sync::RwLock};

use realtime_progress_core::{KeyedStore, StoreError};

/// In-memory store implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryKeyedStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKeyedStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self
            .values
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .len())
    }

    /// Whether no key has been written.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Remove `key`, returning its last value.
    ///
    /// Sessions never delete their keys; this is for callers that adopt their
    /// own expiry convention.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn remove(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .values
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .remove(key))
    }
}

impl KeyedStore for MemoryKeyedStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .values
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn test_get_set_overwrite() {
        let store = MemoryKeyedStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "a").unwrap();
        store.set("k", "b").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("b"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_remove() {
        let store = MemoryKeyedStore::new();
        store.set("k", "a").unwrap();
        assert_eq!(store.remove("k").unwrap().as_deref(), Some("a"));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_concurrent_reader_sees_whole_values() {
        let store = Arc::new(MemoryKeyedStore::new());
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..200 {
                    store.set("k", &format!("value-{n}")).unwrap();
                }
            })
        };
        for _ in 0..200 {
            if let Some(value) = store.get("k").unwrap() {
                assert!(value.starts_with("value-"));
            }
        }
        writer.join().unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("value-199"));
    }
}
