//! Core traits for the keyed store.

use std::sync::Arc;

use thiserror::Error;

/// Store error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Internal(String),
    #[error("[{backend}] {message}")]
    Backend {
        /// Backend identifier (e.g. `"sqlite"`).
        backend: &'static str,
        /// Human-readable error description.
        message: String,
    },
}

impl StoreError {
    /// Create a [`Backend`](Self::Backend) error for the given backend.
    #[must_use]
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}

/// Persistent key to string store, scoped to the current user.
///
/// This is the only channel between a running session and its pollers.
/// Per-key reads and writes must be atomic with last-writer-wins semantics;
/// a session is the only writer of its own key, so no compare-and-swap is
/// needed.
pub trait KeyedStore: Send + Sync {
    /// Get the value stored under `key`, or `None` if nothing was written.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the value stored under `key`.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<S: KeyedStore + ?Sized> KeyedStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

impl<S: KeyedStore + ?Sized> KeyedStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

impl<S: KeyedStore + ?Sized> KeyedStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}
