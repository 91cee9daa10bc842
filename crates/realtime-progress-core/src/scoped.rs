//! Key namespacing over a shared store.

use crate::{KeyedStore, StoreError};

/// View of a store where every key is prefixed with a scope.
///
/// Used to give each user their own key space on a shared backend, and to
/// keep configuration overrides apart from session keys.
#[derive(Debug, Clone)]
pub struct ScopedStore<S> {
    inner: S,
    scope: String,
}

impl<S: KeyedStore> ScopedStore<S> {
    /// Create a scoped view of `inner`.
    #[must_use]
    pub fn new(inner: S, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    /// Scope prefix.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Key as stored in the underlying store.
    #[must_use]
    pub fn scoped_key(&self, key: &str) -> String {
        format!("{}/{key}", self.scope)
    }

    /// Unwrap the underlying store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: KeyedStore> KeyedStore for ScopedStore<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(&self.scoped_key(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(&self.scoped_key(key), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingStore;

    #[test]
    fn test_scopes_are_isolated() {
        let shared = RecordingStore::default();
        let alice = ScopedStore::new(&shared, "user:alice");
        let bob = ScopedStore::new(&shared, "user:bob");

        alice.set("s1", "a").unwrap();
        bob.set("s1", "b").unwrap();

        assert_eq!(alice.get("s1").unwrap().as_deref(), Some("a"));
        assert_eq!(bob.get("s1").unwrap().as_deref(), Some("b"));
        assert_eq!(shared.get("user:alice/s1").unwrap().as_deref(), Some("a"));
        assert_eq!(shared.get("s1").unwrap(), None);
    }
}
