//! Per-document configuration scoping.
//!
//! A [`ConfigScope`] holds the default configuration for a trigger library and
//! merges it with an override stored per document or spreadsheet. Merges are
//! shallow: an override key replaces the default value for that key wholesale.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{KeyedStore, StoreError};

/// Configuration object: a flat JSON object.
pub type Config = Map<String, Value>;

/// Store key prefix for per-scope overrides.
const OVERRIDE_PREFIX: &str = "config/";

/// Config scope error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Override for scope {0} is not a JSON object")]
    NotAnObject(String),
    #[error("Scope id must not be empty")]
    EmptyScope,
}

/// Default configuration merged with per-scope overrides.
#[derive(Debug, Clone)]
pub struct ConfigScope<S> {
    defaults: Config,
    store: S,
}

/// Shallow merge: keys of `over` replace keys of `base`.
#[must_use]
pub fn merge(base: &Config, over: &Config) -> Config {
    let mut merged = base.clone();
    for (key, value) in over {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

impl<S: KeyedStore> ConfigScope<S> {
    /// Create a scope with explicit defaults, persisting overrides in `store`.
    #[must_use]
    pub const fn new(defaults: Config, store: S) -> Self {
        Self { defaults, store }
    }

    /// Replace defaults with `{...defaults, ...overrides}`.
    #[must_use]
    pub fn with_defaults(mut self, overrides: &Config) -> Self {
        self.defaults = merge(&self.defaults, overrides);
        self
    }

    /// Default configuration.
    #[must_use]
    pub const fn defaults(&self) -> &Config {
        &self.defaults
    }

    /// Stored override for `scope_id`, empty if none was set.
    ///
    /// # Errors
    /// Returns error if the store cannot be read or holds a non-object value.
    pub fn override_config(&self, scope_id: &str) -> Result<Config, ConfigError> {
        let Some(raw) = self.store.get(&override_key(scope_id))? else {
            return Ok(Config::new());
        };
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::NotAnObject(scope_id.to_string())),
        }
    }

    /// Effective configuration for `scope_id`.
    ///
    /// `None` means no scoping: the defaults are returned as-is.
    ///
    /// # Errors
    /// Returns error if the stored override cannot be read.
    pub fn get_effective_config(&self, scope_id: Option<&str>) -> Result<Config, ConfigError> {
        match scope_id {
            None => Ok(self.defaults.clone()),
            Some(id) => Ok(merge(&self.defaults, &self.override_config(id)?)),
        }
    }

    /// Merge `partial` into the stored override for `scope_id`.
    ///
    /// Returns the new override.
    ///
    /// # Errors
    /// Returns error if `scope_id` is empty or the store fails.
    pub fn set_override_config(&self, scope_id: &str, partial: &Config) -> Result<Config, ConfigError> {
        if scope_id.is_empty() {
            return Err(ConfigError::EmptyScope);
        }
        let updated = merge(&self.override_config(scope_id)?, partial);
        let raw = serde_json::to_string(&updated)?;
        self.store.set(&override_key(scope_id), &raw)?;
        tracing::debug!(scope_id, keys = updated.len(), "config override updated");
        Ok(updated)
    }
}

fn override_key(scope_id: &str) -> String {
    format!("{OVERRIDE_PREFIX}{scope_id}")
}
