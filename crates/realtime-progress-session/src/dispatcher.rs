//! Session dispatcher: runs registered functions under a progress session and
//! answers polls.

use realtime_progress_core::{KeyedStore, ProgressError, ProgressReporter, SessionUpdate, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FunctionRegistry;

/// Dispatcher error.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    /// Failure raised by the target function, passed through untouched.
    #[error(transparent)]
    Target(anyhow::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DispatchError {
    /// Stable identifier for the wire protocol.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::UnknownFunction(_) => "unknown_function",
            Self::Target(_) => "target_failure",
            Self::Store(_) | Self::Serialization(_) => "store",
        }
    }

    /// The target function's own error, if that is what failed.
    #[must_use]
    pub const fn target(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Target(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProgressError> for DispatchError {
    fn from(e: ProgressError) -> Self {
        match e {
            ProgressError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            ProgressError::Store(e) => Self::Store(e),
            ProgressError::Serialization(e) => Self::Serialization(e),
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Push interval used when a run request does not carry one.
    pub default_push_interval_ms: i64,
    /// Prefix prepended to session keys in the store.
    pub key_prefix: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_push_interval_ms: 1000,
            key_prefix: String::new(),
        }
    }
}

/// Request to run a function under a progress session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Caller-chosen session key; must be unique among concurrent runs.
    pub key: String,
    /// Minimum time between two store writes.
    #[serde(default, alias = "pushIntervalInMs", skip_serializing_if = "Option::is_none")]
    pub push_interval_ms: Option<i64>,
    /// Registered function name.
    pub function_name: String,
    /// Positional arguments passed after the reporter.
    #[serde(default)]
    pub function_arguments: Vec<Value>,
}

impl RunRequest {
    /// Create a request with no arguments and the default push interval.
    #[must_use]
    pub fn new(key: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            push_interval_ms: None,
            function_name: function_name.into(),
            function_arguments: Vec::new(),
        }
    }

    /// Set the push interval.
    #[must_use]
    pub const fn push_interval_ms(mut self, push_interval_ms: i64) -> Self {
        self.push_interval_ms = Some(push_interval_ms);
        self
    }

    /// Set the positional arguments.
    #[must_use]
    pub fn arguments(mut self, arguments: Vec<Value>) -> Self {
        self.function_arguments = arguments;
        self
    }
}

/// Single entry point for running progress-tracked functions and polling
/// their sessions.
pub struct SessionDispatcher<S>
where
    S: KeyedStore,
{
    store: S,
    registry: FunctionRegistry,
    config: DispatcherConfig,
}

impl<S> SessionDispatcher<S>
where
    S: KeyedStore,
{
    /// Create a dispatcher with default settings.
    #[must_use]
    pub fn new(store: S, registry: FunctionRegistry) -> Self {
        Self::with_config(store, registry, DispatcherConfig::default())
    }

    /// Create a dispatcher with explicit settings.
    #[must_use]
    pub const fn with_config(store: S, registry: FunctionRegistry, config: DispatcherConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Function registry.
    pub const fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Dispatcher settings.
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    fn store_key(&self, key: &str) -> String {
        format!("{}{key}", self.config.key_prefix)
    }

    /// Run a registered function under a progress session.
    ///
    /// Blocks until the function returns. The session is ended on every exit
    /// path before this returns.
    ///
    /// # Errors
    /// - [`DispatchError::UnknownFunction`] if the name is not registered;
    ///   nothing is written to the store.
    /// - [`DispatchError::InvalidArgument`] for an empty key or negative
    ///   interval; the function is not called.
    /// - [`DispatchError::Target`] carrying the function's own error.
    /// - [`DispatchError::Store`] if the function succeeded but the terminal
    ///   marker could not be written.
    pub fn run(&self, request: RunRequest) -> Result<Value, DispatchError> {
        let RunRequest {
            key,
            push_interval_ms,
            function_name,
            function_arguments,
        } = request;

        let function = self
            .registry
            .get(&function_name)
            .ok_or_else(|| DispatchError::UnknownFunction(function_name.clone()))?;

        if key.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "session key must not be empty".to_string(),
            ));
        }
        let push_interval_ms = push_interval_ms.unwrap_or(self.config.default_push_interval_ms);
        let mut reporter = ProgressReporter::new(&self.store, self.store_key(&key), push_interval_ms)?;

        tracing::info!(%key, function = %function_name, "progress session running");
        let outcome = function(&mut reporter, function_arguments);
        let ended = reporter.end();

        match outcome {
            Ok(value) => {
                ended?;
                tracing::info!(%key, "progress session completed");
                Ok(value)
            }
            Err(error) => {
                if let Err(e) = ended {
                    tracing::warn!(%key, "failed to end session after function error: {e}");
                }
                tracing::info!(%key, "progress session failed: {error:#}");
                Err(DispatchError::Target(error))
            }
        }
    }

    /// Raw value stored under `key`, or `None` if nothing was written yet.
    ///
    /// Performs no ownership check on `key`.
    ///
    /// # Errors
    /// Returns error if the store cannot be read.
    pub fn poll(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store.get(&self.store_key(key))
    }

    /// Decoded value stored under `key`.
    ///
    /// # Errors
    /// Returns error if the store cannot be read or holds a value that was not
    /// written by a reporter.
    pub fn poll_update(&self, key: &str) -> Result<Option<SessionUpdate>, DispatchError> {
        self.poll(key)?
            .map(|raw| SessionUpdate::decode(&raw))
            .transpose()
            .map_err(DispatchError::from)
    }
}
