//! Registry of functions that can be run under a progress session.

use std::{collections::HashMap, fmt, sync::Arc};

use realtime_progress_core::ProgressReporter;
use serde_json::Value;

/// A function the dispatcher can run.
///
/// Receives the session's reporter followed by the caller's positional
/// arguments. Any error it returns is handed back to the caller unchanged.
pub type TargetFunction =
    Arc<dyn Fn(&mut ProgressReporter<'_>, Vec<Value>) -> anyhow::Result<Value> + Send + Sync>;

/// Explicit mapping from function name to callable, populated at startup.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, TargetFunction>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&mut ProgressReporter<'_>, Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut ProgressReporter<'_>, Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    /// Look up a function by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<TargetFunction> {
        self.functions.get(name).cloned()
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
