//! Core abstractions for realtime progress reporting.
//!
//! This crate provides the fundamental building blocks:
//! - `KeyedStore` - User-scoped key/value transport between server and client
//! - `ProgressReporter` - Throttled progress pushes for one session
//! - `SessionUpdate` - Stored value envelope (progress or terminal marker)
//! - `ScopedStore` - Key namespacing over any store
//! - `ConfigScope` - Default config merged with per-document overrides

pub mod config_scope;
pub mod reporter;
pub mod scoped;
pub mod traits;
pub mod update;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config_scope::{Config, ConfigError, ConfigScope};
pub use reporter::{ProgressError, ProgressReporter, SessionState};
pub use scoped::ScopedStore;
pub use traits::{KeyedStore, StoreError};
pub use update::SessionUpdate;
