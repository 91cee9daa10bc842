//! Session dispatch and storage for realtime progress reporting.
//!
//! Provides:
//! - `SessionDispatcher` - Run registered functions under a progress session
//! - `FunctionRegistry` - Explicit name to function mapping
//! - Keyed store implementations (memory, SQLite)

pub mod dispatcher;
pub mod registry;
pub mod storage;

pub use dispatcher::{DispatchError, DispatcherConfig, RunRequest, SessionDispatcher};
pub use registry::{FunctionRegistry, TargetFunction};
