//! Transport layer for realtime progress sessions.
//!
//! Provides:
//! - Wire protocol for the multiplexed `run` / `message` callback
//! - HTTP transport (feature: http)
//! - Async client trait and a polling stream of session updates

pub mod client;
pub mod poller;
pub mod protocol;

#[cfg(feature = "http")]
pub mod http;

pub use client::{CallbackClient, ClientError, LocalClient};
pub use poller::{ProgressPoller, ProgressRun, run_with_progress};
pub use protocol::{CallbackRequest, CallbackResponse, dispatch, new_session_key};
