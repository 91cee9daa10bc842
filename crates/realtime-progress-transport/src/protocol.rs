//! Wire protocol for client-server communication.

use realtime_progress_core::KeyedStore;
use realtime_progress_session::{DispatchError, RunRequest, SessionDispatcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Request from client to server.
///
/// `{"method":"run","arg":{...}}` or `{"method":"message","arg":"<key>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "arg", rename_all = "snake_case")]
pub enum CallbackRequest {
    /// Run a registered function under a progress session.
    Run(RunRequest),
    /// Read the latest value stored under a session key.
    Message(String),
}

/// Response from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallbackResponse {
    /// For `run`, the function's return value. For `message`, the raw stored
    /// string, or `null` when nothing has been written yet.
    Ok { value: Value },
    /// Any failure, including the target function's own error.
    Error { kind: String, message: String },
}

impl CallbackResponse {
    /// Create an error response.
    #[must_use]
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Whether this is an error response.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<&DispatchError> for CallbackResponse {
    fn from(e: &DispatchError) -> Self {
        Self::error(e.kind(), format!("{e:#}"))
    }
}

/// Generate a fresh session key.
#[must_use]
pub fn new_session_key() -> String {
    Uuid::new_v4().to_string()
}

/// Handle one callback request.
///
/// `run` blocks until the target function returns; call it from a thread that
/// may block.
pub fn dispatch<S: KeyedStore>(
    dispatcher: &SessionDispatcher<S>,
    request: CallbackRequest,
) -> CallbackResponse {
    match request {
        CallbackRequest::Run(run) => match dispatcher.run(run) {
            Ok(value) => CallbackResponse::Ok { value },
            Err(e) => {
                tracing::debug!(kind = e.kind(), "run failed: {e}");
                CallbackResponse::from(&e)
            }
        },
        CallbackRequest::Message(key) => match dispatcher.poll(&key) {
            Ok(raw) => CallbackResponse::Ok {
                value: raw.map_or(Value::Null, Value::String),
            },
            Err(e) => CallbackResponse::from(&DispatchError::from(e)),
        },
    }
}
