//! Client side of the callback protocol.

use std::sync::Arc;

use async_trait::async_trait;
use realtime_progress_core::KeyedStore;
use realtime_progress_session::{RunRequest, SessionDispatcher};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{self, CallbackRequest, CallbackResponse};

/// Client error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error envelope.
    #[error("{kind}: {message}")]
    Remote { kind: String, message: String },
    #[error("Task error: {0}")]
    Task(String),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Remote error kind, e.g. `"target_failure"`.
    #[must_use]
    pub fn remote_kind(&self) -> Option<&str> {
        match self {
            Self::Remote { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl CallbackResponse {
    /// Convert into the carried value or a [`ClientError::Remote`].
    ///
    /// # Errors
    /// Returns error for an error envelope.
    pub fn into_result(self) -> Result<Value, ClientError> {
        match self {
            Self::Ok { value } => Ok(value),
            Self::Error { kind, message } => Err(ClientError::Remote { kind, message }),
        }
    }
}

/// Trait for issuing callback requests.
///
/// Implement this for whatever carries requests to the server; the poller and
/// `run_with_progress` only need `call`.
#[async_trait]
pub trait CallbackClient: Send + Sync {
    /// Send one request and wait for its response.
    async fn call(&self, request: CallbackRequest) -> Result<CallbackResponse, ClientError>;

    /// Run a function; resolves when the server-side run completes.
    async fn run(&self, request: RunRequest) -> Result<Value, ClientError> {
        self.call(CallbackRequest::Run(request)).await?.into_result()
    }

    /// Latest raw value under `key`, `None` if nothing was written yet.
    async fn message(&self, key: &str) -> Result<Option<String>, ClientError> {
        match self
            .call(CallbackRequest::Message(key.to_string()))
            .await?
            .into_result()?
        {
            Value::Null => Ok(None),
            Value::String(raw) => Ok(Some(raw)),
            other => Err(ClientError::UnexpectedResponse(other.to_string())),
        }
    }
}

/// Client bound to an in-process dispatcher.
///
/// Every request runs on tokio's blocking pool, so a long `run` does not hold
/// up polls issued on the async runtime.
pub struct LocalClient<S>
where
    S: KeyedStore,
{
    dispatcher: Arc<SessionDispatcher<S>>,
}

impl<S> LocalClient<S>
where
    S: KeyedStore,
{
    /// Create a client for `dispatcher`.
    #[must_use]
    pub const fn new(dispatcher: Arc<SessionDispatcher<S>>) -> Self {
        Self { dispatcher }
    }
}

impl<S> Clone for LocalClient<S>
where
    S: KeyedStore,
{
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

#[async_trait]
impl<S> CallbackClient for LocalClient<S>
where
    S: KeyedStore + 'static,
{
    async fn call(&self, request: CallbackRequest) -> Result<CallbackResponse, ClientError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::task::spawn_blocking(move || protocol::dispatch(&dispatcher, request))
            .await
            .map_err(|e| ClientError::Task(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use realtime_progress_core::SessionUpdate;
    use realtime_progress_session::{FunctionRegistry, storage::MemoryKeyedStore};
    use serde_json::json;

    use super::*;

    fn client() -> LocalClient<MemoryKeyedStore> {
        let registry = FunctionRegistry::new()
            .with("answer", |_, _| Ok(json!(42)))
            .with("fail", |_, _| anyhow::bail!("boom"));
        LocalClient::new(Arc::new(SessionDispatcher::new(MemoryKeyedStore::new(), registry)))
    }

    #[tokio::test]
    async fn test_run_and_message() {
        let client = client();
        assert_eq!(client.message("s1").await.unwrap(), None);

        let value = client.run(RunRequest::new("s1", "answer")).await.unwrap();
        assert_eq!(value, json!(42));

        let raw = client.message("s1").await.unwrap().unwrap();
        assert_eq!(SessionUpdate::decode(&raw).unwrap(), SessionUpdate::Ended);
    }

    #[tokio::test]
    async fn test_remote_error_keeps_kind_and_message() {
        let err = client().run(RunRequest::new("s2", "fail")).await.unwrap_err();
        assert_eq!(err.remote_kind(), Some("target_failure"));
        assert_eq!(err.to_string(), "target_failure: boom");
    }
}
