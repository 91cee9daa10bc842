//! HTTP transport for the callback entry point.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use realtime_progress_core::KeyedStore;
use realtime_progress_session::SessionDispatcher;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::protocol::{self, CallbackRequest, CallbackResponse};

/// Callback handler state.
pub struct CallbackState<S>
where
    S: KeyedStore,
{
    /// Dispatcher serving every request.
    pub dispatcher: Arc<SessionDispatcher<S>>,
}

impl<S> Clone for CallbackState<S>
where
    S: KeyedStore,
{
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

/// Callback handler.
///
/// `message` is answered inline. `run` is moved to the blocking pool and the
/// response is sent when the target function returns.
pub async fn callback_handler<S>(
    State(state): State<CallbackState<S>>,
    Json(request): Json<CallbackRequest>,
) -> Json<CallbackResponse>
where
    S: KeyedStore + 'static,
{
    let response = match request {
        CallbackRequest::Message(_) => protocol::dispatch(&state.dispatcher, request),
        CallbackRequest::Run(_) => {
            let dispatcher = Arc::clone(&state.dispatcher);
            tokio::task::spawn_blocking(move || protocol::dispatch(&dispatcher, request))
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("run task failed: {e}");
                    CallbackResponse::error("task", e.to_string())
                })
        }
    };
    Json(response)
}

/// Create the callback router, serving `POST /callback`.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_callback_router(dispatcher));
/// ```
#[must_use]
pub fn create_callback_router<S>(dispatcher: Arc<SessionDispatcher<S>>) -> Router
where
    S: KeyedStore + 'static,
{
    Router::new()
        .route("/callback", post(callback_handler::<S>))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(CallbackState { dispatcher })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use realtime_progress_core::SessionUpdate;
    use realtime_progress_session::{FunctionRegistry, storage::MemoryKeyedStore};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        let registry = FunctionRegistry::new().with("countTo3", |reporter, _| {
            for n in 1..=3 {
                reporter.report(&json!({ "n": n }))?;
            }
            Ok(json!("done"))
        });
        create_callback_router(Arc::new(SessionDispatcher::new(
            MemoryKeyedStore::new(),
            registry,
        )))
    }

    async fn post_json(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/callback")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_run_and_poll_over_http() {
        let app = router();

        let (status, body) = post_json(
            app.clone(),
            json!({
                "method": "run",
                "arg": {"key": "s1", "pushIntervalMs": 100, "functionName": "countTo3", "functionArguments": []}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "value": "done"}));

        let (_, body) = post_json(app, json!({"method": "message", "arg": "s1"})).await;
        let raw = body["value"].as_str().unwrap();
        assert_eq!(SessionUpdate::decode(raw).unwrap(), SessionUpdate::Ended);
    }

    #[tokio::test]
    async fn test_unknown_function_over_http() {
        let (status, body) = post_json(
            router(),
            json!({"method": "run", "arg": {"key": "s2", "functionName": "nope"}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "unknown_function");
    }

    #[tokio::test]
    async fn test_poll_without_data_is_null() {
        let (_, body) = post_json(router(), json!({"method": "message", "arg": "fresh"})).await;
        assert_eq!(body, json!({"status": "ok", "value": null}));
    }

    #[tokio::test]
    async fn test_malformed_request_is_rejected() {
        let (status, _) = post_json(router(), json!({"method": "launch", "arg": 1})).await;
        assert!(status.is_client_error());
    }
}
