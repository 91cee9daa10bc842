//! Demo server exposing the progress callback over HTTP.
//!
//! Run with: cargo run -p progress-server-demo
//!
//! Then open http://localhost:3000 in your browser.

use std::{net::SocketAddr, sync::Arc, thread::sleep, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    routing::get,
};
use realtime_progress_core::{Config, ConfigScope, ScopedStore};
use realtime_progress_session::{FunctionRegistry, SessionDispatcher, storage::MemoryKeyedStore};
use realtime_progress_transport::http::create_callback_router;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type SharedStore = Arc<MemoryKeyedStore>;
type DemoStore = ScopedStore<SharedStore>;

/// Per-user key spaces. Session keys are caller-chosen, so they must not
/// share a namespace with configuration overrides.
const PROGRESS_SCOPE: &str = "user:demo/progress";
const CONFIG_SCOPE: &str = "user:demo/config";

/// Application state shared across config handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<ConfigScope<DemoStore>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store: SharedStore = Arc::new(MemoryKeyedStore::new());
    let (dispatcher, config) = build(&store);
    let state = AppState {
        config: Arc::new(config),
    };

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/config", get(defaults_handler))
        .route("/config/{scope_id}", get(get_config_handler).post(set_config_handler))
        .with_state(state)
        .merge(create_callback_router(Arc::new(dispatcher)))
        .layer(CorsLayer::permissive());

    // Start server
    let addr: SocketAddr = std::env::var("PROGRESS_ADDR")
        .ok()
        .and_then(|addr| addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));
    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build(store: &SharedStore) -> (SessionDispatcher<DemoStore>, ConfigScope<DemoStore>) {
    let dispatcher = SessionDispatcher::new(ScopedStore::new(Arc::clone(store), PROGRESS_SCOPE), registry());
    let config = ConfigScope::new(default_config(), ScopedStore::new(Arc::clone(store), CONFIG_SCOPE));
    (dispatcher, config)
}

fn registry() -> FunctionRegistry {
    FunctionRegistry::new()
        .with("countTo", |reporter, args| {
            let total = args.first().and_then(Value::as_u64).unwrap_or(10).max(1);
            let delay = args.get(1).and_then(Value::as_u64).unwrap_or(300);
            for n in 1..=total {
                sleep(Duration::from_millis(delay));
                #[allow(clippy::cast_precision_loss)]
                let fraction = n as f64 / total as f64;
                reporter.report(&json!({
                    "fraction": fraction,
                    "label": format!("Step {n} of {total}"),
                }))?;
            }
            Ok(json!(format!("Counted to {total}")))
        })
        .with("fail", |reporter, _| {
            reporter.report(&json!({"fraction": 0.5, "label": "Halfway"}))?;
            sleep(Duration::from_millis(500));
            anyhow::bail!("boom")
        })
}

fn default_config() -> Config {
    let mut config = Config::new();
    config.insert("onOpen".to_string(), json!(true));
    config.insert("onEdit".to_string(), json!(false));
    config.insert("intervalMinutes".to_string(), json!(60));
    config
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn defaults_handler(State(state): State<AppState>) -> Json<Config> {
    Json(state.config.defaults().clone())
}

async fn get_config_handler(
    State(state): State<AppState>,
    Path(scope_id): Path<String>,
) -> Result<Json<Config>, (StatusCode, String)> {
    state
        .config
        .get_effective_config(Some(&scope_id))
        .map(Json)
        .map_err(internal_error)
}

async fn set_config_handler(
    State(state): State<AppState>,
    Path(scope_id): Path<String>,
    Json(partial): Json<Config>,
) -> Result<Json<Config>, (StatusCode, String)> {
    state
        .config
        .set_override_config(&scope_id, &partial)
        .map(Json)
        .map_err(internal_error)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Realtime progress</title>
    <style>
        body { font-family: sans-serif; margin: 2em; }
        #bar { width: 400px; height: 16px; border: 1px solid #888; }
        #fill { height: 100%; width: 0; background: #4a8; }
    </style>
</head>
<body>
    <button onclick="start('countTo', [10, 300])">Count to 10</button>
    <button onclick="start('fail', [])">Fail</button>
    <div id="bar"><div id="fill"></div></div>
    <p id="label">Idle</p>
    <script>
        const call = (method, arg) =>
            fetch('/callback', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ method, arg }),
            }).then(r => r.json());

        function show(update) {
            if (update.state === 'running') {
                document.getElementById('fill').style.width = (update.message.fraction * 100) + '%';
                document.getElementById('label').textContent = update.message.label;
            }
        }

        async function start(functionName, functionArguments) {
            const key = crypto.randomUUID();
            let running = true;
            const poll = async () => {
                if (!running) return;
                const res = await call('message', key);
                if (res.status === 'ok' && res.value !== null) {
                    const update = JSON.parse(res.value);
                    if (update.state === 'ended') { running = false; return; }
                    show(update);
                }
                setTimeout(poll, 200);
            };
            poll();
            const res = await call('run', { key, pushIntervalMs: 250, functionName, functionArguments });
            running = false;
            document.getElementById('label').textContent =
                res.status === 'ok' ? String(res.value) : 'Error: ' + res.message;
            if (res.status === 'ok') document.getElementById('fill').style.width = '100%';
        }
    </script>
</body>
</html>
"#;
