//! # Metrics / Health HTTP Server
//!
//! A small `axum` server exposing `/healthz` (liveness), `/readyz`
//! (readiness, flips once the controller has bound its watch), and
//! `/metrics` (Prometheus exposition). Run as a background task from
//! `runtime::initialization`, which blocks startup until it reports ready
//! so readiness probes never flap on the first poll.

use axum::{routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared readiness flag, flipped once by `initialization::initialize` after
/// the server has bound and the Kubernetes client is constructed.
#[derive(Debug)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            is_ready: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(axum::extract::State(state): axum::extract::State<Arc<ServerState>>) -> (axum::http::StatusCode, &'static str) {
    if state.is_ready.load(Ordering::Relaxed) {
        (axum::http::StatusCode::OK, "ready")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics() -> String {
    super::metrics::registry::gather()
}

/// Bind and serve on `port` until the process shuts down. Marks `state`
/// ready as soon as the listener is bound, not when the first request
/// arrives.
pub async fn start_server(port: u16, state: Arc<ServerState>) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("metrics/health server listening on {addr}");
    state.is_ready.store(true, Ordering::Relaxed);

    axum::serve(listener, app).await?;
    Ok(())
}
