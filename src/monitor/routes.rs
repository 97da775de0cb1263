//! SSE event stream + REST endpoints for the monitor.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use serde::Deserialize;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::observer::{ChannelObserver, Subscription};
use super::registry::Registry;
use crate::audit::RuleEngine;
use crate::error::EvaluationError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub engine: Arc<RuleEngine>,
    /// Per-observer queue depth.
    pub observer_buffer: usize,
}

/// Build the Axum router with the event stream and REST routes.
pub fn monitor_routes(registry: Arc<Registry>, engine: Arc<RuleEngine>, observer_buffer: usize) -> Router {
    let state = AppState {
        registry,
        engine,
        observer_buffer,
    };

    Router::new()
        .route("/events", get(events))
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/scan", post(scan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-a11y-monitor"
    }))
}

// ── Event stream ────────────────────────────────────────────────────────

async fn events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, StatusCode> {
    let (observer, rx) = ChannelObserver::channel(state.observer_buffer);
    let id = match state.registry.attach(Box::new(observer)).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Could not attach event stream observer");
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    };
    info!(observer = %id, "Event stream client connected");

    let stream = Subscription::new(id, rx, Arc::clone(&state.registry)).filter_map(|envelope| {
        match envelope.to_json() {
            Ok(json) => Some(Ok(SseEvent::default().data(json))),
            Err(e) => {
                warn!(error = %e, "Failed to serialize event");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ── REST Endpoints ──────────────────────────────────────────────────────

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.status().await)
}

#[derive(Deserialize)]
struct ScanRequest {
    html: String,
}

/// Evaluate an ad-hoc document without going through the inbox.
async fn scan(State(state): State<AppState>, Json(body): Json<ScanRequest>) -> Response {
    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || engine.evaluate_html(&body.html))
        .await
        .map_err(|e| EvaluationError::TaskFailed(e.to_string()))
        .and_then(|r| r);

    match result {
        Ok(report) => (StatusCode::OK, Json(serde_json::json!(report))).into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}
