//! HTTP API for the document pipeline.
//!
//! - `POST /upload` accepts a multipart document and answers immediately
//! - `GET /status/{id}`, `GET /results/{id}` and `GET /history` read the ledger
//! - `GET /health` reports uptime and whether the durable store is in use
//! - `POST /admin/reconnect` retries the durable store after an outage

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::service::DocflowService;

pub mod requests;
pub mod uploads;
use requests::{history_handler, result_handler, status_handler};
use uploads::upload_handler;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<DocflowService>,
    pub start_time: Instant,
}

/// Build the API router
pub fn router(service: Arc<DocflowService>) -> Router {
    let max_body_size = service.max_upload_bytes() as usize + MULTIPART_OVERHEAD_BYTES;

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/upload/status/{id}", get(status_handler))
        .route("/status/{id}", get(status_handler))
        .route("/results/{id}", get(result_handler))
        .route("/history", get(history_handler))
        .route("/admin/reconnect", post(reconnect_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let durable_store = state.service.ledger().is_durable();

    Json(HealthResponse {
        status: if durable_store { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        durable_store,
    })
}

/// Retry the durable store; the ledger otherwise stays in fallback mode
async fn reconnect_handler(State(state): State<Arc<AppState>>) -> Json<ReconnectResponse> {
    let durable_store = state.service.ledger().reconnect();
    if durable_store {
        info!("Ledger reconnected to durable store");
    } else {
        warn!("Ledger reconnect failed, still running in-process");
    }

    Json(ReconnectResponse { durable_store })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconnectResponse {
    durable_store: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    durable_store: bool,
}
