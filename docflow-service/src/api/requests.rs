//! Request status, result and history endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use crate::db::{ProcessingResult, RequestSummary};
use crate::error::ServiceError;

use super::AppState;

pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RequestSummary>, ServiceError> {
    state.service.get_status(&id).map(Json)
}

pub async fn result_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProcessingResult>, ServiceError> {
    state.service.get_result(&id).map(Json)
}

/// All requests, most recent first
pub async fn history_handler(State(state): State<Arc<AppState>>) -> Json<Vec<RequestSummary>> {
    Json(state.service.get_history())
}
