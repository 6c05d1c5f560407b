//! Document upload endpoint.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::ServiceError;

use super::AppState;

/// Response for an accepted upload
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub request_id: String,
}

/// Accept a multipart upload (field `file`) and schedule its analysis.
///
/// Answers 202 as soon as the document is stored and recorded; progress is
/// read from the status endpoint.
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ServiceError> {
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(invalid_multipart)?;
        file = Some((data, file_name, content_type));
    }

    let (data, file_name, content_type) = file.ok_or_else(|| ServiceError::InvalidRequest {
        message: "No file uploaded".to_string(),
    })?;

    let accepted = state
        .service
        .upload_document(data, &file_name, content_type.as_deref())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            message: "Document uploaded, processing started".to_string(),
            request_id: accepted.request_id,
        }),
    ))
}

fn invalid_multipart(e: axum::extract::multipart::MultipartError) -> ServiceError {
    ServiceError::InvalidRequest {
        message: e.body_text(),
    }
}
