//! Processing request operations on the durable store.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{NewRequest, ProcessingRequest, ProcessingStatus, format_timestamp};
use crate::error::{DatabaseError, ErrorRecord, ServiceResult};

const REQUEST_COLUMNS: &str = "id, file_name, file_type, file_size, blob_url, status, error_message, created_at, updated_at";

impl Database {
    /// Insert a new request in `processing` state and return the
    /// store-generated identifier
    pub fn insert_request(&self, request: &NewRequest) -> ServiceResult<String> {
        let conn = self.conn()?;
        let now = format_timestamp(&Utc::now());

        let id: String = conn
            .query_row(
                r#"
                INSERT INTO processing_requests (file_name, file_type, file_size, blob_url, status, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                RETURNING id
                "#,
                params![
                    request.file_name,
                    request.file_type,
                    request.file_size as i64,
                    request.blob_url,
                    ProcessingStatus::Processing.as_str(),
                    now,
                ],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        Ok(id)
    }

    /// Update a non-terminal request's status and error detail
    pub fn update_request_status(
        &self,
        request_id: &str,
        status: ProcessingStatus,
        error: Option<&ErrorRecord>,
    ) -> ServiceResult<bool> {
        let error_json = error
            .map(serde_json::to_string)
            .transpose()
            .map_err(DatabaseError::Serialization)?;

        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE processing_requests SET status = ?1, error_message = ?2, updated_at = ?3 \
                 WHERE id = ?4 AND status NOT IN ('completed', 'failed')",
                params![
                    status.as_str(),
                    error_json,
                    format_timestamp(&Utc::now()),
                    request_id
                ],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Get a request by ID
    pub fn find_request(&self, request_id: &str) -> ServiceResult<Option<ProcessingRequest>> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM processing_requests WHERE id = ?1"),
            params![request_id],
            ProcessingRequest::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// List all requests, most recent first
    pub fn list_requests_newest_first(&self) -> ServiceResult<Vec<ProcessingRequest>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM processing_requests ORDER BY created_at DESC"
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], ProcessingRequest::from_row)
            .map_err(DatabaseError::Query)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(requests)
    }
}
