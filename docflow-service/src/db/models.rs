//! Ledger record types shared by the durable and in-process stores.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::ErrorRecord;

/// Processing status for requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Uploaded and handed to the background pipeline
    Processing,
    /// Analysis succeeded and a result was stored
    Completed,
    /// The pipeline ended with a structured error
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Parse a stored status. Unknown values, including the retired
    /// `pending`, read as `Processing`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => ProcessingStatus::Completed,
            "failed" => ProcessingStatus::Failed,
            _ => ProcessingStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

/// Fields supplied by the gateway when a request is created
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub blob_url: String,
}

/// Processing request record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequest {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub blob_url: String,
    pub status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<ErrorRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRequest {
    /// Build a fresh record in `processing` state
    pub fn new(id: String, request: &NewRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            file_name: request.file_name.clone(),
            file_type: request.file_type.clone(),
            file_size: request.file_size,
            blob_url: request.blob_url.clone(),
            status: ProcessingStatus::Processing,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public status view (drops the signed blob URL)
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            id: self.id.clone(),
            file_name: self.file_name.clone(),
            file_type: self.file_type.clone(),
            file_size: self.file_size,
            status: self.status,
            upload_date: self.created_at,
            error_message: self.error_message.clone(),
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let file_size: i64 = row.get(3)?;
        let status_str: String = row.get(5)?;
        let error_str: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        Ok(Self {
            id: row.get(0)?,
            file_name: row.get(1)?,
            file_type: row.get(2)?,
            file_size: file_size.max(0) as u64,
            blob_url: row.get(4)?,
            status: ProcessingStatus::from_str(&status_str),
            error_message: error_str.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

/// Status summary returned by status and history reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub status: ProcessingStatus,
    pub upload_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<ErrorRecord>,
}

/// Processing result joined with its request's file details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub id: String,
    pub request_id: String,
    pub file_name: String,
    pub file_type: String,
    pub result_data: serde_json::Value,
    pub processing_date: DateTime<Utc>,
}

impl ProcessingResult {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let result_data_str: String = row.get(4)?;
        let processing_date_str: String = row.get(5)?;

        Ok(Self {
            id: row.get(0)?,
            request_id: row.get(1)?,
            file_name: row.get(2)?,
            file_type: row.get(3)?,
            result_data: serde_json::from_str(&result_data_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
            processing_date: parse_timestamp(&processing_date_str),
        })
    }
}

/// Timestamps are stored as fixed-width RFC 3339 strings so that text
/// ordering matches chronological ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
