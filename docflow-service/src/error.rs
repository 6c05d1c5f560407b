use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Processing request not found: {request_id}")]
    RequestNotFound { request_id: String },

    #[error("Processing result not found: {request_id}")]
    ResultNotFound { request_id: String },

    #[error("Object storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Analysis(#[from] AnalysisError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Failed to create database directory: {path}")]
    Directory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// Object storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object storage is not configured")]
    NotConfigured,

    #[error("Invalid storage connection string: {message}")]
    InvalidConnectionString { message: String },

    #[error("Failed to build object storage client")]
    Client(#[source] reqwest::Error),

    #[error("Request to object storage failed: {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Object storage rejected {operation} (status {status}): {message}")]
    Rejected {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("Invalid object URL: {url}")]
    InvalidUrl { url: String },
}

/// Document analysis errors.
///
/// Every variant except `Configuration` carries enough detail to be turned
/// into an [`ErrorRecord`] that is shown to the uploader.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis service misconfigured: {message}")]
    Configuration { message: String },

    #[error("{message}")]
    Access {
        message: String,
        detail: String,
        remediation: String,
    },

    #[error("{message}")]
    Network {
        message: String,
        detail: String,
        remediation: String,
    },

    #[error("{message}")]
    Processing {
        message: String,
        /// Document URL with the signed query string removed
        document_url: String,
        detail: String,
        suggestions: Vec<String>,
    },
}

impl AnalysisError {
    /// Machine-readable failure code stored alongside failed requests
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::Configuration { .. } => "ConfigurationError",
            AnalysisError::Access { .. } => "AccessError",
            AnalysisError::Network { .. } => "NetworkError",
            AnalysisError::Processing { .. } => "ProcessingError",
        }
    }
}

/// Failures raised inside the background pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Structured failure detail persisted in a request's `errorMessage` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
    pub detail: String,
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: detail.into(),
            suggestions: if suggestions.is_empty() {
                default_suggestions()
            } else {
                suggestions
            },
            timestamp: Utc::now(),
        }
    }

    /// Record for faults that escaped the pipeline (panics, cancelled tasks)
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            "InternalError",
            "Document processing stopped unexpectedly",
            detail,
            Vec::new(),
        )
    }
}

fn default_suggestions() -> Vec<String> {
    vec![
        "Try uploading the document again".to_string(),
        "Check the document format".to_string(),
        "Contact the system administrator if the problem persists".to_string(),
    ]
}

impl From<&AnalysisError> for ErrorRecord {
    fn from(error: &AnalysisError) -> Self {
        match error {
            AnalysisError::Configuration { message } => {
                ErrorRecord::new(error.code(), error.to_string(), message.clone(), Vec::new())
            }
            AnalysisError::Access {
                message,
                detail,
                remediation,
            }
            | AnalysisError::Network {
                message,
                detail,
                remediation,
            } => ErrorRecord::new(
                error.code(),
                message.clone(),
                detail.clone(),
                vec![remediation.clone()],
            ),
            AnalysisError::Processing {
                message,
                document_url,
                detail,
                suggestions,
            } => ErrorRecord::new(
                error.code(),
                message.clone(),
                format!("{} ({})", detail, document_url),
                suggestions.clone(),
            ),
        }
    }
}

impl From<&PipelineError> for ErrorRecord {
    fn from(error: &PipelineError) -> Self {
        match error {
            PipelineError::Analysis(e) => e.into(),
            PipelineError::Storage(e) => {
                let code = match e {
                    StorageError::NotConfigured
                    | StorageError::InvalidConnectionString { .. }
                    | StorageError::Client(_) => "ConfigurationError",
                    StorageError::Request { .. } => "NetworkError",
                    StorageError::Rejected { .. } | StorageError::InvalidUrl { .. } => {
                        "StorageError"
                    }
                };
                let detail = std::error::Error::source(e)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                ErrorRecord::new(code, e.to_string(), detail, Vec::new())
            }
        }
    }
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::RequestNotFound { .. } | ServiceError::ResultNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Storage(StorageError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Storage(StorageError::Request { .. })
            | ServiceError::Storage(StorageError::Rejected { .. }) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::RequestNotFound { .. } => "request_not_found",
            ServiceError::ResultNotFound { .. } => "result_not_found",
            ServiceError::Storage(StorageError::NotConfigured) => "storage_not_configured",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::Analysis(_) => "analysis_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::FileTooLarge { .. } => "file_too_large",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(code),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_error_record_carries_remediation() {
        let error = AnalysisError::Access {
            message: "Document URL is not accessible".to_string(),
            detail: "Status: 403".to_string(),
            remediation: "Check the container permissions".to_string(),
        };

        let record = ErrorRecord::from(&error);
        assert_eq!(record.code, "AccessError");
        assert_eq!(record.detail, "Status: 403");
        assert_eq!(record.suggestions, vec!["Check the container permissions"]);
    }

    #[test]
    fn test_storage_not_configured_maps_to_configuration_error() {
        let error = PipelineError::Storage(StorageError::NotConfigured);
        let record = ErrorRecord::from(&error);
        assert_eq!(record.code, "ConfigurationError");
        assert_eq!(record.suggestions.len(), 3);
    }

    #[test]
    fn test_error_record_serializes_camel_case() {
        let record = ErrorRecord::internal("worker panicked");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["code"], "InternalError");
        assert!(json.get("suggestions").is_some());
        assert!(json.get("timestamp").is_some());

        let back: ErrorRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_not_found_status_code() {
        let error = ServiceError::RequestNotFound {
            request_id: "abc".to_string(),
        };
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.error_code(), "request_not_found");
    }
}
