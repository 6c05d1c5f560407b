//! Background analysis pipeline.
//!
//! Each request runs once: repair the signed URL if needed, probe it,
//! analyze it, then record either the result or a structured failure.
//! There are no retries.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analysis::AnalysisResult;
use crate::db::ProcessingStatus;
use crate::error::{AnalysisError, ErrorRecord, PipelineError, StorageError};
use crate::service::DocflowService;
use crate::storage::{READ_URL_EXPIRY_MINUTES, blob_name_from_url, is_signed_url, strip_query};

impl DocflowService {
    /// Run the pipeline for `request_id` on a detached task.
    ///
    /// The returned handle belongs to a supervisor that marks the request
    /// failed if the worker task panics.
    pub(crate) fn spawn_processing(
        self: &Arc<Self>,
        request_id: String,
        blob_url: String,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let worker_id = request_id.clone();
        let worker = tokio::spawn(async move {
            service.process_request(&worker_id, &blob_url).await;
        });

        let ledger = Arc::clone(&self.ledger);
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!(request_id = %request_id, error = %e, "Processing task aborted");
                let record = ErrorRecord::internal(e.to_string());
                ledger.update_status(&request_id, ProcessingStatus::Failed, Some(&record));
            }
        })
    }

    pub(crate) async fn process_request(&self, request_id: &str, blob_url: &str) {
        let outcome = self
            .run_pipeline(request_id, blob_url)
            .await
            .and_then(|result| serde_json::to_value(&result).map_err(PipelineOutcome::Encode));

        match outcome {
            Ok(result_data) => {
                if self.ledger.save_result(request_id, &result_data) {
                    info!(request_id = %request_id, "Document processing completed");
                } else {
                    warn!(request_id = %request_id, "Result not recorded, request already terminal or unknown");
                }
            }
            Err(failure) => {
                let record = failure.to_record();
                warn!(
                    request_id = %request_id,
                    code = %record.code,
                    message = %record.message,
                    "Document processing failed"
                );
                if !self
                    .ledger
                    .update_status(request_id, ProcessingStatus::Failed, Some(&record))
                {
                    warn!(request_id = %request_id, "Failure not recorded, request already terminal or unknown");
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        request_id: &str,
        blob_url: &str,
    ) -> Result<AnalysisResult, PipelineOutcome> {
        let url = self.ensure_signed_url(blob_url).map_err(PipelineError::from)?;

        if !self.store.probe(&url).await {
            return Err(PipelineError::from(inaccessible(&url)).into());
        }
        debug!(request_id = %request_id, "Document reachable, starting analysis");

        let result = self
            .analyzer
            .analyze(&url, None)
            .await
            .map_err(PipelineError::from)?;
        Ok(result)
    }

    /// Return `blob_url` if it carries a signature, otherwise a freshly
    /// signed URL for the same blob
    fn ensure_signed_url(&self, blob_url: &str) -> Result<String, StorageError> {
        if is_signed_url(blob_url) {
            return Ok(blob_url.to_string());
        }

        let blob_name = blob_name_from_url(blob_url)?;
        debug!(blob = %blob_name, "Stored URL is unsigned, issuing a new signature");
        self.store.sign_url(&blob_name, READ_URL_EXPIRY_MINUTES)
    }
}

/// Why a pipeline run ended without a result payload
enum PipelineOutcome {
    Failed(PipelineError),
    Encode(serde_json::Error),
}

impl From<PipelineError> for PipelineOutcome {
    fn from(error: PipelineError) -> Self {
        PipelineOutcome::Failed(error)
    }
}

impl PipelineOutcome {
    fn to_record(&self) -> ErrorRecord {
        match self {
            PipelineOutcome::Failed(e) => ErrorRecord::from(e),
            PipelineOutcome::Encode(e) => ErrorRecord::internal(e.to_string()),
        }
    }
}

fn inaccessible(url: &str) -> AnalysisError {
    AnalysisError::Access {
        message: "Document is not accessible".to_string(),
        detail: format!("Probe of {} did not succeed", strip_query(url)),
        remediation: "Check that the blob exists and the signed URL has not expired".to_string(),
    }
}
