//! Ingestion gateway.

use bytes::Bytes;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::db::NewRequest;
use crate::error::{ServiceError, ServiceResult};
use crate::service::DocflowService;
use crate::storage::strip_query;

const DEFAULT_FILE_NAME: &str = "document";

/// An accepted upload
pub struct Accepted {
    pub request_id: String,
    /// Supervisor of the background pipeline. Dropping it does not cancel
    /// processing.
    #[allow(dead_code)] // Awaited by tests; the HTTP layer drops it
    pub pipeline: JoinHandle<()>,
}

impl DocflowService {
    /// Store an uploaded document, record it as `processing` and schedule
    /// its analysis.
    ///
    /// Returns as soon as the request is recorded. Storage failures are
    /// returned here and nothing is scheduled for them.
    pub async fn upload_document(
        self: &Arc<Self>,
        bytes: Bytes,
        file_name: &str,
        mime_type: Option<&str>,
    ) -> ServiceResult<Accepted> {
        let size = bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(ServiceError::FileTooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }

        let file_name = match file_name.trim() {
            "" => DEFAULT_FILE_NAME,
            name => name,
        };
        let file_type = match mime_type.filter(|m| !m.is_empty()) {
            Some(mime_type) => mime_type.to_string(),
            None => mime::APPLICATION_OCTET_STREAM.to_string(),
        };

        let blob_url = self.store.write(bytes, file_name).await?;

        let request_id = self.ledger.create(&NewRequest {
            file_name: file_name.to_string(),
            file_type,
            file_size: size,
            blob_url: blob_url.clone(),
        });

        info!(
            request_id = %request_id,
            file_name = %file_name,
            size,
            blob = %strip_query(&blob_url),
            "Document uploaded, processing scheduled"
        );

        let pipeline = self.spawn_processing(request_id.clone(), blob_url);

        Ok(Accepted {
            request_id,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DatabaseConfig;
    use crate::db::ProcessingStatus;
    use crate::error::ServiceError;
    use crate::ledger::LOCAL_ID_PREFIX;
    use crate::service::test_support::*;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_before_storage() {
        let store = Arc::new(FakeStore::default());
        let service = service(
            store.clone(),
            Arc::new(FakeAnalyzer::default()),
            DatabaseConfig::default(),
        );

        let err = service
            .upload_document(Bytes::from(vec![0u8; 1024 * 1024 + 1]), "big.pdf", None)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ServiceError::FileTooLarge { .. }));
        assert!(store.signed.lock().unwrap().is_empty());
        assert!(service.get_history().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_schedules_nothing() {
        let store = Arc::new(FakeStore {
            fail_writes: true,
            ..FakeStore::default()
        });
        let analyzer = Arc::new(FakeAnalyzer::default());
        let service = service(store, analyzer.clone(), DatabaseConfig::default());

        let err = service
            .upload_document(Bytes::from_static(b"hello"), "a.txt", None)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ServiceError::Storage(_)));
        assert!(service.get_history().is_empty());
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_returns_before_processing_when_store_down() {
        let service = service(
            Arc::new(FakeStore::default()),
            Arc::new(FakeAnalyzer::default()),
            DatabaseConfig::default(),
        );

        let accepted = service
            .upload_document(Bytes::from_static(b"hi"), "note.txt", Some("text/plain"))
            .await
            .unwrap();
        assert!(accepted.request_id.starts_with(LOCAL_ID_PREFIX));

        let history = service.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].file_name, "note.txt");
        assert_eq!(history[0].file_type, "text/plain");

        accepted.pipeline.await.unwrap();
        assert_eq!(
            service.get_status(&accepted.request_id).unwrap().status,
            ProcessingStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_upload_does_not_wait_for_analysis() {
        let analyzer = Arc::new(FakeAnalyzer::new(AnalyzerMode::Blocked));
        let service = service(
            Arc::new(FakeStore::default()),
            analyzer.clone(),
            DatabaseConfig::default(),
        );

        let accepted = tokio::time::timeout(
            Duration::from_secs(1),
            service.upload_document(Bytes::from_static(b"%PDF"), "slow.pdf", None),
        )
        .await
        .expect("upload waited on analysis")
        .unwrap();

        // Let the worker reach the analyzer, which stays parked
        for _ in 0..50 {
            if analyzer.calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            service.get_status(&accepted.request_id).unwrap().status,
            ProcessingStatus::Processing
        );
        assert!(service.get_result(&accepted.request_id).is_err());

        analyzer.release.notify_one();
        accepted.pipeline.await.unwrap();
        assert_eq!(
            service.get_status(&accepted.request_id).unwrap().status,
            ProcessingStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_missing_name_and_type_get_defaults() {
        let service = service(
            Arc::new(FakeStore::default()),
            Arc::new(FakeAnalyzer::default()),
            DatabaseConfig::default(),
        );

        let accepted = service
            .upload_document(Bytes::from_static(b"x"), "  ", None)
            .await
            .unwrap();

        let status = service.get_status(&accepted.request_id).unwrap();
        assert_eq!(status.file_name, "document");
        assert_eq!(status.file_type, "application/octet-stream");
        assert_eq!(status.file_size, 1);
    }
}
