//! Status, result and history reads.

use crate::db::{ProcessingResult, RequestSummary};
use crate::error::{ServiceError, ServiceResult};
use crate::service::DocflowService;

impl DocflowService {
    pub fn get_status(&self, request_id: &str) -> ServiceResult<RequestSummary> {
        self.ledger
            .get_request(request_id)
            .map(|request| request.summary())
            .ok_or_else(|| ServiceError::RequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    pub fn get_result(&self, request_id: &str) -> ServiceResult<ProcessingResult> {
        self.ledger
            .get_result(request_id)
            .ok_or_else(|| ServiceError::ResultNotFound {
                request_id: request_id.to_string(),
            })
    }

    /// Every known request, most recent first
    pub fn get_history(&self) -> Vec<RequestSummary> {
        self.ledger.get_history()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DatabaseConfig;
    use crate::error::ServiceError;
    use crate::service::test_support::*;
    use bytes::Bytes;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let service = service(
            Arc::new(FakeStore::default()),
            Arc::new(FakeAnalyzer::default()),
            DatabaseConfig::default(),
        );

        assert!(matches!(
            service.get_status("local-missing"),
            Err(ServiceError::RequestNotFound { .. })
        ));
        assert!(matches!(
            service.get_result("6f1c2d4e-0000-4000-8000-000000000000"),
            Err(ServiceError::ResultNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_result_reads_are_idempotent() {
        let service = service(
            Arc::new(FakeStore::default()),
            Arc::new(FakeAnalyzer::default()),
            DatabaseConfig::default(),
        );

        let accepted = service
            .upload_document(Bytes::from_static(b"data"), "a.pdf", None)
            .await
            .unwrap();
        accepted.pipeline.await.unwrap();

        let first = service.get_result(&accepted.request_id).unwrap();
        let second = service.get_result(&accepted.request_id).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let service = service(
            Arc::new(FakeStore::default()),
            Arc::new(FakeAnalyzer::default()),
            DatabaseConfig::default(),
        );

        let older = service
            .upload_document(Bytes::from_static(b"1"), "older.txt", None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let newer = service
            .upload_document(Bytes::from_static(b"2"), "newer.txt", None)
            .await
            .unwrap();

        let ids: Vec<String> = service.get_history().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.request_id, older.request_id]);
    }
}
