//! In-process ledger used while the durable store is unavailable.
//!
//! Lock order is always `requests` before `results`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::RequestStore;
use super::models::{NewRequest, ProcessingRequest, ProcessingResult, ProcessingStatus};
use crate::error::{ErrorRecord, ServiceResult};

#[derive(Debug, Clone)]
struct StoredResult {
    id: String,
    result_data: serde_json::Value,
    processing_date: DateTime<Utc>,
}

/// Request and result maps keyed by request identifier
#[derive(Default)]
pub struct MemoryStore {
    requests: DashMap<String, ProcessingRequest>,
    results: DashMap<String, StoredResult>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new `processing` request under a caller-chosen identifier
    pub fn insert_request(&self, id: &str, request: &NewRequest) {
        self.requests
            .insert(id.to_string(), ProcessingRequest::new(id.to_string(), request));
    }
}

impl RequestStore for MemoryStore {
    fn update_status(
        &self,
        request_id: &str,
        status: ProcessingStatus,
        error: Option<&ErrorRecord>,
    ) -> ServiceResult<bool> {
        let Some(mut request) = self.requests.get_mut(request_id) else {
            return Ok(false);
        };
        if request.status.is_terminal() {
            return Ok(false);
        }

        request.status = status;
        request.error_message = error.cloned();
        request.updated_at = Utc::now();
        Ok(true)
    }

    fn save_result(
        &self,
        request_id: &str,
        result_data: &serde_json::Value,
    ) -> ServiceResult<bool> {
        let Some(mut request) = self.requests.get_mut(request_id) else {
            return Ok(false);
        };
        if request.status.is_terminal() {
            return Ok(false);
        }

        let now = Utc::now();
        request.status = ProcessingStatus::Completed;
        request.error_message = None;
        request.updated_at = now;

        // Inserted while the request entry is still held so readers never
        // see a completed request without its result.
        self.results.insert(
            request_id.to_string(),
            StoredResult {
                id: format!("result-{}", uuid::Uuid::new_v4()),
                result_data: result_data.clone(),
                processing_date: now,
            },
        );
        Ok(true)
    }

    fn get_request(&self, request_id: &str) -> ServiceResult<Option<ProcessingRequest>> {
        Ok(self.requests.get(request_id).map(|r| r.clone()))
    }

    fn get_result(&self, request_id: &str) -> ServiceResult<Option<ProcessingResult>> {
        let Some(request) = self.requests.get(request_id).map(|r| r.clone()) else {
            return Ok(None);
        };
        let Some(stored) = self.results.get(request_id).map(|r| r.clone()) else {
            return Ok(None);
        };

        Ok(Some(ProcessingResult {
            id: stored.id,
            request_id: request.id,
            file_name: request.file_name,
            file_type: request.file_type,
            result_data: stored.result_data,
            processing_date: stored.processing_date,
        }))
    }

    fn list_requests(&self) -> ServiceResult<Vec<ProcessingRequest>> {
        let mut requests: Vec<ProcessingRequest> =
            self.requests.iter().map(|r| r.value().clone()).collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_request(name: &str) -> NewRequest {
        NewRequest {
            file_name: name.to_string(),
            file_type: "text/plain".to_string(),
            file_size: 42,
            blob_url: format!("https://acct.blob.core.windows.net/uploads/{name}?sig=x"),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = MemoryStore::new();
        store.insert_request("local-1", &new_request("note.txt"));

        let request = store.get_request("local-1").unwrap().unwrap();
        assert_eq!(request.file_name, "note.txt");
        assert_eq!(request.status, ProcessingStatus::Processing);
        assert!(store.get_request("local-2").unwrap().is_none());
    }

    #[test]
    fn test_save_result_completes_and_joins_file_details() {
        let store = MemoryStore::new();
        store.insert_request("local-1", &new_request("note.txt"));

        assert!(store.save_result("local-1", &json!({ "pageCount": 1 })).unwrap());

        let request = store.get_request("local-1").unwrap().unwrap();
        assert_eq!(request.status, ProcessingStatus::Completed);

        let result = store.get_result("local-1").unwrap().unwrap();
        assert_eq!(result.request_id, "local-1");
        assert_eq!(result.file_name, "note.txt");
        assert!(result.id.starts_with("result-"));
        assert_eq!(result.result_data["pageCount"], 1);
    }

    #[test]
    fn test_terminal_requests_are_frozen() {
        let store = MemoryStore::new();
        store.insert_request("local-1", &new_request("note.txt"));

        let error = ErrorRecord::internal("boom");
        assert!(
            store
                .update_status("local-1", ProcessingStatus::Failed, Some(&error))
                .unwrap()
        );
        assert!(
            !store
                .update_status("local-1", ProcessingStatus::Processing, None)
                .unwrap()
        );
        assert!(!store.save_result("local-1", &json!({})).unwrap());

        let request = store.get_request("local-1").unwrap().unwrap();
        assert_eq!(request.status, ProcessingStatus::Failed);
        assert_eq!(request.error_message, Some(error));
        assert!(store.get_result("local-1").unwrap().is_none());
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let store = MemoryStore::new();
        assert!(
            !store
                .update_status("missing", ProcessingStatus::Failed, None)
                .unwrap()
        );
        assert!(!store.save_result("missing", &json!({})).unwrap());
        assert!(store.list_requests().unwrap().is_empty());
    }

    #[test]
    fn test_list_newest_first() {
        let store = MemoryStore::new();
        store.insert_request("local-a", &new_request("a.txt"));
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.insert_request("local-b", &new_request("b.txt"));

        let names: Vec<String> = store
            .list_requests()
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
    }
}
