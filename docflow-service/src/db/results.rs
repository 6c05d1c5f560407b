//! Processing result operations on the durable store.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{ProcessingResult, ProcessingStatus, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Complete a request and store its result in one transaction.
    ///
    /// Returns `Ok(false)` without writing anything when the request is
    /// unknown or already terminal.
    pub fn insert_result(
        &self,
        request_id: &str,
        result_data: &serde_json::Value,
    ) -> ServiceResult<bool> {
        let result_json =
            serde_json::to_string(result_data).map_err(DatabaseError::Serialization)?;
        let now = format_timestamp(&Utc::now());

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let rows = tx
            .execute(
                "UPDATE processing_requests SET status = ?1, error_message = NULL, updated_at = ?2 \
                 WHERE id = ?3 AND status NOT IN ('completed', 'failed')",
                params![ProcessingStatus::Completed.as_str(), now, request_id],
            )
            .map_err(DatabaseError::Query)?;

        if rows == 0 {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO processing_results (request_id, result_data, created_at) VALUES (?1, ?2, ?3)",
            params![request_id, result_json, now],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;

        Ok(true)
    }

    /// Get the result for a request, joined with the request's file details
    pub fn find_result(&self, request_id: &str) -> ServiceResult<Option<ProcessingResult>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT r.id, r.request_id, p.file_name, p.file_type, r.result_data, r.created_at \
             FROM processing_results r \
             JOIN processing_requests p ON r.request_id = p.id \
             WHERE r.request_id = ?1",
            params![request_id],
            ProcessingResult::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewRequest;
    use serde_json::json;

    fn insert(db: &Database) -> String {
        db.insert_request(&NewRequest {
            file_name: "sample.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            file_size: 10 * 1024,
            blob_url: "https://acct.blob.core.windows.net/uploads/sample.pdf?sig=x".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_insert_result_completes_request() {
        let db = Database::open_in_memory().unwrap();
        let id = insert(&db);

        assert!(db.insert_result(&id, &json!({ "pageCount": 2 })).unwrap());

        let request = db.find_request(&id).unwrap().unwrap();
        assert_eq!(request.status, ProcessingStatus::Completed);

        let result = db.find_result(&id).unwrap().unwrap();
        assert_eq!(result.request_id, id);
        assert_eq!(result.file_name, "sample.pdf");
        assert_eq!(result.result_data["pageCount"], 2);
    }

    #[test]
    fn test_second_result_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let id = insert(&db);

        assert!(db.insert_result(&id, &json!({ "pageCount": 1 })).unwrap());
        assert!(!db.insert_result(&id, &json!({ "pageCount": 9 })).unwrap());

        let result = db.find_result(&id).unwrap().unwrap();
        assert_eq!(result.result_data["pageCount"], 1);
    }

    #[test]
    fn test_failed_request_never_gets_result() {
        let db = Database::open_in_memory().unwrap();
        let id = insert(&db);

        db.update_request_status(&id, ProcessingStatus::Failed, None)
            .unwrap();
        assert!(!db.insert_result(&id, &json!({})).unwrap());
        assert!(db.find_result(&id).unwrap().is_none());
    }

    #[test]
    fn test_result_reads_are_stable() {
        let db = Database::open_in_memory().unwrap();
        let id = insert(&db);
        db.insert_result(&id, &json!({ "content": "hello" })).unwrap();

        let first = db.find_result(&id).unwrap();
        let second = db.find_result(&id).unwrap();
        assert_eq!(first, second);
    }
}
