//! Ledger storage backends.
//!
//! `Database` is the durable SQLite store and `MemoryStore` the in-process
//! fallback. Both implement [`RequestStore`]; creation is store-specific
//! because only the durable store generates its own identifiers.

mod memory;
mod migrations;
pub mod models;
mod requests;
mod results;

pub use memory::MemoryStore;
pub use models::{NewRequest, ProcessingRequest, ProcessingResult, ProcessingStatus, RequestSummary};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{DatabaseError, ErrorRecord, ServiceError, ServiceResult};

/// Operations every ledger backend supports once a request exists.
///
/// `update_status` and `save_result` never touch a request that already
/// reached a terminal status; they return `Ok(false)` instead.
pub trait RequestStore: Send + Sync {
    fn update_status(
        &self,
        request_id: &str,
        status: ProcessingStatus,
        error: Option<&ErrorRecord>,
    ) -> ServiceResult<bool>;

    /// Mark the request completed and store its result payload
    fn save_result(&self, request_id: &str, result_data: &serde_json::Value)
    -> ServiceResult<bool>;

    fn get_request(&self, request_id: &str) -> ServiceResult<Option<ProcessingRequest>>;

    fn get_result(&self, request_id: &str) -> ServiceResult<Option<ProcessingResult>>;

    /// All requests, newest first
    fn list_requests(&self) -> ServiceResult<Vec<ProcessingRequest>>;
}

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DatabaseError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> ServiceResult<()> {
        self.conn()?
            .execute_batch(sql)
            .map_err(DatabaseError::Query)?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> ServiceResult<Self> {
        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> ServiceResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ServiceError::Database(DatabaseError::LockPoisoned))
    }
}

impl RequestStore for Database {
    fn update_status(
        &self,
        request_id: &str,
        status: ProcessingStatus,
        error: Option<&ErrorRecord>,
    ) -> ServiceResult<bool> {
        self.update_request_status(request_id, status, error)
    }

    fn save_result(
        &self,
        request_id: &str,
        result_data: &serde_json::Value,
    ) -> ServiceResult<bool> {
        self.insert_result(request_id, result_data)
    }

    fn get_request(&self, request_id: &str) -> ServiceResult<Option<ProcessingRequest>> {
        self.find_request(request_id)
    }

    fn get_result(&self, request_id: &str) -> ServiceResult<Option<ProcessingResult>> {
        self.find_result(request_id)
    }

    fn list_requests(&self) -> ServiceResult<Vec<ProcessingRequest>> {
        self.list_requests_newest_first()
    }
}
