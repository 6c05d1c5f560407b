//! Dual-mode request ledger.
//!
//! Requests live either in the durable SQLite store or in the in-process
//! [`MemoryStore`]. Which one owns a request is decided once, when the
//! request is created, and is encoded in its identifier:
//!
//! - durable ids are store-generated hyphenated UUIDs;
//! - `local-<uuid>` ids were created while the durable store was unavailable;
//! - `fallback-<uuid>` ids were created when a durable insert failed.
//!
//! Every later read or write for an id is routed by that tag, never by
//! re-probing the store.

use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::db::{
    Database, MemoryStore, NewRequest, ProcessingRequest, ProcessingResult, ProcessingStatus,
    RequestStore, RequestSummary,
};
use crate::error::ErrorRecord;

/// Prefix for ids created while the durable store was unavailable
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Prefix for ids whose durable insert failed
pub const FALLBACK_ID_PREFIX: &str = "fallback-";

/// True for identifiers owned by the in-process store
pub fn is_fallback_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX) || id.starts_with(FALLBACK_ID_PREFIX)
}

/// True for the hyphenated UUID shape the durable store generates
fn is_durable_id(id: &str) -> bool {
    id.len() == 36 && uuid::Uuid::parse_str(id).is_ok()
}

enum Route {
    Memory,
    Durable(Arc<Database>),
}

/// Request/result ledger with durable and in-process backends
pub struct Ledger {
    config: DatabaseConfig,
    durable: ArcSwapOption<Database>,
    available: AtomicBool,
    initialized: OnceLock<()>,
    memory: MemoryStore,
}

impl Ledger {
    /// Create a ledger. No connection is attempted until first use or an
    /// explicit [`Ledger::connect`].
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            durable: ArcSwapOption::empty(),
            available: AtomicBool::new(false),
            initialized: OnceLock::new(),
            memory: MemoryStore::new(),
        }
    }

    /// Attempt the durable connection once. Later calls return the recorded
    /// availability without retrying.
    pub fn connect(&self) -> bool {
        self.initialized.get_or_init(|| {
            self.try_connect();
        });
        self.available.load(Ordering::Acquire)
    }

    /// Explicitly retry the durable connection. This is the only way the
    /// ledger leaves fallback mode.
    pub fn reconnect(&self) -> bool {
        self.initialized.get_or_init(|| ());
        self.try_connect()
    }

    /// Whether new requests currently go to the durable store
    pub fn is_durable(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn try_connect(&self) -> bool {
        let Some(path) = &self.config.path else {
            info!("No durable store configured, ledger running in-process");
            self.durable.store(None);
            self.available.store(false, Ordering::Release);
            return false;
        };

        match Database::open(path) {
            Ok(db) => {
                info!(path = %path.display(), "Connected to durable store");
                self.durable.store(Some(Arc::new(db)));
                self.available.store(true, Ordering::Release);
                true
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Durable store unavailable, ledger falling back to in-process storage"
                );
                self.durable.store(None);
                self.available.store(false, Ordering::Release);
                false
            }
        }
    }

    fn durable_store(&self) -> Option<Arc<Database>> {
        if !self.connect() {
            return None;
        }
        self.durable.load_full()
    }

    fn route(&self, id: &str) -> Route {
        if is_fallback_id(id) {
            return Route::Memory;
        }
        match self.durable_store() {
            Some(db) if is_durable_id(id) => Route::Durable(db),
            _ => Route::Memory,
        }
    }

    /// Record a new request in `processing` state and return its id.
    ///
    /// Never fails: when the durable insert errors the request is kept
    /// in-process under a `fallback-` id.
    pub fn create(&self, request: &NewRequest) -> String {
        let Some(db) = self.durable_store() else {
            let id = format!("{}{}", LOCAL_ID_PREFIX, uuid::Uuid::new_v4());
            self.memory.insert_request(&id, request);
            debug!(request_id = %id, "Request stored in-process");
            return id;
        };

        match db.insert_request(request) {
            Ok(id) => id,
            Err(e) => {
                let id = format!("{}{}", FALLBACK_ID_PREFIX, uuid::Uuid::new_v4());
                warn!(
                    request_id = %id,
                    error = %e,
                    "Durable insert failed, request stored in-process"
                );
                self.memory.insert_request(&id, request);
                id
            }
        }
    }

    /// Move a request to a new status. Unknown or terminal requests are left
    /// untouched and `false` is returned.
    pub fn update_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        error: Option<&ErrorRecord>,
    ) -> bool {
        let outcome = match self.route(id) {
            Route::Memory => self.memory.update_status(id, status, error),
            Route::Durable(db) => db.update_status(id, status, error),
        };

        outcome.unwrap_or_else(|e| {
            warn!(request_id = %id, status = status.as_str(), error = %e, "Failed to update request status");
            false
        })
    }

    /// Mark a request completed and persist its result payload
    pub fn save_result(&self, id: &str, result_data: &serde_json::Value) -> bool {
        let outcome = match self.route(id) {
            Route::Memory => self.memory.save_result(id, result_data),
            Route::Durable(db) => db.save_result(id, result_data),
        };

        outcome.unwrap_or_else(|e| {
            warn!(request_id = %id, error = %e, "Failed to save processing result");
            false
        })
    }

    pub fn get_request(&self, id: &str) -> Option<ProcessingRequest> {
        match self.route(id) {
            Route::Memory => self.memory.get_request(id).ok().flatten(),
            Route::Durable(db) => db.get_request(id).unwrap_or_else(|e| {
                warn!(request_id = %id, error = %e, "Durable request lookup failed, checking in-process store");
                self.memory.get_request(id).ok().flatten()
            }),
        }
    }

    pub fn get_result(&self, id: &str) -> Option<ProcessingResult> {
        match self.route(id) {
            Route::Memory => self.memory.get_result(id).ok().flatten(),
            Route::Durable(db) => db.get_result(id).unwrap_or_else(|e| {
                warn!(request_id = %id, error = %e, "Durable result lookup failed, checking in-process store");
                self.memory.get_result(id).ok().flatten()
            }),
        }
    }

    /// Status summaries from both backends, most recent first
    pub fn get_history(&self) -> Vec<RequestSummary> {
        let mut requests = match self.durable_store() {
            Some(db) => db.list_requests().unwrap_or_else(|e| {
                warn!(error = %e, "Failed to list durable requests");
                Vec::new()
            }),
            None => Vec::new(),
        };
        requests.extend(self.memory.list_requests().unwrap_or_default());
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        requests.iter().map(ProcessingRequest::summary).collect()
    }
}
