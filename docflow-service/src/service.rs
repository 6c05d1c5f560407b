//! Upload handoff and the background analysis pipeline.
//!
//! - `upload`: store bytes, record the request, schedule processing
//! - `processing`: the detached pipeline and its supervisor
//! - `queries`: status, result and history reads

mod processing;
mod queries;
mod upload;

pub use upload::Accepted;

use std::sync::Arc;
use tracing::info;

use crate::analysis::DocumentAnalyzer;
use crate::ledger::Ledger;
use crate::storage::BlobStore;

/// Pipeline coordinator. Holds the process-wide blob store, analyzer and
/// ledger, all constructed once by the entry point.
pub struct DocflowService {
    store: Arc<dyn BlobStore>,
    analyzer: Arc<dyn DocumentAnalyzer>,
    ledger: Arc<Ledger>,
    max_upload_bytes: u64,
}

impl DocflowService {
    pub fn new(
        store: Arc<dyn BlobStore>,
        analyzer: Arc<dyn DocumentAnalyzer>,
        ledger: Arc<Ledger>,
        max_upload_bytes: u64,
    ) -> Self {
        info!(
            max_upload_bytes,
            durable = ledger.is_durable(),
            "Document pipeline ready"
        );

        Self {
            store,
            analyzer,
            ledger,
            max_upload_bytes,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }
}
