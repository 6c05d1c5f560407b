//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// Request ids are generated by the store itself as lowercase UUID v4
/// strings, which is the shape the ledger validates before querying.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Processing requests
        CREATE TABLE IF NOT EXISTS processing_requests (
            id TEXT PRIMARY KEY NOT NULL DEFAULT (
                lower(hex(randomblob(4))) || '-' ||
                lower(hex(randomblob(2))) || '-4' ||
                substr(lower(hex(randomblob(2))), 2) || '-' ||
                substr('89ab', 1 + (abs(random()) % 4), 1) ||
                substr(lower(hex(randomblob(2))), 2) || '-' ||
                lower(hex(randomblob(6)))
            ),
            file_name TEXT NOT NULL,
            file_type TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            blob_url TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'processing',
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_processing_requests_created
            ON processing_requests(created_at);

        -- Processing results (at most one per request)
        CREATE TABLE IF NOT EXISTS processing_results (
            id TEXT PRIMARY KEY NOT NULL DEFAULT (lower(hex(randomblob(16)))),
            request_id TEXT NOT NULL UNIQUE,
            result_data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (request_id) REFERENCES processing_requests(id)
        );
    "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    Ok(())
}
