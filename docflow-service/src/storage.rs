//! Object store adapter.
//!
//! Uploaded documents are written to a blob container and handed to the
//! analysis service as time-limited signed URLs.

mod azure;
mod sas;

pub use azure::AzureBlobStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::Url;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StorageError;

/// Lifetime of the read URL returned by [`BlobStore::write`]
pub const READ_URL_EXPIRY_MINUTES: i64 = 120;

/// Upper bound on a reachability check against a document URL
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Hex characters in the random tag of each blob name
const BLOB_TAG_LEN: usize = 8;

/// Characters that are never allowed in a derived blob name
const UNSAFE_NAME_CHARS: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Blob storage as seen by the pipeline
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a name derived from `original_name` and return a
    /// read-only signed URL for it
    async fn write(&self, bytes: Bytes, original_name: &str) -> Result<String, StorageError>;

    /// Issue a read-only signed URL for an existing blob
    fn sign_url(&self, blob_name: &str, expiry_minutes: i64) -> Result<String, StorageError>;

    /// Whether `url` currently answers a HEAD request with a success status.
    /// Never fails; every fault reads as unreachable.
    async fn probe(&self, url: &str) -> bool;

    /// Remove the blob addressed by `url`
    #[allow(dead_code)] // Uploaded blobs are currently kept
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Collision-resistant blob name: upload time in milliseconds, a random
/// tag, then the sanitized original file name
pub fn blob_name_for(original_name: &str) -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        &tag[..BLOB_TAG_LEN],
        sanitize_file_name(original_name)
    )
}

pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !UNSAFE_NAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// A URL counts as signed when its query carries a `sig` or `sv` parameter
pub fn is_signed_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.query_pairs().any(|(k, _)| k == "sig" || k == "sv"))
        .unwrap_or(false)
}

/// Decoded blob name taken from the last path segment of `url`
pub fn blob_name_from_url(url: &str) -> Result<String, StorageError> {
    let invalid = || StorageError::InvalidUrl {
        url: strip_query(url).to_string(),
    };

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(invalid)?;

    urlencoding::decode(segment)
        .map(|name| name.into_owned())
        .map_err(|_| invalid())
}

/// `url` without its query string, safe to show in logs and error records
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
