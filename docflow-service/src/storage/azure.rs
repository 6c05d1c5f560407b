use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::sas::StorageCredentials;
use super::{
    BlobStore, PROBE_TIMEOUT, READ_URL_EXPIRY_MINUTES, blob_name_for, blob_name_from_url,
    strip_query,
};
use crate::config::StorageConfig;
use crate::error::StorageError;

/// Signed URL start times are backdated to tolerate clock skew
const START_BACKDATE_MINUTES: i64 = 5;

const WRITE_SAS_EXPIRY_MINUTES: i64 = 15;

const CONTAINER_SAS_EXPIRY_MINUTES: i64 = 5;

/// Azure Blob Storage adapter authenticated with per-request SAS tokens.
///
/// Without credentials the adapter still constructs, but every operation
/// fails with [`StorageError::NotConfigured`] and probes report unreachable.
pub struct AzureBlobStore {
    client: Client,
    credentials: Option<StorageCredentials>,
    container: String,
    probe_timeout: Duration,
}

impl AzureBlobStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let credentials = match config.connection_string.as_deref() {
            Some(connection_string) => {
                match StorageCredentials::from_connection_string(connection_string) {
                    Ok(credentials) => {
                        info!(
                            account = %credentials.account_name,
                            container = %config.container,
                            "Object storage configured"
                        );
                        Some(credentials)
                    }
                    Err(e) => {
                        warn!(error = %e, "Object storage disabled");
                        None
                    }
                }
            }
            None => {
                warn!("No storage connection string configured, uploads will fail");
                None
            }
        };

        Self::with_credentials(credentials, &config.container)
    }

    pub fn with_credentials(
        credentials: Option<StorageCredentials>,
        container: &str,
    ) -> Result<Self, StorageError> {
        let client = Client::builder().build().map_err(StorageError::Client)?;

        Ok(Self {
            client,
            credentials,
            container: container.to_string(),
            probe_timeout: PROBE_TIMEOUT,
        })
    }

    #[cfg(test)]
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<&StorageCredentials, StorageError> {
        self.credentials.as_ref().ok_or(StorageError::NotConfigured)
    }

    fn blob_url(&self, credentials: &StorageCredentials, blob_name: &str) -> String {
        format!(
            "{}/{}/{}",
            credentials.blob_endpoint,
            self.container,
            urlencoding::encode(blob_name)
        )
    }

    fn signed_url(
        &self,
        blob_name: &str,
        permissions: &str,
        expiry_minutes: i64,
    ) -> Result<String, StorageError> {
        let credentials = self.credentials()?;
        let now = Utc::now();
        let sas = credentials.blob_sas(
            &self.container,
            blob_name,
            permissions,
            now - ChronoDuration::minutes(START_BACKDATE_MINUTES),
            now + ChronoDuration::minutes(expiry_minutes),
        )?;

        Ok(format!("{}?{}", self.blob_url(credentials, blob_name), sas))
    }

    /// Create the upload container when the account does not have it yet.
    ///
    /// An existing container (409 `ContainerAlreadyExists`) counts as success.
    pub async fn ensure_container(&self) -> Result<(), StorageError> {
        let credentials = self.credentials()?;
        let now = Utc::now();
        let sas = credentials.account_sas(
            "c",
            "c",
            now - ChronoDuration::minutes(START_BACKDATE_MINUTES),
            now + ChronoDuration::minutes(CONTAINER_SAS_EXPIRY_MINUTES),
        )?;
        let container_url = format!("{}/{}", credentials.blob_endpoint, self.container);
        let create_url = format!("{container_url}?restype=container&{sas}");

        let response = self
            .client
            .put(&create_url)
            .header(header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                url: container_url.clone(),
                source: e.without_url(),
            })?;

        match response.status() {
            StatusCode::CREATED => {
                info!(container = %self.container, "Created blob container");
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!(container = %self.container, "Blob container already exists");
                Ok(())
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(StorageError::Rejected {
                    operation: "create container",
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn write(&self, bytes: Bytes, original_name: &str) -> Result<String, StorageError> {
        let blob_name = blob_name_for(original_name);
        let upload_url = self.signed_url(&blob_name, "cw", WRITE_SAS_EXPIRY_MINUTES)?;
        let size = bytes.len();

        let response = self
            .client
            .put(&upload_url)
            .header("x-ms-blob-type", "BlockBlob")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                url: strip_query(&upload_url).to_string(),
                source: e.without_url(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                operation: "upload",
                status,
                message,
            });
        }

        debug!(blob = %blob_name, size, "Uploaded blob");

        self.sign_url(&blob_name, READ_URL_EXPIRY_MINUTES)
    }

    fn sign_url(&self, blob_name: &str, expiry_minutes: i64) -> Result<String, StorageError> {
        self.signed_url(blob_name, "r", expiry_minutes)
    }

    async fn probe(&self, url: &str) -> bool {
        if !self.is_configured() {
            return false;
        }

        match self
            .client
            .head(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => {
                let reachable = response.status().is_success();
                if !reachable {
                    debug!(
                        url = %strip_query(url),
                        status = response.status().as_u16(),
                        "Blob probe rejected"
                    );
                }
                reachable
            }
            Err(e) => {
                debug!(url = %strip_query(url), error = %e.without_url(), "Blob probe failed");
                false
            }
        }
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let blob_name = blob_name_from_url(url)?;
        let delete_url = self.signed_url(&blob_name, "d", WRITE_SAS_EXPIRY_MINUTES)?;

        let response = self
            .client
            .delete(&delete_url)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                url: strip_query(&delete_url).to_string(),
                source: e.without_url(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                operation: "delete",
                status,
                message,
            });
        }

        debug!(blob = %blob_name, "Deleted blob");
        Ok(())
    }
}
