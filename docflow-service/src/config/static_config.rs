//! Static configuration read once at startup.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration. Every section is optional in the config sources;
/// the analysis credentials are validated when the client is constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_analysis")]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Object storage configuration
#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage account connection string. When absent the blob store is
    /// constructed in a disabled state and every operation fails on use.
    #[serde(default)]
    pub connection_string: Option<String>,

    #[serde(default = "default_container")]
    pub container: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("connection_string", &self.connection_string.as_ref().map(|_| "<redacted>"))
            .field("container", &self.container)
            .finish()
    }
}

/// Document analysis service configuration
#[derive(Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Wait between status polls when the service sends no Retry-After
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl AnalysisConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("default_model", &self.default_model)
            .field("api_version", &self.api_version)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Durable store configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file. When absent the ledger runs in-process only.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Size limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

// ==================== Default Value Functions ====================

pub(crate) fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    3000
}

pub(crate) fn default_storage() -> StorageConfig {
    StorageConfig {
        connection_string: None,
        container: default_container(),
    }
}

pub(crate) fn default_container() -> String {
    "uploads".to_string()
}

pub(crate) fn default_analysis() -> AnalysisConfig {
    AnalysisConfig {
        endpoint: None,
        key: None,
        default_model: default_model(),
        api_version: default_api_version(),
        poll_interval_ms: default_poll_interval_ms(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

pub(crate) fn default_model() -> String {
    "prebuilt-document".to_string()
}

pub(crate) fn default_api_version() -> String {
    "2023-07-31".to_string()
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    1000
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    60
}

pub(crate) fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_upload_bytes: default_max_upload_bytes(),
    }
}

pub(crate) fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}
