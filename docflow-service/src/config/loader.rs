//! Configuration loading from files and environment variables.

use config::{Config, Environment, File};

use crate::error::{ServiceError, ServiceResult};

use super::static_config::StaticConfig;

/// Environment variable prefix, e.g. `DOCFLOW__ANALYSIS__ENDPOINT`
const ENV_PREFIX: &str = "DOCFLOW";

/// Load configuration from an optional `config.*` file and env vars
pub fn load_static_config() -> ServiceResult<StaticConfig> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_sources() {
        let config: StaticConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.container, "uploads");
        assert!(config.storage.connection_string.is_none());
        assert_eq!(config.analysis.default_model, "prebuilt-document");
        assert!(config.database.path.is_none());
        assert_eq!(config.limits.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config: StaticConfig = Config::builder()
            .set_override("analysis.key", "super-secret")
            .unwrap()
            .set_override("storage.connection_string", "AccountKey=hidden")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hidden"));
        assert!(rendered.contains("<redacted>"));
    }
}
