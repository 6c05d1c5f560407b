//! Service configuration.
//!
//! Settings are read once at startup from an optional `config` file and
//! `DOCFLOW__*` environment variables. Nothing is hot-reloaded.

mod loader;
mod static_config;

pub use loader::load_static_config;
pub use static_config::{
    AnalysisConfig, DatabaseConfig, LimitsConfig, ServerConfig, StaticConfig, StorageConfig,
};
