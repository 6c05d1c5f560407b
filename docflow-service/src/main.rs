use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

mod analysis;
mod api;
mod config;
mod db;
mod error;
mod ledger;
mod service;
mod storage;

use crate::analysis::FormRecognizerClient;
use crate::config::load_static_config;
use crate::ledger::Ledger;
use crate::service::DocflowService;
use crate::storage::AzureBlobStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting docflow service v{}", env!("CARGO_PKG_VERSION"));

    let static_config = load_static_config()?;
    info!(
        host = %static_config.server.host,
        port = static_config.server.port,
        "Configuration loaded"
    );

    // Analysis credentials are the one hard requirement
    let analyzer = Arc::new(FormRecognizerClient::new(&static_config.analysis)?);

    // A store without credentials still starts; uploads fail until configured
    let store = Arc::new(AzureBlobStore::new(&static_config.storage)?);
    if store.is_configured() {
        if let Err(e) = store.ensure_container().await {
            warn!(error = %e, "Could not ensure blob container exists, uploads may fail");
        }
    }

    let ledger = Arc::new(Ledger::new(static_config.database.clone()));
    if ledger.connect() {
        info!("Ledger using durable store");
    } else {
        warn!("Ledger running in-process, requests will not survive a restart");
    }

    let service = Arc::new(DocflowService::new(
        store,
        analyzer,
        ledger,
        static_config.limits.max_upload_bytes,
    ));

    let app = api::router(service);

    let addr = format!(
        "{}:{}",
        static_config.server.host, static_config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docflow_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
