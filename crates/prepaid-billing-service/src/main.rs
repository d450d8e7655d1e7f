//! Prepaid-Billing Service - HTTP API for prepaid subscriptions
//!
//! This is the main entry point for the prepaid-billing service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prepaid_billing_core::SystemClock;
use prepaid_billing_service::{create_router, AppState, ServiceConfig};
use prepaid_billing_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,prepaid_billing=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Prepaid-Billing Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        admin_configured = %config.admin_api_key.is_some(),
        jwt_configured = %config.jwt_secret.is_some(),
        jwt_audience = %config.jwt_audience,
        "Service configuration loaded"
    );

    let store = open_store(&config)?;

    // Build app state
    let state = AppState::new(store, config.clone(), Arc::new(SystemClock))?;

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(prepaid_billing_store::RocksStore::open(&config.data_dir)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!("Built without rocksdb-backend - state is kept in memory only");
    Ok(Arc::new(prepaid_billing_store::MemoryStore::new()))
}
