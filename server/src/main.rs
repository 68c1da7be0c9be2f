//! SIGLAT API host: loads store settings from the environment, bootstraps the database,
//! probes connectivity, and serves health and readiness routes.

use siglat_store::{common_routes_with_ready, AppState, PgStore, RecordStore, StoreSettings};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("siglat_store=info".parse()?))
        .init();

    let settings = StoreSettings::from_env()?;
    tracing::info!(?settings, "loaded store settings");
    let store = Arc::new(PgStore::new(settings));

    // The host stays up without a database; /ready reports the outage.
    if let Err(e) = store.initialize().await {
        tracing::error!(error = %e, "database initialization failed");
    }
    if store.ping().await {
        tracing::info!("database connection verified");
    } else {
        tracing::warn!("database unreachable at startup");
    }

    let app = common_routes_with_ready(AppState::new(store));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
