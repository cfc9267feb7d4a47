//! Entrypoint: set up tracing, open the SQLite store (running migrations),
//! and serve the registry API until Ctrl-C.
//!
//! This application uses a strongly-typed configuration (`Settings`) defined in `config.rs`,
//! which provides:
//!  - `database_url`       – SQLite connection string
//!  - `server_bind`        – HTTP bind address for the API, metrics & health endpoints
//!  - `max_connections`    – size of the shared connection pool

use std::{net::SocketAddr, sync::Arc};

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crypto_asset_registry::config::Settings;
use crypto_asset_registry::errors::AppError;
use crypto_asset_registry::server;
use crypto_asset_registry::store::{DataStore, SqliteStore};

/// Application entrypoint for the crypto asset registry.
///
/// **Workflow**:
/// 1. Initialise tracing/logging from `RUST_LOG`.
/// 2. Load `Config.toml` (and apply any `APP__…` env-var overrides).
/// 3. Open the SQLite pool and run any pending SQLx migrations.
/// 4. Serve `/register`, `/search`, `/update`, `/metrics` and `/healthz`
///    until Ctrl-C, then close the store.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // ───────────────────────────────────────────────────────────────
    // 1. Initialise tracing / logging
    // ───────────────────────────────────────────────────────────────
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    info!("Starting crypto asset registry…");

    // ───────────────────────────────────────────────────────────────
    // 2. Load configuration
    // ───────────────────────────────────────────────────────────────
    let settings = Settings::new()?;
    info!(?settings, "Loaded configuration");

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .map_err(|e| AppError::Bind(settings.server_bind.clone(), e))?;

    // ───────────────────────────────────────────────────────────────
    // 3. Store & migrations
    // ───────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&settings.database_url, settings.max_connections).await?;
    let store = Arc::new(store);
    info!(database_url = %settings.database_url, "Connected to SQLite, migrations complete");

    // ───────────────────────────────────────────────────────────────
    // 4. Serve until Ctrl-C
    // ───────────────────────────────────────────────────────────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C; shutting down");
        }
        info!("Shutdown requested");
    };

    let served = server::serve(addr, store.clone(), shutdown).await;

    // In-flight requests have drained once `serve` returns.
    store.close().await;
    info!("Store closed");

    served.map_err(AppError::from)
}
