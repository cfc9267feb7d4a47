//! Type-safe configuration loader using the `config` crate,
//! with manual environment-variable overrides for core settings.

use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;

/// Top-level application settings loaded from `Config.toml`
/// and then overridden (where applicable) by environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// SQLite connection URL, e.g. `sqlite://crypto_assets.db`
    pub database_url: String,

    /// HTTP bind address for the API, metrics & health endpoints
    pub server_bind: String,

    /// Size of the shared connection pool
    pub max_connections: u32,
}

impl Settings {
    /// Load settings from `Config.toml` (if present),
    /// then apply any overrides from these environment variables:
    ///
    /// - `APP__DATABASE_URL`
    /// - `APP__SERVER_BIND`
    /// - `APP__MAX_CONNECTIONS`
    pub fn new() -> Result<Self, ConfigError> {
        // 1) Defaults, then Config.toml on top
        let cfg = Config::builder()
            .set_default("database_url", "sqlite://crypto_assets.db")?
            .set_default("server_bind", "0.0.0.0:8080")?
            .set_default("max_connections", 1)?
            .add_source(File::with_name("Config").required(false))
            .build()?;

        let mut settings: Settings = cfg.try_deserialize()?;

        // 2) Manual overrides for core settings
        if let Ok(val) = env::var("APP__DATABASE_URL") {
            settings.database_url = val;
        }
        if let Ok(val) = env::var("APP__SERVER_BIND") {
            settings.server_bind = val;
        }
        if let Ok(val) = env::var("APP__MAX_CONNECTIONS") {
            settings.max_connections = val
                .parse()
                .map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        }

        Ok(settings)
    }
}
