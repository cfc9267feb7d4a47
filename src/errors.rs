//! Centralised error types for the registry.

use thiserror::Error;

/// Failures of the record pipeline: normalization, insert, update and
/// search. Every variant except `Db` is something the caller can fix.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("invalid id: {0}")]
    InvalidIdentifier(String),

    #[error("date must be an ISO-8601 date in the past: {0}")]
    InvalidDate(String),

    #[error("{0} cannot be negative")]
    NegativeAmount(&'static str),

    #[error("{0} cannot be null")]
    NullConstraint(String),

    #[error("symbol {0} already exists")]
    DuplicateSymbol(String),

    #[error("nothing to update")]
    EmptyUpdate,

    #[error("crypto asset with id {0} not found")]
    UnknownIdentifier(i64),

    /// Anything the engine reports that has no domain meaning.
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl AssetError {
    /// True for errors caused by the request rather than the service.
    pub fn is_caller_fixable(&self) -> bool {
        !matches!(self, AssetError::Db(_))
    }
}

/// Startup and serving failures of the binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid bind address {0}: {1}")]
    Bind(String, #[source] std::net::AddrParseError),

    #[error("HTTP server error: {0}")]
    Server(#[from] hyper::Error),
}
