//! Library entrypoint: re‑export modules

pub mod asset;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod server;
pub mod statement;
pub mod store;
