//! Prometheus metrics registry and metric definitions.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global registry under crate namespace
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("crypto_asset_registry".into()), None)
        .expect("failed to create Prometheus registry")
});

/// Requests handled, per endpoint
pub static REQUEST_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("requests_total", "Total number of API requests");
    let c = IntCounterVec::new(opts, &["endpoint"]).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// Requests answered with a 4xx/5xx, per endpoint
pub static REQUEST_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("request_errors_total", "Total number of failed API requests");
    let c = IntCounterVec::new(opts, &["endpoint"]).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// Histogram of request handling durations
pub static REQUEST_HISTOGRAM: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "request_duration_seconds",
        "Duration of API request handling in seconds",
    );
    let h = HistogramVec::new(opts, &["endpoint"]).expect("histogram opts");
    REGISTRY.register(Box::new(h.clone())).unwrap();
    h
});

/// Encode all metrics as text
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    encoder.encode(&mf, &mut buffer).expect("failed to encode");
    String::from_utf8(buffer).expect("invalid utf8")
}
