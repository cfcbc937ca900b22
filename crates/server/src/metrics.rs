//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Store and refresh queue gauges (collected dynamically)
//!
//! Core metrics (searches, fan-out, ingest, refresh) are registered from
//! `vodhub_core::metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::error;
use vodhub_core::ItemStore;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vodhub_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vodhub_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vodhub_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Store Metrics (collected dynamically)
// =============================================================================

/// Items in the local store.
pub static ITEMS_STORED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("vodhub_items_stored", "Number of items in the local store").unwrap()
});

/// Refresh jobs waiting for a worker.
pub static REFRESH_QUEUE_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vodhub_refresh_queue_pending",
        "Background refresh jobs waiting for a worker",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Store
    registry.register(Box::new(ITEMS_STORED.clone())).unwrap();
    registry
        .register(Box::new(REFRESH_QUEUE_PENDING.clone()))
        .unwrap();

    // Core metrics (search, ingest, background work)
    for metric in vodhub_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect current values.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(count) = state.items().count() {
        ITEMS_STORED.set(count as i64);
    }
    REFRESH_QUEUE_PENDING.set(state.search().refresh_queue().pending() as i64);
}
