//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search orchestration (local hits, coalescing, fan-out)
//! - Ingest and filtering
//! - Background refresh and retention

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search Orchestrator
// =============================================================================

/// Searches by outcome.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vodhub_searches_total", "Total searches by store outcome"),
        &["outcome"], // "local_hit", "local_miss", "empty_keyword"
    )
    .unwrap()
});

/// Detail lookups by outcome.
pub static DETAIL_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vodhub_detail_lookups_total",
            "Total detail lookups by store outcome",
        ),
        &["outcome"], // "local_hit", "local_miss"
    )
    .unwrap()
});

/// Callers that attached to an in-flight call instead of starting one.
pub static COALESCED_WAITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vodhub_coalesced_waits_total",
            "Callers served by an already in-flight upstream call",
        ),
        &["kind"], // "search", "detail"
    )
    .unwrap()
});

/// Per-site upstream fetch results.
pub static SITE_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vodhub_site_fetches_total", "Upstream site fetches by result"),
        &["site", "result"], // result: "ok", "error", "timeout"
    )
    .unwrap()
});

/// Whole fan-out duration.
pub static FANOUT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vodhub_fanout_duration_seconds",
            "Duration of a fan-out across all enabled sites",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Ingest & Filtering
// =============================================================================

/// Items written to the store.
pub static ITEMS_INGESTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vodhub_items_ingested_total",
        "Items persisted from upstream fetches",
    )
    .unwrap()
});

/// Upserts that failed and were skipped.
pub static INGEST_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vodhub_ingest_failures_total",
        "Item upserts that failed and were skipped",
    )
    .unwrap()
});

/// Items dropped at ingest by the category filter.
pub static CATEGORY_BLOCKED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vodhub_category_blocked_total",
            "Upstream items dropped by the category filter",
        ),
        &["site"],
    )
    .unwrap()
});

/// Items removed from responses by the copyright filter.
pub static COPYRIGHT_FILTERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vodhub_copyright_filtered_total",
        "Items removed from search responses by the copyright filter",
    )
    .unwrap()
});

// =============================================================================
// Background Work
// =============================================================================

/// Refresh jobs by event.
pub static REFRESH_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vodhub_refresh_jobs_total", "Background refresh jobs by event"),
        &["event"], // "queued", "dropped", "cooldown", "completed", "failed"
    )
    .unwrap()
});

/// Rows deleted by the retention sweeper.
pub static RETENTION_DELETIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vodhub_retention_deletions_total",
        "Items deleted for inactivity",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES.clone()),
        Box::new(DETAIL_LOOKUPS.clone()),
        Box::new(COALESCED_WAITS.clone()),
        Box::new(SITE_FETCHES.clone()),
        Box::new(FANOUT_DURATION.clone()),
        // Ingest
        Box::new(ITEMS_INGESTED.clone()),
        Box::new(INGEST_FAILURES.clone()),
        Box::new(CATEGORY_BLOCKED.clone()),
        Box::new(COPYRIGHT_FILTERED.clone()),
        // Background
        Box::new(REFRESH_JOBS.clone()),
        Box::new(RETENTION_DELETIONS.clone()),
    ]
}
