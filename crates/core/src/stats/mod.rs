//! Per-item load statistics reported by playback clients.
//!
//! These counters only influence ranking. A success report folds its latency
//! into a running average and bumps `sample_count`; a failure report only
//! bumps `failed_count`.

use serde::{Deserialize, Serialize};

use crate::item::ItemStoreError;

/// Read view of an item's load counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadStats {
    pub avg_speed_ms: f64,
    pub sample_count: i64,
    pub failed_count: i64,
    /// Percentage in `0..=100`; zero when no samples exist yet.
    pub success_rate: f64,
}

impl LoadStats {
    pub fn new(avg_speed_ms: f64, sample_count: i64, failed_count: i64) -> Self {
        Self {
            avg_speed_ms,
            sample_count,
            failed_count,
            success_rate: success_rate(sample_count, failed_count),
        }
    }
}

/// `(samples - failed) / samples * 100`, clamped at zero.
pub fn success_rate(sample_count: i64, failed_count: i64) -> f64 {
    if sample_count <= 0 {
        return 0.0;
    }
    let rate = (sample_count - failed_count) as f64 / sample_count as f64 * 100.0;
    rate.max(0.0)
}

/// Ingestion and read path for load statistics.
pub trait LoadStatsTracker: Send + Sync {
    /// Fold a successful load of `latency_ms` into the running average.
    fn report_success(
        &self,
        source_key: &str,
        vod_id: &str,
        latency_ms: f64,
    ) -> Result<(), ItemStoreError>;

    fn report_failure(&self, source_key: &str, vod_id: &str) -> Result<(), ItemStoreError>;

    fn load_stats(&self, source_key: &str, vod_id: &str) -> Result<LoadStats, ItemStoreError>;
}
