//! Item store - the durable local cache of normalized listings.
//!
//! Every listing is identified by its composite key `(source_key, vod_id)`.
//! A row is created on first ingest and updated in place afterwards; only the
//! volatile fields are overwritten (see [`ItemStore::upsert`]).

mod sqlite;

pub use sqlite::SqliteItemStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One normalized video listing from one site.
///
/// Descriptive fields are kept as the text the site reported, after coercion
/// from whatever JSON type it used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VodItem {
    pub source_key: String,
    pub vod_id: String,
    pub vod_name: String,
    pub vod_sub: String,
    /// Alternate (usually romanized) name.
    pub vod_en: String,
    pub vod_tag: String,
    /// Comma-joined category text.
    pub vod_class: String,
    pub type_name: String,
    pub vod_pic: String,
    pub vod_actor: String,
    pub vod_director: String,
    pub vod_blurb: String,
    pub vod_content: String,
    pub vod_remarks: String,
    pub vod_pubdate: String,
    pub vod_total: String,
    pub vod_serial: String,
    pub vod_area: String,
    pub vod_lang: String,
    pub vod_year: String,
    pub vod_duration: String,
    /// Last-update time as reported by the site.
    pub vod_time: String,
    pub vod_douban_id: String,
    /// Raw play-URL payload; see [`crate::source::parse_play_url`].
    pub vod_play_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub avg_speed_ms: f64,
    #[serde(default)]
    pub sample_count: i64,
    #[serde(default)]
    pub failed_count: i64,
}

impl VodItem {
    /// `source_key:vod_id`, as shown in error messages.
    pub fn detail_key(source_key: &str, vod_id: &str) -> String {
        format!("{}:{}", source_key, vod_id)
    }
}

#[derive(Debug, Error)]
pub enum ItemStoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage for normalized items.
pub trait ItemStore: Send + Sync {
    /// Insert a new row, or update the volatile fields of the existing one
    /// (name, subtitle, remarks, update time, play URL) and bump last-visited.
    ///
    /// Performed as a single statement against the unique composite-key index.
    fn upsert(&self, item: &VodItem) -> Result<(), ItemStoreError>;

    /// Case-insensitive substring match on name, subtitle and alternate name,
    /// most recently visited first. An empty keyword matches nothing.
    fn search(&self, keyword: &str) -> Result<Vec<VodItem>, ItemStoreError>;

    /// Point lookup. A hit bumps last-visited.
    fn find_by_composite_key(
        &self,
        source_key: &str,
        vod_id: &str,
    ) -> Result<Option<VodItem>, ItemStoreError>;

    /// Delete rows whose last-visited is older than `now - days`.
    /// Returns the number of rows removed.
    fn delete_inactive(&self, days: u32) -> Result<usize, ItemStoreError>;

    fn count(&self) -> Result<u64, ItemStoreError>;
}
