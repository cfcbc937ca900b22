//! Testing utilities and mock implementations.
//!
//! The mock adapter stands in for real resource sites, so the orchestrator can
//! be exercised end to end with in-memory SQLite stores and no network.
//!
//! # Example
//!
//! ```rust,ignore
//! use vodhub_core::testing::{fixtures, MockSourceAdapter};
//!
//! let adapter = MockSourceAdapter::new();
//! adapter
//!     .set_search_results(&fixtures::base_url("alpha"), vec![fixtures::vod_item("alpha", "1", "Show")])
//!     .await;
//!
//! // Wire it into a SearchService...
//! ```

mod mock_adapter;

pub use mock_adapter::{MockSourceAdapter, RecordedDetail, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::item::VodItem;
    use crate::site::Site;

    /// Base URL used for a fixture site.
    pub fn base_url(key: &str) -> String {
        format!("https://{}.example/api.php/provide/vod", key)
    }

    /// An enabled site whose base URL is [`base_url`].
    pub fn site(key: &str) -> Site {
        Site::new(key, base_url(key))
    }

    /// A playable item with reasonable defaults.
    pub fn vod_item(source_key: &str, vod_id: &str, name: &str) -> VodItem {
        VodItem {
            source_key: source_key.to_string(),
            vod_id: vod_id.to_string(),
            vod_name: name.to_string(),
            type_name: "剧情片".to_string(),
            vod_class: "剧情".to_string(),
            vod_pic: format!("https://img.example/{}/{}.jpg", source_key, vod_id),
            vod_remarks: "HD".to_string(),
            vod_year: "2024".to_string(),
            vod_area: "大陆".to_string(),
            vod_lang: "国语".to_string(),
            vod_time: "2024-05-01 12:00:00".to_string(),
            vod_play_url: format!(
                "第1集$https://cdn.example/{}/{}/1/index.m3u8#第2集$https://cdn.example/{}/{}/2/index.m3u8",
                source_key, vod_id, source_key, vod_id
            ),
            ..Default::default()
        }
    }

    /// An item with preset load statistics.
    pub fn ranked_item(source_key: &str, vod_id: &str, avg_speed_ms: f64, samples: i64) -> VodItem {
        VodItem {
            avg_speed_ms,
            sample_count: samples,
            ..vod_item(source_key, vod_id, vod_id)
        }
    }
}
