//! Mock source adapter for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::filter::is_category_blocked;
use crate::item::VodItem;
use crate::source::{has_playable_episode, SourceAdapter, SourceError};

/// A recorded search call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    pub base_url: String,
    pub keyword: String,
    pub source_key: String,
    pub blocked_categories: Vec<String>,
    pub timestamp: Instant,
}

/// A recorded detail call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedDetail {
    pub base_url: String,
    pub vod_id: String,
    pub source_key: String,
}

/// Mock implementation of the SourceAdapter trait.
///
/// Behavior is configured per base URL, so one mock can stand in for several
/// sites:
/// - canned search results and detail items
/// - injected errors
/// - artificial delays (for timeout and coalescing tests)
///
/// Canned items go through the same drop rules as a real adapter: nothing
/// without a playable episode and nothing in a blocked category is returned.
///
/// # Example
///
/// ```rust,ignore
/// use vodhub_core::testing::{fixtures, MockSourceAdapter};
///
/// let adapter = MockSourceAdapter::new();
/// adapter
///     .set_search_results("https://alpha.example/api", vec![fixtures::vod_item("alpha", "1", "Show")])
///     .await;
/// adapter.set_delay("https://beta.example/api", Duration::from_secs(30)).await;
/// ```
#[derive(Debug, Default)]
pub struct MockSourceAdapter {
    search_results: Arc<RwLock<HashMap<String, Vec<VodItem>>>>,
    details: Arc<RwLock<HashMap<String, HashMap<String, VodItem>>>>,
    search_errors: Arc<RwLock<HashMap<String, SourceError>>>,
    detail_errors: Arc<RwLock<HashMap<String, SourceError>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    detail_lookups: Arc<RwLock<Vec<RecordedDetail>>>,
}

impl MockSourceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned for every search against `base_url`.
    pub async fn set_search_results(&self, base_url: &str, items: Vec<VodItem>) {
        self.search_results
            .write()
            .await
            .insert(base_url.to_string(), items);
    }

    /// Make every search against `base_url` fail.
    pub async fn set_search_error(&self, base_url: &str, error: SourceError) {
        self.search_errors
            .write()
            .await
            .insert(base_url.to_string(), error);
    }

    /// Register an item returned by `get_detail` for its `vod_id`.
    pub async fn set_detail(&self, base_url: &str, item: VodItem) {
        self.details
            .write()
            .await
            .entry(base_url.to_string())
            .or_default()
            .insert(item.vod_id.clone(), item);
    }

    pub async fn set_detail_error(&self, base_url: &str, error: SourceError) {
        self.detail_errors
            .write()
            .await
            .insert(base_url.to_string(), error);
    }

    /// Delay every call against `base_url`.
    pub async fn set_delay(&self, base_url: &str, delay: Duration) {
        self.delays.write().await.insert(base_url.to_string(), delay);
    }

    /// Remove all configured errors.
    pub async fn clear_errors(&self) {
        self.search_errors.write().await.clear();
        self.detail_errors.write().await.clear();
    }

    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    pub async fn recorded_details(&self) -> Vec<RecordedDetail> {
        self.detail_lookups.read().await.clone()
    }

    pub async fn search_calls(&self) -> usize {
        self.searches.read().await.len()
    }

    pub async fn search_calls_for(&self, base_url: &str) -> usize {
        self.searches
            .read()
            .await
            .iter()
            .filter(|s| s.base_url == base_url)
            .count()
    }

    pub async fn detail_calls(&self) -> usize {
        self.detail_lookups.read().await.len()
    }

    async fn simulate_delay(&self, base_url: &str) {
        let delay = self.delays.read().await.get(base_url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SourceAdapter for MockSourceAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(
        &self,
        base_url: &str,
        keyword: &str,
        source_key: &str,
        blocked_categories: &[String],
    ) -> Result<Vec<VodItem>, SourceError> {
        self.searches.write().await.push(RecordedSearch {
            base_url: base_url.to_string(),
            keyword: keyword.to_string(),
            source_key: source_key.to_string(),
            blocked_categories: blocked_categories.to_vec(),
            timestamp: Instant::now(),
        });

        self.simulate_delay(base_url).await;

        if let Some(error) = self.search_errors.read().await.get(base_url) {
            return Err(error.clone());
        }

        let items = self
            .search_results
            .read()
            .await
            .get(base_url)
            .cloned()
            .unwrap_or_default();

        Ok(items
            .into_iter()
            .filter(|item| has_playable_episode(&item.vod_play_url))
            .filter(|item| !is_category_blocked(item, blocked_categories))
            .collect())
    }

    async fn get_detail(
        &self,
        base_url: &str,
        vod_id: &str,
        source_key: &str,
    ) -> Result<Option<VodItem>, SourceError> {
        self.detail_lookups.write().await.push(RecordedDetail {
            base_url: base_url.to_string(),
            vod_id: vod_id.to_string(),
            source_key: source_key.to_string(),
        });

        self.simulate_delay(base_url).await;

        if let Some(error) = self.detail_errors.read().await.get(base_url) {
            return Err(error.clone());
        }

        Ok(self
            .details
            .read()
            .await
            .get(base_url)
            .and_then(|items| items.get(vod_id))
            .filter(|item| has_playable_episode(&item.vod_play_url))
            .cloned())
    }
}
