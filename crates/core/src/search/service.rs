use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::fetcher::UpstreamFetcher;
use super::ranking::rank_by_load_speed;
use super::refresh::{RefreshJob, RefreshQueue};
use super::{DetailOutcome, SearchError, SearchOutcome};
use crate::config::SearchConfig;
use crate::filter::{apply_copyright_filter, KeywordSource};
use crate::item::{ItemStore, VodItem};
use crate::metrics;
use crate::site::SiteRegistry;
use crate::source::SourceAdapter;

/// Search orchestrator.
///
/// A keyword found in the local store is answered from it and refreshed in
/// the background. Anything else goes upstream through a coalesced fan-out,
/// after which the stored rows and the fetched items are merged, filtered and
/// ranked.
pub struct SearchService {
    store: Arc<dyn ItemStore>,
    keywords: Arc<dyn KeywordSource>,
    fetcher: Arc<UpstreamFetcher>,
    refresh: Arc<RefreshQueue>,
}

impl SearchService {
    pub fn new(
        config: &SearchConfig,
        sites: Arc<dyn SiteRegistry>,
        keywords: Arc<dyn KeywordSource>,
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<dyn ItemStore>,
    ) -> Self {
        let fetcher = Arc::new(UpstreamFetcher::new(
            sites,
            Arc::clone(&keywords),
            adapter,
            Arc::clone(&store),
            config.site_timeout(),
            config.overall_timeout(),
        ));
        let refresh = Arc::new(RefreshQueue::new(Arc::clone(&fetcher), config));

        Self {
            store,
            keywords,
            fetcher,
            refresh,
        }
    }

    pub fn refresh_queue(&self) -> &Arc<RefreshQueue> {
        &self.refresh
    }

    /// Search by keyword.
    ///
    /// Copyright keywords are applied unless `bypass_copyright` is set; the
    /// number of removed items is reported as `filtered_count`. A blank
    /// keyword returns an empty outcome without touching the store.
    pub async fn search(
        &self,
        keyword: &str,
        bypass_copyright: bool,
    ) -> Result<SearchOutcome, SearchError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            metrics::SEARCHES.with_label_values(&["empty_keyword"]).inc();
            return Ok(SearchOutcome::default());
        }

        let stored = match self.store.search(keyword) {
            Ok(items) => items,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Store lookup failed, searching upstream");
                Vec::new()
            }
        };

        let (items, from_cache) = if stored.is_empty() {
            metrics::SEARCHES.with_label_values(&["local_miss"]).inc();
            (self.fetch_and_merge(keyword).await?, false)
        } else {
            metrics::SEARCHES.with_label_values(&["local_hit"]).inc();
            debug!(keyword = %keyword, count = stored.len(), "Serving search from store");
            self.refresh.enqueue(RefreshJob::Search(keyword.to_string()));
            (stored, true)
        };

        let (mut items, filtered_count) = if bypass_copyright {
            (items, 0)
        } else {
            let blocked = self.keywords.all_copyright_keywords()?;
            apply_copyright_filter(items, &blocked)
        };

        if filtered_count > 0 {
            metrics::COPYRIGHT_FILTERED.inc_by(filtered_count as u64);
            debug!(keyword = %keyword, filtered = filtered_count, "Copyright filter removed items");
        }

        rank_by_load_speed(&mut items);

        Ok(SearchOutcome {
            items,
            filtered_count,
            from_cache,
        })
    }

    /// Look up one item, fetching it from its site if it is not stored.
    ///
    /// Returns `None` when neither the store nor the site has it.
    pub async fn get_detail(
        &self,
        source_key: &str,
        vod_id: &str,
    ) -> Result<Option<DetailOutcome>, SearchError> {
        match self.store.find_by_composite_key(source_key, vod_id) {
            Ok(Some(item)) => {
                metrics::DETAIL_LOOKUPS.with_label_values(&["local_hit"]).inc();
                self.refresh.enqueue(RefreshJob::Detail {
                    source_key: source_key.to_string(),
                    vod_id: vod_id.to_string(),
                });
                return Ok(Some(DetailOutcome {
                    item,
                    from_cache: true,
                }));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(site = %source_key, vod_id = %vod_id, error = %e, "Store lookup failed, fetching upstream");
            }
        }

        metrics::DETAIL_LOOKUPS.with_label_values(&["local_miss"]).inc();

        let joined = self.fetcher.detail(source_key, vod_id).await;
        if joined.shared {
            metrics::COALESCED_WAITS.with_label_values(&["detail"]).inc();
        }

        Ok(joined.result?.map(|item| DetailOutcome {
            item,
            from_cache: false,
        }))
    }

    /// Run (or join) the fan-out, then answer from the store so persisted
    /// load stats are visible. Fetched items the store does not return are
    /// appended.
    async fn fetch_and_merge(&self, keyword: &str) -> Result<Vec<VodItem>, SearchError> {
        let joined = self.fetcher.search(keyword).await;
        if joined.shared {
            metrics::COALESCED_WAITS.with_label_values(&["search"]).inc();
            debug!(keyword = %keyword, "Joined in-flight fan-out");
        }
        let fetched = joined.result?;

        let mut items = match self.store.search(keyword) {
            Ok(items) => items,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Store re-read failed, using fetched items");
                Vec::new()
            }
        };

        let mut seen: HashSet<(String, String)> = items
            .iter()
            .map(|item| (item.source_key.clone(), item.vod_id.clone()))
            .collect();
        items.extend(
            fetched
                .into_iter()
                .filter(|item| seen.insert((item.source_key.clone(), item.vod_id.clone()))),
        );

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::filter::{KeywordKind, SqliteKeywordStore};
    use crate::item::SqliteItemStore;
    use crate::site::SqliteSiteRegistry;
    use crate::stats::LoadStatsTracker;
    use crate::testing::{fixtures, MockSourceAdapter};

    struct Harness {
        service: Arc<SearchService>,
        adapter: Arc<MockSourceAdapter>,
        store: Arc<SqliteItemStore>,
        keywords: Arc<SqliteKeywordStore>,
    }

    fn harness() -> Harness {
        let sites = Arc::new(SqliteSiteRegistry::in_memory().unwrap());
        sites.upsert_site(&fixtures::site("alpha")).unwrap();
        let keywords = Arc::new(SqliteKeywordStore::in_memory().unwrap());
        let adapter = Arc::new(MockSourceAdapter::new());
        let store = Arc::new(SqliteItemStore::in_memory().unwrap());
        let config = SearchConfig {
            site_timeout_ms: 500,
            overall_timeout_ms: 1000,
            ..Default::default()
        };
        let service = Arc::new(SearchService::new(
            &config,
            sites,
            keywords.clone(),
            adapter.clone(),
            store.clone(),
        ));
        Harness {
            service,
            adapter,
            store,
            keywords,
        }
    }

    #[tokio::test]
    async fn test_blank_keyword_is_empty() {
        let h = harness();
        let outcome = h.service.search("   ", false).await.unwrap();
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.filtered_count, 0);
        assert_eq!(h.adapter.search_calls().await, 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_then_hit_serves_store() {
        let h = harness();
        h.adapter
            .set_search_results(&fixtures::base_url("alpha"), vec![fixtures::vod_item("alpha", "1", "流浪地球")])
            .await;

        let first = h.service.search("地球", false).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.items.len(), 1);

        let second = h.service.search("地球", false).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.items.len(), 1);
        assert_eq!(h.adapter.search_calls().await, 1);
        assert_eq!(h.service.refresh_queue().pending(), 1);
    }

    #[tokio::test]
    async fn test_fetched_items_not_matching_locally_are_kept() {
        let h = harness();
        // Upstream matched on a field the store does not search
        let mut item = fixtures::vod_item("alpha", "1", "Unrelated Title");
        item.vod_actor = "吴京".to_string();
        h.adapter
            .set_search_results(&fixtures::base_url("alpha"), vec![item])
            .await;

        let outcome = h.service.search("吴京", false).await.unwrap();
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].vod_id, "1");
    }

    #[tokio::test]
    async fn test_copyright_filter_and_bypass() {
        let h = harness();
        h.keywords.add_keyword(KeywordKind::Copyright, "写真").unwrap();
        h.adapter
            .set_search_results(
                &fixtures::base_url("alpha"),
                vec![
                    fixtures::vod_item("alpha", "1", "艺术写真集 第1集"),
                    fixtures::vod_item("alpha", "2", "艺术人生"),
                ],
            )
            .await;

        let filtered = h.service.search("艺术", false).await.unwrap();
        assert_eq!(filtered.items.len(), 1);
        assert_eq!(filtered.filtered_count, 1);

        let bypassed = h.service.search("艺术", true).await.unwrap();
        assert_eq!(bypassed.items.len(), 2);
        assert_eq!(bypassed.filtered_count, 0);
    }

    #[tokio::test]
    async fn test_results_ranked_by_load_speed() {
        let h = harness();
        h.adapter
            .set_search_results(
                &fixtures::base_url("alpha"),
                vec![
                    fixtures::vod_item("alpha", "none", "Show A"),
                    fixtures::vod_item("alpha", "slow", "Show B"),
                    fixtures::vod_item("alpha", "fast", "Show C"),
                ],
            )
            .await;
        h.service.search("Show", false).await.unwrap();

        h.store.report_success("alpha", "slow", 900.0).unwrap();
        h.store.report_success("alpha", "fast", 100.0).unwrap();

        let outcome = h.service.search("Show", false).await.unwrap();
        let ids: Vec<&str> = outcome.items.iter().map(|i| i.vod_id.as_str()).collect();
        assert_eq!(ids, vec!["fast", "slow", "none"]);
    }

    #[tokio::test]
    async fn test_detail_miss_then_hit() {
        let h = harness();
        h.adapter
            .set_detail(&fixtures::base_url("alpha"), fixtures::vod_item("alpha", "5", "Show"))
            .await;

        let first = h.service.get_detail("alpha", "5").await.unwrap().unwrap();
        assert!(!first.from_cache);

        let second = h.service.get_detail("alpha", "5").await.unwrap().unwrap();
        assert!(second.from_cache);
        assert_eq!(h.adapter.detail_calls().await, 1);
    }

    #[tokio::test]
    async fn test_detail_absent_is_none() {
        let h = harness();
        assert!(h.service.get_detail("alpha", "404").await.unwrap().is_none());
        assert!(h.service.get_detail("ghost", "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_cold_details_share_one_fetch() {
        let h = harness();
        let url = fixtures::base_url("alpha");
        h.adapter.set_detail(&url, fixtures::vod_item("alpha", "8", "Show")).await;
        h.adapter.set_delay(&url, Duration::from_millis(100)).await;

        let (a, b) = tokio::join!(
            h.service.get_detail("alpha", "8"),
            h.service.get_detail("alpha", "8")
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert_eq!(h.adapter.detail_calls().await, 1);
    }
}
