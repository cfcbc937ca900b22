//! Search orchestrator integration tests.
//!
//! These tests drive the full path through file-backed SQLite stores and the
//! mock adapter: store lookup -> coalesced fan-out -> persist -> filter -> rank,
//! plus background refresh and retention.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use tempfile::TempDir;

use vodhub_core::{
    testing::{fixtures, MockSourceAdapter},
    ItemStore, KeywordKind, LoadStatsTracker, SearchConfig, SearchService, SqliteItemStore,
    SqliteKeywordStore, SqliteSiteRegistry,
};

/// Test helper to create all dependencies for orchestrator testing.
struct TestHarness {
    service: Arc<SearchService>,
    adapter: Arc<MockSourceAdapter>,
    store: Arc<SqliteItemStore>,
    keywords: Arc<SqliteKeywordStore>,
    db_path: std::path::PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new(site_keys: &[&str]) -> Self {
        Self::with_config(site_keys, fast_config())
    }

    fn with_config(site_keys: &[&str], config: SearchConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let sites = Arc::new(SqliteSiteRegistry::new(&db_path).expect("Failed to create registry"));
        for key in site_keys {
            sites.upsert_site(&fixtures::site(key)).unwrap();
        }
        let keywords =
            Arc::new(SqliteKeywordStore::new(&db_path).expect("Failed to create keyword store"));
        let store = Arc::new(SqliteItemStore::new(&db_path).expect("Failed to create item store"));
        let adapter = Arc::new(MockSourceAdapter::new());

        let service = Arc::new(SearchService::new(
            &config,
            sites,
            keywords.clone(),
            adapter.clone(),
            store.clone(),
        ));

        Self {
            service,
            adapter,
            store,
            keywords,
            db_path,
            _temp_dir: temp_dir,
        }
    }
}

fn fast_config() -> SearchConfig {
    SearchConfig {
        site_timeout_ms: 300,
        overall_timeout_ms: 1000,
        refresh_timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_concurrent_identical_searches_hit_each_site_once() {
    let h = TestHarness::new(&["alpha", "beta"]);
    for key in ["alpha", "beta"] {
        let url = fixtures::base_url(key);
        h.adapter
            .set_search_results(&url, vec![fixtures::vod_item(key, "1", "流浪地球")])
            .await;
        h.adapter.set_delay(&url, Duration::from_millis(100)).await;
    }

    let calls = (0..8).map(|_| {
        let service = Arc::clone(&h.service);
        async move { service.search("地球", false).await }
    });
    let outcomes = join_all(calls).await;

    for outcome in outcomes {
        let outcome = outcome.expect("search should succeed");
        assert_eq!(outcome.items.len(), 2);
        assert!(!outcome.from_cache);
    }
    assert_eq!(h.adapter.search_calls_for(&fixtures::base_url("alpha")).await, 1);
    assert_eq!(h.adapter.search_calls_for(&fixtures::base_url("beta")).await, 1);
}

#[tokio::test]
async fn test_timed_out_site_is_skipped_without_error() {
    let h = TestHarness::new(&["alpha", "beta"]);
    h.adapter
        .set_search_results(&fixtures::base_url("alpha"), vec![fixtures::vod_item("alpha", "1", "Show")])
        .await;
    h.adapter
        .set_search_results(&fixtures::base_url("beta"), vec![fixtures::vod_item("beta", "2", "Show")])
        .await;
    h.adapter
        .set_delay(&fixtures::base_url("beta"), Duration::from_secs(5))
        .await;

    let outcome = h.service.search("Show", false).await.expect("no error");
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].source_key, "alpha");
}

#[tokio::test]
async fn test_all_sites_failing_returns_empty() {
    let h = TestHarness::new(&["alpha", "beta"]);
    h.adapter
        .set_search_error(
            &fixtures::base_url("alpha"),
            vodhub_core::SourceError::ConnectionFailed("refused".into()),
        )
        .await;
    h.adapter
        .set_delay(&fixtures::base_url("beta"), Duration::from_secs(5))
        .await;

    let outcome = h.service.search("anything", false).await.expect("no error");
    assert!(outcome.items.is_empty());
    assert_eq!(outcome.filtered_count, 0);
}

#[tokio::test]
async fn test_concurrent_cold_details_fetch_once() {
    let h = TestHarness::new(&["alpha"]);
    let url = fixtures::base_url("alpha");
    h.adapter.set_detail(&url, fixtures::vod_item("alpha", "42", "Show")).await;
    h.adapter.set_delay(&url, Duration::from_millis(100)).await;

    let s1 = Arc::clone(&h.service);
    let s2 = Arc::clone(&h.service);
    let (a, b) = tokio::join!(
        tokio::spawn(async move { s1.get_detail("alpha", "42").await }),
        tokio::spawn(async move { s2.get_detail("alpha", "42").await }),
    );

    assert_eq!(a.unwrap().unwrap().unwrap().item.vod_id, "42");
    assert_eq!(b.unwrap().unwrap().unwrap().item.vod_id, "42");
    assert_eq!(h.adapter.detail_calls().await, 1);
}

#[tokio::test]
async fn test_copyright_keyword_filters_unless_bypassed() {
    let h = TestHarness::new(&["alpha"]);
    h.keywords
        .add_keyword(KeywordKind::Copyright, "写真")
        .unwrap();
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
    assert_eq!(filtered.filtered_count, 1);
    assert!(filtered.items.iter().all(|i| i.vod_name != "艺术写真集 第1集"));

    let bypassed = h.service.search("艺术", true).await.unwrap();
    assert_eq!(bypassed.filtered_count, 0);
    assert!(bypassed.items.iter().any(|i| i.vod_name == "艺术写真集 第1集"));
}

#[tokio::test]
async fn test_category_keywords_drop_items_at_ingest() {
    let h = TestHarness::new(&["alpha"]);
    h.keywords.add_keyword(KeywordKind::Category, "伦理").unwrap();
    let mut blocked = fixtures::vod_item("alpha", "1", "Show blocked");
    blocked.type_name = "伦理片".to_string();
    h.adapter
        .set_search_results(
            &fixtures::base_url("alpha"),
            vec![blocked, fixtures::vod_item("alpha", "2", "Show ok")],
        )
        .await;

    let outcome = h.service.search("Show", true).await.unwrap();
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].vod_id, "2");
    assert!(h.store.find_by_composite_key("alpha", "1").unwrap().is_none());
}

#[tokio::test]
async fn test_unplayable_items_never_returned() {
    let h = TestHarness::new(&["alpha"]);
    let mut unplayable = fixtures::vod_item("alpha", "1", "Show mp4");
    unplayable.vod_play_url = "正片$https://cdn.example/1.mp4".to_string();
    h.adapter
        .set_search_results(
            &fixtures::base_url("alpha"),
            vec![unplayable.clone(), fixtures::vod_item("alpha", "2", "Show m3u8")],
        )
        .await;
    h.adapter
        .set_detail(&fixtures::base_url("alpha"), unplayable)
        .await;

    let outcome = h.service.search("Show", false).await.unwrap();
    assert_eq!(outcome.items.len(), 1);
    assert!(outcome.items[0].vod_play_url.contains(".m3u8"));

    assert!(h.service.get_detail("alpha", "1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_results_ranked_by_reported_load_time() {
    let h = TestHarness::new(&["alpha"]);
    let items = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|id| fixtures::vod_item("alpha", id, "Show"))
        .collect();
    h.adapter
        .set_search_results(&fixtures::base_url("alpha"), items)
        .await;
    h.service.search("Show", false).await.unwrap();

    h.store.report_success("alpha", "d", 800.0).unwrap();
    h.store.report_success("alpha", "b", 200.0).unwrap();
    h.store.report_success("alpha", "e", 450.0).unwrap();

    let outcome = h.service.search("Show", false).await.unwrap();
    assert!(outcome.from_cache);

    let sampled: Vec<&str> = outcome
        .items
        .iter()
        .take_while(|i| i.sample_count > 0)
        .map(|i| i.vod_id.as_str())
        .collect();
    assert_eq!(sampled, vec!["b", "e", "d"]);
    assert!(outcome.items[3..].iter().all(|i| i.sample_count == 0));
}

#[tokio::test]
async fn test_load_stats_accumulate() {
    let h = TestHarness::new(&["alpha"]);
    h.store.upsert(&fixtures::vod_item("alpha", "1", "Show")).unwrap();

    h.store.report_success("alpha", "1", 500.0).unwrap();
    h.store.report_success("alpha", "1", 700.0).unwrap();
    h.store.report_failure("alpha", "1").unwrap();

    let stats = h.store.load_stats("alpha", "1").unwrap();
    assert_eq!(stats.sample_count, 2);
    assert_eq!(stats.failed_count, 1);
    assert!((stats.avg_speed_ms - 600.0).abs() < 1e-9);
    assert!((stats.success_rate - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_repeated_upserts_keep_one_row_with_latest_values() {
    let h = TestHarness::new(&["alpha"]);
    let mut item = fixtures::vod_item("alpha", "1", "Show");
    h.store.upsert(&item).unwrap();

    item.vod_remarks = "更新至10集".to_string();
    item.vod_name = "Show (renamed)".to_string();
    h.store.upsert(&item).unwrap();

    assert_eq!(h.store.count().unwrap(), 1);
    let stored = h.store.find_by_composite_key("alpha", "1").unwrap().unwrap();
    assert_eq!(stored.vod_remarks, "更新至10集");
    assert_eq!(stored.vod_name, "Show (renamed)");
}

#[tokio::test]
async fn test_delete_inactive_uses_cutoff() {
    let h = TestHarness::new(&["alpha"]);
    for id in ["stale", "fresh"] {
        h.store.upsert(&fixtures::vod_item("alpha", id, "Show")).unwrap();
    }

    let conn = rusqlite::Connection::open(&h.db_path).unwrap();
    let set_visited = |id: &str, days_ago: i64| {
        let at = (Utc::now() - chrono::Duration::days(days_ago))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        conn.execute(
            "UPDATE vod_items SET last_visited_at = ?1 WHERE source_key = 'alpha' AND vod_id = ?2",
            rusqlite::params![at, id],
        )
        .unwrap();
    };
    set_visited("stale", 11);
    set_visited("fresh", 9);

    assert_eq!(h.store.delete_inactive(10).unwrap(), 1);
    assert_eq!(h.store.count().unwrap(), 1);
    assert!(h.store.find_by_composite_key("alpha", "fresh").unwrap().is_some());
}

#[tokio::test]
async fn test_store_hit_is_refreshed_in_background() {
    let h = TestHarness::new(&["alpha"]);
    let url = fixtures::base_url("alpha");
    h.adapter
        .set_search_results(&url, vec![fixtures::vod_item("alpha", "1", "Show")])
        .await;

    let first = h.service.search("Show", false).await.unwrap();
    assert!(!first.from_cache);

    let mut updated = fixtures::vod_item("alpha", "1", "Show");
    updated.vod_remarks = "更新至10集".to_string();
    h.adapter.set_search_results(&url, vec![updated]).await;

    h.service.refresh_queue().start().await;

    let second = h.service.search("Show", false).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.items[0].vod_remarks, "HD");

    let mut refreshed = false;
    for _ in 0..100 {
        let rows = h.store.search("Show").unwrap();
        if rows.first().map(|r| r.vod_remarks.as_str()) == Some("更新至10集") {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refreshed, "background refresh should update the stored row");
    assert_eq!(h.adapter.search_calls().await, 2);

    // A second hit inside the cooldown window does not queue another refresh
    let third = h.service.search("Show", false).await.unwrap();
    assert_eq!(third.items[0].vod_remarks, "更新至10集");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.adapter.search_calls().await, 2);

    h.service.refresh_queue().stop().await;
}
