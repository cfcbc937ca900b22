//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock source adapter injected, so the HTTP surface can be exercised
//! without reaching any real resource site.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vodhub_core::{
    testing::MockSourceAdapter, Config, DatabaseConfig, KeywordKind, SearchConfig, SearchService,
    SqliteItemStore, SqliteKeywordStore, SqliteSiteRegistry,
};

/// Re-export fixtures for test convenience
pub use vodhub_core::testing::fixtures;

/// Test fixture for API testing with a mock adapter.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search() {
///     let fixture = TestFixture::new(&["alpha"]);
///     fixture
///         .adapter
///         .set_search_results(&fixtures::base_url("alpha"), vec![fixtures::vod_item("alpha", "1", "Show")])
///         .await;
///
///     let response = fixture.get("/api/v1/search?kw=Show").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock adapter - configure per-site responses
    pub adapter: Arc<MockSourceAdapter>,
    /// Item store behind the service
    pub items: Arc<SqliteItemStore>,
    /// Site registry
    pub sites: Arc<SqliteSiteRegistry>,
    /// Filter keyword store
    pub keywords: Arc<SqliteKeywordStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with the given sites registered and enabled.
    pub fn new(site_keys: &[&str]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            search: SearchConfig {
                site_timeout_ms: 300,
                overall_timeout_ms: 1000,
                ..Default::default()
            },
            ..Default::default()
        };

        let sites =
            Arc::new(SqliteSiteRegistry::new(&db_path).expect("Failed to create site registry"));
        for key in site_keys {
            sites
                .upsert_site(&fixtures::site(key))
                .expect("Failed to add site");
        }
        let keywords =
            Arc::new(SqliteKeywordStore::new(&db_path).expect("Failed to create keyword store"));
        let items = Arc::new(SqliteItemStore::new(&db_path).expect("Failed to create item store"));
        let adapter = Arc::new(MockSourceAdapter::new());

        let search = Arc::new(SearchService::new(
            &config.search,
            sites.clone(),
            keywords.clone(),
            adapter.clone(),
            items.clone(),
        ));

        let state = Arc::new(vodhub_server::state::AppState::new(
            config,
            search,
            items.clone(),
        ));
        let router = vodhub_server::api::create_router(state);

        Self {
            router,
            adapter,
            items,
            sites,
            keywords,
            temp_dir,
        }
    }

    pub fn add_copyright_keyword(&self, keyword: &str) {
        self.keywords
            .add_keyword(KeywordKind::Copyright, keyword)
            .expect("Failed to add keyword");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
