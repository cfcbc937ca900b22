//! Upstream fetch path: fan-out across sites, single-site detail, persistence.
//!
//! Both entry points are coalesced, so at most one fan-out per keyword and one
//! detail fetch per composite key is in flight at any time.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::SearchError;
use crate::filter::KeywordSource;
use crate::item::{ItemStore, VodItem};
use crate::metrics;
use crate::singleflight::{Joined, SingleFlight};
use crate::site::SiteRegistry;
use crate::source::{SourceAdapter, SourceError};

pub struct UpstreamFetcher {
    sites: Arc<dyn SiteRegistry>,
    keywords: Arc<dyn KeywordSource>,
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<dyn ItemStore>,
    site_timeout: Duration,
    overall_timeout: Duration,
    searches: SingleFlight<String, Vec<VodItem>, SearchError>,
    details: SingleFlight<(String, String), Option<VodItem>, SearchError>,
}

impl UpstreamFetcher {
    pub fn new(
        sites: Arc<dyn SiteRegistry>,
        keywords: Arc<dyn KeywordSource>,
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<dyn ItemStore>,
        site_timeout: Duration,
        overall_timeout: Duration,
    ) -> Self {
        Self {
            sites,
            keywords,
            adapter,
            store,
            site_timeout,
            overall_timeout,
            searches: SingleFlight::new(),
            details: SingleFlight::new(),
        }
    }

    /// Fan out `keyword` to every enabled site, or join the fan-out already
    /// running for it.
    pub async fn search(self: &Arc<Self>, keyword: &str) -> Joined<Vec<VodItem>, SearchError> {
        let this = Arc::clone(self);
        let kw = keyword.to_string();
        self.searches
            .run(keyword.to_string(), move || async move { this.fan_out(&kw).await })
            .await
    }

    /// Fetch one item from its site, or join the fetch already running for it.
    pub async fn detail(
        self: &Arc<Self>,
        source_key: &str,
        vod_id: &str,
    ) -> Joined<Option<VodItem>, SearchError> {
        let this = Arc::clone(self);
        let (sk, id) = (source_key.to_string(), vod_id.to_string());
        self.details
            .run(
                (source_key.to_string(), vod_id.to_string()),
                move || async move { this.fetch_detail(&sk, &id).await },
            )
            .await
    }

    /// Query every enabled site concurrently and persist what comes back.
    ///
    /// A site that fails or misses its deadline contributes nothing. When the
    /// overall deadline passes, sites still running are aborted and the items
    /// collected so far are used.
    async fn fan_out(&self, keyword: &str) -> Result<Vec<VodItem>, SearchError> {
        let sites = self.sites.list_enabled()?;
        if sites.is_empty() {
            debug!(keyword = %keyword, "No enabled sites to search");
            return Ok(Vec::new());
        }

        let blocked = Arc::new(self.keywords.all_category_keywords()?);
        let collected: Arc<Mutex<Vec<VodItem>>> = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        debug!(keyword = %keyword, sites = sites.len(), "Starting fan-out");

        let handles: Vec<JoinHandle<()>> = sites
            .into_iter()
            .map(|site| {
                let adapter = Arc::clone(&self.adapter);
                let blocked = Arc::clone(&blocked);
                let collected = Arc::clone(&collected);
                let keyword = keyword.to_string();
                let site_timeout = self.site_timeout;

                tokio::spawn(async move {
                    let result = tokio::time::timeout(
                        site_timeout,
                        adapter.search(&site.base_url, &keyword, &site.key, &blocked),
                    )
                    .await;

                    match result {
                        Ok(Ok(items)) => {
                            metrics::SITE_FETCHES
                                .with_label_values(&[site.key.as_str(), "ok"])
                                .inc();
                            debug!(site = %site.key, count = items.len(), "Site returned results");
                            collected.lock().await.extend(items);
                        }
                        Ok(Err(SourceError::Timeout)) | Err(_) => {
                            metrics::SITE_FETCHES
                                .with_label_values(&[site.key.as_str(), "timeout"])
                                .inc();
                            warn!(site = %site.key, keyword = %keyword, "Site search timed out");
                        }
                        Ok(Err(e)) => {
                            metrics::SITE_FETCHES
                                .with_label_values(&[site.key.as_str(), "error"])
                                .inc();
                            warn!(site = %site.key, keyword = %keyword, error = %e, "Site search failed");
                        }
                    }
                })
            })
            .collect();

        let aborts: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();

        match tokio::time::timeout(self.overall_timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(keyword = %keyword, error = %e, "Site task failed");
                    }
                }
            }
            Err(_) => {
                warn!(
                    keyword = %keyword,
                    timeout_ms = self.overall_timeout.as_millis() as u64,
                    "Fan-out deadline reached, using partial results"
                );
                for abort in &aborts {
                    abort.abort();
                }
            }
        }

        metrics::FANOUT_DURATION
            .with_label_values(&[])
            .observe(start.elapsed().as_secs_f64());

        let gathered = std::mem::take(&mut *collected.lock().await);
        let items = dedupe(gathered);
        self.persist(&items);

        info!(
            keyword = %keyword,
            items = items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fan-out complete"
        );

        Ok(items)
    }

    /// Fetch one item from its site. A missing or disabled site yields `None`.
    async fn fetch_detail(
        &self,
        source_key: &str,
        vod_id: &str,
    ) -> Result<Option<VodItem>, SearchError> {
        let site = match self.sites.find_by_key(source_key)? {
            Some(site) if site.enabled => site,
            Some(_) => {
                debug!(site = %source_key, "Detail requested for disabled site");
                return Ok(None);
            }
            None => {
                debug!(site = %source_key, "Detail requested for unknown site");
                return Ok(None);
            }
        };

        let result = tokio::time::timeout(
            self.site_timeout,
            self.adapter.get_detail(&site.base_url, vod_id, &site.key),
        )
        .await;

        match result {
            Ok(Ok(found)) => {
                metrics::SITE_FETCHES
                    .with_label_values(&[site.key.as_str(), "ok"])
                    .inc();
                if let Some(item) = &found {
                    self.persist(std::slice::from_ref(item));
                }
                Ok(found)
            }
            Ok(Err(SourceError::Timeout)) | Err(_) => {
                metrics::SITE_FETCHES
                    .with_label_values(&[site.key.as_str(), "timeout"])
                    .inc();
                warn!(site = %site.key, vod_id = %vod_id, "Detail fetch timed out");
                Err(SourceError::Timeout.into())
            }
            Ok(Err(e)) => {
                metrics::SITE_FETCHES
                    .with_label_values(&[site.key.as_str(), "error"])
                    .inc();
                warn!(site = %site.key, vod_id = %vod_id, error = %e, "Detail fetch failed");
                Err(e.into())
            }
        }
    }

    /// Write items to the store. Failures are logged and skipped.
    fn persist(&self, items: &[VodItem]) {
        for item in items {
            match self.store.upsert(item) {
                Ok(()) => metrics::ITEMS_INGESTED.inc(),
                Err(e) => {
                    metrics::INGEST_FAILURES.inc();
                    warn!(
                        site = %item.source_key,
                        vod_id = %item.vod_id,
                        error = %e,
                        "Failed to persist item"
                    );
                }
            }
        }
    }
}

/// Keep the first occurrence of each composite key.
fn dedupe(items: Vec<VodItem>) -> Vec<VodItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert((item.source_key.clone(), item.vod_id.clone())))
        .collect()
}
