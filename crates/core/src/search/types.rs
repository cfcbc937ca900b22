use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;

use crate::filter::FilterError;
use crate::item::{ItemStoreError, VodItem};
use crate::site::SiteError;
use crate::source::SourceError;

/// Errors surfaced by the search orchestrator.
///
/// `Clone` so one coalesced call can hand the same failure to every waiter.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Site registry error: {0}")]
    Registry(String),

    #[error("Filter error: {0}")]
    Filter(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SiteError> for SearchError {
    fn from(e: SiteError) -> Self {
        SearchError::Registry(e.to_string())
    }
}

impl From<FilterError> for SearchError {
    fn from(e: FilterError) -> Self {
        SearchError::Filter(e.to_string())
    }
}

impl From<ItemStoreError> for SearchError {
    fn from(e: ItemStoreError) -> Self {
        SearchError::Store(e.to_string())
    }
}

impl From<SourceError> for SearchError {
    fn from(e: SourceError) -> Self {
        SearchError::Upstream(e.to_string())
    }
}

impl From<JoinError> for SearchError {
    fn from(e: JoinError) -> Self {
        SearchError::Internal(format!("upstream task failed: {}", e))
    }
}

/// Result of a keyword search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    /// Filtered and ranked items.
    pub items: Vec<VodItem>,
    /// Items removed by the copyright filter for this response.
    pub filtered_count: usize,
    /// True if served from the local store (a refresh was scheduled).
    pub from_cache: bool,
}

/// Result of a detail lookup that found something.
#[derive(Debug, Clone, Serialize)]
pub struct DetailOutcome {
    pub item: VodItem,
    pub from_cache: bool,
}
