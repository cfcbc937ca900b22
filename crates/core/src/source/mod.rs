//! Source adapters - one HTTP call against one resource site.
//!
//! An adapter normalizes a site's loosely typed JSON into [`VodItem`]s.
//! It does no caching and no persistence. Cancellation is cooperative: the
//! caller bounds an adapter call with a timeout or drops the future, which
//! aborts the in-flight request.

mod play_url;
mod vod_api;

pub use play_url::{has_playable_episode, parse_play_url, PlayEpisode, PlaySource};
pub use vod_api::{value_to_string, VodApiAdapter};

use async_trait::async_trait;
use thiserror::Error;

use crate::item::VodItem;

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Upstream HTTP error: {0}")]
    Http(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One site family's API.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Adapter name for logging.
    fn name(&self) -> &str;

    /// Keyword search against one site.
    ///
    /// Items without a playable episode, or whose category text matches any
    /// of `blocked_categories`, are dropped before returning.
    async fn search(
        &self,
        base_url: &str,
        keyword: &str,
        source_key: &str,
        blocked_categories: &[String],
    ) -> Result<Vec<VodItem>, SourceError>;

    /// Fetch one item by its upstream id. `Ok(None)` if the site does not
    /// know it or it has nothing playable.
    async fn get_detail(
        &self,
        base_url: &str,
        vod_id: &str,
        source_key: &str,
    ) -> Result<Option<VodItem>, SourceError>;
}
