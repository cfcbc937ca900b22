//! Site registry - the configured upstream resource sites.
//!
//! The search path only reads from the registry (`list_enabled`, `find_by_key`).
//! Mutation is done by startup seeding and by admin tooling through the
//! concrete store.

mod sqlite;

pub use sqlite::SqliteSiteRegistry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SiteSeed;

/// A configured upstream resource site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Stable identifier, used as the first half of an item's composite key.
    pub key: String,
    /// API endpoint, e.g. `https://example.com/api.php/provide/vod`.
    pub base_url: String,
    pub enabled: bool,
}

impl Site {
    pub fn new(key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            base_url: base_url.into(),
            enabled: true,
        }
    }
}

impl From<&SiteSeed> for Site {
    fn from(seed: &SiteSeed) -> Self {
        Self {
            key: seed.key.clone(),
            base_url: seed.base_url.clone(),
            enabled: seed.enabled,
        }
    }
}

/// Errors from site registry operations.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Site not found: {0}")]
    NotFound(String),

    #[error("Invalid site: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Read access to configured sites.
pub trait SiteRegistry: Send + Sync {
    /// All enabled sites, ordered by key.
    fn list_enabled(&self) -> Result<Vec<Site>, SiteError>;

    /// Look up a site by key, enabled or not.
    fn find_by_key(&self, key: &str) -> Result<Option<Site>, SiteError>;
}
