use std::sync::Arc;
use vodhub_core::{Config, SanitizedConfig, SearchService, SqliteItemStore};

/// Shared application state
pub struct AppState {
    config: Config,
    search: Arc<SearchService>,
    items: Arc<SqliteItemStore>,
}

impl AppState {
    pub fn new(config: Config, search: Arc<SearchService>, items: Arc<SqliteItemStore>) -> Self {
        Self {
            config,
            search,
            items,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn search(&self) -> &SearchService {
        self.search.as_ref()
    }

    /// Item store, also the load-stats tracker.
    pub fn items(&self) -> &SqliteItemStore {
        self.items.as_ref()
    }
}
