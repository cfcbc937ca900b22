pub mod cache;
pub mod cleanup;
pub mod config;
pub mod filter;
pub mod item;
pub mod metrics;
pub mod search;
pub mod singleflight;
pub mod site;
pub mod source;
pub mod stats;
pub mod testing;

pub use cache::TtlCache;
pub use cleanup::RetentionSweeper;
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig, SanitizedConfig,
    SearchConfig,
};
pub use filter::{
    apply_copyright_filter, is_category_blocked, FilterError, KeywordKind, KeywordSource,
    SqliteKeywordStore,
};
pub use item::{ItemStore, ItemStoreError, SqliteItemStore, VodItem};
pub use search::{
    DetailOutcome, RefreshJob, RefreshQueue, SearchError, SearchOutcome, SearchService,
    UpstreamFetcher,
};
pub use singleflight::{Joined, SingleFlight};
pub use site::{Site, SiteError, SiteRegistry, SqliteSiteRegistry};
pub use source::{
    parse_play_url, PlayEpisode, PlaySource, SourceAdapter, SourceError, VodApiAdapter,
};
pub use stats::{LoadStats, LoadStatsTracker};
