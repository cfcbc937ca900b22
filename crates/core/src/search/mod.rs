//! Search orchestration: local store lookup, coalesced upstream fan-out,
//! copyright filtering, load-speed ranking and background refresh.

mod fetcher;
mod ranking;
mod refresh;
mod service;
mod types;

pub use fetcher::UpstreamFetcher;
pub use ranking::rank_by_load_speed;
pub use refresh::{RefreshJob, RefreshQueue};
pub use service::SearchService;
pub use types::{DetailOutcome, SearchError, SearchOutcome};
