use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Sites seeded into the registry at startup.
    #[serde(default)]
    pub sites: Vec<SiteSeed>,
    /// Filter keywords seeded into the keyword store at startup.
    #[serde(default)]
    pub filters: FilterSeeds,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5005
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("vodhub.db")
}

/// Search orchestration settings: fan-out timeouts and background refresh.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Timeout for a single site request (milliseconds).
    #[serde(default = "default_site_timeout")]
    pub site_timeout_ms: u64,

    /// Timeout wrapping a whole fan-out across all sites (milliseconds).
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_ms: u64,

    /// Budget for one background refresh job (seconds).
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,

    /// Maximum background refresh jobs running at once.
    #[serde(default = "default_refresh_workers")]
    pub refresh_workers: usize,

    /// Pending refresh jobs beyond this are dropped.
    #[serde(default = "default_refresh_queue_size")]
    pub refresh_queue_size: usize,

    /// A key refreshed within this window is not queued again (seconds, 0 = off).
    #[serde(default = "default_refresh_cooldown")]
    pub refresh_cooldown_secs: u64,

    /// How many recently refreshed keys are remembered.
    #[serde(default = "default_refresh_cooldown_capacity")]
    pub refresh_cooldown_capacity: usize,

    /// User-Agent sent to resource sites.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_site_timeout() -> u64 {
    10_000
}

fn default_overall_timeout() -> u64 {
    15_000
}

fn default_refresh_timeout() -> u64 {
    30
}

fn default_refresh_workers() -> usize {
    4
}

fn default_refresh_queue_size() -> usize {
    256
}

fn default_refresh_cooldown() -> u64 {
    60
}

fn default_refresh_cooldown_capacity() -> usize {
    2048
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            site_timeout_ms: default_site_timeout(),
            overall_timeout_ms: default_overall_timeout(),
            refresh_timeout_secs: default_refresh_timeout(),
            refresh_workers: default_refresh_workers(),
            refresh_queue_size: default_refresh_queue_size(),
            refresh_cooldown_secs: default_refresh_cooldown(),
            refresh_cooldown_capacity: default_refresh_cooldown_capacity(),
            user_agent: default_user_agent(),
        }
    }
}

impl SearchConfig {
    pub fn site_timeout(&self) -> Duration {
        Duration::from_millis(self.site_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn refresh_cooldown(&self) -> Duration {
        Duration::from_secs(self.refresh_cooldown_secs)
    }
}

/// Retention of items nobody has looked at for a while.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Items not visited for this many days are deleted.
    #[serde(default = "default_inactive_days")]
    pub inactive_days: u32,

    /// How often the sweep runs (hours).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_hours: u64,
}

fn default_inactive_days() -> u32 {
    10
}

fn default_sweep_interval() -> u64 {
    24
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            inactive_days: default_inactive_days(),
            sweep_interval_hours: default_sweep_interval(),
        }
    }
}

impl RetentionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_hours.saturating_mul(3600))
    }
}

/// A resource site declared in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteSeed {
    pub key: String,
    pub base_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Keyword lists declared in the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterSeeds {
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub copyright: Vec<String>,
}

/// Config view for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SanitizedSearchConfig,
    pub retention: RetentionConfig,
    pub sites: Vec<SiteSeed>,
    pub category_filter_count: usize,
    pub copyright_filter_count: usize,
}

/// Search settings without the user agent string.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearchConfig {
    pub site_timeout_ms: u64,
    pub overall_timeout_ms: u64,
    pub refresh_timeout_secs: u64,
    pub refresh_workers: usize,
    pub refresh_queue_size: usize,
    pub refresh_cooldown_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            search: SanitizedSearchConfig {
                site_timeout_ms: config.search.site_timeout_ms,
                overall_timeout_ms: config.search.overall_timeout_ms,
                refresh_timeout_secs: config.search.refresh_timeout_secs,
                refresh_workers: config.search.refresh_workers,
                refresh_queue_size: config.search.refresh_queue_size,
                refresh_cooldown_secs: config.search.refresh_cooldown_secs,
            },
            retention: config.retention.clone(),
            sites: config.sites.clone(),
            category_filter_count: config.filters.category.len(),
            copyright_filter_count: config.filters.copyright.len(),
        }
    }
}
