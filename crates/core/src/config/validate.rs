use std::collections::HashSet;

use super::{types::Config, ConfigError};

const MAX_SWEEP_INTERVAL_HOURS: u64 = 24 * 365;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Fan-out timeouts are non-zero and the per-site one fits in the overall one
/// - Refresh queue has at least one worker and one slot
/// - Retention window is non-zero; sweep interval is between one hour and a year
/// - Seeded sites have unique, non-empty keys and http(s) base URLs
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let search = &config.search;
    if search.site_timeout_ms == 0 || search.overall_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "search timeouts must be greater than 0".to_string(),
        ));
    }
    if search.site_timeout_ms > search.overall_timeout_ms {
        return Err(ConfigError::ValidationError(format!(
            "search.site_timeout_ms ({}) exceeds search.overall_timeout_ms ({})",
            search.site_timeout_ms, search.overall_timeout_ms
        )));
    }
    if search.refresh_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search.refresh_timeout_secs must be greater than 0".to_string(),
        ));
    }
    if search.refresh_workers == 0 || search.refresh_queue_size == 0 {
        return Err(ConfigError::ValidationError(
            "search.refresh_workers and search.refresh_queue_size must be greater than 0"
                .to_string(),
        ));
    }

    if config.retention.inactive_days == 0 {
        return Err(ConfigError::ValidationError(
            "retention.inactive_days must be greater than 0".to_string(),
        ));
    }
    if config.retention.sweep_interval_hours == 0 {
        return Err(ConfigError::ValidationError(
            "retention.sweep_interval_hours must be greater than 0".to_string(),
        ));
    }
    if config.retention.sweep_interval_hours > MAX_SWEEP_INTERVAL_HOURS {
        return Err(ConfigError::ValidationError(format!(
            "retention.sweep_interval_hours ({}) exceeds {}",
            config.retention.sweep_interval_hours, MAX_SWEEP_INTERVAL_HOURS
        )));
    }

    let mut seen = HashSet::new();
    for site in &config.sites {
        if site.key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "site key cannot be empty".to_string(),
            ));
        }
        if !seen.insert(site.key.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate site key: {}",
                site.key
            )));
        }
        if !(site.base_url.starts_with("http://") || site.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "site {} base_url must start with http:// or https://",
                site.key
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SearchConfig, SiteSeed};

    fn site(key: &str, base_url: &str) -> SiteSeed {
        SiteSeed {
            key: key.to_string(),
            base_url: base_url.to_string(),
            enabled: true,
        }
    }

    #[test]
    fn test_validate_valid_config() {
        let mut config = Config::default();
        config.sites.push(site("alpha", "https://alpha.example/api"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_site_timeout_larger_than_overall() {
        let mut config = Config::default();
        config.search = SearchConfig {
            site_timeout_ms: 20_000,
            overall_timeout_ms: 5_000,
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("site_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = Config::default();
        config.search.refresh_workers = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_retention() {
        let mut config = Config::default();
        config.retention.inactive_days = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_retention_bounds() {
        let mut config = Config::default();
        config.retention.inactive_days = u32::MAX;
        assert!(validate_config(&config).is_ok());

        config.retention.sweep_interval_hours = MAX_SWEEP_INTERVAL_HOURS;
        assert!(validate_config(&config).is_ok());

        config.retention.sweep_interval_hours = u64::MAX;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("sweep_interval_hours"));
    }

    #[test]
    fn test_validate_duplicate_site_key() {
        let mut config = Config::default();
        config.sites.push(site("alpha", "https://a.example/api"));
        config.sites.push(site("alpha", "https://b.example/api"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate site key"));
    }

    #[test]
    fn test_validate_bad_scheme() {
        let mut config = Config::default();
        config.sites.push(site("alpha", "ftp://a.example/api"));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_key() {
        let mut config = Config::default();
        config.sites.push(site("  ", "https://a.example/api"));
        assert!(validate_config(&config).is_err());
    }
}
