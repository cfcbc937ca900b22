//! Adapter for the common `?ac=videolist` / `?ac=detail` site family.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{has_playable_episode, SourceAdapter, SourceError};
use crate::config::SearchConfig;
use crate::filter::is_category_blocked;
use crate::item::VodItem;
use crate::metrics;

/// Envelope returned by every site of this family. Only `list` matters;
/// `code`, `msg` and the paging fields vary in type between sites and are ignored.
#[derive(Debug, Deserialize)]
struct VodApiResponse {
    #[serde(default)]
    list: Option<Vec<Value>>,
}

/// Coerce a loosely typed JSON value to its text form.
///
/// Integral numbers lose their fractional part (`12.0` becomes `"12"`),
/// `null` becomes the empty string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        (f as i64).to_string()
                    }
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

fn field(raw: &Map<String, Value>, name: &str) -> String {
    raw.get(name).map(value_to_string).unwrap_or_default()
}

fn map_to_item(raw: &Map<String, Value>, source_key: &str) -> VodItem {
    VodItem {
        source_key: source_key.to_string(),
        vod_id: field(raw, "vod_id"),
        vod_name: field(raw, "vod_name"),
        vod_sub: field(raw, "vod_sub"),
        vod_en: field(raw, "vod_en"),
        vod_tag: field(raw, "vod_tag"),
        vod_class: field(raw, "vod_class"),
        type_name: field(raw, "type_name"),
        vod_pic: field(raw, "vod_pic"),
        vod_actor: field(raw, "vod_actor"),
        vod_director: field(raw, "vod_director"),
        vod_blurb: field(raw, "vod_blurb"),
        vod_content: field(raw, "vod_content"),
        vod_remarks: field(raw, "vod_remarks"),
        vod_pubdate: field(raw, "vod_pubdate"),
        vod_total: field(raw, "vod_total"),
        vod_serial: field(raw, "vod_serial"),
        vod_area: field(raw, "vod_area"),
        vod_lang: field(raw, "vod_lang"),
        vod_year: field(raw, "vod_year"),
        vod_duration: field(raw, "vod_duration"),
        vod_time: field(raw, "vod_time"),
        vod_douban_id: field(raw, "vod_douban_id"),
        vod_play_url: field(raw, "vod_play_url"),
        ..Default::default()
    }
}

/// Usable means it has an id and at least one playable episode.
fn is_usable(item: &VodItem) -> bool {
    !item.vod_id.is_empty() && has_playable_episode(&item.vod_play_url)
}

fn build_url(base_url: &str, query: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base_url, separator, query)
}

pub struct VodApiAdapter {
    client: Client,
}

impl VodApiAdapter {
    /// Create an adapter whose requests give up after `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| SourceError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SourceError> {
        Self::new(config.site_timeout(), &config.user_agent)
    }

    fn search_url(base_url: &str, keyword: &str) -> String {
        build_url(
            base_url,
            &format!("ac=videolist&pg=1&wd={}", urlencoding::encode(keyword)),
        )
    }

    fn detail_url(base_url: &str, vod_id: &str) -> String {
        build_url(
            base_url,
            &format!("ac=detail&ids={}", urlencoding::encode(vod_id)),
        )
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Map<String, Value>>, SourceError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout
                } else if e.is_connect() {
                    SourceError::ConnectionFailed(e.to_string())
                } else {
                    SourceError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SourceError::Http(format!("HTTP {}", status)));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Http(e.to_string())
            }
        })?;

        let parsed: VodApiResponse =
            serde_json::from_slice(&body).map_err(|e| SourceError::Parse(e.to_string()))?;

        Ok(parsed
            .list
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for VodApiAdapter {
    fn name(&self) -> &str {
        "vod_api"
    }

    async fn search(
        &self,
        base_url: &str,
        keyword: &str,
        source_key: &str,
        blocked_categories: &[String],
    ) -> Result<Vec<VodItem>, SourceError> {
        let url = Self::search_url(base_url, keyword);
        debug!(site = %source_key, url = %url, "Searching site");

        let raw = self.fetch(&url).await?;
        let total = raw.len();

        let usable: Vec<VodItem> = raw
            .iter()
            .map(|entry| map_to_item(entry, source_key))
            .filter(is_usable)
            .collect();
        let usable_count = usable.len();

        let items: Vec<VodItem> = usable
            .into_iter()
            .filter(|item| !is_category_blocked(item, blocked_categories))
            .collect();

        let blocked = usable_count - items.len();
        if blocked > 0 {
            metrics::CATEGORY_BLOCKED
                .with_label_values(&[source_key])
                .inc_by(blocked as u64);
        }

        debug!(
            site = %source_key,
            received = total,
            blocked = blocked,
            kept = items.len(),
            "Site search complete"
        );

        Ok(items)
    }

    async fn get_detail(
        &self,
        base_url: &str,
        vod_id: &str,
        source_key: &str,
    ) -> Result<Option<VodItem>, SourceError> {
        let url = Self::detail_url(base_url, vod_id);
        debug!(site = %source_key, vod_id = %vod_id, "Fetching detail");

        let raw = self.fetch(&url).await?;
        Ok(raw
            .first()
            .map(|entry| map_to_item(entry, source_key))
            .filter(is_usable))
    }
}
