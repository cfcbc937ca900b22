//! Keyword filters.
//!
//! Two independent block-lists:
//! - category keywords are matched against an item's category text by the
//!   source adapters, so blocked items never reach the store;
//! - copyright keywords are matched against an item's name at query time and
//!   can be bypassed per request.
//!
//! Matching is a case-insensitive substring test. Blank keywords never match.

mod sqlite;

pub use sqlite::SqliteKeywordStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::VodItem;

/// Which block-list a keyword belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordKind {
    Category,
    Copyright,
}

impl KeywordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordKind::Category => "category",
            KeywordKind::Copyright => "copyright",
        }
    }
}

impl std::fmt::Display for KeywordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid keyword: {0}")]
    InvalidKeyword(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Source of the two keyword lists.
pub trait KeywordSource: Send + Sync {
    fn all_category_keywords(&self) -> Result<Vec<String>, FilterError>;

    fn all_copyright_keywords(&self) -> Result<Vec<String>, FilterError>;
}

/// True if `text` contains any non-blank keyword, ignoring case.
pub fn matches_any(text: &str, keywords: &[String]) -> bool {
    if text.is_empty() {
        return false;
    }
    let haystack = text.to_lowercase();
    keywords.iter().any(|kw| {
        let kw = kw.trim();
        !kw.is_empty() && haystack.contains(&kw.to_lowercase())
    })
}

/// Category check used at ingest. Both the site's type name and its
/// comma-joined class list count as category text.
pub fn is_category_blocked(item: &VodItem, blocked: &[String]) -> bool {
    matches_any(&item.type_name, blocked) || matches_any(&item.vod_class, blocked)
}

/// Drop items whose name contains a copyright keyword.
///
/// Returns the kept items in their original order and the number removed.
pub fn apply_copyright_filter(items: Vec<VodItem>, keywords: &[String]) -> (Vec<VodItem>, usize) {
    if keywords.iter().all(|kw| kw.trim().is_empty()) {
        return (items, 0);
    }

    let before = items.len();
    let kept: Vec<VodItem> = items
        .into_iter()
        .filter(|item| !matches_any(&item.vod_name, keywords))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}
