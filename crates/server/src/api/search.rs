//! Search API handler.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use vodhub_core::VodItem;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub kw: String,
    /// `1` or `true` skips the copyright filter.
    #[serde(default)]
    pub bypass: Option<String>,
}

impl SearchParams {
    fn bypass_copyright(&self) -> bool {
        matches!(self.bypass.as_deref(), Some("1") | Some("true"))
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub keyword: String,
    pub items: Vec<VodItem>,
    pub filtered_count: usize,
    pub from_cache: bool,
}

/// GET /api/v1/search?kw=<keyword>&bypass=1
///
/// Always answers 200. A failed search is logged and returned as an empty
/// result.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let keyword = params.kw.trim().to_string();
    let bypass = params.bypass_copyright();

    match state.search().search(&keyword, bypass).await {
        Ok(outcome) => Json(SearchResponse {
            keyword,
            items: outcome.items,
            filtered_count: outcome.filtered_count,
            from_cache: outcome.from_cache,
        }),
        Err(e) => {
            warn!(keyword = %keyword, error = %e, "Search failed, returning empty result");
            Json(SearchResponse {
                keyword,
                items: Vec::new(),
                filtered_count: 0,
                from_cache: false,
            })
        }
    }
}
