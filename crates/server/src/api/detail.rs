//! Detail API handler.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, warn};
use vodhub_core::{parse_play_url, LoadStats, LoadStatsTracker, PlaySource, SearchError, VodItem};

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub item: VodItem,
    pub play_sources: Vec<PlaySource>,
    pub load_stats: LoadStats,
    pub from_cache: bool,
}

/// GET /api/v1/detail/{source_key}/{vod_id}
///
/// 404 when neither the store nor the site has the item, 502 when the site
/// could not be reached.
pub async fn get_detail(
    State(state): State<Arc<AppState>>,
    Path((source_key, vod_id)): Path<(String, String)>,
) -> Result<Json<DetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let outcome = match state.search().get_detail(&source_key, &vod_id).await {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            return Err((StatusCode::NOT_FOUND, ErrorResponse::new("Item not found")));
        }
        Err(e @ SearchError::Upstream(_)) => {
            warn!(site = %source_key, vod_id = %vod_id, error = %e, "Detail fetch failed");
            return Err((
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new(format!("Upstream site failed: {}", e)),
            ));
        }
        Err(e) => {
            error!(site = %source_key, vod_id = %vod_id, error = %e, "Detail lookup failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(e.to_string()),
            ));
        }
    };

    let item = outcome.item;
    let load_stats = state
        .items()
        .load_stats(&item.source_key, &item.vod_id)
        .unwrap_or_else(|e| {
            warn!(site = %item.source_key, vod_id = %item.vod_id, error = %e, "Load stats unavailable");
            LoadStats::new(item.avg_speed_ms, item.sample_count, item.failed_count)
        });

    Ok(Json(DetailResponse {
        play_sources: parse_play_url(&item.vod_play_url),
        load_stats,
        from_cache: outcome.from_cache,
        item,
    }))
}
