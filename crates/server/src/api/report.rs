//! Player load-time reports.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use vodhub_core::{ItemStoreError, LoadStatsTracker};

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub source_key: String,
    pub vod_id: String,
    /// Milliseconds until playback started.
    pub load_time: f64,
    /// `success`; anything else counts as a failure.
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub message: String,
}

/// POST /api/v1/report
pub async fn report_load(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, (StatusCode, Json<ErrorResponse>)> {
    if body.source_key.trim().is_empty() || body.vod_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("source_key and vod_id are required"),
        ));
    }
    if body.load_time <= 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("load_time must be positive"),
        ));
    }

    let result = if body.status == "success" {
        state
            .items()
            .report_success(&body.source_key, &body.vod_id, body.load_time)
    } else {
        debug!(
            site = %body.source_key,
            vod_id = %body.vod_id,
            reason = body.reason.as_deref().unwrap_or(""),
            "Playback failure reported"
        );
        state.items().report_failure(&body.source_key, &body.vod_id)
    };

    match result {
        Ok(()) => Ok(Json(ReportResponse {
            message: "reported".to_string(),
        })),
        Err(ItemStoreError::NotFound(key)) => Err((
            StatusCode::NOT_FOUND,
            ErrorResponse::new(format!("Item not found: {}", key)),
        )),
        Err(e) => {
            error!(site = %body.source_key, vod_id = %body.vod_id, error = %e, "Failed to record report");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Failed to record report"),
            ))
        }
    }
}
