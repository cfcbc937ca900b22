use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use vodhub_core::SanitizedConfig;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// JSON error body shared by the API handlers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Json<Self> {
        Json(Self {
            error: error.into(),
        })
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
