use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{detail, handlers, middleware::metrics_middleware, report, search};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Search and detail
        .route("/search", get(search::search))
        .route("/detail/{source_key}/{vod_id}", get(detail::get_detail))
        // Player feedback
        .route("/report", post(report::report_load));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
}
