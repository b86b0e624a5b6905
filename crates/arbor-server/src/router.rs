//! Axum router setup

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::handlers::{
    clear_store, get_edge, get_node, get_stats, health_check, load_bundle, match_patterns,
    project_view,
};
use crate::ServerState;

/// Create the axum router with all routes.
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/bundle", post(load_bundle))
        .route("/api/stats", get(get_stats))
        .route("/api/nodes/:id", get(get_node))
        .route("/api/edges/:id", get(get_edge))
        .route("/api/view", post(project_view))
        .route("/api/match", post(match_patterns))
        .route("/api/clear", post(clear_store))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
