//! Route definitions.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;
use crate::handlers;

/// API routes, matching the dashboard's existing paths.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/device_updates_stream",
            get(handlers::device_updates_stream),
        )
        .route("/api/device_stats", get(handlers::device_stats))
        .route(
            "/api/connection-recovery",
            post(handlers::connection_recovery),
        )
        .route("/api/health", get(handlers::health))
}
