use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // Topology routes
        .route("/api/topology", get(handlers::topology::get_topology))
        .route("/api/topology/load", post(handlers::topology::load_topology))
        .route("/api/devices", get(handlers::topology::list_devices))
        .route("/api/devices/:name", get(handlers::topology::get_device))
        // Rendering routes
        .route("/api/devices/:name/config", get(handlers::configs::get_device_config))
        .route("/api/render", post(handlers::configs::render))
        // NetBox routes
        .route("/api/netbox/sync/push", post(handlers::netbox::sync_push))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
