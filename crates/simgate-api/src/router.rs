//! Axum router construction for the host API.

use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for a host node.
///
/// Base endpoints are static routes and take precedence over the
/// `/api/{module}/{endpoint}` catch-all, so a module named `player` or
/// `world` cannot shadow them. Every response, including 404 and 405
/// fallbacks, is JSON with permissive CORS headers.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Base endpoints
        .route("/api/server", get(handlers::server))
        .route("/api/players", get(handlers::players))
        .route("/api/player/{id}", get(handlers::player))
        .route("/api/worlds", get(handlers::worlds))
        .route("/api/world/{name}", get(handlers::world))
        .route("/api/messages", get(handlers::messages))
        .route("/api/send-message", post(handlers::send_message))
        .route("/api/status", get(handlers::status))
        .route("/api/modules", get(handlers::modules))
        // Module endpoints
        .route("/api/{module}/{endpoint}", any(handlers::module_endpoint))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
