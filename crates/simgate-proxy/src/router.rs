//! Axum router construction for the proxy.

use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::ProxyState;

/// Build the proxy router.
///
/// `/api/servers` is static and takes precedence over `/api/{node}`, so a
/// node cannot be named `servers`.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/servers", get(handlers::servers))
        .route("/api/{node}", any(handlers::missing_endpoint))
        .route("/api/{node}/{*endpoint}", any(handlers::forward))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
