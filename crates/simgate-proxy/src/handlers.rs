//! HTTP handlers for the proxy.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Proxy liveness |
//! | `GET` | `/api/servers` | Configured backend nodes |
//! | any | `/api/{node}/{*endpoint}` | Forward to the node over the bridge |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{Value, json};
use simgate_bridge::{JsonObject, cache_key};
use tracing::{debug, info};

use crate::error::ProxyError;
use crate::routing::{self, carries_body};
use crate::state::ProxyState;

/// Version reported by `/health` and `/api/servers`.
const PROXY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `GET /health`
pub async fn health(State(state): State<Arc<ProxyState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().timestamp_millis(),
        "proxy_name": state.config.proxy.name,
        "proxy_version": PROXY_VERSION,
        "registered_servers": state.config.nodes.len(),
        "cached_responses": state.cache.len(),
    }))
}

/// `GET /api/servers`
pub async fn servers(State(state): State<Arc<ProxyState>>) -> Json<Value> {
    let servers: Vec<Value> = state
        .config
        .nodes
        .iter()
        .map(|(name, node)| {
            json!({
                "name": name,
                "address": node.host,
                "bridge_port": node.bridge_port.unwrap_or(state.config.default_bridge_port),
            })
        })
        .collect();

    Json(json!({
        "count": servers.len(),
        "servers": servers,
        "proxy_name": state.config.proxy.name,
        "proxy_version": PROXY_VERSION,
    }))
}

/// `/api/{node}` without an endpoint.
pub async fn missing_endpoint() -> ProxyError {
    ProxyError::BadRequest("Invalid path format. Expected: /api/{server-name}/{endpoint}".to_owned())
}

fn parse_body(bytes: &[u8]) -> Result<Option<JsonObject>, ProxyError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(object)) => Ok(Some(object)),
        Ok(_) | Err(_) => Err(ProxyError::BadRequest("Invalid JSON request".to_owned())),
    }
}

fn with_metadata(mut object: JsonObject, state: &ProxyState, node: &str) -> JsonObject {
    object.insert(
        "proxy_server".to_owned(),
        Value::String(state.config.proxy.name.clone()),
    );
    object.insert("backend_server".to_owned(), Value::String(node.to_owned()));
    object.insert(
        "request_timestamp".to_owned(),
        Value::from(Utc::now().timestamp_millis()),
    );
    object
}

/// `ANY /api/{node}/{*endpoint}`
///
/// GET responses without an `error` are cached per node. The HTTP status
/// is the envelope's `status`.
pub async fn forward(
    State(state): State<Arc<ProxyState>>,
    Path((node, endpoint)): Path<(String, String)>,
    method: Method,
    Query(params): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let addr = state
        .config
        .bridge_address(&node)
        .ok_or_else(|| ProxyError::NodeNotFound(node.clone()))?;

    let method_name = method.as_str();
    let is_get = method == Method::GET;
    let key = cache_key(method_name, &endpoint, &params);

    if is_get && let Some(cached) = state.cache.get(&node, &key) {
        debug!(%node, %endpoint, "Serving cached response");
        let object = with_metadata(cached, &state, &node);
        return Ok((StatusCode::OK, Json(object)).into_response());
    }

    let body = if carries_body(method_name) {
        parse_body(&body)?
    } else {
        None
    };
    let call = routing::route(&endpoint, method_name, &params, body);

    info!(%node, %endpoint, action = %call.action, "Forwarding request to node");
    let response = state.client.send(&addr, &call.action, call.data).await;

    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let failed = response.error.is_some();
    let object = response.into_json();

    if is_get && !failed {
        state.cache.insert(&node, &key, object.clone());
    }

    let object = with_metadata(object, &state, &node);
    Ok((status, Json(object)).into_response())
}

/// Fallback for unmatched paths.
pub async fn not_found() -> ProxyError {
    ProxyError::NotFound
}

/// Fallback for matched paths with the wrong method.
pub async fn method_not_allowed() -> ProxyError {
    ProxyError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_must_be_an_object() {
        assert_eq!(parse_body(b"  "), Ok(None));
        assert!(parse_body(br#"{"message":"hi"}"#).is_ok_and(|b| b.is_some()));
        assert_eq!(
            parse_body(b"[1,2]"),
            Err(ProxyError::BadRequest("Invalid JSON request".to_owned()))
        );
    }
}
