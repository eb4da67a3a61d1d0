//! REST API endpoint handlers for host nodes.
//!
//! Every handler submits its work to the execution context and waits for
//! the result, bounded by the context's handoff timeout (408 on expiry).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/server` | Server identity and runtime |
//! | `GET` | `/api/players` | Connected players |
//! | `GET` | `/api/player/{id}` | One player by UUID or name |
//! | `GET` | `/api/worlds` | All worlds |
//! | `GET` | `/api/world/{name}` | One world |
//! | `GET` | `/api/messages` | Message log (`limit`, `offset`, `player`, `type`) |
//! | `POST` | `/api/send-message` | Record a message |
//! | `GET` | `/api/status` | Liveness summary |
//! | `GET` | `/api/modules` | Loaded modules and their endpoints |
//! | any | `/api/{module}/{endpoint}` | Module data source or action |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::Method as HttpMethod;
use axum::Json;
use serde_json::Value;
use simgate_modules::{JsonObject, Method, Params};

use crate::error::ApiError;
use crate::gateway::{BaseCall, BaseEndpoint, ModuleCall};
use crate::state::AppState;

/// JSON handler result.
pub type ApiResult = Result<Json<JsonObject>, ApiError>;

async fn run_base(state: &AppState, endpoint: BaseEndpoint, call: BaseCall) -> ApiResult {
    let gateway = state.gateway.clone();
    let object = state
        .context
        .submit(move |world| gateway.base(endpoint, &call, world))
        .await??;
    Ok(Json(object))
}

/// Parse an optional JSON object body. Empty bodies are `None`.
pub fn parse_body(bytes: &[u8]) -> Result<Option<JsonObject>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(object)) => Ok(Some(object)),
        Ok(_) | Err(_) => Err(ApiError::BadRequest("Invalid JSON request".to_owned())),
    }
}

// ---------------------------------------------------------------------------
// Base endpoints
// ---------------------------------------------------------------------------

/// `GET /api/server`
pub async fn server(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> ApiResult {
    let call = BaseCall {
        params,
        ..BaseCall::default()
    };
    run_base(&state, BaseEndpoint::Server, call).await
}

/// `GET /api/players`
pub async fn players(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> ApiResult {
    let call = BaseCall {
        params,
        ..BaseCall::default()
    };
    run_base(&state, BaseEndpoint::Players, call).await
}

/// `GET /api/player/{id}`
pub async fn player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<Params>,
) -> ApiResult {
    let call = BaseCall {
        identifier: Some(id),
        params,
        body: None,
    };
    run_base(&state, BaseEndpoint::Player, call).await
}

/// `GET /api/worlds`
pub async fn worlds(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> ApiResult {
    let call = BaseCall {
        params,
        ..BaseCall::default()
    };
    run_base(&state, BaseEndpoint::Worlds, call).await
}

/// `GET /api/world/{name}`
pub async fn world(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<Params>,
) -> ApiResult {
    let call = BaseCall {
        identifier: Some(name),
        params,
        body: None,
    };
    run_base(&state, BaseEndpoint::World, call).await
}

/// `GET /api/messages`
pub async fn messages(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> ApiResult {
    let call = BaseCall {
        params,
        ..BaseCall::default()
    };
    run_base(&state, BaseEndpoint::Messages, call).await
}

/// `POST /api/send-message`
pub async fn send_message(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let body = parse_body(&body)?
        .ok_or_else(|| ApiError::BadRequest("Message is required".to_owned()))?;
    let call = BaseCall {
        body: Some(body),
        ..BaseCall::default()
    };
    run_base(&state, BaseEndpoint::SendMessage, call).await
}

/// `GET /api/status`
pub async fn status(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> ApiResult {
    let call = BaseCall {
        params,
        ..BaseCall::default()
    };
    run_base(&state, BaseEndpoint::Status, call).await
}

/// `GET /api/modules`
pub async fn modules(State(state): State<Arc<AppState>>) -> ApiResult {
    run_base(&state, BaseEndpoint::Modules, BaseCall::default()).await
}

// ---------------------------------------------------------------------------
// Module endpoints
// ---------------------------------------------------------------------------

/// `ANY /api/{module}/{endpoint}`
pub async fn module_endpoint(
    State(state): State<Arc<AppState>>,
    method: HttpMethod,
    Path((module, endpoint)): Path<(String, String)>,
    Query(params): Query<Params>,
    body: Bytes,
) -> ApiResult {
    let method: Method = method
        .as_str()
        .parse()
        .map_err(|e| ApiError::MethodNotAllowed(format!("Method not allowed: {e}")))?;
    let body = if method.carries_body() {
        parse_body(&body)?
    } else {
        None
    };
    let call = ModuleCall {
        module,
        endpoint,
        method,
        params,
        body,
    };

    let gateway = state.gateway.clone();
    let object = state
        .context
        .submit(move |world| gateway.module_endpoint(&call, world))
        .await??;
    Ok(Json(object))
}

// ---------------------------------------------------------------------------
// Fallbacks
// ---------------------------------------------------------------------------

/// Unknown path.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".to_owned())
}

/// Known path, unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed".to_owned())
}
