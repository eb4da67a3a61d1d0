//! Error types for the host HTTP API.
//!
//! [`ApiError`] is shared by the HTTP handlers and the bridge action
//! table: over HTTP it becomes a JSON `{error, status}` response, over the
//! bridge a [`HandlerError`] carrying the same status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use simgate_bridge::HandlerError;
use simgate_core::context::ContextError;
use simgate_core::state::MessageError;
use simgate_modules::CapabilityError;

/// Errors that can occur while serving a host endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request was malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The requested resource or endpoint does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The endpoint exists but does not accept the method.
    #[error("{0}")]
    MethodNotAllowed(String),

    /// The execution context did not answer in time.
    #[error("Request processing timed out")]
    Timeout,

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ContextError> for ApiError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::Timeout { .. } => Self::Timeout,
            other => Self::Internal(format!("Internal server error: {other}")),
        }
    }
}

impl From<CapabilityError> for ApiError {
    fn from(e: CapabilityError) -> Self {
        match e {
            CapabilityError::NotFound(msg) => Self::NotFound(msg),
            CapabilityError::BadRequest(msg) => Self::BadRequest(msg),
            CapabilityError::Failed(msg) => Self::Internal(msg),
        }
    }
}

impl From<MessageError> for ApiError {
    fn from(e: MessageError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<ApiError> for HandlerError {
    fn from(e: ApiError) -> Self {
        Self {
            status: e.status().as_u16(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
