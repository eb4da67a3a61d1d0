//! Wire envelopes.
//!
//! Every message is a single line of JSON terminated by `\n`.
//!
//! Request:
//!
//! ```json
//! {"action": "player", "requestId": "…uuid…", "data": {"identifier": "alice", "params": {}}}
//! ```
//!
//! Response: the handler's fields merged with the envelope fields
//! `requestId`, `success`, `status`, `timestamp` (epoch milliseconds) and,
//! on failure, `error`. Envelope fields win over handler fields of the same
//! name. `requestId` is absent only when the request line could not be
//! decoded.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// A JSON object.
pub type JsonObject = Map<String, Value>;

/// One bridge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    /// Name of the action to run on the backend node.
    pub action: String,
    /// Correlation id echoed in the response.
    pub request_id: String,
    /// Action input. Query parameters travel under `params`.
    pub data: JsonObject,
}

impl BridgeRequest {
    /// Build a request with a fresh UUID v4 correlation id.
    pub fn new(action: &str, data: JsonObject) -> Self {
        Self {
            action: action.to_owned(),
            request_id: uuid::Uuid::new_v4().to_string(),
            data,
        }
    }

    /// Decode one request line.
    pub fn decode(line: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(line.trim()).map_err(|e| BridgeError::Decode(e.to_string()))
    }

    /// Encode as one line, including the trailing newline.
    pub fn encode(&self) -> Result<String, BridgeError> {
        let mut line = serde_json::to_string(self).map_err(|e| BridgeError::Decode(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }
}

/// One bridge response.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeResponse {
    /// Echoed correlation id; `None` for undecodable requests.
    pub request_id: Option<String>,
    /// Whether the action succeeded.
    pub success: bool,
    /// Status code (200, 400, 404, 408, 500, ...).
    pub status: u16,
    /// When the response was produced, in epoch milliseconds.
    pub timestamp: i64,
    /// Failure message.
    pub error: Option<String>,
    /// Handler result fields.
    pub body: JsonObject,
}

impl BridgeResponse {
    /// A successful response carrying `body`.
    pub fn success(request_id: String, body: JsonObject) -> Self {
        Self {
            request_id: Some(request_id),
            success: true,
            status: 200,
            timestamp: Utc::now().timestamp_millis(),
            error: None,
            body,
        }
    }

    /// A failed response.
    pub fn failure(request_id: Option<String>, status: u16, error: impl Into<String>) -> Self {
        Self {
            request_id,
            success: false,
            status,
            timestamp: Utc::now().timestamp_millis(),
            error: Some(error.into()),
            body: JsonObject::new(),
        }
    }

    /// Flatten into a single JSON object, handler fields first.
    pub fn into_json(self) -> JsonObject {
        let mut object = self.body;
        if let Some(id) = self.request_id {
            object.insert("requestId".to_owned(), Value::String(id));
        }
        object.insert("success".to_owned(), Value::Bool(self.success));
        object.insert("status".to_owned(), Value::from(self.status));
        object.insert("timestamp".to_owned(), Value::from(self.timestamp));
        if let Some(error) = self.error {
            object.insert("error".to_owned(), Value::String(error));
        }
        object
    }

    /// Split a flat JSON object back into envelope and body.
    ///
    /// Missing envelope fields are tolerated: `success` defaults to the
    /// absence of `error`, `status` to 200 or 500 accordingly.
    pub fn from_json(mut object: JsonObject) -> Self {
        let request_id = match object.remove("requestId") {
            Some(Value::String(id)) => Some(id),
            _ => None,
        };
        let error = match object.remove("error") {
            Some(Value::String(message)) => Some(message),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let success = object
            .remove("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(error.is_none());
        let status = object
            .remove("status")
            .and_then(|v| v.as_u64())
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(if success { 200 } else { 500 });
        let timestamp = object
            .remove("timestamp")
            .and_then(|v| v.as_i64())
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        Self {
            request_id,
            success,
            status,
            timestamp,
            error,
            body: object,
        }
    }

    /// Decode one response line.
    pub fn decode(line: &str) -> Result<Self, BridgeError> {
        let object: JsonObject =
            serde_json::from_str(line.trim()).map_err(|e| BridgeError::Decode(e.to_string()))?;
        Ok(Self::from_json(object))
    }

    /// Encode as one line, including the trailing newline.
    pub fn encode(self) -> String {
        let mut line = Value::Object(self.into_json()).to_string();
        line.push('\n');
        line
    }
}
