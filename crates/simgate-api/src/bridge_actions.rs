//! Bridge action table of a host node.
//!
//! Maps bridge actions onto the same [`Gateway`] the HTTP API uses:
//!
//! | action | data |
//! |--------|------|
//! | `server`, `players`, `worlds`, `messages`, `status`, `modules` | `{params?}` |
//! | `player` | `{identifier, params?}` |
//! | `world` | `{worldName, params?}` |
//! | `send-message` | `{body}` or the message fields directly |
//! | `module` | `{moduleName, endpointName, method?, params?, body?}` |
//!
//! `params` is an object whose values are stringified. The `status` action
//! additionally reports `mode: "proxy"` and `communication: "tcp"`.

use serde_json::Value;
use simgate_bridge::{ActionTable, HandlerError};
use simgate_core::state::SimulationState;
use simgate_modules::{JsonObject, Method, Params};

use crate::error::ApiError;
use crate::gateway::{BaseCall, BaseEndpoint, Gateway, ModuleCall};

/// Bridge action that runs a module endpoint.
pub const MODULE_ACTION: &str = "module";

/// [`ActionTable`] backed by a [`Gateway`].
#[derive(Debug, Clone)]
pub struct BridgeActions {
    gateway: Gateway,
}

impl BridgeActions {
    /// Create the table.
    pub const fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }
}

fn params_of(data: &JsonObject) -> Params {
    let Some(Value::Object(raw)) = data.get("params") else {
        return Params::new();
    };
    raw.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

fn string_field(data: &JsonObject, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn body_of(data: &JsonObject) -> Option<JsonObject> {
    match data.get("body") {
        Some(Value::Object(body)) => Some(body.clone()),
        _ => None,
    }
}

fn module_call(data: &JsonObject) -> Result<ModuleCall, ApiError> {
    let module = string_field(data, "moduleName")
        .ok_or_else(|| ApiError::BadRequest("Missing moduleName".to_owned()))?;
    let endpoint = string_field(data, "endpointName")
        .ok_or_else(|| ApiError::BadRequest("Missing endpointName".to_owned()))?;
    let method = match data.get("method").and_then(Value::as_str) {
        Some(raw) => raw
            .parse::<Method>()
            .map_err(|e| ApiError::MethodNotAllowed(format!("Method not allowed: {e}")))?,
        None => Method::Get,
    };
    let body = if method.carries_body() { body_of(data) } else { None };
    Ok(ModuleCall {
        module,
        endpoint,
        method,
        params: params_of(data),
        body,
    })
}

impl ActionTable for BridgeActions {
    fn contains(&self, action: &str) -> bool {
        action == MODULE_ACTION || BaseEndpoint::from_name(action).is_some()
    }

    fn execute(
        &self,
        action: &str,
        data: &JsonObject,
        world: &mut SimulationState,
    ) -> Result<JsonObject, HandlerError> {
        if action == MODULE_ACTION {
            let call = module_call(data)?;
            return Ok(self.gateway.module_endpoint(&call, world)?);
        }

        let endpoint = BaseEndpoint::from_name(action)
            .ok_or_else(|| HandlerError::bad_request(format!("Unknown action: {action}")))?;
        let identifier = match endpoint {
            BaseEndpoint::Player => string_field(data, "identifier"),
            BaseEndpoint::World => string_field(data, "worldName"),
            _ => None,
        };
        let body = match endpoint {
            BaseEndpoint::SendMessage => Some(body_of(data).unwrap_or_else(|| data.clone())),
            _ => None,
        };
        let call = BaseCall {
            identifier,
            params: params_of(data),
            body,
        };

        let mut response = self.gateway.base(endpoint, &call, world)?;
        if endpoint == BaseEndpoint::Status {
            response.insert("mode".to_owned(), Value::String("proxy".to_owned()));
            response.insert("communication".to_owned(), Value::String("tcp".to_owned()));
        }
        Ok(response)
    }
}
