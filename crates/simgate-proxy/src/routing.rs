//! Mapping from proxied endpoint paths to bridge actions.
//!
//! | endpoint | action | extra data |
//! |----------|--------|------------|
//! | `player/{id}` | `player` | `identifier` |
//! | `world/{name}` | `world` | `worldName` |
//! | `module/{module}/{endpoint}` | `module` | `moduleName`, `endpointName` |
//! | anything else | first path segment | |
//!
//! Every request additionally carries `endpoint` and `method`, the query
//! string under `params`, and for `POST`/`PUT` the JSON body under `body`.

use std::collections::BTreeMap;

use serde_json::Value;
use simgate_bridge::JsonObject;

/// A proxied request translated into a bridge action.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeCall {
    /// Action name sent in the envelope.
    pub action: String,
    /// `data` object sent in the envelope.
    pub data: JsonObject,
}

/// Whether `method` forwards its request body.
pub fn carries_body(method: &str) -> bool {
    method.eq_ignore_ascii_case("POST") || method.eq_ignore_ascii_case("PUT")
}

/// Translate `endpoint` (the path after `/api/{node}/`) into a bridge call.
pub fn route(
    endpoint: &str,
    method: &str,
    params: &BTreeMap<String, String>,
    body: Option<JsonObject>,
) -> BridgeCall {
    let mut data = JsonObject::new();
    data.insert("endpoint".to_owned(), Value::String(endpoint.to_owned()));
    data.insert("method".to_owned(), Value::String(method.to_owned()));

    if !params.is_empty() {
        let params = params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        data.insert("params".to_owned(), Value::Object(params));
    }
    if carries_body(method)
        && let Some(body) = body
    {
        data.insert("body".to_owned(), Value::Object(body));
    }

    let action = if let Some(identifier) = endpoint.strip_prefix("player/") {
        data.insert("identifier".to_owned(), Value::String(identifier.to_owned()));
        "player"
    } else if let Some(name) = endpoint.strip_prefix("world/") {
        data.insert("worldName".to_owned(), Value::String(name.to_owned()));
        "world"
    } else if let Some((module, name)) = endpoint
        .strip_prefix("module/")
        .and_then(|rest| rest.split_once('/'))
    {
        data.insert("moduleName".to_owned(), Value::String(module.to_owned()));
        data.insert("endpointName".to_owned(), Value::String(name.to_owned()));
        "module"
    } else {
        endpoint.split('/').next().unwrap_or(endpoint)
    };

    BridgeCall {
        action: action.to_owned(),
        data,
    }
}
