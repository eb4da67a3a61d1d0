//! JSON listing of modules and their endpoints.

use serde_json::{json, Value};

use crate::capability::{JsonObject, Method};
use crate::directory::ModuleDirectory;
use crate::lifecycle::ModuleState;
use crate::registry::EndpointRegistry;

/// Build `{"modules": [...], "count": n}` describing every known module,
/// its data endpoints, action endpoints, and base endpoint enhancements.
pub fn module_listing(directory: &ModuleDirectory, registry: &EndpointRegistry) -> JsonObject {
    let modules: Vec<Value> = directory
        .list()
        .into_iter()
        .map(|summary| {
            let name = summary.name.as_str();

            let data_endpoints: Vec<Value> = registry
                .data_sources_of(name)
                .into_iter()
                .map(|(endpoint, source)| {
                    json!({
                        "endpoint": endpoint,
                        "description": source.description(),
                        "method": Method::Get.as_str(),
                        "path": format!("/api/{name}/{endpoint}"),
                        "parameters": source.supported_parameters(),
                    })
                })
                .collect();

            let action_endpoints: Vec<Value> = registry
                .actions_of(name)
                .into_iter()
                .map(|(endpoint, action)| {
                    let methods: Vec<&str> =
                        action.supported_methods().iter().map(|m| m.as_str()).collect();
                    json!({
                        "endpoint": endpoint,
                        "description": action.description(),
                        "path": format!("/api/{name}/{endpoint}"),
                        "methods": methods,
                    })
                })
                .collect();

            let enhancements: Vec<Value> = registry
                .enhancers_of(name)
                .into_iter()
                .map(|(base, entry)| {
                    json!({
                        "baseEndpoint": base,
                        "description": entry.enhancer.description(),
                        "priority": entry.priority,
                    })
                })
                .collect();

            json!({
                "name": summary.name,
                "version": summary.version,
                "author": summary.author,
                "description": summary.description,
                "state": summary.state,
                "enabled": summary.state == ModuleState::Enabled,
                "package": summary.package,
                "dataEndpoints": data_endpoints,
                "actionEndpoints": action_endpoints,
                "baseEnhancements": enhancements,
            })
        })
        .collect();

    let count = modules.len();
    let mut listing = JsonObject::new();
    listing.insert("modules".to_owned(), Value::Array(modules));
    listing.insert("count".to_owned(), Value::from(count));
    listing
}
