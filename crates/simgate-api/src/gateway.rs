//! Endpoint dispatch shared by HTTP and the bridge.
//!
//! A [`Gateway`] resolves a request to a base endpoint or a module
//! endpoint and produces its JSON document. Every method takes the live
//! state and therefore runs on the execution context thread; callers reach
//! it through [`ContextHandle::submit`](simgate_core::ContextHandle::submit).

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use simgate_core::state::SimulationState;
use simgate_modules::{
    ActionRequest, DataRequest, EndpointRegistry, EnhanceRequest, JsonObject, Method,
    ModuleDirectory, Params, module_listing,
};
use tracing::debug;

use crate::base;
use crate::error::ApiError;

/// A built-in endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEndpoint {
    /// `GET /api/server`
    Server,
    /// `GET /api/players`
    Players,
    /// `GET /api/player/{id}`
    Player,
    /// `GET /api/worlds`
    Worlds,
    /// `GET /api/world/{name}`
    World,
    /// `GET /api/messages`
    Messages,
    /// `POST /api/send-message`
    SendMessage,
    /// `GET /api/status`
    Status,
    /// `GET /api/modules`
    Modules,
}

impl BaseEndpoint {
    /// Every base endpoint.
    pub const ALL: [Self; 9] = [
        Self::Server,
        Self::Players,
        Self::Player,
        Self::Worlds,
        Self::World,
        Self::Messages,
        Self::SendMessage,
        Self::Status,
        Self::Modules,
    ];

    /// Name used in paths, bridge actions, and enhancer registrations.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Players => "players",
            Self::Player => "player",
            Self::Worlds => "worlds",
            Self::World => "world",
            Self::Messages => "messages",
            Self::SendMessage => "send-message",
            Self::Status => "status",
            Self::Modules => "modules",
        }
    }

    /// Look up an endpoint by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    /// Whether responses pass through the enhancer pipeline.
    pub const fn is_enhanced(self) -> bool {
        !matches!(self, Self::SendMessage | Self::Modules)
    }
}

impl fmt::Display for BaseEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs of a base endpoint call.
#[derive(Debug, Clone, Default)]
pub struct BaseCall {
    /// Path identifier (`player/{id}`, `world/{name}`).
    pub identifier: Option<String>,
    /// Query parameters.
    pub params: Params,
    /// JSON body (`send-message`).
    pub body: Option<JsonObject>,
}

/// Inputs of a module endpoint call.
#[derive(Debug, Clone)]
pub struct ModuleCall {
    /// Module name.
    pub module: String,
    /// Endpoint name within the module.
    pub endpoint: String,
    /// Request method.
    pub method: Method,
    /// Query parameters.
    pub params: Params,
    /// JSON body, for methods that carry one.
    pub body: Option<JsonObject>,
}

/// Resolves and renders endpoints against the live state.
#[derive(Debug, Clone)]
pub struct Gateway {
    registry: Arc<EndpointRegistry>,
    directory: ModuleDirectory,
}

impl Gateway {
    /// Create a gateway over a module registry and directory.
    pub const fn new(registry: Arc<EndpointRegistry>, directory: ModuleDirectory) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// The endpoint registry.
    pub const fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// The module directory.
    pub const fn directory(&self) -> &ModuleDirectory {
        &self.directory
    }

    /// Render a base endpoint and run its enhancers.
    pub fn base(
        &self,
        endpoint: BaseEndpoint,
        call: &BaseCall,
        world: &mut SimulationState,
    ) -> Result<JsonObject, ApiError> {
        let identifier = call.identifier.as_deref();
        let original = match endpoint {
            BaseEndpoint::Server => base::server(world),
            BaseEndpoint::Players => base::players(world),
            BaseEndpoint::Player => base::player(world, required(identifier, "identifier")?)?,
            BaseEndpoint::Worlds => base::worlds(world),
            BaseEndpoint::World => base::world(world, required(identifier, "worldName")?)?,
            BaseEndpoint::Messages => base::messages(world, &call.params)?,
            BaseEndpoint::SendMessage => {
                let empty = JsonObject::new();
                base::send_message(world, call.body.as_ref().unwrap_or(&empty))?
            }
            BaseEndpoint::Status => base::status(world, self.directory.enabled_count()),
            BaseEndpoint::Modules => module_listing(&self.directory, &self.registry),
        };

        if !endpoint.is_enhanced() {
            return Ok(original);
        }
        let request = EnhanceRequest {
            identifier,
            params: &call.params,
            world,
        };
        Ok(self
            .registry
            .enhance(endpoint.name(), &original, &request)
            .into_owned())
    }

    /// Run a module endpoint.
    ///
    /// `GET` reads a data source and answers `{data, module, endpoint,
    /// timestamp}`. Other methods run an action and answer its result (or
    /// `{"success": true}`) tagged with `extension`, `endpoint` and
    /// `method`. An endpoint that exists only for other methods yields
    /// 405; an unknown one 404.
    pub fn module_endpoint(
        &self,
        call: &ModuleCall,
        world: &mut SimulationState,
    ) -> Result<JsonObject, ApiError> {
        let ModuleCall {
            module,
            endpoint,
            method,
            params,
            body,
        } = call;
        let method = *method;

        if method == Method::Get {
            let Some(source) = self.registry.data_source(module, endpoint) else {
                return Err(self.missing(module, endpoint, method));
            };
            debug!(module = %module, endpoint = %endpoint, "Fetching module data source");
            let data = source.fetch(&DataRequest { params, world })?;
            let mut response = JsonObject::new();
            response.insert("data".to_owned(), data);
            response.insert("module".to_owned(), Value::String(module.clone()));
            response.insert("endpoint".to_owned(), Value::String(endpoint.clone()));
            response.insert(
                "timestamp".to_owned(),
                Value::from(Utc::now().timestamp_millis()),
            );
            return Ok(response);
        }

        let Some(action) = self.registry.action(module, endpoint) else {
            return Err(self.missing(module, endpoint, method));
        };
        if !action.supports(method) {
            return Err(method_not_allowed(method));
        }
        debug!(module = %module, endpoint = %endpoint, %method, "Executing module action");
        let result = action.execute(ActionRequest {
            method,
            params,
            body: body.as_ref(),
            world,
        })?;

        let mut response = result.unwrap_or_else(|| {
            let mut ok = JsonObject::new();
            ok.insert("success".to_owned(), Value::Bool(true));
            ok
        });
        response.insert("extension".to_owned(), Value::String(module.clone()));
        response.insert("endpoint".to_owned(), Value::String(endpoint.clone()));
        response.insert("method".to_owned(), Value::String(method.to_string()));
        Ok(response)
    }

    fn missing(&self, module: &str, endpoint: &str, method: Method) -> ApiError {
        let other_kind_exists = if method == Method::Get {
            self.registry.action(module, endpoint).is_some()
        } else {
            self.registry.data_source(module, endpoint).is_some()
        };
        if other_kind_exists {
            method_not_allowed(method)
        } else {
            ApiError::NotFound(format!("Endpoint not found: {module}/{endpoint}"))
        }
    }
}

fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(format!("Method {method} not allowed"))
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {name}")))
}
