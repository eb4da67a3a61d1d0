//! Capability traits implemented by modules.
//!
//! A module contributes three kinds of capability:
//!
//! - [`DataSource`]: read-only, served at `GET /api/{module}/{endpoint}`
//! - [`Action`]: write-capable, served at `POST|PUT|DELETE /api/{module}/{endpoint}`
//! - [`Enhancer`]: appends fields to a built-in base endpoint response
//!
//! Capabilities are invoked on the execution context thread, which is why
//! every request type borrows the live [`SimulationState`] directly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use simgate_core::state::SimulationState;

use crate::error::CapabilityError;

/// Query parameters of a request, sorted by key.
pub type Params = BTreeMap<String, String>;

/// A JSON object.
pub type JsonObject = Map<String, Value>;

/// Priority assigned to an enhancer that does not choose one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// HTTP method of a module endpoint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// Read from a data source.
    Get,
    /// Create via an action.
    Post,
    /// Update via an action.
    Put,
    /// Delete via an action.
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a request with this method may carry a JSON body.
    pub const fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a method name outside [`Method`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UnsupportedMethod(s.to_owned())),
        }
    }
}

/// Input to [`DataSource::fetch`].
#[derive(Debug, Clone, Copy)]
pub struct DataRequest<'a> {
    /// Query parameters.
    pub params: &'a Params,
    /// Live simulation state (read-only).
    pub world: &'a SimulationState,
}

/// Input to [`Action::execute`].
#[derive(Debug)]
pub struct ActionRequest<'a> {
    /// The request method (never [`Method::Get`]).
    pub method: Method,
    /// Query parameters.
    pub params: &'a Params,
    /// JSON body, when the request carried one.
    pub body: Option<&'a JsonObject>,
    /// Live simulation state.
    pub world: &'a mut SimulationState,
}

/// Input to [`Enhancer::enhance`] besides the two response objects.
#[derive(Debug, Clone, Copy)]
pub struct EnhanceRequest<'a> {
    /// Path identifier of the base endpoint (`player/{id}`, `world/{name}`).
    pub identifier: Option<&'a str>,
    /// Query parameters.
    pub params: &'a Params,
    /// Live simulation state (read-only).
    pub world: &'a SimulationState,
}

/// Read-only endpoint contributed by a module.
pub trait DataSource: Send + Sync {
    /// Produce the `data` payload for a GET request.
    fn fetch(&self, request: &DataRequest<'_>) -> Result<Value, CapabilityError>;

    /// Human-readable description for the module listing.
    fn description(&self) -> &str;

    /// Query parameters the endpoint understands.
    fn supported_parameters(&self) -> &[&'static str] {
        &[]
    }
}

/// Write-capable endpoint contributed by a module.
pub trait Action: Send + Sync {
    /// Run the action. `Ok(None)` is reported as `{"success": true}`.
    fn execute(&self, request: ActionRequest<'_>) -> Result<Option<JsonObject>, CapabilityError>;

    /// Methods this action accepts.
    fn supported_methods(&self) -> &[Method];

    /// Human-readable description for the module listing.
    fn description(&self) -> &str;

    /// Whether `method` is accepted.
    fn supports(&self, method: Method) -> bool {
        self.supported_methods().contains(&method)
    }
}

/// Adds fields to a base endpoint response.
pub trait Enhancer: Send + Sync {
    /// Add or overwrite top-level fields of `response`.
    ///
    /// `original` is the response as produced by the base endpoint, before
    /// any enhancer ran.
    fn enhance(
        &self,
        response: &mut JsonObject,
        original: &JsonObject,
        request: &EnhanceRequest<'_>,
    ) -> Result<(), CapabilityError>;

    /// Human-readable description for the module listing.
    fn description(&self) -> &str;

    /// Lower priorities run first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }
}
