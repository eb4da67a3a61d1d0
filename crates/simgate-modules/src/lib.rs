//! Module system for Simgate host nodes.
//!
//! Add-on modules extend the HTTP API in two ways: they register their own
//! endpoints (data sources and actions, served under `/api/{module}/...`),
//! and they enhance the responses of built-in base endpoints such as
//! `server` or `players` by appending fields.
//!
//! - [`manifest`]: tolerant parsing of `module.yml` / `plugin.yml`
//! - [`catalog`]: entry points compiled into the host
//! - [`loader`]: discovery and the `Loaded → Enabled → Disabled` lifecycle
//! - [`context`]: the per-module [`ModuleContext`] (span, data dir, config,
//!   scoped registration)
//! - [`registry`]: the concurrency-safe [`EndpointRegistry`]
//! - [`pipeline`]: priority-ordered enhancer composition
//! - [`listing`]: the `/api/modules` document
//!
//! # Concurrency
//!
//! The registry is read from HTTP and bridge workers while modules may
//! register or unregister. Per-module maps are [`dashmap::DashMap`]s;
//! enhancer lists are copy-on-write snapshots, so a request iterates a
//! stable list without holding any lock.

pub mod capability;
pub mod catalog;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod listing;
pub mod loader;
pub mod manifest;
pub mod pipeline;
pub mod registry;

pub use capability::{
    Action, ActionRequest, DataRequest, DataSource, EnhanceRequest, Enhancer, JsonObject, Method,
    Params, DEFAULT_PRIORITY,
};
pub use catalog::{ModuleCatalog, ModuleFactory};
pub use context::ModuleContext;
pub use directory::{ModuleDirectory, ModuleSummary};
pub use error::{CapabilityError, LoadError, ManifestError, ModuleError};
pub use lifecycle::{Module, ModuleState};
pub use listing::module_listing;
pub use loader::{LoadReport, ModuleLoader};
pub use manifest::Manifest;
pub use registry::EndpointRegistry;
