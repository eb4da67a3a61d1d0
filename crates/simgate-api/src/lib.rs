//! HTTP API for Simgate host nodes.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Base endpoints** (`/api/server`, `/api/players`, `/api/player/{id}`,
//!   `/api/worlds`, `/api/world/{name}`, `/api/messages`,
//!   `/api/send-message`, `/api/status`, `/api/modules`)
//! - **Module endpoints** (`/api/{module}/{endpoint}`) backed by the data
//!   sources and actions modules register
//!
//! plus the [`BridgeActions`] table that answers the same requests over the
//! cross-node bridge.
//!
//! # Architecture
//!
//! The live simulation state belongs to the execution context thread.
//! Handlers post closures to it and wait; the [`Gateway`] renders base
//! endpoints and runs the enhancer pipeline on that thread, so enhancers
//! always see a consistent state.

pub mod base;
pub mod bridge_actions;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use bridge_actions::BridgeActions;
pub use error::ApiError;
pub use gateway::{BaseCall, BaseEndpoint, Gateway, ModuleCall};
pub use router::build_router;
pub use server::{ServerError, spawn_server};
pub use state::AppState;
