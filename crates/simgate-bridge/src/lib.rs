//! Cross-node bridge protocol.
//!
//! A caller node asks a named backend node to run a named action over a
//! plain TCP connection carrying exactly one newline-terminated JSON request
//! and one correlated JSON response. On the backend, the action runs on the
//! single execution context that owns the live simulation state.
//!
//! - [`envelope`] defines the request and response envelopes
//! - [`server`] accepts connections and dispatches to an [`ActionTable`]
//! - [`client`] performs one exchange with a backend node
//! - [`cache`] memoizes responses on the caller side

pub mod cache;
pub mod client;
pub mod envelope;
pub mod error;
pub mod server;

pub use cache::{ResponseCache, cache_key};
pub use client::BridgeClient;
pub use envelope::{BridgeRequest, BridgeResponse, JsonObject};
pub use error::{BridgeError, HandlerError};
pub use server::{ActionTable, BridgeServer, BridgeSettings, spawn_bridge};
