//! Front-end router for Simgate nodes.
//!
//! Serves `/api/{node}/{endpoint}` by translating the endpoint into a
//! bridge action ([`routing`]), sending it to the node's bridge server and
//! returning the flattened envelope with proxy metadata. Successful GET
//! responses are cached per node.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routing;
pub mod server;
pub mod state;

pub use config::{NodeConfig, ProxyConfig};
pub use error::{ProxyError, ServerError};
pub use router::build_router;
pub use server::{spawn_server, start_server};
pub use state::ProxyState;
