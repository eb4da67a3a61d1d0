//! Shared application state for the host HTTP API.

use simgate_core::ContextHandle;

use crate::gateway::Gateway;

/// Shared state held by the router.
///
/// Handlers never touch the simulation directly: they post closures to the
/// execution context through `context` and render with `gateway` there.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle onto the execution context.
    pub context: ContextHandle,
    /// Endpoint dispatch.
    pub gateway: Gateway,
}

impl AppState {
    /// Create the state.
    pub const fn new(context: ContextHandle, gateway: Gateway) -> Self {
        Self { context, gateway }
    }
}
