//! Host node binary for Simgate.
//!
//! Wires together the execution context that owns the live simulation
//! state, the module system, the HTTP API, and the bridge server, then runs
//! until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `simgate-host.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Seed the simulation state and start the execution context
//! 4. Load and enable modules
//! 5. Start the HTTP API
//! 6. Start the bridge server (when enabled)
//! 7. Wait for `Ctrl-C`, drain the bridge, disable modules, stop the context

mod error;
mod example;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use simgate_api::{AppState, BridgeActions, Gateway};
use simgate_core::{ExecutionContext, HostConfig, SimulationState};
use simgate_modules::{EndpointRegistry, ModuleCatalog, ModuleLoader};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::HostError;

/// Default configuration file, relative to the working directory.
const CONFIG_FILE: &str = "simgate-host.yaml";

/// Application entry point for a host node.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = HostConfig::load_or_default(Path::new(CONFIG_FILE)).map_err(HostError::from)?;

    // 2. Initialize structured logging.
    simgate_core::init_tracing(&config.logging);
    info!(
        server_name = %config.server.name,
        http_port = config.http.port,
        bridge_port = config.bridge.port,
        bridge_enabled = config.bridge.enabled,
        modules_dir = %config.modules.directory.display(),
        "simgate-host starting"
    );

    // 3. Seed state and start the execution context.
    let state = SimulationState::with_default_worlds(config.server.clone());
    let context = ExecutionContext::spawn(
        state,
        Duration::from_millis(config.simulation.tick_interval_ms),
        Duration::from_millis(config.bridge.handoff_timeout_ms),
    )
    .map_err(HostError::from)?;

    // 4. Load and enable modules.
    let catalog = ModuleCatalog::new().with(example::ENTRY_POINT, example::create);
    let registry = Arc::new(EndpointRegistry::new());
    let mut loader = ModuleLoader::new(
        catalog,
        Arc::clone(&registry),
        config.modules.data_root().to_path_buf(),
    );
    let report = loader
        .load_all(&config.modules.directory)
        .map_err(HostError::from)?;
    let enabled = loader.enable_all();
    info!(
        loaded = report.loaded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        enabled = enabled.enabled.len(),
        enable_failed = enabled.failed.len(),
        "Modules ready"
    );

    // 5. Start the HTTP API.
    let gateway = Gateway::new(registry, loader.directory());
    let app_state = Arc::new(AppState::new(context.handle(), gateway.clone()));
    let (http_handle, http_addr) = simgate_api::spawn_server(&config.http, app_state)
        .await
        .map_err(HostError::from)?;
    info!(%http_addr, "HTTP API started");

    // 6. Start the bridge server.
    let bridge = if config.bridge.enabled {
        let table = Arc::new(BridgeActions::new(gateway));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let stopped = async move {
            let _ = stop_rx.await;
        };
        let (handle, bridge_addr) =
            simgate_bridge::spawn_bridge(&config.bridge, context.handle(), table, stopped)
                .await
                .map_err(|e| HostError::Bridge {
                    message: e.to_string(),
                })?;
        info!(%bridge_addr, "Bridge server started");
        Some((handle, stop_tx))
    } else {
        warn!("Bridge server disabled by configuration");
        None
    };

    // 7. Run until interrupted.
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| HostError::Signal { source })?;
    info!("Shutdown requested");

    http_handle.abort();
    if let Some((handle, stop_tx)) = bridge {
        // Connections already accepted are answered before the context stops.
        let _ = stop_tx.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "Bridge server task failed during shutdown");
        }
    }
    loader.disable_all();

    let final_state = context.shutdown().map_err(HostError::from)?;
    info!(
        total_ticks = final_state.tick,
        messages = final_state.messages.len(),
        "simgate-host shutdown complete"
    );

    Ok(())
}
