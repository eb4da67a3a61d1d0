//! Proxy binary for Simgate.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `simgate-proxy.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the bridge client and response cache
//! 4. Start the cache sweeper
//! 5. Serve HTTP until the process is terminated

use std::path::Path;
use std::sync::Arc;

use simgate_proxy::{ProxyConfig, ProxyState};
use tracing::info;

/// Default configuration file, relative to the working directory.
const CONFIG_FILE: &str = "simgate-proxy.yaml";

/// Application entry point for the proxy.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the server
/// fails to start.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = ProxyConfig::load_or_default(Path::new(CONFIG_FILE))?;

    // 2. Initialize structured logging.
    simgate_core::init_tracing(&config.logging);
    info!(
        proxy_name = %config.proxy.name,
        port = config.proxy.port,
        nodes = config.nodes.len(),
        cache_ttl_secs = config.cache.ttl_seconds,
        "simgate-proxy starting"
    );

    // 3. Build shared state.
    let sweep_interval = config.cache.sweep_interval();
    let state = Arc::new(ProxyState::new(config));

    // 4. Start the cache sweeper.
    let sweeper = state.cache.spawn_sweeper(sweep_interval);

    // 5. Serve.
    let result = simgate_proxy::start_server(state).await;
    sweeper.abort();
    result?;

    Ok(())
}
