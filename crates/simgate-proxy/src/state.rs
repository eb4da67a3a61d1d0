//! Shared state for the proxy's HTTP handlers.

use std::time::Duration;

use simgate_bridge::{BridgeClient, ResponseCache};

use crate::config::ProxyConfig;

/// State shared by every proxy handler.
#[derive(Debug, Clone)]
pub struct ProxyState {
    /// Loaded configuration, including the node table.
    pub config: ProxyConfig,
    /// Client used to reach node bridges.
    pub client: BridgeClient,
    /// Cache of successful GET responses per node.
    pub cache: ResponseCache,
}

impl ProxyState {
    /// Build the client and cache from `config`.
    pub fn new(config: ProxyConfig) -> Self {
        let client = BridgeClient::new(
            Duration::from_millis(config.client.connect_timeout_ms),
            Duration::from_millis(config.client.request_timeout_ms),
        );
        let cache = ResponseCache::new(config.cache.ttl());
        Self {
            config,
            client,
            cache,
        }
    }
}
