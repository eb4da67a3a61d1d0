//! Configuration for the proxy.
//!
//! Read from `simgate-proxy.yaml`. Every section has defaults, so a missing
//! or partial file is valid.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use simgate_core::config::env_port;
use simgate_core::{ConfigError, LoggingConfig};
use tracing::warn;

/// Bridge port assumed for nodes that do not configure one.
pub const DEFAULT_BRIDGE_PORT: u16 = 25599;

/// Top-level proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyConfig {
    /// Listener and identity of the proxy.
    #[serde(default)]
    pub proxy: ProxyServerConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Bridge client timeouts.
    #[serde(default)]
    pub client: ClientConfig,

    /// Bridge port used when a node does not configure one.
    #[serde(default = "default_bridge_port")]
    pub default_bridge_port: u16,

    /// Backend nodes by name.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyServerConfig::default(),
            cache: CacheConfig::default(),
            client: ClientConfig::default(),
            default_bridge_port: default_bridge_port(),
            nodes: BTreeMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

const fn default_bridge_port() -> u16 {
    DEFAULT_BRIDGE_PORT
}

impl ProxyConfig {
    /// Load configuration from a YAML file.
    ///
    /// `SIMGATE_PROXY_PORT` overrides `proxy.port`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply environment overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        if let Some(port) = env_port("SIMGATE_PROXY_PORT")? {
            config.proxy.port = port;
        }
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Self::parse("")
        }
    }

    /// `host:port` of the bridge on `node`, or `None` for an unknown node.
    ///
    /// Nodes without a `bridge_port` use [`default_bridge_port`](Self::default_bridge_port).
    pub fn bridge_address(&self, node: &str) -> Option<String> {
        let config = self.nodes.get(node)?;
        let port = config.bridge_port.unwrap_or_else(|| {
            warn!(
                node,
                port = self.default_bridge_port,
                "No bridge port configured for node, using default"
            );
            self.default_bridge_port
        });
        Some(format!("{}:{port}", config.host))
    }
}

/// Listener and identity of the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyServerConfig {
    /// Name reported as `proxy_server` / `proxy_name`.
    #[serde(default = "default_proxy_name")]
    pub name: String,

    /// Address to bind the HTTP listener to.
    #[serde(default = "default_proxy_host")]
    pub host: String,

    /// HTTP port.
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

impl Default for ProxyServerConfig {
    fn default() -> Self {
        Self {
            name: default_proxy_name(),
            host: default_proxy_host(),
            port: default_proxy_port(),
        }
    }
}

fn default_proxy_name() -> String {
    "simgate-proxy".to_owned()
}

fn default_proxy_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_proxy_port() -> u16 {
    8081
}

/// Response cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Time to live of a cached response, in seconds.
    #[serde(default = "default_cache_seconds")]
    pub ttl_seconds: u64,

    /// Interval between sweeps of expired entries, in seconds.
    #[serde(default = "default_cache_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_seconds(),
            sweep_interval_seconds: default_cache_seconds(),
        }
    }
}

impl CacheConfig {
    /// TTL as a [`Duration`].
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Sweep interval as a [`Duration`]; never zero.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

const fn default_cache_seconds() -> u64 {
    300
}

/// Bridge client timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Timeout for the whole exchange in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

/// One backend node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    /// Host running the node's bridge server.
    #[serde(default = "default_node_host")]
    pub host: String,

    /// Bridge port of the node.
    #[serde(default)]
    pub bridge_port: Option<u16>,
}

fn default_node_host() -> String {
    "127.0.0.1".to_owned()
}
