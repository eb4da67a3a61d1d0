//! Configuration loading and typed config structures for a Simgate host node.
//!
//! The host reads `simgate-host.yaml` from its working directory. This module
//! defines strongly-typed structs that mirror the YAML structure and a loader
//! that reads the file and applies environment overrides. Every section and
//! field has a default, so an empty or partial file is valid.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held a value of the wrong type.
    #[error("invalid value for {name}: {message}")]
    InvalidEnv {
        /// The environment variable name.
        name: String,
        /// Why the value was rejected.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level host node configuration.
///
/// Mirrors the structure of `simgate-host.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Identity of the simulated server.
    #[serde(default)]
    pub server: ServerIdentityConfig,

    /// HTTP API listener.
    #[serde(default)]
    pub http: HttpConfig,

    /// Bridge protocol listener.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Module discovery locations.
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Simulation loop settings.
    #[serde(default)]
    pub simulation: SimulationLoopConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HostConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SIMGATE_HTTP_PORT` overrides `http.port`
    /// - `SIMGATE_BRIDGE_PORT` overrides `bridge.port`
    /// - `SIMGATE_MODULES_DIR` overrides `modules.directory`
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
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides()?;
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = env_port("SIMGATE_HTTP_PORT")? {
            self.http.port = port;
        }
        if let Some(port) = env_port("SIMGATE_BRIDGE_PORT")? {
            self.bridge.port = port;
        }
        if let Ok(dir) = std::env::var("SIMGATE_MODULES_DIR") {
            self.modules.directory = PathBuf::from(dir);
        }
        Ok(())
    }
}

/// Read an optional port number from the environment.
pub fn env_port(name: &str) -> Result<Option<u16>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnv {
                name: name.to_owned(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Identity of the simulated server reported by the `server` and `status`
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerIdentityConfig {
    /// Human-readable server name.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Message of the day.
    #[serde(default = "default_motd")]
    pub motd: String,

    /// Maximum concurrent players.
    #[serde(default = "default_max_players")]
    pub max_players: u32,

    /// Simulation software version string.
    #[serde(default = "default_server_version")]
    pub version: String,
}

impl Default for ServerIdentityConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            motd: default_motd(),
            max_players: default_max_players(),
            version: default_server_version(),
        }
    }
}

/// HTTP API listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Bind address.
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_http_port(),
        }
    }
}

/// Bridge protocol listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    /// Whether the bridge listener is started at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_bridge_port")]
    pub port: u16,

    /// Number of connections served concurrently. Further connections
    /// wait for a free worker.
    #[serde(default = "default_bridge_workers")]
    pub workers: usize,

    /// How long a worker waits for the execution context to run a request.
    #[serde(default = "default_handoff_timeout_ms")]
    pub handoff_timeout_ms: u64,

    /// How long a worker waits for the client to send its request line.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_bind_host(),
            port: default_bridge_port(),
            workers: default_bridge_workers(),
            handoff_timeout_ms: default_handoff_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Module discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModulesConfig {
    /// Directory scanned for module packages at startup.
    #[serde(default = "default_modules_dir")]
    pub directory: PathBuf,

    /// Root under which each module gets a private data directory
    /// (`{data_directory}/{module name}`). Kept apart from the packages so
    /// a data directory is never scanned as a package.
    #[serde(default = "default_module_data_dir")]
    pub data_directory: PathBuf,
}

impl ModulesConfig {
    /// Effective root for per-module data directories.
    pub fn data_root(&self) -> &Path {
        &self.data_directory
    }
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            directory: default_modules_dir(),
            data_directory: default_module_data_dir(),
        }
    }
}

/// Simulation loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationLoopConfig {
    /// Real-time milliseconds between simulation ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for SimulationLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Logging configuration shared by the host and proxy binaries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_server_name() -> String {
    "simgate".to_owned()
}

fn default_motd() -> String {
    "A Simgate simulation host".to_owned()
}

const fn default_max_players() -> u32 {
    20
}

fn default_server_version() -> String {
    "1.0.0".to_owned()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_http_port() -> u16 {
    8080
}

const fn default_bridge_port() -> u16 {
    25599
}

const fn default_bridge_workers() -> usize {
    10
}

const fn default_handoff_timeout_ms() -> u64 {
    30_000
}

const fn default_read_timeout_ms() -> u64 {
    30_000
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_module_data_dir() -> PathBuf {
    PathBuf::from("module-data")
}

const fn default_tick_interval_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
