//! Error types for the host binary.
//!
//! [`HostError`] wraps every failure mode of host startup so `main` can
//! propagate with `?`.

/// Top-level error for the host binary.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: simgate_core::ConfigError,
    },

    /// The execution context could not be started or stopped.
    #[error("execution context error: {source}")]
    Context {
        /// The underlying context error.
        #[from]
        source: simgate_core::ContextError,
    },

    /// The modules directory could not be scanned.
    #[error("module error: {source}")]
    Modules {
        /// The underlying load error.
        #[from]
        source: simgate_modules::LoadError,
    },

    /// The HTTP API server failed to start.
    #[error("HTTP server error: {source}")]
    Http {
        /// The underlying server error.
        #[from]
        source: simgate_api::ServerError,
    },

    /// The bridge server failed to start.
    #[error("bridge error: {message}")]
    Bridge {
        /// Description of the bridge failure.
        message: String,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
