//! Error types for module loading, lifecycle hooks, and capabilities.
//!
//! Every failure here is contained to a single module or a single
//! capability invocation. None of them is allowed to take the host down.

use std::path::PathBuf;

/// Why a manifest could not be read.
///
/// A package with no descriptor at all is *not* an error; see
/// [`Manifest::resolve`](crate::manifest::Manifest::resolve).
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The descriptor exists but could not be read (permissions, not UTF-8).
    #[error("unreadable manifest {path}: {source}")]
    Unreadable {
        /// Path of the descriptor file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A required key (`name` or `main`) is missing or empty.
    #[error("manifest {path} is missing required key '{key}'")]
    MissingKey {
        /// Path of the descriptor file.
        path: PathBuf,
        /// The missing key.
        key: &'static str,
    },

    /// The module name cannot be used as a URL path segment.
    #[error("invalid module name '{name}': only a-z, 0-9, '-' and '_' are allowed")]
    InvalidName {
        /// The rejected name (already lowercased).
        name: String,
    },
}

/// Why a single module candidate failed to load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The descriptor could not be resolved.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The manifest's entry point is not in the module catalog.
    #[error("unknown entry point '{entry_point}' for module '{module}'")]
    UnknownEntryPoint {
        /// Module name from the manifest.
        module: String,
        /// The `main:` value that matched nothing.
        entry_point: String,
    },

    /// The private data directory could not be created.
    #[error("cannot create data directory {path}: {source}")]
    DataDirectory {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The module's configuration could not be opened.
    #[error("invalid configuration for '{module}': {source}")]
    Config {
        /// Module name.
        module: String,
        /// The config error.
        source: ModuleError,
    },

    /// The module's load hook failed.
    #[error("load hook failed for '{module}': {source}")]
    LoadHook {
        /// Module name.
        module: String,
        /// The hook's error.
        source: ModuleError,
    },

    /// The modules directory itself could not be listed.
    #[error("cannot scan modules directory {path}: {source}")]
    Scan {
        /// The modules directory.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Error returned by a module's lifecycle hooks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// The hook reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The hook panicked; the panic was contained.
    #[error("hook panicked: {0}")]
    Panicked(String),

    /// A module resource could not be copied or its config written.
    #[error("resource error: {0}")]
    Resource(String),
}

/// Error returned by a data source, action, or enhancer.
///
/// Each variant maps to the HTTP/bridge status reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The requested entity does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// The request was malformed (400).
    #[error("{0}")]
    BadRequest(String),

    /// The capability failed (500).
    #[error("{0}")]
    Failed(String),
}

impl CapabilityError {
    /// The status code reported for this error.
    pub const fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::BadRequest(_) => 400,
            Self::Failed(_) => 500,
        }
    }
}

/// Render a panic payload as a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
