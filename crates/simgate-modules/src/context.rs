//! The per-module context handed to lifecycle hooks.
//!
//! A [`ModuleContext`] is the module's only window onto the host: a
//! `tracing` span scoped to the module, a private data directory, a
//! configuration accessor, and registration methods that always register
//! under the module's own name.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{info, info_span, warn, Span};

use crate::capability::{Action, DataSource, Enhancer};
use crate::config::{ModuleConfig, CONFIG_FILE};
use crate::error::ModuleError;
use crate::registry::EndpointRegistry;

/// Everything a module may touch.
#[derive(Debug)]
pub struct ModuleContext {
    name: String,
    span: Span,
    package_dir: PathBuf,
    data_dir: PathBuf,
    config: Arc<ModuleConfig>,
    registry: Arc<EndpointRegistry>,
}

impl ModuleContext {
    /// Build a context. `data_dir` must already exist.
    pub fn new(
        name: &str,
        package_dir: PathBuf,
        data_dir: PathBuf,
        registry: Arc<EndpointRegistry>,
    ) -> Result<Self, ModuleError> {
        let config = ModuleConfig::open(&data_dir, &package_dir)?;
        Ok(Self {
            name: name.to_owned(),
            span: info_span!("module", module = %name),
            package_dir,
            data_dir,
            config: Arc::new(config),
            registry,
        })
    }

    /// The module's lowercase name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Span under which all of this module's logging should be emitted.
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// The package directory the module was loaded from.
    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// The module's private data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The module's configuration.
    pub const fn config(&self) -> &Arc<ModuleConfig> {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Registration (always under this module's name)
    // -----------------------------------------------------------------------

    /// Register a data source at `/api/{module}/{endpoint}`.
    pub fn register_data_source(&self, endpoint: &str, source: impl DataSource + 'static) -> bool {
        let _guard = self.span.enter();
        self.registry
            .register_data_source(&self.name, endpoint, Arc::new(source))
    }

    /// Register an action at `/api/{module}/{endpoint}`.
    pub fn register_action(&self, endpoint: &str, action: impl Action + 'static) -> bool {
        let _guard = self.span.enter();
        self.registry
            .register_action(&self.name, endpoint, Arc::new(action))
    }

    /// Register an enhancer for a base endpoint. Always succeeds.
    pub fn register_enhancer(&self, base_endpoint: &str, enhancer: impl Enhancer + 'static) {
        let _guard = self.span.enter();
        self.registry
            .register_enhancer(&self.name, base_endpoint, Arc::new(enhancer));
    }

    /// Remove one of this module's data sources.
    pub fn unregister_data_source(&self, endpoint: &str) -> bool {
        self.registry.unregister_data_source(&self.name, endpoint)
    }

    /// Remove one of this module's actions.
    pub fn unregister_action(&self, endpoint: &str) -> bool {
        self.registry.unregister_action(&self.name, endpoint)
    }

    /// Remove all of this module's enhancers for a base endpoint.
    pub fn unregister_enhancers(&self, base_endpoint: &str) -> usize {
        self.registry.unregister_enhancers(base_endpoint, &self.name)
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// Copy `resource` from the package directory into the data directory.
    ///
    /// An existing target is left alone unless `replace` is set. Paths must
    /// be relative and may not climb out of the package.
    pub fn save_resource(&self, resource: &str, replace: bool) -> Result<(), ModuleError> {
        let relative = Path::new(resource);
        if resource.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ModuleError::Resource(format!(
                "invalid resource path '{resource}'"
            )));
        }

        let source = self.package_dir.join(relative);
        if !source.is_file() {
            return Err(ModuleError::Resource(format!(
                "resource '{resource}' not found in package"
            )));
        }

        let target = self.data_dir.join(relative);
        let _guard = self.span.enter();
        if target.exists() && !replace {
            warn!(resource, "Resource already exists, not replacing");
            return Ok(());
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ModuleError::Resource(format!("cannot create {}: {e}", parent.display())))?;
        }
        std::fs::copy(&source, &target)
            .map_err(|e| ModuleError::Resource(format!("cannot copy '{resource}': {e}")))?;
        info!(resource, "Saved resource");
        Ok(())
    }

    /// Copy the bundled `config.yml` into the data directory if it is not
    /// already there, then reload the configuration.
    pub fn save_default_config(&self) -> Result<(), ModuleError> {
        if self.package_dir.join(CONFIG_FILE).is_file() {
            self.save_resource(CONFIG_FILE, false)?;
        }
        self.config.reload()
    }
}
