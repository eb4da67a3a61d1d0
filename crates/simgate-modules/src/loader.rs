//! Module discovery and lifecycle.
//!
//! # Loading
//!
//! [`ModuleLoader::load_all`] scans the modules directory once. Each
//! sub-directory is a candidate package:
//!
//! 1. Resolve its manifest. No descriptor: skip with a warning.
//! 2. A module with the same name already loaded: skip (first wins).
//! 3. Instantiate the entry point from the [`ModuleCatalog`].
//! 4. Create the private data directory and the [`ModuleContext`].
//! 5. Run the load hook.
//!
//! A failure at any step aborts only that candidate, and anything it
//! registered during its load hook is removed again.
//!
//! # Isolation
//!
//! A loaded module is its instance plus its context. Both are owned by the
//! loader and dropped together when the module is disabled, at which point
//! every registration owned by the module is purged from the registry.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::catalog::ModuleCatalog;
use crate::context::ModuleContext;
use crate::directory::{ModuleDirectory, ModuleSummary};
use crate::error::{panic_message, LoadError, ModuleError};
use crate::lifecycle::{Module, ModuleState};
use crate::manifest::Manifest;
use crate::registry::EndpointRegistry;

/// Why a candidate package was skipped without being an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The package has no `module.yml` or `plugin.yml`.
    NoManifest,
    /// A module with this name is already loaded.
    Duplicate {
        /// The conflicting module name.
        name: String,
    },
}

/// A candidate that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    /// The package directory.
    pub package: PathBuf,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// A candidate that failed to load.
#[derive(Debug)]
pub struct FailedCandidate {
    /// The package directory.
    pub package: PathBuf,
    /// What went wrong.
    pub error: LoadError,
}

/// Outcome of [`ModuleLoader::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names of modules that reached `Loaded`, in scan order.
    pub loaded: Vec<String>,
    /// Candidates skipped with a warning.
    pub skipped: Vec<SkippedCandidate>,
    /// Candidates that failed.
    pub failed: Vec<FailedCandidate>,
}

/// Outcome of [`ModuleLoader::enable_all`].
#[derive(Debug, Default)]
pub struct EnableReport {
    /// Modules that reached `Enabled`.
    pub enabled: Vec<String>,
    /// Modules whose enable hook failed; they remain `Loaded`.
    pub failed: Vec<(String, ModuleError)>,
}

struct LoadedModule {
    manifest: Manifest,
    state: ModuleState,
    instance: Box<dyn Module>,
    context: ModuleContext,
}

enum Candidate {
    Loaded(String),
    Skipped(SkipReason),
}

/// Owns every loaded module and drives its lifecycle.
pub struct ModuleLoader {
    catalog: ModuleCatalog,
    registry: Arc<EndpointRegistry>,
    directory: ModuleDirectory,
    data_root: PathBuf,
    modules: BTreeMap<String, LoadedModule>,
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("data_root", &self.data_root)
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ModuleLoader {
    /// Create a loader. Each module's data directory is
    /// `data_root/{module name}`.
    pub fn new(catalog: ModuleCatalog, registry: Arc<EndpointRegistry>, data_root: PathBuf) -> Self {
        Self {
            catalog,
            registry,
            directory: ModuleDirectory::new(),
            data_root,
            modules: BTreeMap::new(),
        }
    }

    /// The registry modules register into.
    pub const fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Shared read-only view of module summaries.
    pub fn directory(&self) -> ModuleDirectory {
        self.directory.clone()
    }

    /// Current state of a module, if it is held by the loader.
    pub fn state(&self, name: &str) -> Option<ModuleState> {
        self.modules.get(&name.to_lowercase()).map(|m| m.state)
    }

    /// Number of modules held by the loader.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module is held.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load every package under `directory`.
    ///
    /// A missing directory is created and yields an empty report. Only a
    /// failure to list the directory is returned as an error; per-candidate
    /// failures are collected in the report.
    pub fn load_all(&mut self, directory: &Path) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        if !directory.exists() {
            std::fs::create_dir_all(directory).map_err(|source| LoadError::Scan {
                path: directory.to_path_buf(),
                source,
            })?;
            info!(path = %directory.display(), "Created modules directory");
            return Ok(report);
        }

        let entries = std::fs::read_dir(directory).map_err(|source| LoadError::Scan {
            path: directory.to_path_buf(),
            source,
        })?;
        let mut packages: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        packages.sort();

        if packages.is_empty() {
            info!(path = %directory.display(), "No modules found");
            return Ok(report);
        }
        info!(count = packages.len(), "Loading module packages");

        for package in packages {
            match self.load_candidate(&package) {
                Ok(Candidate::Loaded(name)) => report.loaded.push(name),
                Ok(Candidate::Skipped(reason)) => {
                    report.skipped.push(SkippedCandidate { package, reason });
                }
                Err(e) => {
                    error!(package = %package.display(), error = %e, "Failed to load module");
                    report.failed.push(FailedCandidate { package, error: e });
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Module loading complete"
        );
        Ok(report)
    }

    fn load_candidate(&mut self, package_dir: &Path) -> Result<Candidate, LoadError> {
        let Some(manifest) = Manifest::resolve(package_dir)? else {
            warn!(package = %package_dir.display(), "No module manifest found, skipping");
            return Ok(Candidate::Skipped(SkipReason::NoManifest));
        };

        if self.modules.contains_key(&manifest.name) {
            warn!(
                module = %manifest.name,
                package = %package_dir.display(),
                "Module already loaded, skipping"
            );
            return Ok(Candidate::Skipped(SkipReason::Duplicate {
                name: manifest.name,
            }));
        }

        let instance =
            self.catalog
                .instantiate(&manifest.main)
                .ok_or_else(|| LoadError::UnknownEntryPoint {
                    module: manifest.name.clone(),
                    entry_point: manifest.main.clone(),
                })?;

        let data_dir = self.data_root.join(&manifest.name);
        std::fs::create_dir_all(&data_dir).map_err(|source| LoadError::DataDirectory {
            path: data_dir.clone(),
            source,
        })?;

        let context = ModuleContext::new(
            &manifest.name,
            package_dir.to_path_buf(),
            data_dir,
            Arc::clone(&self.registry),
        )
        .map_err(|source| LoadError::Config {
            module: manifest.name.clone(),
            source,
        })?;

        let mut module = LoadedModule {
            manifest,
            state: ModuleState::Loaded,
            instance,
            context,
        };

        if let Err(source) = run_hook(&module.context, || module.instance.on_load(&module.context)) {
            self.registry.unregister_owner(&module.manifest.name);
            return Err(LoadError::LoadHook {
                module: module.manifest.name,
                source,
            });
        }

        let name = module.manifest.name.clone();
        let package = package_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.directory
            .upsert(ModuleSummary::new(&module.manifest, &package, ModuleState::Loaded));
        info!(
            module = %name,
            version = %module.manifest.version,
            author = %module.manifest.author,
            "Loaded module"
        );
        self.modules.insert(name.clone(), module);
        Ok(Candidate::Loaded(name))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Run the enable hook of every `Loaded` module.
    ///
    /// A failing hook leaves the module `Loaded`; anything it registered
    /// before failing stays registered.
    pub fn enable_all(&mut self) -> EnableReport {
        let mut report = EnableReport::default();
        for (name, module) in &mut self.modules {
            if module.state != ModuleState::Loaded {
                continue;
            }
            match run_hook(&module.context, || module.instance.on_enable(&module.context)) {
                Ok(()) => {
                    module.state = ModuleState::Enabled;
                    self.directory.set_state(name, ModuleState::Enabled);
                    info!(module = %name, "Enabled module");
                    report.enabled.push(name.clone());
                }
                Err(e) => {
                    error!(module = %name, error = %e, "Failed to enable module");
                    report.failed.push((name.clone(), e));
                }
            }
        }
        report
    }

    /// Disable one module: run its disable hook if it was enabled, purge
    /// its registrations, and release it. Returns `false` if no such module
    /// is held.
    pub fn disable(&mut self, name: &str) -> bool {
        let key = name.to_lowercase();
        let Some(mut module) = self.modules.remove(&key) else {
            return false;
        };
        disable_module(&key, &mut module);
        self.registry.unregister_owner(&key);
        self.directory.set_state(&key, ModuleState::Disabled);
        true
    }

    /// Disable every module, release all of them, and clear the registry
    /// and directory.
    pub fn disable_all(&mut self) {
        for (name, module) in &mut self.modules {
            disable_module(name, module);
        }
        let released = self.modules.len();
        self.modules.clear();
        self.registry.clear();
        self.directory.clear();
        info!(released, "All modules disabled");
    }
}

fn disable_module(name: &str, module: &mut LoadedModule) {
    if module.state == ModuleState::Enabled {
        match run_hook(&module.context, || module.instance.on_disable(&module.context)) {
            Ok(()) => info!(module = %name, "Disabled module"),
            Err(e) => error!(module = %name, error = %e, "Error disabling module"),
        }
    }
    module.state = ModuleState::Disabled;
}

fn run_hook(
    ctx: &ModuleContext,
    hook: impl FnOnce() -> Result<(), ModuleError>,
) -> Result<(), ModuleError> {
    let _guard = ctx.span().enter();
    catch_unwind(AssertUnwindSafe(hook))
        .unwrap_or_else(|payload| Err(ModuleError::Panicked(panic_message(payload.as_ref()))))
}
