//! Read-only view of loaded modules shared with request handlers.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::lifecycle::ModuleState;
use crate::manifest::Manifest;

/// Public description of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    /// Lowercase module name.
    pub name: String,
    /// Version from the manifest.
    pub version: String,
    /// Author from the manifest.
    pub author: String,
    /// Description from the manifest.
    pub description: String,
    /// Current lifecycle state.
    pub state: ModuleState,
    /// Package directory name.
    pub package: String,
}

impl ModuleSummary {
    /// Build a summary from a manifest.
    pub fn new(manifest: &Manifest, package: &str, state: ModuleState) -> Self {
        Self {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            author: manifest.author.clone(),
            description: manifest.description.clone(),
            state,
            package: package.to_owned(),
        }
    }
}

/// Cloneable handle onto the set of known modules.
///
/// Written only by the [`ModuleLoader`](crate::loader::ModuleLoader).
#[derive(Debug, Clone, Default)]
pub struct ModuleDirectory {
    entries: Arc<DashMap<String, ModuleSummary>>,
}

impl ModuleDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// All modules, sorted by name.
    pub fn list(&self) -> Vec<ModuleSummary> {
        let mut all: Vec<ModuleSummary> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Summary of one module.
    pub fn get(&self, name: &str) -> Option<ModuleSummary> {
        self.entries
            .get(&name.to_lowercase())
            .map(|e| e.value().clone())
    }

    /// Number of known modules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no module is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of modules currently `Enabled`.
    pub fn enabled_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value().state == ModuleState::Enabled)
            .count()
    }

    pub(crate) fn upsert(&self, summary: ModuleSummary) {
        self.entries.insert(summary.name.clone(), summary);
    }

    pub(crate) fn set_state(&self, name: &str, state: ModuleState) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            entry.state = state;
        }
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}
