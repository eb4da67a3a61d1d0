//! Entry-point catalog.
//!
//! Packages name their entry point with `main:`. The catalog maps that
//! string to a factory compiled into the host, so each loaded module is a
//! fresh instance with its own context and no state shared with other
//! modules.

use std::collections::BTreeMap;

use crate::lifecycle::Module;

/// Constructor for a module instance.
pub type ModuleFactory = fn() -> Box<dyn Module>;

/// Entry points available to module packages.
#[derive(Debug, Default, Clone)]
pub struct ModuleCatalog {
    factories: BTreeMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `entry_point` available. Replaces any earlier factory with the
    /// same name.
    pub fn register(&mut self, entry_point: &str, factory: ModuleFactory) -> &mut Self {
        self.factories.insert(entry_point.to_owned(), factory);
        self
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, entry_point: &str, factory: ModuleFactory) -> Self {
        self.register(entry_point, factory);
        self
    }

    /// Instantiate the module for `entry_point`.
    pub fn instantiate(&self, entry_point: &str) -> Option<Box<dyn Module>> {
        self.factories.get(entry_point).map(|factory| factory())
    }

    /// Registered entry-point names.
    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
