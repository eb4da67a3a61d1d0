//! The module entry-point trait and lifecycle states.

use std::fmt;

use serde::Serialize;

use crate::context::ModuleContext;
use crate::error::ModuleError;

/// Lifecycle state of a loaded module.
///
/// `Loaded → Enabled → Disabled`. A module whose enable hook fails stays
/// `Loaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Instantiated and load hook completed.
    Loaded,
    /// Enable hook completed; endpoints are live.
    Enabled,
    /// Disable hook ran; instance released.
    Disabled,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loaded => "loaded",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        })
    }
}

/// An add-on module.
///
/// Implementations are registered in a
/// [`ModuleCatalog`](crate::catalog::ModuleCatalog) under the entry-point
/// name their package manifest declares in `main:`. Every hook receives the
/// module's own context; registrations are normally made in
/// [`on_enable`](Self::on_enable).
pub trait Module: Send {
    /// Called once after instantiation.
    fn on_load(&mut self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Called when the host enables modules.
    fn on_enable(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError>;

    /// Called before the module is released.
    fn on_disable(&mut self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }
}
