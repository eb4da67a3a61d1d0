//! Per-module YAML configuration.
//!
//! Each module owns `config.yml` in its private data directory. A
//! `config.yml` bundled in the module package supplies defaults: a dotted
//! path missing from the module's file falls back to the bundled value.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_yml::{Mapping, Value};
use tracing::warn;

use crate::error::ModuleError;

/// File name of a module's configuration, both bundled and saved.
pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Default)]
struct Documents {
    current: Value,
    defaults: Value,
}

/// Accessor for a module's configuration file.
#[derive(Debug)]
pub struct ModuleConfig {
    path: PathBuf,
    defaults_path: PathBuf,
    documents: RwLock<Documents>,
}

impl ModuleConfig {
    /// Open the configuration for a module. Missing files are treated as
    /// empty documents; malformed ones are an error.
    pub fn open(data_dir: &Path, package_dir: &Path) -> Result<Self, ModuleError> {
        let config = Self {
            path: data_dir.join(CONFIG_FILE),
            defaults_path: package_dir.join(CONFIG_FILE),
            documents: RwLock::new(Documents::default()),
        };
        config.reload()?;
        Ok(config)
    }

    /// Path of the module's own config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read both the module's file and the bundled defaults from disk.
    pub fn reload(&self) -> Result<(), ModuleError> {
        let current = read_document(&self.path)?;
        let defaults = read_document(&self.defaults_path)?;
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        documents.current = current;
        documents.defaults = defaults;
        Ok(())
    }

    /// Write the current values to the module's config file.
    pub fn save(&self) -> Result<(), ModuleError> {
        let text = {
            let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
            serde_yml::to_string(&documents.current)
                .map_err(|e| ModuleError::Resource(format!("cannot serialize config: {e}")))?
        };
        std::fs::write(&self.path, text).map_err(|e| {
            ModuleError::Resource(format!("cannot write {}: {e}", self.path.display()))
        })
    }

    /// Raw value at a dotted path, falling back to the bundled defaults.
    pub fn get(&self, path: &str) -> Option<Value> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        lookup(&documents.current, path)
            .or_else(|| lookup(&documents.defaults, path))
            .cloned()
    }

    /// Typed value at a dotted path. A value of the wrong type is logged
    /// and treated as absent.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.get(path)?;
        match serde_yml::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(path, error = %e, "Config value has unexpected type, using default");
                None
            }
        }
    }

    /// Typed value at a dotted path, or `default`.
    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get_as(path).unwrap_or(default)
    }

    /// Set a value at a dotted path, creating intermediate mappings.
    /// The change is in memory until [`save`](Self::save).
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        set_path(&mut documents.current, path, value.into());
    }
}

fn read_document(path: &Path) -> Result<Value, ModuleError> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(Value::Mapping(Mapping::new())),
        Ok(text) => serde_yml::from_str(&text)
            .map_err(|e| ModuleError::Resource(format!("invalid {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Mapping(Mapping::new())),
        Err(e) => Err(ModuleError::Resource(format!(
            "cannot read {}: {e}",
            path.display()
        ))),
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, segment| node.get(segment))
}

fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(map) = current else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(Value::String(segment.to_owned()), value);
            return;
        }
        if !map.contains_key(segment) {
            map.insert(Value::String(segment.to_owned()), Value::Null);
        }
        let Some(next) = map.get_mut(segment) else {
            return;
        };
        current = next;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dirs() -> (tempfile::TempDir, tempfile::TempDir) {
        (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap())
    }

    #[test]
    fn falls_back_to_bundled_defaults() {
        let (data, package) = dirs();
        std::fs::write(
            package.path().join(CONFIG_FILE),
            "greeting: hello\nlimits:\n  max: 5\n  min: 1\n",
        )
        .unwrap();
        std::fs::write(data.path().join(CONFIG_FILE), "limits:\n  max: 9\n").unwrap();

        let config = ModuleConfig::open(data.path(), package.path()).unwrap();

        assert_eq!(config.get_as::<i64>("limits.max"), Some(9));
        assert_eq!(config.get_as::<i64>("limits.min"), Some(1));
        assert_eq!(config.get_as::<String>("greeting"), Some("hello".to_owned()));
        assert_eq!(config.get("limits.nothing"), None);
    }

    #[test]
    fn wrong_type_yields_default() {
        let (data, package) = dirs();
        std::fs::write(data.path().join(CONFIG_FILE), "count: many\n").unwrap();
        let config = ModuleConfig::open(data.path(), package.path()).unwrap();
        assert_eq!(config.get_or("count", 3_i64), 3);
    }

    #[test]
    fn set_save_reload_round_trip() {
        let (data, package) = dirs();
        let config = ModuleConfig::open(data.path(), package.path()).unwrap();

        config.set("storage.backend", "memory");
        config.set("storage.size", 64_u64);
        config.save().unwrap();

        let reopened = ModuleConfig::open(data.path(), package.path()).unwrap();
        assert_eq!(
            reopened.get_as::<String>("storage.backend"),
            Some("memory".to_owned())
        );
        assert_eq!(reopened.get_as::<u64>("storage.size"), Some(64));
    }

    #[test]
    fn set_replaces_scalar_with_mapping() {
        let mut root = Value::from("scalar");
        set_path(&mut root, "a.b", Value::from(1));
        assert_eq!(lookup(&root, "a.b"), Some(&Value::from(1)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (data, package) = dirs();
        std::fs::write(data.path().join(CONFIG_FILE), "a: [unterminated").unwrap();
        assert!(ModuleConfig::open(data.path(), package.path()).is_err());
    }
}
