//! Module package descriptors.
//!
//! A package is a directory holding a `module.yml` (or, failing that, a
//! `plugin.yml`) descriptor. The descriptor is read with a tolerant
//! line-based scan rather than a YAML parser: each line is trimmed, matched
//! against a `key:` prefix, and stripped of quote characters. Unknown keys
//! and malformed lines are ignored.

use std::path::{Path, PathBuf};

use crate::error::ManifestError;

/// Descriptor file names, in lookup order.
pub const MANIFEST_FILES: [&str; 2] = ["module.yml", "plugin.yml"];

/// Parsed module descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Lowercase module name, used in URL paths and as the registry key.
    pub name: String,
    /// Entry point resolved through the module catalog.
    pub main: String,
    /// Module version (default `1.0.0`).
    pub version: String,
    /// Module author (default `Unknown`).
    pub author: String,
    /// Free-form description (default empty).
    pub description: String,
}

impl Manifest {
    /// Resolve the descriptor of the package at `package_dir`.
    ///
    /// Returns `Ok(None)` when the package has no descriptor file.
    pub fn resolve(package_dir: &Path) -> Result<Option<Self>, ManifestError> {
        let Some(path) = find_descriptor(package_dir) else {
            return Ok(None);
        };
        let contents = std::fs::read_to_string(&path).map_err(|source| {
            ManifestError::Unreadable {
                path: path.clone(),
                source,
            }
        })?;
        Self::parse(&contents, &path).map(Some)
    }

    /// Parse descriptor text. `path` is used only for error messages.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ManifestError> {
        let mut name = None;
        let mut main = None;
        let mut version = None;
        let mut author = None;
        let mut description = None;

        for line in contents.lines().map(str::trim) {
            if let Some(value) = field(line, "name:") {
                name = Some(value);
            } else if let Some(value) = field(line, "main:") {
                main = Some(value);
            } else if let Some(value) = field(line, "version:") {
                version = Some(value);
            } else if let Some(value) = field(line, "author:") {
                author = Some(value);
            } else if let Some(value) = field(line, "description:") {
                description = Some(value);
            }
        }

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| missing(path, "name"))?
            .to_lowercase();
        let main = main
            .filter(|m| !m.is_empty())
            .ok_or_else(|| missing(path, "main"))?;

        if !is_valid_name(&name) {
            return Err(ManifestError::InvalidName { name });
        }

        Ok(Self {
            name,
            main,
            version: version
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "1.0.0".to_owned()),
            author: author
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| "Unknown".to_owned()),
            description: description.unwrap_or_default(),
        })
    }
}

fn find_descriptor(package_dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILES
        .iter()
        .map(|file| package_dir.join(file))
        .find(|candidate| candidate.is_file())
}

fn field(line: &str, prefix: &str) -> Option<String> {
    line.strip_prefix(prefix)
        .map(|rest| rest.trim().replace(['"', '\''], ""))
}

fn missing(path: &Path, key: &'static str) -> ManifestError {
    ManifestError::MissingKey {
        path: path.to_path_buf(),
        key,
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Manifest, ManifestError> {
        Manifest::parse(text, Path::new("module.yml"))
    }

    #[test]
    fn parses_all_fields_and_strips_quotes() {
        let manifest = parse(
            "  name: \"Economy\"\nmain: 'economy::Plugin'\nversion: 2.1.0\nauthor: \"Jo\"\ndescription: It's \"money\"\n",
        )
        .unwrap();
        assert_eq!(
            manifest,
            Manifest {
                name: "economy".to_owned(),
                main: "economy::Plugin".to_owned(),
                version: "2.1.0".to_owned(),
                author: "Jo".to_owned(),
                description: "Its money".to_owned(),
            }
        );
    }

    #[test]
    fn applies_defaults_for_optional_keys() {
        let manifest = parse("name: stats\nmain: stats").unwrap();
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.author, "Unknown");
        assert_eq!(manifest.description, "");
    }

    #[test]
    fn ignores_unknown_and_malformed_lines() {
        let manifest =
            parse("# comment\n: nothing\nname: ok\nfoo bar baz\nmain: ok\ndepend: [x]\n").unwrap();
        assert_eq!(manifest.name, "ok");
        assert_eq!(manifest.main, "ok");
    }

    #[test]
    fn rejects_missing_required_keys() {
        assert!(matches!(
            parse("main: x"),
            Err(ManifestError::MissingKey { key: "name", .. })
        ));
        assert!(matches!(
            parse("name: x\nmain:   "),
            Err(ManifestError::MissingKey { key: "main", .. })
        ));
    }

    #[test]
    fn rejects_names_unusable_in_paths() {
        assert!(matches!(
            parse("name: my module\nmain: x"),
            Err(ManifestError::InvalidName { .. })
        ));
    }

    #[test]
    fn resolve_prefers_module_yml_then_plugin_yml() {
        let dir = tempfile::tempdir().unwrap();

        assert!(Manifest::resolve(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join("plugin.yml"), "name: legacy\nmain: legacy\n").unwrap();
        let legacy = Manifest::resolve(dir.path()).unwrap().unwrap();
        assert_eq!(legacy.name, "legacy");

        std::fs::write(dir.path().join("module.yml"), "name: modern\nmain: modern\n").unwrap();
        let modern = Manifest::resolve(dir.path()).unwrap().unwrap();
        assert_eq!(modern.name, "modern");
    }

    #[test]
    fn resolve_reports_non_utf8_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("module.yml"), [0xff_u8, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            Manifest::resolve(dir.path()),
            Err(ManifestError::Unreadable { .. })
        ));
    }
}
