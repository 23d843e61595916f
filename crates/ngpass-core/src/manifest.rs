//! Output files and the Closure modules they define and require.

use crate::paths::to_slash;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// What one output file defines and requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub module_name: String,
    pub referenced_modules: BTreeSet<String>,
}

/// Output path to module name and referenced modules.
///
/// Adding a module for a path that is already present replaces its entry,
/// so a repeated run overwrites rather than accumulates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ModuleManifest {
    entries: BTreeMap<PathBuf, ManifestEntry>,
}

impl ModuleManifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `file_name` defines `module_name`.
    pub fn add_module(&mut self, file_name: PathBuf, module_name: String) {
        self.entries.insert(
            file_name,
            ManifestEntry {
                module_name,
                referenced_modules: BTreeSet::new(),
            },
        );
    }

    /// Record that `file_name` requires `module_name`.
    pub fn add_referenced_module(&mut self, file_name: &Path, module_name: String) {
        if let Some(entry) = self.entries.get_mut(file_name) {
            entry.referenced_modules.insert(module_name);
        }
    }

    /// Every defined module name.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.module_name.as_str())
    }

    /// Every output file name.
    pub fn file_names(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// The output file defining `module_name`.
    #[must_use]
    pub fn file_name_for_module(&self, module_name: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(_, e)| e.module_name == module_name)
            .map(|(path, _)| path.as_path())
    }

    /// Modules required by `file_name`; empty for unknown files.
    pub fn referenced_modules(&self, file_name: &Path) -> impl Iterator<Item = &str> {
        self.entries
            .get(file_name)
            .into_iter()
            .flat_map(|e| e.referenced_modules.iter().map(String::as_str))
    }

    #[must_use]
    pub fn entry(&self, file_name: &Path) -> Option<&ManifestEntry> {
        self.entries.get(file_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `<module> <file>` line per file, followed by one indented line
    /// per required module.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, entry) in &self.entries {
            let _ = writeln!(out, "{} {}", entry.module_name, to_slash(path));
            for referenced in &entry.referenced_modules {
                let _ = writeln!(out, "  {referenced}");
            }
        }
        out
    }
}
