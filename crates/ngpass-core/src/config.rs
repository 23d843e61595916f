use crate::error::Error;
use crate::passes::PassSelection;
use crate::paths::normalize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration, read from `ngpass.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Project root; module ids and names are relative to it.
    pub root_dir: PathBuf,

    /// File holding the bootstrap call.
    pub main: Option<PathBuf>,

    /// Explicit `<module>#<Symbol>` entry; skips resolution when set.
    pub entry_module: Option<String>,

    /// Where emitted JavaScript goes.
    pub out_dir: Option<PathBuf>,

    pub passes: PassSelection,

    /// Rewrite CommonJS outputs as `goog.module`s.
    pub googmodule: bool,

    /// Add a `module` shim for ES5 outputs.
    pub es5_mode: bool,

    /// Path prefixes whose warnings are dropped.
    pub ignore_warnings: Vec<PathBuf>,

    /// Path prefixes the passes leave untouched.
    pub skip_paths: Vec<PathBuf>,

    /// Where to write the aggregated externs.
    pub externs_out: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            main: None,
            entry_module: None,
            out_dir: None,
            passes: PassSelection::default(),
            googmodule: true,
            es5_mode: false,
            ignore_warnings: Vec::new(),
            skip_paths: Vec::new(),
            externs_out: None,
        }
    }
}

impl Config {
    /// Create a config rooted at `root_dir`.
    #[must_use]
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            ..Default::default()
        }
    }

    /// Read a config file. Relative paths in it are resolved against the
    /// file's directory.
    ///
    /// # Errors
    /// Returns `ConfigRead` if the file cannot be read and `ConfigParse` if
    /// it is not valid config JSON.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or(Path::new("."));
        Ok(config.resolve_paths(base))
    }

    /// Make every relative path absolute against `base`.
    #[must_use]
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |p: &Path| normalize(&base.join(p));
        self.root_dir = resolve(&self.root_dir);
        self.main = self.main.as_deref().map(resolve);
        self.out_dir = self.out_dir.as_deref().map(resolve);
        self.externs_out = self.externs_out.as_deref().map(resolve);
        self.ignore_warnings = self.ignore_warnings.iter().map(|p| resolve(p)).collect();
        self.skip_paths = self.skip_paths.iter().map(|p| resolve(p)).collect();
        self
    }

    /// Set the main file.
    #[must_use]
    pub fn with_main(mut self, main: PathBuf) -> Self {
        self.main = Some(main);
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_out_dir(mut self, out_dir: PathBuf) -> Self {
        self.out_dir = Some(out_dir);
        self
    }

    /// Set the pass selection.
    #[must_use]
    pub fn with_passes(mut self, passes: PassSelection) -> Self {
        self.passes = passes;
        self
    }

    /// Enable or disable module wrapping.
    #[must_use]
    pub fn with_googmodule(mut self, googmodule: bool) -> Self {
        self.googmodule = googmodule;
        self
    }

    /// Enable or disable ES5 mode.
    #[must_use]
    pub fn with_es5_mode(mut self, es5_mode: bool) -> Self {
        self.es5_mode = es5_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ngpass.json");
        std::fs::write(
            &path,
            r#"{
                "main": "src/main.ts",
                "outDir": "dist",
                "passes": { "closurize": false },
                "es5Mode": true,
                "skipPaths": ["node_modules"]
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        let root = normalize(dir.path());
        assert_eq!(config.root_dir, root);
        assert_eq!(config.main, Some(root.join("src/main.ts")));
        assert_eq!(config.out_dir, Some(root.join("dist")));
        assert_eq!(config.skip_paths, vec![root.join("node_modules")]);
        assert!(config.passes.downlevel_decorators);
        assert!(!config.passes.closurize);
        assert!(config.googmodule);
        assert!(config.es5_mode);
        assert!(config.entry_module.is_none());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = Config::load(&missing).unwrap_err();
        assert_eq!(err.code(), "NGPASS_CONFIG_READ");

        let bad = dir.path().join("ngpass.json");
        std::fs::write(&bad, "{ \"main\": 42 }").unwrap();
        let err = Config::load(&bad).unwrap_err();
        assert_eq!(err.code(), "NGPASS_CONFIG_PARSE");
    }

    #[test]
    fn test_builders() {
        let config = Config::new(PathBuf::from("/p"))
            .with_main(PathBuf::from("/p/src/main.ts"))
            .with_googmodule(false)
            .with_es5_mode(true);
        assert_eq!(config.root_dir, PathBuf::from("/p"));
        assert!(!config.googmodule);
        assert!(config.es5_mode);
    }
}
