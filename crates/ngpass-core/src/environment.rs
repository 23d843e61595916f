//! Per-project policy consulted by the passes and the pipeline.
//!
//! An [`Environment`] decides which files are left alone, where warnings
//! are dropped, and how file paths turn into Closure module names.

use crate::config::Config;
use crate::paths::{is_declaration_file, normalize, relative_path, strip_source_extension, to_slash};
use std::path::{Path, PathBuf};

/// Project policy for a transform run.
pub trait Environment {
    /// Whether both passes return `path` untouched.
    fn should_skip(&self, path: &Path) -> bool;

    /// Whether only error diagnostics are kept for `path`.
    fn should_ignore_warnings(&self, path: &Path) -> bool;

    /// Closure module name for `import_path` as written in the file `context`.
    ///
    /// Relative imports resolve against `context`'s directory. An absolute
    /// `import_path` ignores `context`.
    fn path_to_module_name(&self, context: &Path, import_path: &str) -> String;

    /// Module id used by ES5 output: the file path relative to the root.
    fn file_name_to_module_id(&self, path: &Path) -> String;
}

/// [`Environment`] built from a project's directories and path lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEnvironment {
    root_dir: PathBuf,
    out_dir: Option<PathBuf>,
    skip_paths: Vec<PathBuf>,
    ignore_warnings: Vec<PathBuf>,
}

impl ProjectEnvironment {
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: normalize(&root_dir.into()),
            out_dir: None,
            skip_paths: Vec::new(),
            ignore_warnings: Vec::new(),
        }
    }

    /// Environment for a loaded config. Paths are expected to be resolved already.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let env = Self::new(&config.root_dir)
            .with_skip_paths(config.skip_paths.clone())
            .with_ignore_warnings(config.ignore_warnings.clone());
        match &config.out_dir {
            Some(out_dir) => env.with_out_dir(out_dir),
            None => env,
        }
    }

    /// Set the output directory. Output files are named relative to it.
    #[must_use]
    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(normalize(&out_dir.into()));
        self
    }

    /// Set the path prefixes excluded from processing.
    #[must_use]
    pub fn with_skip_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.skip_paths = paths.iter().map(|p| normalize(p)).collect();
        self
    }

    /// Set the path prefixes whose warnings are dropped.
    #[must_use]
    pub fn with_ignore_warnings(mut self, paths: Vec<PathBuf>) -> Self {
        self.ignore_warnings = paths.iter().map(|p| normalize(p)).collect();
        self
    }

    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    #[must_use]
    pub fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }

    /// Directory module names are relative to.
    fn naming_base(&self, path: &Path) -> &Path {
        match &self.out_dir {
            Some(out_dir) if path.starts_with(out_dir) => out_dir,
            _ => &self.root_dir,
        }
    }
}

/// Turn a slash-separated, extensionless path into a dotted module name.
///
/// Characters outside `[A-Za-z0-9_$]` become `_`, and a segment starting
/// with a digit gets a `_` prefix. `..` segments become `__`.
fn sanitize_module_name(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(|segment| {
            if segment == ".." {
                return "__".to_string();
            }
            let mut out: String = segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            if out.starts_with(|c: char| c.is_ascii_digit()) {
                out.insert(0, '_');
            }
            out
        })
        .collect::<Vec<_>>()
        .join(".")
}

impl Environment for ProjectEnvironment {
    fn should_skip(&self, path: &Path) -> bool {
        self.skip_paths.iter().any(|prefix| path.starts_with(prefix))
            || (is_declaration_file(path) && !path.starts_with(&self.root_dir))
    }

    fn should_ignore_warnings(&self, path: &Path) -> bool {
        self.ignore_warnings.iter().any(|prefix| path.starts_with(prefix))
    }

    fn path_to_module_name(&self, context: &Path, import_path: &str) -> String {
        let import = Path::new(import_path);
        let resolved = if import.is_absolute() {
            normalize(import)
        } else if import_path.starts_with('.') {
            normalize(&context.parent().unwrap_or(Path::new("")).join(import))
        } else {
            // bare package specifier
            return sanitize_module_name(&to_slash(&strip_source_extension(import)));
        };
        let relative = relative_path(self.naming_base(&resolved), &resolved);
        sanitize_module_name(&to_slash(&strip_source_extension(&relative)))
    }

    fn file_name_to_module_id(&self, path: &Path) -> String {
        to_slash(&relative_path(&self.root_dir, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> ProjectEnvironment {
        ProjectEnvironment::new("/p")
            .with_out_dir("/p/dist")
            .with_skip_paths(vec![PathBuf::from("/p/src/vendor")])
            .with_ignore_warnings(vec![PathBuf::from("/p/src/legacy")])
    }

    #[test]
    fn test_skip_policy() {
        let env = env();
        assert!(env.should_skip(Path::new("/p/src/vendor/lib.ts")));
        assert!(env.should_skip(Path::new("/elsewhere/types/index.d.ts")));
        assert!(!env.should_skip(Path::new("/p/src/typings.d.ts")));
        assert!(!env.should_skip(Path::new("/p/src/app.ts")));
        assert!(env.should_ignore_warnings(Path::new("/p/src/legacy/old.ts")));
        assert!(!env.should_ignore_warnings(Path::new("/p/src/app.ts")));
    }

    #[test]
    fn test_module_names() {
        let env = env();
        assert_eq!(
            env.path_to_module_name(Path::new(""), "/p/dist/app/app.module.js"),
            "app.app_module"
        );
        assert_eq!(
            env.path_to_module_name(Path::new("/p/dist/app/main.js"), "./app.component"),
            "app.app_component"
        );
        assert_eq!(
            env.path_to_module_name(Path::new("/p/dist/app/main.js"), "../shared/util.js"),
            "shared.util"
        );
        // outside the output directory names are rooted at the project
        assert_eq!(
            env.path_to_module_name(Path::new(""), "/p/src/3d/view.ts"),
            "src._3d.view"
        );
        assert_eq!(env.path_to_module_name(Path::new(""), "@angular/core"), "_angular.core");
    }

    #[test]
    fn test_module_id_is_root_relative() {
        assert_eq!(
            env().file_name_to_module_id(Path::new("/p/dist/app/main.js")),
            "dist/app/main.js"
        );
    }
}
