//! Path helpers shared by the host adapters, the resolver and the pipeline.
//!
//! Everything here is lexical; nothing touches the file system except
//! [`project_root`].

use std::path::{Component, Path, PathBuf};

/// Name of the configuration file looked up by [`project_root`].
pub const CONFIG_FILE: &str = "ngpass.json";

/// Extensions stripped from module paths, longest first.
const SOURCE_EXTENSIONS: &[&str] = &[
    ".d.mts", ".d.cts", ".d.ts", ".tsx", ".mts", ".cts", ".ts", ".jsx", ".mjs", ".cjs", ".js",
];

/// Find the project root by walking up from `cwd` looking for `ngpass.json` or `tsconfig.json`.
///
/// Returns the first directory containing either marker, or `None` if neither is found.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(CONFIG_FILE).exists() || current.join("tsconfig.json").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Resolve `.` and `..` components without consulting the file system.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render a path with forward slashes regardless of platform.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Whether the file is a type declaration file (`.d.ts` and friends).
#[must_use]
pub fn is_declaration_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts")
}

/// Strip a known source extension (`.ts`, `.d.ts`, `.js`, ...) from a path.
///
/// Paths without a known extension are returned unchanged.
#[must_use]
pub fn strip_source_extension(path: &Path) -> PathBuf {
    let rendered = path.to_string_lossy();
    for ext in SOURCE_EXTENSIONS {
        if let Some(stem) = rendered.strip_suffix(ext) {
            if !stem.is_empty() && !stem.ends_with(['/', '\\']) {
                return PathBuf::from(stem);
            }
        }
    }
    path.to_path_buf()
}

/// Compute the path of `to` relative to the directory `from_dir`.
///
/// Both paths are normalized first. When they share no prefix (e.g. different
/// drive prefixes) `to` is returned as-is.
#[must_use]
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from = normalize(from_dir);
    let to = normalize(to);
    let from_parts: Vec<Component<'_>> = from.components().collect();
    let to_parts: Vec<Component<'_>> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 && from.has_root() {
        return to;
    }

    let mut out = PathBuf::new();
    for _ in common..from_parts.len() {
        out.push("..");
    }
    for part in &to_parts[common..] {
        out.push(part.as_os_str());
    }
    out
}

/// Relative path rendered in module-specifier form (`./a/b`, `../c`).
#[must_use]
pub fn dot_relative(from_dir: &Path, to: &Path) -> String {
    let rel = to_slash(&relative_path(from_dir, to));
    if rel.starts_with("../") || rel == ".." {
        rel
    } else {
        format!("./{rel}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_resolves_dots() {
        assert_eq!(
            normalize(Path::new("/p/src/./app/../main.ts")),
            PathBuf::from("/p/src/main.ts")
        );
        assert_eq!(normalize(Path::new("../../a")), PathBuf::from("../../a"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn test_strip_source_extension() {
        assert_eq!(
            strip_source_extension(Path::new("/p/app.module.ts")),
            PathBuf::from("/p/app.module")
        );
        assert_eq!(
            strip_source_extension(Path::new("/p/types.d.ts")),
            PathBuf::from("/p/types")
        );
        assert_eq!(
            strip_source_extension(Path::new("/p/app/index")),
            PathBuf::from("/p/app/index")
        );
    }

    #[test]
    fn test_declaration_file() {
        assert!(is_declaration_file(Path::new("lib.d.ts")));
        assert!(!is_declaration_file(Path::new("app.ts")));
        assert!(!is_declaration_file(Path::new("d.ts.js")));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/p/dist/app"), Path::new("/p/src/app/a.ts")),
            PathBuf::from("../../src/app/a.ts")
        );
        assert_eq!(
            dot_relative(Path::new("/p/src"), Path::new("/p/src/app/app.module")),
            "./app/app.module"
        );
        assert_eq!(dot_relative(Path::new("/p/src/a"), Path::new("/p/src/b")), "../b");
    }

    #[test]
    fn test_project_root_finds_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        let nested = dir.path().join("src").join("app");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(project_root(&nested), Some(dir.path().to_path_buf()));
    }
}
