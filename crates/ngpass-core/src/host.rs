//! File-system access for the resolver and the pipeline.
//!
//! Everything that touches source files goes through [`CompilerHost`].
//! Each method has a provided implementation that forwards to the host
//! returned by [`CompilerHost::delegate`], so a wrapping adapter overrides
//! only the methods it changes. [`DiskHost`] and [`MemoryHost`] are the two
//! leaf adapters.
//!
//! ## Module resolution
//!
//! Only relative (`./a`, `../b`) and absolute specifiers are resolved. The
//! probe order is: the path as written if it names a source file, then
//! `.ts`, `.tsx`, `.d.ts`, then a directory. A directory is returned as-is;
//! callers that need a file use [`resolve_source_file`] to step into its
//! `index.ts`.

use crate::error::Error;
use crate::paths::normalize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions probed after an extensionless specifier, in order.
const PROBE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".d.ts"];

/// Index files probed inside a directory, in order.
const INDEX_FILES: &[&str] = &["index.ts", "index.tsx", "index.d.ts"];

/// Source-file access consumed by the resolver and the transform pipeline.
pub trait CompilerHost {
    /// The wrapped host that provided methods forward to.
    fn delegate(&self) -> Option<&dyn CompilerHost> {
        None
    }

    /// Mutable access to the wrapped host, used by [`CompilerHost::write_file`].
    fn delegate_mut(&mut self) -> Option<&mut dyn CompilerHost> {
        None
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.delegate().is_some_and(|host| host.file_exists(path))
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.delegate().is_some_and(|host| host.is_directory(path))
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        self.delegate().and_then(|host| host.read_file(path))
    }

    /// Canonical form of a path, used as the key for every per-file table.
    fn canonical_file_name(&self, path: &Path) -> PathBuf {
        match self.delegate() {
            Some(host) => host.canonical_file_name(path),
            None => normalize(path),
        }
    }

    /// Resolve `specifier` as written in `containing_file` to an absolute path.
    ///
    /// Returns `None` when the specifier cannot be resolved.
    fn resolve_module(&self, specifier: &str, containing_file: &Path) -> Option<PathBuf> {
        match self.delegate() {
            Some(host) => host.resolve_module(specifier, containing_file),
            None => probe_module(self, specifier, containing_file),
        }
    }

    /// Write an output file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    fn write_file(&mut self, path: &Path, text: &str) -> Result<(), Error> {
        match self.delegate_mut() {
            Some(host) => host.write_file(path, text),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("host cannot write {}", path.display()),
            ))),
        }
    }
}

/// Whether a specifier is resolved by path probing.
fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

/// Default resolution: relative and absolute specifiers only.
pub fn probe_module<H: CompilerHost + ?Sized>(
    host: &H,
    specifier: &str,
    containing_file: &Path,
) -> Option<PathBuf> {
    if !is_path_specifier(specifier) {
        return None;
    }
    let dir = containing_file.parent().unwrap_or(Path::new("."));
    let base = normalize(&dir.join(specifier));
    let rendered = base.to_string_lossy().into_owned();

    if PROBE_EXTENSIONS.iter().any(|ext| rendered.ends_with(ext)) && host.file_exists(&base) {
        return Some(base);
    }
    // `./a.js` written against `a.ts`
    if let Some(stem) = rendered.strip_suffix(".js") {
        let candidate = PathBuf::from(format!("{stem}.ts"));
        if host.file_exists(&candidate) {
            return Some(candidate);
        }
    }
    for ext in PROBE_EXTENSIONS {
        let candidate = PathBuf::from(format!("{rendered}{ext}"));
        if host.file_exists(&candidate) {
            return Some(candidate);
        }
    }
    if host.is_directory(&base) {
        return Some(base);
    }
    None
}

/// Map a resolved module path to the source file that holds it.
///
/// Files are returned unchanged; a directory maps to its index file, or
/// `None` when it has none.
pub fn resolve_source_file<H: CompilerHost + ?Sized>(host: &H, path: &Path) -> Option<PathBuf> {
    if host.is_directory(path) {
        return INDEX_FILES
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| host.file_exists(candidate));
    }
    host.file_exists(path).then(|| path.to_path_buf())
}

/// Host backed by the real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskHost;

impl DiskHost {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CompilerHost for DiskHost {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        fs::read_to_string(path).ok()
    }

    fn canonical_file_name(&self, path: &Path) -> PathBuf {
        dunce::canonicalize(path).unwrap_or_else(|_| normalize(path))
    }

    fn write_file(&mut self, path: &Path, text: &str) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(path, text.as_bytes())?;
        debug!(path = %path.display(), bytes = text.len(), "wrote output");
        Ok(())
    }
}

/// Write through a temporary sibling and rename it into place.
fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("output"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    let renamed = fs::rename(&temp_path, path);
    if renamed.is_err() && cfg!(windows) {
        // rename refuses to replace an existing target on Windows
        fs::copy(&temp_path, path)?;
    }
    let _ = fs::remove_file(&temp_path);
    if cfg!(windows) {
        return Ok(());
    }
    renamed
}

/// In-memory host for tests and embedding.
///
/// Paths are normalized on the way in; directories exist implicitly as
/// prefixes of stored files. Writes land in the same table and are also
/// recorded in write order.
#[derive(Debug, Default, Clone)]
pub struct MemoryHost {
    files: BTreeMap<PathBuf, String>,
    writes: Vec<PathBuf>,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MemoryHost::insert`].
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), text.into());
    }

    /// Contents of a stored file.
    #[must_use]
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files.get(&normalize(path.as_ref())).map(String::as_str)
    }

    /// Paths passed to `write_file`, in call order (repeats included).
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.writes
    }
}

impl CompilerHost for MemoryHost {
    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn is_directory(&self, path: &Path) -> bool {
        let dir = normalize(path);
        self.files
            .keys()
            .any(|file| file != &dir && file.starts_with(&dir))
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        self.files.get(&normalize(path)).cloned()
    }

    fn write_file(&mut self, path: &Path, text: &str) -> Result<(), Error> {
        let path = normalize(path);
        self.writes.push(path.clone());
        self.files.insert(path, text.to_string());
        Ok(())
    }
}
