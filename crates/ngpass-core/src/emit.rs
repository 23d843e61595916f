//! Emitters turn the final generation into output files.
//!
//! An emitter writes through a [`CompilerHost`]; handing it the pipeline
//! as host is what routes every output through module wrapping and source
//! map composition.

use crate::error::Error;
use crate::host::CompilerHost;
use crate::paths::{relative_path, strip_source_extension, to_slash};
use crate::program::SourceUnit;
use crate::sourcemap::SourceMapBuilder;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes the outputs for one source unit.
pub trait Emitter {
    /// Emit `unit`, writing every output through `host`.
    ///
    /// # Errors
    /// Returns an error if an output cannot be written.
    fn emit(&self, unit: &SourceUnit, host: &mut dyn CompilerHost) -> Result<(), Error>;
}

/// Emits each unit's text as `<stem>.js` with a line-identity `<stem>.js.map`.
///
/// Declaration files produce no output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassThroughEmitter {
    root_dir: PathBuf,
    out_dir: PathBuf,
}

impl PassThroughEmitter {
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            out_dir: out_dir.into(),
        }
    }

    /// Output path of the JavaScript emitted for `source`.
    #[must_use]
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let stem = strip_source_extension(&relative_path(&self.root_dir, source));
        let mut out = self.out_dir.join(stem).into_os_string();
        out.push(".js");
        PathBuf::from(out)
    }
}

impl Emitter for PassThroughEmitter {
    fn emit(&self, unit: &SourceUnit, host: &mut dyn CompilerHost) -> Result<(), Error> {
        if unit.is_declaration_file() {
            return Ok(());
        }
        let js_path = self.output_path(unit.path());
        let map_path = PathBuf::from(format!("{}.map", js_path.display()));
        let js_name = js_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out_dir = js_path.parent().unwrap_or(Path::new(""));

        let text = unit.text();
        let mut builder = SourceMapBuilder::new();
        let source = to_slash(&relative_path(out_dir, unit.path()));
        let idx = builder.add_source(&source, None);
        #[allow(clippy::cast_possible_truncation)]
        let lines = text.lines().count().max(1) as u32;
        builder.add_identity_lines(lines, idx);
        let map = builder
            .build(Some(&js_name))
            .to_json()
            .map_err(|e| Error::source_map(&map_path, e.to_string()))?;

        let mut js = text.to_string();
        if !js.is_empty() && !js.ends_with('\n') {
            js.push('\n');
        }
        let _ = writeln!(js, "//# sourceMappingURL={js_name}.map");

        host.write_file(&js_path, &js)?;
        host.write_file(&map_path, &map)?;
        debug!(source = %unit.path().display(), output = %js_path.display(), "emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::sourcemap::SourceMap;

    #[test]
    fn test_output_path() {
        let emitter = PassThroughEmitter::new("/p/src", "/p/dist");
        assert_eq!(
            emitter.output_path(Path::new("/p/src/app/app.module.ts")),
            PathBuf::from("/p/dist/app/app.module.js")
        );
    }

    #[test]
    fn test_emits_js_and_identity_map() {
        let emitter = PassThroughEmitter::new("/p/src", "/p/dist");
        let mut host = MemoryHost::new();
        let unit = SourceUnit::parse("/p/src/app/a.ts", "const a = 1;\nconst b = 2;\n");
        emitter.emit(&unit, &mut host).unwrap();

        assert_eq!(
            host.file("/p/dist/app/a.js"),
            Some("const a = 1;\nconst b = 2;\n//# sourceMappingURL=a.js.map\n")
        );
        let map = SourceMap::parse(host.file("/p/dist/app/a.js.map").unwrap()).unwrap();
        assert_eq!(map.sources, vec!["../../src/app/a.ts".to_string()]);
        assert_eq!(map.file.as_deref(), Some("a.js"));
        assert_eq!(map.mappings.len(), 2);
    }

    #[test]
    fn test_skips_declaration_files() {
        let emitter = PassThroughEmitter::new("/p/src", "/p/dist");
        let mut host = MemoryHost::new();
        emitter
            .emit(&SourceUnit::parse("/p/src/types.d.ts", "declare const x: number;"), &mut host)
            .unwrap();
        assert!(host.written().is_empty());
    }
}
