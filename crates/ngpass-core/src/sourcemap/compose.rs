use super::{SourceMap, SourceMapFragment};
use crate::error::Error;
use crate::host::CompilerHost;
use crate::passes::PassKind;
use crate::paths::normalize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pending pass fragments per canonical source path, in pass order.
#[derive(Debug, Clone, Default)]
pub struct SourceMapChain {
    pending: BTreeMap<PathBuf, Vec<(PassKind, SourceMapFragment)>>,
}

impl SourceMapChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the fragment `pass` produced for `path`.
    ///
    /// A second fragment from the same pass replaces the first, so repeated
    /// runs do not stack.
    pub fn record(&mut self, path: PathBuf, pass: PassKind, fragment: SourceMapFragment) {
        let entries = self.pending.entry(path).or_default();
        match entries.iter_mut().find(|(kind, _)| *kind == pass) {
            Some(entry) => entry.1 = fragment,
            None => {
                entries.push((pass, fragment));
                entries.sort_by_key(|(kind, _)| *kind);
            }
        }
    }

    /// Drop everything recorded for `path`, or only the fragment of `pass`.
    pub fn forget(&mut self, path: &Path, pass: Option<PassKind>) {
        match pass {
            None => {
                self.pending.remove(path);
            }
            Some(pass) => {
                if let Some(entries) = self.pending.get_mut(path) {
                    entries.retain(|(kind, _)| *kind != pass);
                    if entries.is_empty() {
                        self.pending.remove(path);
                    }
                }
            }
        }
    }

    /// Fragments recorded for `path`, in pass order.
    #[must_use]
    pub fn get(&self, path: &Path) -> &[(PassKind, SourceMapFragment)] {
        self.pending.get(path).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Fold every pending fragment into the base map written for `output_path`.
    ///
    /// Each base source is keyed by its canonical path resolved against the
    /// output's directory. Fragments are applied newest pass first, so each
    /// fold maps positions one rewrite further back. With nothing to apply
    /// the base text is returned unchanged.
    ///
    /// # Errors
    /// Returns `SourceMap` if the base map cannot be decoded.
    pub fn compose<H: CompilerHost + ?Sized>(
        &self,
        output_path: &Path,
        base_text: &str,
        host: &H,
    ) -> Result<String, Error> {
        let base =
            SourceMap::parse(base_text).map_err(|e| Error::source_map(output_path, e.to_string()))?;
        let dir = output_path.parent().unwrap_or(Path::new(""));

        let mut composed = base.clone();
        let mut applied = 0usize;
        for source in &base.sources {
            let key = host.canonical_file_name(&normalize(&dir.join(source)));
            for (pass, fragment) in self.get(&key).iter().rev() {
                composed = composed.apply(&fragment.stamped(source), source);
                applied += 1;
                debug!(output = %output_path.display(), source = %source, pass = %pass, "applied fragment");
            }
        }

        if applied == 0 {
            return Ok(base_text.to_string());
        }
        composed
            .to_json()
            .map_err(|e| Error::source_map(output_path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::sourcemap::SourceMapBuilder;

    fn shift(lines: u32, by: u32) -> SourceMapFragment {
        let mut fragment = SourceMapFragment::new();
        for line in 0..lines {
            fragment.push((line + by, 0), (line, 0));
        }
        fragment
    }

    fn identity_base(lines: u32) -> String {
        let mut builder = SourceMapBuilder::new();
        let idx = builder.add_source("../src/a.ts", None);
        builder.add_identity_lines(lines, idx);
        builder.build(Some("a.js")).to_json().unwrap()
    }

    #[test]
    fn test_passthrough_without_fragments() {
        let chain = SourceMapChain::new();
        let base = identity_base(3);
        let out = chain
            .compose(Path::new("/p/dist/a.js.map"), &base, &MemoryHost::new())
            .unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn test_folds_newest_first() {
        let mut chain = SourceMapChain::new();
        // closurize recorded before downlevel still lands after it
        chain.record(PathBuf::from("/p/src/a.ts"), PassKind::Closurize, shift(4, 1));
        chain.record(PathBuf::from("/p/src/a.ts"), PassKind::DecoratorDownlevel, shift(3, 1));
        assert_eq!(chain.get(Path::new("/p/src/a.ts"))[0].0, PassKind::DecoratorDownlevel);

        let out = chain
            .compose(Path::new("/p/dist/a.js.map"), &identity_base(5), &MemoryHost::new())
            .unwrap();
        let map = SourceMap::parse(&out).unwrap();
        // emitted line 2 -> closurize input line 1 -> original line 0
        let found = map.original_position_for(2, 0).unwrap();
        assert_eq!((found.source, found.line), ("../src/a.ts", 0));
        // a line neither fragment maps keeps its base position
        let found = map.original_position_for(0, 0).unwrap();
        assert_eq!(found.line, 0);
    }

    #[test]
    fn test_record_replaces_same_pass_and_forget() {
        let mut chain = SourceMapChain::new();
        let path = PathBuf::from("/p/a.ts");
        chain.record(path.clone(), PassKind::Closurize, shift(1, 1));
        chain.record(path.clone(), PassKind::Closurize, shift(2, 0));
        assert_eq!(chain.get(&path).len(), 1);
        assert_eq!(chain.get(&path)[0].1.len(), 2);
        chain.forget(&path, Some(PassKind::Closurize));
        assert!(chain.is_empty());
    }

    #[test]
    fn test_malformed_base_is_error() {
        let err = SourceMapChain::new()
            .compose(Path::new("/p/a.js.map"), "{", &MemoryHost::new())
            .unwrap_err();
        assert_eq!(err.code(), "NGPASS_SOURCE_MAP");
    }
}
