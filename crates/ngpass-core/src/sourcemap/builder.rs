use super::{Mapping, OriginalPosition, SourceMap};

/// Collects mappings for a map with named sources.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    /// Source file names.
    sources: Vec<String>,
    /// Original source content for each source, when known.
    sources_content: Vec<Option<String>>,
    mappings: Vec<Mapping>,
}

impl SourceMapBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file and return its index.
    pub fn add_source(&mut self, path: &str, content: Option<&str>) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let idx = self.sources.len() as u32;
        self.sources.push(path.to_string());
        self.sources_content.push(content.map(str::to_string));
        idx
    }

    /// Map a generated position to a position in source `source_idx`.
    pub fn add_mapping(
        &mut self,
        generated: (u32, u32),
        source_idx: u32,
        original: (u32, u32),
    ) {
        self.mappings.push(Mapping {
            generated_line: generated.0,
            generated_column: generated.1,
            original: Some(OriginalPosition {
                source: source_idx,
                line: original.0,
                column: original.1,
                name: None,
            }),
        });
    }

    /// Map every line of a `line_count`-line file to the same line of source `source_idx`.
    pub fn add_identity_lines(&mut self, line_count: u32, source_idx: u32) {
        for line in 0..line_count {
            self.add_mapping((line, 0), source_idx, (line, 0));
        }
    }

    #[must_use]
    pub fn build(mut self, file: Option<&str>) -> SourceMap {
        self.mappings
            .sort_by_key(|m| (m.generated_line, m.generated_column));
        self.mappings
            .dedup_by_key(|m| (m.generated_line, m.generated_column));
        SourceMap {
            file: file.map(str::to_string),
            source_root: None,
            sources: self.sources,
            sources_content: self.sources_content,
            names: Vec::new(),
            mappings: self.mappings,
        }
    }
}

/// A pass's map from its output text back to its input text.
///
/// A fragment does not know which file it belongs to; [`stamped`] turns it
/// into a [`SourceMap`] naming that file at the point of use.
///
/// [`stamped`]: SourceMapFragment::stamped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMapFragment {
    /// `(generated line, generated column, original line, original column)`.
    mappings: Vec<(u32, u32, u32, u32)>,
}

impl SourceMapFragment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping. A mapping for the generated position just pushed is replaced.
    pub fn push(&mut self, generated: (u32, u32), original: (u32, u32)) {
        let entry = (generated.0, generated.1, original.0, original.1);
        match self.mappings.last_mut() {
            Some(last) if (last.0, last.1) == generated => *last = entry,
            _ => self.mappings.push(entry),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Original position recorded for a generated position, if exactly mapped.
    #[must_use]
    pub fn original_of(&self, line: u32, column: u32) -> Option<(u32, u32)> {
        self.mappings
            .iter()
            .find(|m| m.0 == line && m.1 == column)
            .map(|m| (m.2, m.3))
    }

    /// A map whose single source and file are both `source_name`.
    #[must_use]
    pub fn stamped(&self, source_name: &str) -> SourceMap {
        let mut builder = SourceMapBuilder::new();
        let idx = builder.add_source(source_name, None);
        for &(gen_line, gen_col, orig_line, orig_col) in &self.mappings {
            builder.add_mapping((gen_line, gen_col), idx, (orig_line, orig_col));
        }
        builder.build(Some(source_name))
    }
}
