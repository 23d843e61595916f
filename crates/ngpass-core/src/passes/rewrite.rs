//! Text edits with a position map.
//!
//! Passes describe their changes as byte-range edits against the input
//! text. [`Rewriter::finish`] applies them and records, for every output
//! line start and every point where copying of the input resumes, which
//! input position the output position came from.

use crate::sourcemap::SourceMapFragment;

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
    seq: usize,
}

/// Line and UTF-16 column.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    line: u32,
    column: u32,
}

impl Cursor {
    fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let width = ch.len_utf16() as u32;
            self.column += width;
        }
    }

    fn pair(self) -> (u32, u32) {
        (self.line, self.column)
    }
}

/// Collects edits against one source text.
#[derive(Debug)]
pub(crate) struct Rewriter<'a> {
    source: &'a str,
    edits: Vec<Edit>,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            edits: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(at, at, text);
    }

    pub(crate) fn remove(&mut self, start: usize, end: usize) {
        self.replace(start, end, String::new());
    }

    /// Replace `source[start..end]`. Edits at the same offset apply in call order.
    pub(crate) fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
        let seq = self.edits.len();
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
            seq,
        });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply all edits and append `trailer`, which gets no mappings.
    ///
    /// An edit overlapping an earlier one is skipped.
    pub(crate) fn finish(self, trailer: &str) -> (String, SourceMapFragment) {
        let mut edits = self.edits;
        edits.sort_by_key(|e| (e.start, e.seq));

        let mut out = String::with_capacity(self.source.len() + trailer.len());
        let mut fragment = SourceMapFragment::new();
        let mut generated = Cursor::default();
        let mut original = Cursor::default();
        fragment.push((0, 0), (0, 0));

        let mut pos = 0usize;
        for edit in edits {
            if edit.start < pos || edit.end < edit.start || edit.end > self.source.len() {
                continue;
            }
            copy_source(
                &self.source[pos..edit.start],
                &mut out,
                &mut generated,
                &mut original,
                &mut fragment,
            );

            // inserted lines come from the edit point
            let anchor = original.pair();
            for ch in edit.text.chars() {
                out.push(ch);
                generated.advance(ch);
                if ch == '\n' {
                    fragment.push(generated.pair(), anchor);
                }
            }

            for ch in self.source[edit.start..edit.end].chars() {
                original.advance(ch);
            }
            pos = edit.end;
            fragment.push(generated.pair(), original.pair());
        }
        copy_source(
            &self.source[pos..],
            &mut out,
            &mut generated,
            &mut original,
            &mut fragment,
        );

        out.push_str(trailer);
        (out, fragment)
    }
}

fn copy_source(
    text: &str,
    out: &mut String,
    generated: &mut Cursor,
    original: &mut Cursor,
    fragment: &mut SourceMapFragment,
) {
    for ch in text.chars() {
        out.push(ch);
        generated.advance(ch);
        original.advance(ch);
        if ch == '\n' {
            fragment.push(generated.pair(), original.pair());
        }
    }
}

/// Byte offset where the line containing `offset` starts.
pub(crate) fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Leading whitespace of the line containing `offset`.
pub(crate) fn indentation(source: &str, offset: usize) -> &str {
    let start = line_start(source, offset);
    let line = &source[start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}
