//! Version 3 source maps: JSON model, decoded mappings, lookup, and
//! transitive application of one map onto another.
//!
//! All lines and columns are 0-based. Columns count UTF-16 code units, as
//! in the JSON format.

mod builder;
mod compose;
pub mod vlq;

pub use builder::{SourceMapBuilder, SourceMapFragment};
pub use compose::SourceMapChain;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source map decoding and encoding failures.
#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported source map version {0}")]
    Version(u32),

    #[error("invalid mappings: {0}")]
    Mappings(String),
}

/// The JSON shape of a version 3 source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
}

/// Position in an original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalPosition {
    /// Index into `sources`.
    pub source: u32,
    pub line: u32,
    pub column: u32,
    /// Index into `names`.
    pub name: Option<u32>,
}

/// One decoded mapping segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    /// `None` for a segment that maps to no source.
    pub original: Option<OriginalPosition>,
}

/// A decoded source map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    pub file: Option<String>,
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    /// Sorted by generated position.
    pub mappings: Vec<Mapping>,
}

/// Result of [`SourceMap::original_position_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<'a> {
    pub source: &'a str,
    pub line: u32,
    pub column: u32,
    pub name: Option<&'a str>,
}

impl SourceMap {
    /// Parse source map JSON.
    ///
    /// # Errors
    /// Fails on malformed JSON, a version other than 3, or undecodable mappings.
    pub fn parse(json: &str) -> Result<Self, SourceMapError> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Decode a raw map.
    ///
    /// # Errors
    /// Fails on a version other than 3 or undecodable mappings.
    pub fn from_raw(raw: RawSourceMap) -> Result<Self, SourceMapError> {
        if raw.version != 3 {
            return Err(SourceMapError::Version(raw.version));
        }
        let mappings = decode_mappings(&raw.mappings, raw.sources.len(), raw.names.len())?;
        let mut sources_content = raw.sources_content.unwrap_or_default();
        sources_content.resize(raw.sources.len(), None);
        Ok(Self {
            file: raw.file,
            source_root: raw.source_root,
            sources: raw.sources,
            sources_content,
            names: raw.names,
            mappings,
        })
    }

    /// Encode back into the JSON shape.
    #[must_use]
    pub fn to_raw(&self) -> RawSourceMap {
        let has_content = self.sources_content.iter().any(Option::is_some);
        RawSourceMap {
            version: 3,
            file: self.file.clone(),
            source_root: self.source_root.clone(),
            sources: self.sources.clone(),
            sources_content: has_content.then(|| self.sources_content.clone()),
            names: self.names.clone(),
            mappings: encode_mappings(&self.mappings),
        }
    }

    /// Serialize to JSON text.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn to_json(&self) -> Result<String, SourceMapError> {
        Ok(serde_json::to_string(&self.to_raw())?)
    }

    /// Original position of a generated position.
    ///
    /// Picks the mapping with the greatest column not after `column` on the
    /// same generated line; positions before the first mapping on their line
    /// have no original position.
    #[must_use]
    pub fn original_position_for(&self, line: u32, column: u32) -> Option<Located<'_>> {
        let end = self
            .mappings
            .partition_point(|m| (m.generated_line, m.generated_column) <= (line, column));
        let mapping = self.mappings[..end].last()?;
        if mapping.generated_line != line {
            return None;
        }
        let original = mapping.original?;
        Some(Located {
            source: self.sources.get(original.source as usize)?,
            line: original.line,
            column: original.column,
            name: original
                .name
                .and_then(|n| self.names.get(n as usize))
                .map(String::as_str),
        })
    }

    /// Map this map's positions in `source_name` one step further back
    /// through `inner`, whose generated file is `source_name`.
    ///
    /// Mappings `inner` cannot locate are kept as they are. The result is a
    /// new value; `self` is unchanged.
    #[must_use]
    pub fn apply(&self, inner: &SourceMap, source_name: &str) -> SourceMap {
        let mut out = SourceMap {
            file: self.file.clone(),
            source_root: self.source_root.clone(),
            ..SourceMap::default()
        };
        let mut source_ids: FxHashMap<String, u32> = FxHashMap::default();
        let mut name_ids: FxHashMap<String, u32> = FxHashMap::default();

        for mapping in &self.mappings {
            let Some(original) = mapping.original else {
                out.mappings.push(*mapping);
                continue;
            };
            let own_source = self.sources[original.source as usize].as_str();
            let own_name = original.name.map(|n| self.names[n as usize].as_str());
            let own_content = self.sources_content.get(original.source as usize).cloned().flatten();

            let located = (own_source == source_name)
                .then(|| inner.original_position_for(original.line, original.column))
                .flatten();
            let (source, line, column, name, content) = match located {
                Some(found) => {
                    let content = inner
                        .sources
                        .iter()
                        .position(|s| s == found.source)
                        .and_then(|i| inner.sources_content.get(i).cloned().flatten())
                        .or(own_content);
                    (found.source, found.line, found.column, found.name.or(own_name), content)
                }
                None => (own_source, original.line, original.column, own_name, own_content),
            };

            let source = intern(&mut out.sources, &mut source_ids, source);
            if out.sources_content.len() < out.sources.len() {
                out.sources_content.push(content);
            }
            let name = name.map(|n| intern(&mut out.names, &mut name_ids, n));
            out.mappings.push(Mapping {
                generated_line: mapping.generated_line,
                generated_column: mapping.generated_column,
                original: Some(OriginalPosition {
                    source,
                    line,
                    column,
                    name,
                }),
            });
        }
        out
    }
}

fn intern(table: &mut Vec<String>, ids: &mut FxHashMap<String, u32>, value: &str) -> u32 {
    if let Some(id) = ids.get(value) {
        return *id;
    }
    #[allow(clippy::cast_possible_truncation)]
    let id = table.len() as u32;
    table.push(value.to_string());
    ids.insert(value.to_string(), id);
    id
}

fn to_index(value: i64, what: &str) -> Result<u32, SourceMapError> {
    u32::try_from(value).map_err(|_| SourceMapError::Mappings(format!("{what} out of range: {value}")))
}

fn decode_mappings(
    mappings: &str,
    source_count: usize,
    name_count: usize,
) -> Result<Vec<Mapping>, SourceMapError> {
    let mut out = Vec::new();
    let mut source: i64 = 0;
    let mut original_line: i64 = 0;
    let mut original_column: i64 = 0;
    let mut name: i64 = 0;

    for (line_index, line) in mappings.split(';').enumerate() {
        let generated_line = u32::try_from(line_index)
            .map_err(|_| SourceMapError::Mappings("too many lines".to_string()))?;
        let mut generated_column: i64 = 0;
        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let values = vlq::decode_segment(segment).map_err(SourceMapError::Mappings)?;
            generated_column += values[0];
            let original = match values.len() {
                1 => None,
                4 | 5 => {
                    source += values[1];
                    original_line += values[2];
                    original_column += values[3];
                    let source_index = to_index(source, "source index")?;
                    if source_index as usize >= source_count {
                        return Err(SourceMapError::Mappings(format!(
                            "source index {source_index} without a source"
                        )));
                    }
                    let name_index = if values.len() == 5 {
                        name += values[4];
                        let name_index = to_index(name, "name index")?;
                        if name_index as usize >= name_count {
                            return Err(SourceMapError::Mappings(format!(
                                "name index {name_index} without a name"
                            )));
                        }
                        Some(name_index)
                    } else {
                        None
                    };
                    Some(OriginalPosition {
                        source: source_index,
                        line: to_index(original_line, "original line")?,
                        column: to_index(original_column, "original column")?,
                        name: name_index,
                    })
                }
                n => {
                    return Err(SourceMapError::Mappings(format!(
                        "segment {segment:?} has {n} fields"
                    )))
                }
            };
            out.push(Mapping {
                generated_line,
                generated_column: to_index(generated_column, "generated column")?,
                original,
            });
        }
    }
    out.sort_by_key(|m| (m.generated_line, m.generated_column));
    Ok(out)
}

fn encode_mappings(mappings: &[Mapping]) -> String {
    let mut sorted = mappings.to_vec();
    sorted.sort_by_key(|m| (m.generated_line, m.generated_column));

    let mut out = String::new();
    let mut line = 0u32;
    let mut first_on_line = true;
    let mut prev_column: i64 = 0;
    let mut prev_source: i64 = 0;
    let mut prev_line: i64 = 0;
    let mut prev_original_column: i64 = 0;
    let mut prev_name: i64 = 0;

    for mapping in &sorted {
        while line < mapping.generated_line {
            out.push(';');
            line += 1;
            first_on_line = true;
            prev_column = 0;
        }
        if !first_on_line {
            out.push(',');
        }
        first_on_line = false;

        let column = i64::from(mapping.generated_column);
        vlq::encode(column - prev_column, &mut out);
        prev_column = column;

        if let Some(original) = mapping.original {
            vlq::encode(i64::from(original.source) - prev_source, &mut out);
            vlq::encode(i64::from(original.line) - prev_line, &mut out);
            vlq::encode(i64::from(original.column) - prev_original_column, &mut out);
            prev_source = i64::from(original.source);
            prev_line = i64::from(original.line);
            prev_original_column = i64::from(original.column);
            if let Some(name) = original.name {
                vlq::encode(i64::from(name) - prev_name, &mut out);
                prev_name = i64::from(name);
            }
        }
    }
    out
}
