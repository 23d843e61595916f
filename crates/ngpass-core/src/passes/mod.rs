//! Source-to-source transform passes.
//!
//! A pass takes one type-checked [`SourceUnit`] and returns new text, an
//! optional map from the new text back to the old, structured diagnostics
//! and optional externs. Passes never mutate their input; the pipeline
//! builds the next generation from their outputs.
//!
//! Built-in passes run in a fixed order:
//!
//! 1. [`DecoratorDownlevel`] - annotation decorators become static metadata
//! 2. [`Closurize`] - Closure JSDoc, `@record` shims and externs
//!
//! Module wrapping ([`googmodule`]) is not a pass over source units: it runs
//! on emitted JavaScript when outputs are committed.

mod closurize;
mod decorators;
pub mod googmodule;
mod rewrite;

pub use closurize::Closurize;
pub use decorators::{DecoratorDownlevel, ANNOTATION_SUPPORT};

use crate::diagnostics::Diagnostic;
use crate::environment::Environment;
use crate::program::{SourceUnit, TypeInfo};
use crate::sourcemap::SourceMapFragment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a built-in pass. Ordering is pass order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassKind {
    DecoratorDownlevel,
    Closurize,
}

impl PassKind {
    /// Every pass, in the order they run.
    pub const ALL: [PassKind; 2] = [PassKind::DecoratorDownlevel, PassKind::Closurize];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecoratorDownlevel => "decorator-downlevel",
            Self::Closurize => "closurize",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which passes a run enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PassSelection {
    pub downlevel_decorators: bool,
    pub closurize: bool,
}

impl Default for PassSelection {
    fn default() -> Self {
        Self {
            downlevel_decorators: true,
            closurize: true,
        }
    }
}

impl PassSelection {
    /// Enabled passes in pass order.
    #[must_use]
    pub fn passes(&self) -> Vec<PassKind> {
        PassKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                PassKind::DecoratorDownlevel => self.downlevel_decorators,
                PassKind::Closurize => self.closurize,
            })
            .collect()
    }
}

/// What a pass sees besides the unit itself.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    pub type_info: &'a dyn TypeInfo,
    pub environment: &'a dyn Environment,
}

/// Result of running a pass over one unit.
#[derive(Debug, Clone, Default)]
pub struct PassOutput {
    pub text: String,
    /// Map from `text` back to the input text; `None` when nothing changed.
    pub source_map: Option<SourceMapFragment>,
    pub diagnostics: Vec<Diagnostic>,
    pub externs: Option<String>,
}

impl PassOutput {
    /// Output that leaves `unit` as it is.
    #[must_use]
    pub fn unchanged(unit: &SourceUnit) -> Self {
        Self {
            text: unit.text().to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Error raised when a pass cannot process a unit at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassError {
    /// Error code.
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
}

impl PassError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PassError {}

/// A rewrite over one source unit.
pub trait TransformPass {
    fn kind(&self) -> PassKind;

    /// Transform `unit`.
    ///
    /// # Errors
    /// Returns a `PassError` when the unit cannot be transformed; the
    /// pipeline treats this as fatal for the unit.
    fn apply(&self, unit: &SourceUnit, cx: &PassContext<'_>) -> Result<PassOutput, PassError>;
}

/// The built-in implementation of `kind`.
#[must_use]
pub fn builtin(kind: PassKind) -> Box<dyn TransformPass> {
    match kind {
        PassKind::DecoratorDownlevel => Box::new(DecoratorDownlevel),
        PassKind::Closurize => Box::new(Closurize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_keeps_pass_order() {
        let all = PassSelection::default();
        assert_eq!(all.passes(), vec![PassKind::DecoratorDownlevel, PassKind::Closurize]);

        let only_closurize: PassSelection =
            serde_json::from_str(r#"{"downlevelDecorators": false}"#).unwrap();
        assert_eq!(only_closurize.passes(), vec![PassKind::Closurize]);
    }

    #[test]
    fn test_builtin_kinds() {
        for kind in PassKind::ALL {
            assert_eq!(builtin(kind).kind(), kind);
        }
        assert!(PassKind::DecoratorDownlevel < PassKind::Closurize);
        assert_eq!(PassKind::DecoratorDownlevel.to_string(), "decorator-downlevel");
    }
}
