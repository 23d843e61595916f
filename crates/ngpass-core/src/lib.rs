#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Angular bootstrap entry resolution and a Closure-oriented TypeScript
//! transform pipeline with source map composition.

pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod entry;
pub mod environment;
pub mod error;
pub mod host;
pub mod manifest;
pub mod passes;
pub mod paths;
pub mod pipeline;
pub mod program;
pub mod sourcemap;
pub mod syntax;
pub mod version;

pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticSeverity};
pub use emit::{Emitter, PassThroughEmitter};
pub use entry::{resolve_bootstrap_entry, EntryReference, BOOTSTRAP_METHODS};
pub use environment::{Environment, ProjectEnvironment};
pub use error::Error;
pub use host::{CompilerHost, DiskHost, MemoryHost};
pub use manifest::{ManifestEntry, ModuleManifest};
pub use passes::{PassKind, PassSelection, TransformPass};
pub use pipeline::{PassFailure, PipelineOptions, RunResult, TransformPipeline};
pub use program::{Generation, SourceUnit, TypeChecker, TypeInfo};
pub use sourcemap::{SourceMap, SourceMapChain};
pub use version::VERSION;
