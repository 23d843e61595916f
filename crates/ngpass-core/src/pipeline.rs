//! The transform pipeline.
//!
//! Runs the enabled passes over a baseline [`Generation`], one successor
//! generation per pass, and keeps what the passes leave behind: source map
//! fragments, externs, diagnostics. Outputs written through the pipeline
//! (it is itself a [`CompilerHost`]) are post-processed on the way to the
//! wrapped host:
//!
//! - `.map` files get every recorded fragment folded in;
//! - other non-declaration outputs are wrapped as `goog.module`s when
//!   enabled, and the module manifest records what they define and require.

use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::emit::Emitter;
use crate::environment::{Environment, ProjectEnvironment};
use crate::error::Error;
use crate::host::CompilerHost;
use crate::manifest::ModuleManifest;
use crate::passes::googmodule::wrap_commonjs;
use crate::passes::{builtin, PassContext, PassError, PassKind, PassSelection};
use crate::paths::is_declaration_file;
use crate::program::{Generation, SourceUnit};
use crate::sourcemap::SourceMapChain;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, trace, warn};

/// What a run does besides the passes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub passes: PassSelection,
    pub googmodule: bool,
    pub es5_mode: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            passes: PassSelection::default(),
            googmodule: true,
            es5_mode: false,
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            passes: config.passes,
            googmodule: config.googmodule,
            es5_mode: config.es5_mode,
        }
    }
}

/// A unit a pass could not process. That file drops out of the run; the
/// other files go on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassFailure {
    pub pass: PassKind,
    pub file: PathBuf,
    pub error: PassError,
}

impl From<PassFailure> for Error {
    fn from(failure: PassFailure) -> Self {
        Error::PassInternal {
            pass: failure.pass,
            file: failure.file,
            source: failure.error,
        }
    }
}

/// Everything a full run produced.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The last generation.
    pub generation: Generation,
    /// Final text per source path.
    pub files: BTreeMap<PathBuf, String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Externs per source file, in processing order.
    pub externs_by_file: Vec<(PathBuf, String)>,
    pub module_manifest: ModuleManifest,
    /// Files a pass failed on. They are not emitted and not in `files`.
    pub failures: Vec<PassFailure>,
}

impl RunResult {
    /// Whether any file failed or produced an error diagnostic.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty() || self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Runs passes over generations and post-processes written outputs.
pub struct TransformPipeline<H, E = ProjectEnvironment> {
    host: H,
    environment: E,
    options: PipelineOptions,
    manifest: ModuleManifest,
    externs: Vec<(PathBuf, String)>,
    source_maps: SourceMapChain,
    diagnostics: Vec<Diagnostic>,
    failures: Vec<PassFailure>,
}

/// Store `text` as the externs of `path`, replacing an earlier entry in place.
fn upsert_externs(externs: &mut Vec<(PathBuf, String)>, path: &Path, text: String) {
    match externs.iter_mut().find(|(p, _)| p == path) {
        Some(entry) => entry.1 = text,
        None => externs.push((path.to_path_buf(), text)),
    }
}

impl<H: CompilerHost, E: Environment> TransformPipeline<H, E> {
    pub fn new(host: H, environment: E, options: PipelineOptions) -> Self {
        Self {
            host,
            environment,
            options,
            manifest: ModuleManifest::new(),
            externs: Vec::new(),
            source_maps: SourceMapChain::new(),
            diagnostics: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    pub fn source_maps(&self) -> &SourceMapChain {
        &self.source_maps
    }

    /// Diagnostics collected since the last [`TransformPipeline::run`].
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Files dropped from the run since the last [`TransformPipeline::run`].
    pub fn failures(&self) -> &[PassFailure] {
        &self.failures
    }

    fn has_failed(&self, path: &Path) -> bool {
        self.failures.iter().any(|f| f.file == path)
    }

    /// Externs per source file, in processing order.
    pub fn externs(&self) -> &[(PathBuf, String)] {
        &self.externs
    }

    /// All externs, each file's block under a `// externs from <file>:` line.
    pub fn generated_externs(&self) -> String {
        let mut out = String::new();
        for (path, text) in &self.externs {
            let _ = write!(out, "// externs from {}:\n{text}", path.display());
        }
        out
    }

    /// Run one pass over `baseline` and return its successor.
    ///
    /// Units the pass leaves unchanged (and skipped units) are shared with
    /// the successor and have that pass's map fragment cleared.
    ///
    /// A unit the pass fails on is recorded in [`TransformPipeline::failures`],
    /// loses its fragments and stays unchanged; later passes leave it alone.
    pub fn run_pass(&mut self, baseline: &Generation, kind: PassKind) -> Generation {
        let span = info_span!("pass", pass = %kind, generation = baseline.number());
        let _enter = span.enter();

        let pass = builtin(kind);
        let checker = baseline.type_check(&self.host);
        let cx = PassContext {
            type_info: &checker,
            environment: &self.environment,
        };

        let mut replaced: Vec<SourceUnit> = Vec::new();
        for unit in baseline.units() {
            let path = unit.path();
            if self.environment.should_skip(path) {
                trace!(file = %path.display(), "skipped");
                self.source_maps.forget(path, Some(kind));
                continue;
            }
            if self.has_failed(path) {
                continue;
            }

            let output = match pass.apply(unit, &cx) {
                Ok(output) => output,
                Err(error) => {
                    warn!(file = %path.display(), %error, "pass failed");
                    self.source_maps.forget(path, None);
                    self.failures.push(PassFailure {
                        pass: kind,
                        file: path.to_path_buf(),
                        error,
                    });
                    continue;
                }
            };
            self.diagnostics.extend(output.diagnostics);
            if let Some(externs) = output.externs {
                upsert_externs(&mut self.externs, path, externs);
            }

            if output.text == unit.text() {
                self.source_maps.forget(path, Some(kind));
                continue;
            }
            match output.source_map {
                Some(fragment) => self.source_maps.record(path.to_path_buf(), kind, fragment),
                None => self.source_maps.forget(path, Some(kind)),
            }
            debug!(file = %path.display(), "rewrote");
            replaced.push(SourceUnit::parse(path, output.text));
        }

        baseline.successor(replaced)
    }

    /// Run every enabled pass in order.
    pub fn run_passes(&mut self, baseline: &Generation) -> Generation {
        let mut generation = baseline.clone();
        for kind in self.options.passes.passes() {
            generation = self.run_pass(&generation, kind);
        }
        generation
    }

    /// Run the passes, then emit every unit of the final generation
    /// through the pipeline.
    ///
    /// # Errors
    /// Returns the first emit or write failure. Pass failures are per file
    /// and end up in [`RunResult::failures`].
    pub fn run(&mut self, baseline: &Generation, emitter: &dyn Emitter) -> Result<RunResult, Error> {
        self.diagnostics.clear();
        self.failures.clear();
        let generation = self.run_passes(baseline);
        for unit in generation.units() {
            if self.has_failed(unit.path()) {
                continue;
            }
            emitter.emit(unit, self)?;
        }

        info!(
            files = generation.len(),
            diagnostics = self.diagnostics.len(),
            externs = self.externs.len(),
            failures = self.failures.len(),
            modules = self.manifest.len(),
            "transform finished"
        );
        let files = generation
            .units()
            .filter(|unit| !self.has_failed(unit.path()))
            .map(|unit| (unit.path().to_path_buf(), unit.text().to_string()))
            .collect();
        Ok(RunResult {
            generation,
            files,
            diagnostics: self.diagnostics.clone(),
            externs_by_file: self.externs.clone(),
            module_manifest: self.manifest.clone(),
            failures: self.failures.clone(),
        })
    }

    /// Post-process one output and hand it to the wrapped host.
    ///
    /// # Errors
    /// Returns `SourceMap` for a malformed `.map` output, or the host's
    /// write error.
    pub fn commit_output(&mut self, path: &Path, text: &str) -> Result<(), Error> {
        if path.extension().is_some_and(|ext| ext == "map") {
            let composed = self.source_maps.compose(path, text, &self.host)?;
            return self.host.write_file(path, &composed);
        }

        let path = self.host.canonical_file_name(path);
        if !self.options.googmodule || is_declaration_file(&path) {
            return self.host.write_file(&path, text);
        }
        let wrapped = wrap_commonjs(&path, text, &self.environment, self.options.es5_mode);
        debug!(
            file = %path.display(),
            module = %wrapped.module_name,
            requires = wrapped.referenced_modules.len(),
            "wrapped as goog.module"
        );
        self.manifest.add_module(path.clone(), wrapped.module_name);
        for referenced in wrapped.referenced_modules {
            self.manifest.add_referenced_module(&path, referenced);
        }
        self.host.write_file(&path, &wrapped.text)
    }
}

impl<H: CompilerHost, E: Environment> CompilerHost for TransformPipeline<H, E> {
    fn delegate(&self) -> Option<&dyn CompilerHost> {
        Some(&self.host)
    }

    fn delegate_mut(&mut self) -> Option<&mut dyn CompilerHost> {
        Some(&mut self.host)
    }

    fn write_file(&mut self, path: &Path, text: &str) -> Result<(), Error> {
        self.commit_output(path, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use std::sync::Arc;

    const ANNOTATIONS: &str = "/** @Annotation */\nexport function Component(meta: any) {}\n";

    fn pipeline(host: MemoryHost) -> TransformPipeline<MemoryHost> {
        let environment = ProjectEnvironment::new("/p")
            .with_out_dir("/p/dist")
            .with_skip_paths(vec![PathBuf::from("/p/src/vendor")]);
        TransformPipeline::new(host, environment, PipelineOptions::default())
    }

    #[test]
    fn test_unchanged_units_are_shared() {
        let host = MemoryHost::new().with_file("/p/src/plain.ts", "const x = 1;\n");
        let baseline = Generation::load(&host, &[PathBuf::from("/p/src/plain.ts")]).unwrap();
        let mut pipeline = pipeline(host);

        let next = pipeline.run_pass(&baseline, PassKind::DecoratorDownlevel);
        let path = Path::new("/p/src/plain.ts");
        assert_eq!(next.number(), 1);
        assert!(Arc::ptr_eq(baseline.unit(path).unwrap(), next.unit(path).unwrap()));
        assert!(pipeline.source_maps().get(path).is_empty());
    }

    #[test]
    fn test_skipped_files_are_untouched() {
        let host = MemoryHost::new()
            .with_file("/p/src/vendor/lib.ts", "export class Lib {}\n")
            .with_file("/p/src/app.ts", "export class App {}\n");
        let roots = [PathBuf::from("/p/src/vendor/lib.ts"), PathBuf::from("/p/src/app.ts")];
        let baseline = Generation::load(&host, &roots).unwrap();
        let mut pipeline = pipeline(host);

        let next = pipeline.run_pass(&baseline, PassKind::Closurize);
        let lib = Path::new("/p/src/vendor/lib.ts");
        let app = Path::new("/p/src/app.ts");
        assert!(Arc::ptr_eq(baseline.unit(lib).unwrap(), next.unit(lib).unwrap()));
        assert_eq!(next.unit(app).unwrap().text(), "/** @export */\nexport class App {}\n");
        assert_eq!(pipeline.source_maps().get(app).len(), 1);
    }

    #[test]
    fn test_pass_failure_is_fatal_for_the_file_only() {
        let host = MemoryHost::new()
            .with_file("/p/src/annotations.ts", ANNOTATIONS)
            .with_file(
                "/p/src/a_broken.ts",
                "import { Component } from './annotations';\n@Component({}) declare class Broken;\n",
            )
            .with_file(
                "/p/src/b_ok.ts",
                "import { Component } from './annotations';\n@Component({})\nexport class Fine {}\n",
            );
        let roots = [PathBuf::from("/p/src/a_broken.ts"), PathBuf::from("/p/src/b_ok.ts")];
        let baseline = Generation::load(&host, &roots).unwrap();
        let mut pipeline = pipeline(host);

        let next = pipeline.run_pass(&baseline, PassKind::DecoratorDownlevel);
        let broken = Path::new("/p/src/a_broken.ts");
        let ok = Path::new("/p/src/b_ok.ts");

        assert_eq!(pipeline.failures().len(), 1);
        let failure = &pipeline.failures()[0];
        assert_eq!(failure.pass, PassKind::DecoratorDownlevel);
        assert_eq!(failure.file, broken);
        assert_eq!(failure.error.code, "NGPASS_DOWNLEVEL_NO_BODY");
        assert_eq!(Error::from(failure.clone()).code(), "NGPASS_PASS_INTERNAL");

        assert!(Arc::ptr_eq(baseline.unit(broken).unwrap(), next.unit(broken).unwrap()));
        assert!(pipeline.source_maps().get(broken).is_empty());
        assert!(next.unit(ok).unwrap().text().contains("static decorators"));
        assert_eq!(pipeline.source_maps().get(ok).len(), 1);

        // later passes leave the failed file alone
        let last = pipeline.run_pass(&next, PassKind::Closurize);
        assert!(Arc::ptr_eq(next.unit(broken).unwrap(), last.unit(broken).unwrap()));
        assert_eq!(pipeline.source_maps().get(ok).len(), 2);
    }

    #[test]
    fn test_externs_are_replaced_on_repeat() {
        let host = MemoryHost::new().with_file("/p/src/globals.ts", "declare const VERSION: string;\n");
        let baseline = Generation::load(&host, &[PathBuf::from("/p/src/globals.ts")]).unwrap();
        let mut pipeline = pipeline(host);

        pipeline.run_pass(&baseline, PassKind::Closurize);
        pipeline.run_pass(&baseline, PassKind::Closurize);
        assert_eq!(pipeline.externs().len(), 1);
        assert_eq!(
            pipeline.generated_externs(),
            "// externs from /p/src/globals.ts:\n/** @type {?} */\nvar VERSION;\n"
        );
    }

    #[test]
    fn test_commit_output_wraps_and_records() {
        let mut pipeline = pipeline(MemoryHost::new());
        pipeline
            .write_file(
                Path::new("/p/dist/main.js"),
                "\"use strict\";\nvar app = require('./app/app.module');\n",
            )
            .unwrap();
        pipeline
            .write_file(Path::new("/p/dist/types.d.ts"), "export {};\n")
            .unwrap();

        assert_eq!(
            pipeline.host().file("/p/dist/main.js"),
            Some("goog.module('main');\nvar app = goog.require('app.app_module');\n")
        );
        assert_eq!(pipeline.host().file("/p/dist/types.d.ts"), Some("export {};\n"));
        assert_eq!(
            pipeline
                .manifest()
                .referenced_modules(Path::new("/p/dist/main.js"))
                .collect::<Vec<_>>(),
            vec!["app.app_module"]
        );
        assert_eq!(pipeline.manifest().len(), 1);
    }

    #[test]
    fn test_map_output_passes_through_without_fragments() {
        let mut pipeline = pipeline(MemoryHost::new());
        let map = r#"{"version":3,"sources":["../src/a.ts"],"names":[],"mappings":"AAAA"}"#;
        pipeline.write_file(Path::new("/p/dist/a.js.map"), map).unwrap();
        assert_eq!(pipeline.host().file("/p/dist/a.js.map"), Some(map));

        let err = pipeline
            .write_file(Path::new("/p/dist/b.js.map"), "not json")
            .unwrap_err();
        assert_eq!(err.code(), "NGPASS_SOURCE_MAP");
        assert!(pipeline.host().file("/p/dist/b.js.map").is_none());
    }
}
