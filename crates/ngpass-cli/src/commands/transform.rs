use super::{fail_json, ErrorJson};
use miette::{miette, IntoDiagnostic, Result};
use ngpass_core::version::RESULT_SCHEMA_VERSION;
use ngpass_core::{
    CompilerHost, Config, Diagnostic, DiskHost, Error, Generation, ModuleManifest, PassSelection,
    PassThroughEmitter, PipelineOptions, ProjectEnvironment, TransformPipeline,
};
use serde::Serialize;
use std::path::PathBuf;

/// Command line overrides on top of the loaded config.
#[derive(Debug)]
pub struct TransformAction {
    pub files: Vec<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub googmodule: bool,
    pub es5: bool,
    pub downlevel: bool,
    pub closurize: bool,
    pub externs: Option<PathBuf>,
}

#[derive(Serialize)]
struct TransformJson<'a> {
    schema_version: u32,
    ok: bool,
    out_dir: PathBuf,
    files: Vec<&'a PathBuf>,
    diagnostics: &'a [Diagnostic],
    /// Files a pass failed on; they were not emitted.
    failures: Vec<ErrorJson>,
    externs: Vec<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    externs_out: Option<PathBuf>,
    manifest: &'a ModuleManifest,
}

/// Fold flags into the config. Flags only ever turn things off, except `--es5`.
fn apply(config: Config, action: &TransformAction) -> Config {
    let passes = PassSelection {
        downlevel_decorators: config.passes.downlevel_decorators && action.downlevel,
        closurize: config.passes.closurize && action.closurize,
    };
    let googmodule = config.googmodule && action.googmodule;
    let es5_mode = config.es5_mode || action.es5;
    let mut config = config
        .with_passes(passes)
        .with_googmodule(googmodule)
        .with_es5_mode(es5_mode);
    if let Some(out_dir) = &action.out_dir {
        config = config.with_out_dir(out_dir.clone());
    }
    if action.externs.is_some() {
        config.externs_out.clone_from(&action.externs);
    }
    config
}

/// Unit paths are canonical, so every directory compared against them must be too.
fn canonicalize_paths(mut config: Config, host: &impl CompilerHost) -> Config {
    let canonical = |paths: &[PathBuf]| -> Vec<PathBuf> {
        paths.iter().map(|p| host.canonical_file_name(p)).collect()
    };
    config.root_dir = host.canonical_file_name(&config.root_dir);
    config.out_dir = config.out_dir.as_deref().map(|p| host.canonical_file_name(p));
    config.skip_paths = canonical(&config.skip_paths);
    config.ignore_warnings = canonical(&config.ignore_warnings);
    config
}

pub fn run(config: Config, action: TransformAction, json: bool) -> Result<()> {
    let config = apply(config, &action);

    let roots = if action.files.is_empty() {
        config.main.iter().cloned().collect::<Vec<_>>()
    } else {
        action.files
    };
    if roots.is_empty() {
        return Err(miette!("no input files: pass them or set `main` in ngpass.json"));
    }

    let host = DiskHost::new();
    let out_dir = config
        .out_dir
        .clone()
        .unwrap_or_else(|| config.root_dir.join("dist"));
    std::fs::create_dir_all(&out_dir).into_diagnostic()?;
    let config = canonicalize_paths(config.with_out_dir(out_dir.clone()), &host);
    let out_dir = host.canonical_file_name(&out_dir);

    let baseline = match Generation::load(&host, &roots) {
        Ok(generation) => generation,
        Err(err) if json => fail_json(RESULT_SCHEMA_VERSION, &err),
        Err(err) => return Err(err).into_diagnostic(),
    };

    let environment = ProjectEnvironment::from_config(&config);
    let emitter = PassThroughEmitter::new(&config.root_dir, &out_dir);
    let mut pipeline = TransformPipeline::new(host, environment, PipelineOptions::from_config(&config));

    let result = match pipeline.run(&baseline, &emitter) {
        Ok(result) => result,
        Err(err) if json => fail_json(RESULT_SCHEMA_VERSION, &err),
        Err(err) => return Err(err).into_diagnostic(),
    };

    if let Some(externs_out) = &config.externs_out {
        let externs = pipeline.generated_externs();
        pipeline
            .host_mut()
            .write_file(externs_out, &externs)
            .into_diagnostic()?;
    }

    if json {
        let output = TransformJson {
            schema_version: RESULT_SCHEMA_VERSION,
            ok: !result.has_errors(),
            out_dir,
            files: result.files.keys().collect(),
            diagnostics: &result.diagnostics,
            failures: result
                .failures
                .iter()
                .map(|failure| ErrorJson::from(&Error::from(failure.clone())))
                .collect(),
            externs: result.externs_by_file.iter().map(|(path, _)| path).collect(),
            externs_out: config.externs_out.clone(),
            manifest: &result.module_manifest,
        };
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
        if result.has_errors() {
            std::process::exit(1);
        }
        return Ok(());
    }

    for diagnostic in &result.diagnostics {
        eprintln!("{diagnostic}");
    }
    for failure in &result.failures {
        eprintln!("error: {}", Error::from(failure.clone()));
    }
    let errors = result.diagnostics.iter().filter(|d| d.is_error()).count() + result.failures.len();
    if errors > 0 {
        return Err(miette!("transform failed with {errors} error(s)"));
    }
    println!(
        "transformed {} file(s) into {} ({} module(s))",
        result.files.len(),
        out_dir.display(),
        result.module_manifest.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action() -> TransformAction {
        TransformAction {
            files: Vec::new(),
            out_dir: None,
            googmodule: true,
            es5: false,
            downlevel: true,
            closurize: true,
            externs: None,
        }
    }

    #[test]
    fn test_flags_turn_passes_off() {
        let config = apply(
            Config::new(PathBuf::from("/p")),
            &TransformAction {
                closurize: false,
                googmodule: false,
                ..action()
            },
        );
        assert!(config.passes.downlevel_decorators);
        assert!(!config.passes.closurize);
        assert!(!config.googmodule);
        assert!(!config.es5_mode);
    }

    #[test]
    fn test_flags_cannot_reenable_config() {
        let mut base = Config::new(PathBuf::from("/p"));
        base.passes.downlevel_decorators = false;
        let config = apply(base, &action());
        assert!(!config.passes.downlevel_decorators);
    }

    #[cfg(unix)]
    #[test]
    fn test_policy_paths_follow_symlinked_root() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir_all(real.join("src/vendor")).unwrap();
        std::fs::create_dir_all(real.join("src/generated")).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mut config = Config::new(link.clone());
        config.skip_paths = vec![link.join("src/vendor")];
        config.ignore_warnings = vec![link.join("src/generated")];
        let config = canonicalize_paths(config, &DiskHost::new());

        let real = std::fs::canonicalize(&real).unwrap();
        assert_eq!(config.root_dir, real);
        assert_eq!(config.skip_paths, vec![real.join("src/vendor")]);
        assert_eq!(config.ignore_warnings, vec![real.join("src/generated")]);
    }

    #[test]
    fn test_overrides_replace_paths() {
        let base = Config::new(PathBuf::from("/p")).with_out_dir(PathBuf::from("/p/dist"));
        let config = apply(
            base,
            &TransformAction {
                out_dir: Some(PathBuf::from("/p/build")),
                externs: Some(PathBuf::from("/p/externs.js")),
                es5: true,
                ..action()
            },
        );
        assert_eq!(config.out_dir, Some(PathBuf::from("/p/build")));
        assert_eq!(config.externs_out, Some(PathBuf::from("/p/externs.js")));
        assert!(config.es5_mode);
    }
}
