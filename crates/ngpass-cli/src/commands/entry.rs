use super::fail_json;
use crate::absolutize;
use miette::{miette, IntoDiagnostic, Result};
use ngpass_core::version::RESULT_SCHEMA_VERSION;
use ngpass_core::{resolve_bootstrap_entry, CompilerHost, Config, DiskHost};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// JSON output for the entry command.
#[derive(Serialize)]
struct EntryJson {
    schema_version: u32,
    ok: bool,
    /// `./relative/module#Symbol`, relative to the main file's directory.
    entry_module: String,
    /// `configured` when taken from `entryModule`, else `resolved`.
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    module_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol_name: Option<String>,
}

pub fn run(cwd: &Path, config: &Config, main: Option<PathBuf>, json: bool) -> Result<()> {
    let output = match (main, &config.entry_module) {
        (None, Some(configured)) => EntryJson {
            schema_version: RESULT_SCHEMA_VERSION,
            ok: true,
            entry_module: configured.clone(),
            source: "configured",
            module_path: None,
            symbol_name: None,
        },
        (main, _) => {
            let main = main
                .map(|m| absolutize(cwd, &m))
                .or_else(|| config.main.clone())
                .ok_or_else(|| miette!("no main file: pass one or set `main` in ngpass.json"))?;

            let host = DiskHost::new();
            let entry = match resolve_bootstrap_entry(&host, &main) {
                Ok(entry) => entry,
                Err(err) if json => fail_json(RESULT_SCHEMA_VERSION, &err),
                Err(err) => return Err(err).into_diagnostic(),
            };
            let main = host.canonical_file_name(&main);
            let base = main.parent().unwrap_or(Path::new("."));
            EntryJson {
                schema_version: RESULT_SCHEMA_VERSION,
                ok: true,
                entry_module: entry.relative_to(base),
                source: "resolved",
                module_path: Some(entry.module_path),
                symbol_name: Some(entry.symbol_name),
            }
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    } else {
        println!("{}", output.entry_module);
    }
    Ok(())
}
