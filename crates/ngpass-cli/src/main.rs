#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use ngpass_core::paths::{project_root, CONFIG_FILE};
use ngpass_core::Config;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "ngpass")]
#[command(author, version, about = "Angular entry resolution and Closure transform passes", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Config file (default: nearest ngpass.json)
    #[arg(long, global = true, value_name = "PATH", env = "NGPASS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Resolve the module passed to bootstrapModule()
    Entry {
        /// Main file holding the bootstrap call (default: config `main`)
        main: Option<PathBuf>,
    },

    /// Run the transform passes and emit JavaScript with composed source maps
    Transform {
        /// Root source files (default: config `main`)
        files: Vec<PathBuf>,

        /// Output directory (default: config `outDir`, else `<root>/dist`)
        #[arg(long, short = 'o')]
        out_dir: Option<PathBuf>,

        /// Do not convert outputs to goog.module
        #[arg(long)]
        no_googmodule: bool,

        /// Add the ES5 module shim to goog.module headers
        #[arg(long)]
        es5: bool,

        /// Skip the decorator downlevel pass
        #[arg(long)]
        no_downlevel: bool,

        /// Skip the closurize pass
        #[arg(long)]
        no_closurize: bool,

        /// Write aggregated externs to this file
        #[arg(long, value_name = "PATH")]
        externs: Option<PathBuf>,
    },
}

/// Make `path` absolute against `cwd`.
pub(crate) fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Explicit `--config`, else the nearest `ngpass.json`, else defaults rooted at `cwd`.
fn load_config(cwd: &Path, explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(&absolutize(cwd, path)).into_diagnostic();
    }
    match project_root(cwd) {
        Some(root) if root.join(CONFIG_FILE).is_file() => {
            Config::load(&root.join(CONFIG_FILE)).into_diagnostic()
        }
        Some(root) => Ok(Config::new(root)),
        None => Ok(Config::new(cwd.to_path_buf())),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    if matches!(cli.command, Some(Commands::Version) | None) {
        return commands::version::run();
    }

    logging::init(cli.verbose, cli.json);
    let config = load_config(&cwd, cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Entry { main }) => commands::entry::run(&cwd, &config, main, cli.json),
        Some(Commands::Transform {
            files,
            out_dir,
            no_googmodule,
            es5,
            no_downlevel,
            no_closurize,
            externs,
        }) => {
            let action = commands::transform::TransformAction {
                files: files.iter().map(|f| absolutize(&cwd, f)).collect(),
                out_dir: out_dir.map(|d| absolutize(&cwd, &d)),
                googmodule: !no_googmodule,
                es5,
                downlevel: !no_downlevel,
                closurize: !no_closurize,
                externs: externs.map(|e| absolutize(&cwd, &e)),
            };
            commands::transform::run(config, action, cli.json)
        }
        Some(Commands::Version) | None => commands::version::run(),
    }
}
