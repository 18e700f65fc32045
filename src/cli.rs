// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::CacheStorageMode;

/// Command-line arguments for `scenepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scenepipe",
    version,
    about = "Run ordered scene-graph tasks and rerun them when definitions change.",
    long_about = None
)]
pub struct CliArgs {
    /// Entry definition file (TOML).
    #[arg(value_name = "PIPELINE", default_value = "pipeline.toml")]
    pub pipeline: PathBuf,

    /// Input scene graph as JSON. Defaults to an empty root.
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Write the exported graph of the final run here (JSON).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Run once and exit, no watching and no server.
    #[arg(long)]
    pub once: bool,

    /// Dev-server address; overrides `[config].listen`.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Definition files loaded once at startup and never reloaded.
    #[arg(long, value_name = "PATH")]
    pub prelude: Vec<PathBuf>,

    /// Cache storage; overrides `[config].cache_storage`.
    #[arg(long, value_enum, value_name = "MODE")]
    pub cache: Option<CacheArg>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCENEPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate definitions, print the run order, execute nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum CacheArg {
    Memory,
    File,
}

impl From<CacheArg> for CacheStorageMode {
    fn from(arg: CacheArg) -> Self {
        match arg {
            CacheArg::Memory => CacheStorageMode::Memory,
            CacheArg::File => CacheStorageMode::File,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
