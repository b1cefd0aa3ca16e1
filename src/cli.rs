// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `assetflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetflow",
    version,
    about = "Build, watch and serve front-end assets from a declarative task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Task or graph to run.
    ///
    /// Default: the graph named `default`.
    #[arg(value_name = "ENTRY", default_value = "default")]
    pub entry: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `Assetflow.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Assetflow.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the graph of the entry, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// List the registered tasks and graphs, then exit.
    #[arg(long)]
    pub list: bool,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
