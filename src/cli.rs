// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_workflow_path;

/// Command-line arguments for `targetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "targetdag",
    version,
    about = "Run file-based workflow targets in dependency order, rebuilding only what is stale.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (TOML).
    ///
    /// Default: `Workflow.toml` in the current working directory.
    #[arg(
        long,
        short = 'f',
        value_name = "PATH",
        default_value_os_t = default_workflow_path(),
        global = true
    )]
    pub workflow: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TARGETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the selected targets that are stale.
    Run(RunArgs),

    /// Show whether each target is up to date.
    Status(StatusArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Glob patterns selecting targets by name; all targets if omitted.
    #[arg(value_name = "PATTERN")]
    pub patterns: Vec<String>,

    /// Maximum number of targets running at once; overrides `[config]`.
    #[arg(long, short = 'j', value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// Print what would run, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,

    /// Kill running targets on Ctrl-C instead of letting them finish.
    #[arg(long)]
    pub kill_on_cancel: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct StatusArgs {
    /// Glob patterns selecting targets by name; all targets if omitted.
    #[arg(value_name = "PATTERN")]
    pub patterns: Vec<String>,
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
