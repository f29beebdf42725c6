// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TargetdagError {
    #[error("output '{}' of target '{target}' is already produced by target '{existing}'", .path.display())]
    DuplicateOutput {
        path: PathBuf,
        existing: String,
        target: String,
    },

    #[error("a target named '{0}' is already registered")]
    DuplicateTarget(String),

    #[error("cyclic dependency between targets: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<String> },

    #[error("target '{target}' has no output labelled '{label}'")]
    MissingLabel { target: String, label: String },

    #[error("input '{}' of target '{target}' does not exist and is not produced by any target", .path.display())]
    MissingInput { target: String, path: PathBuf },

    #[error("target '{target}' failed: {message}")]
    TargetExecution { target: String, message: String },

    #[error("scheduler invariant violated: {0}")]
    SchedulerInternal(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TargetdagError>;
