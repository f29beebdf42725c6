// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawWorkflowFile, WorkflowFile};
use crate::errors::Result;

/// Load a workflow file from a given path and return the raw `RawWorkflowFile`.
///
/// This only performs TOML deserialization; it does **not** build the
/// registry or graph. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWorkflowFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let workflow: RawWorkflowFile = toml::from_str(&contents)?;

    Ok(workflow)
}

/// Load a workflow file and build its registry and dependency graph.
///
/// Fails on:
/// - TOML syntax or type errors,
/// - invalid `[config]` values,
/// - targets without exactly one of `spec` / `program`,
/// - duplicate target names or outputs,
/// - dependency cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorkflowFile> {
    let raw = load_from_path(&path)?;
    let workflow = WorkflowFile::try_from(raw)?;
    Ok(workflow)
}

/// Default workflow file: `Workflow.toml` in the current working directory.
pub fn default_workflow_path() -> PathBuf {
    PathBuf::from("Workflow.toml")
}

/// Directory the paths in a workflow file are relative to.
///
/// A bare file name such as `Workflow.toml` has an empty parent; that means
/// the current working directory.
pub fn workflow_root_dir(workflow_path: &Path) -> PathBuf {
    match workflow_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
