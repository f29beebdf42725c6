// src/config/mod.rs

//! Workflow file loading and validation for targetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a workflow file from disk (`loader.rs`).
//! - Turn it into a registry and dependency graph (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_workflow_path, load_and_validate, load_from_path, workflow_root_dir};
pub use model::{ConfigSection, RawWorkflowFile, TargetConfig, WorkflowFile};
