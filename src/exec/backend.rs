// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The runtime talks to an [`Executor`] instead of spawning processes itself.
//! Production code uses [`ShellExecutor`](super::ShellExecutor); tests provide
//! a fake that records what was started and reports canned outcomes.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;
use crate::workflow::{CommandSpec, Options, Target};

/// Everything an executor needs to run one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub target: String,
    pub command: CommandSpec,
    pub options: Options,
    /// Declared output paths, so the executor can prepare their directories.
    pub outputs: Vec<PathBuf>,
}

impl ExecutionRequest {
    pub fn for_target(target: &Target) -> Self {
        Self {
            target: target.name.clone(),
            command: target.command.clone(),
            options: target.options.clone(),
            outputs: target.outputs.values().cloned().collect(),
        }
    }
}

/// How a command finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    /// Exit code 0 is success; everything else is failure.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Failure message for the run report.
    pub fn failure_message(&self) -> String {
        let mut msg = match self.exit_code {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by signal".to_string(),
        };
        if let Some(stderr) = &self.stderr {
            msg.push_str(&format!(" (stderr: {})", stderr.display()));
        }
        msg
    }
}

pub type ExecutionFuture = Pin<Box<dyn Future<Output = Result<ExecutionResult>> + Send + 'static>>;

/// Trait abstracting how a target's command is run.
///
/// The returned future owns everything it needs, so the runtime can keep many
/// of them in flight and drop (cancel) them independently.
pub trait Executor: Send + Sync {
    fn execute(&self, request: ExecutionRequest) -> ExecutionFuture;
}
