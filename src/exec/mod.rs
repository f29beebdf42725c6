// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the [`Executor`] trait the runtime dispatches
//!   through, plus the request/result types.
//! - [`command`] runs commands as local processes with `tokio::process`,
//!   writing their output to per-target log files.

pub mod backend;
pub mod command;

pub use backend::{ExecutionFuture, ExecutionRequest, ExecutionResult, Executor};
pub use command::ShellExecutor;
