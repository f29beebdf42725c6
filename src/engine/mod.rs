// src/engine/mod.rs

//! Orchestration engine for targetdag.
//!
//! This module ties together:
//! - the staleness analysis that decides what has to run
//! - the pure DAG scheduler (see [`crate::dag`])
//! - the async runtime loop that dispatches ready targets to an
//!   [`Executor`](crate::exec::Executor) and reacts to:
//!   - target completions
//!   - cancellation requests
//!
//! The async/IO shell is implemented in [`runtime`]; [`journal`] makes the
//! `running` transition durable and [`report`] summarises a finished run.

use std::sync::Arc;

use crate::dag::Graph;
use crate::errors::Result;
use crate::exec::Executor;
use crate::fs::FileSystem;

/// Concurrency used when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

pub mod cancel;
pub mod journal;
pub mod report;
pub mod runtime;

pub use cancel::CancellationToken;
pub use journal::{FileJournal, JournalState, MemoryJournal, StateJournal};
pub use report::{RunReport, TargetReport};
pub use runtime::{RunOptions, Runtime};

/// Run every stale target of `graph` with at most `concurrency` at once.
///
/// Uses mtime staleness, the drain cancellation policy and in-memory
/// journal and hash storage. Build a [`Runtime`] for anything else.
pub async fn run<E: Executor>(
    graph: &Graph,
    concurrency: usize,
    cancel: CancellationToken,
    executor: E,
    fs: Arc<dyn FileSystem>,
) -> Result<RunReport> {
    let options = RunOptions {
        concurrency,
        ..RunOptions::default()
    };
    Runtime::new(executor, fs)
        .with_options(options)
        .run(graph, cancel)
        .await
}
