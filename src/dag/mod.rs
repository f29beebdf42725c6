// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] derives the dependency graph from declared paths and computes
//!   a deterministic topological order.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   targets are ready, and what happens to dependents on success or failure.
//! - [`task_info`] provides the execution-state and outcome types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::Graph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTarget, SkipReason, TargetOutcome, TargetState};
