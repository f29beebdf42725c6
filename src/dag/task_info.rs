// src/dag/task_info.rs

//! Per-target execution state and the values the scheduler hands out.

use std::fmt;

use crate::workflow::{Target, TargetId};

/// Why a target ended without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Outputs were already newer than everything they depend on.
    UpToDate,
    /// An ancestor failed.
    UpstreamFailed,
    /// The run was cancelled before (or while) the target ran.
    Cancelled,
}

/// Execution state of a single target within one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Ready,
    Running,
    Succeeded,
    /// Failed with a human-readable message.
    Failed(String),
    Skipped(SkipReason),
}

impl TargetState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TargetState::Succeeded | TargetState::Failed(_) | TargetState::Skipped(_)
        )
    }

    /// Whether dependents may run after this state.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(
            self,
            TargetState::Succeeded | TargetState::Skipped(SkipReason::UpToDate)
        )
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::Pending => f.write_str("pending"),
            TargetState::Ready => f.write_str("ready"),
            TargetState::Running => f.write_str("running"),
            TargetState::Succeeded => f.write_str("succeeded"),
            TargetState::Failed(_) => f.write_str("failed"),
            TargetState::Skipped(SkipReason::UpToDate) => f.write_str("up to date"),
            TargetState::Skipped(SkipReason::UpstreamFailed) => {
                f.write_str("skipped (upstream failed)")
            }
            TargetState::Skipped(SkipReason::Cancelled) => f.write_str("skipped (cancelled)"),
        }
    }
}

/// How a dispatched target finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Success,
    Failed(String),
}

/// A target the scheduler has just moved to `Running`.
#[derive(Debug, Clone)]
pub struct ScheduledTarget {
    pub id: TargetId,
    pub target: Target,
}
