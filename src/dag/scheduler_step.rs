// src/dag/scheduler_step.rs

use crate::workflow::TargetId;

/// What changed as a result of one completion.
///
/// Useful for tests that step the scheduler by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Direct successors that became `Ready`.
    pub newly_ready: Vec<TargetId>,
    /// Descendants marked `Skipped(UpstreamFailed)` by a failure.
    pub newly_skipped: Vec<TargetId>,
}
