// src/engine/report.rs

use std::fmt;

use crate::dag::{Graph, SkipReason, TargetState};
use crate::workflow::TargetId;

/// Final state of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub id: TargetId,
    pub name: String,
    pub state: TargetState,
    /// Failure message, when the target failed.
    pub message: Option<String>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per target, in registration order.
    pub targets: Vec<TargetReport>,
    /// The run was cancelled before every target could finish.
    pub cancelled: bool,
}

impl RunReport {
    pub fn from_states<I>(graph: &Graph, states: I, cancelled: bool) -> Self
    where
        I: IntoIterator<Item = (TargetId, TargetState)>,
    {
        let targets = states
            .into_iter()
            .map(|(id, state)| {
                let name = graph
                    .target(id)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| id.to_string());
                let message = match &state {
                    TargetState::Failed(msg) => Some(msg.clone()),
                    _ => None,
                };
                TargetReport {
                    id,
                    name,
                    state,
                    message,
                }
            })
            .collect();

        Self { targets, cancelled }
    }

    pub fn get(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn state_of(&self, name: &str) -> Option<&TargetState> {
        self.get(name).map(|t| &t.state)
    }

    fn count(&self, pred: impl Fn(&TargetState) -> bool) -> usize {
        self.targets.iter().filter(|t| pred(&t.state)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, TargetState::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TargetState::Failed(_)))
    }

    pub fn skipped_up_to_date(&self) -> usize {
        self.count(|s| matches!(s, TargetState::Skipped(SkipReason::UpToDate)))
    }

    pub fn skipped_due_to_failure(&self) -> usize {
        self.count(|s| matches!(s, TargetState::Skipped(SkipReason::UpstreamFailed)))
    }

    pub fn skipped_due_to_cancellation(&self) -> usize {
        self.count(|s| matches!(s, TargetState::Skipped(SkipReason::Cancelled)))
    }

    /// A run succeeds when no target failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.targets {
            match &t.message {
                Some(msg) => writeln!(f, "  {:<30} {} ({msg})", t.name, t.state)?,
                None => writeln!(f, "  {:<30} {}", t.name, t.state)?,
            }
        }
        write!(
            f,
            "{} succeeded, {} up to date, {} failed, {} skipped after failure, {} cancelled",
            self.succeeded(),
            self.skipped_up_to_date(),
            self.failed(),
            self.skipped_due_to_failure(),
            self.skipped_due_to_cancellation()
        )?;
        if self.cancelled {
            write!(f, " (run cancelled)")?;
        }
        Ok(())
    }
}
