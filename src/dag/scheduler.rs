// src/dag/scheduler.rs

use tracing::{debug, info, warn};

use crate::dag::graph::Graph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadySet, StateManager};
use crate::dag::task_info::{ScheduledTarget, SkipReason, TargetOutcome, TargetState};
use crate::errors::{Result, TargetdagError};
use crate::freshness::StalenessPlan;
use crate::workflow::TargetId;

/// Per-run state machine over an immutable [`Graph`].
///
/// The scheduler owns the execution-state table. Every transition goes
/// through `&mut self`, so removing a target from the ready set and marking
/// it `Running` happen together and a target can be dispatched once only.
///
/// It does no I/O; the async runtime drives it.
#[derive(Debug)]
pub struct Scheduler<'g> {
    graph: &'g Graph,
    states: Vec<TargetState>,
    ready: ReadySet,
    position: Vec<usize>,
    running: usize,
}

impl<'g> Scheduler<'g> {
    /// Seed states from a staleness plan: up-to-date targets start as
    /// `Skipped(UpToDate)`, stale ones as `Pending`, and pending targets whose
    /// dependencies are all satisfied become `Ready`.
    pub fn new(graph: &'g Graph, plan: &StalenessPlan) -> Result<Self> {
        if plan.len() != graph.len() {
            return Err(TargetdagError::SchedulerInternal(format!(
                "staleness plan covers {} targets, graph has {}",
                plan.len(),
                graph.len()
            )));
        }

        let mut position = vec![0; graph.len()];
        for (pos, id) in graph.topo_order().iter().enumerate() {
            position[id.index()] = pos;
        }

        let states = graph
            .targets()
            .map(|(id, _)| {
                if plan.is_stale(id) {
                    TargetState::Pending
                } else {
                    TargetState::Skipped(SkipReason::UpToDate)
                }
            })
            .collect();

        let mut scheduler = Self {
            graph,
            states,
            ready: ReadySet::new(),
            position,
            running: 0,
        };

        let mut manager = scheduler.manager();
        let ready: Vec<TargetId> = graph
            .topo_order()
            .iter()
            .copied()
            .filter(|&id| manager.try_promote(id))
            .collect();

        debug!(
            ready = ready.len(),
            stale = plan.stale_count(),
            "scheduler initialised"
        );

        Ok(scheduler)
    }

    fn manager(&mut self) -> StateManager<'_> {
        StateManager::new(self.graph, &mut self.states, &mut self.ready, &self.position)
    }

    /// Claim the next ready target, moving it to `Running`.
    ///
    /// Returns `Ok(None)` when nothing is ready right now (or the run is
    /// over). Errors when the run can make no further progress even though
    /// targets remain unfinished.
    pub fn next_ready(&mut self) -> Result<Option<ScheduledTarget>> {
        let Some((pos, id)) = self.ready.pop_first() else {
            if self.running == 0 && !self.is_finished() {
                return Err(TargetdagError::SchedulerInternal(format!(
                    "no target ready or running, but {} not finished",
                    self.unfinished_count()
                )));
            }
            return Ok(None);
        };

        let state = &mut self.states[id.index()];
        if *state != TargetState::Ready {
            return Err(TargetdagError::SchedulerInternal(format!(
                "target {id} at position {pos} was in the ready set while {state}"
            )));
        }
        *state = TargetState::Running;
        self.running += 1;

        let target = self
            .graph
            .target(id)
            .ok_or_else(|| TargetdagError::SchedulerInternal(format!("unknown target {id}")))?
            .clone();

        info!(target_name = %target.name, running = self.running, "dispatching target");
        Ok(Some(ScheduledTarget { id, target }))
    }

    /// Record how a running target finished.
    pub fn complete(&mut self, id: TargetId, outcome: TargetOutcome) -> Result<SchedulerStep> {
        let name = self.name_of(id)?;
        match self.states.get(id.index()) {
            Some(TargetState::Running) => {}
            Some(other) => {
                return Err(TargetdagError::SchedulerInternal(format!(
                    "completion for target '{name}' while {other}"
                )));
            }
            None => {
                return Err(TargetdagError::SchedulerInternal(format!(
                    "completion for unknown target {id}"
                )));
            }
        }
        self.running -= 1;

        let mut step = SchedulerStep::default();
        match outcome {
            TargetOutcome::Success => {
                self.states[id.index()] = TargetState::Succeeded;
                debug!(target_name = %name, "target succeeded");
                step.newly_ready = self.manager().promote_successors(id);
            }
            TargetOutcome::Failed(message) => {
                warn!(
                    target_name = %name,
                    error = %message,
                    "target failed; skipping its dependents"
                );
                self.states[id.index()] = TargetState::Failed(message);
                step.newly_skipped = self.manager().skip_descendants(id);
            }
        }

        Ok(step)
    }

    /// Stop the run: pending and ready targets (and running ones if
    /// `include_running` is set) become `Skipped(Cancelled)`.
    pub fn cancel_remaining(&mut self, include_running: bool) -> Vec<TargetId> {
        let cancelled = self.manager().cancel(include_running);
        if include_running {
            self.running = 0;
        }
        info!(
            cancelled = cancelled.len(),
            still_running = self.running,
            "cancelled remaining targets"
        );
        cancelled
    }

    /// Whether every target is in a terminal state.
    pub fn is_finished(&self) -> bool {
        self.states.iter().all(TargetState::is_terminal)
    }

    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn state_of(&self, id: TargetId) -> Option<&TargetState> {
        self.states.get(id.index())
    }

    /// Current state of every target, in registration order.
    pub fn snapshot(&self) -> Vec<(TargetId, TargetState)> {
        self.states
            .iter()
            .enumerate()
            .map(|(i, s)| (TargetId(i), s.clone()))
            .collect()
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    fn unfinished_count(&self) -> usize {
        self.states.iter().filter(|s| !s.is_terminal()).count()
    }

    fn name_of(&self, id: TargetId) -> Result<String> {
        self.graph
            .target(id)
            .map(|t| t.name.clone())
            .ok_or_else(|| TargetdagError::SchedulerInternal(format!("unknown target {id}")))
    }
}
