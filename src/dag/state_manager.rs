// src/dag/state_manager.rs

//! State transitions shared by the scheduler's entry points.

use std::collections::BTreeSet;

use tracing::debug;

use crate::dag::graph::Graph;
use crate::dag::task_info::{SkipReason, TargetState};
use crate::workflow::TargetId;

/// Ready set ordered by topological position, so the first entry is the
/// next target to dispatch.
pub(crate) type ReadySet = BTreeSet<(usize, TargetId)>;

/// Borrowed view over the scheduler's mutable tables.
pub struct StateManager<'a> {
    graph: &'a Graph,
    states: &'a mut [TargetState],
    ready: &'a mut ReadySet,
    /// Topological position of every target.
    position: &'a [usize],
}

impl<'a> StateManager<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        states: &'a mut [TargetState],
        ready: &'a mut ReadySet,
        position: &'a [usize],
    ) -> Self {
        Self {
            graph,
            states,
            ready,
            position,
        }
    }

    /// Whether every direct dependency of `id` lets it run.
    pub fn deps_satisfied(&self, id: TargetId) -> bool {
        self.graph
            .dependencies_of(id)
            .iter()
            .all(|dep| self.states[dep.index()].satisfies_dependents())
    }

    /// Move `id` from `Pending` to `Ready` if its dependencies allow it.
    pub fn try_promote(&mut self, id: TargetId) -> bool {
        if self.states[id.index()] != TargetState::Pending || !self.deps_satisfied(id) {
            return false;
        }
        self.states[id.index()] = TargetState::Ready;
        self.ready.insert((self.position[id.index()], id));
        debug!(id = id.index(), "dependencies satisfied; marking Ready");
        true
    }

    /// Re-evaluate the direct successors of a target that just finished.
    pub fn promote_successors(&mut self, id: TargetId) -> Vec<TargetId> {
        self.graph
            .dependents_of(id)
            .into_iter()
            .filter(|&next| self.try_promote(next))
            .collect()
    }

    /// Mark every non-terminal transitive descendant of `failed` as
    /// `Skipped(UpstreamFailed)`.
    pub fn skip_descendants(&mut self, failed: TargetId) -> Vec<TargetId> {
        let mut stack = self.graph.dependents_of(failed);
        let mut skipped = Vec::new();

        while let Some(id) = stack.pop() {
            let state = &mut self.states[id.index()];
            if matches!(state, TargetState::Pending | TargetState::Ready) {
                *state = TargetState::Skipped(SkipReason::UpstreamFailed);
                self.ready.remove(&(self.position[id.index()], id));
                skipped.push(id);
                stack.extend(self.graph.dependents_of(id));
            }
        }

        skipped.sort();
        skipped
    }

    /// Mark everything that has not started as `Skipped(Cancelled)`, and
    /// running targets too when `include_running` is set.
    pub fn cancel(&mut self, include_running: bool) -> Vec<TargetId> {
        let mut cancelled = Vec::new();
        for (i, state) in self.states.iter_mut().enumerate() {
            let hit = match state {
                TargetState::Pending | TargetState::Ready => true,
                TargetState::Running => include_running,
                _ => false,
            };
            if hit {
                *state = TargetState::Skipped(SkipReason::Cancelled);
                cancelled.push(TargetId(i));
            }
        }
        self.ready.clear();
        cancelled
    }
}
