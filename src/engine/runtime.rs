// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dag::{Graph, Scheduler, TargetOutcome, TargetState};
use crate::errors::{Result, TargetdagError};
use crate::exec::{ExecutionRequest, ExecutionResult, Executor};
use crate::freshness::hash::compute_hash_for_paths;
use crate::freshness::{Analyzer, HashStore, MemoryHashStore, StalenessPlan};
use crate::fs::FileSystem;
use crate::types::{CancelPolicy, StalenessMode};
use crate::workflow::{Target, TargetId};

use super::cancel::CancellationToken;
use super::journal::{JournalState, MemoryJournal, StateJournal};
use super::report::RunReport;
use super::DEFAULT_CONCURRENCY;

/// Knobs for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of targets running at once (at least 1).
    pub concurrency: usize,
    pub cancel_policy: CancelPolicy,
    pub staleness: StalenessMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            cancel_policy: CancelPolicy::default(),
            staleness: StalenessMode::default(),
        }
    }
}

type WorkerOutput = (TargetId, Result<ExecutionResult>);

/// Async shell around the pure [`Scheduler`].
///
/// The runtime owns the scheduler for the duration of a run and is the only
/// place that touches it; command futures run in a [`JoinSet`] and only
/// report back their result.
pub struct Runtime<E: Executor> {
    executor: E,
    fs: Arc<dyn FileSystem>,
    journal: Box<dyn StateJournal>,
    hashes: Box<dyn HashStore>,
    options: RunOptions,
}

impl<E: Executor> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("fs", &self.fs)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: Executor> Runtime<E> {
    /// Runtime with an in-memory journal and hash store.
    pub fn new(executor: E, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            executor,
            fs,
            journal: Box::new(MemoryJournal::new()),
            hashes: Box::new(MemoryHashStore::new()),
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_journal(mut self, journal: impl StateJournal + 'static) -> Self {
        self.journal = Box::new(journal);
        self
    }

    pub fn with_hash_store(mut self, hashes: impl HashStore + 'static) -> Self {
        self.hashes = Box::new(hashes);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Work out which targets are stale, without running anything.
    ///
    /// Targets left `running` by an interrupted previous run count as stale.
    pub fn plan(&self, graph: &Graph) -> Result<StalenessPlan> {
        let interrupted = self.journal.interrupted()?;
        if !interrupted.is_empty() {
            let mut names: Vec<_> = interrupted.iter().cloned().collect();
            names.sort();
            warn!(
                targets = ?names,
                "targets were interrupted in a previous run; they will be rebuilt"
            );
        }

        Analyzer::new(
            self.fs.as_ref(),
            self.options.staleness,
            self.hashes.as_ref(),
            &interrupted,
        )
        .analyze(graph)
    }

    /// Analyze staleness, then run every stale target.
    ///
    /// Build-time problems (missing inputs, journal I/O) abort before any
    /// target runs. A failing target never aborts the run; its descendants
    /// are skipped and the rest of the graph carries on.
    pub async fn run(&mut self, graph: &Graph, cancel: CancellationToken) -> Result<RunReport> {
        let plan = self.plan(graph)?;
        self.execute(graph, &plan, cancel).await
    }

    /// Run the stale targets of an existing plan.
    pub async fn execute(
        &mut self,
        graph: &Graph,
        plan: &StalenessPlan,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let mut scheduler = Scheduler::new(graph, plan)?;
        let concurrency = self.options.concurrency.max(1);
        let mut workers: JoinSet<WorkerOutput> = JoinSet::new();
        let mut in_flight: HashMap<Id, TargetId> = HashMap::new();
        let mut cancelled = false;

        info!(
            targets = graph.len(),
            stale = plan.stale_count(),
            concurrency,
            cancel_policy = ?self.options.cancel_policy,
            "run started"
        );

        loop {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                self.cancel_run(&mut scheduler, &mut workers, &mut in_flight)
                    .await?;
            }

            if !cancelled {
                while scheduler.running_count() < concurrency {
                    let Some(next) = scheduler.next_ready()? else {
                        break;
                    };

                    // Durable before the command starts.
                    self.journal
                        .record(&next.target.name, JournalState::Running)?;

                    let request = ExecutionRequest::for_target(&next.target);
                    let fut = self.executor.execute(request);
                    let id = next.id;
                    let handle = workers.spawn(async move { (id, fut.await) });
                    in_flight.insert(handle.id(), id);
                }
            }

            if workers.is_empty() {
                if scheduler.is_finished() {
                    break;
                }
                return Err(TargetdagError::SchedulerInternal(format!(
                    "nothing running and {} targets ready, but the run is not finished",
                    scheduler.ready_count()
                )));
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    self.cancel_run(&mut scheduler, &mut workers, &mut in_flight).await?;
                }

                joined = workers.join_next_with_id() => {
                    let (task_id, (id, result)) = match joined {
                        Some(Ok(done)) => done,
                        Some(Err(e)) => {
                            let Some(id) = in_flight.remove(&e.id()) else {
                                continue;
                            };
                            error!(error = %e, "target worker panicked");
                            (e.id(), (id, Err(TargetdagError::TargetExecution {
                                target: graph.target(id).map(|t| t.name.clone()).unwrap_or_default(),
                                message: e.to_string(),
                            })))
                        }
                        None => continue,
                    };
                    in_flight.remove(&task_id);
                    self.finish(graph, &mut scheduler, id, result)?;
                }
            }
        }

        // Killed targets, and interrupted targets outside this graph, stay
        // `running` so the next run rebuilds them.
        if let Err(e) = self.journal.compact() {
            warn!(error = %e, "failed to compact the state journal");
        }

        let report = RunReport::from_states(graph, scheduler.snapshot(), cancelled);
        info!(
            succeeded = report.succeeded(),
            up_to_date = report.skipped_up_to_date(),
            failed = report.failed(),
            skipped_after_failure = report.skipped_due_to_failure(),
            cancelled = report.skipped_due_to_cancellation(),
            "run finished"
        );
        Ok(report)
    }

    async fn cancel_run(
        &mut self,
        scheduler: &mut Scheduler<'_>,
        workers: &mut JoinSet<WorkerOutput>,
        in_flight: &mut HashMap<Id, TargetId>,
    ) -> Result<()> {
        match self.options.cancel_policy {
            CancelPolicy::Drain => {
                warn!(
                    running = scheduler.running_count(),
                    "cancellation requested; waiting for running targets to finish"
                );
                scheduler.cancel_remaining(false);
            }
            CancelPolicy::Kill => {
                warn!(
                    running = scheduler.running_count(),
                    "cancellation requested; killing running targets"
                );
                let running: Vec<TargetId> = scheduler
                    .snapshot()
                    .into_iter()
                    .filter(|(_, s)| *s == TargetState::Running)
                    .map(|(id, _)| id)
                    .collect();

                // Dropping the futures kills their child processes.
                workers.shutdown().await;
                in_flight.clear();
                scheduler.cancel_remaining(true);

                // Their journal entries stay `running`: partial outputs must
                // not pass as up to date next time.
                for id in running {
                    if let Some(target) = scheduler.graph().target(id) {
                        warn!(target_name = %target.name, "target killed");
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(
        &mut self,
        graph: &Graph,
        scheduler: &mut Scheduler<'_>,
        id: TargetId,
        result: Result<ExecutionResult>,
    ) -> Result<()> {
        let target = graph
            .target(id)
            .ok_or_else(|| TargetdagError::SchedulerInternal(format!("unknown target {id}")))?;

        let outcome = match result {
            Ok(res) if res.is_success() => {
                self.journal.record(&target.name, JournalState::Succeeded)?;
                self.after_success(target);
                TargetOutcome::Success
            }
            Ok(res) => {
                self.journal.record(&target.name, JournalState::Failed)?;
                TargetOutcome::Failed(res.failure_message())
            }
            Err(e) => {
                error!(target_name = %target.name, error = %e, "target execution error");
                self.journal.record(&target.name, JournalState::Failed)?;
                TargetOutcome::Failed(e.to_string())
            }
        };

        let step = scheduler.complete(id, outcome)?;
        debug!(
            target_name = %target.name,
            newly_ready = step.newly_ready.len(),
            newly_skipped = step.newly_skipped.len(),
            "completion processed"
        );
        Ok(())
    }

    /// Bookkeeping after a successful command: flag outputs the command did
    /// not produce and, in hash mode, remember the input hash.
    fn after_success(&mut self, target: &Target) {
        for path in target.output_paths() {
            if !self.fs.exists(path) {
                warn!(
                    target_name = %target.name,
                    path = %path.display(),
                    "target succeeded but did not create a declared output"
                );
            }
        }

        if self.options.staleness == StalenessMode::Hash {
            let saved = compute_hash_for_paths(self.fs.as_ref(), &target.inputs)
                .and_then(|hash| self.hashes.save(&target.name, &hash));
            if let Err(e) = saved {
                warn!(target_name = %target.name, error = %e, "failed to store input hash");
            }
        }
    }
}
