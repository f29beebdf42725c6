// src/freshness/analyzer.rs

//! Decide which targets must run.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::dag::Graph;
use crate::errors::{Result, TargetdagError};
use crate::freshness::hash::{HashStore, compute_hash_for_paths};
use crate::fs::FileSystem;
use crate::types::StalenessMode;
use crate::workflow::{Target, TargetId};

/// Why a target has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// No outputs declared; nothing to compare against.
    NoOutputs,
    /// Recorded as running when a previous run stopped.
    Interrupted,
    MissingOutput(PathBuf),
    /// A direct dependency will be rebuilt.
    UpstreamStale(String),
    /// An input is strictly newer than the oldest output.
    NewerInput(PathBuf),
    /// Hash mode: nothing stored since the last success.
    NoRecordedHash,
    /// Hash mode: input contents differ from the stored hash.
    InputsChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NoOutputs => f.write_str("declares no outputs"),
            StaleReason::Interrupted => f.write_str("interrupted in a previous run"),
            StaleReason::MissingOutput(p) => write!(f, "output {} is missing", p.display()),
            StaleReason::UpstreamStale(name) => write!(f, "dependency '{name}' is stale"),
            StaleReason::NewerInput(p) => write!(f, "input {} is newer than outputs", p.display()),
            StaleReason::NoRecordedHash => f.write_str("no recorded input hash"),
            StaleReason::InputsChanged => f.write_str("input contents changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    UpToDate,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale(_))
    }
}

/// Freshness of every target in a graph, indexed by [`TargetId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StalenessPlan {
    entries: Vec<Freshness>,
}

impl StalenessPlan {
    pub fn from_entries(entries: Vec<Freshness>) -> Self {
        Self { entries }
    }

    /// Plan in which every target is stale, as for a forced rebuild.
    pub fn all_stale(graph: &Graph) -> Self {
        Self {
            entries: vec![Freshness::Stale(StaleReason::NoRecordedHash); graph.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: TargetId) -> Option<&Freshness> {
        self.entries.get(id.index())
    }

    pub fn is_stale(&self, id: TargetId) -> bool {
        self.get(id).is_some_and(Freshness::is_stale)
    }

    pub fn stale_count(&self) -> usize {
        self.entries.iter().filter(|f| f.is_stale()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Freshness)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, f)| (TargetId(i), f))
    }
}

/// Staleness analysis over a built graph.
pub struct Analyzer<'a> {
    fs: &'a dyn FileSystem,
    mode: StalenessMode,
    hashes: &'a dyn HashStore,
    interrupted: &'a HashSet<String>,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        mode: StalenessMode,
        hashes: &'a dyn HashStore,
        interrupted: &'a HashSet<String>,
    ) -> Self {
        Self {
            fs,
            mode,
            hashes,
            interrupted,
        }
    }

    /// Classify every target, visiting them in topological order so that
    /// upstream staleness is known before its dependents are examined.
    ///
    /// Fails with [`TargetdagError::MissingInput`] when an input is neither
    /// present nor produced by any target.
    pub fn analyze(&self, graph: &Graph) -> Result<StalenessPlan> {
        let mut entries = vec![Freshness::UpToDate; graph.len()];

        for &id in graph.topo_order() {
            let target = graph
                .target(id)
                .ok_or_else(|| TargetdagError::SchedulerInternal(format!("unknown target {id}")))?;

            let freshness = self.classify(graph, id, target, &entries)?;
            match &freshness {
                Freshness::Stale(reason) => {
                    debug!(target_name = %target.name, %reason, "target is stale")
                }
                Freshness::UpToDate => debug!(target_name = %target.name, "target is up to date"),
            }
            entries[id.index()] = freshness;
        }

        let plan = StalenessPlan { entries };
        info!(
            stale = plan.stale_count(),
            total = plan.len(),
            mode = ?self.mode,
            "staleness analysis complete"
        );
        Ok(plan)
    }

    fn classify(
        &self,
        graph: &Graph,
        id: TargetId,
        target: &Target,
        done: &[Freshness],
    ) -> Result<Freshness> {
        for path in graph.external_inputs(id) {
            if !self.fs.stat(path)?.exists {
                return Err(TargetdagError::MissingInput {
                    target: target.name.clone(),
                    path: path.to_path_buf(),
                });
            }
        }

        if target.outputs.is_empty() {
            return Ok(Freshness::Stale(StaleReason::NoOutputs));
        }

        if self.interrupted.contains(&target.name) {
            return Ok(Freshness::Stale(StaleReason::Interrupted));
        }

        let mut oldest_output: Option<SystemTime> = None;
        for path in target.output_paths() {
            let stat = self.fs.stat(path)?;
            match stat.mtime {
                Some(mtime) if stat.exists => {
                    oldest_output = Some(oldest_output.map_or(mtime, |o| o.min(mtime)));
                }
                _ => return Ok(Freshness::Stale(StaleReason::MissingOutput(path.to_path_buf()))),
            }
        }

        for dep in graph.dependencies_of(id) {
            if done[dep.index()].is_stale() {
                let name = graph
                    .target(dep)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| dep.to_string());
                return Ok(Freshness::Stale(StaleReason::UpstreamStale(name)));
            }
        }

        match self.mode {
            StalenessMode::Mtime => {
                let Some(oldest) = oldest_output else {
                    return Ok(Freshness::Stale(StaleReason::NoOutputs));
                };
                if let Some(path) = self.newest_input_after(target, oldest)? {
                    return Ok(Freshness::Stale(StaleReason::NewerInput(path)));
                }
            }
            StalenessMode::Hash => {
                let current = compute_hash_for_paths(self.fs, &target.inputs)?;
                match self.hashes.load(&target.name)? {
                    None => return Ok(Freshness::Stale(StaleReason::NoRecordedHash)),
                    Some(stored) if stored != current => {
                        return Ok(Freshness::Stale(StaleReason::InputsChanged));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Freshness::UpToDate)
    }

    /// The newest input whose mtime is strictly later than `oldest_output`.
    fn newest_input_after(
        &self,
        target: &Target,
        oldest_output: SystemTime,
    ) -> Result<Option<PathBuf>> {
        let mut newest: Option<(SystemTime, &Path)> = None;
        for path in &target.inputs {
            if let Some(mtime) = self.fs.stat(path)?.mtime {
                if newest.is_none_or(|(t, _)| mtime > t) {
                    newest = Some((mtime, path.as_path()));
                }
            }
        }

        Ok(newest
            .filter(|(t, _)| *t > oldest_output)
            .map(|(_, p)| p.to_path_buf()))
    }
}
