// src/engine/journal.rs

//! Durable record of target state transitions.
//!
//! Before a target's command starts, `running` is appended to the journal and
//! synced to disk. A target whose last entry is still `running` when the
//! next run starts was interrupted and gets rebuilt. That includes targets
//! killed on cancellation, which are never marked finished.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Name of the journal file inside the state directory.
pub const JOURNAL_FILE_NAME: &str = "journal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalState {
    Running,
    Succeeded,
    Failed,
}

impl JournalState {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(JournalState::Running),
            "succeeded" => Some(JournalState::Succeeded),
            "failed" => Some(JournalState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JournalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JournalState::Running => "running",
            JournalState::Succeeded => "succeeded",
            JournalState::Failed => "failed",
        })
    }
}

/// Where the runtime records state transitions.
pub trait StateJournal: Send {
    /// Targets whose last recorded state is `running`.
    fn interrupted(&self) -> Result<HashSet<String>>;

    /// Append a transition. Must be durable when it returns.
    fn record(&mut self, target: &str, state: JournalState) -> Result<()>;

    /// Drop the entries of finished targets, keeping only those still
    /// `running`. Called once a run has ended.
    fn compact(&mut self) -> Result<()>;
}

fn last_running<'a, I>(entries: I) -> HashSet<String>
where
    I: IntoIterator<Item = (&'a str, JournalState)>,
{
    let mut last: HashMap<&str, JournalState> = HashMap::new();
    for (name, state) in entries {
        last.insert(name, state);
    }
    last.into_iter()
        .filter(|(_, s)| *s == JournalState::Running)
        .map(|(n, _)| n.to_string())
        .collect()
}

/// Append-only journal at `<state_dir>/journal`, one `name state` per line.
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
}

impl FileJournal {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(JOURNAL_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileJournal {
    fn read_entries(&self) -> Result<Vec<(String, JournalState)>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("opening journal at {:?}", self.path))?;

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let Some((name, state)) = line.trim().rsplit_once(' ') else {
                continue;
            };
            match JournalState::parse(state) {
                Some(state) => entries.push((name.to_string(), state)),
                None => return Err(anyhow!("corrupt journal line {:?} in {:?}", line, self.path)),
            }
        }
        Ok(entries)
    }
}

impl StateJournal for FileJournal {
    fn interrupted(&self) -> Result<HashSet<String>> {
        let entries = self.read_entries()?;
        Ok(last_running(entries.iter().map(|(n, s)| (n.as_str(), *s))))
    }

    fn record(&mut self, target: &str, state: JournalState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating state directory at {:?}", parent))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening journal at {:?}", self.path))?;
        writeln!(file, "{} {}", target, state)?;
        file.flush()?;
        file.sync_data()
            .with_context(|| format!("syncing journal at {:?}", self.path))?;

        debug!(target_name = %target, %state, "journal entry recorded");
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        let mut still_running: Vec<String> = self.interrupted()?.into_iter().collect();

        if still_running.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("removing journal at {:?}", self.path)),
            };
        }

        still_running.sort();
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)
                .with_context(|| format!("creating journal at {:?}", tmp))?;
            for name in &still_running {
                writeln!(file, "{} {}", name, JournalState::Running)?;
            }
            file.sync_data()
                .with_context(|| format!("syncing journal at {:?}", tmp))?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing journal at {:?}", self.path))?;

        debug!(kept = still_running.len(), "journal compacted");
        Ok(())
    }
}

/// In-memory journal; clones share the same entries so tests can inspect
/// what a runtime recorded.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    entries: Arc<Mutex<Vec<(String, JournalState)>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, JournalState)> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl StateJournal for MemoryJournal {
    fn interrupted(&self) -> Result<HashSet<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("journal lock poisoned"))?;
        Ok(last_running(entries.iter().map(|(n, s)| (n.as_str(), *s))))
    }

    fn record(&mut self, target: &str, state: JournalState) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("journal lock poisoned"))?
            .push((target.to_string(), state));
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("journal lock poisoned"))?;
        let mut still_running: Vec<String> =
            last_running(entries.iter().map(|(n, s)| (n.as_str(), *s)))
                .into_iter()
                .collect();
        still_running.sort();
        *entries = still_running
            .into_iter()
            .map(|name| (name, JournalState::Running))
            .collect();
        Ok(())
    }
}
