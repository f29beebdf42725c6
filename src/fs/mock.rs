// src/fs/mock.rs

use super::{FileStat, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
struct MockEntry {
    content: Vec<u8>,
    mtime: SystemTime,
}

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<PathBuf, MockEntry>,
    /// Logical clock in seconds; every write advances it by one.
    clock: u64,
}

impl MockState {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(self.clock)
    }
}

/// In-memory filesystem with a logical clock.
///
/// Each `add_file`/`touch` gets a strictly later mtime than the previous one,
/// so tests can reason about staleness without sleeping.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A test that panicked while holding the lock leaves the files intact.
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.state();
        let mtime = state.tick();
        state.files.insert(
            path.as_ref().to_path_buf(),
            MockEntry {
                content: content.into(),
                mtime,
            },
        );
    }

    /// Bump the mtime of a file, creating it empty if missing.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut state = self.state();
        let mtime = state.tick();
        state
            .files
            .entry(path.as_ref().to_path_buf())
            .and_modify(|e| e.mtime = mtime)
            .or_insert(MockEntry {
                content: Vec::new(),
                mtime,
            });
    }

    pub fn set_mtime(&self, path: impl AsRef<Path>, mtime: SystemTime) {
        let mut state = self.state();
        if let Some(entry) = state.files.get_mut(path.as_ref()) {
            entry.mtime = mtime;
        }
    }

    pub fn mtime_of(&self, path: impl AsRef<Path>) -> Option<SystemTime> {
        let state = self.state();
        state.files.get(path.as_ref()).map(|e| e.mtime)
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        let mut state = self.state();
        state.files.remove(path.as_ref());
    }
}

impl FileSystem for MockFileSystem {
    fn stat(&self, path: &Path) -> Result<FileStat> {
        let state = self.state();
        Ok(match state.files.get(path) {
            Some(entry) => FileStat::present(entry.mtime),
            None => FileStat::missing(),
        })
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let state = self.state();
        match state.files.get(path) {
            Some(entry) => Ok(Box::new(Cursor::new(entry.content.clone()))),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }
}
