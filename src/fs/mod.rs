// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

pub mod mock;

/// What the staleness analyzer needs to know about a file artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub exists: bool,
    /// Last modification time; `None` when the file does not exist.
    pub mtime: Option<SystemTime>,
}

impl FileStat {
    pub fn missing() -> Self {
        Self {
            exists: false,
            mtime: None,
        }
    }

    pub fn present(mtime: SystemTime) -> Self {
        Self {
            exists: true,
            mtime: Some(mtime),
        }
    }
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Stat a path. A missing file is not an error; it yields
    /// [`FileStat::missing`].
    fn stat(&self, path: &Path) -> Result<FileStat>;

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    fn exists(&self, path: &Path) -> bool {
        self.stat(path).map(|s| s.exists).unwrap_or(false)
    }
}

/// Implementation that uses `std::fs`.
///
/// Relative paths are resolved against `root` when one is set, so targets can
/// declare paths relative to the workflow file.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem {
    root: Option<PathBuf>,
}

impl RealFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl FileSystem for RealFileSystem {
    fn stat(&self, path: &Path) -> Result<FileStat> {
        let full = self.resolve(path);
        match fs::metadata(&full) {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .with_context(|| format!("reading mtime of {:?}", full))?;
                Ok(FileStat::present(mtime))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileStat::missing()),
            Err(e) => Err(e).with_context(|| format!("stat {:?}", full)),
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let full = self.resolve(path);
        let file = fs::File::open(&full).with_context(|| format!("opening file {:?}", full))?;
        Ok(Box::new(file))
    }
}
