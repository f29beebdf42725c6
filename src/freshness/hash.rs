// src/freshness/hash.rs

//! Content hashes of target inputs, for `staleness = "hash"`.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use blake3::Hasher;
use tracing::{debug, info};

use crate::fs::FileSystem;

/// Name of the hash file inside the state directory.
pub const HASH_FILE_NAME: &str = "hashes";

const MISSING_MARKER: &[u8] = b"<missing>";

/// blake3 of one file's contents, as hex.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let reader = fs
        .open_read(path)
        .with_context(|| format!("opening {:?} for hashing", path))?;
    let mut hasher = Hasher::new();
    hasher
        .update_reader(reader)
        .with_context(|| format!("reading {:?} for hashing", path))?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// One hash over a set of files.
///
/// Paths are sorted and deduplicated first. Each path takes part in the hash,
/// so renaming an input changes it too. A missing file hashes as a fixed
/// marker.
pub fn compute_hash_for_paths<I, P>(fs: &dyn FileSystem, paths: I) -> Result<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut sorted: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    sorted.sort();
    sorted.dedup();

    let mut hasher = Hasher::new();
    for path in &sorted {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        if fs.stat(path)?.exists {
            hasher.update(compute_file_hash(fs, path)?.as_bytes());
        } else {
            hasher.update(MISSING_MARKER);
        }
        hasher.update(b"\n");
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(files = sorted.len(), %hash, "hashed input set");
    Ok(hash)
}

/// Where input hashes live between runs.
pub trait HashStore: Send + Sync {
    fn load(&self, target: &str) -> Result<Option<String>>;
    fn save(&mut self, target: &str, hash: &str) -> Result<()>;
    /// Forget every target not named in `active_targets`.
    fn prune(&mut self, active_targets: &[&str]) -> Result<()>;
}

/// `<state_dir>/hashes`, one `name hash` line per target, sorted by name.
///
/// Every write replaces the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written store behind.
#[derive(Debug)]
pub struct FileHashStore {
    state_dir: PathBuf,
}

impl FileHashStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.state_dir.join(HASH_FILE_NAME)
    }

    fn read(&self) -> Result<BTreeMap<String, String>> {
        let path = self.path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e).with_context(|| format!("reading hash file {:?}", path)),
        };

        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.rsplit_once(char::is_whitespace)
                    .map(|(name, hash)| (name.trim().to_string(), hash.to_string()))
                    .ok_or_else(|| anyhow!("malformed line {:?} in {:?}", line, path))
            })
            .collect()
    }

    fn write(&self, map: &BTreeMap<String, String>) -> Result<()> {
        fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("creating state directory {:?}", self.state_dir))?;

        let path = self.path();
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("creating {:?}", tmp))?;
            for (name, hash) in map {
                writeln!(file, "{name} {hash}")?;
            }
            file.sync_data()?;
        }
        fs::rename(&tmp, &path).with_context(|| format!("replacing {:?}", path))?;
        Ok(())
    }
}

impl HashStore for FileHashStore {
    fn load(&self, target: &str) -> Result<Option<String>> {
        Ok(self.read()?.remove(target))
    }

    fn save(&mut self, target: &str, hash: &str) -> Result<()> {
        let mut map = self.read()?;
        map.insert(target.to_string(), hash.to_string());
        self.write(&map)?;
        debug!(target_name = %target, %hash, "stored input hash");
        Ok(())
    }

    fn prune(&mut self, active_targets: &[&str]) -> Result<()> {
        let mut map = self.read()?;
        let removed = retain_active(&mut map, active_targets);
        if removed > 0 {
            self.write(&map)?;
            info!(removed, "pruned hashes of removed targets");
        }
        Ok(())
    }
}

/// In-memory store, for tests and one-shot runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryHashStore {
    map: BTreeMap<String, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, target: &str) -> Result<Option<String>> {
        Ok(self.map.get(target).cloned())
    }

    fn save(&mut self, target: &str, hash: &str) -> Result<()> {
        self.map.insert(target.to_string(), hash.to_string());
        Ok(())
    }

    fn prune(&mut self, active_targets: &[&str]) -> Result<()> {
        retain_active(&mut self.map, active_targets);
        Ok(())
    }
}

fn retain_active(map: &mut BTreeMap<String, String>, active_targets: &[&str]) -> usize {
    let before = map.len();
    map.retain(|name, _| active_targets.contains(&name.as_str()));
    before - map.len()
}
