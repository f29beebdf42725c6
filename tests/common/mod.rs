#![allow(dead_code)]

use std::sync::Arc;

use targetdag::fs::FileSystem;
use targetdag::fs::mock::MockFileSystem;

pub use targetdag_test_utils::{init_tracing, with_timeout};

/// Mock filesystem holding the given external input files.
pub fn fs_with_inputs(paths: &[&str]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    for path in paths {
        fs.add_file(path, format!("contents of {path}"));
    }
    fs
}

pub fn shared(fs: &MockFileSystem) -> Arc<dyn FileSystem> {
    Arc::new(fs.clone())
}
