// tests/staleness.rs

mod common;

use std::collections::HashSet;
use std::error::Error;
use std::time::{Duration, SystemTime};

use targetdag::dag::{SkipReason, TargetState};
use targetdag::engine::{CancellationToken, RunOptions, Runtime};
use targetdag::freshness::{
    Analyzer, FileHashStore, Freshness, HashStore, MemoryHashStore, StaleReason,
};
use targetdag::types::StalenessMode;
use targetdag_test_utils::{FakeExecutor, RegistryBuilder, chain};
use tempfile::tempdir;

use common::{fs_with_inputs, init_tracing, shared, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn hash_mode() -> RunOptions {
    RunOptions {
        staleness: StalenessMode::Hash,
        ..RunOptions::default()
    }
}

#[test]
fn analysis_is_idempotent() -> TestResult {
    init_tracing();

    let graph = chain(3);
    let fs = fs_with_inputs(&["input.txt"]);
    fs.touch("t0.out");

    let hashes = MemoryHashStore::new();
    let interrupted = HashSet::new();
    let analyzer = Analyzer::new(&fs, StalenessMode::Mtime, &hashes, &interrupted);

    let first = analyzer.analyze(&graph)?;
    let second = analyzer.analyze(&graph)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn staleness_propagates_to_every_descendant() -> TestResult {
    init_tracing();

    let graph = chain(4);
    let fs = fs_with_inputs(&["input.txt"]);
    for i in 0..4 {
        fs.touch(format!("t{i}.out"));
    }
    // t1 is the only target with a newer input
    fs.touch("t0.out");
    fs.touch("t2.out");
    fs.touch("t3.out");

    let hashes = MemoryHashStore::new();
    let interrupted = HashSet::new();
    let plan = Analyzer::new(&fs, StalenessMode::Mtime, &hashes, &interrupted).analyze(&graph)?;

    let id = |name: &str| graph.id_of(name).ok_or("unknown target");
    assert_eq!(plan.get(id("t0")?), Some(&Freshness::UpToDate));
    assert_eq!(
        plan.get(id("t1")?),
        Some(&Freshness::Stale(StaleReason::NewerInput("t0.out".into())))
    );
    // t2.out and t3.out are newer than their inputs, but t1 will rebuild
    assert_eq!(
        plan.get(id("t2")?),
        Some(&Freshness::Stale(StaleReason::UpstreamStale("t1".into())))
    );
    assert_eq!(
        plan.get(id("t3")?),
        Some(&Freshness::Stale(StaleReason::UpstreamStale("t2".into())))
    );
    assert_eq!(plan.stale_count(), 3);
    Ok(())
}

#[test]
fn equal_mtimes_count_as_up_to_date() -> TestResult {
    init_tracing();

    let graph = RegistryBuilder::new()
        .target("copy", &["in.txt"], &[("out", "out.txt")])
        .graph();
    let fs = fs_with_inputs(&["in.txt"]);
    fs.touch("out.txt");

    let same = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
    fs.set_mtime("in.txt", same);
    fs.set_mtime("out.txt", same);

    let hashes = MemoryHashStore::new();
    let interrupted = HashSet::new();
    let plan = Analyzer::new(&fs, StalenessMode::Mtime, &hashes, &interrupted).analyze(&graph)?;
    assert_eq!(plan.stale_count(), 0);

    fs.set_mtime("in.txt", same + Duration::from_secs(1));
    let plan = Analyzer::new(&fs, StalenessMode::Mtime, &hashes, &interrupted).analyze(&graph)?;
    assert_eq!(plan.stale_count(), 1);
    Ok(())
}

#[test]
fn missing_output_is_reported_by_path() -> TestResult {
    let graph = RegistryBuilder::new()
        .target("two", &[], &[("left", "l.out"), ("right", "r.out")])
        .graph();
    let fs = fs_with_inputs(&[]);
    fs.touch("l.out");

    let hashes = MemoryHashStore::new();
    let interrupted = HashSet::new();
    let plan = Analyzer::new(&fs, StalenessMode::Mtime, &hashes, &interrupted).analyze(&graph)?;

    let id = graph.id_of("two").ok_or("unknown target")?;
    assert_eq!(
        plan.get(id),
        Some(&Freshness::Stale(StaleReason::MissingOutput("r.out".into())))
    );
    Ok(())
}

#[tokio::test]
async fn hash_mode_ignores_touches_but_sees_content_changes() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let graph = chain(2);
    let fs = fs_with_inputs(&["input.txt"]);
    let executor = FakeExecutor::new().with_fs(fs.clone());

    let mut runtime = Runtime::new(executor.clone(), shared(&fs))
        .with_hash_store(FileHashStore::new(dir.path()))
        .with_options(hash_mode());

    let first = with_timeout(runtime.run(&graph, CancellationToken::new())).await?;
    assert_eq!(first.succeeded(), 2);
    assert!(dir.path().join("hashes").exists());

    // newer mtime, same bytes
    fs.touch("input.txt");
    let second = with_timeout(runtime.run(&graph, CancellationToken::new())).await?;
    assert_eq!(second.skipped_up_to_date(), 2);

    fs.add_file("input.txt", "something else entirely");
    let third = with_timeout(runtime.run(&graph, CancellationToken::new())).await?;
    assert_eq!(third.state_of("t0"), Some(&TargetState::Succeeded));
    assert_eq!(third.state_of("t1"), Some(&TargetState::Succeeded));
    assert_eq!(executor.started().len(), 4);
    Ok(())
}

#[tokio::test]
async fn hashes_survive_a_new_runtime() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let graph = chain(2);
    let fs = fs_with_inputs(&["input.txt"]);
    let executor = FakeExecutor::new().with_fs(fs.clone());

    let mut runtime = Runtime::new(executor.clone(), shared(&fs))
        .with_hash_store(FileHashStore::new(dir.path()))
        .with_options(hash_mode());
    with_timeout(runtime.run(&graph, CancellationToken::new())).await?;

    let store = FileHashStore::new(dir.path());
    assert!(store.load("t0")?.is_some());
    assert!(store.load("t1")?.is_some());

    let mut fresh = Runtime::new(executor.clone(), shared(&fs))
        .with_hash_store(store)
        .with_options(hash_mode());
    let report = with_timeout(fresh.run(&graph, CancellationToken::new())).await?;
    assert_eq!(
        report.state_of("t1"),
        Some(&TargetState::Skipped(SkipReason::UpToDate))
    );
    Ok(())
}

#[test]
fn pruning_drops_hashes_of_removed_targets() -> TestResult {
    let dir = tempdir()?;
    let mut store = FileHashStore::new(dir.path());
    store.save("kept", "aaaa")?;
    store.save("gone", "bbbb")?;

    store.prune(&["kept"])?;

    assert_eq!(store.load("kept")?.as_deref(), Some("aaaa"));
    assert_eq!(store.load("gone")?, None);
    Ok(())
}
