// tests/cancel_behaviour.rs

mod common;

use std::error::Error;

use targetdag::dag::{SkipReason, TargetState};
use targetdag::engine::{
    CancellationToken, JournalState, MemoryJournal, RunOptions, Runtime, StateJournal,
};
use targetdag::types::CancelPolicy;
use targetdag_test_utils::{FakeExecutor, RegistryBuilder, chain};

use common::{fs_with_inputs, init_tracing, shared, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn policy(cancel_policy: CancelPolicy) -> RunOptions {
    RunOptions {
        concurrency: 2,
        cancel_policy,
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn drain_lets_the_running_target_finish() -> TestResult {
    init_tracing();

    let graph = chain(3);
    let fs = fs_with_inputs(&["input.txt"]);
    let executor = FakeExecutor::new().with_fs(fs.clone()).hold();
    let journal = MemoryJournal::new();
    let token = CancellationToken::new();

    let mut runtime = Runtime::new(executor.clone(), shared(&fs))
        .with_journal(journal.clone())
        .with_options(policy(CancelPolicy::Drain));

    let (report, ()) = with_timeout(async {
        tokio::join!(runtime.run(&graph, token.clone()), async {
            executor.wait_for_started(1).await;
            token.cancel();
            executor.release();
        })
    })
    .await;
    let report = report?;

    assert!(report.cancelled);
    assert_eq!(report.state_of("t0"), Some(&TargetState::Succeeded));
    for name in ["t1", "t2"] {
        assert_eq!(
            report.state_of(name),
            Some(&TargetState::Skipped(SkipReason::Cancelled))
        );
    }
    assert_eq!(report.skipped_due_to_cancellation(), 2);
    assert_eq!(executor.started(), vec!["t0".to_string()]);
    assert_eq!(executor.finished(), vec!["t0".to_string()]);
    assert!(journal.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn kill_abandons_the_running_target() -> TestResult {
    init_tracing();

    let graph = chain(3);
    let fs = fs_with_inputs(&["input.txt"]);
    let executor = FakeExecutor::new().with_fs(fs.clone()).hold();
    let token = CancellationToken::new();

    let mut runtime = Runtime::new(executor.clone(), shared(&fs))
        .with_options(policy(CancelPolicy::Kill));

    let (report, ()) = with_timeout(async {
        tokio::join!(runtime.run(&graph, token.clone()), async {
            executor.wait_for_started(1).await;
            token.cancel();
        })
    })
    .await;
    let report = report?;

    assert!(report.cancelled);
    assert_eq!(report.skipped_due_to_cancellation(), 3);
    assert_eq!(report.succeeded(), 0);
    assert!(executor.finished().is_empty());
    // outputs of the killed target were never written
    assert!(fs.mtime_of("t0.out").is_none());
    Ok(())
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() -> TestResult {
    init_tracing();

    let graph = chain(2);
    let fs = fs_with_inputs(&["input.txt"]);
    let executor = FakeExecutor::new().with_fs(fs.clone());
    let token = CancellationToken::new();
    token.cancel();

    let mut runtime = Runtime::new(executor.clone(), shared(&fs));
    let report = with_timeout(runtime.run(&graph, token)).await?;

    assert!(report.cancelled);
    assert!(!report.is_success());
    assert_eq!(report.skipped_due_to_cancellation(), 2);
    assert!(executor.started().is_empty());
    Ok(())
}

#[tokio::test]
async fn up_to_date_targets_stay_up_to_date_when_cancelled() -> TestResult {
    init_tracing();

    let graph = chain(2);
    let fs = fs_with_inputs(&["input.txt"]);
    let executor = FakeExecutor::new().with_fs(fs.clone());

    let mut runtime = Runtime::new(executor.clone(), shared(&fs));
    with_timeout(runtime.run(&graph, CancellationToken::new())).await?;

    fs.touch("t0.out");
    let token = CancellationToken::new();
    token.cancel();
    let report = with_timeout(runtime.run(&graph, token)).await?;

    assert_eq!(
        report.state_of("t0"),
        Some(&TargetState::Skipped(SkipReason::UpToDate))
    );
    assert_eq!(
        report.state_of("t1"),
        Some(&TargetState::Skipped(SkipReason::Cancelled))
    );
    Ok(())
}

#[tokio::test]
async fn killed_target_with_partial_outputs_is_rebuilt_next_run() -> TestResult {
    init_tracing();

    let graph = chain(1);
    let fs = fs_with_inputs(&["input.txt"]);
    let executor = FakeExecutor::new().with_fs(fs.clone()).hold();
    let journal = MemoryJournal::new();
    let token = CancellationToken::new();

    let mut runtime = Runtime::new(executor.clone(), shared(&fs))
        .with_journal(journal.clone())
        .with_options(policy(CancelPolicy::Kill));

    let (report, ()) = with_timeout(async {
        tokio::join!(runtime.run(&graph, token.clone()), async {
            executor.wait_for_started(1).await;
            // the command got as far as writing its output before the kill
            fs.touch("t0.out");
            token.cancel();
        })
    })
    .await;
    let report = report?;

    assert_eq!(
        report.state_of("t0"),
        Some(&TargetState::Skipped(SkipReason::Cancelled))
    );
    assert!(fs.mtime_of("t0.out") > fs.mtime_of("input.txt"));
    assert!(journal.interrupted()?.contains("t0"));

    let rerun = FakeExecutor::new().with_fs(fs.clone());
    let mut runtime = Runtime::new(rerun.clone(), shared(&fs)).with_journal(journal.clone());
    let report = with_timeout(runtime.run(&graph, CancellationToken::new())).await?;

    assert_eq!(report.state_of("t0"), Some(&TargetState::Succeeded));
    assert_eq!(rerun.started(), vec!["t0".to_string()]);
    assert!(journal.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn selected_run_keeps_interrupted_targets_outside_the_selection() -> TestResult {
    init_tracing();

    let full = RegistryBuilder::new()
        .target("a", &["a.in"], &[("out", "a.out")])
        .target("b", &["b.in"], &[("out", "b.out")])
        .graph();
    let fs = fs_with_inputs(&["a.in", "b.in"]);
    let executor = FakeExecutor::new().with_fs(fs.clone());

    let mut runtime = Runtime::new(executor.clone(), shared(&fs));
    with_timeout(runtime.run(&full, CancellationToken::new())).await?;

    // A previous process died while `b` was running.
    let mut journal = MemoryJournal::new();
    journal.record("b", JournalState::Running)?;

    let mut runtime = Runtime::new(executor.clone(), shared(&fs)).with_journal(journal.clone());
    let only_a = full.select(&["a"])?;
    let report = with_timeout(runtime.run(&only_a, CancellationToken::new())).await?;

    assert_eq!(
        report.state_of("a"),
        Some(&TargetState::Skipped(SkipReason::UpToDate))
    );
    assert!(report.state_of("b").is_none());
    assert!(journal.interrupted()?.contains("b"));

    let report = with_timeout(runtime.run(&full, CancellationToken::new())).await?;

    assert_eq!(report.state_of("b"), Some(&TargetState::Succeeded));
    assert_eq!(
        report.state_of("a"),
        Some(&TargetState::Skipped(SkipReason::UpToDate))
    );
    assert!(journal.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn interrupted_target_cancelled_before_start_stays_interrupted() -> TestResult {
    init_tracing();

    let graph = chain(1);
    let fs = fs_with_inputs(&["input.txt"]);
    fs.touch("t0.out");

    let mut journal = MemoryJournal::new();
    journal.record("t0", JournalState::Running)?;

    let token = CancellationToken::new();
    token.cancel();
    let executor = FakeExecutor::new().with_fs(fs.clone());
    let mut runtime = Runtime::new(executor.clone(), shared(&fs)).with_journal(journal.clone());
    let report = with_timeout(runtime.run(&graph, token)).await?;

    assert_eq!(
        report.state_of("t0"),
        Some(&TargetState::Skipped(SkipReason::Cancelled))
    );
    assert!(executor.started().is_empty());
    assert!(journal.interrupted()?.contains("t0"));
    Ok(())
}
