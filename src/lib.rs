// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod freshness;
pub mod fs;
pub mod logging;
pub mod types;
pub mod workflow;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, RunArgs, StatusArgs};
use crate::config::{WorkflowFile, load_and_validate, workflow_root_dir};
use crate::dag::Graph;
use crate::engine::{CancellationToken, FileJournal, Runtime};
use crate::exec::ShellExecutor;
use crate::freshness::{FileHashStore, Freshness, HashStore, StalenessPlan};
use crate::fs::RealFileSystem;
use crate::types::{CancelPolicy, StalenessMode};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - workflow loading
/// - target selection
/// - staleness analysis, runtime and executor
/// - Ctrl-C handling
///
/// Returns `Ok(false)` when the run finished with failures or was cancelled.
pub async fn run(args: CliArgs) -> Result<bool> {
    let workflow_path = args.workflow;
    let workflow = load_and_validate(&workflow_path)?;
    let root = workflow_root_dir(&workflow_path);

    match args.command {
        Command::Run(run_args) => run_targets(&workflow, &root, run_args).await,
        Command::Status(status_args) => {
            print_status(&workflow, &root, status_args)?;
            Ok(true)
        }
    }
}

fn selected_graph(workflow: &WorkflowFile, patterns: &[String]) -> Result<Graph> {
    if patterns.is_empty() {
        Ok(workflow.graph.clone())
    } else {
        Ok(workflow.graph.select(patterns)?)
    }
}

fn runtime_for(workflow: &WorkflowFile, root: &Path) -> Runtime<ShellExecutor> {
    let state_dir = root.join(&workflow.config.state_dir);
    let executor = ShellExecutor::new(root, state_dir.join("logs"));
    Runtime::new(executor, Arc::new(RealFileSystem::with_root(root)))
        .with_options(workflow.config.run_options())
        .with_journal(FileJournal::new(&state_dir))
        .with_hash_store(FileHashStore::new(&state_dir))
}

async fn run_targets(workflow: &WorkflowFile, root: &Path, args: RunArgs) -> Result<bool> {
    let graph = selected_graph(workflow, &args.patterns)?;

    let mut options = workflow.config.run_options();
    if let Some(n) = args.concurrency {
        options.concurrency = usize::try_from(n)?;
    }
    if args.kill_on_cancel {
        options.cancel_policy = CancelPolicy::Kill;
    }

    let mut runtime = runtime_for(workflow, root).with_options(options);

    if args.dry_run {
        let plan = runtime.plan(&graph)?;
        print_dry_run(&graph, &plan);
        return Ok(true);
    }

    // Hashes of targets that no longer exist are only dropped when the whole
    // workflow is in view.
    if options.staleness == StalenessMode::Hash && args.patterns.is_empty() {
        let names: Vec<&str> = workflow
            .graph
            .targets()
            .map(|(_, t)| t.name.as_str())
            .collect();
        FileHashStore::new(root.join(&workflow.config.state_dir)).prune(&names)?;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    info!(
        targets = graph.len(),
        concurrency = options.concurrency,
        "starting workflow run"
    );
    let report = runtime.run(&graph, cancel).await?;

    println!("{report}");
    Ok(report.is_success() && !report.cancelled)
}

/// Print the stale targets in the order they would run, with their commands.
fn print_dry_run(graph: &Graph, plan: &StalenessPlan) {
    println!("targetdag dry-run");
    println!("  {} of {} targets are stale", plan.stale_count(), graph.len());
    println!();

    for &id in graph.topo_order() {
        let (Some(target), Some(Freshness::Stale(reason))) = (graph.target(id), plan.get(id))
        else {
            continue;
        };
        println!("  - {}  ({reason})", target.name);
        println!("      cmd: {}", target.command.render());
        if !target.options.is_empty() {
            println!("      options: {:?}", target.options);
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_status(workflow: &WorkflowFile, root: &Path, args: StatusArgs) -> Result<()> {
    let graph = selected_graph(workflow, &args.patterns)?;
    let plan = runtime_for(workflow, root).plan(&graph)?;

    for (id, target) in graph.targets() {
        match plan.get(id) {
            Some(Freshness::UpToDate) => println!("{:<30} up to date", target.name),
            Some(Freshness::Stale(reason)) => println!("{:<30} stale: {reason}", target.name),
            None => {}
        }
    }
    println!("{} targets, {} stale", graph.len(), plan.stale_count());
    Ok(())
}
