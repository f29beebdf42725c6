// tests/config_loading.rs

mod common;

use std::error::Error;
use std::fs;
use std::path::Path;

use targetdag::config::{load_and_validate, load_from_path, workflow_root_dir};
use targetdag::errors::TargetdagError;
use targetdag::types::{CancelPolicy, StalenessMode};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

const WORKFLOW: &str = r#"
[config]
concurrency = 2
staleness = "hash"
cancel_policy = "kill"
state_dir = "state"

[defaults]
account = "lab"

[[target]]
name = "uppercase_0"
inputs = ["data/a.txt"]
outputs = { uppercased_path = "steps/a_upper.txt" }
spec = "tr '[:lower:]' '[:upper:]' < data/a.txt > steps/a_upper.txt"

[[target]]
name = "merge"
inputs = ["steps/a_upper.txt"]
outputs = { merged_path = "results/merged.txt" }
options = { memory = "8g", cores = 4 }
program = "cp"
args = ["steps/a_upper.txt", "results/merged.txt"]
"#;

fn write_workflow(dir: &Path, contents: &str) -> std::io::Result<std::path::PathBuf> {
    let path = dir.join("Workflow.toml");
    fs::write(&path, contents)?;
    Ok(path)
}

#[test]
fn full_workflow_file_loads() -> TestResult {
    common::init_tracing();
    let dir = tempdir()?;
    let path = write_workflow(dir.path(), WORKFLOW)?;

    let workflow = load_and_validate(&path)?;
    assert_eq!(workflow.config.concurrency, 2);
    assert_eq!(workflow.config.staleness, StalenessMode::Hash);
    assert_eq!(workflow.config.cancel_policy, CancelPolicy::Kill);
    assert_eq!(workflow.config.state_dir, Path::new("state"));

    let options = workflow.config.run_options();
    assert_eq!(options.concurrency, 2);

    let merge_id = workflow.graph.id_of("merge").ok_or("merge")?;
    let merge = workflow.graph.target(merge_id).ok_or("merge target")?;
    assert_eq!(merge.command.program, "cp");
    assert_eq!(merge.options.get("cores").map(String::as_str), Some("4"));
    // defaults fill in what the target leaves out
    assert_eq!(merge.options.get("account").map(String::as_str), Some("lab"));

    let upstream = workflow.graph.id_of("uppercase_0").ok_or("uppercase_0")?;
    assert_eq!(workflow.graph.dependencies_of(merge_id), vec![upstream]);
    Ok(())
}

#[test]
fn missing_sections_take_defaults() -> TestResult {
    let dir = tempdir()?;
    let path = write_workflow(
        dir.path(),
        r#"
        [[target]]
        name = "only"
        program = "true"
        "#,
    )?;

    let workflow = load_and_validate(&path)?;
    assert_eq!(workflow.config.concurrency, 4);
    assert_eq!(workflow.config.staleness, StalenessMode::Mtime);
    assert_eq!(workflow.config.cancel_policy, CancelPolicy::Drain);
    assert_eq!(workflow.graph.len(), 1);
    Ok(())
}

#[test]
fn cyclic_workflow_is_rejected_at_load_time() -> TestResult {
    let dir = tempdir()?;
    let path = write_workflow(
        dir.path(),
        r#"
        [[target]]
        name = "ping"
        inputs = ["pong.txt"]
        outputs = { out = "ping.txt" }
        program = "true"

        [[target]]
        name = "pong"
        inputs = ["ping.txt"]
        outputs = { out = "pong.txt" }
        program = "true"
        "#,
    )?;

    assert!(matches!(
        load_and_validate(&path),
        Err(TargetdagError::CyclicDependency { .. })
    ));
    Ok(())
}

#[test]
fn unknown_staleness_mode_is_a_toml_error() -> TestResult {
    let dir = tempdir()?;
    let path = write_workflow(
        dir.path(),
        r#"
        [config]
        staleness = "sometimes"

        [[target]]
        name = "x"
        program = "true"
        "#,
    )?;

    assert!(matches!(
        load_from_path(&path),
        Err(TargetdagError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().expect("tempdir");
    assert!(matches!(
        load_and_validate(dir.path().join("absent.toml")),
        Err(TargetdagError::IoError(_))
    ));
}

#[test]
fn root_dir_is_the_workflow_file_parent() -> TestResult {
    let dir = tempdir()?;
    let path = write_workflow(dir.path(), WORKFLOW)?;
    assert_eq!(workflow_root_dir(&path), dir.path());
    Ok(())
}
