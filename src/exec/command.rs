// src/exec/command.rs

//! Runs target commands as local processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::backend::{ExecutionFuture, ExecutionRequest, ExecutionResult, Executor};

/// Executor spawning each command with `tokio::process`.
///
/// Relative paths (working directory, outputs) resolve against `root`.
/// Standard output and error go to `<log_dir>/<target>.stdout` and
/// `<log_dir>/<target>.stderr`. Children are killed when their future is
/// dropped, which is how the runtime cancels running targets.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    root: PathBuf,
    log_dir: PathBuf,
}

impl ShellExecutor {
    pub fn new(root: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl Executor for ShellExecutor {
    fn execute(&self, request: ExecutionRequest) -> ExecutionFuture {
        let root = self.root.clone();
        let log_dir = self.log_dir.clone();
        Box::pin(async move { Ok(run_command(&root, &log_dir, request).await?) })
    }
}

async fn run_command(
    root: &Path,
    log_dir: &Path,
    request: ExecutionRequest,
) -> anyhow::Result<ExecutionResult> {
    tokio::fs::create_dir_all(log_dir)
        .await
        .with_context(|| format!("creating log directory {:?}", log_dir))?;

    for output in &request.outputs {
        if let Some(parent) = root.join(output).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating output directory {:?}", parent))?;
        }
    }

    let stdout_path = log_dir.join(format!("{}.stdout", request.target));
    let stderr_path = log_dir.join(format!("{}.stderr", request.target));
    let stdout = tokio::fs::File::create(&stdout_path)
        .await
        .with_context(|| format!("creating {:?}", stdout_path))?
        .into_std()
        .await;
    let stderr = tokio::fs::File::create(&stderr_path)
        .await
        .with_context(|| format!("creating {:?}", stderr_path))?
        .into_std()
        .await;

    let cwd = match &request.command.working_dir {
        Some(dir) => root.join(dir),
        None => root.to_path_buf(),
    };

    info!(
        target_name = %request.target,
        cmd = %request.command.render(),
        "starting target process"
    );
    debug!(target_name = %request.target, options = ?request.options, cwd = ?cwd);

    let mut cmd = Command::new(&request.command.program);
    cmd.args(&request.command.args)
        .envs(&request.command.env)
        .current_dir(&cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for target '{}'", request.target))?;

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of target '{}'", request.target))?;

    info!(
        target_name = %request.target,
        exit_code = ?status.code(),
        success = status.success(),
        "target process exited"
    );

    Ok(ExecutionResult {
        exit_code: status.code(),
        stdout: Some(stdout_path),
        stderr: Some(stderr_path),
    })
}
