use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use targetdag::errors::TargetdagError;
use targetdag::exec::{ExecutionFuture, ExecutionRequest, ExecutionResult, Executor};
use targetdag::fs::mock::MockFileSystem;
use tokio::sync::{Notify, watch};

/// What every clone of one executor records.
struct Shared {
    /// `false` while commands are held; see [`FakeExecutor::hold`].
    released: watch::Sender<bool>,
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    started_signal: Notify,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            released: watch::channel(true).0,
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            started_signal: Notify::new(),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }
}

/// A fake executor that:
/// - records which targets were started and finished, in order
/// - tracks the highest number of commands in flight at once
/// - exits 1 for targets marked failing, errors for targets marked erroring
/// - on success, touches the declared outputs in a [`MockFileSystem`]
///
/// Clones share what they record, so a test can keep one handle and give
/// the other to the runtime.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    fs: Option<MockFileSystem>,
    failing: HashSet<String>,
    erroring: HashSet<String>,
    delay: Duration,
    shared: Arc<Shared>,
}

/// Decrements the running counter even if the future is dropped (killed).
struct RunningGuard(Arc<Shared>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Touch outputs in `fs` when a command succeeds.
    pub fn with_fs(mut self, fs: MockFileSystem) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Exit with code 1 for this target.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Return an executor error for this target.
    pub fn erroring(mut self, name: &str) -> Self {
        self.erroring.insert(name.to_string());
        self
    }

    /// Sleep this long in every command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block every command until [`release`](Self::release) is called.
    pub fn hold(self) -> Self {
        self.shared.released.send_replace(false);
        self
    }

    pub fn release(&self) {
        self.shared.released.send_replace(true);
    }

    /// Targets in the order their commands started.
    pub fn started(&self) -> Vec<String> {
        self.shared.started.lock().unwrap().clone()
    }

    /// Targets in the order their commands finished.
    pub fn finished(&self) -> Vec<String> {
        self.shared.finished.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.max_running.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` commands have started.
    pub async fn wait_for_started(&self, n: usize) {
        loop {
            let notified = self.shared.started_signal.notified();
            if self.started().len() >= n {
                return;
            }
            notified.await;
        }
    }
}

impl Executor for FakeExecutor {
    fn execute(&self, request: ExecutionRequest) -> ExecutionFuture {
        let this = self.clone();

        Box::pin(async move {
            let shared = &this.shared;
            let now = shared.running.fetch_add(1, Ordering::SeqCst) + 1;
            let _guard = RunningGuard(Arc::clone(shared));
            shared.max_running.fetch_max(now, Ordering::SeqCst);

            shared.started.lock().unwrap().push(request.target.clone());
            shared.started_signal.notify_waiters();

            if !this.delay.is_zero() {
                tokio::time::sleep(this.delay).await;
            }

            let mut released = shared.released.subscribe();
            let _ = released.wait_for(|r| *r).await;

            shared.finished.lock().unwrap().push(request.target.clone());

            if this.erroring.contains(&request.target) {
                return Err(TargetdagError::TargetExecution {
                    target: request.target,
                    message: "fake executor error".to_string(),
                });
            }
            if this.failing.contains(&request.target) {
                return Ok(ExecutionResult::exited(1));
            }

            if let Some(fs) = &this.fs {
                for out in &request.outputs {
                    fs.touch(out);
                }
            }
            Ok(ExecutionResult::exited(0))
        })
    }
}
