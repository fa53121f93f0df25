//! Cancellable request jobs.
//!
//! A [`Job`] wraps a spawned tokio task and publishes its lifecycle through a
//! `watch` channel. Cancelling flips the state to [`JobState::Cancelled`]
//! synchronously and aborts the task, so the task's suspended fetch or decode
//! future is dropped at its next await point.

use pixload_core::ids::JobId;
use pixload_core::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        self != JobState::Active
    }
}

/// Handle to a spawned request task. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

struct JobInner {
    id: JobId,
    state: Arc<watch::Sender<JobState>>,
    abort: AbortHandle,
}

/// Read side of a job's state, handed to the running task so it can check
/// for cancellation between steps.
#[derive(Clone)]
pub struct CancelSignal {
    state: watch::Receiver<JobState>,
}

impl CancelSignal {
    /// A signal that never reports cancellation, for work run inline.
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(JobState::Active);
        Self { state: rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow() == JobState::Cancelled
    }

    /// Fail with [`Error::Cancelled`] once the job has been cancelled.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

impl Job {
    /// Spawn `work` on the current tokio runtime.
    ///
    /// The job completes as `Completed` when `work` returns `Ok`, `Cancelled`
    /// when it returns [`Error::Cancelled`], and `Failed` otherwise.
    pub fn spawn<F, Fut>(work: F) -> Job
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = JobId::new();
        let (tx, rx) = watch::channel(JobState::Active);
        let state = Arc::new(tx);
        let signal = CancelSignal { state: rx };

        let future = work(signal);
        let task_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            let outcome = match future.await {
                Ok(()) => JobState::Completed,
                Err(Error::Cancelled) => JobState::Cancelled,
                Err(_) => JobState::Failed,
            };
            finish(&task_state, outcome);
        });

        debug!(job_id = %id, "Job spawned");
        Job {
            inner: Arc::new(JobInner {
                id,
                state,
                abort: handle.abort_handle(),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn state(&self) -> JobState {
        *self.inner.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == JobState::Active
    }

    /// Cancel the job if it is still active. Idempotent.
    pub fn cancel(&self) {
        if finish(&self.inner.state, JobState::Cancelled) {
            self.inner.abort.abort();
            debug!(job_id = %self.inner.id, "Job cancelled");
        }
    }

    /// Wait until the job reaches a terminal state.
    pub async fn join(&self) -> JobState {
        let mut rx = self.inner.state.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            // The sender lives as long as `self`; keep the last observed value.
            Err(_) => self.state(),
        }
    }

    pub fn ptr_eq(&self, other: &Job) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Move an active job to `outcome`. Returns false if it was already terminal.
fn finish(state: &watch::Sender<JobState>, outcome: JobState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        *current = outcome;
        true
    })
}
