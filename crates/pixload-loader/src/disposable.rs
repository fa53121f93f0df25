//! Handles to in-flight image requests.

use crate::job::Job;
use crate::target::TargetRequestManager;
use pixload_core::Request;
use pixload_core::ids::TargetId;
use std::sync::Arc;

/// Represents the work of an enqueued request.
///
/// Disposal never fails and is idempotent. [`wait`](Self::wait) returns
/// immediately once the handle is disposed.
#[derive(Clone)]
pub enum RequestDisposable {
    /// A request with no target.
    OneShot { job: Job },
    /// A request bound to a target.
    ///
    /// Target requests are restarted when the target is reattached, so this
    /// handle stays undisposed until [`dispose`](Self::dispose) is called or
    /// another request replaces it on the same target.
    TargetBound {
        manager: Arc<TargetRequestManager>,
        target: TargetId,
        request: Arc<Request>,
    },
}

impl RequestDisposable {
    pub fn one_shot(job: Job) -> Self {
        RequestDisposable::OneShot { job }
    }

    pub fn target_bound(
        manager: Arc<TargetRequestManager>,
        target: TargetId,
        request: Arc<Request>,
    ) -> Self {
        RequestDisposable::TargetBound {
            manager,
            target,
            request,
        }
    }

    /// True if the request is complete or cancelled, or (for target requests)
    /// no longer the target's current request.
    pub fn is_disposed(&self) -> bool {
        match self {
            RequestDisposable::OneShot { job } => !job.is_active(),
            RequestDisposable::TargetBound {
                manager,
                target,
                request,
            } => manager.is_request_disposed(*target, request),
        }
    }

    /// Cancel any in-progress work.
    pub fn dispose(&self) {
        match self {
            RequestDisposable::OneShot { job } => job.cancel(),
            RequestDisposable::TargetBound {
                manager,
                target,
                request,
            } => {
                manager.clear_if_current(*target, request);
            }
        }
    }

    /// Wait for in-progress work to finish.
    ///
    /// For target requests this joins the job the target tracks at call time,
    /// which may be a restarted job rather than the one running when this
    /// handle was created.
    pub async fn wait(&self) {
        match self {
            RequestDisposable::OneShot { job } => {
                job.join().await;
            }
            RequestDisposable::TargetBound {
                manager, target, ..
            } => {
                if self.is_disposed() {
                    return;
                }
                if let Some(current) = manager.current_request(*target) {
                    current.job.join().await;
                }
            }
        }
    }

    pub fn request(&self) -> Option<&Arc<Request>> {
        match self {
            RequestDisposable::OneShot { .. } => None,
            RequestDisposable::TargetBound { request, .. } => Some(request),
        }
    }
}

impl std::fmt::Debug for RequestDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestDisposable::OneShot { job } => {
                f.debug_struct("OneShot").field("job", job).finish()
            }
            RequestDisposable::TargetBound {
                target, request, ..
            } => f
                .debug_struct("TargetBound")
                .field("target", target)
                .field("request_id", &request.id())
                .finish(),
        }
    }
}
