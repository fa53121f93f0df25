//! Per-target request lifecycle.
//!
//! The manager keeps one [`TargetState`] per target id in an arena. Each entry
//! sits behind its own mutex so every transition for a target (cancel the old
//! job, install the new one) happens in one critical section, while unrelated
//! targets never contend beyond the arena lookup.

use crate::job::Job;
use pixload_core::Request;
use pixload_core::ids::TargetId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

/// The request currently tracked for a target and its job.
#[derive(Debug, Clone)]
pub struct CurrentRequest {
    pub request: Arc<Request>,
    pub job: Job,
}

/// Coarse lifecycle phase of a target, derived from its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    Idle,
    Active,
    PendingClear,
}

#[derive(Debug)]
struct TargetState {
    current: Option<CurrentRequest>,
    pending_clear: bool,
    attached: bool,
    /// Set when a detach interrupted a running job.
    restart_on_attach: bool,
}

impl TargetState {
    fn new() -> Self {
        Self {
            current: None,
            pending_clear: false,
            attached: true,
            restart_on_attach: false,
        }
    }

    fn phase(&self) -> TargetPhase {
        if self.pending_clear {
            TargetPhase::PendingClear
        } else if self.current.is_some() {
            TargetPhase::Active
        } else {
            TargetPhase::Idle
        }
    }
}

type Entry = Arc<Mutex<TargetState>>;

/// Tracks the single current request of every target.
#[derive(Default)]
pub struct TargetRequestManager {
    targets: RwLock<HashMap<TargetId, Entry>>,
}

impl TargetRequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `request` and `job` as the target's current request, cancelling
    /// any previous job first. Clears a pending clear.
    pub fn set_current_request(&self, target: TargetId, request: Arc<Request>, job: Job) {
        let entry = self.entry_or_insert(target);
        let mut state = lock(&entry);

        if let Some(previous) = state.current.take()
            && !previous.job.ptr_eq(&job)
        {
            previous.job.cancel();
            debug!(
                target_id = %target,
                request_id = %previous.request.id(),
                "Replaced current request"
            );
        }
        state.pending_clear = false;
        state.restart_on_attach = false;
        state.current = Some(CurrentRequest { request, job });
    }

    /// Install a restarted job for `request`, but only if `request` is still
    /// the target's tracked request and no clear happened meanwhile. Otherwise
    /// the job is cancelled. Returns whether the job was installed.
    pub fn restart_request(&self, target: TargetId, request: &Arc<Request>, job: Job) -> bool {
        let Some(entry) = self.entry(target) else {
            job.cancel();
            return false;
        };
        let mut state = lock(&entry);

        let still_current = !state.pending_clear
            && state
                .current
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(&current.request, request));
        if !still_current {
            job.cancel();
            debug!(target_id = %target, "Dropped stale restart");
            return false;
        }
        if !state.attached {
            // Detached again before the restart landed; retry on the next attach.
            job.cancel();
            state.restart_on_attach = true;
            debug!(target_id = %target, "Deferred restart until reattach");
            return false;
        }

        if let Some(current) = state.current.as_mut() {
            current.job.cancel();
            current.job = job;
        }
        true
    }

    /// Cancel the tracked job, forget the request and mark the target as
    /// pending clear.
    pub fn clear_current_request(&self, target: TargetId) {
        let Some(entry) = self.entry(target) else {
            return;
        };
        let mut state = lock(&entry);

        if let Some(current) = state.current.take() {
            current.job.cancel();
            debug!(
                target_id = %target,
                request_id = %current.request.id(),
                "Cleared current request"
            );
        }
        state.pending_clear = true;
        state.restart_on_attach = false;
    }

    /// Clear the target only if `request` is still its live request. The check
    /// and the clear share one critical section, so a stale handle can never
    /// clear a request installed after it. Returns whether a clear happened.
    pub fn clear_if_current(&self, target: TargetId, request: &Arc<Request>) -> bool {
        let Some(entry) = self.entry(target) else {
            return false;
        };
        let mut state = lock(&entry);

        let is_current = !state.pending_clear
            && state
                .current
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(&current.request, request));
        if !is_current {
            return false;
        }
        if let Some(current) = state.current.take() {
            current.job.cancel();
            debug!(
                target_id = %target,
                request_id = %current.request.id(),
                "Disposed current request"
            );
        }
        state.pending_clear = true;
        state.restart_on_attach = false;
        true
    }

    pub fn current_request(&self, target: TargetId) -> Option<CurrentRequest> {
        let entry = self.entry(target)?;
        let state = lock(&entry);
        state.current.clone()
    }

    pub fn has_pending_clear(&self, target: TargetId) -> bool {
        self.entry(target)
            .map(|entry| lock(&entry).pending_clear)
            .unwrap_or(false)
    }

    /// Whether `request` is no longer the target's live request. Evaluated
    /// under the target's lock so it never observes a half-finished swap.
    pub fn is_request_disposed(&self, target: TargetId, request: &Arc<Request>) -> bool {
        let Some(entry) = self.entry(target) else {
            return true;
        };
        let state = lock(&entry);
        state.pending_clear
            || !state
                .current
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(&current.request, request))
    }

    pub fn phase(&self, target: TargetId) -> TargetPhase {
        self.entry(target)
            .map(|entry| lock(&entry).phase())
            .unwrap_or(TargetPhase::Idle)
    }

    pub fn is_attached(&self, target: TargetId) -> bool {
        self.entry(target)
            .map(|entry| lock(&entry).attached)
            .unwrap_or(false)
    }

    /// The target left its surface. A running job is cancelled but its request
    /// is kept so it can be restarted on reattach. Unknown targets are ignored.
    pub fn on_detached(&self, target: TargetId) {
        let Some(entry) = self.entry(target) else {
            return;
        };
        let mut state = lock(&entry);
        state.attached = false;

        let interrupted = state
            .current
            .as_ref()
            .filter(|current| current.job.is_active())
            .map(|current| {
                current.job.cancel();
                current.request.id()
            });
        if let Some(request_id) = interrupted {
            state.restart_on_attach = true;
            debug!(target_id = %target, request_id = %request_id, "Paused request on detach");
        }
    }

    /// The target returned to its surface. Returns the request to restart if
    /// a detach interrupted it.
    pub fn on_attached(&self, target: TargetId) -> Option<Arc<Request>> {
        let entry = self.entry(target)?;
        let mut state = lock(&entry);
        state.attached = true;

        if !std::mem::take(&mut state.restart_on_attach) {
            return None;
        }
        state.current.as_ref().map(|current| Arc::clone(&current.request))
    }

    /// Drop the target for good, cancelling its job.
    pub fn remove_target(&self, target: TargetId) {
        let removed = self
            .targets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&target);
        if let Some(entry) = removed {
            let mut state = lock(&entry);
            if let Some(current) = state.current.take() {
                current.job.cancel();
            }
            debug!(target_id = %target, "Target removed");
        }
    }

    /// Cancel every tracked job.
    pub fn shutdown(&self) {
        let entries: Vec<Entry> = self
            .targets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        let count = entries.len();
        for entry in entries {
            if let Some(current) = lock(&entry).current.take() {
                current.job.cancel();
            }
        }
        info!(targets = count, "Target request manager shut down");
    }

    pub fn target_count(&self) -> usize {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn entry(&self, target: TargetId) -> Option<Entry> {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target)
            .cloned()
    }

    fn entry_or_insert(&self, target: TargetId) -> Entry {
        if let Some(entry) = self.entry(target) {
            return entry;
        }
        let mut targets = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            targets
                .entry(target)
                .or_insert_with(|| Arc::new(Mutex::new(TargetState::new()))),
        )
    }
}

fn lock(entry: &Entry) -> MutexGuard<'_, TargetState> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}
