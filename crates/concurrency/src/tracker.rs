//! Join barrier for work spawned inside a transactional scope
//!
//! Each spawned task holds a [`TaskGuard`] for its lifetime. Before a
//! transaction commits or rolls back, the engine waits until no guards are
//! outstanding, so no child task can touch a finished transaction.
//!
//! The first error a child task returns is kept; the transaction reports it
//! instead of committing.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use entitymap_core::{Error, Result};

/// Counts live tasks of one transactional scope
#[derive(Debug, Default)]
pub struct ScopeTracker {
    pending: Mutex<usize>,
    idle: Condvar,
    notify: Notify,
    failure: Mutex<Option<Error>>,
}

impl ScopeTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; it counts as pending until the guard drops
    pub fn register(self: &Arc<Self>) -> TaskGuard {
        *self.pending.lock() += 1;
        TaskGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Number of live tasks
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Keep `err` unless an earlier failure is already recorded
    pub fn record_failure(&self, err: &Error) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(err.clone());
        }
    }

    /// First recorded child failure, if any
    pub fn take_failure(&self) -> Option<Error> {
        self.failure.lock().take()
    }

    /// Block until every registered task has finished
    pub fn wait_idle(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.idle.wait(&mut pending);
        }
    }

    /// Wait asynchronously until every registered task has finished
    pub async fn wait_idle_async(&self) {
        loop {
            // Created before the check so a release in between is not missed
            let notified = self.notify.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
            self.notify.notify_waiters();
        }
    }
}

/// Keeps one task registered with a [`ScopeTracker`]
#[derive(Debug)]
pub struct TaskGuard {
    tracker: Arc<ScopeTracker>,
}

impl TaskGuard {
    /// Record the task's outcome before the guard is released
    pub fn report<T>(&self, outcome: &Result<T>) {
        if let Err(err) = outcome {
            self.tracker.record_failure(err);
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}
