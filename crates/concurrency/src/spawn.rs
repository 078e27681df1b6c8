//! Spawn helpers that carry the current context
//!
//! Work spawned here runs with the spawner's [`DbContext`]. Inside a
//! transactional scope the task is also registered with the scope's join
//! barrier, so the transaction waits for it before finishing. A task that
//! returns `Err` there fails the transaction even if nobody awaits it.

use std::future::Future;

use tokio::task::JoinHandle;

use entitymap_core::Result;

use crate::context::{current, with_context, with_context_async};

/// Spawn an async task that inherits the current context
pub fn spawn<F, T>(future: F) -> JoinHandle<Result<T>>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match current() {
        Some(ctx) => {
            let guard = ctx.tracker().map(|tracker| tracker.register());
            tokio::spawn(async move {
                let outcome = with_context_async(ctx, future).await;
                if let Some(guard) = &guard {
                    guard.report(&outcome);
                }
                outcome
            })
        }
        None => tokio::spawn(future),
    }
}

/// Run a blocking closure on the blocking pool with the current context
pub fn spawn_blocking<F, T>(f: F) -> JoinHandle<Result<T>>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match current() {
        Some(ctx) => {
            let guard = ctx.tracker().map(|tracker| tracker.register());
            tokio::task::spawn_blocking(move || {
                let outcome = with_context(ctx, f);
                if let Some(guard) = &guard {
                    guard.report(&outcome);
                }
                outcome
            })
        }
        None => tokio::task::spawn_blocking(f),
    }
}
