//! Transaction engine
//!
//! Runs a block of code inside a backend transaction:
//!
//! - already transactional and propagation enabled: the block joins the
//!   current transaction (nesting is flattened)
//! - already transactional and propagation disabled: `TransactionState` error
//! - otherwise a backend transaction is begun, the block runs with it as the
//!   current context, spawned work is joined, then the transaction commits on
//!   `Ok` or is rolled back on `Err`
//!
//! The block's error is returned unchanged. A failing rollback is logged and
//! never replaces it. When the block succeeds but a task spawned in its scope
//! failed, the transaction is rolled back and that task's first error is
//! returned instead of the block's value.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use entitymap_core::{Error, Result};
use entitymap_storage::{Datastore, Transaction};

use crate::context::{current_for, with_context, with_context_async, DbContext};
use crate::tracker::ScopeTracker;

/// How a transaction block treats an enclosing transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Join an enclosing transaction instead of failing
    pub propagate: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self { propagate: true }
    }
}

impl TransactionOptions {
    /// Default options (propagation enabled)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set propagation
    pub fn propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }
}

/// Decide whether to reuse the enclosing transaction
///
/// Returns `Ok(true)` when the block should simply run in the current scope.
fn joins_enclosing(database_id: u64, options: TransactionOptions) -> Result<bool> {
    match current_for(database_id) {
        Some(ctx) if ctx.is_transactional() => {
            if options.propagate {
                Ok(true)
            } else {
                Err(Error::TransactionState(
                    "a transaction is already active and propagation is disabled".to_string(),
                ))
            }
        }
        _ => Ok(false),
    }
}

fn begin(
    database_id: u64,
    client: &Arc<dyn Datastore>,
) -> Result<(Arc<dyn Transaction>, Arc<ScopeTracker>, DbContext)> {
    let txn = client.begin_transaction()?;
    let tracker = Arc::new(ScopeTracker::new());
    let ctx = DbContext::transactional(
        database_id,
        Arc::clone(client),
        Arc::clone(&txn),
        Arc::clone(&tracker),
    );
    debug!(target: "entitymap::txn", txn_id = txn.id(), backend = client.name(), "Transaction started");
    Ok((txn, tracker, ctx))
}

fn finish<T>(txn: &dyn Transaction, tracker: &ScopeTracker, result: Result<T>) -> Result<T> {
    let result = match (result, tracker.take_failure()) {
        (Ok(_), Some(child_err)) => {
            debug!(target: "entitymap::txn", txn_id = txn.id(), error = %child_err, "Spawned task failed");
            Err(child_err)
        }
        (result, _) => result,
    };
    match result {
        Ok(value) => {
            txn.commit()?;
            debug!(target: "entitymap::txn", txn_id = txn.id(), "Transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback() {
                warn!(
                    target: "entitymap::txn",
                    txn_id = txn.id(),
                    error = %rollback_err,
                    "Rollback after failed block did not succeed"
                );
            } else {
                debug!(target: "entitymap::txn", txn_id = txn.id(), error = %err, "Transaction rolled back");
            }
            Err(err)
        }
    }
}

/// Run `f` inside a transaction on `client`
///
/// Blocks while spawned work is joined, so call it from synchronous code or
/// the blocking pool.
pub fn run_in_transaction<T, F>(
    database_id: u64,
    client: &Arc<dyn Datastore>,
    options: TransactionOptions,
    f: F,
) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    if joins_enclosing(database_id, options)? {
        return f();
    }

    let (txn, tracker, ctx) = begin(database_id, client)?;
    let result = with_context(ctx, f);
    tracker.wait_idle();
    finish(txn.as_ref(), &tracker, result)
}

/// Async counterpart of [`run_in_transaction`]
pub async fn run_in_transaction_async<T, F, Fut>(
    database_id: u64,
    client: Arc<dyn Datastore>,
    options: TransactionOptions,
    f: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if joins_enclosing(database_id, options)? {
        return f().await;
    }

    let (txn, tracker, ctx) = begin(database_id, &client)?;
    let result = with_context_async(ctx, async move { f().await }).await;
    tracker.wait_idle_async().await;
    finish(txn.as_ref(), &tracker, result)
}
