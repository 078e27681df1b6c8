//! Transaction blocks on [`Database`]
//!
//! Thin wrappers over the concurrency crate's transaction engine, bound to
//! this handle's id and client. Work inside the block reaches the transaction
//! through the ambient context, so plain `db.get` / `db.put` calls join it.

use std::future::Future;
use std::sync::Arc;

use entitymap_concurrency::{run_in_transaction, run_in_transaction_async, TransactionOptions};
use entitymap_core::Result;

use super::Database;

impl Database {
    /// Run `f` in a transaction, joining an enclosing one
    ///
    /// Commits when `f` returns `Ok`, rolls back and returns the error
    /// unchanged otherwise. Blocks until work spawned inside the block with
    /// the context-carrying helpers has finished; if one of those tasks
    /// failed, rolls back and returns its error.
    ///
    /// # Blocking
    ///
    /// The join parks the calling thread. Async children spawned from the
    /// block need another worker to make progress, so calling this from an
    /// async task on a current-thread runtime deadlocks. From async code use
    /// [`transaction_async`](Self::transaction_async), or wrap the call in
    /// `tokio::task::block_in_place` on a multi-thread runtime.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.transaction_with(TransactionOptions::default(), f)
    }

    /// [`transaction`](Self::transaction) with explicit options
    ///
    /// # Errors
    ///
    /// `TransactionState` when a transaction is already active and
    /// `options.propagate` is false.
    pub fn transaction_with<T, F>(&self, options: TransactionOptions, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        run_in_transaction(self.inner.id, &self.inner.client, options, f)
    }

    /// Async transaction block
    pub async fn transaction_async<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.transaction_async_with(TransactionOptions::default(), f)
            .await
    }

    /// [`transaction_async`](Self::transaction_async) with explicit options
    pub async fn transaction_async_with<T, F, Fut>(
        &self,
        options: TransactionOptions,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        run_in_transaction_async(self.inner.id, Arc::clone(&self.inner.client), options, f).await
    }
}
