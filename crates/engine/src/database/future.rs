//! Asynchronous operations
//!
//! Each `*_async` call starts its work on tokio's blocking pool immediately
//! and returns a [`DbFuture`]. The work carries the caller's context: started
//! inside a transaction block it runs in that transaction, and the block
//! waits for it before committing.
//!
//! Calls must be made from within a tokio runtime.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use entitymap_concurrency::spawn_blocking;
use entitymap_core::{Error, Key, Result};

use super::Database;
use crate::codec::Model;
use crate::query::ModelQuery;

/// Handle to a database operation already in flight
///
/// Dropping it does not cancel the operation.
#[must_use = "the operation runs regardless, but its result is lost"]
pub struct DbFuture<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> DbFuture<T> {
    fn new(handle: JoinHandle<Result<T>>) -> Self {
        Self { handle }
    }

    /// True once the operation has completed
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> fmt::Debug for DbFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbFuture")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl<T> Future for DbFuture<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_err)) => Poll::Ready(Err(Error::TaskFailed(join_err.to_string()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Database {
    fn run_async<T, F>(&self, f: F) -> DbFuture<T>
    where
        F: FnOnce(Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        DbFuture::new(spawn_blocking(move || f(db)))
    }

    /// Async [`get`](Self::get)
    pub fn get_async<M>(&self, key: Key) -> DbFuture<Option<M>>
    where
        M: Model + Send + 'static,
    {
        self.run_async(move |db| db.get::<M>(&key))
    }

    /// Async [`get_many`](Self::get_many)
    pub fn get_many_async<M>(&self, keys: Vec<Key>) -> DbFuture<Vec<Option<M>>>
    where
        M: Model + Send + 'static,
    {
        self.run_async(move |db| db.get_many::<M>(&keys))
    }

    /// Async [`put`](Self::put)
    pub fn put_async<M>(&self, model: M) -> DbFuture<Key>
    where
        M: Model + Send + 'static,
    {
        self.run_async(move |db| db.put(&model))
    }

    /// Async [`put_many`](Self::put_many)
    pub fn put_many_async<M>(&self, models: Vec<M>) -> DbFuture<Vec<Key>>
    where
        M: Model + Send + 'static,
    {
        self.run_async(move |db| db.put_many(&models))
    }

    /// Async [`delete`](Self::delete)
    pub fn delete_async(&self, key: Key) -> DbFuture<()> {
        self.run_async(move |db| db.delete(&key))
    }

    /// Async [`delete_many`](Self::delete_many)
    pub fn delete_many_async(&self, keys: Vec<Key>) -> DbFuture<()> {
        self.run_async(move |db| db.delete_many(&keys))
    }

    /// Async [`query`](Self::query)
    pub fn query_async<M>(&self, query: ModelQuery<M>) -> DbFuture<Vec<M>>
    where
        M: Model + Send + 'static,
    {
        self.run_async(move |db| db.query(&query))
    }
}
