//! Concurrency layer for entitymap
//!
//! This crate implements the transaction/context engine:
//! - DbContext: the ambient client-or-transaction handle, task-local
//! - with_context / with_context_async: scoped context installation
//! - spawn / spawn_blocking: context propagation across task boundaries
//! - ScopeTracker: joins spawned work before a transaction finishes
//! - run_in_transaction: begin, run, join, commit or roll back

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod spawn;
pub mod tracker;
pub mod transaction;

pub use context::{current, current_for, with_context, with_context_async, DbContext};
pub use spawn::{spawn, spawn_blocking};
pub use tracker::{ScopeTracker, TaskGuard};
pub use transaction::{run_in_transaction, run_in_transaction_async, TransactionOptions};
