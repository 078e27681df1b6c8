//! Storage layer for entitymap
//!
//! This crate defines the backend boundary and ships an in-process backend:
//! - Datastore / Transaction / ReaderWriter: the backend contract
//! - Query, Filter, PropertyOrder: untyped backend queries
//! - MemoryDatastore: deterministic in-memory backend with optimistic
//!   conflict detection and a commit log
//! - evaluator: filter and ordering semantics used by the memory backend
//! - BackendRegistry: environment-based backend selection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod evaluator;
pub mod memory;
pub mod query;
pub mod registry;

pub use backend::{Datastore, EntityIter, ReaderWriter, Transaction, TransactionStatus};
pub use memory::{CommitRecord, MemoryDatastore, MemoryTransaction, OperationCounts};
pub use query::{Direction, Filter, FilterOp, PropertyOrder, Query, KEY_PROPERTY};
pub use registry::{BackendProvider, BackendRegistry, BackendSettings, Environment, MemoryProvider};
