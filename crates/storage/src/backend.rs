//! Backend contract
//!
//! This module defines the traits every storage backend implements. The
//! mapping layer only ever hands backends [`Entity`] and [`Key`] values;
//! typed records never cross this boundary.
//!
//! | Trait | Role |
//! |-------|------|
//! | [`ReaderWriter`] | get / get_many / put / delete / run_query |
//! | [`Datastore`] | the shared client; begins transactions |
//! | [`Transaction`] | one backend transaction; commit / rollback |
//!
//! Both the client and a transaction are readers/writers, so callers can
//! dispatch the same operation to either without branching at call sites.
//!
//! # Implementing a Backend
//!
//! 1. Implement [`ReaderWriter`] and [`Datastore`] for the client
//! 2. Implement [`ReaderWriter`] and [`Transaction`] for its transactions
//! 3. Map backend-specific failures to [`Error`](entitymap_core::Error)
//!
//! See [`MemoryDatastore`](crate::MemoryDatastore) for a reference implementation.

use std::fmt;
use std::sync::Arc;

use entitymap_core::{Entity, Key, Result};

use crate::query::Query;

/// Iterator over query results
pub type EntityIter = Box<dyn Iterator<Item = Entity> + Send>;

/// Read/write operations shared by clients and transactions
///
/// Thread safety: implementations are shared behind `Arc` and must tolerate
/// concurrent calls.
pub trait ReaderWriter: Send + Sync {
    /// Fetch one entity; `Ok(None)` if it does not exist
    fn get(&self, key: &Key) -> Result<Option<Entity>> {
        let mut found = self.get_many(std::slice::from_ref(key))?;
        Ok(found.pop().flatten())
    }

    /// Fetch several entities
    ///
    /// The result has one slot per requested key, in request order; missing
    /// entities are `None`.
    fn get_many(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>>;

    /// Store entities, returning them with finalized (complete) keys
    fn put(&self, entities: Vec<Entity>) -> Result<Vec<Entity>>;

    /// Delete entities; missing keys are ignored
    fn delete(&self, keys: &[Key]) -> Result<()>;

    /// Run a query
    fn run_query(&self, query: &Query) -> Result<EntityIter>;
}

/// The shared backend client
pub trait Datastore: ReaderWriter {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Begin a new backend transaction
    fn begin_transaction(&self) -> Result<Arc<dyn Transaction>>;
}

/// Lifecycle state of a backend transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting reads and writes
    Active,
    /// Writes applied
    Committed,
    /// Writes discarded
    RolledBack,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// One backend transaction
///
/// Writes are buffered until [`commit`](Transaction::commit). After commit or
/// rollback every operation fails with
/// [`TransactionClosed`](entitymap_core::Error::TransactionClosed).
pub trait Transaction: ReaderWriter {
    /// Backend-assigned transaction id
    fn id(&self) -> u64;

    /// Current status
    fn status(&self) -> TransactionStatus;

    /// True while the transaction accepts operations
    fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Apply buffered writes atomically
    fn commit(&self) -> Result<()>;

    /// Discard buffered writes
    fn rollback(&self) -> Result<()>;
}
