//! EntityMap - typed entity mapping for Datastore-style document stores
//!
//! Records are plain Rust structs. Each implements [`Record`] (or [`Model`]
//! for top-level entities with a key) and describes its fields once in a
//! cached [`Schema`]. The [`Database`] handle converts them to backend
//! entities and runs every operation in the current context: a transaction
//! when called inside a transaction block, the shared client otherwise.
//!
//! # Quick Start
//!
//! ```ignore
//! use entitymap::{Database, DatastoreConfig, FilterBuilder, ModelQuery};
//!
//! let db = Database::open(&DatastoreConfig::test("demo"))?;
//! let key = db.put(&account)?;
//!
//! db.transaction(|| {
//!     let mut account: Account = db.get(&key)?.unwrap_or_default();
//!     account.balance += 10;
//!     db.put(&account).map(|_| ())
//! })?;
//!
//! let rich = db.query(&ModelQuery::<Account>::new()
//!     .filter(FilterBuilder::new().ge("balance", 1_000i64)))?;
//! ```
//!
//! # Architecture
//!
//! - `entitymap-core`: keys, values, entities, the error type
//! - `entitymap-storage`: backend traits, query model, memory backend,
//!   environment registry
//! - `entitymap-concurrency`: ambient context, spawn helpers, transaction
//!   engine
//! - `entitymap-engine`: schemas, codec, typed queries, the database handle

pub use entitymap_concurrency::{
    current, spawn, spawn_blocking, with_context, with_context_async, DbContext,
    TransactionOptions,
};
pub use entitymap_core::{Entity, Error, GeoPoint, Key, KeyId, Properties, Property, Result, Value};
pub use entitymap_engine::*;
pub use entitymap_storage::{
    BackendProvider, BackendRegistry, BackendSettings, Datastore, Direction, Environment,
    Filter, FilterOp, MemoryDatastore, MemoryProvider, Query, ReaderWriter, Transaction,
    TransactionStatus, KEY_PROPERTY,
};
