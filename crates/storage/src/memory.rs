//! In-memory backend for deterministic tests
//!
//! [`MemoryDatastore`] implements the full backend contract against an
//! in-process map keyed by each key's canonical encoding.
//!
//! # Semantics
//!
//! - put-then-get visibility outside transactions
//! - transactional writes are buffered and invisible until commit
//! - optimistic conflict detection: commit fails with
//!   [`Error::Conflict`] if any key the transaction read or wrote was modified
//!   by someone else after the transaction began
//! - incomplete keys get a fresh numeric id on put
//! - queries evaluated by [`evaluator`](crate::evaluator), ties broken by
//!   insertion order
//!
//! Uses `parking_lot` locks throughout; every commit is recorded in a log
//! tests can inspect.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use entitymap_core::{Entity, Error, Key, Result};

use crate::backend::{Datastore, EntityIter, ReaderWriter, Transaction, TransactionStatus};
use crate::evaluator;
use crate::query::Query;

/// A committed entity plus bookkeeping
#[derive(Debug, Clone)]
struct StoredEntity {
    entity: Entity,
    /// Insertion sequence, kept across overwrites
    seq: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    entities: BTreeMap<String, StoredEntity>,
    /// Version of the last write or delete per encoded key
    last_modified: HashMap<String, u64>,
    next_seq: u64,
}

impl StoreState {
    fn apply_put(&mut self, entity: Entity, version: u64) {
        let encoded = entity.key().encode();
        let seq = match self.entities.get(&encoded) {
            Some(existing) => existing.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.last_modified.insert(encoded.clone(), version);
        self.entities.insert(encoded, StoredEntity { entity, seq });
    }

    fn apply_delete(&mut self, encoded: &str, version: u64) {
        self.last_modified.insert(encoded.to_string(), version);
        self.entities.remove(encoded);
    }

    fn get(&self, key: &Key) -> Option<Entity> {
        self.entities.get(&key.encode()).map(|s| s.entity.clone())
    }

    fn in_insertion_order(&self) -> Vec<Entity> {
        let mut stored: Vec<&StoredEntity> = self.entities.values().collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.entity.clone()).collect()
    }
}

/// One entry of the commit log
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    /// Committed transaction
    pub txn_id: u64,
    /// Keys written, in write order
    pub written: Vec<Key>,
    /// Keys deleted, in delete order
    pub deleted: Vec<Key>,
}

/// Counters of backend calls, for asserting that no call happened
#[derive(Debug, Default)]
pub struct OperationCounts {
    gets: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
    begins: AtomicU64,
    commits: AtomicU64,
}

impl OperationCounts {
    /// get / get_many calls
    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    /// put calls
    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// delete calls
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// run_query calls
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    /// begin_transaction calls
    pub fn begins(&self) -> u64 {
        self.begins.load(Ordering::SeqCst)
    }

    /// successful commits
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

struct Shared {
    state: RwLock<StoreState>,
    version: AtomicU64,
    next_id: AtomicI64,
    next_txn_id: AtomicU64,
    commit_log: Mutex<Vec<CommitRecord>>,
    counts: OperationCounts,
    enforce_indexes: bool,
}

impl Shared {
    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn complete_key(&self, mut entity: Entity) -> Entity {
        if !entity.key().is_complete() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let key = entity.key().complete_with_id(id);
            entity.set_key(key);
        }
        entity
    }

    fn run_query(&self, query: &Query) -> EntityIter {
        self.counts.queries.fetch_add(1, Ordering::SeqCst);
        let candidates = self.state.read().in_insertion_order();
        let results = evaluator::evaluate(candidates, query, self.enforce_indexes);
        Box::new(results.into_iter())
    }
}

/// In-memory backend client
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct MemoryDatastore {
    shared: Arc<Shared>,
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatastore {
    /// Create an empty store that ignores indexing hints in queries
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Create an empty store whose queries skip unindexed properties,
    /// like the real service does
    pub fn with_index_enforcement() -> Self {
        Self::build(true)
    }

    fn build(enforce_indexes: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(StoreState::default()),
                version: AtomicU64::new(0),
                next_id: AtomicI64::new(1),
                next_txn_id: AtomicU64::new(1),
                commit_log: Mutex::new(Vec::new()),
                counts: OperationCounts::default(),
                enforce_indexes,
            }),
        }
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.shared.state.read().entities.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the commit log, oldest first
    pub fn commit_log(&self) -> Vec<CommitRecord> {
        self.shared.commit_log.lock().clone()
    }

    /// Backend call counters
    pub fn counts(&self) -> &OperationCounts {
        &self.shared.counts
    }
}

impl ReaderWriter for MemoryDatastore {
    fn get_many(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        self.shared.counts.gets.fetch_add(1, Ordering::SeqCst);
        let state = self.shared.state.read();
        Ok(keys.iter().map(|k| state.get(k)).collect())
    }

    fn put(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        self.shared.counts.puts.fetch_add(1, Ordering::SeqCst);
        let completed: Vec<Entity> = entities
            .into_iter()
            .map(|e| self.shared.complete_key(e))
            .collect();
        let mut state = self.shared.state.write();
        for entity in &completed {
            let version = self.shared.next_version();
            state.apply_put(entity.clone(), version);
        }
        Ok(completed)
    }

    fn delete(&self, keys: &[Key]) -> Result<()> {
        self.shared.counts.deletes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.shared.state.write();
        for key in keys {
            let version = self.shared.next_version();
            state.apply_delete(&key.encode(), version);
        }
        Ok(())
    }

    fn run_query(&self, query: &Query) -> Result<EntityIter> {
        Ok(self.shared.run_query(query))
    }
}

impl Datastore for MemoryDatastore {
    fn name(&self) -> &str {
        "memory"
    }

    fn begin_transaction(&self) -> Result<Arc<dyn Transaction>> {
        self.shared.counts.begins.fetch_add(1, Ordering::SeqCst);
        let id = self.shared.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = MemoryTransaction {
            id,
            shared: Arc::clone(&self.shared),
            start_version: self.shared.current_version(),
            inner: Mutex::new(TxnState {
                status: TransactionStatus::Active,
                writes: Vec::new(),
                touched: Vec::new(),
            }),
        };
        debug!(target: "entitymap::memory", txn_id = id, "Began transaction");
        Ok(Arc::new(txn))
    }
}

/// Buffered mutation
#[derive(Debug, Clone)]
enum Mutation {
    Put(Entity),
    Delete(Key),
}

struct TxnState {
    status: TransactionStatus,
    writes: Vec<Mutation>,
    /// Encoded keys read or written, checked for conflicts at commit
    touched: Vec<String>,
}

/// Transaction over a [`MemoryDatastore`]
pub struct MemoryTransaction {
    id: u64,
    shared: Arc<Shared>,
    start_version: u64,
    inner: Mutex<TxnState>,
}

impl MemoryTransaction {
    fn ensure_active(&self, state: &TxnState) -> Result<()> {
        if state.status == TransactionStatus::Active {
            Ok(())
        } else {
            Err(Error::TransactionClosed(self.id))
        }
    }

    /// Keys of the buffered (uncommitted) puts
    pub fn pending_keys(&self) -> Vec<Key> {
        self.inner
            .lock()
            .writes
            .iter()
            .filter_map(|m| match m {
                Mutation::Put(e) => Some(e.key().clone()),
                Mutation::Delete(_) => None,
            })
            .collect()
    }
}

impl ReaderWriter for MemoryTransaction {
    fn get_many(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        self.shared.counts.gets.fetch_add(1, Ordering::SeqCst);
        inner.touched.extend(keys.iter().map(Key::encode));
        let state = self.shared.state.read();
        Ok(keys.iter().map(|k| state.get(k)).collect())
    }

    fn put(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        self.shared.counts.puts.fetch_add(1, Ordering::SeqCst);
        let completed: Vec<Entity> = entities
            .into_iter()
            .map(|e| self.shared.complete_key(e))
            .collect();
        for entity in &completed {
            inner.touched.push(entity.key().encode());
            inner.writes.push(Mutation::Put(entity.clone()));
        }
        Ok(completed)
    }

    fn delete(&self, keys: &[Key]) -> Result<()> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        self.shared.counts.deletes.fetch_add(1, Ordering::SeqCst);
        for key in keys {
            inner.touched.push(key.encode());
            inner.writes.push(Mutation::Delete(key.clone()));
        }
        Ok(())
    }

    fn run_query(&self, query: &Query) -> Result<EntityIter> {
        let inner = self.inner.lock();
        self.ensure_active(&inner)?;
        Ok(self.shared.run_query(query))
    }
}

impl Transaction for MemoryTransaction {
    fn id(&self) -> u64 {
        self.id
    }

    fn status(&self) -> TransactionStatus {
        self.inner.lock().status
    }

    fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;

        let mut state = self.shared.state.write();
        let conflict = inner
            .touched
            .iter()
            .find(|encoded| {
                state
                    .last_modified
                    .get(*encoded)
                    .is_some_and(|v| *v > self.start_version)
            })
            .cloned();
        if let Some(encoded) = conflict {
            let key = inner
                .writes
                .iter()
                .find_map(|m| match m {
                    Mutation::Put(e) if e.key().encode() == encoded => Some(e.key().clone()),
                    Mutation::Delete(k) if k.encode() == encoded => Some(k.clone()),
                    _ => None,
                })
                .or_else(|| state.entities.get(&encoded).map(|s| s.entity.key().clone()));
            inner.status = TransactionStatus::RolledBack;
            inner.writes.clear();
            debug!(target: "entitymap::memory", txn_id = self.id, key = %encoded, "Commit conflict");
            return Err(match key {
                Some(key) => Error::Conflict {
                    txn_id: self.id,
                    key,
                },
                None => Error::Backend(format!(
                    "transaction {} conflicts on deleted key {}",
                    self.id, encoded
                )),
            });
        }

        let mut record = CommitRecord {
            txn_id: self.id,
            written: Vec::new(),
            deleted: Vec::new(),
        };
        for mutation in inner.writes.drain(..) {
            let version = self.shared.next_version();
            match mutation {
                Mutation::Put(entity) => {
                    record.written.push(entity.key().clone());
                    state.apply_put(entity, version);
                }
                Mutation::Delete(key) => {
                    state.apply_delete(&key.encode(), version);
                    record.deleted.push(key);
                }
            }
        }
        drop(state);

        inner.status = TransactionStatus::Committed;
        self.shared.counts.commits.fetch_add(1, Ordering::SeqCst);
        debug!(
            target: "entitymap::memory",
            txn_id = self.id,
            writes = record.written.len(),
            deletes = record.deleted.len(),
            "Committed transaction"
        );
        self.shared.commit_log.lock().push(record);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.ensure_active(&inner)?;
        inner.status = TransactionStatus::RolledBack;
        inner.writes.clear();
        debug!(target: "entitymap::memory", txn_id = self.id, "Rolled back transaction");
        Ok(())
    }
}
