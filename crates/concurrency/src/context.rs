//! Ambient database context
//!
//! Every execution flow carries at most one [`DbContext`]: either the plain
//! backend client or an active transaction. The value lives in a tokio
//! task-local, so it is scoped to the current task (or the current
//! synchronous call via [`with_context`]) and is never a mutable global.
//!
//! The context is NOT inherited by tasks spawned with `tokio::spawn`; use the
//! helpers in [`spawn`](crate::spawn) to carry it across.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use entitymap_core::{Entity, Key, Result};
use entitymap_storage::{Datastore, EntityIter, Query, Transaction};

use crate::tracker::ScopeTracker;

tokio::task_local! {
    static CURRENT: DbContext;
}

#[derive(Clone)]
enum Scope {
    Client(Arc<dyn Datastore>),
    Transaction {
        client: Arc<dyn Datastore>,
        txn: Arc<dyn Transaction>,
        tracker: Arc<ScopeTracker>,
    },
}

/// Handle operations dispatch through: the client or a transaction
///
/// Cloning is cheap. A transactional context can only be created by the
/// transaction engine in this crate.
#[derive(Clone)]
pub struct DbContext {
    database_id: u64,
    scope: Scope,
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DbContext");
        s.field("database_id", &self.database_id);
        match &self.scope {
            Scope::Client(client) => s.field("client", &client.name()),
            Scope::Transaction { txn, .. } => s.field("transaction", &txn.id()),
        };
        s.finish()
    }
}

impl DbContext {
    /// Non-transactional context over `client`
    pub fn client(database_id: u64, client: Arc<dyn Datastore>) -> Self {
        Self {
            database_id,
            scope: Scope::Client(client),
        }
    }

    pub(crate) fn transactional(
        database_id: u64,
        client: Arc<dyn Datastore>,
        txn: Arc<dyn Transaction>,
        tracker: Arc<ScopeTracker>,
    ) -> Self {
        Self {
            database_id,
            scope: Scope::Transaction {
                client,
                txn,
                tracker,
            },
        }
    }

    /// Id of the database handle this context belongs to
    pub fn database_id(&self) -> u64 {
        self.database_id
    }

    /// True inside a transaction
    pub fn is_transactional(&self) -> bool {
        matches!(self.scope, Scope::Transaction { .. })
    }

    /// The shared backend client
    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        match &self.scope {
            Scope::Client(client) => client,
            Scope::Transaction { client, .. } => client,
        }
    }

    /// The active transaction, if any
    pub fn transaction(&self) -> Option<&Arc<dyn Transaction>> {
        match &self.scope {
            Scope::Client(_) => None,
            Scope::Transaction { txn, .. } => Some(txn),
        }
    }

    /// Join barrier of the transactional scope, if any
    pub fn tracker(&self) -> Option<&Arc<ScopeTracker>> {
        match &self.scope {
            Scope::Client(_) => None,
            Scope::Transaction { tracker, .. } => Some(tracker),
        }
    }

    /// Fetch entities, one slot per key
    pub fn get_many(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        match &self.scope {
            Scope::Client(client) => client.get_many(keys),
            Scope::Transaction { txn, .. } => txn.get_many(keys),
        }
    }

    /// Store entities, returning them with complete keys
    pub fn put(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        match &self.scope {
            Scope::Client(client) => client.put(entities),
            Scope::Transaction { txn, .. } => txn.put(entities),
        }
    }

    /// Delete entities
    pub fn delete(&self, keys: &[Key]) -> Result<()> {
        match &self.scope {
            Scope::Client(client) => client.delete(keys),
            Scope::Transaction { txn, .. } => txn.delete(keys),
        }
    }

    /// Run a backend query
    pub fn run_query(&self, query: &Query) -> Result<EntityIter> {
        match &self.scope {
            Scope::Client(client) => client.run_query(query),
            Scope::Transaction { txn, .. } => txn.run_query(query),
        }
    }
}

/// The context of the current flow, if one is in scope
pub fn current() -> Option<DbContext> {
    CURRENT.try_with(|ctx| ctx.clone()).ok()
}

/// The current context if it belongs to `database_id`
pub fn current_for(database_id: u64) -> Option<DbContext> {
    current().filter(|ctx| ctx.database_id == database_id)
}

/// Run `f` with `ctx` as the current context
///
/// The previous context is restored when `f` returns or unwinds.
pub fn with_context<R>(ctx: DbContext, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(ctx, f)
}

/// Run `fut` with `ctx` as the current context while it is polled
pub async fn with_context_async<F: Future>(ctx: DbContext, fut: F) -> F::Output {
    CURRENT.scope(ctx, fut).await
}
