//! Database handle
//!
//! [`Database`] is the entry point of the mapping layer. It converts records
//! with the entity codec and dispatches every operation to the current
//! context: the active transaction if the calling flow is inside one of this
//! database's transactional blocks, the plain backend client otherwise.
//!
//! ## Operations
//!
//! | Sync | Async | Notes |
//! |------|-------|-------|
//! | `get`, `get_many` | `get_async`, `get_many_async` | not found is `Ok(None)` |
//! | `put`, `put_many` | `put_async`, `put_many_async` | read-only kinds rejected before any backend call |
//! | `delete`, `delete_many` | `delete_async` | |
//! | `query` | `query_async` | |
//! | `transaction` | `transaction_async` | commit on `Ok`, rollback on `Err` |
//!
//! Async variants run on tokio's blocking pool and carry the caller's
//! context, so they join the caller's transaction.
//!
//! ```text
//! let db = Database::open(&DatastoreConfig::test("demo"))?;
//! db.transaction(|| {
//!     let mut account: Account = db.get(&key)?.unwrap_or_default();
//!     account.balance += 10;
//!     db.put(&account)?;
//!     Ok(())
//! })?;
//! ```

mod builder;
pub mod config;
mod future;
mod transactions;

pub use builder::DatabaseBuilder;
pub use config::{DatastoreConfig, ENV_ENVIRONMENT, ENV_NAMESPACE, ENV_PROJECT_ID};
pub use future::DbFuture;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use entitymap_concurrency::{current_for, DbContext};
use entitymap_core::{Error, Key, Result};
use entitymap_storage::{BackendRegistry, Datastore, Environment};

use crate::codec::{from_entity, to_entity, Model};
use crate::query::ModelQuery;

static NEXT_DATABASE_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    client: Arc<dyn Datastore>,
    environment: Environment,
    project_id: String,
    namespace: Option<String>,
}

/// Handle to one configured datastore
///
/// Cloning is cheap; clones share the backend client and the same
/// transaction scope.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.inner.id)
            .field("backend", &self.inner.client.name())
            .field("environment", &self.inner.environment)
            .field("project_id", &self.inner.project_id)
            .field("namespace", &self.inner.namespace)
            .finish()
    }
}

impl Database {
    /// Open with the default registry (memory backend for the test
    /// environment only)
    pub fn open(config: &DatastoreConfig) -> Result<Self> {
        Self::builder().config(config.clone()).open()
    }

    /// Start configuring a database
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Wrap an already connected backend client
    pub fn with_client(client: Arc<dyn Datastore>, config: &DatastoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(client, config))
    }

    pub(crate) fn connect(config: &DatastoreConfig, registry: &BackendRegistry) -> Result<Self> {
        config.validate()?;
        let client = registry.connect(config.environment, &config.settings())?;
        Ok(Self::from_parts(client, config))
    }

    fn from_parts(client: Arc<dyn Datastore>, config: &DatastoreConfig) -> Self {
        let id = NEXT_DATABASE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "entitymap::db",
            database_id = id,
            backend = client.name(),
            environment = %config.environment,
            project = %config.project_id,
            "Opened database"
        );
        Self {
            inner: Arc::new(Inner {
                id,
                client,
                environment: config.environment,
                project_id: config.project_id.clone(),
                namespace: config.namespace.clone(),
            }),
        }
    }

    /// Process-unique id of this handle
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Environment the backend was selected for
    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    /// Project id
    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    /// Default namespace for queries
    pub fn namespace(&self) -> Option<&str> {
        self.inner.namespace.as_deref()
    }

    /// Shared backend client
    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.inner.client
    }

    /// Context operations dispatch through right now
    pub fn context(&self) -> DbContext {
        current_for(self.inner.id)
            .unwrap_or_else(|| DbContext::client(self.inner.id, Arc::clone(&self.inner.client)))
    }

    /// True if the calling flow is inside one of this database's transactions
    pub fn in_transaction(&self) -> bool {
        current_for(self.inner.id).is_some_and(|ctx| ctx.is_transactional())
    }

    fn ensure_writable<M: Model>() -> Result<()> {
        let schema = M::schema();
        schema.require_key()?;
        if schema.is_read_only() {
            return Err(Error::ReadOnly {
                kind: schema.kind().to_string(),
            });
        }
        Ok(())
    }

    /// Fetch one record
    pub fn get<M: Model>(&self, key: &Key) -> Result<Option<M>> {
        let mut found = self.get_many::<M>(std::slice::from_ref(key))?;
        Ok(found.pop().flatten())
    }

    /// Fetch several records, one slot per key in request order
    pub fn get_many<M: Model>(&self, keys: &[Key]) -> Result<Vec<Option<M>>> {
        M::schema().require_key()?;
        let entities = self.context().get_many(keys)?;
        debug!(target: "entitymap::db", kind = M::schema().kind(), requested = keys.len(), "get");
        entities
            .into_iter()
            .map(|entity| entity.map(from_entity::<M>).transpose())
            .collect()
    }

    /// Store one record, returning its complete key
    pub fn put<M: Model>(&self, model: &M) -> Result<Key> {
        let mut keys = self.put_many(std::slice::from_ref(model))?;
        keys.pop()
            .ok_or_else(|| Error::Backend("backend returned no key for put".to_string()))
    }

    /// Store several records, returning their complete keys in order
    ///
    /// # Errors
    ///
    /// [`Error::ReadOnly`] for read-only kinds, before any backend call.
    pub fn put_many<M: Model>(&self, models: &[M]) -> Result<Vec<Key>> {
        Self::ensure_writable::<M>()?;
        let entities = models.iter().map(to_entity).collect::<Result<Vec<_>>>()?;
        let stored = self.context().put(entities)?;
        debug!(target: "entitymap::db", kind = M::schema().kind(), count = stored.len(), "put");
        Ok(stored.into_iter().map(|e| e.key().clone()).collect())
    }

    /// Delete one entity
    pub fn delete(&self, key: &Key) -> Result<()> {
        self.delete_many(std::slice::from_ref(key))
    }

    /// Delete several entities; missing keys are ignored
    pub fn delete_many(&self, keys: &[Key]) -> Result<()> {
        self.context().delete(keys)?;
        debug!(target: "entitymap::db", count = keys.len(), "delete");
        Ok(())
    }

    /// Run a typed query
    ///
    /// Queries without an explicit namespace use the database default.
    pub fn query<M: Model>(&self, query: &ModelQuery<M>) -> Result<Vec<M>> {
        let mut backend_query = query.translate()?;
        if query.namespace_override().is_none() {
            backend_query = backend_query.with_namespace(self.inner.namespace.clone());
        }
        let results = self.context().run_query(&backend_query)?;
        let models = results.map(from_entity::<M>).collect::<Result<Vec<_>>>()?;
        debug!(target: "entitymap::db", kind = M::schema().kind(), results = models.len(), "query");
        Ok(models)
    }
}
