//! Database builder
//!
//! ```ignore
//! // 1. Defaults: memory backend, test environment only
//! let db = Database::open(&DatastoreConfig::test("demo"))?;
//!
//! // 2. Custom registry for other environments
//! let db = Database::builder()
//!     .config(DatastoreConfig::from_env()?)
//!     .registry(registry)
//!     .open()?;
//!
//! // 3. Pre-connected client
//! let db = Database::builder()
//!     .config(DatastoreConfig::test("demo"))
//!     .client(Arc::new(MemoryDatastore::new()))
//!     .open()?;
//! ```

use std::fmt;
use std::sync::Arc;

use entitymap_core::{Error, Result};
use entitymap_storage::{BackendRegistry, Datastore};

use super::{Database, DatastoreConfig};

/// Builder for [`Database`]
#[derive(Default)]
pub struct DatabaseBuilder {
    config: Option<DatastoreConfig>,
    registry: Option<BackendRegistry>,
    client: Option<Arc<dyn Datastore>>,
}

impl fmt::Debug for DatabaseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

impl DatabaseBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration (required)
    pub fn config(mut self, config: DatastoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `registry` to select the backend
    pub fn registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use an already connected client; the registry is ignored
    pub fn client(mut self, client: Arc<dyn Datastore>) -> Self {
        self.client = Some(client);
        self
    }

    /// Validate the configuration and connect
    ///
    /// # Errors
    ///
    /// - `Config` if no configuration was given or it is invalid
    /// - `MissingBackend` if the registry has nothing for the environment
    pub fn open(self) -> Result<Database> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("database configuration is required".to_string()))?;
        if let Some(client) = self.client {
            return Database::with_client(client, &config);
        }
        let registry = self.registry.unwrap_or_else(BackendRegistry::testing);
        Database::connect(&config, &registry)
    }
}
