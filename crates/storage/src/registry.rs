//! Backend selection by deployment environment
//!
//! A [`BackendRegistry`] maps each [`Environment`] to exactly one
//! [`BackendProvider`]. The registry is built once from an explicit list of
//! providers, so new backends plug in without touching this module.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = BackendRegistry::new(vec![
//!     Arc::new(MemoryProvider::new(Environment::Test)),
//! ])?;
//! let client = registry.connect(Environment::Test, &settings)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use entitymap_core::{Error, Result};

use crate::backend::Datastore;
use crate::memory::MemoryDatastore;

/// Deployment environment tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Live service
    Production,
    /// Local emulator or shared dev project
    Development,
    /// In-process test backend
    Test,
}

impl Environment {
    /// Lowercase tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            other => Err(Error::Config(format!("unknown environment '{}'", other))),
        }
    }
}

/// Connection parameters handed to a provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendSettings {
    /// Project the backend serves
    pub project_id: String,
    /// Default namespace, if any
    pub namespace: Option<String>,
}

impl BackendSettings {
    /// Settings for a project in the default namespace
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            namespace: None,
        }
    }

    /// Set the default namespace; empty means none
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = if namespace.is_empty() {
            None
        } else {
            Some(namespace)
        };
        self
    }
}

/// Factory for one backend implementation
pub trait BackendProvider: Send + Sync {
    /// Environment this provider serves
    fn environment(&self) -> Environment;

    /// Provider name for logs and errors
    fn name(&self) -> &str;

    /// Open a client
    fn connect(&self, settings: &BackendSettings) -> Result<Arc<dyn Datastore>>;
}

/// Environment → provider mapping
pub struct BackendRegistry {
    providers: HashMap<Environment, Arc<dyn BackendProvider>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<(Environment, &str)> = self
            .providers
            .iter()
            .map(|(env, p)| (*env, p.name()))
            .collect();
        names.sort_by_key(|(env, _)| env.as_str());
        f.debug_struct("BackendRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl BackendRegistry {
    /// Build a registry
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateBackend`] if two providers claim the same environment.
    pub fn new(providers: Vec<Arc<dyn BackendProvider>>) -> Result<Self> {
        let mut map: HashMap<Environment, Arc<dyn BackendProvider>> = HashMap::new();
        for provider in providers {
            let env = provider.environment();
            if let Some(existing) = map.get(&env) {
                return Err(Error::DuplicateBackend {
                    environment: env.to_string(),
                    first: existing.name().to_string(),
                    second: provider.name().to_string(),
                });
            }
            debug!(target: "entitymap::registry", environment = %env, provider = provider.name(), "Registered backend");
            map.insert(env, provider);
        }
        Ok(Self { providers: map })
    }

    /// Registry serving only [`Environment::Test`] from a fresh memory backend
    pub fn testing() -> Self {
        let mut providers: HashMap<Environment, Arc<dyn BackendProvider>> = HashMap::new();
        providers.insert(
            Environment::Test,
            Arc::new(MemoryProvider::new(Environment::Test)),
        );
        Self { providers }
    }

    /// Provider for `environment`
    ///
    /// # Errors
    ///
    /// [`Error::MissingBackend`] if none is registered.
    pub fn resolve(&self, environment: Environment) -> Result<Arc<dyn BackendProvider>> {
        self.providers
            .get(&environment)
            .cloned()
            .ok_or_else(|| Error::MissingBackend {
                environment: environment.to_string(),
            })
    }

    /// Resolve and connect in one step
    pub fn connect(
        &self,
        environment: Environment,
        settings: &BackendSettings,
    ) -> Result<Arc<dyn Datastore>> {
        let provider = self.resolve(environment)?;
        let client = provider.connect(settings)?;
        info!(
            target: "entitymap::registry",
            environment = %environment,
            provider = provider.name(),
            project = %settings.project_id,
            "Connected backend"
        );
        Ok(client)
    }

    /// Registered environments
    pub fn environments(&self) -> Vec<Environment> {
        let mut envs: Vec<Environment> = self.providers.keys().copied().collect();
        envs.sort_by_key(|env| env.as_str());
        envs
    }
}

/// Provider backed by [`MemoryDatastore`]
pub struct MemoryProvider {
    environment: Environment,
    shared: Option<MemoryDatastore>,
}

impl MemoryProvider {
    /// Each connect yields a new, empty store
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            shared: None,
        }
    }

    /// Every connect yields the same store
    pub fn shared(environment: Environment, store: MemoryDatastore) -> Self {
        Self {
            environment,
            shared: Some(store),
        }
    }
}

impl BackendProvider for MemoryProvider {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&self, _settings: &BackendSettings) -> Result<Arc<dyn Datastore>> {
        let store = match &self.shared {
            Some(store) => store.clone(),
            None => MemoryDatastore::new(),
        };
        Ok(Arc::new(store))
    }
}
