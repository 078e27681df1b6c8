//! Datastore configuration
//!
//! A [`DatastoreConfig`] names the deployment environment, the project and an
//! optional default namespace. It is built in code, read from a TOML file, or
//! read from the process environment at the entry point with
//! [`DatastoreConfig::from_env`]. Nothing else in the library reads
//! environment variables.
//!
//! # Example
//!
//! ```toml
//! environment = "test"
//! project_id = "demo-project"
//! # namespace = "tenant-a"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use entitymap_core::{Error, Result};
use entitymap_storage::{BackendSettings, Environment};

/// Variable holding the environment tag
pub const ENV_ENVIRONMENT: &str = "DATASTORE_ENVIRONMENT";
/// Variable holding the project id
pub const ENV_PROJECT_ID: &str = "DATASTORE_PROJECT_ID";
/// Variable holding the default namespace
pub const ENV_NAMESPACE: &str = "DATASTORE_NAMESPACE";

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Deployment environment selecting the backend
    pub environment: Environment,
    /// Project the data lives in
    pub project_id: String,
    /// Default namespace for queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl DatastoreConfig {
    /// Config for `project_id` in `environment`
    pub fn new(environment: Environment, project_id: impl Into<String>) -> Self {
        Self {
            environment,
            project_id: project_id.into(),
            namespace: None,
        }
    }

    /// Shorthand for the test environment
    pub fn test(project_id: impl Into<String>) -> Self {
        Self::new(Environment::Test, project_id)
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

    /// Check required values
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(Error::Config("project id is not set".to_string()));
        }
        Ok(())
    }

    /// Settings handed to the backend provider
    pub fn settings(&self) -> BackendSettings {
        let settings = BackendSettings::new(self.project_id.clone());
        match &self.namespace {
            Some(namespace) => settings.with_namespace(namespace.clone()),
            None => settings,
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: DatastoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.namespace = config.namespace.filter(|ns| !ns.is_empty());
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize this config to TOML and write it to `path`
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Read `DATASTORE_ENVIRONMENT`, `DATASTORE_PROJECT_ID` and
    /// `DATASTORE_NAMESPACE` from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from a variable lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let environment = lookup(ENV_ENVIRONMENT)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", ENV_ENVIRONMENT)))?
            .parse::<Environment>()?;
        let project_id = lookup(ENV_PROJECT_ID)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", ENV_PROJECT_ID)))?;
        let mut config = Self::new(environment, project_id);
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            config = config.with_namespace(namespace);
        }
        Ok(config)
    }
}
