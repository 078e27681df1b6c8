//! Wire-form entities
//!
//! An [`Entity`] is a key plus an ordered mapping from (possibly dotted)
//! property names to [`Property`] values. It only exists at the backend
//! boundary: created per get/put call and discarded after conversion.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::key::Key;
use crate::value::Value;

/// Ordered property map, keyed by storage name
pub type Properties = BTreeMap<String, Property>;

/// A stored value plus its indexing hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// The value
    pub value: Value,
    /// Whether the backend should index this property
    pub indexed: bool,
}

impl Property {
    /// Property with an explicit indexing hint
    pub fn new(value: Value, indexed: bool) -> Self {
        Self { value, indexed }
    }

    /// Indexed property
    pub fn indexed(value: Value) -> Self {
        Self::new(value, true)
    }

    /// Unindexed property
    pub fn unindexed(value: Value) -> Self {
        Self::new(value, false)
    }
}

/// Keyed entity as exchanged with the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    key: Key,
    properties: Properties,
}

impl Entity {
    /// Empty entity with the given key
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: Properties::new(),
        }
    }

    /// Entity from a key and an existing property map
    pub fn from_parts(key: Key, properties: Properties) -> Self {
        Self { key, properties }
    }

    /// The entity's key
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Replace the key (used when the backend completes an incomplete key)
    pub fn set_key(&mut self, key: Key) {
        self.key = key;
    }

    /// Set a property, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, property: Property) {
        self.properties.insert(name.into(), property);
    }

    /// Builder-style `set`
    pub fn with(mut self, name: impl Into<String>, value: Value, indexed: bool) -> Self {
        self.set(name, Property::new(value, indexed));
        self
    }

    /// Property by storage name
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Property value by storage name
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).map(|p| &p.value)
    }

    /// True if the property is present (including explicit null)
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Remove a property
    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.properties.remove(name)
    }

    /// All properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// True if there are no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Split into key and properties
    pub fn into_parts(self) -> (Key, Properties) {
        (self.key, self.properties)
    }
}
