//! Core types for entitymap
//!
//! This crate defines the foundational types shared by every layer:
//! - Key: hierarchical entity identifier (kind, id-or-name, ancestors, namespace)
//! - Value: closed sum type of backend property values
//! - Entity: keyed property map, the backend boundary representation
//! - Error: the full failure taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod key;
pub mod value;

pub use entity::{Entity, Properties, Property};
pub use error::{Error, Result};
pub use key::{Key, KeyId, KeyProto, PathElement};
pub use value::{GeoPoint, Value};
