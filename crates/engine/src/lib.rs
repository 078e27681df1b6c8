//! Typed mapping layer
//!
//! This crate turns records into backend entities and back:
//! - Schema: field descriptors built once per record type
//! - Codec: `Record` / `Model` traits, entity writer and reader
//! - Property types: scalar conversions shared by codec and queries
//! - Queries: typed filters, ordering and paging
//! - Database: context-aware sync and async operations, transaction blocks
//!
//! The engine never talks to a backend directly; every call goes through the
//! ambient context kept by the concurrency crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod database;
pub mod property;
pub mod query;
pub mod schema;

pub use codec::{
    decode_properties, encode_properties, from_entity, to_entity, EntityReader, EntityWriter,
    Model, Record,
};
pub use database::{
    Database, DatabaseBuilder, DatastoreConfig, DbFuture, ENV_ENVIRONMENT, ENV_NAMESPACE,
    ENV_PROJECT_ID,
};
pub use property::{Blob, PropertyType};
pub use query::{FilterBuilder, ModelQuery};
pub use schema::{FieldDescriptor, FieldKind, ScalarKind, Schema, SchemaBuilder};
