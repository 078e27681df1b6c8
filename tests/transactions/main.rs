//! Transaction and Query Integration Tests
//!
//! Context propagation, isolation, structured concurrency, and query
//! semantics over the memory backend.

#[path = "../common/mod.rs"]
mod common;

mod concurrent;
mod isolation;
mod propagation;
