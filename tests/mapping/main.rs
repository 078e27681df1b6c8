//! Mapping Integration Tests
//!
//! Record ↔ entity conversion through the public database handle.

#[path = "../common/mod.rs"]
mod common;

mod properties;
mod read_only;
mod round_trip;
