//! Property values of the wire entity model
//!
//! This module defines:
//! - Value: closed sum type of everything a backend property can hold
//! - GeoPoint: latitude/longitude pair
//!
//! ## Type Rules
//!
//! - No implicit coercions: `Int(1) != Float(1.0)`
//! - `Bytes` are not `String`
//! - Float equality is IEEE-754 (`NaN != NaN`); canonical ordering uses
//!   `total_cmp` so sorts are deterministic
//!
//! ## Canonical Ordering
//!
//! Values of different types order by type rank, mirroring the backend:
//! Null < Int < Timestamp < Bool < Bytes < String < Float < GeoPoint < Key
//! < Array < Entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::entity::Properties;
use crate::key::Key;

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A single property value as exchanged with the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Explicit null
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// Double
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Point in time, UTC
    Timestamp(DateTime<Utc>),
    /// Geographic point
    GeoPoint(GeoPoint),
    /// Reference to another entity
    Key(Key),
    /// Embedded (keyless) entity
    Entity(Properties),
    /// Repeated values
    Array(Vec<Value>),
}

impl Value {
    /// Variant name, as used in type mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Timestamp(_) => "Timestamp",
            Value::GeoPoint(_) => "GeoPoint",
            Value::Key(_) => "Key",
            Value::Entity(_) => "Entity",
            Value::Array(_) => "Array",
        }
    }

    /// Explicit null?
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Repeated value?
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// `Bool` payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `Int` payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// `Float` payload
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Borrow the text of a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the referenced key
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Borrow the elements of an `Array`
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) => 1,
            Value::Timestamp(_) => 2,
            Value::Bool(_) => 3,
            Value::Bytes(_) => 4,
            Value::String(_) => 5,
            Value::Float(_) => 6,
            Value::GeoPoint(_) => 7,
            Value::Key(_) => 8,
            Value::Array(_) => 9,
            Value::Entity(_) => 10,
        }
    }

    /// Total order used by query evaluation and sorting
    pub fn canonical_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::GeoPoint(a), Value::GeoPoint(b)) => a
                .latitude
                .total_cmp(&b.latitude)
                .then(a.longitude.total_cmp(&b.longitude)),
            (Value::Key(a), Value::Key(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.canonical_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Entity(a), Value::Entity(b)) => {
                for ((ka, pa), (kb, pb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| pa.value.canonical_cmp(&pb.value));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Key> for Value {
    fn from(k: Key) -> Self {
        Value::Key(k)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}
