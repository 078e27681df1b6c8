//! Conversions between Rust field types and property values
//!
//! [`PropertyType`] is implemented for every scalar the codec supports, for
//! `Option<T>` (nullable) and for `Vec<T>` (repeated). A field's
//! [`FieldKind`] is derived from the same trait, so schemas never disagree
//! with the conversions.
//!
//! | Rust type | Stored as |
//! |-----------|-----------|
//! | `String` | `String` |
//! | `i64`, `i32` | `Int` |
//! | `bool` | `Bool` |
//! | `f64` | `Float` |
//! | [`Blob`] | `Bytes` |
//! | `DateTime<Utc>` | `Timestamp` |
//! | `NaiveDate` | `Timestamp` at 00:00:00 UTC |
//! | `NaiveTime` | `Timestamp` on 1970-01-01 UTC |
//! | `GeoPoint` | `GeoPoint` |
//! | `Key` | `Key` |
//! | `Option<T>` | `T` or `Null` |
//! | `Vec<T>` | `Array`, never `Null` |

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use entitymap_core::{Error, GeoPoint, Key, Result, Value};

use crate::schema::{FieldKind, ScalarKind};

/// A Rust type that can be stored in a single property
pub trait PropertyType: Sized {
    /// `None` is a legal value
    const NULLABLE: bool = false;

    /// Field kind for schemas
    fn kind() -> FieldKind;

    /// Convert to a property value
    fn to_value(&self) -> Value;

    /// Convert from a property value stored under `property`
    fn from_value(property: &str, value: Value) -> Result<Self>;
}

/// Byte sequence stored as `Bytes`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob(pub Vec<u8>);

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob(bytes.to_vec())
    }
}

fn unexpected(property: &str, expected: ScalarKind, found: &Value) -> Error {
    if found.is_null() {
        Error::NullViolation {
            property: property.to_string(),
        }
    } else {
        Error::type_mismatch(property, expected.value_type(), found.type_name())
    }
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

macro_rules! scalar_property {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl PropertyType for $ty {
            fn kind() -> FieldKind {
                FieldKind::Scalar(ScalarKind::$kind)
            }

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(property: &str, value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(unexpected(property, ScalarKind::$kind, &other)),
                }
            }
        }
    };
}

scalar_property!(String, String, String);
scalar_property!(i64, Int, Int);
scalar_property!(bool, Bool, Bool);
scalar_property!(f64, Float, Float);
scalar_property!(DateTime<Utc>, Timestamp, Timestamp);
scalar_property!(GeoPoint, GeoPoint, GeoPoint);
scalar_property!(Key, Key, Key);

impl PropertyType for i32 {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Int)
    }

    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }

    fn from_value(property: &str, value: Value) -> Result<Self> {
        match value {
            Value::Int(v) => {
                i32::try_from(v).map_err(|_| Error::type_mismatch(property, "Int (i32)", "Int"))
            }
            other => Err(unexpected(property, ScalarKind::Int, &other)),
        }
    }
}

impl PropertyType for Blob {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Bytes)
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }

    fn from_value(property: &str, value: Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => Ok(Blob(bytes)),
            other => Err(unexpected(property, ScalarKind::Bytes, &other)),
        }
    }
}

impl PropertyType for NaiveDate {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Date)
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(Utc.from_utc_datetime(&self.and_time(NaiveTime::MIN)))
    }

    fn from_value(property: &str, value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(ts.date_naive()),
            other => Err(unexpected(property, ScalarKind::Date, &other)),
        }
    }
}

impl PropertyType for NaiveTime {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Time)
    }

    fn to_value(&self) -> Value {
        let at_epoch = NaiveDateTime::new(epoch_date(), *self);
        Value::Timestamp(Utc.from_utc_datetime(&at_epoch))
    }

    fn from_value(property: &str, value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(ts.time()),
            other => Err(unexpected(property, ScalarKind::Time, &other)),
        }
    }
}

impl<T: PropertyType> PropertyType for Option<T> {
    const NULLABLE: bool = true;

    fn kind() -> FieldKind {
        T::kind()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None if T::kind().is_repeated() => Value::Array(Vec::new()),
            None => Value::Null,
        }
    }

    fn from_value(property: &str, value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(property, other).map(Some),
        }
    }
}

impl<T: PropertyType> PropertyType for Vec<T> {
    fn kind() -> FieldKind {
        match T::kind() {
            FieldKind::Scalar(scalar) => FieldKind::Repeated(scalar),
            FieldKind::Repeated(_) => FieldKind::Unsupported("list of lists"),
            _ => FieldKind::Unsupported("list of non-scalar values"),
        }
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(PropertyType::to_value).collect())
    }

    fn from_value(property: &str, value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| T::from_value(property, item))
                .collect(),
            other => Err(Error::type_mismatch(property, "Array", other.type_name())),
        }
    }
}
