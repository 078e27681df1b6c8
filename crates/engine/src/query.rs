//! Typed queries
//!
//! [`FilterBuilder`] accumulates conditions on record fields; [`ModelQuery`]
//! adds ordering and paging. Both are translated against the model's schema
//! into a backend [`Query`]:
//!
//! - field names may be code names, storage names or dotted paths through
//!   structured and nested fields; `__key__` addresses the key
//! - operands are converted with the codec's rules (a date becomes a
//!   midnight timestamp, and so on)
//! - no conditions is an error, one is passed through, several are combined
//!   conjunctively
//!
//! ```rust,ignore
//! let adults = ModelQuery::<Person>::new()
//!     .filter(FilterBuilder::new().ge("age", 18i64).eq("address.city", "Oslo".to_string()))
//!     .order_by("name", Direction::Ascending)
//!     .limit(10);
//! let people = db.query(&adults)?;
//! ```

use std::marker::PhantomData;

use entitymap_core::{Key, Result, Value};
use entitymap_storage::{Direction, Filter, FilterOp, Query, KEY_PROPERTY};

use crate::codec::Model;
use crate::property::PropertyType;
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Compare {
        field: String,
        op: FilterOp,
        value: Value,
    },
    Ancestor(Key),
}

/// Accumulates filter conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterBuilder {
    conditions: Vec<Condition>,
}

impl FilterBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a comparison with an already converted value
    pub fn compare(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.conditions.push(Condition::Compare {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// `field = value`
    pub fn eq<T: PropertyType>(self, field: impl Into<String>, value: T) -> Self {
        self.compare(field, FilterOp::Equal, value.to_value())
    }

    /// `field < value`
    pub fn lt<T: PropertyType>(self, field: impl Into<String>, value: T) -> Self {
        self.compare(field, FilterOp::LessThan, value.to_value())
    }

    /// `field <= value`
    pub fn le<T: PropertyType>(self, field: impl Into<String>, value: T) -> Self {
        self.compare(field, FilterOp::LessThanOrEqual, value.to_value())
    }

    /// `field > value`
    pub fn gt<T: PropertyType>(self, field: impl Into<String>, value: T) -> Self {
        self.compare(field, FilterOp::GreaterThan, value.to_value())
    }

    /// `field >= value`
    pub fn ge<T: PropertyType>(self, field: impl Into<String>, value: T) -> Self {
        self.compare(field, FilterOp::GreaterThanOrEqual, value.to_value())
    }

    /// Restrict to `ancestor` and its descendants
    pub fn ancestor(mut self, ancestor: Key) -> Self {
        self.conditions.push(Condition::Ancestor(ancestor));
        self
    }

    /// Number of conditions
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// True if no condition was added
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Translate into a backend filter against `schema`
    pub fn translate(&self, schema: &Schema) -> Result<Filter> {
        let filters = self
            .conditions
            .iter()
            .map(|condition| match condition {
                Condition::Compare { field, op, value } => Ok(Filter::property(
                    resolve_name(schema, field)?,
                    *op,
                    value.clone(),
                )),
                Condition::Ancestor(key) => Ok(Filter::HasAncestor(key.clone())),
            })
            .collect::<Result<Vec<_>>>()?;
        Filter::all(filters)
    }
}

fn resolve_name(schema: &Schema, name: &str) -> Result<String> {
    if name == KEY_PROPERTY {
        return Ok(KEY_PROPERTY.to_string());
    }
    schema.resolve_path(name)
}

/// Query over one model type
#[derive(Debug, Clone)]
pub struct ModelQuery<M> {
    filter: Option<FilterBuilder>,
    order: Vec<(String, Direction)>,
    limit: Option<usize>,
    offset: usize,
    namespace: Option<String>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Default for ModelQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> ModelQuery<M> {
    /// All entities of the model's kind
    pub fn new() -> Self {
        Self {
            filter: None,
            order: Vec::new(),
            limit: None,
            offset: 0,
            namespace: None,
            _model: PhantomData,
        }
    }

    /// Set the filter; an empty builder fails at translation
    pub fn filter(mut self, filter: FilterBuilder) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append an ordering clause
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.push((field.into(), direction));
        self
    }

    /// Maximum number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Results to skip
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Query a specific namespace instead of the database default
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Namespace set on this query, if any
    pub fn namespace_override(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Translate into a backend query
    pub fn translate(&self) -> Result<Query> {
        let schema = M::schema();
        let mut query = Query::new(schema.kind()).with_namespace(self.namespace.clone());
        if let Some(filter) = &self.filter {
            query = query.with_filter(filter.translate(schema)?);
        }
        for (field, direction) in &self.order {
            query = query.order_by(resolve_name(schema, field)?, *direction);
        }
        if let Some(limit) = self.limit {
            query = query.with_limit(limit);
        }
        Ok(query.with_offset(self.offset))
    }
}
