//! Backend query objects
//!
//! These are the untyped filter and ordering values a backend receives.
//! Property names here are already storage names; name resolution happens
//! in the engine's query translator.

use std::cmp::Ordering;
use std::fmt;

use entitymap_core::{Error, Key, Result, Value};

/// Pseudo-property addressing the entity key in filters and orderings
pub const KEY_PROPERTY: &str = "__key__";

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// `=`
    Equal,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl FilterOp {
    /// Does a comparison result `stored.cmp(operand)` satisfy this operator?
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            FilterOp::Equal => ordering == Ordering::Equal,
            FilterOp::LessThan => ordering == Ordering::Less,
            FilterOp::LessThanOrEqual => ordering != Ordering::Greater,
            FilterOp::GreaterThan => ordering == Ordering::Greater,
            FilterOp::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }

    /// Operator symbol
    pub fn symbol(self) -> &'static str {
        match self {
            FilterOp::Equal => "=",
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::GreaterThan => ">",
            FilterOp::GreaterThanOrEqual => ">=",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Backend filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Compare a stored property with a value
    Property {
        /// Storage name (dotted for flattened properties)
        property: String,
        /// Operator
        op: FilterOp,
        /// Operand
        value: Value,
    },
    /// Entity key must equal or descend from this key
    HasAncestor(Key),
    /// All sub-filters must match
    And(Vec<Filter>),
}

impl Filter {
    /// Property comparison
    pub fn property(property: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Filter::Property {
            property: property.into(),
            op,
            value,
        }
    }

    /// Combine filters conjunctively
    ///
    /// Zero filters is an error, a single filter passes through unchanged and
    /// several are wrapped in [`Filter::And`].
    pub fn all(mut filters: Vec<Filter>) -> Result<Filter> {
        match filters.len() {
            0 => Err(Error::EmptyFilter),
            1 => Ok(filters.remove(0)),
            _ => Ok(Filter::And(filters)),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// One ordering clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOrder {
    /// Storage name
    pub property: String,
    /// Direction
    pub direction: Direction,
}

impl PropertyOrder {
    /// Create an ordering clause
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }
}

/// Kind query as handed to a backend
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// Kind to scan
    pub kind: String,
    /// Namespace, `None` for default
    pub namespace: Option<String>,
    /// Optional filter
    pub filter: Option<Filter>,
    /// Orderings, primary first
    pub order: Vec<PropertyOrder>,
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Results to skip
    pub offset: usize,
}

impl Query {
    /// Unfiltered query over a kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Set the namespace
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    /// Set the filter
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append an ordering clause
    pub fn order_by(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.order.push(PropertyOrder::new(property, direction));
        self
    }

    /// Limit the number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip results
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
