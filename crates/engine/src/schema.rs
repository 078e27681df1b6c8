//! Record schema descriptors
//!
//! A [`Schema`] lists a record type's fields with their storage names,
//! indexing hints and kinds. It is built once per type with
//! [`SchemaBuilder`] and cached in a `static`:
//!
//! ```rust,ignore
//! fn schema() -> &'static Schema {
//!     static SCHEMA: Lazy<Schema> = Lazy::new(|| {
//!         Schema::builder("Person")
//!             .key("key")
//!             .field::<String>("name").indexed()
//!             .field::<Option<i64>>("age").stored_as("years")
//!             .structured::<Address>("address")
//!             .build()
//!     });
//!     &SCHEMA
//! }
//! ```
//!
//! Field kinds come from [`PropertyType::kind`], so the descriptor always
//! agrees with the Rust type used by the codec.

use entitymap_core::{Error, Result};

use crate::codec::Record;
use crate::property::PropertyType;

/// Leaf value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// UTF-8 string
    String,
    /// 64- or 32-bit integer
    Int,
    /// Boolean
    Bool,
    /// Double
    Float,
    /// Byte sequence
    Bytes,
    /// Point in time
    Timestamp,
    /// Calendar date, stored as midnight UTC
    Date,
    /// Time of day, stored on 1970-01-01 UTC
    Time,
    /// Geographic point
    GeoPoint,
    /// Reference to another entity
    Key,
}

impl ScalarKind {
    /// Name of the stored value variant
    pub fn value_type(self) -> &'static str {
        match self {
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Bool => "Bool",
            ScalarKind::Float => "Float",
            ScalarKind::Bytes => "Bytes",
            ScalarKind::Timestamp | ScalarKind::Date | ScalarKind::Time => "Timestamp",
            ScalarKind::GeoPoint => "GeoPoint",
            ScalarKind::Key => "Key",
        }
    }
}

/// How a field maps onto properties
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// One scalar value
    Scalar(ScalarKind),
    /// List of scalars (elements may be nullable)
    Repeated(ScalarKind),
    /// Record stored as an embedded entity
    Nested(fn() -> &'static Schema),
    /// Record flattened into dotted properties
    Structured {
        /// Inner schema
        schema: fn() -> &'static Schema,
        /// List of records stored as index-aligned lists
        repeated: bool,
    },
    /// Serialized as JSON text
    Json,
    /// Rejected by the codec
    Unsupported(&'static str),
}

impl FieldKind {
    /// True for list-valued kinds
    pub fn is_repeated(&self) -> bool {
        matches!(
            self,
            FieldKind::Repeated(_) | FieldKind::Structured { repeated: true, .. }
        )
    }

    /// Schema of a record-valued kind
    pub fn record_schema(&self) -> Option<&'static Schema> {
        match self {
            FieldKind::Nested(schema) => Some(schema()),
            FieldKind::Structured { schema, .. } => Some(schema()),
            _ => None,
        }
    }
}

/// One field of a record
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    storage_name: String,
    kind: FieldKind,
    nullable: bool,
    optional: bool,
    indexed: bool,
    computed: bool,
}

impl FieldDescriptor {
    fn new(name: &str, kind: FieldKind, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            storage_name: name.to_string(),
            kind,
            nullable,
            optional: false,
            indexed: false,
            computed: false,
        }
    }

    /// Name in code
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property name in storage
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Field kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Declared as `Option<_>`
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Absent values fall back to a default
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Indexing hint
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Written but never read back
    pub fn is_computed(&self) -> bool {
        self.computed
    }
}

/// Field layout of one record type
#[derive(Debug, Clone)]
pub struct Schema {
    kind: String,
    key_field: Option<String>,
    fields: Vec<FieldDescriptor>,
    read_only: bool,
}

impl Schema {
    /// Start building a schema for `kind`
    pub fn builder(kind: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                kind: kind.into(),
                key_field: None,
                fields: Vec::new(),
                read_only: false,
            },
        }
    }

    /// Entity kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Name of the key field, if declared
    pub fn key_field(&self) -> Option<&str> {
        self.key_field.as_deref()
    }

    /// All non-key fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Writes are rejected
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Look up a field by its name in code
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by code name, then by storage name
    pub fn find(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field(name)
            .or_else(|| self.fields.iter().find(|f| f.storage_name == name))
    }

    /// Field by code name, or `UnknownField`
    pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name).ok_or_else(|| Error::UnknownField {
            kind: self.kind.clone(),
            field: name.to_string(),
        })
    }

    /// Fail unless a key field is declared
    pub fn require_key(&self) -> Result<&str> {
        self.key_field().ok_or_else(|| Error::MissingKeyField {
            kind: self.kind.clone(),
        })
    }

    /// Check that this schema can be flattened into index-aligned lists
    ///
    /// Repeated fields and optional or nullable fields are rejected,
    /// including inside non-repeated structured fields.
    pub fn check_flattenable(&self, property: &str) -> Result<()> {
        for field in &self.fields {
            if field.kind.is_repeated() {
                return Err(Error::NestedRepetition {
                    property: property.to_string(),
                    field: field.name.clone(),
                });
            }
            if field.nullable || field.optional {
                return Err(Error::OptionalInFlattened {
                    property: property.to_string(),
                    field: field.name.clone(),
                });
            }
            if let FieldKind::Structured { schema, .. } = field.kind {
                schema().check_flattenable(property)?;
            }
        }
        Ok(())
    }

    /// Resolve a dotted field path to its dotted storage name
    ///
    /// Each segment may be a code name or a storage name. Segments before the
    /// last must name structured or nested fields.
    pub fn resolve_path(&self, path: &str) -> Result<String> {
        let unknown = || Error::UnknownField {
            kind: self.kind.clone(),
            field: path.to_string(),
        };

        let mut schema = self;
        let mut resolved: Vec<&str> = Vec::new();
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let field = schema.find(segment).ok_or_else(unknown)?;
            resolved.push(field.storage_name());
            let last = segments.peek().is_none();
            match field.kind {
                FieldKind::Json => {
                    return Err(Error::unsupported(
                        path,
                        "JSON properties cannot be filtered or ordered",
                    ))
                }
                FieldKind::Unsupported(detail) => return Err(Error::unsupported(path, detail)),
                FieldKind::Nested(_) | FieldKind::Structured { .. } if !last => {
                    schema = field.kind.record_schema().ok_or_else(unknown)?;
                }
                _ if !last => return Err(unknown()),
                _ => {}
            }
        }
        Ok(resolved.join("."))
    }

    /// Dotted storage names and indexing hints of every leaf property, for
    /// flattened layouts
    pub(crate) fn leaves(&self, prefix: &str) -> Vec<(String, bool)> {
        let mut leaves = Vec::new();
        for field in &self.fields {
            let name = format!("{}{}", prefix, field.storage_name);
            match field.kind {
                FieldKind::Structured { schema, .. } => {
                    leaves.extend(schema().leaves(&format!("{}.", name)));
                }
                _ => leaves.push((name, field.indexed)),
            }
        }
        leaves
    }
}

/// Fluent [`Schema`] construction
///
/// Modifiers (`stored_as`, `indexed`, `optional`) apply to the field added
/// last.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    fn push(mut self, field: FieldDescriptor) -> Self {
        self.schema.fields.push(field);
        self
    }

    fn modify_last(mut self, f: impl FnOnce(&mut FieldDescriptor)) -> Self {
        if let Some(field) = self.schema.fields.last_mut() {
            f(field);
        }
        self
    }

    /// Declare the key field
    pub fn key(mut self, name: &str) -> Self {
        self.schema.key_field = Some(name.to_string());
        self
    }

    /// Add a scalar, repeated or optional field typed by `T`
    pub fn field<T: PropertyType>(self, name: &str) -> Self {
        self.push(FieldDescriptor::new(name, T::kind(), T::NULLABLE))
    }

    /// Add a computed field: written from its current value, never read
    pub fn computed<T: PropertyType>(self, name: &str) -> Self {
        let mut field = FieldDescriptor::new(name, T::kind(), T::NULLABLE);
        field.computed = true;
        self.push(field)
    }

    /// Add a record stored as an embedded entity
    pub fn nested<R: Record>(self, name: &str) -> Self {
        self.push(FieldDescriptor::new(name, FieldKind::Nested(R::schema), false))
    }

    /// Add an optional record stored as an embedded entity
    pub fn nested_opt<R: Record>(self, name: &str) -> Self {
        self.push(FieldDescriptor::new(name, FieldKind::Nested(R::schema), true))
    }

    /// Add a record flattened into `name.*` properties
    pub fn structured<R: Record>(self, name: &str) -> Self {
        let kind = FieldKind::Structured {
            schema: R::schema,
            repeated: false,
        };
        self.push(FieldDescriptor::new(name, kind, false))
    }

    /// Add an optional flattened record; `None` is stored as a null under `name`
    pub fn structured_opt<R: Record>(self, name: &str) -> Self {
        let kind = FieldKind::Structured {
            schema: R::schema,
            repeated: false,
        };
        self.push(FieldDescriptor::new(name, kind, true))
    }

    /// Add a list of records flattened into index-aligned `name.*` lists
    pub fn structured_list<R: Record>(self, name: &str) -> Self {
        let kind = FieldKind::Structured {
            schema: R::schema,
            repeated: true,
        };
        self.push(FieldDescriptor::new(name, kind, false))
    }

    /// Add a field serialized as JSON text
    pub fn json(self, name: &str) -> Self {
        self.push(FieldDescriptor::new(name, FieldKind::Json, false))
    }

    /// Store the last field under a different property name
    pub fn stored_as(self, storage_name: &str) -> Self {
        let storage_name = storage_name.to_string();
        self.modify_last(|f| f.storage_name = storage_name)
    }

    /// Mark the last field indexed
    pub fn indexed(self) -> Self {
        self.modify_last(|f| f.indexed = true)
    }

    /// Mark the last field as having a default when absent
    pub fn optional(self) -> Self {
        self.modify_last(|f| f.optional = true)
    }

    /// Reject all writes of this record type
    pub fn read_only(mut self) -> Self {
        self.schema.read_only = true;
        self
    }

    /// Finish
    pub fn build(self) -> Schema {
        self.schema
    }
}
