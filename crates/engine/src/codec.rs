//! Entity codec
//!
//! Converts typed records to and from the backend [`Entity`] form. A record
//! implements [`Record`] by writing its fields into an [`EntityWriter`] and
//! reading them back from an [`EntityReader`]; both are driven by the
//! record's [`Schema`], which supplies storage names, indexing hints and
//! field kinds.
//!
//! # Absence rules when decoding
//!
//! | Field declared as | Property absent |
//! |-------------------|-----------------|
//! | read with [`EntityReader::optional`] | `None`, caller applies its default |
//! | `Option<T>` | `None` |
//! | `Vec<T>` | empty list |
//! | anything else | [`Error::MissingProperty`] |
//!
//! # Flattening
//!
//! A structured field `address` stores each inner field as `address.<inner>`.
//! A repeated structured field stores one list per inner field; all lists
//! must have the same length and element `i` of each list belongs to record
//! `i`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use entitymap_core::{Entity, Error, Key, Properties, Property, Result, Value};

use crate::property::PropertyType;
use crate::schema::{FieldDescriptor, FieldKind, Schema};

/// A record type the codec can convert
pub trait Record: Sized {
    /// Cached schema for this type
    fn schema() -> &'static Schema;

    /// Write every persisted field
    fn encode(&self, writer: &mut EntityWriter) -> Result<()>;

    /// Rebuild the record
    fn decode(reader: &mut EntityReader) -> Result<Self>;
}

/// A record persisted as a top-level entity
pub trait Model: Record {
    /// The record's key
    fn key(&self) -> &Key;
}

/// Collects the properties of one record
#[derive(Debug)]
pub struct EntityWriter {
    schema: &'static Schema,
    properties: Properties,
}

impl EntityWriter {
    pub(crate) fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            properties: Properties::new(),
        }
    }

    fn insert(&mut self, field: &FieldDescriptor, value: Value) {
        self.properties.insert(
            field.storage_name().to_string(),
            Property::new(value, field.is_indexed()),
        );
    }

    /// Write a scalar, optional or repeated field
    ///
    /// Writing the key field is a no-op; the key travels on the entity.
    pub fn field<T: PropertyType>(&mut self, name: &str, value: &T) -> Result<()> {
        if self.schema.key_field() == Some(name) {
            return Ok(());
        }
        let field = self.schema.require_field(name)?;
        if let FieldKind::Unsupported(detail) = T::kind() {
            return Err(Error::unsupported(field.storage_name(), detail));
        }
        self.insert(field, value.to_value());
        Ok(())
    }

    /// Write a record as an embedded entity
    pub fn nested<R: Record>(&mut self, name: &str, value: &R) -> Result<()> {
        let field = self.schema.require_field(name)?;
        let properties = encode_properties(value)?;
        self.insert(field, Value::Entity(properties));
        Ok(())
    }

    /// Write an optional embedded record; `None` stores a null
    pub fn nested_opt<R: Record>(&mut self, name: &str, value: Option<&R>) -> Result<()> {
        match value {
            Some(value) => self.nested(name, value),
            None => {
                let field = self.schema.require_field(name)?;
                self.insert(field, Value::Null);
                Ok(())
            }
        }
    }

    /// Flatten a record into `name.*` properties
    pub fn structured<R: Record>(&mut self, name: &str, value: &R) -> Result<()> {
        let field = self.schema.require_field(name)?;
        let outer = field.storage_name();
        for (inner, property) in encode_properties(value)? {
            self.properties
                .insert(format!("{}.{}", outer, inner), property);
        }
        Ok(())
    }

    /// Flatten an optional record; `None` stores a null under `name`
    pub fn structured_opt<R: Record>(&mut self, name: &str, value: Option<&R>) -> Result<()> {
        match value {
            Some(value) => self.structured(name, value),
            None => {
                let field = self.schema.require_field(name)?;
                self.insert(field, Value::Null);
                Ok(())
            }
        }
    }

    /// Flatten a list of records into index-aligned `name.*` lists
    pub fn structured_list<R: Record>(&mut self, name: &str, values: &[R]) -> Result<()> {
        let field = self.schema.require_field(name)?;
        let outer = field.storage_name();
        R::schema().check_flattenable(outer)?;

        let mut columns: BTreeMap<String, (Vec<Value>, bool)> = R::schema()
            .leaves("")
            .into_iter()
            .map(|(leaf, indexed)| (leaf, (Vec::with_capacity(values.len()), indexed)))
            .collect();
        for value in values {
            for (inner, property) in encode_properties(value)? {
                let column = columns
                    .entry(inner)
                    .or_insert_with(|| (Vec::new(), property.indexed));
                column.0.push(property.value);
            }
        }

        for (inner, (column, indexed)) in columns {
            if column.len() != values.len() {
                return Err(Error::InconsistentFlattening {
                    property: outer.to_string(),
                    field: format!("{}.{}", outer, inner),
                    expected: values.len(),
                    found: column.len(),
                });
            }
            self.properties.insert(
                format!("{}.{}", outer, inner),
                Property::new(Value::Array(column), indexed),
            );
        }
        Ok(())
    }

    /// Write a value as JSON text
    pub fn json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<()> {
        let field = self.schema.require_field(name)?;
        let text = serde_json::to_string(value)
            .map_err(|source| Error::json_shape(field.storage_name(), source))?;
        self.insert(field, Value::String(text));
        Ok(())
    }

    /// Properties written so far
    pub fn finish(self) -> Properties {
        self.properties
    }
}

/// Reads the properties of one stored record
#[derive(Debug)]
pub struct EntityReader {
    schema: &'static Schema,
    key: Option<Key>,
    prefix: String,
    properties: Properties,
}

impl EntityReader {
    pub(crate) fn new(
        schema: &'static Schema,
        key: Option<Key>,
        properties: Properties,
        prefix: String,
    ) -> Self {
        Self {
            schema,
            key,
            prefix,
            properties,
        }
    }

    /// Key of the entity being read
    pub fn key(&self) -> Result<Key> {
        self.key.clone().ok_or_else(|| Error::MissingKeyField {
            kind: self.schema.kind().to_string(),
        })
    }

    /// Field to read by code name; computed fields are write-only
    fn readable(&self, name: &str) -> Result<&'static FieldDescriptor> {
        let field = self.schema.require_field(name)?;
        if field.is_computed() {
            return Err(Error::unsupported(
                self.path(field),
                "computed fields are write-only",
            ));
        }
        Ok(field)
    }

    /// Full dotted name of a field, for error messages
    fn path(&self, field: &FieldDescriptor) -> String {
        format!("{}{}", self.prefix, field.storage_name())
    }

    fn take(&mut self, field: &FieldDescriptor) -> Option<Value> {
        self.properties
            .remove(field.storage_name())
            .map(|property| property.value)
    }

    fn take_prefixed(&mut self, outer: &str) -> Properties {
        let prefix = format!("{}.", outer);
        let names: Vec<String> = self
            .properties
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .map(|(name, _)| name.clone())
            .collect();
        names
            .into_iter()
            .filter_map(|name| {
                let property = self.properties.remove(&name)?;
                Some((name[prefix.len()..].to_string(), property))
            })
            .collect()
    }

    /// Read a field; absence follows the nullable / repeated / required rules
    pub fn require<T: PropertyType>(&mut self, name: &str) -> Result<T> {
        let field = self.readable(name)?;
        let path = self.path(field);
        if let FieldKind::Unsupported(detail) = T::kind() {
            return Err(Error::unsupported(path, detail));
        }
        match self.take(field) {
            Some(value) => T::from_value(&path, value),
            None if T::NULLABLE || T::kind().is_repeated() => T::from_value(&path, Value::Null),
            None => Err(Error::MissingProperty { property: path }),
        }
    }

    /// Read a field that has a default: `Ok(None)` when absent
    pub fn optional<T: PropertyType>(&mut self, name: &str) -> Result<Option<T>> {
        let field = self.readable(name)?;
        let path = self.path(field);
        if let FieldKind::Unsupported(detail) = T::kind() {
            return Err(Error::unsupported(path, detail));
        }
        match self.take(field) {
            Some(value) => T::from_value(&path, value).map(Some),
            None => Ok(None),
        }
    }

    /// Read an embedded record
    pub fn nested<R: Record>(&mut self, name: &str) -> Result<R> {
        self.nested_opt(name)?.ok_or_else(|| {
            let property = self
                .schema
                .field(name)
                .map(|f| self.path(f))
                .unwrap_or_else(|| name.to_string());
            Error::MissingProperty { property }
        })
    }

    /// Read an optional embedded record; absent or null is `None`
    pub fn nested_opt<R: Record>(&mut self, name: &str) -> Result<Option<R>> {
        let field = self.readable(name)?;
        let path = self.path(field);
        match self.take(field) {
            Some(Value::Entity(properties)) => {
                let mut reader =
                    EntityReader::new(R::schema(), None, properties, format!("{}.", path));
                R::decode(&mut reader).map(Some)
            }
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(Error::type_mismatch(path, "Entity", other.type_name())),
        }
    }

    /// Read a flattened record
    pub fn structured<R: Record>(&mut self, name: &str) -> Result<R> {
        let field = self.readable(name)?;
        let path = self.path(field);
        if let Some(Value::Null) = self.take(field) {
            return Err(Error::NullViolation { property: path });
        }
        let inner = self.take_prefixed(field.storage_name());
        let mut reader = EntityReader::new(R::schema(), None, inner, format!("{}.", path));
        R::decode(&mut reader)
    }

    /// Read an optional flattened record; a null marker or no inner
    /// properties is `None`
    pub fn structured_opt<R: Record>(&mut self, name: &str) -> Result<Option<R>> {
        let field = self.readable(name)?;
        let path = self.path(field);
        self.take(field);
        let inner = self.take_prefixed(field.storage_name());
        if inner.is_empty() {
            return Ok(None);
        }
        let mut reader = EntityReader::new(R::schema(), None, inner, format!("{}.", path));
        R::decode(&mut reader).map(Some)
    }

    /// Read a list of flattened records from index-aligned lists
    pub fn structured_list<R: Record>(&mut self, name: &str) -> Result<Vec<R>> {
        let field = self.readable(name)?;
        let path = self.path(field);
        R::schema().check_flattenable(&path)?;

        let mut expected: Option<usize> = None;
        let mut columns: Vec<(String, Vec<Value>, bool)> = Vec::new();
        for (inner, property) in self.take_prefixed(field.storage_name()) {
            let values = match property.value {
                Value::Array(values) => values,
                Value::Null => Vec::new(),
                other => {
                    return Err(Error::type_mismatch(
                        format!("{}.{}", path, inner),
                        "Array",
                        other.type_name(),
                    ))
                }
            };
            match expected {
                None => expected = Some(values.len()),
                Some(len) if len != values.len() => {
                    return Err(Error::InconsistentFlattening {
                        property: path.clone(),
                        field: format!("{}.{}", path, inner),
                        expected: len,
                        found: values.len(),
                    })
                }
                Some(_) => {}
            }
            columns.push((inner, values, property.indexed));
        }

        let mut rows = vec![Properties::new(); expected.unwrap_or(0)];
        for (inner, values, indexed) in columns {
            for (row, value) in rows.iter_mut().zip(values) {
                row.insert(inner.clone(), Property::new(value, indexed));
            }
        }
        rows.into_iter()
            .map(|row| {
                let mut reader = EntityReader::new(R::schema(), None, row, format!("{}.", path));
                R::decode(&mut reader)
            })
            .collect()
    }

    fn take_json(&mut self, name: &str) -> Result<(String, Option<serde_json::Value>)> {
        let field = self.readable(name)?;
        let path = self.path(field);
        let parsed = match self.take(field) {
            Some(Value::String(text)) => {
                let parsed = serde_json::from_str(&text)
                    .map_err(|source| Error::json_parse(path.clone(), source))?;
                Some(parsed)
            }
            Some(Value::Null) => Some(serde_json::Value::Null),
            None => None,
            Some(other) => return Err(Error::type_mismatch(path, "String", other.type_name())),
        };
        Ok((path, parsed))
    }

    /// Read a JSON field; a stored JSON `null` is handed to `T`
    pub fn json<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        match self.take_json(name)? {
            (path, Some(parsed)) => {
                serde_json::from_value(parsed).map_err(|source| Error::json_shape(path, source))
            }
            (path, None) => Err(Error::MissingProperty { property: path }),
        }
    }

    /// Read an optional JSON field; absent or null is `None`
    pub fn json_opt<T: DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>> {
        match self.take_json(name)? {
            (path, Some(parsed)) if !parsed.is_null() => serde_json::from_value(parsed)
                .map(Some)
                .map_err(|source| Error::json_shape(path, source)),
            _ => Ok(None),
        }
    }
}

/// Encode a record into keyless properties
pub fn encode_properties<R: Record>(record: &R) -> Result<Properties> {
    let mut writer = EntityWriter::new(R::schema());
    record.encode(&mut writer)?;
    Ok(writer.finish())
}

/// Decode a record from keyless properties
pub fn decode_properties<R: Record>(properties: Properties) -> Result<R> {
    let mut reader = EntityReader::new(R::schema(), None, properties, String::new());
    R::decode(&mut reader)
}

/// Encode a model into an entity
pub fn to_entity<M: Model>(model: &M) -> Result<Entity> {
    M::schema().require_key()?;
    let properties = encode_properties(model)?;
    Ok(Entity::from_parts(model.key().clone(), properties))
}

/// Decode a model from an entity
pub fn from_entity<M: Model>(entity: Entity) -> Result<M> {
    M::schema().require_key()?;
    let (key, properties) = entity.into_parts();
    let mut reader = EntityReader::new(M::schema(), Some(key), properties, String::new());
    M::decode(&mut reader)
}
