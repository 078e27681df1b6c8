//! Error types for entitymap
//!
//! Every failure surfaced by the mapping layer, the transaction engine and the
//! backends is a variant of [`Error`]. Callers discriminate on the variant;
//! "not found" is never an error (it is `Ok(None)`).
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::sync::Arc;

use crate::key::Key;
use thiserror::Error;

/// Result type alias for entitymap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the mapping layer and its backends
///
/// Cloneable, so a failure recorded by one task can be reported by another.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ------------------------------------------------------------------
    // Schema errors
    // ------------------------------------------------------------------
    /// A persisted record type declares no key field
    #[error("Schema for kind '{kind}' declares no key field")]
    MissingKeyField {
        /// Kind whose schema is missing the key
        kind: String,
    },

    /// A required property is absent from the stored entity
    #[error("Missing required property '{property}'")]
    MissingProperty {
        /// Storage name of the missing property
        property: String,
    },

    /// Stored value type does not match the declared field type
    #[error("Type mismatch for property '{property}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Storage name of the property
        property: String,
        /// Declared type
        expected: &'static str,
        /// Type found in the entity
        found: &'static str,
    },

    /// Field type is not supported by the codec
    #[error("Unsupported property type for '{property}': {detail}")]
    Unsupported {
        /// Field or storage name
        property: String,
        /// What was unsupported
        detail: String,
    },

    /// Lists of a repeated structured property have different lengths
    #[error(
        "Inconsistent flattened property '{property}': inner field '{field}' has {found} values, expected {expected}"
    )]
    InconsistentFlattening {
        /// Outer structured property
        property: String,
        /// Inner storage name with the wrong length
        field: String,
        /// Length of the first inner list
        expected: usize,
        /// Length of the offending list
        found: usize,
    },

    /// A repeated structured property contains a repeated inner field
    #[error("Repeated structured property '{property}' cannot contain repeated field '{field}'")]
    NestedRepetition {
        /// Outer structured property
        property: String,
        /// Inner repeated field
        field: String,
    },

    /// A repeated structured property contains an optional inner field
    #[error("Repeated structured property '{property}' cannot contain optional field '{field}'")]
    OptionalInFlattened {
        /// Outer structured property
        property: String,
        /// Inner optional field
        field: String,
    },

    /// A query referenced a field the schema does not know
    #[error("Unknown field '{field}' for kind '{kind}'")]
    UnknownField {
        /// Kind being queried
        kind: String,
        /// Name used in the query
        field: String,
    },

    /// A filter was built without any conditions
    #[error("Filter has no conditions")]
    EmptyFilter,

    // ------------------------------------------------------------------
    // Null policy
    // ------------------------------------------------------------------
    /// Explicit null stored for a non-nullable field
    #[error("Null value for non-nullable property '{property}'")]
    NullViolation {
        /// Storage name of the property
        property: String,
    },

    // ------------------------------------------------------------------
    // Write policy
    // ------------------------------------------------------------------
    /// Attempt to persist a record whose type is read-only
    #[error("Kind '{kind}' is read-only and cannot be written")]
    ReadOnly {
        /// Read-only kind
        kind: String,
    },

    // ------------------------------------------------------------------
    // Configuration and backend selection
    // ------------------------------------------------------------------
    /// Environment or project not established
    #[error("Configuration error: {0}")]
    Config(String),

    /// Two providers registered for the same environment
    #[error("Duplicate backend for environment '{environment}': {first} and {second}")]
    DuplicateBackend {
        /// Environment tag
        environment: String,
        /// Provider already registered
        first: String,
        /// Provider rejected
        second: String,
    },

    /// No provider registered for the requested environment
    #[error("No backend registered for environment '{environment}'")]
    MissingBackend {
        /// Environment tag
        environment: String,
    },

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------
    /// Transaction started in a state that does not allow it
    #[error("Transaction state error: {0}")]
    TransactionState(String),

    /// Operation issued against a transaction that is no longer active
    #[error("Transaction {0} is no longer active")]
    TransactionClosed(u64),

    /// Optimistic concurrency conflict detected at commit
    #[error("Transaction {txn_id} conflicts on key {key}")]
    Conflict {
        /// Transaction that lost
        txn_id: u64,
        /// First conflicting key
        key: Key,
    },

    // ------------------------------------------------------------------
    // JSON properties
    // ------------------------------------------------------------------
    /// JSON property payload is not valid JSON
    #[error("Malformed JSON in property '{property}': {source}")]
    JsonParse {
        /// Storage name of the property
        property: String,
        /// Parser error
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// JSON property payload does not match the target shape
    #[error("JSON in property '{property}' does not match target type: {source}")]
    JsonShape {
        /// Storage name of the property
        property: String,
        /// Shape error
        #[source]
        source: Arc<serde_json::Error>,
    },

    // ------------------------------------------------------------------
    // Backend and runtime
    // ------------------------------------------------------------------
    /// Failure reported by the storage backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// An asynchronous operation's worker task failed
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Shorthand for a type mismatch on `property`
    pub fn type_mismatch(
        property: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Error::TypeMismatch {
            property: property.into(),
            expected,
            found,
        }
    }

    /// Malformed JSON text in `property`
    pub fn json_parse(property: impl Into<String>, source: serde_json::Error) -> Self {
        Error::JsonParse {
            property: property.into(),
            source: Arc::new(source),
        }
    }

    /// JSON in `property` that does not fit the target type
    pub fn json_shape(property: impl Into<String>, source: serde_json::Error) -> Self {
        Error::JsonShape {
            property: property.into(),
            source: Arc::new(source),
        }
    }

    /// Shorthand for an unsupported property
    pub fn unsupported(property: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Unsupported {
            property: property.into(),
            detail: detail.into(),
        }
    }

    /// True for schema errors (fatal, never retried)
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::MissingKeyField { .. }
                | Error::MissingProperty { .. }
                | Error::TypeMismatch { .. }
                | Error::Unsupported { .. }
                | Error::InconsistentFlattening { .. }
                | Error::NestedRepetition { .. }
                | Error::OptionalInFlattened { .. }
                | Error::UnknownField { .. }
                | Error::EmptyFilter
        )
    }

    /// True for malformed or mismatched JSON property payloads
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::JsonParse { .. } | Error::JsonShape { .. })
    }

    /// True for backend-registry errors
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Error::DuplicateBackend { .. } | Error::MissingBackend { .. }
        )
    }
}
