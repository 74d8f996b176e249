//! Error types for Tabula operations

use thiserror::Error;

/// Schema metadata errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The record type exposes fields that the live schema does not have.
    #[error("Record type {record_type} exposes columns missing from the schema: {}", .columns.join(","))]
    Mismatch {
        record_type: String,
        columns: Vec<String>,
    },

    #[error("Inconsistent schema reported for {record_type}: {reason}")]
    InconsistentSchema { record_type: String, reason: String },

    #[error("Unknown record type: {name}")]
    UnknownRecordType { name: String },

    #[error("Schema introspection failed for {source_table}: {reason}")]
    IntrospectionFailed { source_table: String, reason: String },
}

/// Serializer adapter errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("{adapter} serializer does not accept a value of shape `{shape}`")]
    UnsupportedValue { adapter: &'static str, shape: String },

    #[error("{adapter} serializer could not decode value: {reason}")]
    Malformed { adapter: &'static str, reason: String },
}

/// Store engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store backend {backend} unavailable: {reason}")]
    Unavailable { backend: &'static str, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Store backend not supported: {backend}")]
    BackendNotSupported { backend: String },
}

/// Master error type for all Tabula errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TabulaError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TabulaError {
    /// Wrap a backend failure as [`StoreError::Unavailable`].
    pub fn store_unavailable(backend: &'static str, reason: impl ToString) -> Self {
        Self::Store(StoreError::Unavailable {
            backend,
            reason: reason.to_string(),
        })
    }

    /// True for schema mismatches, which are configuration defects rather
    /// than transient conditions.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::Schema(SchemaError::Mismatch { .. }))
    }

    /// True when the backing store could not be reached.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable { .. }))
    }
}

/// Result type alias for Tabula operations.
pub type TabulaResult<T> = Result<T, TabulaError>;

// =============================================================================
// TESTS
// =============================================================================
