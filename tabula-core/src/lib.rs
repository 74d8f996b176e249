//! Tabula Core - shared types for the schema metadata cache and store engine
//!
//! Everything other crates in the workspace build on: the error taxonomy,
//! schema descriptors, record type declarations, serializer adapters,
//! configuration and tracing setup.

pub mod config;
pub mod error;
pub mod record;
pub mod schema;
pub mod serializer;
pub mod telemetry;

pub use config::{
    is_sql_identifier, DbConfig, LmdbConfig, MetadataConfig, RedisConfig, StoreBackendKind,
    StoreConfig, TabulaConfig,
};
pub use error::{
    ConfigError, SchemaError, SerializationError, StoreError, TabulaError, TabulaResult,
};
pub use record::{RecordInfo, RecordRef, RecordType};
pub use schema::{LiveSchema, SchemaDescriptor};
pub use serializer::{value_shape, JsonSerializer, Serializer, SerializerKind, StringSerializer};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
