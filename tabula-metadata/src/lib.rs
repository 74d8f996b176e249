//! Tabula Metadata - typed schema metadata cache
//!
//! Derives, validates and caches one [`SchemaDescriptor`] per record type,
//! combining live schema introspection with the fields each type declares.
//!
//! [`SchemaDescriptor`]: tabula_core::SchemaDescriptor

pub mod cache;
pub mod introspect;

pub use cache::MetadataCache;
pub use introspect::{PgSchemaIntrospector, SchemaIntrospector};
