//! Live schema introspection.

pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use tabula_core::{LiveSchema, TabulaResult};

pub use postgres::PgSchemaIntrospector;

/// Reports the live schema of a source table.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Columns, primary key and identity column of `source`.
    async fn introspect(&self, source: &str) -> TabulaResult<LiveSchema>;
}

#[async_trait]
impl<I: SchemaIntrospector + ?Sized> SchemaIntrospector for Arc<I> {
    async fn introspect(&self, source: &str) -> TabulaResult<LiveSchema> {
        (**self).introspect(source).await
    }
}
