//! Postgres `information_schema` introspection.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tabula_core::{is_sql_identifier, ConfigError, LiveSchema, SchemaError, TabulaResult};
use tracing::debug;

use super::SchemaIntrospector;

const COLUMNS_SQL: &str = "\
    SELECT column_name::text, is_identity::text, column_default::text \
    FROM information_schema.columns \
    WHERE table_schema = $1 AND table_name = $2 \
    ORDER BY ordinal_position";

const PRIMARY_KEY_SQL: &str = "\
    SELECT kcu.column_name::text \
    FROM information_schema.table_constraints tc \
    JOIN information_schema.key_column_usage kcu \
      ON tc.constraint_name = kcu.constraint_name \
     AND tc.table_schema = kcu.table_schema \
     AND tc.table_name = kcu.table_name \
    WHERE tc.constraint_type = 'PRIMARY KEY' \
      AND tc.table_schema = $1 AND tc.table_name = $2 \
    ORDER BY kcu.ordinal_position";

/// Reads live schemas from `information_schema`.
///
/// A source of the form `schema.table` overrides the default schema.
#[derive(Clone)]
pub struct PgSchemaIntrospector {
    pool: Pool,
    schema: String,
}

impl PgSchemaIntrospector {
    pub fn new(pool: Pool, schema: impl Into<String>) -> TabulaResult<Self> {
        let schema = schema.into();
        if !is_sql_identifier(&schema) {
            return Err(ConfigError::InvalidValue {
                field: "db.schema".to_string(),
                value: schema,
                reason: "must be a plain SQL identifier".to_string(),
            }
            .into());
        }
        Ok(Self { pool, schema })
    }

    fn split_source<'a>(&'a self, source: &'a str) -> (&'a str, &'a str) {
        match source.split_once('.') {
            Some((schema, table)) => (schema, table),
            None => (self.schema.as_str(), source),
        }
    }
}

/// Pick the server-generated column: an identity column, or one whose
/// default draws from a sequence.
pub(crate) fn identity_column(columns: &[(String, String, Option<String>)]) -> Option<String> {
    columns
        .iter()
        .find(|(_, is_identity, default)| {
            is_identity.eq_ignore_ascii_case("YES")
                || default
                    .as_deref()
                    .map(|d| d.starts_with("nextval("))
                    .unwrap_or(false)
        })
        .map(|(name, _, _)| name.clone())
}

#[async_trait]
impl SchemaIntrospector for PgSchemaIntrospector {
    async fn introspect(&self, source: &str) -> TabulaResult<LiveSchema> {
        let failed = |reason: String| SchemaError::IntrospectionFailed {
            source_table: source.to_string(),
            reason,
        };
        let (schema, table) = self.split_source(source);

        let client = self.pool.get().await.map_err(|e| failed(e.to_string()))?;

        let columns: Vec<(String, String, Option<String>)> = client
            .query(COLUMNS_SQL, &[&schema, &table])
            .await
            .map_err(|e| failed(e.to_string()))?
            .iter()
            .map(|row| (row.get(0), row.get(1), row.get(2)))
            .collect();
        if columns.is_empty() {
            return Err(failed(format!("no columns found in {}.{}", schema, table)).into());
        }

        let primary_key: Vec<String> = client
            .query(PRIMARY_KEY_SQL, &[&schema, &table])
            .await
            .map_err(|e| failed(e.to_string()))?
            .iter()
            .map(|row| row.get(0))
            .collect();

        let identity = identity_column(&columns);
        let attributes = columns.into_iter().map(|(name, _, _)| name).collect();
        debug!(source, ?identity, "introspected live schema");
        Ok(LiveSchema::new(attributes, primary_key, identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Column = (String, String, Option<String>);

    fn column(name: &str, is_identity: &str, default: Option<&str>) -> Column {
        (name.to_string(), is_identity.to_string(), default.map(str::to_string))
    }

    #[test]
    fn test_identity_column_from_identity_flag() {
        let columns = vec![column("id", "YES", None), column("name", "NO", None)];
        assert_eq!(identity_column(&columns), Some("id".to_string()));
    }

    #[test]
    fn test_identity_column_from_sequence_default() {
        let columns = vec![
            column("code", "NO", Some("'x'::text")),
            column("id", "NO", Some("nextval('robots_id_seq'::regclass)")),
        ];
        assert_eq!(identity_column(&columns), Some("id".to_string()));
    }

    #[test]
    fn test_no_identity_column() {
        let columns = vec![column("key", "NO", None)];
        assert_eq!(identity_column(&columns), None);
    }
}
