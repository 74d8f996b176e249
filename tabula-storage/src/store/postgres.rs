//! Postgres table store.
//!
//! Entries live in one table (default `tabula_store`):
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS tabula_store (
//!     key   TEXT PRIMARY KEY,
//!     value TEXT NOT NULL,
//!     hash  TEXT NULL
//! );
//! ```
//!
//! `hash` is reserved and optional. It is never read or written, so a table
//! with only `key` and `value` works as well.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tabula_core::{is_sql_identifier, ConfigError, DbConfig, TabulaError, TabulaResult};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use super::traits::StoreEngine;

const BACKEND: &str = "postgres";

fn unavailable(e: impl ToString) -> TabulaError {
    TabulaError::store_unavailable(BACKEND, e)
}

/// Create a connection pool from database configuration.
pub fn create_pool(config: &DbConfig) -> TabulaResult<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let mut pool_config = PoolConfig::new(config.max_size);
    pool_config.timeouts.wait = Some(config.timeout);
    cfg.pool = Some(pool_config);

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| unavailable(format!("Failed to create pool: {}", e)))
}

/// Store backed by a Postgres table.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    table: String,
    get_sql: String,
    set_sql: String,
    m_get_sql: String,
    m_set_sql: String,
    delete_sql: String,
    exists_sql: String,
}

impl PgStore {
    /// Wrap an existing pool. `table` must be a plain SQL identifier since it
    /// is interpolated into every statement.
    pub fn new(pool: Pool, table: impl Into<String>) -> TabulaResult<Self> {
        let table = table.into();
        if !is_sql_identifier(&table) {
            return Err(ConfigError::InvalidValue {
                field: "db.table".to_string(),
                value: table,
                reason: "must be a plain SQL identifier".to_string(),
            }
            .into());
        }
        Ok(Self {
            get_sql: format!("SELECT value FROM {} WHERE key = $1", table),
            set_sql: format!(
                "INSERT INTO {} (key, value) VALUES ($1, $2) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
                table
            ),
            m_get_sql: format!("SELECT key, value FROM {} WHERE key = ANY($1)", table),
            m_set_sql: format!(
                "INSERT INTO {} (key, value) \
                 SELECT k, v FROM UNNEST($1::text[], $2::text[]) AS t(k, v) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
                table
            ),
            delete_sql: format!("DELETE FROM {} WHERE key = $1", table),
            exists_sql: format!("SELECT EXISTS(SELECT 1 FROM {} WHERE key = $1)", table),
            pool,
            table,
        })
    }

    /// Build a pool from configuration and wrap it.
    pub fn from_config(config: &DbConfig) -> TabulaResult<Self> {
        config.validate()?;
        let store = Self::new(create_pool(config)?, config.table.clone())?;
        info!(host = %config.host, table = %config.table, "Created postgres store");
        Ok(store)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the store table if it does not exist.
    pub async fn ensure_table(&self) -> TabulaResult<()> {
        let client = self.pool.get().await.map_err(unavailable)?;
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 key TEXT PRIMARY KEY, \
                 value TEXT NOT NULL, \
                 hash TEXT NULL)",
                self.table
            ))
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl StoreEngine for PgStore {
    async fn get(&self, id: &str) -> TabulaResult<Option<String>> {
        let client = self.pool.get().await.map_err(unavailable)?;
        let row = client
            .query_opt(self.get_sql.as_str(), &[&id])
            .await
            .map_err(unavailable)?;
        debug!(id, hit = row.is_some(), "postgres get");
        Ok(row.map(|r| r.get::<_, String>(0)))
    }

    async fn set(&self, id: &str, value: &str) -> TabulaResult<()> {
        let client = self.pool.get().await.map_err(unavailable)?;
        client
            .execute(self.set_sql.as_str(), &[&id, &value])
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn m_get(&self, ids: &[&str]) -> TabulaResult<HashMap<String, Option<String>>> {
        let mut values: HashMap<String, Option<String>> =
            ids.iter().map(|id| ((*id).to_string(), None)).collect();
        if ids.is_empty() {
            return Ok(values);
        }
        let client = self.pool.get().await.map_err(unavailable)?;
        let keys: Vec<&str> = ids.to_vec();
        let rows = client
            .query(self.m_get_sql.as_str(), &[&keys])
            .await
            .map_err(unavailable)?;
        for row in rows {
            values.insert(row.get(0), Some(row.get(1)));
        }
        Ok(values)
    }

    async fn m_set(&self, entries: &HashMap<String, String>) -> TabulaResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let (keys, values): (Vec<&str>, Vec<&str>) = entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .unzip();
        let client = self.pool.get().await.map_err(unavailable)?;
        client
            .execute(self.m_set_sql.as_str(), &[&keys, &values])
            .await
            .map_err(unavailable)?;
        debug!(count = entries.len(), "postgres m_set");
        Ok(())
    }

    async fn delete(&self, id: &str) -> TabulaResult<()> {
        let client = self.pool.get().await.map_err(unavailable)?;
        client
            .execute(self.delete_sql.as_str(), &[&id])
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn exists(&self, id: &str) -> TabulaResult<bool> {
        let client = self.pool.get().await.map_err(unavailable)?;
        let row = client
            .query_one(self.exists_sql.as_str(), &[&id])
            .await
            .map_err(unavailable)?;
        Ok(row.get(0))
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_unsafe_table_name() {
        let pool = create_pool(&DbConfig::default()).expect("pool creation is lazy");
        let err = PgStore::new(pool, "store; DROP TABLE users").err().expect("must fail");
        assert!(matches!(
            err,
            TabulaError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_statements_use_table_name() {
        let pool = create_pool(&DbConfig::default()).expect("pool creation is lazy");
        let store = PgStore::new(pool, "cache_entries").expect("valid table");
        assert_eq!(store.table(), "cache_entries");
        assert!(store.get_sql.contains("FROM cache_entries"));
        assert!(store.m_set_sql.contains("UNNEST"));
        assert_eq!(store.backend(), "postgres");
    }

    #[tokio::test]
    async fn test_writes_only_name_key_and_value() {
        let pool = create_pool(&DbConfig::default()).expect("pool creation is lazy");
        let store = PgStore::new(pool, "cache_entries").expect("valid table");
        for sql in [&store.set_sql, &store.m_set_sql] {
            assert!(sql.contains("(key, value)"), "{sql}");
            assert!(!sql.contains("hash"), "{sql}");
        }
    }

    #[tokio::test]
    async fn test_empty_batches_never_check_out_a_connection() {
        let config = DbConfig {
            port: 1,
            timeout: std::time::Duration::from_millis(200),
            ..DbConfig::default()
        };
        let pool = create_pool(&config).expect("pool creation is lazy");
        let store = PgStore::new(pool, "unreachable").expect("valid table");

        store.m_set(&HashMap::new()).await.expect("empty m_set");
        assert!(store.m_get(&[]).await.expect("empty m_get").is_empty());
        assert!(store.get("key").await.expect_err("no server").is_store_unavailable());
    }
}
