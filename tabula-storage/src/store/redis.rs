//! Redis-backed store.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tabula_core::{RedisConfig, TabulaError, TabulaResult};
use tracing::{debug, info};

use super::traits::StoreEngine;

const BACKEND: &str = "redis";

fn unavailable(e: redis::RedisError) -> TabulaError {
    TabulaError::store_unavailable(BACKEND, e)
}

/// Store on a redis-compatible server.
///
/// Every key is stored under `prefix + id`. The connection manager
/// reconnects on its own; a failed command is reported, not retried.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Connect to the server named by `config.url`.
    pub async fn connect(config: &RedisConfig) -> TabulaResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        info!(prefix = %config.prefix, "Connected redis store");
        Ok(Self::with_connection(conn, config.prefix.clone()))
    }

    pub fn with_connection(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }
}

#[async_trait]
impl StoreEngine for RedisStore {
    async fn get(&self, id: &str) -> TabulaResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.key(id)).await.map_err(unavailable)?;
        debug!(id, hit = value.is_some(), "redis GET");
        Ok(value)
    }

    async fn set(&self, id: &str, value: &str) -> TabulaResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(self.key(id), value).await.map_err(unavailable)?;
        Ok(())
    }

    async fn m_get(&self, ids: &[&str]) -> TabulaResult<HashMap<String, Option<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        debug!(count = ids.len(), "redis MGET");
        // MGET answers positionally, so ids map back without the prefix.
        Ok(ids
            .iter()
            .map(|id| (*id).to_string())
            .zip(values)
            .collect())
    }

    async fn m_set(&self, entries: &HashMap<String, String>) -> TabulaResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("MSET");
        for (id, value) in entries {
            cmd.arg(self.key(id)).arg(value);
        }
        let mut conn = self.conn.clone();
        let _: () = cmd.query_async(&mut conn).await.map_err(unavailable)?;
        debug!(count = entries.len(), "redis MSET");
        Ok(())
    }

    async fn delete(&self, id: &str) -> TabulaResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(self.key(id)).await.map_err(unavailable)?;
        Ok(())
    }

    async fn exists(&self, id: &str) -> TabulaResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(self.key(id)).await.map_err(unavailable)
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}
