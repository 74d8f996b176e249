//! Configuration-selected store backend.
//!
//! ```text
//! StoreProvider (enum)
//!   ├── Memory(MemoryStore)
//!   ├── Redis(RedisStore)
//!   ├── Postgres(PgStore)
//!   └── Lmdb(LmdbStore)
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use tabula_core::{StoreBackendKind, StoreConfig, TabulaResult};
use tracing::info;

use super::lmdb::LmdbStore;
use super::memory::MemoryStore;
use super::postgres::PgStore;
use super::redis::RedisStore;
use super::traits::{StoreEngine, StoreStats};

/// One of the supported backends, chosen by [`StoreConfig::backend`].
pub enum StoreProvider {
    Memory(MemoryStore),
    Redis(RedisStore),
    Postgres(PgStore),
    Lmdb(LmdbStore),
}

impl StoreProvider {
    /// Validate the configuration and construct the selected backend.
    ///
    /// Remote backends are contacted here: redis connects, and the postgres
    /// store table is created if missing.
    pub async fn from_config(config: &StoreConfig) -> TabulaResult<Self> {
        config.validate()?;
        let provider = match config.backend {
            StoreBackendKind::Memory => Self::Memory(MemoryStore::new()),
            StoreBackendKind::Redis => Self::Redis(RedisStore::connect(&config.redis).await?),
            StoreBackendKind::Postgres => {
                let store = PgStore::from_config(&config.db)?;
                store.ensure_table().await?;
                Self::Postgres(store)
            }
            StoreBackendKind::Lmdb => Self::Lmdb(LmdbStore::from_config(&config.lmdb)?),
        };
        info!(backend = provider.backend(), "Store provider ready");
        Ok(provider)
    }

    fn engine(&self) -> &dyn StoreEngine {
        match self {
            Self::Memory(store) => store,
            Self::Redis(store) => store,
            Self::Postgres(store) => store,
            Self::Lmdb(store) => store,
        }
    }
}

#[async_trait]
impl StoreEngine for StoreProvider {
    async fn get(&self, id: &str) -> TabulaResult<Option<String>> {
        self.engine().get(id).await
    }

    async fn set(&self, id: &str, value: &str) -> TabulaResult<()> {
        self.engine().set(id, value).await
    }

    async fn m_get(&self, ids: &[&str]) -> TabulaResult<HashMap<String, Option<String>>> {
        self.engine().m_get(ids).await
    }

    async fn m_set(&self, entries: &HashMap<String, String>) -> TabulaResult<()> {
        self.engine().m_set(entries).await
    }

    async fn delete(&self, id: &str) -> TabulaResult<()> {
        self.engine().delete(id).await
    }

    async fn exists(&self, id: &str) -> TabulaResult<bool> {
        self.engine().exists(id).await
    }

    async fn stats(&self) -> TabulaResult<StoreStats> {
        self.engine().stats().await
    }

    fn backend(&self) -> &'static str {
        self.engine().backend()
    }
}
