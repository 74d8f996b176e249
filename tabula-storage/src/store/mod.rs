//! Store engine trait and backends.

pub mod lmdb;
pub mod memory;
pub mod postgres;
pub mod provider;
pub mod redis;
pub mod traits;

pub use lmdb::{LmdbStore, LmdbStoreError};
pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};
pub use provider::StoreProvider;
pub use self::redis::RedisStore;
pub use traits::{StoreEngine, StoreStats};
