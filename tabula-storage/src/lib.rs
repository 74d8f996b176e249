//! Tabula Storage - pluggable key/value store engine
//!
//! The [`StoreEngine`] trait and its backends (in-memory, redis, a Postgres
//! table, LMDB), the configuration-selected [`StoreProvider`], and the value
//! caches built on top of a store.

pub mod object_cache;
pub mod store;

pub use object_cache::{ObjectCache, ResponseCache, RESPONSE_PREFIX};
pub use store::{
    create_pool, LmdbStore, LmdbStoreError, MemoryStore, PgStore, RedisStore, StoreEngine,
    StoreProvider, StoreStats,
};
