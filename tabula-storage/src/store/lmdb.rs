//! LMDB-backed store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a durable, memory-mapped
//! store on a single host without a server process.
//!
//! # Transactions
//!
//! - One read transaction per `get`, `exists` and `m_get`
//! - One write transaction per `set`, `delete` and `m_set`
//! - Statistics are tracked behind a `RwLock`
//!
//! # Keys
//!
//! LMDB rejects empty keys and keys longer than 511 bytes. Every id is stored
//! under a one-byte tag: `k` followed by the id when it fits, otherwise `d`
//! followed by the SHA-256 digest of the id. Digest entries keep the original
//! id in front of the value (`<len>:<id><value>`) and are only returned for
//! that id.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use sha2::{Digest, Sha256};
use tabula_core::{LmdbConfig, TabulaError, TabulaResult};
use tracing::info;

use super::traits::{StoreEngine, StoreStats};

const BACKEND: &str = "lmdb";

/// LMDB's compiled-in key size limit.
const MAX_KEY_LEN: usize = 511;
const INLINE_TAG: u8 = b'k';
const DIGEST_TAG: u8 = b'd';

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    #[error("Map size of {0} MB overflows the address space")]
    MapSize(usize),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for TabulaError {
    fn from(e: LmdbStoreError) -> Self {
        TabulaError::store_unavailable(BACKEND, e)
    }
}

fn txn_error(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

/// An id mapped onto a valid LMDB key.
struct EntryKey {
    bytes: Vec<u8>,
    digested: bool,
}

impl EntryKey {
    fn new(id: &str) -> Self {
        let mut bytes;
        let digested = id.len() >= MAX_KEY_LEN;
        if digested {
            bytes = Vec::with_capacity(33);
            bytes.push(DIGEST_TAG);
            bytes.extend_from_slice(&Sha256::digest(id.as_bytes()));
        } else {
            bytes = Vec::with_capacity(id.len() + 1);
            bytes.push(INLINE_TAG);
            bytes.extend_from_slice(id.as_bytes());
        }
        Self { bytes, digested }
    }

    fn encode_value<'v>(&self, id: &str, value: &'v str) -> Cow<'v, str> {
        if self.digested {
            Cow::Owned(format!("{}:{}{}", id.len(), id, value))
        } else {
            Cow::Borrowed(value)
        }
    }

    fn decode_value<'v>(&self, id: &str, stored: &'v str) -> Option<&'v str> {
        if !self.digested {
            return Some(stored);
        }
        let (len, rest) = stored.split_once(':')?;
        let len: usize = len.parse().ok()?;
        let stored_id = rest.get(..len)?;
        (stored_id == id).then(|| &rest[len..])
    }
}

/// LMDB-backed store.
///
/// # Example
///
/// ```ignore
/// use tabula_storage::{LmdbStore, StoreEngine};
///
/// let store = LmdbStore::new("/tmp/tabula", 64)?;
/// store.set("robots", "{}").await?;
/// assert_eq!(store.get("robots").await?, Some("{}".to_string()));
/// ```
pub struct LmdbStore {
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Str>,
    stats: RwLock<StoreStats>,
}

impl LmdbStore {
    /// Open (creating if needed) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or(LmdbStoreError::MapSize(max_size_mb))?;
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let db: Database<Bytes, Str> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        let entry_count = db.len(&wtxn).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        Ok(Self {
            env,
            db,
            stats: RwLock::new(StoreStats {
                entry_count,
                ..StoreStats::default()
            }),
        })
    }

    pub fn from_config(config: &LmdbConfig) -> TabulaResult<Self> {
        let store = Self::new(&config.path, config.max_size_mb)?;
        info!(path = %config.path.display(), "Opened lmdb store");
        Ok(store)
    }

    fn read(&self, rtxn: &RoTxn, id: &str) -> Result<Option<String>, LmdbStoreError> {
        let key = EntryKey::new(id);
        let stored = self.db.get(rtxn, key.bytes.as_slice()).map_err(txn_error)?;
        Ok(stored
            .and_then(|stored| key.decode_value(id, stored))
            .map(str::to_string))
    }

    fn record_lookup(&self, hit: bool) {
        if let Ok(mut stats) = self.stats.write() {
            if hit {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
    }

    fn set_entry_count(&self, entry_count: u64) {
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = entry_count;
        }
    }
}

#[async_trait]
impl StoreEngine for LmdbStore {
    async fn get(&self, id: &str) -> TabulaResult<Option<String>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let value = self.read(&rtxn, id)?;
        self.record_lookup(value.is_some());
        Ok(value)
    }

    async fn set(&self, id: &str, value: &str) -> TabulaResult<()> {
        let key = EntryKey::new(id);
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, key.bytes.as_slice(), &*key.encode_value(id, value))
            .map_err(txn_error)?;
        let entry_count = self.db.len(&wtxn).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        self.set_entry_count(entry_count);
        Ok(())
    }

    async fn m_get(&self, ids: &[&str]) -> TabulaResult<HashMap<String, Option<String>>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let mut values = HashMap::with_capacity(ids.len());
        for id in ids {
            let value = self.read(&rtxn, id)?;
            self.record_lookup(value.is_some());
            values.insert((*id).to_string(), value);
        }
        Ok(values)
    }

    async fn m_set(&self, entries: &HashMap<String, String>) -> TabulaResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        for (id, value) in entries {
            let key = EntryKey::new(id);
            self.db
                .put(&mut wtxn, key.bytes.as_slice(), &*key.encode_value(id, value))
                .map_err(txn_error)?;
        }
        let entry_count = self.db.len(&wtxn).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        self.set_entry_count(entry_count);
        Ok(())
    }

    async fn delete(&self, id: &str) -> TabulaResult<()> {
        let key = EntryKey::new(id);
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let owned = match self.db.get(&wtxn, key.bytes.as_slice()).map_err(txn_error)? {
            Some(stored) => key.decode_value(id, stored).is_some(),
            None => false,
        };
        let deleted = owned
            && self
                .db
                .delete(&mut wtxn, key.bytes.as_slice())
                .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        if deleted {
            if let Ok(mut stats) = self.stats.write() {
                stats.entry_count = stats.entry_count.saturating_sub(1);
            }
        }
        Ok(())
    }

    async fn exists(&self, id: &str) -> TabulaResult<bool> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        Ok(self.read(&rtxn, id)?.is_some())
    }

    async fn stats(&self) -> TabulaResult<StoreStats> {
        Ok(self.stats.read().map(|s| s.clone()).unwrap_or_default())
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}
