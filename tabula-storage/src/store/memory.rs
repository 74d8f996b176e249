//! Process-local store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tabula_core::{StoreError, TabulaResult};

use super::traits::{StoreEngine, StoreStats};

/// In-memory store backed by a `RwLock<HashMap>`.
///
/// Contents live only as long as the value; nothing is shared between
/// instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    stats: RwLock<StoreStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
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
}

#[async_trait]
impl StoreEngine for MemoryStore {
    async fn get(&self, id: &str) -> TabulaResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        let value = entries.get(id).cloned();
        self.record_lookup(value.is_some());
        Ok(value)
    }

    async fn set(&self, id: &str, value: &str) -> TabulaResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(id.to_string(), value.to_string());
        Ok(())
    }

    async fn m_get(&self, ids: &[&str]) -> TabulaResult<HashMap<String, Option<String>>> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(ids
            .iter()
            .map(|id| {
                let value = entries.get(*id).cloned();
                self.record_lookup(value.is_some());
                ((*id).to_string(), value)
            })
            .collect())
    }

    async fn m_set(&self, values: &HashMap<String, String>) -> TabulaResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn delete(&self, id: &str) -> TabulaResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &str) -> TabulaResult<bool> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.contains_key(id))
    }

    async fn stats(&self) -> TabulaResult<StoreStats> {
        let entry_count = self
            .entries
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .len() as u64;
        let stats = self.stats.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(StoreStats {
            entry_count,
            ..stats.clone()
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
