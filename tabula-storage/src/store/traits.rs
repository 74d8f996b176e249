//! Store engine trait definitions.

use std::collections::HashMap;

use async_trait::async_trait;
use tabula_core::TabulaResult;

/// Pluggable key/value store.
///
/// Keys and values are opaque strings; the store never interprets a value.
/// An empty string is a stored value, distinct from a missing key.
///
/// # Failure semantics
///
/// Backend connectivity or protocol failures surface as
/// `StoreError::Unavailable`. Nothing is retried here, and a failed batch
/// operation may have been partially applied.
#[async_trait]
pub trait StoreEngine: Send + Sync {
    /// Fetch one value. `None` means the key is missing.
    async fn get(&self, id: &str) -> TabulaResult<Option<String>>;

    /// Store a value, overwriting any previous one.
    async fn set(&self, id: &str, value: &str) -> TabulaResult<()>;

    /// Fetch many values. Every requested id appears in the result, missing
    /// ones as `None`.
    async fn m_get(&self, ids: &[&str]) -> TabulaResult<HashMap<String, Option<String>>> {
        let mut values = HashMap::with_capacity(ids.len());
        for id in ids {
            values.insert((*id).to_string(), self.get(id).await?);
        }
        Ok(values)
    }

    /// Store many values. An empty map performs no backend operation.
    async fn m_set(&self, entries: &HashMap<String, String>) -> TabulaResult<()> {
        for (id, value) in entries {
            self.set(id, value).await?;
        }
        Ok(())
    }

    /// Remove a key. Deleting a missing key is not an error.
    async fn delete(&self, id: &str) -> TabulaResult<()>;

    async fn exists(&self, id: &str) -> TabulaResult<bool>;

    /// Hit/miss/entry counters, for backends that track them.
    async fn stats(&self) -> TabulaResult<StoreStats> {
        Ok(StoreStats::default())
    }

    /// Backend name for logs and errors.
    fn backend(&self) -> &'static str;
}

#[async_trait]
impl<S: StoreEngine + ?Sized> StoreEngine for std::sync::Arc<S> {
    async fn get(&self, id: &str) -> TabulaResult<Option<String>> {
        (**self).get(id).await
    }

    async fn set(&self, id: &str, value: &str) -> TabulaResult<()> {
        (**self).set(id, value).await
    }

    async fn m_get(&self, ids: &[&str]) -> TabulaResult<HashMap<String, Option<String>>> {
        (**self).m_get(ids).await
    }

    async fn m_set(&self, entries: &HashMap<String, String>) -> TabulaResult<()> {
        (**self).m_set(entries).await
    }

    async fn delete(&self, id: &str) -> TabulaResult<()> {
        (**self).delete(id).await
    }

    async fn exists(&self, id: &str) -> TabulaResult<bool> {
        (**self).exists(id).await
    }

    async fn stats(&self) -> TabulaResult<StoreStats> {
        (**self).stats().await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of lookups that found a value.
    pub hits: u64,
    /// Number of lookups that found nothing.
    pub misses: u64,
    /// Number of entries currently stored.
    pub entry_count: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = StoreStats {
            hits: 3,
            misses: 1,
            entry_count: 2,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(StoreStats::default().hit_rate(), 0.0);
    }
}
