//! Tabula Test Utilities
//!
//! Shared test infrastructure for the Tabula workspace:
//! - Mock introspector and instrumented stores
//! - A reusable store engine contract suite
//! - Proptest generators
//! - Fixture record types and schemas
//! - Custom assertions for Tabula errors

pub mod contract;

pub use tabula_core::{
    LiveSchema, MetadataConfig, RecordInfo, RecordRef, RecordType, SchemaDescriptor, SchemaError,
    StoreError, TabulaError, TabulaResult,
};
pub use tabula_metadata::{MetadataCache, SchemaIntrospector};
pub use tabula_storage::{MemoryStore, StoreEngine, StoreStats};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

// ============================================================================
// MOCK INTROSPECTOR
// ============================================================================

/// Introspector answering from a fixed table of schemas, counting calls per
/// source.
#[derive(Debug, Default)]
pub struct MockIntrospector {
    schemas: RwLock<HashMap<String, LiveSchema>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MockIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(self, source: impl Into<String>, schema: LiveSchema) -> Self {
        self.set_schema(source, schema);
        self
    }

    /// Sleep before answering, to widen race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the schema reported for `source`.
    pub fn set_schema(&self, source: impl Into<String>, schema: LiveSchema) {
        self.schemas
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(source.into(), schema);
    }

    pub fn calls(&self, source: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(source)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .sum()
    }
}

#[async_trait]
impl SchemaIntrospector for MockIntrospector {
    async fn introspect(&self, source: &str) -> TabulaResult<LiveSchema> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(source.to_string())
            .or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let schema = self
            .schemas
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(source)
            .cloned();
        schema.ok_or_else(|| {
            SchemaError::IntrospectionFailed {
                source_table: source.to_string(),
                reason: "no such table".to_string(),
            }
            .into()
        })
    }
}

// ============================================================================
// INSTRUMENTED STORES
// ============================================================================

/// Snapshot of the calls a [`CountingStore`] has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub get: usize,
    pub set: usize,
    pub delete: usize,
    pub exists: usize,
    pub m_get: usize,
    pub m_set: usize,
}

impl StoreCalls {
    /// Single-key operations only; batch calls are not included.
    pub fn total(&self) -> usize {
        self.get + self.set + self.delete + self.exists
    }
}

/// Store wrapper counting every operation it receives.
///
/// By default batch operations are expanded here into single-key calls, so
/// each element shows up as one counted `get` or `set`. A wrapper built with
/// [`CountingStore::forwarding`] hands batches to the wrapped store's own
/// `m_get`/`m_set` instead.
#[derive(Debug, Default)]
pub struct CountingStore<S = MemoryStore> {
    inner: S,
    forward_batches: bool,
    get: AtomicUsize,
    set: AtomicUsize,
    delete: AtomicUsize,
    exists: AtomicUsize,
    m_get: AtomicUsize,
    m_set: AtomicUsize,
}

impl CountingStore<MemoryStore> {
    pub fn new() -> Self {
        Self::wrap(MemoryStore::new())
    }
}

impl<S: StoreEngine> CountingStore<S> {
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            forward_batches: false,
            get: AtomicUsize::new(0),
            set: AtomicUsize::new(0),
            delete: AtomicUsize::new(0),
            exists: AtomicUsize::new(0),
            m_get: AtomicUsize::new(0),
            m_set: AtomicUsize::new(0),
        }
    }

    /// Count batch calls and pass them to the wrapped backend's batch methods.
    pub fn forwarding(inner: S) -> Self {
        Self {
            forward_batches: true,
            ..Self::wrap(inner)
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            get: self.get.load(Ordering::SeqCst),
            set: self.set.load(Ordering::SeqCst),
            delete: self.delete.load(Ordering::SeqCst),
            exists: self.exists.load(Ordering::SeqCst),
            m_get: self.m_get.load(Ordering::SeqCst),
            m_set: self.m_set.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl<S: StoreEngine> StoreEngine for CountingStore<S> {
    async fn get(&self, id: &str) -> TabulaResult<Option<String>> {
        self.get.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, value: &str) -> TabulaResult<()> {
        self.set.fetch_add(1, Ordering::SeqCst);
        self.inner.set(id, value).await
    }

    async fn m_get(&self, ids: &[&str]) -> TabulaResult<HashMap<String, Option<String>>> {
        self.m_get.fetch_add(1, Ordering::SeqCst);
        if self.forward_batches {
            return self.inner.m_get(ids).await;
        }
        let mut values = HashMap::with_capacity(ids.len());
        for id in ids {
            values.insert((*id).to_string(), self.get(id).await?);
        }
        Ok(values)
    }

    async fn m_set(&self, entries: &HashMap<String, String>) -> TabulaResult<()> {
        self.m_set.fetch_add(1, Ordering::SeqCst);
        if self.forward_batches {
            return self.inner.m_set(entries).await;
        }
        for (id, value) in entries {
            self.set(id, value).await?;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> TabulaResult<()> {
        self.delete.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
    }

    async fn exists(&self, id: &str) -> TabulaResult<bool> {
        self.exists.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(id).await
    }

    async fn stats(&self) -> TabulaResult<StoreStats> {
        self.inner.stats().await
    }

    fn backend(&self) -> &'static str {
        "counting"
    }
}

/// Store whose every operation fails as unavailable.
#[derive(Debug, Clone)]
pub struct FailingStore {
    reason: String,
}

impl FailingStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> TabulaResult<T> {
        Err(TabulaError::store_unavailable("failing", &self.reason))
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new("connection refused")
    }
}

#[async_trait]
impl StoreEngine for FailingStore {
    async fn get(&self, _id: &str) -> TabulaResult<Option<String>> {
        self.fail()
    }

    async fn set(&self, _id: &str, _value: &str) -> TabulaResult<()> {
        self.fail()
    }

    async fn delete(&self, _id: &str) -> TabulaResult<()> {
        self.fail()
    }

    async fn exists(&self, _id: &str) -> TabulaResult<bool> {
        self.fail()
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for store and schema values.

    use super::*;
    use proptest::collection::{btree_set, hash_map};
    use proptest::prelude::*;

    /// Store keys: the empty key, keys with separators, arbitrary unicode and
    /// keys past LMDB's 511-byte limit.
    pub fn arb_store_key() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-zA-Z0-9_:.\\-]{1,32}",
            ".{1,16}",
            "[a-z]{500,700}",
        ]
    }

    /// Store values, including the empty string.
    pub fn arb_store_value() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("{}".to_string()),
            ".{0,64}",
        ]
    }

    pub fn arb_entries() -> impl Strategy<Value = HashMap<String, String>> {
        hash_map(arb_store_key(), arb_store_value(), 0..8)
    }

    pub fn arb_column_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,12}"
    }

    /// Consistent live schemas with 1 to 12 columns, a leading primary key
    /// and an optional identity column drawn from the key.
    pub fn arb_live_schema() -> impl Strategy<Value = LiveSchema> {
        btree_set(arb_column_name(), 1..12)
            .prop_flat_map(|columns| {
                let columns: Vec<String> = columns.into_iter().collect();
                let len = columns.len();
                (Just(columns), 0..=len, any::<bool>())
            })
            .prop_map(|(columns, pk_len, identity)| {
                let primary_key = columns[..pk_len].to_vec();
                let identity_column = if identity {
                    primary_key.first().cloned()
                } else {
                    None
                };
                LiveSchema::new(columns, primary_key, identity_column)
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Record types and schemas shared by tests.

    use super::*;

    tabula_core::record! {
        #[table = "robots"]
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Robot {
            pub id: i64,
            pub name: String,
            pub kind: String,
            pub year: i32,
        }
    }

    tabula_core::record! {
        #[table = "robots"]
        #[derive(Debug, Clone, Default)]
        pub struct RobotSummary {
            pub id: i64,
            pub name: String,
        }
    }

    tabula_core::record! {
        #[table = "robots"]
        #[derive(Debug, Clone, Default)]
        pub struct MisspelledRobot {
            pub id: i64,
            pub nmae: String,
            pub colour: String,
        }
    }

    tabula_core::record! {
        #[table = "robot_parts"]
        #[derive(Debug, Clone, Default)]
        pub struct RobotPart {
            pub robot_id: i64,
            pub part_id: i64,
            pub quantity: i32,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// `robots`: serial `id` key plus a column no fixture type exposes.
    pub fn robots_schema() -> LiveSchema {
        LiveSchema::new(
            strings(&["id", "name", "kind", "year", "created_at"]),
            strings(&["id"]),
            Some("id".to_string()),
        )
    }

    /// `robot_parts`: composite key, no identity column.
    pub fn robot_parts_schema() -> LiveSchema {
        LiveSchema::new(
            strings(&["robot_id", "part_id", "quantity"]),
            strings(&["robot_id", "part_id"]),
            None,
        )
    }

    /// Introspector knowing both fixture tables.
    pub fn introspector() -> MockIntrospector {
        MockIntrospector::new()
            .with_schema("robots", robots_schema())
            .with_schema("robot_parts", robot_parts_schema())
    }

    /// Isolated metadata cache over an in-memory counting store.
    pub fn metadata_cache() -> (
        MetadataCache<CountingStore, MockIntrospector>,
        Arc<CountingStore>,
        Arc<MockIntrospector>,
    ) {
        let store = Arc::new(CountingStore::new());
        let introspector = Arc::new(introspector());
        let cache = MetadataCache::with_defaults(Arc::clone(&store), Arc::clone(&introspector));
        (cache, store, introspector)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Tabula-specific errors.

    use super::*;

    /// Assert that the result is a schema mismatch naming exactly `columns`.
    #[track_caller]
    pub fn assert_mismatch<T: std::fmt::Debug>(result: &TabulaResult<T>, columns: &[&str]) {
        match result {
            Err(TabulaError::Schema(SchemaError::Mismatch { columns: found, .. })) => {
                let found: Vec<&str> = found.iter().map(String::as_str).collect();
                assert_eq!(found, columns, "Wrong columns in Mismatch error");
            }
            other => panic!("Expected Mismatch error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unknown_record_type<T: std::fmt::Debug>(result: &TabulaResult<T>) {
        match result {
            Err(TabulaError::Schema(SchemaError::UnknownRecordType { .. })) => {}
            other => panic!("Expected UnknownRecordType error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_store_unavailable<T: std::fmt::Debug>(result: &TabulaResult<T>) {
        match result {
            Err(TabulaError::Store(StoreError::Unavailable { .. })) => {}
            other => panic!("Expected Store Unavailable error, got: {:?}", other),
        }
    }
}
