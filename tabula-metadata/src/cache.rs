//! Read-through schema metadata cache.
//!
//! Descriptors are resolved in three tiers:
//!
//! 1. the in-process map owned by the cache instance
//! 2. the backing store, keyed by `key_prefix + type_name`
//! 3. live schema introspection, validated against the record type's
//!    declared fields, then installed in-process and persisted
//!
//! There is no mutual exclusion between concurrent first accesses. Each one
//! may populate the same descriptor; the writes are identical overwrites.

use std::sync::Arc;

use dashmap::DashMap;
use tabula_core::{
    MetadataConfig, RecordInfo, RecordRef, RecordType, SchemaDescriptor, SchemaError,
    SerializationError, TabulaResult,
};
use tabula_storage::StoreEngine;
use tracing::{debug, error, info};

use crate::introspect::SchemaIntrospector;

/// Per-record-type schema metadata, cached in-process and in a store.
///
/// # Type Parameters
///
/// - `S`: The store engine persisting descriptors across processes
/// - `I`: The live schema introspector consulted on a store miss
///
/// # Example
///
/// ```ignore
/// let cache = MetadataCache::new(store, introspector, MetadataConfig::default());
///
/// let robot = Robot::default();
/// let pk = cache.get_primary_key_attributes(&robot).await?;
/// let same = cache.get_primary_key_attributes(Robot::record_info().type_name).await?;
/// ```
pub struct MetadataCache<S, I>
where
    S: StoreEngine,
    I: SchemaIntrospector,
{
    store: Arc<S>,
    introspector: Arc<I>,
    config: MetadataConfig,
    /// Populated descriptors, keyed by type name.
    descriptors: DashMap<String, Arc<SchemaDescriptor>>,
    /// Record types that can be resolved by name alone.
    registry: DashMap<String, &'static RecordInfo>,
}

impl<S, I> MetadataCache<S, I>
where
    S: StoreEngine,
    I: SchemaIntrospector,
{
    pub fn new(store: Arc<S>, introspector: Arc<I>, config: MetadataConfig) -> Self {
        Self {
            store,
            introspector,
            config,
            descriptors: DashMap::new(),
            registry: DashMap::new(),
        }
    }

    pub fn with_defaults(store: Arc<S>, introspector: Arc<I>) -> Self {
        Self::new(store, introspector, MetadataConfig::default())
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Make `T` resolvable by its type name.
    pub fn register<T: RecordType>(&self) {
        self.register_info(T::record_info());
    }

    pub fn register_info(&self, info: &'static RecordInfo) {
        if !self.registry.contains_key(info.type_name) {
            self.registry.insert(info.type_name.to_string(), info);
        }
    }

    /// Whether `type_name` can be resolved by name.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registry.contains_key(type_name)
    }

    /// Key under which a type's descriptor is persisted.
    pub fn store_key(&self, type_name: &str) -> String {
        format!("{}{}", self.config.key_prefix, type_name)
    }

    /// Whether a descriptor for `type_name` is already held in-process.
    pub fn is_populated(&self, type_name: &str) -> bool {
        self.descriptors.contains_key(type_name)
    }

    /// Resolve the descriptor for a record type.
    ///
    /// Cached descriptors come back without re-validation. A freshly
    /// introspected schema that lacks any declared field fails with
    /// [`SchemaError::Mismatch`], and nothing is cached or persisted.
    pub async fn resolve<'a>(
        &self,
        record: impl Into<RecordRef<'a>>,
    ) -> TabulaResult<Arc<SchemaDescriptor>> {
        let record = record.into();
        let type_name = record.type_name();

        let cached = self
            .descriptors
            .get(type_name)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(descriptor) = cached {
            return Ok(descriptor);
        }

        if let RecordRef::Info(info) = record {
            self.register_info(info);
        }

        let key = self.store_key(type_name);
        if let Some(json) = self.store.get(&key).await? {
            let descriptor: SchemaDescriptor =
                serde_json::from_str(&json).map_err(|e| SerializationError::Malformed {
                    adapter: "json",
                    reason: e.to_string(),
                })?;
            debug!(record_type = type_name, key = %key, "descriptor loaded from store");
            return Ok(self.install(type_name, descriptor));
        }

        let info = match record {
            RecordRef::Info(info) => info,
            RecordRef::Name(name) => self
                .registry
                .get(name)
                .map(|entry| *entry.value())
                .ok_or_else(|| SchemaError::UnknownRecordType {
                    name: name.to_string(),
                })?,
        };
        self.populate(info, &key).await
    }

    async fn populate(
        &self,
        info: &'static RecordInfo,
        key: &str,
    ) -> TabulaResult<Arc<SchemaDescriptor>> {
        debug!(record_type = info.type_name, source = info.source, "introspecting live schema");
        let live = self.introspector.introspect(info.source).await?;

        let descriptor =
            match SchemaDescriptor::assemble(info.type_name, live, info.column_properties) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    error!(record_type = info.type_name, error = %e, "schema rejected");
                    return Err(e);
                }
            };

        let json = serde_json::to_string(&descriptor).map_err(|_| {
            SerializationError::UnsupportedValue {
                adapter: "json",
                shape: "object".to_string(),
            }
        })?;
        let descriptor = self.install(info.type_name, descriptor);
        self.store.set(key, &json).await?;
        info!(
            record_type = info.type_name,
            attributes = descriptor.attributes.len(),
            "descriptor populated"
        );
        Ok(descriptor)
    }

    fn install(&self, type_name: &str, descriptor: SchemaDescriptor) -> Arc<SchemaDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.descriptors
            .insert(type_name.to_string(), Arc::clone(&descriptor));
        descriptor
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// All schema column names, in schema order.
    pub async fn get_attributes<'a>(
        &self,
        record: impl Into<RecordRef<'a>>,
    ) -> TabulaResult<Vec<String>> {
        Ok(self.resolve(record).await?.attributes.clone())
    }

    pub async fn get_primary_key_attributes<'a>(
        &self,
        record: impl Into<RecordRef<'a>>,
    ) -> TabulaResult<Vec<String>> {
        Ok(self.resolve(record).await?.primary_key.clone())
    }

    pub async fn get_non_primary_key_attributes<'a>(
        &self,
        record: impl Into<RecordRef<'a>>,
    ) -> TabulaResult<Vec<String>> {
        Ok(self.resolve(record).await?.non_primary_key.clone())
    }

    /// The server-generated column, if the table has one.
    pub async fn get_auto_increment_attribute<'a>(
        &self,
        record: impl Into<RecordRef<'a>>,
    ) -> TabulaResult<Option<String>> {
        Ok(self.resolve(record).await?.identity_column.clone())
    }

    /// Whether `name` is a schema column. Fields the record type does not
    /// expose still count.
    pub async fn has_attribute<'a>(
        &self,
        record: impl Into<RecordRef<'a>>,
        name: &str,
    ) -> TabulaResult<bool> {
        Ok(self.resolve(record).await?.has_attribute(name))
    }

    /// Fields exposed on the in-memory record type.
    pub async fn get_column_properties<'a>(
        &self,
        record: impl Into<RecordRef<'a>>,
    ) -> TabulaResult<Vec<String>> {
        Ok(self.resolve(record).await?.column_properties.clone())
    }
}
