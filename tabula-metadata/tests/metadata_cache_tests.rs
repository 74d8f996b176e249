//! Metadata cache behaviour against an in-memory store and a mock
//! introspector.

use std::sync::Arc;
use std::time::Duration;

use tabula_core::{MetadataConfig, RecordRef, RecordType, SchemaDescriptor};
use tabula_metadata::MetadataCache;
use tabula_storage::{MemoryStore, StoreEngine};
use tabula_test_utils::assertions::{
    assert_mismatch, assert_store_unavailable, assert_unknown_record_type,
};
use tabula_test_utils::fixtures::{
    self, metadata_cache, robots_schema, MisspelledRobot, Robot, RobotPart, RobotSummary,
};
use tabula_test_utils::{CountingStore, FailingStore, MockIntrospector};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_accessors_report_live_schema() {
    let (cache, _store, _introspector) = metadata_cache();
    let robot = Robot::default();

    assert_eq!(
        cache.get_attributes(&robot).await.unwrap(),
        strings(&["id", "name", "kind", "year", "created_at"])
    );
    assert_eq!(cache.get_primary_key_attributes(&robot).await.unwrap(), strings(&["id"]));
    assert_eq!(
        cache.get_non_primary_key_attributes(&robot).await.unwrap(),
        strings(&["name", "kind", "year", "created_at"])
    );
    assert_eq!(
        cache.get_auto_increment_attribute(&robot).await.unwrap(),
        Some("id".to_string())
    );
    assert_eq!(
        cache.get_column_properties(&robot).await.unwrap(),
        strings(&["id", "name", "kind", "year"])
    );
}

#[tokio::test]
async fn test_has_attribute_uses_schema_not_type() {
    let (cache, _store, _introspector) = metadata_cache();
    let summary = RobotSummary::default();

    // `year` is a column even though RobotSummary does not expose it.
    assert!(cache.has_attribute(&summary, "year").await.unwrap());
    assert!(cache.has_attribute(&summary, "created_at").await.unwrap());
    assert!(!cache.has_attribute(&summary, "colour").await.unwrap());
}

#[tokio::test]
async fn test_composite_key_without_identity() {
    let (cache, _store, _introspector) = metadata_cache();
    let part = RecordRef::of::<RobotPart>();

    assert_eq!(
        cache.get_primary_key_attributes(part).await.unwrap(),
        strings(&["robot_id", "part_id"])
    );
    assert_eq!(cache.get_auto_increment_attribute(part).await.unwrap(), None);
}

#[tokio::test]
async fn test_repeated_access_introspects_once() {
    let (cache, store, introspector) = metadata_cache();
    let robot = Robot::default();

    let first = cache.get_attributes(&robot).await.unwrap();
    let second = cache.get_attributes(&robot).await.unwrap();
    cache.get_primary_key_attributes(&robot).await.unwrap();
    cache.has_attribute(&robot, "name").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(introspector.calls("robots"), 1);
    // One store miss, one persist; later calls never reach the store.
    assert_eq!(store.calls().get, 1);
    assert_eq!(store.calls().set, 1);
}

#[tokio::test]
async fn test_descriptor_is_persisted_under_type_name() {
    let (cache, store, _introspector) = metadata_cache();
    let type_name = Robot::record_info().type_name;

    let descriptor = cache.resolve(RecordRef::of::<Robot>()).await.unwrap();

    let json = store
        .inner()
        .get(type_name)
        .await
        .unwrap()
        .expect("descriptor persisted");
    let persisted: SchemaDescriptor = serde_json::from_str(&json).unwrap();
    assert_eq!(persisted, *descriptor);
    assert_eq!(persisted.record_type, type_name);
}

#[tokio::test]
async fn test_store_hit_skips_introspection() {
    let store = Arc::new(MemoryStore::new());
    let warm_introspector = Arc::new(fixtures::introspector());
    let warm = MetadataCache::with_defaults(Arc::clone(&store), Arc::clone(&warm_introspector));
    let expected = warm.resolve(RecordRef::of::<Robot>()).await.unwrap();

    // A second process sharing the store never introspects.
    let cold_introspector = Arc::new(MockIntrospector::new());
    let cold = MetadataCache::with_defaults(Arc::clone(&store), Arc::clone(&cold_introspector));
    let loaded = cold.resolve(RecordRef::of::<Robot>()).await.unwrap();

    assert_eq!(*loaded, *expected);
    assert_eq!(cold_introspector.total_calls(), 0);
    assert_eq!(warm_introspector.calls("robots"), 1);
}

#[tokio::test]
async fn test_store_hit_by_name_needs_no_registration() {
    let store = Arc::new(MemoryStore::new());
    let warm = MetadataCache::with_defaults(Arc::clone(&store), Arc::new(fixtures::introspector()));
    warm.resolve(RecordRef::of::<Robot>()).await.unwrap();

    let cold = MetadataCache::with_defaults(Arc::clone(&store), Arc::new(MockIntrospector::new()));
    let pk = cold
        .get_primary_key_attributes(Robot::record_info().type_name)
        .await
        .unwrap();
    assert_eq!(pk, strings(&["id"]));
}

#[tokio::test]
async fn test_mismatch_lists_fields_and_persists_nothing() {
    let (cache, store, introspector) = metadata_cache();
    let misfit = MisspelledRobot::default();

    let result = cache.get_attributes(&misfit).await;
    assert_mismatch(&result, &["nmae", "colour"]);
    let err = result.unwrap_err();
    assert!(err.is_schema_mismatch());
    assert!(err.to_string().contains("MisspelledRobot"));

    assert_eq!(store.calls().set, 0);
    assert!(!cache.is_populated(MisspelledRobot::record_info().type_name));

    // Not cached: the next access introspects again and fails again.
    assert_mismatch(&cache.get_attributes(&misfit).await, &["nmae", "colour"]);
    assert_eq!(introspector.calls("robots"), 2);
}

#[tokio::test]
async fn test_unknown_name_fails_until_registered() {
    let (cache, _store, _introspector) = metadata_cache();
    let name = RobotPart::record_info().type_name;

    assert_unknown_record_type(&cache.get_attributes(name).await);

    cache.register::<RobotPart>();
    assert_eq!(
        cache.get_attributes(name).await.unwrap(),
        strings(&["robot_id", "part_id", "quantity"])
    );
}

#[tokio::test]
async fn test_registration_happens_only_on_a_miss() {
    let store = Arc::new(MemoryStore::new());
    let warm = MetadataCache::with_defaults(Arc::clone(&store), Arc::new(fixtures::introspector()));
    let robot = Robot::default();
    let name = Robot::record_info().type_name;

    assert!(!warm.is_registered(name));
    warm.resolve(&robot).await.unwrap();
    assert!(warm.is_registered(name));

    // Loaded by name from the store, then hit in-process by instance.
    let cold = MetadataCache::with_defaults(Arc::clone(&store), Arc::new(MockIntrospector::new()));
    cold.resolve(name).await.unwrap();
    cold.resolve(&robot).await.unwrap();
    assert!(cold.is_populated(name));
    assert!(!cold.is_registered(name));
}

#[tokio::test]
async fn test_name_and_instance_share_one_descriptor() {
    let (cache, _store, introspector) = metadata_cache();
    let robot = Robot::default();

    let by_instance = cache.resolve(&robot).await.unwrap();
    let by_name = cache.resolve(Robot::record_info().type_name).await.unwrap();

    assert!(Arc::ptr_eq(&by_instance, &by_name));
    assert_eq!(introspector.calls("robots"), 1);
}

#[tokio::test]
async fn test_types_sharing_a_table_get_separate_descriptors() {
    let (cache, _store, introspector) = metadata_cache();

    let full = cache.get_column_properties(&Robot::default()).await.unwrap();
    let summary = cache
        .get_column_properties(&RobotSummary::default())
        .await
        .unwrap();

    assert_eq!(full.len(), 4);
    assert_eq!(summary, strings(&["id", "name"]));
    assert_eq!(introspector.calls("robots"), 2);
}

#[tokio::test]
async fn test_key_prefix_applies_to_store_key() {
    let store = Arc::new(CountingStore::new());
    let cache = MetadataCache::new(
        Arc::clone(&store),
        Arc::new(fixtures::introspector()),
        MetadataConfig {
            key_prefix: "meta:".to_string(),
        },
    );
    cache.resolve(RecordRef::of::<Robot>()).await.unwrap();

    let key = format!("meta:{}", Robot::record_info().type_name);
    assert_eq!(cache.store_key(Robot::record_info().type_name), key);
    assert!(store.inner().exists(&key).await.unwrap());
    assert!(!store
        .inner()
        .exists(Robot::record_info().type_name)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_store_unavailable_propagates() {
    let introspector = Arc::new(fixtures::introspector());
    let cache = MetadataCache::with_defaults(
        Arc::new(FailingStore::default()),
        Arc::clone(&introspector),
    );

    assert_store_unavailable(&cache.get_attributes(&Robot::default()).await);
    assert_eq!(introspector.total_calls(), 0);
}

#[tokio::test]
async fn test_malformed_persisted_descriptor_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(Robot::record_info().type_name, "{not json")
        .await
        .unwrap();
    let cache = MetadataCache::with_defaults(store, Arc::new(fixtures::introspector()));

    let err = cache.resolve(RecordRef::of::<Robot>()).await.unwrap_err();
    assert!(matches!(err, tabula_core::TabulaError::Serialization(_)));
}

#[tokio::test]
async fn test_missing_table_is_introspection_failure() {
    let cache = MetadataCache::with_defaults(
        Arc::new(MemoryStore::new()),
        Arc::new(MockIntrospector::new()),
    );
    let err = cache.resolve(RecordRef::of::<Robot>()).await.unwrap_err();
    assert!(matches!(
        err,
        tabula_core::TabulaError::Schema(tabula_core::SchemaError::IntrospectionFailed { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_access_converges() {
    let store = Arc::new(CountingStore::new());
    let introspector = Arc::new(
        MockIntrospector::new()
            .with_schema("robots", robots_schema())
            .with_delay(Duration::from_millis(20)),
    );
    let cache = Arc::new(MetadataCache::with_defaults(
        Arc::clone(&store),
        Arc::clone(&introspector),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_attributes(RecordRef::of::<Robot>()).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("task").expect("resolve"));
    }

    assert!(results.iter().all(|r| *r == results[0]));
    // Racing populations are allowed, each one persisting the same value.
    let populations = introspector.calls("robots");
    assert!((1..=8).contains(&populations));
    assert_eq!(store.calls().set, populations);

    // Once settled, no further introspection.
    cache.get_attributes(RecordRef::of::<Robot>()).await.unwrap();
    assert_eq!(introspector.calls("robots"), populations);
}
