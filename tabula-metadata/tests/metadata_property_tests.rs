//! Property-Based Tests for descriptor invariants
//!
//! For any consistent live schema and any record type exposing a subset of
//! its columns, the resolved descriptor keeps the declared fields within the
//! schema and the key columns partition the attributes. Exposing a column the
//! schema lacks always fails.

use std::sync::Arc;

use proptest::prelude::*;
use tabula_core::{RecordInfo, RecordRef};
use tabula_metadata::MetadataCache;
use tabula_test_utils::generators::arb_live_schema;
use tabula_test_utils::{CountingStore, MockIntrospector};
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

/// Build a record type at runtime. Leaked: tests only.
fn leak_record_info(properties: Vec<String>) -> &'static RecordInfo {
    let properties: Vec<&'static str> = properties
        .into_iter()
        .map(|p| &*Box::leak(p.into_boxed_str()))
        .collect();
    Box::leak(Box::new(RecordInfo {
        type_name: "generated::Record",
        source: "generated",
        column_properties: Box::leak(properties.into_boxed_slice()),
    }))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_descriptor_invariants_hold(live in arb_live_schema(), mask in any::<u16>()) {
        let properties: Vec<String> = live
            .attributes
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, a)| a.clone())
            .collect();
        let info = leak_record_info(properties);
        let introspector = Arc::new(MockIntrospector::new().with_schema("generated", live.clone()));
        let cache = MetadataCache::with_defaults(Arc::new(CountingStore::new()), Arc::clone(&introspector));

        let rt = test_runtime()?;
        rt.block_on(async {
            let descriptor = cache.resolve(RecordRef::Info(info)).await.unwrap();
            for property in &descriptor.column_properties {
                prop_assert!(descriptor.attributes.contains(property));
            }
            let mut keys: Vec<&String> =
                descriptor.primary_key.iter().chain(&descriptor.non_primary_key).collect();
            keys.sort();
            let mut attributes: Vec<&String> = descriptor.attributes.iter().collect();
            attributes.sort();
            prop_assert_eq!(keys, attributes);

            // Second access is served in-process.
            cache.resolve(RecordRef::Info(info)).await.unwrap();
            prop_assert_eq!(introspector.calls("generated"), 1);
            Ok(())
        })?;
    }

    #[test]
    fn prop_unknown_column_always_rejected(live in arb_live_schema()) {
        // Upper case never appears in generated column names.
        let mut properties = live.attributes.clone();
        properties.push("NotAColumn".to_string());
        let info = leak_record_info(properties);
        let store = Arc::new(CountingStore::new());
        let cache = MetadataCache::with_defaults(
            Arc::clone(&store),
            Arc::new(MockIntrospector::new().with_schema("generated", live)),
        );

        let rt = test_runtime()?;
        rt.block_on(async {
            let err = cache.resolve(RecordRef::Info(info)).await.unwrap_err();
            prop_assert!(err.is_schema_mismatch());
            prop_assert_eq!(store.calls().set, 0);
            Ok(())
        })?;
    }
}
