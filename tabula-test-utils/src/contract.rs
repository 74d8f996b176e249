//! Behavioural contract every store engine backend must satisfy.
//!
//! Run it against a fresh, empty store. Each check panics with a message
//! naming the backend on violation.

use std::collections::HashMap;

use tabula_storage::StoreEngine;

/// Run every contract check against `store`.
pub async fn exercise_store_contract<S: StoreEngine + ?Sized>(store: &S) {
    round_trip_preserves_values(store).await;
    missing_is_distinct_from_empty(store).await;
    m_get_reports_every_id(store).await;
    m_set_stores_every_entry(store).await;
    delete_is_idempotent(store).await;
    exists_tracks_set(store).await;
    unusual_ids_are_plain_keys(store).await;
}

/// `set(id, v); get(id) == v` for `v` in `""`, `"value"`, `"{}"`.
pub async fn round_trip_preserves_values<S: StoreEngine + ?Sized>(store: &S) {
    let backend = store.backend();
    for value in ["", "value", "{}"] {
        store.set("round_trip", value).await.expect("set");
        assert_eq!(
            store.get("round_trip").await.expect("get").as_deref(),
            Some(value),
            "{}: round trip of {:?}",
            backend,
            value
        );
    }
    store.delete("round_trip").await.expect("delete");
}

/// A never-set or deleted id is `None`; a stored `""` is `Some("")`.
pub async fn missing_is_distinct_from_empty<S: StoreEngine + ?Sized>(store: &S) {
    let backend = store.backend();
    assert_eq!(
        store.get("never_set").await.expect("get"),
        None,
        "{}: never-set id",
        backend
    );

    store.set("var", "").await.expect("set");
    assert_eq!(
        store.get("var").await.expect("get"),
        Some(String::new()),
        "{}: empty value read back as missing",
        backend
    );

    store.delete("var").await.expect("delete");
    assert_eq!(
        store.get("var").await.expect("get"),
        None,
        "{}: deleted id",
        backend
    );
}

/// `m_get(["1","2"])` after only `set("1","1")`.
pub async fn m_get_reports_every_id<S: StoreEngine + ?Sized>(store: &S) {
    let backend = store.backend();
    store.set("1", "1").await.expect("set");
    let values = store.m_get(&["1", "2"]).await.expect("m_get");

    let expected: HashMap<String, Option<String>> = [
        ("1".to_string(), Some("1".to_string())),
        ("2".to_string(), None),
    ]
    .into_iter()
    .collect();
    assert_eq!(values, expected, "{}: m_get result", backend);

    assert!(
        store.m_get(&[]).await.expect("m_get").is_empty(),
        "{}: empty m_get",
        backend
    );
    store.delete("1").await.expect("delete");
}

/// `m_set` stores every entry; an empty map changes nothing.
pub async fn m_set_stores_every_entry<S: StoreEngine + ?Sized>(store: &S) {
    let backend = store.backend();
    store.m_set(&HashMap::new()).await.expect("empty m_set");

    let entries: HashMap<String, String> = [("a", "alpha"), ("b", ""), ("c", "{}")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    store.m_set(&entries).await.expect("m_set");
    for (id, value) in &entries {
        assert_eq!(
            store.get(id).await.expect("get").as_ref(),
            Some(value),
            "{}: m_set entry {}",
            backend,
            id
        );
        store.delete(id).await.expect("delete");
    }
}

/// Deleting present then absent ids never fails.
pub async fn delete_is_idempotent<S: StoreEngine + ?Sized>(store: &S) {
    let backend = store.backend();
    store.set("doomed", "value").await.expect("set");
    store.delete("doomed").await.expect("first delete");
    store.delete("doomed").await.expect("second delete");
    assert!(
        !store.exists("doomed").await.expect("exists"),
        "{}: deleted id still exists",
        backend
    );
}

/// Fresh store: `exists("var")` false, then `set`, then true.
pub async fn exists_tracks_set<S: StoreEngine + ?Sized>(store: &S) {
    let backend = store.backend();
    assert!(
        !store.exists("var").await.expect("exists"),
        "{}: fresh store reports var",
        backend
    );
    store.set("var", "value").await.expect("set");
    assert!(
        store.exists("var").await.expect("exists"),
        "{}: var missing after set",
        backend
    );
    store.delete("var").await.expect("delete");
}

/// The empty id and a 600-character id behave like any other key.
pub async fn unusual_ids_are_plain_keys<S: StoreEngine + ?Sized>(store: &S) {
    let backend = store.backend();
    let long_id = "k".repeat(600);
    for id in ["", long_id.as_str()] {
        assert_eq!(
            store.get(id).await.expect("get"),
            None,
            "{}: unset id of length {}",
            backend,
            id.len()
        );
        store.set(id, "value").await.expect("set");
        assert_eq!(
            store.get(id).await.expect("get").as_deref(),
            Some("value"),
            "{}: id of length {}",
            backend,
            id.len()
        );
        assert!(store.exists(id).await.expect("exists"));
        store.delete(id).await.expect("delete");
        assert!(!store.exists(id).await.expect("exists"));
    }

    let entries: HashMap<String, String> = [
        (String::new(), "empty".to_string()),
        (long_id.clone(), "long".to_string()),
    ]
    .into_iter()
    .collect();
    store.m_set(&entries).await.expect("m_set");
    let values = store.m_get(&["", long_id.as_str()]).await.expect("m_get");
    assert_eq!(values[""].as_deref(), Some("empty"), "{}: empty id", backend);
    assert_eq!(values[&long_id].as_deref(), Some("long"), "{}: long id", backend);
    store.delete("").await.expect("delete");
    store.delete(&long_id).await.expect("delete");
}
