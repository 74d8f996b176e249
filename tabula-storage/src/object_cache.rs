//! Serialized value caches built on a store engine.

use std::sync::Arc;

use serde_json::Value;
use tabula_core::{Serializer, StringSerializer, TabulaResult};
use tracing::debug;

use crate::store::StoreEngine;

/// Caches application values under prefixed keys, converting them with a
/// serializer adapter.
pub struct ObjectCache<S: StoreEngine> {
    store: Arc<S>,
    serializer: Box<dyn Serializer>,
    prefix: String,
}

impl<S: StoreEngine> ObjectCache<S> {
    pub fn new(store: Arc<S>, serializer: Box<dyn Serializer>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            serializer,
            prefix: prefix.into(),
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Fetch and decode a value. A missing key is `None`.
    pub async fn get(&self, id: &str) -> TabulaResult<Option<Value>> {
        match self.store.get(&self.key(id)).await? {
            Some(serialized) => Ok(Some(self.serializer.deserialize(&serialized)?)),
            None => Ok(None),
        }
    }

    /// Encode and store a value. Nothing is written if the serializer rejects
    /// the value.
    pub async fn set(&self, id: &str, value: &Value) -> TabulaResult<()> {
        let serialized = self.serializer.serialize(value)?;
        self.store.set(&self.key(id), &serialized).await
    }

    pub async fn delete(&self, id: &str) -> TabulaResult<()> {
        self.store.delete(&self.key(id)).await
    }

    pub async fn exists(&self, id: &str) -> TabulaResult<bool> {
        self.store.exists(&self.key(id)).await
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

/// Default key prefix for cached responses.
pub const RESPONSE_PREFIX: &str = "response:";

/// Rendered response content cached per `(controller, action)`.
///
/// Content is stored with the pass-through adapter, so it comes back exactly
/// as it was rendered.
pub struct ResponseCache<S: StoreEngine> {
    inner: ObjectCache<S>,
}

impl<S: StoreEngine> ResponseCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_prefix(store, RESPONSE_PREFIX)
    }

    pub fn with_prefix(store: Arc<S>, prefix: impl Into<String>) -> Self {
        Self {
            inner: ObjectCache::new(store, Box::new(StringSerializer), prefix),
        }
    }

    /// `<controller length>:<controller>:<action>`, so a `:` inside either
    /// part cannot make two pairs share a key.
    fn id(controller: &str, action: &str) -> String {
        format!("{}:{}:{}", controller.len(), controller, action)
    }

    /// Previously stored content for this action, if any.
    pub async fn cached_response(
        &self,
        controller: &str,
        action: &str,
    ) -> TabulaResult<Option<String>> {
        let cached = self.inner.get(&Self::id(controller, action)).await?;
        debug!(controller, action, hit = cached.is_some(), "cached response lookup");
        Ok(cached.map(|value| match value {
            Value::String(content) => content,
            other => other.to_string(),
        }))
    }

    pub async fn store_response(
        &self,
        controller: &str,
        action: &str,
        content: &str,
    ) -> TabulaResult<()> {
        self.inner
            .set(&Self::id(controller, action), &Value::String(content.to_string()))
            .await
    }

    pub async fn invalidate(&self, controller: &str, action: &str) -> TabulaResult<()> {
        self.inner.delete(&Self::id(controller, action)).await
    }
}
