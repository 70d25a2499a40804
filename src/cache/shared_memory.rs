//! Cache kept in a store shared by everything in the process
//!
//! [`SharedMemoryStore`] plays the part of a host-wide user cache: values are
//! held natively, without the codec, and any handle cloned from the same
//! store sees the same data. The store may evict entries when it is full;
//! an evicted key simply loads as absent.

use crate::cache::{
    types::{prefixed_key, CacheValue},
    Cache,
};
use crate::error::Result;
use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use tracing::debug;

/// Default number of entries a shared store holds before evicting
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Clonable handle to an in-process key-value store
#[derive(Clone)]
pub struct SharedMemoryStore {
    entries: MokaCache<String, CacheValue>,
}

impl Default for SharedMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SharedMemoryStore {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: MokaCache::new(capacity),
        }
    }

    /// Fetch a stored value; `None` only when nothing is stored under `key`
    pub async fn fetch(&self, key: &str) -> Option<CacheValue> {
        self.entries.get(key).await
    }

    /// Store a value, overwriting any previous one
    pub async fn store(&self, key: impl Into<String>, value: CacheValue) {
        self.entries.insert(key.into(), value).await;
    }
}

/// Cache over a [`SharedMemoryStore`], keys prefixed with `NotORM.`
#[derive(Clone, Default)]
pub struct SharedMemoryCache {
    store: SharedMemoryStore,
}

impl SharedMemoryCache {
    pub fn new(store: SharedMemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SharedMemoryStore {
        &self.store
    }
}

#[async_trait]
impl Cache for SharedMemoryCache {
    async fn load(&self, key: &str) -> Option<CacheValue> {
        let value = self.store.fetch(&prefixed_key(key)).await;
        if value.is_none() {
            debug!("Shared memory miss: {}", key);
        }
        value
    }

    async fn save(&self, key: &str, value: CacheValue) -> Result<()> {
        self.store.store(prefixed_key(key), value).await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "shared_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_keys_are_prefixed() {
        let store = SharedMemoryStore::default();
        let cache = SharedMemoryCache::new(store.clone());

        cache.save("schema.users", json!(["id"])).await.unwrap();

        assert_eq!(store.fetch("NotORM.schema.users").await, Some(json!(["id"])));
        assert_eq!(store.fetch("schema.users").await, None);
    }

    #[tokio::test]
    async fn test_unrelated_keys_do_not_collide() {
        let store = SharedMemoryStore::default();
        store.store("schema.users", json!("someone else's")).await;

        let cache = SharedMemoryCache::new(store);
        assert_eq!(cache.load("schema.users").await, None);
    }

    #[tokio::test]
    async fn test_falsy_values_are_present() {
        let cache = SharedMemoryCache::default();
        for (key, value) in [
            ("false", json!(false)),
            ("zero", json!(0)),
            ("empty_string", json!("")),
            ("empty_list", json!([])),
            ("null", json!(null)),
        ] {
            cache.save(key, value.clone()).await.unwrap();
            assert_eq!(cache.load(key).await, Some(value));
        }
    }
}
