//! Cache passed through to an external key-value service
//!
//! The service client is injected through [`KeyValueStore`]. Values travel as
//! codec bytes, so a stored `false`, `0`, `""` or `[]` comes back as itself
//! and only the store's own "not found" answer means absent.

use crate::cache::{
    codec,
    types::{prefixed_key, CacheValue},
    Cache,
};
use crate::error::Result;
use async_trait::async_trait;
use tracing::warn;

/// Byte-level client for a shared key-value service (memcached, redis, ...)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the bytes stored under `key`; `Ok(None)` when the key is unknown
    /// or has expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, overwriting whatever was there
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
}

/// Cache over a [`KeyValueStore`], keys prefixed with `NotORM.`
pub struct MemcacheCache<S> {
    store: S,
}

impl<S: KeyValueStore> MemcacheCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: KeyValueStore> Cache for MemcacheCache<S> {
    async fn load(&self, key: &str) -> Option<CacheValue> {
        let bytes = match self.store.get(&prefixed_key(key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Store lookup for {} failed: {}", key, e);
                return None;
            }
        };

        match codec::decode(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable store value {}: {}", key, e);
                None
            }
        }
    }

    async fn save(&self, key: &str, value: CacheValue) -> Result<()> {
        let bytes = codec::encode(&value)?;
        self.store.set(&prefixed_key(key), bytes).await
    }

    fn backend_name(&self) -> &'static str {
        "memcache"
    }
}
