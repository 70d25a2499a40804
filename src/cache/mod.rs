//! # Cache Contract and Backends
//!
//! Everything the ORM layer needs from a cache is the [`Cache`] trait: a
//! `load` that never fails and a `save` that reports real failures. The
//! backends trade durability, consistency and dependencies differently.
//!
//! ## Backends
//!
//! - [`SessionCache`]: entries under `"NotORM"` in an injected [`Session`]
//! - [`FileCache`]: in-memory mapping mirrored to a JSON file
//! - [`IncludeFileCache`]: in-memory mapping mirrored to a YAML file
//! - [`DatabaseCache`]: `notorm(id, data)` table in SQLite
//! - [`MemcacheCache`]: pass-through to an injected [`KeyValueStore`]
//! - [`SharedMemoryCache`]: pass-through to a process-wide [`SharedMemoryStore`]
//!
//! ## Errors
//!
//! A miss, an unreachable store or an undecodable value all load as `None`.
//! `save` swallows only the duplicate-key race of [`DatabaseCache`];
//! everything else comes back as an error.
//!
//! ## Example
//!
//! ```rust
//! use notorm_cache::cache::{Cache, CacheExt, FileCache};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = FileCache::open("/tmp/notorm-cache.json").await;
//!
//! cache.save_as("schema.users", &vec!["id", "name"]).await?;
//!
//! let columns: Option<Vec<String>> = cache.load_as("schema.users").await;
//! assert_eq!(columns, Some(vec!["id".to_string(), "name".to_string()]));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod database;
pub mod file;
pub mod include;
pub mod memcache;
mod mirror;
pub mod session;
pub mod shared_memory;
pub mod types;

pub use config::{BackendKind, CacheConfig, CacheConfigBuilder};
pub use database::DatabaseCache;
pub use file::FileCache;
pub use include::IncludeFileCache;
pub use memcache::{KeyValueStore, MemcacheCache};
pub use session::{Session, SessionCache};
pub use shared_memory::{SharedMemoryCache, SharedMemoryStore};
pub use types::{prefixed_key, CacheKey, CacheStats, CacheValue, KEY_PREFIX, SESSION_NAMESPACE};

use crate::error::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Loading and saving derived data.
///
/// It is only a cache: `load` never waits for a `save` in progress and may
/// return older data than the latest write made elsewhere.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Stored value for `key`, or `None` when there is none or it cannot be
    /// retrieved
    async fn load(&self, key: &str) -> Option<CacheValue>;

    /// Store `value` under `key`
    async fn save(&self, key: &str, value: CacheValue) -> Result<()>;

    /// Short backend identifier for logs
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<C: Cache + ?Sized> Cache for Arc<C> {
    async fn load(&self, key: &str) -> Option<CacheValue> {
        (**self).load(key).await
    }

    async fn save(&self, key: &str, value: CacheValue) -> Result<()> {
        (**self).save(key, value).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Typed access on top of any [`Cache`]
#[async_trait]
pub trait CacheExt: Cache {
    /// Load and convert; a value of the wrong shape counts as absent
    async fn load_as<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let value = self.load(key).await?;
        match codec::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(
                    "Cached value {} in {} has an unexpected shape: {}",
                    key,
                    self.backend_name(),
                    e
                );
                None
            }
        }
    }

    /// Convert and save
    async fn save_as<T: Serialize + Sync + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = codec::to_value(value)?;
        self.save(key, value).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}
