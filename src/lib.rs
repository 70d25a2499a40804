//! # notorm-cache
//!
//! Cache backends for memoizing ORM reflection data (table columns, primary
//! keys, relations) across requests or processes.
//!
//! ## Features
//!
//! - One async [`Cache`] contract: `load` never fails, `save` reports real failures
//! - Session, JSON file, YAML file, SQLite and shared key-value store backends
//! - Redundant disk writes skipped when a saved value is unchanged
//! - Duplicate-key races between first writers tolerated in the SQL backend
//! - Backend selection from configuration or the environment
//!
//! ## File Cache
//!
//! ```no_run
//! use notorm_cache::{Cache, FileCache};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = FileCache::open("/var/cache/notorm.json").await;
//!
//!     cache.save("schema.users", json!({"columns": ["id", "name"]})).await?;
//!     println!("Cached: {:?}", cache.load("schema.users").await);
//!     Ok(())
//! }
//! ```
//!
//! ## Database Cache
//!
//! ```no_run
//! use notorm_cache::{Cache, DatabaseCache};
//! use serde_json::json;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = DatabaseCache::open(Path::new("app.db"), 10)?;
//!     cache.ensure_schema()?;
//!
//!     cache.save("schema.orders", json!(["id", "user_id", "total"])).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configured Backend
//!
//! ```no_run
//! use notorm_cache::CacheConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // NOTORM_CACHE_BACKEND=include NOTORM_CACHE_PATH=cache.yaml
//!     let cache = CacheConfig::from_env()?.open().await?;
//!
//!     if cache.load("schema.users").await.is_none() {
//!         println!("Cold cache ({})", cache.backend_name());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    prefixed_key, BackendKind, Cache, CacheConfig, CacheConfigBuilder, CacheExt, CacheKey,
    CacheStats, CacheValue, DatabaseCache, FileCache, IncludeFileCache, KeyValueStore,
    MemcacheCache, Session, SessionCache, SharedMemoryCache, SharedMemoryStore, KEY_PREFIX,
    SESSION_NAMESPACE,
};
pub use error::{CacheError, Result};
