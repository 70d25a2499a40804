//! Configuration for choosing and opening a cache backend

use crate::cache::{
    database::{validate_table_name, DatabaseCache},
    file::FileCache,
    include::IncludeFileCache,
    session::{Session, SessionCache},
    shared_memory::{SharedMemoryCache, SharedMemoryStore, DEFAULT_CAPACITY},
    types::DEFAULT_TABLE,
    Cache,
};
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Backend selected by a [`CacheConfig`]
///
/// The networked key-value backend is not listed: its client is supplied by
/// the caller and wrapped with [`MemcacheCache::new`](crate::cache::MemcacheCache::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Per-session state
    Session,
    /// JSON file
    File,
    /// YAML file
    Include,
    /// SQLite table
    Database,
    /// Process-wide in-memory store
    SharedMemory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Session => write!(f, "session"),
            BackendKind::File => write!(f, "file"),
            BackendKind::Include => write!(f, "include"),
            BackendKind::Database => write!(f, "database"),
            BackendKind::SharedMemory => write!(f, "shared_memory"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(BackendKind::Session),
            "file" => Ok(BackendKind::File),
            "include" => Ok(BackendKind::Include),
            "database" | "db" | "sqlite" => Ok(BackendKind::Database),
            "shared_memory" | "memory" | "apc" => Ok(BackendKind::SharedMemory),
            other => Err(CacheError::ConfigError(format!(
                "unknown cache backend {:?}",
                other
            ))),
        }
    }
}

/// Configuration for opening a cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Which backend to open
    pub backend: BackendKind,

    /// File for the file backends, database file for the database backend
    /// (in-memory database when unset)
    pub path: Option<PathBuf>,

    /// Table used by the database backend
    pub table_name: String,

    /// Maximum pooled database connections
    pub pool_max_size: u32,

    /// Entries the shared memory store holds before evicting
    pub shared_memory_capacity: u64,

    /// Create the database table on open
    pub create_schema: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::SharedMemory,
            path: None,
            table_name: DEFAULT_TABLE.to_string(),
            pool_max_size: 10,
            shared_memory_capacity: DEFAULT_CAPACITY,
            create_schema: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if matches!(self.backend, BackendKind::File | BackendKind::Include) && self.path.is_none() {
            return Err(CacheError::ConfigError(format!(
                "the {} backend needs a path",
                self.backend
            )));
        }

        if self.pool_max_size == 0 {
            return Err(CacheError::ConfigError(
                "pool_max_size must be greater than 0".to_string(),
            ));
        }

        if self.shared_memory_capacity == 0 {
            return Err(CacheError::ConfigError(
                "shared_memory_capacity must be greater than 0".to_string(),
            ));
        }

        validate_table_name(&self.table_name)
    }

    /// Read the configuration from the environment, loading `.env` first.
    ///
    /// `NOTORM_CACHE_BACKEND`, `NOTORM_CACHE_PATH`, `NOTORM_CACHE_TABLE`,
    /// `NOTORM_CACHE_POOL_SIZE` and `NOTORM_CACHE_CAPACITY` override the
    /// defaults when set.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from `lookup`, which maps a `NOTORM_CACHE_*`
    /// variable name to its value when set
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        if let Some(backend) = lookup("NOTORM_CACHE_BACKEND") {
            builder = builder.backend(backend.parse()?);
        }
        if let Some(path) = lookup("NOTORM_CACHE_PATH") {
            builder = builder.path(path);
        }
        if let Some(table) = lookup("NOTORM_CACHE_TABLE") {
            builder = builder.table_name(table);
        }
        if let Some(size) = lookup("NOTORM_CACHE_POOL_SIZE") {
            builder = builder.pool_max_size(parse_number("NOTORM_CACHE_POOL_SIZE", &size)?);
        }
        if let Some(capacity) = lookup("NOTORM_CACHE_CAPACITY") {
            builder =
                builder.shared_memory_capacity(parse_number("NOTORM_CACHE_CAPACITY", &capacity)?);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Open the configured backend.
    ///
    /// The session backend needs a live session, see
    /// [`open_with_session`](Self::open_with_session).
    pub async fn open(&self) -> Result<Arc<dyn Cache>> {
        self.validate()?;

        let cache: Arc<dyn Cache> = match self.backend {
            BackendKind::Session => {
                return Err(CacheError::ConfigError(
                    "the session backend is opened with open_with_session".to_string(),
                ))
            }
            BackendKind::File => Arc::new(FileCache::open(self.required_path()?).await),
            BackendKind::Include => Arc::new(IncludeFileCache::open(self.required_path()?).await?),
            BackendKind::Database => {
                let cache = match &self.path {
                    Some(path) => DatabaseCache::open(path, self.pool_max_size)?,
                    None => DatabaseCache::open_in_memory()?,
                }
                .with_table(self.table_name.clone())?;
                if self.create_schema {
                    cache.ensure_schema()?;
                }
                Arc::new(cache)
            }
            BackendKind::SharedMemory => Arc::new(SharedMemoryCache::new(SharedMemoryStore::new(
                self.shared_memory_capacity,
            ))),
        };

        info!("Opened {} cache", cache.backend_name());
        Ok(cache)
    }

    /// Open the configured backend, binding the session backend to `session`
    pub async fn open_with_session(&self, session: Session) -> Result<Arc<dyn Cache>> {
        match self.backend {
            BackendKind::Session => Ok(Arc::new(SessionCache::new(session))),
            _ => self.open().await,
        }
    }

    fn required_path(&self) -> Result<PathBuf> {
        self.path.clone().ok_or_else(|| {
            CacheError::ConfigError(format!("the {} backend needs a path", self.backend))
        })
    }
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| CacheError::ConfigError(format!("{} must be a number, got {:?}", name, raw)))
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    backend: Option<BackendKind>,
    path: Option<PathBuf>,
    table_name: Option<String>,
    pool_max_size: Option<u32>,
    shared_memory_capacity: Option<u64>,
    create_schema: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set the backend
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the file or database path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the database table name
    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Set the maximum number of pooled database connections
    pub fn pool_max_size(mut self, size: u32) -> Self {
        self.pool_max_size = Some(size);
        self
    }

    /// Set the shared memory store capacity
    pub fn shared_memory_capacity(mut self, capacity: u64) -> Self {
        self.shared_memory_capacity = Some(capacity);
        self
    }

    /// Create the database table on open
    pub fn create_schema(mut self, create: bool) -> Self {
        self.create_schema = Some(create);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            backend: self.backend.unwrap_or(defaults.backend),
            path: self.path.or(defaults.path),
            table_name: self.table_name.unwrap_or(defaults.table_name),
            pool_max_size: self.pool_max_size.unwrap_or(defaults.pool_max_size),
            shared_memory_capacity: self
                .shared_memory_capacity
                .unwrap_or(defaults.shared_memory_capacity),
            create_schema: self.create_schema.unwrap_or(defaults.create_schema),
        }
    }
}

/// Preset configurations for each backend
impl CacheConfig {
    /// Session-scoped cache
    pub fn session() -> Self {
        Self {
            backend: BackendKind::Session,
            ..Default::default()
        }
    }

    /// JSON file cache at `path`
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::File,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// YAML file cache at `path`
    pub fn include(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Include,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// SQLite cache in the database file at `path`
    pub fn database(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Database,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Process-wide in-memory cache
    pub fn shared_memory() -> Self {
        Self::default()
    }
}
