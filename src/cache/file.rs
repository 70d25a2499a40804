//! Cache persisted as a JSON object in a single file
//!
//! The file is read once when the cache is opened. Afterwards the in-memory
//! mapping answers every load, so another process writing the same file is
//! not seen until the cache is reopened.

use crate::cache::{
    mirror::Mirror,
    types::{CacheStats, CacheValue},
    Cache,
};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Map;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File-backed cache with a JSON durable mirror
pub struct FileCache {
    mirror: Mirror,
}

impl FileCache {
    /// Open the cache at `path`.
    ///
    /// A missing, unreadable or corrupt file starts an empty cache; the next
    /// state-changing save replaces it.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_snapshot(&path).await;
        info!(
            "Opened file cache {} with {} entries",
            path.display(),
            entries.len()
        );

        Self {
            mirror: Mirror::new(path, entries, encode_snapshot),
        }
    }

    pub fn path(&self) -> &Path {
        self.mirror.path()
    }

    pub async fn len(&self) -> usize {
        self.mirror.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        self.mirror.stats().await
    }
}

async fn read_snapshot(path: &Path) -> Map<String, CacheValue> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Map::new(),
        Err(e) => {
            warn!("Cannot read cache file {}: {}", path.display(), e);
            return Map::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
            Map::new()
        }
    }
}

fn encode_snapshot(entries: &Map<String, CacheValue>) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(entries)?)
}

#[async_trait]
impl Cache for FileCache {
    async fn load(&self, key: &str) -> Option<CacheValue> {
        self.mirror.load(key).await
    }

    async fn save(&self, key: &str, value: CacheValue) -> Result<()> {
        self.mirror.save(key, value).await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
