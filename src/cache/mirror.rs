//! In-memory mapping with a durable file mirror
//!
//! Shared by the file-backed caches. The mapping is read from disk once, by
//! the owning backend, and afterwards only written: every save that changes
//! a value rewrites the whole file.
//!
//! Writers take `flush` first and the `entries` write guard second, and drop
//! the guard before any I/O. Loads only ever take the `entries` read guard,
//! so they never wait on a disk write.

use crate::cache::types::{CacheStats, CacheValue};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::Map;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Serializes the whole mapping into the file's byte form
pub(crate) type EncodeFn = fn(&Map<String, CacheValue>) -> Result<Vec<u8>>;

pub(crate) struct Mirror {
    path: PathBuf,
    entries: RwLock<Map<String, CacheValue>>,
    /// Orders flushes of this instance; `true` while the file is behind
    /// `entries` because a flush failed
    flush: Mutex<bool>,
    last_written_at: RwLock<Option<DateTime<Utc>>>,
    encode: EncodeFn,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    skipped_writes: AtomicU64,
}

impl Mirror {
    pub(crate) fn new(path: PathBuf, entries: Map<String, CacheValue>, encode: EncodeFn) -> Self {
        Self {
            path,
            entries: RwLock::new(entries),
            flush: Mutex::new(false),
            last_written_at: RwLock::new(None),
            encode,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            skipped_writes: AtomicU64::new(0),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub(crate) async fn load(&self, key: &str) -> Option<CacheValue> {
        let value = self.entries.read().await.get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    pub(crate) async fn save(&self, key: &str, value: CacheValue) -> Result<()> {
        let mut dirty = self.flush.lock().await;

        let snapshot = {
            let mut entries = self.entries.write().await;
            if !*dirty && entries.get(key) == Some(&value) {
                debug!("Unchanged value for {}, skipping write", key);
                self.skipped_writes.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            entries.insert(key.to_string(), value);
            entries.clone()
        };

        // Cleared only once the file holds this snapshot, so a retry after a
        // failed flush writes even when the value looks unchanged.
        *dirty = true;
        let bytes = (self.encode)(&snapshot)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_locked(&path, &bytes)).await??;

        *dirty = false;
        self.writes.fetch_add(1, Ordering::Relaxed);
        *self.last_written_at.write().await = Some(Utc::now());
        debug!(
            "Rewrote {} with {} entries",
            self.path.display(),
            snapshot.len()
        );
        Ok(())
    }

    pub(crate) async fn stats(&self) -> CacheStats {
        let last_written_at = *self.last_written_at.read().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            skipped_writes: self.skipped_writes.load(Ordering::Relaxed),
            entries: self.len().await,
            last_written_at,
        }
    }
}

/// Sidecar file other processes lock before replacing `path`
pub(crate) fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Replace `path` with `bytes` while holding the exclusive lock.
///
/// The new content goes to a temporary file in the same directory and is
/// renamed over the target, so a reader opening `path` sees either the old
/// or the new mapping in full.
fn write_locked(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))?;
    lock.lock()?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    lock.unlock()?;
    Ok(())
}
