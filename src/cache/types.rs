//! Core type definitions for the cache system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type - opaque, compared by string equality only
pub type CacheKey = String;

/// Cache value type - any scalar, sequence or mapping
pub type CacheValue = serde_json::Value;

/// Prefix put in front of every key sent to a shared key-value store
pub const KEY_PREFIX: &str = "NotORM.";

/// Top-level session entry holding the session backend's mapping
pub const SESSION_NAMESPACE: &str = "NotORM";

/// Default table used by the database backend
pub const DEFAULT_TABLE: &str = "notorm";

/// Statistics for the file-backed caches
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheStats {
    /// Loads answered from the in-memory mapping
    pub hits: u64,

    /// Loads for keys never saved
    pub misses: u64,

    /// Saves that rewrote the durable mirror
    pub writes: u64,

    /// Saves skipped because the value was unchanged
    pub skipped_writes: u64,

    /// Number of keys currently held
    pub entries: usize,

    /// When the mirror was last rewritten by this instance
    pub last_written_at: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Share of saves that did not touch the disk, as a percentage
    pub fn write_avoidance_rate(&self) -> f64 {
        let total = self.writes + self.skipped_writes;
        if total == 0 {
            0.0
        } else {
            (self.skipped_writes as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, writes: {}, skipped_writes: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.writes,
            self.skipped_writes
        )
    }
}

/// Prefix a caller key for a shared store
pub fn prefixed_key(key: &str) -> String {
    format!("{}{}", KEY_PREFIX, key)
}
