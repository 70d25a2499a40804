//! Cache stored in a two-column SQL table
//!
//! Schema: `notorm(id TEXT PRIMARY KEY, data BLOB NOT NULL)`, with `data`
//! holding codec bytes.
//!
//! Saves are an optimistic upsert without a native `UPSERT`/`REPLACE`: an
//! `UPDATE` by key, then an `INSERT` when nothing was updated. Two first
//! writers can both reach the `INSERT`; the loser gets a duplicate-key
//! failure, which is swallowed because the row now exists. No transaction
//! wraps the pair.

use crate::cache::{
    codec,
    types::{CacheValue, DEFAULT_TABLE},
    Cache,
};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::rusqlite::{self, ffi, params, ErrorCode, OptionalExtension};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache backed by a SQLite table
#[derive(Clone)]
pub struct DatabaseCache {
    pool: Pool<SqliteConnectionManager>,
    table: String,
}

impl DatabaseCache {
    /// Wrap an existing pool, using the default `notorm` table
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self {
            pool,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Open a pool over the database file at `path`
    pub fn open(path: &Path, max_size: u32) -> Result<Self> {
        debug!("Opening cache database {:?}", path);
        // WAL lets readers go on against the last commit while a writer
        // holds the database lock.
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            Ok(())
        });
        let pool = Pool::builder().max_size(max_size).build(manager)?;
        info!("Database cache pool ready for {}", path.display());
        Ok(Self::new(pool))
    }

    /// Open a private in-memory database.
    ///
    /// The pool is capped at one connection: every new SQLite in-memory
    /// connection would otherwise see its own empty database.
    pub fn open_in_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())?;
        Ok(Self::new(pool))
    }

    /// Use `table` instead of `notorm`
    pub fn with_table(mut self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        self.table = table;
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pool(&self) -> &Pool<SqliteConnectionManager> {
        &self.pool
    }

    /// Create the cache table if it does not exist yet
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT NOT NULL PRIMARY KEY, data BLOB NOT NULL)",
            self.table
        ))?;
        debug!("Ensured cache table {}", self.table);
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!("SELECT data FROM {} WHERE id = ?", self.table))?;
        let data = stmt
            .query_row([key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(data)
    }

    fn upsert(&self, key: &str, data: &[u8]) -> Result<()> {
        let conn = self.pool.get()?;

        let updated = conn.execute(
            &format!("UPDATE {} SET data = ? WHERE id = ?", self.table),
            params![data, key],
        )?;
        if updated > 0 {
            return Ok(());
        }

        match conn.execute(
            &format!("INSERT INTO {} (data, id) VALUES (?, ?)", self.table),
            params![data, key],
        ) {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                debug!("Lost insert race for {}, keeping existing row", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether `error` is a primary-key or unique constraint violation.
///
/// This is the only engine-specific piece of the upsert; other engines
/// report the same condition through their own codes (SQLSTATE 23000/23505).
pub fn is_duplicate_key(error: &rusqlite::Error) -> bool {
    match error {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass
pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(CacheError::ConfigError(format!(
            "invalid table name {:?}: use letters, digits and underscores",
            table
        )))
    }
}

#[async_trait]
impl Cache for DatabaseCache {
    async fn load(&self, key: &str) -> Option<CacheValue> {
        let cache = self.clone();
        let owned_key = key.to_string();
        let fetched = tokio::task::spawn_blocking(move || cache.fetch(&owned_key))
            .await
            .map_err(CacheError::from)
            .and_then(|result| result);

        let data = match fetched {
            Ok(Some(data)) if !data.is_empty() => data,
            Ok(_) => return None,
            Err(e) => {
                warn!("Cache lookup for {} failed: {}", key, e);
                return None;
            }
        };

        match codec::decode(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable row {}: {}", key, e);
                None
            }
        }
    }

    async fn save(&self, key: &str, value: CacheValue) -> Result<()> {
        let data = codec::encode(&value)?;
        let cache = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || cache.upsert(&key, &data)).await?
    }

    fn backend_name(&self) -> &'static str {
        "database"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> DatabaseCache {
        let cache = DatabaseCache::open_in_memory().unwrap();
        cache.ensure_schema().unwrap();
        cache
    }

    fn row_count(cache: &DatabaseCache, key: &str) -> i64 {
        let conn = cache.pool().get().unwrap();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE id = ?", cache.table()),
            [key],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_insert_is_recognised() {
        let cache = cache();
        let conn = cache.pool().get().unwrap();
        conn.execute("INSERT INTO notorm (data, id) VALUES (x'01', 'k')", [])
            .unwrap();

        let err = conn
            .execute("INSERT INTO notorm (data, id) VALUES (x'02', 'k')", [])
            .unwrap_err();
        assert!(is_duplicate_key(&err));
    }

    #[test]
    fn test_other_errors_are_not_duplicates() {
        let cache = cache();
        let conn = cache.pool().get().unwrap();

        let missing_table = conn
            .execute("INSERT INTO nowhere (data, id) VALUES (x'01', 'k')", [])
            .unwrap_err();
        assert!(!is_duplicate_key(&missing_table));

        let not_null = conn
            .execute("INSERT INTO notorm (data, id) VALUES (NULL, 'k')", [])
            .unwrap_err();
        assert!(!is_duplicate_key(&not_null));
    }

    #[tokio::test]
    async fn test_insert_race_loser_is_swallowed() {
        let cache = cache();
        let conn = cache.pool().get().unwrap();
        conn.execute(
            "INSERT INTO notorm (data, id) VALUES (?, ?)",
            params![codec::encode(&json!("winner")).unwrap(), "k"],
        )
        .unwrap();
        // The UPDATE now touches no row even though one exists, which is
        // what a writer sees when another one inserts right after it.
        conn.execute_batch(
            "CREATE TRIGGER hide_row BEFORE UPDATE ON notorm BEGIN SELECT RAISE(IGNORE); END",
        )
        .unwrap();
        drop(conn);

        cache.save("k", json!("loser")).await.unwrap();

        assert_eq!(cache.load("k").await, Some(json!("winner")));
        assert_eq!(row_count(&cache, "k"), 1);
    }

    #[tokio::test]
    async fn test_update_wins_when_row_exists() {
        let cache = cache();
        cache.save("k", json!(1)).await.unwrap();
        cache.save("k", json!(2)).await.unwrap();

        assert_eq!(cache.load("k").await, Some(json!(2)));
        assert_eq!(row_count(&cache, "k"), 1);
    }

    #[tokio::test]
    async fn test_empty_blob_is_absent() {
        let cache = cache();
        let conn = cache.pool().get().unwrap();
        conn.execute("INSERT INTO notorm (data, id) VALUES (x'', 'k')", [])
            .unwrap();
        drop(conn);

        assert_eq!(cache.load("k").await, None);
    }

    #[tokio::test]
    async fn test_missing_table_load_is_absent_save_fails() {
        let cache = DatabaseCache::open_in_memory().unwrap();

        assert_eq!(cache.load("k").await, None);
        let err = cache.save("k", json!(1)).await.unwrap_err();
        assert!(matches!(err, CacheError::Database(_)));
    }

    #[tokio::test]
    async fn test_load_does_not_wait_for_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let cache = DatabaseCache::open(&path, 2).unwrap();
        cache.ensure_schema().unwrap();
        cache.save("k", json!(1)).await.unwrap();

        let writer = rusqlite::Connection::open(&path).unwrap();
        writer
            .execute_batch("BEGIN EXCLUSIVE; UPDATE notorm SET data = x'00' WHERE id = 'k';")
            .unwrap();

        let started = std::time::Instant::now();
        let value = cache.load("k").await;
        let waited = started.elapsed();

        writer.execute_batch("ROLLBACK;").unwrap();
        assert!(waited < Duration::from_secs(1), "load waited {:?}", waited);
        assert_eq!(value, Some(json!(1)));
    }

    #[test]
    fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatabaseCache::open(&dir.path().join("cache.db"), 1).unwrap();
        let conn = cache.pool().get().unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("notorm").is_ok());
        assert!(validate_table_name("_cache_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2cache").is_err());
        assert!(validate_table_name("cache; DROP TABLE users").is_err());
    }

    #[tokio::test]
    async fn test_custom_table() {
        let cache = DatabaseCache::open_in_memory()
            .unwrap()
            .with_table("orm_cache")
            .unwrap();
        cache.ensure_schema().unwrap();

        cache.save("k", json!({"a": [1, 2]})).await.unwrap();
        assert_eq!(cache.load("k").await, Some(json!({"a": [1, 2]})));
        assert_eq!(cache.table(), "orm_cache");
    }
}
