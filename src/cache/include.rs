//! Cache persisted as a readable YAML mapping
//!
//! Same save discipline as [`FileCache`](crate::cache::FileCache), but the
//! file is meant to be read and diffed by people. Parsing is strict: a file
//! that exists and does not hold a mapping is reported when the cache is
//! opened instead of being silently replaced.

use crate::cache::{
    mirror::Mirror,
    types::{CacheStats, CacheValue},
    Cache,
};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// File-backed cache with a YAML durable mirror
pub struct IncludeFileCache {
    mirror: Mirror,
}

impl IncludeFileCache {
    /// Open the cache at `path`.
    ///
    /// A missing file, an empty file and a `null` document all start an
    /// empty cache. Anything else that is not a mapping is
    /// [`CacheError::CorruptCache`].
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) => parse_snapshot(&path, &text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        info!(
            "Opened include-file cache {} with {} entries",
            path.display(),
            entries.len()
        );

        Ok(Self {
            mirror: Mirror::new(path, entries, encode_snapshot),
        })
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

fn parse_snapshot(path: &Path, text: &str) -> Result<Map<String, CacheValue>> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }

    let corrupt = |reason: String| CacheError::CorruptCache {
        path: path.to_path_buf(),
        reason,
    };

    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Object(entries)) => Ok(entries),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(corrupt(format!(
            "expected a mapping at the document root, found {}",
            kind_of(&other)
        ))),
        Err(e) => Err(corrupt(e.to_string())),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

fn encode_snapshot(entries: &Map<String, CacheValue>) -> Result<Vec<u8>> {
    Ok(serde_yaml::to_string(entries)?.into_bytes())
}

#[async_trait]
impl Cache for IncludeFileCache {
    async fn load(&self, key: &str) -> Option<CacheValue> {
        self.mirror.load(key).await
    }

    async fn save(&self, key: &str, value: CacheValue) -> Result<()> {
        self.mirror.save(key, value).await
    }

    fn backend_name(&self) -> &'static str {
        "include"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_empty_and_null() {
        let path = Path::new("cache.yaml");
        assert!(parse_snapshot(path, "").unwrap().is_empty());
        assert!(parse_snapshot(path, "  \n\t").unwrap().is_empty());
        assert!(parse_snapshot(path, "null\n").unwrap().is_empty());
        assert!(parse_snapshot(path, "~\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_mapping() {
        let text = "schema.users:\n  columns:\n  - id\n  - name\nflag: false\n";
        let entries = parse_snapshot(Path::new("cache.yaml"), text).unwrap();

        assert_eq!(entries["schema.users"], json!({"columns": ["id", "name"]}));
        assert_eq!(entries["flag"], json!(false));
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        let err = parse_snapshot(Path::new("cache.yaml"), "- 1\n- 2\n").unwrap_err();
        match err {
            CacheError::CorruptCache { reason, .. } => assert!(reason.contains("sequence")),
            other => panic!("unexpected error: {other}"),
        }

        assert!(parse_snapshot(Path::new("cache.yaml"), "1\n").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let err = parse_snapshot(Path::new("cache.yaml"), "key: [unclosed\n").unwrap_err();
        assert!(matches!(err, CacheError::CorruptCache { .. }));
    }

    #[test]
    fn test_snapshot_is_readable_yaml() {
        let mut entries = Map::new();
        entries.insert("schema.users".to_string(), json!(["id", "name"]));

        let text = String::from_utf8(encode_snapshot(&entries).unwrap()).unwrap();
        assert!(text.contains("schema.users"));
        assert_eq!(parse_snapshot(Path::new("cache.yaml"), &text).unwrap(), entries);
    }

    #[tokio::test]
    async fn test_open_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.yaml");
        std::fs::write(&path, "just a string").unwrap();

        assert!(IncludeFileCache::open(&path).await.is_err());
    }
}
