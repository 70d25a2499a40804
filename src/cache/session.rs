//! Cache stored inside the ambient per-session state
//!
//! The session is injected as a [`Session`] handle rather than reached
//! through globals. The backend keeps no copy of its own: every call goes
//! straight to the session's `"NotORM"` entry.

use crate::cache::{
    types::{CacheValue, SESSION_NAMESPACE},
    Cache,
};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Handle to per-session associative state
///
/// Clones share the same state, the way every request handler of one
/// session sees the same data.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    state: Arc<RwLock<Map<String, Value>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an empty session with a fresh id
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(RwLock::new(Map::new())),
        }
    }

    /// Session id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read a top-level session entry
    pub async fn get(&self, name: &str) -> Option<Value> {
        self.state.read().await.get(name).cloned()
    }

    /// Replace a top-level session entry
    pub async fn insert(&self, name: impl Into<String>, value: Value) {
        self.state.write().await.insert(name.into(), value);
    }
}

/// Cache backed by [`Session`] state
#[derive(Debug, Clone)]
pub struct SessionCache {
    session: Session,
}

impl SessionCache {
    pub fn new(session: Session) -> Self {
        debug!("Session cache bound to session {}", session.id());
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl Cache for SessionCache {
    async fn load(&self, key: &str) -> Option<CacheValue> {
        let state = self.session.state.read().await;
        state
            .get(SESSION_NAMESPACE)
            .and_then(Value::as_object)
            .and_then(|namespace| namespace.get(key))
            .cloned()
    }

    async fn save(&self, key: &str, value: CacheValue) -> Result<()> {
        let mut state = self.session.state.write().await;
        let slot = state
            .entry(SESSION_NAMESPACE)
            .or_insert_with(|| Value::Object(Map::new()));

        // Whatever else lives under the namespace is not ours to keep.
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(namespace) = slot {
            namespace.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "session"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_namespace_is_absent() {
        let cache = SessionCache::new(Session::new());
        assert_eq!(cache.load("schema.users").await, None);
    }

    #[tokio::test]
    async fn test_save_writes_into_namespace() {
        let session = Session::new();
        let cache = SessionCache::new(session.clone());

        cache.save("schema.users", json!(["id", "name"])).await.unwrap();

        let namespace = session.get(SESSION_NAMESPACE).await.unwrap();
        assert_eq!(namespace, json!({ "schema.users": ["id", "name"] }));
        assert_eq!(cache.load("schema.users").await, Some(json!(["id", "name"])));
        assert_eq!(cache.load("schema.orders").await, None);
    }

    #[tokio::test]
    async fn test_unrelated_session_entries_untouched() {
        let session = Session::new();
        session.insert("user_id", json!(42)).await;

        let cache = SessionCache::new(session.clone());
        cache.save("k", json!(1)).await.unwrap();

        assert_eq!(session.get("user_id").await, Some(json!(42)));
    }

    #[tokio::test]
    async fn test_non_mapping_namespace() {
        let session = Session::new();
        session.insert(SESSION_NAMESPACE, json!("garbage")).await;

        let cache = SessionCache::new(session);
        assert_eq!(cache.load("k").await, None);

        cache.save("k", json!(false)).await.unwrap();
        assert_eq!(cache.load("k").await, Some(json!(false)));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let first = SessionCache::new(Session::new());
        let second = SessionCache::new(Session::new());

        first.save("k", json!("first")).await.unwrap();
        assert_eq!(second.load("k").await, None);
    }
}
