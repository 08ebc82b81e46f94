//! In-memory local store (default, thread-safe).
//!
//! Uses DashMap for concurrent access with per-key sharding.

use super::LocalStore;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe in-memory local store.
///
/// Clones share the same map.
///
/// ```
/// use tlm_cache::storage::{InMemoryStore, LocalStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> tlm_cache::Result<()> {
/// let store = InMemoryStore::new();
/// store.set("authToken", "abc".to_string()).await?;
/// assert_eq!(store.get("authToken").await?.as_deref(), Some("abc"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    map: Arc<DashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            map: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl LocalStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.map.insert(key.to_string(), value);
        debug!("✓ Local SET {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.map.remove(key);
        debug!("✓ Local DELETE {}", key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.map.iter().map(|e| e.key().clone()).collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.map.clear();
        warn!("⚠ Local CLEAR_ALL executed - all local state cleared!");
        Ok(())
    }
}
