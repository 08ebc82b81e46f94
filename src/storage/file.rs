//! JSON-file local store, for headless clients that outlive one process.
//!
//! The whole store is a single JSON object on disk. Writes go through a
//! temporary file and a rename so a crash never leaves half a document.

use super::LocalStore;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// File-backed local store.
#[derive(Clone)]
pub struct FileStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Create a store backed by `path`. The file is created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileStore {
            path: Arc::new(path.as_ref().to_path_buf()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(self.path.as_ref()).await {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => Ok(map),
                Err(e) => {
                    warn!(
                        "Local store {} is corrupt, starting empty: {}",
                        self.path.display(),
                        e
                    );
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let text = serde_json::to_string_pretty(map)
            .map_err(|e| crate::error::Error::SerializationError(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, self.path.as_ref()).await?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value);
        self.persist(&map).await?;
        debug!("✓ File SET {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(key).is_some() {
            self.persist(&map).await?;
        }
        debug!("✓ File DELETE {}", key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.persist(&BTreeMap::new()).await?;
        warn!("⚠ File CLEAR_ALL executed on {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tlm-cache-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let path = temp_path("persist");
        let store = FileStore::new(&path);
        store
            .set("authToken", "abc".to_string())
            .await
            .expect("Failed to set");

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get("authToken").await.expect("Failed to get").as_deref(),
            Some("abc")
        );

        reopened.clear_all().await.expect("Failed to clear");
        assert!(store.keys().await.expect("Failed to list").is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_empty() {
        let store = FileStore::new(temp_path("missing-never-written"));
        assert_eq!(store.get("anything").await.expect("Failed to get"), None);
    }
}
