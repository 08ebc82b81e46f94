//! Persisted local state: a small key-value store outside the query cache.
//!
//! Holds the auth token, the bounded recent-downloads history and the
//! user-dismissed notification flags. Values are JSON text.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

pub mod inmemory;
#[cfg(feature = "file-store")]
pub mod file;

pub use inmemory::InMemoryStore;
#[cfg(feature = "file-store")]
pub use file::FileStore;

/// Storage key of the bearer token.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Storage key of the recent downloads list.
pub const RECENT_DOWNLOADS_KEY: &str = "recentDownloads";

/// Storage key of the dismissed notification ids.
pub const DISMISSED_NOTIFICATIONS_KEY: &str = "dismissedNotifications";

/// Trait for local key-value stores.
///
/// All methods use `&self`; implementations use interior mutability so a
/// store can be cloned into the session, downloads and notification helpers.
/// Returned futures are `Send` so store calls can run inside spawned tasks.
/// Implementations may write the methods as plain `async fn`.
pub trait LocalStore: Send + Sync + Clone {
    /// Read a value.
    ///
    /// # Errors
    /// Returns `Err` if the underlying storage cannot be read.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns `Err` if the underlying storage cannot be written.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns `Err` if the underlying storage cannot be written.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// All stored keys.
    ///
    /// # Errors
    /// Returns `Err` if the underlying storage cannot be read.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Remove everything.
    ///
    /// # Errors
    /// Returns `Err` if the underlying storage cannot be written.
    fn clear_all(&self) -> impl Future<Output = Result<()>> + Send {
        async move {
            for key in self.keys().await? {
                self.delete(&key).await?;
            }
            Ok(())
        }
    }

    /// Read and decode a JSON value. Corrupt entries read as absent.
    ///
    /// # Errors
    /// Returns `Err` if the underlying storage cannot be read.
    fn get_json<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<T>>> + Send {
        async move {
            match self.get(key).await? {
                Some(text) => match serde_json::from_str(&text) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        warn!("Discarding corrupt local entry {}: {}", key, e);
                        Ok(None)
                    }
                },
                None => Ok(None),
            }
        }
    }

    /// Encode and write a JSON value.
    ///
    /// # Errors
    /// Returns `Err` if encoding or the write fails.
    fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            let text = serde_json::to_string(value)
                .map_err(|e| crate::error::Error::SerializationError(e.to_string()))?;
            self.set(key, text).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_clear_all_and_json_helpers() {
        let store = InMemoryStore::new();
        store
            .set_json("flags", &vec![1, 2, 3])
            .await
            .expect("Failed to set");
        let flags: Option<Vec<u32>> = store.get_json("flags").await.expect("Failed to get");
        assert_eq!(flags, Some(vec![1, 2, 3]));

        store
            .set("broken", "{not json".to_string())
            .await
            .expect("Failed to set");
        let broken: Option<Vec<u32>> = store.get_json("broken").await.expect("Failed to get");
        assert!(broken.is_none());
    }

    #[tokio::test]
    async fn test_store_calls_run_in_spawned_tasks() {
        let store = InMemoryStore::new();
        store
            .set(AUTH_TOKEN_KEY, "token".to_string())
            .await
            .expect("Failed to set");

        let spawned = store.clone();
        tokio::spawn(async move {
            spawned.delete(AUTH_TOKEN_KEY).await?;
            spawned.clear_all().await
        })
        .await
        .expect("Task panicked")
        .expect("Failed to delete");
        assert!(store.is_empty());
    }
}
