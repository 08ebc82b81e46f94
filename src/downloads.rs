//! Recent downloads history.
//!
//! A bounded, newest-first list of generated report files kept in the local
//! store so the downloads panel survives reloads. Recording an id that is
//! already present moves it to the front.

use crate::error::Result;
use crate::storage::{LocalStore, RECENT_DOWNLOADS_KEY};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

pub const MAX_RECENT_DOWNLOADS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub id: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status: DownloadStatus,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl DownloadRecord {
    pub fn new(id: impl Into<String>, file_name: impl Into<String>) -> Self {
        DownloadRecord {
            id: id.into(),
            file_name: file_name.into(),
            report_type: None,
            url: None,
            status: DownloadStatus::Pending,
            created_at: now_millis(),
        }
    }

    pub fn with_report_type(mut self, report_type: impl Into<String>) -> Self {
        self.report_type = Some(report_type.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_status(mut self, status: DownloadStatus) -> Self {
        self.status = status;
        self
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// History persisted under [`RECENT_DOWNLOADS_KEY`].
#[derive(Clone)]
pub struct RecentDownloads<S: LocalStore> {
    store: S,
    capacity: usize,
    // Serialises read-modify-write cycles.
    lock: Arc<Mutex<()>>,
}

impl<S: LocalStore> RecentDownloads<S> {
    pub fn new(store: S) -> Self {
        Self::with_capacity(store, MAX_RECENT_DOWNLOADS)
    }

    pub fn with_capacity(store: S, capacity: usize) -> Self {
        RecentDownloads {
            store,
            capacity,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Newest first. Unreadable history reads as empty.
    ///
    /// # Errors
    /// Returns `Err` if the local store fails.
    pub async fn list(&self) -> Result<Vec<DownloadRecord>> {
        Ok(self
            .store
            .get_json(RECENT_DOWNLOADS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, records: &Vec<DownloadRecord>) -> Result<()> {
        self.store.set_json(RECENT_DOWNLOADS_KEY, records).await
    }

    /// Put `record` at the front, replacing an entry with the same id and
    /// dropping the oldest beyond capacity.
    ///
    /// # Errors
    /// Returns `Err` if the local store fails.
    pub async fn record(&self, record: DownloadRecord) -> Result<Vec<DownloadRecord>> {
        let _guard = self.lock.lock().await;
        let mut records = self.list().await?;
        records.retain(|existing| existing.id != record.id);
        records.insert(0, record);
        records.truncate(self.capacity);
        self.save(&records).await?;
        Ok(records)
    }

    /// # Errors
    /// Returns `Err` if the local store fails.
    pub async fn update_status(&self, id: &str, status: DownloadStatus) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.list().await?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        record.status = status;
        self.save(&records).await?;
        Ok(true)
    }

    /// # Errors
    /// Returns `Err` if the local store fails.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.list().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records).await?;
        Ok(true)
    }

    /// # Errors
    /// Returns `Err` if the local store fails.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store.delete(RECENT_DOWNLOADS_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[tokio::test]
    async fn test_newest_first_and_dedup() {
        let downloads = RecentDownloads::new(InMemoryStore::new());
        downloads.record(DownloadRecord::new("a", "a.pdf")).await.unwrap();
        downloads.record(DownloadRecord::new("b", "b.pdf")).await.unwrap();
        downloads
            .record(DownloadRecord::new("a", "a-v2.pdf").with_status(DownloadStatus::Completed))
            .await
            .unwrap();

        let records = downloads.list().await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(records[0].file_name, "a-v2.pdf");
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let downloads = RecentDownloads::new(InMemoryStore::new());
        for i in 0..25 {
            downloads
                .record(DownloadRecord::new(format!("r{}", i), "report.xlsx"))
                .await
                .unwrap();
        }
        let records = downloads.list().await.unwrap();
        assert_eq!(records.len(), MAX_RECENT_DOWNLOADS);
        assert_eq!(records[0].id, "r24");
        assert_eq!(records[MAX_RECENT_DOWNLOADS - 1].id, "r5");
    }

    #[tokio::test]
    async fn test_update_remove_clear() {
        let downloads = RecentDownloads::new(InMemoryStore::new());
        downloads.record(DownloadRecord::new("x", "x.csv")).await.unwrap();

        assert!(downloads.update_status("x", DownloadStatus::Failed).await.unwrap());
        assert!(!downloads.update_status("y", DownloadStatus::Failed).await.unwrap());
        assert_eq!(downloads.list().await.unwrap()[0].status, DownloadStatus::Failed);

        assert!(downloads.remove("x").await.unwrap());
        assert!(!downloads.remove("x").await.unwrap());

        downloads.record(DownloadRecord::new("z", "z.csv")).await.unwrap();
        downloads.clear().await.unwrap();
        assert!(downloads.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_reads_empty() {
        let store = InMemoryStore::new();
        store.set(RECENT_DOWNLOADS_KEY, "{not json".to_string()).await.unwrap();
        let downloads = RecentDownloads::new(store);
        assert!(downloads.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = DownloadRecord::new("1", "kpi.pdf").with_report_type("kpi");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["fileName"], "kpi.pdf");
        assert_eq!(value["reportType"], "kpi");
        assert_eq!(value["status"], "pending");
        assert!(value.get("url").is_none());
    }
}
