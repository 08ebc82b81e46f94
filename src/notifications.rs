//! Notification feed.
//!
//! Wraps the notifications collaborator with the behaviour the notification
//! centre relies on:
//!
//! - `list` never fails on connectivity problems; it serves the cached page
//!   (or an empty one) instead.
//! - `categories` is fetched once per session.
//! - `mark_as_read` / `mark_all_as_read` update the unread counter
//!   optimistically and roll back if the write fails.
//! - Dismissed notifications are remembered locally and hidden from lists.

use crate::api::{Api, Mutation};
use crate::config::QueryOptions;
use crate::endpoints::notifications::{self as endpoints, NotificationFilters};
use crate::entity::EntityGroup;
use crate::envelope::Paginated;
use crate::error::{Error, Result};
use crate::key::{self, CacheKey};
use crate::observer::{Observer, Subscription};
use crate::polling::PollingOptions;
use crate::storage::{LocalStore, DISMISSED_NOTIFICATIONS_KEY};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, alias = "read")]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

pub type NotificationPage = Paginated<Notification>;

/// Accept both `{items, pagination}` and a bare array.
fn decode_page(value: Value) -> Result<NotificationPage> {
    let page = match value {
        Value::Null => NotificationPage::default(),
        Value::Array(items) => NotificationPage {
            items: serde_json::from_value(Value::Array(items))
                .map_err(|e| Error::DeserializationError(e.to_string()))?,
            pagination: None,
        },
        other => serde_json::from_value(other).map_err(|e| Error::DeserializationError(e.to_string()))?,
    };
    Ok(page)
}

pub struct NotificationFeed<T: Transport, S: LocalStore> {
    api: Api<T>,
    store: S,
}

impl<T: Transport, S: LocalStore> NotificationFeed<T, S> {
    pub fn new(api: Api<T>, store: S) -> Self {
        NotificationFeed { api, store }
    }

    pub fn api(&self) -> &Api<T> {
        &self.api
    }

    /// One page of notifications, locally dismissed ones removed unless
    /// `filters.dismissed` asks for them.
    ///
    /// Connectivity failures (network, 5xx, 429) resolve to the cached page
    /// for the same arguments, or an empty page.
    ///
    /// # Errors
    /// Returns client-side errors (4xx, bad filters) and storage errors.
    pub async fn list(
        &self,
        page: u32,
        limit: u32,
        unread_only: bool,
        filters: &NotificationFilters,
    ) -> Result<NotificationPage> {
        let query = endpoints::list(page, limit, unread_only, filters)?;
        let mut result = match self.api.query::<Value>(&query).await {
            Ok(value) => decode_page(value)?,
            Err(error) if error.is_retryable() => {
                warn!("Notifications unavailable, serving cached page: {}", error);
                self.cached_page(&query.key)
            }
            Err(error) => return Err(error),
        };

        if filters.dismissed != Some(true) {
            let dismissed = self.dismissed().await?;
            result.items.retain(|n| !dismissed.contains(&n.id));
        }
        Ok(result)
    }

    fn cached_page(&self, key: &CacheKey) -> NotificationPage {
        self.api
            .client()
            .peek(key)
            .and_then(|snapshot| snapshot.value)
            .and_then(|value| decode_page(value).ok())
            .unwrap_or_default()
    }

    /// Watch one page, polling it while subscribed.
    ///
    /// # Errors
    /// Returns `Err` if the filters cannot be encoded.
    pub fn subscribe(
        &self,
        page: u32,
        limit: u32,
        unread_only: bool,
        filters: &NotificationFilters,
        polling: PollingOptions,
        observer: Observer,
    ) -> Result<Subscription> {
        let query = endpoints::list(page, limit, unread_only, filters)?
            .with_options(QueryOptions::default().with_polling(polling));
        Ok(self.api.subscribe(&query, observer))
    }

    /// Category names; fetched once per session.
    ///
    /// # Errors
    /// Returns the fetch error on the first call of a session.
    pub async fn categories(&self) -> Result<Vec<String>> {
        self.api.query(&endpoints::categories()).await
    }

    /// # Errors
    /// Returns the fetch error.
    pub async fn unread_count(&self) -> Result<u64> {
        self.api.query(&endpoints::unread_count()).await
    }

    /// # Errors
    /// Returns the write's error after restoring the unread counter.
    pub async fn mark_as_read(&self, id: i64) -> Result<Value> {
        self.write_through(&endpoints::mark_as_read(id), |count| count.saturating_sub(1))
            .await
    }

    /// # Errors
    /// Returns the write's error after restoring the unread counter.
    pub async fn mark_all_as_read(&self) -> Result<Value> {
        self.write_through(&endpoints::mark_all_as_read(), |_| 0).await
    }

    /// Apply `unread` to the cached counter, run the write, then refresh
    /// lists and the counter. Session-cached categories are left alone.
    async fn write_through<F>(&self, mutation: &Mutation, unread: F) -> Result<Value>
    where
        F: FnOnce(u64) -> u64,
    {
        let client = self.api.client();
        let counter = key::notification_unread_count();
        let previous = client.peek(&counter).and_then(|snapshot| snapshot.value);
        let written = previous
            .as_ref()
            .and_then(Value::as_u64)
            .map(|count| client.write(&counter, json!(unread(count))));

        match self.api.execute(mutation).await {
            Ok(value) => {
                client.invalidate_prefix(&EntityGroup::Notifications.keys().lists());
                client.invalidate_key(&counter);
                Ok(value)
            }
            Err(error) => {
                if let Some(generation) = written {
                    client.rollback(&counter, generation, previous);
                }
                Err(error)
            }
        }
    }

    /// Hide `id` from future lists on this device.
    ///
    /// # Errors
    /// Returns `Err` if the local store cannot be written.
    pub async fn dismiss(&self, id: i64) -> Result<()> {
        let mut dismissed = self.dismissed().await?;
        if dismissed.insert(id) {
            self.store
                .set_json(DISMISSED_NOTIFICATIONS_KEY, &dismissed)
                .await?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns `Err` if the local store cannot be written.
    pub async fn restore(&self, id: i64) -> Result<()> {
        let mut dismissed = self.dismissed().await?;
        if dismissed.remove(&id) {
            self.store
                .set_json(DISMISSED_NOTIFICATIONS_KEY, &dismissed)
                .await?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns `Err` if the local store cannot be read.
    pub async fn is_dismissed(&self, id: i64) -> Result<bool> {
        Ok(self.dismissed().await?.contains(&id))
    }

    /// # Errors
    /// Returns `Err` if the local store cannot be read.
    pub async fn dismissed(&self) -> Result<BTreeSet<i64>> {
        Ok(self
            .store
            .get_json(DISMISSED_NOTIFICATIONS_KEY)
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_page_shapes() {
        let bare = decode_page(json!([{"id": 1, "title": "Low stock"}])).unwrap();
        assert_eq!(bare.items.len(), 1);
        assert!(bare.pagination.is_none());

        let folded = decode_page(json!({
            "items": [{"id": 2, "title": "Shipment arrived", "read": true}],
            "pagination": {"total": 1, "page": 1, "limit": 20, "totalPages": 1}
        }))
        .unwrap();
        assert!(folded.items[0].is_read);
        assert_eq!(folded.pagination.unwrap().total, 1);

        assert!(decode_page(Value::Null).unwrap().items.is_empty());
        assert!(decode_page(json!("nope")).is_err());
    }
}
