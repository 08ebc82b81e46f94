//! Observers of cache entries.
//!
//! An observer is a callback invoked with an [`EntrySnapshot`] whenever the
//! entry it watches changes status or value. [`QueryClient::subscribe`]
//! returns a [`Subscription`]; dropping it detaches the observer, stops
//! polling once the last observer leaves and starts the gc grace period.
//!
//! [`QueryClient::subscribe`]: crate::QueryClient::subscribe

use crate::client::ClientInner;
use crate::key::CacheKey;
use crate::store::EntrySnapshot;
use std::fmt;
use std::sync::{Arc, Weak};

/// Callback receiving entry updates.
///
/// Observers run outside any cache lock and may call back into the client.
pub type Observer = Arc<dyn Fn(&EntrySnapshot) + Send + Sync>;

/// Wrap a closure as an [`Observer`].
pub fn observer<F>(f: F) -> Observer
where
    F: Fn(&EntrySnapshot) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Observer that ignores every update; keeps an entry alive and polled.
pub fn keep_alive() -> Observer {
    Arc::new(|_: &EntrySnapshot| {})
}

/// Live attachment of one observer to one key.
#[must_use = "dropping a Subscription detaches the observer"]
pub struct Subscription {
    client: Weak<ClientInner>,
    key: CacheKey,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(client: Weak<ClientInner>, key: CacheKey, id: u64) -> Self {
        Subscription { client, key, id }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Current state of the observed entry; `None` once the client is gone
    /// or the entry was removed.
    pub fn snapshot(&self) -> Option<EntrySnapshot> {
        self.client
            .upgrade()
            .and_then(|client| client.snapshot(&self.key))
    }

    /// Detach now; same as dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(client) = self.client.upgrade() {
            client.unsubscribe(&self.key, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
