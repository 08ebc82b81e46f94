//! Per-key cache state.
//!
//! Each [`CacheKey`] owns one [`Slot`]: the public [`CacheEntry`] (value,
//! status, freshness, generation) plus the client's bookkeeping for that key
//! (registered query function, observers, the in-flight request, the poller).
//!
//! Status transitions:
//!
//! ```text
//! Idle ──fetch──▶ Loading ──ok──▶ Success ──invalidate/expire──▶ (stale) ──fetch──▶ Loading
//!                    └──err──▶ Error ──fetch──▶ Loading
//! ```
//!
//! Every fetch takes a fresh generation number. A response is applied only
//! if its generation is still the latest issued for the key.

use crate::entity::EntityGroup;
use crate::error::{Error, Result};
use crate::key::CacheKey;
use crate::observer::Observer;
use crate::polling::PollingOptions;
use dashmap::DashMap;
use futures::future::{AbortHandle, BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Zero-argument async producer bound to one collaborator API call.
pub type QueryFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap an async closure as a [`QueryFn`].
///
/// ```
/// use tlm_cache::store::query_fn;
/// use serde_json::json;
///
/// let f = query_fn(|| async { Ok(json!({"total": 3})) });
/// # let _ = f;
/// ```
pub fn query_fn<F, Fut>(f: F) -> QueryFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<Value>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Cached state of one key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Option<Value>,
    pub error: Option<Error>,
    pub status: FetchStatus,
    pub fetched_at: Option<Instant>,
    pub stale_after: Duration,
    /// Set by invalidation; cleared by the next stored value.
    pub invalidated: bool,
    /// Latest generation issued for this key.
    pub generation: u64,
    /// Generation that produced `value`.
    pub value_generation: u64,
    pub observer_count: usize,
}

impl CacheEntry {
    pub fn new(stale_after: Duration) -> Self {
        CacheEntry {
            value: None,
            error: None,
            status: FetchStatus::Idle,
            fetched_at: None,
            stale_after,
            invalidated: false,
            generation: 0,
            value_generation: 0,
            observer_count: 0,
        }
    }

    /// Stale when never fetched, invalidated, or older than `stale_after`.
    pub fn is_stale(&self, now: Instant) -> bool {
        if self.invalidated {
            return true;
        }
        match self.fetched_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.stale_after,
        }
    }

    pub(crate) fn store_value(&mut self, value: Value, generation: u64) {
        self.value = Some(value);
        self.error = None;
        self.status = FetchStatus::Success;
        self.fetched_at = Some(Instant::now());
        self.invalidated = false;
        self.value_generation = generation;
    }

    /// Status to fall back to when a fetch is abandoned.
    pub(crate) fn settled_status(&self) -> FetchStatus {
        match (&self.value, &self.error) {
            (Some(_), _) => FetchStatus::Success,
            (None, Some(_)) => FetchStatus::Error,
            (None, None) => FetchStatus::Idle,
        }
    }
}

/// Point-in-time view of an entry handed to callers and observers.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub key: CacheKey,
    pub value: Option<Value>,
    pub error: Option<Error>,
    pub status: FetchStatus,
    pub fetched_at: Option<Instant>,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub observer_count: usize,
    pub generation: u64,
}

impl EntrySnapshot {
    pub(crate) fn idle(key: &CacheKey) -> Self {
        EntrySnapshot {
            key: key.clone(),
            value: None,
            error: None,
            status: FetchStatus::Idle,
            fetched_at: None,
            is_stale: true,
            is_fetching: false,
            observer_count: 0,
            generation: 0,
        }
    }

    /// Decode the cached value.
    ///
    /// # Errors
    /// Returns `Error::DeserializationError` if the value has the wrong shape.
    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.value {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| Error::DeserializationError(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }
}

pub(crate) struct InFlight {
    pub generation: u64,
    pub shared: SharedFetch,
    pub abort: AbortHandle,
}

/// Observers to call once the map guard has been released.
pub(crate) struct Notification {
    observers: Vec<Observer>,
    snapshot: EntrySnapshot,
}

impl Notification {
    pub fn fire(self) {
        for observer in &self.observers {
            observer(&self.snapshot);
        }
    }
}

pub(crate) struct Slot {
    pub entry: CacheEntry,
    pub query_fn: Option<QueryFn>,
    pub observers: Vec<(u64, Observer)>,
    pub inflight: Option<InFlight>,
    pub polling: Option<PollingOptions>,
    pub poller: Option<JoinHandle<()>>,
    /// Set while no observer is attached; drives garbage collection.
    pub unobserved_since: Option<Instant>,
}

impl Slot {
    pub fn new(stale_after: Duration) -> Self {
        Slot {
            entry: CacheEntry::new(stale_after),
            query_fn: None,
            observers: Vec::new(),
            inflight: None,
            polling: None,
            poller: None,
            unobserved_since: Some(Instant::now()),
        }
    }

    pub fn snapshot(&self, key: &CacheKey) -> EntrySnapshot {
        EntrySnapshot {
            key: key.clone(),
            value: self.entry.value.clone(),
            error: self.entry.error.clone(),
            status: self.entry.status,
            fetched_at: self.entry.fetched_at,
            is_stale: self.entry.is_stale(Instant::now()),
            is_fetching: self.inflight.is_some(),
            observer_count: self.observers.len(),
            generation: self.entry.generation,
        }
    }

    pub fn notification(&self, key: &CacheKey) -> Option<Notification> {
        if self.observers.is_empty() {
            return None;
        }
        Some(Notification {
            observers: self.observers.iter().map(|(_, o)| Arc::clone(o)).collect(),
            snapshot: self.snapshot(key),
        })
    }

    /// Collectable once the entry's group has had no observers for `grace`
    /// (`group_idle`, `None` while any key of the group is observed) and the
    /// entry itself is at least that old. Session-lifetime entries
    /// (`stale_after == Duration::MAX`) are never collected.
    pub fn is_collectable(&self, now: Instant, grace: Duration, group_idle: Option<Duration>) -> bool {
        self.observers.is_empty()
            && self.inflight.is_none()
            && self.entry.stale_after != Duration::MAX
            && group_idle.is_some_and(|idle| idle >= grace)
            && self
                .unobserved_since
                .is_some_and(|since| now.saturating_duration_since(since) >= grace)
    }

    /// Abort the in-flight request and the poller, if any.
    pub fn shutdown(&mut self) {
        if let Some(inflight) = self.inflight.take() {
            inflight.abort.abort();
        }
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// Observer count of one entity group.
#[derive(Debug, Clone, Copy)]
struct GroupObservers {
    count: usize,
    idle_since: Option<Instant>,
}

/// Concurrent map of slots, plus the observer count of every group.
///
/// Guards returned by the maps must never be held across an `.await` or
/// while calling observers. Code holding a slot guard may take a group
/// guard, never the other way round.
#[derive(Default)]
pub(crate) struct CacheStore {
    slots: DashMap<CacheKey, Slot>,
    groups: DashMap<EntityGroup, GroupObservers>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &DashMap<CacheKey, Slot> {
        &self.slots
    }

    pub fn snapshot(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.slots.get(key).map(|slot| slot.snapshot(key))
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.slots.iter().map(|slot| slot.key().clone()).collect()
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Slot> {
        self.slots.remove(key).map(|(_, slot)| slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Count `added` new observers of `group`.
    pub fn observe_group(&self, group: EntityGroup, added: usize) {
        let mut state = self.groups.entry(group).or_insert(GroupObservers {
            count: 0,
            idle_since: None,
        });
        state.count += added;
        state.idle_since = None;
    }

    /// Forget `removed` observers of `group`. Returns true when the group
    /// just lost its last observer.
    pub fn release_group(&self, group: EntityGroup, removed: usize) -> bool {
        let Some(mut state) = self.groups.get_mut(&group) else {
            return false;
        };
        if removed == 0 || state.count == 0 {
            return false;
        }
        state.count = state.count.saturating_sub(removed);
        if state.count == 0 {
            state.idle_since = Some(Instant::now());
            return true;
        }
        false
    }

    /// How long `group` has had no observers; `None` while it has some.
    /// A group never observed counts as idle forever.
    pub fn group_idle(&self, group: EntityGroup, now: Instant) -> Option<Duration> {
        match self.groups.get(&group).map(|state| *state) {
            None => Some(Duration::MAX),
            Some(GroupObservers { count: 0, idle_since }) => Some(
                idle_since.map_or(Duration::MAX, |since| now.saturating_duration_since(since)),
            ),
            Some(_) => None,
        }
    }

    pub fn group_observers(&self, group: EntityGroup) -> usize {
        self.groups.get(&group).map_or(0, |state| state.count)
    }

    /// Drop every group count, after all slots were removed.
    pub fn reset_groups(&self) {
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_entry_is_stale_and_idle() {
        let entry = CacheEntry::new(Duration::from_secs(60));
        assert_eq!(entry.status, FetchStatus::Idle);
        assert!(entry.is_stale(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_goes_stale_after_window() {
        let mut entry = CacheEntry::new(Duration::from_secs(60));
        entry.store_value(json!(1), 1);
        assert!(!entry.is_stale(Instant::now()));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(entry.is_stale(Instant::now()));
    }

    #[test]
    fn test_invalidated_entry_is_stale() {
        let mut entry = CacheEntry::new(Duration::MAX);
        entry.store_value(json!(1), 1);
        assert!(!entry.is_stale(Instant::now()));
        entry.invalidated = true;
        assert!(entry.is_stale(Instant::now()));
    }

    #[test]
    fn test_settled_status() {
        let mut entry = CacheEntry::new(Duration::ZERO);
        assert_eq!(entry.settled_status(), FetchStatus::Idle);
        entry.error = Some(Error::Network("offline".into()));
        assert_eq!(entry.settled_status(), FetchStatus::Error);
        entry.store_value(json!([]), 2);
        assert_eq!(entry.settled_status(), FetchStatus::Success);
    }

    #[test]
    fn test_snapshot_decodes_value() {
        let store = CacheStore::new();
        let key = EntityGroup::Items.keys().detail(7);
        store
            .slots()
            .entry(key.clone())
            .or_insert_with(|| Slot::new(Duration::from_secs(60)))
            .entry
            .store_value(json!({"id": 7}), 1);

        #[derive(serde::Deserialize)]
        struct Item {
            id: i64,
        }
        let snapshot = store.snapshot(&key).unwrap();
        let item: Item = snapshot.data().unwrap().unwrap();
        assert_eq!(item.id, 7);
        assert!(!snapshot.is_fetching);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collectable_after_grace() {
        let grace = Duration::from_secs(10);
        let idle = Some(Duration::MAX);
        let slot = Slot::new(Duration::from_secs(60));
        assert!(!slot.is_collectable(Instant::now(), grace, idle));
        tokio::time::advance(grace).await;
        assert!(slot.is_collectable(Instant::now(), grace, idle));
        assert!(!slot.is_collectable(Instant::now(), grace, None));
        assert!(!slot.is_collectable(Instant::now(), grace, Some(Duration::from_secs(3))));

        let session = Slot::new(Duration::MAX);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!session.is_collectable(Instant::now(), grace, idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_observer_counts() {
        let store = CacheStore::new();
        let group = EntityGroup::Inventory;
        assert_eq!(store.group_idle(group, Instant::now()), Some(Duration::MAX));

        store.observe_group(group, 1);
        store.observe_group(group, 1);
        assert_eq!(store.group_observers(group), 2);
        assert_eq!(store.group_idle(group, Instant::now()), None);

        assert!(!store.release_group(group, 1));
        assert!(store.release_group(group, 1));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            store.group_idle(group, Instant::now()),
            Some(Duration::from_secs(5))
        );

        // Releasing an idle group is a no-op.
        assert!(!store.release_group(group, 1));
        store.reset_groups();
        assert_eq!(store.group_observers(group), 0);
    }
}
