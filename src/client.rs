//! Query client: the cache store plus fetch orchestration.
//!
//! [`QueryClient`] is cheap to clone (one `Arc`) and is shared by every
//! screen of the application. It provides:
//!
//! - **Deduplication**: concurrent reads of one key share one request.
//! - **Stale-while-revalidate**: [`QueryClient::read`] returns the cached
//!   value immediately and refreshes it in the background when stale.
//! - **Generation guard**: every fetch takes a new generation; a response
//!   whose generation is no longer the latest is discarded.
//! - **Invalidation**: [`QueryClient::invalidate`] marks every key reached by
//!   a mutation stale and refetches the observed ones right away.
//! - **Garbage collection**: entries are dropped once their entity group has
//!   had no observers for a grace period.
//!
//! Map guards are never held across an `.await`, while a query function runs
//! or while observers are called.

use crate::config::{ClientConfig, QueryOptions};
use crate::entity::EntityGroup;
use crate::error::{Error, Result};
use crate::invalidation::{InvalidationPlan, MutationDescriptor};
use crate::key::CacheKey;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::observer::{Observer, Subscription};
use crate::polling::{self, PollingOptions};
use crate::remote::{LogNotifier, Notifier, RemoteFetcher};
use crate::session::SessionGate;
use crate::store::{CacheStore, EntrySnapshot, FetchStatus, InFlight, QueryFn, SharedFetch, Slot};
use crate::strategy::CacheStrategy;
use dashmap::mapref::one::RefMut;
use futures::future::{AbortHandle, Abortable, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

static GLOBAL: RwLock<Option<QueryClient>> = RwLock::new(None);

/// Outcome of one polling tick.
pub(crate) enum PollTick {
    /// The key was removed; stop polling.
    Gone,
    /// A fetch is already in flight.
    Busy,
    Started {
        previous: Option<Value>,
        fetch: SharedFetch,
    },
}

pub(crate) struct ClientInner {
    store: CacheStore,
    config: ClientConfig,
    metrics: Box<dyn CacheMetrics>,
    remote: RemoteFetcher,
    next_observer: AtomicU64,
}

impl ClientInner {
    /// Slot for `key`, created on first use. Registers `query_fn` and applies
    /// per-query options. The bool is true when the slot was just created.
    fn slot_for(
        &self,
        key: &CacheKey,
        query_fn: Option<&QueryFn>,
        options: Option<&QueryOptions>,
    ) -> (RefMut<'_, CacheKey, Slot>, bool) {
        let stale_after = options
            .and_then(|o| o.stale_time)
            .unwrap_or_else(|| self.config.stale.stale_after(key.group()));
        let mut created = false;
        let mut slot = self.store.slots().entry(key.clone()).or_insert_with(|| {
            created = true;
            Slot::new(stale_after)
        });
        if let Some(query_fn) = query_fn {
            slot.query_fn = Some(Arc::clone(query_fn));
        }
        if let Some(options) = options {
            if let Some(stale_time) = options.stale_time {
                slot.entry.stale_after = stale_time;
            }
            if options.polling.is_some() {
                slot.polling = options.polling.clone();
            }
        }
        (slot, created)
    }

    pub(crate) fn snapshot(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.store.snapshot(key)
    }

    /// Start a request for `key` with its registered query function.
    ///
    /// Without `force` an in-flight request is joined instead. With `force`
    /// a new generation supersedes it; joiners of the old one still get its
    /// result, but the store ignores it.
    ///
    /// The outcome is applied to the store inside the shared future, so every
    /// awaiting caller resumes after the cache holds the result. A spawned
    /// task polls the request to completion when nobody awaits it.
    pub(crate) fn start_fetch(self: &Arc<Self>, key: &CacheKey, force: bool) -> Option<SharedFetch> {
        let (fetch, notification) = {
            let mut slot = self.store.slots().get_mut(key)?;
            if !force {
                if let Some(inflight) = &slot.inflight {
                    self.metrics.record_dedup(key);
                    return Some(inflight.shared.clone());
                }
            }
            let query_fn = Arc::clone(slot.query_fn.as_ref()?);

            slot.entry.generation += 1;
            let generation = slot.entry.generation;
            let (abort, registration) = AbortHandle::new_pair();
            let client = Arc::downgrade(self);
            let completed_key = key.clone();
            let started = Instant::now();
            // The query function is invoked on first poll, outside the guard.
            let fetch = Abortable::new(async move { query_fn().await }, registration)
                .map(move |outcome| {
                    let outcome = outcome.unwrap_or(Err(Error::Cancelled));
                    if let Some(client) = client.upgrade() {
                        client.complete(&completed_key, generation, &outcome, started.elapsed());
                    }
                    outcome
                })
                .boxed()
                .shared();

            let previous = slot.inflight.replace(InFlight {
                generation,
                shared: fetch.clone(),
                abort,
            });
            if let Some(previous) = previous {
                debug!(
                    "{}: generation {} supersedes {}",
                    key, generation, previous.generation
                );
            }
            slot.entry.status = FetchStatus::Loading;
            (fetch, slot.notification(key))
        };

        if let Some(notification) = notification {
            notification.fire();
        }

        let driver = fetch.clone();
        tokio::spawn(async move {
            let _ = driver.await;
        });
        Some(fetch)
    }

    fn complete(self: &Arc<Self>, key: &CacheKey, generation: u64, outcome: &Result<Value>, elapsed: Duration) {
        let (notification, unobserved) = {
            let Some(mut slot) = self.store.slots().get_mut(key) else {
                debug!("{} removed before generation {} resolved", key, generation);
                return;
            };
            if slot
                .inflight
                .as_ref()
                .is_some_and(|inflight| inflight.generation == generation)
            {
                slot.inflight = None;
            }

            let latest = slot.entry.generation;
            if generation != latest {
                self.metrics.record_discard(key, generation, latest);
                return;
            }

            match outcome {
                Ok(value) => {
                    slot.entry.store_value(value.clone(), generation);
                    self.metrics.record_fetch(key, elapsed);
                }
                Err(Error::Cancelled) => {
                    slot.entry.status = slot.entry.settled_status();
                }
                Err(error) => {
                    self.metrics.record_error(key, &error.to_string());
                    slot.entry.error = Some(error.clone());
                    slot.entry.status = FetchStatus::Error;
                }
            }
            (slot.notification(key), slot.observers.is_empty())
        };

        if let Some(notification) = notification {
            notification.fire();
        }
        if unobserved {
            self.schedule_gc(key);
        }
    }

    fn read(self: &Arc<Self>, key: &CacheKey, query_fn: &QueryFn, options: Option<&QueryOptions>) -> EntrySnapshot {
        let (stale, fetching, created) = {
            let (slot, created) = self.slot_for(key, Some(query_fn), options);
            (
                slot.entry.is_stale(Instant::now()),
                slot.inflight.is_some(),
                created,
            )
        };
        if created {
            self.schedule_gc(key);
        }

        if stale {
            self.metrics.record_miss(key);
            if !fetching {
                self.start_fetch(key, false);
            }
        } else {
            self.metrics.record_hit(key);
        }
        self.store
            .snapshot(key)
            .unwrap_or_else(|| EntrySnapshot::idle(key))
    }

    async fn fetch(
        self: &Arc<Self>,
        key: &CacheKey,
        query_fn: &QueryFn,
        options: Option<&QueryOptions>,
        force: bool,
    ) -> Result<Value> {
        let created = self.slot_for(key, Some(query_fn), options).1;
        if created {
            self.schedule_gc(key);
        }
        let fetch = self
            .start_fetch(key, force)
            .ok_or_else(|| Error::Other(format!("{} was removed before fetching", key)))?;
        fetch.await
    }

    async fn query(
        self: &Arc<Self>,
        key: &CacheKey,
        query_fn: &QueryFn,
        options: Option<&QueryOptions>,
        strategy: CacheStrategy,
    ) -> Result<Value> {
        trace!("Executing {} strategy for {}", strategy, key);
        match strategy {
            CacheStrategy::Fresh => {
                let cached = {
                    let (slot, _) = self.slot_for(key, Some(query_fn), options);
                    slot.entry.value.clone()
                };
                match cached {
                    Some(value) => {
                        self.metrics.record_hit(key);
                        Ok(value)
                    }
                    None => {
                        self.metrics.record_miss(key);
                        Err(Error::CacheMiss)
                    }
                }
            }
            CacheStrategy::Refresh => {
                let cached = {
                    let (slot, _) = self.slot_for(key, Some(query_fn), options);
                    if slot.entry.is_stale(Instant::now()) {
                        None
                    } else {
                        slot.entry.value.clone()
                    }
                };
                if let Some(value) = cached {
                    self.metrics.record_hit(key);
                    return Ok(value);
                }
                self.metrics.record_miss(key);
                self.fetch(key, query_fn, options, false).await
            }
            CacheStrategy::Invalidate => {
                {
                    let (mut slot, _) = self.slot_for(key, Some(query_fn), options);
                    slot.entry.invalidated = true;
                }
                self.metrics.record_invalidate(key);
                self.fetch(key, query_fn, options, strategy.forces_fetch()).await
            }
            CacheStrategy::Bypass => self.fetch(key, query_fn, options, strategy.forces_fetch()).await,
        }
    }

    fn subscribe(
        self: &Arc<Self>,
        key: &CacheKey,
        query_fn: &QueryFn,
        options: &QueryOptions,
        observer: Observer,
    ) -> Subscription {
        let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        let (needs_fetch, polling) = {
            let (mut slot, _) = self.slot_for(key, Some(query_fn), Some(options));
            slot.observers.push((id, observer));
            slot.entry.observer_count = slot.observers.len();
            slot.unobserved_since = None;
            self.store.observe_group(key.group(), 1);
            let polling = match (&slot.poller, &slot.polling) {
                (None, Some(polling)) if polling.is_active() => Some(polling.clone()),
                _ => None,
            };
            (
                slot.entry.is_stale(Instant::now()) && slot.inflight.is_none(),
                polling,
            )
        };

        if needs_fetch {
            self.start_fetch(key, false);
        }
        if let Some(polling) = polling {
            self.start_polling(key, polling);
        }
        Subscription::new(Arc::downgrade(self), key.clone(), id)
    }

    fn start_polling(self: &Arc<Self>, key: &CacheKey, options: PollingOptions) {
        let mut handle = Some(polling::spawn(Arc::downgrade(self), key.clone(), options));
        if let Some(mut slot) = self.store.slots().get_mut(key) {
            if slot.poller.is_none() && !slot.observers.is_empty() {
                slot.poller = handle.take();
            }
        }
        // Lost a race with another subscriber or an unsubscribe.
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    pub(crate) fn unsubscribe(self: &Arc<Self>, key: &CacheKey, id: u64) {
        let (poller, group_idle) = {
            let Some(mut slot) = self.store.slots().get_mut(key) else {
                return;
            };
            let before = slot.observers.len();
            slot.observers.retain(|(observer_id, _)| *observer_id != id);
            slot.entry.observer_count = slot.observers.len();
            let group_idle = self
                .store
                .release_group(key.group(), before - slot.observers.len());
            if slot.observers.is_empty() && before > 0 {
                slot.unobserved_since = Some(Instant::now());
                (slot.poller.take(), group_idle)
            } else {
                (None, group_idle)
            }
        };
        if let Some(poller) = poller {
            debug!("Last observer of {} left, polling stopped", key);
            poller.abort();
        }
        if group_idle {
            debug!("Last observer of group {} left", key.group());
            self.schedule_group_gc(key.group());
        }
    }

    pub(crate) fn poll_tick(self: &Arc<Self>, key: &CacheKey) -> PollTick {
        let previous = match self.store.slots().get(key) {
            None => return PollTick::Gone,
            Some(slot) if slot.inflight.is_some() => return PollTick::Busy,
            Some(slot) => slot.entry.value.clone(),
        };
        match self.start_fetch(key, false) {
            Some(fetch) => PollTick::Started { previous, fetch },
            None => PollTick::Gone,
        }
    }

    fn write(self: &Arc<Self>, key: &CacheKey, value: Value) -> u64 {
        let (generation, notification, created) = {
            let (mut slot, created) = self.slot_for(key, None, None);
            slot.entry.generation += 1;
            let generation = slot.entry.generation;
            slot.entry.store_value(value, generation);
            (generation, slot.notification(key), created)
        };
        if let Some(notification) = notification {
            notification.fire();
        }
        if created {
            self.schedule_gc(key);
        }
        generation
    }

    fn rollback(&self, key: &CacheKey, generation: u64, previous: Option<Value>) -> bool {
        let notification = {
            let Some(mut slot) = self.store.slots().get_mut(key) else {
                return false;
            };
            // A fetch issued after the write that has not replaced its value
            // is superseded here.
            if slot.entry.value_generation != generation {
                debug!(
                    "{}: rollback of generation {} skipped, value is from {}",
                    key, generation, slot.entry.value_generation
                );
                return false;
            }
            slot.entry.generation += 1;
            slot.entry.error = None;
            slot.entry.value_generation = slot.entry.generation;
            slot.entry.status = if previous.is_some() {
                FetchStatus::Success
            } else {
                FetchStatus::Idle
            };
            slot.entry.value = previous;
            // The restored value predates the failed write; let the next
            // read confirm it.
            slot.entry.invalidated = true;
            slot.notification(key)
        };
        if let Some(notification) = notification {
            notification.fire();
        }
        true
    }

    fn invalidate_where<P>(self: &Arc<Self>, matches: P) -> Vec<CacheKey>
    where
        P: Fn(&CacheKey) -> bool,
    {
        let mut marked = Vec::new();
        let mut eager = Vec::new();
        for mut item in self.store.slots().iter_mut() {
            let (key, slot) = item.pair_mut();
            if !matches(key) {
                continue;
            }
            slot.entry.invalidated = true;
            self.metrics.record_invalidate(key);
            if !slot.observers.is_empty() || slot.inflight.is_some() {
                eager.push(key.clone());
            }
            marked.push(key.clone());
        }

        // Observed or in-flight keys refetch now under a new generation;
        // the rest refetch on their next read.
        for key in &eager {
            self.start_fetch(key, true);
        }
        marked
    }

    fn cancel(&self, key: &CacheKey) -> bool {
        let notification = {
            let Some(mut slot) = self.store.slots().get_mut(key) else {
                return false;
            };
            let Some(inflight) = slot.inflight.take() else {
                return false;
            };
            inflight.abort.abort();
            // Whatever the aborted request still delivers is discarded.
            slot.entry.generation += 1;
            slot.entry.status = slot.entry.settled_status();
            slot.notification(key)
        };
        debug!("Cancelled in-flight fetch of {}", key);
        if let Some(notification) = notification {
            notification.fire();
        }
        true
    }

    fn remove(self: &Arc<Self>, key: &CacheKey) -> bool {
        match self.store.remove(key) {
            Some(mut slot) => {
                slot.shutdown();
                if self.store.release_group(key.group(), slot.observers.len()) {
                    self.schedule_group_gc(key.group());
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_all(&self) {
        let keys = self.store.keys();
        let count = keys.len();
        for key in keys {
            if let Some(mut slot) = self.store.remove(&key) {
                slot.shutdown();
            }
        }
        self.store.reset_groups();
        warn!("Query cache cleared ({} entries)", count);
    }

    fn schedule_gc(self: &Arc<Self>, key: &CacheKey) {
        let grace = self.config.gc_grace;
        if grace == Duration::MAX {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = Arc::downgrade(self);
        let key = key.clone();
        runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(client) = client.upgrade() {
                client.collect_key(&key);
            }
        });
    }

    /// Once the last observer of `group` leaves, collect its entries after
    /// the grace period unless an observer came back.
    fn schedule_group_gc(self: &Arc<Self>, group: EntityGroup) {
        let grace = self.config.gc_grace;
        if grace == Duration::MAX {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = Arc::downgrade(self);
        runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(client) = client.upgrade() {
                client.collect_where(|key| key.group() == group);
            }
        });
    }

    fn collect_key(&self, key: &CacheKey) {
        let now = Instant::now();
        let grace = self.config.gc_grace;
        let group_idle = self.store.group_idle(key.group(), now);
        if self
            .store
            .slots()
            .remove_if(key, |_, slot| slot.is_collectable(now, grace, group_idle))
            .is_some()
        {
            debug!("Collected unobserved entry {}", key);
        }
    }

    fn collect_garbage(&self) -> usize {
        self.collect_where(|_| true)
    }

    fn collect_where<P>(&self, matches: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let now = Instant::now();
        let grace = self.config.gc_grace;
        let before = self.store.len();
        self.store.slots().retain(|key, slot| {
            !(matches(key) && slot.is_collectable(now, grace, self.store.group_idle(key.group(), now)))
        });
        let collected = before.saturating_sub(self.store.len());
        if collected > 0 {
            debug!("Collected {} unobserved entries", collected);
        }
        collected
    }
}

/// Shared query cache.
///
/// # Example
///
/// ```no_run
/// use tlm_cache::{key, ClientConfig, QueryClient};
/// use tlm_cache::store::query_fn;
/// use serde_json::json;
///
/// # async fn demo() -> tlm_cache::Result<()> {
/// let client = QueryClient::new(ClientConfig::default());
/// let kpi = client
///     .fetch(&key::dashboard_kpi(), &query_fn(|| async { Ok(json!({"shipments": 4})) }))
///     .await?;
/// assert_eq!(kpi["shipments"], 4);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<ClientInner>,
}

impl QueryClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> QueryClientBuilder {
        QueryClientBuilder {
            config,
            metrics: None,
            notifier: None,
            session: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Remote fetch adapter configured with this client's retry policy.
    pub fn remote(&self) -> &RemoteFetcher {
        &self.inner.remote
    }

    pub fn session(&self) -> &Arc<SessionGate> {
        self.inner.remote.session()
    }

    /// Current entry for `key`; schedules a background fetch when stale.
    ///
    /// Must be called within a Tokio runtime.
    pub fn read(&self, key: &CacheKey, query_fn: &QueryFn) -> EntrySnapshot {
        self.inner.read(key, query_fn, None)
    }

    pub fn read_with(&self, key: &CacheKey, query_fn: &QueryFn, options: &QueryOptions) -> EntrySnapshot {
        self.inner.read(key, query_fn, Some(options))
    }

    /// Fetch `key`, joining a request already in flight.
    ///
    /// # Errors
    /// Returns the query function's terminal error.
    pub async fn fetch(&self, key: &CacheKey, query_fn: &QueryFn) -> Result<Value> {
        self.inner.fetch(key, query_fn, None, false).await
    }

    /// Re-run the registered query function under a new generation.
    ///
    /// # Errors
    /// Returns `Error::CacheMiss` if `key` has no registered query function.
    pub async fn refetch(&self, key: &CacheKey) -> Result<Value> {
        let fetch = self
            .inner
            .start_fetch(key, true)
            .ok_or(Error::CacheMiss)?;
        fetch.await
    }

    /// # Errors
    /// Returns `Error::CacheMiss` for [`CacheStrategy::Fresh`] without a
    /// cached value, or the query function's terminal error.
    pub async fn query(&self, key: &CacheKey, query_fn: &QueryFn, strategy: CacheStrategy) -> Result<Value> {
        self.inner.query(key, query_fn, None, strategy).await
    }

    /// [`query`](Self::query) with per-query options.
    ///
    /// # Errors
    /// Same as [`query`](Self::query).
    pub async fn query_with(
        &self,
        key: &CacheKey,
        query_fn: &QueryFn,
        options: &QueryOptions,
        strategy: CacheStrategy,
    ) -> Result<Value> {
        self.inner.query(key, query_fn, Some(options), strategy).await
    }

    /// [`query`](Self::query) decoded into `T`.
    ///
    /// # Errors
    /// Same as [`query`](Self::query), plus `Error::DeserializationError`.
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        query_fn: &QueryFn,
        strategy: CacheStrategy,
    ) -> Result<T> {
        let value = self.query(key, query_fn, strategy).await?;
        serde_json::from_value(value).map_err(|e| Error::DeserializationError(e.to_string()))
    }

    /// Attach `observer` to `key`. Fetches when stale and starts polling if
    /// `options.polling` is active. Drop the returned handle to detach.
    ///
    /// Must be called within a Tokio runtime.
    pub fn subscribe(
        &self,
        key: &CacheKey,
        query_fn: &QueryFn,
        options: &QueryOptions,
        observer: Observer,
    ) -> Subscription {
        self.inner.subscribe(key, query_fn, options, observer)
    }

    /// Store `value` directly (optimistic update). Returns the generation the
    /// value was written under, for [`rollback`](Self::rollback).
    pub fn write(&self, key: &CacheKey, value: Value) -> u64 {
        self.inner.write(key, value)
    }

    /// Restore `previous` if the entry still holds the value written under
    /// `generation`. Returns false when a newer value already replaced it.
    pub fn rollback(&self, key: &CacheKey, generation: u64, previous: Option<Value>) -> bool {
        self.inner.rollback(key, generation, previous)
    }

    /// Mark every key reached by `mutation` stale. Returns the marked keys.
    pub fn invalidate(&self, mutation: &MutationDescriptor) -> Vec<CacheKey> {
        let plan = InvalidationPlan::for_mutation(mutation);
        let marked = self.inner.invalidate_where(|key| plan.matches(key));
        info!(
            "Invalidated {} keys after {} (groups: {:?})",
            marked.len(),
            mutation,
            plan.groups()
        );
        marked
    }

    /// Mark one key stale.
    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        !self.inner.invalidate_where(|candidate| candidate == key).is_empty()
    }

    /// Mark every key under `prefix` stale.
    pub fn invalidate_prefix(&self, prefix: &CacheKey) -> Vec<CacheKey> {
        self.inner.invalidate_where(|key| key.starts_with(prefix))
    }

    /// Abort the in-flight request of `key`; the entry keeps its last value.
    pub fn cancel(&self, key: &CacheKey) -> bool {
        self.inner.cancel(key)
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.inner.remove(key)
    }

    pub fn peek(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.inner.snapshot(key)
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.inner.store.keys()
    }

    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, aborting pollers and in-flight requests.
    pub fn clear_all(&self) {
        self.inner.clear_all();
    }

    /// Drop entries unobserved for longer than the gc grace period.
    pub fn collect_garbage(&self) -> usize {
        self.inner.collect_garbage()
    }

    /// Make `client` the process-wide instance. Returns the previous one.
    pub fn install_global(client: QueryClient) -> Option<QueryClient> {
        let mut global = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
        global.replace(client)
    }

    pub fn global() -> Option<QueryClient> {
        GLOBAL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clear and uninstall the process-wide instance.
    pub fn teardown_global() -> bool {
        let previous = GLOBAL
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match previous {
            Some(client) => {
                client.clear_all();
                true
            }
            None => false,
        }
    }
}

/// Builder for [`QueryClient`].
pub struct QueryClientBuilder {
    config: ClientConfig,
    metrics: Option<Box<dyn CacheMetrics>>,
    notifier: Option<Arc<dyn Notifier>>,
    session: Option<Arc<SessionGate>>,
}

impl QueryClientBuilder {
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_session(mut self, session: Arc<SessionGate>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn build(self) -> QueryClient {
        let session = self.session.unwrap_or_default();
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        let remote = RemoteFetcher::new(self.config.retry.clone(), notifier, Arc::clone(&session))
            .with_silent_statuses(self.config.silent_statuses.iter().copied());

        let inner = Arc::new(ClientInner {
            store: CacheStore::new(),
            config: self.config,
            metrics: self.metrics.unwrap_or_else(|| Box::new(NoOpMetrics)),
            remote,
            next_observer: AtomicU64::new(1),
        });

        let client = Arc::downgrade(&inner);
        session.on_teardown(move |_| {
            if let Some(client) = client.upgrade() {
                client.clear_all();
            }
        });

        debug!("Query client ready for {}", inner.config.api.base_url);
        QueryClient { inner }
    }
}
