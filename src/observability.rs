//! Observability hooks and staleness policies.
//!
//! Two concerns live here:
//!
//! - **Metrics (`CacheMetrics`)**: hits, misses, fetch timing, de-duplicated
//!   joins, discarded out-of-order responses, invalidations and errors.
//! - **Stale policies (`StalePolicy`)**: how long a fetched value counts as
//!   fresh before a read schedules a background refetch.
//!
//! ```
//! use tlm_cache::observability::StalePolicy;
//! use tlm_cache::EntityGroup;
//! use std::time::Duration;
//!
//! let policy = StalePolicy::PerGroup(|group| match group {
//!     EntityGroup::Dashboard => Duration::from_secs(30),
//!     _ => Duration::from_secs(300),
//! });
//! assert_eq!(policy.stale_after(EntityGroup::Dashboard), Duration::from_secs(30));
//! ```
//!
//! | Policy | Fresh for | Use case |
//! |--------|-----------|----------|
//! | `Fixed` | the given duration | most lists and details |
//! | `PerGroup` | per entity group | KPIs refresh faster than reference data |
//! | `Never` | the whole session | notification categories |
//! | `Immediate` | not at all | every read revalidates |

use crate::entity::EntityGroup;
use crate::key::CacheKey;
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// A read found a fresh value.
    fn record_hit(&self, key: &CacheKey) {
        debug!("Cache HIT: {}", key);
    }

    /// A read found nothing usable and scheduled a fetch.
    fn record_miss(&self, key: &CacheKey) {
        debug!("Cache MISS: {}", key);
    }

    /// A fetch completed and its result was applied.
    fn record_fetch(&self, key: &CacheKey, duration: Duration) {
        debug!("Cache FETCH: {} took {:?}", key, duration);
    }

    /// A reader joined an already in-flight request.
    fn record_dedup(&self, key: &CacheKey) {
        debug!("Cache DEDUP: {}", key);
    }

    /// A response lost the generation race and was dropped.
    fn record_discard(&self, key: &CacheKey, generation: u64, latest: u64) {
        debug!(
            "Cache DISCARD: {} generation {} superseded by {}",
            key, generation, latest
        );
    }

    /// An entry was marked stale by the invalidation router.
    fn record_invalidate(&self, key: &CacheKey) {
        debug!("Cache INVALIDATE: {}", key);
    }

    /// A fetch failed.
    fn record_error(&self, key: &CacheKey, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &CacheKey) {}
    fn record_miss(&self, _key: &CacheKey) {}
    fn record_fetch(&self, _key: &CacheKey, _duration: Duration) {}
    fn record_dedup(&self, _key: &CacheKey) {}
    fn record_discard(&self, _key: &CacheKey, _generation: u64, _latest: u64) {}
    fn record_invalidate(&self, _key: &CacheKey) {}
    fn record_error(&self, _key: &CacheKey, _error: &str) {}
}

/// Metrics implementation that forwards everything to the `log` crate.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

/// Freshness window for cache entries.
#[derive(Clone, Debug)]
pub enum StalePolicy {
    /// Same window for every group.
    Fixed(Duration),

    /// Window chosen per entity group.
    PerGroup(fn(EntityGroup) -> Duration),

    /// Never stale on its own; only invalidation marks it stale.
    Never,

    /// Stale as soon as it is stored.
    Immediate,
}

impl Default for StalePolicy {
    fn default() -> Self {
        StalePolicy::PerGroup(default_stale_after)
    }
}

/// Five minutes for reference data, thirty seconds for dashboard KPIs.
pub fn default_stale_after(group: EntityGroup) -> Duration {
    match group {
        EntityGroup::Dashboard => Duration::from_secs(30),
        _ => Duration::from_secs(300),
    }
}

impl StalePolicy {
    /// Freshness window for a group. `Duration::MAX` means "never stale".
    pub fn stale_after(&self, group: EntityGroup) -> Duration {
        match self {
            StalePolicy::Fixed(d) => *d,
            StalePolicy::PerGroup(f) => f(group),
            StalePolicy::Never => Duration::MAX,
            StalePolicy::Immediate => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        let key = crate::key::dashboard_kpi();
        metrics.record_hit(&key);
        metrics.record_miss(&key);
        metrics.record_discard(&key, 1, 2);
    }

    #[test]
    fn test_stale_policy_default() {
        let policy = StalePolicy::default();
        assert_eq!(
            policy.stale_after(EntityGroup::Dashboard),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.stale_after(EntityGroup::Inventory),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_stale_policy_fixed() {
        let policy = StalePolicy::Fixed(Duration::from_secs(60));
        assert_eq!(policy.stale_after(EntityGroup::Users), Duration::from_secs(60));
    }

    #[test]
    fn test_stale_policy_bounds() {
        assert_eq!(StalePolicy::Never.stale_after(EntityGroup::Users), Duration::MAX);
        assert_eq!(
            StalePolicy::Immediate.stale_after(EntityGroup::Users),
            Duration::ZERO
        );
    }
}
