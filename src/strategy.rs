//! Read strategies for [`QueryClient::query`](crate::QueryClient::query).
//!
//! | Strategy | Fresh entry | Stale / absent entry | Use case |
//! |----------|-------------|----------------------|----------|
//! | **Fresh** | Return | `Error::CacheMiss` if absent, stale value otherwise | Offline views, prefetched data |
//! | **Refresh** | Return | Await fetch (joins an in-flight one) | Default |
//! | **Invalidate** | Mark stale, await new fetch | Await new fetch | Right after a mutation |
//! | **Bypass** | Await new fetch | Await new fetch | Explicit "reload" button |
//!
//! `Invalidate` and `Bypass` both start a new generation, so a slower
//! request that was already in flight can no longer overwrite their result.

/// Strategy enum controlling how a query reads the cache.
///
/// ```
/// use tlm_cache::CacheStrategy;
///
/// assert_eq!(CacheStrategy::default(), CacheStrategy::Refresh);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Cache only; never touches the network.
    Fresh,

    /// Fresh cached value, else fetch.
    #[default]
    Refresh,

    /// Mark the entry stale, then fetch under a new generation.
    Invalidate,

    /// Always fetch under a new generation; the result is still stored for
    /// other readers.
    Bypass,
}

impl CacheStrategy {
    /// Whether this strategy forces a new request generation.
    pub fn forces_fetch(&self) -> bool {
        matches!(self, CacheStrategy::Invalidate | CacheStrategy::Bypass)
    }
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStrategy::Fresh => write!(f, "Fresh"),
            CacheStrategy::Refresh => write!(f, "Refresh"),
            CacheStrategy::Invalidate => write!(f, "Invalidate"),
            CacheStrategy::Bypass => write!(f, "Bypass"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_display() {
        assert_eq!(CacheStrategy::Fresh.to_string(), "Fresh");
        assert_eq!(CacheStrategy::Refresh.to_string(), "Refresh");
        assert_eq!(CacheStrategy::Invalidate.to_string(), "Invalidate");
        assert_eq!(CacheStrategy::Bypass.to_string(), "Bypass");
    }

    #[test]
    fn test_forces_fetch() {
        assert!(!CacheStrategy::Fresh.forces_fetch());
        assert!(!CacheStrategy::Refresh.forces_fetch());
        assert!(CacheStrategy::Invalidate.forces_fetch());
        assert!(CacheStrategy::Bypass.forces_fetch());
    }
}
