//! # tlm-cache
//!
//! Client-side data layer for the teaching/learning materials supply-chain
//! dashboard: a keyed query cache with request deduplication, a dependency
//! aware invalidation router, polling subscriptions and a remote fetch
//! adapter with retry and session teardown.
//!
//! ## Features
//!
//! - **Hierarchical keys:** `[group, scope, ..., {filters}]`, filter order
//!   never matters, prefix matching drives invalidation
//! - **Deduplicated fetches:** concurrent reads of one key share one request;
//!   late results of superseded requests are discarded
//! - **Invalidation closure:** a shipment write marks shipments, inventory
//!   and dashboard stale in one call
//! - **Polling:** per-subscription intervals with change callbacks
//! - **Remote fetch:** bounded retries for transient failures, silent client
//!   errors, single session teardown on 401
//!
//! ## Quick Start
//!
//! ```no_run
//! use tlm_cache::{endpoints, Api, ClientConfig, MockTransport, QueryClient};
//!
//! # async fn run() -> tlm_cache::Result<()> {
//! let client = QueryClient::new(ClientConfig::default());
//! let api = Api::new(client.clone(), MockTransport::new());
//!
//! // Cached and deduplicated read
//! let schools: serde_json::Value = api.query(&endpoints::SCHOOLS.list(&())?).await?;
//!
//! // Writes invalidate every dependent group
//! let confirm = endpoints::shipments::confirm_shipment(7);
//! let _: serde_json::Value = api.mutate(&confirm).await?;
//! # let _ = schools;
//! # Ok(())
//! # }
//! ```
//!
//! Lower-level use goes through [`QueryClient`] with a hand-written
//! [`QueryFn`]:
//!
//! ```no_run
//! use tlm_cache::{key, store::query_fn, CacheStrategy, QueryClient, ClientConfig};
//! use serde_json::json;
//!
//! # async fn run() -> tlm_cache::Result<()> {
//! let client = QueryClient::new(ClientConfig::default());
//! let kpi = query_fn(|| async { Ok(json!({"totalSchools": 12})) });
//! let value = client.query(&key::dashboard_kpi(), &kpi, CacheStrategy::Refresh).await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod api;
pub mod client;
pub mod config;
pub mod downloads;
pub mod endpoints;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod invalidation;
pub mod key;
pub mod notifications;
pub mod observability;
pub mod observer;
pub mod polling;
pub mod remote;
pub mod session;
pub mod storage;
pub mod store;
pub mod strategy;
pub mod transport;

// Re-exports for convenience
pub use api::{Api, ApiRequest, Method, Mutation, Query};
pub use client::{QueryClient, QueryClientBuilder};
pub use config::{ApiConfig, ClientConfig, QueryOptions};
pub use downloads::{DownloadRecord, DownloadStatus, RecentDownloads};
pub use entity::EntityGroup;
pub use envelope::{ApiResponse, Paginated, Pagination};
pub use error::{Error, Result};
pub use invalidation::{InvalidationPlan, MutationDescriptor};
pub use key::{CacheKey, EntityId, KeyFactory};
pub use notifications::{Notification, NotificationFeed};
pub use observability::{CacheMetrics, StalePolicy};
pub use observer::{Observer, Subscription};
pub use polling::PollingOptions;
pub use remote::{RemoteFetcher, RetryPolicy};
pub use session::SessionGate;
pub use storage::{InMemoryStore, LocalStore};
pub use store::{EntrySnapshot, FetchStatus, QueryFn};
pub use strategy::CacheStrategy;
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{MockTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
