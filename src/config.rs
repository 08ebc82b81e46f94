//! Client configuration.
//!
//! - **Setup-time**: [`ClientConfig`] is passed once to
//!   [`QueryClient::builder`](crate::QueryClient::builder) and affects every
//!   query: retry policy, silent statuses, stale policy, gc grace period.
//! - **Per-query**: [`QueryOptions`] overrides the stale window of one key
//!   and attaches polling to it.
//!
//! ```
//! use tlm_cache::{ClientConfig, QueryOptions};
//! use std::time::Duration;
//!
//! let config = ClientConfig::default().with_gc_grace(Duration::from_secs(60));
//! let options = QueryOptions::default().with_stale_time(Duration::from_secs(10));
//! assert_eq!(config.gc_grace, Duration::from_secs(60));
//! assert_eq!(options.stale_time, Some(Duration::from_secs(10)));
//! ```

use crate::error::{Error, Result};
use crate::observability::StalePolicy;
use crate::polling::PollingOptions;
use crate::remote::{RetryPolicy, DEFAULT_SILENT_STATUSES};
use std::time::Duration;

/// Environment variable selecting the collaborator API host.
pub const BASE_URL_ENV: &str = "TLM_API_BASE_URL";

/// Environment variable overriding the request timeout, in milliseconds.
pub const TIMEOUT_ENV: &str = "TLM_API_TIMEOUT_MS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Collaborator API connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// # Errors
    /// Returns `Error::ConfigError` if the URL is not http(s).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(ApiConfig {
            base_url,
            ..Self::default()
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read [`BASE_URL_ENV`] and [`TIMEOUT_ENV`] from the process environment.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for an invalid URL or timeout.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for an invalid URL or timeout.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(BASE_URL_ENV) {
            Some(url) if !url.trim().is_empty() => Self::new(url)?,
            _ => Self::default(),
        };
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                Error::ConfigError(format!("{} must be milliseconds, got {:?}", TIMEOUT_ENV, raw))
            })?;
            config.timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }
}

fn normalize_base_url(url: String) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::ConfigError(format!(
            "API base URL must start with http:// or https://, got {:?}",
            url
        )));
    }
    Ok(trimmed.to_string())
}

/// Setup-time configuration of a [`QueryClient`](crate::QueryClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub retry: RetryPolicy,
    /// Statuses whose terminal failures raise no user-visible notice.
    pub silent_statuses: Vec<u16>,
    pub stale: StalePolicy,
    /// How long an unobserved entry survives before it is collected.
    pub gc_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api: ApiConfig::default(),
            retry: RetryPolicy::default(),
            silent_statuses: DEFAULT_SILENT_STATUSES.to_vec(),
            stale: StalePolicy::default(),
            gc_grace: Duration::from_secs(300),
        }
    }
}

impl ClientConfig {
    /// Defaults plus [`ApiConfig::from_env`].
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for invalid environment values.
    pub fn from_env() -> Result<Self> {
        Ok(ClientConfig {
            api: ApiConfig::from_env()?,
            ..Self::default()
        })
    }

    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_silent_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.silent_statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale = policy;
        self
    }

    pub fn with_gc_grace(mut self, grace: Duration) -> Self {
        self.gc_grace = grace;
        self
    }
}

/// Per-query overrides.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Freshness window for this key; `None` falls back to the client's
    /// [`StalePolicy`]. `Duration::MAX` keeps the value for the session.
    pub stale_time: Option<Duration>,

    /// Poll this key while it has observers.
    pub polling: Option<PollingOptions>,
}

impl QueryOptions {
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    /// Cache for the whole session; only invalidation refetches.
    pub fn session_lifetime(self) -> Self {
        self.with_stale_time(Duration::MAX)
    }

    pub fn with_polling(mut self, polling: PollingOptions) -> Self {
        self.polling = Some(polling);
        self
    }
}
