//! Remote fetch adapter: envelope unwrapping, retry policy, failure surfacing.
//!
//! [`RemoteFetcher::run`] takes a zero-argument producer bound to one
//! collaborator API call, re-invokes it according to [`RetryPolicy`], and
//! returns the unwrapped `data` or a normalised [`Error`].
//!
//! | Failure | Query | Mutation |
//! |---------|-------|----------|
//! | network / 5xx | up to 3 retries, backoff 1s·2ⁿ capped at 30s | never retried |
//! | 429 | up to 2 retries, same backoff | never retried |
//! | other 4xx | not retried | never retried |
//!
//! On terminal failure a [`Notice`] goes to the [`Notifier`] unless the status
//! is in the silent set (`400, 401, 403, 409, 422` by default). Auth failures
//! tear the session down instead of notifying.

use crate::envelope::ApiResponse;
use crate::error::{Error, Result};
use crate::session::SessionGate;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Statuses whose failures the caller renders itself.
pub const DEFAULT_SILENT_STATUSES: [u16; 5] = [400, 401, 403, 409, 422];

/// Whether an operation may be repeated safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Read-only; retried per policy.
    Query,
    /// Create / update / delete; never retried.
    Mutation,
}

/// Retry and backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries for HTTP 429.
    pub rate_limit_retries: u32,
    /// Retries for network failures and 5xx.
    pub transient_retries: u32,
    /// First backoff delay.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            rate_limit_retries: 2,
            transient_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        RetryPolicy {
            rate_limit_retries: 0,
            transient_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_transient_retries(mut self, retries: u32) -> Self {
        self.transient_retries = retries;
        self
    }

    pub fn with_rate_limit_retries(mut self, retries: u32) -> Self {
        self.rate_limit_retries = retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    /// Delay before the `retry`-th retry (1-based): `base · 2^(retry-1)`,
    /// capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before retrying after `error`, given `retries` already made.
    /// `None` means the failure is terminal.
    pub fn delay_for(&self, kind: OperationKind, error: &Error, retries: u32) -> Option<Duration> {
        if kind == OperationKind::Mutation {
            return None;
        }
        let budget = match error {
            Error::RateLimited { .. } => self.rate_limit_retries,
            Error::Network(_) | Error::Server { .. } => self.transient_retries,
            _ => return None,
        };
        (retries < budget).then(|| self.backoff(retries + 1))
    }
}

/// User-visible notice raised on terminal failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    /// Operation label, e.g. `"GET /inventory/national"`.
    pub operation: String,
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
}

impl Notice {
    pub fn from_error(operation: &str, error: &Error) -> Self {
        Notice {
            operation: operation.to_string(),
            message: error.message(),
            status: error.status(),
            code: error.code().map(str::to_string),
        }
    }
}

/// Sink for user-visible notices (toasts in a UI, stderr in a CLI).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Notifier that writes notices to the log.
#[derive(Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.status {
            Some(status) => warn!("{} failed ({}): {}", notice.operation, status, notice.message),
            None => warn!("{} failed: {}", notice.operation, notice.message),
        }
    }
}

/// Remote fetch adapter.
///
/// Cheap to clone; clones share the notifier and session gate.
#[derive(Clone)]
pub struct RemoteFetcher {
    retry: RetryPolicy,
    silent_statuses: Arc<HashSet<u16>>,
    notifier: Arc<dyn Notifier>,
    session: Arc<SessionGate>,
}

impl RemoteFetcher {
    pub fn new(retry: RetryPolicy, notifier: Arc<dyn Notifier>, session: Arc<SessionGate>) -> Self {
        RemoteFetcher {
            retry,
            silent_statuses: Arc::new(DEFAULT_SILENT_STATUSES.into_iter().collect()),
            notifier,
            session,
        }
    }

    /// Replace the silent-status set.
    pub fn with_silent_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.silent_statuses = Arc::new(statuses.into_iter().collect());
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn session(&self) -> &Arc<SessionGate> {
        &self.session
    }

    pub fn is_silent(&self, error: &Error) -> bool {
        error
            .status()
            .is_some_and(|status| self.silent_statuses.contains(&status))
    }

    /// Run `producer` until it succeeds or fails terminally.
    ///
    /// # Errors
    /// Returns the last normalised error once the retry budget is spent or
    /// the failure is not retryable.
    pub async fn run<T, F, Fut>(&self, kind: OperationKind, operation: &str, producer: F) -> Result<T>
    where
        T: Default,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ApiResponse<T>>>,
    {
        let mut retries = 0;
        loop {
            let outcome = producer().await.and_then(ApiResponse::into_result);
            let error = match outcome {
                Ok(data) => return Ok(data),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) => error,
            };

            match self.retry.delay_for(kind, &error, retries) {
                Some(delay) => {
                    retries += 1;
                    debug!(
                        "{} failed (retry {} in {:?}): {}",
                        operation, retries, delay, error
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    self.surface(operation, &error);
                    return Err(error);
                }
            }
        }
    }

    fn surface(&self, operation: &str, error: &Error) {
        if error.is_auth() {
            self.session.teardown(error);
            return;
        }
        if self.is_silent(error) {
            debug!("{} failed with handled status: {}", operation, error);
            return;
        }
        self.notifier.notify(&Notice::from_error(operation, error));
    }
}
