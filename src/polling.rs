//! Realtime polling of observed keys.
//!
//! A key with [`PollingOptions`] is re-fetched every `polling_interval` while
//! it has at least one observer and `enable_realtime` is set. A tick is
//! skipped when a fetch for the key is still in flight, so slow responses
//! never pile up. After each completed poll the new value is compared with
//! the previous one and `on_data_change` fires when they differ.

use crate::client::{ClientInner, PollTick};
use crate::key::CacheKey;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// `(previous, current) -> equal`
pub type CompareFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// `(current, previous)`
pub type DataChangeFn = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

#[derive(Clone)]
pub struct PollingOptions {
    pub polling_interval: Duration,
    pub enable_realtime: bool,
    pub on_data_change: Option<DataChangeFn>,
    pub compare_data: CompareFn,
}

impl Default for PollingOptions {
    fn default() -> Self {
        PollingOptions {
            polling_interval: Duration::from_secs(30),
            enable_realtime: true,
            on_data_change: None,
            compare_data: Arc::new(|previous, current| previous == current),
        }
    }
}

impl PollingOptions {
    pub fn every(polling_interval: Duration) -> Self {
        PollingOptions {
            polling_interval,
            ..Self::default()
        }
    }

    pub fn with_realtime(mut self, enabled: bool) -> Self {
        self.enable_realtime = enabled;
        self
    }

    pub fn on_data_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        self.on_data_change = Some(Arc::new(f));
        self
    }

    pub fn compare_data<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.compare_data = Arc::new(f);
        self
    }

    /// Polling runs only with realtime enabled and a non-zero interval.
    pub fn is_active(&self) -> bool {
        self.enable_realtime && !self.polling_interval.is_zero()
    }

    fn notify_change(&self, previous: Option<&Value>, current: &Value) {
        let (Some(previous), Some(callback)) = (previous, &self.on_data_change) else {
            return;
        };
        if !(self.compare_data)(previous, current) {
            callback(current, previous);
        }
    }
}

impl fmt::Debug for PollingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingOptions")
            .field("polling_interval", &self.polling_interval)
            .field("enable_realtime", &self.enable_realtime)
            .field("on_data_change", &self.on_data_change.is_some())
            .finish()
    }
}

/// Spawn the poll loop for `key`. The task ends when the client is dropped
/// or the key is removed; the client aborts it when observers drop to zero.
pub(crate) fn spawn(client: Weak<ClientInner>, key: CacheKey, options: PollingOptions) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = options.polling_interval;
        let Some(first) = Instant::now().checked_add(period) else {
            return;
        };
        let mut ticker = tokio::time::interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Polling {} every {:?}", key, period);

        loop {
            ticker.tick().await;
            let Some(inner) = client.upgrade() else {
                break;
            };
            let (previous, fetch) = match inner.poll_tick(&key) {
                PollTick::Gone => break,
                PollTick::Busy => {
                    trace!("Skipping poll of {}: fetch in flight", key);
                    continue;
                }
                PollTick::Started { previous, fetch } => (previous, fetch),
            };
            drop(inner);

            match fetch.await {
                Ok(current) => options.notify_change(previous.as_ref(), &current),
                Err(e) => debug!("Poll of {} failed: {}", key, e),
            }
        }
        debug!("Polling of {} stopped", key);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_defaults() {
        let options = PollingOptions::default();
        assert!(options.is_active());
        assert_eq!(options.polling_interval, Duration::from_secs(30));
        assert!(!PollingOptions::default().with_realtime(false).is_active());
        assert!(!PollingOptions::every(Duration::ZERO).is_active());
    }

    #[test]
    fn test_change_callback_needs_previous_value() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = PollingOptions::default().on_data_change(move |current, previous| {
            sink.lock().unwrap().push((current.clone(), previous.clone()));
        });

        options.notify_change(None, &json!(1));
        options.notify_change(Some(&json!(1)), &json!(1));
        options.notify_change(Some(&json!(1)), &json!(2));

        assert_eq!(*seen.lock().unwrap(), vec![(json!(2), json!(1))]);
    }

    #[test]
    fn test_custom_comparator() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let options = PollingOptions::default()
            .compare_data(|a, b| a["count"] == b["count"])
            .on_data_change(move |_, _| *counter.lock().unwrap() += 1);

        options.notify_change(Some(&json!({"count": 1, "at": 1})), &json!({"count": 1, "at": 2}));
        assert_eq!(*calls.lock().unwrap(), 0);
        options.notify_change(Some(&json!({"count": 1})), &json!({"count": 2}));
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
