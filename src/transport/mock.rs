//! Scripted in-memory transport.
//!
//! Routes are matched on method and path (query parameters are recorded but
//! not matched). One-shot replies queued with [`MockTransport::once`] are
//! consumed first, then the standing reply set with [`MockTransport::on`].
//! Unrouted requests fail with 404.

use super::Transport;
use crate::api::{ApiRequest, Method};
use crate::envelope::{ApiResponse, Pagination};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One scripted answer.
#[derive(Debug, Clone)]
pub struct Reply {
    outcome: Result<ApiResponse<Value>>,
    delay: Duration,
}

impl Reply {
    /// Successful envelope carrying `data`.
    pub fn data(data: Value) -> Self {
        Self::envelope(ApiResponse::ok(data))
    }

    /// Successful list envelope with pagination.
    pub fn page(items: Vec<Value>, pagination: Pagination) -> Self {
        Self::envelope(ApiResponse::ok(Value::Array(items)).with_pagination(pagination))
    }

    pub fn envelope(envelope: ApiResponse<Value>) -> Self {
        Reply {
            outcome: Ok(envelope),
            delay: Duration::ZERO,
        }
    }

    /// Transport-level failure (network error or non-2xx status).
    pub fn error(error: Error) -> Self {
        Reply {
            outcome: Err(error),
            delay: Duration::ZERO,
        }
    }

    /// Non-2xx status with the server's message.
    pub fn status(status: u16, message: &str) -> Self {
        Self::error(Error::from_status(status, message, None))
    }

    /// Resolve only after `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct Route {
    queued: VecDeque<Reply>,
    standing: Option<Reply>,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(Method, String), Route>,
    calls: Vec<ApiRequest>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Answer every request to `method path` with `reply`.
    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.with_state(|state| {
            state
                .routes
                .entry((method, path.to_string()))
                .or_default()
                .standing = Some(reply);
        });
        self
    }

    /// Answer the next request to `method path` with `reply`.
    pub fn once(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.with_state(|state| {
            state
                .routes
                .entry((method, path.to_string()))
                .or_default()
                .queued
                .push_back(reply);
        });
        self
    }

    /// Every request sent so far, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.with_state(|state| state.calls.clone())
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.with_state(|state| {
            state
                .calls
                .iter()
                .filter(|call| call.method == method && call.path == path)
                .count()
        })
    }

    pub fn reset_calls(&self) {
        self.with_state(|state| state.calls.clear());
    }

    fn next_reply(&self, request: &ApiRequest) -> Reply {
        self.with_state(|state| {
            state.calls.push(request.clone());
            let route = state
                .routes
                .get_mut(&(request.method, request.path.clone()));
            match route {
                Some(route) => route
                    .queued
                    .pop_front()
                    .or_else(|| route.standing.clone())
                    .unwrap_or_else(|| Reply::status(404, "No scripted reply left")),
                None => Reply::status(404, &format!("No route for {}", request.label())),
            }
        })
    }
}

impl Transport for MockTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse<Value>>> + Send {
        let reply = self.next_reply(&request);
        trace!("Mock {} -> {:?}", request.label(), reply.outcome.as_ref().map(|r| r.success));
        async move {
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            reply.outcome
        }
    }
}
