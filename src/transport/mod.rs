//! Transport to the collaborator API.
//!
//! A [`Transport`] sends one [`ApiRequest`] and returns the decoded
//! [`ApiResponse`] envelope, or a normalised [`Error`] when no envelope could
//! be obtained (connection failure, non-2xx status). Retrying is the remote
//! fetch adapter's job, never the transport's.
//!
//! Implementations:
//! - [`HttpTransport`]: reqwest client against the configured base URL.
//! - [`MockTransport`]: scripted in-memory responses for tests and demos.
//!
//! [`Error`]: crate::Error

use crate::api::ApiRequest;
use crate::envelope::ApiResponse;
use crate::error::Result;
use serde_json::Value;
use std::future::Future;

#[cfg(feature = "http")]
pub mod http;
pub mod mock;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use mock::MockTransport;

/// Sends requests to the collaborator API.
///
/// The returned future must be `Send` so query functions can run on any
/// runtime worker.
pub trait Transport: Send + Sync + Clone + 'static {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse<Value>>> + Send;
}
