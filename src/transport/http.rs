//! reqwest transport.

use super::Transport;
use crate::api::{ApiRequest, Method};
use crate::config::ApiConfig;
use crate::envelope::ApiResponse;
use crate::error::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// HTTP transport against the collaborator API.
///
/// Clones share the connection pool and the bearer token.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Arc<str>,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpTransport {
    /// # Errors
    /// Returns `Error::ConfigError` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        Ok(HttpTransport {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer token sent with every request; `None` signs out.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn builder(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Patch => self.client.patch(url),
            Method::Delete => self.client.delete(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = self.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse<Value>>> + Send {
        let builder = self.builder(&request);
        async move {
            let response = builder.send().await?;
            let status = response.status();
            if status.as_u16() == 204 {
                return Ok(ApiResponse {
                    success: true,
                    data: None,
                    error: None,
                    pagination: None,
                });
            }

            let text = response.text().await?;
            let envelope = serde_json::from_str::<ApiResponse<Value>>(&text).ok();
            if status.is_success() {
                return envelope.ok_or_else(|| {
                    Error::DeserializationError(format!(
                        "{} returned a body that is not an API envelope",
                        request.label()
                    ))
                });
            }

            let (message, code) = match envelope {
                Some(envelope) => (envelope.error_message(), envelope.error_code()),
                None if !text.trim().is_empty() => (text, None),
                None => (
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string(),
                    None,
                ),
            };
            Err(Error::from_status(status.as_u16(), message, code))
        }
    }
}
