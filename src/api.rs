//! Typed query and mutation descriptions plus the [`Api`] facade that binds
//! them to a [`Transport`] and a [`QueryClient`].
//!
//! A [`Query`] pairs a cache key with the request that fills it. A
//! [`Mutation`] pairs a request with the [`MutationDescriptor`] that drives
//! invalidation once it succeeds.

use crate::client::QueryClient;
use crate::config::QueryOptions;
use crate::error::{Error, Result};
use crate::invalidation::MutationDescriptor;
use crate::key::CacheKey;
use crate::observer::{Observer, Subscription};
use crate::remote::OperationKind;
use crate::store::{EntrySnapshot, QueryFn};
use crate::strategy::CacheStrategy;
use crate::transport::Transport;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collaborator API call, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Append every non-null field of `filters` as a query parameter.
    ///
    /// # Errors
    /// Returns `Error::SerializationError` if `filters` is not an object.
    pub fn with_filters<F: Serialize + ?Sized>(mut self, filters: &F) -> Result<Self> {
        self.query.extend(query_pairs(filters)?);
        Ok(self)
    }

    /// # Errors
    /// Returns `Error::SerializationError` if `body` cannot be encoded.
    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let body = serde_json::to_value(body).map_err(|e| Error::SerializationError(e.to_string()))?;
        self.body = Some(body);
        Ok(self)
    }

    /// `"GET /items"`, used in logs and notices.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Flatten a filter object into `(name, value)` pairs. Nulls are skipped,
/// strings are passed raw, everything else as compact JSON.
///
/// # Errors
/// Returns `Error::SerializationError` if `filters` is not an object.
pub fn query_pairs<F: Serialize + ?Sized>(filters: &F) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(filters).map_err(|e| Error::SerializationError(e.to_string()))?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((name, s)),
                other => Some((name, other.to_string())),
            })
            .collect()),
        other => Err(Error::SerializationError(format!(
            "Filters must be an object, got {}",
            other
        ))),
    }
}

/// A cacheable read.
#[derive(Debug, Clone)]
pub struct Query {
    pub key: CacheKey,
    pub request: ApiRequest,
    pub options: QueryOptions,
    pub strategy: CacheStrategy,
}

impl Query {
    pub fn new(key: CacheKey, request: ApiRequest) -> Self {
        Query {
            key,
            request,
            options: QueryOptions::default(),
            strategy: CacheStrategy::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// A write and the cache state it affects.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub request: ApiRequest,
    pub affects: MutationDescriptor,
}

impl Mutation {
    pub fn new(request: ApiRequest, affects: MutationDescriptor) -> Self {
        Mutation { request, affects }
    }
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R> {
    serde_json::from_value(value).map_err(|e| Error::DeserializationError(e.to_string()))
}

/// Collaborator API bound to one transport and one cache.
#[derive(Clone)]
pub struct Api<T: Transport> {
    client: QueryClient,
    transport: T,
}

impl<T: Transport> Api<T> {
    pub fn new(client: QueryClient, transport: T) -> Self {
        Api { client, transport }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Query function running `request` through the remote fetch adapter.
    /// List payloads come back as `{items, pagination}`.
    pub fn query_fn(&self, request: ApiRequest) -> QueryFn {
        let transport = self.transport.clone();
        let remote = self.client.remote().clone();
        Arc::new(move || {
            let transport = transport.clone();
            let remote = remote.clone();
            let request = request.clone();
            async move {
                let label = request.label();
                remote
                    .run(OperationKind::Query, &label, || {
                        let response = transport.send(request.clone());
                        async move { response.await.map(|r| r.with_pagination_folded()) }
                    })
                    .await
            }
            .boxed()
        })
    }

    /// # Errors
    /// Returns the terminal fetch error or `Error::DeserializationError`.
    pub async fn query<R: DeserializeOwned>(&self, query: &Query) -> Result<R> {
        let query_fn = self.query_fn(query.request.clone());
        let value = self
            .client
            .query_with(&query.key, &query_fn, &query.options, query.strategy)
            .await?;
        decode(value)
    }

    /// Stale-while-revalidate read; never waits for the network.
    pub fn read(&self, query: &Query) -> EntrySnapshot {
        let query_fn = self.query_fn(query.request.clone());
        self.client.read_with(&query.key, &query_fn, &query.options)
    }

    pub fn subscribe(&self, query: &Query, observer: Observer) -> Subscription {
        let query_fn = self.query_fn(query.request.clone());
        self.client
            .subscribe(&query.key, &query_fn, &query.options, observer)
    }

    /// Run a write once (never retried) without touching the cache.
    ///
    /// # Errors
    /// Returns the normalised error of the write.
    pub async fn execute(&self, mutation: &Mutation) -> Result<Value> {
        let label = mutation.request.label();
        self.client
            .remote()
            .run(OperationKind::Mutation, &label, || {
                self.transport.send(mutation.request.clone())
            })
            .await
    }

    /// Run a write once (never retried) and invalidate what it affects.
    ///
    /// # Errors
    /// Returns the write's error; nothing is invalidated in that case.
    pub async fn mutate<R: DeserializeOwned>(&self, mutation: &Mutation) -> Result<R> {
        let value = self.execute(mutation).await?;
        self.client.invalidate(&mutation.affects);
        decode(value)
    }

    /// [`mutate`](Self::mutate) with an optimistic update of `key`.
    ///
    /// `reducer` computes the optimistic value from the current one. On
    /// failure the previous value is restored unless a newer value has
    /// replaced the optimistic one meanwhile. On success invalidation
    /// refetches the authoritative value.
    ///
    /// # Errors
    /// Returns the write's error after rolling back.
    pub async fn mutate_optimistic<R, F>(&self, mutation: &Mutation, key: &CacheKey, reducer: F) -> Result<R>
    where
        R: DeserializeOwned,
        F: FnOnce(Option<&Value>) -> Option<Value> + Send,
    {
        let previous = self.client.peek(key).and_then(|snapshot| snapshot.value);
        let written = reducer(previous.as_ref()).map(|value| self.client.write(key, value));

        match self.execute(mutation).await {
            Ok(value) => {
                self.client.invalidate(&mutation.affects);
                decode(value)
            }
            Err(error) => {
                if let Some(generation) = written {
                    if self.client.rollback(key, generation, previous) {
                        debug!("Rolled back optimistic update of {}", key);
                    }
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_skip_nulls() {
        let pairs = query_pairs(&json!({"search": "chalk", "page": 2, "category": null})).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "2".to_string()),
                ("search".to_string(), "chalk".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_rejects_scalars() {
        assert!(matches!(
            query_pairs(&json!(5)),
            Err(Error::SerializationError(_))
        ));
        assert!(query_pairs(&()).unwrap().is_empty());
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::get("/items")
            .with_param("page", 1)
            .with_filters(&json!({"status": "active"}))
            .unwrap();
        assert_eq!(request.label(), "GET /items");
        assert_eq!(request.query.len(), 2);

        let request = ApiRequest::post("/shipments/5/confirm")
            .with_body(&json!({"note": "ok"}))
            .unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, Some(json!({"note": "ok"})));
    }
}
