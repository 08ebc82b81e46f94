//! HttpTransport against a local axum server.

#![cfg(feature = "http")]

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use tlm_cache::{Api, ApiConfig, ApiRequest, ClientConfig, Error, HttpTransport, QueryClient, Transport};

async fn spawn_server() -> String {
    let app = Router::new()
        .route(
            "/api/items",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let search = params.get("search").cloned().unwrap_or_default();
                Json(json!({
                    "success": true,
                    "data": [{"id": 1, "name": "Chalk", "search": search, "filters": params.len()}],
                    "pagination": {"total": 1, "page": 1, "limit": 20, "totalPages": 1},
                }))
            }),
        )
        .route(
            "/api/items/{id}",
            get(|Path(id): Path<u32>| async move {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "success": false,
                        "error": {"message": format!("Item {} not found", id), "code": "NOT_FOUND"}
                    })),
                )
            })
            .delete(|| async { StatusCode::NO_CONTENT }),
        )
        .route(
            "/api/whoami",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({"success": true, "data": auth}))
            }),
        )
        .route(
            "/api/gateway",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        )
        .route("/api/html", get(|| async { "<html>ok</html>" }))
        .route(
            "/api/remote-failure",
            get(|| async {
                Json(json!({"success": false, "error": {"message": "Quota exceeded", "code": "QUOTA"}}))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

async fn transport() -> HttpTransport {
    let base = spawn_server().await;
    HttpTransport::new(&ApiConfig::new(base).unwrap()).unwrap()
}

#[tokio::test]
async fn test_success_envelope_and_query_params() {
    let transport = transport().await;
    let request = ApiRequest::get("/items")
        .with_filters(&json!({"search": "chalk", "category": null}))
        .unwrap();
    let response = transport.send(request).await.unwrap();
    assert!(response.success);
    let data = response.data.unwrap();
    assert_eq!(data[0]["name"], "Chalk");
    // Null filters are not sent.
    assert_eq!(data[0]["search"], "chalk");
    assert_eq!(data[0]["filters"], 1);
    assert_eq!(response.pagination.unwrap().total, 1);
}

#[tokio::test]
async fn test_error_status_uses_envelope_message() {
    let transport = transport().await;
    let err = transport.send(ApiRequest::get("/items/9")).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), Some("NOT_FOUND"));
    assert_eq!(err.message(), "Item 9 not found");
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let transport = transport().await;
    let err = transport.send(ApiRequest::get("/gateway")).await.unwrap_err();
    assert!(matches!(err, Error::Server { status: 502, .. }));
    assert_eq!(err.message(), "upstream down");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_no_content_is_success() {
    let transport = transport().await;
    let response = transport.send(ApiRequest::delete("/items/3")).await.unwrap();
    assert!(response.success);
    assert!(response.data.is_none());
}

#[tokio::test]
async fn test_non_envelope_body_is_rejected() {
    let transport = transport().await;
    let err = transport.send(ApiRequest::get("/html")).await.unwrap_err();
    assert!(matches!(err, Error::DeserializationError(_)));
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let transport = transport().await;
    transport.set_token(Some("secret-token".to_string()));
    let response = transport.send(ApiRequest::get("/whoami")).await.unwrap();
    assert_eq!(response.data, Some(json!("Bearer secret-token")));

    transport.set_token(None);
    let response = transport.send(ApiRequest::get("/whoami")).await.unwrap();
    assert_eq!(response.data, Some(json!("")));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Nothing listens on port 9 locally.
    let transport = HttpTransport::new(&ApiConfig::new("http://127.0.0.1:9/api").unwrap()).unwrap();
    let err = transport.send(ApiRequest::get("/items")).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));
}

#[tokio::test]
async fn test_api_folds_pagination_and_surfaces_remote_failure() {
    let transport = transport().await;
    let client = QueryClient::new(ClientConfig::default());
    let api = Api::new(client, transport);

    let page: Value = api
        .query(&tlm_cache::endpoints::ITEMS.list(&()).unwrap())
        .await
        .unwrap();
    assert_eq!(page["items"][0]["id"], 1);
    assert_eq!(page["pagination"]["totalPages"], 1);

    let failure = tlm_cache::Query::new(
        tlm_cache::EntityGroup::Reports.keys().sub("remote-failure"),
        ApiRequest::get("/remote-failure"),
    );
    let err = api.query::<Value>(&failure).await.unwrap_err();
    assert_eq!(
        err,
        Error::Remote {
            message: "Quota exceeded".to_string(),
            code: Some("QUOTA".to_string())
        }
    );
}
