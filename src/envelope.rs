//! Response envelope shared by every collaborator API endpoint.
//!
//! ```text
//! { "success": bool, "data"?: T, "error"?: { "message", "code"? },
//!   "pagination"?: { "total", "page", "limit", "totalPages" } }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body carried by a failed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Pagination block of list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// Envelope `{success, data, error, pagination}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Unwrapped list payload with its pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Paginated {
            items: Vec::new(),
            pagination: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            pagination: None,
        }
    }

    pub fn failure(message: impl Into<String>, code: Option<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiErrorBody {
                message: message.into(),
                code,
            }),
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Server-supplied message, falling back to a generic one.
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Request failed".to_string())
    }

    pub fn error_code(&self) -> Option<String> {
        self.error.as_ref().and_then(|e| e.code.clone())
    }
}

impl<T: Default> ApiResponse<T> {
    /// Unwrap `data` on `success: true`; fail with the server-supplied
    /// message and code otherwise.
    ///
    /// A successful envelope without `data` (e.g. `204`-style mutations)
    /// yields `T::default()`.
    ///
    /// # Errors
    /// Returns `Error::Remote` when `success` is false.
    pub fn into_result(self) -> Result<T> {
        if self.success {
            Ok(self.data.unwrap_or_default())
        } else {
            Err(Error::Remote {
                message: self.error_message(),
                code: self.error_code(),
            })
        }
    }
}

impl ApiResponse<Value> {
    /// Decode the untyped envelope into a typed one.
    ///
    /// # Errors
    /// Returns `Error::DeserializationError` if `data` has the wrong shape.
    pub fn decode<T: DeserializeOwned>(self) -> Result<ApiResponse<T>> {
        let data = match self.data {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| Error::DeserializationError(e.to_string()))?,
            ),
            None => None,
        };
        Ok(ApiResponse {
            success: self.success,
            data,
            error: self.error,
            pagination: self.pagination,
        })
    }

    /// Fold `pagination` into the payload as `{items, pagination}` so list
    /// queries cache both under one key.
    pub fn with_pagination_folded(self) -> Self {
        match (self.pagination, self.data) {
            (Some(pagination), Some(Value::Array(items))) => ApiResponse {
                success: self.success,
                data: Some(serde_json::json!({
                    "items": items,
                    "pagination": pagination,
                })),
                error: self.error,
                pagination: Some(pagination),
            },
            (pagination, data) => ApiResponse {
                success: self.success,
                data,
                error: self.error,
                pagination,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let resp: ApiResponse<Value> =
            serde_json::from_value(json!({"success": true, "data": {"id": 1}})).unwrap();
        assert_eq!(resp.into_result().unwrap(), json!({"id": 1}));
    }

    #[test]
    fn test_failure_envelope_carries_message_and_code() {
        let resp: ApiResponse<Value> = serde_json::from_value(json!({
            "success": false,
            "error": {"message": "Insufficient stock", "code": "STOCK_LOW"}
        }))
        .unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(
            err,
            Error::Remote {
                message: "Insufficient stock".to_string(),
                code: Some("STOCK_LOW".to_string()),
            }
        );
    }

    #[test]
    fn test_failure_without_error_body() {
        let resp: ApiResponse<Value> = serde_json::from_value(json!({"success": false})).unwrap();
        assert_eq!(resp.into_result().unwrap_err().message(), "Request failed");
    }

    #[test]
    fn test_pagination_camel_case() {
        let resp: ApiResponse<Value> = serde_json::from_value(json!({
            "success": true,
            "data": [],
            "pagination": {"total": 45, "page": 2, "limit": 20, "totalPages": 3}
        }))
        .unwrap();
        assert_eq!(resp.pagination.unwrap().total_pages, 3);
    }

    #[test]
    fn test_fold_pagination() {
        let resp = ApiResponse::ok(json!([{"id": 1}])).with_pagination(Pagination {
            total: 1,
            page: 1,
            limit: 20,
            total_pages: 1,
        });
        let folded = resp.with_pagination_folded().into_result().unwrap();
        let page: Paginated<Value> = serde_json::from_value(folded).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.pagination.unwrap().total, 1);
    }

    #[test]
    fn test_decode_typed() {
        #[derive(Debug, Default, Deserialize, PartialEq)]
        struct Kpi {
            shipments: u32,
        }
        let typed = ApiResponse::ok(json!({"shipments": 4}))
            .decode::<Kpi>()
            .unwrap();
        assert_eq!(typed.into_result().unwrap(), Kpi { shipments: 4 });
    }
}
