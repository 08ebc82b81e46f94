//! Typed endpoint builders for the collaborator APIs.
//!
//! Every builder returns a [`Query`] (cache key + request) or a [`Mutation`]
//! (request + invalidation descriptor); run them through [`Api`].
//!
//! ```
//! use tlm_cache::endpoints::{inventory, ITEMS};
//! use serde_json::json;
//!
//! let query = ITEMS.list(&json!({"search": "chalk"})).unwrap();
//! assert_eq!(query.request.path, "/items");
//!
//! let adjust = inventory::perform_stock_adjustment(&inventory::StockAdjustment::increase(42, 3, 10)).unwrap();
//! assert_eq!(adjust.affects.to_string(), "inventory#42");
//! ```
//!
//! [`Api`]: crate::Api

use crate::api::{ApiRequest, Mutation, Query};
use crate::entity::EntityGroup;
use crate::error::Result;
use crate::invalidation::MutationDescriptor;
use crate::key::EntityId;
use serde::Serialize;

/// A plain CRUD collection (`GET /items`, `GET /items/{id}`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub group: EntityGroup,
    pub path: &'static str,
}

pub const USERS: Resource = Resource::new(EntityGroup::Users, "/users");
pub const ITEMS: Resource = Resource::new(EntityGroup::Items, "/items");
pub const SCHOOLS: Resource = Resource::new(EntityGroup::Schools, "/schools");
pub const LOCAL_COUNCILS: Resource = Resource::new(EntityGroup::LocalCouncils, "/local-councils");
pub const WAREHOUSES: Resource = Resource::new(EntityGroup::Warehouses, "/warehouses");
pub const SHIPMENTS: Resource = Resource::new(EntityGroup::Shipments, "/shipments");
pub const DISTRIBUTIONS: Resource = Resource::new(EntityGroup::Distributions, "/distributions");

impl Resource {
    pub const fn new(group: EntityGroup, path: &'static str) -> Self {
        Resource { group, path }
    }

    fn item_path(&self, id: &EntityId) -> String {
        format!("{}/{}", self.path, id)
    }

    /// # Errors
    /// Returns `Err` if `filters` is not a JSON object.
    pub fn list<F: Serialize + ?Sized>(&self, filters: &F) -> Result<Query> {
        Ok(Query::new(
            self.group.keys().list(filters)?,
            ApiRequest::get(self.path).with_filters(filters)?,
        ))
    }

    pub fn detail(&self, id: impl Into<EntityId>) -> Query {
        let id: EntityId = id.into();
        Query::new(
            self.group.keys().detail(id.clone()),
            ApiRequest::get(self.item_path(&id)),
        )
    }

    /// # Errors
    /// Returns `Err` if `body` cannot be encoded.
    pub fn create<B: Serialize + ?Sized>(&self, body: &B) -> Result<Mutation> {
        Ok(Mutation::new(
            ApiRequest::post(self.path).with_body(body)?,
            MutationDescriptor::group(self.group),
        ))
    }

    /// # Errors
    /// Returns `Err` if `body` cannot be encoded.
    pub fn update<B: Serialize + ?Sized>(&self, id: impl Into<EntityId>, body: &B) -> Result<Mutation> {
        let id: EntityId = id.into();
        Ok(Mutation::new(
            ApiRequest::put(self.item_path(&id)).with_body(body)?,
            MutationDescriptor::entity(self.group, id),
        ))
    }

    pub fn delete(&self, id: impl Into<EntityId>) -> Mutation {
        let id: EntityId = id.into();
        Mutation::new(
            ApiRequest::delete(self.item_path(&id)),
            MutationDescriptor::entity(self.group, id),
        )
    }
}

pub mod inventory {
    use super::*;
    use crate::key;
    use serde::Deserialize;

    /// `GET /inventory/national`
    ///
    /// # Errors
    /// Returns `Err` if `filters` is not a JSON object.
    pub fn national<F: Serialize + ?Sized>(filters: &F) -> Result<Query> {
        Ok(Query::new(
            key::inventory_national(filters)?,
            ApiRequest::get("/inventory/national").with_filters(filters)?,
        ))
    }

    /// `GET /inventory/national/{item_id}`
    pub fn national_detail(item_id: impl Into<EntityId>) -> Query {
        let item_id: EntityId = item_id.into();
        Query::new(
            key::inventory_national_detail(item_id.clone()),
            ApiRequest::get(format!("/inventory/national/{}", item_id)),
        )
    }

    /// `GET /inventory/warehouse/{warehouse_id}`
    ///
    /// # Errors
    /// Returns `Err` if `filters` is not a JSON object.
    pub fn warehouse<F: Serialize + ?Sized>(warehouse_id: impl Into<EntityId>, filters: &F) -> Result<Query> {
        let warehouse_id: EntityId = warehouse_id.into();
        Ok(Query::new(
            key::inventory_warehouse(warehouse_id.clone(), filters)?,
            ApiRequest::get(format!("/inventory/warehouse/{}", warehouse_id)).with_filters(filters)?,
        ))
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum AdjustmentType {
        Increase,
        Decrease,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StockAdjustment {
        pub item_id: i64,
        pub warehouse_id: i64,
        pub adjustment_type: AdjustmentType,
        pub quantity: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub reason: Option<String>,
    }

    impl StockAdjustment {
        pub fn increase(item_id: i64, warehouse_id: i64, quantity: u32) -> Self {
            StockAdjustment {
                item_id,
                warehouse_id,
                adjustment_type: AdjustmentType::Increase,
                quantity,
                reason: None,
            }
        }

        pub fn decrease(item_id: i64, warehouse_id: i64, quantity: u32) -> Self {
            StockAdjustment {
                adjustment_type: AdjustmentType::Decrease,
                ..Self::increase(item_id, warehouse_id, quantity)
            }
        }

        pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
            self.reason = Some(reason.into());
            self
        }
    }

    /// `POST /inventory/adjustments`; invalidates the item's inventory and
    /// the dashboard.
    ///
    /// # Errors
    /// Returns `Err` if the adjustment cannot be encoded.
    pub fn perform_stock_adjustment(adjustment: &StockAdjustment) -> Result<Mutation> {
        Ok(Mutation::new(
            ApiRequest::post("/inventory/adjustments").with_body(adjustment)?,
            MutationDescriptor::entity(EntityGroup::Inventory, adjustment.item_id),
        ))
    }
}

pub mod shipments {
    use super::*;

    /// # Errors
    /// Returns `Err` if `filters` is not a JSON object.
    pub fn list<F: Serialize + ?Sized>(filters: &F) -> Result<Query> {
        SHIPMENTS.list(filters)
    }

    pub fn detail(id: impl Into<EntityId>) -> Query {
        SHIPMENTS.detail(id)
    }

    /// # Errors
    /// Returns `Err` if `body` cannot be encoded.
    pub fn create<B: Serialize + ?Sized>(body: &B) -> Result<Mutation> {
        SHIPMENTS.create(body)
    }

    /// `POST /shipments/{id}/confirm`: receipt moves stock, so inventory and
    /// dashboard go stale with the shipment.
    pub fn confirm_shipment(id: impl Into<EntityId>) -> Mutation {
        let id: EntityId = id.into();
        Mutation::new(
            ApiRequest::post(format!("/shipments/{}/confirm", id)),
            MutationDescriptor::entity(EntityGroup::Shipments, id),
        )
    }

    pub fn cancel_shipment(id: impl Into<EntityId>) -> Mutation {
        let id: EntityId = id.into();
        Mutation::new(
            ApiRequest::post(format!("/shipments/{}/cancel", id)),
            MutationDescriptor::entity(EntityGroup::Shipments, id),
        )
    }
}

pub mod distributions {
    use super::*;

    /// # Errors
    /// Returns `Err` if `filters` is not a JSON object.
    pub fn list<F: Serialize + ?Sized>(filters: &F) -> Result<Query> {
        DISTRIBUTIONS.list(filters)
    }

    pub fn detail(id: impl Into<EntityId>) -> Query {
        DISTRIBUTIONS.detail(id)
    }

    /// # Errors
    /// Returns `Err` if `body` cannot be encoded.
    pub fn create<B: Serialize + ?Sized>(body: &B) -> Result<Mutation> {
        DISTRIBUTIONS.create(body)
    }

    /// `PATCH /distributions/{id}/status`
    ///
    /// # Errors
    /// Returns `Err` if the body cannot be encoded.
    pub fn update_status(id: impl Into<EntityId>, status: &str) -> Result<Mutation> {
        let id: EntityId = id.into();
        Ok(Mutation::new(
            ApiRequest::patch(format!("/distributions/{}/status", id))
                .with_body(&serde_json::json!({ "status": status }))?,
            MutationDescriptor::entity(EntityGroup::Distributions, id),
        ))
    }
}

pub mod dashboard {
    use super::*;
    use crate::key;

    /// `GET /dashboard/kpi`
    pub fn kpi() -> Query {
        Query::new(key::dashboard_kpi(), ApiRequest::get("/dashboard/kpi"))
    }
}

pub mod notifications {
    use super::*;
    use crate::config::QueryOptions;
    use crate::key;
    use serde::Deserialize;

    /// Server-side filters of the notification list. `None` fields are
    /// omitted from both the request and the cache key.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NotificationFilters {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub priority: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub search: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub dismissed: Option<bool>,
    }

    /// `GET /notifications?page&limit&unreadOnly&...`
    ///
    /// # Errors
    /// Returns `Err` if the filters cannot be encoded.
    pub fn list(page: u32, limit: u32, unread_only: bool, filters: &NotificationFilters) -> Result<Query> {
        Ok(Query::new(
            key::notifications_list(page, limit, unread_only, filters)?,
            ApiRequest::get("/notifications")
                .with_param("page", page)
                .with_param("limit", limit)
                .with_param("unreadOnly", unread_only)
                .with_filters(filters)?,
        ))
    }

    /// `GET /notifications/categories`, cached for the whole session.
    pub fn categories() -> Query {
        Query::new(
            key::notification_categories(),
            ApiRequest::get("/notifications/categories"),
        )
        .with_options(QueryOptions::default().session_lifetime())
    }

    /// `GET /notifications/unread-count`
    pub fn unread_count() -> Query {
        Query::new(
            key::notification_unread_count(),
            ApiRequest::get("/notifications/unread-count"),
        )
    }

    /// `PATCH /notifications/{id}/read`
    pub fn mark_as_read(id: impl Into<EntityId>) -> Mutation {
        let id: EntityId = id.into();
        Mutation::new(
            ApiRequest::patch(format!("/notifications/{}/read", id)),
            MutationDescriptor::entity(EntityGroup::Notifications, id),
        )
    }

    /// `PATCH /notifications/read-all`
    pub fn mark_all_as_read() -> Mutation {
        Mutation::new(
            ApiRequest::patch("/notifications/read-all"),
            MutationDescriptor::group(EntityGroup::Notifications),
        )
    }
}

pub mod reports {
    use super::*;

    /// `GET /reports`
    ///
    /// # Errors
    /// Returns `Err` if `filters` is not a JSON object.
    pub fn list<F: Serialize + ?Sized>(filters: &F) -> Result<Query> {
        Ok(Query::new(
            EntityGroup::Reports.keys().list(filters)?,
            ApiRequest::get("/reports").with_filters(filters)?,
        ))
    }

    /// `POST /reports/generate`; generation is never retried.
    ///
    /// # Errors
    /// Returns `Err` if `request` cannot be encoded.
    pub fn generate<B: Serialize + ?Sized>(request: &B) -> Result<Mutation> {
        Ok(Mutation::new(
            ApiRequest::post("/reports/generate").with_body(request)?,
            MutationDescriptor::group(EntityGroup::Reports),
        ))
    }
}
