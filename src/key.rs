//! Cache key management: structural keys and the per-group key factory.
//!
//! A [`CacheKey`] is an entity group followed by an ordered list of segments.
//! Equality is structural. Filter objects are normalised into a sorted map of
//! canonical JSON values, so two filter objects with the same properties
//! produce equal keys regardless of the order the properties were written in.
//!
//! ```
//! use tlm_cache::EntityGroup;
//! use serde_json::json;
//!
//! let a = EntityGroup::Inventory.keys().scope("national").list(&json!({"page": 1, "limit": 20})).unwrap();
//! let b = EntityGroup::Inventory.keys().scope("national").list(&json!({"limit": 20, "page": 1})).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.to_string(), "inventory:national:list:{limit=20,page=1}");
//! ```

use crate::entity::EntityGroup;
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Marker segment preceding list-level discriminators.
pub const LIST: &str = "list";

/// Marker segment preceding a detail-level entity id.
pub const DETAIL: &str = "detail";

/// One segment of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Str(String),
    Int(i64),
    /// Normalised filter object: property name → canonical JSON text.
    Filters(BTreeMap<String, String>),
}

impl KeySegment {
    /// Id form of a scalar segment (`99`, `"abc"`), used for detail matching.
    pub fn as_id(&self) -> Option<String> {
        match self {
            KeySegment::Str(s) => Some(s.clone()),
            KeySegment::Int(i) => Some(i.to_string()),
            KeySegment::Filters(_) => None,
        }
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Str(s) => f.write_str(s),
            KeySegment::Int(i) => write!(f, "{}", i),
            KeySegment::Filters(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for KeySegment {
    fn from(s: &str) -> Self {
        KeySegment::Str(s.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(s: String) -> Self {
        KeySegment::Str(s)
    }
}

impl From<i64> for KeySegment {
    fn from(i: i64) -> Self {
        KeySegment::Int(i)
    }
}

impl From<u32> for KeySegment {
    fn from(i: u32) -> Self {
        KeySegment::Int(i64::from(i))
    }
}

impl From<i32> for KeySegment {
    fn from(i: i32) -> Self {
        KeySegment::Int(i64::from(i))
    }
}

/// Entity id accepted by detail keys and mutation descriptors.
///
/// Numeric and string ids compare by their textual form, so `99` and `"99"`
/// address the same detail entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segment(&self) -> KeySegment {
        match self.0.parse::<i64>() {
            Ok(i) => KeySegment::Int(i),
            Err(_) => KeySegment::Str(self.0.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for EntityId {
    fn from(i: i64) -> Self {
        EntityId(i.to_string())
    }
}

impl From<u32> for EntityId {
    fn from(i: u32) -> Self {
        EntityId(i.to_string())
    }
}

impl From<i32> for EntityId {
    fn from(i: i32) -> Self {
        EntityId(i.to_string())
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId(s)
    }
}

/// Hierarchical cache key. The group is always the first component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    group: EntityGroup,
    segments: Vec<KeySegment>,
}

impl CacheKey {
    /// Group-level key (`["inventory"]`).
    pub fn new(group: EntityGroup) -> Self {
        CacheKey {
            group,
            segments: Vec::new(),
        }
    }

    pub fn group(&self) -> EntityGroup {
        self.group
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    /// Append a segment.
    pub fn push(mut self, segment: impl Into<KeySegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Append a normalised filter segment.
    ///
    /// # Errors
    /// Returns `Err` if `filters` does not serialize to a JSON object (or null).
    pub fn with_filters<F: Serialize + ?Sized>(mut self, filters: &F) -> Result<Self> {
        self.segments.push(KeySegment::Filters(normalize_filters(filters)?));
        Ok(self)
    }

    /// True when `prefix` is this key or one of its ancestors.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.group == prefix.group && self.segments.starts_with(&prefix.segments)
    }

    /// Detail-level keys carry a `detail` marker followed by an id.
    pub fn is_detail(&self) -> bool {
        self.detail_id().is_some()
    }

    /// Id addressed by a detail-level key.
    pub fn detail_id(&self) -> Option<String> {
        self.segments
            .windows(2)
            .find(|pair| pair[0] == KeySegment::Str(DETAIL.to_string()))
            .and_then(|pair| pair[1].as_id())
    }

    /// Anything that is not a detail key is list-level: its membership or
    /// ordering may change when any entity of the group changes.
    pub fn is_list(&self) -> bool {
        !self.is_detail()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group.as_str())?;
        for segment in &self.segments {
            write!(f, ":{}", segment)?;
        }
        Ok(())
    }
}

/// Normalise a filter object into a sorted property map.
///
/// `null` properties are dropped so `{search: None}` and `{}` are the same
/// filter. Values are stored as canonical JSON text (object keys sorted).
///
/// # Errors
/// Returns `Err` if `filters` serializes to anything other than an object or null.
pub fn normalize_filters<F: Serialize + ?Sized>(filters: &F) -> Result<BTreeMap<String, String>> {
    let value = serde_json::to_value(filters)
        .map_err(|e| Error::SerializationError(e.to_string()))?;
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(map) => map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                serde_json::to_string(&v)
                    .map(|text| (k, text))
                    .map_err(|e| Error::SerializationError(e.to_string()))
            })
            .collect(),
        other => Err(Error::SerializationError(format!(
            "Filters must be an object, got: {}",
            other
        ))),
    }
}

/// Builds keys under one entity group.
///
/// ```
/// use tlm_cache::EntityGroup;
///
/// let detail = EntityGroup::Inventory.keys().scope("national").detail(99);
/// assert_eq!(detail.to_string(), "inventory:national:detail:99");
/// assert_eq!(detail.detail_id().as_deref(), Some("99"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFactory {
    base: CacheKey,
}

impl KeyFactory {
    pub fn new(group: EntityGroup) -> Self {
        KeyFactory {
            base: CacheKey::new(group),
        }
    }

    /// Narrow the factory to a sub-resource (`inventory` → `inventory:national`).
    pub fn scope(&self, segment: impl Into<KeySegment>) -> Self {
        KeyFactory {
            base: self.base.clone().push(segment),
        }
    }

    /// Root key of the factory; prefix of everything it builds.
    pub fn all(&self) -> CacheKey {
        self.base.clone()
    }

    /// Prefix of every list key.
    pub fn lists(&self) -> CacheKey {
        self.base.clone().push(LIST)
    }

    /// List key discriminated by a filter object.
    ///
    /// # Errors
    /// Returns `Err` if `filters` does not serialize to a JSON object.
    pub fn list<F: Serialize + ?Sized>(&self, filters: &F) -> Result<CacheKey> {
        self.lists().with_filters(filters)
    }

    /// Prefix of every detail key.
    pub fn details(&self) -> CacheKey {
        self.base.clone().push(DETAIL)
    }

    pub fn detail(&self, id: impl Into<EntityId>) -> CacheKey {
        let id: EntityId = id.into();
        self.details().push(id.segment())
    }

    /// Named singleton under the factory (`dashboard:kpi`).
    pub fn sub(&self, name: &str) -> CacheKey {
        self.base.clone().push(name)
    }
}

// ============================================================================
// Named keys used by the endpoint builders
// ============================================================================

/// `inventory:national:list:{filters}`
///
/// # Errors
/// Returns `Err` if `filters` does not serialize to a JSON object.
pub fn inventory_national<F: Serialize + ?Sized>(filters: &F) -> Result<CacheKey> {
    EntityGroup::Inventory.keys().scope("national").list(filters)
}

/// `inventory:national:detail:{item_id}`
pub fn inventory_national_detail(item_id: impl Into<EntityId>) -> CacheKey {
    EntityGroup::Inventory.keys().scope("national").detail(item_id)
}

/// `inventory:warehouse:{warehouse_id}:list:{filters}`
///
/// # Errors
/// Returns `Err` if `filters` does not serialize to a JSON object.
pub fn inventory_warehouse<F: Serialize + ?Sized>(
    warehouse_id: impl Into<EntityId>,
    filters: &F,
) -> Result<CacheKey> {
    let warehouse_id: EntityId = warehouse_id.into();
    EntityGroup::Inventory
        .keys()
        .scope("warehouse")
        .scope(warehouse_id.segment())
        .list(filters)
}

/// `dashboard:kpi`
pub fn dashboard_kpi() -> CacheKey {
    EntityGroup::Dashboard.keys().sub("kpi")
}

/// `notifications:list:{page,limit,unreadOnly,...filters}`
///
/// # Errors
/// Returns `Err` if `filters` does not serialize to a JSON object.
pub fn notifications_list<F: Serialize + ?Sized>(
    page: u32,
    limit: u32,
    unread_only: bool,
    filters: &F,
) -> Result<CacheKey> {
    let mut normalized = normalize_filters(filters)?;
    normalized.insert("page".to_string(), page.to_string());
    normalized.insert("limit".to_string(), limit.to_string());
    normalized.insert("unreadOnly".to_string(), unread_only.to_string());
    Ok(EntityGroup::Notifications
        .keys()
        .lists()
        .push(KeySegment::Filters(normalized)))
}

/// `notifications:categories`
pub fn notification_categories() -> CacheKey {
    EntityGroup::Notifications.keys().sub("categories")
}

/// `notifications:unreadCount`
pub fn notification_unread_count() -> CacheKey {
    EntityGroup::Notifications.keys().sub("unreadCount")
}
