//! Entity groups: the named categories that own a subtree of cache keys.

use crate::error::{Error, Result};
use crate::key::KeyFactory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named category of related cache keys.
///
/// Every [`CacheKey`](crate::CacheKey) starts with its group, which is what
/// makes prefix-based bulk invalidation possible.
///
/// # Example
///
/// ```
/// use tlm_cache::EntityGroup;
///
/// let group: EntityGroup = "localCouncils".parse().unwrap();
/// assert_eq!(group, EntityGroup::LocalCouncils);
/// assert_eq!(group.as_str(), "localCouncils");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityGroup {
    Users,
    Items,
    Schools,
    LocalCouncils,
    Warehouses,
    Inventory,
    Shipments,
    Distributions,
    Dashboard,
    Admin,
    Notifications,
    Reports,
}

impl EntityGroup {
    /// Every group, in declaration order.
    pub const ALL: [EntityGroup; 12] = [
        EntityGroup::Users,
        EntityGroup::Items,
        EntityGroup::Schools,
        EntityGroup::LocalCouncils,
        EntityGroup::Warehouses,
        EntityGroup::Inventory,
        EntityGroup::Shipments,
        EntityGroup::Distributions,
        EntityGroup::Dashboard,
        EntityGroup::Admin,
        EntityGroup::Notifications,
        EntityGroup::Reports,
    ];

    /// Key prefix for this group.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityGroup::Users => "users",
            EntityGroup::Items => "items",
            EntityGroup::Schools => "schools",
            EntityGroup::LocalCouncils => "localCouncils",
            EntityGroup::Warehouses => "warehouses",
            EntityGroup::Inventory => "inventory",
            EntityGroup::Shipments => "shipments",
            EntityGroup::Distributions => "distributions",
            EntityGroup::Dashboard => "dashboard",
            EntityGroup::Admin => "admin",
            EntityGroup::Notifications => "notifications",
            EntityGroup::Reports => "reports",
        }
    }

    /// Groups that go stale together with this one.
    ///
    /// This is the direct edge list only; see
    /// [`invalidation::closure`](crate::invalidation::closure) for the
    /// transitive set.
    pub fn dependents(&self) -> &'static [EntityGroup] {
        crate::invalidation::dependents(*self)
    }

    /// Key factory rooted at this group.
    pub fn keys(self) -> KeyFactory {
        KeyFactory::new(self)
    }
}

impl fmt::Display for EntityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityGroup {
    type Err = Error;

    /// Accepts the key prefix, plus singular forms used by mutation payloads
    /// (`"shipment"`, `"item"`, `"localCouncil"`).
    fn from_str(s: &str) -> Result<Self> {
        let group = match s {
            "users" | "user" => EntityGroup::Users,
            "items" | "item" => EntityGroup::Items,
            "schools" | "school" => EntityGroup::Schools,
            "localCouncils" | "localCouncil" => EntityGroup::LocalCouncils,
            "warehouses" | "warehouse" => EntityGroup::Warehouses,
            "inventory" => EntityGroup::Inventory,
            "shipments" | "shipment" => EntityGroup::Shipments,
            "distributions" | "distribution" => EntityGroup::Distributions,
            "dashboard" => EntityGroup::Dashboard,
            "admin" => EntityGroup::Admin,
            "notifications" | "notification" => EntityGroup::Notifications,
            "reports" | "report" => EntityGroup::Reports,
            other => {
                return Err(Error::ConfigError(format!(
                    "Unknown entity group: {}",
                    other
                )))
            }
        };
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_prefix_round_trip() {
        for group in EntityGroup::ALL {
            assert_eq!(group.as_str().parse::<EntityGroup>().unwrap(), group);
        }
    }

    #[test]
    fn test_singular_aliases() {
        assert_eq!("shipment".parse::<EntityGroup>().unwrap(), EntityGroup::Shipments);
        assert_eq!(
            "localCouncil".parse::<EntityGroup>().unwrap(),
            EntityGroup::LocalCouncils
        );
    }

    #[test]
    fn test_unknown_group() {
        let err = "stock".parse::<EntityGroup>().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_serde_uses_prefix() {
        let json = serde_json::to_string(&EntityGroup::LocalCouncils).unwrap();
        assert_eq!(json, "\"localCouncils\"");
    }
}
