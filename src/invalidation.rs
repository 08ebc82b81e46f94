//! Invalidation router: which cache keys go stale after a mutation.
//!
//! The router is a static adjacency table (entity group → groups that depend
//! on it) plus a closure computation. A mutation of one group marks every key
//! under the transitive closure stale. Confirming a shipment, for example,
//! changes stock levels and KPI aggregates, so `shipments` reaches
//! `inventory` and `dashboard`.
//!
//! When the mutation names an entity id, detail keys of the *mutated* group
//! that address a different id stay fresh. List keys of that group are always
//! invalidated because membership or ordering may have changed.
//!
//! ```
//! use tlm_cache::invalidation::{closure, InvalidationPlan, MutationDescriptor};
//! use tlm_cache::{key, EntityGroup};
//!
//! let groups = closure(EntityGroup::Shipments);
//! assert!(groups.contains(&EntityGroup::Inventory));
//! assert!(groups.contains(&EntityGroup::Dashboard));
//!
//! let plan = InvalidationPlan::for_mutation(&MutationDescriptor::entity(EntityGroup::Inventory, 42));
//! assert!(plan.matches(&key::dashboard_kpi()));
//! assert!(!plan.matches(&key::inventory_national_detail(99)));
//! ```

use crate::entity::EntityGroup;
use crate::key::{CacheKey, EntityId};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// Direct dependents of each group.
pub fn dependents(group: EntityGroup) -> &'static [EntityGroup] {
    use EntityGroup::*;
    match group {
        Users => &[Admin],
        Items => &[Inventory, Dashboard],
        Schools => &[Distributions, Dashboard],
        LocalCouncils => &[Schools, Dashboard],
        Warehouses => &[Inventory, Dashboard],
        Inventory => &[Dashboard],
        Shipments => &[Inventory, Dashboard],
        Distributions => &[Shipments, Inventory, Dashboard],
        Dashboard => &[],
        Admin => &[Users],
        Notifications => &[],
        Reports => &[],
    }
}

/// Transitive closure of `group` over [`dependents`], including `group`.
pub fn closure(group: EntityGroup) -> BTreeSet<EntityGroup> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([group]);
    while let Some(next) = queue.pop_front() {
        if seen.insert(next) {
            queue.extend(dependents(next).iter().copied());
        }
    }
    seen
}

/// What a completed mutation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationDescriptor {
    pub group: EntityGroup,
    pub id: Option<EntityId>,
}

impl MutationDescriptor {
    /// Mutation affecting the whole group (bulk import, create).
    pub fn group(group: EntityGroup) -> Self {
        MutationDescriptor { group, id: None }
    }

    /// Mutation of one entity.
    pub fn entity(group: EntityGroup, id: impl Into<EntityId>) -> Self {
        MutationDescriptor {
            group,
            id: Some(id.into()),
        }
    }
}

impl fmt::Display for MutationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}#{}", self.group, id),
            None => write!(f, "{}", self.group),
        }
    }
}

/// Closure of affected groups plus the detail-level exemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    origin: MutationDescriptor,
    groups: BTreeSet<EntityGroup>,
}

impl InvalidationPlan {
    pub fn for_mutation(mutation: &MutationDescriptor) -> Self {
        InvalidationPlan {
            origin: mutation.clone(),
            groups: closure(mutation.group),
        }
    }

    pub fn groups(&self) -> &BTreeSet<EntityGroup> {
        &self.groups
    }

    pub fn origin(&self) -> &MutationDescriptor {
        &self.origin
    }

    /// Whether `key` must be marked stale by this plan.
    pub fn matches(&self, key: &CacheKey) -> bool {
        if !self.groups.contains(&key.group()) {
            return false;
        }
        if key.group() != self.origin.group {
            return true;
        }
        match (&self.origin.id, key.detail_id()) {
            (Some(id), Some(detail)) => detail == id.as_str(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key;
    use serde_json::json;

    #[test]
    fn test_closure_includes_origin() {
        for group in EntityGroup::ALL {
            assert!(closure(group).contains(&group));
        }
    }

    #[test]
    fn test_shipment_closure() {
        let groups = closure(EntityGroup::Shipments);
        assert_eq!(
            groups,
            BTreeSet::from([
                EntityGroup::Shipments,
                EntityGroup::Inventory,
                EntityGroup::Dashboard
            ])
        );
    }

    #[test]
    fn test_closure_is_transitive() {
        // localCouncils → schools → distributions → shipments → inventory
        let groups = closure(EntityGroup::LocalCouncils);
        assert!(groups.contains(&EntityGroup::Schools));
        assert!(groups.contains(&EntityGroup::Distributions));
        assert!(groups.contains(&EntityGroup::Shipments));
        assert!(groups.contains(&EntityGroup::Inventory));
    }

    #[test]
    fn test_closure_terminates_on_cycles() {
        let groups = closure(EntityGroup::Users);
        assert_eq!(groups, BTreeSet::from([EntityGroup::Users, EntityGroup::Admin]));
    }

    #[test]
    fn test_leaf_groups() {
        assert_eq!(closure(EntityGroup::Dashboard).len(), 1);
        assert_eq!(closure(EntityGroup::Notifications).len(), 1);
    }

    #[test]
    fn test_plan_without_id_hits_all_keys_in_closure() {
        let plan = InvalidationPlan::for_mutation(&MutationDescriptor::group(EntityGroup::Shipments));
        assert!(plan.matches(&EntityGroup::Shipments.keys().detail(3)));
        assert!(plan.matches(&key::inventory_national(&json!({"page": 1})).unwrap()));
        assert!(plan.matches(&key::inventory_national_detail(99)));
        assert!(plan.matches(&key::dashboard_kpi()));
        assert!(!plan.matches(&EntityGroup::Schools.keys().lists()));
    }

    #[test]
    fn test_plan_with_id_spares_unrelated_details() {
        let plan =
            InvalidationPlan::for_mutation(&MutationDescriptor::entity(EntityGroup::Inventory, 42));
        assert!(plan.matches(&key::inventory_national(&json!({})).unwrap()));
        assert!(plan.matches(&key::inventory_national_detail(42)));
        assert!(!plan.matches(&key::inventory_national_detail(99)));
        assert!(plan.matches(&key::dashboard_kpi()));
    }

    #[test]
    fn test_plan_with_id_hits_all_dependent_details() {
        let plan =
            InvalidationPlan::for_mutation(&MutationDescriptor::entity(EntityGroup::Shipments, 5));
        assert!(!plan.matches(&EntityGroup::Shipments.keys().detail(6)));
        assert!(plan.matches(&key::inventory_national_detail(6)));
    }

    #[test]
    fn test_descriptor_display() {
        assert_eq!(
            MutationDescriptor::entity(EntityGroup::Items, 42).to_string(),
            "items#42"
        );
        assert_eq!(MutationDescriptor::group(EntityGroup::Items).to_string(), "items");
    }
}
