//! Property-based tests for cache keys and the invalidation router.
//!
//! # Properties Tested
//!
//! 1. **Order independence**: the declaration order of filter fields never
//!    changes a key
//! 2. **Null dropping**: `null` filter properties never reach a key
//! 3. **Prefix containment**: every list key sits under its group's prefixes
//! 4. **Closure**: a mutation always reaches its own group's list keys and
//!    never reaches groups outside the closure

use proptest::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use tlm_cache::invalidation::{closure, InvalidationPlan, MutationDescriptor};
use tlm_cache::EntityGroup;

// ============================================================================
// Strategies
// ============================================================================

fn filter_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ]
}

fn filters() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-z][a-zA-Z]{0,7}", filter_value(), 0..6)
        .prop_map(|map| map.into_iter().collect())
}

/// Filters serialized in declaration order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StockFilters {
    search: Option<String>,
    page: u32,
    warehouse_id: Option<i64>,
    low_stock: bool,
}

/// Same filters, fields declared in reverse.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StockFiltersReordered {
    low_stock: bool,
    warehouse_id: Option<i64>,
    page: u32,
    search: Option<String>,
}

impl From<&StockFilters> for StockFiltersReordered {
    fn from(f: &StockFilters) -> Self {
        StockFiltersReordered {
            low_stock: f.low_stock,
            warehouse_id: f.warehouse_id,
            page: f.page,
            search: f.search.clone(),
        }
    }
}

fn stock_filters() -> impl Strategy<Value = StockFilters> {
    (
        proptest::option::of("[a-z]{1,8}"),
        1u32..500,
        proptest::option::of(1i64..10_000),
        any::<bool>(),
    )
        .prop_map(|(search, page, warehouse_id, low_stock)| StockFilters {
            search,
            page,
            warehouse_id,
            low_stock,
        })
}

fn group() -> impl Strategy<Value = EntityGroup> {
    prop::sample::select(EntityGroup::ALL.to_vec())
}

fn object(pairs: impl IntoIterator<Item = (String, Value)>) -> Value {
    Value::Object(pairs.into_iter().collect::<Map<String, Value>>())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_filter_order_is_irrelevant(group in group(), filters in stock_filters()) {
        let reordered = StockFiltersReordered::from(&filters);

        let a = group.keys().list(&filters).unwrap();
        let b = group.keys().list(&reordered).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn prop_null_filters_are_dropped(group in group(), pairs in filters(), extra in "[a-z]{9,12}") {
        let plain = object(pairs.clone());
        let with_null = object(pairs.into_iter().chain([(extra, Value::Null)]));

        prop_assert_eq!(
            group.keys().list(&plain).unwrap(),
            group.keys().list(&with_null).unwrap()
        );
    }

    #[test]
    fn prop_list_keys_under_group_prefixes(group in group(), pairs in filters()) {
        let keys = group.keys();
        let list = keys.list(&object(pairs)).unwrap();
        prop_assert!(list.starts_with(&keys.lists()));
        prop_assert!(list.starts_with(&keys.all()));
        prop_assert!(list.is_list());
    }

    #[test]
    fn prop_mutation_reaches_closure_only(origin in group(), target in group(), id in 1i64..10_000) {
        let plan = InvalidationPlan::for_mutation(&MutationDescriptor::entity(origin, id));
        let list = target.keys().list(&()).unwrap();
        prop_assert_eq!(plan.matches(&list), closure(origin).contains(&target));

        let own_detail = origin.keys().detail(id);
        prop_assert!(plan.matches(&own_detail));
    }
}
