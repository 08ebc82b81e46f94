//! Performance benchmarks for tlm-cache
//!
//! This benchmark suite measures:
//! - Cache key construction with filter normalisation
//! - Invalidation planning across a populated key space
//! - Cached query hits through the query client
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::hint::black_box;
use tlm_cache::invalidation::{InvalidationPlan, MutationDescriptor};
use tlm_cache::store::query_fn;
use tlm_cache::{CacheKey, CacheStrategy, ClientConfig, EntityGroup, QueryClient};

// ============================================================================
// Fixtures
// ============================================================================

fn key_space(size: usize) -> Vec<CacheKey> {
    (0..size)
        .map(|i| {
            let group = EntityGroup::ALL[i % EntityGroup::ALL.len()];
            if i % 2 == 0 {
                group.keys().detail(i as i64)
            } else {
                group
                    .keys()
                    .list(&json!({"page": i, "search": "chalk"}))
                    .unwrap_or_else(|_| group.keys().lists())
            }
        })
        .collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_key_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_construction");

    group.bench_function("detail", |b| {
        b.iter(|| black_box(EntityGroup::Inventory.keys().scope("national").detail(black_box(99))))
    });

    for props in [1usize, 4, 16] {
        let filters: serde_json::Map<String, serde_json::Value> =
            (0..props).map(|i| (format!("f{}", i), json!(i))).collect();
        group.bench_with_input(BenchmarkId::new("list", props), &filters, |b, filters| {
            b.iter(|| black_box(EntityGroup::Schools.keys().list(filters)))
        });
    }
    group.finish();
}

fn bench_invalidation_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidation_plan");
    for size in [100usize, 1_000, 10_000] {
        let keys = key_space(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &keys, |b, keys| {
            b.iter(|| {
                let plan =
                    InvalidationPlan::for_mutation(&MutationDescriptor::entity(EntityGroup::Shipments, 7));
                black_box(keys.iter().filter(|key| plan.matches(key)).count())
            })
        });
    }
    group.finish();
}

fn bench_cached_query(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let client = QueryClient::new(ClientConfig::default());
    let key = EntityGroup::Dashboard.keys().sub("kpi");
    let fetch = query_fn(|| async { Ok(json!({"totalSchools": 1200, "pendingShipments": 14})) });

    rt.block_on(async {
        client
            .query(&key, &fetch, CacheStrategy::Refresh)
            .await
            .unwrap();
    });

    c.bench_function("query_refresh_hit", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                client
                    .query(&key, &fetch, CacheStrategy::Refresh)
                    .await
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_key_construction,
    bench_invalidation_plan,
    bench_cached_query
);
criterion_main!(benches);
