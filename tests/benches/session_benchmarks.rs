//! # Session Core Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Handle cache | cached `get` by name, id, compound key |
//! | Event bridge | event-name parsing |
//! | Access lists | membership per representation |
//! | Queries | predicate evaluation over documents |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use og_bus::DbEventName;
use og_session_core::{
    AccessList, DatabaseHandleCache, EventBridge, InMemoryStore, OpenParams, PeerDirectory,
    QuerySpec,
};
use og_types::DbKind;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// HANDLE CACHE
// ============================================================================

fn bench_handle_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle-cache");
    group.measurement_time(Duration::from_secs(5));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(_) => return,
    };
    let cache = DatabaseHandleCache::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(PeerDirectory::new()),
    );
    let params = OpenParams::of_kind(DbKind::Keyvalue).create();
    let mut keys = Vec::new();
    for n in 0..100 {
        let name = format!("db-{n}");
        if let Ok(handle) = runtime.block_on(cache.get(&name, &params)) {
            keys.push((name, handle.id().to_string(), handle.address().compound_key()));
        }
    }
    let Some((name, id, compound)) = keys.last().cloned() else {
        return;
    };

    group.bench_function("cached_get_by_name", |b| {
        b.iter(|| black_box(runtime.block_on(cache.get(&name, &params)).is_ok()))
    });
    group.bench_function("find_by_id", |b| b.iter(|| black_box(cache.find(&id).is_some())));
    group.bench_function("find_by_compound_key", |b| {
        b.iter(|| black_box(cache.find(&compound).is_some()))
    });

    group.finish();
}

// ============================================================================
// EVENT BRIDGE
// ============================================================================

fn bench_event_names(c: &mut Criterion) {
    let mut group = c.benchmark_group("event-bridge");

    for names in ["write", "write,closed", "replicated,replicate,load,ready,write,closed,peer"] {
        group.bench_with_input(BenchmarkId::new("parse_names", names), &names, |b, names| {
            b.iter(|| black_box(EventBridge::parse_names::<DbEventName>(names).is_ok()))
        });
    }

    group.finish();
}

// ============================================================================
// ACCESS LISTS
// ============================================================================

fn bench_access_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("access-lists");

    for size in [10usize, 100, 1000] {
        let ids: Vec<String> = (0..size).map(|n| format!("identity-{n}")).collect();
        let probe = format!("identity-{}", size - 1);
        let keyed = AccessList::Keyed(ids.iter().map(|id| (id.clone(), json!({}))).collect());
        let set = AccessList::Set(ids.iter().cloned().collect());
        let array = AccessList::Array(ids);

        group.throughput(Throughput::Elements(size as u64));
        for (label, list) in [("keyed", &keyed), ("set", &set), ("array", &array)] {
            group.bench_with_input(BenchmarkId::new(label, size), list, |b, list| {
                b.iter(|| black_box(list.permits(&probe)))
            });
        }
    }

    group.finish();
}

// ============================================================================
// QUERIES
// ============================================================================

fn bench_query_predicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("query-predicates");

    let docs: Vec<_> = (0..1000)
        .map(|n| json!({"_id": format!("doc-{n}"), "score": n, "tag": format!("t{}", n % 7)}))
        .collect();
    group.throughput(Throughput::Elements(docs.len() as u64));

    for (comp, propname, values) in [
        ("gt", "score", vec![json!(500)]),
        ("range", "score", vec![json!(100), json!(200)]),
        ("eq", "tag", vec![json!("t3")]),
        ("mod", "score", vec![json!(3), json!(0)]),
    ] {
        let spec = QuerySpec {
            comp: Some(comp.to_string()),
            propname: Some(propname.to_string()),
            values,
        };
        let Ok(predicate) = spec.predicate() else {
            continue;
        };
        group.bench_function(comp, |b| {
            b.iter(|| black_box(docs.iter().filter(|doc| predicate.matches(doc)).count()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_handle_cache,
    bench_event_names,
    bench_access_lists,
    bench_query_predicates,
);

criterion_main!(benches);
