//! Microbenchmarks for the `add()` hot path and cursor reads.
//!
//! Run with: `cargo bench -p debugmon -- add`

#![allow(missing_docs, clippy::cast_possible_wrap)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use debugmon::id::{EntryId, SequenceGenerator};
use debugmon::store::Store;
use debugmon::{Manager, MonitorConfig};

fn bench_add_snowflake(c: &mut Criterion) {
    let store: Store<u64> = Store::new(1000);
    let mut n = 0u64;

    c.bench_function("add/snowflake", |b| {
        b.iter(|| {
            n += 1;
            store.add(black_box(n)).unwrap();
        });
    });
}

fn bench_add_counter(c: &mut Criterion) {
    let store = Store::with_generator(1000, SequenceGenerator::new());
    let mut n = 0u64;

    c.bench_function("add/counter", |b| {
        b.iter(|| {
            n += 1;
            store.add(black_box(n)).unwrap();
        });
    });
}

fn bench_add_with_subscribers(c: &mut Criterion) {
    let mut group = c.benchmark_group("add/subscribers");

    for count in [1, 10, 100] {
        let store = Store::with_generator(1000, SequenceGenerator::new());
        // Never drained: every notification past the first few hits a full queue.
        let _subscriptions: Vec<_> = (0..count).map(|_| store.subscribe_add()).collect();
        let mut n = 0u64;

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                n += 1;
                store.add(black_box(n)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_monitor_json(c: &mut Criterion) {
    let manager = Manager::new();
    let requests = manager
        .add_monitor(MonitorConfig::new("requests"))
        .unwrap();

    c.bench_function("add/monitor_json", |b| {
        b.iter(|| {
            requests
                .add(black_box(&serde_json::json!({
                    "method": "GET",
                    "uri": "/api/users",
                    "status": 200,
                    "duration_ms": 12,
                })))
                .unwrap();
        });
    });
}

fn bench_since(c: &mut Criterion) {
    let mut group = c.benchmark_group("since/tail");
    let store = Store::with_generator(1000, SequenceGenerator::new());
    for n in 0..5000u64 {
        store.add(n).unwrap();
    }
    let newest = store.newest_id().unwrap().get();

    for tail in [1usize, 100, 1000] {
        let cursor = EntryId::new(newest - tail as i64);
        group.bench_with_input(BenchmarkId::from_parameter(tail), &cursor, |b, cursor| {
            b.iter(|| black_box(store.since(*cursor)));
        });
    }

    // Evicted cursor takes the binary search path.
    group.bench_function("evicted", |b| {
        b.iter(|| black_box(store.since(EntryId::new(10))));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_add_snowflake,
    bench_add_counter,
    bench_add_with_subscribers,
    bench_monitor_json,
    bench_since,
);
criterion_main!(benches);
