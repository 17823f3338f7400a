//! Event store throughput benchmarks.
//!
//! Each append takes the fingerprint write lock and touches two partition
//! files, so these numbers are dominated by the filesystem.
//!
//! # Groups
//!
//! | Group | What it measures |
//! |-------|-----------------|
//! | `append` | Fresh appends and duplicate rejection |
//! | `query` | Reading a week's partition, with and without a level filter |
//! | `initialize` | Re-seeding fingerprints from existing partitions |
//!
//! # Viewing results
//!
//! ```sh
//! cargo bench --bench store_bench
//! open target/criterion/report/index.html
//! ```

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeMap;
use std::hint::black_box;
use std::path::PathBuf;
use unilog_core::types::{Details, ErrorDetails, InfoDetails};
use unilog_core::{Category, CategoryFilter, Event, EventStore, Source, Week};

const W27: Week = Week { year: 2025, week: 27 };

fn events(n: usize) -> Vec<Event> {
    let base = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let (level, details) = if i % 5 == 0 {
                ("error", Details::Error(ErrorDetails::default()))
            } else {
                ("info", Details::Info(InfoDetails::default()))
            };
            Event {
                source: Source::Primary,
                level: level.to_string(),
                timestamp: base + Duration::milliseconds(i as i64),
                message: format!("bench event {i}"),
                origin: PathBuf::from("/srv/node_logs/app.log"),
                details,
                extra: BTreeMap::new(),
            }
        })
        .collect()
}

fn populated(n: usize) -> (tempfile::TempDir, EventStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::open(dir.path(), None).unwrap();
    for e in events(n) {
        store.append(&e).unwrap();
    }
    (dir, store)
}

// ---------------------------------------------------------------------------
// Append
// ---------------------------------------------------------------------------

fn append_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for n in [100usize, 1_000] {
        let batch = events(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("fresh", n), &batch, |b, batch| {
            b.iter_batched(
                || {
                    let dir = tempfile::tempdir().unwrap();
                    let store = EventStore::open(dir.path(), None).unwrap();
                    (dir, store)
                },
                |(_dir, store)| {
                    for e in batch {
                        store.append(e).unwrap();
                    }
                },
                BatchSize::PerIteration,
            )
        });
    }

    let (_dir, store) = populated(1_000);
    let seen = events(1_000);
    group.throughput(Throughput::Elements(seen.len() as u64));
    group.bench_function("duplicate_1k", |b| {
        b.iter(|| seen.iter().filter(|e| !store.append(e).unwrap()).count())
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

fn query_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for n in [1_000usize, 10_000] {
        let (_dir, store) = populated(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(BenchmarkId::new("all", n), |b| {
            b.iter(|| black_box(store.query(CategoryFilter::All, None, Some(W27)).unwrap()))
        });
        group.bench_function(BenchmarkId::new("error_level", n), |b| {
            b.iter(|| {
                black_box(
                    store
                        .query(CategoryFilter::Only(Category::Error), Some("error"), Some(W27))
                        .unwrap(),
                )
            })
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Initialize
// ---------------------------------------------------------------------------

fn initialize_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("initialize");

    let (dir, _store) = populated(10_000);
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("reseed_10k", |b| {
        b.iter(|| {
            let store = EventStore::open(dir.path(), None).unwrap();
            black_box(store.initialize().unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, append_bench, query_bench, initialize_bench);
criterion_main!(benches);
