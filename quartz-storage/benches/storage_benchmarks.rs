//! Benchmarks for the RocksDB-backed persistence layer: append throughput
//! at various batch sizes, term/vote durability round-trips, and snapshot
//! save/load.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quartz_core::raft::{LogEntry, PersistentStore, SnapshotMeta};
use quartz_core::{Command, ServerId};
use quartz_storage::RaftStore;
use tempfile::TempDir;

fn open_store() -> (RaftStore, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let store = RaftStore::open(dir.path()).expect("failed to open store");
    (store, dir)
}

fn insert_entry(index: u64) -> LogEntry {
    LogEntry {
        term: 1,
        index,
        command: Command::Insert {
            vector: vec![1.0, 2.0, 3.0, 4.0],
            id: Some(index),
            level: 0,
        },
    }
}

fn bench_append_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_entries");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for batch_size in [1usize, 16, 64] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &batch_size| {
            let (store, _dir) = open_store();
            let mut next_index = 0u64;
            b.to_async(&rt).iter(|| {
                let entries: Vec<LogEntry> = (0..batch_size as u64)
                    .map(|i| insert_entry(next_index + i))
                    .collect();
                next_index += batch_size as u64;
                let store = &store;
                async move {
                    store.append_entries(black_box(&entries)).await.unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_save_term_vote(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, _dir) = open_store();
    let mut term = 0u64;

    c.bench_function("save_term_vote", |b| {
        b.to_async(&rt).iter(|| {
            term += 1;
            let store = &store;
            async move {
                store
                    .save_term_vote(black_box(term), Some(ServerId::new("bench-node")))
                    .await
                    .unwrap();
            }
        });
    });
}

fn bench_save_and_load_snapshot(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let state: Vec<u8> = vec![0u8; 64 * 1024];

    c.bench_function("save_snapshot_64kb", |b| {
        let (store, _dir) = open_store();
        let mut index = 0u64;
        b.to_async(&rt).iter(|| {
            index += 1;
            let meta = SnapshotMeta {
                last_included_index: index,
                last_included_term: 1,
                cluster_config: vec![ServerId::new("bench-node")],
            };
            let store = &store;
            let state = state.clone();
            async move {
                store.save_snapshot(black_box(meta), black_box(state)).await.unwrap();
            }
        });
    });

    c.bench_function("load_snapshot_64kb", |b| {
        let (store, _dir) = open_store();
        rt.block_on(async {
            store
                .save_snapshot(
                    SnapshotMeta {
                        last_included_index: 1,
                        last_included_term: 1,
                        cluster_config: vec![ServerId::new("bench-node")],
                    },
                    state.clone(),
                )
                .await
                .unwrap();
        });
        b.to_async(&rt).iter(|| {
            let store = &store;
            async move {
                black_box(store.load_snapshot().await.unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_append_entries, bench_save_term_vote, bench_save_and_load_snapshot);
criterion_main!(benches);
