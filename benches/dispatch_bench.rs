//! Benchmarks for the event dispatcher.
//!
//! Benchmarks cover:
//! - Post-to-exec latency through the dispatch threads
//! - Counter signaling cost on the caller side
//! - Admission pool acquire/return round trips

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use prometheus_dispatch::config::DispatcherConfig;
use prometheus_dispatch::core::{
    AdmissionGates, AdmissionPool, Dispatcher, EventHandler, RearmPolicy, SourceKind,
};

// ============================================================================
// Handlers
// ============================================================================

struct Notify {
    done: Sender<()>,
}

impl EventHandler for Notify {
    fn exec(&self) {
        let _ = self.done.send(());
    }
}

fn bench_config(threads: usize) -> DispatcherConfig {
    DispatcherConfig::new()
        .with_thread_name("bench-dispatch")
        .with_thread_count(threads)
        .with_poll_timeout(Duration::from_millis(100))
}

// ============================================================================
// Dispatch Benchmarks
// ============================================================================

fn bench_post_to_exec(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_to_exec");

    for threads in [1usize, 4] {
        for rearm in [RearmPolicy::Persistent, RearmPolicy::OneShot] {
            let dispatcher = Dispatcher::initialize(bench_config(threads)).unwrap();
            let (tx, rx) = bounded(1);
            let handle = dispatcher
                .create("bench", Arc::new(Notify { done: tx }), SourceKind::Counter, rearm)
                .unwrap();

            let id = BenchmarkId::new(format!("{rearm:?}"), threads);
            group.bench_function(id, |b| {
                b.iter(|| {
                    dispatcher.post(&handle).unwrap();
                    rx.recv_timeout(Duration::from_secs(1)).unwrap();
                });
            });
            dispatcher.shutdown();
        }
    }
    group.finish();
}

fn bench_post_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_only");
    group.throughput(Throughput::Elements(1));

    let dispatcher = Dispatcher::initialize(bench_config(2)).unwrap();
    let handle = dispatcher
        .create("sink", Arc::new(|| {}), SourceKind::Counter, RearmPolicy::Persistent)
        .unwrap();

    group.bench_function("counter_write", |b| {
        b.iter(|| black_box(dispatcher.post(&handle)));
    });
    group.finish();
    dispatcher.shutdown();
}

// ============================================================================
// Admission Benchmarks
// ============================================================================

fn bench_admission_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission_round_trip");

    group.bench_function("wait_acquire_return", |b| {
        let pool = AdmissionPool::new(1, AdmissionGates::default());
        b.iter(|| {
            black_box(pool.wait().unwrap());
            assert!(pool.try_acquire());
            pool.return_capacity();
        });
    });
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(dispatch_benches, bench_post_to_exec, bench_post_only);

criterion_group!(admission_benches, bench_admission_round_trip);

criterion_main!(dispatch_benches, admission_benches);
