//! Lookup Throughput Benchmarks
//!
//! Each lookup tier in isolation and the full orchestrated path: pre-filter
//! rejection, cache hit and registry fall-through.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flow_config::{CacheConfig, PreFilterConfig, RegistryConfig};
use flow_registry::{ExactRegistry, FlowCache, FlowRegistry, FlowRegistryConfig, PreFilterBank};
use flow_types::{ComponentId, FlowKey, FlowRecord, FlowType};

fn record(n: u64) -> FlowRecord {
    FlowRecord::new(FlowKey::from_u64(n), ComponentId::Transport, FlowType::Event, n, 1)
        .expect("valid record")
}

fn bench_exact_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_registry");
    group.throughput(Throughput::Elements(1));

    for size in [10_000u64, 100_000] {
        let registry = ExactRegistry::new(&RegistryConfig::default());
        for n in 0..size {
            registry.insert(record(n));
        }

        let mut n = 0;
        group.bench_with_input(BenchmarkId::new("find_hit", size), &size, |b, &size| {
            b.iter(|| {
                n = (n + 7919) % size;
                black_box(registry.find(&FlowKey::from_u64(n)))
            })
        });
    }

    group.finish();
}

fn bench_prefilter(c: &mut Criterion) {
    let mut bank = PreFilterBank::new(&PreFilterConfig::default());
    for n in 0..100_000 {
        bank.add(&FlowKey::from_u64(n));
    }
    let present = FlowKey::from_u64(4242);
    let absent = FlowKey::from_u64(10_000_000);

    let mut group = c.benchmark_group("prefilter");
    group.throughput(Throughput::Elements(1));
    group.bench_function("contains_present", |b| b.iter(|| black_box(bank.contains(&present))));
    group.bench_function("contains_absent", |b| b.iter(|| black_box(bank.contains(&absent))));
    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let mut cache = FlowCache::new(&CacheConfig::default());
    for n in 0..50_000 {
        cache.put(FlowKey::from_u64(n), record(n));
    }

    let mut group = c.benchmark_group("flow_cache");
    group.throughput(Throughput::Elements(1));

    let mut n = 0u64;
    group.bench_function("get_hit_lru", |b| {
        b.iter(|| {
            n = (n + 7919) % 50_000;
            black_box(cache.get(&FlowKey::from_u64(n)).copied())
        })
    });
    group.finish();
}

fn bench_orchestrated_lookup(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = FlowRegistryConfig::default();
    config.transport.socket_path = dir.path().join("transport.sock");
    config.discovery.enabled = false;
    config.metrics.enabled = false;
    let registry = FlowRegistry::new(config).expect("valid config");

    for n in 0..50_000 {
        registry.register(record(n)).expect("registered");
    }

    let mut group = c.benchmark_group("flow_registry");
    group.throughput(Throughput::Elements(1));

    let mut n = 0u64;
    group.bench_function("lookup_hit", |b| {
        b.iter(|| {
            n = (n + 7919) % 50_000;
            black_box(registry.lookup(&FlowKey::from_u64(n)))
        })
    });

    let mut miss = 1_000_000u64;
    group.bench_function("lookup_miss", |b| {
        b.iter(|| {
            miss += 1;
            black_box(registry.lookup(&FlowKey::from_u64(miss)))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_exact_registry,
    bench_prefilter,
    bench_cache,
    bench_orchestrated_lookup
);
criterion_main!(benches);
