//! # Allocator Benchmark
//!
//! Placement cost against page occupancy and the price of a full report.
//!
//! Run with: `cargo bench --package ppmem_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ppmem_core::{source_line, AllocatorConfig, EmbeddedAllocator, ExternalAllocator, MemPtr};

/// Page size used by every benchmark (1 MiB).
const PAGE_SIZE: usize = 1024 * 1024;

fn allocator() -> EmbeddedAllocator {
    let config = AllocatorConfig {
        strict: false,
        track_sources: true,
        ..AllocatorConfig::with_page_size(PAGE_SIZE)
    };
    EmbeddedAllocator::new(config).unwrap()
}

/// Benchmark: allocate then free one block on an empty page.
fn bench_alloc_free(c: &mut Criterion) {
    let embedded = allocator();
    c.bench_function("alloc_free_embedded_64", |b| {
        b.iter(|| {
            let ptr = embedded.allocate(black_box(64), source_line!()).unwrap();
            embedded.free(ptr).unwrap()
        });
    });

    let external = ExternalAllocator::new(AllocatorConfig {
        strict: false,
        ..AllocatorConfig::with_page_size(PAGE_SIZE)
    })
    .unwrap();
    c.bench_function("alloc_free_external_64", |b| {
        b.iter(|| {
            let ptr = external.allocate(black_box(64), source_line!()).unwrap();
            external.free(ptr).unwrap()
        });
    });
}

/// Benchmark: first-fit walk with N live records ahead of the free tail.
fn bench_placement_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("placement_walk");

    for live in [100, 1_000, 5_000] {
        let allocator = allocator();
        let _kept: Vec<MemPtr> = (0..live)
            .map(|_| allocator.allocate(32, source_line!()).unwrap())
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(live), &live, |b, _| {
            b.iter(|| {
                let ptr = allocator.allocate(black_box(48), source_line!()).unwrap();
                allocator.free(ptr).unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark: a full-detail usage report over many records.
fn bench_report(c: &mut Criterion) {
    let allocator = allocator();
    for i in 0..2_000 {
        let _ = allocator.allocate(16 + i % 64, source_line!()).unwrap();
    }

    c.bench_function("report_usage_full_2000", |b| {
        b.iter(|| black_box(allocator.report_usage(true)).num_allocations);
    });
}

criterion_group!(benches, bench_alloc_free, bench_placement_walk, bench_report);
criterion_main!(benches);
