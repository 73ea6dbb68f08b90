//! Performance benchmarks for relationship resolution.
//!
//! Run with: `cargo bench --bench resolution`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Cold resolution | <1ms p99 | Distant cousins in a ~1000 person graph |
//! | Cached resolution | <10µs p99 | LRU cache hit |
//! | Batch of 100 | <20ms p99 | Anchor expanded once |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use kinship_kernel::{
    CacheConfig, FamilyRecords, InMemoryFamilyStore, KinshipPolicyV1, ParentEdge,
    PartnershipEdge, PersonId, RelationshipCache, RelationshipEngine,
};

/// Build a multi-generation family.
///
/// Each generation pairs neighbours into couples with three children, so
/// lineages interleave and late generations are distant cousins of each
/// other. Returns the records and the people of the last generation.
fn build_family(founders: u128, generations: usize) -> (FamilyRecords, Vec<PersonId>) {
    let mut records = FamilyRecords::new();
    let mut next_id = 1u128;
    let mut generation: Vec<PersonId> = (0..founders)
        .map(|_| {
            let id = PersonId::from_u128(next_id);
            next_id += 1;
            id
        })
        .collect();
    records = records.with_people(generation.iter().copied());

    for _ in 0..generations {
        let mut children: Vec<PersonId> = Vec::new();
        for couple in generation.chunks_exact(2) {
            records = records.with_partnership(PartnershipEdge::marriage(couple[0], couple[1]));
            for _ in 0..3 {
                let child = PersonId::from_u128(next_id);
                next_id += 1;
                records = records
                    .with_person(child)
                    .with_parent(ParentEdge::biological(child, couple[0]))
                    .with_parent(ParentEdge::biological(child, couple[1]));
                children.push(child);
            }
        }
        // Pair each child with one from the far half so couples join different families.
        let half = children.len() / 2;
        generation = (0..half)
            .flat_map(|i| [children[i], children[i + half]])
            .collect();
    }

    (records, generation)
}

fn engine(records: FamilyRecords, cached: bool) -> RelationshipEngine<InMemoryFamilyStore> {
    let store = Arc::new(InMemoryFamilyStore::from_records(records).expect("valid family"));
    let cache = Arc::new(RelationshipCache::new(CacheConfig {
        max_entries: 100_000,
        enabled: cached,
    }));
    RelationshipEngine::new(store, cache, KinshipPolicyV1::default())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

/// Benchmark cold resolution (cache disabled).
fn bench_cold_resolution(c: &mut Criterion) {
    let rt = runtime();
    let (records, last) = build_family(32, 6);
    let engine = engine(records, false);
    let (a, b) = (last[0], last[last.len() - 1]);

    c.bench_function("cold_resolution_distant", |bench| {
        bench.to_async(&rt).iter(|| async {
            black_box(engine.compute_relationship(black_box(a), black_box(b)).await.unwrap())
        })
    });
}

/// Benchmark cached resolution.
fn bench_cached_resolution(c: &mut Criterion) {
    let rt = runtime();
    let (records, last) = build_family(32, 6);
    let engine = engine(records, true);
    let (a, b) = (last[0], last[last.len() - 1]);
    rt.block_on(engine.compute_relationship(a, b)).unwrap();

    c.bench_function("cached_resolution", |bench| {
        bench.to_async(&rt).iter(|| async {
            black_box(engine.compute_relationship(black_box(a), black_box(b)).await.unwrap())
        })
    });
}

/// Benchmark batches against one anchor at several sizes.
fn bench_batch(c: &mut Criterion) {
    let rt = runtime();
    let (records, last) = build_family(32, 6);
    let engine = engine(records, false);
    let anchor = last[0];

    let mut group = c.benchmark_group("batch_compute");
    for size in [10usize, 50, 100] {
        let others: Vec<PersonId> = last.iter().rev().take(size).copied().collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &others, |bench, others| {
            bench.to_async(&rt).iter(|| async {
                black_box(engine.batch_compute(anchor, others).await.unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cold_resolution,
    bench_cached_resolution,
    bench_batch,
);
criterion_main!(benches);
