use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_crucible::*;
use std::cell::Cell;
use std::rc::Rc;

// ===== Micro Benchmarks =====

fn bench_shared_hit(c: &mut Criterion) {
    let factory = InstanceFactory::new();

    // Prime the slot
    factory.get_shared("answer", || Rc::new(42u64));

    c.bench_function("shared_hit_u64", |b| {
        b.iter(|| {
            let v = factory.get_shared("answer", || Rc::new(0u64));
            black_box(v);
        })
    });
}

fn bench_shared_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("shared_cold_expensive", |b| {
        b.iter_batched(
            InstanceFactory::new,
            |factory| {
                let v = factory.get_shared("expensive", || {
                    Rc::new(ExpensiveToCreate {
                        data: (0..1000).collect(),
                    })
                });
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_lifecycles(c: &mut Criterion) {
    #[derive(Clone)]
    struct Payload {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("lifecycles");
    let factory = InstanceFactory::new();

    let kept = factory.get_weak_shared("weak", || Rc::new(Payload { data: [0; 64] }));
    group.bench_function("weak_shared_live_hit", |b| {
        b.iter(|| {
            let v = factory.get_weak_shared("weak", || Rc::new(Payload { data: [1; 64] }));
            black_box(v.data[0]);
        })
    });
    drop(kept);

    group.bench_function("unshared", |b| {
        b.iter(|| {
            let v = factory.get_unshared("unshared", || Payload { data: [2; 64] });
            black_box(v.data[0]);
        })
    });

    group.bench_function("scoped_request", |b| {
        b.iter(|| {
            let v = factory.get_unshared("request", || {
                let first = factory.get_scoped("scoped", || Rc::new(Payload { data: [3; 64] }));
                let second = factory.get_scoped("scoped", || Rc::new(Payload { data: [4; 64] }));
                first.data[0] + second.data[0]
            });
            black_box(v);
        })
    });

    group.finish();
}

fn bench_configure_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("configure_flush");

    for count in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::new("unshared_with", count), &count, |b, &count| {
            let factory = InstanceFactory::new();
            b.iter(|| {
                let total = factory.get_unshared("root", || {
                    (0..count)
                        .map(|_| {
                            factory.get_unshared_with(
                                "child",
                                || Rc::new(Cell::new(0u32)),
                                |cell: &Rc<Cell<u32>>| cell.set(1),
                            )
                        })
                        .collect::<Vec<_>>()
                });
                black_box(total.len());
            })
        });
    }

    group.finish();
}

fn bench_construction_depth(c: &mut Criterion) {
    fn chain(factory: &InstanceFactory, n: u32) -> u32 {
        factory.get_unshared("link", || if n == 0 { 0 } else { 1 + chain(factory, n - 1) })
    }

    let mut group = c.benchmark_group("construction_depth");
    let factory = InstanceFactory::new();

    for depth in [8u32, 64, 512] {
        group.bench_with_input(BenchmarkId::new("unshared_chain", depth), &depth, |b, &depth| {
            b.iter(|| black_box(chain(&factory, depth)))
        });
    }

    group.finish();
}

fn bench_large_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_pool");

    for slot_count in [10usize, 100, 1000] {
        let factory = InstanceFactory::builder().pool_capacity(slot_count).build();
        let names: Vec<String> = (0..slot_count).map(|i| format!("slot-{}", i)).collect();
        for (i, name) in names.iter().enumerate() {
            factory.get_shared(name.clone(), || i);
        }

        group.bench_with_input(
            BenchmarkId::new("shared_hit_in_large_pool", slot_count),
            &slot_count,
            |b, _| {
                b.iter(|| {
                    let v = factory.get_shared(names[slot_count / 2].clone(), || 0usize);
                    black_box(v);
                })
            },
        );
    }

    group.finish();
}

fn bench_observed(c: &mut Criterion) {
    let metrics = std::sync::Arc::new(MetricsObserver::new());
    let factory = InstanceFactory::builder().observer(metrics).build();

    c.bench_function("unshared_with_metrics_observer", |b| {
        b.iter(|| black_box(factory.get_unshared("observed", || 1u8)))
    });
}

criterion_group!(
    benches,
    bench_shared_hit,
    bench_shared_cold,
    bench_lifecycles,
    bench_configure_flush,
    bench_construction_depth,
    bench_large_pool,
    bench_observed
);
criterion_main!(benches);
