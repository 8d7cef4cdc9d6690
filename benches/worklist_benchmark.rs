use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lockstep::worklist::{self, WorklistPolicy};

fn bench_push_pop(c: &mut Criterion) {
    let variants = [
        ("chunked_fifo", WorklistPolicy::ChunkedFifo { chunk: 64 }),
        ("chunked_lifo", WorklistPolicy::ChunkedLifo { chunk: 64 }),
    ];
    for (name, policy) in variants {
        c.bench_function(&format!("worklist_{name}_push_pop_10k"), |b| {
            b.iter(|| {
                let wl = worklist::build::<u64>(&policy, 1, None).expect("valid policy");
                for i in 0..10_000u64 {
                    wl.push(0, i);
                }
                let mut sum = 0u64;
                while let Some(x) = wl.pop(0) {
                    sum = sum.wrapping_add(x);
                }
                black_box(sum)
            });
        });
    }

    c.bench_function("worklist_ordered_push_pop_10k", |b| {
        b.iter(|| {
            let wl = worklist::build(
                &WorklistPolicy::OrderedByMetric { chunk: 64 },
                1,
                Some(worklist::indexer_from(|x: &u64| *x % 32)),
            )
            .expect("valid policy");
            for i in 0..10_000u64 {
                wl.push(0, i);
            }
            let mut sum = 0u64;
            while let Some(x) = wl.pop(0) {
                sum = sum.wrapping_add(x);
            }
            black_box(sum)
        });
    });
}

criterion_group!(benches, bench_push_pop);
criterion_main!(benches);
