use std::sync::atomic::{AtomicU32, Ordering};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lockstep::{
    Conflict, ExecConfig, Executor, LcCsrGraph, MethodFlag, NoAborts, UserContext, WorklistPolicy,
};

const DIST_INF: u32 = u32::MAX - 1;

fn random_adjacency(n: usize, out_degree: usize, mut seed: u64) -> Vec<Vec<usize>> {
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };
    (0..n)
        .map(|_| {
            (0..out_degree)
                .map(|_| (next() % n as u64) as usize)
                .collect()
        })
        .collect()
}

fn reset(g: &LcCsrGraph<AtomicU32>) {
    for n in g.nodes() {
        g.node_data(None, n, MethodFlag::Unprotected)
            .expect("sequential")
            .store(DIST_INF, Ordering::Relaxed);
    }
    g.node_data(None, 0, MethodFlag::Unprotected)
        .expect("sequential")
        .store(0, Ordering::Relaxed);
}

fn bench_threads() -> Vec<usize> {
    std::env::var("LOCKSTEP_BENCH_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map_or_else(|| vec![1, 2, 4], |t| vec![t])
}

fn bench_bfs(c: &mut Criterion) {
    let adj = random_adjacency(50_000, 8, 0xbe9c);
    let graph = LcCsrGraph::<AtomicU32>::from_adjacency(&adj);
    let g = &graph;

    let op = NoAborts(move |&n: &usize, utx: &mut UserContext<'_, usize>| {
        let nd = g
            .node_data(None, n, MethodFlag::Unprotected)?
            .load(Ordering::Relaxed)
            + 1;
        for e in g.edges(n) {
            let dst = g.edge_dst(e);
            let dd = g.node_data(None, dst, MethodFlag::Unprotected)?;
            let mut old = dd.load(Ordering::Relaxed);
            while old > nd {
                match dd.compare_exchange_weak(old, nd, Ordering::Relaxed, Ordering::Relaxed) {
                    Ok(_) => {
                        utx.push(dst);
                        break;
                    }
                    Err(current) => old = current,
                }
            }
        }
        Ok::<(), Conflict>(())
    });

    for threads in bench_threads() {
        for (name, policy) in [
            ("chunked_fifo", WorklistPolicy::ChunkedFifo { chunk: 64 }),
            ("bulk_synchronous", WorklistPolicy::BulkSynchronous),
        ] {
            c.bench_function(&format!("bfs_{name}_t{threads}"), |b| {
                b.iter(|| {
                    reset(g);
                    let config = ExecConfig {
                        threads,
                        policy: policy.clone(),
                        ..ExecConfig::default()
                    };
                    let report = Executor::new(config)
                        .run(vec![0usize], &op)
                        .expect("valid configuration");
                    black_box(report.committed)
                });
            });
        }
    }
}

criterion_group!(benches, bench_bfs);
criterion_main!(benches);
