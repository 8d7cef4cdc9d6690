//! BFS distance labeling across the runtime's schedules, reporting run
//! statistics as JSON. Builds a synthetic graph in memory; graph file I/O is
//! deliberately out of scope.

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use lockstep::{
    for_each_det, BuildView, Conflict, DeterministicOperator, ExecConfig, Executor, LcCsrGraph,
    MethodFlag, NoAborts, RunReport, UserContext, WorklistPolicy,
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

fn run_speculative(
    g: &LcCsrGraph<AtomicU32>,
    threads: usize,
    policy: WorklistPolicy,
) -> Result<RunReport> {
    reset(g);
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

    let ordered = matches!(policy, WorklistPolicy::OrderedByMetric { .. });
    let config = ExecConfig {
        threads,
        policy,
        ..ExecConfig::default()
    };
    let exec = Executor::new(config);
    let exec = if ordered {
        exec.with_indexer(|&n: &usize| {
            g.node_data(None, n, MethodFlag::Unprotected)
                .expect("sequential")
                .load(Ordering::Relaxed)
        })
    } else {
        exec
    };
    exec.run(vec![0usize], &op)
        .context("speculative BFS run failed")
}

struct DetBfs<'g> {
    g: &'g LcCsrGraph<u32>,
}

impl DeterministicOperator<(usize, u32)> for DetBfs<'_> {
    type Local = Vec<usize>;

    fn id(&self, item: &(usize, u32)) -> u64 {
        item.0 as u64
    }

    fn build(
        &self,
        item: &(usize, u32),
        local: &mut Self::Local,
        view: &mut BuildView<'_>,
    ) -> Result<(), Conflict> {
        let nd = item.1 + 1;
        for e in self.g.edges(item.0) {
            let dst = self.g.edge_dst(e);
            if *self.g.node_data(Some(view.exec()), dst, MethodFlag::Protected)? > nd {
                local.push(dst);
            }
        }
        Ok(())
    }

    fn modify(
        &self,
        item: &(usize, u32),
        local: &mut Self::Local,
        utx: &mut UserContext<'_, (usize, u32)>,
    ) {
        let nd = item.1 + 1;
        for &dst in local.iter() {
            let dd = self
                .g
                .node_data_mut(Some(utx.exec()), dst)
                .expect("locked during build");
            if *dd > nd {
                *dd = nd;
                utx.push((dst, nd));
            }
        }
    }
}

fn run_deterministic(adj: &[Vec<usize>], threads: usize) -> Result<RunReport> {
    let mut g: LcCsrGraph<u32> = LcCsrGraph::from_adjacency(adj);
    for d in g.nodes_data_mut() {
        *d = DIST_INF;
    }
    *g.node_data_mut(None, 0).expect("sequential") = 0;
    let op = DetBfs { g: &g };
    let config = ExecConfig {
        threads,
        ..ExecConfig::default()
    };
    for_each_det(&config, g.locks(), vec![(0usize, 0u32)], &op)
        .context("deterministic BFS run failed")
}

fn main() -> Result<()> {
    let n: usize = std::env::args()
        .nth(1)
        .map_or(Ok(100_000), |s| s.parse())
        .context("node count must be an integer")?;
    let threads: usize = std::env::args()
        .nth(2)
        .map_or(Ok(0), |s| s.parse())
        .context("thread count must be an integer")?;

    let adj = random_adjacency(n, 8, 0x10c4_57e9);
    let graph = LcCsrGraph::<AtomicU32>::from_adjacency(&adj);

    let schedules = [
        ("async_chunked_fifo", WorklistPolicy::ChunkedFifo { chunk: 64 }),
        ("async_chunked_lifo", WorklistPolicy::ChunkedLifo { chunk: 64 }),
        ("ordered_by_distance", WorklistPolicy::OrderedByMetric { chunk: 64 }),
        ("bulk_synchronous", WorklistPolicy::BulkSynchronous),
    ];
    for (name, policy) in schedules {
        let report = run_speculative(&graph, threads, policy)?;
        println!("{name}: {}", serde_json::to_string(&report)?);
    }

    let report = run_deterministic(&adj, threads)?;
    println!("deterministic: {}", serde_json::to_string(&report)?);
    Ok(())
}
