//! BFS distance labeling through the speculative executor, across worklist
//! schedules, checked against a serial reference and petgraph.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use lockstep::{
    Conflict, ExecConfig, Executor, LcCsrGraph, MethodFlag, NoAborts, UserContext, WorklistPolicy,
};

const DIST_INF: u32 = u32::MAX - 1;

fn path_adjacency(n: usize) -> Vec<Vec<usize>> {
    (0..n)
        .map(|i| if i + 1 < n { vec![i + 1] } else { vec![] })
        .collect()
}

/// Sparse pseudo-random digraph from a tiny xorshift generator.
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

fn make_graph(adj: &[Vec<usize>]) -> LcCsrGraph<AtomicU32> {
    let g: LcCsrGraph<AtomicU32> = LcCsrGraph::from_adjacency(adj);
    for n in g.nodes() {
        g.node_data(None, n, MethodFlag::Unprotected)
            .expect("sequential")
            .store(DIST_INF, Ordering::Relaxed);
    }
    g.node_data(None, 0, MethodFlag::Unprotected)
        .expect("sequential")
        .store(0, Ordering::Relaxed);
    g
}

fn serial_reference(adj: &[Vec<usize>]) -> Vec<u32> {
    let mut dist = vec![DIST_INF; adj.len()];
    dist[0] = 0;
    let mut wl = VecDeque::from([0usize]);
    while let Some(n) = wl.pop_front() {
        let nd = dist[n] + 1;
        for &dst in &adj[n] {
            if dist[dst] > nd {
                dist[dst] = nd;
                wl.push_back(dst);
            }
        }
    }
    dist
}

fn distances(g: &LcCsrGraph<AtomicU32>) -> Vec<u32> {
    g.nodes()
        .map(|n| {
            g.node_data(None, n, MethodFlag::Unprotected)
                .expect("sequential")
                .load(Ordering::Relaxed)
        })
        .collect()
}

/// The CAS-relaxation operator: no element locks, no aborts.
fn relax_op(
    g: &LcCsrGraph<AtomicU32>,
) -> NoAborts<impl Fn(&usize, &mut UserContext<'_, usize>) -> Result<(), Conflict> + Sync + '_> {
    NoAborts(move |&n: &usize, utx: &mut UserContext<'_, usize>| {
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
        Ok(())
    })
}

#[test]
fn path_distances_with_ordered_worklist() {
    let adj = path_adjacency(4);
    let g = make_graph(&adj);
    let op = relax_op(&g);
    let config = ExecConfig {
        threads: 2,
        policy: WorklistPolicy::OrderedByMetric { chunk: 4 },
        ..ExecConfig::default()
    };
    let report = Executor::new(config)
        .with_indexer(|&n: &usize| {
            g.node_data(None, n, MethodFlag::Unprotected)
                .expect("sequential")
                .load(Ordering::Relaxed)
        })
        .run(vec![0usize], &op)
        .expect("valid configuration");
    assert_eq!(distances(&g), vec![0, 1, 2, 3]);
    assert_eq!(report.committed, 4, "one commit per reachable node");
}

#[test]
fn random_graph_matches_serial_reference() {
    let adj = random_adjacency(300, 3, 0x5eed);
    let expected = serial_reference(&adj);
    for threads in [1usize, 4] {
        let g = make_graph(&adj);
        let op = relax_op(&g);
        let config = ExecConfig {
            threads,
            policy: WorklistPolicy::ChunkedFifo { chunk: 16 },
            ..ExecConfig::default()
        };
        Executor::new(config)
            .run(vec![0usize], &op)
            .expect("valid configuration");
        assert_eq!(distances(&g), expected, "threads = {threads}");
    }
}

#[test]
fn bulk_synchronous_walks_one_level_per_barrier() {
    let n = 64;
    let adj = path_adjacency(n);
    let g = make_graph(&adj);
    let op = relax_op(&g);
    let config = ExecConfig {
        threads: 3,
        policy: WorklistPolicy::BulkSynchronous,
        ..ExecConfig::default()
    };
    let report = Executor::new(config)
        .run(vec![0usize], &op)
        .expect("valid configuration");
    assert_eq!(distances(&g), (0..n as u32).collect::<Vec<_>>());
    assert_eq!(
        report.levels, n as u64,
        "a path of n nodes takes exactly n levels"
    );
}

#[test]
fn distances_agree_with_petgraph_dijkstra() {
    use petgraph::graph::DiGraph;
    use petgraph::visit::EdgeRef;

    let adj = random_adjacency(200, 2, 0xfeed5eed);
    let g = make_graph(&adj);
    let op = relax_op(&g);
    let config = ExecConfig {
        threads: 4,
        ..ExecConfig::default()
    };
    Executor::new(config)
        .run(vec![0usize], &op)
        .expect("valid configuration");

    let mut pg = DiGraph::<(), u32>::new();
    let nodes: Vec<_> = (0..adj.len()).map(|_| pg.add_node(())).collect();
    for (u, nbrs) in adj.iter().enumerate() {
        for &v in nbrs {
            pg.add_edge(nodes[u], nodes[v], 1);
        }
    }
    let shortest = petgraph::algo::dijkstra(&pg, nodes[0], None, |e| *e.weight());

    let got = distances(&g);
    for (i, &d) in got.iter().enumerate() {
        match shortest.get(&nodes[i]) {
            Some(&ref_d) => assert_eq!(d, ref_d, "node {i}"),
            None => assert_eq!(d, DIST_INF, "node {i} is unreachable"),
        }
    }
}
