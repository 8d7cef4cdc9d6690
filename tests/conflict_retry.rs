//! Conflict scenario: concurrent iterations targeting one shared node must
//! serialize through the element lock, with losers retried until they commit.

use std::sync::atomic::{AtomicBool, Ordering};

use lockstep::{Conflict, ExecConfig, Executor, LcCsrGraph, UserContext, WorklistPolicy};

#[test]
fn contended_counter_commits_every_item_exactly_once() {
    let mut graph: LcCsrGraph<u64> = LcCsrGraph::from_adjacency(&[vec![]]);
    for d in graph.nodes_data_mut() {
        *d = 0;
    }

    let busy = AtomicBool::new(false);
    let graph = &graph;
    let busy = &busy;
    let op = |_item: &u32, utx: &mut UserContext<'_, u32>| -> Result<(), Conflict> {
        let value = graph.node_data_mut(Some(utx.exec()), 0)?;
        assert!(
            !busy.swap(true, Ordering::SeqCst),
            "two contexts inside the critical section at once"
        );
        *value += 1;
        std::thread::yield_now();
        busy.store(false, Ordering::SeqCst);
        Ok(())
    };

    let config = ExecConfig {
        threads: 4,
        policy: WorklistPolicy::ChunkedFifo { chunk: 8 },
        ..ExecConfig::default()
    };
    let report = Executor::new(config)
        .with_locks(graph.locks().clone())
        .run((0..200).collect(), &op)
        .expect("valid configuration");

    assert_eq!(report.committed, 200, "every item commits exactly once");
    assert_eq!(
        *graph
            .node_data(None, 0, lockstep::MethodFlag::Unprotected)
            .expect("sequential read"),
        200
    );
    assert!(graph.locks().all_unowned(), "no lock survives the run");
}

#[test]
fn lock_acquiring_operator_without_table_is_rejected() {
    let op = |_item: &u32, _utx: &mut UserContext<'_, u32>| -> Result<(), Conflict> { Ok(()) };
    // Closures default to needs_aborts = true, so the convenience entry
    // point must refuse to run them without a lock table.
    let err = lockstep::for_each(&ExecConfig::default(), vec![1u32], &op)
        .expect_err("missing lock table");
    assert!(err.to_string().contains("lock table"));
}

#[test]
fn empty_initial_set_terminates_immediately() {
    use lockstep::NoAborts;
    let op = NoAborts(|_item: &u32, _utx: &mut UserContext<'_, u32>| {
        Ok::<(), Conflict>(())
    });
    let config = ExecConfig {
        threads: 4,
        ..ExecConfig::default()
    };
    let report = lockstep::for_each(&config, Vec::new(), &op).expect("valid configuration");
    assert_eq!(report.committed, 0);
    assert_eq!(report.aborted, 0);
}
