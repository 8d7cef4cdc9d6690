//! A locality-conscious CSR graph with embedded per-element lock slots.
//!
//! The layout is predictable: `offsets` of length `n + 1`, a contiguous
//! destination array, and payload cells indexed alongside. Every node and
//! every edge maps to one slot of a shared [`LockTable`] (nodes first, then
//! edges), so graph accessors can acquire the element lock through the
//! caller's execution context before handing out data.

use core::cell::UnsafeCell;
use std::sync::Arc;

use crate::runtime::{Conflict, ExecutionContext, LockIdx, LockTable, MethodFlag};

/// Node handle: a dense index in `0..node_count`.
pub type NodeId = usize;

/// Edge handle: a dense index in `0..edge_count`, ordered by source node.
pub type EdgeIdx = usize;

/// Payload storage whose exclusion contract is the element's lock.
///
/// Mutation must only happen while the mutator's execution context owns the
/// element's slot (or while exclusion is structural: `&mut self`, or a
/// sequential phase). Fields read concurrently with unlocked mutation must
/// themselves be atomics. This is a convention the API documents, not one
/// the type system enforces.
#[repr(transparent)]
struct PayloadCell<T>(UnsafeCell<T>);

// SAFETY: cross-thread access is governed by the lock discipline above.
unsafe impl<T: Send + Sync> Sync for PayloadCell<T> {}

impl<T> PayloadCell<T> {
    const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    fn get(&self) -> &T {
        // SAFETY: see the type-level contract.
        unsafe { &*self.0.get() }
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn get_mut(&self) -> &mut T {
        // SAFETY: caller holds the element lock or has structural exclusion.
        unsafe { &mut *self.0.get() }
    }
}

/// A CSR graph whose nodes and edges carry lockable payloads.
pub struct LcCsrGraph<N, E = ()> {
    offsets: Vec<usize>,
    dests: Vec<NodeId>,
    nodes: Vec<PayloadCell<N>>,
    edge_data: Vec<PayloadCell<E>>,
    locks: Arc<LockTable>,
}

impl<N: Default, E: Default> LcCsrGraph<N, E> {
    /// Builds a graph from an adjacency list, with default payloads.
    ///
    /// # Panics
    /// Panics if any edge references a node index out of bounds.
    pub fn from_adjacency(adjacency: &[Vec<NodeId>]) -> Self {
        let n = adjacency.len();

        let mut offsets = Vec::with_capacity(n + 1);
        offsets.push(0);
        let mut total_edges = 0usize;
        for nbrs in adjacency {
            total_edges = total_edges.saturating_add(nbrs.len());
            offsets.push(total_edges);
        }

        let mut dests = Vec::with_capacity(total_edges);
        for (u, nbrs) in adjacency.iter().enumerate() {
            for &v in nbrs {
                assert!(v < n, "edge {u}->{v} is out of bounds for n={n}");
                dests.push(v);
            }
        }

        Self::from_parts(offsets, dests)
    }

    /// Builds a graph directly from CSR parts, with default payloads.
    ///
    /// # Panics
    /// - if `offsets` is shorter than 2 entries
    /// - if offsets are not monotone
    /// - if `offsets.last() != dests.len()`
    /// - if any destination is out of bounds
    pub fn from_csr_parts(offsets: Vec<usize>, dests: Vec<NodeId>) -> Self {
        assert!(offsets.len() >= 2, "offsets must have length n+1");
        let n = offsets.len() - 1;
        for w in offsets.windows(2) {
            assert!(w[0] <= w[1], "offsets must be monotone");
        }
        let m = *offsets.last().expect("offsets non-empty");
        assert!(m == dests.len(), "offsets last must equal dests length");
        for &v in &dests {
            assert!(v < n, "edge to {v} out of bounds for n={n}");
        }
        Self::from_parts(offsets, dests)
    }

    fn from_parts(offsets: Vec<usize>, dests: Vec<NodeId>) -> Self {
        let n = offsets.len() - 1;
        let m = dests.len();
        let nodes = (0..n).map(|_| PayloadCell::new(N::default())).collect();
        let edge_data = (0..m).map(|_| PayloadCell::new(E::default())).collect();
        Self {
            offsets,
            dests,
            nodes,
            edge_data,
            locks: Arc::new(LockTable::new(n + m)),
        }
    }
}

impl<N, E> LcCsrGraph<N, E> {
    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.dests.len()
    }

    /// Iterates all node handles.
    pub fn nodes(&self) -> core::ops::Range<NodeId> {
        0..self.node_count()
    }

    /// Iterates the out-edge handles of `n`.
    pub fn edges(&self, n: NodeId) -> core::ops::Range<EdgeIdx> {
        self.offsets[n]..self.offsets[n + 1]
    }

    /// Out-degree of `n`.
    pub fn degree(&self, n: NodeId) -> usize {
        self.offsets[n + 1] - self.offsets[n]
    }

    /// Destination node of edge `e`.
    pub fn edge_dst(&self, e: EdgeIdx) -> NodeId {
        self.dests[e]
    }

    /// The lock table shared with the executors running over this graph.
    pub fn locks(&self) -> &Arc<LockTable> {
        &self.locks
    }

    /// Lock slot of node `n`.
    pub fn node_slot(&self, n: NodeId) -> LockIdx {
        n
    }

    /// Lock slot of edge `e`.
    pub fn edge_slot(&self, e: EdgeIdx) -> LockIdx {
        self.node_count() + e
    }

    fn maybe_acquire(
        &self,
        ctx: Option<&mut ExecutionContext>,
        slot: LockIdx,
        flag: MethodFlag,
    ) -> Result<(), Conflict> {
        match (flag, ctx) {
            (MethodFlag::Protected, Some(ctx)) => {
                debug_assert!(
                    Arc::ptr_eq(ctx.table(), &self.locks),
                    "context acquires from a different lock table than this graph"
                );
                ctx.acquire(slot)
            }
            // Sequential mode (no context) or an explicitly unprotected
            // access: acquisition is a no-op.
            _ => Ok(()),
        }
    }

    /// Shared access to node data, acquiring the node's lock unless `flag`
    /// is [`MethodFlag::Unprotected`] or `ctx` is `None` (sequential mode).
    pub fn node_data<'s>(
        &'s self,
        ctx: Option<&mut ExecutionContext>,
        n: NodeId,
        flag: MethodFlag,
    ) -> Result<&'s N, Conflict> {
        self.maybe_acquire(ctx, self.node_slot(n), flag)?;
        Ok(self.nodes[n].get())
    }

    /// Exclusive access to node data, acquiring the node's lock.
    ///
    /// With `ctx: None` (sequential mode) no lock is taken; the caller vouches
    /// that no other thread touches the graph. The returned borrow must not
    /// overlap another reference to the same node's data — the lock excludes
    /// other contexts, not the caller itself.
    #[allow(clippy::mut_from_ref)]
    pub fn node_data_mut<'s>(
        &'s self,
        ctx: Option<&mut ExecutionContext>,
        n: NodeId,
    ) -> Result<&'s mut N, Conflict> {
        self.maybe_acquire(ctx, self.node_slot(n), MethodFlag::Protected)?;
        // SAFETY: the element lock (or sequential mode) excludes other
        // threads; non-overlap within this context is the caller's contract.
        Ok(unsafe { self.nodes[n].get_mut() })
    }

    /// Shared access to edge data; locking mirrors [`Self::node_data`].
    pub fn edge_data<'s>(
        &'s self,
        ctx: Option<&mut ExecutionContext>,
        e: EdgeIdx,
        flag: MethodFlag,
    ) -> Result<&'s E, Conflict> {
        self.maybe_acquire(ctx, self.edge_slot(e), flag)?;
        Ok(self.edge_data[e].get())
    }

    /// Exclusive access to edge data; locking mirrors [`Self::node_data_mut`].
    #[allow(clippy::mut_from_ref)]
    pub fn edge_data_mut<'s>(
        &'s self,
        ctx: Option<&mut ExecutionContext>,
        e: EdgeIdx,
    ) -> Result<&'s mut E, Conflict> {
        self.maybe_acquire(ctx, self.edge_slot(e), MethodFlag::Protected)?;
        // SAFETY: as in `node_data_mut`.
        Ok(unsafe { self.edge_data[e].get_mut() })
    }

    /// Exclusive iteration over node payloads (initialization sweeps).
    pub fn nodes_data_mut(&mut self) -> impl Iterator<Item = &mut N> {
        self.nodes.iter_mut().map(|cell| cell.0.get_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_roundtrip() {
        let g: LcCsrGraph<u32> = LcCsrGraph::from_adjacency(&[vec![1, 2], vec![2], vec![]]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.degree(0), 2);
        assert_eq!(g.degree(2), 0);
        let dsts: Vec<_> = g.edges(0).map(|e| g.edge_dst(e)).collect();
        assert_eq!(dsts, vec![1, 2]);
        assert_eq!(g.locks().len(), 6);
    }

    #[test]
    fn sequential_access_without_context() {
        let mut g: LcCsrGraph<u32> = LcCsrGraph::from_adjacency(&[vec![1], vec![]]);
        for d in g.nodes_data_mut() {
            *d = 7;
        }
        let v = g.node_data(None, 1, MethodFlag::Protected).expect("no ctx");
        assert_eq!(*v, 7);
        *g.node_data_mut(None, 0).expect("no ctx") = 9;
        assert_eq!(*g.node_data(None, 0, MethodFlag::Unprotected).expect("ok"), 9);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn rejects_out_of_bounds_edges() {
        let _ = LcCsrGraph::<u32>::from_adjacency(&[vec![3]]);
    }
}
