//! Pluggable worklists holding pending units of work.
//!
//! All variants share one contract: `push` is total and thread-safe, `pop`
//! prefers the calling worker's own items and falls back to stealing, and
//! `is_empty` is a best-effort snapshot used only by termination heuristics.
//! The variant is a construction-time choice ([`WorklistPolicy`]) dispatched
//! through the object-safe [`Worklist`] trait.

mod bulk;
mod chunked;
mod ordered;

use num_traits::{PrimInt, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

pub(crate) use bulk::BulkSynchronous;
pub(crate) use chunked::Chunked;
pub(crate) use ordered::OrderedByMetric;

/// Default number of items per chunk; amortizes stripe synchronization.
pub const DEFAULT_CHUNK: usize = 64;

/// Construction-time worklist selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorklistPolicy {
    /// Chunked queue: oldest chunk first, whole-chunk stealing.
    ChunkedFifo {
        /// Items per chunk.
        chunk: usize,
    },
    /// Chunked stack: newest chunk first, whole-chunk stealing.
    ChunkedLifo {
        /// Items per chunk.
        chunk: usize,
    },
    /// Priority buckets keyed by a client indexer; pops are globally
    /// non-decreasing in the key (soft guarantee, no barrier).
    OrderedByMetric {
        /// Items drained from the lowest bucket per refill.
        chunk: usize,
    },
    /// Double-buffered levels separated by a hard barrier; pushes always
    /// target the next level.
    BulkSynchronous,
}

impl Default for WorklistPolicy {
    fn default() -> Self {
        Self::ChunkedFifo {
            chunk: DEFAULT_CHUNK,
        }
    }
}

impl WorklistPolicy {
    /// Validates field values; unsupported combinations are reported here,
    /// at configuration time, never mid-run.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        match *self {
            Self::ChunkedFifo { chunk }
            | Self::ChunkedLifo { chunk }
            | Self::OrderedByMetric { chunk } => {
                if chunk == 0 {
                    return Err(RuntimeError::InvalidConfig(
                        "worklist chunk size must be non-zero".into(),
                    ));
                }
                Ok(())
            }
            Self::BulkSynchronous => Ok(()),
        }
    }

    /// True for the barrier-separated level schedule.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Self::BulkSynchronous)
    }
}

#[cfg(feature = "proptest")]
impl proptest::arbitrary::Arbitrary for WorklistPolicy {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with((): ()) -> Self::Strategy {
        use proptest::prelude::*;
        prop_oneof![
            (1usize..256).prop_map(|chunk| Self::ChunkedFifo { chunk }),
            (1usize..256).prop_map(|chunk| Self::ChunkedLifo { chunk }),
            (1usize..256).prop_map(|chunk| Self::OrderedByMetric { chunk }),
            Just(Self::BulkSynchronous),
        ]
        .boxed()
    }
}

/// Shared contract of every worklist variant.
pub trait Worklist<T>: Send + Sync {
    /// Enqueues `item` on behalf of `worker`. Total; never fails.
    fn push(&self, worker: usize, item: T);

    /// Dequeues an item, preferring `worker`'s own bucket and stealing
    /// otherwise. `None` means nothing was reachable at this instant.
    fn pop(&self, worker: usize) -> Option<T>;

    /// Best-effort emptiness snapshot; may race with concurrent pushes.
    /// Used only by termination heuristics, never for correctness.
    fn is_empty(&self) -> bool;

    /// Bulk-synchronous only: swaps the level buffers and reports whether
    /// the new level holds any items. Exactly one worker calls this while
    /// the rest wait at the executor's barrier.
    fn advance(&self) -> bool {
        false
    }

    /// True when pops must be separated by executor-driven level barriers.
    fn barrier_mode(&self) -> bool {
        false
    }

    /// Chunks stolen from peers so far (statistics).
    fn stolen(&self) -> u64 {
        0
    }
}

impl<T> core::fmt::Debug for dyn Worklist<T> + '_ {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Worklist").finish_non_exhaustive()
    }
}

/// Type-erased priority indexer for the ordered variant. The lifetime lets
/// indexers borrow the graph they read (BFS distance labeling does).
pub type Indexer<'a, T> = Box<dyn Fn(&T) -> u64 + Send + Sync + 'a>;

/// Wraps a client indexer over any primitive integer key into the internal
/// `u64` form. Negative keys saturate to zero.
pub fn indexer_from<'a, T, K, F>(f: F) -> Indexer<'a, T>
where
    K: PrimInt,
    F: Fn(&T) -> K + Send + Sync + 'a,
{
    Box::new(move |item| f(item).to_u64().unwrap_or(0))
}

/// Builds a worklist for `workers` threads from `policy`. The executors call
/// this internally; standalone use is for schedulers of their own making.
pub fn build<'a, T: Send + 'a>(
    policy: &WorklistPolicy,
    workers: usize,
    indexer: Option<Indexer<'a, T>>,
) -> Result<Box<dyn Worklist<T> + 'a>, RuntimeError> {
    policy.validate()?;
    assert!(workers != 0, "worklists require at least one worker");
    match *policy {
        WorklistPolicy::ChunkedFifo { chunk } => {
            Ok(Box::new(Chunked::new(workers, chunk, false)))
        }
        WorklistPolicy::ChunkedLifo { chunk } => Ok(Box::new(Chunked::new(workers, chunk, true))),
        WorklistPolicy::OrderedByMetric { chunk } => {
            let indexer = indexer.ok_or(RuntimeError::Unsupported(
                "ordered-by-metric worklist requires an indexer",
            ))?;
            Ok(Box::new(OrderedByMetric::new(workers, chunk, indexer)))
        }
        WorklistPolicy::BulkSynchronous => Ok(Box::new(BulkSynchronous::new(workers))),
    }
}
