//! Ordered-by-metric worklist: priority buckets drained lowest-key-first.
//!
//! A client indexer maps each item to an integer key; buckets are created on
//! first use of a key. Global pop order is non-decreasing in the key — a soft
//! guarantee, not a barrier: workers hold small same-bucket drain chunks, so
//! ties and freshly created lower buckets may interleave briefly. This yields
//! level-synchronous behavior for BFS-style distance labeling without an
//! explicit barrier.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_utils::CachePadded;

use super::{Indexer, Worklist};

struct Local<T> {
    drain: VecDeque<T>,
}

pub(crate) struct OrderedByMetric<'a, T> {
    buckets: Mutex<BTreeMap<u64, VecDeque<T>>>,
    locals: Vec<CachePadded<Mutex<Local<T>>>>,
    len: AtomicUsize,
    chunk: usize,
    indexer: Indexer<'a, T>,
}

impl<'a, T: Send> OrderedByMetric<'a, T> {
    pub(crate) fn new(workers: usize, chunk: usize, indexer: Indexer<'a, T>) -> Self {
        assert!(chunk != 0);
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            locals: (0..workers)
                .map(|_| {
                    CachePadded::new(Mutex::new(Local {
                        drain: VecDeque::new(),
                    }))
                })
                .collect(),
            len: AtomicUsize::new(0),
            chunk,
            indexer,
        }
    }

    /// Moves up to `chunk` items from the lowest bucket into `local`.
    fn refill(&self, local: &mut Local<T>) -> bool {
        let mut buckets = self.buckets.lock().expect("buckets poisoned");
        let Some((key, mut bucket)) = buckets.pop_first() else {
            return false;
        };
        let take = self.chunk.min(bucket.len());
        local.drain.extend(bucket.drain(..take));
        if !bucket.is_empty() {
            buckets.insert(key, bucket);
        }
        true
    }
}

impl<T: Send> Worklist<T> for OrderedByMetric<'_, T> {
    fn push(&self, _worker: usize, item: T) {
        let key = (self.indexer)(&item);
        let mut buckets = self.buckets.lock().expect("buckets poisoned");
        buckets.entry(key).or_default().push_back(item);
        self.len.fetch_add(1, Ordering::SeqCst);
    }

    fn pop(&self, worker: usize) -> Option<T> {
        let mut local = self.locals[worker % self.locals.len()]
            .lock()
            .expect("local poisoned");
        if local.drain.is_empty() && !self.refill(&mut local) {
            return None;
        }
        let item = local.drain.pop_front();
        if item.is_some() {
            self.len.fetch_sub(1, Ordering::SeqCst);
        }
        item
    }

    fn is_empty(&self) -> bool {
        self.len.load(Ordering::SeqCst) == 0
    }
}
