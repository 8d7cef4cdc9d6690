//! Bulk-synchronous worklist: double-buffered levels with hard barriers.
//!
//! All pushes target the *next* buffer; pops drain the *current* one. The
//! executor rendezvouses every worker at a barrier once the current buffer is
//! dry, one leader calls `advance`, and the next level begins. No item of
//! level k+1 is popped before every level-k item is done — strict
//! level-by-level semantics, trading some parallelism for determinism-friendly
//! reasoning.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_utils::CachePadded;

use super::Worklist;

struct LevelBuf<T> {
    stripes: Vec<CachePadded<Mutex<VecDeque<T>>>>,
    len: AtomicUsize,
}

impl<T> LevelBuf<T> {
    fn new(workers: usize) -> Self {
        Self {
            stripes: (0..workers)
                .map(|_| CachePadded::new(Mutex::new(VecDeque::new())))
                .collect(),
            len: AtomicUsize::new(0),
        }
    }
}

pub(crate) struct BulkSynchronous<T> {
    bufs: [LevelBuf<T>; 2],
    /// Index of the buffer currently being drained. Flipped only by
    /// `advance`, which the executor calls from exactly one worker while the
    /// rest wait at the level barrier.
    current: AtomicUsize,
    stolen: AtomicU64,
}

impl<T: Send> BulkSynchronous<T> {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            bufs: [LevelBuf::new(workers), LevelBuf::new(workers)],
            current: AtomicUsize::new(0),
            stolen: AtomicU64::new(0),
        }
    }

    fn cur(&self) -> &LevelBuf<T> {
        &self.bufs[self.current.load(Ordering::SeqCst)]
    }

    fn next(&self) -> &LevelBuf<T> {
        &self.bufs[self.current.load(Ordering::SeqCst) ^ 1]
    }
}

impl<T: Send> Worklist<T> for BulkSynchronous<T> {
    fn push(&self, worker: usize, item: T) {
        let buf = self.next();
        let mut stripe = buf.stripes[worker % buf.stripes.len()]
            .lock()
            .expect("stripe poisoned");
        stripe.push_back(item);
        buf.len.fetch_add(1, Ordering::SeqCst);
    }

    fn pop(&self, worker: usize) -> Option<T> {
        let buf = self.cur();
        let n = buf.stripes.len();
        let own = worker % n;
        for offset in 0..n {
            let idx = (own + offset) % n;
            let mut stripe = buf.stripes[idx].lock().expect("stripe poisoned");
            if let Some(item) = stripe.pop_front() {
                if offset != 0 {
                    self.stolen.fetch_add(1, Ordering::Relaxed);
                }
                buf.len.fetch_sub(1, Ordering::SeqCst);
                return Some(item);
            }
        }
        None
    }

    fn is_empty(&self) -> bool {
        self.bufs[0].len.load(Ordering::SeqCst) == 0 && self.bufs[1].len.load(Ordering::SeqCst) == 0
    }

    fn advance(&self) -> bool {
        debug_assert_eq!(self.cur().len.load(Ordering::SeqCst), 0);
        let flipped = self.current.load(Ordering::SeqCst) ^ 1;
        self.current.store(flipped, Ordering::SeqCst);
        self.bufs[flipped].len.load(Ordering::SeqCst) != 0
    }

    fn barrier_mode(&self) -> bool {
        true
    }

    fn stolen(&self) -> u64 {
        self.stolen.load(Ordering::Relaxed)
    }
}
