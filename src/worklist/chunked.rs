//! Chunked FIFO/LIFO worklists with whole-chunk stealing.
//!
//! Items are grouped into fixed-size chunks so that the per-stripe lock is
//! taken once per chunk boundary rather than once per item, and a thread
//! works a whole chunk before stealing another. Stripes are cache-padded to
//! keep owner traffic off stealers' lines.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_utils::CachePadded;

use super::Worklist;

struct Stripe<T> {
    /// Closed chunks, oldest at the front. Items inside run front-to-back.
    chunks: VecDeque<Vec<T>>,
    /// Open chunk receiving pushes.
    open: Vec<T>,
    /// Chunk being drained; items are popped from the back, so FIFO drains
    /// are stored reversed.
    drain: Vec<T>,
}

impl<T> Stripe<T> {
    fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            open: Vec::new(),
            drain: Vec::new(),
        }
    }
}

pub(crate) struct Chunked<T> {
    stripes: Vec<CachePadded<Mutex<Stripe<T>>>>,
    len: AtomicUsize,
    stolen: AtomicU64,
    chunk: usize,
    lifo: bool,
}

impl<T: Send> Chunked<T> {
    pub(crate) fn new(workers: usize, chunk: usize, lifo: bool) -> Self {
        assert!(chunk != 0);
        Self {
            stripes: (0..workers)
                .map(|_| CachePadded::new(Mutex::new(Stripe::new())))
                .collect(),
            len: AtomicUsize::new(0),
            stolen: AtomicU64::new(0),
            chunk,
            lifo,
        }
    }

    fn stripe(&self, worker: usize) -> &Mutex<Stripe<T>> {
        &self.stripes[worker % self.stripes.len()]
    }

    /// Installs `taken` (stored front-to-back) as `stripe.drain`.
    fn install_drain(&self, stripe: &mut Stripe<T>, mut taken: Vec<T>) {
        debug_assert!(stripe.drain.is_empty(), "overwriting a live drain chunk");
        if !self.lifo {
            // Pops come off the back; reverse once so the front goes first.
            taken.reverse();
        }
        stripe.drain = taken;
    }

    fn pop_local(&self, stripe: &mut Stripe<T>) -> Option<T> {
        if self.lifo {
            // Newest first: open pushes, then the most recent chunks.
            if let Some(item) = stripe.open.pop() {
                return Some(item);
            }
            if let Some(item) = stripe.drain.pop() {
                return Some(item);
            }
            if let Some(chunk) = stripe.chunks.pop_back() {
                stripe.drain = chunk;
                return stripe.drain.pop();
            }
            None
        } else {
            // Oldest first: drain, then closed chunks, then the open chunk.
            if let Some(item) = stripe.drain.pop() {
                return Some(item);
            }
            if let Some(chunk) = stripe.chunks.pop_front() {
                self.install_drain(stripe, chunk);
                return stripe.drain.pop();
            }
            if !stripe.open.is_empty() {
                let open = core::mem::take(&mut stripe.open);
                self.install_drain(stripe, open);
                return stripe.drain.pop();
            }
            None
        }
    }

    /// Takes a whole chunk from `victim`, or its open items as a last resort.
    fn steal_from(&self, victim: &Mutex<Stripe<T>>) -> Option<Vec<T>> {
        // try_lock: a busy victim just means we scan the next one.
        let mut stripe = victim.try_lock().ok()?;
        if let Some(chunk) = if self.lifo {
            stripe.chunks.pop_back()
        } else {
            stripe.chunks.pop_front()
        } {
            return Some(chunk);
        }
        if stripe.open.is_empty() {
            None
        } else {
            Some(core::mem::take(&mut stripe.open))
        }
    }
}

impl<T: Send> Worklist<T> for Chunked<T> {
    fn push(&self, worker: usize, item: T) {
        let mut stripe = self.stripe(worker).lock().expect("stripe poisoned");
        stripe.open.push(item);
        if stripe.open.len() >= self.chunk {
            let full = core::mem::take(&mut stripe.open);
            stripe.chunks.push_back(full);
        }
        self.len.fetch_add(1, Ordering::SeqCst);
    }

    fn pop(&self, worker: usize) -> Option<T> {
        let own = worker % self.stripes.len();
        {
            let mut stripe = self.stripe(own).lock().expect("stripe poisoned");
            if let Some(item) = self.pop_local(&mut stripe) {
                self.len.fetch_sub(1, Ordering::SeqCst);
                return Some(item);
            }
        }
        // Own stripe empty: scan peers round-robin for a whole chunk.
        let n = self.stripes.len();
        for offset in 1..n {
            let victim = (own + offset) % n;
            if let Some(chunk) = self.steal_from(&self.stripes[victim]) {
                self.stolen.fetch_add(1, Ordering::Relaxed);
                let mut stripe = self.stripe(own).lock().expect("stripe poisoned");
                self.install_drain(&mut stripe, chunk);
                if let Some(item) = stripe.drain.pop() {
                    self.len.fetch_sub(1, Ordering::SeqCst);
                    return Some(item);
                }
            }
        }
        None
    }

    fn is_empty(&self) -> bool {
        self.len.load(Ordering::SeqCst) == 0
    }

    fn stolen(&self) -> u64 {
        self.stolen.load(Ordering::Relaxed)
    }
}
