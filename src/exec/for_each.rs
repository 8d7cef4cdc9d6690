//! The speculative parallel for-each executor.
//!
//! Workers pop items from a shared worklist (stealing when their own stripe
//! is dry), run the operator inside a lock-tracking iteration, and either
//! commit or abort-and-retry on conflict. New items discovered by the
//! operator are buffered and enqueued at commit — never recursed into — so
//! stack depth stays bounded. The run ends when every worklist is empty and
//! no iteration is in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Instant;

use crossbeam_utils::Backoff;
use num_traits::PrimInt;

use super::{affinity, ExecConfig, RunReport, WorkerStats};
use crate::error::RuntimeError;
use crate::runtime::{context_id, Conflict, ExecutionContext, IterArena, LockTable};
use crate::worklist::{self, Indexer, Worklist};

/// A unit-of-work function applied to each item.
///
/// Implemented automatically for `Fn(&T, &mut UserContext<'_, T>) ->
/// Result<(), Conflict>` closures; implement the trait directly to override
/// [`Operator::needs_aborts`].
pub trait Operator<T>: Sync {
    /// Hint that the operator never acquires element locks, letting the
    /// executor skip abort bookkeeping. Defaults to conservative `true`.
    fn needs_aborts(&self) -> bool {
        true
    }

    /// Processes one item. Returning [`Conflict`] aborts the iteration; the
    /// executor re-queues the original item for a later retry.
    fn execute(&self, item: &T, utx: &mut UserContext<'_, T>) -> Result<(), Conflict>;
}

impl<T, F> Operator<T> for F
where
    F: Fn(&T, &mut UserContext<'_, T>) -> Result<(), Conflict> + Sync,
{
    fn execute(&self, item: &T, utx: &mut UserContext<'_, T>) -> Result<(), Conflict> {
        self(item, utx)
    }
}

/// Marks an operator as never acquiring element locks (the lock-free CAS
/// style of BFS relaxation, for example). Skips all abort bookkeeping.
pub struct NoAborts<O>(
    /// The wrapped operator.
    pub O,
);

impl<T, O: Operator<T>> Operator<T> for NoAborts<O> {
    fn needs_aborts(&self) -> bool {
        false
    }

    fn execute(&self, item: &T, utx: &mut UserContext<'_, T>) -> Result<(), Conflict> {
        self.0.execute(item, utx)
    }
}

/// Per-iteration handle given to operators.
///
/// Exposes `push` for newly discovered work, the active execution context
/// for lock acquisition performed by graph accessors, and the per-iteration
/// scratch arena. Pushed items become visible to the worklist only when the
/// iteration commits; an abort discards them along with the iteration.
pub struct UserContext<'a, T> {
    worker: usize,
    buf: &'a mut Vec<T>,
    ctx: Option<&'a mut ExecutionContext>,
    arena: &'a IterArena,
}

impl<'a, T> UserContext<'a, T> {
    pub(crate) fn new(
        worker: usize,
        buf: &'a mut Vec<T>,
        ctx: Option<&'a mut ExecutionContext>,
        arena: &'a IterArena,
    ) -> Self {
        Self {
            worker,
            buf,
            ctx,
            arena,
        }
    }

    /// Enqueues a follow-up item into the calling worker's worklist. The
    /// item is consumed on a later pop, not recursed into.
    pub fn push(&mut self, item: T) {
        self.buf.push(item);
    }

    /// Zero-based index of the worker running this iteration.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// The active execution context.
    ///
    /// # Panics
    /// Panics when the operator opted out of abort bookkeeping
    /// ([`NoAborts`]); there is no lock state to expose in that mode.
    pub fn exec(&mut self) -> &mut ExecutionContext {
        self.ctx
            .as_deref_mut()
            .expect("operator opted out of abort bookkeeping; no execution context")
    }

    /// The active execution context, or `None` without abort bookkeeping.
    pub fn try_exec(&mut self) -> Option<&mut ExecutionContext> {
        self.ctx.as_deref_mut()
    }

    /// Per-iteration scratch arena, reset wholesale at commit/cancel.
    pub fn arena(&self) -> &IterArena {
        self.arena
    }

    pub(crate) fn split(&mut self) -> (&mut ExecutionContext, &IterArena) {
        let ctx = self
            .ctx
            .as_deref_mut()
            .expect("operator opted out of abort bookkeeping; no execution context");
        (ctx, self.arena)
    }
}

/// Builder for a speculative for-each run.
///
/// The lifetime parameter lets the ordered-worklist indexer borrow the graph
/// it reads.
pub struct Executor<'a, T> {
    config: ExecConfig,
    locks: Option<Arc<LockTable>>,
    indexer: Option<Indexer<'a, T>>,
}

impl<'a, T: Send> Executor<'a, T> {
    /// Starts a builder from `config`.
    pub fn new(config: ExecConfig) -> Self {
        Self {
            config,
            locks: None,
            indexer: None,
        }
    }

    /// Supplies the lock table shared with the graph the operator mutates.
    /// Required whenever the operator acquires element locks.
    pub fn with_locks(mut self, locks: Arc<LockTable>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Supplies the priority indexer required by the
    /// [`OrderedByMetric`](crate::worklist::WorklistPolicy::OrderedByMetric)
    /// policy.
    pub fn with_indexer<K, F>(mut self, f: F) -> Self
    where
        K: PrimInt,
        F: Fn(&T) -> K + Send + Sync + 'a,
    {
        self.indexer = Some(worklist::indexer_from(f));
        self
    }

    /// Runs `operator` over `initial` and everything it pushes, until
    /// quiescence. Returns the merged run statistics.
    pub fn run<O>(self, initial: Vec<T>, operator: &O) -> Result<RunReport, RuntimeError>
    where
        O: Operator<T>,
    {
        self.config.validate()?;
        let workers = self.config.worker_count();
        let needs_aborts = operator.needs_aborts();
        if needs_aborts && self.locks.is_none() {
            return Err(RuntimeError::InvalidConfig(
                "operator requires abort bookkeeping but no lock table was supplied; \
                 use Executor::with_locks or wrap the operator in NoAborts"
                    .into(),
            ));
        }
        let wl = worklist::build(&self.config.policy, workers, self.indexer)?;
        for (i, item) in initial.into_iter().enumerate() {
            wl.push(i % workers, item);
        }

        let quiesce = Quiescence::new(workers);
        let barrier = Barrier::new(workers);
        let has_more = AtomicBool::new(true);
        let levels = AtomicU64::new(0);
        let pin = self.config.pin_threads;
        let started = Instant::now();
        tracing::debug!(workers, policy = ?self.config.policy, "for_each: run started");

        let stats: Vec<WorkerStats> = std::thread::scope(|scope| {
            let wl = &*wl;
            let quiesce = &quiesce;
            let barrier = &barrier;
            let has_more = &has_more;
            let levels = &levels;
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let locks = self.locks.clone();
                    scope.spawn(move || {
                        worker_loop(
                            w,
                            wl,
                            operator,
                            locks,
                            quiesce,
                            barrier,
                            has_more,
                            levels,
                            pin,
                            needs_aborts,
                        )
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("worker thread panicked"))
                .collect()
        });

        let mut report = RunReport {
            stolen: wl.stolen(),
            levels: levels.load(Ordering::SeqCst),
            threads: workers,
            elapsed: started.elapsed(),
            ..RunReport::default()
        };
        for s in stats {
            report.committed += s.committed;
            report.aborted += s.aborted;
            report.pushed += s.pushed;
        }
        tracing::debug!(
            committed = report.committed,
            aborted = report.aborted,
            stolen = report.stolen,
            "for_each: run finished"
        );
        Ok(report)
    }
}

/// Convenience entry point for operators that do not acquire element locks.
///
/// Operators that acquire locks need [`Executor::with_locks`]; calling this
/// with such an operator is reported as an invalid configuration.
pub fn for_each<T, O>(
    config: &ExecConfig,
    initial: Vec<T>,
    operator: &O,
) -> Result<RunReport, RuntimeError>
where
    T: Send,
    O: Operator<T>,
{
    Executor::new(config.clone()).run(initial, operator)
}

#[allow(clippy::too_many_arguments)]
fn worker_loop<T, O>(
    w: usize,
    wl: &dyn Worklist<T>,
    operator: &O,
    locks: Option<Arc<LockTable>>,
    quiesce: &Quiescence,
    barrier: &Barrier,
    has_more: &AtomicBool,
    levels: &AtomicU64,
    pin: bool,
    needs_aborts: bool,
) -> WorkerStats
where
    T: Send,
    O: Operator<T>,
{
    if pin {
        let _ = affinity::pin_to_core(w);
    }
    let mut ctx = if needs_aborts {
        locks.map(|table| ExecutionContext::new(context_id(w), table))
    } else {
        None
    };
    let mut arena = IterArena::new();
    let mut buf: Vec<T> = Vec::new();
    let mut stats = WorkerStats::default();

    loop {
        while let Some(item) = wl.pop(w) {
            if let Some(ctx) = ctx.as_mut() {
                ctx.start_iteration();
            }
            let result = {
                let mut utx = UserContext::new(w, &mut buf, ctx.as_mut(), &arena);
                operator.execute(&item, &mut utx)
            };
            match result {
                Ok(()) => {
                    if let Some(ctx) = ctx.as_mut() {
                        ctx.commit_iteration();
                    }
                    if !buf.is_empty() {
                        stats.pushed += buf.len() as u64;
                        for it in buf.drain(..) {
                            wl.push(w, it);
                        }
                        quiesce.mark_dirty();
                    }
                    stats.committed += 1;
                }
                Err(Conflict) => {
                    // Discard partial progress; retry the ORIGINAL item.
                    buf.clear();
                    if let Some(ctx) = ctx.as_mut() {
                        ctx.cancel_iteration();
                    }
                    tracing::trace!(worker = w, "conflict: iteration aborted and re-queued");
                    wl.push(w, item);
                    quiesce.mark_dirty();
                    stats.aborted += 1;
                }
            }
            arena.reset();
        }

        if wl.barrier_mode() {
            // Level rendezvous: everyone drains the current buffer first.
            let res = barrier.wait();
            if res.is_leader() {
                let more = wl.advance();
                if more {
                    levels.fetch_add(1, Ordering::SeqCst);
                }
                has_more.store(more, Ordering::SeqCst);
            }
            barrier.wait();
            if !has_more.load(Ordering::SeqCst) {
                break;
            }
        } else if quiesce.idle(wl) {
            break;
        }
    }
    stats
}

/// Global termination detection.
///
/// A worker that finds nothing to pop parks here. Termination is declared
/// only when every worker is waiting and the worklist is still empty after
/// the dirty flag — set by any push — is cleared and re-checked. Operators
/// can push unboundedly many new items, so apparent emptiness must always be
/// re-verified against a fresh wave.
struct Quiescence {
    waiting: AtomicUsize,
    dirty: AtomicBool,
    done: AtomicBool,
    workers: usize,
}

impl Quiescence {
    fn new(workers: usize) -> Self {
        Self {
            waiting: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
            done: AtomicBool::new(false),
            workers,
        }
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Parks the calling worker until there is work again or the run is
    /// over. Returns `true` when the run has terminated.
    fn idle<T>(&self, wl: &dyn Worklist<T>) -> bool {
        let backoff = Backoff::new();
        self.waiting.fetch_add(1, Ordering::SeqCst);
        loop {
            if self.done.load(Ordering::SeqCst) {
                return true;
            }
            if !wl.is_empty() {
                self.waiting.fetch_sub(1, Ordering::SeqCst);
                return false;
            }
            if self.waiting.load(Ordering::SeqCst) == self.workers {
                // All workers waiting: no iteration is in flight, so no new
                // push can occur. Clear the dirty flag and re-verify.
                self.dirty.store(false, Ordering::SeqCst);
                if wl.is_empty()
                    && self.waiting.load(Ordering::SeqCst) == self.workers
                    && !self.dirty.load(Ordering::SeqCst)
                {
                    self.done.store(true, Ordering::SeqCst);
                    return true;
                }
            }
            backoff.snooze();
        }
    }
}
