//! Deterministic two-phase executor.
//!
//! Pending items are processed in rounds. Each round sorts the pending set
//! by the operator's stable id (stable sort, so push order breaks ties) and
//! gives every item a record index — the canonical order. All records then
//! run the read-only **build** phase concurrently; lock arbitration is
//! lowest-record-wins, so the owner of any contended slot after the build
//! barrier is the minimum requester — a pure function of the pending set,
//! independent of thread count or interleaving. The barrier is the failsafe
//! point; records that still own every slot they requested run the **modify**
//! phase (their write sets are disjoint), the rest are re-queued for the next
//! round. Follow-up pushes are concatenated in record order, keeping the next
//! pending set canonical too. The lowest record always wins every slot it
//! requests, so each round commits at least one item and the run terminates.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Instant;

use super::for_each::{Executor, Operator, UserContext};
use super::{affinity, ExecConfig, RunReport};
use crate::error::RuntimeError;
use crate::runtime::{
    context_id, Conflict, ContentionPolicy, ExecutionContext, IterArena, LockTable,
};

/// An operator split into a read-only build phase and a mutating modify
/// phase, with a stable per-item id for canonical ordering.
pub trait DeterministicOperator<T>: Sync {
    /// Build-phase scratch carried to the modify phase of the same round.
    /// Reset to `Default` when the item retries in a later round.
    type Local: Default + Send;

    /// Stable id for `item` (e.g. a node's static identifier). Conflict
    /// resolution prefers lower ids; ties fall back to push order.
    fn id(&self, item: &T) -> u64;

    /// Discovers the elements the item would affect, acquiring their locks
    /// through `view`, and records candidates in `local`. Must not mutate
    /// shared data — losing records have run this phase too.
    fn build(
        &self,
        item: &T,
        local: &mut Self::Local,
        view: &mut BuildView<'_>,
    ) -> Result<(), Conflict>;

    /// Applies mutations and schedules follow-up items. Runs past the
    /// failsafe point: only elements locked during build may be touched.
    fn modify(&self, item: &T, local: &mut Self::Local, utx: &mut UserContext<'_, T>);
}

/// Lock-acquiring view handed to the build phase.
pub struct BuildView<'a> {
    ctx: &'a mut ExecutionContext,
    arena: &'a IterArena,
}

impl BuildView<'_> {
    /// The record's execution context, for graph accessor acquisition.
    pub fn exec(&mut self) -> &mut ExecutionContext {
        &mut *self.ctx
    }

    /// Scratch arena valid for this build call only.
    pub fn arena(&self) -> &IterArena {
        self.arena
    }
}

struct Record<T, L> {
    item: T,
    ctx: ExecutionContext,
    local: L,
    /// Local-state slot flag: `false` until the build visit has filled
    /// `local`, `true` on the guaranteed-commit modify visit.
    used: bool,
    conflicted: bool,
    committed: bool,
    pushed: Vec<T>,
}

struct DetShared<T, L> {
    /// Owned by the leader between the round-end and round-start barriers;
    /// workers reach records only through `base`/`len` during the phases.
    records: UnsafeCell<Vec<Record<T, L>>>,
    base: AtomicPtr<Record<T, L>>,
    len: AtomicUsize,
    build_cursor: AtomicUsize,
    commit_cursor: AtomicUsize,
    finished: AtomicBool,
    barrier: Barrier,
    committed: AtomicU64,
    aborted: AtomicU64,
    pushed: AtomicU64,
    rounds: AtomicU64,
}

// SAFETY: `records` is only touched by the leader while every other worker
// is parked at the round-start barrier; during phases, records are reached
// through raw pointers with cursor-claimed disjoint indices.
unsafe impl<T: Send, L: Send> Sync for DetShared<T, L> {}

impl<T, L> DetShared<T, L> {
    fn new(workers: usize) -> Self {
        Self {
            records: UnsafeCell::new(Vec::new()),
            base: AtomicPtr::new(core::ptr::null_mut()),
            len: AtomicUsize::new(0),
            build_cursor: AtomicUsize::new(0),
            commit_cursor: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            barrier: Barrier::new(workers),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            pushed: AtomicU64::new(0),
            rounds: AtomicU64::new(0),
        }
    }
}

/// Sorts `pending` canonically and publishes it as the next round's records.
///
/// Must only be called while no worker can touch `shared.records` (before
/// the scope starts, or from the leader section between barriers).
fn publish_round<T, O>(
    shared: &DetShared<T, O::Local>,
    mut pending: Vec<T>,
    operator: &O,
    locks: &Arc<LockTable>,
) where
    T: Send,
    O: DeterministicOperator<T>,
{
    if pending.is_empty() {
        shared.len.store(0, Ordering::SeqCst);
        shared.finished.store(true, Ordering::SeqCst);
        return;
    }
    // Stable sort: equal ids keep their (deterministic) push order.
    pending.sort_by_cached_key(|item| operator.id(item));
    // SAFETY: exclusive access per this function's contract.
    let records = unsafe { &mut *shared.records.get() };
    *records = pending
        .into_iter()
        .enumerate()
        .map(|(i, item)| Record {
            item,
            ctx: ExecutionContext::with_policy(
                context_id(i),
                locks.clone(),
                ContentionPolicy::MinOwnerWins,
            ),
            local: O::Local::default(),
            used: false,
            conflicted: false,
            committed: false,
            pushed: Vec::new(),
        })
        .collect();
    shared.base.store(records.as_mut_ptr(), Ordering::SeqCst);
    shared.len.store(records.len(), Ordering::SeqCst);
    shared.build_cursor.store(0, Ordering::SeqCst);
    shared.commit_cursor.store(0, Ordering::SeqCst);
    shared.rounds.fetch_add(1, Ordering::SeqCst);
}

/// Harvests a finished round: committed records contribute their pushes,
/// losers retry. Record order keeps the result canonical.
fn harvest_round<T, L>(shared: &DetShared<T, L>) -> Vec<T> {
    // SAFETY: leader-only section; all workers are past the round-end
    // barrier and block at the round-start barrier.
    let records = unsafe { &mut *shared.records.get() };
    let mut next = Vec::new();
    for mut rec in records.drain(..) {
        if rec.committed {
            shared.committed.fetch_add(1, Ordering::SeqCst);
            shared
                .pushed
                .fetch_add(rec.pushed.len() as u64, Ordering::SeqCst);
            next.append(&mut rec.pushed);
        } else {
            shared.aborted.fetch_add(1, Ordering::SeqCst);
            next.push(rec.item);
        }
    }
    next
}

fn det_worker<T, O>(
    w: usize,
    shared: &DetShared<T, O::Local>,
    operator: &O,
    locks: &Arc<LockTable>,
    pin: bool,
) where
    T: Send,
    O: DeterministicOperator<T>,
{
    if pin {
        let _ = affinity::pin_to_core(w);
    }
    let mut arena = IterArena::new();
    loop {
        shared.barrier.wait(); // round published
        if shared.finished.load(Ordering::SeqCst) {
            break;
        }
        let base = shared.base.load(Ordering::SeqCst);
        let len = shared.len.load(Ordering::SeqCst);

        // Build phase: read-only discovery under min-wins arbitration.
        loop {
            let i = shared.build_cursor.fetch_add(1, Ordering::SeqCst);
            if i >= len {
                break;
            }
            // SAFETY: the cursor hands each index to exactly one worker per
            // phase, and phases are barrier-separated.
            let rec = unsafe { &mut *base.add(i) };
            rec.ctx.start_iteration();
            debug_assert!(!rec.used);
            let mut view = BuildView {
                ctx: &mut rec.ctx,
                arena: &arena,
            };
            rec.conflicted = operator.build(&rec.item, &mut rec.local, &mut view).is_err();
            rec.used = true;
            drop(view);
            arena.reset();
        }

        shared.barrier.wait(); // failsafe point: ownership is now stable

        // Modify phase: winners apply, losers release and retry.
        loop {
            let i = shared.commit_cursor.fetch_add(1, Ordering::SeqCst);
            if i >= len {
                break;
            }
            // SAFETY: as above; disjoint from the build claims by the barrier.
            let rec = unsafe { &mut *base.add(i) };
            if !rec.conflicted && rec.ctx.owns_all() {
                rec.ctx.enter_failsafe();
                debug_assert!(rec.used);
                let mut utx = UserContext::new(w, &mut rec.pushed, Some(&mut rec.ctx), &arena);
                operator.modify(&rec.item, &mut rec.local, &mut utx);
                rec.ctx.commit_iteration();
                rec.committed = true;
            } else {
                rec.ctx.cancel_iteration();
                rec.committed = false;
            }
            arena.reset();
        }

        shared.barrier.wait(); // round done
        if w == 0 {
            let next = harvest_round(shared);
            publish_round(shared, next, operator, locks);
        }
    }
}

/// Runs `operator` deterministically over `initial` and everything it
/// pushes: the final graph state is identical for any thread count.
///
/// `locks` must be the table the operator's graph accessors acquire from.
/// The configured worklist policy is ignored — the deterministic schedule
/// imposes its own round structure.
pub fn for_each_det<T, O>(
    config: &ExecConfig,
    locks: &Arc<LockTable>,
    initial: Vec<T>,
    operator: &O,
) -> Result<RunReport, RuntimeError>
where
    T: Send,
    O: DeterministicOperator<T>,
{
    config.validate()?;
    let workers = config.worker_count();
    let started = Instant::now();
    tracing::debug!(workers, "for_each_det: run started");

    let shared: DetShared<T, O::Local> = DetShared::new(workers);
    publish_round(&shared, initial, operator, locks);

    if !shared.finished.load(Ordering::SeqCst) {
        std::thread::scope(|scope| {
            let shared = &shared;
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    scope.spawn(move || det_worker(w, shared, operator, locks, config.pin_threads))
                })
                .collect();
            for h in handles {
                h.join().expect("deterministic worker panicked");
            }
        });
    }

    let report = RunReport {
        committed: shared.committed.load(Ordering::SeqCst),
        aborted: shared.aborted.load(Ordering::SeqCst),
        pushed: shared.pushed.load(Ordering::SeqCst),
        stolen: 0,
        levels: shared.rounds.load(Ordering::SeqCst),
        threads: workers,
        elapsed: started.elapsed(),
    };
    tracing::debug!(
        committed = report.committed,
        rounds = report.levels,
        "for_each_det: run finished"
    );
    Ok(report)
}

/// Runs a deterministic operator without the phase split: build and modify
/// execute inline per attempt through the speculative executor, aborting and
/// retrying on conflict like any other operator.
pub fn for_each_nondet<T, O>(
    config: &ExecConfig,
    locks: &Arc<LockTable>,
    initial: Vec<T>,
    operator: &O,
) -> Result<RunReport, RuntimeError>
where
    T: Send,
    O: DeterministicOperator<T>,
{
    let inline = InlineDet(operator);
    Executor::new(config.clone())
        .with_locks(locks.clone())
        .run(initial, &inline)
}

struct InlineDet<'o, O>(&'o O);

impl<T, O: DeterministicOperator<T>> Operator<T> for InlineDet<'_, O> {
    fn execute(&self, item: &T, utx: &mut UserContext<'_, T>) -> Result<(), Conflict> {
        let mut local = O::Local::default();
        {
            let (ctx, arena) = utx.split();
            let mut view = BuildView { ctx, arena };
            self.0.build(item, &mut local, &mut view)?;
        }
        utx.exec().enter_failsafe();
        self.0.modify(item, &mut local, utx);
        Ok(())
    }
}
