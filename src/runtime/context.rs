//! Per-thread transaction bookkeeping: the execution context state machine.
//!
//! A context lives on one worker thread and is reused across iterations:
//! `Idle -> Active (start_iteration) -> {commit, cancel} -> Idle`, with a
//! `failsafe` sub-state inside `Active` past which new acquisitions are a
//! programming error.

use std::sync::Arc;

use super::contention::{resolve, ContentionPolicy, Resolution};
use super::lockable::{Conflict, ContextId, LockIdx, LockTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    Idle,
    Active,
}

/// Per-thread (or, in deterministic rounds, per-record) lock bookkeeping for
/// one in-flight unit of work.
pub struct ExecutionContext {
    id: ContextId,
    table: Arc<LockTable>,
    policy: ContentionPolicy,
    /// Slots requested this iteration, in acquisition order. Under
    /// `MinOwnerWins` this includes conceded slots, which the commit check
    /// reports as lost.
    held: Vec<LockIdx>,
    state: IterState,
    failsafe: bool,
}

impl ExecutionContext {
    /// Creates a context with the default requester-aborts policy.
    pub fn new(id: ContextId, table: Arc<LockTable>) -> Self {
        Self::with_policy(id, table, ContentionPolicy::default())
    }

    /// Creates a context resolving conflicts with `policy`.
    pub fn with_policy(id: ContextId, table: Arc<LockTable>, policy: ContentionPolicy) -> Self {
        Self {
            id,
            table,
            policy,
            held: Vec::new(),
            state: IterState::Idle,
            failsafe: false,
        }
    }

    /// This context's non-zero id, as stored in owner slots.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The lock table this context acquires from.
    pub fn table(&self) -> &Arc<LockTable> {
        &self.table
    }

    /// Begins a unit of work.
    ///
    /// # Panics
    /// Panics if the previous iteration was not committed or cancelled.
    pub fn start_iteration(&mut self) {
        assert!(
            self.held.is_empty(),
            "start_iteration with locks still held"
        );
        debug_assert_eq!(self.state, IterState::Idle, "start_iteration while active");
        self.state = IterState::Active;
        self.failsafe = false;
    }

    /// Marks the point past which abort is no longer allowed; subsequent
    /// acquisitions of new slots panic.
    pub fn enter_failsafe(&mut self) {
        debug_assert_eq!(self.state, IterState::Active);
        self.failsafe = true;
    }

    /// True between `enter_failsafe` and commit/cancel.
    pub fn in_failsafe(&self) -> bool {
        self.failsafe
    }

    /// Acquires the slot `idx`, or reports a conflict per this context's
    /// contention policy. Re-acquiring a slot already owned is a no-op
    /// success. Non-blocking in every path.
    ///
    /// # Panics
    /// Panics if a new slot is requested after the failsafe point.
    pub fn acquire(&mut self, idx: LockIdx) -> Result<(), Conflict> {
        debug_assert_eq!(self.state, IterState::Active, "acquire outside iteration");
        loop {
            match self.table.owner(idx) {
                Some(owner) if owner == self.id => return Ok(()),
                None => {
                    assert!(!self.failsafe, "acquiring a new lock after failsafe");
                    if self.table.try_lock(idx, self.id) {
                        self.held.push(idx);
                        return Ok(());
                    }
                    // Lost the race to another context; re-read the owner.
                }
                Some(owner) => {
                    assert!(!self.failsafe, "acquiring a new lock after failsafe");
                    match resolve(self.policy, self.id, owner) {
                        Resolution::Abort => return Err(Conflict),
                        Resolution::Preempt => {
                            if self.table.preempt(idx, owner, self.id) {
                                self.held.push(idx);
                                return Ok(());
                            }
                            // Owner changed underneath us; re-arbitrate.
                        }
                        Resolution::Concede => {
                            // Record the request so the commit check sees the
                            // loss; the winner releases the slot.
                            self.held.push(idx);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Slots requested during the current iteration, in acquisition order.
    pub fn held_locks(&self) -> &[LockIdx] {
        &self.held
    }

    /// True when every requested slot is still owned by this context. Under
    /// `MinOwnerWins` this is the deterministic commit check, evaluated after
    /// the build barrier when ownership is stable.
    pub fn owns_all(&self) -> bool {
        self.held
            .iter()
            .all(|&idx| self.table.owner(idx) == Some(self.id))
    }

    /// Ends the iteration successfully, releasing every held lock strictly in
    /// acquisition order.
    pub fn commit_iteration(&mut self) {
        debug_assert_eq!(self.state, IterState::Active, "commit outside iteration");
        // ORDER MATTERS: release in the order acquired.
        for idx in self.held.drain(..) {
            self.table.release(idx, self.id);
        }
        self.failsafe = false;
        self.state = IterState::Idle;
    }

    /// Aborts the iteration, releasing every held lock in acquisition order.
    ///
    /// Payload mutations are NOT rolled back: cancellation safety is the
    /// operator's responsibility. An operator that may abort must defer
    /// visible writes until after its last acquisition (the build/modify
    /// discipline); the runtime guarantees lock release only.
    pub fn cancel_iteration(&mut self) {
        debug_assert_eq!(self.state, IterState::Active, "cancel outside iteration");
        for idx in self.held.drain(..) {
            self.table.release(idx, self.id);
        }
        self.failsafe = false;
        self.state = IterState::Idle;
    }
}
