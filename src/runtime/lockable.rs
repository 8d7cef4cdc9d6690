//! Exclusive ownership slots for graph elements.
//!
//! Every lockable element maps to one slot in a [`LockTable`]; the slot holds
//! the id of the owning execution context, or zero when free. All transitions
//! are single compare-and-swap operations and there is no blocking path:
//! retries are the executor's responsibility, not the slot's.

use core::num::NonZeroU32;

use crate::sync::{AtomicU32, Ordering};

/// Index of a lock slot within a [`LockTable`].
pub type LockIdx = usize;

/// Identifier of a live execution context. Zero is reserved for "unowned",
/// which is why the id itself is non-zero.
pub type ContextId = NonZeroU32;

/// Error returned when a lock acquisition contends with another live context.
///
/// Recovered locally by the executor (abort + retry); never surfaced to the
/// caller of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("lock is held by another execution context")]
pub struct Conflict;

const UNOWNED: u32 = 0;

/// A single-owner exclusive slot.
struct OwnerSlot {
    owner: AtomicU32,
}

impl OwnerSlot {
    fn new() -> Self {
        Self {
            owner: AtomicU32::new(UNOWNED),
        }
    }
}

/// One owner slot per lockable element.
///
/// The table is shared (via `Arc`) between the graph that maps its elements to
/// slot indices and the executors that release slots on commit/cancel. A slot
/// has at most one owner at a time; ownership changes only through the CAS
/// operations below.
pub struct LockTable {
    slots: Box<[OwnerSlot]>,
}

impl LockTable {
    /// Creates a table of `len` unowned slots.
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OwnerSlot::new()).collect(),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current owner of `idx`, if any. Racy by nature; meaningful to the
    /// owner itself and to the deterministic commit check, where ownership is
    /// stable across the phase barrier.
    pub fn owner(&self, idx: LockIdx) -> Option<ContextId> {
        NonZeroU32::new(self.slots[idx].owner.load(Ordering::Acquire))
    }

    /// Attempts to take `idx` for `id`. Non-blocking.
    pub(crate) fn try_lock(&self, idx: LockIdx, id: ContextId) -> bool {
        self.slots[idx]
            .owner
            .compare_exchange(UNOWNED, id.get(), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Releases `idx` if it is still owned by `id`.
    ///
    /// A failed CAS means the slot was preempted away by a canonically
    /// earlier record (deterministic mode) and is silently skipped: the new
    /// owner releases it.
    pub(crate) fn release(&self, idx: LockIdx, id: ContextId) {
        let _ = self.slots[idx].owner.compare_exchange(
            id.get(),
            UNOWNED,
            Ordering::Release,
            Ordering::Relaxed,
        );
    }

    /// Transfers `idx` from `from` to `to`. Used only by the deterministic
    /// executor's lowest-record-wins arbitration.
    pub(crate) fn preempt(&self, idx: LockIdx, from: ContextId, to: ContextId) -> bool {
        self.slots[idx]
            .owner
            .compare_exchange(from.get(), to.get(), Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// True when every slot is unowned. Intended for post-run assertions.
    pub fn all_unowned(&self) -> bool {
        self.slots
            .iter()
            .all(|s| s.owner.load(Ordering::Acquire) == UNOWNED)
    }
}
