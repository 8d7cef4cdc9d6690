//! Conflict-detecting transactional core.
//!
//! The pieces here implement optimistic element-level locking: owner slots
//! ([`LockTable`]), per-thread lock bookkeeping ([`ExecutionContext`]),
//! conflict arbitration ([`ContentionPolicy`]) and the per-iteration scratch
//! arena ([`IterArena`]). The executors in [`crate::exec`] drive these; graph
//! accessors in [`crate::graph`] call into them.

mod arena;
mod contention;
mod context;
mod lockable;

pub use arena::IterArena;
pub use contention::ContentionPolicy;
pub use context::ExecutionContext;
pub use lockable::{Conflict, ContextId, LockIdx, LockTable};

/// Whether a graph accessor acquires the element's lock before returning
/// data. `Unprotected` is for phases where exclusion is provided elsewhere
/// (CAS-only payloads, the deterministic modify phase, or sequential code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodFlag {
    /// Acquire the element's lock through the active context.
    #[default]
    Protected,
    /// Skip acquisition; the caller vouches for exclusion.
    Unprotected,
}

/// Builds a `ContextId` from a zero-based worker or record index.
pub(crate) fn context_id(index: usize) -> ContextId {
    let raw = u32::try_from(index + 1).expect("context index fits in u32");
    ContextId::new(raw).expect("index + 1 is non-zero")
}
