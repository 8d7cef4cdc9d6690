//! # `lockstep` - Speculative Parallel Graph Runtime
//!
//! A shared-memory runtime for amorphous data-parallelism over mutable
//! graphs: arbitrary operator functions run in parallel while the runtime
//! guarantees serializability through optimistic element locking and
//! abort/retry, with a family of worklist schedulers (chunked FIFO/LIFO,
//! priority-ordered, bulk-synchronous) and a deterministic two-phase variant
//! whose final state is independent of thread count.
//!
//! ## Safety Guarantees
//!
//! ### Mutual exclusion
//! - **Single-owner slots**: every graph element maps to one atomic owner
//!   slot; ownership transitions only through compare-and-swap, so at most
//!   one execution context ever holds an element.
//! - **No blocking**: lock acquisition never waits. Conflicts resolve
//!   immediately — the requester aborts and retries — so there is no
//!   deadlock, only bounded re-execution.
//!
//! ### Abort discipline
//! - **Lock release on cancel**: an aborted iteration frees every lock it
//!   acquired, in acquisition order.
//! - **Build/modify contract**: payload mutations are not rolled back;
//!   operators that can abort defer visible writes until after their last
//!   acquisition. The deterministic executor enforces this structurally.
//!
//! ## Architecture
//!
//! 1. **Lock runtime** ([`runtime`]):
//!    [`LockTable`] owner slots, the per-thread [`ExecutionContext`] state
//!    machine (`start_iteration` / `commit_iteration` / `cancel_iteration` /
//!    failsafe), contention policies, and the per-iteration scratch arena.
//!
//! 2. **Worklists** ([`worklist`]):
//!    a construction-time policy choice over chunked FIFO/LIFO with
//!    whole-chunk stealing, ordered-by-metric priority buckets, and a
//!    barrier-separated bulk-synchronous double buffer.
//!
//! 3. **Executors** ([`exec`]):
//!    the speculative [`for_each`] engine (pop, run, commit-or-retry,
//!    quiescence detection), the deterministic [`for_each_det`] round
//!    executor, and the conflict-free [`do_all`] loop.
//!
//! 4. **Graph collaborator** ([`graph`]):
//!    a CSR graph whose accessors acquire the embedded element locks through
//!    the active context before handing out data.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use lockstep::{for_each, Conflict, ExecConfig, NoAborts, UserContext};
//!
//! // Sum 1..=5, discovering a follow-up item when processing item 1.
//! let total = AtomicUsize::new(0);
//! let op = NoAborts(|item: &usize, utx: &mut UserContext<'_, usize>| {
//!     total.fetch_add(*item, Ordering::Relaxed);
//!     if *item == 1 {
//!         utx.push(100);
//!     }
//!     Ok::<(), Conflict>(())
//! });
//!
//! let config = ExecConfig { threads: 2, ..ExecConfig::default() };
//! let report = for_each(&config, (1..=5).collect(), &op).expect("valid config");
//! assert_eq!(report.committed, 6);
//! assert_eq!(total.load(Ordering::Relaxed), 115);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod exec;
pub mod graph;
pub mod runtime;
mod sync;
pub mod worklist;

pub use error::RuntimeError;
pub use exec::{
    do_all, for_each, for_each_det, for_each_nondet, BuildView, DeterministicOperator, ExecConfig,
    Executor, NoAborts, Operator, RunReport, UserContext,
};
pub use graph::{EdgeIdx, LcCsrGraph, NodeId};
pub use runtime::{
    Conflict, ContentionPolicy, ContextId, ExecutionContext, IterArena, LockTable, MethodFlag,
};
pub use worklist::{Worklist, WorklistPolicy, DEFAULT_CHUNK};
