//! Executors: the speculative for-each engine, the deterministic two-phase
//! variant, and the conflict-free `do_all` loop.

mod affinity;
mod deterministic;
mod do_all;
mod for_each;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;
use crate::worklist::WorklistPolicy;

pub use deterministic::{for_each_det, for_each_nondet, BuildView, DeterministicOperator};
pub use do_all::do_all;
pub use for_each::{for_each, Executor, NoAborts, Operator, UserContext};

/// Executor configuration. Serializable so runs can be described in config
/// files; the ordered worklist's indexer is code and is supplied separately
/// through [`Executor::with_indexer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Worker threads; `0` selects the machine's available parallelism.
    pub threads: usize,
    /// Worklist variant holding pending items. Ignored by the deterministic
    /// schedule, which imposes its own round structure.
    pub policy: WorklistPolicy,
    /// Bind each worker to one core for the duration of the run.
    pub pin_threads: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            policy: WorklistPolicy::default(),
            pin_threads: false,
        }
    }
}

impl ExecConfig {
    /// Validates the configuration; all unsupported combinations are
    /// reported here rather than mid-run.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.policy.validate()
    }

    pub(crate) fn worker_count(&self) -> usize {
        if self.threads != 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    }
}

/// Aggregated counters for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Iterations that committed.
    pub committed: u64,
    /// Iterations aborted on conflict and re-queued.
    pub aborted: u64,
    /// Items pushed by operators (initial items excluded).
    pub pushed: u64,
    /// Chunks (or items, bulk mode) taken from a peer's stripe.
    pub stolen: u64,
    /// Barrier levels (bulk mode) or rounds (deterministic mode); zero for
    /// asynchronous schedules.
    pub levels: u64,
    /// Worker threads used.
    pub threads: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WorkerStats {
    pub committed: u64,
    pub aborted: u64,
    pub pushed: u64,
}
