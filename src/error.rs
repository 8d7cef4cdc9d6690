//! Run-level error taxonomy.
//!
//! Conflicts are deliberately absent here: a [`Conflict`](crate::runtime::Conflict)
//! is consumed by the executor's abort/retry loop and never escapes a run.
//! Everything in this module is reported at configuration time, before any
//! worker thread starts.

use thiserror::Error;

/// Errors surfaced when validating a configuration or launching a run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The requested schedule or policy is not supported in this build.
    #[error("not supported: {0}")]
    Unsupported(&'static str),

    /// A configuration field failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
