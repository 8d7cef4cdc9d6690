//! Loom-swappable atomic primitives for the lock runtime.
//!
//! Under `--cfg loom` the owner-slot protocol runs on loom's model-checked
//! atomics; production builds use `core` atomics directly. Only the lock
//! runtime routes through this shim — worklists and executors are exercised
//! by conventional integration tests.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU32, Ordering};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicU32, Ordering};
