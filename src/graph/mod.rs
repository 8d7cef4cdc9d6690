//! Graph collaborators.
//!
//! The runtime treats graphs as opaque except for their lockable elements;
//! this module supplies the CSR implementation the executors are exercised
//! against. Anything with node/edge iteration and a shared [`LockTable`] can
//! play the same role.
//!
//! [`LockTable`]: crate::runtime::LockTable

mod csr;

pub use csr::{EdgeIdx, LcCsrGraph, NodeId};
