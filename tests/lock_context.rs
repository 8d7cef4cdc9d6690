//! Lock table + execution context state machine coverage.

use std::sync::Arc;

use lockstep::{ContentionPolicy, ContextId, ExecutionContext, LockTable};

fn ctx(id: u32, table: &Arc<LockTable>) -> ExecutionContext {
    ExecutionContext::new(ContextId::new(id).expect("non-zero"), table.clone())
}

fn ctx_min(id: u32, table: &Arc<LockTable>) -> ExecutionContext {
    ExecutionContext::with_policy(
        ContextId::new(id).expect("non-zero"),
        table.clone(),
        ContentionPolicy::MinOwnerWins,
    )
}

#[test]
fn commit_releases_every_lock_in_acquisition_order() {
    let table = Arc::new(LockTable::new(4));
    let mut c = ctx(1, &table);
    c.start_iteration();
    c.acquire(0).expect("free");
    c.acquire(2).expect("free");
    c.acquire(3).expect("free");
    assert_eq!(c.held_locks(), &[0, 2, 3]);
    assert_eq!(table.owner(0), Some(c.id()));
    assert_eq!(table.owner(1), None);
    c.commit_iteration();
    assert!(table.all_unowned());
    assert!(c.held_locks().is_empty());
}

#[test]
fn reentrant_acquisition_is_a_noop() {
    let table = Arc::new(LockTable::new(2));
    let mut c = ctx(1, &table);
    c.start_iteration();
    c.acquire(1).expect("free");
    c.acquire(1).expect("re-entrant");
    assert_eq!(c.held_locks().len(), 1);
    c.commit_iteration();
    assert!(table.all_unowned());
}

#[test]
fn conflicting_acquisition_fails_until_owner_cancels() {
    let table = Arc::new(LockTable::new(1));
    let mut a = ctx(1, &table);
    let mut b = ctx(2, &table);
    a.start_iteration();
    b.start_iteration();
    a.acquire(0).expect("free");
    assert!(b.acquire(0).is_err(), "requester must abort, not block");
    a.cancel_iteration();
    assert!(table.all_unowned());
    b.acquire(0).expect("owner cancelled; slot is free");
    b.commit_iteration();
}

#[test]
fn cancel_releases_all_locks_and_context_is_reusable() {
    let table = Arc::new(LockTable::new(3));
    let mut c = ctx(1, &table);
    c.start_iteration();
    c.acquire(0).expect("free");
    c.acquire(1).expect("free");
    c.cancel_iteration();
    assert!(table.all_unowned());
    c.start_iteration();
    c.acquire(2).expect("fresh iteration");
    c.commit_iteration();
    assert!(table.all_unowned());
}

#[test]
#[should_panic(expected = "after failsafe")]
fn acquiring_a_new_lock_after_failsafe_is_fatal() {
    let table = Arc::new(LockTable::new(2));
    let mut c = ctx(1, &table);
    c.start_iteration();
    c.acquire(0).expect("free");
    c.enter_failsafe();
    c.acquire(0).expect("already held is fine past failsafe");
    let _ = c.acquire(1);
}

#[test]
#[should_panic(expected = "locks still held")]
fn restarting_with_held_locks_is_fatal() {
    let table = Arc::new(LockTable::new(1));
    let mut c = ctx(1, &table);
    c.start_iteration();
    c.acquire(0).expect("free");
    c.start_iteration();
}

#[test]
fn min_policy_lower_id_preempts_owner() {
    let table = Arc::new(LockTable::new(1));
    let mut late = ctx_min(2, &table);
    let mut early = ctx_min(1, &table);
    late.start_iteration();
    early.start_iteration();

    late.acquire(0).expect("free");
    assert!(late.owns_all());

    early.acquire(0).expect("min-wins never reports a conflict");
    assert!(early.owns_all(), "lower id took the slot over");
    assert!(!late.owns_all(), "displaced owner fails its commit check");

    late.cancel_iteration();
    assert_eq!(table.owner(0), Some(early.id()), "loser's release is skipped");
    early.commit_iteration();
    assert!(table.all_unowned());
}

#[test]
fn min_policy_higher_id_concedes_but_keeps_building() {
    let table = Arc::new(LockTable::new(2));
    let mut early = ctx_min(1, &table);
    let mut late = ctx_min(2, &table);
    early.start_iteration();
    late.start_iteration();

    early.acquire(0).expect("free");
    late.acquire(0).expect("concede is not an error");
    late.acquire(1).expect("free slot still acquirable after conceding");
    assert!(!late.owns_all());
    assert!(early.owns_all());

    late.cancel_iteration();
    early.commit_iteration();
    assert!(table.all_unowned());
}
