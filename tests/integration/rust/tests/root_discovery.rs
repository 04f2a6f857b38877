//! End-to-end Root Discovery Tests
//!
//! Allocates objects, keeps references only on the machine stack or on a
//! parked cooperative stack, and checks a full root collection finds them.

use std::hint::black_box;

use gc_roots::{init_native_thread_with, with_context, HeapConfig, ObjRef, StackId};
use integration_tests::collect_candidates;

fn allocate(count: usize) -> Vec<ObjRef> {
    with_context(|ctx| {
        let ty = ctx.register_type("Node", None);
        (0..count).map(|_| ctx.allocate(ty, 48).unwrap()).collect()
    })
}

#[inline(never)]
fn hold_on_stack_and_collect() -> (Vec<ObjRef>, Vec<ObjRef>) {
    let objs = allocate(4);
    let held = [objs[0], objs[1], objs[2], objs[3]];
    black_box(&held);

    let found = collect_candidates().resolve();

    black_box(&held);
    let missing = held.iter().copied().filter(|o| !found.contains(o)).collect();
    (held.to_vec(), missing)
}

/// Test: references held in stack locals are discovered
#[test]
fn test_stack_locals_are_roots() {
    init_native_thread_with(HeapConfig::minimal()).unwrap();
    let (held, missing) = hold_on_stack_and_collect();
    assert_eq!(held.len(), 4);
    assert!(missing.is_empty(), "missed {:?}", missing);
}

#[inline(never)]
fn hold_interior_pointer_and_collect() -> bool {
    let obj = allocate(1)[0];
    // Only a pointer into the middle of the payload survives.
    let interior = black_box(obj.payload() as usize + 20);
    let found = collect_candidates().resolve();
    black_box(interior);
    found.contains(&obj)
}

/// Test: interior pointers keep their object alive
#[test]
fn test_interior_pointer_resolves_to_object() {
    init_native_thread_with(HeapConfig::minimal()).unwrap();
    assert!(hold_interior_pointer_and_collect());
}

/// Test: foreign cells keep objects alive with no stack reference
#[test]
fn test_protected_object_is_root_without_stack_reference() {
    init_native_thread_with(HeapConfig::minimal()).unwrap();
    let cell = gc_roots::protect(allocate(1)[0]);
    let target = cell.data().address();

    let candidates = collect_candidates();
    assert!(candidates.contains(target));

    gc_roots::dispose(cell);
}

/// Test: a suspended cooperative stack is scanned over its recorded extent
#[test]
fn test_parked_cooperative_stack_is_scanned() {
    init_native_thread_with(HeapConfig::minimal()).unwrap();
    let objs = allocate(3);

    // Heap memory standing in for a coroutine stack.
    let mut fiber = vec![0usize; 256];
    let start = fiber.as_ptr() as usize;
    let bottom = start + fiber.len() * std::mem::size_of::<usize>();
    let live_from = 200;
    for (slot, obj) in fiber[live_from..].iter_mut().zip(&objs) {
        *slot = obj.address();
    }

    let id = with_context(|ctx| unsafe {
        let id = ctx.enter_stack(bottom);
        ctx.suspend_stack(id, start + live_from * std::mem::size_of::<usize>());
        ctx.resume_stack(StackId::MAIN);
        id
    });

    let candidates = collect_candidates();
    for obj in &objs {
        assert!(candidates.contains(obj.address()));
    }

    with_context(|ctx| ctx.leave_stack(id));
    black_box(&fiber);
}

/// Test: the active stack checkpoint grows with call depth
#[test]
fn test_walk_records_observed_size() {
    init_native_thread_with(HeapConfig::minimal()).unwrap();
    collect_candidates();
    let observed = with_context(|ctx| {
        ctx.stacks()
            .map(|stacks| stacks.main().max_observed_size())
            .unwrap_or(0)
    });
    assert!(observed > 0);
}
