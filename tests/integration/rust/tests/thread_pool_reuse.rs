//! Foreign Thread Reuse Integration Tests
//!
//! Simulates a host thread pool whose workers attach to and detach from the
//! collector once per job, many times over.

use std::thread;

use crossbeam::channel;
use gc_roots::{
    lifecycle_state, setup_foreign_thread, setup_foreign_thread_with, teardown_foreign_thread,
    with_context, HeapConfig, HeapId, LifecycleState,
};
use integration_tests::collect_candidates;

const WORKERS: usize = 4;
const JOBS: usize = 64;

/// Runs one job on an attached worker and reports the heap it used.
fn run_job(size: usize) -> HeapId {
    setup_foreign_thread_with(HeapConfig::minimal()).unwrap();
    let id = with_context(|ctx| {
        let ty = ctx.register_type("Job", None);
        for _ in 0..16 {
            ctx.allocate(ty, size).unwrap();
        }
        ctx.heap().map(|heap| heap.id())
    });
    collect_candidates();
    teardown_foreign_thread();
    assert_eq!(lifecycle_state(), LifecycleState::Uninitialized);
    id.unwrap()
}

/// Test: pooled workers attach and detach once per job without leaking state
#[test]
fn test_pool_workers_attach_per_job() {
    let (jobs_tx, jobs_rx) = channel::unbounded::<usize>();
    let (done_tx, done_rx) = channel::unbounded::<HeapId>();

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let jobs = jobs_rx.clone();
            let done = done_tx.clone();
            thread::spawn(move || {
                for size in jobs {
                    done.send(run_job(size)).unwrap();
                }
            })
        })
        .collect();
    drop(done_tx);

    for job in 0..JOBS {
        jobs_tx.send(16 + job).unwrap();
    }
    drop(jobs_tx);

    for worker in workers {
        worker.join().unwrap();
    }

    let mut ids: Vec<HeapId> = done_rx.iter().collect();
    assert_eq!(ids.len(), JOBS);
    ids.sort();
    ids.dedup();
    // Every attach creates a fresh heap.
    assert_eq!(ids.len(), JOBS);
}

/// Test: repeated setup and teardown on one thread is idempotent
#[test]
fn test_repeated_setup_is_idempotent() {
    thread::spawn(|| {
        for _ in 0..10 {
            setup_foreign_thread();
            setup_foreign_thread();
            assert_eq!(lifecycle_state(), LifecycleState::ForeignThread);
            teardown_foreign_thread();
            teardown_foreign_thread();
            assert_eq!(lifecycle_state(), LifecycleState::Uninitialized);
            assert!(with_context(|ctx| ctx.heap().is_none() && ctx.stacks().is_none()));
        }
    })
    .join()
    .unwrap();
}
