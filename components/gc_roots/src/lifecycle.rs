//! Attach and detach externally created threads.
//!
//! Threads the runtime did not spawn (thread pools, host callbacks) call
//! [`setup_foreign_thread`] before touching collector-managed values and
//! [`teardown_foreign_thread`] before returning to their owner. Both are
//! idempotent, so a pooled thread may attach and detach any number of times.

use gc_platform::stack_pointer;
use tracing::debug;

use crate::config::HeapConfig;
use crate::context::{init_thread_at, with_context, LifecycleState};
use crate::error::GcResult;

/// Attaches the current thread with the default heap configuration.
///
/// Does nothing unless the thread is `Uninitialized`. The stack bottom is
/// the caller's stack pointer.
///
/// # Panics
///
/// Panics if the initial pages cannot be acquired.
#[inline(always)]
pub fn setup_foreign_thread() {
    let bottom = stack_pointer();
    if let Err(err) = init_thread_at(LifecycleState::ForeignThread, HeapConfig::default(), bottom) {
        panic!("foreign thread setup failed: {err}");
    }
}

/// [`setup_foreign_thread`] with an explicit configuration.
#[inline(always)]
pub fn setup_foreign_thread_with(config: HeapConfig) -> GcResult<()> {
    let bottom = stack_pointer();
    init_thread_at(LifecycleState::ForeignThread, config, bottom)
}

/// Detaches the current thread, returning every page it owns.
///
/// No finalizers run. Does nothing unless the thread was attached with
/// [`setup_foreign_thread`]; native threads are left untouched.
pub fn teardown_foreign_thread() {
    with_context(|ctx| {
        if ctx.state() != LifecycleState::ForeignThread {
            debug!(state = ?ctx.state(), "foreign teardown skipped");
            return;
        }
        ctx.detach();
    })
}
