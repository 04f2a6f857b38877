//! Bulk heap deallocation.
//!
//! Teardown optionally runs every registered finalizer once, then returns
//! all pages to the system. Finalizers run under a [`CollectionGuard`], so a
//! finalizer that allocates never starts a nested root collection.

use tracing::debug;

use crate::context::{with_context, CollectionGuard};
use crate::heap::region::PageRegion;
use crate::heap::types::{TypeId, TypeTable};
use crate::heap::Heap;

/// Invokes the finalizer of every object in `region` whose type has one.
///
/// `after` is called with the object's type and payload size once its
/// finalizer returned. Returns the number of finalizers run.
pub(crate) fn finalize_region(
    region: &PageRegion,
    types: &TypeTable,
    mut after: impl FnMut(TypeId, usize),
) -> usize {
    let _guard = CollectionGuard::new();
    let mut finalized = 0;
    region.for_each_object(|obj| {
        // SAFETY: the region is detached from its heap but still owns its
        // pages, and enumeration only yields objects it allocated.
        let header = unsafe { obj.header() };
        if let Some(finalizer) = types.finalizer(header.type_id) {
            finalizer(obj);
            after(header.type_id, header.size);
            finalized += 1;
        }
    });
    finalized
}

impl Heap {
    /// Tears the heap down in place.
    ///
    /// With `run_finalizers` every finalizer runs once before the pages are
    /// released. With `allow_reinit` the heap keeps accepting allocations;
    /// otherwise any further allocation panics.
    pub fn dealloc(&mut self, run_finalizers: bool, allow_reinit: bool) {
        if run_finalizers {
            let region = self.take_region();
            let types = self.types().clone();
            let finalized =
                finalize_region(&region, &types, |ty, size| self.record_finalized(ty, size));
            debug!(heap = self.id().as_u64(), finalized, "finalizers run");
            drop(region);
        }
        self.finish_teardown(allow_reinit);
    }
}

/// Tears down the current thread's heap.
///
/// Unlike [`Heap::dealloc`], the thread context is not borrowed while
/// finalizers run, so they may allocate on this thread. Such objects are
/// released with the rest of the heap and are not finalized.
///
/// # Panics
///
/// Panics if the thread has no heap.
pub fn dealloc_heap(run_finalizers: bool, allow_reinit: bool) {
    if run_finalizers {
        let (region, types) = with_context(|ctx| {
            let heap = ctx.heap_mut();
            (heap.take_region(), heap.types().clone())
        });
        let finalized = finalize_region(&region, &types, |ty, size| {
            with_context(|ctx| ctx.heap_mut().record_finalized(ty, size))
        });
        debug!(finalized, "finalizers run");
        drop(region);
    }
    with_context(|ctx| ctx.heap_mut().finish_teardown(allow_reinit));
}
