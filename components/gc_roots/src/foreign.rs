//! Cross-thread handoff of collector-owned values.
//!
//! A [`ForeignCell`] keeps its value alive through an external-root count on
//! the heap that allocated it. Only that heap's thread may release the count
//! directly; any other thread queues the release and the owner drains the
//! queue during its next root collection.

use std::sync::Weak;

use crossbeam::queue::SegQueue;
use tracing::warn;

use crate::context::with_context;
use crate::heap::region::ObjRef;
use crate::heap::HeapId;

/// Releases queued by threads that do not own the heap.
#[derive(Debug, Default)]
pub struct PendingDisposals {
    queue: SegQueue<ObjRef>,
}

impl PendingDisposals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, obj: ObjRef) {
        self.queue.push(obj);
    }

    /// Pops every queued entry into `release`, returning how many there were.
    pub fn drain(&self, mut release: impl FnMut(ObjRef)) -> usize {
        let mut drained = 0;
        while let Some(obj) = self.queue.pop() {
            release(obj);
            drained += 1;
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// An external reference to a collector-managed value.
///
/// Created by [`protect`] and consumed by [`dispose`]; since disposal takes
/// the cell by value, a cell can be released only once. Dropping a cell
/// without disposing it keeps the value alive until its heap is torn down.
#[must_use = "a foreign cell pins its value until it is disposed"]
#[derive(Debug)]
pub struct ForeignCell {
    data: ObjRef,
    owner: HeapId,
    /// Never keeps the owning heap's queue alive
    pending: Weak<PendingDisposals>,
}

impl ForeignCell {
    pub(crate) fn new(data: ObjRef, owner: HeapId, pending: Weak<PendingDisposals>) -> Self {
        ForeignCell {
            data,
            owner,
            pending,
        }
    }

    /// The protected value. Only the owning thread may read through it.
    pub fn data(&self) -> ObjRef {
        self.data
    }

    /// Identity of the heap that allocated the value.
    pub fn owner(&self) -> HeapId {
        self.owner
    }

    /// Queues the release on the owning heap.
    pub(crate) fn defer(self) {
        match self.pending.upgrade() {
            Some(pending) => pending.push(self.data),
            None => warn!(
                heap = self.owner.as_u64(),
                object = format_args!("{:#x}", self.data.address()),
                "owning heap is gone, dropping disposal"
            ),
        }
    }
}

/// Protects `obj` on the current thread's heap.
///
/// # Panics
///
/// Panics if the thread has no heap.
pub fn protect(obj: ObjRef) -> ForeignCell {
    with_context(|ctx| ctx.heap_mut().protect(obj))
}

/// Releases `cell`, immediately when the current thread owns it and through
/// the owner's pending queue otherwise.
pub fn dispose(cell: ForeignCell) {
    with_context(|ctx| match ctx.try_heap_mut() {
        Some(heap) => heap.dispose(cell),
        None => cell.defer(),
    })
}

/// Returns true if the current thread's heap allocated the cell's value.
pub fn is_owned_by_current_thread(cell: &ForeignCell) -> bool {
    with_context(|ctx| ctx.heap().map_or(false, |heap| heap.owns(cell)))
}
