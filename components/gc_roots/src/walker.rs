//! Conservative stack walker.
//!
//! Every machine word on every registered stack, plus the live register file
//! of the active stack, is handed to a [`RootMarker`] as a candidate
//! pointer. The marker decides what is actually a pointer into the heap; the
//! walker only guarantees that each slot inside the recorded bounds is
//! offered at least once and that nothing outside them is read.
//!
//! # Ranges
//!
//! - Active stack: from the captured [`RegisterFile`] out to the stack's
//!   bottom, with the register buffer itself also scanned at half-word
//!   granularity.
//! - Inactive stacks: the `[position, bottom)` extent recorded at their last
//!   checkpoint.
//!
//! Direction-specific arithmetic comes from the build's [`NativeGrowth`].

use std::ops::Range;
use std::ptr;

use gc_platform::{
    capture_registers, flush_register_windows, NativeGrowth, RegisterFile, StackGrowth, WORD_SIZE,
};
use tracing::trace;

use crate::registry::StackRegistry;

/// Words handled per iteration of the unrolled scan loop.
const UNROLL: usize = 8;

/// Receives candidate pointers found by the walker.
///
/// Implementations must tolerate seeing the same value many times.
pub trait RootMarker {
    /// Called once per scanned word with its raw value.
    fn mark(&mut self, candidate: usize);
}

impl<F: FnMut(usize)> RootMarker for F {
    #[inline]
    fn mark(&mut self, candidate: usize) {
        self(candidate)
    }
}

/// Counters from one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Stacks visited
    pub stacks: usize,
    /// Words handed to the marker
    pub words: usize,
}

/// Offers every word-aligned slot in `range` to `marker`.
///
/// The start is rounded up and the end rounded down to word alignment.
/// Returns the number of words scanned.
///
/// # Safety
///
/// Every byte of `range` must be readable.
pub unsafe fn scan_range<M: RootMarker + ?Sized>(range: Range<usize>, marker: &mut M) -> usize {
    let start = (range.start + WORD_SIZE - 1) & !(WORD_SIZE - 1);
    let end = range.end & !(WORD_SIZE - 1);
    if start >= end {
        return 0;
    }

    let mut cursor = start as *const usize;
    let words = (end - start) / WORD_SIZE;

    for _ in 0..words / UNROLL {
        let w0 = ptr::read_volatile(cursor);
        let w1 = ptr::read_volatile(cursor.add(1));
        let w2 = ptr::read_volatile(cursor.add(2));
        let w3 = ptr::read_volatile(cursor.add(3));
        let w4 = ptr::read_volatile(cursor.add(4));
        let w5 = ptr::read_volatile(cursor.add(5));
        let w6 = ptr::read_volatile(cursor.add(6));
        let w7 = ptr::read_volatile(cursor.add(7));
        marker.mark(w0);
        marker.mark(w1);
        marker.mark(w2);
        marker.mark(w3);
        marker.mark(w4);
        marker.mark(w5);
        marker.mark(w6);
        marker.mark(w7);
        cursor = cursor.add(UNROLL);
    }
    for _ in 0..words % UNROLL {
        marker.mark(ptr::read_volatile(cursor));
        cursor = cursor.add(1);
    }

    words
}

/// Offers the interior of `regs` at half-word steps, so values stored at
/// half-word alignment inside the buffer are seen too.
pub fn scan_register_file<M: RootMarker + ?Sized>(regs: &RegisterFile, marker: &mut M) -> usize {
    let step = WORD_SIZE / 2;
    let base = regs.address();
    let last = base + regs.byte_len() - WORD_SIZE;

    let mut count = 0;
    let mut addr = base;
    while addr <= last {
        // SAFETY: `addr..addr + WORD_SIZE` lies inside `regs`.
        let word = unsafe { ptr::read_unaligned(addr as *const usize) };
        marker.mark(word);
        count += 1;
        addr += step;
    }
    count
}

/// Scans every registered stack given an already captured register file.
///
/// `regs` is taken to live on the active stack: its address is the active
/// stack's innermost point.
///
/// # Safety
///
/// `regs` must be located on the stack registered as active, and every
/// inactive stack's recorded range must be readable.
pub unsafe fn scan_stacks<M: RootMarker + ?Sized>(
    registry: &StackRegistry,
    regs: &RegisterFile,
    marker: &mut M,
) -> WalkStats {
    scan_stacks_with::<NativeGrowth, M>(registry, regs, marker)
}

/// [`scan_stacks`] with an explicit growth strategy.
///
/// # Safety
///
/// Same contract as [`scan_stacks`].
pub unsafe fn scan_stacks_with<G: StackGrowth, M: RootMarker + ?Sized>(
    registry: &StackRegistry,
    regs: &RegisterFile,
    marker: &mut M,
) -> WalkStats {
    let active = registry.active();
    let mut stats = WalkStats::default();

    for (id, desc) in registry.iter() {
        stats.stacks += 1;
        if id == active {
            let range = G::active_span(desc.bottom(), regs.address(), regs.byte_len());
            stats.words += scan_range(range, marker);
            stats.words += scan_register_file(regs, marker);
        } else {
            stats.words += scan_range(G::span(desc.bottom(), desc.position()), marker);
        }
    }

    stats
}

/// Captures the register file and scans every registered stack.
///
/// The active stack is checkpointed at the capture point first, so its
/// descriptor reflects the position scanned.
#[inline(never)]
pub fn walk_stacks<M: RootMarker + ?Sized>(registry: &mut StackRegistry, marker: &mut M) -> WalkStats {
    flush_register_windows();
    let mut regs = RegisterFile::new();
    capture_registers(&mut regs);

    // SAFETY: the registry's constructors and mutators are unsafe and require
    // every recorded range to be readable and the active stack to be the one
    // we are running on; `regs` lives in this frame, on that stack.
    let stats = unsafe {
        registry.checkpoint(registry.active(), regs.address());
        scan_stacks(registry, &regs, marker)
    };

    std::hint::black_box(&regs);
    trace!(
        stacks = stats.stacks,
        words = stats.words,
        growth = NativeGrowth::NAME,
        "walked stacks"
    );
    stats
}
