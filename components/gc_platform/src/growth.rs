//! Stack growth strategies.
//!
//! A stack has a fixed `bottom` (the outermost frame) and a moving `position`
//! (the innermost point recorded so far). Whether `position` sits below or
//! above `bottom` in the address space depends on the architecture. All
//! range arithmetic used by the scanner goes through [`StackGrowth`] so the
//! scanning code itself never branches on direction.

use std::ops::Range;

/// Direction-specific stack arithmetic.
///
/// Implementations are zero-sized and used purely as type parameters.
pub trait StackGrowth {
    /// Human-readable name, used in diagnostics.
    const NAME: &'static str;

    /// Returns true if `a` lies deeper into the stack than `b`.
    fn is_deeper(a: usize, b: usize) -> bool;

    /// Address range `[lo, hi)` occupied between `bottom` and `position`.
    ///
    /// Returns an empty range when `position` is not deeper than `bottom`.
    fn span(bottom: usize, position: usize) -> Range<usize>;

    /// Address range of a running stack whose registers were captured into a
    /// buffer of `len` bytes at `capture`. The buffer itself is included.
    fn active_span(bottom: usize, capture: usize, len: usize) -> Range<usize>;

    /// Of two candidate bottoms, the one further from the stack's growth.
    fn outermost(a: usize, b: usize) -> usize;

    /// Number of bytes between `bottom` and `position`.
    #[inline]
    fn extent(bottom: usize, position: usize) -> usize {
        let span = Self::span(bottom, position);
        span.end - span.start
    }
}

/// Stacks that grow toward lower addresses (x86, ARM, RISC-V, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct GrowsDown;

/// Stacks that grow toward higher addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrowsUp;

impl StackGrowth for GrowsDown {
    const NAME: &'static str = "grows-down";

    #[inline]
    fn is_deeper(a: usize, b: usize) -> bool {
        a < b
    }

    #[inline]
    fn span(bottom: usize, position: usize) -> Range<usize> {
        if position < bottom {
            position..bottom
        } else {
            bottom..bottom
        }
    }

    #[inline]
    fn active_span(bottom: usize, capture: usize, _len: usize) -> Range<usize> {
        Self::span(bottom, capture)
    }

    #[inline]
    fn outermost(a: usize, b: usize) -> usize {
        a.max(b)
    }
}

impl StackGrowth for GrowsUp {
    const NAME: &'static str = "grows-up";

    #[inline]
    fn is_deeper(a: usize, b: usize) -> bool {
        a > b
    }

    #[inline]
    fn span(bottom: usize, position: usize) -> Range<usize> {
        if position > bottom {
            bottom..position
        } else {
            bottom..bottom
        }
    }

    #[inline]
    fn active_span(bottom: usize, capture: usize, len: usize) -> Range<usize> {
        Self::span(bottom, capture.saturating_add(len))
    }

    #[inline]
    fn outermost(a: usize, b: usize) -> usize {
        a.min(b)
    }
}

/// Growth strategy of the target this crate was built for.
#[cfg(not(feature = "stack-grows-up"))]
pub type NativeGrowth = GrowsDown;

/// Growth strategy of the target this crate was built for.
#[cfg(feature = "stack-grows-up")]
pub type NativeGrowth = GrowsUp;
