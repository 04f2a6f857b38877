//! Stack descriptors.
//!
//! A descriptor records the bounds of one logical stack: the thread's own
//! machine stack or the stack of a cooperative execution context running on
//! it. Descriptors live in the [`StackRegistry`](crate::StackRegistry) arena
//! and refer to their ring neighbours by [`StackId`].

use std::fmt;

use gc_platform::{NativeGrowth, StackGrowth};

/// Handle to a descriptor in its registry.
///
/// The generation changes every time an arena slot is reused, so a handle
/// to a removed stack never refers to the stack that took its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl StackId {
    /// The thread's own machine stack. Always present, never removed.
    pub const MAIN: StackId = StackId::new(0, 0);

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        StackId { index, generation }
    }

    /// Returns true for the main stack.
    pub fn is_main(self) -> bool {
        self == Self::MAIN
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

/// Bounds and position of one logical stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescriptor {
    /// Outermost address of the stack
    pub(crate) bottom: usize,
    /// Innermost address recorded at the last checkpoint
    pub(crate) position: usize,
    /// Largest extent ever recorded, in bytes
    pub(crate) max_observed_size: usize,
    pub(crate) prev: StackId,
    pub(crate) next: StackId,
}

impl StackDescriptor {
    pub(crate) fn new(bottom: usize, prev: StackId, next: StackId) -> Self {
        StackDescriptor {
            bottom,
            position: bottom,
            max_observed_size: 0,
            prev,
            next,
        }
    }

    /// Outermost address of the stack.
    pub fn bottom(&self) -> usize {
        self.bottom
    }

    /// Innermost address recorded at the last checkpoint.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Largest extent recorded so far, in bytes.
    pub fn max_observed_size(&self) -> usize {
        self.max_observed_size
    }

    /// Bytes currently in use between `bottom` and `position`.
    pub fn extent(&self) -> usize {
        NativeGrowth::extent(self.bottom, self.position)
    }

    /// Records a new innermost position.
    pub(crate) fn record_position(&mut self, position: usize) {
        self.position = position;
        self.max_observed_size = self.max_observed_size.max(self.extent());
    }

    /// Moves `bottom` outward if `candidate` lies further out.
    pub(crate) fn widen_bottom(&mut self, candidate: usize) {
        if self.bottom == 0 {
            self.bottom = candidate;
            self.position = candidate;
        } else {
            self.bottom = NativeGrowth::outermost(self.bottom, candidate);
        }
    }
}
