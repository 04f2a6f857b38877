use std::iter::Once;

use crate::descriptor::{StackDescriptor, StackId};

/// Registry reduced to the thread's own stack.
#[derive(Debug)]
pub struct StackRegistry {
    main: StackDescriptor,
}

impl StackRegistry {
    /// Creates a registry whose main stack starts at `bottom`.
    ///
    /// # Safety
    ///
    /// `bottom` must be zero or the outermost address of the calling
    /// thread's machine stack.
    pub unsafe fn new(bottom: usize) -> Self {
        StackRegistry {
            main: StackDescriptor::new(bottom, StackId::MAIN, StackId::MAIN),
        }
    }

    /// No other stack can be registered; `None` is ignored.
    ///
    /// # Panics
    ///
    /// Panics when asked to remove the main stack.
    pub fn remove_stack(&mut self, id: Option<StackId>) {
        if let Some(id) = id {
            assert!(!id.is_main(), "the main thread stack cannot be removed");
        }
    }

    /// `None` and the main bottom resolve to [`StackId::MAIN`].
    pub fn find_stack(&self, bottom: Option<usize>) -> Option<StackId> {
        match bottom {
            None => Some(StackId::MAIN),
            Some(bottom) if bottom == self.main.bottom => Some(StackId::MAIN),
            Some(_) => None,
        }
    }

    /// One pass over the single descriptor.
    pub fn iter(&self) -> StackIter<'_> {
        std::iter::once((StackId::MAIN, &self.main))
    }

    /// # Safety
    ///
    /// Trivially satisfied; kept `unsafe` to match the multi-stack registry.
    pub unsafe fn set_active(&mut self, id: StackId) {
        assert!(id.is_main(), "cannot activate unregistered stack {}", id);
    }

    pub fn active(&self) -> StackId {
        StackId::MAIN
    }

    /// # Safety
    ///
    /// The range between the main bottom and `position` must be readable.
    pub unsafe fn checkpoint(&mut self, id: StackId, position: usize) {
        if id.is_main() {
            self.main.record_position(position);
        }
    }

    /// # Safety
    ///
    /// `bottom` must lie within the calling thread's machine stack.
    pub unsafe fn set_main_bottom(&mut self, bottom: usize) {
        self.main.widen_bottom(bottom);
    }

    pub fn descriptor(&self, id: StackId) -> Option<&StackDescriptor> {
        id.is_main().then_some(&self.main)
    }

    pub fn main(&self) -> &StackDescriptor {
        &self.main
    }

    pub fn contains(&self, id: StackId) -> bool {
        id.is_main()
    }

    pub fn len(&self) -> usize {
        1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn total_size(&self) -> usize {
        self.main.extent()
    }
}

/// Single pass over the main descriptor.
pub type StackIter<'a> = Once<(StackId, &'a StackDescriptor)>;
