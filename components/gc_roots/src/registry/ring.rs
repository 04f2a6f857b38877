use tracing::debug;

use crate::descriptor::{StackDescriptor, StackId};

/// One arena entry. `generation` is bumped whenever the slot is vacated.
#[derive(Debug)]
struct Slot {
    generation: u32,
    desc: Option<StackDescriptor>,
}

/// Ring of stack descriptors belonging to one thread.
///
/// Descriptors are linked through `prev`/`next` ids. The ring always contains
/// the main descriptor at [`StackId::MAIN`]; new stacks are linked in just
/// before it so iteration follows registration order.
#[derive(Debug)]
pub struct StackRegistry {
    /// Arena of descriptors; vacant slots are reused through `free`
    slots: Vec<Slot>,
    /// Indices of vacant slots available for reuse
    free: Vec<u32>,
    /// Descriptor the live register file belongs to
    active: StackId,
    /// Number of linked descriptors
    len: usize,
}

impl StackRegistry {
    /// Creates a registry whose main stack starts at `bottom`.
    ///
    /// A `bottom` of zero leaves the main stack unestablished until
    /// [`set_main_bottom`](Self::set_main_bottom) is called.
    ///
    /// # Safety
    ///
    /// `bottom` must be zero or the outermost address of the calling
    /// thread's machine stack.
    pub unsafe fn new(bottom: usize) -> Self {
        StackRegistry {
            slots: vec![Slot {
                generation: 0,
                desc: Some(StackDescriptor::new(bottom, StackId::MAIN, StackId::MAIN)),
            }],
            free: Vec::new(),
            active: StackId::MAIN,
            len: 1,
        }
    }

    /// Registers a cooperative stack whose outermost address is `bottom`.
    ///
    /// # Safety
    ///
    /// The memory between `bottom` and every position later recorded for
    /// the stack must stay readable until the stack is removed.
    pub unsafe fn add_stack(&mut self, bottom: usize) -> StackId {
        let tail = self.slot(StackId::MAIN).prev;
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    desc: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = StackId::new(index, slot.generation);
        slot.desc = Some(StackDescriptor::new(bottom, tail, StackId::MAIN));
        self.slot_mut(tail).next = id;
        self.slot_mut(StackId::MAIN).prev = id;
        self.len += 1;

        debug!(stack = %id, bottom = format_args!("{:#x}", bottom), "registered stack");
        id
    }

    /// Unlinks and frees a descriptor.
    ///
    /// `None` and ids that are no longer registered are ignored, including
    /// ids whose slot has since been reused. If the removed stack was active,
    /// the main stack becomes active.
    ///
    /// # Panics
    ///
    /// Panics when asked to remove the main stack.
    pub fn remove_stack(&mut self, id: Option<StackId>) {
        let Some(id) = id else {
            return;
        };
        assert!(!id.is_main(), "the main thread stack cannot be removed");
        if !self.contains(id) {
            return;
        }

        let slot = &mut self.slots[id.index()];
        let Some(desc) = slot.desc.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.slot_mut(desc.prev).next = desc.next;
        self.slot_mut(desc.next).prev = desc.prev;
        self.free.push(id.index);
        self.len -= 1;

        if self.active == id {
            self.active = StackId::MAIN;
        }
        debug!(stack = %id, "removed stack");
    }

    /// Finds the descriptor registered with `bottom`.
    ///
    /// `None` stands for the thread's own stack and always resolves to
    /// [`StackId::MAIN`].
    pub fn find_stack(&self, bottom: Option<usize>) -> Option<StackId> {
        match bottom {
            None => Some(StackId::MAIN),
            Some(bottom) => self
                .iter()
                .find(|(_, desc)| desc.bottom == bottom)
                .map(|(id, _)| id),
        }
    }

    /// Makes the stack at `bottom` active, registering it first if needed.
    ///
    /// # Safety
    ///
    /// Same contract as [`add_stack`](Self::add_stack) and
    /// [`set_active`](Self::set_active).
    pub unsafe fn activate_bottom(&mut self, bottom: usize) -> StackId {
        let id = match self.find_stack(Some(bottom)) {
            Some(id) => id,
            None => self.add_stack(bottom),
        };
        self.set_active(id);
        id
    }

    /// One pass over the ring, starting at the main stack.
    pub fn iter(&self) -> StackIter<'_> {
        StackIter {
            registry: self,
            next: Some(StackId::MAIN),
        }
    }

    /// Marks `id` as the stack the thread is executing on.
    ///
    /// # Safety
    ///
    /// The thread must actually be running on that stack whenever the walker
    /// runs, since the walker scans from the live register capture to the
    /// active stack's bottom.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not registered.
    pub unsafe fn set_active(&mut self, id: StackId) {
        assert!(self.contains(id), "cannot activate unregistered stack {}", id);
        self.active = id;
    }

    /// The stack register contents currently belong to.
    pub fn active(&self) -> StackId {
        self.active
    }

    /// Records the innermost position of `id`. Unregistered ids are ignored.
    ///
    /// # Safety
    ///
    /// The range between the stack's bottom and `position` must be readable.
    pub unsafe fn checkpoint(&mut self, id: StackId, position: usize) {
        if let Some(desc) = self.descriptor_mut(id) {
            desc.record_position(position);
        }
    }

    /// Establishes the main stack's bottom, or widens it outward.
    ///
    /// # Safety
    ///
    /// `bottom` must lie within the calling thread's machine stack.
    pub unsafe fn set_main_bottom(&mut self, bottom: usize) {
        self.slot_mut(StackId::MAIN).widen_bottom(bottom);
    }

    /// Descriptor for `id`, if registered.
    pub fn descriptor(&self, id: StackId) -> Option<&StackDescriptor> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.desc.as_ref())
    }

    fn descriptor_mut(&mut self, id: StackId) -> Option<&mut StackDescriptor> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.desc.as_mut())
    }

    /// The permanent main stack descriptor.
    pub fn main(&self) -> &StackDescriptor {
        self.slot(StackId::MAIN)
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: StackId) -> bool {
        self.descriptor(id).is_some()
    }

    /// Number of registered stacks, main included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: the main stack is permanent.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Sum of the current extent of every stack, in bytes.
    pub fn total_size(&self) -> usize {
        self.iter().map(|(_, desc)| desc.extent()).sum()
    }

    // Ring links always name live descriptors.
    fn slot(&self, id: StackId) -> &StackDescriptor {
        match self.descriptor(id) {
            Some(desc) => desc,
            None => unreachable!("stack ring links vacant slot {}", id),
        }
    }

    fn slot_mut(&mut self, id: StackId) -> &mut StackDescriptor {
        match self.descriptor_mut(id) {
            Some(desc) => desc,
            None => unreachable!("stack ring links vacant slot {}", id),
        }
    }
}

/// Lazy single pass over a [`StackRegistry`].
pub struct StackIter<'a> {
    registry: &'a StackRegistry,
    next: Option<StackId>,
}

impl<'a> Iterator for StackIter<'a> {
    type Item = (StackId, &'a StackDescriptor);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let desc = self.registry.slot(id);
        self.next = if desc.next.is_main() { None } else { Some(desc.next) };
        Some((id, desc))
    }
}
