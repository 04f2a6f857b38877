//! Per-thread collector context.
//!
//! Each thread owns at most one [`Heap`] and one [`StackRegistry`], kept in
//! a thread-local [`ThreadContext`] reached through [`with_context`]. The
//! context also carries the lifecycle flag that makes foreign-thread setup
//! and teardown idempotent.
//!
//! Stack bottoms are read in the frame of the function that initializes the
//! thread. Frames called after initialization are scanned; locals of the
//! initializing frame itself are not.

use std::cell::{Cell, RefCell};

use gc_platform::stack_pointer;
use tracing::debug;

use crate::config::HeapConfig;
use crate::descriptor::StackId;
use crate::error::GcResult;
use crate::heap::region::ObjRef;
use crate::heap::types::{Finalizer, TypeId};
use crate::heap::Heap;
use crate::registry::StackRegistry;
use crate::walker::{walk_stacks, RootMarker, WalkStats};

thread_local! {
    static CONTEXT: RefCell<ThreadContext> = RefCell::new(ThreadContext::new());
    static INHIBIT_DEPTH: Cell<usize> = Cell::new(0);
}

/// How the current thread's collector state came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No heap on this thread
    #[default]
    Uninitialized,
    /// Thread created and initialized by the runtime
    NativeThread,
    /// Externally created thread attached with `setup_foreign_thread`
    ForeignThread,
}

/// Collector state owned by one thread.
#[derive(Debug)]
pub struct ThreadContext {
    state: LifecycleState,
    heap: Option<Heap>,
    stacks: Option<StackRegistry>,
}

/// Runs `f` with the current thread's context.
///
/// # Panics
///
/// Panics when called re-entrantly from inside another `with_context`.
pub fn with_context<R>(f: impl FnOnce(&mut ThreadContext) -> R) -> R {
    CONTEXT.with(|ctx| f(&mut ctx.borrow_mut()))
}

/// Suppresses root collection on this thread while alive.
///
/// Guards nest; collection resumes once the outermost one drops, including
/// when the guarded code unwinds.
#[derive(Debug)]
pub struct CollectionGuard {
    _private: (),
}

impl CollectionGuard {
    pub fn new() -> Self {
        INHIBIT_DEPTH.with(|depth| depth.set(depth.get() + 1));
        CollectionGuard { _private: () }
    }
}

impl Default for CollectionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CollectionGuard {
    fn drop(&mut self) {
        INHIBIT_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Returns true while a [`CollectionGuard`] is alive on this thread.
pub fn collection_inhibited() -> bool {
    INHIBIT_DEPTH.with(|depth| depth.get() > 0)
}

impl ThreadContext {
    const fn new() -> Self {
        ThreadContext {
            state: LifecycleState::Uninitialized,
            heap: None,
            stacks: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.heap.is_some()
    }

    pub fn heap(&self) -> Option<&Heap> {
        self.heap.as_ref()
    }

    pub fn try_heap_mut(&mut self) -> Option<&mut Heap> {
        self.heap.as_mut()
    }

    /// # Panics
    ///
    /// Panics if the thread has no heap.
    pub fn heap_mut(&mut self) -> &mut Heap {
        match self.heap.as_mut() {
            Some(heap) => heap,
            None => panic!("thread has no heap; initialize it before use"),
        }
    }

    pub fn stacks(&self) -> Option<&StackRegistry> {
        self.stacks.as_ref()
    }

    fn stacks_mut(&mut self) -> &mut StackRegistry {
        match self.stacks.as_mut() {
            Some(stacks) => stacks,
            None => panic!("thread has no stack registry; initialize it before use"),
        }
    }

    pub fn register_type(&mut self, name: &'static str, finalizer: Option<Finalizer>) -> TypeId {
        self.heap_mut().register_type(name, finalizer)
    }

    pub fn allocate(&mut self, type_id: TypeId, size: usize) -> GcResult<ObjRef> {
        self.heap_mut().allocate(type_id, size)
    }

    /// Feeds every root of this thread to `marker`: external roots held
    /// through foreign cells first, then every registered stack.
    ///
    /// Pending cross-thread disposals are drained beforehand. Returns `None`
    /// without doing anything while collection is inhibited.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not initialized.
    pub fn collect_roots<M: RootMarker + ?Sized>(&mut self, marker: &mut M) -> Option<WalkStats> {
        if collection_inhibited() {
            debug!("root collection inhibited");
            return None;
        }
        let heap = self.heap_mut();
        heap.drain_pending_disposals();
        heap.mark_external_roots(marker);
        Some(walk_stacks(self.stacks_mut(), marker))
    }

    /// Registers a cooperative stack and makes it active.
    ///
    /// Called by switch code right before execution moves onto the stack
    /// whose outermost address is `bottom`.
    ///
    /// # Safety
    ///
    /// Same contract as [`StackRegistry::activate_bottom`]. In addition, the
    /// stack being left must be recorded with
    /// [`suspend_stack`](Self::suspend_stack) first: once another stack is
    /// active, the left one is scanned only over the extent recorded at its
    /// last checkpoint, and a stale extent misses live frames.
    #[cfg(feature = "multi-stack")]
    pub unsafe fn enter_stack(&mut self, bottom: usize) -> StackId {
        self.stacks_mut().activate_bottom(bottom)
    }

    /// Records where a stack stopped before execution moves elsewhere.
    ///
    /// # Safety
    ///
    /// The range between the stack's bottom and `position` must stay
    /// readable while the stack is suspended.
    pub unsafe fn suspend_stack(&mut self, id: StackId, position: usize) {
        self.stacks_mut().checkpoint(id, position);
    }

    /// Makes a registered stack active again.
    ///
    /// # Safety
    ///
    /// Same contract as [`StackRegistry::set_active`]. As with
    /// [`enter_stack`](Self::enter_stack), the stack being left must be
    /// suspended first.
    pub unsafe fn resume_stack(&mut self, id: StackId) {
        self.stacks_mut().set_active(id);
    }

    /// Forgets a cooperative stack once it has exited.
    pub fn leave_stack(&mut self, id: StackId) {
        self.stacks_mut().remove_stack(Some(id));
    }

    /// Installs a fresh heap and registry.
    ///
    /// # Safety
    ///
    /// `bottom` must be the outermost stack address the thread will scan.
    pub(crate) unsafe fn attach(&mut self, state: LifecycleState, heap: Heap, bottom: usize) {
        debug!(
            ?state,
            heap = heap.id().as_u64(),
            bottom = format_args!("{:#x}", bottom),
            "thread attached"
        );
        self.heap = Some(heap);
        self.stacks = Some(StackRegistry::new(bottom));
        self.state = state;
    }

    /// Drops the heap and registry, returning the thread to `Uninitialized`.
    pub(crate) fn detach(&mut self) {
        if let Some(heap) = self.heap.take() {
            debug!(heap = heap.id().as_u64(), pages = heap.page_count(), "thread detached");
        }
        self.stacks = None;
        self.state = LifecycleState::Uninitialized;
    }
}

/// Sets up a runtime-created thread with the default configuration.
///
/// Does nothing if the thread is already initialized. Inlined so the stack
/// bottom is read in the caller's frame.
#[inline(always)]
pub fn init_native_thread() -> GcResult<()> {
    let bottom = stack_pointer();
    init_thread_at(LifecycleState::NativeThread, HeapConfig::default(), bottom)
}

/// [`init_native_thread`] with an explicit configuration.
#[inline(always)]
pub fn init_native_thread_with(config: HeapConfig) -> GcResult<()> {
    let bottom = stack_pointer();
    init_thread_at(LifecycleState::NativeThread, config, bottom)
}

pub(crate) fn init_thread_at(
    state: LifecycleState,
    config: HeapConfig,
    bottom: usize,
) -> GcResult<()> {
    with_context(|ctx| {
        if ctx.state != LifecycleState::Uninitialized {
            return Ok(());
        }
        let heap = Heap::new(config)?;
        // SAFETY: `bottom` was read from the current thread's stack pointer
        // in a frame enclosing every later walk.
        unsafe { ctx.attach(state, heap, bottom) };
        Ok(())
    })
}

/// Widens the main stack's bottom outward to `bottom`.
///
/// # Safety
///
/// `bottom` must lie within the calling thread's machine stack.
pub unsafe fn set_stack_bottom(bottom: usize) {
    with_context(|ctx| ctx.stacks_mut().set_main_bottom(bottom))
}

/// Lifecycle state of the current thread.
pub fn lifecycle_state() -> LifecycleState {
    with_context(|ctx| ctx.state)
}
