//! GC Roots - conservative root discovery for thread-local heaps
//!
//! This component provides:
//! - Stack descriptors and a per-thread registry of cooperative stacks
//! - A conservative walker feeding every stack word and register to a marker
//! - Foreign cells for handing collector-owned values between threads
//! - Idempotent setup and teardown of externally created threads
//! - Heap teardown with finalizers, instance diagnostics and an OOM hook
//!
//! The tracing collector supplies the marking itself through [`RootMarker`];
//! this crate only decides which words are candidate roots.
//!
//! # Example
//!
//! ```
//! use gc_roots::{init_native_thread, with_context};
//!
//! init_native_thread().unwrap();
//! let mut candidates = 0usize;
//! let stats = with_context(|ctx| ctx.collect_roots(&mut |_word: usize| candidates += 1));
//! assert!(stats.is_some());
//! ```

pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod foreign;
pub mod heap;
#[cfg(feature = "foreign-threads")]
pub mod lifecycle;
pub mod registry;
pub mod teardown;
pub mod walker;

pub use config::HeapConfig;
pub use context::{
    collection_inhibited, init_native_thread, init_native_thread_with, lifecycle_state,
    set_stack_bottom, with_context, CollectionGuard, LifecycleState, ThreadContext,
};
pub use descriptor::{StackDescriptor, StackId};
pub use error::{GcError, GcResult};
pub use foreign::{dispose, is_owned_by_current_thread, protect, ForeignCell, PendingDisposals};
pub use heap::diagnostics::{InstanceCount, InstanceEntry};
pub use heap::{
    Finalizer, Heap, HeapId, InstanceReport, ObjRef, ObjectHeader, OomHook, OomReport, TypeId,
    TypeInfo, TypeTable,
};
#[cfg(feature = "foreign-threads")]
pub use lifecycle::{setup_foreign_thread, setup_foreign_thread_with, teardown_foreign_thread};
pub use registry::{StackIter, StackRegistry};
pub use teardown::dealloc_heap;
pub use walker::{
    scan_range, scan_register_file, scan_stacks, scan_stacks_with, walk_stacks, RootMarker,
    WalkStats,
};
