//! Thread-local heap: region, collector state and type table.
//!
//! A [`Heap`] belongs to exactly one thread and is never shared. The only
//! piece other threads can reach is its pending-disposal queue, through the
//! weak handle carried by each [`ForeignCell`].

pub mod diagnostics;
pub mod region;
pub mod types;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
#[cfg(feature = "live-set-debug")]
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use crate::config::HeapConfig;
use crate::error::{GcError, GcResult};
use crate::foreign::{ForeignCell, PendingDisposals};
use crate::walker::RootMarker;

#[cfg(feature = "instance-names")]
use self::diagnostics::InstanceCounters;

pub use self::diagnostics::{InstanceReport, OomReport};
pub use self::region::{checked_footprint, object_footprint, ObjRef, ObjectHeader, PageRegion};
pub use self::types::{Finalizer, TypeId, TypeInfo, TypeTable};

/// Heap ids are never reused, so a cell outliving its heap is never
/// mistaken for one owned by a later heap.
static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a heap instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u64);

impl HeapId {
    fn next() -> Self {
        HeapId(NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Callback invoked when page acquisition fails.
pub type OomHook = Box<dyn FnMut(&OomReport)>;

/// Per-cycle bookkeeping owned by the collector.
#[derive(Debug, Default)]
pub(crate) struct CollectorState {
    /// Reference counts of objects held through foreign cells
    external_roots: HashMap<ObjRef, usize>,
    #[cfg(feature = "instance-names")]
    instances: InstanceCounters,
    #[cfg(feature = "live-set-debug")]
    live: HashSet<ObjRef>,
}

/// A thread's garbage-collected heap.
pub struct Heap {
    id: HeapId,
    config: HeapConfig,
    region: PageRegion,
    types: TypeTable,
    collector: CollectorState,
    pending: Arc<PendingDisposals>,
    oom_hook: Option<OomHook>,
    /// Set once the heap is torn down without reinitialization
    retired: bool,
}

impl Heap {
    /// Creates a heap and its initial pages.
    pub fn new(config: HeapConfig) -> GcResult<Self> {
        let region = PageRegion::new(config.clone())?;
        let heap = Heap {
            id: HeapId::next(),
            config,
            region,
            types: TypeTable::new(),
            collector: CollectorState::default(),
            pending: Arc::new(PendingDisposals::new()),
            oom_hook: None,
            retired: false,
        };
        debug!(heap = heap.id.0, pages = heap.region.page_count(), "heap initialized");
        Ok(heap)
    }

    pub fn id(&self) -> HeapId {
        self.id
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Registers a type with an optional finalizer.
    pub fn register_type(&mut self, name: &'static str, finalizer: Option<Finalizer>) -> TypeId {
        self.types.register(name, finalizer)
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Replaces the out-of-memory hook. Without one, failures are logged.
    pub fn set_oom_hook(&mut self, hook: OomHook) {
        self.oom_hook = Some(hook);
    }

    /// Allocates a zeroed object of `size` payload bytes.
    ///
    /// # Panics
    ///
    /// Panics if the heap was torn down without reinitialization.
    pub fn allocate(&mut self, type_id: TypeId, size: usize) -> GcResult<ObjRef> {
        assert!(!self.retired, "allocation on a torn-down heap");
        if !self.types.contains(type_id) {
            return Err(GcError::UnknownType(type_id));
        }

        let obj = match self.region.allocate(type_id, size) {
            Ok(obj) => obj,
            Err(GcError::OutOfMemory { requested, pages }) => {
                self.report_out_of_memory(requested, pages);
                return Err(GcError::OutOfMemory { requested, pages });
            }
            Err(err) => return Err(err),
        };

        #[cfg(feature = "instance-names")]
        self.collector
            .instances
            .record_alloc(type_id, object_footprint(size));
        #[cfg(feature = "live-set-debug")]
        self.collector.live.insert(obj);

        Ok(obj)
    }

    fn report_out_of_memory(&mut self, requested: usize, pages: usize) {
        let report = OomReport {
            requested,
            pages,
            external_roots: self.external_root_count(),
            leaks: self.leak_report(),
        };
        match self.oom_hook.as_mut() {
            Some(hook) => hook(&report),
            None => error!(
                heap = self.id.0,
                requested,
                pages,
                external_roots = report.external_roots,
                "out of memory\n{}",
                report.leaks
            ),
        }
    }

    #[cfg(feature = "instance-names")]
    fn leak_report(&self) -> InstanceReport {
        self.instance_report()
    }

    #[cfg(not(feature = "instance-names"))]
    fn leak_report(&self) -> InstanceReport {
        InstanceReport::default()
    }

    /// Live instances per type.
    #[cfg(feature = "instance-names")]
    pub fn instance_report(&self) -> InstanceReport {
        InstanceReport::collect(&self.types, &self.collector.instances)
    }

    /// Object containing `addr`, for markers resolving candidate words.
    pub fn find_object(&self, addr: usize) -> Option<ObjRef> {
        self.region.find_object(addr)
    }

    /// Returns true if `addr` points into allocated memory of this heap.
    pub fn contains(&self, addr: usize) -> bool {
        self.region.contains(addr)
    }

    pub fn object_count(&self) -> usize {
        self.region.object_count()
    }

    pub fn page_count(&self) -> usize {
        self.region.page_count()
    }

    pub fn bytes_used(&self) -> usize {
        self.region.bytes_used()
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Takes an external reference on `obj` and wraps it in a cell that
    /// may be sent to other threads.
    pub fn protect(&mut self, obj: ObjRef) -> ForeignCell {
        #[cfg(feature = "live-set-debug")]
        assert!(
            self.collector.live.contains(&obj),
            "protect of an object not allocated on this heap"
        );
        *self.collector.external_roots.entry(obj).or_insert(0) += 1;
        ForeignCell::new(obj, self.id, Arc::downgrade(&self.pending))
    }

    /// Releases a cell. Cells owned by another heap are queued for their owner.
    pub fn dispose(&mut self, cell: ForeignCell) {
        if cell.owner() == self.id {
            self.release_root(cell.data());
        } else {
            cell.defer();
        }
    }

    /// Returns true if `cell` was created by this heap.
    pub fn owns(&self, cell: &ForeignCell) -> bool {
        cell.owner() == self.id
    }

    /// Releases every reference other threads queued for this heap.
    pub fn drain_pending_disposals(&mut self) -> usize {
        let pending = Arc::clone(&self.pending);
        let drained = pending.drain(|obj| self.release_root(obj));
        if drained > 0 {
            debug!(heap = self.id.0, drained, "drained pending disposals");
        }
        drained
    }

    /// Entries waiting in the pending-disposal queue.
    pub fn pending_disposals(&self) -> usize {
        self.pending.len()
    }

    fn release_root(&mut self, obj: ObjRef) {
        match self.collector.external_roots.entry(obj) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() -= 1;
                if *entry.get() == 0 {
                    entry.remove();
                }
            }
            Entry::Vacant(_) => panic!(
                "dispose of object {:#x} with no external references",
                obj.address()
            ),
        }
    }

    /// Total external references held through foreign cells.
    pub fn external_root_count(&self) -> usize {
        self.collector.external_roots.values().sum()
    }

    /// External references held on `obj`.
    pub fn external_refs(&self, obj: ObjRef) -> usize {
        self.collector.external_roots.get(&obj).copied().unwrap_or(0)
    }

    /// Objects kept alive through foreign cells.
    pub fn external_roots(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.collector.external_roots.keys().copied()
    }

    /// Feeds every externally referenced object to `marker`.
    pub fn mark_external_roots<M: RootMarker + ?Sized>(&self, marker: &mut M) {
        for obj in self.collector.external_roots.keys() {
            marker.mark(obj.address());
        }
    }

    /// Detaches the region, leaving an empty one in its place.
    pub(crate) fn take_region(&mut self) -> PageRegion {
        std::mem::replace(&mut self.region, PageRegion::empty(self.config.clone()))
    }

    /// Updates counters after a finalizer ran for an object of `size` payload bytes.
    pub(crate) fn record_finalized(&mut self, type_id: TypeId, size: usize) {
        #[cfg(feature = "instance-names")]
        self.collector
            .instances
            .record_free(type_id, object_footprint(size));
        #[cfg(not(feature = "instance-names"))]
        let _ = (type_id, size);
    }

    /// Drops every page and resets collector state.
    ///
    /// With `allow_reinit` the heap stays usable and allocates into fresh
    /// pages; it gets a new id, so cells issued before are no longer owned.
    pub(crate) fn finish_teardown(&mut self, allow_reinit: bool) {
        self.region.release();
        self.region = PageRegion::empty(self.config.clone());
        self.collector = CollectorState::default();
        self.pending = Arc::new(PendingDisposals::new());
        let old = std::mem::replace(&mut self.id, HeapId::next());
        self.retired = !allow_reinit;
        debug!(old_heap = old.0, heap = self.id.0, allow_reinit, "heap torn down");
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("id", &self.id)
            .field("pages", &self.region.page_count())
            .field("objects", &self.region.object_count())
            .field("external_roots", &self.external_root_count())
            .field("retired", &self.retired)
            .finish()
    }
}
