//! Contract tests verifying the gc_roots API surface.
//! These tests ensure exported types and functions exist with the expected signatures.

use gc_roots::{
    dealloc_heap, dispose, init_native_thread, is_owned_by_current_thread, lifecycle_state,
    protect, walk_stacks, with_context, CollectionGuard, ForeignCell, GcError, GcResult, Heap,
    HeapConfig, LifecycleState, ObjRef, RootMarker, StackId, StackRegistry, TypeId, WalkStats,
};

/// Test StackRegistry contract: find_stack(None) -> Some(MAIN)
#[test]
fn contract_registry_find_main() {
    let registry = unsafe { StackRegistry::new(0) };
    assert_eq!(registry.find_stack(None), Some(StackId::MAIN));
    assert_eq!(registry.active(), StackId::MAIN);
    assert!(!registry.is_empty());
}

/// Test StackRegistry contract: remove_stack(None) is a no-op
#[test]
fn contract_registry_remove_none() {
    let mut registry = unsafe { StackRegistry::new(0) };
    registry.remove_stack(None);
    assert_eq!(registry.len(), 1);
}

/// Test StackRegistry contract: removing the main stack panics
#[test]
#[should_panic]
fn contract_registry_remove_main_panics() {
    let mut registry = unsafe { StackRegistry::new(0) };
    registry.remove_stack(Some(StackId::MAIN));
}

/// Test StackRegistry contract: add_stack(bottom) -> StackId
#[cfg(feature = "multi-stack")]
#[test]
fn contract_registry_add_stack() {
    let mut registry = unsafe { StackRegistry::new(0) };
    let id: StackId = unsafe { registry.add_stack(0x4000) };
    assert!(!id.is_main());
    assert_eq!(registry.total_size(), 0);
}

/// Test walk_stacks contract: (&mut StackRegistry, &mut impl RootMarker) -> WalkStats
#[test]
fn contract_walk_stacks() {
    struct Counter(usize);
    impl RootMarker for Counter {
        fn mark(&mut self, _candidate: usize) {
            self.0 += 1;
        }
    }

    let mut registry = unsafe { StackRegistry::new(gc_platform::stack_pointer()) };
    let mut counter = Counter(0);
    let stats: WalkStats = walk_stacks(&mut registry, &mut counter);
    assert_eq!(stats.words, counter.0);
    assert_eq!(stats.stacks, 1);
}

/// Test Heap contract: new(config) -> GcResult<Heap>
#[test]
fn contract_heap_new() {
    let heap: GcResult<Heap> = Heap::new(HeapConfig::default());
    assert!(heap.is_ok());
}

/// Test Heap contract: allocate(TypeId, usize) -> GcResult<ObjRef>
#[test]
fn contract_heap_allocate() {
    let mut heap = Heap::new(HeapConfig::minimal()).unwrap();
    let ty: TypeId = heap.register_type("Contract", None);
    let obj: ObjRef = heap.allocate(ty, 8).unwrap();
    assert!(heap.contains(obj.address()));
    assert_eq!(
        heap.allocate(TypeId(99), 8),
        Err(GcError::UnknownType(TypeId(99)))
    );
}

/// Test HeapConfig contract: invalid page size is rejected
#[test]
fn contract_config_validate() {
    let config = HeapConfig {
        page_size: 3000,
        ..HeapConfig::default()
    };
    assert!(matches!(config.validate(), Err(GcError::InvalidConfig(_))));
}

/// Test foreign cell contract: protect(ObjRef) -> ForeignCell, dispose(ForeignCell)
#[test]
fn contract_foreign_cell() {
    init_native_thread().unwrap();
    let obj = with_context(|ctx| {
        let ty = ctx.register_type("Contract", None);
        ctx.allocate(ty, 8).unwrap()
    });
    let cell: ForeignCell = protect(obj);
    assert_eq!(cell.data(), obj);
    assert!(is_owned_by_current_thread(&cell));
    dispose(cell);
}

/// Test lifecycle contract: lifecycle_state() -> LifecycleState
#[test]
fn contract_lifecycle_state() {
    assert_eq!(lifecycle_state(), LifecycleState::Uninitialized);
    init_native_thread().unwrap();
    assert_eq!(lifecycle_state(), LifecycleState::NativeThread);
}

/// Test teardown contract: dealloc_heap(bool, bool)
#[test]
fn contract_dealloc_heap() {
    init_native_thread().unwrap();
    dealloc_heap(true, true);
    assert!(with_context(|ctx| ctx.is_initialized()));
}

/// Test CollectionGuard contract: collect_roots returns None while guarded
#[test]
fn contract_collection_guard() {
    init_native_thread().unwrap();
    let guard = CollectionGuard::new();
    assert!(with_context(|ctx| ctx.collect_roots(&mut |_: usize| {})).is_none());
    drop(guard);
    assert!(with_context(|ctx| ctx.collect_roots(&mut |_: usize| {})).is_some());
}
