//! Heap teardown tests

use parking_lot::{const_mutex, Mutex};

use gc_roots::{
    dealloc_heap, init_native_thread_with, with_context, Heap, HeapConfig, ObjRef,
};

static RESOURCE_LOG: Mutex<Vec<usize>> = const_mutex(Vec::new());
static CONTEXT_LOG: Mutex<Vec<usize>> = const_mutex(Vec::new());

fn close_resource(obj: ObjRef) {
    RESOURCE_LOG.lock().push(obj.address());
}

fn close_context_resource(obj: ObjRef) {
    CONTEXT_LOG.lock().push(obj.address());
}

#[test]
fn three_finalizers_run_once_then_allocation_succeeds() {
    let mut heap = Heap::new(HeapConfig::minimal()).unwrap();
    let resource = heap.register_type("Resource", Some(close_resource));
    let plain = heap.register_type("Plain", None);

    let mut expected = Vec::new();
    for _ in 0..3 {
        expected.push(heap.allocate(resource, 40).unwrap().address());
        heap.allocate(plain, 40).unwrap();
    }

    heap.dealloc(true, true);

    let mut log = RESOURCE_LOG.lock().clone();
    log.sort_unstable();
    expected.sort_unstable();
    assert_eq!(log, expected);

    assert!(heap.allocate(plain, 40).is_ok());
    assert_eq!(heap.object_count(), 1);
}

#[test]
fn thread_heap_teardown_runs_finalizers() {
    init_native_thread_with(HeapConfig::minimal()).unwrap();
    let allocated: Vec<usize> = with_context(|ctx| {
        let ty = ctx.register_type("Handle", Some(close_context_resource));
        (0..4).map(|_| ctx.allocate(ty, 8).unwrap().address()).collect()
    });

    dealloc_heap(true, true);

    let log = CONTEXT_LOG.lock();
    assert_eq!(log.len(), allocated.len());
    for addr in &allocated {
        assert_eq!(log.iter().filter(|a| *a == addr).count(), 1);
    }
}

#[test]
fn teardown_without_reinit_retires_heap() {
    let mut heap = Heap::new(HeapConfig::minimal()).unwrap();
    let ty = heap.register_type("Plain", None);
    heap.allocate(ty, 8).unwrap();

    heap.dealloc(false, false);

    assert!(heap.is_retired());
    assert_eq!(heap.page_count(), 0);
    assert_eq!(heap.bytes_used(), 0);
}
