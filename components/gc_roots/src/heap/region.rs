//! Page-based region allocator.
//!
//! The region owns a list of pages acquired from the system allocator. Small
//! objects are bump-allocated into the most recent page; objects that do not
//! fit a page get a dedicated, page-size-rounded block. Every object starts
//! with an [`ObjectHeader`], so the region can enumerate its contents for
//! finalization and resolve interior pointers.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use tracing::debug;

use crate::config::HeapConfig;
use crate::error::{GcError, GcResult};
use crate::heap::types::TypeId;

/// Alignment of every object header and payload
pub const OBJECT_ALIGN: usize = 16;

/// Bytes reserved in front of each payload
pub const HEADER_SIZE: usize =
    (std::mem::size_of::<ObjectHeader>() + OBJECT_ALIGN - 1) & !(OBJECT_ALIGN - 1);

/// Metadata stored in front of every object.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ObjectHeader {
    /// Type the object was allocated as
    pub type_id: TypeId,
    /// Payload size in bytes, excluding the header
    pub size: usize,
}

/// Opaque handle to an object allocated by a heap.
///
/// Handles may be copied and sent anywhere, but only the thread that owns
/// the heap may read through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(NonNull<ObjectHeader>);

// SAFETY: an ObjRef is an address. Dereferencing it is unsafe and reserved
// to the owning thread, so moving the address itself between threads is fine.
unsafe impl Send for ObjRef {}
unsafe impl Sync for ObjRef {}

impl ObjRef {
    /// Address of the object's header.
    pub fn address(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Pointer to the first payload byte.
    pub fn payload(self) -> *mut u8 {
        (self.0.as_ptr() as *mut u8).wrapping_add(HEADER_SIZE)
    }

    /// The object's header.
    ///
    /// # Safety
    ///
    /// The object must still be allocated and the caller must be on the
    /// owning thread.
    pub unsafe fn header(self) -> ObjectHeader {
        *self.0.as_ptr()
    }
}

/// One block of memory acquired from the system.
#[derive(Debug)]
struct Page {
    base: NonNull<u8>,
    layout: Layout,
    /// Bytes handed out from the start of the page
    used: usize,
}

impl Page {
    fn acquire(size: usize, align: usize) -> GcResult<Page> {
        let layout =
            Layout::from_size_align(size, align).map_err(|_| GcError::InvalidLayout { size })?;
        // SAFETY: layout has non-zero size (size >= HEADER_SIZE).
        let base = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(base).ok_or(GcError::OutOfMemory {
            requested: size,
            pages: 0,
        })?;
        Ok(Page {
            base,
            layout,
            used: 0,
        })
    }

    fn start(&self) -> usize {
        self.base.as_ptr() as usize
    }

    fn remaining(&self) -> usize {
        self.layout.size() - self.used
    }

    fn contains(&self, addr: usize) -> bool {
        addr >= self.start() && addr < self.start() + self.used
    }

    /// Carves `total` bytes off the free tail of the page.
    fn bump(&mut self, total: usize) -> NonNull<ObjectHeader> {
        debug_assert!(total <= self.remaining());
        // SAFETY: `used + total` stays within the page.
        let ptr = unsafe { self.base.as_ptr().add(self.used) };
        self.used += total;
        // SAFETY: derived from a non-null page base.
        unsafe { NonNull::new_unchecked(ptr as *mut ObjectHeader) }
    }

    fn for_each_object(&self, f: &mut dyn FnMut(ObjRef)) {
        let mut offset = 0;
        while offset < self.used {
            // SAFETY: offsets below `used` always start an initialized header.
            let header = unsafe { self.base.as_ptr().add(offset) } as *mut ObjectHeader;
            let size = unsafe { (*header).size };
            // SAFETY: derived from a non-null page base.
            f(ObjRef(unsafe { NonNull::new_unchecked(header) }));
            offset += object_footprint(size);
        }
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // SAFETY: allocated in `Page::acquire` with this layout.
        unsafe { dealloc(self.base.as_ptr(), self.layout) }
    }
}

/// Rounds `n` up to a multiple of `align`, a power of two.
fn round_up(n: usize, align: usize) -> Option<usize> {
    n.checked_add(align - 1).map(|n| n & !(align - 1))
}

/// Bytes an object with `payload` bytes occupies, header included, or
/// `None` if that does not fit in the address space.
pub fn checked_footprint(payload: usize) -> Option<usize> {
    HEADER_SIZE
        .checked_add(payload)
        .and_then(|n| round_up(n, OBJECT_ALIGN))
}

/// Bytes an object with `payload` bytes occupies, header included.
///
/// Only meaningful for sizes the region accepted; use [`checked_footprint`]
/// for untrusted sizes.
pub fn object_footprint(payload: usize) -> usize {
    checked_footprint(payload).unwrap_or(usize::MAX)
}

/// The pages backing one heap.
#[derive(Debug)]
pub struct PageRegion {
    config: HeapConfig,
    pages: Vec<Page>,
    objects: usize,
}

impl PageRegion {
    /// Creates a region and eagerly acquires `config.initial_pages` pages.
    pub fn new(config: HeapConfig) -> GcResult<Self> {
        config.validate()?;
        let mut region = PageRegion::empty(config);
        for _ in 0..region.config.initial_pages {
            region.acquire(region.config.page_size)?;
        }
        Ok(region)
    }

    /// Creates a region that owns no pages yet.
    pub fn empty(config: HeapConfig) -> Self {
        PageRegion {
            config,
            pages: Vec::new(),
            objects: 0,
        }
    }

    /// Allocates a zeroed object with `size` payload bytes.
    ///
    /// Sizes whose footprint or page-rounded block overflows fail with
    /// [`GcError::InvalidLayout`].
    pub fn allocate(&mut self, type_id: TypeId, size: usize) -> GcResult<ObjRef> {
        let total = checked_footprint(size).ok_or(GcError::InvalidLayout { size })?;
        let fits = self
            .pages
            .last()
            .map_or(false, |page| page.remaining() >= total);

        if !fits {
            let block =
                round_up(total, self.config.page_size).ok_or(GcError::InvalidLayout { size })?;
            self.acquire(block).map_err(|err| match err {
                GcError::OutOfMemory { .. } => GcError::OutOfMemory {
                    requested: total,
                    pages: self.pages.len(),
                },
                other => other,
            })?;
        }

        let page = match self.pages.last_mut() {
            Some(page) => page,
            None => unreachable!("page acquired above"),
        };
        let header = page.bump(total);
        // SAFETY: `bump` returned `total` fresh bytes, enough for the header.
        unsafe { header.as_ptr().write(ObjectHeader { type_id, size }) };
        self.objects += 1;
        Ok(ObjRef(header))
    }

    fn acquire(&mut self, size: usize) -> GcResult<()> {
        if let Some(max) = self.config.max_pages {
            if self.pages.len() >= max {
                return Err(GcError::OutOfMemory {
                    requested: size,
                    pages: self.pages.len(),
                });
            }
        }
        let page = Page::acquire(size, self.config.page_size)?;
        self.pages.push(page);
        Ok(())
    }

    /// Calls `f` for every object, in allocation order within each page.
    pub fn for_each_object(&self, mut f: impl FnMut(ObjRef)) {
        for page in &self.pages {
            page.for_each_object(&mut f);
        }
    }

    /// Object whose header or payload contains `addr`.
    pub fn find_object(&self, addr: usize) -> Option<ObjRef> {
        let page = self.pages.iter().find(|page| page.contains(addr))?;
        let mut found = None;
        page.for_each_object(&mut |obj| {
            // SAFETY: `obj` comes from the page's own enumeration.
            let size = unsafe { obj.header().size };
            let start = obj.address();
            if found.is_none() && addr >= start && addr < start + object_footprint(size) {
                found = Some(obj);
            }
        });
        found
    }

    /// Returns true if `addr` falls inside allocated memory of this region.
    pub fn contains(&self, addr: usize) -> bool {
        self.pages.iter().any(|page| page.contains(addr))
    }

    /// Returns every page to the system.
    pub fn release(&mut self) {
        if !self.pages.is_empty() {
            debug!(pages = self.pages.len(), objects = self.objects, "releasing region pages");
        }
        self.pages.clear();
        self.objects = 0;
    }

    /// Number of pages currently owned.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of objects allocated.
    pub fn object_count(&self) -> usize {
        self.objects
    }

    /// Bytes handed out, headers and padding included.
    pub fn bytes_used(&self) -> usize {
        self.pages.iter().map(|page| page.used).sum()
    }

    /// The configuration the region was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }
}
