//! Kernel heap
//!
//! Bump allocator over a fixed kernel virtual range. `kmalloc` rounds
//! requests up to 8 bytes and advances a cursor; `kfree` is a no-op by
//! design — every long-lived kernel structure (PCB/RPCB tables, IPC entry
//! pool, region tables) is fixed-capacity, so the heap only serves
//! initialization-time allocations.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Start of the kernel heap virtual range.
pub const KERNEL_HEAP_START: usize = 0xFFFF_8000_0000_0000;

/// Size of the kernel heap range (128 MiB, sized for the IPC entry pool).
pub const KERNEL_HEAP_SIZE: usize = 128 * 1024 * 1024;

/// Lock-free bump allocator.
pub struct BumpAllocator {
    start: AtomicUsize,
    size: AtomicUsize,
    next: AtomicUsize,
    allocations: AtomicUsize,
}

impl BumpAllocator {
    /// Create an uninitialized allocator.
    pub const fn new() -> Self {
        Self {
            start: AtomicUsize::new(0),
            size: AtomicUsize::new(0),
            next: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
        }
    }

    /// Initialize the allocator over `[start, start + size)`.
    ///
    /// # Safety
    ///
    /// The range must be valid, writable memory reserved exclusively for
    /// this allocator, and `init` must run before the first allocation.
    pub unsafe fn init(&self, start: usize, size: usize) {
        self.start.store(start, Ordering::Relaxed);
        self.size.store(size, Ordering::Relaxed);
        self.next.store(start, Ordering::Relaxed);
        self.allocations.store(0, Ordering::Relaxed);
    }

    /// Advance the cursor by `size` bytes at `align` alignment. Returns a
    /// null pointer when the range is exhausted or uninitialized.
    fn bump(&self, size: usize, align: usize) -> *mut u8 {
        let start = self.start.load(Ordering::Acquire);
        let total = self.size.load(Ordering::Acquire);
        if start == 0 || size == 0 {
            return ptr::null_mut();
        }

        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let aligned = (current + align - 1) & !(align - 1);
            let end = match aligned.checked_add(size) {
                Some(end) => end,
                None => return ptr::null_mut(),
            };
            if end > start + total {
                return ptr::null_mut();
            }
            match self.next.compare_exchange_weak(
                current,
                end,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.allocations.fetch_add(1, Ordering::Relaxed);
                    return aligned as *mut u8;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Allocate `size` bytes, rounded up to 8-byte granularity.
    pub fn kmalloc(&self, size: usize) -> *mut u8 {
        let size = (size + 7) & !7;
        self.bump(size, 8)
    }

    /// Release an allocation. Deliberately a no-op: the bump design never
    /// reclaims, and all steady-state structures are fixed-capacity.
    pub fn kfree(&self, _ptr: *mut u8) {}

    /// (allocated bytes, remaining bytes, allocation count)
    pub fn stats(&self) -> (usize, usize, usize) {
        let start = self.start.load(Ordering::Relaxed);
        let next = self.next.load(Ordering::Relaxed);
        let size = self.size.load(Ordering::Relaxed);
        let allocations = self.allocations.load(Ordering::Relaxed);
        let allocated = next.saturating_sub(start);
        (allocated, size.saturating_sub(allocated), allocations)
    }
}

impl Default for BumpAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: Allocation only moves the cursor forward with a CAS; dealloc is a
// no-op. Returned blocks never overlap and stay valid for the kernel's
// lifetime.
unsafe impl GlobalAlloc for BumpAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.bump(layout.size(), layout.align().max(8))
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {
        // Bump allocator: memory is reclaimed only at reboot.
    }
}
