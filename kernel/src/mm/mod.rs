//! Memory management
//!
//! Physical frame allocator (bitmap, fixed capacity), 4-level page-table
//! walker, and the kernel bump heap. The IPC and process layers sit on top
//! of these three.

pub mod frame_allocator;
pub mod heap;
pub mod page_table;

use core::fmt;

use spin::Mutex;

pub use frame_allocator::{FrameAllocator, MAX_FRAMES};
pub use page_table::{AddressSpace, MapPerms, PageTable, TableFrameSource};

/// Size of a physical page frame.
pub const FRAME_SIZE: usize = 4096;

/// Physical memory address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysicalAddress(pub u64);

impl PhysicalAddress {
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }

    pub const fn frame_number(&self) -> u64 {
        self.0 / FRAME_SIZE as u64
    }

    pub const fn is_frame_aligned(&self) -> bool {
        self.0 % FRAME_SIZE as u64 == 0
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P:0x{:x}", self.0)
    }
}

/// Virtual memory address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualAddress(pub u64);

impl VirtualAddress {
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn page_offset(&self) -> u64 {
        self.0 & 0xFFF
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V:0x{:x}", self.0)
    }
}

/// Memory-management errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    /// No frame / heap space / table slot available
    OutOfMemory,
    /// Address not managed here, misaligned, or not mapped/allocated
    InvalidAddress { addr: u64 },
    /// Leaf entry already present for this virtual address
    AlreadyMapped { addr: u64 },
}

impl fmt::Display for MemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::InvalidAddress { addr } => write!(f, "invalid address 0x{:x}", addr),
            Self::AlreadyMapped { addr } => write!(f, "already mapped at 0x{:x}", addr),
        }
    }
}

/// Global physical frame allocator.
pub static FRAME_ALLOCATOR: Mutex<FrameAllocator> = Mutex::new(FrameAllocator::new());

/// Initialize memory management: the frame allocator over `total_memory`
/// bytes with `reserved_frames` (kernel image + allocator metadata)
/// pre-marked used, and the kernel heap.
pub fn init(total_memory: u64, reserved_frames: u64) {
    let mut pmm = FRAME_ALLOCATOR.lock();
    pmm.init(total_memory);
    for frame in 0..reserved_frames {
        pmm.mark_used(PhysicalAddress::new(frame * FRAME_SIZE as u64));
    }
    log::info!(
        "physical memory: {} frames, {} free",
        pmm.total_frames(),
        pmm.free_frames()
    );

    #[cfg(target_os = "none")]
    {
        // SAFETY: The heap range is a fixed kernel virtual region reserved
        // for the bump allocator; init runs once during bring-up.
        unsafe {
            crate::get_allocator().init(heap::KERNEL_HEAP_START, heap::KERNEL_HEAP_SIZE);
        }
        log::info!(
            "kernel heap: {} MiB at 0x{:x}",
            heap::KERNEL_HEAP_SIZE / (1024 * 1024),
            heap::KERNEL_HEAP_START
        );
    }
}
