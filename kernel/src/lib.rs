//! ResonanceOS Kernel Library
//!
//! Core of the ResonanceOS microkernel: process table, IPC message system,
//! and the resonant scheduler, together with the physical/virtual memory
//! management and interrupt dispatch they depend on.
//!
//! The crate builds for two targets: the bare-metal kernel
//! (`target_os = "none"`) and the host, where the portable subsystem logic
//! runs under the standard test harness.

#![no_std]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]

extern crate alloc;

// Host target: link std so unit tests can allocate and print normally.
#[cfg(not(target_os = "none"))]
extern crate std;

#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

// Bare metal: the kernel bump heap doubles as the global allocator.
#[cfg(target_os = "none")]
#[global_allocator]
static ALLOCATOR: mm::heap::BumpAllocator = mm::heap::BumpAllocator::new();

/// Get a reference to the global allocator.
#[cfg(target_os = "none")]
pub fn get_allocator() -> &'static mm::heap::BumpAllocator {
    &ALLOCATOR
}

#[macro_use]
pub mod print;

pub mod arch;
pub mod boot;
pub mod error;
pub mod interrupts;
pub mod ipc;
pub mod klog;
pub mod mm;
pub mod process;
pub mod sched;
pub mod time;

// Re-exports for the kernel binary and integration tests.
pub use error::{KernelError, KernelResult};
pub use mm::{PhysicalAddress, VirtualAddress, FRAME_SIZE};
pub use process::{Pid, Priority, ProcessState, ProcessType};
pub use sched::{Handedness, ResonantClass, SchedulingDecision};

/// Heap allocation error handler.
///
/// Heap allocation failure in the kernel is unrecoverable; the
/// alloc_error_handler ABI requires `-> !`.
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("Allocation error: {:?}", layout);
}
