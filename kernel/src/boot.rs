//! Boot and init glue
//!
//! Validates the loader handoff block and brings the subsystems up in
//! dependency order: console/logger, memory, interrupts, IPC, processes,
//! scheduler. IPC precedes the process table because process creation
//! opens the per-process message queue.

use crate::error::{KernelError, KernelResult};
use crate::interrupts::TIMER_VECTOR;

/// Expected first word of the loader handoff block.
pub const HANDOFF_MAGIC: u32 = 0x36d7_6289;

/// Total physical memory assumed when the handoff does not say otherwise.
const DEFAULT_TOTAL_MEMORY: u64 = 128 * 1024 * 1024;

/// Physical frames holding the kernel image and allocator metadata,
/// pre-marked used in the frame allocator.
const RESERVED_KERNEL_FRAMES: u64 = 1024; // 4 MiB

/// Block handed over by the loader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffBlock {
    pub magic: u32,
    pub flags: u32,
}

/// Check the handoff block shape. Anything but the known magic is fatal
/// to the caller.
pub fn validate_handoff(handoff: &HandoffBlock) -> KernelResult<()> {
    if handoff.magic != HANDOFF_MAGIC {
        return Err(KernelError::InvalidHandoff {
            magic: handoff.magic,
        });
    }
    Ok(())
}

fn timer_tick_handler(_vector: u8, _ctx: usize) {
    crate::time::tick();
    crate::sched::on_timer_tick();
}

/// Ordered subsystem bring-up. Returns only on success; the caller panics
/// otherwise.
pub fn kernel_init(handoff: &HandoffBlock) -> KernelResult<()> {
    crate::klog::init();
    log::info!("ResonanceOS v{} booting", env!("CARGO_PKG_VERSION"));

    validate_handoff(handoff)?;
    log::info!("handoff validated (flags 0x{:08x})", handoff.flags);

    crate::mm::init(DEFAULT_TOTAL_MEMORY, RESERVED_KERNEL_FRAMES);
    crate::interrupts::init();
    crate::ipc::init();
    crate::process::init()?;
    crate::sched::init(None);

    // The periodic tick drives the clock and the Queen synchronization.
    crate::interrupts::register(TIMER_VECTOR, timer_tick_handler, 0)?;
    crate::interrupts::enable(TIMER_VECTOR)?;

    log::info!("kernel initialization complete");
    Ok(())
}

/// Terminal failure: mask interrupts and halt the CPU.
pub fn boot_panic(msg: &str) -> ! {
    log::error!("boot panic: {}", msg);
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    crate::arch::halt_forever();
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    panic!("boot panic: {}", msg);
}

/// Idle loop entered after bring-up: halt until the next interrupt, let
/// the timer-driven scheduler do the rest.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub fn idle_loop() -> ! {
    x86_64::instructions::interrupts::enable();
    loop {
        crate::arch::halt();
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_validation() {
        let good = HandoffBlock {
            magic: HANDOFF_MAGIC,
            flags: 0,
        };
        assert!(validate_handoff(&good).is_ok());

        let bad = HandoffBlock {
            magic: 0x1BAD_B002,
            flags: 0,
        };
        assert_eq!(
            validate_handoff(&bad),
            Err(KernelError::InvalidHandoff {
                magic: 0x1BAD_B002
            })
        );
    }
}
