//! Architecture support
//!
//! Single-architecture kernel: all hardware access lives under
//! `x86_64` and only exists on the bare-metal build. The host build gets
//! no-op shims for the few touchpoints the portable code calls.

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod x86_64;

/// Invalidate the TLB entry for a single page.
pub fn flush_tlb_page(vaddr: u64) {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    {
        use ::x86_64::VirtAddr;
        ::x86_64::instructions::tlb::flush(VirtAddr::new(vaddr));
    }
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    {
        let _ = vaddr;
    }
}

/// Halt the CPU until the next interrupt.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub fn halt() {
    ::x86_64::instructions::hlt();
}

/// Mask interrupts and halt forever. Terminal.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub fn halt_forever() -> ! {
    ::x86_64::instructions::interrupts::disable();
    loop {
        ::x86_64::instructions::hlt();
    }
}
