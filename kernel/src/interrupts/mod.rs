//! Interrupt dispatch table
//!
//! Architecture-independent 256-entry vector table. Each slot holds a
//! `(handler, context)` pair registered at runtime; the low-level entry
//! stubs in `arch::x86_64::idt` funnel every interrupt through
//! [`dispatch`], which counts the vector and invokes the registered
//! handler. Exceptions (vectors < 32) with no registered handler are fatal.

use core::fmt;

use spin::Mutex;

/// Number of interrupt vectors.
pub const VECTOR_COUNT: usize = 256;

/// First vector of the remapped legacy IRQ range.
pub const IRQ_BASE: u8 = 32;

/// Number of legacy IRQ lines behind the PIC pair.
pub const IRQ_LINES: u8 = 16;

/// Vector the timer IRQ (IRQ 0) arrives on.
pub const TIMER_VECTOR: u8 = IRQ_BASE;

/// Interrupt handler: receives the vector that fired and the context word
/// supplied at registration.
pub type InterruptHandler = fn(vector: u8, ctx: usize);

/// Interrupt-table errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqError {
    /// A non-null handler is already installed on this vector
    AlreadyRegistered { vector: u8 },
    /// No handler installed on this vector
    NotRegistered { vector: u8 },
    /// Vector is outside the legacy IRQ range for a mask/unmask request
    NotAnIrq { vector: u8 },
}

impl fmt::Display for IrqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered { vector } => {
                write!(f, "handler already registered on vector {}", vector)
            }
            Self::NotRegistered { vector } => {
                write!(f, "no handler registered on vector {}", vector)
            }
            Self::NotAnIrq { vector } => {
                write!(f, "vector {} is not a maskable IRQ line", vector)
            }
        }
    }
}

#[derive(Clone, Copy)]
struct Slot {
    handler: InterruptHandler,
    ctx: usize,
}

/// Flat table of per-vector handlers plus dispatch statistics.
pub struct VectorTable {
    slots: [Option<Slot>; VECTOR_COUNT],
    counts: [u64; VECTOR_COUNT],
    total: u64,
}

impl VectorTable {
    pub const fn new() -> Self {
        Self {
            slots: [None; VECTOR_COUNT],
            counts: [0; VECTOR_COUNT],
            total: 0,
        }
    }

    /// Install a handler on a vector.
    pub fn register(
        &mut self,
        vector: u8,
        handler: InterruptHandler,
        ctx: usize,
    ) -> Result<(), IrqError> {
        let slot = &mut self.slots[vector as usize];
        if slot.is_some() {
            return Err(IrqError::AlreadyRegistered { vector });
        }
        *slot = Some(Slot { handler, ctx });
        Ok(())
    }

    /// Clear the handler on a vector.
    pub fn unregister(&mut self, vector: u8) -> Result<(), IrqError> {
        if self.slots[vector as usize].take().is_none() {
            return Err(IrqError::NotRegistered { vector });
        }
        Ok(())
    }

    /// Count the vector and invoke its handler if one is installed.
    /// Returns whether a handler ran.
    pub fn dispatch(&mut self, vector: u8) -> bool {
        self.counts[vector as usize] += 1;
        self.total += 1;
        match self.slots[vector as usize] {
            Some(slot) => {
                (slot.handler)(vector, slot.ctx);
                true
            }
            None => false,
        }
    }

    /// Dispatches observed on one vector.
    pub fn count(&self, vector: u8) -> u64 {
        self.counts[vector as usize]
    }

    /// Dispatches observed across all vectors.
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Default for VectorTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Global vector table.
static VECTORS: Mutex<VectorTable> = Mutex::new(VectorTable::new());

/// Initialize interrupt handling: publish the IDT, remap the PIC, and
/// program the periodic timer. On the host only the dispatch table exists.
pub fn init() {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    {
        crate::arch::x86_64::idt::init();
        crate::arch::x86_64::pic::init();
        crate::arch::x86_64::timer::init();
    }
    log::info!("interrupt table ready ({} vectors)", VECTOR_COUNT);
}

/// Run `f` with interrupts disabled, restoring the previous state after.
///
/// This is the critical-section primitive every kernel-facing wrapper uses
/// around global state (see the concurrency model: single CPU, no kernel
/// preemption while interrupts are masked). On the host it is a plain call.
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    {
        x86_64::instructions::interrupts::without_interrupts(f)
    }
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    {
        f()
    }
}

/// Register `(handler, ctx)` on `vector`.
pub fn register(vector: u8, handler: InterruptHandler, ctx: usize) -> Result<(), IrqError> {
    without_interrupts(|| VECTORS.lock().register(vector, handler, ctx))
}

/// Remove the handler on `vector`.
pub fn unregister(vector: u8) -> Result<(), IrqError> {
    without_interrupts(|| VECTORS.lock().unregister(vector))
}

/// Unmask a legacy IRQ line so its vector can fire.
pub fn enable(vector: u8) -> Result<(), IrqError> {
    if !(IRQ_BASE..IRQ_BASE + IRQ_LINES).contains(&vector) {
        return Err(IrqError::NotAnIrq { vector });
    }
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    crate::arch::x86_64::pic::unmask(vector - IRQ_BASE);
    Ok(())
}

/// Mask a legacy IRQ line.
pub fn disable(vector: u8) -> Result<(), IrqError> {
    if !(IRQ_BASE..IRQ_BASE + IRQ_LINES).contains(&vector) {
        return Err(IrqError::NotAnIrq { vector });
    }
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    crate::arch::x86_64::pic::mask(vector - IRQ_BASE);
    Ok(())
}

/// Common dispatch entry used by the low-level stubs.
pub fn dispatch(vector: u8) -> bool {
    VECTORS.lock().dispatch(vector)
}

/// Dispatch count for one vector.
pub fn vector_count(vector: u8) -> u64 {
    VECTORS.lock().count(vector)
}

/// Total interrupts dispatched since boot.
pub fn total_count() -> u64 {
    VECTORS.lock().total()
}

/// Log per-vector dispatch statistics.
pub fn dump_stats() {
    let table = VECTORS.lock();
    log::info!("total interrupts: {}", table.total());
    for vector in 0..VECTOR_COUNT {
        let count = table.count(vector as u8);
        if count > 0 {
            log::info!("  vector {:3}: {}", vector, count);
        }
    }
}

/// Human-readable name for an exception vector, used in panic messages.
pub fn exception_name(vector: u8) -> &'static str {
    match vector {
        0 => "divide error",
        1 => "debug",
        2 => "non-maskable interrupt",
        3 => "breakpoint",
        4 => "overflow",
        5 => "bound range exceeded",
        6 => "invalid opcode",
        7 => "device not available",
        8 => "double fault",
        10 => "invalid TSS",
        11 => "segment not present",
        12 => "stack segment fault",
        13 => "general protection fault",
        14 => "page fault",
        16 => "x87 FPU error",
        17 => "alignment check",
        18 => "machine check",
        19 => "SIMD FP exception",
        20 => "virtualization exception",
        30 => "security exception",
        _ => "reserved",
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    fn noop_handler(_vector: u8, _ctx: usize) {}

    #[test]
    fn test_register_rejects_duplicates() {
        let mut table = VectorTable::new();
        assert!(table.register(0x80, noop_handler, 0).is_ok());
        assert_eq!(
            table.register(0x80, noop_handler, 1),
            Err(IrqError::AlreadyRegistered { vector: 0x80 })
        );
        assert!(table.unregister(0x80).is_ok());
        assert!(table.register(0x80, noop_handler, 2).is_ok());
    }

    #[test]
    fn test_unregister_empty_slot_fails() {
        let mut table = VectorTable::new();
        assert_eq!(
            table.unregister(0x81),
            Err(IrqError::NotRegistered { vector: 0x81 })
        );
    }

    #[test]
    fn test_dispatch_counts_every_vector() {
        let mut table = VectorTable::new();
        table.register(TIMER_VECTOR, noop_handler, 0).unwrap();

        assert!(table.dispatch(TIMER_VECTOR));
        assert!(table.dispatch(TIMER_VECTOR));
        // Unhandled vectors are still counted.
        assert!(!table.dispatch(0x90));

        assert_eq!(table.count(TIMER_VECTOR), 2);
        assert_eq!(table.count(0x90), 1);
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn test_mask_requests_outside_irq_range_fail() {
        assert_eq!(enable(0x80), Err(IrqError::NotAnIrq { vector: 0x80 }));
        assert_eq!(disable(14), Err(IrqError::NotAnIrq { vector: 14 }));
        assert!(enable(IRQ_BASE + 1).is_ok());
        assert!(disable(IRQ_BASE + 1).is_ok());
    }
}
