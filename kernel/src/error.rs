//! Kernel-wide error types
//!
//! Each subsystem defines its own small result enumeration; this module
//! provides the top-level [`KernelError`] that wraps them so init paths and
//! cross-subsystem callers can propagate failures with `?`.

use core::fmt;

use crate::{
    interrupts::IrqError, ipc::IpcError, mm::MemError, process::ProcessError,
    sched::ResonantError,
};

/// Main kernel error type
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Memory-management errors (frame allocator, page tables, heap)
    Memory(MemError),
    /// Interrupt-table errors
    Interrupt(IrqError),
    /// Process-table errors
    Process(ProcessError),
    /// IPC errors
    Ipc(IpcError),
    /// Resonant-scheduler errors
    Scheduler(ResonantError),
    /// The loader handoff block did not carry the expected magic
    InvalidHandoff { magic: u32 },
    /// Subsystem used before its `init()` ran
    NotInitialized { subsystem: &'static str },
}

/// Result type alias for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(e) => write!(f, "memory error: {}", e),
            Self::Interrupt(e) => write!(f, "interrupt error: {}", e),
            Self::Process(e) => write!(f, "process error: {}", e),
            Self::Ipc(e) => write!(f, "IPC error: {}", e),
            Self::Scheduler(e) => write!(f, "scheduler error: {}", e),
            Self::InvalidHandoff { magic } => {
                write!(f, "invalid handoff block: magic 0x{:08x}", magic)
            }
            Self::NotInitialized { subsystem } => {
                write!(f, "subsystem not initialized: {}", subsystem)
            }
        }
    }
}

impl From<MemError> for KernelError {
    fn from(err: MemError) -> Self {
        Self::Memory(err)
    }
}

impl From<IrqError> for KernelError {
    fn from(err: IrqError) -> Self {
        Self::Interrupt(err)
    }
}

impl From<ProcessError> for KernelError {
    fn from(err: ProcessError) -> Self {
        Self::Process(err)
    }
}

impl From<IpcError> for KernelError {
    fn from(err: IpcError) -> Self {
        Self::Ipc(err)
    }
}

impl From<ResonantError> for KernelError {
    fn from(err: ResonantError) -> Self {
        Self::Scheduler(err)
    }
}
