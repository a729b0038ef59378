//! Process management
//!
//! The process table is the substrate both the scheduler and IPC act upon.
//! [`ProcessTable`] holds the logic; the statics plus free functions below
//! are the kernel-facing surface, each wrapped in an interrupt-free
//! critical section. Process creation and destruction compose with the IPC
//! layer (per-process queue setup/cleanup) and the resonant scheduler
//! (unregistration) here, keeping the table itself self-contained.

pub mod pcb;
pub mod table;

use core::fmt;

use spin::Mutex;

pub use pcb::{
    ExecutionContext, Pcb, Pid, Priority, ProcessState, ProcessType, QuantumInfo, IDLE_PID,
    KERNEL_PID, MAX_PROCESSES, PRIORITY_LEVELS, PROCESS_NAME_MAX,
};
pub use table::{CreateParams, ProcessStats, ProcessTable};

use crate::error::KernelResult;
use crate::interrupts::without_interrupts;

/// Process-table errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    /// PID out of range or slot not valid
    InvalidPid { pid: u32 },
    /// Malformed creation parameter
    InvalidArgument { what: &'static str },
    /// Named parent does not exist
    InvalidParent { pid: u32 },
    /// No unused slot left
    TooManyProcesses,
    /// Operation not allowed in the process's current state
    InvalidState { pid: u32 },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPid { pid } => write!(f, "invalid pid {}", pid),
            Self::InvalidArgument { what } => write!(f, "invalid argument: {}", what),
            Self::InvalidParent { pid } => write!(f, "invalid parent pid {}", pid),
            Self::TooManyProcesses => write!(f, "process table full"),
            Self::InvalidState { pid } => write!(f, "invalid state for pid {}", pid),
        }
    }
}

/// Global process table.
pub static PROCESS_TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());

/// Initialize the process table: kernel pseudo-process and idle process,
/// with their IPC queues. Requires `ipc::init` to have run.
pub fn init() -> KernelResult<()> {
    without_interrupts(|| {
        PROCESS_TABLE.lock().init()?;
        crate::ipc::process_init(KERNEL_PID.0)?;
        crate::ipc::process_init(IDLE_PID.0)?;
        Ok(())
    })
}

/// Create a process and its IPC queue.
pub fn create(params: &CreateParams) -> KernelResult<Pid> {
    without_interrupts(|| {
        let pid = PROCESS_TABLE.lock().create(params)?;
        if let Err(err) = crate::ipc::process_init(pid.0) {
            // Unwind the half-created process so the slot is reusable.
            PROCESS_TABLE.lock().destroy(pid).ok();
            return Err(err.into());
        }
        Ok(pid)
    })
}

/// Destroy a process: slot release, IPC cleanup, scheduler unregistration.
pub fn destroy(pid: Pid) -> KernelResult<()> {
    without_interrupts(|| {
        PROCESS_TABLE.lock().destroy(pid)?;
        crate::ipc::process_cleanup(pid.0)?;
        crate::sched::unregister(pid.0).ok(); // not every process resonates
        Ok(())
    })
}

/// Record an exit code and park the process as a zombie.
pub fn exit(pid: Pid, exit_code: i32) -> KernelResult<()> {
    without_interrupts(|| Ok(PROCESS_TABLE.lock().exit(pid, exit_code)?))
}

pub fn block(pid: Pid) -> KernelResult<()> {
    without_interrupts(|| Ok(PROCESS_TABLE.lock().block(pid)?))
}

pub fn unblock(pid: Pid) -> KernelResult<()> {
    without_interrupts(|| Ok(PROCESS_TABLE.lock().unblock(pid)?))
}

pub fn get_state(pid: Pid) -> ProcessState {
    without_interrupts(|| PROCESS_TABLE.lock().state(pid))
}

/// PID of the currently running process (the kernel pseudo-process before
/// the first switch).
pub fn current_pid() -> Pid {
    without_interrupts(|| PROCESS_TABLE.lock().current_pid())
}

pub fn get_stats() -> ProcessStats {
    without_interrupts(|| PROCESS_TABLE.lock().stats())
}

/// Copy out a PCB snapshot.
pub fn get_by_pid(pid: Pid) -> Option<Pcb> {
    without_interrupts(|| PROCESS_TABLE.lock().get(pid).copied())
}
