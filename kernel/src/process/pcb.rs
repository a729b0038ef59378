//! Process Control Block (PCB)
//!
//! The per-process record in the kernel: identity, state, priority, saved
//! execution context, stack bounds, timing accumulators, relationships, and
//! the validity tag that distinguishes live slots from recycled ones.

use core::fmt;

/// Maximum number of concurrent processes.
pub const MAX_PROCESSES: usize = 256;

/// Maximum process name length in bytes, including room for the bound
/// check (names are limited to 63 bytes).
pub const PROCESS_NAME_MAX: usize = 64;

/// PCB validity tag ("PROC").
pub(super) const PCB_MAGIC: u32 = 0x5052_4F43;

/// Process ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

/// Reserved for the kernel pseudo-process.
pub const KERNEL_PID: Pid = Pid(0);

/// Reserved for the idle process.
pub const IDLE_PID: Pid = Pid(1);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Slot not in use
    Unused = 0,
    /// Created but not yet runnable
    Created,
    /// Ready to run (linked into a ready list)
    Ready,
    /// Currently running
    Running,
    /// Waiting (IPC, I/O)
    Blocked,
    /// Terminated but not cleaned up
    Terminated,
    /// Exited, waiting for the parent to reap
    Zombie,
}

/// Process type
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessType {
    Kernel = 0,
    User,
    Service,
    /// Process that may hold quantum resources
    Quantum,
}

/// Process priority, lowest to highest.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Idle = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    RealTime = 4,
    Kernel = 5,
}

/// Number of priority classes (and per-priority ready lists).
pub const PRIORITY_LEVELS: usize = 6;

impl Priority {
    pub const fn as_index(self) -> usize {
        self as usize
    }

    /// Priority scaled into [0, 1] against the kernel class, the base term
    /// of the resonant priority derivation.
    pub fn normalized(self) -> f64 {
        self.as_index() as f64 / Priority::Kernel.as_index() as f64
    }
}

/// Saved execution context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Instruction pointer
    pub rip: u64,
    /// Stack pointer
    pub rsp: u64,
    /// Frame pointer
    pub rbp: u64,
    /// Address-space root (page-table physical base)
    pub cr3: u64,
}

/// Quantum-awareness bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantumInfo {
    /// Process may use quantum resources
    pub aware: bool,
    /// Qubits currently allocated to the process
    pub qubit_allocation: u32,
    /// Time spent on quantum operations (ns)
    pub quantum_runtime_ns: u64,
}

/// Process Control Block
#[derive(Clone, Copy)]
pub struct Pcb {
    pub pid: Pid,
    pub parent: Pid,
    name: [u8; PROCESS_NAME_MAX],
    name_len: u8,
    pub ptype: ProcessType,
    pub state: ProcessState,
    pub priority: Priority,

    /// Saved execution context
    pub context: ExecutionContext,
    /// Stack bounds
    pub stack_base: u64,
    pub stack_size: u64,

    /// Timing accumulators (ns)
    pub creation_time: u64,
    pub runtime_total: u64,
    pub runtime_last: u64,
    pub last_scheduled: u64,

    /// IPC queue handle (index into the per-process queue table)
    pub message_queue_id: u32,
    /// Capability root for this process
    pub capability_root: u32,

    /// Child PIDs
    pub children: [u32; MAX_PROCESSES],
    pub child_count: u32,

    /// Exit information
    pub exit_code: i32,
    pub has_exited: bool,

    /// Quantum-awareness fields
    pub quantum: QuantumInfo,

    magic: u32,

    /// Ready-list linkage (slot indices)
    pub(super) next: Option<u32>,
    pub(super) prev: Option<u32>,
}

impl Pcb {
    pub const EMPTY: Pcb = Pcb {
        pid: Pid(0),
        parent: Pid(0),
        name: [0; PROCESS_NAME_MAX],
        name_len: 0,
        ptype: ProcessType::User,
        state: ProcessState::Unused,
        priority: Priority::Normal,
        context: ExecutionContext {
            rip: 0,
            rsp: 0,
            rbp: 0,
            cr3: 0,
        },
        stack_base: 0,
        stack_size: 0,
        creation_time: 0,
        runtime_total: 0,
        runtime_last: 0,
        last_scheduled: 0,
        message_queue_id: 0,
        capability_root: 0,
        children: [0; MAX_PROCESSES],
        child_count: 0,
        exit_code: 0,
        has_exited: false,
        quantum: QuantumInfo {
            aware: false,
            qubit_allocation: 0,
            quantum_runtime_ns: 0,
        },
        magic: 0,
        next: None,
        prev: None,
    };

    /// The validity tag equals the sentinel iff the slot is live.
    pub fn is_valid(&self) -> bool {
        self.magic == PCB_MAGIC && self.state != ProcessState::Unused
    }

    pub fn is_alive(&self) -> bool {
        self.is_valid()
            && !matches!(
                self.state,
                ProcessState::Terminated | ProcessState::Zombie
            )
    }

    pub(super) fn set_valid(&mut self) {
        self.magic = PCB_MAGIC;
    }

    pub(super) fn clear_valid(&mut self) {
        self.magic = 0;
    }

    /// Store a name, truncating at [`PROCESS_NAME_MAX`] − 1 bytes. Length
    /// validation happens at creation.
    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(PROCESS_NAME_MAX - 1);
        self.name[..len].copy_from_slice(&bytes[..len]);
        self.name_len = len as u8;
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pcb")
            .field("pid", &self.pid)
            .field("parent", &self.parent)
            .field("name", &self.name())
            .field("type", &self.ptype)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("children", &self.child_count)
            .finish_non_exhaustive()
    }
}
