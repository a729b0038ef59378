//! Process table
//!
//! Fixed-capacity array of PCBs indexed by PID, with one doubly linked
//! ready list per priority class. Ready lists are FIFO: new arrivals link
//! at the tail, the scheduler takes the head. A PCB is linked iff its state
//! is `Ready`, and at most one PCB is `Running` at any moment.

use super::pcb::{
    Pcb, Pid, Priority, ProcessState, ProcessType, IDLE_PID, KERNEL_PID, MAX_PROCESSES,
    PRIORITY_LEVELS, PROCESS_NAME_MAX,
};
use super::ProcessError;
use crate::time;

/// High-half base for kernel stacks handed to the bootstrap processes.
const KERNEL_STACK_BASE: u64 = 0xFFFF_8000_0000_0000;

/// Default kernel stack size.
const KERNEL_STACK_SIZE: u64 = 8192;

/// Process creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct CreateParams<'a> {
    pub name: &'a str,
    pub ptype: ProcessType,
    pub priority: Priority,
    pub parent: Pid,
    pub entry_point: u64,
    pub stack_base: u64,
    pub stack_size: u64,
    pub quantum_aware: bool,
}

/// Aggregate process statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub total_created: u64,
    pub active: u32,
    pub zombies: u32,
    pub context_switches: u64,
}

#[derive(Clone, Copy)]
struct ReadyList {
    head: Option<u32>,
    tail: Option<u32>,
}

impl ReadyList {
    const EMPTY: ReadyList = ReadyList {
        head: None,
        tail: None,
    };
}

/// The process table.
pub struct ProcessTable {
    slots: [Pcb; MAX_PROCESSES],
    ready: [ReadyList; PRIORITY_LEVELS],
    current: Option<u32>,
    stats: ProcessStats,
}

impl ProcessTable {
    pub const fn new() -> Self {
        Self {
            slots: [Pcb::EMPTY; MAX_PROCESSES],
            ready: [ReadyList::EMPTY; PRIORITY_LEVELS],
            current: None,
            stats: ProcessStats {
                total_created: 0,
                active: 0,
                zombies: 0,
                context_switches: 0,
            },
        }
    }

    /// Create the kernel pseudo-process (pid 0, running) and the idle
    /// process (pid 1, ready).
    pub fn init(&mut self) -> Result<(), ProcessError> {
        let kernel = self.create(&CreateParams {
            name: "kernel",
            ptype: ProcessType::Kernel,
            priority: Priority::Kernel,
            parent: KERNEL_PID,
            entry_point: 0xFFFF_FFFF_8000_0000,
            stack_base: KERNEL_STACK_BASE,
            stack_size: KERNEL_STACK_SIZE,
            quantum_aware: true,
        })?;
        debug_assert_eq!(kernel, KERNEL_PID);
        self.switch_to(kernel)?;

        let idle = self.create(&CreateParams {
            name: "idle",
            ptype: ProcessType::Kernel,
            priority: Priority::Idle,
            parent: KERNEL_PID,
            entry_point: 0,
            stack_base: KERNEL_STACK_BASE + KERNEL_STACK_SIZE,
            stack_size: KERNEL_STACK_SIZE,
            quantum_aware: false,
        })?;
        debug_assert_eq!(idle, IDLE_PID);

        log::info!("process table ready ({} slots)", MAX_PROCESSES);
        Ok(())
    }

    fn index_of_valid(&self, pid: Pid) -> Result<usize, ProcessError> {
        let idx = pid.0 as usize;
        if idx >= MAX_PROCESSES || !self.slots[idx].is_valid() {
            return Err(ProcessError::InvalidPid { pid: pid.0 });
        }
        Ok(idx)
    }

    /// Create a process in the lowest-index unused slot.
    pub fn create(&mut self, params: &CreateParams) -> Result<Pid, ProcessError> {
        if params.name.is_empty() || params.name.len() >= PROCESS_NAME_MAX {
            return Err(ProcessError::InvalidArgument { what: "name" });
        }
        if params.stack_size == 0 {
            return Err(ProcessError::InvalidArgument { what: "stack_size" });
        }
        if params.parent != KERNEL_PID && self.index_of_valid(params.parent).is_err() {
            return Err(ProcessError::InvalidParent {
                pid: params.parent.0,
            });
        }

        let idx = self
            .slots
            .iter()
            .position(|p| p.state == ProcessState::Unused)
            .ok_or(ProcessError::TooManyProcesses)?;
        let pid = Pid(idx as u32);

        let pcb = &mut self.slots[idx];
        *pcb = Pcb::EMPTY;
        pcb.pid = pid;
        pcb.parent = params.parent;
        pcb.set_name(params.name);
        pcb.ptype = params.ptype;
        pcb.state = ProcessState::Created;
        pcb.priority = params.priority;

        pcb.context.rip = params.entry_point;
        pcb.context.rsp = params
            .stack_base
            .saturating_add(params.stack_size)
            .saturating_sub(core::mem::size_of::<u64>() as u64);
        pcb.context.rbp = pcb.context.rsp;
        pcb.stack_base = params.stack_base;
        pcb.stack_size = params.stack_size;

        pcb.creation_time = time::now_ns();
        pcb.message_queue_id = pid.0;
        pcb.quantum.aware = params.quantum_aware || params.ptype == ProcessType::Quantum;
        pcb.set_valid();

        if params.parent != pid && self.index_of_valid(params.parent).is_ok() {
            self.add_child(params.parent, pid)?;
        }

        self.stats.total_created += 1;
        self.stats.active += 1;

        self.set_state(pid, ProcessState::Ready)?;
        log::debug!("created process '{}' pid {}", params.name, pid);
        Ok(pid)
    }

    /// Tear a process down and release its slot. The currently running
    /// process cannot be destroyed; it must exit first.
    pub fn destroy(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(pid)?;
        if self.current == Some(idx as u32) {
            return Err(ProcessError::InvalidState { pid: pid.0 });
        }

        if self.slots[idx].state == ProcessState::Ready {
            self.ready_unlink(idx);
        }

        let parent = self.slots[idx].parent;
        if parent != pid {
            self.remove_child(parent, pid);
        }

        if self.slots[idx].state == ProcessState::Zombie {
            self.stats.zombies = self.stats.zombies.saturating_sub(1);
        } else {
            self.stats.active = self.stats.active.saturating_sub(1);
        }

        self.slots[idx].state = ProcessState::Unused;
        self.slots[idx].clear_valid();
        log::debug!("destroyed process {}", pid);
        Ok(())
    }

    /// Record the exit code and park the process as a zombie.
    pub fn exit(&mut self, pid: Pid, exit_code: i32) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(pid)?;
        if self.slots[idx].state == ProcessState::Zombie {
            return Err(ProcessError::InvalidState { pid: pid.0 });
        }
        self.slots[idx].exit_code = exit_code;
        self.slots[idx].has_exited = true;
        self.set_state(pid, ProcessState::Zombie)?;
        self.stats.active = self.stats.active.saturating_sub(1);
        self.stats.zombies += 1;
        log::debug!("process {} exited with code {}", pid, exit_code);
        Ok(())
    }

    pub fn block(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(pid)?;
        match self.slots[idx].state {
            ProcessState::Ready | ProcessState::Running => {
                self.set_state(pid, ProcessState::Blocked)
            }
            _ => Err(ProcessError::InvalidState { pid: pid.0 }),
        }
    }

    pub fn unblock(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(pid)?;
        match self.slots[idx].state {
            ProcessState::Blocked => self.set_state(pid, ProcessState::Ready),
            _ => Err(ProcessError::InvalidState { pid: pid.0 }),
        }
    }

    /// Transition a process, maintaining ready-list membership and the
    /// single-running invariant as side effects.
    pub fn set_state(&mut self, pid: Pid, new_state: ProcessState) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(pid)?;
        let old_state = self.slots[idx].state;
        if old_state == new_state {
            return Ok(());
        }

        if new_state == ProcessState::Running
            && self.current.is_some()
            && self.current != Some(idx as u32)
        {
            return Err(ProcessError::InvalidState { pid: pid.0 });
        }

        if old_state == ProcessState::Ready {
            self.ready_unlink(idx);
        }
        if old_state == ProcessState::Running {
            self.current = None;
        }

        self.slots[idx].state = new_state;
        match new_state {
            ProcessState::Ready => self.ready_push_back(idx),
            ProcessState::Running => self.current = Some(idx as u32),
            _ => {}
        }
        Ok(())
    }

    pub fn state(&self, pid: Pid) -> ProcessState {
        match self.index_of_valid(pid) {
            Ok(idx) => self.slots[idx].state,
            Err(_) => ProcessState::Unused,
        }
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.index_of_valid(pid).ok().map(|idx| &self.slots[idx])
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        match self.index_of_valid(pid) {
            Ok(idx) => Some(&mut self.slots[idx]),
            Err(_) => None,
        }
    }

    pub fn is_valid(&self, pid: Pid) -> bool {
        self.index_of_valid(pid).is_ok()
    }

    pub fn is_ready(&self, pid: Pid) -> bool {
        self.state(pid) == ProcessState::Ready
    }

    /// Highest-priority ready process, FIFO within a class; the idle
    /// process when every list is empty.
    pub fn next_ready(&self) -> Pid {
        for priority in (0..PRIORITY_LEVELS).rev() {
            if let Some(head) = self.ready[priority].head {
                return Pid(head);
            }
        }
        IDLE_PID
    }

    /// Switch execution to `pid`: charge elapsed time to the outgoing
    /// process, requeue it if it was running, and make `pid` current. The
    /// register file and address-space root are loaded by the architecture
    /// context switch on hardware.
    pub fn switch_to(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(pid)?;
        if self.current == Some(idx as u32) {
            return Ok(());
        }

        let now = time::now_ns();
        if let Some(cur) = self.current.take() {
            let cur = cur as usize;
            let elapsed = now.saturating_sub(self.slots[cur].last_scheduled);
            self.slots[cur].runtime_last = elapsed;
            self.slots[cur].runtime_total = self.slots[cur].runtime_total.saturating_add(elapsed);
            if self.slots[cur].state == ProcessState::Running {
                self.slots[cur].state = ProcessState::Ready;
                self.ready_push_back(cur);
            }
        }

        if self.slots[idx].state == ProcessState::Ready {
            self.ready_unlink(idx);
        }
        self.slots[idx].state = ProcessState::Running;
        self.slots[idx].last_scheduled = now;
        self.current = Some(idx as u32);
        self.stats.context_switches += 1;
        Ok(())
    }

    pub fn current(&self) -> Option<Pid> {
        self.current.map(Pid)
    }

    /// PID of the running process; the kernel pseudo-process when nothing
    /// has been switched in yet.
    pub fn current_pid(&self) -> Pid {
        self.current().unwrap_or(KERNEL_PID)
    }

    pub fn stats(&self) -> ProcessStats {
        self.stats
    }

    fn add_child(&mut self, parent: Pid, child: Pid) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(parent)?;
        let pcb = &mut self.slots[idx];
        if pcb.child_count as usize >= MAX_PROCESSES {
            return Err(ProcessError::InvalidArgument { what: "child list" });
        }
        pcb.children[pcb.child_count as usize] = child.0;
        pcb.child_count += 1;
        Ok(())
    }

    fn remove_child(&mut self, parent: Pid, child: Pid) {
        if let Ok(idx) = self.index_of_valid(parent) {
            let pcb = &mut self.slots[idx];
            let count = pcb.child_count as usize;
            if let Some(pos) = pcb.children[..count].iter().position(|&c| c == child.0) {
                pcb.children.copy_within(pos + 1..count, pos);
                pcb.child_count -= 1;
            }
        }
    }

    /// Allocate qubits to a quantum-aware process.
    pub fn allocate_qubits(&mut self, pid: Pid, count: u32) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(pid)?;
        if !self.slots[idx].quantum.aware {
            return Err(ProcessError::InvalidState { pid: pid.0 });
        }
        self.slots[idx].quantum.qubit_allocation += count;
        Ok(())
    }

    pub fn deallocate_qubits(&mut self, pid: Pid, count: u32) -> Result<(), ProcessError> {
        let idx = self.index_of_valid(pid)?;
        let alloc = &mut self.slots[idx].quantum.qubit_allocation;
        *alloc = alloc.saturating_sub(count);
        Ok(())
    }

    // Ready-list maintenance. Links are slot indices; FIFO discipline.

    fn ready_push_back(&mut self, idx: usize) {
        let priority = self.slots[idx].priority.as_index();
        let list = &mut self.ready[priority];
        self.slots[idx].next = None;
        self.slots[idx].prev = list.tail;
        match list.tail {
            Some(tail) => self.slots[tail as usize].next = Some(idx as u32),
            None => list.head = Some(idx as u32),
        }
        list.tail = Some(idx as u32);
    }

    fn ready_unlink(&mut self, idx: usize) {
        let priority = self.slots[idx].priority.as_index();
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.ready[priority].head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].prev = prev,
            None => self.ready[priority].tail = prev,
        }
        self.slots[idx].next = None;
        self.slots[idx].prev = None;
    }

    /// Walk one ready list, returning how many PCBs it links.
    #[cfg(all(test, not(target_os = "none")))]
    fn ready_list_len(&self, priority: Priority) -> usize {
        let mut len = 0;
        let mut cursor = self.ready[priority.as_index()].head;
        while let Some(idx) = cursor {
            len += 1;
            cursor = self.slots[idx as usize].next;
        }
        len
    }

    /// Log a summary of a PCB.
    pub fn dump(&self, pid: Pid) {
        if let Some(pcb) = self.get(pid) {
            log::debug!(
                "pid {} '{}' {:?} {:?} prio {:?} parent {} children {} runtime {} ns",
                pcb.pid,
                pcb.name(),
                pcb.ptype,
                pcb.state,
                pcb.priority,
                pcb.parent,
                pcb.child_count,
                pcb.runtime_total
            );
        }
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
