//! The process table (spec §3 "Process slot", §4.6).
//!
//! Shape follows the teacher's `kernel/src/process.rs::Scheduler`: a fixed
//! array of slots plus a first-free-scan allocator, generalized from "one
//! guest kernel running real host threads" to "one host-side table of
//! sandboxed guest processes", per the "bounded arrays with parallel length
//! counters" redesign note in spec §9.

use crate::types::{MAX_PROCESSES, NO_PID, Pid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Free,
    Running,
    Blocked,
    Exited,
}

/// Saved PC/SP pair a process resumes from; entry is recorded separately so
/// `wait` can answer for a slot whose context was never resumed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub pc: u64,
    pub sp: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessSlot {
    pub id: Pid,
    pub allocated: bool,
    pub state: ProcessState,
    pub exit_status: i32,
    pub executable: u64,
    pub entry_point: u64,
    pub stack_pointer: u64,
    pub context: Context,
}

impl ProcessSlot {
    const fn empty() -> Self {
        Self {
            id: NO_PID,
            allocated: false,
            state: ProcessState::Free,
            exit_status: 0,
            executable: 0,
            entry_point: 0,
            stack_pointer: 0,
            context: Context { pc: 0, sp: 0 },
        }
    }
}

#[derive(Clone)]
pub struct ProcessTable {
    slots: [ProcessSlot; MAX_PROCESSES],
    next_pid: Pid,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            slots: [ProcessSlot::empty(); MAX_PROCESSES],
            next_pid: 1,
        }
    }

    pub fn slots(&self) -> &[ProcessSlot] {
        &self.slots
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessSlot> {
        self.slots.iter().find(|slot| slot.allocated && slot.id == pid)
    }

    fn index_of(&self, pid: Pid) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.allocated && slot.id == pid)
    }

    /// Allocate the lowest free slot, assign a monotonically increasing PID,
    /// and mark it running.
    pub fn spawn(&mut self, executable: u64, entry_point: u64, stack_pointer: u64) -> Option<Pid> {
        let slot_idx = self
            .slots
            .iter()
            .position(|slot| !slot.allocated || slot.state == ProcessState::Exited)?;

        let pid = self.next_pid;
        self.next_pid = self.next_pid.checked_add(1)?;

        self.slots[slot_idx] = ProcessSlot {
            id: pid,
            allocated: true,
            state: ProcessState::Running,
            exit_status: 0,
            executable,
            entry_point,
            stack_pointer,
            context: Context {
                pc: entry_point,
                sp: stack_pointer,
            },
        };

        Some(pid)
    }

    /// Mark `pid` exited with the given status. No-op if the slot is not an
    /// allocated, non-exited process.
    pub fn exit(&mut self, pid: Pid, exit_status: i32) {
        if let Some(idx) = self.index_of(pid) {
            self.slots[idx].state = ProcessState::Exited;
            self.slots[idx].exit_status = exit_status;
        }
    }

    pub fn is_exited(&self, pid: Pid) -> Option<i32> {
        self.get(pid).and_then(|slot| {
            if slot.state == ProcessState::Exited {
                Some(slot.exit_status)
            } else {
                None
            }
        })
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
