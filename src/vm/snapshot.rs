//! VM snapshot/restore (spec §4.3 "Snapshot", round-trip identity
//! invariant).

use kernel::diag::ExceptionStats;

use super::memory::GuestMemory;
use super::registers::RegisterFile;
use super::stats::PerformanceCounters;
use super::VmState;

#[derive(Clone)]
pub struct Snapshot {
    registers: [u64; 32],
    pc: u64,
    memory: Vec<u8>,
    exception_stats: ExceptionStats,
    performance: PerformanceCounters,
    state: VmState,
}

impl Snapshot {
    pub fn capture(
        regs: &RegisterFile,
        memory: &GuestMemory,
        exception_stats: &ExceptionStats,
        performance: PerformanceCounters,
        state: VmState,
    ) -> Self {
        Self {
            registers: *regs.all(),
            pc: regs.pc,
            memory: memory.snapshot(),
            exception_stats: *exception_stats,
            performance,
            state,
        }
    }

    /// Restore registers and memory from this snapshot. `exception_stats`
    /// and `state` are handed back rather than written here: `Vm::restore`
    /// owns those fields directly and assigns them itself (spec §4.11's
    /// round-trip invariant covers `exception_stats.total` and the run
    /// state, not just registers and memory).
    pub fn restore_into(&self, regs: &mut RegisterFile, memory: &mut GuestMemory) {
        regs.load_all(self.registers);
        regs.pc = self.pc;
        memory.restore(&self.memory);
    }

    pub fn exception_total(&self) -> u64 {
        self.exception_stats.total()
    }

    pub fn exception_stats(&self) -> ExceptionStats {
        self.exception_stats
    }

    pub fn performance(&self) -> PerformanceCounters {
        self.performance
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// A snapshot is only valid to restore into a VM with identically sized
    /// guest memory.
    pub fn validate_memory_size(&self, memory: &GuestMemory) -> bool {
        self.memory.len() == memory.len()
    }

    /// Flatten this snapshot into a byte buffer for `--snapshot-out`: 32
    /// little-endian registers, the PC, then the raw memory image. Spec §6
    /// only commits to the in-memory invariants of §4.11, not a stable
    /// on-disk layout, so this is a debug dump rather than a versioned
    /// format — good enough to inspect with `xxd`, not meant to be read back
    /// by a different build of this crate.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(33 * 8 + self.memory.len());
        for reg in self.registers {
            out.extend_from_slice(&reg.to_le_bytes());
        }
        out.extend_from_slice(&self.pc.to_le_bytes());
        out.extend_from_slice(&self.memory);
        out
    }
}
