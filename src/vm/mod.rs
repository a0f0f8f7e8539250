//! The software RISC-V interpreter (spec §3 "Vm", §4.1-§4.3).
//!
//! Grounded on the teacher's `src/vm/mod.rs`: that file owns a KVM `Vcpu`
//! plus guest memory and drives it with `run()`/`load_elf()`. This module
//! keeps the same two responsibilities — own guest state, load an
//! executable into it — but the "run a vCPU" half is replaced by a software
//! fetch-decode-execute loop, since there is no hardware virtualization
//! underneath this VM. Per the redesign flag in spec §9, `Vm` is always
//! boxed by its owner (the root crate's `Machine`) rather than stack
//! allocated, since guest memory can be large.

pub mod decode;
pub mod error;
pub mod exec;
pub mod memory;
pub mod pagetable;
pub mod registers;
pub mod snapshot;
pub mod stats;

use goblin::elf::Elf;
use kernel::diag::{ErrorLog, ExceptionStats};
use kernel::env::{HostEnvironment, Permissions};
use kernel::error::ErrorKind;

use error::Error;
use memory::GuestMemory;
use pagetable::PageTable;
use registers::RegisterFile;
use stats::{ExecutionFlow, MemoryStats, PerformanceCounters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Halted,
    Running,
    Errored,
}

pub struct Vm {
    memory: GuestMemory,
    page_table: PageTable,
    registers: RegisterFile,
    state: VmState,
    pub exception_stats: ExceptionStats,
    pub error_log: ErrorLog,
    pub performance: PerformanceCounters,
    pub memory_stats: MemoryStats,
    pub execution_flow: ExecutionFlow,
}

impl Vm {
    pub fn new(memory_size: usize) -> Self {
        Self {
            memory: GuestMemory::new(memory_size),
            page_table: PageTable::new(),
            registers: RegisterFile::new(0),
            state: VmState::Halted,
            exception_stats: ExceptionStats::new(),
            error_log: ErrorLog::new(),
            performance: PerformanceCounters::default(),
            memory_stats: MemoryStats::default(),
            execution_flow: ExecutionFlow::new(),
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    pub fn map_pages(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), ErrorKind> {
        self.page_table.map(base, size, perms)
    }

    /// `halted`/`errored` → `running` (spec §4.3 state machine). Restarting
    /// from `errored` clears nothing beyond the state tag itself: the
    /// exception/error-log history is diagnostic and deliberately survives a
    /// restart.
    pub fn start(&mut self) {
        self.state = VmState::Running;
    }

    /// `running` → `halted`, e.g. on the guest's `exit` syscall.
    pub fn halt(&mut self) {
        self.state = VmState::Halted;
    }

    pub fn set_entry(&mut self, entry: u64) {
        self.registers.pc = entry;
        self.start();
    }

    /// Reserve the last page of guest memory as the initial stack (spec §3:
    /// "the last page is reserved as the initial stack") and point x2 at its
    /// top.
    fn init_stack(&mut self) {
        let page_size = kernel::types::PAGE_SIZE;
        let memory_size = self.memory.len() as u64;
        let stack_base = memory_size - page_size;
        // identical-range remaps are idempotent (spec §9), so loading twice
        // into the same VM can't fail here.
        let _ = self.page_table.map(stack_base, page_size, Permissions::READ | Permissions::WRITE);
        self.registers.set(2, memory_size - page_size);
    }

    /// Load an ELF64 RISC-V executable from a contiguous host byte slice
    /// (the boot loader's job, directly grounded on the teacher's
    /// `Vm::load_elf`): parse program headers, copy each `PT_LOAD`
    /// segment's file bytes into guest memory and zero the BSS tail, map
    /// the segment with its ELF flags converted to guest permissions, and
    /// set the entry point.
    pub fn load_elf(&mut self, image: &[u8]) -> Result<(), Error> {
        let elf = Elf::parse(image)?;
        if !elf.is_64 {
            return Err(Error::UnsupportedFormat);
        }

        for phdr in &elf.program_headers {
            if phdr.p_type != goblin::elf::program_header::PT_LOAD {
                continue;
            }
            let dest_start = phdr.p_vaddr;
            let dest_end = dest_start
                .checked_add(phdr.p_memsz)
                .ok_or(Error::SegmentOutOfBounds)?;
            if dest_end as usize > self.memory.len() {
                return Err(Error::SegmentOutOfBounds);
            }

            let file_start = phdr.p_offset as usize;
            let file_end = file_start + phdr.p_filesz as usize;
            let segment_bytes = image.get(file_start..file_end).ok_or(Error::SegmentOutOfBounds)?;

            self.memory.write_raw(dest_start, segment_bytes);
            if phdr.p_memsz > phdr.p_filesz {
                let zeroes = vec![0u8; (phdr.p_memsz - phdr.p_filesz) as usize];
                self.memory.write_raw(dest_start + phdr.p_filesz, &zeroes);
            }

            let perms = Permissions::from_elf_flags(phdr.p_flags);
            self.page_table
                .map(dest_start, phdr.p_memsz.max(1), perms)
                .map_err(|_| Error::SegmentOutOfBounds)?;
        }

        self.init_stack();
        self.set_entry(elf.entry);
        Ok(())
    }

    /// Fetch-decode-execute one instruction. Returns the raw execution
    /// outcome; the embedding loop is responsible for turning a trap or
    /// ecall into kernel action.
    pub fn step(&mut self) -> exec::StepOutcome {
        self.execution_flow.record(self.registers.pc);
        let outcome = exec::step(&mut self.registers, &mut self.memory, &self.page_table);
        self.performance.instructions_retired += 1;
        match outcome {
            exec::StepOutcome::Ecall => self.performance.ecalls += 1,
            exec::StepOutcome::Trap(cause) => {
                self.exception_stats.record(cause);
                self.error_log.push(cause, 0, self.registers.pc, "vm trap");
                self.state = VmState::Errored;
            }
            exec::StepOutcome::Continue => {}
        }
        outcome
    }

    pub fn snapshot(&self) -> snapshot::Snapshot {
        snapshot::Snapshot::capture(
            &self.registers,
            &self.memory,
            &self.exception_stats,
            self.performance,
            self.state,
        )
    }

    /// Restore registers, PC, memory, `exception_stats`, `performance`, and
    /// run state from `snapshot` (spec §4.11's round-trip invariant: these
    /// are exactly the fields `save`/`restore` must agree on).
    pub fn restore(&mut self, snapshot: &snapshot::Snapshot) -> bool {
        if !snapshot.validate_memory_size(&self.memory) {
            return false;
        }
        snapshot.restore_into(&mut self.registers, &mut self.memory);
        self.performance = snapshot.performance();
        self.exception_stats = snapshot.exception_stats();
        self.state = snapshot.state();
        true
    }
}

impl HostEnvironment for Vm {
    fn read_guest(&self, addr: u64, dst: &mut [u8]) -> bool {
        self.memory.read_raw(addr, dst)
    }

    fn write_guest(&mut self, addr: u64, src: &[u8]) -> bool {
        self.memory.write_raw(addr, src)
    }

    fn map_pages(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), ErrorKind> {
        self.page_table.map(base, size, perms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vm_starts_halted() {
        let vm = Vm::new(0x10000);
        assert_eq!(vm.state(), VmState::Halted);
    }

    #[test]
    fn set_entry_marks_running() {
        let mut vm = Vm::new(0x10000);
        vm.set_entry(0x8000_0000);
        assert_eq!(vm.state(), VmState::Running);
        assert_eq!(vm.registers().pc, 0x8000_0000);
    }

    #[test]
    fn host_environment_read_write_round_trips() {
        let mut vm = Vm::new(0x1000);
        let data = [1u8, 2, 3, 4];
        assert!(HostEnvironment::write_guest(&mut vm, 0x10, &data));
        let mut out = [0u8; 4];
        assert!(HostEnvironment::read_guest(&vm, 0x10, &mut out));
        assert_eq!(out, data);
    }

    #[test]
    fn stepping_an_addi_program_updates_registers_and_counters() {
        let mut vm = Vm::new(0x10000);
        vm.map_pages(0, 0x10000, Permissions::READ | Permissions::WRITE | Permissions::EXECUTE)
            .unwrap();
        HostEnvironment::write_guest(&mut vm, 0, &[0x93, 0x00, 0xa0, 0x02]);
        vm.set_entry(0);

        let outcome = vm.step();
        assert_eq!(outcome, exec::StepOutcome::Continue);
        assert_eq!(vm.registers().get(1), 42);
        assert_eq!(vm.registers().pc, 4);
        assert_eq!(vm.performance.instructions_retired, 1);
    }

    #[test]
    fn trap_errors_the_vm_and_records_stats() {
        let mut vm = Vm::new(0x10000);
        vm.map_pages(0, 0x10000, Permissions::READ | Permissions::WRITE | Permissions::EXECUTE)
            .unwrap();
        HostEnvironment::write_guest(&mut vm, 0, &[0xff, 0xff, 0xff, 0xff]);
        vm.set_entry(0);

        let outcome = vm.step();
        assert_eq!(
            outcome,
            exec::StepOutcome::Trap(kernel::exception::ExceptionCause::IllegalInstruction)
        );
        assert_eq!(vm.state(), VmState::Errored);
        assert_eq!(
            vm.exception_stats.count(kernel::exception::ExceptionCause::IllegalInstruction),
            1
        );
        assert_eq!(vm.error_log.len(), 1);
    }

    #[test]
    fn start_restarts_an_errored_vm() {
        let mut vm = Vm::new(0x10000);
        vm.map_pages(0, 0x10000, Permissions::READ | Permissions::WRITE | Permissions::EXECUTE)
            .unwrap();
        HostEnvironment::write_guest(&mut vm, 0, &[0xff, 0xff, 0xff, 0xff]);
        vm.set_entry(0);
        vm.step();
        assert_eq!(vm.state(), VmState::Errored);

        vm.start();
        assert_eq!(vm.state(), VmState::Running);
    }

    #[test]
    fn load_elf_reserves_the_last_page_as_stack() {
        let mut vm = Vm::new(0x10000);
        // zero program headers is accepted (spec §6)
        vm.init_stack();
        assert_eq!(vm.registers().get(2), 0x10000 - kernel::types::PAGE_SIZE);
        assert!(vm.page_table().is_permitted(0x10000 - 8, 8, Permissions::WRITE));
    }
}
