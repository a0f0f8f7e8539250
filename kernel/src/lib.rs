//! The host-side microkernel (spec §3, §4).
//!
//! Unlike the teacher's guest-side, `no_std`, bare-metal `kernel` crate,
//! this one runs in the same host process as the RISC-V interpreter and is
//! ordinary `std` Rust: it is tested with plain `#[test]`, the same way the
//! teacher already tests its one pure function (`__syscall_dispatch`). Every
//! subsystem module is independently unit-tested; `Kernel` just assembles
//! them and is the thing the embedding loop (the root crate's `Machine`)
//! drives one trap at a time.

pub mod boot;
pub mod channel;
pub mod diag;
pub mod elf;
pub mod env;
pub mod error;
pub mod exception;
pub mod interrupt;
pub mod process;
pub mod scheduler;
pub mod storage;
pub mod syscall;
pub mod timer;
pub mod trap;
pub mod types;
pub mod users;

use env::HostEnvironment;
use error::SyscallResult;
use exception::ExceptionCause;
use process::ProcessTable;
use scheduler::Scheduler;
use syscall::SyscallContext;
use trap::TrapOutcome;
use types::Pid;

/// All host-side kernel state for one running machine. Owned by the
/// embedding loop alongside the VM; never the other way around.
#[derive(Clone)]
pub struct Kernel {
    pub process_table: ProcessTable,
    pub scheduler: Scheduler,
    pub channels: channel::ChannelTable,
    pub storage: storage::Storage,
    pub timer: timer::Timer,
    pub interrupts: interrupt::InterruptController,
    pub users: users::Users,
    pub exception_stats: diag::ExceptionStats,
    pub error_log: diag::ErrorLog,
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            process_table: ProcessTable::new(),
            scheduler: Scheduler::new(),
            channels: channel::ChannelTable::new(),
            storage: storage::Storage::new(),
            timer: timer::Timer::new(),
            interrupts: interrupt::InterruptController::new(),
            users: users::Users::new(),
            exception_stats: diag::ExceptionStats::new(),
            error_log: diag::ErrorLog::new(),
        }
    }

    /// Run the fixed boot sequence, returning how long it took.
    pub fn boot(&self) -> boot::BootReport {
        boot::boot_kernel(
            &self.process_table,
            &self.scheduler,
            &self.storage,
            &self.channels,
            &self.interrupts,
            &self.timer,
            &self.users,
        )
    }

    /// Service one `ecall` trap for the currently scheduled process.
    pub fn handle_syscall(
        &mut self,
        host: &mut dyn HostEnvironment,
        nr: u64,
        a0: u64,
        a1: u64,
        a2: u64,
        a3: u64,
    ) -> SyscallResult {
        let current_pid = self.scheduler.current();
        let mut ctx = SyscallContext {
            current_pid,
            process_table: &mut self.process_table,
            scheduler: &mut self.scheduler,
            channels: &mut self.channels,
            storage: &mut self.storage,
            timer: &mut self.timer,
            host,
        };
        syscall::dispatch(&mut ctx, nr, a0, a1, a2, a3)
    }

    /// Handle a non-ecall exception for the currently scheduled process.
    pub fn handle_exception(&mut self, cause: ExceptionCause, pc: u64) -> TrapOutcome {
        let pid = self.scheduler.current();
        trap::handle_exception(
            cause,
            pid,
            pc,
            &mut self.process_table,
            &mut self.scheduler,
            &mut self.exception_stats,
            &mut self.error_log,
        )
    }

    /// Pick the next runnable process and make it current, returning it.
    pub fn schedule_next(&mut self) -> Option<Pid> {
        self.scheduler.schedule_next(&self.process_table)
    }

    /// Capture the complete kernel state (every subsystem, spec §4.12's
    /// snapshot/restore contract applied to `Kernel` rather than just the
    /// VM's registers and memory). Every subsystem here is plain owned data,
    /// so a snapshot is just a deep clone.
    pub fn snapshot(&self) -> Kernel {
        self.clone()
    }

    /// Replace every subsystem with the state captured in `snapshot`.
    pub fn restore(&mut self, snapshot: &Kernel) {
        *self = snapshot.clone();
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
