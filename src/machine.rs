//! The embedding loop: owns both the VM and the kernel and is the only
//! place that knows about both (spec §4.1's "single trap dispatch point",
//! §9's "kernel never depends on the VM" redesign flag).
//!
//! Generalizes the teacher's `src/vm/mod.rs::run()` KVM exit loop: there,
//! `VcpuExit::Hlt` stops the loop; here, every `ecall`/exception exits the
//! interpreter back to this loop, which resolves it against the kernel and
//! resumes stepping.

use kernel::Kernel;
use log::{error, info};

use crate::vm::exec::StepOutcome;
use crate::vm::snapshot::Snapshot as VmSnapshot;
use crate::vm::{Vm, VmState};

/// A combined VM + kernel snapshot (spec §4.12: restoring a machine must put
/// both halves back exactly where they were, not just guest memory).
pub struct MachineSnapshot {
    vm: VmSnapshot,
    kernel: Kernel,
}

/// What happened during one call to `run_until_halt`/`run_steps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The guest process currently scheduled exited or was terminated.
    Halted { exit_status: i32 },
    /// The step budget was exhausted with no process still runnable.
    NoRunnableProcess,
    /// The step budget was exhausted while the guest was still running.
    StepLimitReached,
}

pub struct Machine {
    pub vm: Box<Vm>,
    pub kernel: Box<Kernel>,
    last_exit_status: Option<i32>,
}

impl Machine {
    pub fn new(memory_size: usize) -> Self {
        Self {
            vm: Box::new(Vm::new(memory_size)),
            kernel: Box::new(Kernel::new()),
            last_exit_status: None,
        }
    }

    pub fn boot(&mut self) {
        let report = self.kernel.boot();
        info!("kernel boot complete in {}ns", report.duration_nanos);
    }

    /// Register the guest image already loaded into `self.vm` as the
    /// kernel's first process and make it the scheduler's current pid, so
    /// fatal-trap termination and `wait` have a real process-table slot to
    /// act on (spec §4.6: "spawn ... captures entry_point and
    /// stack_pointer; sets state = running; marks the scheduler's current
    /// PID"). Must run after `boot()`, whose boot sequence asserts the
    /// process table starts empty.
    pub fn spawn_root_process(&mut self) -> Option<kernel::types::Pid> {
        let entry = self.vm.registers().pc;
        let sp = self.vm.registers().get(2);
        let pid = self.kernel.process_table.spawn(0, entry, sp)?;
        self.kernel.scheduler.set_current(pid);
        Some(pid)
    }

    /// Step the interpreter until the guest halts (exits or is terminated
    /// by a fatal trap) or `max_steps` is exhausted.
    pub fn run_steps(&mut self, max_steps: u64) -> RunOutcome {
        if self.vm.state() == VmState::Errored {
            return RunOutcome::Halted {
                exit_status: self.last_exit_status.unwrap_or(130),
            };
        }

        for _ in 0..max_steps {
            match self.vm.step() {
                StepOutcome::Continue => {}
                StepOutcome::Ecall => {
                    let regs = self.vm.registers();
                    let nr = regs.arg(7);
                    let a0 = regs.arg(0);
                    let a1 = regs.arg(1);
                    let a2 = regs.arg(2);
                    let a3 = regs.arg(3);
                    let result = self.kernel.handle_syscall(self.vm.as_mut(), nr, a0, a1, a2, a3);
                    let (value, error_tag) = result.encode();
                    self.vm.registers_mut().set_arg(0, value);
                    self.vm.registers_mut().set_arg(1, error_tag);

                    if let kernel::error::SyscallResult::Success(_) = result {
                        if nr == kernel::syscall::SYS_EXIT {
                            let exit_status = a0 as i32;
                            self.last_exit_status = Some(exit_status);
                            self.vm.halt();
                            return RunOutcome::Halted { exit_status };
                        }
                    }
                }
                StepOutcome::Trap(cause) => {
                    let pc = self.vm.registers().pc;
                    let outcome = self.kernel.handle_exception(cause, pc);
                    match outcome {
                        kernel::trap::TrapOutcome::Terminated { exit_status, .. } => {
                            error!("guest terminated by trap {cause:?} at pc={pc:#x}");
                            self.last_exit_status = Some(exit_status);
                            return RunOutcome::Halted { exit_status };
                        }
                        kernel::trap::TrapOutcome::Resume => {
                            // non-fatal: the VM optimistically marks itself
                            // errored on every trap (it can't know fatality,
                            // that's the kernel's call); undo that here and
                            // skip past the faulting instruction, matching the
                            // trap dispatcher's "recorded, resumed" policy.
                            self.vm.start();
                            let regs = self.vm.registers_mut();
                            regs.pc = regs.pc.wrapping_add(4);
                        }
                    }
                }
            }
        }

        if self.kernel.scheduler.current() == kernel::types::NO_PID {
            RunOutcome::NoRunnableProcess
        } else {
            RunOutcome::StepLimitReached
        }
    }

    /// Capture both the VM and the kernel. The VM's own `exception_stats`
    /// survive a restore (diagnostic history, not resumable state, per
    /// `Vm::start`'s doc comment); the kernel's copy is restored verbatim
    /// since it backs `wait`'s and the trap dispatcher's externally visible
    /// behavior.
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            vm: self.vm.snapshot(),
            kernel: self.kernel.snapshot(),
        }
    }

    /// Restore a previously captured snapshot. Fails without modifying
    /// anything if the VM's guest memory size no longer matches.
    pub fn restore(&mut self, snapshot: &MachineSnapshot) -> bool {
        if !self.vm.restore(&snapshot.vm) {
            return false;
        }
        self.kernel.restore(&snapshot.kernel);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_restore_round_trips_vm_and_kernel() {
        let mut machine = Machine::new(0x10000);
        machine
            .vm
            .map_pages(0, 0x10000, kernel::env::Permissions::READ | kernel::env::Permissions::WRITE | kernel::env::Permissions::EXECUTE)
            .unwrap();
        machine.boot();
        let pid = machine.spawn_root_process().unwrap();
        let snapshot = machine.snapshot();

        machine.kernel.process_table.exit(pid, 9);
        machine.kernel.scheduler.clear_current();
        assert_eq!(machine.kernel.process_table.is_exited(pid), Some(9));

        assert!(machine.restore(&snapshot));
        assert_eq!(machine.kernel.process_table.is_exited(pid), None);
        assert_eq!(machine.kernel.scheduler.current(), pid);
    }
}
