//! Cross-module scenarios exercising the VM and kernel together, matching
//! the teacher's placement of whole-system tests in `tests/integration.rs`
//! rather than alongside any one module.

use kernel::env::{HostEnvironment, Permissions};
use kernel::error::{ErrorKind, SyscallResult};
use kernel::exception::ExceptionCause;
use kernel::syscall::{SYS_CHANNEL_CREATE, SYS_CHANNEL_RECV, SYS_CHANNEL_SEND, SYS_EXIT, SYS_WAIT};
use rvcage::machine::{Machine, RunOutcome};
use rvcage::vm::{Vm, VmState};

const MEMORY_SIZE: usize = 0x10000;

fn executable_vm() -> Vm {
    let mut vm = Vm::new(MEMORY_SIZE);
    vm.map_pages(0, MEMORY_SIZE as u64, Permissions::READ | Permissions::WRITE | Permissions::EXECUTE)
        .unwrap();
    vm
}

#[test]
fn addi_smoke() {
    let mut vm = executable_vm();
    HostEnvironment::write_guest(&mut vm, 0, &[0x93, 0x00, 0xa0, 0x02]); // addi x1, x0, 42
    vm.set_entry(0);

    vm.step();

    assert_eq!(vm.registers().get(1), 42);
    assert_eq!(vm.registers().pc, 4);
}

#[test]
fn wait_returns_exit_status() {
    let mut machine = Machine::new(MEMORY_SIZE);
    machine.boot();
    let pid = machine.spawn_root_process().unwrap();

    let exit_result = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_EXIT, 42, 0, 0, 0);
    assert_eq!(exit_result, SyscallResult::ok(0));

    let wait_result = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_WAIT, pid as u64, 0, 0, 0);
    assert_eq!(wait_result, SyscallResult::ok(42));
}

#[test]
fn channel_fifo_delivers_messages_in_order() {
    let mut machine = Machine::new(MEMORY_SIZE);
    machine.boot();
    HostEnvironment::write_guest(machine.vm.as_mut(), 0, b"Message 1");
    HostEnvironment::write_guest(machine.vm.as_mut(), 16, b"Message 2");

    let create = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_CREATE, 0, 0, 0, 0);
    let SyscallResult::Success(cid) = create else {
        panic!("expected a channel id");
    };

    let send1 = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_SEND, cid, 0, 9, 0);
    assert_eq!(send1, SyscallResult::ok(0));
    let send2 = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_SEND, cid, 16, 9, 0);
    assert_eq!(send2, SyscallResult::ok(0));

    let recv1 = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_RECV, cid, 64, 9, 0);
    assert_eq!(recv1, SyscallResult::ok(9));
    let mut buf1 = [0u8; 9];
    assert!(HostEnvironment::read_guest(machine.vm.as_ref(), 64, &mut buf1));
    assert_eq!(&buf1, b"Message 1");

    let recv2 = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_RECV, cid, 64, 9, 0);
    assert_eq!(recv2, SyscallResult::ok(9));
    let mut buf2 = [0u8; 9];
    assert!(HostEnvironment::read_guest(machine.vm.as_ref(), 64, &mut buf2));
    assert_eq!(&buf2, b"Message 2");

    let recv3 = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_RECV, cid, 64, 9, 0);
    assert_eq!(recv3, SyscallResult::err(ErrorKind::WouldBlock));
}

#[test]
fn channel_invalid_id_and_empty_recv_report_errors() {
    let mut machine = Machine::new(MEMORY_SIZE);
    machine.boot();

    let send_missing = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_SEND, 999, 0, 0, 0);
    assert_eq!(send_missing, SyscallResult::err(ErrorKind::NotFound));

    let create = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_CREATE, 0, 0, 0, 0);
    let SyscallResult::Success(cid) = create else {
        panic!("expected a channel id");
    };
    let recv_empty = machine.kernel.handle_syscall(machine.vm.as_mut(), SYS_CHANNEL_RECV, cid, 0, 4, 0);
    assert_eq!(recv_empty, SyscallResult::err(ErrorKind::WouldBlock));
}

#[test]
fn fatal_trap_terminates_the_running_process() {
    let mut machine = Machine::new(MEMORY_SIZE);
    machine
        .vm
        .map_pages(0, MEMORY_SIZE as u64, Permissions::READ | Permissions::WRITE | Permissions::EXECUTE)
        .unwrap();
    HostEnvironment::write_guest(machine.vm.as_mut(), 0, &[0xff, 0xff, 0xff, 0xff]);
    machine.boot();
    let pid = machine.spawn_root_process().unwrap();
    machine.vm.set_entry(0);

    let outcome = machine.run_steps(1);

    assert_eq!(outcome, RunOutcome::Halted { exit_status: 130 });
    assert_eq!(machine.vm.state(), VmState::Errored);
    assert_eq!(machine.vm.exception_stats.count(ExceptionCause::IllegalInstruction), 1);
    assert_eq!(machine.kernel.process_table.is_exited(pid), Some(130));
    assert_eq!(machine.kernel.scheduler.current(), kernel::types::NO_PID);
}

#[test]
fn breakpoint_is_non_fatal_and_resumes_running() {
    let mut machine = Machine::new(MEMORY_SIZE);
    machine
        .vm
        .map_pages(0, MEMORY_SIZE as u64, Permissions::READ | Permissions::WRITE | Permissions::EXECUTE)
        .unwrap();
    // ebreak; addi x1, x0, 42
    HostEnvironment::write_guest(machine.vm.as_mut(), 0, &[0x73, 0x00, 0x10, 0x00]);
    HostEnvironment::write_guest(machine.vm.as_mut(), 4, &[0x93, 0x00, 0xa0, 0x02]);
    machine.boot();
    machine.spawn_root_process().unwrap();
    machine.vm.set_entry(0);

    let outcome = machine.run_steps(2);

    assert_eq!(outcome, RunOutcome::StepLimitReached);
    assert_eq!(machine.vm.state(), VmState::Running);
    assert_eq!(machine.vm.registers().get(1), 42);
    assert_eq!(
        machine.vm.exception_stats.count(ExceptionCause::Breakpoint),
        1
    );
}

#[test]
fn snapshot_round_trip_restores_registers_and_stats() {
    let mut vm = executable_vm();
    HostEnvironment::write_guest(&mut vm, 0, &[0x93, 0x00, 0xa0, 0x02]); // addi x1, x0, 42
    vm.set_entry(0);
    vm.step();

    let snapshot = vm.snapshot();
    let exception_total_at_snapshot = snapshot.exception_total();
    let state_at_snapshot = snapshot.state();

    // step a faulting instruction after the snapshot, then restore: the
    // inflated exception count and errored state must not survive restore.
    HostEnvironment::write_guest(&mut vm, 4, &[0xff, 0xff, 0xff, 0xff]);
    vm.step();
    assert_eq!(vm.state(), VmState::Errored);
    assert_eq!(vm.exception_stats.total(), exception_total_at_snapshot + 1);

    vm.registers_mut().set(1, 100);
    vm.registers_mut().pc = 4;

    assert!(vm.restore(&snapshot));
    assert_eq!(vm.registers().get(1), 42);
    assert_eq!(vm.registers().pc, 4);
    assert_eq!(vm.exception_stats.total(), exception_total_at_snapshot);
    assert_eq!(vm.state(), state_at_snapshot);
}
