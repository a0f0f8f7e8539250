//! The trap dispatcher (spec §4.4): classifies a raised exception against
//! the fatal/non-fatal policy table in `exception.rs`, records it, and
//! either terminates the current process or lets it resume.

use log::warn;

use crate::diag::{ErrorLog, ExceptionStats};
use crate::exception::ExceptionCause;
use crate::process::ProcessTable;
use crate::scheduler::Scheduler;
use crate::types::Pid;

/// What the embedding loop should do with the guest after a trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Non-fatal: the process resumes at the instruction following the
    /// trapping one (or wherever the caller's PC logic dictates).
    Resume,
    /// Fatal: `pid` was terminated with the given exit status
    /// (128 + exception code, matching the conventional signal-exit
    /// encoding).
    Terminated { pid: Pid, exit_status: i32 },
}

/// Handle a non-ecall exception raised while `pid` was running.
///
/// Never takes a VM reference: memory/PC state the caller needs to act on
/// (e.g. advancing or not advancing PC) stays the caller's responsibility,
/// per the "pass collaborators in, don't store them" design.
pub fn handle_exception(
    cause: ExceptionCause,
    pid: Pid,
    pc: u64,
    process_table: &mut ProcessTable,
    scheduler: &mut Scheduler,
    stats: &mut ExceptionStats,
    error_log: &mut ErrorLog,
) -> TrapOutcome {
    stats.record(cause);

    if cause.is_fatal() {
        let exit_status = 128 + cause.code() as i32;
        warn!(
            "process {pid} terminated by fatal trap {:?} at pc={pc:#x}, exit_status={exit_status}",
            cause
        );
        error_log.push(cause, pid, pc, "fatal trap");
        process_table.exit(pid, exit_status);
        scheduler.clear_current();
        TrapOutcome::Terminated { pid, exit_status }
    } else {
        error_log.push(cause, pid, pc, "non-fatal trap");
        TrapOutcome::Resume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (ProcessTable, Scheduler, ExceptionStats, ErrorLog) {
        (
            ProcessTable::new(),
            Scheduler::new(),
            ExceptionStats::new(),
            ErrorLog::new(),
        )
    }

    #[test]
    fn fatal_trap_terminates_and_clears_scheduler() {
        let (mut table, mut scheduler, mut stats, mut log) = fresh();
        let pid = table.spawn(0, 0, 0).unwrap();
        scheduler.set_current(pid);

        let outcome = handle_exception(
            ExceptionCause::IllegalInstruction,
            pid,
            0x1000,
            &mut table,
            &mut scheduler,
            &mut stats,
            &mut log,
        );

        assert_eq!(
            outcome,
            TrapOutcome::Terminated { pid, exit_status: 130 }
        );
        assert_eq!(table.is_exited(pid), Some(130));
        assert_eq!(scheduler.current(), crate::types::NO_PID);
        assert_eq!(stats.count(ExceptionCause::IllegalInstruction), 1);
    }

    #[test]
    fn non_fatal_trap_resumes_without_touching_process_table() {
        let (mut table, mut scheduler, mut stats, mut log) = fresh();
        let pid = table.spawn(0, 0, 0).unwrap();
        scheduler.set_current(pid);

        let outcome = handle_exception(
            ExceptionCause::Breakpoint,
            pid,
            0x2000,
            &mut table,
            &mut scheduler,
            &mut stats,
            &mut log,
        );

        assert_eq!(outcome, TrapOutcome::Resume);
        assert!(table.is_exited(pid).is_none());
        assert_eq!(scheduler.current(), pid);
        assert_eq!(log.len(), 1);
    }
}
