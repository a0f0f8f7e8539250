use std::fs;
use std::path::PathBuf;

use clap::Args;
use log::{info, warn};
use rvcage::loader;
use rvcage::machine::RunOutcome;

/// Default guest address space: 4 MiB, the standalone-VM reference
/// configuration from spec.md §3.
const DEFAULT_MEMORY_SIZE: usize = 4 * 1024 * 1024;
const DEFAULT_STEP_BUDGET: u64 = 10_000_000;

#[derive(Args)]
pub struct Cmd {
    /// Path to a statically-linked RV64 ELF executable.
    #[arg(short, long)]
    pub filepath: PathBuf,

    /// Guest memory size in bytes.
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE)]
    pub memory_size: usize,

    /// Maximum number of instructions to step before giving up.
    #[arg(long, default_value_t = DEFAULT_STEP_BUDGET)]
    pub max_steps: u64,

    /// Dump the VM's final registers + memory to this path once the run
    /// stops, for offline inspection (spec §4.11's snapshot captures what
    /// this flag writes out; the on-disk layout is this build's own debug
    /// dump, not a stable format per spec §6).
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,
}

impl Cmd {
    /// Boot the guest and run it to completion, returning the process exit
    /// status (or 1 if the step budget ran out without the guest halting).
    pub fn execute(&self) -> i32 {
        let mut machine = match loader::boot_from_path(&self.filepath, self.memory_size) {
            Ok(machine) => machine,
            Err(err) => {
                eprintln!("failed to load {}: {err}", self.filepath.display());
                return 1;
            }
        };

        let outcome = machine.run_steps(self.max_steps);

        if let Some(path) = &self.snapshot_out {
            let bytes = machine.vm.snapshot().to_bytes();
            if let Err(err) = fs::write(path, &bytes) {
                warn!("failed to write snapshot to {}: {err}", path.display());
            }
        }

        match outcome {
            RunOutcome::Halted { exit_status } => {
                info!("guest exited with status {exit_status}");
                exit_status
            }
            RunOutcome::NoRunnableProcess => {
                eprintln!("no runnable process remained");
                1
            }
            RunOutcome::StepLimitReached => {
                eprintln!("step budget of {} exhausted before the guest halted", self.max_steps);
                1
            }
        }
    }
}
