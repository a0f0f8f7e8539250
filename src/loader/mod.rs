//! Boot loader: reads an ELF64 RISC-V executable from the host filesystem
//! and loads it into a fresh `Machine` (spec §4.2's loading contract).
//!
//! Direct descendant of the teacher's `src/bin/cmd/run.rs` + `Vm::load_elf`
//! pair: read the file into a `Vec<u8>`, hand the contiguous slice to
//! `goblin`-backed parsing, no guest-pointer indirection involved since
//! this is the one place a full host byte slice is naturally available.

use std::fs;
use std::path::Path;

use crate::machine::Machine;
use crate::vm::error::Error;

pub fn boot_from_path(path: &Path, memory_size: usize) -> Result<Machine, Error> {
    let image = fs::read(path)?;
    let mut machine = Machine::new(memory_size);
    machine.vm.load_elf(&image)?;
    machine.boot();
    machine.spawn_root_process();
    Ok(machine)
}
