//! RV64 sandbox: a software RISC-V interpreter paired with a host-side
//! microkernel that mediates every guest environment call (spec.md §1-§2).
//!
//! This crate owns the half of the system the teacher's `hostel` calls the
//! VMM: the interpreter (`vm`), the ELF boot loader (`loader`), and the
//! embedding loop that wires VM traps into kernel syscalls (`machine`).
//! Everything under spec.md §2's `Kernel.*` components lives in the
//! separate `kernel` path crate, kept dependency-free of this one per the
//! one-way-ownership redesign flag in spec.md §9.

pub mod loader;
pub mod machine;
pub mod vm;
