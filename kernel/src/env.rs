//! The host/VM boundary the kernel talks through.
//!
//! Spec §9's redesign flag calls for replacing the teacher's global
//! `vm_memory_reader` function-pointer singleton with an explicit interface
//! passed into the kernel rather than stored on it. `HostEnvironment` is that
//! interface: the embedding loop (the root crate's `Machine`) holds the VM
//! and passes it in as `&mut dyn HostEnvironment` on every call that needs
//! guest memory or the page table, so this crate never depends on the `vm`
//! module and the kernel never carries a VM back-reference.

use bitflags::bitflags;

use crate::error::ErrorKind;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

impl Permissions {
    pub fn from_elf_flags(p_flags: u32) -> Self {
        let mut perms = Permissions::empty();
        if p_flags & 0x4 != 0 {
            perms |= Permissions::READ;
        }
        if p_flags & 0x2 != 0 {
            perms |= Permissions::WRITE;
        }
        if p_flags & 0x1 != 0 {
            perms |= Permissions::EXECUTE;
        }
        perms
    }
}

pub trait HostEnvironment {
    /// Copy `dst.len()` bytes from guest memory starting at `addr`. Returns
    /// `false` if any byte of the range is outside the buffer; `dst` is left
    /// unspecified on failure. Bounds-checked only — syscalls act on behalf
    /// of the kernel itself (e.g. loading a spawned process's segments before
    /// any page-table entry for them exists), so this bypasses the page-table
    /// permission checks the VM's own fetch/load/store path enforces for
    /// guest-issued instructions.
    fn read_guest(&self, addr: u64, dst: &mut [u8]) -> bool;

    /// Copy `src` into guest memory starting at `addr`. Returns `false` if
    /// any byte of the range is outside the buffer. Bounds-checked only, for
    /// the same reason as `read_guest`.
    fn write_guest(&mut self, addr: u64, src: &[u8]) -> bool;

    /// Insert a page-table entry covering `[base, base + size)`, rounded up
    /// to page boundaries. Conflicts with an existing entry unless the
    /// existing entry already has identical flags and identical bounds (spec
    /// §9: "map of an already-mapped range with identical flags is a
    /// no-op").
    fn map_pages(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), ErrorKind>;
}
