//! Minimal ELF64 header + program-header reader used by `spawn` (spec
//! §4.2's loading contract, applied inside the kernel rather than at the
//! boot loader).
//!
//! The boot loader (root crate) owns a full `goblin`-based parse because it
//! holds a contiguous host byte slice. `spawn` only ever gets a guest
//! pointer, so this reads the ELF64 header and program header table it
//! needs through `HostEnvironment::read_guest` field by field instead of
//! pulling in a parser built for contiguous slices.

use crate::env::{HostEnvironment, Permissions};
use crate::error::ErrorKind;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const EM_RISCV: u16 = 243;

const E_MACHINE_OFFSET: u64 = 18;
const E_ENTRY_OFFSET: u64 = 24;
const E_PHOFF_OFFSET: u64 = 32;
const E_PHENTSIZE_OFFSET: u64 = 54;
const E_PHNUM_OFFSET: u64 = 56;

const PT_LOAD: u32 = 1;
const MAX_PROGRAM_HEADERS: u16 = 64;

/// One `PT_LOAD` entry, already translated into guest permissions (spec
/// §6's ELF image contract: PF_R/PF_W/PF_X → read/write/execute).
#[derive(Debug, Clone, Copy)]
pub struct LoadSegment {
    pub vaddr: u64,
    pub offset: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub perms: Permissions,
}

pub struct ElfImage {
    pub entry: u64,
    pub segments: Vec<LoadSegment>,
}

fn read_u16(host: &dyn HostEnvironment, addr: u64) -> Result<u16, ErrorKind> {
    let mut buf = [0u8; 2];
    if !host.read_guest(addr, &mut buf) {
        return Err(ErrorKind::InvalidArgument);
    }
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(host: &dyn HostEnvironment, addr: u64) -> Result<u32, ErrorKind> {
    let mut buf = [0u8; 4];
    if !host.read_guest(addr, &mut buf) {
        return Err(ErrorKind::InvalidArgument);
    }
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(host: &dyn HostEnvironment, addr: u64) -> Result<u64, ErrorKind> {
    let mut buf = [0u8; 8];
    if !host.read_guest(addr, &mut buf) {
        return Err(ErrorKind::InvalidArgument);
    }
    Ok(u64::from_le_bytes(buf))
}

/// Parse the ELF64 header and `PT_LOAD` program headers at `image_ptr` in
/// guest memory (spec §6's ELF image contract; spec §4.5's `spawn` is given
/// only a guest pointer, no length, so every field is read directly off the
/// header rather than validated against a caller-supplied size). Non-
/// `PT_LOAD` entries are ignored but do not abort parsing; zero program
/// headers is accepted.
pub fn parse_elf_image(host: &dyn HostEnvironment, image_ptr: u64) -> Result<ElfImage, ErrorKind> {
    let mut magic = [0u8; 4];
    if !host.read_guest(image_ptr, &mut magic) {
        return Err(ErrorKind::InvalidArgument);
    }
    if magic != ELF_MAGIC {
        return Err(ErrorKind::InvalidArgument);
    }

    let mut class = [0u8; 1];
    if !host.read_guest(image_ptr + 4, &mut class) {
        return Err(ErrorKind::InvalidArgument);
    }
    if class[0] != ELFCLASS64 {
        return Err(ErrorKind::Unsupported);
    }

    if read_u16(host, image_ptr + E_MACHINE_OFFSET)? != EM_RISCV {
        return Err(ErrorKind::Unsupported);
    }

    let entry = read_u64(host, image_ptr + E_ENTRY_OFFSET)?;
    let phoff = read_u64(host, image_ptr + E_PHOFF_OFFSET)?;
    let phentsize = read_u16(host, image_ptr + E_PHENTSIZE_OFFSET)?;
    let phnum = read_u16(host, image_ptr + E_PHNUM_OFFSET)?;

    if phnum > MAX_PROGRAM_HEADERS {
        return Err(ErrorKind::Unsupported);
    }

    let mut segments = Vec::with_capacity(phnum as usize);
    for i in 0..phnum as u64 {
        let phdr_addr = image_ptr
            .checked_add(phoff)
            .and_then(|base| base.checked_add(i * phentsize as u64))
            .ok_or(ErrorKind::InvalidArgument)?;

        let p_type = read_u32(host, phdr_addr)?;
        if p_type != PT_LOAD {
            continue;
        }
        let p_flags = read_u32(host, phdr_addr + 4)?;
        let p_offset = read_u64(host, phdr_addr + 8)?;
        let p_vaddr = read_u64(host, phdr_addr + 16)?;
        let p_filesz = read_u64(host, phdr_addr + 32)?;
        let p_memsz = read_u64(host, phdr_addr + 40)?;

        segments.push(LoadSegment {
            vaddr: p_vaddr,
            offset: p_offset,
            filesz: p_filesz,
            memsz: p_memsz,
            perms: Permissions::from_elf_flags(p_flags),
        });
    }

    Ok(ElfImage { entry, segments })
}
