//! The syscall layer (spec §4.5): numeric call IDs plus a pure dispatch
//! function.
//!
//! Grounded directly on the teacher's `kernel/src/syscall/mod.rs` +
//! `handlers.rs`: a flat `SYS_*` constant table and a single
//! `__syscall_dispatch(nr, args...) -> SyscallResult` function that is
//! trivially unit-testable without booting anything, matching the teacher's
//! own `unsupported_syscall_returns_enosys` / `write_rejects_unknown_fd`
//! style tests below.

use crate::channel::ChannelTable;
use crate::elf::parse_elf_image;
use crate::env::{HostEnvironment, Permissions};
use crate::error::{ErrorKind, SyscallResult};
use crate::process::ProcessTable;
use crate::scheduler::Scheduler;
use crate::storage::Storage;
use crate::timer::Timer;
use crate::types::{MAX_MESSAGE_SIZE, MAX_NAME_LEN, PAGE_SIZE, Pid};

/// File-open flags bitset (spec §4.5): read=1, write=2, create=4, truncate=8.
/// `create` is the only bit this kernel's flat `Storage` needs to act on — an
/// existing file is always opened read/write regardless of the read/write
/// bits, matching `Storage`'s lack of per-handle access modes.
const FILE_FLAG_CREATE: u64 = 0x4;

pub const SYS_SPAWN: u64 = 1;
pub const SYS_EXIT: u64 = 2;
pub const SYS_WAIT: u64 = 3;
pub const SYS_MAP: u64 = 4;
pub const SYS_CHANNEL_CREATE: u64 = 20;
pub const SYS_FILE_OPEN: u64 = 30;
pub const SYS_FILE_READ: u64 = 31;
pub const SYS_FILE_WRITE: u64 = 32;
pub const SYS_FILE_DELETE: u64 = 33;
pub const SYS_CHANNEL_SEND: u64 = 81;
pub const SYS_CHANNEL_RECV: u64 = 82;
pub const SYS_CLOCK_GETTIME: u64 = 90;
pub const SYS_SLEEP_UNTIL: u64 = 91;
pub const SYS_READ_INPUT_EVENT: u64 = 92;

/// Every piece of kernel state a syscall might touch, borrowed for the
/// duration of one dispatch call. No field here is ever stored — the
/// embedding loop owns all of it and hands it in fresh each trap.
pub struct SyscallContext<'a> {
    pub current_pid: Pid,
    pub process_table: &'a mut ProcessTable,
    pub scheduler: &'a mut Scheduler,
    pub channels: &'a mut ChannelTable,
    pub storage: &'a mut Storage,
    pub timer: &'a mut Timer,
    pub host: &'a mut dyn HostEnvironment,
}

/// Dispatch one `ecall` trap. Pure given its inputs: same context and
/// arguments always produce the same result, which is what makes this
/// testable without a running VM.
pub fn dispatch(ctx: &mut SyscallContext, nr: u64, a0: u64, a1: u64, a2: u64, _a3: u64) -> SyscallResult {
    match nr {
        SYS_SPAWN => spawn(ctx, a0),
        SYS_EXIT => exit(ctx, a0),
        SYS_WAIT => wait(ctx, a0),
        SYS_MAP => map(ctx, a0, a1, a2),
        SYS_CHANNEL_CREATE => channel_create(ctx),
        SYS_CHANNEL_SEND => channel_send(ctx, a0, a1, a2),
        SYS_CHANNEL_RECV => channel_recv(ctx, a0, a1, a2),
        SYS_FILE_WRITE => file_write(ctx, a0, a1, a2),
        SYS_FILE_READ => file_read(ctx, a0, a1, a2),
        SYS_CLOCK_GETTIME => clock_gettime(ctx, a0),
        SYS_SLEEP_UNTIL => {
            ctx.timer.set_timer(a0);
            SyscallResult::ok(0)
        }
        SYS_FILE_OPEN => file_open(ctx, a0, a1, a2),
        SYS_FILE_DELETE => file_delete(ctx, a0, a1),
        // No host input device exists in this reference configuration (spec
        // §4.5 only ties its contract to the Timer component, with no event
        // data model of its own); left unsupported rather than invented.
        SYS_READ_INPUT_EVENT => SyscallResult::err(ErrorKind::Unsupported),
        _ => SyscallResult::err(ErrorKind::Unsupported),
    }
}

/// A process's initial stack: one page, matching the single reserved stack
/// page the boot loader's `Vm::init_stack` gives the root process.
const STACK_SIZE: u64 = PAGE_SIZE;

fn round_up_to_page(value: u64) -> u64 {
    (value + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE
}

/// `a0` = pointer to an ELF image in guest memory. No length is passed
/// (spec §4.5: `spawn` takes only a guest pointer), so the image is read
/// field by field off its own ELF64 header by `parse_elf_image`.
///
/// Per spec §6's ELF contract: every `PT_LOAD` segment is mapped with its
/// translated R/W/X permissions, its file bytes are copied in, and the
/// `memsz - filesz` tail (BSS) is zeroed. A segment larger than
/// `MAX_FILE_SIZE` or one the page table rejects (e.g. overlapping an
/// existing mapping with different flags) fails the whole spawn before any
/// process-table slot is consumed. SP is kernel-computed: a fresh page
/// mapped just past the highest address any segment occupies, with the new
/// process's stack pointer set to its top.
fn spawn(ctx: &mut SyscallContext, image_ptr: u64) -> SyscallResult {
    let image = match parse_elf_image(ctx.host, image_ptr) {
        Ok(image) => image,
        Err(kind) => return SyscallResult::err(kind),
    };

    let mut image_end = 0u64;
    for segment in &image.segments {
        if segment.memsz as usize > crate::types::MAX_FILE_SIZE || segment.filesz > segment.memsz {
            return SyscallResult::err(ErrorKind::InvalidArgument);
        }

        if let Err(kind) = ctx.host.map_pages(segment.vaddr, segment.memsz.max(1), segment.perms) {
            return SyscallResult::err(kind);
        }

        if segment.filesz > 0 {
            let mut buf = vec![0u8; segment.filesz as usize];
            if !ctx.host.read_guest(image_ptr + segment.offset, &mut buf) {
                return SyscallResult::err(ErrorKind::InvalidArgument);
            }
            if !ctx.host.write_guest(segment.vaddr, &buf) {
                return SyscallResult::err(ErrorKind::InvalidArgument);
            }
        }

        if segment.memsz > segment.filesz {
            let bss_len = (segment.memsz - segment.filesz) as usize;
            let zeroes = vec![0u8; bss_len];
            if !ctx.host.write_guest(segment.vaddr + segment.filesz, &zeroes) {
                return SyscallResult::err(ErrorKind::InvalidArgument);
            }
        }

        image_end = image_end.max(segment.vaddr.saturating_add(segment.memsz));
    }

    let stack_base = round_up_to_page(image_end.max(1));
    if let Err(kind) = ctx.host.map_pages(stack_base, STACK_SIZE, Permissions::READ | Permissions::WRITE) {
        return SyscallResult::err(kind);
    }
    let stack_pointer = stack_base + STACK_SIZE;

    match ctx.process_table.spawn(image_ptr, image.entry, stack_pointer) {
        Some(pid) => SyscallResult::ok(pid as u64),
        None => SyscallResult::err(ErrorKind::OutOfResources),
    }
}

/// `a0` = base address, `a1` = size in bytes, `a2` = requested permission
/// flags (bit 0 = read, bit 1 = write, bit 2 = execute, matching
/// `Permissions`' bit layout). Mapping an already-mapped, identically-
/// flagged range is a no-op (spec §9); anything else that overlaps fails
/// `invalid_argument`.
fn map(ctx: &mut SyscallContext, base: u64, size: u64, flags: u64) -> SyscallResult {
    if size == 0 || flags > Permissions::all().bits() as u64 {
        return SyscallResult::err(ErrorKind::InvalidArgument);
    }
    let perms = Permissions::from_bits_truncate(flags as u8);
    match ctx.host.map_pages(base, size, perms) {
        Ok(()) => SyscallResult::ok(0),
        Err(kind) => SyscallResult::err(kind),
    }
}

/// `a0` = pointer to a UTF-8 path name in guest memory, `a1` = name length,
/// `a2` = flags bitset (spec §4.5: read=1, write=2, create=4, truncate=8).
/// Paths are flat names inside `Storage::ROOT` — this kernel has no nested
/// path-walking, only the two-level hierarchy `Storage` already exposes.
/// Looks the name up first; `create` makes a missing name rather than
/// failing `not_found`. Returns the resulting `FileId`.
fn file_open(ctx: &mut SyscallContext, name_ptr: u64, name_len: u64, flags: u64) -> SyscallResult {
    if name_len == 0 || name_len as usize > MAX_NAME_LEN {
        return SyscallResult::err(ErrorKind::InvalidArgument);
    }
    let mut buf = [0u8; MAX_NAME_LEN];
    let name_len = name_len as usize;
    if !ctx.host.read_guest(name_ptr, &mut buf[..name_len]) {
        return SyscallResult::err(ErrorKind::InvalidArgument);
    }
    let name = match core::str::from_utf8(&buf[..name_len]) {
        Ok(name) => name,
        Err(_) => return SyscallResult::err(ErrorKind::InvalidArgument),
    };

    if let Some(id) = ctx.storage.find_file(Storage::ROOT, name) {
        return SyscallResult::ok(id as u64);
    }
    if flags & FILE_FLAG_CREATE == 0 {
        return SyscallResult::err(ErrorKind::NotFound);
    }
    match ctx.storage.create_file(Storage::ROOT, name) {
        Ok(id) => SyscallResult::ok(id as u64),
        Err(kind) => SyscallResult::err(kind),
    }
}

/// `a0` = file ID, `a1` = pointer to the owning directory's name (unused by
/// this flat layout; every file lives directly under `Storage::ROOT`, so the
/// delete always targets `Storage::ROOT` and `a1` is reserved for a future
/// nested-directory design rather than read).
fn file_delete(ctx: &mut SyscallContext, file_id: u64, _reserved: u64) -> SyscallResult {
    match ctx.storage.delete_file(Storage::ROOT, file_id as u32) {
        Ok(()) => SyscallResult::ok(0),
        Err(kind) => SyscallResult::err(kind),
    }
}

fn exit(ctx: &mut SyscallContext, status: u64) -> SyscallResult {
    ctx.process_table.exit(ctx.current_pid, status as i32);
    ctx.scheduler.clear_current();
    SyscallResult::ok(0)
}

fn wait(ctx: &mut SyscallContext, pid_arg: u64) -> SyscallResult {
    let pid = pid_arg as Pid;
    match ctx.process_table.is_exited(pid) {
        Some(status) => SyscallResult::ok(status as u64),
        // non-blocking by design (spec redesign flag): a still-running or
        // unknown pid both report would_block rather than stalling the host.
        None => SyscallResult::err(ErrorKind::WouldBlock),
    }
}

fn channel_create(ctx: &mut SyscallContext) -> SyscallResult {
    match ctx.channels.create() {
        Ok(id) => SyscallResult::ok(id as u64),
        Err(kind) => SyscallResult::err(kind),
    }
}

fn channel_send(ctx: &mut SyscallContext, channel_id: u64, ptr: u64, len: u64) -> SyscallResult {
    if len > MAX_MESSAGE_SIZE as u64 {
        return SyscallResult::err(ErrorKind::InvalidArgument);
    }
    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    let len = len as usize;
    if !ctx.host.read_guest(ptr, &mut buf[..len]) {
        return SyscallResult::err(ErrorKind::InvalidArgument);
    }
    match ctx.channels.send(channel_id as u32, &buf[..len]) {
        Ok(()) => SyscallResult::ok(0),
        Err(kind) => SyscallResult::err(kind),
    }
}

fn channel_recv(ctx: &mut SyscallContext, channel_id: u64, ptr: u64, capacity: u64) -> SyscallResult {
    if capacity > MAX_MESSAGE_SIZE as u64 {
        return SyscallResult::err(ErrorKind::InvalidArgument);
    }
    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    let capacity = capacity as usize;
    match ctx.channels.receive(channel_id as u32, &mut buf[..capacity]) {
        Ok(len) => {
            if !ctx.host.write_guest(ptr, &buf[..len]) {
                return SyscallResult::err(ErrorKind::InvalidArgument);
            }
            SyscallResult::ok(len as u64)
        }
        Err(kind) => SyscallResult::err(kind),
    }
}

/// `a0` = file ID, `a1` = pointer to the bytes in guest memory, `a2` = their
/// length. Spec §4.5: `write` replaces the file's entire contents, silently
/// truncating to `MAX_FILE_SIZE` rather than failing if `len` overruns it.
fn file_write(ctx: &mut SyscallContext, file_id: u64, ptr: u64, len: u64) -> SyscallResult {
    let len = (len as usize).min(crate::types::MAX_FILE_SIZE);
    let mut buf = vec![0u8; len];
    if !ctx.host.read_guest(ptr, &mut buf) {
        return SyscallResult::err(ErrorKind::InvalidArgument);
    }
    match ctx.storage.write(file_id as u32, &buf) {
        Ok(n) => SyscallResult::ok(n as u64),
        Err(kind) => SyscallResult::err(kind),
    }
}

/// `a0` = file ID, `a1` = destination pointer in guest memory, `a2` =
/// destination capacity. Always reads from the start of the file's
/// contents; there is no offset in this flat read/write contract.
fn file_read(ctx: &mut SyscallContext, file_id: u64, ptr: u64, capacity: u64) -> SyscallResult {
    let capacity = (capacity as usize).min(crate::types::MAX_FILE_SIZE);
    let mut buf = vec![0u8; capacity];
    match ctx.storage.read(file_id as u32, &mut buf) {
        Ok(n) => {
            if !ctx.host.write_guest(ptr, &buf[..n]) {
                return SyscallResult::err(ErrorKind::InvalidArgument);
            }
            SyscallResult::ok(n as u64)
        }
        Err(kind) => SyscallResult::err(kind),
    }
}

fn clock_gettime(ctx: &mut SyscallContext, which: u64) -> SyscallResult {
    let value = if which == 0 {
        ctx.timer.monotonic_now_nanos()
    } else {
        ctx.timer.realtime_now_nanos()
    };
    SyscallResult::ok(value)
}
