//! Bounds and identifiers shared across kernel subsystems.

pub type Pid = u32;
pub type ChannelId = u32;
pub type FileId = u32;

/// Process 0 means "none" throughout the process table and scheduler.
pub const NO_PID: Pid = 0;
pub const MAX_PROCESSES: usize = 16;

pub const MAX_CHANNELS: usize = 64;
pub const CHANNEL_QUEUE_CAPACITY: usize = 32;
pub const MAX_MESSAGE_SIZE: usize = 256;

pub const MAX_FILES: usize = 64;
pub const MAX_DIRECTORIES: usize = 16;
pub const MAX_FILE_SIZE: usize = 64 * 1024;
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_DIR_CHILDREN: usize = 32;

pub const PAGE_SIZE: u64 = 4096;
pub const MAX_PAGE_TABLE_ENTRIES: usize = 1024;

pub const ERROR_LOG_CAPACITY: usize = 256;
pub const ERROR_MESSAGE_LEN: usize = 63;
pub const EXCEPTION_CODE_COUNT: usize = 16;

/// RISC-V interrupt source IDs (mcause low bits with the interrupt bit set).
pub const INTERRUPT_SOFTWARE: u32 = 1;
pub const INTERRUPT_TIMER: u32 = 5;
pub const INTERRUPT_EXTERNAL: u32 = 9;
