//! Exception counters and the bounded error log the trap dispatcher writes
//! to (spec §3 "ExceptionStats", "ErrorLog", §4.4).

use crate::exception::ExceptionCause;
use crate::types::{ERROR_LOG_CAPACITY, ERROR_MESSAGE_LEN, EXCEPTION_CODE_COUNT};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionStats {
    counts: [u64; EXCEPTION_CODE_COUNT],
    total: u64,
}

impl ExceptionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, cause: ExceptionCause) {
        self.counts[cause.code() as usize] += 1;
        self.total += 1;
    }

    pub fn count(&self, cause: ExceptionCause) -> u64 {
        self.counts[cause.code() as usize]
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Zero every counter. Idempotent: resetting an already-reset instance
    /// leaves it unchanged.
    pub fn reset(&mut self) {
        self.counts = [0; EXCEPTION_CODE_COUNT];
        self.total = 0;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorLogEntry {
    pub cause: ExceptionCause,
    pub pid: u32,
    pub pc: u64,
    len: usize,
    message: [u8; ERROR_MESSAGE_LEN],
}

impl ErrorLogEntry {
    pub fn message(&self) -> &str {
        core::str::from_utf8(&self.message[..self.len]).unwrap_or("")
    }
}

/// Fixed-capacity ring buffer; the oldest entry is overwritten once full, so
/// a log that never stops growing can't be used to exhaust memory. `total`
/// keeps counting past `ERROR_LOG_CAPACITY` (spec §3: "running total is
/// preserved even after the ring overwrites"), independent of how many
/// entries the ring can still show.
#[derive(Clone)]
pub struct ErrorLog {
    entries: [Option<ErrorLogEntry>; ERROR_LOG_CAPACITY],
    next: usize,
    len: usize,
    total: u64,
}

impl ErrorLog {
    pub fn new() -> Self {
        const NONE: Option<ErrorLogEntry> = None;
        Self {
            entries: [NONE; ERROR_LOG_CAPACITY],
            next: 0,
            len: 0,
            total: 0,
        }
    }

    pub fn push(&mut self, cause: ExceptionCause, pid: u32, pc: u64, message: &str) {
        let bytes_in = message.as_bytes();
        let take = bytes_in.len().min(ERROR_MESSAGE_LEN);
        let mut message_buf = [0u8; ERROR_MESSAGE_LEN];
        message_buf[..take].copy_from_slice(&bytes_in[..take]);

        self.entries[self.next] = Some(ErrorLogEntry {
            cause,
            pid,
            pc,
            len: take,
            message: message_buf,
        });
        self.next = (self.next + 1) % ERROR_LOG_CAPACITY;
        self.len = (self.len + 1).min(ERROR_LOG_CAPACITY);
        self.total += 1;
    }

    /// Number of entries the ring currently retains (caps at
    /// `ERROR_LOG_CAPACITY`).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Every entry ever pushed, including ones the ring has since overwritten.
    pub fn total_pushed(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Oldest-first iteration over currently retained entries.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorLogEntry> {
        let start = if self.len == ERROR_LOG_CAPACITY { self.next } else { 0 };
        (0..self.len).map(move |i| {
            self.entries[(start + i) % ERROR_LOG_CAPACITY]
                .as_ref()
                .expect("slot within len must be populated")
        })
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}
