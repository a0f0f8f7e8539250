//! The ABI-facing error sum type syscalls return to the guest (spec §7).
//!
//! Kernel-internal code propagates this with `?` like any other error; the
//! numeric `(a0, a1)` encoding only happens at the syscall boundary, mirroring
//! the teacher's `memory_errno` mapping in `syscall/handlers.rs`.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("would block")]
    WouldBlock,
    #[error("out of resources")]
    OutOfResources,
    #[error("unsupported")]
    Unsupported,
}

/// The syscall layer's return value before ABI encoding: a tagged sum, never
/// a raw integer, per the redesign flag in spec §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallResult {
    Success(u64),
    Error(ErrorKind),
}

impl SyscallResult {
    pub fn ok(value: u64) -> Self {
        SyscallResult::Success(value)
    }

    pub fn err(kind: ErrorKind) -> Self {
        SyscallResult::Error(kind)
    }

    /// Encode into the (a0, a1) register convention: a1 = 0 success / 1
    /// error; a0 carries the payload (success value, or the error code).
    pub fn encode(self) -> (u64, u64) {
        match self {
            SyscallResult::Success(value) => (value, 0),
            SyscallResult::Error(kind) => (kind as u64, 1),
        }
    }
}

impl From<Result<u64, ErrorKind>> for SyscallResult {
    fn from(result: Result<u64, ErrorKind>) -> Self {
        match result {
            Ok(value) => SyscallResult::Success(value),
            Err(kind) => SyscallResult::Error(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_encodes_tag_zero() {
        assert_eq!(SyscallResult::ok(42).encode(), (42, 0));
    }

    #[test]
    fn error_encodes_tag_one() {
        assert_eq!(
            SyscallResult::err(ErrorKind::NotFound).encode(),
            (ErrorKind::NotFound as u64, 1)
        );
    }
}
