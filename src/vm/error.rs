//! Error type for the loader and VM setup paths (spec §4.2).
//!
//! Shape follows the teacher's `src/vm/error.rs`: a thiserror enum with
//! `#[from]` conversions at the I/O and parse boundaries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read executable: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse ELF image: {0}")]
    Parse(#[from] goblin::error::Error),

    #[error("executable is not a 64-bit RISC-V ELF")]
    UnsupportedFormat,

    #[error("program header describes a segment outside guest memory bounds")]
    SegmentOutOfBounds,

    #[error("guest memory size must be nonzero and a multiple of the page size")]
    InvalidMemorySize,
}
