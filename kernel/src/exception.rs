//! RISC-V exception causes and the fatal/non-fatal policy table (spec §4.4,
//! §7). Kept as a data table rather than a hand-written switch, per the
//! redesign flag in spec §9 ("keep it testable in isolation").

/// The 16 RISC-V exception codes this core can raise. Numeric identity is
/// part of the ABI and must not change.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCause {
    InstructionAddressMisaligned = 0,
    InstructionAccessFault = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadAddressMisaligned = 4,
    LoadAccessFault = 5,
    StoreAddressMisaligned = 6,
    StoreAccessFault = 7,
    EnvironmentCallFromUMode = 8,
    EnvironmentCallFromSMode = 9,
    InstructionPageFault = 12,
    LoadPageFault = 13,
    StorePageFault = 15,
}

impl ExceptionCause {
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether the trap dispatcher terminates the running process for this
    /// cause. `instruction_address_misaligned` is deliberately classified as
    /// non-fatal here — spec §9's open question notes the source treats it
    /// inconsistently; this implementation picks "non-fatal, recorded,
    /// resumed" and documents the choice rather than silently varying it.
    pub const fn is_fatal(self) -> bool {
        !matches!(
            self,
            ExceptionCause::Breakpoint
                | ExceptionCause::EnvironmentCallFromUMode
                | ExceptionCause::EnvironmentCallFromSMode
                | ExceptionCause::InstructionAddressMisaligned
        )
    }

    /// `environment_call_*` is not an error path at all: it is handed to the
    /// syscall layer instead of being recorded/resumed by the trap
    /// dispatcher.
    pub const fn is_environment_call(self) -> bool {
        matches!(
            self,
            ExceptionCause::EnvironmentCallFromUMode | ExceptionCause::EnvironmentCallFromSMode
        )
    }
}
