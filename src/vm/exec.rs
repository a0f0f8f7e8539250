//! Instruction execution (spec §4.3). Consumes a decoded `Instruction` and
//! mutates registers/memory/PC, surfacing any fault as the exception cause
//! the trap dispatcher understands.

use kernel::exception::ExceptionCause;

use super::decode::Instruction;
use super::memory::{GuestMemory, MemoryFault};
use super::pagetable::PageTable;
use super::registers::RegisterFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Ecall,
    Trap(ExceptionCause),
}

fn fault_to_cause(fault: MemoryFault, is_store: bool, is_fetch: bool) -> ExceptionCause {
    match (fault, is_fetch, is_store) {
        (MemoryFault::Unaligned, true, _) => ExceptionCause::InstructionAddressMisaligned,
        (MemoryFault::Unaligned, false, true) => ExceptionCause::StoreAddressMisaligned,
        (MemoryFault::Unaligned, false, false) => ExceptionCause::LoadAddressMisaligned,
        (MemoryFault::OutOfBounds, true, _) | (MemoryFault::PermissionDenied, true, _) => {
            ExceptionCause::InstructionAccessFault
        }
        (MemoryFault::OutOfBounds, false, true) | (MemoryFault::PermissionDenied, false, true) => {
            ExceptionCause::StoreAccessFault
        }
        (MemoryFault::OutOfBounds, false, false) | (MemoryFault::PermissionDenied, false, false) => {
            ExceptionCause::LoadAccessFault
        }
    }
}

/// Fetch, decode, and execute one instruction, advancing `regs.pc` unless a
/// control-flow instruction (branch/jump) set it explicitly.
pub fn step(
    regs: &mut RegisterFile,
    memory: &mut GuestMemory,
    table: &PageTable,
) -> StepOutcome {
    let pc = regs.pc;
    let word = match memory.fetch_instruction(table, pc) {
        Ok(word) => word,
        Err(fault) => return StepOutcome::Trap(fault_to_cause(fault, false, true)),
    };

    let instruction = super::decode::decode(word);
    let mut next_pc = pc.wrapping_add(4);

    let outcome = match instruction {
        Instruction::Lui { rd, imm } => {
            regs.set(rd, imm as i64 as u64);
            StepOutcome::Continue
        }
        Instruction::Auipc { rd, imm } => {
            regs.set(rd, pc.wrapping_add(imm as i64 as u64));
            StepOutcome::Continue
        }
        Instruction::Jal { rd, imm } => {
            regs.set(rd, next_pc);
            next_pc = pc.wrapping_add(imm as i64 as u64);
            StepOutcome::Continue
        }
        Instruction::Jalr { rd, rs1, imm } => {
            let target = regs.get(rs1).wrapping_add(imm as i64 as u64) & !1u64;
            regs.set(rd, next_pc);
            next_pc = target;
            StepOutcome::Continue
        }
        Instruction::Branch { funct3, rs1, rs2, imm } => {
            let a = regs.get(rs1);
            let b = regs.get(rs2);
            let taken = match funct3 {
                0x0 => a == b,
                0x1 => a != b,
                0x4 => (a as i64) < (b as i64),
                0x5 => (a as i64) >= (b as i64),
                0x6 => a < b,
                0x7 => a >= b,
                _ => false,
            };
            if taken {
                next_pc = pc.wrapping_add(imm as i64 as u64);
            }
            StepOutcome::Continue
        }
        Instruction::Load { funct3, rd, rs1, imm } => {
            let addr = regs.get(rs1).wrapping_add(imm as i64 as u64);
            let loaded = match funct3 {
                0x0 => memory.load8(table, addr).map(|v| v as i8 as i64 as u64),
                0x1 => memory.load16(table, addr).map(|v| v as i16 as i64 as u64),
                0x2 => memory.load32(table, addr).map(|v| v as i32 as i64 as u64),
                0x3 => memory.load64(table, addr),
                0x4 => memory.load8(table, addr).map(|v| v as u64),
                0x5 => memory.load16(table, addr).map(|v| v as u64),
                0x6 => memory.load32(table, addr).map(|v| v as u64),
                _ => return StepOutcome::Trap(ExceptionCause::IllegalInstruction),
            };
            match loaded {
                Ok(value) => {
                    regs.set(rd, value);
                    StepOutcome::Continue
                }
                Err(fault) => return StepOutcome::Trap(fault_to_cause(fault, false, false)),
            }
        }
        Instruction::Store { funct3, rs1, rs2, imm } => {
            let addr = regs.get(rs1).wrapping_add(imm as i64 as u64);
            let value = regs.get(rs2);
            let result = match funct3 {
                0x0 => memory.store8(table, addr, value as u8),
                0x1 => memory.store16(table, addr, value as u16),
                0x2 => memory.store32(table, addr, value as u32),
                0x3 => memory.store64(table, addr, value),
                _ => return StepOutcome::Trap(ExceptionCause::IllegalInstruction),
            };
            match result {
                Ok(()) => StepOutcome::Continue,
                Err(fault) => return StepOutcome::Trap(fault_to_cause(fault, true, false)),
            }
        }
        Instruction::OpImm { funct3, funct7, rd, rs1, imm } => {
            let a = regs.get(rs1);
            let value = match funct3 {
                0x0 => a.wrapping_add(imm as i64 as u64),
                0x1 => a << (imm & 0x3f),
                0x2 => ((a as i64) < (imm as i64)) as u64,
                0x3 => (a < (imm as i64 as u64)) as u64,
                0x4 => a ^ (imm as i64 as u64),
                0x5 if funct7 & 0x20 != 0 => ((a as i64) >> (imm & 0x3f)) as u64,
                0x5 => a >> (imm & 0x3f),
                0x6 => a | (imm as i64 as u64),
                0x7 => a & (imm as i64 as u64),
                _ => return StepOutcome::Trap(ExceptionCause::IllegalInstruction),
            };
            regs.set(rd, value);
            StepOutcome::Continue
        }
        Instruction::OpImm32 { funct3, funct7, rd, rs1, imm } => {
            let a = regs.get(rs1) as u32;
            let value = match funct3 {
                0x0 => a.wrapping_add(imm as u32),
                0x1 => a << (imm & 0x1f),
                0x5 if funct7 & 0x20 != 0 => ((a as i32) >> (imm & 0x1f)) as u32,
                0x5 => a >> (imm & 0x1f),
                _ => return StepOutcome::Trap(ExceptionCause::IllegalInstruction),
            };
            regs.set(rd, value as i32 as i64 as u64);
            StepOutcome::Continue
        }
        Instruction::Op { funct3, funct7, rd, rs1, rs2 } => {
            let a = regs.get(rs1);
            let b = regs.get(rs2);
            let value = match (funct3, funct7) {
                (0x0, 0x00) => a.wrapping_add(b),
                (0x0, 0x20) => a.wrapping_sub(b),
                (0x0, 0x01) => a.wrapping_mul(b),
                (0x1, 0x00) => a << (b & 0x3f),
                (0x2, 0x00) => ((a as i64) < (b as i64)) as u64,
                (0x3, 0x00) => (a < b) as u64,
                (0x4, 0x00) => a ^ b,
                (0x4, 0x01) if b != 0 => ((a as i64).wrapping_div(b as i64)) as u64,
                (0x5, 0x00) => a >> (b & 0x3f),
                (0x5, 0x20) => ((a as i64) >> (b & 0x3f)) as u64,
                (0x5, 0x01) if b != 0 => a.wrapping_div(b),
                (0x6, 0x00) => a | b,
                (0x6, 0x01) if b != 0 => ((a as i64).wrapping_rem(b as i64)) as u64,
                (0x7, 0x00) => a & b,
                (0x7, 0x01) if b != 0 => a.wrapping_rem(b),
                (_, 0x01) => u64::MAX, // division/remainder by zero per RISC-V M spec
                _ => return StepOutcome::Trap(ExceptionCause::IllegalInstruction),
            };
            regs.set(rd, value);
            StepOutcome::Continue
        }
        Instruction::Op32 { funct3, funct7, rd, rs1, rs2 } => {
            let a = regs.get(rs1) as u32;
            let b = regs.get(rs2) as u32;
            let value = match (funct3, funct7) {
                (0x0, 0x00) => a.wrapping_add(b),
                (0x0, 0x20) => a.wrapping_sub(b),
                (0x0, 0x01) => a.wrapping_mul(b),
                _ => return StepOutcome::Trap(ExceptionCause::IllegalInstruction),
            };
            regs.set(rd, value as i32 as i64 as u64);
            StepOutcome::Continue
        }
        Instruction::Fence => StepOutcome::Continue,
        Instruction::Ecall => StepOutcome::Ecall,
        Instruction::Ebreak => return StepOutcome::Trap(ExceptionCause::Breakpoint),
        Instruction::Illegal(_) => return StepOutcome::Trap(ExceptionCause::IllegalInstruction),
    };

    regs.pc = next_pc;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::env::Permissions;

    fn setup(program: &[u8]) -> (RegisterFile, GuestMemory, PageTable) {
        let mut mem = GuestMemory::new(0x10000);
        let mut table = PageTable::new();
        table
            .map(0, 0x10000, Permissions::READ | Permissions::WRITE | Permissions::EXECUTE)
            .unwrap();
        mem.write_raw(0, program);
        (RegisterFile::new(0), mem, table)
    }

    #[test]
    fn addi_sets_register_and_advances_pc() {
        let (mut regs, mut mem, table) = setup(&[0x93, 0x00, 0xa0, 0x02]);
        let outcome = step(&mut regs, &mut mem, &table);
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(regs.get(1), 42);
        assert_eq!(regs.pc, 4);
    }

    #[test]
    fn ecall_is_surfaced_without_advancing_registers() {
        let (mut regs, mut mem, table) = setup(&[0x73, 0x00, 0x00, 0x00]);
        let outcome = step(&mut regs, &mut mem, &table);
        assert_eq!(outcome, StepOutcome::Ecall);
    }

    #[test]
    fn illegal_word_traps() {
        let (mut regs, mut mem, table) = setup(&[0xff, 0xff, 0xff, 0xff]);
        let outcome = step(&mut regs, &mut mem, &table);
        assert_eq!(outcome, StepOutcome::Trap(ExceptionCause::IllegalInstruction));
    }

    #[test]
    fn jal_sets_link_register_and_jumps() {
        // jal x1, 8
        let (mut regs, mut mem, table) = setup(&[0xef, 0x00, 0x80, 0x00]);
        let outcome = step(&mut regs, &mut mem, &table);
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(regs.get(1), 4);
        assert_eq!(regs.pc, 8);
    }
}
