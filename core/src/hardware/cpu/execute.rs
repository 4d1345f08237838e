//! Instruction decode. Instead of a flat 256-entry table, the opcode is
//! split along the fields the instruction map is actually laid out by:
//! the top two bits select one of four blocks, and within a block the
//! row (`bits 5-3`) and column (`bits 2-0`) name the operation and its
//! operand. Register-pair rows additionally split the row into a pair
//! index (`bits 5-4`) and a variant bit (`bit 3`).
//!
//! Block 00 holds the miscellaneous loads and 16-bit arithmetic, block
//! 01 is the register-to-register load grid (with HALT in the hole where
//! `LD (HL),(HL)` would be), block 10 the eight-way ALU grid, and block
//! 11 control flow, stack traffic and the I/O-page loads.

use crate::hardware::cpu::registers::{Reg16, Reg8};
use crate::hardware::cpu::traits::ToU8;
use crate::hardware::cpu::CPU;
use crate::hardware::mmu::MemoryMapper;

impl<M: MemoryMapper> CPU<M> {
    pub fn execute(&mut self, opcode: u8) {
        match opcode >> 6 {
            0b00 => self.execute_misc_block(opcode),
            0b01 if opcode == 0x76 => self.halt(),
            0b01 => self.load_8bit(register_operand(row(opcode)), register_operand(column(opcode))),
            0b10 => self.alu_operation(row(opcode), register_operand(column(opcode))),
            _ => self.execute_control_block(opcode),
        }
    }

    /// Block 00: per column, the immediate/indirect loads, the 16-bit
    /// inc/dec/add rows, the relative jumps, and the accumulator/flag
    /// one-byte operations.
    fn execute_misc_block(&mut self, opcode: u8) {
        use crate::hardware::cpu::execute::InstructionAddress::*;
        let y = row(opcode);
        match column(opcode) {
            0 => match y {
                0 => self.nop(),
                1 => self.load_16bit(DirectMem, Reg16::SP),
                2 => self.stop(),
                3 => self.relative_jump(JumpModifier::Always),
                _ => self.relative_jump(condition(y - 4)),
            },
            1 if !variant_bit(opcode) => self.load_16bit(register_pair(pair(opcode)), Direct),
            1 => self.add16(register_pair(pair(opcode))),
            2 if !variant_bit(opcode) => self.load_8bit(indirect_pair(pair(opcode)), Reg8::A),
            2 => self.load_8bit(Reg8::A, indirect_pair(pair(opcode))),
            3 if !variant_bit(opcode) => self.increment16(register_pair(pair(opcode))),
            3 => self.decrement16(register_pair(pair(opcode))),
            4 => self.increment(register_operand(y)),
            5 => self.decrement(register_operand(y)),
            6 => self.load_8bit(register_operand(y), Direct),
            _ => match y {
                0 => self.rlca(),
                1 => self.rrca(),
                2 => self.rla(),
                3 => self.rra(),
                4 => self.daa(),
                5 => self.cpl(),
                6 => self.scf(),
                _ => self.ccf(),
            },
        }
    }

    /// Block 11: the conditional returns/jumps/calls live in rows 0-3 of
    /// their columns, the I/O-page and absolute loads in rows 4-7, and
    /// the eleven unassigned opcodes fall out of the gaps.
    fn execute_control_block(&mut self, opcode: u8) {
        use crate::hardware::cpu::execute::InstructionAddress::*;
        let y = row(opcode);
        match column(opcode) {
            0 => match y {
                0..=3 => self.ret(condition(y)),
                4 => self.load_8bit(IoDirect, Reg8::A),
                5 => self.add_sp(),
                6 => self.load_8bit(Reg8::A, IoDirect),
                _ => self.load_sp_i(),
            },
            1 if !variant_bit(opcode) => self.pop(register_pair_stack(pair(opcode))),
            1 => match pair(opcode) {
                0 => self.ret(JumpModifier::Always),
                1 => self.reti(),
                2 => self.jump_hl(),
                _ => self.load_sp_hl(),
            },
            2 => match y {
                0..=3 => self.jump(condition(y)),
                4 => self.load_8bit(IoC, Reg8::A),
                5 => self.load_8bit(DirectMem, Reg8::A),
                6 => self.load_8bit(Reg8::A, IoC),
                _ => self.load_8bit(Reg8::A, DirectMem),
            },
            3 => match y {
                0 => self.jump(JumpModifier::Always),
                1 => self.cb_prefix_call(),
                6 => self.di(),
                7 => self.ei(),
                _ => self.illegal_opcode(),
            },
            4 if y < 4 => self.call(condition(y)),
            4 => self.illegal_opcode(),
            5 if !variant_bit(opcode) => self.push(register_pair_stack(pair(opcode))),
            5 if pair(opcode) == 0 => self.call(JumpModifier::Always),
            5 => self.illegal_opcode(),
            6 => self.alu_operation(y, Direct),
            _ => self.rst(y * 8),
        }
    }

    /// The CB page is perfectly regular: the top two bits pick
    /// rotate/shift vs BIT/RES/SET, the row is the shift kind or the bit
    /// index, and the column is always the operand.
    pub fn execute_prefix(&mut self, opcode: u8) {
        let target = register_operand(column(opcode));
        let bit = row(opcode);

        match opcode >> 6 {
            0b00 => match bit {
                0 => self.rlc(target),
                1 => self.rrc(target),
                2 => self.rl(target),
                3 => self.rr(target),
                4 => self.sla(target),
                5 => self.sra(target),
                6 => self.swap(target),
                _ => self.srl(target),
            },
            0b01 => self.bit(bit, target),
            0b10 => self.res(bit, target),
            _ => self.set(bit, target),
        }
    }

    /// The eight-way ALU dispatch shared by block 10 and the immediate
    /// forms in block 11.
    fn alu_operation<T: Copy>(&mut self, operation: u8, operand: T)
    where
        Self: ToU8<T>,
    {
        match operation {
            0 => self.add(operand),
            1 => self.adc(operand),
            2 => self.sub(operand),
            3 => self.sbc(operand),
            4 => self.and(operand),
            5 => self.xor(operand),
            6 => self.or(operand),
            _ => self.compare(operand),
        }
    }
}

/// The memory-operand addressing forms an instruction can carry.
#[derive(Debug, Copy, Clone)]
pub enum InstructionAddress {
    /// (BC)
    BCI,
    /// (DE)
    DEI,
    /// (HL)
    HLI,
    /// (HL+), post-increment
    HLIP,
    /// (HL-), post-decrement
    HLIN,
    /// An immediate operand following the opcode.
    Direct,
    /// The address named by an immediate u16.
    DirectMem,
    /// 0xFF00 + immediate u8
    IoDirect,
    /// 0xFF00 + C
    IoC,
}

/// Either a plain register or a memory operand; exists purely so the
/// operand column can be decoded uniformly.
#[derive(Debug, Copy, Clone)]
pub enum WrapperEnum {
    Reg8(Reg8),
    InstructionAddress(InstructionAddress),
}

#[derive(Debug, Copy, Clone)]
pub enum JumpModifier {
    NotZero,
    Zero,
    NotCarry,
    Carry,
    Always,
}

/// Bits 2-0: the operand column.
#[inline]
fn column(opcode: u8) -> u8 {
    opcode & 0x7
}

/// Bits 5-3: the row within the block.
#[inline]
fn row(opcode: u8) -> u8 {
    (opcode >> 3) & 0x7
}

/// Bits 5-4: the register-pair index for the 16-bit rows.
#[inline]
fn pair(opcode: u8) -> u8 {
    (opcode >> 4) & 0x3
}

/// Bit 3 splits a register-pair row into its two variants
/// (load/add, inc/dec, pop/misc, ...).
#[inline]
fn variant_bit(opcode: u8) -> bool {
    opcode & 0x08 != 0
}

/// The operand column order shared by every block: B,C,D,E,H,L,(HL),A.
fn register_operand(index: u8) -> WrapperEnum {
    match index {
        0 => WrapperEnum::Reg8(Reg8::B),
        1 => WrapperEnum::Reg8(Reg8::C),
        2 => WrapperEnum::Reg8(Reg8::D),
        3 => WrapperEnum::Reg8(Reg8::E),
        4 => WrapperEnum::Reg8(Reg8::H),
        5 => WrapperEnum::Reg8(Reg8::L),
        6 => WrapperEnum::InstructionAddress(InstructionAddress::HLI),
        _ => WrapperEnum::Reg8(Reg8::A),
    }
}

/// The register-pair row order for the 16-bit loads and arithmetic.
fn register_pair(index: u8) -> Reg16 {
    match index {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        _ => Reg16::SP,
    }
}

/// The stack instructions swap SP out for AF.
fn register_pair_stack(index: u8) -> Reg16 {
    match index {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        _ => Reg16::AF,
    }
}

/// The indirect accumulator loads: (BC), (DE), then the two
/// auto-stepping HL forms.
fn indirect_pair(index: u8) -> InstructionAddress {
    match index {
        0 => InstructionAddress::BCI,
        1 => InstructionAddress::DEI,
        2 => InstructionAddress::HLIP,
        _ => InstructionAddress::HLIN,
    }
}

/// The condition row order shared by JR/JP/CALL/RET: NZ, Z, NC, C.
fn condition(index: u8) -> JumpModifier {
    match index {
        0 => JumpModifier::NotZero,
        1 => JumpModifier::Zero,
        2 => JumpModifier::NotCarry,
        _ => JumpModifier::Carry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_column_order() {
        // LD B,C and LD A,(HL) pull their operands from the same column
        // decoder.
        assert!(matches!(register_operand(1), WrapperEnum::Reg8(Reg8::C)));
        assert!(matches!(
            register_operand(6),
            WrapperEnum::InstructionAddress(InstructionAddress::HLI)
        ));
    }

    #[test]
    fn test_field_split() {
        // 0x5E = LD E,(HL): block 01, row 3 (E), column 6 ((HL)).
        assert_eq!(0x5E >> 6, 0b01);
        assert_eq!(row(0x5E), 3);
        assert_eq!(column(0x5E), 6);

        // 0x31 = LD SP,u16: pair row 3, load variant.
        assert_eq!(pair(0x31), 3);
        assert!(!variant_bit(0x31));
        // 0x39 = ADD HL,SP: same pair row, other variant.
        assert!(variant_bit(0x39));
    }
}
