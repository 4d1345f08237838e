//! Operand access traits. Most instructions are generic over their operand:
//! a plain register, or one of the memory addressing forms in
//! `InstructionAddress`. Resolving a memory form charges the appropriate
//! bus cycles; resolving a register is free.

use crate::hardware::cpu::execute::{InstructionAddress, WrapperEnum};
use crate::hardware::cpu::CPU;
use crate::hardware::mmu::MemoryMapper;
use crate::hardware::cpu::registers::{Reg16, Reg8};

pub trait ToU8<T: Copy> {
    /// Resolve the operand to a value, charging bus cycles if it lives in
    /// memory.
    fn read_u8_value(&mut self, target: T) -> u8;
}

pub trait SetU8<T: Copy> {
    fn set_u8_value(&mut self, target: T, value: u8);
}

pub trait ToU16<T: Copy> {
    fn read_u16_value(&mut self, target: T) -> u16;
}

pub trait SetU16<T: Copy> {
    fn set_u16_value(&mut self, target: T, value: u16);
}

impl<M: MemoryMapper> ToU8<Reg8> for CPU<M> {
    fn read_u8_value(&mut self, target: Reg8) -> u8 {
        use Reg8::*;
        match target {
            A => self.registers.a,
            B => self.registers.b,
            C => self.registers.c,
            D => self.registers.d,
            E => self.registers.e,
            H => self.registers.h,
            L => self.registers.l,
        }
    }
}

impl<M: MemoryMapper> SetU8<Reg8> for CPU<M> {
    fn set_u8_value(&mut self, target: Reg8, value: u8) {
        use Reg8::*;
        match target {
            A => self.registers.a = value,
            B => self.registers.b = value,
            C => self.registers.c = value,
            D => self.registers.d = value,
            E => self.registers.e = value,
            H => self.registers.h = value,
            L => self.registers.l = value,
        }
    }
}

impl<M: MemoryMapper> ToU8<InstructionAddress> for CPU<M> {
    fn read_u8_value(&mut self, target: InstructionAddress) -> u8 {
        use InstructionAddress::*;
        match target {
            BCI => {
                let address = self.registers.bc();
                self.read_byte_cycle(address)
            }
            DEI => {
                let address = self.registers.de();
                self.read_byte_cycle(address)
            }
            HLI => {
                let address = self.registers.hl();
                self.read_byte_cycle(address)
            }
            HLIP => {
                let address = self.registers.hl();
                self.registers.set_hl(address.wrapping_add(1));
                self.read_byte_cycle(address)
            }
            HLIN => {
                let address = self.registers.hl();
                self.registers.set_hl(address.wrapping_sub(1));
                self.read_byte_cycle(address)
            }
            Direct => self.get_instr_u8(),
            DirectMem => {
                let address = self.get_instr_u16();
                self.read_byte_cycle(address)
            }
            IoDirect => {
                let offset = self.get_instr_u8() as u16;
                self.read_byte_cycle(0xFF00 | offset)
            }
            IoC => {
                let address = 0xFF00 | self.registers.c as u16;
                self.read_byte_cycle(address)
            }
        }
    }
}

impl<M: MemoryMapper> SetU8<InstructionAddress> for CPU<M> {
    fn set_u8_value(&mut self, target: InstructionAddress, value: u8) {
        use InstructionAddress::*;
        match target {
            BCI => {
                let address = self.registers.bc();
                self.write_byte_cycle(address, value)
            }
            DEI => {
                let address = self.registers.de();
                self.write_byte_cycle(address, value)
            }
            HLI => {
                let address = self.registers.hl();
                self.write_byte_cycle(address, value)
            }
            HLIP => {
                let address = self.registers.hl();
                self.registers.set_hl(address.wrapping_add(1));
                self.write_byte_cycle(address, value)
            }
            HLIN => {
                let address = self.registers.hl();
                self.registers.set_hl(address.wrapping_sub(1));
                self.write_byte_cycle(address, value)
            }
            Direct => unreachable!("An immediate operand is never a store destination"),
            DirectMem => {
                let address = self.get_instr_u16();
                self.write_byte_cycle(address, value)
            }
            IoDirect => {
                let offset = self.get_instr_u8() as u16;
                self.write_byte_cycle(0xFF00 | offset, value)
            }
            IoC => {
                let address = 0xFF00 | self.registers.c as u16;
                self.write_byte_cycle(address, value)
            }
        }
    }
}

impl<M: MemoryMapper> ToU8<WrapperEnum> for CPU<M> {
    fn read_u8_value(&mut self, target: WrapperEnum) -> u8 {
        match target {
            WrapperEnum::Reg8(register) => self.read_u8_value(register),
            WrapperEnum::InstructionAddress(address) => self.read_u8_value(address),
        }
    }
}

impl<M: MemoryMapper> SetU8<WrapperEnum> for CPU<M> {
    fn set_u8_value(&mut self, target: WrapperEnum, value: u8) {
        match target {
            WrapperEnum::Reg8(register) => self.set_u8_value(register, value),
            WrapperEnum::InstructionAddress(address) => self.set_u8_value(address, value),
        }
    }
}

impl<M: MemoryMapper> ToU16<Reg16> for CPU<M> {
    fn read_u16_value(&mut self, target: Reg16) -> u16 {
        use Reg16::*;
        match target {
            AF => self.registers.af(),
            BC => self.registers.bc(),
            DE => self.registers.de(),
            HL => self.registers.hl(),
            SP => self.registers.sp,
        }
    }
}

impl<M: MemoryMapper> SetU16<Reg16> for CPU<M> {
    fn set_u16_value(&mut self, target: Reg16, value: u16) {
        use Reg16::*;
        match target {
            AF => self.registers.set_af(value),
            BC => self.registers.set_bc(value),
            DE => self.registers.set_de(value),
            HL => self.registers.set_hl(value),
            SP => self.registers.sp = value,
        }
    }
}

impl<M: MemoryMapper> ToU16<InstructionAddress> for CPU<M> {
    fn read_u16_value(&mut self, target: InstructionAddress) -> u16 {
        match target {
            InstructionAddress::Direct => self.get_instr_u16(),
            _ => unreachable!("Only immediate 16-bit loads exist"),
        }
    }
}

impl<M: MemoryMapper> SetU16<InstructionAddress> for CPU<M> {
    fn set_u16_value(&mut self, target: InstructionAddress, value: u16) {
        match target {
            InstructionAddress::DirectMem => {
                let address = self.get_instr_u16();
                self.write_short_cycle(address, value);
            }
            _ => unreachable!("Only `LD (u16), SP` stores a 16-bit value"),
        }
    }
}
