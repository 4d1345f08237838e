//! Cycle accounting and interrupt dispatch. Every memory touch the CPU
//! performs goes through here so that the synchronously-ticked devices see
//! the M-cycle *before* the value is delivered.

use crate::hardware::cpu::CPU;
use crate::hardware::mmu::MemoryMapper;
use crate::io::interrupts::Interrupt;

impl<M: MemoryMapper> CPU<M> {
    /// Charge one internal M-cycle (4 T-cycles): the timer and the OAM DMA
    /// engine advance, the bulk-stepped devices don't.
    pub fn add_cycles(&mut self) {
        self.cycles_performed += 4;
        self.mmu.tick_m_cycle();
    }

    /// Read a byte from the bus, charging the access M-cycle first.
    pub fn read_byte_cycle(&mut self, address: u16) -> u8 {
        self.add_cycles();
        self.mmu.read_byte(address)
    }

    /// Write a byte to the bus, charging the access M-cycle first.
    pub fn write_byte_cycle(&mut self, address: u16, value: u8) {
        self.add_cycles();
        self.mmu.write_byte(address, value);
    }

    /// Read a short from the bus, least significant byte first.
    pub fn read_short_cycle(&mut self, address: u16) -> u16 {
        let least_s_byte = self.read_byte_cycle(address) as u16;
        let most_s_byte = self.read_byte_cycle(address.wrapping_add(1)) as u16;

        (most_s_byte << 8) | least_s_byte
    }

    /// Write a short to the bus, least significant byte first.
    pub fn write_short_cycle(&mut self, address: u16, value: u16) {
        self.write_byte_cycle(address, (value & 0xFF) as u8);
        self.write_byte_cycle(address.wrapping_add(1), (value >> 8) as u8);
    }

    /// Fetch the opcode at PC. When the HALT bug is armed the PC increment
    /// is swallowed once, making the byte after HALT execute twice.
    pub(crate) fn fetch_opcode(&mut self) -> u8 {
        let opcode = self.read_byte_cycle(self.registers.pc);

        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.registers.pc = self.registers.pc.wrapping_add(1);
        }

        opcode
    }

    /// Based on the current `PC` will interpret the value at that location
    /// in memory as a `u8` value. Advances the `PC` by 1.
    pub fn get_instr_u8(&mut self) -> u8 {
        let result = self.read_byte_cycle(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);

        result
    }

    /// Based on the current `PC` will interpret the `current` and
    /// `current + 1` bytes as a `u16` value in little endian. Advances the
    /// `PC` by 2.
    pub fn get_instr_u16(&mut self) -> u16 {
        let least_s_byte = self.get_instr_u8() as u16;
        let most_s_byte = self.get_instr_u8() as u16;

        (most_s_byte << 8) | least_s_byte
    }

    /// Read the next opcode, advance the PC, and execute a CB-prefixed
    /// instruction.
    pub fn cb_prefix_call(&mut self) {
        let opcode = self.get_instr_u8();
        self.opcode = opcode;
        self.execute_prefix(opcode);
    }

    /// The routine used whenever an interrupt is dispatched: two wait
    /// cycles, the PC push, and the jump to the vector. 20 T-cycles total,
    /// with the IF bit acknowledged and IME cleared.
    pub(crate) fn interrupt_service_routine(&mut self, interrupt: Interrupt) {
        log::debug!("Dispatching {:?} interrupt", interrupt);

        self.halted = false;
        self.ime = false;

        self.add_cycles();
        self.add_cycles();

        self.mmu.interrupts_mut().acknowledge(interrupt);
        self.push_helper(self.registers.pc);
        self.registers.pc = interrupt.vector();
    }
}
