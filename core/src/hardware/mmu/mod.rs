//! The synchronous system bus. One `Memory` value owns every device and
//! routes each access by address range; I/O ports dispatch on the low
//! byte. The CPU charges one M-cycle to the timer and the OAM DMA engine
//! before every access it performs, and hands the bulk-stepped devices
//! (PPU, cartridge clock, H-Blank DMA) their cycles after each
//! instruction.

use log::*;

use crate::emulator::EmulatorMode;
use crate::hardware::apu::{Apu, APU_MEM_END, APU_MEM_START, WAVE_SAMPLE_END, WAVE_SAMPLE_START};
use crate::hardware::cartridge::Cartridge;
use crate::hardware::mmu::cgb_mem::{CgbState, CGB_KEY0, CGB_PREPARE_SWITCH};
use crate::hardware::mmu::dma::{
    Hdma, OamDma, CGB_HDMA_1, CGB_HDMA_2, CGB_HDMA_3, CGB_HDMA_4, CGB_HDMA_5, DMA_TRANSFER,
};
use crate::hardware::mmu::hram::Hram;
use crate::hardware::mmu::wram::{Wram, CGB_WRAM_BANK};
use crate::hardware::ppu::memory_binds::*;
use crate::hardware::ppu::palette::DisplayColour;
use crate::hardware::ppu::Ppu;
use crate::io::interrupts::{InterruptController, INTERRUPTS_ENABLE, INTERRUPTS_FLAG};
use crate::io::joypad::{Joypad, JOYPAD_REGISTER};
use crate::io::serial::{Serial, SIO_CONT, SIO_DATA};
use crate::io::timer::{Timer, DIVIDER_REGISTER, TIMER_CONTROL, TIMER_COUNTER, TIMER_MODULO};

pub mod cgb_mem;
pub mod dma;
pub mod hram;
pub mod wram;

/// 16 KB ROM bank, usually 00. From cartridge, read-only.
pub const ROM_BANK_00_START: u16 = 0x0000;
pub const ROM_BANK_00_END: u16 = 0x3FFF;
/// 16 KB ROM Bank 01~NN. From cartridge, switchable bank. Read-only.
pub const ROM_BANK_NN_START: u16 = 0x4000;
pub const ROM_BANK_NN_END: u16 = 0x7FFF;
/// 8 KB of VRAM, only bank 0 in Non-CGB mode. Switchable bank 0/1 in CGB mode.
pub const VRAM_START: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9FFF;
/// 8 KB of External RAM, in cartridge, switchable bank if any.
pub const EXTERNAL_RAM_START: u16 = 0xA000;
pub const EXTERNAL_RAM_END: u16 = 0xBFFF;
/// 4 KB Work RAM bank 0.
pub const WRAM_BANK_00_START: u16 = 0xC000;
pub const WRAM_BANK_00_END: u16 = 0xCFFF;
/// 4 KB Work RAM bank 1~N. Only bank 1 in Non-CGB mode, switchable 1~7 in CGB mode.
pub const WRAM_BANK_NN_START: u16 = 0xD000;
pub const WRAM_BANK_NN_END: u16 = 0xDFFF;
/// Mirror of C000~DDFF (Echo RAM). Kept for hardware compatibility.
pub const ECHO_RAM_START: u16 = 0xE000;
pub const ECHO_RAM_END: u16 = 0xFDFF;
/// Sprite attribute table (OAM).
pub const OAM_ATTRIBUTE_START: u16 = 0xFE00;
pub const OAM_ATTRIBUTE_END: u16 = 0xFE9F;
/// Prohibited region; reads return FF, writes are ignored.
pub const NOT_USABLE_START: u16 = 0xFEA0;
pub const NOT_USABLE_END: u16 = 0xFEFF;
/// I/O registers.
pub const IO_START: u16 = 0xFF00;
pub const IO_END: u16 = 0xFF7F;
/// High RAM (HRAM).
pub const HRAM_START: u16 = 0xFF80;
pub const HRAM_END: u16 = 0xFFFE;
/// The value returned for any unmapped or unreadable address.
pub const INVALID_READ: u8 = 0xFF;

/// The memory interface the CPU executes against. `Memory` is the real
/// bus; tests substitute flat RAM.
pub trait MemoryMapper {
    fn read_byte(&self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);
    fn interrupts(&self) -> &InterruptController;
    fn interrupts_mut(&mut self) -> &mut InterruptController;
    /// Advance the synchronously-ticked devices (timer, OAM DMA) by one
    /// M-cycle, called before every bus access and for internal cycles.
    fn tick_m_cycle(&mut self);
    /// Advance the bulk-stepped devices (PPU, cartridge clock, H-Blank
    /// DMA) after an instruction has completed.
    fn tick_devices(&mut self, t_cycles: u64);
    /// T-cycles the bus stalled the CPU for since the last call (VRAM DMA).
    fn take_stall_cycles(&mut self) -> u64 {
        0
    }
    fn emulation_mode(&self) -> EmulatorMode;
    fn speed_switch_armed(&self) -> bool {
        false
    }
    fn perform_speed_switch(&mut self) {}
}

pub struct Memory {
    pub(crate) cartridge: Cartridge,
    pub(crate) ppu: Ppu,
    pub(crate) apu: Apu,
    pub(crate) wram: Wram,
    pub(crate) hram: Hram,
    pub(crate) joypad: Joypad,
    pub(crate) timer: Timer,
    pub(crate) serial: Serial,
    pub(crate) interrupts: InterruptController,
    pub(crate) oam_dma: OamDma,
    pub(crate) hdma: Hdma,
    pub(crate) cgb: CgbState,
    pub(crate) emulation_mode: EmulatorMode,
    stall_cycles: u64,
}

impl Memory {
    pub fn new(cartridge: Cartridge, mode: EmulatorMode, display_colours: DisplayColour) -> Self {
        Memory {
            cartridge,
            ppu: Ppu::new(mode.is_cgb(), display_colours),
            apu: Apu::new(),
            wram: Wram::new(),
            hram: Hram::new(),
            joypad: Joypad::new(),
            timer: Timer::new(),
            serial: Serial::new(),
            interrupts: InterruptController::new(),
            oam_dma: OamDma::new(),
            hdma: Hdma::new(),
            cgb: CgbState::new(),
            emulation_mode: mode,
            stall_cycles: 0,
        }
    }

    pub fn read_byte(&self, address: u16) -> u8 {
        // An active OAM DMA claims the bus: only HRAM (and IE) still read
        // through, everything else is open bus.
        if self.oam_dma.is_active() && !matches!(address, HRAM_START..=HRAM_END | INTERRUPTS_ENABLE) {
            return INVALID_READ;
        }

        match address {
            ROM_BANK_00_START..=ROM_BANK_00_END => self.cartridge.read_rom_low(address),
            ROM_BANK_NN_START..=ROM_BANK_NN_END => self.cartridge.read_rom_high(address),
            VRAM_START..=VRAM_END => self.ppu.read_vram_byte(address),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.read_external_ram(address),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.read_bank_0(address),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.read_bank_n(address),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.read_echo_ram(address),
            OAM_ATTRIBUTE_START..=OAM_ATTRIBUTE_END => self.ppu.read_oam_byte(address),
            NOT_USABLE_START..=NOT_USABLE_END => INVALID_READ,
            IO_START..=IO_END => self.read_io_byte(address),
            HRAM_START..=HRAM_END => self.hram.read_byte(address),
            INTERRUPTS_ENABLE => self.interrupts.enable_register(),
        }
    }

    pub fn write_byte(&mut self, address: u16, value: u8) {
        match address {
            ROM_BANK_00_START..=ROM_BANK_NN_END => self.cartridge.write_byte(address, value),
            VRAM_START..=VRAM_END => self.ppu.write_vram_byte(address, value),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.write_byte(address, value),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.write_bank_0(address, value),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.write_bank_n(address, value),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.write_echo_ram(address, value),
            OAM_ATTRIBUTE_START..=OAM_ATTRIBUTE_END => self.ppu.write_oam_byte(address, value),
            NOT_USABLE_START..=NOT_USABLE_END => {
                trace!("Write to prohibited region ignored: 0x{:04X}", address)
            }
            IO_START..=IO_END => self.write_io_byte(address, value),
            HRAM_START..=HRAM_END => self.hram.set_byte(address, value),
            INTERRUPTS_ENABLE => self.interrupts.set_enable_register(value),
        }
    }

    /// Specific method for all reads of the I/O page. Any port we don't
    /// know is open bus.
    fn read_io_byte(&self, address: u16) -> u8 {
        match address {
            JOYPAD_REGISTER => self.joypad.read_register(),
            SIO_DATA => self.serial.read_data(),
            SIO_CONT => self.serial.read_control(),
            DIVIDER_REGISTER => self.timer.divider_register(),
            TIMER_COUNTER => self.timer.timer_counter,
            TIMER_MODULO => self.timer.timer_modulo,
            TIMER_CONTROL => self.timer.timer_control(),
            INTERRUPTS_FLAG => self.interrupts.flag_register(),
            APU_MEM_START..=APU_MEM_END => self.apu.read_register(address),
            WAVE_SAMPLE_START..=WAVE_SAMPLE_END => self.apu.read_wave_sample(address),
            LCD_CONTROL_REGISTER => self.ppu.lcd_control(),
            LCD_STATUS_REGISTER => self.ppu.lcd_status(),
            SCY_REGISTER => self.ppu.scy(),
            SCX_REGISTER => self.ppu.scx(),
            LY_REGISTER => self.ppu.ly(),
            LYC_REGISTER => self.ppu.lyc(),
            DMA_TRANSFER => self.oam_dma.register(),
            BG_PALETTE => self.ppu.bg_palette(),
            OB_PALETTE_0 => self.ppu.obj_palette_0(),
            OB_PALETTE_1 => self.ppu.obj_palette_1(),
            WY_REGISTER => self.ppu.window_y(),
            WX_REGISTER => self.ppu.window_x(),
            CGB_KEY0 if self.emulation_mode.is_cgb() => self.cgb.key0,
            CGB_PREPARE_SWITCH if self.emulation_mode.is_cgb() => self.cgb.read_prepare_switch(),
            CGB_VRAM_BANK_REGISTER if self.emulation_mode.is_cgb() => self.ppu.vram_bank(),
            CGB_HDMA_1 | CGB_HDMA_2 | CGB_HDMA_3 | CGB_HDMA_4 => INVALID_READ,
            CGB_HDMA_5 if self.emulation_mode.is_cgb() => self.hdma.read_control(),
            CGB_BACKGROUND_COLOR_INDEX if self.emulation_mode.is_cgb() => self.ppu.bg_colour_index(),
            CGB_BACKGROUND_PALETTE_DATA if self.emulation_mode.is_cgb() => self.ppu.bg_palette_data(),
            CGB_SPRITE_COLOR_INDEX if self.emulation_mode.is_cgb() => self.ppu.obj_colour_index(),
            CGB_OBJECT_PALETTE_DATA if self.emulation_mode.is_cgb() => self.ppu.obj_palette_data(),
            CGB_OBJECT_PRIORITY_MODE if self.emulation_mode.is_cgb() => self.ppu.object_priority(),
            CGB_WRAM_BANK if self.emulation_mode.is_cgb() => self.wram.read_bank_select(),
            _ => INVALID_READ,
        }
    }

    /// Specific method for all writes to the I/O page. Writes to unknown
    /// ports are dropped.
    fn write_io_byte(&mut self, address: u16, value: u8) {
        match address {
            JOYPAD_REGISTER => self.joypad.write_register(value),
            SIO_DATA => self.serial.write_data(value),
            SIO_CONT => self.serial.write_control(value, &mut self.interrupts),
            DIVIDER_REGISTER => self.timer.set_divider(),
            TIMER_COUNTER => self.timer.set_timer_counter(value),
            TIMER_MODULO => self.timer.set_tma(value),
            TIMER_CONTROL => self.timer.set_timer_control(value),
            INTERRUPTS_FLAG => self.interrupts.set_flag_register(value),
            APU_MEM_START..=APU_MEM_END => self.apu.write_register(address, value),
            WAVE_SAMPLE_START..=WAVE_SAMPLE_END => self.apu.write_wave_sample(address, value),
            LCD_CONTROL_REGISTER => self.ppu.set_lcd_control(value, &mut self.interrupts),
            LCD_STATUS_REGISTER => self.ppu.set_lcd_status(value),
            SCY_REGISTER => self.ppu.set_scy(value),
            SCX_REGISTER => self.ppu.set_scx(value),
            LY_REGISTER => debug!("ROM tried to write to LY with value: {}", value),
            LYC_REGISTER => self.ppu.set_lyc(value, &mut self.interrupts),
            DMA_TRANSFER => self.oam_dma.start(value),
            BG_PALETTE => self.ppu.set_bg_palette(value),
            OB_PALETTE_0 => self.ppu.set_obj_palette_0(value),
            OB_PALETTE_1 => self.ppu.set_obj_palette_1(value),
            WY_REGISTER => self.ppu.set_window_y(value),
            WX_REGISTER => self.ppu.set_window_x(value),
            CGB_KEY0 if self.emulation_mode.is_cgb() => self.cgb.key0 = value,
            CGB_PREPARE_SWITCH if self.emulation_mode.is_cgb() => self.cgb.write_prepare_switch(value),
            CGB_VRAM_BANK_REGISTER if self.emulation_mode.is_cgb() => self.ppu.set_vram_bank(value),
            CGB_HDMA_1 if self.emulation_mode.is_cgb() => self.hdma.write_source_high(value),
            CGB_HDMA_2 if self.emulation_mode.is_cgb() => self.hdma.write_source_low(value),
            CGB_HDMA_3 if self.emulation_mode.is_cgb() => self.hdma.write_destination_high(value),
            CGB_HDMA_4 if self.emulation_mode.is_cgb() => self.hdma.write_destination_low(value),
            CGB_HDMA_5 if self.emulation_mode.is_cgb() => {
                if self.hdma.write_control(value) {
                    self.perform_gdma();
                }
            }
            CGB_BACKGROUND_COLOR_INDEX if self.emulation_mode.is_cgb() => {
                self.ppu.set_bg_colour_index(value)
            }
            CGB_BACKGROUND_PALETTE_DATA if self.emulation_mode.is_cgb() => {
                self.ppu.set_bg_palette_data(value)
            }
            CGB_SPRITE_COLOR_INDEX if self.emulation_mode.is_cgb() => {
                self.ppu.set_obj_colour_index(value)
            }
            CGB_OBJECT_PALETTE_DATA if self.emulation_mode.is_cgb() => {
                self.ppu.set_obj_palette_data(value)
            }
            CGB_OBJECT_PRIORITY_MODE if self.emulation_mode.is_cgb() => {
                self.ppu.set_object_priority(value)
            }
            CGB_WRAM_BANK if self.emulation_mode.is_cgb() => self.wram.write_bank_select(value),
            _ => trace!(
                "Write to unmapped I/O port 0x{:04X} ignored (value 0x{:02X})",
                address,
                value
            ),
        }
    }

    /// One byte of the running OAM DMA transfer, performed per M-cycle.
    /// The engine bypasses the bus restriction it imposes on the CPU.
    fn tick_oam_dma(&mut self) {
        if let Some((index, source)) = self.oam_dma.next_source() {
            let value = self.dma_source_read(source);
            self.ppu.oam_dma_write(index, value);
            self.oam_dma.advance();
        }
    }

    /// Address dispatch for the DMA engines. Anything outside the regular
    /// source regions reads open bus.
    fn dma_source_read(&self, address: u16) -> u8 {
        match address {
            ROM_BANK_00_START..=ROM_BANK_00_END => self.cartridge.read_rom_low(address),
            ROM_BANK_NN_START..=ROM_BANK_NN_END => self.cartridge.read_rom_high(address),
            VRAM_START..=VRAM_END => self.ppu.read_vram_byte(address),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.read_external_ram(address),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.read_bank_0(address),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.read_bank_n(address),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.read_echo_ram(address),
            _ => INVALID_READ,
        }
    }

    /// A general-purpose VRAM DMA: the whole programmed length is copied at
    /// once while the CPU is stalled.
    fn perform_gdma(&mut self) {
        while self.hdma.is_active() {
            self.copy_hdma_block();
        }
    }

    /// Copy one 16-byte block and charge the CPU stall for it.
    fn copy_hdma_block(&mut self) {
        let (source, destination) = self.hdma.current_block();

        for i in 0..16 {
            let value = self.dma_source_read(source.wrapping_add(i));
            self.ppu
                .write_vram_byte(0x8000 | (destination.wrapping_add(i) & 0x1FFF), value);
        }

        self.hdma.advance_block();
        self.stall_cycles += if self.cgb.double_speed { 64 } else { 32 };
    }

    pub(crate) fn speed_shift(&self) -> u64 {
        self.cgb.double_speed as u64
    }
}

impl MemoryMapper for Memory {
    fn read_byte(&self, address: u16) -> u8 {
        self.read_byte(address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        self.write_byte(address, value)
    }

    fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    fn interrupts_mut(&mut self) -> &mut InterruptController {
        &mut self.interrupts
    }

    fn tick_m_cycle(&mut self) {
        self.timer.tick_m_cycle(&mut self.interrupts);
        self.tick_oam_dma();
    }

    fn tick_devices(&mut self, t_cycles: u64) {
        // The PPU and the cartridge clock run at the base crystal rate; in
        // double speed mode the CPU gets twice as many cycles per frame.
        let base_cycles = t_cycles >> self.speed_shift();
        self.ppu.tick(base_cycles, &mut self.interrupts);
        self.cartridge.step(base_cycles);

        for _ in 0..self.ppu.take_hblank_entries() {
            if self.hdma.hblank_block_pending() {
                self.copy_hdma_block();
            }
        }
    }

    fn take_stall_cycles(&mut self) -> u64 {
        std::mem::replace(&mut self.stall_cycles, 0)
    }

    fn emulation_mode(&self) -> EmulatorMode {
        self.emulation_mode
    }

    fn speed_switch_armed(&self) -> bool {
        self.emulation_mode.is_cgb() && self.cgb.speed_switch_armed()
    }

    fn perform_speed_switch(&mut self) {
        self.cgb.toggle_speed();
    }
}
