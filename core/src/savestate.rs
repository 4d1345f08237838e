//! Savestate capture and restore. The container is a versioned
//! `nanoserde` binary blob led by a magic string; every fixed-size region
//! is length-checked on the way back in so a truncated or foreign file
//! can never corrupt a running emulator.

use nanoserde::{DeBin, SerBin};

use crate::emulator::Emulator;
use crate::error::SavestateError;
use crate::hardware::apu::WAVE_RAM_SIZE;
use crate::hardware::cartridge::mbc::Mbc1;
use crate::hardware::cartridge::mbc3::Mbc3;
use crate::hardware::cartridge::mbc5::Mbc5;
use crate::hardware::cartridge::Mbc;
use crate::hardware::ppu::palette::Palette;
use crate::hardware::ppu::register_flags::{LcdControl, LcdStatus};
use crate::hardware::ppu::tiledata::{OAM_SIZE, VRAM_BANK_SIZE};
use crate::hardware::mmu::hram::HRAM_SIZE;
use crate::hardware::mmu::wram::WRAM_SIZE;

pub const SAVESTATE_MAGIC: &str = "OXIBOY_SAVESTATE";
pub const SAVESTATE_VERSION: &str = "1.0.0";

#[derive(Clone, SerBin, DeBin)]
pub struct SaveState {
    pub magic: String,
    pub version: String,

    pub cpu: CpuState,
    pub interrupt_enable: u8,
    pub interrupt_flag: u8,
    pub timer: TimerState,
    pub ppu: PpuState,
    pub wram: Vec<u8>,
    pub wram_bank: u8,
    pub hram: Vec<u8>,
    pub cartridge: CartridgeState,
    pub cgb: CgbControllerState,
    pub apu_registers: Vec<u8>,
    pub wave_ram: Vec<u8>,
    pub serial_data: u8,
    pub serial_control: u8,
    pub oam_dma: OamDmaState,
    pub hdma: HdmaState,
    pub frame_cycles: u64,
}

#[derive(Clone, SerBin, DeBin)]
pub struct CpuState {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub sp: u16,
    pub pc: u16,
    pub ime: bool,
    pub ime_scheduled: bool,
    pub halted: bool,
    pub halt_bug_pending: bool,
    pub total_cycles: u64,
}

#[derive(Clone, SerBin, DeBin)]
pub struct TimerState {
    pub system_clock: u16,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    pub overflow_pending: bool,
    pub reloading: bool,
}

#[derive(Clone, SerBin, DeBin)]
pub struct PpuState {
    pub vram_bank_0: Vec<u8>,
    pub vram_bank_1: Vec<u8>,
    pub vram_bank: u8,
    pub oam: Vec<u8>,
    pub lcd_control: u8,
    pub lcd_status: u8,
    pub scroll_y: u8,
    pub scroll_x: u8,
    pub current_y: u8,
    pub lyc_compare: u8,
    pub bg_palette: u8,
    pub obj_palette_0: u8,
    pub obj_palette_1: u8,
    pub window_y: u8,
    pub window_x: u8,
    pub window_counter: u8,
    pub dots: u32,
    pub cgb_bg_palette: Vec<u8>,
    pub cgb_bg_palette_index: u8,
    pub cgb_bg_palette_auto_increment: bool,
    pub cgb_obj_palette: Vec<u8>,
    pub cgb_obj_palette_index: u8,
    pub cgb_obj_palette_auto_increment: bool,
    pub object_priority: u8,
}

/// Mapper registers flattened across the variants; `kind` mirrors the
/// `MbcKind` discriminant so a state can't restore onto the wrong mapper.
#[derive(Clone, SerBin, DeBin)]
pub struct CartridgeState {
    pub cartridge_type: u8,
    pub ram: Vec<u8>,
    pub ram_enabled: bool,
    pub rom_bank: u16,
    pub secondary_bank: u8,
    pub banking_mode: bool,
    pub latch_primed: bool,
    pub rtc: Option<RtcState>,
}

#[derive(Clone, SerBin, DeBin)]
pub struct RtcState {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub days: u16,
    pub halted: bool,
    pub day_carry: bool,
    pub cycle_counter: u64,
}

#[derive(Clone, SerBin, DeBin)]
pub struct CgbControllerState {
    pub key0: u8,
    pub key1: u8,
    pub double_speed: bool,
}

#[derive(Clone, SerBin, DeBin)]
pub struct OamDmaState {
    pub register: u8,
    pub source: u16,
    pub next_index: u8,
    pub active: bool,
}

#[derive(Clone, SerBin, DeBin)]
pub struct HdmaState {
    pub source: u16,
    pub destination: u16,
    pub remaining_blocks: u8,
    pub hblank_mode: bool,
    pub active: bool,
}

/// Snapshot every observable piece of machine state. Must not be called
/// while a `step` is in progress.
pub(crate) fn capture(emulator: &Emulator) -> SaveState {
    let cpu = &emulator.cpu;
    let mmu = &cpu.mmu;
    let ppu = &mmu.ppu;

    let (overflow_pending, reloading) = mmu.timer.overflow_state();
    let (bg_index, bg_auto) = ppu.cgb_bg_palette.index_state();
    let (obj_index, obj_auto) = ppu.cgb_obj_palette.index_state();
    let (dma_register, dma_source, dma_index, dma_active) = mmu.oam_dma.state();
    let (hdma_source, hdma_destination, hdma_blocks, hdma_hblank, hdma_active) = mmu.hdma.state();
    let (serial_data, serial_control) = mmu.serial.registers();

    let (ram_enabled, rom_bank, secondary_bank, banking_mode, latch_primed, rtc) =
        match &mmu.cartridge.mbc {
            Mbc::None => (false, 1, 0, false, false, None),
            Mbc::Mbc1(mbc) => (
                mbc.ram_enabled,
                mbc.lower_bank as u16,
                mbc.upper_bank,
                mbc.ram_mode,
                false,
                None,
            ),
            Mbc::Mbc3(mbc) => (
                mbc.ram_and_rtc_enabled,
                mbc.rom_bank as u16,
                mbc.mapped_bank,
                false,
                mbc.latch_primed,
                mbc.rtc.as_ref().map(|rtc| {
                    let (seconds, minutes, hours, days, halted, day_carry, cycle_counter) =
                        rtc.raw_state();
                    RtcState {
                        seconds,
                        minutes,
                        hours,
                        days,
                        halted,
                        day_carry,
                        cycle_counter,
                    }
                }),
            ),
            Mbc::Mbc5(mbc) => (mbc.ram_enabled, mbc.rom_bank, mbc.ram_bank, false, false, None),
        };

    SaveState {
        magic: SAVESTATE_MAGIC.to_owned(),
        version: SAVESTATE_VERSION.to_owned(),
        cpu: CpuState {
            af: cpu.registers.af(),
            bc: cpu.registers.bc(),
            de: cpu.registers.de(),
            hl: cpu.registers.hl(),
            sp: cpu.registers.sp,
            pc: cpu.registers.pc,
            ime: cpu.ime,
            ime_scheduled: cpu.delayed_ime,
            halted: cpu.halted,
            halt_bug_pending: cpu.halt_bug,
            total_cycles: cpu.cycles_performed,
        },
        interrupt_enable: mmu.interrupts.enable_register(),
        interrupt_flag: mmu.interrupts.flag_register() & 0x1F,
        timer: TimerState {
            system_clock: mmu.timer.system_clock,
            tima: mmu.timer.timer_counter,
            tma: mmu.timer.timer_modulo,
            tac: mmu.timer.timer_control() & 0x7,
            overflow_pending,
            reloading,
        },
        ppu: PpuState {
            vram_bank_0: ppu.vram[0].to_vec(),
            vram_bank_1: ppu.vram[1].to_vec(),
            vram_bank: ppu.vram_bank,
            oam: ppu.oam.to_vec(),
            lcd_control: ppu.lcd_control.bits(),
            lcd_status: ppu.lcd_status.bits(),
            scroll_y: ppu.scroll_y,
            scroll_x: ppu.scroll_x,
            current_y: ppu.current_y,
            lyc_compare: ppu.lyc_compare,
            bg_palette: ppu.bg_palette.register(),
            obj_palette_0: ppu.obj_palette_0.register(),
            obj_palette_1: ppu.obj_palette_1.register(),
            window_y: ppu.window_y,
            window_x: ppu.window_x,
            window_counter: ppu.window_counter,
            dots: ppu.dots,
            cgb_bg_palette: ppu.cgb_bg_palette.bytes().to_vec(),
            cgb_bg_palette_index: bg_index,
            cgb_bg_palette_auto_increment: bg_auto,
            cgb_obj_palette: ppu.cgb_obj_palette.bytes().to_vec(),
            cgb_obj_palette_index: obj_index,
            cgb_obj_palette_auto_increment: obj_auto,
            object_priority: ppu.object_priority,
        },
        wram: mmu.wram.bytes().to_vec(),
        wram_bank: mmu.wram.read_bank_select() & 0x7,
        hram: mmu.hram.bytes().to_vec(),
        cartridge: CartridgeState {
            cartridge_type: mmu.cartridge.header().cartridge_type,
            ram: mmu.cartridge.ram_bytes().to_vec(),
            ram_enabled,
            rom_bank,
            secondary_bank,
            banking_mode,
            latch_primed,
            rtc,
        },
        cgb: CgbControllerState {
            key0: mmu.cgb.key0,
            key1: mmu.cgb.read_prepare_switch(),
            double_speed: mmu.cgb.double_speed,
        },
        apu_registers: mmu.apu.registers().to_vec(),
        wave_ram: mmu.apu.wave_ram().to_vec(),
        serial_data,
        serial_control,
        oam_dma: OamDmaState {
            register: dma_register,
            source: dma_source,
            next_index: dma_index,
            active: dma_active,
        },
        hdma: HdmaState {
            source: hdma_source,
            destination: hdma_destination,
            remaining_blocks: hdma_blocks,
            hblank_mode: hdma_hblank,
            active: hdma_active,
        },
        frame_cycles: emulator.frame_cycles,
    }
}

/// Decode and validate a container. Nothing is mutated until the whole
/// state has been proven consistent, so the emulator survives bad files
/// untouched.
pub(crate) fn restore(emulator: &mut Emulator, bytes: &[u8]) -> Result<(), SavestateError> {
    let state: SaveState = DeBin::deserialize_bin(bytes).map_err(|_| SavestateError::Truncated)?;

    if state.magic != SAVESTATE_MAGIC {
        return Err(SavestateError::BadMagic { found: state.magic });
    }
    if state.version != SAVESTATE_VERSION {
        return Err(SavestateError::UnsupportedVersion { found: state.version });
    }

    check_region("vram bank 0", VRAM_BANK_SIZE, state.ppu.vram_bank_0.len())?;
    check_region("vram bank 1", VRAM_BANK_SIZE, state.ppu.vram_bank_1.len())?;
    check_region("oam", OAM_SIZE, state.ppu.oam.len())?;
    check_region("wram", WRAM_SIZE, state.wram.len())?;
    check_region("hram", HRAM_SIZE, state.hram.len())?;
    check_region("bg palette memory", 64, state.ppu.cgb_bg_palette.len())?;
    check_region("obj palette memory", 64, state.ppu.cgb_obj_palette.len())?;
    check_region("wave ram", WAVE_RAM_SIZE, state.wave_ram.len())?;

    {
        let mmu = &emulator.cpu.mmu;
        if state.cartridge.cartridge_type != mmu.cartridge.header().cartridge_type {
            return Err(SavestateError::CartridgeMismatch);
        }
        check_region("apu registers", mmu.apu.registers().len(), state.apu_registers.len())?;
        check_region("external ram", mmu.cartridge.ram_bytes().len(), state.cartridge.ram.len())?;
    }

    let cpu = &mut emulator.cpu;
    cpu.registers.set_af(state.cpu.af);
    cpu.registers.set_bc(state.cpu.bc);
    cpu.registers.set_de(state.cpu.de);
    cpu.registers.set_hl(state.cpu.hl);
    cpu.registers.sp = state.cpu.sp;
    cpu.registers.pc = state.cpu.pc;
    cpu.ime = state.cpu.ime;
    cpu.delayed_ime = state.cpu.ime_scheduled;
    cpu.halted = state.cpu.halted;
    cpu.halt_bug = state.cpu.halt_bug_pending;
    cpu.cycles_performed = state.cpu.total_cycles;

    let mmu = &mut cpu.mmu;
    mmu.interrupts.set_enable_register(state.interrupt_enable);
    mmu.interrupts.set_flag_register(state.interrupt_flag);

    mmu.timer.system_clock = state.timer.system_clock;
    mmu.timer.timer_counter = state.timer.tima;
    mmu.timer.timer_modulo = state.timer.tma;
    mmu.timer
        .restore(state.timer.tac, state.timer.overflow_pending, state.timer.reloading);

    let ppu = &mut mmu.ppu;
    ppu.vram[0].copy_from_slice(&state.ppu.vram_bank_0);
    ppu.vram[1].copy_from_slice(&state.ppu.vram_bank_1);
    ppu.vram_bank = state.ppu.vram_bank & 0x1;
    ppu.oam.copy_from_slice(&state.ppu.oam);
    ppu.lcd_control = LcdControl::from_bits_truncate(state.ppu.lcd_control);
    ppu.lcd_status = LcdStatus::from_bits_truncate(state.ppu.lcd_status);
    ppu.scroll_y = state.ppu.scroll_y;
    ppu.scroll_x = state.ppu.scroll_x;
    ppu.current_y = state.ppu.current_y;
    ppu.lyc_compare = state.ppu.lyc_compare;
    ppu.bg_palette = Palette::new(state.ppu.bg_palette, ppu.display_colours);
    ppu.obj_palette_0 = Palette::new(state.ppu.obj_palette_0, ppu.display_colours);
    ppu.obj_palette_1 = Palette::new(state.ppu.obj_palette_1, ppu.display_colours);
    ppu.window_y = state.ppu.window_y;
    ppu.window_x = state.ppu.window_x;
    ppu.window_counter = state.ppu.window_counter;
    ppu.dots = state.ppu.dots;

    let mut bg_bytes = [0u8; 64];
    bg_bytes.copy_from_slice(&state.ppu.cgb_bg_palette);
    ppu.cgb_bg_palette.restore(
        bg_bytes,
        state.ppu.cgb_bg_palette_index,
        state.ppu.cgb_bg_palette_auto_increment,
    );
    let mut obj_bytes = [0u8; 64];
    obj_bytes.copy_from_slice(&state.ppu.cgb_obj_palette);
    ppu.cgb_obj_palette.restore(
        obj_bytes,
        state.ppu.cgb_obj_palette_index,
        state.ppu.cgb_obj_palette_auto_increment,
    );
    ppu.object_priority = state.ppu.object_priority & 0x1;

    mmu.wram.restore(&state.wram, state.wram_bank);
    mmu.hram.restore(&state.hram);

    mmu.cartridge.load_ram_bytes(&state.cartridge.ram);
    match &mut mmu.cartridge.mbc {
        Mbc::None => {}
        Mbc::Mbc1(mbc) => {
            *mbc = Mbc1 {
                ram_enabled: state.cartridge.ram_enabled,
                lower_bank: (state.cartridge.rom_bank & 0x1F) as u8,
                upper_bank: state.cartridge.secondary_bank & 0x3,
                ram_mode: state.cartridge.banking_mode,
            };
        }
        Mbc::Mbc3(mbc) => {
            let has_rtc = mbc.rtc.is_some();
            *mbc = Mbc3 {
                ram_and_rtc_enabled: state.cartridge.ram_enabled,
                rom_bank: (state.cartridge.rom_bank & 0x7F) as u8,
                mapped_bank: state.cartridge.secondary_bank,
                latch_primed: state.cartridge.latch_primed,
                rtc: if has_rtc {
                    let mut rtc = crate::hardware::cartridge::mbc3::RealTimeClock::new();
                    if let Some(saved) = &state.cartridge.rtc {
                        rtc.restore_raw((
                            saved.seconds,
                            saved.minutes,
                            saved.hours,
                            saved.days,
                            saved.halted,
                            saved.day_carry,
                            saved.cycle_counter,
                        ));
                    }
                    Some(rtc)
                } else {
                    None
                },
            };
        }
        Mbc::Mbc5(mbc) => {
            mbc.ram_enabled = state.cartridge.ram_enabled;
            mbc.rom_bank = state.cartridge.rom_bank & 0x1FF;
            mbc.ram_bank = state.cartridge.secondary_bank & 0xF;
        }
    }

    mmu.cgb
        .restore(state.cgb.key0, state.cgb.key1, state.cgb.double_speed);
    mmu.apu.restore(&state.apu_registers, &state.wave_ram);
    mmu.serial.restore(state.serial_data, state.serial_control);
    mmu.oam_dma.restore((
        state.oam_dma.register,
        state.oam_dma.source,
        state.oam_dma.next_index,
        state.oam_dma.active,
    ));
    mmu.hdma.restore((
        state.hdma.source,
        state.hdma.destination,
        state.hdma.remaining_blocks,
        state.hdma.hblank_mode,
        state.hdma.active,
    ));

    emulator.frame_cycles = state.frame_cycles;

    Ok(())
}

fn check_region(region: &'static str, expected: usize, found: usize) -> Result<(), SavestateError> {
    if expected != found {
        Err(SavestateError::SizeMismatch {
            region,
            expected,
            found,
        })
    } else {
        Ok(())
    }
}
