//! The public facade: owns the CPU (which owns the bus and through it
//! every device), steps whole frames, and exposes persistence.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::*;
use nanoserde::{DeJson, SerBin, SerJson};

use crate::error::{EmulatorError, PersistenceError, RomLoadError, SavestateError};
use crate::hardware::cartridge::mbc3::PersistedClock;
use crate::hardware::cartridge::Cartridge;
use crate::hardware::cpu::CPU;
use crate::hardware::mmu::Memory;
use crate::hardware::ppu::palette::{display_colour_preset, DisplayColour, GRAYSCALE, RGB};
use crate::hardware::ppu::FRAMEBUFFER_SIZE;
use crate::io::joypad::InputKey;
use crate::savestate;
use crate::{EmulatorOptions, EmulatorOptionsBuilder};

/// A full frame is 154 scanlines of 456 T-cycles.
pub const CYCLES_PER_FRAME: u64 = 70_224;

/// The hardware revision being emulated. Decided once at construction,
/// either forced by the host or taken from the cartridge header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EmulatorMode {
    DMG,
    CGB,
}

impl EmulatorMode {
    pub fn is_dmg(self) -> bool {
        self == EmulatorMode::DMG
    }

    pub fn is_cgb(self) -> bool {
        self == EmulatorMode::CGB
    }
}

/// The host's mode preference; `Auto` follows the cartridge's CGB flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HardwareMode {
    Auto,
    Dmg,
    Cgb,
}

impl HardwareMode {
    fn resolve(self, cgb_cartridge: bool) -> EmulatorMode {
        match self {
            HardwareMode::Dmg => EmulatorMode::DMG,
            HardwareMode::Cgb => EmulatorMode::CGB,
            HardwareMode::Auto => {
                if cgb_cartridge {
                    EmulatorMode::CGB
                } else {
                    EmulatorMode::DMG
                }
            }
        }
    }
}

pub struct Emulator {
    pub(crate) cpu: CPU<Memory>,
    pub(crate) frame_cycles: u64,
    paused: bool,
    mode: EmulatorMode,
    hardware_preference: HardwareMode,
    display_colours: DisplayColour,
}

impl Emulator {
    pub fn new(rom: &[u8], options: EmulatorOptions) -> Result<Self, RomLoadError> {
        let cartridge = Cartridge::new(rom, options.saved_ram.as_deref())?;
        let mode = options.hardware_mode.resolve(cartridge.header().cgb_flag);

        info!("Starting emulator in {:?} mode", mode);

        let mut mmu = Memory::new(cartridge, mode, options.display_colours);
        // The DIV phase the boot ROM leaves behind.
        mmu.timer.system_clock = 0xAB00;

        Ok(Emulator {
            cpu: CPU::new(mmu, mode),
            frame_cycles: 0,
            paused: false,
            mode,
            hardware_preference: options.hardware_mode,
            display_colours: options.display_colours,
        })
    }

    /// Swap in a new cartridge, keeping the host's mode and palette
    /// preferences. Everything else restarts from the post-boot state.
    pub fn load_rom(&mut self, rom: &[u8], saved_ram: Option<Vec<u8>>) -> Result<(), RomLoadError> {
        let options = EmulatorOptionsBuilder::new()
            .saved_ram(saved_ram)
            .with_mode(self.hardware_preference)
            .display_colours(self.display_colours)
            .build();

        *self = Emulator::new(rom, options)?;
        Ok(())
    }

    /// Re-create every device for the current cartridge. Battery RAM
    /// survives the reset, like pulling the power switch on real hardware.
    pub fn reset(&mut self) {
        let rom = self.cpu.mmu.cartridge.rom_bytes().to_vec();
        let ram = self.cpu.mmu.cartridge.ram_bytes().to_vec();
        let saved_ram = if ram.is_empty() { None } else { Some(ram) };

        // The header was valid when we loaded it the first time.
        if let Err(err) = self.load_rom(&rom, saved_ram) {
            unreachable!("Reset re-parsed an already-accepted ROM: {}", err);
        }
    }

    /// Run exactly one visible CPU step and return the T-cycles it took.
    pub fn step_instruction(&mut self) -> u64 {
        let cycles = self.cpu.step_cycle();
        // In double speed mode two CPU cycles fit in one dot, so the frame
        // budget advances at half rate.
        self.frame_cycles += cycles >> self.cpu.mmu.speed_shift();
        cycles
    }

    /// Run the machine up to the next frame boundary (70,224 T-cycles).
    /// Returns `false` without advancing when paused.
    pub fn step_frame(&mut self) -> bool {
        if self.paused {
            return false;
        }

        while self.frame_cycles < CYCLES_PER_FRAME {
            self.step_instruction();
        }
        self.frame_cycles -= CYCLES_PER_FRAME;

        true
    }

    /// The 160x144 RGB framebuffer as of the last completed scanline.
    pub fn framebuffer(&self) -> &[RGB; FRAMEBUFFER_SIZE] {
        self.cpu.mmu.ppu.frame_buffer()
    }

    pub fn mode(&self) -> EmulatorMode {
        self.mode
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Force a hardware mode for subsequent `reset`/`load_rom` calls; the
    /// running machine is not disturbed.
    pub fn set_hardware_mode(&mut self, mode: HardwareMode) {
        self.hardware_preference = mode;
    }

    /// Select a DMG shade preset by name ("grayscale", "green", "pocket");
    /// `None` restores grayscale. Returns false for an unknown name.
    pub fn set_dmg_palette(&mut self, name: Option<&str>) -> bool {
        let colours = match name {
            None => GRAYSCALE,
            Some(name) => match display_colour_preset(name) {
                Some(colours) => colours,
                None => return false,
            },
        };

        self.display_colours = colours;
        self.cpu.mmu.ppu.set_display_colours(colours);
        true
    }

    pub fn press_key(&mut self, key: InputKey) {
        let mmu = &mut self.cpu.mmu;
        mmu.joypad.press_key(key, &mut mmu.interrupts);
    }

    pub fn release_key(&mut self, key: InputKey) {
        self.cpu.mmu.joypad.release_key(key);
    }

    /// Replace the whole button state at once; edges are derived
    /// internally, so holding a key across calls never re-triggers the
    /// Joypad interrupt.
    pub fn set_input(&mut self, pressed: &[InputKey]) {
        for key in InputKey::iter() {
            if pressed.contains(&key) {
                self.press_key(key);
            } else {
                self.release_key(key);
            }
        }
    }

    /// Everything the guest has written to the serial port so far.
    pub fn serial_output(&self) -> &[u8] {
        self.cpu.mmu.serial.output()
    }

    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.cpu.mmu.serial.take_output()
    }

    /// The external RAM contents, present only for battery-backed
    /// cartridges.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.cpu.mmu.cartridge.battery_ram()
    }

    pub fn load_battery_ram(&mut self, bytes: &[u8]) {
        self.cpu.mmu.cartridge.load_ram_bytes(bytes);
    }

    /// The RTC sidecar record as JSON, stamped with the current wall
    /// clock. `None` when the cartridge has no clock.
    pub fn rtc_state(&self) -> Option<String> {
        self.cpu
            .mmu
            .cartridge
            .persisted_rtc(unix_timestamp())
            .map(|persisted| persisted.serialize_json())
    }

    /// Restore the RTC from a sidecar record, crediting elapsed wall time
    /// unless the clock was halted.
    pub fn load_rtc_state(&mut self, json: &str) -> Result<(), PersistenceError> {
        let persisted = PersistedClock::deserialize_json(json)
            .map_err(|err| PersistenceError::MalformedRtcState(err.to_string()))?;

        self.cpu
            .mmu
            .cartridge
            .load_persisted_rtc(&persisted, unix_timestamp());
        Ok(())
    }

    /// Serialize the complete machine state into the versioned container.
    pub fn save_state_bytes(&self) -> Vec<u8> {
        savestate::capture(self).serialize_bin()
    }

    /// Restore a savestate captured from the same cartridge. On any error
    /// the emulator is left exactly as it was.
    pub fn load_state_bytes(&mut self, bytes: &[u8]) -> Result<(), SavestateError> {
        savestate::restore(self, bytes)
    }

    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        fs::write(path, self.save_state_bytes())?;
        Ok(())
    }

    pub fn load_state<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EmulatorError> {
        let bytes = fs::read(path)?;
        self.load_state_bytes(&bytes)?;
        Ok(())
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{build_rom, test_rom};
    use pretty_assertions::assert_eq;

    fn emulator_with(rom: &[u8]) -> Emulator {
        Emulator::new(rom, EmulatorOptionsBuilder::new().build()).unwrap()
    }

    /// The test ROM's entry point spins in place, so stepping is safe and
    /// fully deterministic.
    fn spin_emulator() -> Emulator {
        emulator_with(&test_rom(0x00))
    }

    #[test]
    fn test_frame_is_70224_cycles() {
        let mut emulator = spin_emulator();

        emulator.step_frame();
        let first_frame = emulator.cpu.cycles_performed + emulator.frame_cycles;
        assert!(first_frame >= CYCLES_PER_FRAME);
        // The overshoot is bounded by one instruction.
        assert!(emulator.frame_cycles < 24);
    }

    #[test]
    fn test_vblank_raised_once_per_frame() {
        let mut emulator = spin_emulator();

        emulator.step_frame();
        let flags = emulator.cpu.mmu.interrupts.flag_register();
        assert_ne!(flags & 0x01, 0);
    }

    #[test]
    fn test_post_boot_register_state() {
        let emulator = spin_emulator();

        assert_eq!(emulator.cpu.registers().af(), 0x01B0);
        assert_eq!(emulator.cpu.registers().bc(), 0x0013);
        assert_eq!(emulator.cpu.registers().de(), 0x00D8);
        assert_eq!(emulator.cpu.registers().hl(), 0x014D);
        assert_eq!(emulator.cpu.registers().sp, 0xFFFE);
        assert_eq!(emulator.cpu.registers().pc, 0x0100);
        assert_eq!(emulator.mode(), EmulatorMode::DMG);
    }

    #[test]
    fn test_cgb_flag_selects_mode() {
        let mut rom = test_rom(0x00);
        rom[0x143] = 0x80;
        rom[0x14D] = crate::hardware::cartridge::header::compute_header_checksum(&rom);

        let emulator = emulator_with(&rom);
        assert_eq!(emulator.mode(), EmulatorMode::CGB);
        assert_eq!(emulator.cpu.registers().af() >> 8, 0x11);

        // The host can still force DMG behaviour.
        let options = EmulatorOptionsBuilder::new().with_mode(HardwareMode::Dmg).build();
        let forced = Emulator::new(&rom, options).unwrap();
        assert_eq!(forced.mode(), EmulatorMode::DMG);
    }

    #[test]
    fn test_paused_frame_does_not_advance() {
        let mut emulator = spin_emulator();

        emulator.pause();
        assert!(!emulator.step_frame());
        assert_eq!(emulator.cpu.cycles_performed, 0);

        emulator.resume();
        assert!(emulator.step_frame());
    }

    #[test]
    fn test_savestate_round_trip() {
        let mut emulator = emulator_with(&build_rom(0x03, 0x02, 0x02));

        for _ in 0..3 {
            emulator.step_frame();
        }
        emulator.cpu.mmu.write_byte(0xC123, 0x77);

        let state = emulator.save_state_bytes();
        let before_registers = emulator.cpu.registers().clone();
        let before_div = emulator.cpu.mmu.read_byte(0xFF04);

        // Diverge, then restore.
        for _ in 0..2 {
            emulator.step_frame();
        }
        emulator.load_state_bytes(&state).unwrap();

        assert_eq!(emulator.cpu.registers().af(), before_registers.af());
        assert_eq!(emulator.cpu.registers().pc, before_registers.pc);
        assert_eq!(emulator.cpu.mmu.read_byte(0xFF04), before_div);
        assert_eq!(emulator.cpu.mmu.read_byte(0xC123), 0x77);

        // Stepping after a restore behaves like the original timeline.
        let cycles = emulator.step_instruction();
        assert!(cycles >= 4);
    }

    #[test]
    fn test_savestate_rejects_garbage() {
        let mut emulator = spin_emulator();

        assert!(emulator.load_state_bytes(&[0x00, 0x01, 0x02]).is_err());

        // A state from a different cartridge type must be refused.
        let other = emulator_with(&build_rom(0x03, 0x02, 0x02));
        let state = other.save_state_bytes();
        assert!(matches!(
            emulator.load_state_bytes(&state),
            Err(crate::error::SavestateError::CartridgeMismatch)
        ));
    }

    #[test]
    fn test_serial_capture() {
        let mut emulator = spin_emulator();

        emulator.cpu.mmu.write_byte(0xFF01, b'O');
        emulator.cpu.mmu.write_byte(0xFF02, 0x81);
        emulator.cpu.mmu.write_byte(0xFF01, b'K');
        emulator.cpu.mmu.write_byte(0xFF02, 0x81);

        assert_eq!(emulator.serial_output(), b"OK");
        assert_eq!(emulator.take_serial_output(), b"OK");
        assert!(emulator.serial_output().is_empty());
    }

    #[test]
    fn test_input_edges() {
        let mut emulator = spin_emulator();
        emulator.cpu.mmu.interrupts.set_enable_register(0x1F);

        // Select the button group, then press A twice without releasing.
        emulator.cpu.mmu.write_byte(0xFF00, 0b0001_0000);
        emulator.set_input(&[InputKey::A]);
        emulator.set_input(&[InputKey::A]);

        let flags = emulator.cpu.mmu.interrupts.flag_register();
        assert_ne!(flags & 0x10, 0);

        assert_eq!(emulator.cpu.mmu.read_byte(0xFF00) & 0x0F, 0b1110);

        emulator.set_input(&[]);
        assert_eq!(emulator.cpu.mmu.read_byte(0xFF00) & 0x0F, 0x0F);
    }

    #[test]
    fn test_timer_interrupt_from_guest_code() {
        let mut rom = test_rom(0x00);
        // LD A,0x05 ; LDH (TAC),A ; LD A,0xFF ; LDH (TIMA),A ; spin.
        let program = [0x3E, 0x05, 0xE0, 0x07, 0x3E, 0xFF, 0xE0, 0x05, 0x18, 0xFE];
        rom[0x100..0x100 + program.len()].copy_from_slice(&program);

        let mut emulator = emulator_with(&rom);
        for _ in 0..20 {
            emulator.step_instruction();
        }

        assert_ne!(emulator.cpu.mmu.interrupts.flag_register() & 0x04, 0);
    }

    #[test]
    fn test_reset_preserves_battery_ram() {
        let mut emulator = emulator_with(&build_rom(0x03, 0x02, 0x02));

        // Enable and fill a bit of external RAM.
        emulator.cpu.mmu.write_byte(0x0000, 0x0A);
        emulator.cpu.mmu.write_byte(0xA000, 0x99);
        emulator.step_instruction();

        emulator.reset();

        assert_eq!(emulator.cpu.cycles_performed, 0);
        emulator.cpu.mmu.write_byte(0x0000, 0x0A);
        assert_eq!(emulator.cpu.mmu.read_byte(0xA000), 0x99);
    }
}
