//! Cartridge handling: header parsing, the mapper implementations, and
//! battery/RTC persistence.

use num_integer::Integer;

use crate::error::RomLoadError;
use crate::hardware::cartridge::header::CartridgeHeader;
use crate::hardware::cartridge::mbc::{Mbc1, RAM_BANK_SIZE, ROM_BANK_SIZE};
use crate::hardware::cartridge::mbc3::{Mbc3, PersistedClock, RealTimeClock};
use crate::hardware::cartridge::mbc5::Mbc5;
use crate::hardware::mmu::{EXTERNAL_RAM_START, INVALID_READ};

pub mod header;
pub mod mbc;
pub mod mbc3;
pub mod mbc5;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MbcKind {
    None,
    Mbc1,
    Mbc3,
    Mbc5,
}

/// What the cartridge type byte says is soldered onto the cartridge.
#[derive(Debug, Copy, Clone)]
pub struct CartridgeCapabilities {
    pub kind: MbcKind,
    pub has_ram: bool,
    pub has_battery: bool,
    pub has_rtc: bool,
    pub has_rumble: bool,
}

/// Decode the type byte at 0x147. This is the single source of truth for
/// mapper selection; the byte itself stays in the header untouched.
pub fn capabilities_for_type(cartridge_type: u8) -> Result<CartridgeCapabilities, RomLoadError> {
    let (kind, has_ram, has_battery, has_rtc, has_rumble) = match cartridge_type {
        0x00 => (MbcKind::None, false, false, false, false),
        0x08 => (MbcKind::None, true, false, false, false),
        0x09 => (MbcKind::None, true, true, false, false),
        0x01 => (MbcKind::Mbc1, false, false, false, false),
        0x02 => (MbcKind::Mbc1, true, false, false, false),
        0x03 => (MbcKind::Mbc1, true, true, false, false),
        0x0F => (MbcKind::Mbc3, false, true, true, false),
        0x10 => (MbcKind::Mbc3, true, true, true, false),
        0x11 => (MbcKind::Mbc3, false, false, false, false),
        0x12 => (MbcKind::Mbc3, true, false, false, false),
        0x13 => (MbcKind::Mbc3, true, true, false, false),
        0x19 => (MbcKind::Mbc5, false, false, false, false),
        0x1A => (MbcKind::Mbc5, true, false, false, false),
        0x1B => (MbcKind::Mbc5, true, true, false, false),
        0x1C => (MbcKind::Mbc5, false, false, false, true),
        0x1D => (MbcKind::Mbc5, true, false, false, true),
        0x1E => (MbcKind::Mbc5, true, true, false, true),
        kind => return Err(RomLoadError::UnsupportedCartridgeType { kind }),
    };

    Ok(CartridgeCapabilities {
        kind,
        has_ram,
        has_battery,
        has_rtc,
        has_rumble,
    })
}

/// The mapper state, one fixed variant per supported MBC.
#[derive(Debug, Clone)]
pub enum Mbc {
    None,
    Mbc1(Mbc1),
    Mbc3(Mbc3),
    Mbc5(Mbc5),
}

pub struct Cartridge {
    header: CartridgeHeader,
    capabilities: CartridgeCapabilities,
    rom: Vec<u8>,
    ram: Vec<u8>,
    pub(crate) mbc: Mbc,
}

impl Cartridge {
    pub fn new(rom: &[u8], saved_ram: Option<&[u8]>) -> Result<Self, RomLoadError> {
        let header = CartridgeHeader::parse(rom)?;
        let capabilities = capabilities_for_type(header.cartridge_type)?;

        // Pad short images up to the size the header declares so banked
        // indexing never runs off the end.
        let declared_size = header.rom_size()?;
        let mut rom = rom.to_vec();
        if rom.len() < declared_size {
            log::info!(
                "Padding ROM from {} to the declared {} bytes",
                rom.len(),
                declared_size
            );
            rom.resize(declared_size, INVALID_READ);
        }
        // Round up to a whole number of banks.
        let bank_count = Integer::div_ceil(&rom.len(), &ROM_BANK_SIZE);
        rom.resize(bank_count * ROM_BANK_SIZE, INVALID_READ);

        let mbc = match capabilities.kind {
            MbcKind::None => Mbc::None,
            MbcKind::Mbc1 => Mbc::Mbc1(Mbc1::new()),
            MbcKind::Mbc3 => Mbc::Mbc3(Mbc3::new(capabilities.has_rtc)),
            MbcKind::Mbc5 => Mbc::Mbc5(Mbc5::new(capabilities.has_rumble)),
        };

        log::info!(
            "Loaded \"{}\" ({:?}, {} ROM banks, {} bytes RAM)",
            header.title,
            capabilities.kind,
            rom.len() / ROM_BANK_SIZE,
            header.ram_size()?
        );

        let mut result = Cartridge {
            ram: vec![0; header.ram_size()?],
            header,
            capabilities,
            rom,
            mbc,
        };

        if let Some(saved) = saved_ram {
            result.load_ram_bytes(saved);
        }

        Ok(result)
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn capabilities(&self) -> &CartridgeCapabilities {
        &self.capabilities
    }

    /// 0x0000-0x3FFF. Fixed to bank 0 everywhere except MBC1 in RAM
    /// banking mode, where the upper-bank bits shift into this region too.
    pub fn read_rom_low(&self, address: u16) -> u8 {
        let bank = match &self.mbc {
            Mbc::Mbc1(mbc) => mbc.low_region_bank(self.rom_bank_count()),
            _ => 0,
        };

        self.rom[bank * ROM_BANK_SIZE + address as usize]
    }

    /// 0x4000-0x7FFF, the switchable region.
    pub fn read_rom_high(&self, address: u16) -> u8 {
        let bank_count = self.rom_bank_count();
        let bank = match &self.mbc {
            Mbc::None => 1,
            Mbc::Mbc1(mbc) => mbc.high_region_bank(bank_count),
            Mbc::Mbc3(mbc) => mbc.high_region_bank(bank_count),
            Mbc::Mbc5(mbc) => mbc.high_region_bank(bank_count),
        };

        self.rom[bank * ROM_BANK_SIZE + (address as usize & 0x3FFF)]
    }

    /// 0xA000-0xBFFF: external RAM, or the currently selected RTC register
    /// on MBC3.
    pub fn read_external_ram(&self, address: u16) -> u8 {
        let offset = (address - EXTERNAL_RAM_START) as usize;

        match &self.mbc {
            Mbc::None => {
                if self.capabilities.has_ram && offset < self.ram.len() {
                    self.ram[offset]
                } else {
                    INVALID_READ
                }
            }
            Mbc::Mbc1(mbc) => {
                if mbc.ram_enabled && !self.ram.is_empty() {
                    self.ram[(mbc.ram_bank() * RAM_BANK_SIZE + offset) % self.ram.len()]
                } else {
                    INVALID_READ
                }
            }
            Mbc::Mbc3(mbc) => {
                if !mbc.ram_and_rtc_enabled {
                    INVALID_READ
                } else if mbc.rtc_mapped() {
                    match &mbc.rtc {
                        Some(rtc) => rtc.read_register(mbc.mapped_bank),
                        None => INVALID_READ,
                    }
                } else if mbc.mapped_bank <= 0x3 && !self.ram.is_empty() {
                    self.ram[(mbc.mapped_bank as usize * RAM_BANK_SIZE + offset) % self.ram.len()]
                } else {
                    INVALID_READ
                }
            }
            Mbc::Mbc5(mbc) => {
                if mbc.ram_enabled && !self.ram.is_empty() {
                    self.ram[(mbc.ram_bank() * RAM_BANK_SIZE + offset) % self.ram.len()]
                } else {
                    INVALID_READ
                }
            }
        }
    }

    /// Writes anywhere in 0x0000-0x7FFF program the mapper; writes in
    /// 0xA000-0xBFFF go to RAM (or an RTC register). Everything else on a
    /// plain cartridge is silently ignored.
    pub fn write_byte(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x7FFF => match &mut self.mbc {
                Mbc::None => log::trace!("ROM write ignored on plain cartridge: 0x{:04X}", address),
                Mbc::Mbc1(mbc) => mbc.write_control(address, value),
                Mbc::Mbc3(mbc) => mbc.write_control(address, value),
                Mbc::Mbc5(mbc) => mbc.write_control(address, value),
            },
            0xA000..=0xBFFF => self.write_external_ram(address, value),
            _ => {}
        }
    }

    fn write_external_ram(&mut self, address: u16, value: u8) {
        let offset = (address - EXTERNAL_RAM_START) as usize;
        let ram_len = self.ram.len();

        match &mut self.mbc {
            Mbc::None => {
                if self.capabilities.has_ram && offset < ram_len {
                    self.ram[offset] = value;
                }
            }
            Mbc::Mbc1(mbc) => {
                if mbc.ram_enabled && ram_len != 0 {
                    self.ram[(mbc.ram_bank() * RAM_BANK_SIZE + offset) % ram_len] = value;
                }
            }
            Mbc::Mbc3(mbc) => {
                if !mbc.ram_and_rtc_enabled {
                    return;
                }
                if mbc.rtc_mapped() {
                    let register = mbc.mapped_bank;
                    if let Some(rtc) = mbc.rtc.as_mut() {
                        rtc.write_register(register, value);
                    }
                } else if mbc.mapped_bank <= 0x3 && ram_len != 0 {
                    self.ram[(mbc.mapped_bank as usize * RAM_BANK_SIZE + offset) % ram_len] = value;
                }
            }
            Mbc::Mbc5(mbc) => {
                if mbc.ram_enabled && ram_len != 0 {
                    self.ram[(mbc.ram_bank() * RAM_BANK_SIZE + offset) % ram_len] = value;
                }
            }
        }
    }

    /// Feed the emulated T-cycle stream to whatever on-cartridge hardware
    /// keeps time.
    pub fn step(&mut self, t_cycles: u64) {
        if let Mbc::Mbc3(mbc) = &mut self.mbc {
            if let Some(rtc) = mbc.rtc.as_mut() {
                rtc.tick(t_cycles);
            }
        }
    }

    pub fn has_battery(&self) -> bool {
        self.capabilities.has_battery
    }

    /// The external RAM contents for battery-backed cartridges, for the
    /// save collaborator.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        if self.has_battery() {
            Some(&self.ram)
        } else {
            None
        }
    }

    pub fn ram_bytes(&self) -> &[u8] {
        &self.ram
    }

    /// Restore external RAM, padding or truncating to the declared size.
    pub fn load_ram_bytes(&mut self, bytes: &[u8]) {
        let copy_len = bytes.len().min(self.ram.len());
        self.ram[..copy_len].copy_from_slice(&bytes[..copy_len]);
        for byte in self.ram[copy_len..].iter_mut() {
            *byte = 0;
        }
    }

    pub fn rtc(&self) -> Option<&RealTimeClock> {
        match &self.mbc {
            Mbc::Mbc3(mbc) => mbc.rtc.as_ref(),
            _ => None,
        }
    }

    pub fn persisted_rtc(&self, timestamp: u64) -> Option<PersistedClock> {
        self.rtc().map(|rtc| rtc.to_persisted(timestamp))
    }

    pub fn load_persisted_rtc(&mut self, persisted: &PersistedClock, now: u64) {
        if let Mbc::Mbc3(mbc) = &mut self.mbc {
            if mbc.rtc.is_some() {
                mbc.rtc = Some(RealTimeClock::from_persisted(persisted, now));
            }
        }
    }

    pub(crate) fn rom_bytes(&self) -> &[u8] {
        &self.rom
    }

    pub(crate) fn ram_mut(&mut self) -> &mut Vec<u8> {
        &mut self.ram
    }

    fn rom_bank_count(&self) -> usize {
        self.rom.len() / ROM_BANK_SIZE
    }
}
