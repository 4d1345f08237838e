use crate::error::RomLoadError;

pub const HEADER_START: u16 = 0x0100;
pub const HEADER_END: u16 = 0x014F;

/// The smallest image that still contains a complete header and two ROM
/// banks.
pub const MINIMAL_ROM_SIZE: usize = 0x8000;

/// Every licensed cartridge carries this bitmap at 0x104-0x133; the real
/// boot ROM refuses to start when it differs.
pub(crate) const NINTENDO_LOGO: [u8; 48] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D,
    0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6, 0xDD, 0xDD, 0xD9, 0x99,
    0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC, 0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
];

/// The parsed 0x0100-0x014F region of a ROM image.
#[derive(Debug, Default, Clone)]
pub struct CartridgeHeader {
    /// Upper case ASCII, up to 16 characters on DMG carts; CGB carts reuse
    /// the tail of the title area for the CGB flag.
    pub title: String,
    /// 0x80 (CGB enhanced) or 0xC0 (CGB only) at 0x143.
    pub cgb_flag: bool,
    /// Whether the game supports SGB functions.
    pub sgb_flag: bool,
    /// Which Memory Bank Controller (if any) the cartridge carries, and
    /// what further hardware (RAM/battery/RTC/rumble) exists on it.
    pub cartridge_type: u8,
    /// ROM size code; the total size is `32 KiB << code`.
    pub rom_size_code: u8,
    /// External RAM size code, a table lookup.
    pub ram_size_code: u8,
    /// Result of the byte-for-byte comparison of the logo area.
    pub logo_valid: bool,
    /// The stored header checksum at 0x14D.
    pub header_checksum: u8,
    /// Whether the recomputed checksum over 0x134-0x14C matches.
    pub checksum_valid: bool,
    /// 16-bit checksum over the whole ROM, not verified by hardware.
    pub global_checksum: u16,
}

impl CartridgeHeader {
    pub fn parse(rom: &[u8]) -> Result<Self, RomLoadError> {
        if rom.len() < MINIMAL_ROM_SIZE {
            return Err(RomLoadError::TooSmall { size: rom.len() });
        }

        let cgb_flag = matches!(rom[0x143], 0x80 | 0xC0);
        let header_checksum = rom[0x14D];
        let computed = compute_header_checksum(rom);

        let header = CartridgeHeader {
            title: read_title(rom, cgb_flag),
            cgb_flag,
            sgb_flag: rom[0x146] == 0x03,
            cartridge_type: rom[0x147],
            rom_size_code: rom[0x148],
            ram_size_code: rom[0x149],
            logo_valid: rom[0x104..=0x133] == NINTENDO_LOGO[..],
            header_checksum,
            checksum_valid: header_checksum == computed,
            global_checksum: ((rom[0x14E] as u16) << 8) | rom[0x14F] as u16,
        };

        if !header.logo_valid {
            log::warn!("ROM logo area does not match, real hardware would refuse to boot this");
        }
        if !header.checksum_valid {
            log::warn!(
                "Header checksum mismatch: stored 0x{:02X}, computed 0x{:02X}",
                header_checksum,
                computed
            );
        }

        // Probe the size codes up front so a bad header fails the load
        // rather than the first banked access.
        header.rom_size()?;
        header.ram_size()?;

        Ok(header)
    }

    /// Total ROM size in bytes: `32 KiB << code` for codes 0-8.
    pub fn rom_size(&self) -> Result<usize, RomLoadError> {
        match self.rom_size_code {
            code @ 0..=8 => Ok(0x8000 << code),
            code => Err(RomLoadError::InvalidRomSize { code }),
        }
    }

    /// External RAM size in bytes.
    pub fn ram_size(&self) -> Result<usize, RomLoadError> {
        match self.ram_size_code {
            0 => Ok(0),
            1 => Ok(0x800),
            2 => Ok(0x2000),
            3 => Ok(0x8000),
            4 => Ok(0x20000),
            5 => Ok(0x10000),
            code => Err(RomLoadError::InvalidRamSize { code }),
        }
    }
}

fn read_title(rom: &[u8], cgb_flag: bool) -> String {
    // CGB carts use 0x13F-0x143 for manufacturer code and CGB flag.
    let slice = if cgb_flag {
        &rom[0x134..=0x13E]
    } else {
        &rom[0x134..=0x143]
    };

    String::from_utf8_lossy(slice)
        .trim_matches(char::from(0))
        .to_owned()
}

/// `x = 0; for i in 0x134..=0x14C { x = x - rom[i] - 1 }`, kept to the low
/// 8 bits.
pub(crate) fn compute_header_checksum(rom: &[u8]) -> u8 {
    rom[0x134..=0x14C]
        .iter()
        .fold(0u8, |acc, byte| acc.wrapping_sub(*byte).wrapping_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_rom;

    #[test]
    fn test_reject_undersized_rom() {
        let result = CartridgeHeader::parse(&[0u8; 0x150]);
        assert_eq!(
            result.unwrap_err(),
            crate::error::RomLoadError::TooSmall { size: 0x150 }
        );
    }

    #[test]
    fn test_parse_title_and_checks() {
        let header = CartridgeHeader::parse(&test_rom(0x00)).unwrap();

        assert_eq!(header.title, "HELLO WOR");
        assert!(header.logo_valid);
        assert!(header.checksum_valid);
        assert!(!header.cgb_flag);
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let mut rom = test_rom(0x00);
        rom[0x134] = b'X';

        let header = CartridgeHeader::parse(&rom).unwrap();
        assert!(!header.checksum_valid);
    }

    #[test]
    fn test_size_tables() {
        let mut rom = test_rom(0x00);
        rom[0x148] = 0x02;
        rom[0x149] = 0x03;
        rom[0x14D] = compute_header_checksum(&rom);

        let header = CartridgeHeader::parse(&rom).unwrap();
        assert_eq!(header.rom_size().unwrap(), 0x20000);
        assert_eq!(header.ram_size().unwrap(), 0x8000);

        rom[0x148] = 0x52;
        assert!(CartridgeHeader::parse(&rom).is_err());
    }
}
