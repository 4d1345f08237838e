use bitflags::*;

use crate::hardware::ppu::Mode;

// # PPU FLAGS #

bitflags! {
    /// FF40
    /// LCDC is a powerful tool: each bit controls a lot of behavior,
    /// and can be modified at any time during the frame.
    #[derive(Default)]
    pub struct LcdControl: u8 {
        /// `BG_WINDOW_PRIORITY` has different meanings depending on Game Boy type and Mode:
        ///
        /// # Monochrome Game Boy and CGB in Non-CGB Mode: BG Display
        /// When Bit 0 is cleared, both background and window become blank (white),
        /// and the Window Display Bit is ignored in that case.
        /// Only Sprites may still be displayed (if enabled in Bit 1).
        ///
        /// # CGB in CGB Mode: BG and Window Master Priority
        /// When Bit 0 is cleared, the background and window lose their priority -
        /// the sprites will always be displayed on top of background and window,
        /// independently of the priority flags in OAM and BG Map attributes.
        const BG_WINDOW_PRIORITY = 0b0000_0001;
        /// This bit toggles whether sprites are displayed or not.
        const SPRITE_DISPLAY_ENABLE = 0b0000_0010;
        /// This bit controls the sprite size (1 tile or 2 stacked vertically).
        const SPRITE_SIZE = 0b0000_0100;
        /// LCDC.3
        /// If the bit is reset the BG uses tilemap `$9800`, otherwise tilemap `$9C00`.
        const BG_TILE_MAP_SELECT = 0b0000_1000;
        /// LCDC.4
        /// 0=8800-97FF (signed addressing), 1=8000-8FFF (unsigned addressing).
        /// Sprites aren't affected and always use $8000 addressing.
        const BG_WINDOW_TILE_SELECT = 0b0001_0000;
        /// This bit controls whether the window shall be displayed or not.
        /// Overridden on DMG by bit 0 if that bit is reset.
        const WINDOW_DISPLAY = 0b0010_0000;
        /// LCDC.6
        /// When reset the window uses the `$9800` tilemap, otherwise `$9C00`.
        const WINDOW_MAP_SELECT = 0b0100_0000;
        /// This bit controls whether the LCD is on and the PPU is active.
        const LCD_DISPLAY = 0b1000_0000;
    }
}

bitflags! {
    /// FF41
    /// Bits 0-2 are live state (mode + coincidence) and read-only; bits 3-6
    /// arm the four STAT interrupt sources.
    #[derive(Default)]
    pub struct LcdStatus: u8 {
        /// Mode Flag (Mode 0-3) (Read Only)
        /// * 0: During H-Blank
        /// * 1: During V-Blank
        /// * 2: During Searching OAM
        /// * 3: During Transferring Data to LCD Driver
        const MODE_FLAG_0 = 0b0000_0001;
        /// Extension of `MODE_FLAG_0`
        const MODE_FLAG_1 = 0b0000_0010;
        /// (0:LYC<>LY, 1:LYC=LY) (Read Only)
        const COINCIDENCE_FLAG = 0b0000_0100;
        /// Mode 0 H-Blank Interrupt
        const MODE_0_H_INTERRUPT = 0b0000_1000;
        /// Mode 1 V-Blank Interrupt
        const MODE_1_V_INTERRUPT = 0b0001_0000;
        /// Mode 2 OAM Interrupt
        const MODE_2_OAM_INTERRUPT = 0b0010_0000;
        /// LYC=LY Coincidence Interrupt (1=Enable) (Read/Write)
        const COINCIDENCE_INTERRUPT = 0b0100_0000;
    }
}

bitflags! {
    /// The attribute byte of an OAM entry.
    #[derive(Default)]
    pub struct AttributeFlags: u8 {
        /// **CGB Mode Only** (OBP0-7)
        const PALETTE_NUMBER_CGB = 0b0000_0111;
        /// **CGB Mode Only** (0=Bank 0, 1=Bank 1)
        const TILE_VRAM_BANK = 0b0000_1000;
        /// **Non CGB Mode Only** (0=OBP0, 1=OBP1)
        const PALETTE_NUMBER = 0b0001_0000;
        /// (0=Normal, 1=Horizontally mirrored)
        const X_FLIP = 0b0010_0000;
        /// (0=Normal, 1=Vertically mirrored)
        const Y_FLIP = 0b0100_0000;
        /// (0=OBJ Above BG, 1=OBJ Behind BG color 1-3)
        /// (BG color 0 is always behind OBJ)
        const OBJ_TO_BG_PRIORITY = 0b1000_0000;
    }
}

impl AttributeFlags {
    pub fn cgb_palette_number(&self) -> usize {
        (self.bits() & 0x07) as usize
    }
}

impl LcdStatus {
    pub fn mode_flag(&self) -> Mode {
        match self.bits() & 0x3 {
            0 => Mode::HBlank,
            1 => Mode::VBlank,
            2 => Mode::OamSearch,
            _ => Mode::LcdTransfer,
        }
    }

    pub fn set_mode_flag(&mut self, value: Mode) {
        let mode_bits = match value {
            Mode::HBlank => 0,
            Mode::VBlank => 1,
            Mode::OamSearch => 2,
            Mode::LcdTransfer => 3,
        };
        *self = LcdStatus::from_bits_truncate((self.bits() & 0xFC) | mode_bits);
    }
}
