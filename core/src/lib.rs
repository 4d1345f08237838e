pub mod emulator;
pub mod error;
pub mod hardware;
pub mod io;
pub mod savestate;

pub use crate::emulator::{Emulator, EmulatorMode, HardwareMode, CYCLES_PER_FRAME};
pub use crate::hardware::ppu::palette::{DisplayColour, RGB};
pub use crate::io::joypad::InputKey;

use crate::hardware::ppu::palette;

/// Struct for wrapping all the various options for the `Emulator`.
#[derive(Debug)]
pub struct EmulatorOptions {
    /// Battery RAM restored from an earlier run, if any.
    pub saved_ram: Option<Vec<u8>>,
    /// Force DMG/CGB behaviour, or let the cartridge header decide.
    pub hardware_mode: HardwareMode,
    /// The shade set used by the DMG colour path.
    pub display_colours: DisplayColour,
}

#[derive(Debug)]
pub struct EmulatorOptionsBuilder {
    saved_ram: Option<Vec<u8>>,
    hardware_mode: HardwareMode,
    display_colours: DisplayColour,
}

impl EmulatorOptionsBuilder {
    pub fn new() -> Self {
        EmulatorOptionsBuilder {
            saved_ram: None,
            hardware_mode: HardwareMode::Auto,
            display_colours: palette::GRAYSCALE,
        }
    }

    pub fn saved_ram(mut self, saved_ram: Option<Vec<u8>>) -> Self {
        self.saved_ram = saved_ram;
        self
    }

    pub fn with_mode(mut self, mode: HardwareMode) -> Self {
        self.hardware_mode = mode;
        self
    }

    pub fn display_colours(mut self, colours: DisplayColour) -> Self {
        self.display_colours = colours;
        self
    }

    pub fn build(self) -> EmulatorOptions {
        EmulatorOptions {
            saved_ram: self.saved_ram,
            hardware_mode: self.hardware_mode,
            display_colours: self.display_colours,
        }
    }
}

impl Default for EmulatorOptionsBuilder {
    fn default() -> Self {
        EmulatorOptionsBuilder::new()
    }
}

impl From<EmulatorOptions> for EmulatorOptionsBuilder {
    fn from(from: EmulatorOptions) -> Self {
        EmulatorOptionsBuilder {
            saved_ram: from.saved_ram,
            hardware_mode: from.hardware_mode,
            display_colours: from.display_colours,
        }
    }
}
