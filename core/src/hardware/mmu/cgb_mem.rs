//! CGB-only controller registers. In double speed mode the CPU, timer,
//! serial port and OAM DMA run twice as fast; the PPU and the cartridge
//! clock do not.

/// KEY0: the compatibility-mode register the boot ROM writes after probing
/// the cartridge. We only keep it for savestates.
pub const CGB_KEY0: u16 = 0xFF4C;
/// KEY1: bit 0 arms a speed switch which the next STOP performs, bit 7
/// reports the current speed.
pub const CGB_PREPARE_SWITCH: u16 = 0xFF4D;

#[derive(Debug)]
pub struct CgbState {
    pub key0: u8,
    /// Whether double speed mode is currently enabled.
    pub double_speed: bool,
    prepare_speed_switch: u8,
}

impl CgbState {
    pub fn new() -> Self {
        CgbState {
            key0: 0,
            double_speed: false,
            prepare_speed_switch: 0x7E,
        }
    }

    /// Flip the speed and clear the armed bit, performed by STOP.
    pub fn toggle_speed(&mut self) {
        self.double_speed = !self.double_speed;
        self.prepare_speed_switch = if self.double_speed {
            0x80 | (self.prepare_speed_switch & 0x7E)
        } else {
            self.prepare_speed_switch & 0x7E
        };

        log::info!(
            "Speed switch performed, double speed now {}",
            self.double_speed
        );
    }

    pub fn speed_switch_armed(&self) -> bool {
        (self.prepare_speed_switch & 0x01) == 1
    }

    pub fn read_prepare_switch(&self) -> u8 {
        self.prepare_speed_switch
    }

    pub fn write_prepare_switch(&mut self, value: u8) {
        self.prepare_speed_switch = (self.prepare_speed_switch & 0x80) | 0x7E | (value & 0x01);
    }

    pub(crate) fn restore(&mut self, key0: u8, key1: u8, double_speed: bool) {
        self.key0 = key0;
        self.prepare_speed_switch = key1;
        self.double_speed = double_speed;
    }
}

impl Default for CgbState {
    fn default() -> Self {
        CgbState::new()
    }
}
