//! Joypad implementation, the register exposes either the button or the
//! direction lines depending on which select bit the game last wrote.

use bitflags::*;

use crate::io::interrupts::{Interrupt, InterruptController};

pub const JOYPAD_REGISTER: u16 = 0xFF00;

#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub enum InputKey {
    Start,
    Select,
    A,
    B,
    Up,
    Down,
    Left,
    Right,
}

impl InputKey {
    pub fn iter() -> impl Iterator<Item = InputKey> {
        use InputKey::*;
        [Start, Select, A, B, Up, Down, Left, Right].iter().copied()
    }

    fn line(self) -> JoypadLines {
        match self {
            InputKey::Start | InputKey::Down => JoypadLines::DOWN_START,
            InputKey::Select | InputKey::Up => JoypadLines::UP_SELECT,
            InputKey::B | InputKey::Left => JoypadLines::LEFT_B,
            InputKey::A | InputKey::Right => JoypadLines::RIGHT_A,
        }
    }

    fn is_direction(self) -> bool {
        use InputKey::*;
        matches!(self, Up | Down | Left | Right)
    }
}

bitflags! {
    #[derive(Default)]
    struct JoypadLines: u8 {
        /// Right or A
        const RIGHT_A        = 0b0000_0001;
        /// Left or B
        const LEFT_B         = 0b0000_0010;
        /// Up or Select
        const UP_SELECT      = 0b0000_0100;
        /// Down or Start
        const DOWN_START     = 0b0000_1000;
        /// Select direction keys (active low in the register)
        const DIRECTION_KEYS = 0b0001_0000;
        /// Select button keys (active low in the register)
        const BUTTON_KEYS    = 0b0010_0000;
    }
}

/// P1/JOYP. All lines are active low on hardware, so we keep the pressed
/// state in positive logic and invert when the register is read.
#[derive(Debug, Clone)]
pub struct Joypad {
    pressed_buttons: JoypadLines,
    pressed_directions: JoypadLines,
    selected_mode: JoypadLines,
}

impl Joypad {
    pub fn new() -> Self {
        Joypad {
            pressed_buttons: JoypadLines::empty(),
            pressed_directions: JoypadLines::empty(),
            selected_mode: JoypadLines::empty(),
        }
    }

    /// Read P1 for the most recently selected group (buttons/directions).
    pub fn read_register(&self) -> u8 {
        let mut result = self.selected_mode;

        if self.selected_mode.contains(JoypadLines::BUTTON_KEYS) {
            result.insert(self.pressed_buttons);
        }
        if self.selected_mode.contains(JoypadLines::DIRECTION_KEYS) {
            result.insert(self.pressed_directions);
        }

        !result.bits()
    }

    /// Write P1. Only the two select bits are writable, the low nibble is
    /// discarded.
    pub fn write_register(&mut self, value: u8) {
        self.selected_mode = JoypadLines::from_bits_truncate(!value & 0b0011_0000);
    }

    /// Register a key as pressed down.
    ///
    /// The Joypad interrupt fires only on a high-to-low transition of a
    /// selected P1 line, so a fresh press of a key whose group is currently
    /// selected.
    pub fn press_key(&mut self, input: InputKey, interrupts: &mut InterruptController) {
        let line = input.line();
        let (lines, select) = if input.is_direction() {
            (&mut self.pressed_directions, JoypadLines::DIRECTION_KEYS)
        } else {
            (&mut self.pressed_buttons, JoypadLines::BUTTON_KEYS)
        };

        let newly_pressed = !lines.contains(line);
        lines.insert(line);

        if newly_pressed && self.selected_mode.contains(select) {
            interrupts.request(Interrupt::Joypad);
        }
    }

    /// Release a key that was pressed down before.
    pub fn release_key(&mut self, input: InputKey) {
        if input.is_direction() {
            self.pressed_directions.remove(input.line());
        } else {
            self.pressed_buttons.remove(input.line());
        }
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Joypad::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unselected_register_reads_high() {
        let mut joypad = Joypad::new();
        let mut interrupts = InterruptController::new();

        joypad.press_key(InputKey::A, &mut interrupts);

        assert_eq!(joypad.read_register() & 0x0F, 0x0F);
    }

    #[test]
    fn test_selected_group_reads_pressed_line_low() {
        let mut joypad = Joypad::new();
        let mut interrupts = InterruptController::new();

        // Select buttons (bit 5 low).
        joypad.write_register(0b0001_0000);
        joypad.press_key(InputKey::A, &mut interrupts);

        assert_eq!(joypad.read_register() & 0x0F, 0b1110);

        joypad.release_key(InputKey::A);

        assert_eq!(joypad.read_register() & 0x0F, 0x0F);
    }

    #[test]
    fn test_interrupt_only_on_selected_fresh_press() {
        let mut joypad = Joypad::new();
        let mut interrupts = InterruptController::new();
        interrupts.set_enable_register(0x1F);

        // Directions selected, button press should not raise the interrupt.
        joypad.write_register(0b0010_0000);
        joypad.press_key(InputKey::Start, &mut interrupts);

        assert_eq!(interrupts.pending(), None);

        joypad.press_key(InputKey::Down, &mut interrupts);

        assert_eq!(interrupts.pending(), Some(Interrupt::Joypad));

        // Holding the key produces no further edge.
        interrupts.acknowledge(Interrupt::Joypad);
        joypad.press_key(InputKey::Down, &mut interrupts);

        assert_eq!(interrupts.pending(), None);
    }
}
