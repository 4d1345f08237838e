use bitflags::*;

/// The flag used to signal that an interrupt is pending (IF).
pub const INTERRUPTS_FLAG: u16 = 0xFF0F;
/// Interrupts Enable Register (IE)
pub const INTERRUPTS_ENABLE: u16 = 0xFFFF;

/// All interrupts the hardware knows about, ordered by priority
/// (lowest bit wins).
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub fn iter() -> impl Iterator<Item = Interrupt> {
        use Interrupt::*;
        [VBlank, LcdStat, Timer, Serial, Joypad].iter().copied()
    }

    /// The address the CPU jumps to when dispatching this interrupt.
    pub fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::LcdStat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }

    pub fn flag(self) -> InterruptFlags {
        match self {
            Interrupt::VBlank => InterruptFlags::VBLANK,
            Interrupt::LcdStat => InterruptFlags::LCD,
            Interrupt::Timer => InterruptFlags::TIMER,
            Interrupt::Serial => InterruptFlags::SERIAL,
            Interrupt::Joypad => InterruptFlags::JOYPAD,
        }
    }
}

bitflags! {
    #[derive(Default)]
    pub struct InterruptFlags: u8 {
        /// V-Blank
        const VBLANK = 0b0000_0001;
        /// LCD Stat
        const LCD    = 0b0000_0010;
        /// Timer
        const TIMER  = 0b0000_0100;
        /// Serial
        const SERIAL = 0b0000_1000;
        /// Joypad
        const JOYPAD = 0b0001_0000;
    }
}

/// The IF/IE register pair. Five meaningful bits each, where the upper three
/// bits of IF always read as 1.
#[derive(Default, Debug, Clone)]
pub struct InterruptController {
    pub interrupt_enable: InterruptFlags,
    pub interrupt_flag: InterruptFlags,
}

impl InterruptController {
    pub fn new() -> Self {
        Default::default()
    }

    /// Raise the IF bit for the provided interrupt.
    #[inline]
    pub fn request(&mut self, interrupt: Interrupt) {
        self.interrupt_flag.insert(interrupt.flag());
    }

    #[inline]
    pub fn insert_interrupts(&mut self, interrupts: InterruptFlags) {
        self.interrupt_flag.insert(interrupts);
    }

    /// Clear the IF bit for the provided interrupt, done while the CPU
    /// dispatches it.
    #[inline]
    pub fn acknowledge(&mut self, interrupt: Interrupt) {
        self.interrupt_flag.remove(interrupt.flag());
    }

    /// The highest-priority interrupt which is both requested and enabled,
    /// if any. Priority follows the bit order, lowest bit first.
    pub fn pending(&self) -> Option<Interrupt> {
        let masked = self.interrupt_flag & self.interrupt_enable;
        Interrupt::iter().find(|i| masked.contains(i.flag()))
    }

    /// `true` whenever `(IF & IE & 0x1F) != 0`, regardless of IME.
    /// This is what wakes a halted CPU.
    #[inline]
    pub fn has_pending(&self) -> bool {
        !(self.interrupt_flag & self.interrupt_enable).is_empty()
    }

    pub fn flag_register(&self) -> u8 {
        0xE0 | self.interrupt_flag.bits()
    }

    pub fn set_flag_register(&mut self, value: u8) {
        self.interrupt_flag = InterruptFlags::from_bits_truncate(value);
    }

    pub fn enable_register(&self) -> u8 {
        self.interrupt_enable.bits()
    }

    pub fn set_enable_register(&mut self, value: u8) {
        self.interrupt_enable = InterruptFlags::from_bits_truncate(value);
    }
}
