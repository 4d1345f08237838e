//! Mnemonic lookup for the trace log. Only the base table is spelled
//! out; CB-prefixed opcodes are uniform enough to format on the fly.

/// The assembly mnemonic for a base-table opcode.
pub fn base_mnemonic(opcode: u8) -> &'static str {
    match opcode {
        0x00 => "NOP",
        0x01 => "LD BC,u16",
        0x02 => "LD (BC),A",
        0x03 => "INC BC",
        0x04 => "INC B",
        0x05 => "DEC B",
        0x06 => "LD B,u8",
        0x07 => "RLCA",
        0x08 => "LD (u16),SP",
        0x09 => "ADD HL,BC",
        0x0A => "LD A,(BC)",
        0x0B => "DEC BC",
        0x0C => "INC C",
        0x0D => "DEC C",
        0x0E => "LD C,u8",
        0x0F => "RRCA",
        0x10 => "STOP",
        0x11 => "LD DE,u16",
        0x12 => "LD (DE),A",
        0x13 => "INC DE",
        0x14 => "INC D",
        0x15 => "DEC D",
        0x16 => "LD D,u8",
        0x17 => "RLA",
        0x18 => "JR i8",
        0x19 => "ADD HL,DE",
        0x1A => "LD A,(DE)",
        0x1B => "DEC DE",
        0x1C => "INC E",
        0x1D => "DEC E",
        0x1E => "LD E,u8",
        0x1F => "RRA",
        0x20 => "JR NZ,i8",
        0x21 => "LD HL,u16",
        0x22 => "LD (HL+),A",
        0x23 => "INC HL",
        0x24 => "INC H",
        0x25 => "DEC H",
        0x26 => "LD H,u8",
        0x27 => "DAA",
        0x28 => "JR Z,i8",
        0x29 => "ADD HL,HL",
        0x2A => "LD A,(HL+)",
        0x2B => "DEC HL",
        0x2C => "INC L",
        0x2D => "DEC L",
        0x2E => "LD L,u8",
        0x2F => "CPL",
        0x30 => "JR NC,i8",
        0x31 => "LD SP,u16",
        0x32 => "LD (HL-),A",
        0x33 => "INC SP",
        0x34 => "INC (HL)",
        0x35 => "DEC (HL)",
        0x36 => "LD (HL),u8",
        0x37 => "SCF",
        0x38 => "JR C,i8",
        0x39 => "ADD HL,SP",
        0x3A => "LD A,(HL-)",
        0x3B => "DEC SP",
        0x3C => "INC A",
        0x3D => "DEC A",
        0x3E => "LD A,u8",
        0x3F => "CCF",
        0x76 => "HALT",
        0x40..=0x7F => "LD r,r",
        0x80..=0x87 => "ADD A,r",
        0x88..=0x8F => "ADC A,r",
        0x90..=0x97 => "SUB A,r",
        0x98..=0x9F => "SBC A,r",
        0xA0..=0xA7 => "AND A,r",
        0xA8..=0xAF => "XOR A,r",
        0xB0..=0xB7 => "OR A,r",
        0xB8..=0xBF => "CP A,r",
        0xC0 => "RET NZ",
        0xC1 => "POP BC",
        0xC2 => "JP NZ,u16",
        0xC3 => "JP u16",
        0xC4 => "CALL NZ,u16",
        0xC5 => "PUSH BC",
        0xC6 => "ADD A,u8",
        0xC7 => "RST 00h",
        0xC8 => "RET Z",
        0xC9 => "RET",
        0xCA => "JP Z,u16",
        0xCB => "PREFIX CB",
        0xCC => "CALL Z,u16",
        0xCD => "CALL u16",
        0xCE => "ADC A,u8",
        0xCF => "RST 08h",
        0xD0 => "RET NC",
        0xD1 => "POP DE",
        0xD2 => "JP NC,u16",
        0xD4 => "CALL NC,u16",
        0xD5 => "PUSH DE",
        0xD6 => "SUB A,u8",
        0xD7 => "RST 10h",
        0xD8 => "RET C",
        0xD9 => "RETI",
        0xDA => "JP C,u16",
        0xDC => "CALL C,u16",
        0xDE => "SBC A,u8",
        0xDF => "RST 18h",
        0xE0 => "LD (FF00+u8),A",
        0xE1 => "POP HL",
        0xE2 => "LD (FF00+C),A",
        0xE5 => "PUSH HL",
        0xE6 => "AND A,u8",
        0xE7 => "RST 20h",
        0xE8 => "ADD SP,i8",
        0xE9 => "JP HL",
        0xEA => "LD (u16),A",
        0xEE => "XOR A,u8",
        0xEF => "RST 28h",
        0xF0 => "LD A,(FF00+u8)",
        0xF1 => "POP AF",
        0xF2 => "LD A,(FF00+C)",
        0xF3 => "DI",
        0xF5 => "PUSH AF",
        0xF6 => "OR A,u8",
        0xF7 => "RST 30h",
        0xF8 => "LD HL,SP+i8",
        0xF9 => "LD SP,HL",
        0xFA => "LD A,(u16)",
        0xFB => "EI",
        0xFE => "CP A,u8",
        0xFF => "RST 38h",
        _ => "ILLEGAL",
    }
}
