//! Error related data structures.
//!
//! Anything a well-behaved ROM can do is defined behaviour and never an
//! error; these types cover the host-facing failure cases only. The one
//! fatal condition, an undefined opcode, panics with the offending PC and
//! opcode instead.

use std::fmt::{self, Display, Formatter};
use std::io;

/// Failures while ingesting a ROM image, fatal at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomLoadError {
    /// The image is smaller than the 32 KiB minimum.
    TooSmall { size: usize },
    /// The ROM size code at 0x148 is not one we know a bank count for.
    InvalidRomSize { code: u8 },
    /// The RAM size code at 0x149 is out of range.
    InvalidRamSize { code: u8 },
    /// The cartridge type byte names a mapper outside MBC none/1/3/5.
    UnsupportedCartridgeType { kind: u8 },
}

impl Display for RomLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RomLoadError::TooSmall { size } => {
                write!(f, "ROM of {} bytes is below the 32 KiB minimum", size)
            }
            RomLoadError::InvalidRomSize { code } => {
                write!(f, "unknown ROM size code 0x{:02X} in header", code)
            }
            RomLoadError::InvalidRamSize { code } => {
                write!(f, "unknown RAM size code 0x{:02X} in header", code)
            }
            RomLoadError::UnsupportedCartridgeType { kind } => {
                write!(f, "unsupported cartridge type 0x{:02X}", kind)
            }
        }
    }
}

impl std::error::Error for RomLoadError {}

/// Failures while decoding a savestate. The emulator is left in its
/// pre-call state whenever one of these surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavestateError {
    /// The leading magic string did not match.
    BadMagic { found: String },
    /// The container version is not one we can restore from.
    UnsupportedVersion { found: String },
    /// The container ended early or otherwise failed to decode.
    Truncated,
    /// A fixed-size region arrived with the wrong length.
    SizeMismatch {
        region: &'static str,
        expected: usize,
        found: usize,
    },
    /// The state was captured from a different cartridge.
    CartridgeMismatch,
}

impl Display for SavestateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SavestateError::BadMagic { found } => {
                write!(f, "savestate magic mismatch (found {:?})", found)
            }
            SavestateError::UnsupportedVersion { found } => {
                write!(f, "unsupported savestate version {:?}", found)
            }
            SavestateError::Truncated => write!(f, "savestate is truncated or corrupt"),
            SavestateError::SizeMismatch {
                region,
                expected,
                found,
            } => write!(
                f,
                "savestate region {} has {} bytes, expected {}",
                region, found, expected
            ),
            SavestateError::CartridgeMismatch => {
                write!(f, "savestate was captured from a different cartridge")
            }
        }
    }
}

impl std::error::Error for SavestateError {}

/// Save-file and RTC persistence failures. These never affect emulation
/// state.
#[derive(Debug)]
pub enum PersistenceError {
    Io(io::Error),
    /// The RTC sidecar file failed to parse.
    MalformedRtcState(String),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io(err) => write!(f, "save file I/O failed: {}", err),
            PersistenceError::MalformedRtcState(msg) => {
                write!(f, "malformed RTC state: {}", msg)
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<io::Error> for PersistenceError {
    fn from(err: io::Error) -> Self {
        PersistenceError::Io(err)
    }
}

/// Convenience union for facade calls which can fail in more than one way
/// (e.g. loading a savestate from disk).
#[derive(Debug)]
pub enum EmulatorError {
    RomLoad(RomLoadError),
    Savestate(SavestateError),
    Persistence(PersistenceError),
}

impl Display for EmulatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EmulatorError::RomLoad(err) => err.fmt(f),
            EmulatorError::Savestate(err) => err.fmt(f),
            EmulatorError::Persistence(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for EmulatorError {}

impl From<RomLoadError> for EmulatorError {
    fn from(err: RomLoadError) -> Self {
        EmulatorError::RomLoad(err)
    }
}

impl From<SavestateError> for EmulatorError {
    fn from(err: SavestateError) -> Self {
        EmulatorError::Savestate(err)
    }
}

impl From<PersistenceError> for EmulatorError {
    fn from(err: PersistenceError) -> Self {
        EmulatorError::Persistence(err)
    }
}

impl From<io::Error> for EmulatorError {
    fn from(err: io::Error) -> Self {
        EmulatorError::Persistence(PersistenceError::Io(err))
    }
}
