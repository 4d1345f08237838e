use std::path::PathBuf;

use gumdrop::Options;

#[derive(Debug, Options)]
pub struct AppOptions {
    #[options(help = "print this help message")]
    pub help: bool,

    #[options(free, required, help = "path to the ROM image to run")]
    pub rom: PathBuf,

    #[options(help = "frames to emulate before exiting", default = "600")]
    pub frames: u32,

    #[options(help = "stop early once the serial output contains Passed/Failed")]
    pub test_rom: bool,

    #[options(help = "write a PNG of the final framebuffer to this path")]
    pub screenshot: Option<PathBuf>,

    #[options(help = "hardware mode: auto, dmg or cgb", default = "auto")]
    pub mode: String,

    #[options(help = "DMG palette preset: grayscale, green or pocket")]
    pub palette: Option<String>,

    #[options(help = "directory for battery saves (defaults to the platform data dir)")]
    pub save_dir: Option<PathBuf>,

    #[options(help = "echo serial output to stdout while running")]
    pub serial: bool,

    #[options(count, help = "increase log verbosity (-v, -vv)")]
    pub verbose: u8,
}
