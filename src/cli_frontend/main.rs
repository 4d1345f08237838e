//! Headless frontend: runs a ROM for a number of frames (or until a test
//! ROM reports through the serial port), keeps battery saves and the RTC
//! sidecar up to date, and can dump the final framebuffer as a PNG.

use std::fs::{create_dir_all, read, read_to_string, write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use gumdrop::Options;
use image::RgbImage;
use log::*;
use once_cell::sync::Lazy;
use simplelog::{Config, LevelFilter, TermLogger, TerminalMode};

use oxiboy_core::hardware::ppu::{RESOLUTION_HEIGHT, RESOLUTION_WIDTH};
use oxiboy_core::{Emulator, EmulatorOptionsBuilder, HardwareMode};

use crate::options::AppOptions;

mod options;

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> = Lazy::new(|| ProjectDirs::from("", "", "oxiboy"));

fn main() -> Result<()> {
    let options: AppOptions = AppOptions::parse_args_default_or_exit();

    let log_level = match options.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Trace,
    };
    let _ = TermLogger::init(log_level, Config::default(), TerminalMode::Mixed);

    let rom = read(&options.rom)
        .with_context(|| format!("Failed to read ROM {}", options.rom.display()))?;

    let mode = parse_mode(&options.mode)?;
    let save_path = save_file_path(&options, "sav")?;
    let rtc_path = save_file_path(&options, "rtc")?;
    let saved_ram = save_path.as_ref().and_then(|path| read(path).ok());

    let emulator_options = EmulatorOptionsBuilder::new()
        .saved_ram(saved_ram)
        .with_mode(mode)
        .build();
    let mut emulator = Emulator::new(&rom, emulator_options).map_err(|err| anyhow!("{}", err))?;

    if let Some(name) = &options.palette {
        if !emulator.set_dmg_palette(Some(name)) {
            return Err(anyhow!("Unknown palette preset: {}", name));
        }
    }

    if let Some(path) = &rtc_path {
        if let Ok(json) = read_to_string(path) {
            if let Err(err) = emulator.load_rtc_state(&json) {
                warn!("Ignoring unreadable RTC sidecar: {}", err);
            }
        }
    }

    let mut serial_log = Vec::new();
    for frame in 0..options.frames {
        emulator.step_frame();

        let chunk = emulator.take_serial_output();
        if !chunk.is_empty() {
            if options.serial {
                print!("{}", String::from_utf8_lossy(&chunk));
            }
            serial_log.extend_from_slice(&chunk);
        }

        if options.test_rom && test_rom_finished(&serial_log) {
            info!("Test ROM reported after {} frames", frame + 1);
            break;
        }
    }

    if let Some(ram) = emulator.battery_ram() {
        if let Some(path) = &save_path {
            write(path, ram).with_context(|| format!("Failed to write save {}", path.display()))?;
        }
    }
    if let Some(json) = emulator.rtc_state() {
        if let Some(path) = &rtc_path {
            write(path, json)
                .with_context(|| format!("Failed to write RTC sidecar {}", path.display()))?;
        }
    }

    if let Some(path) = &options.screenshot {
        write_screenshot(&emulator, path)?;
        info!("Screenshot written to {}", path.display());
    }

    let output = String::from_utf8_lossy(&serial_log);
    if !output.is_empty() {
        println!("Serial output:\n{}", output);
    }
    if options.test_rom {
        if output.contains("Failed") {
            return Err(anyhow!("Test ROM reported a failure"));
        }
        if !output.contains("Passed") {
            return Err(anyhow!("Test ROM never reported a pass"));
        }
    }

    Ok(())
}

fn parse_mode(mode: &str) -> Result<HardwareMode> {
    match mode {
        "auto" => Ok(HardwareMode::Auto),
        "dmg" => Ok(HardwareMode::Dmg),
        "cgb" => Ok(HardwareMode::Cgb),
        other => Err(anyhow!("Unknown hardware mode: {}", other)),
    }
}

/// Blargg's suites print "Passed"/"Failed"; Mooneye's magic register
/// values are out of scope for this frontend.
fn test_rom_finished(serial_log: &[u8]) -> bool {
    let output = String::from_utf8_lossy(serial_log);
    output.contains("Passed") || output.contains("Failed")
}

/// `<save dir>/<rom stem>.<extension>`, with the platform data directory
/// as the default location.
fn save_file_path(options: &AppOptions, extension: &str) -> Result<Option<PathBuf>> {
    let directory = match &options.save_dir {
        Some(directory) => directory.clone(),
        None => match PROJECT_DIRS.as_ref() {
            Some(dirs) => dirs.data_dir().join("saves"),
            None => return Ok(None),
        },
    };

    create_dir_all(&directory)
        .with_context(|| format!("Failed to create save directory {}", directory.display()))?;

    let stem = options
        .rom
        .file_stem()
        .ok_or_else(|| anyhow!("ROM path has no file name"))?;

    Ok(Some(directory.join(stem).with_extension(extension)))
}

fn write_screenshot(emulator: &Emulator, path: &Path) -> Result<()> {
    let framebuffer = emulator.framebuffer();
    let mut image = RgbImage::new(RESOLUTION_WIDTH as u32, RESOLUTION_HEIGHT as u32);

    for (i, pixel) in framebuffer.iter().enumerate() {
        let x = (i % RESOLUTION_WIDTH) as u32;
        let y = (i / RESOLUTION_WIDTH) as u32;
        image.put_pixel(x, y, image::Rgb([pixel.0, pixel.1, pixel.2]));
    }

    image
        .save(path)
        .with_context(|| format!("Failed to write screenshot {}", path.display()))
}
