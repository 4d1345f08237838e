use criterion::{black_box, criterion_group, criterion_main, Criterion};

use oxiboy_core::{Emulator, EmulatorOptionsBuilder, CYCLES_PER_FRAME};

/// A header-complete image whose entry point spins in place; good enough
/// to measure the cost of the frame loop machinery itself.
fn spin_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x100] = 0x18;
    rom[0x101] = 0xFE;
    rom
}

fn frame_stepping(c: &mut Criterion) {
    let rom = spin_rom();

    c.bench_function("step_frame", |b| {
        let mut emulator = Emulator::new(&rom, EmulatorOptionsBuilder::new().build()).unwrap();
        b.iter(|| {
            emulator.step_frame();
            black_box(emulator.framebuffer()[0]);
        });
    });

    c.bench_function("step_instruction", |b| {
        let mut emulator = Emulator::new(&rom, EmulatorOptionsBuilder::new().build()).unwrap();
        b.iter(|| {
            let mut cycles = 0;
            while cycles < CYCLES_PER_FRAME / 60 {
                cycles += black_box(emulator.step_instruction());
            }
        });
    });
}

criterion_group!(benches, frame_stepping);
criterion_main!(benches);
