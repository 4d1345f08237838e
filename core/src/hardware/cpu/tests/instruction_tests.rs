//! Behavioural tests for the trickier instructions: flag semantics, DAA,
//! the signed SP arithmetic, and the stack byte order.

use crate::hardware::cpu::tests::{initial_cpu, load_program, read_short, set_short};
use crate::hardware::mmu::MemoryMapper;
use pretty_assertions::assert_eq;

#[test]
fn test_load_16bit() {
    let mut cpu = initial_cpu();

    // LD BC,u16 and LD (u16),SP round trip.
    cpu.registers.sp = 0x500;
    load_program(&mut cpu, &[0x01, 0x05, 0x01, 0x08, 0x00, 0xC0]);

    cpu.step_cycle();
    assert_eq!(cpu.registers.bc(), 0x0105);

    cpu.step_cycle();
    assert_eq!(read_short(&cpu, 0xC000), 0x500);
    assert_eq!(cpu.registers.pc, 6);
}

#[test]
fn test_load_8bit_forms() {
    let mut cpu = initial_cpu();

    cpu.registers.c = 40;
    cpu.registers.set_hl(0x4000);
    cpu.mmu.write_byte(0x4000, 30);

    // LD B,C / LD D,(HL) / LD (HL),C / LD A,D
    load_program(&mut cpu, &[0x41, 0x56, 0x71, 0x7A]);

    cpu.step_cycle();
    assert_eq!(cpu.registers.b, 40);

    cpu.step_cycle();
    assert_eq!(cpu.registers.d, 30);

    cpu.step_cycle();
    assert_eq!(cpu.mmu.read_byte(0x4000), 40);

    cpu.step_cycle();
    assert_eq!(cpu.registers.a, 30);
}

#[test]
fn test_hl_post_increment_and_decrement() {
    let mut cpu = initial_cpu();

    cpu.registers.a = 0xAB;
    cpu.registers.set_hl(0xC000);

    // LD (HL+),A ; LD (HL-),A ; LD A,(HL+)
    load_program(&mut cpu, &[0x22, 0x32, 0x2A]);

    cpu.step_cycle();
    assert_eq!(cpu.mmu.read_byte(0xC000), 0xAB);
    assert_eq!(cpu.registers.hl(), 0xC001);

    cpu.step_cycle();
    assert_eq!(cpu.mmu.read_byte(0xC001), 0xAB);
    assert_eq!(cpu.registers.hl(), 0xC000);

    cpu.step_cycle();
    assert_eq!(cpu.registers.a, 0xAB);
    assert_eq!(cpu.registers.hl(), 0xC001);
}

#[test]
fn test_increment_flags() {
    let mut cpu = initial_cpu();

    cpu.registers.a = 0x0F;
    cpu.execute(0x3C);
    assert_eq!(cpu.registers.a, 0x10);
    assert!(cpu.registers.hf());
    assert!(!cpu.registers.zf());

    cpu.registers.a = 0xFF;
    cpu.execute(0x3C);
    assert_eq!(cpu.registers.a, 0);
    assert!(cpu.registers.zf());
    assert!(cpu.registers.hf());

    // INC never touches the carry flag.
    assert!(!cpu.registers.cf());
}

#[test]
fn test_decrement_flags() {
    let mut cpu = initial_cpu();

    cpu.registers.a = 0x10;
    cpu.execute(0x3D);
    assert_eq!(cpu.registers.a, 0x0F);
    assert!(cpu.registers.hf());
    assert!(cpu.registers.n());

    cpu.registers.a = 0x01;
    cpu.execute(0x3D);
    assert!(cpu.registers.zf());
}

#[test]
fn test_add_and_carry_flags() {
    let mut cpu = initial_cpu();

    cpu.registers.a = 0x3A;
    cpu.registers.b = 0xC6;
    cpu.execute(0x80);

    assert_eq!(cpu.registers.a, 0);
    assert!(cpu.registers.zf());
    assert!(cpu.registers.hf());
    assert!(cpu.registers.cf());
}

#[test]
fn test_adc_uses_carry() {
    let mut cpu = initial_cpu();

    cpu.registers.a = 0xE1;
    cpu.registers.e = 0x0F;
    cpu.registers.set_cf(true);
    cpu.execute(0x8B);

    assert_eq!(cpu.registers.a, 0xF1);
    assert!(cpu.registers.hf());
    assert!(!cpu.registers.cf());
}

#[test]
fn test_sbc_borrow_chain() {
    let mut cpu = initial_cpu();

    cpu.registers.a = 0x3B;
    cpu.registers.h = 0x2A;
    cpu.registers.set_cf(true);
    cpu.execute(0x9C);

    assert_eq!(cpu.registers.a, 0x10);
    assert!(!cpu.registers.zf());
    assert!(cpu.registers.n());
    assert!(!cpu.registers.cf());
}

#[test]
fn test_compare_discards_result() {
    let mut cpu = initial_cpu();

    cpu.registers.a = 0x3C;
    cpu.registers.b = 0x2F;
    cpu.execute(0xB8);

    assert_eq!(cpu.registers.a, 0x3C);
    assert!(!cpu.registers.zf());
    assert!(cpu.registers.hf());
    assert!(!cpu.registers.cf());

    cpu.registers.b = 0x40;
    cpu.execute(0xB8);
    assert!(cpu.registers.cf());
}

#[test]
fn test_daa_after_addition() {
    let mut cpu = initial_cpu();

    // 0x45 + 0x38 = 0x7D binary, 83 decimal.
    cpu.registers.a = 0x45;
    cpu.registers.b = 0x38;
    cpu.execute(0x80);
    cpu.execute(0x27);

    assert_eq!(cpu.registers.a, 0x83);
    assert!(!cpu.registers.cf());

    // 0x99 + 0x01 = 100 decimal: wraps with carry.
    cpu.registers.a = 0x99;
    cpu.registers.b = 0x01;
    cpu.execute(0x80);
    cpu.execute(0x27);

    assert_eq!(cpu.registers.a, 0x00);
    assert!(cpu.registers.zf());
    assert!(cpu.registers.cf());
}

#[test]
fn test_daa_after_subtraction() {
    let mut cpu = initial_cpu();

    // 0x83 - 0x38 = 0x4B binary, 45 decimal.
    cpu.registers.a = 0x83;
    cpu.registers.b = 0x38;
    cpu.execute(0x90);
    cpu.execute(0x27);

    assert_eq!(cpu.registers.a, 0x45);
}

#[test]
fn test_add_sp_flag_quirk() {
    let mut cpu = initial_cpu();

    // H/C come from the unsigned low-byte addition, even for a negative
    // offset.
    cpu.registers.sp = 0x00FF;
    load_program(&mut cpu, &[0xE8, 0x01]);
    cpu.step_cycle();

    assert_eq!(cpu.registers.sp, 0x0100);
    assert!(cpu.registers.hf());
    assert!(cpu.registers.cf());
    assert!(!cpu.registers.zf());

    let mut cpu = initial_cpu();
    cpu.registers.sp = 0x0001;
    load_program(&mut cpu, &[0xE8, 0xFF]);
    cpu.step_cycle();

    assert_eq!(cpu.registers.sp, 0x0000);
    assert!(cpu.registers.hf());
    assert!(cpu.registers.cf());
}

#[test]
fn test_ld_hl_sp_offset() {
    let mut cpu = initial_cpu();

    cpu.registers.sp = 0xFFF8;
    load_program(&mut cpu, &[0xF8, 0x02]);
    cpu.step_cycle();

    assert_eq!(cpu.registers.hl(), 0xFFFA);
    assert!(!cpu.registers.zf());
    assert!(!cpu.registers.hf());
    assert!(!cpu.registers.cf());
}

#[test]
fn test_push_pop_af_masks_flags() {
    let mut cpu = initial_cpu();
    cpu.registers.sp = 0xFFFE;

    cpu.registers.a = 0x12;
    cpu.registers.set_f(0xFF);

    // PUSH AF ; POP BC: the stored F already has the low nibble clear.
    load_program(&mut cpu, &[0xF5, 0xC1]);
    cpu.step_cycle();
    cpu.step_cycle();

    assert_eq!(cpu.registers.bc(), 0x12F0);

    // POP AF masks whatever garbage is in memory.
    set_short(&mut cpu, 0xC000, 0x34FF);
    cpu.registers.sp = 0xC000;
    cpu.mmu.write_byte(2, 0xF1);
    cpu.step_cycle();

    assert_eq!(cpu.registers.af(), 0x34F0);
}

#[test]
fn test_push_byte_order() {
    let mut cpu = initial_cpu();
    cpu.registers.sp = 0xFFFE;
    cpu.registers.set_de(0x1234);

    // PUSH DE: high byte to (SP-1), low byte to (SP-2).
    load_program(&mut cpu, &[0xD5]);
    cpu.step_cycle();

    assert_eq!(cpu.registers.sp, 0xFFFC);
    assert_eq!(cpu.mmu.read_byte(0xFFFD), 0x12);
    assert_eq!(cpu.mmu.read_byte(0xFFFC), 0x34);
}

#[test]
fn test_rotates_through_carry() {
    let mut cpu = initial_cpu();

    cpu.registers.a = 0x80;
    cpu.registers.set_cf(false);
    cpu.execute(0x17); // RLA

    assert_eq!(cpu.registers.a, 0x00);
    assert!(cpu.registers.cf());
    // RLA never sets Z, even on a zero result.
    assert!(!cpu.registers.zf());

    cpu.execute(0x17);
    assert_eq!(cpu.registers.a, 0x01);
    assert!(!cpu.registers.cf());
}

#[test]
fn test_prefixed_bit_ops() {
    let mut cpu = initial_cpu();

    cpu.registers.b = 0b0100_0000;

    // BIT 6,B / RES 6,B / SET 0,B
    load_program(&mut cpu, &[0xCB, 0x70, 0xCB, 0xB0, 0xCB, 0xC0]);

    cpu.step_cycle();
    assert!(!cpu.registers.zf());
    assert!(cpu.registers.hf());

    cpu.step_cycle();
    assert_eq!(cpu.registers.b, 0);

    cpu.step_cycle();
    assert_eq!(cpu.registers.b, 1);
}

#[test]
fn test_swap_and_srl() {
    let mut cpu = initial_cpu();

    cpu.registers.d = 0xF1;
    load_program(&mut cpu, &[0xCB, 0x32, 0xCB, 0x3A]);

    cpu.step_cycle();
    assert_eq!(cpu.registers.d, 0x1F);

    cpu.step_cycle();
    assert_eq!(cpu.registers.d, 0x0F);
    assert!(cpu.registers.cf());
}

#[test]
fn test_sra_preserves_sign() {
    let mut cpu = initial_cpu();

    cpu.registers.e = 0x81;
    load_program(&mut cpu, &[0xCB, 0x2B]);
    cpu.step_cycle();

    assert_eq!(cpu.registers.e, 0xC0);
    assert!(cpu.registers.cf());
}

#[test]
fn test_stop_skips_padding_byte() {
    let mut cpu = initial_cpu();

    // STOP 0x00 ; INC A
    load_program(&mut cpu, &[0x10, 0x00, 0x3C]);

    cpu.step_cycle();
    assert_eq!(cpu.registers.pc, 2);

    cpu.step_cycle();
    assert_eq!(cpu.registers.a, 1);
}

#[test]
#[should_panic(expected = "Illegal opcode")]
fn test_illegal_opcode_panics() {
    let mut cpu = initial_cpu();

    load_program(&mut cpu, &[0xD3]);
    cpu.step_cycle();
}
