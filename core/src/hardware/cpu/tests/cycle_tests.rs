//! Conformance with the canonical cycle table: every family of opcodes is
//! checked, with both the taken and untaken branch lengths.

use crate::hardware::cpu::tests::{initial_cpu, load_program, set_short};
use crate::hardware::mmu::MemoryMapper;
use pretty_assertions::assert_eq;

#[test]
fn test_basic_cycles() {
    let mut cpu = initial_cpu();

    // ADD A,B [4 cycles]
    load_program(&mut cpu, &[0x80]);
    assert_eq!(cpu.step_cycle(), 4);

    // LD (u16),SP [20 cycles]
    set_short(&mut cpu, 0x1, 0x0008);
    set_short(&mut cpu, 0x2, 0x5555);
    assert_eq!(cpu.step_cycle(), 20);
    assert_eq!(cpu.cycles_performed, 24);

    // ADD HL,BC [8 cycles]
    cpu.mmu.write_byte(0x4, 0x09);
    assert_eq!(cpu.step_cycle(), 8);
    assert_eq!(cpu.cycles_performed, 32);
}

#[test]
fn test_load_cycles() {
    let mut cpu = initial_cpu();

    // LD B,u8 [8], LD (HL),u8 [12], LD A,(HL+) [8], LD (u16),A [16]
    load_program(&mut cpu, &[0x06, 0x42, 0x36, 0x13, 0x2A, 0xEA, 0x00, 0xC0]);

    assert_eq!(cpu.step_cycle(), 8);
    assert_eq!(cpu.step_cycle(), 12);
    assert_eq!(cpu.step_cycle(), 8);
    assert_eq!(cpu.step_cycle(), 16);
}

#[test]
fn test_io_load_cycles() {
    let mut cpu = initial_cpu();

    // LDH (u8),A [12], LDH A,(u8) [12], LD (C),A [8], LD A,(C) [8]
    load_program(&mut cpu, &[0xE0, 0x80, 0xF0, 0x80, 0xE2, 0xF2]);

    assert_eq!(cpu.step_cycle(), 12);
    assert_eq!(cpu.step_cycle(), 12);
    assert_eq!(cpu.step_cycle(), 8);
    assert_eq!(cpu.step_cycle(), 8);
}

#[test]
fn test_relative_jump_cycles() {
    let mut cpu = initial_cpu();

    // JR NZ taken with Z clear [12], then untaken with Z set [8].
    load_program(&mut cpu, &[0x20, 0x00, 0x20, 0x00]);

    cpu.registers.set_zf(false);
    assert_eq!(cpu.step_cycle(), 12);

    cpu.registers.set_zf(true);
    assert_eq!(cpu.step_cycle(), 8);
}

#[test]
fn test_jump_cycles() {
    let mut cpu = initial_cpu();

    // JP u16 [16]
    load_program(&mut cpu, &[0xC3, 0x00, 0x01]);
    assert_eq!(cpu.step_cycle(), 16);
    assert_eq!(cpu.registers.pc, 0x100);

    // JP NC untaken [12]
    cpu.registers.pc = 0;
    load_program(&mut cpu, &[0xD2, 0x00, 0x01]);
    cpu.registers.set_cf(true);
    assert_eq!(cpu.step_cycle(), 12);

    // JP HL [4]
    cpu.registers.pc = 0x10;
    cpu.mmu.write_byte(0x10, 0xE9);
    cpu.registers.set_hl(0x2345);
    assert_eq!(cpu.step_cycle(), 4);
    assert_eq!(cpu.registers.pc, 0x2345);
}

#[test]
fn test_call_and_ret_cycles() {
    let mut cpu = initial_cpu();
    cpu.registers.sp = 0xFFFE;

    // CALL u16 [24]
    load_program(&mut cpu, &[0xCD, 0x00, 0x01]);
    assert_eq!(cpu.step_cycle(), 24);
    assert_eq!(cpu.registers.pc, 0x100);

    // RET [16]
    cpu.mmu.write_byte(0x100, 0xC9);
    assert_eq!(cpu.step_cycle(), 16);
    assert_eq!(cpu.registers.pc, 0x3);

    // CALL NZ untaken [12]
    load_program(&mut cpu, &[0xC4, 0x00, 0x01]);
    cpu.registers.pc = 0;
    cpu.registers.set_zf(true);
    assert_eq!(cpu.step_cycle(), 12);

    // RET cc taken [20] / untaken [8]
    cpu.registers.pc = 0x20;
    cpu.mmu.write_byte(0x20, 0xC8);
    let sp = cpu.registers.sp;
    set_short(&mut cpu, sp, 0x0400);
    assert_eq!(cpu.step_cycle(), 20);
    assert_eq!(cpu.registers.pc, 0x400);

    cpu.mmu.write_byte(0x400, 0xC8);
    cpu.registers.set_zf(false);
    assert_eq!(cpu.step_cycle(), 8);
}

#[test]
fn test_stack_cycles() {
    let mut cpu = initial_cpu();
    cpu.registers.sp = 0xFFFE;

    // PUSH BC [16], POP BC [12], RST 0x28 [16]
    load_program(&mut cpu, &[0xC5, 0xC1, 0xEF]);

    assert_eq!(cpu.step_cycle(), 16);
    assert_eq!(cpu.step_cycle(), 12);
    assert_eq!(cpu.step_cycle(), 16);
    assert_eq!(cpu.registers.pc, 0x28);
}

#[test]
fn test_sp_arithmetic_cycles() {
    let mut cpu = initial_cpu();

    // ADD SP,e8 [16], LD HL,SP+e8 [12], LD SP,HL [8]
    load_program(&mut cpu, &[0xE8, 0x05, 0xF8, 0x05, 0xF9]);

    assert_eq!(cpu.step_cycle(), 16);
    assert_eq!(cpu.step_cycle(), 12);
    assert_eq!(cpu.step_cycle(), 8);
}

#[test]
fn test_prefix_cycles() {
    let mut cpu = initial_cpu();
    cpu.registers.set_hl(0xC000);

    // RLC B [8], RLC (HL) [16], BIT 0,(HL) [12], SET 7,(HL) [16]
    load_program(&mut cpu, &[0xCB, 0x00, 0xCB, 0x06, 0xCB, 0x46, 0xCB, 0xFE]);

    assert_eq!(cpu.step_cycle(), 8);
    assert_eq!(cpu.step_cycle(), 16);
    assert_eq!(cpu.step_cycle(), 12);
    assert_eq!(cpu.step_cycle(), 16);
}

#[test]
fn test_halt_idle_cycle() {
    let mut cpu = initial_cpu();

    load_program(&mut cpu, &[0x76]);
    assert_eq!(cpu.step_cycle(), 4);
    assert!(cpu.halted);

    // Idle machine cycles while halted.
    assert_eq!(cpu.step_cycle(), 4);
    assert_eq!(cpu.step_cycle(), 4);
    assert_eq!(cpu.registers.pc, 1);
}
