use mos6502::Cpu;
use pretty_assertions::assert_eq;

fn run(source: &str) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.load(source).expect("program should assemble");
    cpu.run();
    cpu
}

#[test]
fn s1_hello_storage() {
    let source = "\
        LDA #$48\n\
        STA $0200\n\
        LDA #$65\n\
        STA $0201\n\
        LDA #$6C\n\
        STA $0202\n\
        STA $0203\n\
        LDA #$6F\n\
        STA $0204\n\
        BRK\n";
    let cpu = run(source);

    assert_eq!(cpu.mem.read_u8(0x0200), 0x48);
    assert_eq!(cpu.mem.read_u8(0x0201), 0x65);
    assert_eq!(cpu.mem.read_u8(0x0202), 0x6C);
    assert_eq!(cpu.mem.read_u8(0x0203), 0x6C);
    assert_eq!(cpu.mem.read_u8(0x0204), 0x6F);
    assert_eq!(cpu.regs.a, 0x6F);
    assert!(!cpu.running);
}

#[test]
fn s2_arithmetic_and_display_encoding() {
    let source = "LDA #$05\nADC #$03\nSTA $0200\nBRK\n";
    let cpu = run(source);

    assert_eq!(cpu.regs.a, 0x08);
    assert!(!cpu.regs.flag(mos6502::StatusFlag::Carry));
    assert!(!cpu.regs.flag(mos6502::StatusFlag::Overflow));
    assert_eq!(cpu.mem.read_u8(0x0200), 0x08);
}

#[test]
fn s3_branch_loop() {
    let source = "\
        LDY #$05\n\
        loop:\n\
        TYA\n\
        ADC #$30\n\
        STA $0206\n\
        DEY\n\
        CPY #$00\n\
        BNE loop\n\
        BRK\n";
    let cpu = run(source);

    assert_eq!(cpu.regs.y, 0x00);
    assert_eq!(cpu.mem.read_u8(0x0206), 0x30);
    assert!(cpu.cycles > 25);
    assert!(!cpu.running);
}

#[test]
fn s4_jsr_rts_round_trip() {
    let source = "JSR sub\nBRK\nsub:\nLDA #$42\nRTS\n";
    let mut cpu = Cpu::new();
    cpu.load(source).unwrap();
    let sp_before = cpu.regs.sp;
    cpu.run();

    assert_eq!(cpu.regs.a, 0x42);
    assert_eq!(cpu.regs.sp, sp_before);
    assert!(cpu.regs.flag(mos6502::StatusFlag::Break));
}

#[test]
fn s5_branch_range_error() {
    let mut source = String::from("BNE far\n");
    for _ in 0..200 {
        source.push_str("NOP\n");
    }
    source.push_str("far:\nBRK\n");

    let err = mos6502::assemble(&source).unwrap_err();
    assert!(matches!(err, mos6502::AsmError::BranchRange { .. }));
}

#[test]
fn s6_unknown_opcode_halt() {
    let mut cpu = Cpu::new();
    cpu.load("NOP\nBRK\n").unwrap();
    // Poke an unassigned opcode directly into memory past the NOP.
    cpu.mem.write_u8(cpu.regs.pc + 1, 0xFF);
    cpu.running = true;

    assert!(cpu.step()); // executes the NOP
    let cycles_before = cpu.cycles;
    assert!(!cpu.step()); // hits the poked 0xFF
    assert!(!cpu.running);
    assert_eq!(cpu.cycles, cycles_before);
    assert_eq!(cpu.last_fault.map(|f| f.opcode), Some(0xFF));
}
