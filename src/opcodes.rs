//! The opcode table: binds each supported byte value to a mnemonic, an
//! addressing mode, a base cycle count, and the handler that executes it.
//!
//! The table is dense over the full 256-byte opcode space; unlisted entries
//! are `None` and drive the interpreter's unknown-opcode halt.

use crate::cpu::Cpu;

/// The addressing modes this emulator supports. Indexed, indirect,
/// indexed-indirect, and indirect-indexed modes are out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Immediate,
    ZeroPage,
    Absolute,
    Relative,
}

pub type OperationFn = fn(&mut Cpu, Mode);

#[derive(Clone, Copy)]
pub struct OpcodeDef {
    pub mnemonic: &'static str,
    pub mode: Mode,
    pub cycles: u8,
    pub handler: OperationFn,
}

// Opcode byte constants, normative per the assembler's encoding table.
// Named `MNEMONIC_MODE`; shared between this execution table and the
// assembler's encoder in `asm.rs` so the two halves can never disagree
// about a byte assignment.
pub mod byte {
    pub const LDA_IMM: u8 = 0xA9;
    pub const LDA_ZP: u8 = 0xA5;
    pub const LDA_ABS: u8 = 0xAD;
    pub const LDX_IMM: u8 = 0xA2;
    pub const LDX_ZP: u8 = 0xA6;
    pub const LDX_ABS: u8 = 0xAE;
    pub const LDY_IMM: u8 = 0xA0;
    pub const LDY_ZP: u8 = 0xA4;
    pub const LDY_ABS: u8 = 0xAC;
    pub const STA_ZP: u8 = 0x85;
    pub const STA_ABS: u8 = 0x8D;
    pub const STX_ZP: u8 = 0x86;
    pub const STX_ABS: u8 = 0x8E;
    pub const STY_ZP: u8 = 0x84;
    pub const STY_ABS: u8 = 0x8C;
    pub const TAX: u8 = 0xAA;
    pub const TAY: u8 = 0xA8;
    pub const TXA: u8 = 0x8A;
    pub const TYA: u8 = 0x98;
    pub const PHA: u8 = 0x48;
    pub const PLA: u8 = 0x68;
    pub const PHP: u8 = 0x08;
    pub const PLP: u8 = 0x28;
    pub const AND_IMM: u8 = 0x29;
    pub const AND_ZP: u8 = 0x25;
    pub const AND_ABS: u8 = 0x2D;
    pub const ORA_IMM: u8 = 0x09;
    pub const ORA_ZP: u8 = 0x05;
    pub const ORA_ABS: u8 = 0x0D;
    pub const EOR_IMM: u8 = 0x49;
    pub const EOR_ZP: u8 = 0x45;
    pub const EOR_ABS: u8 = 0x4D;
    pub const BIT_ZP: u8 = 0x24;
    pub const BIT_ABS: u8 = 0x2C;
    pub const ADC_IMM: u8 = 0x69;
    pub const ADC_ZP: u8 = 0x65;
    pub const ADC_ABS: u8 = 0x6D;
    pub const SBC_IMM: u8 = 0xE9;
    pub const SBC_ZP: u8 = 0xE5;
    pub const SBC_ABS: u8 = 0xED;
    pub const INX: u8 = 0xE8;
    pub const INY: u8 = 0xC8;
    pub const DEX: u8 = 0xCA;
    pub const DEY: u8 = 0x88;
    pub const CMP_IMM: u8 = 0xC9;
    pub const CMP_ZP: u8 = 0xC5;
    pub const CMP_ABS: u8 = 0xCD;
    pub const CPX_IMM: u8 = 0xE0;
    pub const CPX_ZP: u8 = 0xE4;
    pub const CPY_IMM: u8 = 0xC0;
    pub const CPY_ZP: u8 = 0xC4;
    pub const BEQ: u8 = 0xF0;
    pub const BNE: u8 = 0xD0;
    pub const BCC: u8 = 0x90;
    pub const BCS: u8 = 0xB0;
    pub const BMI: u8 = 0x30;
    pub const BPL: u8 = 0x10;
    pub const BVC: u8 = 0x50;
    pub const BVS: u8 = 0x70;
    pub const JMP_ABS: u8 = 0x4C;
    pub const JSR_ABS: u8 = 0x20;
    pub const RTS: u8 = 0x60;
    pub const CLC: u8 = 0x18;
    pub const SEC: u8 = 0x38;
    pub const CLV: u8 = 0xB8;
    pub const SEI: u8 = 0x78;
    pub const CLI: u8 = 0x58;
    pub const NOP: u8 = 0xEA;
    pub const BRK: u8 = 0x00;
}

macro_rules! def {
    ($table:ident, $byte:expr, $mnemonic:expr, $mode:expr, $cycles:expr, $handler:expr) => {
        $table[$byte as usize] = Some(OpcodeDef {
            mnemonic: $mnemonic,
            mode: $mode,
            cycles: $cycles,
            handler: $handler,
        });
    };
}

fn build_table() -> [Option<OpcodeDef>; 256] {
    use byte::*;
    use Mode::*;

    let mut table: [Option<OpcodeDef>; 256] = [None; 256];

    def!(table, LDA_IMM, "LDA", Immediate, 2, Cpu::op_lda);
    def!(table, LDA_ZP, "LDA", ZeroPage, 3, Cpu::op_lda);
    def!(table, LDA_ABS, "LDA", Absolute, 4, Cpu::op_lda);
    def!(table, LDX_IMM, "LDX", Immediate, 2, Cpu::op_ldx);
    def!(table, LDX_ZP, "LDX", ZeroPage, 3, Cpu::op_ldx);
    def!(table, LDX_ABS, "LDX", Absolute, 4, Cpu::op_ldx);
    def!(table, LDY_IMM, "LDY", Immediate, 2, Cpu::op_ldy);
    def!(table, LDY_ZP, "LDY", ZeroPage, 3, Cpu::op_ldy);
    def!(table, LDY_ABS, "LDY", Absolute, 4, Cpu::op_ldy);

    def!(table, STA_ZP, "STA", ZeroPage, 3, Cpu::op_sta);
    def!(table, STA_ABS, "STA", Absolute, 4, Cpu::op_sta);
    def!(table, STX_ZP, "STX", ZeroPage, 3, Cpu::op_stx);
    def!(table, STX_ABS, "STX", Absolute, 4, Cpu::op_stx);
    def!(table, STY_ZP, "STY", ZeroPage, 3, Cpu::op_sty);
    def!(table, STY_ABS, "STY", Absolute, 4, Cpu::op_sty);

    def!(table, TAX, "TAX", Implied, 2, Cpu::op_tax);
    def!(table, TAY, "TAY", Implied, 2, Cpu::op_tay);
    def!(table, TXA, "TXA", Implied, 2, Cpu::op_txa);
    def!(table, TYA, "TYA", Implied, 2, Cpu::op_tya);

    def!(table, PHA, "PHA", Implied, 3, Cpu::op_pha);
    def!(table, PLA, "PLA", Implied, 4, Cpu::op_pla);
    def!(table, PHP, "PHP", Implied, 3, Cpu::op_php);
    def!(table, PLP, "PLP", Implied, 4, Cpu::op_plp);

    def!(table, AND_IMM, "AND", Immediate, 2, Cpu::op_and);
    def!(table, AND_ZP, "AND", ZeroPage, 3, Cpu::op_and);
    def!(table, AND_ABS, "AND", Absolute, 4, Cpu::op_and);
    def!(table, ORA_IMM, "ORA", Immediate, 2, Cpu::op_ora);
    def!(table, ORA_ZP, "ORA", ZeroPage, 3, Cpu::op_ora);
    def!(table, ORA_ABS, "ORA", Absolute, 4, Cpu::op_ora);
    def!(table, EOR_IMM, "EOR", Immediate, 2, Cpu::op_eor);
    def!(table, EOR_ZP, "EOR", ZeroPage, 3, Cpu::op_eor);
    def!(table, EOR_ABS, "EOR", Absolute, 4, Cpu::op_eor);
    def!(table, BIT_ZP, "BIT", ZeroPage, 3, Cpu::op_bit);
    def!(table, BIT_ABS, "BIT", Absolute, 4, Cpu::op_bit);

    def!(table, ADC_IMM, "ADC", Immediate, 2, Cpu::op_adc);
    def!(table, ADC_ZP, "ADC", ZeroPage, 3, Cpu::op_adc);
    def!(table, ADC_ABS, "ADC", Absolute, 4, Cpu::op_adc);
    def!(table, SBC_IMM, "SBC", Immediate, 2, Cpu::op_sbc);
    def!(table, SBC_ZP, "SBC", ZeroPage, 3, Cpu::op_sbc);
    def!(table, SBC_ABS, "SBC", Absolute, 4, Cpu::op_sbc);

    def!(table, INX, "INX", Implied, 2, Cpu::op_inx);
    def!(table, INY, "INY", Implied, 2, Cpu::op_iny);
    def!(table, DEX, "DEX", Implied, 2, Cpu::op_dex);
    def!(table, DEY, "DEY", Implied, 2, Cpu::op_dey);

    def!(table, CMP_IMM, "CMP", Immediate, 2, Cpu::op_cmp);
    def!(table, CMP_ZP, "CMP", ZeroPage, 3, Cpu::op_cmp);
    def!(table, CMP_ABS, "CMP", Absolute, 4, Cpu::op_cmp);
    def!(table, CPX_IMM, "CPX", Immediate, 2, Cpu::op_cpx);
    def!(table, CPX_ZP, "CPX", ZeroPage, 3, Cpu::op_cpx);
    def!(table, CPY_IMM, "CPY", Immediate, 2, Cpu::op_cpy);
    def!(table, CPY_ZP, "CPY", ZeroPage, 3, Cpu::op_cpy);

    def!(table, BEQ, "BEQ", Relative, 2, Cpu::op_beq);
    def!(table, BNE, "BNE", Relative, 2, Cpu::op_bne);
    def!(table, BCC, "BCC", Relative, 2, Cpu::op_bcc);
    def!(table, BCS, "BCS", Relative, 2, Cpu::op_bcs);
    def!(table, BMI, "BMI", Relative, 2, Cpu::op_bmi);
    def!(table, BPL, "BPL", Relative, 2, Cpu::op_bpl);
    def!(table, BVC, "BVC", Relative, 2, Cpu::op_bvc);
    def!(table, BVS, "BVS", Relative, 2, Cpu::op_bvs);

    def!(table, JMP_ABS, "JMP", Absolute, 3, Cpu::op_jmp);
    def!(table, JSR_ABS, "JSR", Absolute, 6, Cpu::op_jsr);
    def!(table, RTS, "RTS", Implied, 6, Cpu::op_rts);

    def!(table, CLC, "CLC", Implied, 2, Cpu::op_clc);
    def!(table, SEC, "SEC", Implied, 2, Cpu::op_sec);
    def!(table, CLV, "CLV", Implied, 2, Cpu::op_clv);
    def!(table, SEI, "SEI", Implied, 2, Cpu::op_sei);
    def!(table, CLI, "CLI", Implied, 2, Cpu::op_cli);
    def!(table, NOP, "NOP", Implied, 2, Cpu::op_nop);
    def!(table, BRK, "BRK", Implied, 7, Cpu::op_brk);

    table
}

thread_local! {
    static TABLE: [Option<OpcodeDef>; 256] = build_table();
}

/// Looks up the definition for `opcode`, if this emulator supports it.
pub fn lookup(opcode: u8) -> Option<OpcodeDef> {
    TABLE.with(|t| t[opcode as usize])
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_opcode_resolves() {
        let def = lookup(byte::LDA_IMM).expect("LDA #imm should be defined");
        assert_eq!(def.mnemonic, "LDA");
        assert_eq!(def.mode, Mode::Immediate);
        assert_eq!(def.cycles, 2);
    }

    #[test]
    fn unassigned_opcode_is_none() {
        // 0x02 is not assigned to anything in this subset.
        assert!(lookup(0x02).is_none());
    }
}
