//! The fetch/decode/execute interpreter.

use crate::mem::{Mem, STACK_PAGE};
use crate::opcodes::{self, Mode};
use crate::regs::{Regs, StatusFlag};

/// Safety net against unterminated programs. Not part of the instruction
/// set; just a ceiling on how many `step`s a single `run` will take.
pub const MAX_STEPS: u32 = 10_000;

/// Recorded when `step` halts on a byte with no entry in the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeFault {
    pub opcode: u8,
    pub pc: u16,
}

/// Owns the full observable state of the emulated machine: registers,
/// memory, and the run/halt bookkeeping around them.
pub struct Cpu {
    pub regs: Regs,
    pub mem: Mem,
    pub running: bool,
    pub assembled: bool,
    pub cycles: u64,
    pub last_fault: Option<RuntimeFault>,
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu {
            regs: Regs::new(),
            mem: Mem::new(),
            running: false,
            assembled: false,
            cycles: 0,
            last_fault: None,
        }
    }

    /// Restores the register file to its initial state. Does not touch
    /// memory or `assembled` bookkeeping.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.running = false;
        self.assembled = false;
        self.last_fault = None;
    }

    /// Assembles `source` and loads the result at its start address. Zeroes
    /// memory first, so a previous program never bleeds into the next one.
    pub fn load(&mut self, source: &str) -> crate::error::Result<()> {
        let program = crate::asm::assemble(source)?;
        self.mem.fill(0);
        self.mem.load(program.start, &program.bytes);
        self.regs.pc = program.start;
        self.assembled = true;
        Ok(())
    }

    fn next_u8(&mut self) -> u8 {
        let value = self.mem.read_u8(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn next_u16(&mut self) -> u16 {
        let value = self.mem.read_u16(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        value
    }

    /// Resolves an operand per its addressing mode. For `ZeroPage` and
    /// `Absolute` this returns the *value* read through the effective
    /// address, which is what loads, compares, and arithmetic consume.
    fn fetch_operand(&mut self, mode: Mode) -> u8 {
        match mode {
            Mode::Immediate => self.next_u8(),
            Mode::ZeroPage => {
                let addr = self.next_u8() as u16;
                self.mem.read_u8(addr)
            }
            Mode::Absolute => {
                let addr = self.next_u16();
                self.mem.read_u8(addr)
            }
            Mode::Implied | Mode::Relative => {
                panic!("fetch_operand called with a mode that has no readable operand")
            }
        }
    }

    /// Resolves the effective address for a store or jump.
    fn fetch_address(&mut self, mode: Mode) -> u16 {
        match mode {
            Mode::ZeroPage => self.next_u8() as u16,
            Mode::Absolute => self.next_u16(),
            _ => panic!("fetch_address called with a mode that has no address"),
        }
    }

    fn push_u8(&mut self, value: u8) {
        let address = STACK_PAGE + self.regs.sp as u16;
        self.mem.write_u8(address, value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    fn pull_u8(&mut self) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let address = STACK_PAGE + self.regs.sp as u16;
        self.mem.read_u8(address)
    }

    /// Fetches, decodes, and executes one instruction. Returns `false`
    /// (without side effect) if not currently `running && assembled`, or if
    /// the fetched byte has no opcode table entry (in which case `running`
    /// is also cleared).
    pub fn step(&mut self) -> bool {
        if !self.running || !self.assembled {
            return false;
        }

        let pc = self.regs.pc;
        let opcode = self.next_u8();

        let def = match opcodes::lookup(opcode) {
            Some(def) => def,
            None => {
                self.running = false;
                self.last_fault = Some(RuntimeFault { opcode, pc });
                tracing::warn!(opcode, pc, "halted on unknown opcode");
                return false;
            }
        };

        (def.handler)(self, def.mode);
        self.cycles += def.cycles as u64;
        true
    }

    /// Runs until `step` returns `false` or the step-limit safety net is
    /// reached. Requires a prior successful `load`; does not resume a
    /// program halted by a previous `run` without an intervening `reset` +
    /// re-`load`.
    pub fn run(&mut self) {
        self.run_with_limit(MAX_STEPS);
    }

    /// Same as [`Cpu::run`], but with a caller-supplied step-limit instead
    /// of the default [`MAX_STEPS`]. Intended for harnesses (e.g. the CLI's
    /// `--max-steps`); the library's own default is unaffected.
    pub fn run_with_limit(&mut self, limit: u32) {
        self.running = true;
        for _ in 0..limit {
            if !self.step() {
                return;
            }
        }
        if self.running {
            tracing::warn!(limit, "halted by step-limit safety net");
            self.running = false;
        }
    }

    // -- load / store -----------------------------------------------------

    pub(crate) fn op_lda(&mut self, mode: Mode) {
        self.regs.a = self.fetch_operand(mode);
        self.regs.update_zero_and_negative(self.regs.a);
    }

    pub(crate) fn op_ldx(&mut self, mode: Mode) {
        self.regs.x = self.fetch_operand(mode);
        self.regs.update_zero_and_negative(self.regs.x);
    }

    pub(crate) fn op_ldy(&mut self, mode: Mode) {
        self.regs.y = self.fetch_operand(mode);
        self.regs.update_zero_and_negative(self.regs.y);
    }

    pub(crate) fn op_sta(&mut self, mode: Mode) {
        let addr = self.fetch_address(mode);
        self.mem.write_u8(addr, self.regs.a);
    }

    pub(crate) fn op_stx(&mut self, mode: Mode) {
        let addr = self.fetch_address(mode);
        self.mem.write_u8(addr, self.regs.x);
    }

    pub(crate) fn op_sty(&mut self, mode: Mode) {
        let addr = self.fetch_address(mode);
        self.mem.write_u8(addr, self.regs.y);
    }

    // -- transfers & stack --------------------------------------------------

    pub(crate) fn op_tax(&mut self, _mode: Mode) {
        self.regs.x = self.regs.a;
        self.regs.update_zero_and_negative(self.regs.x);
    }

    pub(crate) fn op_tay(&mut self, _mode: Mode) {
        self.regs.y = self.regs.a;
        self.regs.update_zero_and_negative(self.regs.y);
    }

    pub(crate) fn op_txa(&mut self, _mode: Mode) {
        self.regs.a = self.regs.x;
        self.regs.update_zero_and_negative(self.regs.a);
    }

    pub(crate) fn op_tya(&mut self, _mode: Mode) {
        self.regs.a = self.regs.y;
        self.regs.update_zero_and_negative(self.regs.a);
    }

    pub(crate) fn op_pha(&mut self, _mode: Mode) {
        let a = self.regs.a;
        self.push_u8(a);
    }

    pub(crate) fn op_pla(&mut self, _mode: Mode) {
        self.regs.a = self.pull_u8();
        self.regs.update_zero_and_negative(self.regs.a);
    }

    pub(crate) fn op_php(&mut self, _mode: Mode) {
        // The Break flag is forced set on the pushed copy only; the live P
        // is untouched.
        let pushed = self.regs.p | (StatusFlag::Break as u8);
        self.push_u8(pushed);
    }

    pub(crate) fn op_plp(&mut self, _mode: Mode) {
        let pulled = self.pull_u8();
        self.regs.p = pulled;
        self.regs.set_flag(StatusFlag::Break, false);
        self.regs.set_flag(StatusFlag::Unused, true);
    }

    // -- logic ---------------------------------------------------------------

    pub(crate) fn op_and(&mut self, mode: Mode) {
        let v = self.fetch_operand(mode);
        self.regs.a &= v;
        self.regs.update_zero_and_negative(self.regs.a);
    }

    pub(crate) fn op_ora(&mut self, mode: Mode) {
        let v = self.fetch_operand(mode);
        self.regs.a |= v;
        self.regs.update_zero_and_negative(self.regs.a);
    }

    pub(crate) fn op_eor(&mut self, mode: Mode) {
        let v = self.fetch_operand(mode);
        self.regs.a ^= v;
        self.regs.update_zero_and_negative(self.regs.a);
    }

    pub(crate) fn op_bit(&mut self, mode: Mode) {
        let v = self.fetch_operand(mode);
        self.regs.set_flag(StatusFlag::Zero, (self.regs.a & v) == 0);
        self.regs.set_flag(StatusFlag::Negative, v & 0x80 == 0x80);
        self.regs.set_flag(StatusFlag::Overflow, v & 0x40 == 0x40);
    }

    // -- arithmetic ------------------------------------------------------

    pub(crate) fn op_adc(&mut self, mode: Mode) {
        let operand = self.fetch_operand(mode);
        let a = self.regs.a;
        let carry_in = if self.regs.flag(StatusFlag::Carry) { 1u16 } else { 0 };
        let sum = a as u16 + operand as u16 + carry_in;
        let result = sum as u8;

        self.regs.set_flag(StatusFlag::Carry, sum > 0xFF);
        let overflow = (a ^ result) & (operand ^ result) & 0x80 != 0;
        self.regs.set_flag(StatusFlag::Overflow, overflow);
        self.regs.a = result;
        self.regs.update_zero_and_negative(self.regs.a);
    }

    pub(crate) fn op_sbc(&mut self, mode: Mode) {
        let operand = self.fetch_operand(mode);
        let a = self.regs.a;
        let borrow_in = if self.regs.flag(StatusFlag::Carry) { 0i32 } else { 1 };
        let diff = a as i32 - operand as i32 - borrow_in;
        let result = diff as u8;

        self.regs.set_flag(StatusFlag::Carry, diff >= 0);
        let overflow = (a ^ operand) & (a ^ result) & 0x80 != 0;
        self.regs.set_flag(StatusFlag::Overflow, overflow);
        self.regs.a = result;
        self.regs.update_zero_and_negative(self.regs.a);
    }

    // -- increment / decrement --------------------------------------------

    pub(crate) fn op_inx(&mut self, _mode: Mode) {
        self.regs.x = self.regs.x.wrapping_add(1);
        self.regs.update_zero_and_negative(self.regs.x);
    }

    pub(crate) fn op_iny(&mut self, _mode: Mode) {
        self.regs.y = self.regs.y.wrapping_add(1);
        self.regs.update_zero_and_negative(self.regs.y);
    }

    pub(crate) fn op_dex(&mut self, _mode: Mode) {
        self.regs.x = self.regs.x.wrapping_sub(1);
        self.regs.update_zero_and_negative(self.regs.x);
    }

    pub(crate) fn op_dey(&mut self, _mode: Mode) {
        self.regs.y = self.regs.y.wrapping_sub(1);
        self.regs.update_zero_and_negative(self.regs.y);
    }

    // -- compare -----------------------------------------------------------

    fn compare(&mut self, register: u8, operand: u8) {
        let result = register.wrapping_sub(operand);
        self.regs.set_flag(StatusFlag::Carry, register >= operand);
        self.regs.update_zero_and_negative(result);
    }

    pub(crate) fn op_cmp(&mut self, mode: Mode) {
        let v = self.fetch_operand(mode);
        self.compare(self.regs.a, v);
    }

    pub(crate) fn op_cpx(&mut self, mode: Mode) {
        let v = self.fetch_operand(mode);
        self.compare(self.regs.x, v);
    }

    pub(crate) fn op_cpy(&mut self, mode: Mode) {
        let v = self.fetch_operand(mode);
        self.compare(self.regs.y, v);
    }

    // -- branches ------------------------------------------------------------

    /// Shared branch body. Reads the signed offset byte, then jumps only if
    /// `taken` is true. The offset byte is always consumed either way.
    fn branch(&mut self, taken: bool) {
        let offset = self.next_u8() as i8;
        if taken {
            self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
        }
    }

    pub(crate) fn op_beq(&mut self, _mode: Mode) {
        let taken = self.regs.flag(StatusFlag::Zero);
        self.branch(taken);
    }

    pub(crate) fn op_bne(&mut self, _mode: Mode) {
        let taken = !self.regs.flag(StatusFlag::Zero);
        self.branch(taken);
    }

    pub(crate) fn op_bcc(&mut self, _mode: Mode) {
        let taken = !self.regs.flag(StatusFlag::Carry);
        self.branch(taken);
    }

    pub(crate) fn op_bcs(&mut self, _mode: Mode) {
        let taken = self.regs.flag(StatusFlag::Carry);
        self.branch(taken);
    }

    pub(crate) fn op_bmi(&mut self, _mode: Mode) {
        let taken = self.regs.flag(StatusFlag::Negative);
        self.branch(taken);
    }

    pub(crate) fn op_bpl(&mut self, _mode: Mode) {
        let taken = !self.regs.flag(StatusFlag::Negative);
        self.branch(taken);
    }

    pub(crate) fn op_bvc(&mut self, _mode: Mode) {
        let taken = !self.regs.flag(StatusFlag::Overflow);
        self.branch(taken);
    }

    pub(crate) fn op_bvs(&mut self, _mode: Mode) {
        let taken = self.regs.flag(StatusFlag::Overflow);
        self.branch(taken);
    }

    // -- jumps ---------------------------------------------------------------

    pub(crate) fn op_jmp(&mut self, mode: Mode) {
        self.regs.pc = self.fetch_address(mode);
    }

    pub(crate) fn op_jsr(&mut self, mode: Mode) {
        let target = self.fetch_address(mode);
        let return_to = self.regs.pc.wrapping_sub(1);
        let [lo, hi] = return_to.to_le_bytes();
        self.push_u8(hi);
        self.push_u8(lo);
        self.regs.pc = target;
    }

    pub(crate) fn op_rts(&mut self, _mode: Mode) {
        let lo = self.pull_u8();
        let hi = self.pull_u8();
        let return_to = u16::from_le_bytes([lo, hi]);
        self.regs.pc = return_to.wrapping_add(1);
    }

    // -- flags & misc ----------------------------------------------------

    pub(crate) fn op_clc(&mut self, _mode: Mode) {
        self.regs.set_flag(StatusFlag::Carry, false);
    }

    pub(crate) fn op_sec(&mut self, _mode: Mode) {
        self.regs.set_flag(StatusFlag::Carry, true);
    }

    pub(crate) fn op_clv(&mut self, _mode: Mode) {
        self.regs.set_flag(StatusFlag::Overflow, false);
    }

    pub(crate) fn op_sei(&mut self, _mode: Mode) {
        self.regs.set_flag(StatusFlag::InterruptDisable, true);
    }

    pub(crate) fn op_cli(&mut self, _mode: Mode) {
        self.regs.set_flag(StatusFlag::InterruptDisable, false);
    }

    pub(crate) fn op_nop(&mut self, _mode: Mode) {}

    pub(crate) fn op_brk(&mut self, _mode: Mode) {
        self.regs.set_flag(StatusFlag::Break, true);
        self.running = false;
    }
}

impl Default for Cpu {
    fn default() -> Cpu {
        Cpu::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_source(source: &str) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load(source).expect("program should assemble");
        cpu.run();
        cpu
    }

    #[test]
    fn lda_sets_zero_and_negative() {
        let cpu = run_source("LDA #$00\nBRK\n");
        assert_eq!(cpu.regs.a, 0);
        assert!(cpu.regs.flag(StatusFlag::Zero));
        assert!(!cpu.regs.flag(StatusFlag::Negative));
    }

    #[test]
    fn adc_overflow_boundary() {
        let cpu = run_source("CLC\nLDA #$7F\nADC #$01\nBRK\n");
        assert_eq!(cpu.regs.a, 0x80);
        assert!(cpu.regs.flag(StatusFlag::Negative));
        assert!(cpu.regs.flag(StatusFlag::Overflow));
        assert!(!cpu.regs.flag(StatusFlag::Carry));
    }

    #[test]
    fn adc_carry_out_no_overflow() {
        let cpu = run_source("CLC\nLDA #$FF\nADC #$01\nBRK\n");
        assert_eq!(cpu.regs.a, 0x00);
        assert!(cpu.regs.flag(StatusFlag::Zero));
        assert!(cpu.regs.flag(StatusFlag::Carry));
        assert!(!cpu.regs.flag(StatusFlag::Overflow));
    }

    #[test]
    fn sbc_borrow() {
        let cpu = run_source("SEC\nLDA #$00\nSBC #$01\nBRK\n");
        assert_eq!(cpu.regs.a, 0xFF);
        assert!(!cpu.regs.flag(StatusFlag::Carry));
        assert!(cpu.regs.flag(StatusFlag::Negative));
    }

    #[test]
    fn inx_wraps_with_flags() {
        let cpu = run_source("LDX #$FF\nINX\nBRK\n");
        assert_eq!(cpu.regs.x, 0x00);
        assert!(cpu.regs.flag(StatusFlag::Zero));
        assert!(!cpu.regs.flag(StatusFlag::Negative));
    }

    #[test]
    fn dex_wraps_with_flags() {
        let cpu = run_source("LDX #$00\nDEX\nBRK\n");
        assert_eq!(cpu.regs.x, 0xFF);
        assert!(cpu.regs.flag(StatusFlag::Negative));
    }

    #[test]
    fn jsr_rts_round_trip_restores_sp_and_pc() {
        let source = "JSR sub\nBRK\nsub:\nLDA #$42\nRTS\n";
        let mut cpu = Cpu::new();
        cpu.load(source).unwrap();
        let sp_before = cpu.regs.sp;
        cpu.run();
        assert_eq!(cpu.regs.a, 0x42);
        assert_eq!(cpu.regs.sp, sp_before);
        assert!(cpu.regs.flag(StatusFlag::Break));
    }

    #[test]
    fn pha_pla_round_trip_is_a_no_op_on_a() {
        let cpu = run_source("LDA #$37\nPHA\nLDA #$00\nPLA\nBRK\n");
        assert_eq!(cpu.regs.a, 0x37);
    }

    #[test]
    fn unknown_opcode_halts_and_records_fault() {
        let mut cpu = Cpu::new();
        cpu.load("NOP\nBRK\n").unwrap();
        // Poke an unassigned byte directly over the BRK at the end.
        cpu.mem.write_u8(cpu.regs.pc + 1, 0xFF);
        cpu.running = true;
        assert!(cpu.step()); // NOP
        assert!(!cpu.step()); // hits 0xFF
        assert!(!cpu.running);
        assert_eq!(cpu.last_fault.map(|f| f.opcode), Some(0xFF));
    }

    #[test]
    fn branch_backward_offset_loops() {
        let source = "LDY #$05\nloop:\nDEY\nCPY #$00\nBNE loop\nBRK\n";
        let cpu = run_source(source);
        assert_eq!(cpu.regs.y, 0);
        assert!(cpu.cycles > 0);
    }
}
