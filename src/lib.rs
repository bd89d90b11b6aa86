//! A two-pass assembler and cycle-counted interpreter for a subset of the
//! MOS Technology 6502 instruction set.
//!
//! http://www.6502.org/
//! https://en.wikipedia.org/wiki/MOS_Technology_6502
#![allow(clippy::new_without_default)]

pub mod asm;
pub mod cpu;
pub mod error;
pub mod mem;
pub mod opcodes;
pub mod regs;

pub use asm::assemble;
pub use cpu::Cpu;
pub use error::AsmError;
pub use mem::Mem;
pub use regs::{Regs, StatusFlag};
