//! Error types for the assembler.

use thiserror::Error;

/// Errors that can occur while assembling a program. Assembly either
/// succeeds wholesale or fails wholesale; there is no partial byte output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    /// The mnemonic on a line is not one this assembler knows.
    #[error("line {line}: unknown instruction {mnemonic:?}")]
    UnknownInstruction { line: usize, mnemonic: String },

    /// The mnemonic is known, but doesn't support the addressing mode
    /// implied by its operand (e.g. `STA #$42`).
    #[error("line {line}: {mnemonic} does not support this addressing mode ({operand:?})")]
    InvalidMode {
        line: usize,
        mnemonic: String,
        operand: String,
    },

    /// The operand text doesn't parse as an immediate, zero-page/absolute
    /// address, or a known label.
    #[error("line {line}: invalid operand {operand:?} for {mnemonic}")]
    InvalidOperand {
        line: usize,
        mnemonic: String,
        operand: String,
    },

    /// A branch's computed relative offset doesn't fit in a signed byte.
    #[error("line {line}: branch target {label:?} is out of range ({offset} bytes)")]
    BranchRange {
        line: usize,
        label: String,
        offset: i32,
    },

    /// The same label was defined more than once.
    #[error("line {line}: label {label:?} is already defined")]
    DuplicateLabel { line: usize, label: String },
}

pub type Result<T> = std::result::Result<T, AsmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_instruction_message_names_the_mnemonic() {
        let err = AsmError::UnknownInstruction {
            line: 3,
            mnemonic: "FOO".to_string(),
        };
        assert!(err.to_string().contains("FOO"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn invalid_mode_message_names_the_mnemonic() {
        let err = AsmError::InvalidMode {
            line: 7,
            mnemonic: "STA".to_string(),
            operand: "#$42".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("STA"));
        assert!(msg.contains("#$42"));
    }

    #[test]
    fn invalid_operand_message_names_the_operand() {
        let err = AsmError::InvalidOperand {
            line: 12,
            mnemonic: "LDA".to_string(),
            operand: "missing".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing"));
        assert!(msg.contains("LDA"));
    }

    #[test]
    fn branch_range_message_names_the_label_and_offset() {
        let err = AsmError::BranchRange {
            line: 10,
            label: "far".to_string(),
            offset: 200,
        };
        let msg = err.to_string();
        assert!(msg.contains("far"));
        assert!(msg.contains("200"));
    }

    #[test]
    fn duplicate_label_message_names_the_label() {
        let err = AsmError::DuplicateLabel {
            line: 5,
            label: "loop".to_string(),
        };
        assert!(err.to_string().contains("loop"));
    }
}
