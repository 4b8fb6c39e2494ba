//! Error and warning types produced by the assembler, the decoder and the emulator.

use std::error::Error as StdError;
use std::fmt;

use itertools::Itertools;

use crate::instruction::{OpCode, OperandKind};

/// Reason of an [AssemblyError].
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// The mnemonic is not part of the instruction set.
    UnknownInstruction {
        token: String,
        suggestion: Option<&'static str>,
    },

    /// Text in front of a `:` is not a valid label name.
    InvalidLabelName(String),

    /// A label named like a register. References to it would be read as the register.
    RegisterLabel(String),

    /// The label has already been defined earlier in the program.
    DuplicateLabel(String),

    /// A numeric literal that is neither decimal nor `0x` hexadecimal.
    InvalidNumber(String),

    /// A `[...]` operand whose content is not a number.
    InvalidMemoryOperand(String),

    /// A `#...` operand whose content is not a number.
    InvalidImmediate(String),

    /// An operand that does not have the shape of any operand kind.
    InvalidOperand(String),

    /// Two consecutive separators or a trailing separator.
    MissingOperand,

    /// A character that cannot start any token.
    InvalidCharacter(String),

    OperandCount {
        opcode: OpCode,
        got: usize,
    },

    OperandKind {
        opcode: OpCode,
        /// One-based position of the offending operand.
        position: usize,
        got: OperandKind,
    },

    /// A label reference without a definition.
    UndefinedLabel {
        label: String,
        suggestion: Option<String>,
    },

    /// An immediate, address or jump target that does not fit in a byte.
    ValueOutOfRange {
        value: i64,
    },

    ProgramTooLarge {
        size: usize,
        limit: usize,
    },

    SourceTooLarge {
        length: usize,
        limit: usize,
    },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::UnknownInstruction { token, suggestion } => {
                write!(f, "неизвестная инструкция {}", token)?;

                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean {}?)", suggestion)?;
                }

                Ok(())
            }
            ErrorKind::InvalidLabelName(name) => write!(f, "invalid label name '{}'", name),
            ErrorKind::RegisterLabel(name) => {
                write!(f, "label {} has the name of a register", name)
            }
            ErrorKind::DuplicateLabel(name) => write!(f, "label {} is already defined", name),
            ErrorKind::InvalidNumber(text) => write!(f, "invalid number '{}'", text),
            ErrorKind::InvalidMemoryOperand(text) => {
                write!(f, "invalid memory operand '{}', expected an address like [0x10]", text)
            }
            ErrorKind::InvalidImmediate(text) => {
                write!(f, "invalid immediate operand '{}', expected a value like #5", text)
            }
            ErrorKind::InvalidOperand(text) => write!(f, "invalid operand '{}'", text),
            ErrorKind::MissingOperand => write!(f, "missing operand"),
            ErrorKind::InvalidCharacter(text) => write!(f, "unexpected character '{}'", text),
            ErrorKind::OperandCount { opcode, got } => {
                let desc = opcode.descriptor();

                write!(
                    f,
                    "{} expects {} operand(s) ({}), got {}",
                    opcode,
                    desc.operands.len(),
                    desc.shape(),
                    got
                )
            }
            ErrorKind::OperandKind { opcode, position, got } => {
                let desc = opcode.descriptor();
                let expected = desc
                    .operands
                    .get(position - 1)
                    .map(|slot| slot.iter().join(" or "))
                    .unwrap_or_default();

                write!(
                    f,
                    "operand {} of {} must be {}, got {} (expected {})",
                    position,
                    opcode,
                    expected,
                    got,
                    desc.shape()
                )
            }
            ErrorKind::UndefinedLabel { label, suggestion } => {
                write!(f, "undefined label {}", label)?;

                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean {}?)", suggestion)?;
                }

                Ok(())
            }
            ErrorKind::ValueOutOfRange { value } => {
                write!(f, "value {} is out of range (0..=255)", value)
            }
            ErrorKind::ProgramTooLarge { size, limit } => {
                write!(f, "program too large: {} bytes, the limit is {} bytes", size, limit)
            }
            ErrorKind::SourceTooLarge { length, limit } => write!(
                f,
                "source too large: {} characters, the limit is {} characters",
                length, limit
            ),
        }
    }
}

/// A diagnostic produced while parsing, validating or encoding a program.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyError {
    /// One-based source line, if the error belongs to a line.
    pub line: Option<usize>,
    pub kind: ErrorKind,
}

impl AssemblyError {
    pub fn new(line: usize, kind: ErrorKind) -> AssemblyError {
        AssemblyError {
            line: Some(line),
            kind,
        }
    }

    /// An error that concerns the whole program.
    pub fn global(kind: ErrorKind) -> AssemblyError {
        AssemblyError { line: None, kind }
    }
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}: {}", line, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for AssemblyError {}

#[derive(Debug, Clone, PartialEq)]
pub enum WarningKind {
    /// A jump whose target is the jump instruction itself.
    SelfJump { address: u16 },
}

/// A non-fatal diagnostic. Never prevents a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub line: usize,
    pub kind: WarningKind,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            WarningKind::SelfJump { address } => write!(
                f,
                "{}: jump to current instruction may cause an infinite loop (address {:02X}h)",
                self.line, address
            ),
        }
    }
}

/// A fault detected while executing an instruction. The emulator halts when one occurs.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// The operands of an instruction do not match its shape.
    MalformedInstruction { line: usize, opcode: OpCode },

    /// A jump to a label that is not defined in the program.
    UndefinedLabel(String),

    /// A memory operand outside of the machine's memory.
    AddressOutOfRange { address: i32 },

    /// The result of an arithmetic operation does not fit in a register.
    Overflow { opcode: OpCode },

    /// The decode or execute phase was entered without a fetched instruction.
    NothingFetched,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::MalformedInstruction { line, opcode } => {
                write!(f, "malformed {} instruction on line {}", opcode, line)
            }
            RuntimeError::UndefinedLabel(label) => write!(f, "jump to undefined label {}", label),
            RuntimeError::AddressOutOfRange { address } => {
                write!(f, "memory address {} is outside of the memory", address)
            }
            RuntimeError::Overflow { opcode } => write!(f, "arithmetic overflow in {}", opcode),
            RuntimeError::NothingFetched => write!(f, "no instruction has been fetched"),
        }
    }
}

impl StdError for RuntimeError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeErrorKind {
    UnknownOpcode(u8),

    /// The instruction extends past the end of the byte stream.
    Truncated,

    InvalidRegister(u8),

    /// The low nibble of a `LOAD` operand byte is neither 0 nor 1.
    InvalidMode(u8),
}

/// Error produced by [disassemble](crate::bytecode::disassemble).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeError {
    /// Address of the first byte of the offending instruction.
    pub address: usize,
    pub kind: DecodeErrorKind,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "at {:02X}: ", self.address)?;

        match self.kind {
            DecodeErrorKind::UnknownOpcode(byte) => write!(f, "unknown opcode {:02X}", byte),
            DecodeErrorKind::Truncated => write!(f, "truncated instruction"),
            DecodeErrorKind::InvalidRegister(nibble) => write!(f, "invalid register {}", nibble),
            DecodeErrorKind::InvalidMode(nibble) => write!(f, "invalid addressing mode {}", nibble),
        }
    }
}

impl StdError for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_prefix() {
        let err = AssemblyError::new(
            3,
            ErrorKind::UnknownInstruction {
                token: "FOO".into(),
                suggestion: None,
            },
        );

        assert_eq!(err.to_string(), "3: неизвестная инструкция FOO");
    }

    #[test]
    fn shape_errors_name_the_expected_shape() {
        let err = AssemblyError::new(1, ErrorKind::OperandCount { opcode: OpCode::Add, got: 1 });
        assert_eq!(err.to_string(), "1: ADD expects 2 operand(s) (register, register), got 1");

        let err = AssemblyError::new(
            2,
            ErrorKind::OperandKind {
                opcode: OpCode::Load,
                position: 2,
                got: OperandKind::Register,
            },
        );
        assert_eq!(
            err.to_string(),
            "2: operand 2 of LOAD must be immediate or memory, got register \
             (expected register, immediate or memory)"
        );
    }
}
