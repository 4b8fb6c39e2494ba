//! The parsed form of a program, shared by the compiler and the emulator.

use std::fmt;

use itertools::Itertools;

use crate::instruction::{OpCode, OperandKind, Register};

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// One of the registers `A`-`D`.
    Register(Register),

    /// A literal value, written `#5` or `#0x05`.
    Immediate(i32),

    /// A memory address, written `[0x10]`.
    Memory(i32),

    /// A reference to a label. Stored in uppercase.
    Label(String),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Register(_) => OperandKind::Register,
            Operand::Immediate(_) => OperandKind::Immediate,
            Operand::Memory(_) => OperandKind::Memory,
            Operand::Label(_) => OperandKind::Label,
        }
    }

    pub fn register(&self) -> Option<Register> {
        match self {
            Operand::Register(reg) => Some(*reg),
            _ => None,
        }
    }

    /// Human readable description, e.g. `register A` or `memory cell [02h]`.
    pub fn describe(&self) -> String {
        match self {
            Operand::Register(reg) => format!("register {}", reg),
            Operand::Immediate(value) => format!("value {}", value),
            Operand::Memory(address) => format!("memory cell [{:02X}h]", address),
            Operand::Label(label) => format!("label {}", label),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "{}", reg),
            Operand::Immediate(value) => write!(f, "#{}", value),
            Operand::Memory(address) => write!(f, "[0x{:02X}]", address),
            Operand::Label(label) => write!(f, "{}", label),
        }
    }
}

/// A single parsed instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operands: Vec<Operand>,

    /// One-based line number in the source.
    pub line: usize,

    /// The source text of the line without its comment.
    pub source: String,
}

impl Instruction {
    /// The encoded size of the instruction in bytes.
    pub fn size(&self) -> usize {
        self.opcode.size()
    }

    /// The label this instruction jumps to, if it is a jump.
    pub fn jump_target(&self) -> Option<&str> {
        if !self.opcode.is_jump() {
            return None;
        }

        match self.operands.first() {
            Some(Operand::Label(label)) => Some(label),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}", self.opcode)
        } else {
            write!(f, "{} {}", self.opcode, self.operands.iter().join(", "))
        }
    }
}
