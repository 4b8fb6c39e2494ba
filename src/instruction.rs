//! Types for describing the instruction set: operations, registers and operand shapes.
//!
//! Everything that depends on the instruction set (parser, validator, encoder, decoder and the
//! emulator) reads it from the [descriptor table](OpCode::descriptor) defined here.

use std::convert::TryFrom;
use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use lazy_static::lazy_static;

/// Operations of the toy instruction set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Copies an immediate value or the contents of a memory cell into a register.
    Load,

    /// Copies the value of a register into a memory cell.
    Store,

    /// Adds the value of the second register into the first one.
    Add,

    /// Subtracts the value of the second register from the first one.
    Subtract,

    /// Increments a register by one.
    Increment,

    /// Decrements a register by one.
    Decrement,

    /// Subtracts the second operand from the first and only keeps the flags.
    Compare,

    /// Unconditional jump to a label.
    Jump,

    /// Jump if the [zero flag](crate::emulator::Flags::zero) is clear.
    JumpNotZero,

    /// Jump if the [zero flag](crate::emulator::Flags::zero) is set.
    JumpZero,

    /// Stops the processor.
    Halt,
}

/// The kind of a single operand, used to describe the shape an operation expects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    Register,
    Immediate,
    Memory,
    Label,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperandKind::Register => write!(f, "register"),
            OperandKind::Immediate => write!(f, "immediate"),
            OperandKind::Memory => write!(f, "memory"),
            OperandKind::Label => write!(f, "label"),
        }
    }
}

/// The operand kinds accepted in a single operand position.
pub type OperandSlot = &'static [OperandKind];

/// Static description of one operation.
#[derive(Debug)]
pub struct Descriptor {
    pub opcode: OpCode,
    pub mnemonic: &'static str,

    /// The first byte of the encoded instruction.
    pub byte: u8,

    /// The encoded size in bytes. Does not depend on the operand values.
    pub size: usize,

    /// Accepted operand kinds, one slot per operand.
    pub operands: &'static [OperandSlot],
}

impl Descriptor {
    /// Renders the expected operand shape, e.g. `register, immediate or memory`.
    pub fn shape(&self) -> String {
        if self.operands.is_empty() {
            return "no operands".to_string();
        }

        self.operands
            .iter()
            .map(|slot| slot.iter().join(" or "))
            .join(", ")
    }
}

const REGISTER: OperandSlot = &[OperandKind::Register];
const SOURCE: OperandSlot = &[OperandKind::Immediate, OperandKind::Memory];
const MEMORY: OperandSlot = &[OperandKind::Memory];
const LABEL: OperandSlot = &[OperandKind::Label];

/// The instruction set, in opcode order.
pub static INSTRUCTION_SET: [Descriptor; 11] = [
    Descriptor { opcode: OpCode::Load,        mnemonic: "LOAD",  byte: 0x01, size: 3, operands: &[REGISTER, SOURCE] },
    Descriptor { opcode: OpCode::Store,       mnemonic: "STORE", byte: 0x02, size: 3, operands: &[REGISTER, MEMORY] },
    Descriptor { opcode: OpCode::Add,         mnemonic: "ADD",   byte: 0x03, size: 2, operands: &[REGISTER, REGISTER] },
    Descriptor { opcode: OpCode::Subtract,    mnemonic: "SUB",   byte: 0x04, size: 2, operands: &[REGISTER, REGISTER] },
    Descriptor { opcode: OpCode::Increment,   mnemonic: "INC",   byte: 0x05, size: 2, operands: &[REGISTER] },
    Descriptor { opcode: OpCode::Decrement,   mnemonic: "DEC",   byte: 0x06, size: 2, operands: &[REGISTER] },
    Descriptor { opcode: OpCode::Compare,     mnemonic: "CMP",   byte: 0x07, size: 2, operands: &[REGISTER, REGISTER] },
    Descriptor { opcode: OpCode::Jump,        mnemonic: "JMP",   byte: 0x08, size: 2, operands: &[LABEL] },
    Descriptor { opcode: OpCode::JumpNotZero, mnemonic: "JNZ",   byte: 0x09, size: 2, operands: &[LABEL] },
    Descriptor { opcode: OpCode::JumpZero,    mnemonic: "JZ",    byte: 0x0A, size: 2, operands: &[LABEL] },
    Descriptor { opcode: OpCode::Halt,        mnemonic: "HLT",   byte: 0xFF, size: 1, operands: &[] },
];

lazy_static! {
    static ref MNEMONICS: HashMap<&'static str, OpCode> = INSTRUCTION_SET
        .iter()
        .map(|desc| (desc.mnemonic, desc.opcode))
        .collect();
}

impl OpCode {
    pub fn descriptor(&self) -> &'static Descriptor {
        let index = match self {
            OpCode::Load => 0,
            OpCode::Store => 1,
            OpCode::Add => 2,
            OpCode::Subtract => 3,
            OpCode::Increment => 4,
            OpCode::Decrement => 5,
            OpCode::Compare => 6,
            OpCode::Jump => 7,
            OpCode::JumpNotZero => 8,
            OpCode::JumpZero => 9,
            OpCode::Halt => 10,
        };

        &INSTRUCTION_SET[index]
    }

    /// Looks up an operation by its mnemonic, ignoring case.
    pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
        MNEMONICS.get(mnemonic.to_uppercase().as_str()).copied()
    }

    /// Returns the known mnemonic closest to `input`, if any is within two edits.
    pub fn suggest(input: &str) -> Option<&'static str> {
        let input = input.to_uppercase();

        INSTRUCTION_SET
            .iter()
            .map(|desc| (edit_distance::edit_distance(&input, desc.mnemonic), desc.mnemonic))
            .filter(|(distance, _)| *distance <= 2)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, mnemonic)| mnemonic)
    }

    pub fn mnemonic(&self) -> &'static str {
        self.descriptor().mnemonic
    }

    pub fn as_byte(&self) -> u8 {
        self.descriptor().byte
    }

    pub fn from_byte(byte: u8) -> Option<OpCode> {
        INSTRUCTION_SET
            .iter()
            .find(|desc| desc.byte == byte)
            .map(|desc| desc.opcode)
    }

    /// Encoded size of the instruction in bytes.
    pub fn size(&self) -> usize {
        self.descriptor().size
    }

    pub fn is_jump(&self) -> bool {
        match self {
            OpCode::Jump | OpCode::JumpNotZero | OpCode::JumpZero => true,
            _ => false,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// The four general purpose registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    A,
    B,
    C,
    D,
}

impl Register {
    pub const ALL: [Register; 4] = [Register::A, Register::B, Register::C, Register::D];

    pub fn index(&self) -> usize {
        match self {
            Register::A => 0,
            Register::B => 1,
            Register::C => 2,
            Register::D => 3,
        }
    }

    /// Parses a register name, ignoring case.
    pub fn from_name(name: &str) -> Option<Register> {
        match name.to_uppercase().as_str() {
            "A" => Some(Register::A),
            "B" => Some(Register::B),
            "C" => Some(Register::C),
            "D" => Some(Register::D),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Register {
    type Error = u8;

    fn try_from(nibble: u8) -> Result<Register, u8> {
        Register::ALL.get(nibble as usize).copied().ok_or(nibble)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Register::A => write!(f, "A"),
            Register::B => write!(f, "B"),
            Register::C => write!(f, "C"),
            Register::D => write!(f, "D"),
        }
    }
}
