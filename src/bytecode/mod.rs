//! Decoding machine code back into instructions.

use std::convert::TryFrom;
use std::fmt;

use itertools::Itertools;
use nom::{bytes::complete::take, number::complete::be_u8, IResult};

use crate::error::{DecodeError, DecodeErrorKind};
use crate::instruction::{OpCode, Register};

/// An operand as it appears in machine code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodedOperand {
    Register(Register),
    Immediate(u8),
    Memory(u8),

    /// Byte address of a jump target. Label names are not part of the encoding.
    Target(u8),
}

impl fmt::Display for DecodedOperand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodedOperand::Register(reg) => write!(f, "{}", reg),
            DecodedOperand::Immediate(value) => write!(f, "#{}", value),
            DecodedOperand::Memory(address) => write!(f, "[0x{:02X}]", address),
            DecodedOperand::Target(address) => write!(f, "0x{:02X}", address),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedInstruction {
    pub address: usize,
    pub opcode: OpCode,
    pub operands: Vec<DecodedOperand>,
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02X}: {}", self.address, self.opcode)?;

        if !self.operands.is_empty() {
            write!(f, " {}", self.operands.iter().join(", "))?;
        }

        Ok(())
    }
}

fn register(nibble: u8) -> Result<Register, DecodeErrorKind> {
    Register::try_from(nibble).map_err(DecodeErrorKind::InvalidRegister)
}

fn split(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0F)
}

/// Requires the low nibble of a register byte to be `expected`.
fn mode(nibble: u8, expected: u8) -> Result<(), DecodeErrorKind> {
    if nibble == expected {
        Ok(())
    } else {
        Err(DecodeErrorKind::InvalidMode(nibble))
    }
}

fn opcode_byte(input: &[u8]) -> IResult<&[u8], u8> {
    be_u8(input)
}

fn operand_bytes(input: &[u8], count: usize) -> IResult<&[u8], &[u8]> {
    take(count)(input)
}

/// Decodes the operand bytes of one instruction.
fn decode_operands(opcode: OpCode, bytes: &[u8]) -> Result<Vec<DecodedOperand>, DecodeErrorKind> {
    use DecodedOperand::*;

    let operands = match (opcode, bytes) {
        (OpCode::Halt, []) => vec![],
        (OpCode::Increment, [regs]) | (OpCode::Decrement, [regs]) => {
            let (reg, low) = split(*regs);
            mode(low, 0)?;
            vec![Register(register(reg)?)]
        }
        (OpCode::Add, [regs]) | (OpCode::Subtract, [regs]) | (OpCode::Compare, [regs]) => {
            let (dst, src) = split(*regs);
            vec![Register(register(dst)?), Register(register(src)?)]
        }
        (OpCode::Load, [regs, value]) => {
            let (reg, low) = split(*regs);
            let source = match low {
                0 => Immediate(*value),
                1 => Memory(*value),
                other => return Err(DecodeErrorKind::InvalidMode(other)),
            };
            vec![Register(register(reg)?), source]
        }
        (OpCode::Store, [regs, address]) => {
            let (reg, low) = split(*regs);
            mode(low, 0)?;
            vec![Register(register(reg)?), Memory(*address)]
        }
        (opcode, [target]) if opcode.is_jump() => vec![Target(*target)],
        _ => return Err(DecodeErrorKind::Truncated),
    };

    Ok(operands)
}

/// Decodes a complete byte stream produced by the [compiler](crate::compiler).
///
/// # Errors
/// Fails on the first unknown opcode, truncated instruction or invalid operand byte.
pub fn disassemble(bytes: &[u8]) -> Result<Vec<DecodedInstruction>, DecodeError> {
    let mut instructions = Vec::new();
    let mut input = bytes;

    while !input.is_empty() {
        let address = bytes.len() - input.len();
        let error = |kind| DecodeError { address, kind };

        let (rest, byte) = opcode_byte(input).map_err(|_| error(DecodeErrorKind::Truncated))?;
        let opcode = OpCode::from_byte(byte).ok_or(error(DecodeErrorKind::UnknownOpcode(byte)))?;

        let (rest, operands) = operand_bytes(rest, opcode.size() - 1)
            .map_err(|_| error(DecodeErrorKind::Truncated))?;

        instructions.push(DecodedInstruction {
            address,
            opcode,
            operands: decode_operands(opcode, operands).map_err(error)?,
        });

        input = rest;
    }

    Ok(instructions)
}
