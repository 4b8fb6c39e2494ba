use slog::Logger;

use crate::compiler::{compile_program, CompileResult};
use crate::config::AssemblerConfig;
use crate::error::{AssemblyError, ErrorKind};
use crate::symbol_table::SymbolTable;

use super::ast::Instruction;
use super::parser::Parser;

/// A parsed and validated program.
///
/// This is the single representation consumed by both the [compiler](crate::compiler) and the
/// [emulator](crate::emulator).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Program {
    pub instructions: Vec<Instruction>,

    /// Label name to the index of the instruction following the label definition. A label at
    /// the end of the program maps to `instructions.len()`.
    pub labels: SymbolTable<usize>,
}

/// Checks that the operand count and operand kinds of `instruction` match the shape its
/// operation requires.
pub fn validate_instruction(instruction: &Instruction) -> Result<(), ErrorKind> {
    let desc = instruction.opcode.descriptor();

    if instruction.operands.len() != desc.operands.len() {
        return Err(ErrorKind::OperandCount {
            opcode: instruction.opcode,
            got: instruction.operands.len(),
        });
    }

    for (position, (operand, slot)) in instruction.operands.iter().zip(desc.operands).enumerate() {
        if !slot.contains(&operand.kind()) {
            return Err(ErrorKind::OperandKind {
                opcode: instruction.opcode,
                position: position + 1,
                got: operand.kind(),
            });
        }
    }

    Ok(())
}

impl Program {
    /// Parses and validates a program.
    ///
    /// # Errors
    /// Returns every syntax and shape error found in the source, in line order.
    pub fn parse(input: &str) -> Result<Program, Vec<AssemblyError>> {
        Parser::from_str(input).parse()
    }

    pub fn parse_with_logger<L>(input: &str, logger: L) -> Result<Program, Vec<AssemblyError>>
    where
        L: Into<Option<Logger>>,
    {
        Parser::with_logger(input, logger).parse()
    }

    /// Index of the instruction a label points to.
    pub fn label_index<S: AsRef<str>>(&self, label: S) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Assembles the program into bytes with the default limits.
    pub fn compile(&self) -> CompileResult {
        compile_program(self, &AssemblerConfig::default(), None)
    }
}
