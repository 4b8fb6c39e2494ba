//! Parsing and storing symbolic assembly programs.

pub mod ast;
pub mod parser;
pub mod program;
pub mod token;

pub use self::ast::{Instruction, Operand};
pub use self::program::{validate_instruction, Program};
