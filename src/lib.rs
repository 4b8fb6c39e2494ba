//! A crate for assembling and interpreting programs for a small teaching CPU with four
//! registers, 256 memory cells and eleven instructions.
//!
//! This crate provides the functionality to:
//! - Parse and validate symbolic assembly into a [Program](symbolic::Program).
//! - Compile a program into machine code with a listing and a symbol table.
//! - Disassemble machine code.
//! - Execute a program one fetch, decode or execute phase at a time, with an explanation of
//!   every phase.
//!
//! The compiler and the emulator both consume the same parsed [Program](symbolic::Program),
//! and both read the instruction set from the single
//! [descriptor table](instruction::INSTRUCTION_SET).
//!
//! # Assembly language
//!
//! One instruction per line. A line may start with a `label:` and everything after a `;` is a
//! comment. Mnemonics, registers and labels are case-insensitive.
//!
//! ```text
//!         LOAD  A, #5         ; immediate value
//!         LOAD  B, [0x10]     ; memory cell
//! loop:   DEC   B
//!         JNZ   loop
//!         STORE A, [0x11]
//!         HLT
//! ```
//!
//! # Example
//! ```
//! use toycpu::{
//!     compiler::compile,
//!     emulator::{Emulator, RunOutcome},
//!     instruction::Register,
//!     symbolic::Program,
//! };
//!
//! let source = "LOAD A, #5\nLOAD B, #7\nADD A, B\nSTORE A, [0x00]\nHLT";
//!
//! // Compile into machine code.
//! let compiled = compile(source);
//! assert_eq!(compiled.bytes().map(<[u8]>::len), Some(12));
//!
//! // Or run it step by step.
//! let program = Program::parse(source).expect("invalid program");
//! let mut emulator = Emulator::new(program);
//!
//! while !emulator.is_halted() {
//!     let step = emulator.step();
//!     println!("{}", step.explanation);
//! }
//!
//! assert_eq!(emulator.state().registers[Register::A], 12);
//! assert_eq!(emulator.state().memory[0], 12);
//! assert_eq!(emulator.run(), RunOutcome::Halted);
//! ```
//!
//! # Executables
//!
//! Built with the `tools` feature.
//!
//! ## `toyasm`
//!
//! Compiles a source file, prints the diagnostics and optionally the listing and the symbol
//! table, and writes the machine code to a file.
//!
//! ## `toyrun`
//!
//! Runs a source file phase by phase and prints the explanation of every phase.

pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod emulator;
pub mod error;
pub mod event;
pub mod history;
pub mod instruction;
pub mod symbol_table;
pub mod symbolic;
