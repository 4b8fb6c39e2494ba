//! Compilation from assembly source to machine code.
//!
//! Compilation runs in two passes over the parsed [Program]. The first pass lays the
//! instructions out in memory. Every operation has a fixed encoded size, so the address of
//! every instruction (and therefore of every label) is known after a single walk. The second
//! pass encodes the instructions, resolving label references through the symbol table built
//! from the layout.

use std::fmt;

use itertools::Itertools;
use slog::{debug, o, trace, Discard, Logger};

use crate::config::AssemblerConfig;
use crate::error::{AssemblyError, ErrorKind, Warning, WarningKind};
use crate::instruction::OpCode;
use crate::symbol_table::SymbolTable;
use crate::symbolic::{validate_instruction, Instruction, Operand, Program};

/// One line of the listing: an instruction's address, its bytes and its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingLine {
    pub address: u16,
    pub bytes: Vec<u8>,
    pub source: String,
}

impl fmt::Display for ListingLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02X}: {} ; {}",
            self.address,
            self.bytes.iter().map(|b| format!("{:02X}", b)).join(" "),
            self.source
        )
    }
}

/// Outcome of a compilation. A compilation either produces the whole program or nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileResult {
    Success {
        bytes: Vec<u8>,
        listing: Vec<ListingLine>,
        /// Label name to byte address, in definition order.
        symbol_table: SymbolTable<u16>,
        warnings: Vec<Warning>,
    },
    Failure {
        /// Never empty.
        errors: Vec<AssemblyError>,
        warnings: Vec<Warning>,
    },
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        match self {
            CompileResult::Success { .. } => true,
            CompileResult::Failure { .. } => false,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            CompileResult::Success { bytes, .. } => Some(bytes),
            CompileResult::Failure { .. } => None,
        }
    }

    pub fn symbol_table(&self) -> Option<&SymbolTable<u16>> {
        match self {
            CompileResult::Success { symbol_table, .. } => Some(symbol_table),
            CompileResult::Failure { .. } => None,
        }
    }

    pub fn listing(&self) -> &[ListingLine] {
        match self {
            CompileResult::Success { listing, .. } => listing,
            CompileResult::Failure { .. } => &[],
        }
    }

    pub fn errors(&self) -> &[AssemblyError] {
        match self {
            CompileResult::Success { .. } => &[],
            CompileResult::Failure { errors, .. } => errors,
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        match self {
            CompileResult::Success { warnings, .. } | CompileResult::Failure { warnings, .. } => {
                warnings
            }
        }
    }

    fn failure(errors: Vec<AssemblyError>) -> CompileResult {
        CompileResult::Failure {
            errors,
            warnings: Vec::new(),
        }
    }
}

/// Computes the byte address of every instruction and the total program size.
fn layout(instructions: &[Instruction]) -> (Vec<usize>, usize) {
    let mut addresses = Vec::with_capacity(instructions.len());
    let mut offset = 0;

    for instruction in instructions {
        addresses.push(offset);
        offset += instruction.size();
    }

    (addresses, offset)
}

fn to_byte(line: usize, value: i64) -> Result<u8, AssemblyError> {
    if (0..=255).contains(&value) {
        Ok(value as u8)
    } else {
        Err(AssemblyError::new(line, ErrorKind::ValueOutOfRange { value }))
    }
}

/// Packs a register index into the high nibble and `low` into the low nibble.
fn register_byte(high: usize, low: usize) -> u8 {
    ((high << 4) | low) as u8
}

/// Encodes a single instruction located at `address`.
fn encode_instruction(
    instruction: &Instruction,
    address: usize,
    symbols: &SymbolTable<u16>,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<u8>, AssemblyError> {
    use Operand::*;

    let line = instruction.line;
    let op = instruction.opcode.as_byte();

    let bytes = match (instruction.opcode, instruction.operands.as_slice()) {
        (OpCode::Halt, []) => vec![op],
        (OpCode::Increment, [Register(reg)]) | (OpCode::Decrement, [Register(reg)]) => {
            vec![op, register_byte(reg.index(), 0)]
        }
        (OpCode::Add, [Register(dst), Register(src)])
        | (OpCode::Subtract, [Register(dst), Register(src)])
        | (OpCode::Compare, [Register(dst), Register(src)]) => {
            vec![op, register_byte(dst.index(), src.index())]
        }
        (OpCode::Load, [Register(reg), Immediate(value)]) => {
            vec![op, register_byte(reg.index(), 0), to_byte(line, *value as i64)?]
        }
        (OpCode::Load, [Register(reg), Memory(cell)]) => {
            vec![op, register_byte(reg.index(), 1), to_byte(line, *cell as i64)?]
        }
        (OpCode::Store, [Register(reg), Memory(cell)]) => {
            vec![op, register_byte(reg.index(), 0), to_byte(line, *cell as i64)?]
        }
        (opcode, [Label(label)]) if opcode.is_jump() => {
            let target = symbols.get(label).copied().ok_or_else(|| {
                AssemblyError::new(
                    line,
                    ErrorKind::UndefinedLabel {
                        label: label.clone(),
                        suggestion: symbols.closest(label).map(str::to_string),
                    },
                )
            })?;

            if target as usize == address {
                warnings.push(Warning {
                    line,
                    kind: WarningKind::SelfJump { address: target },
                });
            }

            vec![op, to_byte(line, target as i64)?]
        }
        _ => {
            let kind = validate_instruction(instruction).err().unwrap_or(ErrorKind::OperandCount {
                opcode: instruction.opcode,
                got: instruction.operands.len(),
            });

            return Err(AssemblyError::new(line, kind));
        }
    };

    Ok(bytes)
}

/// Compiles source text with the default limits.
pub fn compile(source: &str) -> CompileResult {
    compile_with_logger(source, &AssemblerConfig::default(), None)
}

/// Compiles source text.
///
/// Source text longer than [AssemblerConfig::max_source_length] characters is rejected without
/// parsing it.
pub fn compile_with_logger<L>(source: &str, config: &AssemblerConfig, logger: L) -> CompileResult
where
    L: Into<Option<Logger>>,
{
    let logger = logger.into().unwrap_or(Logger::root(Discard, o!()));

    let length = source.chars().count();

    if length > config.max_source_length {
        debug!(logger, "source rejected"; "length" => length);

        return CompileResult::failure(vec![AssemblyError::global(ErrorKind::SourceTooLarge {
            length,
            limit: config.max_source_length,
        })]);
    }

    match Program::parse_with_logger(source, logger.clone()) {
        Ok(program) => compile_program(&program, config, logger),
        Err(errors) => CompileResult::failure(errors),
    }
}

/// Compiles an already parsed program.
pub fn compile_program<L>(program: &Program, config: &AssemblerConfig, logger: L) -> CompileResult
where
    L: Into<Option<Logger>>,
{
    let logger = logger
        .into()
        .unwrap_or(Logger::root(Discard, o!()))
        .new(o!("stage" => "compilation"));

    let (addresses, size) = layout(&program.instructions);

    if size > config.max_program_bytes {
        debug!(logger, "program too large"; "size" => size);

        return CompileResult::failure(vec![AssemblyError::global(ErrorKind::ProgramTooLarge {
            size,
            limit: config.max_program_bytes,
        })]);
    }

    let symbol_table = program.labels.map(|label, index| {
        let address = addresses.get(*index).copied().unwrap_or(size);
        trace!(logger, "resolve label"; "label" => label, "index" => index, "address" => address);
        address as u16
    });

    let mut bytes = Vec::with_capacity(size);
    let mut listing = Vec::with_capacity(program.instructions.len());
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (instruction, address) in program.instructions.iter().zip(addresses) {
        match encode_instruction(instruction, address, &symbol_table, &mut warnings) {
            Ok(encoded) => {
                trace!(logger, "append instruction";
                    "address" => address,
                    "instruction" => %instruction,
                    "bytes" => ?encoded);

                bytes.extend_from_slice(&encoded);
                listing.push(ListingLine {
                    address: address as u16,
                    bytes: encoded,
                    source: instruction.source.clone(),
                });
            }
            Err(err) => {
                trace!(logger, "encoding failed"; "address" => address, "error" => %err);
                errors.push(err);
            }
        }
    }

    debug!(logger, "compilation finished";
        "size" => bytes.len(),
        "errors" => errors.len(),
        "warnings" => warnings.len());

    if !errors.is_empty() {
        return CompileResult::Failure { errors, warnings };
    }

    CompileResult::Success {
        bytes,
        listing,
        symbol_table,
        warnings,
    }
}

#[test]
fn test_compile() {
    let source = r#"
        ; add two numbers and store the sum
        LOAD  A, #1
        LOAD  B, #2
        ADD   A, B
        STORE A, [0x10]
        HLT
    "#;

    let result = compile(source);

    assert_eq!(
        result.bytes(),
        Some(&[0x01, 0x00, 0x01, 0x01, 0x10, 0x02, 0x03, 0x01, 0x02, 0x00, 0x10, 0xFF][..])
    );
    assert!(result.warnings().is_empty());
}

#[test]
fn test_compile_listing() {
    let result = compile("start: LOAD C, [0x2a] ; read\nDEC C\nJNZ start\nHLT");

    let listing: Vec<_> = result.listing().iter().map(ToString::to_string).collect();

    assert_eq!(
        listing,
        vec![
            "00: 01 21 2A ; start: LOAD C, [0x2a]",
            "03: 06 20 ; DEC C",
            "05: 09 00 ; JNZ start",
            "07: FF ; HLT",
        ]
    );
}

#[test]
fn test_compile_symbol_table() {
    let result = compile("INC A\nloop: DEC B\nJZ end\nJMP loop\nend:");

    let symbols: Vec<_> = result
        .symbol_table()
        .expect("compilation failed")
        .iter()
        .map(|(label, address)| (label.to_string(), *address))
        .collect();

    assert_eq!(symbols, vec![("LOOP".to_string(), 2), ("END".to_string(), 8)]);
    assert_eq!(result.bytes().map(<[u8]>::len), Some(8));
}

#[test]
fn test_compile_undefined_label() {
    let result = compile("loop: INC A\nJNZ lop\nJMP nowhere\nHLT");

    let errors: Vec<_> = result.errors().iter().map(ToString::to_string).collect();

    assert_eq!(
        errors,
        vec![
            "2: undefined label LOP (did you mean LOOP?)",
            "3: undefined label NOWHERE",
        ]
    );
}

#[test]
fn test_compile_program_too_large() {
    // 86 three byte instructions followed by HLT: 259 bytes.
    let source = std::iter::repeat("LOAD A, #1")
        .take(86)
        .chain(std::iter::once("HLT"))
        .join("\n");

    let result = compile(&source);

    assert_eq!(
        result.errors(),
        &[AssemblyError::global(ErrorKind::ProgramTooLarge { size: 259, limit: 256 })][..]
    );
}

#[test]
fn test_compile_exactly_full_memory() {
    // 85 * 3 + 1 = 256 bytes.
    let source = std::iter::repeat("STORE D, [0xFF]")
        .take(85)
        .chain(std::iter::once("HLT"))
        .join("\n");

    let result = compile(&source);

    assert_eq!(result.bytes().map(<[u8]>::len), Some(256));
}

#[test]
fn test_compile_with_logger() {
    use slog::Drain;

    let decorator = slog_term::PlainDecorator::new(std::io::sink());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let result = compile_with_logger("here: JMP here", &AssemblerConfig::default(), logger);

    assert!(result.is_success());
    assert_eq!(result.warnings().len(), 1);
}
