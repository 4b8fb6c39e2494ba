//! Line based parser for the symbolic assembly.
//!
//! Each line is either empty (after removing its `;` comment), a label definition, an
//! instruction, or a label followed by an instruction. Errors do not stop the parser: every line
//! is examined so that all problems can be reported at once, but after the first error no more
//! instructions are added to the program.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag_no_case, take_till1, take_while, take_while1},
    character::complete::{char, digit1, hex_digit1},
    combinator::{all_consuming, map, map_res, opt, recognize},
    sequence::{pair, preceded, terminated, tuple},
};

use slog::{debug, o, trace, Discard, Logger};

use crate::error::{AssemblyError, ErrorKind};
use crate::instruction::{OpCode, Register};
use crate::symbol_table::{normalize, SymbolTable};

use super::ast::{Instruction, Operand};
use super::program::{validate_instruction, Program};
use super::token::{tokenize, Span, Token};

fn take_i32(input: &str) -> IResult<&str, i32> {
    map(
        tuple((
            opt(alt((char('+'), char('-')))),
            alt((
                map_res(
                    preceded(tag_no_case("0x"), hex_digit1),
                    |n| i32::from_str_radix(n, 16),
                ),
                map_res(digit1, |n| i32::from_str_radix(n, 10)),
            )),
        )),
        |(sign, number)| match sign {
            Some('-') => -number,
            Some(_) | None => number,
        },
    )(input)
}

/// Parses a complete number literal: an optional sign followed by either `0x` and hexadecimal
/// digits or decimal digits.
pub fn parse_number(input: &str) -> Option<i32> {
    all_consuming(take_i32)(input).ok().map(|(_, number)| number)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// Returns true if `input` is a valid label name (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(input: &str) -> bool {
    all_consuming(identifier)(input).is_ok()
}

/// Recognizes a leading `NAME:`. The name is validated separately so that a malformed name
/// can be reported.
fn label_prefix(input: &str) -> IResult<&str, &str> {
    terminated(
        take_till1(|c: char| c == ':' || c.is_whitespace()),
        char(':'),
    )(input)
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(index) => &line[..index],
        None => line,
    }
}

fn invalid_token(slice: &str) -> ErrorKind {
    match slice.chars().next() {
        Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => {
            ErrorKind::InvalidNumber(slice.to_string())
        }
        _ => ErrorKind::InvalidCharacter(slice.to_string()),
    }
}

/// Classifies one comma separated operand. `code` is the text the tokens were produced from.
fn parse_operand(code: &str, tokens: &[(Token, Span)]) -> Result<Operand, ErrorKind> {
    let text = || match (tokens.first(), tokens.last()) {
        (Some((_, first)), Some((_, last))) => code[first.start..last.end].to_string(),
        _ => String::new(),
    };

    match tokens {
        [] => Err(ErrorKind::MissingOperand),
        [(Token::MemoryBegin, _), inner @ ..] => match inner {
            [(Token::Literal(address), _), (Token::MemoryEnd, _)] => Ok(Operand::Memory(*address)),
            _ => Err(ErrorKind::InvalidMemoryOperand(text())),
        },
        [(Token::ImmediateModifier, _), inner @ ..] => match inner {
            [(Token::Literal(value), _)] => Ok(Operand::Immediate(*value)),
            _ => Err(ErrorKind::InvalidImmediate(text())),
        },
        [(Token::Identifier(name), _)] => Ok(match Register::from_name(name) {
            Some(register) => Operand::Register(register),
            None => Operand::Label(normalize(name)),
        }),
        _ => match tokens.iter().find(|(token, _)| *token == Token::Error) {
            Some((_, span)) => Err(invalid_token(&code[span.clone()])),
            None => Err(ErrorKind::InvalidOperand(text())),
        },
    }
}

/// Splits the instruction part of a line into an operation and its operands.
fn parse_instruction(code: &str) -> Result<(OpCode, Vec<Operand>), ErrorKind> {
    let tokens = tokenize(code);

    let (mnemonic, rest) = match tokens.split_first() {
        Some(((Token::Identifier(mnemonic), _), rest)) => (*mnemonic, rest),
        Some(_) => {
            let word = code.split_whitespace().next().unwrap_or(code);

            return Err(ErrorKind::UnknownInstruction {
                token: word.to_string(),
                suggestion: None,
            });
        }
        None => return Err(ErrorKind::InvalidCharacter(code.to_string())),
    };

    let opcode = OpCode::from_mnemonic(mnemonic).ok_or_else(|| ErrorKind::UnknownInstruction {
        token: mnemonic.to_string(),
        suggestion: OpCode::suggest(mnemonic),
    })?;

    if rest.is_empty() {
        return Ok((opcode, Vec::new()));
    }

    let operands = rest
        .split(|(token, _)| *token == Token::ParameterSeparator)
        .map(|tokens| parse_operand(code, tokens))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((opcode, operands))
}

#[derive(Debug, Default)]
pub(crate) struct ParserState {
    pub instructions: Vec<Instruction>,
    pub labels: SymbolTable<usize>,
    pub errors: Vec<AssemblyError>,
}

/// Parser for a complete program.
pub struct Parser<'a> {
    source: &'a str,
    logger: Logger,
    pub(crate) state: ParserState,
}

impl<'a> Parser<'a> {
    pub fn from_str(source: &'a str) -> Parser<'a> {
        Parser::with_logger(source, None)
    }

    pub fn with_logger<L>(source: &'a str, logger: L) -> Parser<'a>
    where
        L: Into<Option<Logger>>,
    {
        let logger = logger
            .into()
            .unwrap_or(Logger::root(Discard, o!()))
            .new(o!("stage" => "parse"));

        Parser {
            source,
            logger,
            state: ParserState::default(),
        }
    }

    fn error(&mut self, line: usize, kind: ErrorKind) {
        trace!(self.logger, "syntax error"; "line" => line, "error" => %kind);
        self.state.errors.push(AssemblyError::new(line, kind));
    }

    /// Binds `label` to the next instruction that will be added.
    fn define_label(&mut self, line: usize, label: &str) -> Result<(), ErrorKind> {
        if !is_identifier(label) {
            return Err(ErrorKind::InvalidLabelName(label.to_string()));
        }

        if Register::from_name(label).is_some() {
            return Err(ErrorKind::RegisterLabel(normalize(label)));
        }

        let index = self.state.instructions.len();

        self.state
            .labels
            .define(label, index)
            .map_err(|_| ErrorKind::DuplicateLabel(normalize(label)))?;

        trace!(self.logger, "define label"; "line" => line, "label" => label, "index" => index);

        Ok(())
    }

    fn parse_line(&mut self, line: usize, raw: &str) {
        let mut code = strip_comment(raw).trim();

        if code.is_empty() {
            return;
        }

        if let Ok((rest, label)) = label_prefix(code) {
            if let Err(kind) = self.define_label(line, label) {
                self.error(line, kind);
                return;
            }

            code = rest.trim();

            if code.is_empty() {
                return;
            }
        }

        let (opcode, operands) = match parse_instruction(code) {
            Ok(parsed) => parsed,
            Err(kind) => return self.error(line, kind),
        };

        let instruction = Instruction {
            opcode,
            operands,
            line,
            source: strip_comment(raw).trim().to_string(),
        };

        if let Err(kind) = validate_instruction(&instruction) {
            return self.error(line, kind);
        }

        trace!(self.logger, "parsed instruction"; "line" => line, "instruction" => %instruction);

        if self.state.errors.is_empty() {
            self.state.instructions.push(instruction);
        }
    }

    /// Parses every line of the source.
    ///
    /// # Errors
    /// Returns all collected diagnostics, in line order, if any line is invalid.
    pub fn parse(mut self) -> Result<Program, Vec<AssemblyError>> {
        let source = self.source;

        for (index, line) in source.lines().enumerate() {
            self.parse_line(index + 1, line);
        }

        debug!(self.logger, "parsing finished";
            "instructions" => self.state.instructions.len(),
            "labels" => self.state.labels.len(),
            "errors" => self.state.errors.len());

        if !self.state.errors.is_empty() {
            return Err(self.state.errors);
        }

        Ok(Program {
            instructions: self.state.instructions,
            labels: self.state.labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(source: &str) -> Vec<String> {
        Parser::from_str(source)
            .parse()
            .expect_err("expected the source to be rejected")
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("-7"), Some(-7));
        assert_eq!(parse_number("+0x1F"), Some(31));
        assert_eq!(parse_number("0X10"), Some(16));
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("12ab"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("99999999999"), None);
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("loop_1"));
        assert!(is_identifier("_start"));
        assert!(!is_identifier("1loop"));
        assert!(!is_identifier("lo-op"));
    }

    #[test]
    fn operand_classification() {
        let program = Parser::from_str("LOAD a, [0x02]\nLOAD B, #-3\nJMP done\ndone: HLT")
            .parse()
            .unwrap();

        assert_eq!(
            program.instructions[0].operands,
            vec![Operand::Register(Register::A), Operand::Memory(2)]
        );
        assert_eq!(
            program.instructions[1].operands,
            vec![Operand::Register(Register::B), Operand::Immediate(-3)]
        );
        assert_eq!(program.instructions[2].operands, vec![Operand::Label("DONE".into())]);
    }

    #[test]
    fn comments_and_blank_lines() {
        let program = Parser::from_str("; header\n\n   HLT ; stop here\n").parse().unwrap();

        assert_eq!(program.instructions.len(), 1);
        assert_eq!(program.instructions[0].line, 3);
        assert_eq!(program.instructions[0].source, "HLT");
    }

    #[test]
    fn label_on_its_own_line_binds_to_next_instruction() {
        let program = Parser::from_str("INC A\nnext:\n; comment\n\nDEC A\nend:").parse().unwrap();

        assert_eq!(program.labels.get("NEXT"), Some(&1));
        assert_eq!(program.labels.get("END"), Some(&2));
    }

    #[test]
    fn unknown_instruction() {
        assert_eq!(errors("FOO A, #1\nHLT"), vec!["1: неизвестная инструкция FOO"]);
        assert_eq!(
            errors("HLT\nLAOD A, #1"),
            vec!["2: неизвестная инструкция LAOD (did you mean LOAD?)"]
        );
    }

    #[test]
    fn unknown_instruction_reports_whole_word() {
        assert_eq!(errors("жж A"), vec!["1: неизвестная инструкция жж"]);
        assert_eq!(errors("  $op A, #1"), vec!["1: неизвестная инструкция $op"]);
    }

    #[test]
    fn register_names_are_not_labels() {
        assert_eq!(
            errors("b: INC A\nJNZ b\nHLT"),
            vec![
                "1: label B has the name of a register",
                "2: operand 1 of JNZ must be label, got register (expected label)",
            ]
        );

        let program = Parser::from_str("ab: INC A\nJNZ ab\nHLT").parse().unwrap();
        assert_eq!(program.labels.get("AB"), Some(&0));
    }

    #[test]
    fn errors_are_batched() {
        let errors = errors("LOAD A, [zz]\nLOAD A, #x\nfoo: INC A\nFOO: DEC A\n1bad: HLT");

        assert_eq!(errors.len(), 4);
        assert!(errors[0].starts_with("1: invalid memory operand"));
        assert!(errors[1].starts_with("2: invalid immediate operand"));
        assert_eq!(errors[2], "4: label FOO is already defined");
        assert_eq!(errors[3], "5: invalid label name '1bad'");
    }

    #[test]
    fn malformed_operands() {
        assert_eq!(errors("LOAD A, #0xZZ"), vec!["1: invalid immediate operand '#0xZZ', expected a value like #5"]);
        assert_eq!(errors("ADD A,"), vec!["1: missing operand"]);
        assert_eq!(errors("ADD A B"), vec!["1: invalid operand 'A B'"]);
        assert_eq!(errors("INC 12ab"), vec!["1: invalid number '12ab'"]);
        assert_eq!(errors("INC A$"), vec!["1: unexpected character '$'"]);
    }

    #[test]
    fn no_instructions_after_first_error() {
        let mut parser = Parser::from_str("INC A\nBOGUS\nDEC A\nHLT");

        for (index, line) in "INC A\nBOGUS\nDEC A\nHLT".lines().enumerate() {
            parser.parse_line(index + 1, line);
        }

        assert_eq!(parser.state.instructions.len(), 1);
        assert_eq!(parser.state.errors.len(), 1);
    }
}
