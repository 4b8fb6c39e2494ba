//! Tokens and a tokenizer for the instruction part of a source line.

use logos::{Lexer, Logos};

use std::fmt;
use std::ops::Range;

use super::parser::parse_number;

/// Byte range of a token within the tokenized text.
pub type Span = Range<usize>;

/// Enumeration of all tokens that can appear after the label of a line.
#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Errorneous token that could not be interpreted as any of the other variants.
    /// Malformed number literals end up here as well.
    #[error]
    #[regex(r"[ \t\r\f]+", logos::skip)]
    Error,

    /// A mnemonic, a register name or a label reference.
    #[regex("[A-Za-z_][A-Za-z0-9_]*", Lexer::slice)]
    Identifier(&'a str),

    /// A signed decimal or `0x` prefixed hexadecimal literal.
    #[regex("[+-]?[0-9][0-9A-Za-z_]*", literal_callback)]
    Literal(i32),

    /// Token (`#`) that marks an immediate operand.
    #[token("#")]
    ImmediateModifier,

    /// Token (`[`) that opens a memory operand.
    #[token("[")]
    MemoryBegin,

    /// Token (`]`) that closes a memory operand.
    #[token("]")]
    MemoryEnd,

    /// Token (`,`) that is used to separate operands of a single instruction.
    #[token(",")]
    ParameterSeparator,
}

fn literal_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<i32> {
    parse_number(lex.slice())
}

impl<'t> fmt::Display for Token<'t> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Error => write!(f, "<error>"),
            Token::Identifier(ident) => write!(f, "{}", ident),
            Token::Literal(num) => write!(f, "{}", num),
            Token::ImmediateModifier => write!(f, "#"),
            Token::MemoryBegin => write!(f, "["),
            Token::MemoryEnd => write!(f, "]"),
            Token::ParameterSeparator => write!(f, ","),
        }
    }
}

/// Splits `input` into tokens, keeping the span of each token for diagnostics.
pub fn tokenize(input: &str) -> Vec<(Token, Span)> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::new();

    while let Some(token) = lexer.next() {
        tokens.push((token, lexer.span()));
    }

    tokens
}

#[test]
fn test_tokenize_instruction() {
    let tokens: Vec<_> = tokenize("LOAD A, [0x10]")
        .into_iter()
        .map(|(token, _)| token)
        .collect();

    assert_eq!(
        tokens,
        vec![
            Token::Identifier("LOAD"),
            Token::Identifier("A"),
            Token::ParameterSeparator,
            Token::MemoryBegin,
            Token::Literal(16),
            Token::MemoryEnd,
        ]
    );
}

#[test]
fn test_tokenize_signed_immediate() {
    let tokens: Vec<_> = tokenize("#-5").into_iter().map(|(t, _)| t).collect();
    assert_eq!(tokens, vec![Token::ImmediateModifier, Token::Literal(-5)]);
}

#[test]
fn test_tokenize_malformed_literal() {
    let tokens = tokenize("#12ab");
    assert_eq!(tokens[1], (Token::Error, 1..5));
}
