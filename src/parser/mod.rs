//! Parser module for fish scripts
//!
//! This module contains the tokenizer and the parse-tree builder.

pub mod types;
pub mod lexer;
pub mod compound_parser;
pub mod command_parser;
pub mod parser;

// Re-exports
pub use types::{ParseError, ParseErrorCode, ParseFlags};
pub use lexer::{Token, TokenType, Tokenizer, TokenizerError, TokenizerErrorKind, TokenizerOptions};
pub use parser::{parse, parse_with_flags, ParseOutput, Parser};
