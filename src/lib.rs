//! fish-syntax - The lexical and syntactic front end of the fish shell
//!
//! This library tokenizes fish scripts, builds a concrete parse tree that
//! survives malformed input, detects static errors, and derives
//! indentation levels for editors.

pub mod analysis;
pub mod ast;
pub mod indent;
pub mod parser;

pub use analysis::{
    detect_argument_errors, detect_errors, detect_errors_in_argument, detect_errors_in_tree, Analysis,
    AnalysisOptions, ErrorFlags,
};
pub use ast::tree::ParseTree;
pub use ast::types::*;
pub use indent::{compute_indents, compute_line_indents};
pub use parser::{parse, parse_with_flags, ParseError, ParseErrorCode, ParseFlags, ParseOutput, Parser};
