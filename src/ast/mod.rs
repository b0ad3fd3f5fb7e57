//! Parse Tree for fish scripts
//!
//! This module defines the flat concrete syntax tree and its queries.
//!
//! Architecture:
//!   Input → Tokenizer → Parser → ParseTree → Analyzer / Indenter

pub mod tree;
pub mod types;
