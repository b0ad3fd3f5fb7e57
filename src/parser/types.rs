//! Parser Types and Constants
//!
//! Shared types, flags, diagnostic texts and limits used across parser
//! modules and by the static analyzer.

use serde::Serialize;
use thiserror::Error;

use crate::parser::lexer::TokenizerErrorKind;

// Parser limits to prevent stack exhaustion on pathological nesting
pub const MAX_PARSER_DEPTH: usize = 200; // Max recursion depth for nested constructs

// Diagnostic texts
pub const ERROR_BAD_OR: &str = "Unsupported use of '||'. In fish, please use 'COMMAND; or COMMAND'.";
pub const ERROR_BAD_AND: &str = "Unsupported use of '&&'. In fish, please use 'COMMAND; and COMMAND'.";
pub const ERROR_MAX_DEPTH: &str = "Maximum nesting depth exceeded";

/// Error codes for grammar, lexical and static errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorCode {
    Generic,

    TokenizerUnterminatedQuote,
    TokenizerUnterminatedSubshell,
    TokenizerUnterminatedSlice,
    TokenizerUnterminatedEscape,
    TokenizerOther,

    UnbalancingEnd,  // end outside of block
    UnbalancingElse, // else outside of if
    UnbalancingCase, // case outside of switch

    DoublePipe,       // foo || bar
    DoubleBackground, // foo && bar

    /// Static (semantic) error found by the analyzer
    Syntax,
}

impl ParseErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::TokenizerUnterminatedQuote => "unterminated_quote",
            Self::TokenizerUnterminatedSubshell => "unterminated_subshell",
            Self::TokenizerUnterminatedSlice => "unterminated_slice",
            Self::TokenizerUnterminatedEscape => "unterminated_escape",
            Self::TokenizerOther => "tokenizer",
            Self::UnbalancingEnd => "unbalancing_end",
            Self::UnbalancingElse => "unbalancing_else",
            Self::UnbalancingCase => "unbalancing_case",
            Self::DoublePipe => "double_pipe",
            Self::DoubleBackground => "double_background",
            Self::Syntax => "syntax",
        }
    }

    pub fn is_tokenizer_error(&self) -> bool {
        matches!(
            self,
            Self::TokenizerUnterminatedQuote
                | Self::TokenizerUnterminatedSubshell
                | Self::TokenizerUnterminatedSlice
                | Self::TokenizerUnterminatedEscape
                | Self::TokenizerOther
        )
    }
}

impl From<TokenizerErrorKind> for ParseErrorCode {
    fn from(kind: TokenizerErrorKind) -> Self {
        match kind {
            TokenizerErrorKind::UnterminatedQuote => Self::TokenizerUnterminatedQuote,
            TokenizerErrorKind::UnterminatedSubshell => Self::TokenizerUnterminatedSubshell,
            TokenizerErrorKind::UnterminatedSlice => Self::TokenizerUnterminatedSlice,
            TokenizerErrorKind::UnterminatedEscape => Self::TokenizerUnterminatedEscape,
            TokenizerErrorKind::InvalidRedirect | TokenizerErrorKind::InvalidPipe => {
                Self::TokenizerOther
            }
        }
    }
}

/// A located error with a byte offset into the parsed source
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{text}")]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub source_start: usize,
    pub source_length: usize,
    pub text: String,
}

impl ParseError {
    pub fn new(code: ParseErrorCode, source_start: usize, source_length: usize, text: impl Into<String>) -> Self {
        Self {
            code,
            source_start,
            source_length,
            text: text.into(),
        }
    }

    /// Shift the location by `offset`, for errors found in a substring
    pub fn offset_by(mut self, offset: usize) -> Self {
        self.source_start += offset;
        self
    }

    /// Render the message followed by the offending line and a caret
    /// under the error location.
    pub fn describe(&self, src: &str) -> String {
        let mut result = self.text.clone();
        if self.source_start > src.len() || !src.is_char_boundary(self.source_start) {
            return result;
        }

        let line_start = src[..self.source_start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = src[self.source_start..]
            .find('\n')
            .map_or(src.len(), |i| self.source_start + i);
        let line = &src[line_start..line_end];
        let column = src[line_start..self.source_start].chars().count();

        result.push('\n');
        result.push_str(line);
        result.push('\n');
        result.push_str(&" ".repeat(column));
        result.push('^');
        result
    }
}

/// Options controlling a parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseFlags {
    /// Record every error and keep building a complete tree
    pub continue_after_error: bool,
    /// Attach comment nodes to the tree
    pub include_comments: bool,
    /// Let the tokenizer accept unterminated quotes and substitutions
    pub accept_incomplete_tokens: bool,
    /// A block missing its `end` at end of input is not an error
    pub leave_unterminated: bool,
    /// Emit one terminator per newline
    pub show_blank_lines: bool,
}

impl ParseFlags {
    pub fn tolerant() -> Self {
        Self {
            continue_after_error: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_points_at_error() {
        let src = "echo hi\nfoo || bar\n";
        let error = ParseError::new(ParseErrorCode::DoublePipe, 12, 2, ERROR_BAD_OR);
        assert_eq!(
            error.describe(src),
            format!("{}\nfoo || bar\n    ^", ERROR_BAD_OR)
        );
    }

    #[test]
    fn test_describe_out_of_range() {
        let error = ParseError::new(ParseErrorCode::Generic, 50, 0, "oops");
        assert_eq!(error.describe("short"), "oops");
    }

    #[test]
    fn test_tokenizer_codes() {
        assert_eq!(
            ParseErrorCode::from(TokenizerErrorKind::UnterminatedSlice),
            ParseErrorCode::TokenizerUnterminatedSlice
        );
        assert_eq!(
            ParseErrorCode::from(TokenizerErrorKind::InvalidPipe),
            ParseErrorCode::TokenizerOther
        );
        assert!(ParseErrorCode::TokenizerOther.is_tokenizer_error());
        assert!(!ParseErrorCode::Syntax.is_tokenizer_error());
    }

    #[test]
    fn test_display_is_text() {
        let error = ParseError::new(ParseErrorCode::Generic, 0, 0, "Expected a command");
        assert_eq!(error.to_string(), "Expected a command");
    }
}
