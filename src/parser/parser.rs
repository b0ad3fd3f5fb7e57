//! Recursive Descent Parser for fish Scripts
//!
//! This parser pulls tokens from the tokenizer and produces a flat concrete
//! syntax tree. Every production becomes a node, including empty list
//! tails, so consumers can walk the tree without special cases.
//!
//! Grammar (summary):
//!   job_list        ::= ∅ | job job_list | END job_list
//!   job             ::= statement job_continuation optional_background
//!   job_continuation::= ∅ | PIPE statement job_continuation
//!   statement       ::= boolean | block | if | switch | decorated
//!
//! Lists are built by loops that chain the right-recursive list nodes;
//! recursion only follows statement nesting and is capped by
//! `MAX_PARSER_DEPTH`.
//!
//! Two modes: strict stops at the first error, tolerant records the error,
//! leaves an error leaf over the offending token, skips it and resumes at
//! the top-level list.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::ast::tree::ParseTree;
use crate::ast::types::{Node, NodeId, NodeTag, ParseKeyword, SourceRange, Symbol};
use crate::parser::command_parser::parse_statement;
use crate::parser::lexer::{is_help_argument, Token, TokenType, Tokenizer, TokenizerOptions};
use crate::parser::types::{
    ParseError, ParseErrorCode, ParseFlags, ERROR_BAD_AND, ERROR_BAD_OR, ERROR_MAX_DEPTH,
    MAX_PARSER_DEPTH,
};

// =============================================================================
// PARSE TOKENS
// =============================================================================

/// Token classes as the grammar sees them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseTokenKind {
    String,
    Pipe,
    Background,
    End,
    Redirection,
    TokenizerError,
    Terminate,
}

/// A lookahead token with its grammar classification
#[derive(Debug, Clone)]
pub(crate) struct ParseToken {
    pub kind: ParseTokenKind,
    pub token: Token,
    pub keyword: Option<ParseKeyword>,
    pub has_dash_prefix: bool,
    pub is_help_argument: bool,
}

impl ParseToken {
    fn from_token(token: Token, src: &str) -> Self {
        let kind = match token.token_type {
            TokenType::Word => ParseTokenKind::String,
            TokenType::Pipe => ParseTokenKind::Pipe,
            TokenType::Background => ParseTokenKind::Background,
            TokenType::End => ParseTokenKind::End,
            TokenType::Error => ParseTokenKind::TokenizerError,
            // Comments never reach the grammar
            TokenType::Comment => ParseTokenKind::End,
            _ => ParseTokenKind::Redirection,
        };
        let (keyword, has_dash_prefix, help) = if kind == ParseTokenKind::String {
            let text = token.text(src);
            (
                ParseKeyword::from_token_text(text),
                text.starts_with('-'),
                is_help_argument(text),
            )
        } else {
            (None, false, false)
        };
        Self {
            kind,
            token,
            keyword,
            has_dash_prefix,
            is_help_argument: help,
        }
    }

    fn terminate(offset: usize) -> Self {
        Self {
            kind: ParseTokenKind::Terminate,
            token: Token::new(TokenType::End, offset, 0),
            keyword: None,
            has_dash_prefix: false,
            is_help_argument: false,
        }
    }

    pub fn offset(&self) -> usize {
        self.token.offset
    }

    pub fn length(&self) -> usize {
        self.token.length
    }

    pub fn is_keyword(&self, keyword: ParseKeyword) -> bool {
        self.keyword == Some(keyword)
    }

    /// Human readable description for error messages
    pub fn describe(&self) -> String {
        if let Some(keyword) = self.keyword {
            return format!("keyword '{}'", keyword);
        }
        match self.kind {
            ParseTokenKind::String => "a string".to_string(),
            ParseTokenKind::Pipe => "a pipe".to_string(),
            ParseTokenKind::Background => "a '&'".to_string(),
            ParseTokenKind::End => "end of the statement".to_string(),
            ParseTokenKind::Redirection => "a redirection".to_string(),
            ParseTokenKind::TokenizerError => "a tokenizer error".to_string(),
            ParseTokenKind::Terminate => "end of the input".to_string(),
        }
    }
}

/// Why a parse function stopped early
#[derive(Debug, Clone)]
pub(crate) enum Halt {
    Error(ParseError),
    /// Input ended inside an open block and the caller asked to leave it
    Unterminated,
}

impl From<ParseError> for Halt {
    fn from(error: ParseError) -> Self {
        Halt::Error(error)
    }
}

pub(crate) type ParseResult<T> = Result<T, Halt>;

// =============================================================================
// PARSER
// =============================================================================

/// Result of a parse: the tree plus every error that was recorded
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutput {
    pub tree: ParseTree,
    pub errors: Vec<ParseError>,
    /// Input ended inside a block while `leave_unterminated` was set
    pub unterminated: bool,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Main parser struct
pub struct Parser<'a> {
    src: &'a str,
    flags: ParseFlags,
    tokenizer: Tokenizer<'a>,
    lookahead: VecDeque<ParseToken>,
    pending_comments: Vec<Token>,
    last_consumed: Option<ParseToken>,
    pub(crate) tree: ParseTree,
    errors: Vec<ParseError>,
    depth: usize,
    open_blocks: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser over a complete buffer
    pub fn new(src: &'a str, flags: ParseFlags) -> Self {
        let options = TokenizerOptions {
            show_comments: flags.include_comments,
            show_blank_lines: flags.show_blank_lines,
            accept_unfinished: flags.accept_incomplete_tokens,
        };
        Self {
            src,
            flags,
            tokenizer: Tokenizer::new(src, options),
            lookahead: VecDeque::with_capacity(2),
            pending_comments: Vec::new(),
            last_consumed: None,
            tree: ParseTree::new(),
            errors: Vec::new(),
            depth: 0,
            open_blocks: 0,
        }
    }

    /// Parse the whole buffer towards `goal`, which is `Symbol::JobList`
    /// for scripts or `Symbol::ArgumentList` for a free standing argument
    /// list.
    pub fn parse(mut self, goal: Symbol) -> ParseOutput {
        let goal = if goal == Symbol::ArgumentList {
            Symbol::ArgumentList
        } else {
            Symbol::JobList
        };
        let root = self.tree.push(Node::new(goal, None));
        let unterminated = self.parse_top_level(root, goal);

        // Anything read ahead but never flushed belongs to the root
        self.flush_comments(root);
        self.compute_ranges();

        ParseOutput {
            tree: self.tree,
            errors: self.errors,
            unterminated,
        }
    }

    // ===========================================================================
    // HELPER METHODS
    // ===========================================================================

    fn fill_lookahead(&mut self, count: usize) {
        while self.lookahead.len() < count {
            let next = loop {
                match self.tokenizer.next() {
                    Some(token) if token.token_type == TokenType::Comment => {
                        self.pending_comments.push(token);
                    }
                    Some(token) => break ParseToken::from_token(token, self.src),
                    None => break ParseToken::terminate(self.src.len()),
                }
            };
            self.lookahead.push_back(next);
        }
    }

    /// Look at token1 (`offset` 0) or token2 (`offset` 1)
    pub(crate) fn peek(&mut self, offset: usize) -> &ParseToken {
        self.fill_lookahead(offset + 1);
        &self.lookahead[offset]
    }

    pub(crate) fn peek_kind(&mut self) -> ParseTokenKind {
        self.peek(0).kind
    }

    pub(crate) fn peek_is_keyword(&mut self, keyword: ParseKeyword) -> bool {
        self.peek(0).is_keyword(keyword)
    }

    fn advance(&mut self) -> ParseToken {
        self.fill_lookahead(1);
        let token = self
            .lookahead
            .pop_front()
            .unwrap_or_else(|| ParseToken::terminate(self.src.len()));
        if token.kind != ParseTokenKind::Terminate {
            self.last_consumed = Some(token.clone());
        }
        token
    }

    pub(crate) fn add_node(&mut self, symbol: Symbol, parent: NodeId) -> NodeId {
        self.tree.push(Node::new(symbol, Some(parent)))
    }

    pub(crate) fn set_tag(&mut self, id: NodeId, tag: NodeTag) {
        self.tree.node_mut(id).tag = tag;
    }

    /// Consume token1 as a terminal of `symbol` under `parent`
    pub(crate) fn consume(&mut self, symbol: Symbol, parent: NodeId) -> NodeId {
        let token = self.advance();
        let mut node = Node::new(symbol, Some(parent));
        node.range = Some(SourceRange::new(token.offset(), token.length()));
        if symbol == Symbol::Keyword {
            node.keyword = token.keyword;
        }
        self.tree.push(node)
    }

    /// Give an empty production its zero-length range at the lookahead
    pub(crate) fn mark_empty(&mut self, id: NodeId) {
        let offset = self.peek(0).offset();
        self.tree.node_mut(id).range = Some(SourceRange::new(offset, 0));
    }

    pub(crate) fn flush_comments(&mut self, parent: NodeId) {
        if self.pending_comments.is_empty() {
            return;
        }
        for comment in std::mem::take(&mut self.pending_comments) {
            let mut node = Node::new(Symbol::Comment, Some(parent));
            node.range = Some(SourceRange::new(comment.offset, comment.length));
            self.tree.push(node);
        }
    }

    /// Run `f` inside a statement nesting level
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_PARSER_DEPTH {
            let token = self.peek(0).clone();
            return Err(self.error_at(&token, ParseErrorCode::Generic, ERROR_MAX_DEPTH).into());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Run `f` while a block waits for its `end`
    pub(crate) fn in_block<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.open_blocks += 1;
        let result = f(self);
        self.open_blocks -= 1;
        result
    }

    // ===========================================================================
    // ERRORS
    // ===========================================================================

    pub(crate) fn error_at(&self, token: &ParseToken, code: ParseErrorCode, text: impl Into<String>) -> ParseError {
        ParseError::new(code, token.offset(), token.length(), text)
    }

    fn tokenizer_error(&self, token: &ParseToken) -> ParseError {
        match token.token.error {
            Some(error) => ParseError::new(error.kind.into(), error.offset, 1, error.kind.message()),
            None => self.error_at(token, ParseErrorCode::TokenizerOther, "Tokenizer error"),
        }
    }

    fn unbalanced_error(&self, token: &ParseToken) -> Option<ParseError> {
        let (code, text) = match token.keyword? {
            ParseKeyword::End => (ParseErrorCode::UnbalancingEnd, "'end' outside of a block"),
            ParseKeyword::Else => (ParseErrorCode::UnbalancingElse, "'else' builtin not inside of if block"),
            ParseKeyword::Case => (
                ParseErrorCode::UnbalancingCase,
                "'case' builtin not inside of switch block",
            ),
            _ => return None,
        };
        Some(self.error_at(token, code, text))
    }

    /// Input ran out inside an open block; either an error or, with
    /// `leave_unterminated`, a quiet stop
    fn end_of_input(&self, token: &ParseToken, expected: &str) -> Halt {
        if self.flags.leave_unterminated && self.open_blocks > 0 {
            return Halt::Unterminated;
        }
        Halt::Error(self.error_at(
            token,
            ParseErrorCode::Generic,
            format!("Expected {}, but instead found end of the input", expected),
        ))
    }

    /// Error for token1 when `expected` was required
    pub(crate) fn unexpected(&mut self, expected: &str) -> Halt {
        let token = self.peek(0).clone();
        match token.kind {
            ParseTokenKind::TokenizerError => self.tokenizer_error(&token).into(),
            ParseTokenKind::Terminate => self.end_of_input(&token, expected),
            _ => match self.unbalanced_error(&token) {
                Some(error) => error.into(),
                None => self
                    .error_at(
                        &token,
                        ParseErrorCode::Generic,
                        format!("Expected {}, but instead found {}", expected, token.describe()),
                    )
                    .into(),
            },
        }
    }

    /// Error for token1 when a statement was required
    pub(crate) fn unexpected_statement(&mut self) -> Halt {
        let token = self.peek(0).clone();
        let abuts = self
            .last_consumed
            .as_ref()
            .map_or(false, |last| last.kind == token.kind && last.token.end() == token.offset());
        match token.kind {
            ParseTokenKind::Pipe if abuts => {
                let last_offset = token.offset() - 1;
                ParseError::new(ParseErrorCode::DoublePipe, last_offset, 2, ERROR_BAD_OR).into()
            }
            ParseTokenKind::Background if abuts => {
                let last_offset = token.offset() - 1;
                ParseError::new(ParseErrorCode::DoubleBackground, last_offset, 2, ERROR_BAD_AND).into()
            }
            _ => self.unexpected("a command"),
        }
    }

    /// Expect token1 to be a statement terminator
    pub(crate) fn expect_end(&mut self, parent: NodeId) -> ParseResult<NodeId> {
        if self.peek_kind() == ParseTokenKind::End {
            return Ok(self.consume(Symbol::EndToken, parent));
        }
        Err(self.unexpected("end of the statement"))
    }

    /// Expect token1 to be a string
    pub(crate) fn expect_string(&mut self, parent: NodeId, what: &str) -> ParseResult<NodeId> {
        if self.peek_kind() == ParseTokenKind::String {
            return Ok(self.consume(Symbol::StringToken, parent));
        }
        Err(self.unexpected(what))
    }

    /// Expect token1 to be a specific keyword
    pub(crate) fn expect_keyword(&mut self, keyword: ParseKeyword, parent: NodeId) -> ParseResult<NodeId> {
        if self.peek_is_keyword(keyword) {
            return Ok(self.consume(Symbol::Keyword, parent));
        }
        Err(self.unexpected(&format!("keyword '{}'", keyword)))
    }

    /// The `end` closing a block opened by `opener`
    pub(crate) fn parse_end_command(&mut self, parent: NodeId, opener: &ParseToken) -> ParseResult<()> {
        let end = self.add_node(Symbol::EndCommand, parent);
        if self.peek_is_keyword(ParseKeyword::End) {
            self.consume(Symbol::Keyword, end);
            return Ok(());
        }
        if self.peek_kind() == ParseTokenKind::Terminate {
            if self.flags.leave_unterminated {
                return Err(Halt::Unterminated);
            }
            let name = opener.keyword.map_or("block", |k| k.as_str());
            return Err(self
                .error_at(
                    opener,
                    ParseErrorCode::Generic,
                    format!("Missing end to balance this {} block", name),
                )
                .into());
        }
        Err(self.unexpected("keyword 'end'"))
    }

    // ===========================================================================
    // LISTS
    // ===========================================================================

    /// Parse a job list into `list`, advancing it to the current tail.
    /// Stops at `end`, `else`, `case` and end of input.
    pub(crate) fn parse_job_list(&mut self, list: &mut NodeId) -> ParseResult<()> {
        loop {
            self.flush_comments(*list);
            let (kind, keyword) = {
                let token = self.peek(0);
                (token.kind, token.keyword)
            };
            let stop = kind == ParseTokenKind::Terminate
                || matches!(
                    keyword,
                    Some(ParseKeyword::End | ParseKeyword::Else | ParseKeyword::Case)
                );
            if stop {
                // Comments read while finding the stop token stay in this list
                self.flush_comments(*list);
                self.mark_empty(*list);
                return Ok(());
            }

            if kind == ParseTokenKind::End {
                self.consume(Symbol::EndToken, *list);
            } else {
                parse_job(self, *list)?;
            }
            *list = self.add_node(Symbol::JobList, *list);
        }
    }

    fn parse_argument_list_goal(&mut self, list: &mut NodeId) -> ParseResult<()> {
        loop {
            match self.peek_kind() {
                ParseTokenKind::Terminate => {
                    self.mark_empty(*list);
                    return Ok(());
                }
                ParseTokenKind::String => {
                    let argument = self.add_node(Symbol::Argument, *list);
                    self.consume(Symbol::StringToken, argument);
                }
                _ => return Err(self.unexpected("a string")),
            }
            *list = self.add_node(Symbol::ArgumentList, *list);
        }
    }

    /// Drive the top-level list, recovering from errors in tolerant mode.
    /// Returns whether the input was left unterminated.
    fn parse_top_level(&mut self, root: NodeId, goal: Symbol) -> bool {
        let mut list = root;
        loop {
            let result = if goal == Symbol::ArgumentList {
                self.parse_argument_list_goal(&mut list)
            } else {
                self.parse_job_list(&mut list)
            };

            let error = match result {
                Ok(()) => {
                    let token = self.peek(0).clone();
                    match self.unbalanced_error(&token) {
                        Some(error) => error,
                        None => return false,
                    }
                }
                Err(Halt::Unterminated) => return true,
                Err(Halt::Error(error)) => error,
            };

            debug!(code = ?error.code, offset = error.source_start, "parse error");
            self.errors.push(error);
            if !self.flags.continue_after_error {
                return false;
            }
            list = self.recover(list, goal);
        }
    }

    /// Cover the offending token with an error leaf, skip it, and return a
    /// fresh list tail to continue into
    fn recover(&mut self, list: NodeId, goal: Symbol) -> NodeId {
        let holder = if self.tree[list].children.is_empty() {
            list
        } else {
            self.add_node(goal, list)
        };

        let token = self.peek(0).clone();
        let symbol = if token.kind == ParseTokenKind::TokenizerError {
            Symbol::TokenizerError
        } else {
            Symbol::ParseError
        };
        if token.kind == ParseTokenKind::Terminate {
            let mut node = Node::new(symbol, Some(holder));
            node.range = Some(SourceRange::new(self.src.len(), 0));
            self.tree.push(node);
        } else {
            debug!(offset = token.offset(), "skipping token after error");
            self.consume(symbol, holder);
        }
        self.add_node(goal, holder)
    }

    /// Nonterminal ranges are the union of their sourced children.
    /// Children always follow their parent, so one reverse pass suffices.
    fn compute_ranges(&mut self) {
        for id in (0..self.tree.len()).rev() {
            let children = self.tree[id].children.clone();
            let union = children
                .iter()
                .filter_map(|c| self.tree[*c].range)
                .reduce(|a, b| a.union(&b));
            if let Some(range) = union {
                self.tree.node_mut(id).range = Some(range);
            }
        }
    }
}

/// job ::= statement job_continuation optional_background
pub(crate) fn parse_job(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let job = p.add_node(Symbol::Job, parent);
    parse_statement(p, job)?;

    let mut continuation = p.add_node(Symbol::JobContinuation, job);
    while p.peek_kind() == ParseTokenKind::Pipe {
        p.consume(Symbol::PipeToken, continuation);
        parse_statement(p, continuation)?;
        continuation = p.add_node(Symbol::JobContinuation, continuation);
    }
    p.mark_empty(continuation);

    let background = p.add_node(Symbol::OptionalBackground, job);
    if p.peek_kind() == ParseTokenKind::Background {
        p.consume(Symbol::BackgroundToken, background);
    } else {
        p.mark_empty(background);
    }
    Ok(())
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Parse a script strictly, returning the first error
pub fn parse(src: &str) -> Result<ParseTree, ParseError> {
    let mut output = parse_with_flags(src, ParseFlags::default(), Symbol::JobList);
    if output.errors.is_empty() {
        Ok(output.tree)
    } else {
        Err(output.errors.swap_remove(0))
    }
}

/// Parse with explicit flags and goal, returning the tree and all errors
pub fn parse_with_flags(src: &str, flags: ParseFlags, goal: Symbol) -> ParseOutput {
    Parser::new(src, flags).parse(goal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Decoration;

    fn tolerant(src: &str) -> ParseOutput {
        parse_with_flags(src, ParseFlags::tolerant(), Symbol::JobList)
    }

    fn error_codes(src: &str) -> Vec<ParseErrorCode> {
        parse_with_flags(src, ParseFlags::default(), Symbol::JobList)
            .errors
            .iter()
            .map(|e| e.code)
            .collect()
    }

    fn assert_well_formed(tree: &ParseTree) {
        for (id, node) in tree.nodes().iter().enumerate() {
            if node.symbol.is_error() {
                assert!(node.children.is_empty());
            }
            for child in &node.children {
                assert!(*child > id);
                if let (Some(outer), Some(inner)) = (node.range, tree[*child].range) {
                    assert!(outer.contains(&inner), "{:?} outside {:?}", inner, outer);
                }
            }
        }
    }

    #[test]
    fn test_parse_empty() {
        for src in ["", "   ", "\n\n \t\n"] {
            let output = tolerant(src);
            assert!(output.errors.is_empty());
            assert_eq!(output.tree[0].symbol, Symbol::JobList);
            assert!(output.tree.find_nodes(0, Symbol::Job).is_empty());
        }
    }

    #[test]
    fn test_parse_correct() {
        let good = [
            "; ; ; ",
            "if true ; end",
            "for i in a b c ; end",
            "begin end",
            "begin; end",
            "begin if true; end; end;",
            "begin if true ; echo hi ; end; end",
            "switch foo ; case bar baz ; echo hi ; case '*' ; end",
            "function foo --argument x ; return 1 ; end",
            "while true ; and false ; or not true ; end",
            "if a ; else if b ; else if c ; else ; end",
            "echo hi > out 2>&1 ^err <in >>log 2>?x",
            "foo 2>| bar",
        ];
        for src in good {
            let tree = parse(src);
            assert!(tree.is_ok(), "{}: {:?}", src, tree.err());
            assert_well_formed(&tree.unwrap());
        }
    }

    #[test]
    fn test_parse_incorrect() {
        let bad = [
            "if ; end",
            "if true; end ; end",
            "if end; end ; end",
            "if end",
            "end",
            "for i i",
            "echo |",
            "echo >",
            "switch ; end",
        ];
        for src in bad {
            assert!(parse(src).is_err(), "{}", src);
        }
    }

    #[test]
    fn test_error_codes() {
        let cases = [
            ("echo 'abc", ParseErrorCode::TokenizerUnterminatedQuote),
            ("'", ParseErrorCode::TokenizerUnterminatedQuote),
            ("echo (abc", ParseErrorCode::TokenizerUnterminatedSubshell),
            ("end", ParseErrorCode::UnbalancingEnd),
            ("echo hi ; end", ParseErrorCode::UnbalancingEnd),
            ("else", ParseErrorCode::UnbalancingElse),
            ("if true ; end ; else", ParseErrorCode::UnbalancingElse),
            ("case", ParseErrorCode::UnbalancingCase),
            ("if true ; case ; end", ParseErrorCode::UnbalancingCase),
            ("foo || bar", ParseErrorCode::DoublePipe),
            ("foo && bar", ParseErrorCode::DoubleBackground),
        ];
        for (src, code) in cases {
            assert_eq!(error_codes(src), vec![code], "{}", src);
        }
    }

    #[test]
    fn test_tokenizer_error_offset() {
        let errors = parse_with_flags("echo 'abc", ParseFlags::default(), Symbol::JobList).errors;
        assert_eq!(errors[0].source_start, 5);
    }

    #[test]
    fn test_double_pipe_message() {
        let error = parse("foo || bar").unwrap_err();
        assert_eq!(error.text, ERROR_BAD_OR);
        assert_eq!(error.source_start, 4);
        let error = parse("foo && bar").unwrap_err();
        assert_eq!(error.text, ERROR_BAD_AND);
    }

    #[test]
    fn test_missing_end() {
        let error = parse("while true\necho hi\n").unwrap_err();
        assert_eq!(error.code, ParseErrorCode::Generic);
        assert_eq!(error.text, "Missing end to balance this while block");
        assert_eq!(error.source_start, 0);
    }

    #[test]
    fn test_expected_keyword() {
        let error = parse("for i i").unwrap_err();
        assert_eq!(error.text, "Expected keyword 'in', but instead found a string");
        assert_eq!(error.source_start, 6);
    }

    #[test]
    fn test_ll2_decoration() {
        let cases = [
            ("echo hello", "echo", "hello", Decoration::None),
            ("command echo hello", "echo", "hello", Decoration::Command),
            ("exec echo hello", "echo", "hello", Decoration::Exec),
            ("command command hello", "command", "hello", Decoration::Command),
            ("builtin command hello", "command", "hello", Decoration::Builtin),
            ("command --help", "command", "--help", Decoration::None),
            ("command -h", "command", "-h", Decoration::None),
            ("command", "command", "", Decoration::None),
            ("command -", "command", "-", Decoration::None),
            ("command --", "command", "--", Decoration::None),
            ("builtin --names", "builtin", "--names", Decoration::None),
            ("function", "function", "", Decoration::None),
            ("function --help", "function", "--help", Decoration::None),
        ];
        for (src, command, args, decoration) in cases {
            let tree = parse(src).unwrap();
            let statements = tree.find_nodes(tree.root(), Symbol::PlainStatement);
            assert_eq!(statements.len(), 1, "{}", src);
            let statement = statements[0];
            assert_eq!(tree.command_for_plain_statement(statement, src), Some(command), "{}", src);
            assert_eq!(tree.decoration_for_plain_statement(statement), decoration, "{}", src);
            let found: Vec<&str> = tree
                .find_nodes(statement, Symbol::Argument)
                .into_iter()
                .filter_map(|a| tree.source(a, src))
                .collect();
            assert_eq!(found.join(" "), args, "{}", src);
        }
    }

    #[test]
    fn test_function_help_is_plain() {
        for src in ["function -h", "function --help"] {
            let tree = parse(src).unwrap();
            assert_eq!(tree.find_nodes(0, Symbol::PlainStatement).len(), 1);
            assert!(tree.find_nodes(0, Symbol::FunctionHeader).is_empty());
        }
        for src in ["function --foo ; end", "function foo ; end"] {
            let tree = parse(src).unwrap();
            assert_eq!(tree.find_nodes(0, Symbol::FunctionHeader).len(), 1, "{}", src);
        }
    }

    #[test]
    fn test_case_item_lists() {
        let tree = parse("switch foo ; case bar; case baz; end").unwrap();
        assert_eq!(tree.find_nodes(0, Symbol::CaseItemList).len(), 3);
    }

    #[test]
    fn test_empty_tails() {
        let tree = parse("begin; end").unwrap();
        let body = tree.find_nodes(0, Symbol::JobList).into_iter().nth(1).unwrap();
        let mut cursor = body;
        while let Some(tail) = tree[cursor]
            .children
            .iter()
            .copied()
            .find(|c| tree[*c].symbol == Symbol::JobList)
        {
            cursor = tail;
        }
        assert!(tree[cursor].children.is_empty());
        assert_eq!(tree[cursor].source_length(), 0);
    }

    #[test]
    fn test_tolerant_recovery_shape() {
        let src = "echo a; end; echo b";
        let output = tolerant(src);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, ParseErrorCode::UnbalancingEnd);
        let tree = &output.tree;
        let error = tree.find_nodes(0, Symbol::ParseError);
        assert_eq!(error.len(), 1);
        assert_eq!(tree.source(error[0], src), Some("end"));
        let commands: Vec<&str> = tree
            .find_nodes(0, Symbol::PlainStatement)
            .into_iter()
            .filter_map(|s| tree.command_for_plain_statement(s, src))
            .collect();
        assert_eq!(commands, vec!["echo", "echo"]);
        assert_well_formed(tree);
    }

    #[test]
    fn test_tolerant_records_every_error() {
        let output = tolerant("end; else; echo ok; case");
        let codes: Vec<ParseErrorCode> = output.errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![
                ParseErrorCode::UnbalancingEnd,
                ParseErrorCode::UnbalancingElse,
                ParseErrorCode::UnbalancingCase
            ]
        );
    }

    #[test]
    fn test_tokenizer_error_leaf() {
        let src = "echo (abc";
        let output = tolerant(src);
        let leaves = output.tree.find_nodes(0, Symbol::TokenizerError);
        assert_eq!(leaves.len(), 1);
        assert_eq!(output.tree.source(leaves[0], src), Some("(abc"));
    }

    #[test]
    fn test_leave_unterminated() {
        let flags = ParseFlags {
            leave_unterminated: true,
            ..Default::default()
        };
        for src in ["if foo\n", "if foo", "begin; echo |", "switch x\ncase y\n"] {
            let output = parse_with_flags(src, flags, Symbol::JobList);
            assert!(output.errors.is_empty(), "{}", src);
            assert!(output.unterminated, "{}", src);
        }
        let output = parse_with_flags("echo |", flags, Symbol::JobList);
        assert!(!output.unterminated);
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn test_argument_list_goal() {
        let src = "foo 'bar baz' $qux";
        let output = parse_with_flags(src, ParseFlags::default(), Symbol::ArgumentList);
        assert!(output.errors.is_empty());
        assert_eq!(output.tree[0].symbol, Symbol::ArgumentList);
        assert_eq!(output.tree.find_nodes(0, Symbol::Argument).len(), 3);

        let output = parse_with_flags("foo; bar", ParseFlags::default(), Symbol::ArgumentList);
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let src = "if foo | bar &\n  for i in (seq 3); echo $i >&2; end\nelse\n  baz\nend";
        let a = tolerant(src).tree;
        let b = tolerant(src).tree;
        assert_eq!(a, b);
    }

    #[test]
    fn test_depth_limit() {
        let src = "begin ".repeat(MAX_PARSER_DEPTH + 10);
        let error = parse(&src).unwrap_err();
        assert_eq!(error.text, ERROR_MAX_DEPTH);
        let output = tolerant(&src);
        assert!(!output.errors.is_empty());
        assert_well_formed(&output.tree);
    }

    #[test]
    fn test_long_flat_input() {
        let src = "echo a | ".repeat(20_000) + "cat";
        let tree = parse(&src).unwrap();
        assert_eq!(tree.find_nodes(0, Symbol::PlainStatement).len(), 20_001);
    }

    #[test]
    fn test_fuzz_vocabulary() {
        let words = [
            "if", "else", "for", "in", "while", "begin", "function", "switch", "case", "end",
            "and", "or", "not", "command", "builtin", "foo", "|", "^", "&", ";",
        ];
        let n = words.len();
        for a in 0..n {
            for b in 0..n {
                for c in 0..n {
                    let src = format!("{} {} {}", words[a], words[b], words[c]);
                    let output = tolerant(&src);
                    assert_well_formed(&output.tree);
                    assert!(output.tree.find_nodes(0, Symbol::JobList).len() >= 1);
                }
            }
        }
    }
}
