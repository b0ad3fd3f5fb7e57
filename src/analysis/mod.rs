//! Static Error Analyzer
//!
//! Finds errors that the grammar alone cannot express: loop control
//! outside loops, booleans after pipes or background jobs, `exec` in
//! pipelines, and malformed expansion syntax inside arguments (including
//! inside nested command substitutions).
//!
//! Results are plain values: a set of flags plus the located errors.

pub mod argument;

use serde::{Serialize, Serializer};
use std::ops::{BitOr, BitOrAssign};
use tracing::debug;

use crate::ast::tree::ParseTree;
use crate::ast::types::{BoolStatementType, Decoration, NodeId, Symbol};
use crate::parser::lexer::is_help_argument;
use crate::parser::types::{ParseError, ParseErrorCode, ParseFlags, MAX_PARSER_DEPTH};
use crate::parser::parse_with_flags;

/// Additive set of analysis outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ErrorFlags(u8);

impl ErrorFlags {
    pub const NONE: ErrorFlags = ErrorFlags(0);
    /// The input is wrong
    pub const ERROR: ErrorFlags = ErrorFlags(1);
    /// The input is fine so far but unfinished
    pub const INCOMPLETE: ErrorFlags = ErrorFlags(2);

    pub fn contains(&self, other: ErrorFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::ERROR) {
            names.push("error");
        }
        if self.contains(Self::INCOMPLETE) {
            names.push("incomplete");
        }
        names
    }
}

impl BitOr for ErrorFlags {
    type Output = ErrorFlags;

    fn bitor(self, rhs: ErrorFlags) -> ErrorFlags {
        ErrorFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ErrorFlags {
    fn bitor_assign(&mut self, rhs: ErrorFlags) {
        self.0 |= rhs.0;
    }
}

impl Serialize for ErrorFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.names().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Treat an unterminated quote as unfinished input instead of an error
    pub allow_incomplete: bool,
}

/// Flags and located errors from one analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub flags: ErrorFlags,
    pub errors: Vec<ParseError>,
}

impl Analysis {
    pub fn has_error(&self) -> bool {
        self.flags.contains(ErrorFlags::ERROR)
    }

    pub fn is_incomplete(&self) -> bool {
        self.flags.contains(ErrorFlags::INCOMPLETE)
    }

    /// Whether an editor should insert a newline rather than submit
    pub fn needs_more_input(&self) -> bool {
        !self.flags.is_empty()
    }

    pub(crate) fn error(&mut self, start: usize, length: usize, text: impl Into<String>) {
        self.flags |= ErrorFlags::ERROR;
        self.errors
            .push(ParseError::new(ParseErrorCode::Syntax, start, length, text));
    }

    /// Fold in the result of analyzing text found at `offset`
    pub(crate) fn merge(&mut self, other: Analysis, offset: usize) {
        self.flags |= other.flags;
        self.errors
            .extend(other.errors.into_iter().map(|e| e.offset_by(offset)));
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Parse and analyze a complete buffer
pub fn detect_errors(src: &str, options: AnalysisOptions) -> Analysis {
    analyze_source(src, options.allow_incomplete, true, 0)
}

/// Analyze an already parsed tree
pub fn detect_errors_in_tree(tree: &ParseTree, src: &str) -> Analysis {
    check_tree(tree, src, 0)
}

/// Analyze a single argument node of a tree
pub fn detect_errors_in_argument(tree: &ParseTree, arg: NodeId, src: &str) -> Analysis {
    let mut analysis = Analysis::default();
    if let (Some(text), Some(range)) = (tree.source(arg, src), tree.range(arg)) {
        argument::check_argument(text, range.start, 0, &mut analysis);
    }
    analysis
}

/// Parse `arg_src` as an argument list and analyze its first argument
pub fn detect_argument_errors(arg_src: &str) -> Analysis {
    let output = parse_with_flags(arg_src, ParseFlags::default(), Symbol::ArgumentList);
    let mut analysis = Analysis::default();
    if output.has_errors() {
        analysis.flags |= ErrorFlags::ERROR;
        analysis.errors = output.errors;
        return analysis;
    }
    match output.tree.next_node_in_node_list(output.tree.root(), Symbol::Argument) {
        Some((arg, _)) => detect_errors_in_argument(&output.tree, arg, arg_src),
        None => analysis,
    }
}

/// Analyze the contents of a command substitution found inside an argument
pub(crate) fn analyze_substitution(src: &str, depth: usize) -> Analysis {
    debug!(depth, len = src.len(), "analyzing command substitution");
    if depth > MAX_PARSER_DEPTH {
        let mut analysis = Analysis::default();
        analysis.error(0, 0, "Command substitutions nested too deeply");
        return analysis;
    }
    // An unclosed block inside a closed substitution can never be finished
    analyze_source(src, false, false, depth)
}

fn analyze_source(src: &str, allow_incomplete: bool, leave_unterminated: bool, depth: usize) -> Analysis {
    let flags = ParseFlags {
        continue_after_error: true,
        leave_unterminated,
        ..Default::default()
    };
    let output = parse_with_flags(src, flags, Symbol::JobList);

    let mut analysis = Analysis::default();
    if output.unterminated {
        analysis.flags |= ErrorFlags::INCOMPLETE;
    }
    for error in output.errors {
        if allow_incomplete && error.code == ParseErrorCode::TokenizerUnterminatedQuote {
            analysis.flags |= ErrorFlags::INCOMPLETE;
            continue;
        }
        analysis.flags |= ErrorFlags::ERROR;
        analysis.errors.push(error);
    }

    analysis.merge(check_tree(&output.tree, src, depth), 0);
    analysis
}

// =============================================================================
// TREE CHECKS
// =============================================================================

const PIPE_FORBIDDEN_COMMANDS: &[&str] = &["exec", "case", "break", "return", "continue"];

fn check_tree(tree: &ParseTree, src: &str, depth: usize) -> Analysis {
    let mut analysis = Analysis::default();
    for (id, node) in tree.nodes().iter().enumerate() {
        match node.symbol {
            Symbol::Argument => {
                if let (Some(text), Some(range)) = (tree.source(id, src), tree.range(id)) {
                    argument::check_argument(text, range.start, depth, &mut analysis);
                }
            }
            Symbol::EndCommand if !node.has_source() => {
                analysis.flags |= ErrorFlags::INCOMPLETE;
            }
            Symbol::Job => check_job(tree, id, &mut analysis),
            Symbol::BooleanStatement => check_boolean(tree, id, &mut analysis),
            Symbol::PlainStatement => check_plain_statement(tree, id, src, &mut analysis),
            _ => {}
        }
    }
    analysis
}

fn node_start(tree: &ParseTree, id: NodeId) -> usize {
    tree.range(id).map_or(0, |r| r.start)
}

fn check_job(tree: &ParseTree, job: NodeId, analysis: &mut Analysis) {
    if !tree.job_should_be_backgrounded(job) {
        return;
    }
    let parent = match tree.get_parent(job, None) {
        Some(parent) => parent,
        None => return,
    };

    match tree[parent].symbol {
        Symbol::IfClause | Symbol::WhileHeader => {
            let range = tree.range(job).unwrap_or_default();
            analysis.error(
                range.start,
                range.length,
                "Backgrounded commands can not be used as conditionals",
            );
        }
        Symbol::JobList => {
            let tail = match tree.get_child(parent, 1, Symbol::JobList) {
                Some(tail) => tail,
                None => return,
            };
            let next_job = match tree.next_job_in_job_list(tail) {
                Some((next_job, _)) => next_job,
                None => return,
            };
            let boolean = tree
                .get_child(next_job, 0, Symbol::Statement)
                .and_then(|s| tree.get_child(s, 0, Symbol::BooleanStatement));
            if let Some(boolean) = boolean {
                if let Some(kind @ (BoolStatementType::And | BoolStatementType::Or)) =
                    tree.statement_boolean_type(boolean)
                {
                    let word = if kind == BoolStatementType::And { "and" } else { "or" };
                    analysis.error(
                        node_start(tree, boolean),
                        word.len(),
                        format!("The '{}' command can not be used immediately after a backgrounded job", word),
                    );
                }
            }
        }
        _ => {}
    }
}

fn check_boolean(tree: &ParseTree, boolean: NodeId, analysis: &mut Analysis) {
    let word = match tree.statement_boolean_type(boolean) {
        Some(BoolStatementType::And) => "and",
        Some(BoolStatementType::Or) => "or",
        _ => return,
    };
    if tree.statement_is_in_pipeline(boolean, false) {
        analysis.error(
            node_start(tree, boolean),
            word.len(),
            format!("The '{}' command can not be used in a pipeline", word),
        );
    }
}

fn first_argument_is_help(tree: &ParseTree, statement: NodeId, src: &str) -> bool {
    tree.find_nodes(statement, Symbol::Argument)
        .first()
        .and_then(|arg| tree.source(*arg, src))
        .map_or(false, is_help_argument)
}

/// Header kinds of the enclosing block statements, innermost first
fn enclosing_headers(tree: &ParseTree, id: NodeId) -> Vec<Symbol> {
    let mut headers = Vec::new();
    let mut cursor = tree.find_ancestor(id, Symbol::BlockStatement);
    while let Some(block) = cursor {
        if let Some(header) = tree.header_node_for_block_statement(block) {
            headers.push(tree[header].symbol);
        }
        cursor = tree.find_ancestor(block, Symbol::BlockStatement);
    }
    headers
}

fn check_plain_statement(tree: &ParseTree, statement: NodeId, src: &str, analysis: &mut Analysis) {
    let command = match tree.command_for_plain_statement(statement, src) {
        Some(command) => command,
        None => return,
    };
    let start = node_start(tree, statement);

    let in_pipeline = tree.statement_is_in_pipeline(statement, true);
    if in_pipeline && tree.decoration_for_plain_statement(statement) == Decoration::Exec {
        let decorated = tree.get_parent(statement, Some(Symbol::DecoratedStatement));
        analysis.error(
            decorated.map_or(start, |d| node_start(tree, d)),
            "exec".len(),
            "The 'exec' command can not be used in a pipeline",
        );
    }
    if in_pipeline && PIPE_FORBIDDEN_COMMANDS.contains(&command) {
        analysis.error(
            start,
            command.len(),
            format!("The '{}' command can not be used in a pipeline", command),
        );
    }

    match command {
        "return" => {
            if first_argument_is_help(tree, statement, src) {
                return;
            }
            let in_function = enclosing_headers(tree, statement).contains(&Symbol::FunctionHeader);
            if !in_function {
                analysis.error(start, command.len(), "'return' outside of function definition");
            }
        }
        "break" | "continue" => {
            if first_argument_is_help(tree, statement, src) {
                return;
            }
            // A function body starts a fresh loop scope
            let in_loop = enclosing_headers(tree, statement)
                .into_iter()
                .find(|h| {
                    matches!(
                        h,
                        Symbol::ForHeader | Symbol::WhileHeader | Symbol::FunctionHeader
                    )
                })
                .map_or(false, |h| h != Symbol::FunctionHeader);
            if !in_loop {
                analysis.error(
                    start,
                    command.len(),
                    format!("'{}' command used outside of loop", command),
                );
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged(src: &str) -> bool {
        !detect_errors(src, AnalysisOptions::default()).flags.is_empty()
    }

    #[test]
    fn test_static_errors() {
        let bad = [
            "if; end",
            "if test; echo",
            "if test; end; end",
            "case foo",
            "switch ggg; if true; case foo;end;end",
            "else",
            "else if",
            "if false; else if; end",
            "break",
            "while false ; function foo ; break ; end ; end ",
            "exec ls|less",
            "echo|return",
            "cat | and cat",
            "cat | or cat",
            "cat | exec",
            "exec | cat",
            "false & ; and cat",
            "true & ; or cat",
            "if true & ; end",
            "if false; else if true & ; end",
            "while true & ; end",
            "return",
            "function f; while true; function g; continue; end; end; end",
        ];
        for src in bad {
            assert!(flagged(src), "{}", src);
        }
    }

    #[test]
    fn test_static_ok() {
        let good = [
            "break --help",
            "for i in foo ; switch $i ; case blah ; break; end; end ",
            "or cat | cat",
            "and cat | cat",
            "true & ; not cat",
            "while true; begin; continue; end; end",
            "function f; if true; return 1; end; end",
            "function f; for i in a; break; end; end",
            "return -h",
            "echo hello world",
            "",
        ];
        for src in good {
            let analysis = detect_errors(src, AnalysisOptions::default());
            assert!(analysis.flags.is_empty(), "{}: {:?}", src, analysis.errors);
        }
    }

    #[test]
    fn test_incomplete() {
        let analysis = detect_errors("if test; echo", AnalysisOptions::default());
        assert!(analysis.is_incomplete());
        assert!(!analysis.has_error());
        assert!(analysis.needs_more_input());

        let analysis = detect_errors("while true\n  echo hi\n", AnalysisOptions::default());
        assert_eq!(analysis.flags, ErrorFlags::INCOMPLETE);
    }

    #[test]
    fn test_unterminated_quote() {
        let analysis = detect_errors("echo 'abc", AnalysisOptions::default());
        assert!(analysis.has_error());
        assert_eq!(analysis.errors[0].code, ParseErrorCode::TokenizerUnterminatedQuote);

        let options = AnalysisOptions { allow_incomplete: true };
        let analysis = detect_errors("echo 'abc", options);
        assert_eq!(analysis.flags, ErrorFlags::INCOMPLETE);
        assert!(analysis.errors.is_empty());
    }

    #[test]
    fn test_reports_independent_errors() {
        let analysis = detect_errors("end; echo $$", AnalysisOptions::default());
        let codes: Vec<ParseErrorCode> = analysis.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ParseErrorCode::UnbalancingEnd, ParseErrorCode::Syntax]);
    }

    #[test]
    fn test_error_offsets() {
        let src = "echo ok; cat | and cat";
        let analysis = detect_errors(src, AnalysisOptions::default());
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].source_start, 15);
    }

    #[test]
    fn test_detect_errors_in_tree() {
        let src = "while true; echo | exec; end";
        let tree = crate::parser::parse(src).unwrap();
        let analysis = detect_errors_in_tree(&tree, src);
        assert_eq!(analysis.flags, ErrorFlags::ERROR);
        assert_eq!(analysis.errors[0].source_start, 19);

        let src = "for i in a; continue; end";
        let tree = crate::parser::parse(src).unwrap();
        assert!(detect_errors_in_tree(&tree, src).flags.is_empty());
    }

    #[test]
    fn test_argument_errors() {
        assert!(detect_argument_errors("foo").flags.is_empty());
        assert!(detect_argument_errors("''").flags.is_empty());
        for src in [
            "foo$$",
            "foo$@",
            "foo(cat | or cat)",
            "foo\\xFF9",
            "foo(echo \\xFF9)",
            "foo(echo (echo (echo \\xFF9)))",
        ] {
            assert!(detect_argument_errors(src).has_error(), "{}", src);
        }
    }

    #[test]
    fn test_nested_offsets() {
        let src = "echo (echo (echo \\xFF9))";
        let analysis = detect_errors(src, AnalysisOptions::default());
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].source_start, src.find('\\').unwrap());
    }

    #[test]
    fn test_error_messages() {
        use crate::parser::types::{ERROR_BAD_AND, ERROR_BAD_OR};
        let cases: Vec<(&str, String)> = vec![
            ("echo $^", "$^ is not a valid variable in fish.".to_string()),
            ("echo foo${a}bar", "Variables cannot be bracketed. In fish, please use {$a}.".to_string()),
            ("echo foo\"${a}\"bar", "Variables cannot be bracketed. In fish, please use \"$a\".".to_string()),
            ("echo foo\"${\"bar", "${ is not a valid variable in fish.".to_string()),
            ("echo $?", "$? is not the exit status. In fish, please use $status.".to_string()),
            ("echo $$", "$$ is not the pid. In fish, please use %self.".to_string()),
            ("echo $#", "$# is not supported. In fish, please use 'count $argv'.".to_string()),
            ("echo $@", "$@ is not supported. In fish, please use $argv.".to_string()),
            ("echo $*", "$* is not supported. In fish, please use $argv.".to_string()),
            ("echo $", "Expected a variable name after this $.".to_string()),
            ("echo foo\"$\"bar", "Expected a variable name after this $.".to_string()),
            ("echo \"foo\"$\"bar\"", "Expected a variable name after this $.".to_string()),
            ("echo foo $ bar", "Expected a variable name after this $.".to_string()),
            ("echo foo$(foo)bar", "$(...) is not supported. In fish, please use '(foo)'.".to_string()),
            ("echo \"foo$(foo)bar\"", "$(...) is not supported. In fish, please use '(foo)'.".to_string()),
            ("echo foo || echo bar", ERROR_BAD_OR.to_string()),
            ("echo foo && echo bar", ERROR_BAD_AND.to_string()),
        ];
        for (src, expected) in cases {
            let analysis = detect_errors(src, AnalysisOptions::default());
            assert!(!analysis.errors.is_empty(), "{}", src);
            assert_eq!(analysis.errors[0].text, expected, "{}", src);
        }
    }

    #[test]
    fn test_flags_serialize() {
        let flags = ErrorFlags::ERROR | ErrorFlags::INCOMPLETE;
        assert_eq!(serde_json::to_string(&flags).unwrap(), "[\"error\",\"incomplete\"]");
        assert_eq!(serde_json::to_string(&ErrorFlags::NONE).unwrap(), "[]");
    }
}
