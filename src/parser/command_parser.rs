//! Command Parser
//!
//! Handles statements: resolution with two tokens of lookahead, boolean
//! prefixes, decorations, plain statements, arguments and redirections.

use crate::ast::types::{BoolStatementType, Decoration, NodeId, NodeTag, ParseKeyword, Symbol};
use crate::parser::compound_parser::{parse_block_statement, parse_if_statement, parse_switch_statement};
use crate::parser::lexer::TokenType;
use crate::parser::parser::{ParseResult, ParseToken, ParseTokenKind, Parser};

/// Productions of `statement`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementKind {
    Boolean,
    Block,
    If,
    Switch,
    Decorated,
}

/// Pick the statement production for token1 given token2.
///
/// Keywords are only keywords when used as such: `if -q` runs a command
/// named `if`, and a keyword followed directly by a terminator is a naked
/// command invocation.
pub(crate) fn resolve_statement(token1: &ParseToken, token2: &ParseToken) -> Option<StatementKind> {
    if token1.kind != ParseTokenKind::String {
        return None;
    }
    let keyword = match token1.keyword {
        Some(keyword) => keyword,
        None => return Some(StatementKind::Decorated),
    };

    if keyword == ParseKeyword::Function && token2.is_help_argument {
        return Some(StatementKind::Decorated);
    }
    if keyword != ParseKeyword::Function && token2.has_dash_prefix {
        return Some(StatementKind::Decorated);
    }
    let naked = matches!(token2.kind, ParseTokenKind::End | ParseTokenKind::Terminate);
    if naked && !matches!(keyword, ParseKeyword::Begin | ParseKeyword::End) {
        return Some(StatementKind::Decorated);
    }

    match keyword {
        ParseKeyword::And | ParseKeyword::Or | ParseKeyword::Not => Some(StatementKind::Boolean),
        ParseKeyword::For | ParseKeyword::While | ParseKeyword::Function | ParseKeyword::Begin => {
            Some(StatementKind::Block)
        }
        ParseKeyword::If => Some(StatementKind::If),
        ParseKeyword::Switch => Some(StatementKind::Switch),
        ParseKeyword::Else | ParseKeyword::End => None,
        _ => Some(StatementKind::Decorated),
    }
}

/// statement ::= boolean_statement | block_statement | if_statement
///             | switch_statement | decorated_statement
pub(crate) fn parse_statement(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    p.nested(|p| {
        let statement = p.add_node(Symbol::Statement, parent);
        let token1 = p.peek(0).clone();
        let token2 = p.peek(1).clone();

        match resolve_statement(&token1, &token2) {
            Some(StatementKind::Boolean) => parse_boolean_statement(p, statement),
            Some(StatementKind::Block) => parse_block_statement(p, statement),
            Some(StatementKind::If) => parse_if_statement(p, statement),
            Some(StatementKind::Switch) => parse_switch_statement(p, statement),
            Some(StatementKind::Decorated) => parse_decorated_statement(p, statement),
            None => Err(p.unexpected_statement()),
        }
    })
}

/// boolean_statement ::= (AND | OR | NOT) statement
fn parse_boolean_statement(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let node = p.add_node(Symbol::BooleanStatement, parent);
    let kind = p.peek(0).keyword.and_then(BoolStatementType::from_keyword);
    if let Some(kind) = kind {
        p.set_tag(node, NodeTag::Bool(kind));
    }
    p.consume(Symbol::Keyword, node);
    parse_statement(p, node)
}

/// decorated_statement ::= plain_statement | (COMMAND | BUILTIN | EXEC) plain_statement
fn parse_decorated_statement(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let node = p.add_node(Symbol::DecoratedStatement, parent);
    let keyword = p.peek(0).keyword;
    let decorates = {
        let token2 = p.peek(1);
        token2.kind == ParseTokenKind::String && !token2.has_dash_prefix
    };

    let decoration = match keyword {
        Some(keyword) if keyword.is_decoration() && decorates => {
            p.consume(Symbol::Keyword, node);
            Decoration::from(keyword)
        }
        _ => Decoration::None,
    };
    p.set_tag(node, NodeTag::Decoration(decoration));
    parse_plain_statement(p, node)
}

/// plain_statement ::= STRING arguments_or_redirections_list
fn parse_plain_statement(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let node = p.add_node(Symbol::PlainStatement, parent);
    p.expect_string(node, "a command")?;
    parse_arguments_or_redirections_list(p, node)
}

/// arguments_or_redirections_list ::= ∅ | argument_or_redirection arguments_or_redirections_list
pub(crate) fn parse_arguments_or_redirections_list(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let mut list = p.add_node(Symbol::ArgumentsOrRedirectionsList, parent);
    loop {
        match p.peek_kind() {
            ParseTokenKind::String => {
                let item = p.add_node(Symbol::ArgumentOrRedirection, list);
                parse_argument(p, item)?;
            }
            ParseTokenKind::Redirection => {
                let item = p.add_node(Symbol::ArgumentOrRedirection, list);
                parse_redirection(p, item)?;
            }
            _ => {
                p.mark_empty(list);
                return Ok(());
            }
        }
        list = p.add_node(Symbol::ArgumentsOrRedirectionsList, list);
    }
}

/// argument_list ::= ∅ | argument argument_list
pub(crate) fn parse_argument_list(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let mut list = p.add_node(Symbol::ArgumentList, parent);
    while p.peek_kind() == ParseTokenKind::String {
        parse_argument(p, list)?;
        list = p.add_node(Symbol::ArgumentList, list);
    }
    p.mark_empty(list);
    Ok(())
}

/// argument ::= STRING
pub(crate) fn parse_argument(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let node = p.add_node(Symbol::Argument, parent);
    p.expect_string(node, "a string")?;
    Ok(())
}

/// redirection ::= REDIRECTION [STRING]
///
/// Fd redirections like `2>&1` carry their target in the token.
fn parse_redirection(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let node = p.add_node(Symbol::Redirection, parent);
    let is_fd = p.peek(0).token.token_type == TokenType::RedirectFd;
    p.consume(Symbol::RedirectionToken, node);
    if !is_fd {
        p.expect_string(node, "a redirection target")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::ast::types::{BoolStatementType, Decoration, Symbol};
    use crate::parser::parse;

    #[test]
    fn test_naked_keywords_are_commands() {
        for (src, command) in [("if ;", "if"), ("while", "while"), ("and", "and"), ("switch", "switch")] {
            let tree = parse(src).unwrap();
            let statement = tree.find_nodes(0, Symbol::PlainStatement)[0];
            assert_eq!(tree.command_for_plain_statement(statement, src), Some(command));
        }
    }

    #[test]
    fn test_keyword_with_dash_is_command() {
        let src = "if -q foo";
        let tree = parse(src).unwrap();
        let statement = tree.find_nodes(0, Symbol::PlainStatement)[0];
        assert_eq!(tree.command_for_plain_statement(statement, src), Some("if"));
        assert!(tree.find_nodes(0, Symbol::IfStatement).is_empty());
    }

    #[test]
    fn test_boolean_statements() {
        let tree = parse("and echo; or echo; not not echo").unwrap();
        let kinds: Vec<BoolStatementType> = tree
            .find_nodes(0, Symbol::BooleanStatement)
            .into_iter()
            .filter_map(|b| tree.statement_boolean_type(b))
            .collect();
        assert_eq!(
            kinds,
            vec![
                BoolStatementType::And,
                BoolStatementType::Or,
                BoolStatementType::Not,
                BoolStatementType::Not
            ]
        );
    }

    #[test]
    fn test_redirections() {
        let src = "cat <in >out 2>&1 ^^errs";
        let tree = parse(src).unwrap();
        let redirections = tree.find_nodes(0, Symbol::Redirection);
        assert_eq!(redirections.len(), 4);
        let texts: Vec<&str> = redirections
            .iter()
            .map(|r| tree.source(*r, src).unwrap())
            .collect();
        assert_eq!(texts, vec!["<in", ">out", "2>&1", "^^errs"]);
        assert_eq!(tree[redirections[2]].children.len(), 1);
        assert_eq!(tree.find_nodes(0, Symbol::Argument).len(), 0);
    }

    #[test]
    fn test_keywords_as_arguments() {
        let src = "echo if end case";
        let tree = parse(src).unwrap();
        assert_eq!(tree.find_nodes(0, Symbol::Argument).len(), 3);
    }

    #[test]
    fn test_exec_decoration() {
        let src = "exec ls | less";
        let tree = parse(src).unwrap();
        let statements = tree.find_nodes(0, Symbol::PlainStatement);
        assert_eq!(tree.decoration_for_plain_statement(statements[0]), Decoration::Exec);
        assert_eq!(tree.decoration_for_plain_statement(statements[1]), Decoration::None);
    }
}
