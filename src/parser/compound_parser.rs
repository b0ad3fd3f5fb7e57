//! Compound Statement Parser
//!
//! Handles parsing of block statements: if/else, switch/case, and the
//! for, while, function and begin blocks.

use crate::ast::types::{NodeId, ParseKeyword, Symbol};
use crate::parser::command_parser::{
    parse_argument, parse_argument_list, parse_arguments_or_redirections_list,
};
use crate::parser::parser::{parse_job, ParseResult, ParseTokenKind, Parser};

/// if_statement ::= if_clause else_clause end_command arguments_or_redirections_list
///
/// Chains of `else if` are built iteratively.
pub(crate) fn parse_if_statement(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    p.in_block(|p| {
        let node = p.add_node(Symbol::IfStatement, parent);
        let opener = p.peek(0).clone();
        parse_if_clause(p, node)?;

        let mut else_clause = p.add_node(Symbol::ElseClause, node);
        loop {
            if !p.peek_is_keyword(ParseKeyword::Else) {
                p.mark_empty(else_clause);
                break;
            }
            p.consume(Symbol::Keyword, else_clause);
            let continuation = p.add_node(Symbol::ElseContinuation, else_clause);

            if p.peek_is_keyword(ParseKeyword::If) {
                parse_if_clause(p, continuation)?;
                else_clause = p.add_node(Symbol::ElseClause, continuation);
            } else {
                p.expect_end(continuation)?;
                let mut body = p.add_node(Symbol::JobList, continuation);
                p.parse_job_list(&mut body)?;
                break;
            }
        }

        p.parse_end_command(node, &opener)?;
        parse_arguments_or_redirections_list(p, node)
    })
}

/// if_clause ::= IF job END job_list
fn parse_if_clause(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let clause = p.add_node(Symbol::IfClause, parent);
    p.expect_keyword(ParseKeyword::If, clause)?;
    parse_job(p, clause)?;
    p.expect_end(clause)?;
    let mut body = p.add_node(Symbol::JobList, clause);
    p.parse_job_list(&mut body)
}

/// switch_statement ::= SWITCH argument END case_item_list end_command
///                      arguments_or_redirections_list
pub(crate) fn parse_switch_statement(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    p.in_block(|p| {
        let node = p.add_node(Symbol::SwitchStatement, parent);
        let opener = p.peek(0).clone();
        p.expect_keyword(ParseKeyword::Switch, node)?;
        parse_argument(p, node)?;
        p.expect_end(node)?;
        parse_case_item_list(p, node)?;
        p.parse_end_command(node, &opener)?;
        parse_arguments_or_redirections_list(p, node)
    })
}

/// case_item_list ::= ∅ | case_item case_item_list | END case_item_list
fn parse_case_item_list(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let mut list = p.add_node(Symbol::CaseItemList, parent);
    loop {
        p.flush_comments(list);
        if p.peek_is_keyword(ParseKeyword::Case) {
            parse_case_item(p, list)?;
        } else if p.peek_kind() == ParseTokenKind::End {
            p.consume(Symbol::EndToken, list);
        } else {
            p.mark_empty(list);
            return Ok(());
        }
        list = p.add_node(Symbol::CaseItemList, list);
    }
}

/// case_item ::= CASE argument_list END job_list
fn parse_case_item(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let item = p.add_node(Symbol::CaseItem, parent);
    p.expect_keyword(ParseKeyword::Case, item)?;
    parse_argument_list(p, item)?;
    p.expect_end(item)?;
    let mut body = p.add_node(Symbol::JobList, item);
    p.parse_job_list(&mut body)
}

/// block_statement ::= block_header job_list end_command arguments_or_redirections_list
pub(crate) fn parse_block_statement(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    p.in_block(|p| {
        let node = p.add_node(Symbol::BlockStatement, parent);
        let opener = p.peek(0).clone();
        let header = p.add_node(Symbol::BlockHeader, node);

        match opener.keyword {
            Some(ParseKeyword::For) => parse_for_header(p, header)?,
            Some(ParseKeyword::While) => parse_while_header(p, header)?,
            Some(ParseKeyword::Function) => parse_function_header(p, header)?,
            _ => parse_begin_header(p, header)?,
        }

        let mut body = p.add_node(Symbol::JobList, node);
        p.parse_job_list(&mut body)?;
        p.parse_end_command(node, &opener)?;
        parse_arguments_or_redirections_list(p, node)
    })
}

/// for_header ::= FOR STRING IN argument_list END
fn parse_for_header(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let header = p.add_node(Symbol::ForHeader, parent);
    p.expect_keyword(ParseKeyword::For, header)?;
    p.expect_string(header, "a variable name")?;
    p.expect_keyword(ParseKeyword::In, header)?;
    parse_argument_list(p, header)?;
    p.expect_end(header)?;
    Ok(())
}

/// while_header ::= WHILE job END
fn parse_while_header(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let header = p.add_node(Symbol::WhileHeader, parent);
    p.expect_keyword(ParseKeyword::While, header)?;
    parse_job(p, header)?;
    p.expect_end(header)?;
    Ok(())
}

/// function_header ::= FUNCTION argument argument_list END
fn parse_function_header(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let header = p.add_node(Symbol::FunctionHeader, parent);
    p.expect_keyword(ParseKeyword::Function, header)?;
    parse_argument(p, header)?;
    parse_argument_list(p, header)?;
    p.expect_end(header)?;
    Ok(())
}

/// begin_header ::= BEGIN
fn parse_begin_header(p: &mut Parser<'_>, parent: NodeId) -> ParseResult<()> {
    let header = p.add_node(Symbol::BeginHeader, parent);
    p.expect_keyword(ParseKeyword::Begin, header)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::ast::types::Symbol;
    use crate::parser::parse;

    #[test]
    fn test_if_else_chain() {
        let src = "if a; x; else if b; y; else if c; z; else; w; end";
        let tree = parse(src).unwrap();
        assert_eq!(tree.find_nodes(0, Symbol::IfClause).len(), 3);
        assert_eq!(tree.find_nodes(0, Symbol::ElseContinuation).len(), 3);
        let end = tree.find_nodes(0, Symbol::EndCommand)[0];
        assert_eq!(tree.source(end, src), Some("end"));
    }

    #[test]
    fn test_if_statement_children() {
        let tree = parse("if true; end > out").unwrap();
        let statement = tree.find_nodes(0, Symbol::IfStatement)[0];
        let symbols: Vec<Symbol> = tree[statement].children.iter().map(|c| tree[*c].symbol).collect();
        assert_eq!(
            symbols,
            vec![
                Symbol::IfClause,
                Symbol::ElseClause,
                Symbol::EndCommand,
                Symbol::ArgumentsOrRedirectionsList
            ]
        );
        assert_eq!(tree.find_nodes(statement, Symbol::Redirection).len(), 1);
    }

    #[test]
    fn test_headers() {
        let cases = [
            ("for i in a b; end", Symbol::ForHeader),
            ("while true; end", Symbol::WhileHeader),
            ("function f -a x; end", Symbol::FunctionHeader),
            ("begin; end", Symbol::BeginHeader),
        ];
        for (src, symbol) in cases {
            let tree = parse(src).unwrap();
            let block = tree.find_nodes(0, Symbol::BlockStatement)[0];
            let header = tree.header_node_for_block_statement(block).unwrap();
            assert_eq!(tree[header].symbol, symbol, "{}", src);
        }
    }

    #[test]
    fn test_for_arguments() {
        let src = "for i in a (seq 3) c\necho $i\nend";
        let tree = parse(src).unwrap();
        let header = tree.find_nodes(0, Symbol::ForHeader)[0];
        let args: Vec<&str> = tree
            .find_nodes(header, Symbol::Argument)
            .into_iter()
            .filter_map(|a| tree.source(a, src))
            .collect();
        assert_eq!(args, vec!["a", "(seq 3)", "c"]);
    }

    #[test]
    fn test_switch_items() {
        let src = "switch $x\ncase a b\n  echo 1\ncase '*'\n  echo 2\nend";
        let tree = parse(src).unwrap();
        let items = tree.find_nodes(0, Symbol::CaseItem);
        assert_eq!(items.len(), 2);
        assert_eq!(tree.find_nodes(items[0], Symbol::Argument).len(), 2);
    }

    #[test]
    fn test_case_outside_switch() {
        assert!(parse("case foo").is_err());
        assert!(parse("begin; case foo; end").is_err());
        assert!(parse("switch a; case b; begin; case c; end; end").is_err());
    }

    #[test]
    fn test_nested_blocks() {
        let src = "function f\n  while true\n    if a\n      break\n    end\n  end\nend";
        let tree = parse(src).unwrap();
        assert_eq!(tree.find_nodes(0, Symbol::BlockStatement).len(), 2);
        assert_eq!(tree.find_nodes(0, Symbol::IfStatement).len(), 1);
        assert_eq!(tree.find_nodes(0, Symbol::EndCommand).len(), 3);
    }
}
