//! Indentation Engine
//!
//! Computes a nesting level for every byte of a script from a tolerant
//! parse, so editors can indent unfinished and erroneous input as it is
//! typed.
//!
//! Levels come from the tree: a job list opens a level unless it continues
//! another job list, and likewise for case item lists. Whitespace before a
//! token takes the token's level, and trailing whitespace takes the level
//! the next line would have.

use tracing::debug;

use crate::ast::tree::ParseTree;
use crate::ast::types::{NodeId, Symbol};
use crate::parser::lexer::tok_first;
use crate::parser::{parse_with_flags, ParseFlags};

const WHITESPACE: &[u8] = b" \n\t\r";

const BLOCK_OPENERS: &[&str] = &["if", "for", "while", "function", "begin", "switch"];

/// Indent level of every byte of `src`
pub fn compute_indents(src: &str) -> Vec<usize> {
    compute(src).0
}

/// Indent level of each line of `src`. A final empty line (after a
/// trailing newline, or for empty input) gets the level a new line typed
/// there would have.
pub fn compute_line_indents(src: &str) -> Vec<usize> {
    let (indents, trailing) = compute(src);
    let mut result = Vec::new();
    let mut line_start = 0;
    loop {
        result.push(indents.get(line_start).copied().unwrap_or(trailing));
        match src[line_start..].find('\n') {
            Some(newline) => line_start += newline + 1,
            None => break,
        }
    }
    result
}

fn compute(src: &str) -> (Vec<usize>, usize) {
    if src.is_empty() {
        return (Vec::new(), 0);
    }
    let flags = ParseFlags {
        continue_after_error: true,
        include_comments: true,
        accept_incomplete_tokens: true,
        ..Default::default()
    };
    let output = parse_with_flags(src, flags, Symbol::JobList);
    let tree = &output.tree;

    let (marks, node_indents, mut trailing) = mark_tree(tree, src.len());
    let mut indents = fill(src, &marks);

    if let Some(leaf) = tree
        .nodes()
        .iter()
        .position(|n| n.symbol == Symbol::TokenizerError)
    {
        let start = tree.range(leaf).map_or(src.len(), |r| r.start);
        debug!(offset = start, "indenting past tokenizer error by keyword");
        trailing = indent_lines_by_keyword(src, &mut indents, start, node_indents[leaf]);
    }

    let bytes = src.as_bytes();
    let mut i = bytes.len();
    while i > 0 && WHITESPACE.contains(&bytes[i - 1]) {
        i -= 1;
        indents[i] = trailing;
    }
    (indents, trailing)
}

fn starts_with_error(tree: &ParseTree, id: NodeId) -> bool {
    let node = &tree[id];
    node.symbol == Symbol::JobList
        && node
            .children
            .first()
            .map_or(false, |c| tree[*c].symbol.is_error())
}

/// Walk the tree recording the level at each node's first byte. Returns
/// the per-byte marks, the level of every node and the trailing level.
fn mark_tree(tree: &ParseTree, len: usize) -> (Vec<Option<usize>>, Vec<usize>, usize) {
    let mut marks: Vec<Option<usize>> = vec![None; len];
    let mut node_indents = vec![0usize; tree.len()];
    let mut trailing = 0;
    if tree.is_empty() {
        return (marks, node_indents, trailing);
    }

    // Explicit stack of (node, inherited level, parent symbol)
    let mut stack = vec![(tree.root(), 0usize, Symbol::JobList)];
    while let Some((id, inherited, parent_symbol)) = stack.pop() {
        let node = &tree[id];
        let opens_level = match node.symbol {
            Symbol::JobList => parent_symbol != Symbol::JobList,
            Symbol::CaseItemList => parent_symbol != Symbol::CaseItemList,
            _ => false,
        };
        let mut indent = inherited + usize::from(opens_level);
        // Code after a recovered error resumes at the level reached before it
        if starts_with_error(tree, id) {
            indent = indent.max(trailing);
        }
        node_indents[id] = indent;

        match node.range {
            Some(range) if range.length > 0 => {
                trailing = indent;
                if range.start < len {
                    marks[range.start] = Some(indent);
                }
            }
            range => {
                // Empty productions must not pull the trailing level down
                trailing = trailing.max(indent);
                if let Some(range) = range.filter(|r| r.start < len) {
                    let slot = &mut marks[range.start];
                    *slot = Some(slot.map_or(indent, |v| v.max(indent)));
                }
            }
        }

        for child in node.children.iter().rev() {
            stack.push((*child, indent, node.symbol));
        }
    }

    // Comments sit at the level of the list they were read in
    for node in tree.nodes() {
        if node.symbol != Symbol::Comment {
            continue;
        }
        if let (Some(range), Some(parent)) = (node.range, node.parent) {
            if range.start < len {
                marks[range.start] = Some(node_indents[parent]);
            }
        }
    }

    (marks, node_indents, trailing)
}

/// Spread marks over the unmarked bytes that follow them, and pull each
/// new level back over the whitespace before it
fn fill(src: &str, marks: &[Option<usize>]) -> Vec<usize> {
    let bytes = src.as_bytes();
    let mut indents = vec![0usize; marks.len()];
    let mut last = 0;
    for (i, mark) in marks.iter().enumerate() {
        match mark {
            None => indents[i] = last,
            Some(level) => {
                last = *level;
                indents[i] = last;
                let mut j = i;
                while j > 0 && WHITESPACE.contains(&bytes[j - 1]) {
                    j -= 1;
                    indents[j] = last;
                }
            }
        }
    }
    indents
}

/// After a tokenizer error there is no tree. Approximate the level of each
/// following line from its first word, starting at `base`. Returns the
/// level after the last line.
fn indent_lines_by_keyword(src: &str, indents: &mut [usize], from: usize, base: usize) -> usize {
    let mut level = base;
    let mut line_start = match src[from..].find('\n') {
        Some(newline) => from + newline + 1,
        None => return level,
    };
    while line_start < src.len() {
        let line_end = src[line_start..]
            .find('\n')
            .map_or(src.len(), |newline| line_start + newline + 1);
        let first = tok_first(&src[line_start..line_end]);
        let line_level = match first.as_str() {
            "end" => {
                level = level.saturating_sub(1);
                level
            }
            "else" => level.saturating_sub(1),
            _ => level,
        };
        if BLOCK_OPENERS.contains(&first.as_str()) {
            level += 1;
        }
        for slot in &mut indents[line_start..line_end] {
            *slot = line_level;
        }
        line_start = line_end;
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_indents() {
        let cases: Vec<(&str, Vec<usize>)> = vec![
            ("if foo\nend", vec![0, 0]),
            ("if foo\n", vec![0, 1]),
            ("if foo\nfoo\nend", vec![0, 1, 0]),
            ("if foo\nif bar\nend\nend\n", vec![0, 1, 1, 0, 0]),
            ("if foo\nif bar\n", vec![0, 1, 2]),
            ("begin\nfoo\n", vec![0, 1, 1]),
            ("begin\n;\nend\nfoo\n", vec![0, 1, 0, 0, 0]),
            ("if foo\nif bar\nbaz\nend\n", vec![0, 1, 2, 1, 1]),
            ("switch foo\n", vec![0, 1]),
            ("switch foo\ncase bar\ncase baz\nquux\n", vec![0, 1, 1, 2, 2]),
            ("switch foo\ncas", vec![0, 1]),
            ("while false\n# comment\ncommand\n# comment2", vec![0, 1, 1, 1]),
        ];
        for (src, expected) in cases {
            assert_eq!(compute_line_indents(src), expected, "{:?}", src);
        }
    }

    #[test]
    fn test_flat_script() {
        let src = "echo a\necho b | cat\n";
        let indents = compute_indents(src);
        assert_eq!(indents.len(), src.len());
        assert!(indents.iter().all(|i| *i == 0));
    }

    #[test]
    fn test_empty_input() {
        assert!(compute_indents("").is_empty());
        assert_eq!(compute_line_indents(""), vec![0]);
    }

    #[test]
    fn test_leading_whitespace_takes_token_level() {
        let src = "begin\n    echo\nend";
        let indents = compute_indents(src);
        assert_eq!(indents[6], 1);
        assert_eq!(indents[10], 1);
        assert_eq!(indents[src.len() - 3], 0);
    }

    #[test]
    fn test_else_and_function() {
        let src = "function f\nif a\nb\nelse\nc\nend\nend\n";
        assert_eq!(compute_line_indents(src), vec![0, 1, 2, 1, 2, 1, 0, 0]);
    }

    #[test]
    fn test_keyword_fallback_after_tokenizer_error() {
        let src = "if true\n  echo >&foo\n  if x\nbar\nend\nend\n";
        assert_eq!(compute_line_indents(src), vec![0, 1, 1, 2, 1, 0, 0]);
    }
}
