//! Flat parse tree and navigation queries
//!
//! Node 0 is the root. A node's children always have larger indices than
//! the node itself, and the children of every node are stored in document
//! order, so a depth-first walk over `children` visits nodes in source
//! order. Comment nodes point at their parent but are not listed among its
//! children.

use serde::Serialize;
use std::fmt::Write as _;
use std::ops::Index;

use crate::ast::types::{
    BoolStatementType, Decoration, Node, NodeId, ParseKeyword, SourceRange, Symbol,
};

/// A complete parse result; never mutated once the parser returns it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseTree {
    nodes: Vec<Node>,
}

impl Index<NodeId> for ParseTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

impl ParseTree {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        if let Some(parent) = node.parent {
            if node.symbol == Symbol::Comment {
                self.nodes[parent].has_comments = true;
            } else {
                self.nodes[parent].children.push(id);
            }
        }
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn range(&self, id: NodeId) -> Option<SourceRange> {
        self.get(id).and_then(|n| n.range)
    }

    /// Literal text of a node, if it has source
    pub fn source<'s>(&self, id: NodeId, src: &'s str) -> Option<&'s str> {
        let range = self.range(id)?;
        src.get(range.start..range.end())
    }

    /// The child at `index`, if it exists and has the expected symbol
    pub fn get_child(&self, id: NodeId, index: usize, expected: Symbol) -> Option<NodeId> {
        let child = *self.get(id)?.children.get(index)?;
        (self.nodes[child].symbol == expected).then_some(child)
    }

    /// The direct parent, optionally required to have a given symbol
    pub fn get_parent(&self, id: NodeId, expected: Option<Symbol>) -> Option<NodeId> {
        let parent = self.get(id)?.parent?;
        match expected {
            Some(symbol) if self.nodes[parent].symbol != symbol => None,
            _ => Some(parent),
        }
    }

    /// Nearest ancestor with the given symbol
    pub fn find_ancestor(&self, id: NodeId, symbol: Symbol) -> Option<NodeId> {
        let mut cursor = self.get(id)?.parent;
        while let Some(current) = cursor {
            if self.nodes[current].symbol == symbol {
                return Some(current);
            }
            cursor = self.nodes[current].parent;
        }
        None
    }

    /// Whether `id` is `ancestor` or lies below it
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.get(current).and_then(|n| n.parent);
        }
        false
    }

    /// Every node of `symbol` in the subtree rooted at `id` (inclusive), in
    /// document order
    pub fn find_nodes(&self, id: NodeId, symbol: Symbol) -> Vec<NodeId> {
        let mut result = Vec::new();
        if id >= self.nodes.len() {
            return result;
        }
        // Explicit stack: list chains can be as long as the input
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current];
            if node.symbol == symbol {
                result.push(current);
            }
            stack.extend(node.children.iter().rev());
        }
        result
    }

    pub fn find_last_node(&self, id: NodeId, symbol: Symbol) -> Option<NodeId> {
        self.find_nodes(id, symbol).last().copied()
    }

    /// First node of `symbol` after `id` in document order, outside the
    /// subtree of `id`
    pub fn next_node_after(&self, id: NodeId, symbol: Symbol) -> Option<NodeId> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut passed = false;
        let mut stack = vec![self.root()];
        while let Some(current) = stack.pop() {
            if current == id {
                passed = true;
                continue;
            }
            let node = &self.nodes[current];
            if passed && node.symbol == symbol {
                return Some(current);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Iterate a right-recursive list.
    ///
    /// Returns the next entry of `entry` symbol together with the list tail
    /// to continue from. Productions without an entry (terminators, error
    /// leaves) are skipped.
    pub fn next_node_in_node_list(&self, list: NodeId, entry: Symbol) -> Option<(NodeId, NodeId)> {
        let list_symbol = self.get(list)?.symbol;
        let mut cursor = list;
        loop {
            let node = &self.nodes[cursor];
            let first = *node.children.first()?;
            if self.nodes[first].symbol == entry {
                let tail = node
                    .children
                    .iter()
                    .copied()
                    .find(|c| self.nodes[*c].symbol == list_symbol)
                    .unwrap_or(first);
                return Some((first, tail));
            }
            match node.children.last() {
                Some(&tail) if self.nodes[tail].symbol == list_symbol => cursor = tail,
                _ => return None,
            }
        }
    }

    /// Next job of a job list and the tail to continue from
    pub fn next_job_in_job_list(&self, list: NodeId) -> Option<(NodeId, NodeId)> {
        self.next_node_in_node_list(list, Symbol::Job)
    }

    /// All entries of a list, in order
    pub fn list_entries(&self, list: NodeId, entry: Symbol) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut cursor = list;
        while let Some((item, tail)) = self.next_node_in_node_list(cursor, entry) {
            result.push(item);
            if tail == item {
                break;
            }
            cursor = tail;
        }
        result
    }

    /// First node of `symbol` starting exactly at `start`, optionally
    /// restricted to the subtree of `parent`
    pub fn find_node_matching_source_location(
        &self,
        symbol: Symbol,
        start: usize,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        self.nodes.iter().enumerate().find_map(|(id, node)| {
            let matches = node.symbol == symbol
                && node.range.map_or(false, |r| r.start == start)
                && parent.map_or(true, |p| self.is_descendant_of(id, p));
            matches.then_some(id)
        })
    }

    pub fn comment_nodes_for_node(&self, id: NodeId) -> Vec<NodeId> {
        if !self.get(id).map_or(false, |n| n.has_comments) {
            return Vec::new();
        }
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.symbol == Symbol::Comment && n.parent == Some(id))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn command_for_plain_statement<'s>(&self, statement: NodeId, src: &'s str) -> Option<&'s str> {
        if self.get(statement)?.symbol != Symbol::PlainStatement {
            return None;
        }
        let command = self.get_child(statement, 0, Symbol::StringToken)?;
        self.source(command, src)
    }

    pub fn decoration_for_plain_statement(&self, statement: NodeId) -> Decoration {
        self.get_parent(statement, Some(Symbol::DecoratedStatement))
            .map_or(Decoration::None, |p| self.nodes[p].decoration())
    }

    /// Descend from a statement-like node to its plain statement
    pub fn plain_statement_for(&self, id: NodeId) -> Option<NodeId> {
        let mut cursor = id;
        loop {
            let node = self.get(cursor)?;
            match node.symbol {
                Symbol::PlainStatement => return Some(cursor),
                Symbol::Statement => cursor = *node.children.first()?,
                Symbol::DecoratedStatement => {
                    cursor = node
                        .children
                        .iter()
                        .copied()
                        .find(|c| self.nodes[*c].symbol == Symbol::PlainStatement)?
                }
                _ => return None,
            }
        }
    }

    /// Command word and decoration of a statement, decorated statement or
    /// plain statement
    pub fn command_and_decoration<'s>(&self, id: NodeId, src: &'s str) -> Option<(&'s str, Decoration)> {
        let plain = self.plain_statement_for(id)?;
        let command = self.command_for_plain_statement(plain, src)?;
        Some((command, self.decoration_for_plain_statement(plain)))
    }

    pub fn statement_boolean_type(&self, id: NodeId) -> Option<BoolStatementType> {
        let node = self.get(id)?;
        if node.symbol != Symbol::BooleanStatement {
            return None;
        }
        node.bool_type()
    }

    /// The `for`/`while`/`function`/`begin` header of a block statement
    pub fn header_node_for_block_statement(&self, block: NodeId) -> Option<NodeId> {
        let header = self.get_child(block, 0, Symbol::BlockHeader)?;
        self.get(header)?.children.first().copied()
    }

    /// Whether a statement is part of a multi-statement pipeline. With
    /// `include_first`, the first statement of a pipeline counts too.
    pub fn statement_is_in_pipeline(&self, id: NodeId, include_first: bool) -> bool {
        let mut cursor = Some(id);
        if self.get(id).map(|n| n.symbol) == Some(Symbol::PlainStatement) {
            cursor = self.get_parent(id, Some(Symbol::DecoratedStatement));
        }
        if let Some(current) = cursor {
            if self.nodes[current].symbol != Symbol::Statement {
                cursor = self.get_parent(current, Some(Symbol::Statement));
            }
        }
        let ancestor = match cursor.and_then(|c| self.get_parent(c, None)) {
            Some(ancestor) => ancestor,
            None => return false,
        };

        match self.nodes[ancestor].symbol {
            Symbol::JobContinuation => true,
            Symbol::Job if include_first => self
                .get_child(ancestor, 1, Symbol::JobContinuation)
                .map_or(false, |c| self.nodes[c].child_count() > 0),
            _ => false,
        }
    }

    pub fn job_should_be_backgrounded(&self, job: NodeId) -> bool {
        self.get_child(job, 2, Symbol::OptionalBackground)
            .map_or(false, |bg| self.nodes[bg].child_count() > 0)
    }

    /// Keyword of a keyword terminal
    pub fn keyword(&self, id: NodeId) -> Option<ParseKeyword> {
        self.get(id).and_then(|n| n.keyword)
    }

    /// Indented, one-node-per-line rendering of the tree
    pub fn dump(&self, src: &str) -> String {
        let mut out = String::new();
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack = vec![(self.root(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            let _ = write!(out, "{:width$}{}", "", node.symbol, width = depth * 2);
            match node.range {
                None => out.push_str(" <unsourced>"),
                Some(range) if node.symbol.is_leaf() => {
                    let text = src.get(range.start..range.end()).unwrap_or("");
                    let _ = write!(out, " {:?}", text);
                }
                Some(_) if node.children.is_empty() => out.push_str(" <empty>"),
                Some(range) => {
                    let _ = write!(out, " [{}, {})", range.start, range.end());
                }
            }
            out.push('\n');

            for comment in self.comment_nodes_for_node(id).into_iter().rev() {
                stack.push((comment, depth + 1));
            }
            for child in node.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }
}
