//! Parse Tree Types for fish scripts
//!
//! The tree is a concrete syntax tree: every grammar production becomes a
//! node, including empty list tails. Nodes live in one flat vector and
//! refer to each other by index.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Index of a node inside its tree
pub type NodeId = usize;

// =============================================================================
// SYMBOLS
// =============================================================================

/// Grammar symbols, terminals and special leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    // Nonterminals
    JobList,
    Job,
    JobContinuation,
    OptionalBackground,
    Statement,
    BooleanStatement,
    BlockStatement,
    BlockHeader,
    ForHeader,
    WhileHeader,
    BeginHeader,
    FunctionHeader,
    IfStatement,
    IfClause,
    ElseClause,
    ElseContinuation,
    SwitchStatement,
    CaseItemList,
    CaseItem,
    DecoratedStatement,
    PlainStatement,
    ArgumentList,
    ArgumentsOrRedirectionsList,
    ArgumentOrRedirection,
    Argument,
    Redirection,
    EndCommand,

    // Terminals
    StringToken,
    PipeToken,
    BackgroundToken,
    EndToken,
    RedirectionToken,
    Keyword,

    // Specials
    Comment,
    ParseError,
    TokenizerError,
}

impl Symbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobList => "job_list",
            Self::Job => "job",
            Self::JobContinuation => "job_continuation",
            Self::OptionalBackground => "optional_background",
            Self::Statement => "statement",
            Self::BooleanStatement => "boolean_statement",
            Self::BlockStatement => "block_statement",
            Self::BlockHeader => "block_header",
            Self::ForHeader => "for_header",
            Self::WhileHeader => "while_header",
            Self::BeginHeader => "begin_header",
            Self::FunctionHeader => "function_header",
            Self::IfStatement => "if_statement",
            Self::IfClause => "if_clause",
            Self::ElseClause => "else_clause",
            Self::ElseContinuation => "else_continuation",
            Self::SwitchStatement => "switch_statement",
            Self::CaseItemList => "case_item_list",
            Self::CaseItem => "case_item",
            Self::DecoratedStatement => "decorated_statement",
            Self::PlainStatement => "plain_statement",
            Self::ArgumentList => "argument_list",
            Self::ArgumentsOrRedirectionsList => "arguments_or_redirections_list",
            Self::ArgumentOrRedirection => "argument_or_redirection",
            Self::Argument => "argument",
            Self::Redirection => "redirection",
            Self::EndCommand => "end_command",
            Self::StringToken => "tok_string",
            Self::PipeToken => "tok_pipe",
            Self::BackgroundToken => "tok_background",
            Self::EndToken => "tok_end",
            Self::RedirectionToken => "tok_redirection",
            Self::Keyword => "parse_token_type_keyword",
            Self::Comment => "comment",
            Self::ParseError => "parse_error",
            Self::TokenizerError => "tokenizer_error",
        }
    }

    /// Terminals and specials never have children
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::StringToken
                | Self::PipeToken
                | Self::BackgroundToken
                | Self::EndToken
                | Self::RedirectionToken
                | Self::Keyword
                | Self::Comment
                | Self::ParseError
                | Self::TokenizerError
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ParseError | Self::TokenizerError)
    }

    /// Right-recursive list symbols
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Self::JobList
                | Self::JobContinuation
                | Self::ArgumentList
                | Self::ArgumentsOrRedirectionsList
                | Self::CaseItemList
        )
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// KEYWORDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseKeyword {
    If,
    Else,
    For,
    In,
    While,
    Begin,
    Function,
    Switch,
    Case,
    End,
    And,
    Or,
    Not,
    Command,
    Builtin,
    Exec,
}

lazy_static::lazy_static! {
    /// Reserved words in fish
    static ref KEYWORDS: HashMap<&'static str, ParseKeyword> = {
        let mut m = HashMap::new();
        m.insert("if", ParseKeyword::If);
        m.insert("else", ParseKeyword::Else);
        m.insert("for", ParseKeyword::For);
        m.insert("in", ParseKeyword::In);
        m.insert("while", ParseKeyword::While);
        m.insert("begin", ParseKeyword::Begin);
        m.insert("function", ParseKeyword::Function);
        m.insert("switch", ParseKeyword::Switch);
        m.insert("case", ParseKeyword::Case);
        m.insert("end", ParseKeyword::End);
        m.insert("and", ParseKeyword::And);
        m.insert("or", ParseKeyword::Or);
        m.insert("not", ParseKeyword::Not);
        m.insert("command", ParseKeyword::Command);
        m.insert("builtin", ParseKeyword::Builtin);
        m.insert("exec", ParseKeyword::Exec);
        m
    };
}

impl ParseKeyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Else => "else",
            Self::For => "for",
            Self::In => "in",
            Self::While => "while",
            Self::Begin => "begin",
            Self::Function => "function",
            Self::Switch => "switch",
            Self::Case => "case",
            Self::End => "end",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Command => "command",
            Self::Builtin => "builtin",
            Self::Exec => "exec",
        }
    }

    /// The keyword a token's text spells, if any.
    ///
    /// Only tokens made of lowercase letters and quotes qualify, so `'if'`
    /// is a keyword but `\if` and `IF` are not.
    pub fn from_token_text(text: &str) -> Option<Self> {
        if text.is_empty()
            || !text
                .bytes()
                .all(|c| c.is_ascii_lowercase() || c == b'\'' || c == b'"')
        {
            return None;
        }
        if text.contains(['\'', '"']) {
            let unquoted: String = text.chars().filter(|c| *c != '\'' && *c != '"').collect();
            return KEYWORDS.get(unquoted.as_str()).copied();
        }
        KEYWORDS.get(text).copied()
    }

    pub fn is_decoration(&self) -> bool {
        matches!(self, Self::Command | Self::Builtin | Self::Exec)
    }
}

impl fmt::Display for ParseKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STATEMENT TAGS
// =============================================================================

/// How the leading word of a statement resolves at execution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoration {
    #[default]
    None,
    Command,
    Builtin,
    Exec,
}

impl Decoration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Command => "command",
            Self::Builtin => "builtin",
            Self::Exec => "exec",
        }
    }
}

impl From<ParseKeyword> for Decoration {
    fn from(keyword: ParseKeyword) -> Self {
        match keyword {
            ParseKeyword::Command => Self::Command,
            ParseKeyword::Builtin => Self::Builtin,
            ParseKeyword::Exec => Self::Exec,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolStatementType {
    And,
    Or,
    Not,
}

impl BoolStatementType {
    pub fn from_keyword(keyword: ParseKeyword) -> Option<Self> {
        match keyword {
            ParseKeyword::And => Some(Self::And),
            ParseKeyword::Or => Some(Self::Or),
            ParseKeyword::Not => Some(Self::Not),
            _ => None,
        }
    }
}

/// Extra production detail carried by statement nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTag {
    #[default]
    None,
    Decoration(Decoration),
    Bool(BoolStatementType),
}

// =============================================================================
// NODES
// =============================================================================

/// Byte range in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourceRange {
    pub start: usize,
    pub length: usize,
}

impl SourceRange {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn contains(&self, other: &SourceRange) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// Whether `offset` lies in the range; the end offset counts
    pub fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.start && offset <= self.end()
    }

    /// Smallest range covering both
    pub fn union(&self, other: &SourceRange) -> SourceRange {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        SourceRange::new(start, end - start)
    }
}

/// One grammar symbol instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub symbol: Symbol,
    /// `None` for nodes cut short by an error before receiving anything
    pub range: Option<SourceRange>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    #[serde(skip_serializing_if = "is_untagged")]
    pub tag: NodeTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<ParseKeyword>,
    /// Comments are parented to this node without being children
    pub has_comments: bool,
}

fn is_untagged(tag: &NodeTag) -> bool {
    *tag == NodeTag::None
}

impl Node {
    pub fn new(symbol: Symbol, parent: Option<NodeId>) -> Self {
        Self {
            symbol,
            range: None,
            parent,
            children: Vec::new(),
            tag: NodeTag::None,
            keyword: None,
            has_comments: false,
        }
    }

    pub fn has_source(&self) -> bool {
        self.range.is_some()
    }

    pub fn source_start(&self) -> Option<usize> {
        self.range.map(|r| r.start)
    }

    pub fn source_length(&self) -> usize {
        self.range.map_or(0, |r| r.length)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn decoration(&self) -> Decoration {
        match self.tag {
            NodeTag::Decoration(decoration) => decoration,
            _ => Decoration::None,
        }
    }

    pub fn bool_type(&self) -> Option<BoolStatementType> {
        match self.tag {
            NodeTag::Bool(kind) => Some(kind),
            _ => None,
        }
    }
}
