//! Tokenizer for fish scripts
//!
//! The tokenizer turns source text into a pull-style stream of tokens that
//! the parser consumes. It handles:
//! - Words (with quoting, escapes, command substitutions and slices)
//! - Statement terminators, pipes and background operators
//! - Redirections, including fd duplication and fd pipes like `2>|`
//! - Comments and blank-line collapsing
//!
//! Lexical errors are not fatal to the caller: the tokenizer emits exactly
//! one `Error` token covering the rest of the input and then stops.

use serde::Serialize;
use tracing::trace;

/// Token types produced by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Word,
    Pipe,       // |, 2>|
    Background, // &
    End,        // ; or newline

    // Redirections
    RedirectIn,        // <
    RedirectOut,       // > or ^
    RedirectAppend,    // >> or ^^
    RedirectNoClobber, // >?
    RedirectFd,        // >&N, <&N, >&-

    Comment,
    Error,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "string",
            Self::Pipe => "pipe",
            Self::Background => "background",
            Self::End => "end of the statement",
            Self::RedirectIn => "redirection in",
            Self::RedirectOut => "redirection out",
            Self::RedirectAppend => "append redirection",
            Self::RedirectNoClobber => "noclobber redirection",
            Self::RedirectFd => "fd redirection",
            Self::Comment => "comment",
            Self::Error => "tokenizer error",
        }
    }

    pub fn is_redirection(&self) -> bool {
        matches!(
            self,
            Self::RedirectIn
                | Self::RedirectOut
                | Self::RedirectAppend
                | Self::RedirectNoClobber
                | Self::RedirectFd
        )
    }
}

/// Where an fd-duplicating redirection points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Fd(i32),
    /// `>&-`
    Close,
}

/// Kinds of lexical errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerErrorKind {
    UnterminatedQuote,
    UnterminatedSubshell,
    UnterminatedSlice,
    UnterminatedEscape,
    InvalidRedirect,
    InvalidPipe,
}

impl TokenizerErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnterminatedQuote => "Unexpected end of string, quotes are not balanced",
            Self::UnterminatedSubshell => {
                "Unexpected end of string, parenthesis do not match"
            }
            Self::UnterminatedSlice => {
                "Unexpected end of string, square brackets do not match"
            }
            Self::UnterminatedEscape => "Unexpected end of string, incomplete escape sequence",
            Self::InvalidRedirect => "Invalid input/output redirection",
            Self::InvalidPipe => "Cannot use stdin (fd 0) as pipe output",
        }
    }
}

/// A lexical error with its absolute byte offset in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenizerError {
    pub kind: TokenizerErrorKind,
    pub offset: usize,
}

/// A token produced by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub token_type: TokenType,
    /// Byte offset of the first character
    pub offset: usize,
    pub length: usize,
    /// Descriptor being redirected or piped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fd: Option<i32>,
    /// Target of an fd redirection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<RedirectTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TokenizerError>,
}

impl Token {
    pub fn new(token_type: TokenType, offset: usize, length: usize) -> Self {
        Self {
            token_type,
            offset,
            length,
            fd: None,
            target: None,
            error: None,
        }
    }

    pub fn with_fd(mut self, fd: i32) -> Self {
        self.fd = Some(fd);
        self
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// The source text this token covers
    pub fn text<'s>(&self, src: &'s str) -> &'s str {
        src.get(self.offset..self.end()).unwrap_or("")
    }
}

/// Tokenizer behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenizerOptions {
    /// Emit `Comment` tokens instead of skipping comments
    pub show_comments: bool,
    /// Emit one `End` per newline instead of collapsing blank lines
    pub show_blank_lines: bool,
    /// Treat unterminated quotes, substitutions, slices and escapes as
    /// words running to the end of input
    pub accept_unfinished: bool,
}

/// Result of the redirection sub-scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectionScan {
    /// One of the redirection types, or `Pipe` for `N>|`
    pub token_type: TokenType,
    pub fd: i32,
    pub target: Option<RedirectTarget>,
    /// Number of bytes the lexeme occupies
    pub consumed: usize,
}

/// Parse a run of decimal digits into an i32, rejecting overflow
fn parse_descriptor(digits: &str) -> Option<i32> {
    digits.parse::<i32>().ok()
}

/// Classify a lexeme of the shape `[N]<`, `[N]>`, `^`, `[N]>>`, `[N]>?`,
/// `[N]>&M`, `[N]>&-` or `[N]>|`.
///
/// Returns `None` when the text does not start with a redirection or when
/// a descriptor overflows.
pub fn read_redirection_or_fd_pipe(text: &str) -> Option<RedirectionScan> {
    let bytes = text.as_bytes();
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();

    let fd = if digits == 0 {
        match bytes.first()? {
            b'>' => 1,
            b'<' => 0,
            b'^' => 2,
            _ => return None,
        }
    } else {
        parse_descriptor(&text[..digits])?
    };

    let mut idx = digits;
    let redirect_char = *bytes.get(idx)?;
    idx += 1;

    let mut token_type = match redirect_char {
        b'>' => TokenType::RedirectOut,
        // ^ only stands for stderr when there is no explicit fd
        b'^' if digits == 0 => TokenType::RedirectOut,
        b'<' => TokenType::RedirectIn,
        _ => return None,
    };
    if token_type == TokenType::RedirectOut && bytes.get(idx) == Some(&redirect_char) {
        token_type = TokenType::RedirectAppend;
        idx += 1;
    }

    let mut target = None;
    match bytes.get(idx) {
        Some(b'&') => {
            idx += 1;
            let target_digits = bytes[idx..].iter().take_while(|b| b.is_ascii_digit()).count();
            if target_digits > 0 {
                target = Some(RedirectTarget::Fd(parse_descriptor(
                    &text[idx..idx + target_digits],
                )?));
                idx += target_digits;
            } else if bytes.get(idx) == Some(&b'-') {
                target = Some(RedirectTarget::Close);
                idx += 1;
            } else {
                return None;
            }
            token_type = TokenType::RedirectFd;
        }
        Some(b'?') => {
            idx += 1;
            token_type = TokenType::RedirectNoClobber;
        }
        Some(b'|') if redirect_char != b'<' => {
            idx += 1;
            token_type = TokenType::Pipe;
        }
        _ => {}
    }

    Some(RedirectionScan {
        token_type,
        fd,
        target,
        consumed: idx,
    })
}

/// Redirection type of a whole string, or `None` if it is not exactly a
/// redirection. Pipes like `2>|` are not redirections.
pub fn redirection_type_for_string(text: &str) -> Option<TokenType> {
    read_redirection_or_fd_pipe(text)
        .filter(|scan| scan.consumed == text.len() && scan.token_type != TokenType::Pipe)
        .map(|scan| scan.token_type)
}

/// The descriptor a pipe string like `|` or `2>|` redirects, if any
pub fn fd_redirected_by_pipe(text: &str) -> Option<i32> {
    if text == "|" {
        return Some(1);
    }
    read_redirection_or_fd_pipe(text)
        .filter(|scan| scan.consumed == text.len() && scan.token_type == TokenType::Pipe)
        .map(|scan| scan.fd)
}

/// Whether an argument is a request for help
pub fn is_help_argument(text: &str) -> bool {
    text == "-h" || text == "--help"
}

/// Check if a byte may appear in an unquoted word
fn is_string_char(c: u8, is_first: bool) -> bool {
    match c {
        b' ' | b'\t' | b'\r' | b'\n' | b'|' | b';' | b'&' | b'<' | b'>' => false,
        b'^' => !is_first,
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordMode {
    Regular,
    Subshell,
    Slice,
    SliceSubshell,
}

/// Tokenizer over a complete source buffer
pub struct Tokenizer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    options: TokenizerOptions,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str, options: TokenizerOptions) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            options,
            finished: false,
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    /// Current scan position
    pub fn position(&self) -> usize {
        self.pos
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.current() {
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\\' if self.peek(1) == Some(b'\n') => self.pos += 2,
                _ => break,
            }
        }
    }

    /// Swallow whitespace-only lines following a terminator
    fn swallow_blank_lines(&mut self) {
        while let Some(c) = self.current() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'\\' if self.peek(1) == Some(b'\n') => self.pos += 2,
                _ => break,
            }
        }
    }

    fn error(&mut self, kind: TokenizerErrorKind, token_start: usize, offset: usize) -> Token {
        trace!(?kind, offset, "tokenizer error");
        self.finished = true;
        self.pos = self.bytes.len();
        let mut token = Token::new(TokenType::Error, token_start, self.bytes.len() - token_start);
        token.error = Some(TokenizerError { kind, offset });
        token
    }

    fn next_token(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }

        loop {
            self.skip_separators();
            let start = self.pos;
            let c = match self.current() {
                Some(c) => c,
                None => {
                    self.finished = true;
                    return None;
                }
            };

            match c {
                b'#' => {
                    while let Some(c) = self.current() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                    if self.options.show_comments {
                        return Some(Token::new(TokenType::Comment, start, self.pos - start));
                    }
                }
                b'\n' | b';' => {
                    self.pos += 1;
                    if !self.options.show_blank_lines {
                        self.swallow_blank_lines();
                    }
                    return Some(Token::new(TokenType::End, start, 1));
                }
                b'&' => {
                    self.pos += 1;
                    return Some(Token::new(TokenType::Background, start, 1));
                }
                b'|' => {
                    self.pos += 1;
                    return Some(Token::new(TokenType::Pipe, start, 1).with_fd(1));
                }
                b'<' | b'>' | b'^' => {
                    // A failed redirection here can never be a word
                    return Some(match read_redirection_or_fd_pipe(&self.src[start..]) {
                        Some(scan) => self.redirection_token(start, scan),
                        None => self.error(TokenizerErrorKind::InvalidRedirect, start, start),
                    });
                }
                b'0'..=b'9' => {
                    if let Some(scan) = read_redirection_or_fd_pipe(&self.src[start..]) {
                        if scan.token_type == TokenType::Pipe && scan.fd == 0 {
                            return Some(self.error(TokenizerErrorKind::InvalidPipe, start, start));
                        }
                        return Some(self.redirection_token(start, scan));
                    }
                    return Some(self.read_word());
                }
                _ => return Some(self.read_word()),
            }
        }
    }

    fn redirection_token(&mut self, start: usize, scan: RedirectionScan) -> Token {
        self.pos = start + scan.consumed;
        let mut token = Token::new(scan.token_type, start, scan.consumed).with_fd(scan.fd);
        token.target = scan.target;
        token
    }

    /// Index of the quote closing the one at `open`, if any
    fn quote_end(&self, open: usize) -> Option<usize> {
        let quote = self.bytes[open];
        let mut i = open + 1;
        while i < self.bytes.len() {
            let c = self.bytes[i];
            if c == quote {
                return Some(i);
            }
            // Single quotes suspend escape processing entirely
            if quote == b'"' && c == b'\\' {
                i += 2;
                continue;
            }
            i += 1;
        }
        None
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        let len = self.bytes.len();
        let mut mode = WordMode::Regular;
        let mut paren_count = 0usize;
        let mut paren_offset = start;
        let mut slice_offset = start;

        while self.pos < len {
            let c = self.bytes[self.pos];

            if c == b'\\' {
                if self.pos + 1 >= len {
                    if self.options.accept_unfinished {
                        self.pos = len;
                        break;
                    }
                    let offset = self.pos;
                    return self.error(TokenizerErrorKind::UnterminatedEscape, start, offset);
                }
                self.pos += 2;
                continue;
            }

            if c == b'\'' || c == b'"' {
                match self.quote_end(self.pos) {
                    Some(end) => {
                        self.pos = end + 1;
                        continue;
                    }
                    None if self.options.accept_unfinished => {
                        self.pos = len;
                        break;
                    }
                    None => {
                        let offset = self.pos;
                        return self.error(TokenizerErrorKind::UnterminatedQuote, start, offset);
                    }
                }
            }

            match mode {
                WordMode::Regular => match c {
                    b'(' => {
                        paren_count = 1;
                        paren_offset = self.pos;
                        mode = WordMode::Subshell;
                    }
                    // A leading [ is the test command, not a slice
                    b'[' if self.pos != start => {
                        slice_offset = self.pos;
                        mode = WordMode::Slice;
                    }
                    _ => {
                        if !is_string_char(c, self.pos == start) {
                            break;
                        }
                    }
                },
                WordMode::Subshell | WordMode::SliceSubshell => match c {
                    b'(' => paren_count += 1,
                    b')' => {
                        paren_count -= 1;
                        if paren_count == 0 {
                            mode = if mode == WordMode::SliceSubshell {
                                WordMode::Slice
                            } else {
                                WordMode::Regular
                            };
                        }
                    }
                    _ => {}
                },
                WordMode::Slice => match c {
                    b'(' => {
                        paren_count = 1;
                        paren_offset = self.pos;
                        mode = WordMode::SliceSubshell;
                    }
                    b']' => mode = WordMode::Regular,
                    _ => {}
                },
            }
            self.pos += 1;
        }

        if !self.options.accept_unfinished {
            match mode {
                WordMode::Regular => {}
                WordMode::Subshell | WordMode::SliceSubshell => {
                    return self.error(TokenizerErrorKind::UnterminatedSubshell, start, paren_offset);
                }
                WordMode::Slice => {
                    return self.error(TokenizerErrorKind::UnterminatedSlice, start, slice_offset);
                }
            }
        }

        Token::new(TokenType::Word, start, self.pos - start)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Tokenize an entire buffer
pub fn tokenize(src: &str, options: TokenizerOptions) -> Vec<Token> {
    Tokenizer::new(src, options).collect()
}

/// The first word of a string, or an empty string if it has none
pub fn tok_first(src: &str) -> String {
    Tokenizer::new(src, TokenizerOptions::default())
        .find(|t| t.token_type == TokenType::Word)
        .map(|t| t.text(src).to_string())
        .unwrap_or_default()
}
