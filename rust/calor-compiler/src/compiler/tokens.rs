use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location in the original `.calr` file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start in the source
    pub start: usize,
    /// Byte offset of the end (exclusive) in the source
    pub end: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column number
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self { start, end, line, col }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0, line: 0, col: 0 }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn merge(self, other: Span) -> Span {
        let (line, col) = if (self.line, self.col) <= (other.line, other.col) {
            (self.line, self.col)
        } else {
            (other.line, other.col)
        };
        Span { start: self.start.min(other.start), end: self.end.max(other.end), line, col }
    }
}

/// Token types for the Calor surface language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Structural tags
    /// `§NAME`
    Tag(String),
    /// `§/NAME`
    CloseTag(String),
    /// `{a:b:c}` directly after a tag, split on `:`
    Attrs(Vec<String>),

    // Literals
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),
    BoolLit(bool),
    Null,

    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,       // ==
    NotEq,    // !=
    Lt,       // <
    LtEq,     // <=
    Gt,       // >
    GtEq,     // >=
    AndAnd,   // &&
    OrOr,     // ||
    Bang,     // !
    Amp,      // &
    Pipe,     // |
    Caret,    // ^
    Tilde,    // ~
    Shl,      // <<
    Shr,      // >>
    Coalesce, // ??
    Question, // ?
    Implies,  // =>
    Arrow,    // → or ->

    // Punctuation
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,

    Eof,
}

impl TokenKind {
    pub fn is_tag(&self, name: &str) -> bool {
        matches!(self, TokenKind::Tag(t) if t == name)
    }

    pub fn is_close_tag(&self, name: &str) -> bool {
        matches!(self, TokenKind::CloseTag(t) if t == name)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Tag(t) => write!(f, "§{}", t),
            TokenKind::CloseTag(t) => write!(f, "§/{}", t),
            TokenKind::Attrs(a) => write!(f, "{{{}}}", a.join(":")),
            TokenKind::IntLit(n) => write!(f, "{}", n),
            TokenKind::FloatLit(n) => write!(f, "{}", n),
            TokenKind::StringLit(s) => write!(f, "\"{}\"", s),
            TokenKind::BoolLit(b) => write!(f, "{}", b),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Eq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::OrOr => write!(f, "||"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Amp => write!(f, "&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Tilde => write!(f, "~"),
            TokenKind::Shl => write!(f, "<<"),
            TokenKind::Shr => write!(f, ">>"),
            TokenKind::Coalesce => write!(f, "??"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::Implies => write!(f, "=>"),
            TokenKind::Arrow => write!(f, "→"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its decoded lexeme, source slice and location.
///
/// `text` is what the token means: string literals unescaped, attribute
/// blocks as their fields joined by `:` without braces. `raw` is the exact
/// source slice covered by `span`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub raw: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        let text = text.into();
        Self { kind, raw: text.clone(), text, span }
    }

    /// Token whose decoded lexeme is derived from `kind`, falling back to `raw`.
    pub fn decoded(kind: TokenKind, raw: impl Into<String>, span: Span) -> Self {
        let raw = raw.into();
        let text = match &kind {
            TokenKind::StringLit(s) => s.clone(),
            TokenKind::Attrs(fields) => fields.join(":"),
            _ => raw.clone(),
        };
        Self { kind, text, raw, span }
    }
}
