//! Error-recovering lexer for Calor source code.
//!
//! The lexer never stops at the first problem: bad characters, unterminated
//! strings and malformed literals are recorded and skipped so a single pass
//! surfaces every lexical error. The token stream always ends with `Eof`.

use crate::compiler::tokens::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },
    #[error("unterminated string literal")]
    UnterminatedString { span: Span },
    #[error("invalid escape sequence '\\{ch}'")]
    InvalidEscape { ch: char, span: Span },
    #[error("malformed literal '{text}'")]
    MalformedLiteral { text: String, span: Span },
    #[error("unterminated attribute block")]
    UnterminatedAttributes { span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::InvalidEscape { span, .. }
            | LexError::MalformedLiteral { span, .. }
            | LexError::UnterminatedAttributes { span } => *span,
        }
    }
}

/// Tokens plus every lexical error encountered on the way.
#[derive(Debug, Clone)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

const TYPED_LITERAL_PREFIXES: &[&str] = &["INT", "FLOAT", "BOOL", "STR"];

pub struct Lexer<'src> {
    raw: &'src str,
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            raw: source,
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            byte_offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn current(&self) -> Option<char> { self.source.get(self.pos).copied() }
    fn peek(&self) -> Option<char> { self.source.get(self.pos + 1).copied() }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' { self.line += 1; self.col = 1; } else { self.col += 1; }
        Some(ch)
    }

    fn mark(&self) -> (usize, usize, usize) {
        (self.byte_offset, self.line, self.col)
    }

    fn span_from(&self, (so, sl, sc): (usize, usize, usize)) -> Span {
        Span::new(so, self.byte_offset, sl, sc)
    }

    fn push(&mut self, kind: TokenKind, start: (usize, usize, usize)) {
        let span = self.span_from(start);
        let raw = &self.raw[span.start..span.end];
        self.tokens.push(Token::decoded(kind, raw, span));
    }

    /// Consume characters up to the next token boundary. Used to recover
    /// from malformed literals without emitting a cascade of errors.
    fn skip_run(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '[' | ']' | '§' | ',') {
                break;
            }
            self.advance();
        }
    }

    fn malformed(&mut self, start: (usize, usize, usize)) {
        self.skip_run();
        let span = self.span_from(start);
        let text = self.raw[span.start..span.end].to_string();
        self.errors.push(LexError::MalformedLiteral { text, span });
    }

    fn read_tag(&mut self) {
        let start = self.mark();
        self.advance(); // §
        let closing = if self.current() == Some('/') { self.advance(); true } else { false };
        let mut name = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_uppercase() { name.push(ch); self.advance(); } else { break; }
        }
        if name.is_empty() {
            let span = self.span_from(start);
            self.errors.push(LexError::UnexpectedChar { ch: '§', span });
            return;
        }
        let kind = if closing { TokenKind::CloseTag(name) } else { TokenKind::Tag(name) };
        self.push(kind, start);
        if self.current() == Some('{') {
            self.read_attrs();
        }
    }

    fn read_attrs(&mut self) {
        let start = self.mark();
        self.advance(); // {
        let mut body = String::new();
        loop {
            match self.current() {
                None | Some('\n') => {
                    let span = self.span_from(start);
                    self.errors.push(LexError::UnterminatedAttributes { span });
                    return;
                }
                Some('}') => { self.advance(); break; }
                Some(c) => { body.push(c); self.advance(); }
            }
        }
        let fields = if body.trim().is_empty() {
            Vec::new()
        } else {
            body.split(':').map(|f| f.trim().to_string()).collect()
        };
        self.push(TokenKind::Attrs(fields), start);
    }

    /// Reads a string literal starting at the opening quote. Returns `None`
    /// when the literal is unterminated; the rest of the line is skipped.
    fn read_string_body(&mut self) -> Option<String> {
        let start = self.mark();
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current() {
                None | Some('\n') => {
                    let span = self.span_from(start);
                    self.errors.push(LexError::UnterminatedString { span });
                    return None;
                }
                Some('\\') => {
                    let esc_start = self.mark();
                    self.advance();
                    match self.current() {
                        Some('n') => { s.push('\n'); self.advance(); }
                        Some('r') => { s.push('\r'); self.advance(); }
                        Some('t') => { s.push('\t'); self.advance(); }
                        Some('\\') => { s.push('\\'); self.advance(); }
                        Some('"') => { s.push('"'); self.advance(); }
                        Some(c) if c != '\n' => {
                            self.advance();
                            let span = self.span_from(esc_start);
                            self.errors.push(LexError::InvalidEscape { ch: c, span });
                            s.push(c);
                        }
                        _ => {
                            let span = self.span_from(start);
                            self.errors.push(LexError::UnterminatedString { span });
                            return None;
                        }
                    }
                }
                Some('"') => { self.advance(); return Some(s); }
                Some(c) => { s.push(c); self.advance(); }
            }
        }
    }

    fn read_string(&mut self) {
        let start = self.mark();
        if let Some(s) = self.read_string_body() {
            self.push(TokenKind::StringLit(s), start);
        }
    }

    fn read_digits(&mut self, radix: u32) -> String {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_digit(radix) { digits.push(ch); self.advance(); }
            else if ch == '_' { self.advance(); }
            else { break; }
        }
        digits
    }

    /// Parses a numeric literal at the cursor; `negative` has already been
    /// consumed by the caller for typed literals.
    fn read_number(&mut self, start: (usize, usize, usize), negative: bool, float_only: bool) {
        if self.current() == Some('0') && matches!(self.peek(), Some('x' | 'X')) && !float_only {
            self.advance();
            self.advance();
            let digits = self.read_digits(16);
            if digits.is_empty() || self.current().is_some_and(|c| c.is_alphanumeric()) {
                return self.malformed(start);
            }
            return match i64::from_str_radix(&digits, 16) {
                Ok(v) => self.push(TokenKind::IntLit(if negative { -v } else { v }), start),
                Err(_) => self.malformed(start),
            };
        }
        let int_part = self.read_digits(10);
        if int_part.is_empty() {
            return self.malformed(start);
        }
        let mut is_float = float_only;
        let mut text = int_part;
        if self.current() == Some('.') && self.peek().is_some_and(|d| d.is_ascii_digit()) {
            self.advance();
            is_float = true;
            text.push('.');
            text.push_str(&self.read_digits(10));
        }
        if self.current().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return self.malformed(start);
        }
        if negative {
            text.insert(0, '-');
        }
        if is_float {
            match text.parse::<f64>() {
                Ok(f) => self.push(TokenKind::FloatLit(f), start),
                Err(_) => self.malformed(start),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => self.push(TokenKind::IntLit(n), start),
                Err(_) => self.malformed(start),
            }
        }
    }

    fn read_typed_literal(&mut self, prefix: &str, start: (usize, usize, usize)) {
        self.advance(); // ':'
        match prefix {
            "INT" | "FLOAT" => {
                let negative = if self.current() == Some('-') { self.advance(); true } else { false };
                if !self.current().is_some_and(|c| c.is_ascii_digit()) {
                    return self.malformed(start);
                }
                self.read_number(start, negative, prefix == "FLOAT");
                if prefix == "INT" {
                    if let Some(Token { kind: TokenKind::FloatLit(_), .. }) = self.tokens.last() {
                        let tok = self.tokens.pop();
                        let span = tok.map(|t| t.span).unwrap_or_else(|| self.span_from(start));
                        let text = self.raw[span.start..span.end].to_string();
                        self.errors.push(LexError::MalformedLiteral { text, span });
                    }
                }
            }
            "BOOL" => {
                let mut word = String::new();
                while let Some(ch) = self.current() {
                    if ch.is_alphanumeric() { word.push(ch); self.advance(); } else { break; }
                }
                match word.as_str() {
                    "true" => self.push(TokenKind::BoolLit(true), start),
                    "false" => self.push(TokenKind::BoolLit(false), start),
                    _ => self.malformed(start),
                }
            }
            _ => {
                if self.current() != Some('"') {
                    return self.malformed(start);
                }
                if let Some(s) = self.read_string_body() {
                    self.push(TokenKind::StringLit(s), start);
                }
            }
        }
    }

    fn read_ident(&mut self) {
        let start = self.mark();
        let mut id = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' { id.push(ch); self.advance(); } else { break; }
        }
        if self.current() == Some(':') && TYPED_LITERAL_PREFIXES.contains(&id.as_str()) {
            return self.read_typed_literal(&id, start);
        }
        let kind = match id.as_str() {
            "true" => TokenKind::BoolLit(true),
            "false" => TokenKind::BoolLit(false),
            "null" => TokenKind::Null,
            _ => TokenKind::Ident(id),
        };
        self.push(kind, start);
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.mark();
        self.advance();
        self.push(kind, start);
    }

    /// Consumes one char, then a second one if it is `second`.
    fn one_or_two(&mut self, second: char, matched: TokenKind, single: TokenKind) {
        let start = self.mark();
        self.advance();
        if self.current() == Some(second) {
            self.advance();
            self.push(matched, start);
        } else {
            self.push(single, start);
        }
    }

    pub fn tokenize(mut self) -> LexOutput {
        while let Some(ch) = self.current() {
            match ch {
                c if c.is_whitespace() => { self.advance(); }
                '/' if self.peek() == Some('/') => {
                    while matches!(self.current(), Some(c) if c != '\n') { self.advance(); }
                }
                '§' => self.read_tag(),
                '"' => self.read_string(),
                '0'..='9' => { let start = self.mark(); self.read_number(start, false, false); }
                c if c.is_alphabetic() || c == '_' => self.read_ident(),
                '+' => self.single(TokenKind::Plus),
                '*' => self.single(TokenKind::Star),
                '/' => self.single(TokenKind::Slash),
                '%' => self.single(TokenKind::Percent),
                '^' => self.single(TokenKind::Caret),
                '~' => self.single(TokenKind::Tilde),
                '→' => self.single(TokenKind::Arrow),
                '.' => self.single(TokenKind::Dot),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '-' => self.one_or_two('>', TokenKind::Arrow, TokenKind::Minus),
                '!' => self.one_or_two('=', TokenKind::NotEq, TokenKind::Bang),
                '&' => self.one_or_two('&', TokenKind::AndAnd, TokenKind::Amp),
                '|' => self.one_or_two('|', TokenKind::OrOr, TokenKind::Pipe),
                '?' => self.one_or_two('?', TokenKind::Coalesce, TokenKind::Question),
                '<' => {
                    let start = self.mark();
                    self.advance();
                    match self.current() {
                        Some('<') => { self.advance(); self.push(TokenKind::Shl, start); }
                        Some('=') => { self.advance(); self.push(TokenKind::LtEq, start); }
                        _ => self.push(TokenKind::Lt, start),
                    }
                }
                '>' => {
                    let start = self.mark();
                    self.advance();
                    match self.current() {
                        Some('>') => { self.advance(); self.push(TokenKind::Shr, start); }
                        Some('=') => { self.advance(); self.push(TokenKind::GtEq, start); }
                        _ => self.push(TokenKind::Gt, start),
                    }
                }
                '=' => {
                    let start = self.mark();
                    self.advance();
                    match self.current() {
                        Some('=') => { self.advance(); self.push(TokenKind::Eq, start); }
                        Some('>') => { self.advance(); self.push(TokenKind::Implies, start); }
                        _ => {
                            let span = self.span_from(start);
                            self.errors.push(LexError::UnexpectedChar { ch: '=', span });
                        }
                    }
                }
                _ => {
                    let start = self.mark();
                    self.advance();
                    let span = self.span_from(start);
                    self.errors.push(LexError::UnexpectedChar { ch, span });
                }
            }
        }
        let eof = Span::new(self.byte_offset, self.byte_offset, self.line, self.col);
        self.tokens.push(Token::new(TokenKind::Eof, "", eof));
        LexOutput { tokens: self.tokens, errors: self.errors }
    }
}

/// Convenience wrapper around [`Lexer::tokenize`].
pub fn lex(source: &str) -> LexOutput {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_tags_with_attrs() {
        let k = kinds("§F{f001:Add:pub} §/F{f001}");
        assert_eq!(k[0], TokenKind::Tag("F".into()));
        assert_eq!(k[1], TokenKind::Attrs(vec!["f001".into(), "Add".into(), "pub".into()]));
        assert_eq!(k[2], TokenKind::CloseTag("F".into()));
        assert_eq!(k[3], TokenKind::Attrs(vec!["f001".into()]));
        assert_eq!(k[4], TokenKind::Eof);

        let out = lex("§F{ f001 : Add }");
        assert_eq!(out.tokens[1].text, "f001:Add");
        assert_eq!(out.tokens[1].raw, "{ f001 : Add }");
    }

    #[test]
    fn test_lex_operators() {
        let k = kinds("(+ a b) (a <= b) (?? x y) (=> p q) ->");
        assert!(k.contains(&TokenKind::Plus));
        assert!(k.contains(&TokenKind::LtEq));
        assert!(k.contains(&TokenKind::Coalesce));
        assert!(k.contains(&TokenKind::Implies));
        assert!(k.contains(&TokenKind::Arrow));
    }

    #[test]
    fn test_lex_string_escapes() {
        let out = lex(r#""a\tb\n\"q\"\\""#);
        assert!(out.errors.is_empty());
        assert_eq!(out.tokens[0].kind, TokenKind::StringLit("a\tb\n\"q\"\\".into()));
        assert_eq!(out.tokens[0].text, "a\tb\n\"q\"\\");
        assert_eq!(out.tokens[0].raw, r#""a\tb\n\"q\"\\""#);
    }

    #[test]
    fn test_invalid_escape_reported_per_occurrence() {
        let out = lex(r#""\q and \z""#);
        assert_eq!(out.errors.len(), 2);
        assert!(matches!(out.errors[0], LexError::InvalidEscape { ch: 'q', .. }));
        assert!(matches!(out.tokens[0].kind, TokenKind::StringLit(_)));
    }

    #[test]
    fn test_unterminated_string_recovers() {
        let out = lex("\"oops\nx");
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(out.errors[0], LexError::UnterminatedString { .. }));
        assert_eq!(out.tokens[0].kind, TokenKind::Ident("x".into()));
    }

    #[test]
    fn test_unknown_chars_do_not_abort() {
        let out = lex("a @ b $ c");
        assert_eq!(out.errors.len(), 2);
        let idents = out.tokens.iter().filter(|t| matches!(t.kind, TokenKind::Ident(_))).count();
        assert_eq!(idents, 3);
        assert_eq!(out.tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_typed_literals() {
        let k = kinds(r#"INT:42 INT:-7 FLOAT:1.5 BOOL:true STR:"s""#);
        assert_eq!(&k[..5], &[
            TokenKind::IntLit(42),
            TokenKind::IntLit(-7),
            TokenKind::FloatLit(1.5),
            TokenKind::BoolLit(true),
            TokenKind::StringLit("s".into()),
        ]);
    }

    #[test]
    fn test_malformed_typed_literal() {
        let out = lex("INT:abc BOOL:maybe 5");
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors.iter().all(|e| matches!(e, LexError::MalformedLiteral { .. })));
        assert_eq!(out.tokens[0].kind, TokenKind::IntLit(5));
    }

    #[test]
    fn test_hex_and_separators() {
        assert_eq!(kinds("0xFF 1_000")[..2], [TokenKind::IntLit(255), TokenKind::IntLit(1000)]);
    }

    #[test]
    fn test_token_text_and_span() {
        let out = lex("§R  foo");
        let ident = &out.tokens[1];
        assert_eq!(ident.text, "foo");
        assert_eq!(ident.span.col, 5);
        assert_eq!(ident.span.line, 1);
    }

    #[test]
    fn test_unterminated_attrs() {
        let out = lex("§F{f001:Main\n§/F{f001}");
        assert!(matches!(out.errors[0], LexError::UnterminatedAttributes { .. }));
    }

    #[test]
    fn test_comments_skipped() {
        let k = kinds("// hello\nx // trailing");
        assert_eq!(k, vec![TokenKind::Ident("x".into()), TokenKind::Eof]);
    }
}
