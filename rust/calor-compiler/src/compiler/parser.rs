//! Recursive descent parser for Calor, with Pratt parsing for the infix
//! operator form.
//!
//! The parser never aborts: unexpected tokens are recorded and the parser
//! resynchronises on the next tag, unclosed structures are reported at the
//! opening tag, and a partial tree is always returned alongside the errors.

use crate::compiler::ast::*;
use crate::compiler::fixit::{closing_id_fix, FixitHint};
use crate::compiler::lexer::{lex, LexError};
use crate::compiler::tokens::{Span, Token, TokenKind};
use crate::compiler::types::{parse_type, Type};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected {found}; expected {expected}")]
    Unexpected { found: String, expected: String, span: Span },
    #[error("unexpected end of input; expected {expected}")]
    UnexpectedEof { expected: String, span: Span },
    #[error("closing tag §/{tag} has ID '{close_id}' but the opening tag has '{open_id}'")]
    MismatchedId { tag: String, open_id: String, close_id: String, span: Span, fix: FixitHint },
    #[error("unclosed {construct}; expected {expected}")]
    Unclosed { construct: String, expected: String, span: Span },
    #[error("§{tag} is missing its {attribute} attribute")]
    MissingAttribute { tag: String, attribute: String, span: Span },
    #[error("invalid type '{text}'")]
    InvalidType { text: String, span: Span },
    #[error("invalid {what} '{value}' on §{tag}")]
    InvalidAttribute { tag: String, what: String, value: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Unexpected { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::MismatchedId { span, .. }
            | ParseError::Unclosed { span, .. }
            | ParseError::MissingAttribute { span, .. }
            | ParseError::InvalidType { span, .. }
            | ParseError::InvalidAttribute { span, .. } => *span,
        }
    }

    pub fn fixit(&self) -> Option<&FixitHint> {
        match self {
            ParseError::MismatchedId { fix, .. } => Some(fix),
            _ => None,
        }
    }
}

/// Result of parsing one source file.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    /// `Some` whenever a module header was seen, even if the body had errors.
    pub module: Option<Module>,
    pub lex_errors: Vec<LexError>,
    pub errors: Vec<ParseError>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        !self.lex_errors.is_empty() || !self.errors.is_empty()
    }
}

/// Lex and parse `source`.
pub fn parse(source: &str) -> ParseOutput {
    let lexed = lex(source);
    let mut parser = Parser::new(lexed.tokens);
    let module = parser.parse_module();
    ParseOutput { module, lex_errors: lexed.errors, errors: parser.into_errors() }
}

/// Tags that may start an expression.
const EXPR_TAGS: &[&str] = &["C", "NEW", "SM", "NN", "OK", "ERR", "AWAIT", "LAM", "W"];

/// Clause tags and the construct that owns them.
const CLAUSE_TAGS: &[(&str, &str)] =
    &[("EI", "IF"), ("EL", "IF"), ("K", "W"), ("WHEN", "W"), ("CA", "TR"), ("FI", "TR")];

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    /// Tags of the structures currently open, innermost last.
    open_tags: Vec<String>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let end = tokens.last().map(|t| t.span).unwrap_or_else(Span::dummy);
            tokens.push(Token::new(TokenKind::Eof, "", Span::new(end.end, end.end, end.line, end.col)));
        }
        Self { tokens, pos: 0, errors: Vec::new(), open_tags: Vec::new() }
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.current();
        match tok.kind {
            TokenKind::Eof => ParseError::UnexpectedEof { expected: expected.into(), span: tok.span },
            _ => {
                let found = if tok.text.is_empty() { tok.kind.to_string() } else { format!("'{}'", tok.text) };
                ParseError::Unexpected { found, expected: expected.into(), span: tok.span }
            }
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => Ok((name, self.advance().span)),
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Skip to the next tag token without consuming it.
    fn skip_to_tag(&mut self) {
        while !matches!(self.peek_kind(), TokenKind::Tag(_) | TokenKind::CloseTag(_) | TokenKind::Eof) {
            self.advance();
        }
    }

    /// Consume the offending token, then resynchronise on the next tag.
    fn recover(&mut self) {
        if !self.at_eof() {
            self.advance();
        }
        self.skip_to_tag();
    }

    fn skip_arrow(&mut self) {
        if matches!(self.peek_kind(), TokenKind::Arrow) {
            self.advance();
        }
    }

    fn is_open(&self, tag: &str) -> bool {
        self.open_tags.iter().any(|t| t == tag)
    }

    fn is_clause_for_open_construct(&self, tag: &str) -> bool {
        CLAUSE_TAGS.iter().any(|(clause, owner)| *clause == tag && self.is_open(owner))
    }

    fn skip_stray_close(&mut self) {
        let tok = self.advance();
        self.errors.push(ParseError::Unexpected {
            found: format!("stray closing tag '{}'", tok.text),
            expected: "statement".into(),
            span: tok.span,
        });
        if matches!(self.peek_kind(), TokenKind::Attrs(_)) {
            self.advance();
        }
    }

    // ── Attributes ──

    fn take_attrs(&mut self) -> Option<(Vec<String>, Token)> {
        match self.peek_kind().clone() {
            TokenKind::Attrs(fields) => Some((fields, self.advance())),
            _ => None,
        }
    }

    /// Attributes of a structural tag whose first field is the stable ID.
    fn structural_attrs(&mut self, tag: &str, start: Span) -> (Vec<String>, Span) {
        match self.take_attrs() {
            Some((fields, tok)) => {
                if fields.first().map_or(true, |f| f.is_empty()) {
                    self.missing_attr(tag, "id", tok.span);
                }
                (fields, start.merge(tok.span))
            }
            None => {
                self.missing_attr(tag, "id", start);
                (Vec::new(), start)
            }
        }
    }

    fn missing_attr(&mut self, tag: &str, attribute: &str, span: Span) {
        self.errors.push(ParseError::MissingAttribute { tag: tag.into(), attribute: attribute.into(), span });
    }

    fn required_field(&mut self, fields: &[String], index: usize, tag: &str, attribute: &str, span: Span) -> String {
        match fields.get(index) {
            Some(f) if !f.is_empty() => f.clone(),
            _ => {
                if !fields.is_empty() {
                    self.missing_attr(tag, attribute, span);
                }
                String::new()
            }
        }
    }

    fn type_ref(&mut self, text: &str, span: Span) -> TypeRef {
        let ty = match parse_type(text) {
            Some(ty) => ty,
            None => {
                self.errors.push(ParseError::InvalidType { text: text.into(), span });
                Type::Error
            }
        };
        TypeRef { text: text.to_string(), ty, span }
    }

    fn visibility_and_async(&mut self, fields: &[String], tag: &str, span: Span) -> (Visibility, bool) {
        let mut visibility = Visibility::default();
        let mut is_async = false;
        for f in fields.iter().skip(2).filter(|f| !f.is_empty()) {
            if f == "async" {
                is_async = true;
            } else if let Ok(v) = f.parse::<Visibility>() {
                visibility = v;
            } else {
                self.errors.push(ParseError::InvalidAttribute {
                    tag: tag.into(),
                    what: "visibility".into(),
                    value: f.clone(),
                    span,
                });
            }
        }
        (visibility, is_async)
    }

    // ── Closing tags ──

    /// Consume `§/TAG{id}` and check it against the opening ID. Returns the
    /// span of the closing tag, or `open_span` when the structure is unclosed.
    fn expect_close(&mut self, tag: &str, construct: &str, open_id: &str, open_span: Span) -> Span {
        if !self.peek_kind().is_close_tag(tag) {
            self.errors.push(ParseError::Unclosed {
                construct: construct.into(),
                expected: format!("§/{}{{{}}}", tag, open_id),
                span: open_span,
            });
            return open_span;
        }
        let close = self.advance();
        match self.take_attrs() {
            Some((fields, attrs)) => {
                let close_id = fields.first().cloned().unwrap_or_default();
                if close_id != open_id {
                    let id_span = id_span_in(&attrs, &close_id);
                    self.errors.push(ParseError::MismatchedId {
                        tag: tag.into(),
                        open_id: open_id.into(),
                        close_id: close_id.clone(),
                        span: id_span,
                        fix: closing_id_fix(open_id, &close_id, id_span),
                    });
                }
                close.span.merge(attrs.span)
            }
            None => {
                if !open_id.is_empty() {
                    let at = Span::new(
                        close.span.end,
                        close.span.end,
                        close.span.line,
                        close.span.col + close.raw.chars().count(),
                    );
                    self.errors.push(ParseError::MismatchedId {
                        tag: tag.into(),
                        open_id: open_id.into(),
                        close_id: String::new(),
                        span: at,
                        fix: FixitHint::insert(
                            format!("add the closing ID '{}'", open_id),
                            at,
                            format!("{{{}}}", open_id),
                        ),
                    });
                }
                close.span
            }
        }
    }

    /// Consume an ID-less closing tag such as `§/C`.
    fn expect_simple_close(&mut self, tag: &str, construct: &str, open_span: Span) -> Span {
        if self.peek_kind().is_close_tag(tag) {
            let close = self.advance();
            if matches!(self.peek_kind(), TokenKind::Attrs(_)) {
                self.advance();
            }
            close.span
        } else {
            self.errors.push(ParseError::Unclosed {
                construct: construct.into(),
                expected: format!("§/{}", tag),
                span: open_span,
            });
            open_span
        }
    }

    // ── Module and items ──

    pub fn parse_module(&mut self) -> Option<Module> {
        if !self.peek_kind().is_tag("M") {
            let e = self.unexpected("§M module header");
            self.errors.push(e);
            while !self.at_eof() && !self.peek_kind().is_tag("M") {
                self.advance();
            }
            if self.at_eof() {
                return None;
            }
        }
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("M", start);
        let id = fields.first().cloned().unwrap_or_default();
        let name = self.required_field(&fields, 1, "M", "name", head);
        self.open_tags.push("M".into());

        let mut usings = Vec::new();
        let mut items = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::Eof => break,
                TokenKind::CloseTag(t) if t == "M" => break,
                TokenKind::CloseTag(_) => self.skip_stray_close(),
                TokenKind::Tag(t) => match t.as_str() {
                    "U" => {
                        let tok = self.advance();
                        match self.take_attrs() {
                            Some((f, _)) if !f.is_empty() => usings.push(f.join(":")),
                            _ => self.missing_attr("U", "namespace", tok.span),
                        }
                    }
                    "F" => items.push(Item::Function(self.parse_function("F"))),
                    "CL" => items.push(Item::Class(self.parse_class())),
                    "IFACE" => items.push(Item::Interface(self.parse_interface())),
                    "EN" => items.push(Item::Enum(self.parse_enum())),
                    "UN" => items.push(Item::Union(self.parse_union())),
                    _ => {
                        let e = self.unexpected("module item (§F, §CL, §IFACE, §EN, §UN or §U)");
                        self.errors.push(e);
                        self.recover();
                    }
                },
                _ => {
                    let e = self.unexpected("module item");
                    self.errors.push(e);
                    self.recover();
                }
            }
        }
        let end = self.expect_close("M", "module", &id, head);
        self.open_tags.pop();
        if !self.at_eof() {
            let e = self.unexpected("end of input after module");
            self.errors.push(e);
        }
        Some(Module { id, name, usings, items, span: head.merge(end) })
    }

    /// Parses `§F` functions and `§MT` methods; the body is empty for
    /// interface methods that close immediately.
    fn parse_function(&mut self, tag: &str) -> FunctionDef {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs(tag, start);
        let id = fields.first().cloned().unwrap_or_default();
        let name = self.required_field(&fields, 1, tag, "name", head);
        let (visibility, is_async) = self.visibility_and_async(&fields, tag, head);
        self.open_tags.push(tag.into());

        let mut params = Vec::new();
        let mut return_type = None;
        let mut effects = None;
        let mut preconditions = Vec::new();
        let mut postconditions = Vec::new();
        let mut breaking = None;
        loop {
            let TokenKind::Tag(t) = self.peek_kind().clone() else { break };
            match t.as_str() {
                "I" => {
                    if let Some(p) = self.parse_param() {
                        params.push(p);
                    }
                }
                "O" => {
                    let tok = self.advance();
                    match self.take_attrs() {
                        Some((f, attrs)) if !f.is_empty() => {
                            return_type = Some(self.type_ref(&f[0], attrs.span));
                        }
                        _ => self.missing_attr("O", "type", tok.span),
                    }
                }
                "E" => effects = Some(self.parse_effect_decl()),
                "Q" => {
                    self.advance();
                    preconditions.push(self.expr_or_recover());
                }
                "S" => {
                    self.advance();
                    postconditions.push(self.expr_or_recover());
                }
                "BREAKING" => {
                    let tok = self.advance();
                    let reason = self.take_attrs().map(|(f, _)| f.join(":")).filter(|r| !r.is_empty());
                    breaking = Some(BreakingMarker { reason, span: tok.span });
                }
                _ => break,
            }
        }

        let body = self.parse_block();
        let construct = if tag == "F" { "function" } else { "method" };
        let end = self.expect_close(tag, construct, &id, head);
        self.open_tags.pop();
        FunctionDef {
            id,
            name,
            visibility,
            is_async,
            params,
            return_type,
            effects,
            preconditions,
            postconditions,
            breaking,
            body,
            span: head.merge(end),
        }
    }

    fn parse_param(&mut self) -> Option<Param> {
        let tok = self.advance();
        match self.take_attrs() {
            Some((f, attrs)) if f.len() >= 2 && !f[1].is_empty() => {
                let ty = self.type_ref(&f[0], attrs.span);
                Some(Param { name: f[1].clone(), ty, span: tok.span.merge(attrs.span) })
            }
            Some((_, attrs)) => {
                self.missing_attr("I", "type:name", attrs.span);
                None
            }
            None => {
                self.missing_attr("I", "type:name", tok.span);
                None
            }
        }
    }

    fn parse_effect_decl(&mut self) -> EffectDecl {
        let tok = self.advance();
        let Some((fields, attrs)) = self.take_attrs() else {
            return EffectDecl { codes: Vec::new(), span: tok.span };
        };
        let mut codes = Vec::new();
        let mut search_from = 0;
        for code in fields.iter().flat_map(|f| f.split(',')).map(str::trim).filter(|c| !c.is_empty()) {
            let offset = attrs.raw[search_from..].find(code).map(|o| o + search_from).unwrap_or(1);
            search_from = offset + code.len();
            let span = Span::new(
                attrs.span.start + offset,
                attrs.span.start + offset + code.len(),
                attrs.span.line,
                attrs.span.col + attrs.raw[..offset].chars().count(),
            );
            codes.push((code.to_string(), span));
        }
        EffectDecl { codes, span: tok.span.merge(attrs.span) }
    }

    fn parse_class(&mut self) -> ClassDef {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("CL", start);
        let id = fields.first().cloned().unwrap_or_default();
        let name = self.required_field(&fields, 1, "CL", "name", head);
        let (visibility, _) = self.visibility_and_async(&fields, "CL", head);
        self.open_tags.push("CL".into());

        let mut class_fields = Vec::new();
        let mut properties = Vec::new();
        let mut methods = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::Eof => break,
                TokenKind::CloseTag(t) if self.is_open(&t) => break,
                TokenKind::CloseTag(_) => self.skip_stray_close(),
                TokenKind::Tag(t) if t == "FLD" || t == "PROP" => {
                    let tok = self.advance();
                    match self.take_attrs() {
                        Some((f, attrs)) if f.len() >= 2 && !f[1].is_empty() => {
                            let ty = self.type_ref(&f[0], attrs.span);
                            let vis = f
                                .get(2)
                                .and_then(|v| v.parse::<Visibility>().ok())
                                .unwrap_or_default();
                            let span = tok.span.merge(attrs.span);
                            if t == "FLD" {
                                class_fields.push(FieldDef { name: f[1].clone(), ty, visibility: vis, span });
                            } else {
                                properties.push(PropertyDef { name: f[1].clone(), ty, visibility: vis, span });
                            }
                        }
                        _ => self.missing_attr(&t, "type:name", tok.span),
                    }
                }
                TokenKind::Tag(t) if t == "MT" => methods.push(self.parse_function("MT")),
                _ => {
                    let e = self.unexpected("class member (§FLD, §PROP or §MT)");
                    self.errors.push(e);
                    self.recover();
                }
            }
        }
        let end = self.expect_close("CL", "class", &id, head);
        self.open_tags.pop();
        ClassDef { id, name, visibility, fields: class_fields, properties, methods, span: head.merge(end) }
    }

    fn parse_interface(&mut self) -> InterfaceDef {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("IFACE", start);
        let id = fields.first().cloned().unwrap_or_default();
        let name = self.required_field(&fields, 1, "IFACE", "name", head);
        let (visibility, _) = self.visibility_and_async(&fields, "IFACE", head);
        self.open_tags.push("IFACE".into());
        let mut methods = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::Eof => break,
                TokenKind::CloseTag(t) if self.is_open(&t) => break,
                TokenKind::CloseTag(_) => self.skip_stray_close(),
                TokenKind::Tag(t) if t == "MT" => methods.push(self.parse_function("MT")),
                _ => {
                    let e = self.unexpected("interface method (§MT)");
                    self.errors.push(e);
                    self.recover();
                }
            }
        }
        let end = self.expect_close("IFACE", "interface", &id, head);
        self.open_tags.pop();
        InterfaceDef { id, name, visibility, methods, span: head.merge(end) }
    }

    fn parse_enum(&mut self) -> EnumDef {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("EN", start);
        let id = fields.first().cloned().unwrap_or_default();
        let name = self.required_field(&fields, 1, "EN", "name", head);
        let (visibility, _) = self.visibility_and_async(&fields, "EN", head);
        self.open_tags.push("EN".into());
        let mut variants = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::Eof => break,
                TokenKind::CloseTag(t) if self.is_open(&t) => break,
                TokenKind::CloseTag(_) => self.skip_stray_close(),
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::Ident(v) => {
                    let span = self.advance().span;
                    variants.push(VariantDef { name: v, payload: None, span });
                }
                TokenKind::Tag(t) if t == "V" => {
                    if let Some(v) = self.parse_variant() {
                        variants.push(v);
                    }
                }
                _ => {
                    let e = self.unexpected("enum variant name");
                    self.errors.push(e);
                    self.recover();
                }
            }
        }
        let end = self.expect_close("EN", "enum", &id, head);
        self.open_tags.pop();
        EnumDef { id, name, visibility, variants, span: head.merge(end) }
    }

    fn parse_union(&mut self) -> UnionDef {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("UN", start);
        let id = fields.first().cloned().unwrap_or_default();
        let name = self.required_field(&fields, 1, "UN", "name", head);
        let (visibility, _) = self.visibility_and_async(&fields, "UN", head);
        self.open_tags.push("UN".into());
        let mut variants = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::Eof => break,
                TokenKind::CloseTag(t) if self.is_open(&t) => break,
                TokenKind::CloseTag(_) => self.skip_stray_close(),
                TokenKind::Tag(t) if t == "V" => {
                    if let Some(v) = self.parse_variant() {
                        variants.push(v);
                    }
                }
                _ => {
                    let e = self.unexpected("union variant (§V)");
                    self.errors.push(e);
                    self.recover();
                }
            }
        }
        let end = self.expect_close("UN", "union", &id, head);
        self.open_tags.pop();
        UnionDef { id, name, visibility, variants, span: head.merge(end) }
    }

    fn parse_variant(&mut self) -> Option<VariantDef> {
        let tok = self.advance();
        match self.take_attrs() {
            Some((f, attrs)) if !f.is_empty() && !f[0].is_empty() => {
                let payload = match f.get(1) {
                    Some(t) if !t.is_empty() => Some(self.type_ref(t, attrs.span)),
                    _ => None,
                };
                Some(VariantDef { name: f[0].clone(), payload, span: tok.span.merge(attrs.span) })
            }
            _ => {
                self.missing_attr("V", "name", tok.span);
                None
            }
        }
    }

    // ── Statements ──

    /// Parse statements until a closing tag of an open structure, a clause
    /// tag belonging to one, or end of input.
    fn parse_block(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::Eof => break,
                TokenKind::CloseTag(t) => {
                    if self.is_open(&t) {
                        break;
                    }
                    self.skip_stray_close();
                }
                TokenKind::Tag(t) if self.is_clause_for_open_construct(&t) => break,
                TokenKind::Tag(t) => stmts.push(self.parse_stmt(&t)),
                _ => {
                    let span = self.current().span;
                    let e = self.unexpected("statement");
                    self.errors.push(e);
                    self.recover();
                    stmts.push(Stmt::Error(span));
                }
            }
        }
        stmts
    }

    fn parse_stmt(&mut self, tag: &str) -> Stmt {
        match tag {
            "B" => self.parse_bind(),
            "SET" => self.parse_assign(),
            "IF" => self.parse_if(),
            "L" => self.parse_for(),
            "EACH" => self.parse_foreach(),
            "WH" => self.parse_while(),
            "W" => Stmt::Match(self.parse_match(false)),
            "TR" => self.parse_try(),
            "R" => {
                let start = self.advance().span;
                let value = if self.starts_expr() { Some(self.expr_or_recover()) } else { None };
                let span = value.as_ref().map_or(start, |v| start.merge(v.span()));
                Stmt::Return(ReturnStmt { value, span })
            }
            "TH" => {
                let start = self.advance().span;
                let value = self.expr_or_recover();
                let span = start.merge(value.span());
                Stmt::Throw(ThrowStmt { value, span })
            }
            "C" => Stmt::Call(self.parse_call()),
            _ => {
                let span = self.current().span;
                let e = self.unexpected("statement");
                self.errors.push(e);
                self.recover();
                Stmt::Error(span)
            }
        }
    }

    fn parse_bind(&mut self) -> Stmt {
        let start = self.advance().span;
        let attrs = self.take_attrs();
        let value = self.expr_or_recover();
        let span = start.merge(value.span());
        let Some((fields, attrs)) = attrs.filter(|(f, _)| !f.is_empty()) else {
            self.missing_attr("B", "name", start);
            return Stmt::Error(span);
        };
        let (ty, raw_name) = if fields.len() >= 2 {
            (Some(self.type_ref(&fields[0], attrs.span)), fields[1].as_str())
        } else {
            (None, fields[0].as_str())
        };
        let (mutable, name) = match raw_name.strip_prefix('~') {
            Some(n) => (true, n.to_string()),
            None => (false, raw_name.to_string()),
        };
        if name.is_empty() {
            self.missing_attr("B", "name", attrs.span);
            return Stmt::Error(span);
        }
        Stmt::Bind(BindStmt { name, mutable, ty, value, span })
    }

    fn parse_assign(&mut self) -> Stmt {
        let start = self.advance().span;
        let target = match self.take_attrs() {
            Some((fields, attrs)) => match parse_target(&fields.join(":"), attrs.span) {
                Some(t) => t,
                None => {
                    self.errors.push(ParseError::InvalidAttribute {
                        tag: "SET".into(),
                        what: "assignment target".into(),
                        value: fields.join(":"),
                        span: attrs.span,
                    });
                    Expr::Error(attrs.span)
                }
            },
            None => self.expr_or_recover(),
        };
        let value = self.expr_or_recover();
        let span = start.merge(value.span());
        Stmt::Assign(AssignStmt { target, value, span })
    }

    fn parse_if(&mut self) -> Stmt {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("IF", start);
        let id = fields.first().cloned().unwrap_or_default();
        let condition = self.expr_or_recover();
        self.skip_arrow();
        self.open_tags.push("IF".into());
        let then_body = self.parse_block();
        let mut else_ifs = Vec::new();
        while self.peek_kind().is_tag("EI") {
            let s = self.advance().span;
            let condition = self.expr_or_recover();
            self.skip_arrow();
            let body = self.parse_block();
            else_ifs.push(ElseIf { condition, body, span: s });
        }
        let else_body = if self.peek_kind().is_tag("EL") {
            self.advance();
            self.skip_arrow();
            Some(self.parse_block())
        } else {
            None
        };
        let end = self.expect_close("IF", "if", &id, head);
        self.open_tags.pop();
        Stmt::If(IfStmt { id, condition, then_body, else_ifs, else_body, span: head.merge(end) })
    }

    fn parse_for(&mut self) -> Stmt {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("L", start);
        let id = fields.first().cloned().unwrap_or_default();
        let var = self.required_field(&fields, 1, "L", "variable", head);
        let from = self.expr_or_recover();
        let to = self.expr_or_recover();
        let step = if self.starts_plain_expr() { Some(self.expr_or_recover()) } else { None };
        self.open_tags.push("L".into());
        let body = self.parse_block();
        let end = self.expect_close("L", "loop", &id, head);
        self.open_tags.pop();
        Stmt::For(ForStmt { id, var, from, to, step, body, span: head.merge(end) })
    }

    fn parse_foreach(&mut self) -> Stmt {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("EACH", start);
        let id = fields.first().cloned().unwrap_or_default();
        let var = self.required_field(&fields, 1, "EACH", "variable", head);
        let iterable = self.expr_or_recover();
        self.open_tags.push("EACH".into());
        let body = self.parse_block();
        let end = self.expect_close("EACH", "foreach", &id, head);
        self.open_tags.pop();
        Stmt::ForEach(ForEachStmt { id, var, iterable, body, span: head.merge(end) })
    }

    fn parse_while(&mut self) -> Stmt {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("WH", start);
        let id = fields.first().cloned().unwrap_or_default();
        let condition = self.expr_or_recover();
        self.open_tags.push("WH".into());
        let body = self.parse_block();
        let end = self.expect_close("WH", "while", &id, head);
        self.open_tags.pop();
        Stmt::While(WhileStmt { id, condition, body, span: head.merge(end) })
    }

    fn parse_try(&mut self) -> Stmt {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("TR", start);
        let id = fields.first().cloned().unwrap_or_default();
        self.open_tags.push("TR".into());
        let body = self.parse_block();
        let mut catches = Vec::new();
        while self.peek_kind().is_tag("CA") {
            let tok = self.advance();
            let (exception_type, var) = match self.take_attrs() {
                Some((f, attrs)) if !f.is_empty() => {
                    let ty = Some(self.type_ref(&f[0], attrs.span));
                    (ty, f.get(1).filter(|v| !v.is_empty()).cloned())
                }
                _ => (None, None),
            };
            let body = self.parse_block();
            catches.push(CatchClause { exception_type, var, body, span: tok.span });
        }
        let finally = if self.peek_kind().is_tag("FI") {
            self.advance();
            Some(self.parse_block())
        } else {
            None
        };
        let end = self.expect_close("TR", "try", &id, head);
        self.open_tags.pop();
        Stmt::Try(TryStmt { id, body, catches, finally, span: head.merge(end) })
    }

    fn parse_match(&mut self, is_expression: bool) -> MatchExpr {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("W", start);
        let id = fields.first().cloned().unwrap_or_default();
        let target = self.expr_or_recover();
        self.open_tags.push("W".into());
        let mut arms = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::Tag(t) if t == "K" => {}
                TokenKind::Eof | TokenKind::CloseTag(_) => break,
                TokenKind::Tag(t) if t != "WHEN" && self.is_clause_for_open_construct(&t) => break,
                _ => {
                    let e = self.unexpected("match arm (§K)");
                    self.errors.push(e);
                    self.recover();
                    continue;
                }
            }
            let arm_start = self.advance().span;
            let pattern = match self.parse_pattern() {
                Ok(p) => Some(p),
                Err(e) => {
                    self.errors.push(e);
                    while !matches!(
                        self.peek_kind(),
                        TokenKind::Arrow | TokenKind::Tag(_) | TokenKind::CloseTag(_) | TokenKind::Eof
                    ) {
                        self.advance();
                    }
                    None
                }
            };
            let guard = if self.peek_kind().is_tag("WHEN") {
                self.advance();
                Some(self.expr_or_recover())
            } else {
                None
            };
            self.skip_arrow();
            let body = if is_expression {
                ArmBody::Expr(self.expr_or_recover())
            } else {
                ArmBody::Block(self.parse_block())
            };
            // An arm whose pattern failed to parse is dropped so it cannot
            // distort coverage analysis.
            if let Some(pattern) = pattern {
                arms.push(MatchArm { pattern, guard, body, span: arm_start });
            }
        }
        let end = self.expect_close("W", "match", &id, head);
        self.open_tags.pop();
        MatchExpr { id, target: Box::new(target), arms, is_expression, span: head.merge(end) }
    }

    // ── Patterns ──

    fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Ident(ref name) if name == "_" => {
                self.advance();
                Ok(Pattern::Wildcard(tok.span))
            }
            TokenKind::Ident(ref name) => {
                self.advance();
                let mut path = vec![name.clone()];
                let mut span = tok.span;
                while matches!(self.peek_kind(), TokenKind::Dot) {
                    self.advance();
                    let (seg, s) = self.expect_ident()?;
                    path.push(seg);
                    span = span.merge(s);
                }
                let args = if matches!(self.peek_kind(), TokenKind::LParen) {
                    let (args, s) = self.parse_pattern_args()?;
                    span = span.merge(s);
                    Some(args)
                } else {
                    None
                };
                let variant = path.pop().unwrap_or_default();
                let type_name = if path.is_empty() { None } else { Some(path.join(".")) };
                self.build_named_pattern(type_name, variant, args, span)
            }
            TokenKind::IntLit(n) => {
                self.advance();
                Ok(Pattern::Literal(LiteralValue::Int(n), tok.span))
            }
            TokenKind::Minus => match self.peek_kind_at(1).clone() {
                TokenKind::IntLit(n) => {
                    self.advance();
                    let lit = self.advance();
                    Ok(Pattern::Literal(LiteralValue::Int(-n), tok.span.merge(lit.span)))
                }
                _ => Err(self.unexpected("pattern")),
            },
            TokenKind::StringLit(ref s) => {
                self.advance();
                Ok(Pattern::Literal(LiteralValue::Str(s.clone()), tok.span))
            }
            TokenKind::BoolLit(b) => {
                self.advance();
                Ok(Pattern::Literal(LiteralValue::Bool(b), tok.span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Pattern::Literal(LiteralValue::Null, tok.span))
            }
            TokenKind::Tag(ref t) => match t.as_str() {
                "SM" | "OK" | "ERR" => {
                    self.advance();
                    let inner = self.parse_pattern()?;
                    let span = tok.span.merge(inner.span());
                    Ok(match t.as_str() {
                        "SM" => Pattern::Some(Box::new(inner), span),
                        "OK" => Pattern::Ok(Box::new(inner), span),
                        _ => Pattern::Err(Box::new(inner), span),
                    })
                }
                "NN" => {
                    self.advance();
                    Ok(Pattern::None(tok.span))
                }
                _ => Err(self.unexpected("pattern")),
            },
            _ => Err(self.unexpected("pattern")),
        }
    }

    fn parse_pattern_args(&mut self) -> Result<(Vec<Pattern>, Span), ParseError> {
        let open = self.expect(&TokenKind::LParen, "'('")?.span;
        let mut args = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RParen | TokenKind::Eof) {
            if !args.is_empty() {
                self.expect(&TokenKind::Comma, "',' between patterns")?;
            }
            args.push(self.parse_pattern()?);
        }
        let close = self.expect(&TokenKind::RParen, "')'")?.span;
        Ok((args, open.merge(close)))
    }

    fn build_named_pattern(
        &self,
        type_name: Option<String>,
        name: String,
        args: Option<Vec<Pattern>>,
        span: Span,
    ) -> Result<Pattern, ParseError> {
        if type_name.is_none() {
            let single = |args: Option<Vec<Pattern>>| -> Result<Box<Pattern>, ParseError> {
                match args {
                    None => Ok(Box::new(Pattern::Wildcard(span))),
                    Some(mut a) if a.len() == 1 => Ok(Box::new(a.remove(0))),
                    Some(a) => Err(ParseError::Unexpected {
                        found: format!("{} sub-patterns", a.len()),
                        expected: format!("exactly one sub-pattern for '{}'", name),
                        span,
                    }),
                }
            };
            match name.as_str() {
                "Some" => return Ok(Pattern::Some(single(args)?, span)),
                "Ok" => return Ok(Pattern::Ok(single(args)?, span)),
                "Err" => return Ok(Pattern::Err(single(args)?, span)),
                "None" if args.is_none() => return Ok(Pattern::None(span)),
                _ => {}
            }
            if args.is_none() {
                return Ok(Pattern::Binding(name, span));
            }
        }
        Ok(Pattern::Variant { type_name, name, args: args.unwrap_or_default(), span })
    }

    // ── Expressions ──

    fn starts_expr(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Tag(t) => EXPR_TAGS.contains(&t.as_str()),
            _ => self.starts_plain_expr(),
        }
    }

    /// An expression start that is not a tag.
    fn starts_plain_expr(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::IntLit(_)
                | TokenKind::FloatLit(_)
                | TokenKind::StringLit(_)
                | TokenKind::BoolLit(_)
                | TokenKind::Null
                | TokenKind::Ident(_)
                | TokenKind::LParen
                | TokenKind::Minus
                | TokenKind::Bang
                | TokenKind::Tilde
        )
    }

    /// Parse an expression, or record the error, skip to the next tag and
    /// return an `Expr::Error` placeholder.
    fn expr_or_recover(&mut self) -> Expr {
        let span = self.current().span;
        match self.parse_expr() {
            Ok(e) => e,
            Err(e) => {
                self.errors.push(e);
                self.skip_to_tag();
                Expr::Error(span)
            }
        }
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let tok = self.current().clone();
        let expr = match tok.kind {
            TokenKind::IntLit(n) => {
                self.advance();
                Expr::IntLit(n, tok.span)
            }
            TokenKind::FloatLit(f) => {
                self.advance();
                Expr::FloatLit(f, tok.span)
            }
            TokenKind::StringLit(ref s) => {
                self.advance();
                Expr::StringLit(s.clone(), tok.span)
            }
            TokenKind::BoolLit(b) => {
                self.advance();
                Expr::BoolLit(b, tok.span)
            }
            TokenKind::Null => {
                self.advance();
                Expr::Null(tok.span)
            }
            TokenKind::Ident(ref name) => {
                self.advance();
                Expr::Ident(name.clone(), tok.span)
            }
            TokenKind::Minus => match self.peek_kind_at(1).clone() {
                TokenKind::IntLit(n) => {
                    self.advance();
                    let lit = self.advance();
                    Expr::IntLit(-n, tok.span.merge(lit.span))
                }
                TokenKind::FloatLit(f) => {
                    self.advance();
                    let lit = self.advance();
                    Expr::FloatLit(-f, tok.span.merge(lit.span))
                }
                _ => return Err(self.unexpected("expression")),
            },
            TokenKind::LParen => self.parse_paren()?,
            TokenKind::Tag(ref t) => match t.as_str() {
                "C" => Expr::Call(self.parse_call()),
                "NEW" => Expr::New(self.parse_new()),
                "SM" | "OK" | "ERR" | "AWAIT" => {
                    self.advance();
                    let inner = Box::new(self.parse_expr()?);
                    let span = tok.span.merge(inner.span());
                    match t.as_str() {
                        "SM" => Expr::Some(inner, span),
                        "OK" => Expr::Ok(inner, span),
                        "ERR" => Expr::Err(inner, span),
                        _ => Expr::Await(inner, span),
                    }
                }
                "NN" => {
                    self.advance();
                    Expr::None(tok.span)
                }
                "LAM" => Expr::Lambda(self.parse_lambda()),
                "W" => Expr::Match(Box::new(self.parse_match(true))),
                _ => return Err(self.unexpected("expression")),
            },
            _ => return Err(self.unexpected("expression")),
        };
        self.parse_postfix(expr)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (field, s) = self.expect_ident()?;
                    let span = expr.span().merge(s);
                    expr = Expr::FieldAccess(Box::new(expr), field, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    let close = self.expect(&TokenKind::RBracket, "']'")?.span;
                    let span = expr.span().merge(close);
                    expr = Expr::Index(Box::new(expr), Box::new(index), span);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `( … )`: a leading operator selects the prefix form, a leading
    /// `forall`/`exists` a quantifier, anything else the infix form. A
    /// leading unary-capable operator falls back to infix, as in `(-x > 0)`.
    fn parse_paren(&mut self) -> Result<Expr, ParseError> {
        let open = self.advance().span;
        match self.peek_kind().clone() {
            TokenKind::Ident(q) if (q == "forall" || q == "exists") && matches!(self.peek_kind_at(1), TokenKind::LParen) => {
                self.parse_quantifier(open, q == "forall")
            }
            TokenKind::Minus | TokenKind::Bang | TokenKind::Tilde => {
                // `(- a b)` and `(-a > b)` share a first token; retry as infix.
                let mark = (self.pos, self.errors.len(), self.open_tags.len());
                match self.parse_prefix_form(open) {
                    Ok(expr) => Ok(expr),
                    Err(prefix_err) => {
                        self.pos = mark.0;
                        self.errors.truncate(mark.1);
                        self.open_tags.truncate(mark.2);
                        self.parse_infix_group(open).map_err(|_| prefix_err)
                    }
                }
            }
            kind if prefix_operator(&kind) => self.parse_prefix_form(open),
            _ => self.parse_infix_group(open),
        }
    }

    /// Infix body of a paren group whose `(` is already consumed.
    fn parse_infix_group(&mut self, open: Span) -> Result<Expr, ParseError> {
        let mut expr = self.parse_infix(0)?;
        let close = self.expect(&TokenKind::RParen, "')'")?.span;
        widen_span(&mut expr, open.merge(close));
        Ok(expr)
    }

    fn parse_prefix_form(&mut self, open: Span) -> Result<Expr, ParseError> {
        let op_tok = self.advance();
        let mut args = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RParen | TokenKind::Eof) {
            args.push(self.parse_expr()?);
        }
        let close = self.expect(&TokenKind::RParen, "')'")?.span;
        let span = open.merge(close);
        let arity_error = |expected: &str, found: usize| ParseError::Unexpected {
            found: format!("{} operand(s)", found),
            expected: format!("{} for '{}'", expected, op_tok.text),
            span,
        };
        match op_tok.kind {
            TokenKind::Bang | TokenKind::Tilde => {
                let op = if op_tok.kind == TokenKind::Bang { UnaryOp::Not } else { UnaryOp::BitNot };
                match <[Expr; 1]>::try_from(args) {
                    Ok([a]) => Ok(Expr::Unary(op, Box::new(a), span)),
                    Err(args) => Err(arity_error("one operand", args.len())),
                }
            }
            TokenKind::Minus if args.len() == 1 => {
                let a = args.into_iter().next().map(Box::new).ok_or_else(|| arity_error("one operand", 0))?;
                Ok(Expr::Unary(UnaryOp::Neg, a, span))
            }
            TokenKind::Question => match <[Expr; 3]>::try_from(args) {
                Ok([c, t, e]) => Ok(Expr::Conditional(Box::new(c), Box::new(t), Box::new(e), span)),
                Err(args) => Err(arity_error("three operands", args.len())),
            },
            ref kind => {
                let op = binop_for(kind).ok_or_else(|| arity_error("an operator", 0))?;
                if op.is_comparison() || op == BinOp::Implies {
                    return match <[Expr; 2]>::try_from(args) {
                        Ok([l, r]) => Ok(Expr::Binary(Box::new(l), op, Box::new(r), span)),
                        Err(args) => Err(arity_error("exactly two operands", args.len())),
                    };
                }
                if args.len() < 2 {
                    return Err(arity_error("at least two operands", args.len()));
                }
                let mut iter = args.into_iter();
                let mut acc = iter.next().ok_or_else(|| arity_error("at least two operands", 0))?;
                for rhs in iter {
                    let s = acc.span().merge(rhs.span());
                    acc = Expr::Binary(Box::new(acc), op, Box::new(rhs), s);
                }
                widen_span(&mut acc, span);
                Ok(acc)
            }
        }
    }

    fn parse_quantifier(&mut self, open: Span, forall: bool) -> Result<Expr, ParseError> {
        self.advance(); // forall / exists
        self.expect(&TokenKind::LParen, "'(' before bound variables")?;
        let mut vars = Vec::new();
        while matches!(self.peek_kind(), TokenKind::LParen) {
            self.advance();
            let (name, _) = self.expect_ident()?;
            let ty_tok = self.current().clone();
            let (ty_text, ty_span) = match ty_tok.kind {
                TokenKind::Ident(t) => {
                    self.advance();
                    (t, ty_tok.span)
                }
                _ => return Err(self.unexpected("bound variable type")),
            };
            let ty = self.type_ref(&ty_text, ty_span);
            vars.push((name, ty));
            self.expect(&TokenKind::RParen, "')'")?;
        }
        self.expect(&TokenKind::RParen, "')' after bound variables")?;
        let body = self.parse_expr()?;
        let close = self.expect(&TokenKind::RParen, "')'")?.span;
        let kind = if forall { QuantifierKind::Forall } else { QuantifierKind::Exists };
        Ok(Expr::Quantifier(QuantifierExpr { kind, vars, body: Box::new(body), span: open.merge(close) }))
    }

    fn parse_infix(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = binop_for(self.peek_kind()) {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let next_min = if op.is_right_assoc() { prec } else { prec + 1 };
            let rhs = self.parse_infix(next_min)?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs), span);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Minus if !matches!(self.peek_kind_at(1), TokenKind::IntLit(_) | TokenKind::FloatLit(_)) => {
                UnaryOp::Neg
            }
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            _ => return self.parse_expr(),
        };
        let start = self.advance().span;
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span());
        Ok(Expr::Unary(op, Box::new(operand), span))
    }

    fn parse_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        while self.peek_kind().is_tag("A") {
            self.advance();
            args.push(self.expr_or_recover());
        }
        args
    }

    fn parse_call(&mut self) -> CallExpr {
        let start = self.advance().span;
        let target = match self.take_attrs() {
            Some((f, _)) if !f.is_empty() && !f[0].is_empty() => f.join(":"),
            _ => {
                self.missing_attr("C", "target", start);
                String::new()
            }
        };
        self.open_tags.push("C".into());
        let args = self.parse_args();
        let end = self.expect_simple_close("C", "call", start);
        self.open_tags.pop();
        CallExpr { target, args, span: start.merge(end) }
    }

    fn parse_new(&mut self) -> NewExpr {
        let start = self.advance().span;
        let ty = match self.take_attrs() {
            Some((f, attrs)) if !f.is_empty() && !f[0].is_empty() => self.type_ref(&f[0], attrs.span),
            _ => {
                self.missing_attr("NEW", "type", start);
                TypeRef { text: String::new(), ty: Type::Error, span: start }
            }
        };
        self.open_tags.push("NEW".into());
        let args = self.parse_args();
        let end = self.expect_simple_close("NEW", "object creation", start);
        self.open_tags.pop();
        NewExpr { ty, args, span: start.merge(end) }
    }

    fn parse_lambda(&mut self) -> LambdaExpr {
        let start = self.advance().span;
        let (fields, head) = self.structural_attrs("LAM", start);
        let id = fields.first().cloned().unwrap_or_default();
        let mut params = Vec::new();
        while self.peek_kind().is_tag("I") {
            if let Some(p) = self.parse_param() {
                params.push(p);
            }
        }
        self.open_tags.push("LAM".into());
        let body = if self.starts_plain_expr() {
            let value = self.expr_or_recover();
            let span = value.span();
            vec![Stmt::Return(ReturnStmt { value: Some(value), span })]
        } else {
            self.parse_block()
        };
        let end = self.expect_close("LAM", "lambda", &id, head);
        self.open_tags.pop();
        LambdaExpr { id, params, body, span: head.merge(end) }
    }
}

fn prefix_operator(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Bang | TokenKind::Tilde | TokenKind::Question) || binop_for(kind).is_some()
}

fn binop_for(kind: &TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Percent => BinOp::Mod,
        TokenKind::Eq => BinOp::Eq,
        TokenKind::NotEq => BinOp::NotEq,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::LtEq => BinOp::LtEq,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::GtEq => BinOp::GtEq,
        TokenKind::AndAnd => BinOp::And,
        TokenKind::OrOr => BinOp::Or,
        TokenKind::Amp => BinOp::BitAnd,
        TokenKind::Pipe => BinOp::BitOr,
        TokenKind::Caret => BinOp::BitXor,
        TokenKind::Shl => BinOp::Shl,
        TokenKind::Shr => BinOp::Shr,
        TokenKind::Coalesce => BinOp::Coalesce,
        TokenKind::Implies => BinOp::Implies,
        _ => return None,
    })
}

/// Stretch the outermost node's span to cover its enclosing parentheses.
fn widen_span(expr: &mut Expr, outer: Span) {
    match expr {
        Expr::Binary(_, _, _, s) | Expr::Unary(_, _, s) | Expr::Conditional(_, _, _, s) => *s = s.merge(outer),
        _ => {}
    }
}

/// Span of `id` inside an attribute token, falling back to just after `{`.
fn id_span_in(attrs: &Token, id: &str) -> Span {
    let offset = if id.is_empty() { None } else { attrs.raw.find(id) }.unwrap_or(1);
    let col = attrs.span.col + attrs.raw[..offset.min(attrs.raw.len())].chars().count();
    Span::new(attrs.span.start + offset, attrs.span.start + offset + id.len(), attrs.span.line, col)
}

/// Parse an assignment target written inside `§SET{…}`. Every node takes
/// the span of the attribute block.
fn parse_target(text: &str, span: Span) -> Option<Expr> {
    let lexed = lex(text);
    if !lexed.errors.is_empty() {
        return None;
    }
    let mut parser = Parser::new(lexed.tokens);
    let expr = parser.parse_expr().ok()?;
    if !parser.at_eof() || !parser.errors.is_empty() {
        return None;
    }
    relocate(expr, span)
}

fn relocate(expr: Expr, span: Span) -> Option<Expr> {
    Some(match expr {
        Expr::Ident(n, _) => Expr::Ident(n, span),
        Expr::IntLit(n, _) => Expr::IntLit(n, span),
        Expr::StringLit(s, _) => Expr::StringLit(s, span),
        Expr::FieldAccess(base, field, _) => Expr::FieldAccess(Box::new(relocate(*base, span)?), field, span),
        Expr::Index(base, idx, _) => {
            Expr::Index(Box::new(relocate(*base, span)?), Box::new(relocate(*idx, span)?), span)
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Module {
        let out = parse(src);
        assert!(out.errors.is_empty(), "unexpected parse errors: {:?}", out.errors);
        assert!(out.lex_errors.is_empty(), "unexpected lex errors: {:?}", out.lex_errors);
        out.module.expect("module")
    }

    fn first_fn(m: &Module) -> &FunctionDef {
        m.functions().next().expect("function")
    }

    #[test]
    fn test_parse_function_header() {
        let m = parse_ok(
            "§M{m001:Math}
             §F{f001:Add:pub}
               §I{i32:a} §I{i32:b} §O{i32} §E{cw,fr}
               §Q (b != 0)
               §S (>= result 0)
               §R (+ a b)
             §/F{f001}
             §/M{m001}",
        );
        assert_eq!(m.id, "m001");
        let f = first_fn(&m);
        assert_eq!(f.name, "Add");
        assert!(f.is_public());
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.return_type.as_ref().map(|t| t.ty.clone()), Some(Type::i32()));
        let codes: Vec<_> = f.effects.as_ref().map(|e| e.codes.iter().map(|(c, _)| c.clone()).collect()).unwrap_or_default();
        assert_eq!(codes, vec!["cw", "fr"]);
        assert_eq!(f.preconditions.len(), 1);
        assert_eq!(f.postconditions.len(), 1);
        assert!(matches!(f.body[0], Stmt::Return(ReturnStmt { value: Some(Expr::Binary(_, BinOp::Add, _, _)), .. })));
    }

    #[test]
    fn test_mismatched_closing_id_has_fix() {
        let src = "§M{m001:T} §F{f001:Main} §/F{f002} §/M{m001}";
        let out = parse(src);
        assert_eq!(out.errors.len(), 1);
        match &out.errors[0] {
            ParseError::MismatchedId { open_id, close_id, fix, .. } => {
                assert_eq!(open_id, "f001");
                assert_eq!(close_id, "f002");
                assert_eq!(fix.replacement, "f001");
                assert_eq!(fix.apply(src), "§M{m001:T} §F{f001:Main} §/F{f001} §/M{m001}");
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
        assert_eq!(out.module.map(|m| m.items.len()), Some(1));
    }

    #[test]
    fn test_unclosed_structure_recovers() {
        let out = parse(
            "§M{m001:T}
             §F{f001:A}
               §IF{if1} (x > 0)
                 §R 1
             §/F{f001}
             §F{f002:B} §R 2 §/F{f002}
             §/M{m001}",
        );
        assert_eq!(out.errors.len(), 1, "{:?}", out.errors);
        assert!(matches!(out.errors[0], ParseError::Unclosed { .. }));
        assert_eq!(out.module.map(|m| m.items.len()), Some(2));
    }

    #[test]
    fn test_bad_statement_synchronises() {
        let out = parse("§M{m1:T} §F{f1:A} 42 garbage §B{x} 1 §R x §/F{f1} §/M{m1}");
        assert_eq!(out.errors.len(), 1);
        let m = out.module.expect("module");
        let f = first_fn(&m);
        assert!(matches!(f.body[0], Stmt::Error(_)));
        assert!(matches!(f.body[1], Stmt::Bind(_)));
        assert!(matches!(f.body[2], Stmt::Return(_)));
    }

    #[test]
    fn test_missing_module_header() {
        let out = parse("§F{f1:A} §/F{f1}");
        assert!(out.module.is_none());
        assert!(!out.errors.is_empty());
    }

    #[test]
    fn test_infix_precedence() {
        let m = parse_ok("§M{m1:T} §F{f1:A} §R (a + b * c) §/F{f1} §/M{m1}");
        let Stmt::Return(ReturnStmt { value: Some(Expr::Binary(lhs, BinOp::Add, rhs, _)), .. }) = &first_fn(&m).body[0]
        else {
            panic!("expected addition at the root");
        };
        assert!(matches!(**lhs, Expr::Ident(ref n, _) if n == "a"));
        assert!(matches!(**rhs, Expr::Binary(_, BinOp::Mul, _, _)));
    }

    #[test]
    fn test_implies_is_right_associative() {
        let m = parse_ok("§M{m1:T} §F{f1:A} §R (p => q => r) §/F{f1} §/M{m1}");
        let Stmt::Return(ReturnStmt { value: Some(Expr::Binary(lhs, BinOp::Implies, rhs, _)), .. }) =
            &first_fn(&m).body[0]
        else {
            panic!("expected implication");
        };
        assert!(matches!(**lhs, Expr::Ident(_, _)));
        assert!(matches!(**rhs, Expr::Binary(_, BinOp::Implies, _, _)));
    }

    #[test]
    fn test_prefix_forms() {
        let m = parse_ok("§M{m1:T} §F{f1:A} §R (+ 1 2 3) §R (- x) §R (? c 1 2) §/F{f1} §/M{m1}");
        let body = &first_fn(&m).body;
        // (+ 1 2 3) folds left: ((1 + 2) + 3)
        let Stmt::Return(ReturnStmt { value: Some(Expr::Binary(lhs, BinOp::Add, _, _)), .. }) = &body[0] else {
            panic!("expected fold");
        };
        assert!(matches!(**lhs, Expr::Binary(_, BinOp::Add, _, _)));
        assert!(matches!(body[1], Stmt::Return(ReturnStmt { value: Some(Expr::Unary(UnaryOp::Neg, _, _)), .. })));
        assert!(matches!(body[2], Stmt::Return(ReturnStmt { value: Some(Expr::Conditional(..)), .. })));
    }

    #[test]
    fn test_leading_unary_operator_in_infix() {
        let m = parse_ok("§M{m1:T} §F{f1:A} §R (-x > 0) §R (!a && b) §R (- x + 1) §R (~x & 7) §/F{f1} §/M{m1}");
        let body = &first_fn(&m).body;
        let root = |i: usize| match &body[i] {
            Stmt::Return(ReturnStmt { value: Some(Expr::Binary(lhs, op, _, _)), .. }) => (lhs.as_ref().clone(), *op),
            other => panic!("expected binary return, got {:?}", other),
        };
        let (lhs, op) = root(0);
        assert_eq!(op, BinOp::Gt);
        assert!(matches!(lhs, Expr::Unary(UnaryOp::Neg, _, _)));
        let (lhs, op) = root(1);
        assert_eq!(op, BinOp::And);
        assert!(matches!(lhs, Expr::Unary(UnaryOp::Not, _, _)));
        let (lhs, op) = root(2);
        assert_eq!(op, BinOp::Add);
        assert!(matches!(lhs, Expr::Unary(UnaryOp::Neg, _, _)));
        let (lhs, op) = root(3);
        assert_eq!(op, BinOp::BitAnd);
        assert!(matches!(lhs, Expr::Unary(UnaryOp::BitNot, _, _)));
    }

    #[test]
    fn test_leading_minus_keeps_prefix_subtraction() {
        let m = parse_ok("§M{m1:T} §F{f1:A} §R (- a b) §R (! done) §/F{f1} §/M{m1}");
        let body = &first_fn(&m).body;
        assert!(matches!(body[0], Stmt::Return(ReturnStmt { value: Some(Expr::Binary(_, BinOp::Sub, _, _)), .. })));
        assert!(matches!(body[1], Stmt::Return(ReturnStmt { value: Some(Expr::Unary(UnaryOp::Not, _, _)), .. })));
    }

    #[test]
    fn test_prefix_arity_error() {
        let out = parse("§M{m1:T} §F{f1:A} §R (< a) §/F{f1} §/M{m1}");
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_quantifier() {
        let m = parse_ok("§M{m1:T} §F{f1:A} §Q (forall ((i i32) (j u8)) (>= i 0)) §/F{f1} §/M{m1}");
        let Expr::Quantifier(q) = &first_fn(&m).preconditions[0] else { panic!("expected quantifier") };
        assert_eq!(q.kind, QuantifierKind::Forall);
        assert_eq!(q.vars.len(), 2);
        assert_eq!(q.vars[1].1.ty, Type::int(8, false));
    }

    #[test]
    fn test_match_arms_and_patterns() {
        let m = parse_ok(
            "§M{m1:T} §F{f1:A} §I{?i32:x}
               §W{w1} x
                 §K Some(v) §WHEN (v > 0) → §R v
                 §K §NN → §R 0
                 §K -1 → §R 1
                 §K Shape.Circle(r, _) → §R 2
                 §K other → §R 3
               §/W{w1}
             §/F{f1} §/M{m1}",
        );
        let Stmt::Match(mx) = &first_fn(&m).body[0] else { panic!("expected match") };
        assert!(!mx.is_expression);
        assert_eq!(mx.arms.len(), 5);
        assert!(matches!(mx.arms[0].pattern, Pattern::Some(..)));
        assert!(mx.arms[0].guard.is_some());
        assert!(matches!(mx.arms[1].pattern, Pattern::None(_)));
        assert!(matches!(mx.arms[2].pattern, Pattern::Literal(LiteralValue::Int(-1), _)));
        assert!(matches!(&mx.arms[3].pattern, Pattern::Variant { type_name: Some(t), args, .. } if t == "Shape" && args.len() == 2));
        assert!(matches!(&mx.arms[4].pattern, Pattern::Binding(n, _) if n == "other"));
    }

    #[test]
    fn test_control_flow_statements() {
        let m = parse_ok(
            "§M{m1:T} §F{f1:A}
               §B{~i} 0
               §L{l1:k} 0 10 2 §SET{i} (+ i k) §/L{l1}
               §EACH{e1:item} items §C{Console.WriteLine} §A item §/C §/EACH{e1}
               §WH{w1} (i < 3) §SET{i} (i + 1) §/WH{w1}
               §IF{if1} (i == 1) → §R 1 §EI (i == 2) → §R 2 §EL → §R 3 §/IF{if1}
               §TR{t1} §TH §NEW{Exception} §A \"x\" §/NEW §CA{Exception:e} §R 0 §FI §R 1 §/TR{t1}
             §/F{f1} §/M{m1}",
        );
        let body = &first_fn(&m).body;
        assert!(matches!(&body[0], Stmt::Bind(b) if b.mutable && b.name == "i"));
        assert!(matches!(&body[1], Stmt::For(f) if f.step.is_some() && f.body.len() == 1));
        assert!(matches!(&body[2], Stmt::ForEach(f) if f.var == "item"));
        assert!(matches!(&body[3], Stmt::While(_)));
        assert!(matches!(&body[4], Stmt::If(i) if i.else_ifs.len() == 1 && i.else_body.is_some()));
        assert!(matches!(&body[5], Stmt::Try(t) if t.catches.len() == 1 && t.finally.is_some()));
    }

    #[test]
    fn test_assignment_targets() {
        let m = parse_ok("§M{m1:T} §F{f1:A} §SET{obj.count} 1 §SET{arr[i]} 2 §/F{f1} §/M{m1}");
        let body = &first_fn(&m).body;
        assert!(matches!(&body[0], Stmt::Assign(a) if matches!(a.target, Expr::FieldAccess(..))));
        assert!(matches!(&body[1], Stmt::Assign(a) if matches!(a.target, Expr::Index(..))));
    }

    #[test]
    fn test_declarations() {
        let m = parse_ok(
            "§M{m1:T}
             §EN{e1:Color:pub} Red, Green Blue §/EN{e1}
             §UN{u1:Shape} §V{Circle:f64} §V{Empty} §/UN{u1}
             §CL{c1:Counter:pub}
               §FLD{i32:count}
               §PROP{str:Name:pub}
               §MT{mt1:Inc:pub} §SET{count} (+ count 1) §/MT{mt1}
             §/CL{c1}
             §IFACE{i1:IShape} §MT{mt2:Area} §O{f64} §/MT{mt2} §/IFACE{i1}
             §/M{m1}",
        );
        assert_eq!(m.items.len(), 4);
        let Item::Enum(e) = &m.items[0] else { panic!("enum") };
        assert_eq!(e.variants.len(), 3);
        let Item::Union(u) = &m.items[1] else { panic!("union") };
        assert!(u.variants[0].payload.is_some());
        let Item::Class(c) = &m.items[2] else { panic!("class") };
        assert_eq!((c.fields.len(), c.properties.len(), c.methods.len()), (1, 1, 1));
        assert_eq!(m.all_functions().count(), 1);
    }

    #[test]
    fn test_invalid_type_reported() {
        let out = parse("§M{m1:T} §F{f1:A} §I{List<:x} §/F{f1} §/M{m1}");
        assert!(out.errors.iter().any(|e| matches!(e, ParseError::InvalidType { .. })));
    }

    #[test]
    fn test_match_expression_and_lambda() {
        let m = parse_ok(
            "§M{m1:T} §F{f1:A} §I{bool:b}
               §B{f} §LAM{l1} §I{i32:x} (x * 2) §/LAM{l1}
               §R §W{w1} b §K true → 1 §K false → 0 §/W{w1}
             §/F{f1} §/M{m1}",
        );
        let body = &first_fn(&m).body;
        assert!(matches!(&body[0], Stmt::Bind(b) if matches!(b.value, Expr::Lambda(_))));
        let Stmt::Return(ReturnStmt { value: Some(Expr::Match(mx)), .. }) = &body[1] else { panic!("match expr") };
        assert!(mx.is_expression);
        assert_eq!(mx.arms.len(), 2);
    }
}
