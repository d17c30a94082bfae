//! Translation of bound contract expressions into bit-vector formulas.
//!
//! Integer types map to bit-vectors of their declared width and carry
//! their signedness alongside the formula. Operands of different widths
//! are brought to the wider width by extending the narrower one according
//! to its *own* signedness. Narrow operands are not first promoted to 32
//! bits the way C-family targets do, so `(a + b)` over two `u8` values
//! wraps at 8 bits here.
//!
//! Comparisons, division, and remainder pick the signed or unsigned
//! operator from both operands. When they disagree the unsigned operator
//! is used only if the signed side is a non-negative literal; see
//! [`signedness_for_mixed`].

use super::bitvec::{BvCmp, BvExpr, BvOp, Sort, ARRAY_INDEX_WIDTH};
use crate::compiler::ast::{BinOp, QuantifierKind, UnaryOp};
use crate::compiler::binder::{BoundExpr, BoundExprKind, CallTarget};
use crate::compiler::scope::{SymbolId, SymbolTable};
use crate::compiler::tokens::Span;
use crate::compiler::types::Type;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TermType {
    Bool,
    Int { width: u32, signed: bool },
}

impl TermType {
    /// Verifiable representation of a source type: booleans and the
    /// 8/16/32/64-bit integers.
    pub fn of(ty: &Type) -> Option<TermType> {
        match ty {
            Type::Bool => Some(TermType::Bool),
            Type::Int { bits, signed } if matches!(*bits, 8 | 16 | 32 | 64) => {
                Some(TermType::Int { width: *bits, signed: *signed })
            }
            _ => None,
        }
    }

    pub fn sort(self) -> Sort {
        match self {
            TermType::Bool => Sort::Bool,
            TermType::Int { width, .. } => Sort::BitVec(width),
        }
    }
}

/// A translated expression with the width and signedness it carries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BvTerm {
    pub expr: BvExpr,
    pub ty: TermType,
    /// Value of an integer literal, including negated literals.
    pub literal: Option<i64>,
}

impl BvTerm {
    pub fn new(expr: BvExpr, ty: TermType) -> Self {
        Self { expr, ty, literal: None }
    }

    /// Integer literals are signed 32-bit unless they do not fit.
    pub fn int_literal(value: i64) -> Self {
        let width = if i32::try_from(value).is_ok() { 32 } else { 64 };
        Self {
            expr: BvExpr::constant(i128::from(value), width),
            ty: TermType::Int { width, signed: true },
            literal: Some(value),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.ty, TermType::Int { signed: true, .. })
    }

    pub fn width(&self) -> Option<u32> {
        match self.ty {
            TermType::Int { width, .. } => Some(width),
            TermType::Bool => None,
        }
    }

    pub fn is_nonnegative_literal(&self) -> bool {
        self.literal.is_some_and(|v| v >= 0)
    }

    /// Extend to `width` bits by this term's own signedness.
    fn extend_to(self, width: u32) -> BvExpr {
        match self.width() {
            Some(w) if w < width && self.is_signed() => BvExpr::SignExtend(width - w, Box::new(self.expr)),
            Some(w) if w < width => BvExpr::ZeroExtend(width - w, Box::new(self.expr)),
            _ => self.expr,
        }
    }
}

/// Whether an operation over `left` and `right` uses the signed operator.
/// Same signedness is kept; mixed operands are unsigned only when the
/// signed operand is a literal known to be non-negative.
pub fn signedness_for_mixed(left: &BvTerm, right: &BvTerm) -> bool {
    match (left.is_signed(), right.is_signed()) {
        (true, true) => true,
        (false, false) => false,
        (true, false) => !left.is_nonnegative_literal(),
        (false, true) => !right.is_nonnegative_literal(),
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("{construct} cannot be verified")]
    Unsupported { construct: String, span: Span },
    #[error("'{name}' has type {ty}, which cannot be verified")]
    UnsupportedType { name: String, ty: String, span: Span },
    #[error("'{name}' is not available to the verifier")]
    UnknownVariable { name: String, span: Span },
    #[error("operands of '{op}' have incompatible types")]
    SortMismatch { op: String, span: Span },
}

impl TranslateError {
    pub fn span(&self) -> Span {
        match self {
            TranslateError::Unsupported { span, .. }
            | TranslateError::UnsupportedType { span, .. }
            | TranslateError::UnknownVariable { span, .. }
            | TranslateError::SortMismatch { span, .. } => *span,
        }
    }
}

fn unsupported(construct: impl Into<String>, span: Span) -> TranslateError {
    TranslateError::Unsupported { construct: construct.into(), span }
}

#[derive(Debug, Clone, PartialEq)]
enum Binding {
    Term(BvTerm),
    /// Array-typed variable; its SMT array is created on first index.
    Array { element: TermType },
}

/// Scoped map from source names to formula terms. Each quantifier or
/// nested block pushes a scope; popping it restores the previous mapping
/// exactly.
#[derive(Debug, Clone)]
pub struct ContractContext {
    scopes: Vec<HashMap<String, Binding>>,
    arrays: BTreeSet<String>,
    fresh: u32,
}

impl Default for ContractContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractContext {
    pub fn new() -> Self {
        Self { scopes: vec![HashMap::new()], arrays: BTreeSet::new(), fresh: 0 }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn bind(&mut self, name: &str, term: BvTerm) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Binding::Term(term));
        }
    }

    /// Declare a free variable of source type `ty`. Returns `false` when
    /// the type has no bit-vector representation.
    pub fn declare(&mut self, name: &str, ty: &Type) -> bool {
        if let Some(tt) = TermType::of(ty) {
            self.bind(name, BvTerm::new(BvExpr::var(name, tt.sort()), tt));
            return true;
        }
        if let Type::Array(element) = ty {
            if let Some(element @ TermType::Int { .. }) = TermType::of(element) {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.to_string(), Binding::Array { element });
                }
                return true;
            }
        }
        false
    }

    pub fn lookup(&self, name: &str) -> Option<&BvTerm> {
        match self.find(name)? {
            Binding::Term(term) => Some(term),
            Binding::Array { .. } => None,
        }
    }

    fn find(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Array names materialized so far.
    pub fn arrays(&self) -> impl Iterator<Item = &str> {
        self.arrays.iter().map(String::as_str)
    }

    fn fresh_name(&mut self, base: &str) -> String {
        let name = format!("{}!q{}", base, self.fresh);
        self.fresh += 1;
        name
    }
}

/// Translates bound expressions against a [`ContractContext`].
pub struct Translator<'a> {
    symbols: &'a SymbolTable,
    ctx: ContractContext,
}

impl<'a> Translator<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self { symbols, ctx: ContractContext::new() }
    }

    pub fn context(&self) -> &ContractContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ContractContext {
        &mut self.ctx
    }

    pub fn symbol_name(&self, id: SymbolId) -> String {
        self.symbols.name(id).to_string()
    }

    pub fn symbol_type(&self, id: SymbolId) -> Type {
        self.symbols.ty(id)
    }

    /// Declare a parameter under its source name; unsupported types are
    /// left undeclared and fail only if a contract mentions them.
    pub fn declare_symbol(&mut self, id: SymbolId) -> bool {
        let name = self.symbols.name(id).to_string();
        let ty = self.symbols.ty(id);
        self.ctx.declare(&name, &ty)
    }

    pub fn translate_bool(&mut self, expr: &BoundExpr) -> Result<BvExpr, TranslateError> {
        let term = self.translate(expr)?;
        match term.ty {
            TermType::Bool => Ok(term.expr),
            TermType::Int { .. } => Err(unsupported("non-boolean condition", expr.span)),
        }
    }

    pub fn translate(&mut self, expr: &BoundExpr) -> Result<BvTerm, TranslateError> {
        let span = expr.span;
        match &expr.kind {
            BoundExprKind::IntLit(v) => Ok(BvTerm::int_literal(*v)),
            BoundExprKind::BoolLit(b) => Ok(BvTerm::new(BvExpr::Bool(*b), TermType::Bool)),
            BoundExprKind::FloatLit(_) => Err(unsupported("floating-point literal", span)),
            BoundExprKind::StrLit(_) => Err(unsupported("string literal", span)),
            BoundExprKind::Null => Err(unsupported("null", span)),
            BoundExprKind::Variable(id) => self.variable(*id, &expr.ty, span),
            BoundExprKind::Index(base, index) => self.select(base, index, span),
            BoundExprKind::Binary(l, op, r) => self.binary(l, *op, r, span),
            BoundExprKind::Unary(op, operand) => self.unary(*op, operand, span),
            BoundExprKind::Conditional(c, a, b) => {
                let cond = self.translate_bool(c)?;
                let (a, b) = (self.translate(a)?, self.translate(b)?);
                match (a.ty, b.ty) {
                    (TermType::Bool, TermType::Bool) => Ok(BvTerm::new(
                        BvExpr::Ite(Box::new(cond), Box::new(a.expr), Box::new(b.expr)),
                        TermType::Bool,
                    )),
                    (TermType::Int { .. }, TermType::Int { .. }) => {
                        let signed = signedness_for_mixed(&a, &b);
                        let (a, b, width) = unify(a, b);
                        Ok(BvTerm::new(
                            BvExpr::Ite(Box::new(cond), Box::new(a), Box::new(b)),
                            TermType::Int { width, signed },
                        ))
                    }
                    _ => Err(TranslateError::SortMismatch { op: "?".into(), span }),
                }
            }
            BoundExprKind::Quantifier { kind, vars, body } => self.quantifier(*kind, vars, body, span),
            BoundExprKind::Call(call) => {
                let what = match &call.callee {
                    CallTarget::Unresolved => format!("unresolved call to '{}'", call.target),
                    _ => format!("call to '{}'", call.target),
                };
                Err(unsupported(what, span))
            }
            BoundExprKind::Field(_, field) => Err(unsupported(format!("member access '.{}'", field), span)),
            BoundExprKind::StaticRef(path) => Err(unsupported(format!("'{}'", path), span)),
            BoundExprKind::VariantRef { owner, name } => Err(unsupported(format!("'{}.{}'", owner, name), span)),
            BoundExprKind::New { .. } => Err(unsupported("object construction", span)),
            BoundExprKind::Some(_) | BoundExprKind::None => Err(unsupported("option value", span)),
            BoundExprKind::Ok(_) | BoundExprKind::Err(_) => Err(unsupported("result value", span)),
            BoundExprKind::Await(_) => Err(unsupported("await", span)),
            BoundExprKind::Lambda { .. } => Err(unsupported("lambda", span)),
            BoundExprKind::Match(_) => Err(unsupported("match expression", span)),
            BoundExprKind::Error => Err(unsupported("erroneous expression", span)),
        }
    }

    fn variable(&mut self, id: SymbolId, ty: &Type, span: Span) -> Result<BvTerm, TranslateError> {
        let name = self.symbols.name(id);
        if let Some(term) = self.ctx.lookup(name) {
            return Ok(term.clone());
        }
        if TermType::of(ty).is_none() {
            return Err(TranslateError::UnsupportedType { name: name.to_string(), ty: ty.to_string(), span });
        }
        Err(TranslateError::UnknownVariable { name: name.to_string(), span })
    }

    fn select(&mut self, base: &BoundExpr, index: &BoundExpr, span: Span) -> Result<BvTerm, TranslateError> {
        let BoundExprKind::Variable(id) = &base.kind else {
            return Err(unsupported("indexing a computed value", span));
        };
        let name = self.symbols.name(*id).to_string();
        let element = match self.ctx.find(&name) {
            Some(Binding::Array { element }) => *element,
            _ => {
                return Err(TranslateError::UnsupportedType { name, ty: base.ty.to_string(), span });
            }
        };
        let index = self.translate(index)?;
        if index.width().is_none() {
            return Err(TranslateError::SortMismatch { op: "[]".into(), span });
        }
        if self.ctx.arrays.insert(name.clone()) {
            debug!(array = %name, "materialized array");
        }
        let TermType::Int { width, .. } = element else {
            return Err(TranslateError::UnsupportedType { name, ty: base.ty.to_string(), span });
        };
        let array = BvExpr::var(name, Sort::Array { index: ARRAY_INDEX_WIDTH, element: width });
        let expr = BvExpr::Select(Box::new(array), Box::new(index.extend_to(ARRAY_INDEX_WIDTH)));
        Ok(BvTerm::new(expr, element))
    }

    fn unary(&mut self, op: UnaryOp, operand: &BoundExpr, span: Span) -> Result<BvTerm, TranslateError> {
        let term = self.translate(operand)?;
        match (op, term.ty) {
            (UnaryOp::Not, TermType::Bool) => Ok(BvTerm::new(BvExpr::not(term.expr), TermType::Bool)),
            (UnaryOp::Neg, TermType::Int { .. }) => Ok(BvTerm {
                literal: term.literal.and_then(i64::checked_neg),
                expr: BvExpr::Neg(Box::new(term.expr)),
                ty: term.ty,
            }),
            (UnaryOp::BitNot, TermType::Int { .. }) => Ok(BvTerm::new(BvExpr::BitNot(Box::new(term.expr)), term.ty)),
            _ => Err(TranslateError::SortMismatch { op: op.to_string(), span }),
        }
    }

    fn binary(&mut self, l: &BoundExpr, op: BinOp, r: &BoundExpr, span: Span) -> Result<BvTerm, TranslateError> {
        if op == BinOp::Coalesce {
            return Err(unsupported("'??'", span));
        }
        let (left, right) = (self.translate(l)?, self.translate(r)?);
        let mismatch = || TranslateError::SortMismatch { op: op.to_string(), span };

        if let (TermType::Bool, TermType::Bool) = (left.ty, right.ty) {
            let (a, b) = (Box::new(left.expr), Box::new(right.expr));
            let expr = match op {
                BinOp::And | BinOp::BitAnd => BvExpr::And(vec![*a, *b]),
                BinOp::Or | BinOp::BitOr => BvExpr::Or(vec![*a, *b]),
                BinOp::BitXor => BvExpr::Xor(a, b),
                BinOp::Implies => BvExpr::Implies(a, b),
                BinOp::Eq => BvExpr::Eq(a, b),
                BinOp::NotEq => BvExpr::not(BvExpr::Eq(a, b)),
                _ => return Err(mismatch()),
            };
            return Ok(BvTerm::new(expr, TermType::Bool));
        }
        if left.width().is_none() || right.width().is_none() {
            return Err(mismatch());
        }

        let signed = signedness_for_mixed(&left, &right);
        let left_signed = left.is_signed();
        let (a, b, width) = unify(left, right);
        let int = TermType::Int { width, signed };
        let cmp = |s: BvCmp, u: BvCmp| BvTerm::new(BvExpr::compare(if signed { s } else { u }, a.clone(), b.clone()), TermType::Bool);
        let arith = |op: BvOp| BvTerm::new(BvExpr::binary(op, a.clone(), b.clone()), int);
        Ok(match op {
            BinOp::Eq => BvTerm::new(BvExpr::equals(a.clone(), b.clone()), TermType::Bool),
            BinOp::NotEq => BvTerm::new(BvExpr::not(BvExpr::equals(a.clone(), b.clone())), TermType::Bool),
            BinOp::Lt => cmp(BvCmp::Slt, BvCmp::Ult),
            BinOp::LtEq => cmp(BvCmp::Sle, BvCmp::Ule),
            BinOp::Gt => cmp(BvCmp::Sgt, BvCmp::Ugt),
            BinOp::GtEq => cmp(BvCmp::Sge, BvCmp::Uge),
            BinOp::Add => arith(BvOp::Add),
            BinOp::Sub => arith(BvOp::Sub),
            BinOp::Mul => arith(BvOp::Mul),
            BinOp::Div => arith(if signed { BvOp::SDiv } else { BvOp::UDiv }),
            BinOp::Mod => arith(if signed { BvOp::SRem } else { BvOp::URem }),
            BinOp::BitAnd => arith(BvOp::And),
            BinOp::BitOr => arith(BvOp::Or),
            BinOp::BitXor => arith(BvOp::Xor),
            BinOp::Shl => BvTerm::new(
                BvExpr::binary(BvOp::Shl, a.clone(), b.clone()),
                TermType::Int { width, signed: left_signed },
            ),
            BinOp::Shr => BvTerm::new(
                BvExpr::binary(if left_signed { BvOp::AShr } else { BvOp::LShr }, a.clone(), b.clone()),
                TermType::Int { width, signed: left_signed },
            ),
            BinOp::And | BinOp::Or | BinOp::Implies | BinOp::Coalesce => return Err(mismatch()),
        })
    }

    fn quantifier(
        &mut self,
        kind: QuantifierKind,
        vars: &[SymbolId],
        body: &BoundExpr,
        span: Span,
    ) -> Result<BvTerm, TranslateError> {
        self.ctx.push();
        let result = self.quantifier_body(vars, body, span);
        self.ctx.pop();
        let (bound, body) = result?;
        let expr = match kind {
            QuantifierKind::Forall => BvExpr::Forall(bound, Box::new(body)),
            QuantifierKind::Exists => BvExpr::Exists(bound, Box::new(body)),
        };
        Ok(BvTerm::new(expr, TermType::Bool))
    }

    fn quantifier_body(
        &mut self,
        vars: &[SymbolId],
        body: &BoundExpr,
        span: Span,
    ) -> Result<(Vec<(String, Sort)>, BvExpr), TranslateError> {
        let mut bound = Vec::with_capacity(vars.len());
        for id in vars {
            let name = self.symbols.name(*id).to_string();
            let ty = self.symbols.ty(*id);
            let Some(tt) = TermType::of(&ty) else {
                return Err(TranslateError::UnsupportedType { name, ty: ty.to_string(), span });
            };
            let fresh = self.ctx.fresh_name(&name);
            self.ctx.bind(&name, BvTerm::new(BvExpr::var(fresh.clone(), tt.sort()), tt));
            bound.push((fresh, tt.sort()));
        }
        Ok((bound, self.translate_bool(body)?))
    }
}

/// Bring both operands to the wider width.
fn unify(a: BvTerm, b: BvTerm) -> (BvExpr, BvExpr, u32) {
    let width = a.width().unwrap_or(0).max(b.width().unwrap_or(0));
    (a.extend_to(width), b.extend_to(width), width)
}

/// Convert `term` to `target`: literals are re-encoded, narrower integers
/// extended, and wider ones truncated to their low bits.
pub fn coerce(term: BvTerm, target: TermType, span: Span) -> Result<BvTerm, TranslateError> {
    match (term.ty, target) {
        (TermType::Bool, TermType::Bool) => Ok(term),
        (TermType::Int { width, .. }, TermType::Int { width: to, .. }) => {
            if let Some(v) = term.literal {
                return Ok(BvTerm { expr: BvExpr::constant(i128::from(v), to), ty: target, literal: Some(v) });
            }
            if width > to {
                return Ok(BvTerm::new(BvExpr::Extract(to, Box::new(term.expr)), target));
            }
            Ok(BvTerm::new(term.extend_to(to), target))
        }
        _ => Err(TranslateError::SortMismatch { op: "return".into(), span }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::binder::{bind, BoundModule};
    use crate::compiler::parser::parse;

    fn bound(src: &str) -> BoundModule {
        let out = parse(&format!("§M{{m1:T}} {} §/M{{m1}}", src));
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let module = out.module.expect("module");
        let bound = bind(&module).expect("bind");
        assert!(bound.errors.is_empty(), "{:?}", bound.errors);
        bound.module
    }

    /// Translate the first precondition of the first function.
    fn pre(src: &str) -> Result<BvExpr, TranslateError> {
        let m = bound(src);
        let f = &m.functions[0];
        let mut t = Translator::new(&m.symbols);
        for p in &f.params {
            t.declare_symbol(*p);
        }
        t.translate_bool(&f.preconditions[0])
    }

    #[test]
    fn signed_comparison() {
        let e = pre("§F{f1:F} §I{i32:a} §Q (a >= 0) §/F{f1}");
        assert_eq!(e.map(|e| e.to_smtlib2()), Ok("(bvsge a (_ bv0 32))".to_string()));
    }

    #[test]
    fn narrower_operand_is_extended_by_its_own_signedness() {
        let e = pre("§F{f1:F} §I{i8:a} §I{u16:b} §I{i32:c} §Q ((a + c) == (b + c)) §/F{f1}");
        assert_eq!(
            e.map(|e| e.to_smtlib2()),
            Ok("(= (bvadd ((_ sign_extend 24) a) c) (bvadd ((_ zero_extend 16) b) c))".to_string())
        );
    }

    #[test]
    fn mixed_width_addition_takes_the_wider_width() {
        let m = bound("§F{f1:F} §I{u8:a} §I{i32:b} §Q ((a + b) > 0) §/F{f1}");
        let f = &m.functions[0];
        let mut t = Translator::new(&m.symbols);
        f.params.iter().for_each(|p| {
            t.declare_symbol(*p);
        });
        let BoundExprKind::Binary(sum, _, _) = &f.preconditions[0].kind else { panic!("binary") };
        let term = t.translate(sum).expect("translate");
        assert_eq!(term.width(), Some(32));
        assert_eq!(term.expr.to_smtlib2(), "(bvadd ((_ zero_extend 24) a) b)");
    }

    #[test]
    fn mixed_signedness_policy() {
        let unsigned = BvTerm::new(BvExpr::var("u", Sort::BitVec(32)), TermType::Int { width: 32, signed: false });
        let signed = BvTerm::new(BvExpr::var("s", Sort::BitVec(32)), TermType::Int { width: 32, signed: true });
        assert!(!signedness_for_mixed(&unsigned, &BvTerm::int_literal(5)));
        assert!(signedness_for_mixed(&unsigned, &BvTerm::int_literal(-5)));
        assert!(signedness_for_mixed(&unsigned, &signed));
        assert!(!signedness_for_mixed(&unsigned, &unsigned));
    }

    #[test]
    fn unsigned_comparison_against_literal() {
        let e = pre("§F{f1:F} §I{u32:n} §Q (n < 10) §/F{f1}");
        assert_eq!(e.map(|e| e.to_smtlib2()), Ok("(bvult n (_ bv10 32))".to_string()));
        let e = pre("§F{f1:F} §I{u32:n} §Q (n < -1) §/F{f1}");
        assert!(e.is_ok_and(|e| e.to_smtlib2().starts_with("(bvslt")));
    }

    #[test]
    fn quantifier_variables_do_not_leak() {
        let m = bound("§F{f1:F} §I{i32:i} §Q (&& (forall ((i u8)) (i >= 0)) (i > 1)) §/F{f1}");
        let f = &m.functions[0];
        let mut t = Translator::new(&m.symbols);
        t.declare_symbol(f.params[0]);
        let depth = t.context().depth();
        let e = t.translate_bool(&f.preconditions[0]).expect("translate");
        assert_eq!(t.context().depth(), depth);
        assert_eq!(
            e.to_smtlib2(),
            "(and (forall ((i!q0 (_ BitVec 8))) (bvuge ((_ zero_extend 24) i!q0) (_ bv0 32))) (bvsgt i (_ bv1 32)))"
        );
        assert_eq!(e.free_vars(), vec![("i".to_string(), Sort::BitVec(32))]);
    }

    #[test]
    fn array_access_selects_with_wide_index() {
        let e = pre("§F{f1:F} §I{i32[]:xs} §I{i32:k} §Q (xs[k] > 0) §/F{f1}");
        assert_eq!(
            e.map(|e| e.to_smtlib2()),
            Ok("(bvsgt (select xs ((_ sign_extend 32) k)) (_ bv0 32))".to_string())
        );
    }

    #[test]
    fn unsupported_constructs_are_reported() {
        assert!(matches!(
            pre("§F{f1:F} §I{f64:x} §Q (x > 0) §/F{f1}"),
            Err(TranslateError::UnsupportedType { name, .. }) if name == "x"
        ));
        assert!(matches!(
            pre("§F{f1:F} §I{str:s} §Q (s == \"a\") §/F{f1}"),
            Err(TranslateError::UnsupportedType { .. })
        ));
        assert!(matches!(
            pre("§F{f1:F} §I{i32:a} §Q (§C{Math.Abs} §A a §/C > 0) §/F{f1}"),
            Err(TranslateError::Unsupported { .. })
        ));
    }

    #[test]
    fn wide_literals_become_64_bit() {
        let t = BvTerm::int_literal(5_000_000_000);
        assert_eq!(t.width(), Some(64));
        let coerced = coerce(BvTerm::int_literal(0), TermType::Int { width: 8, signed: false }, Span::dummy());
        assert!(coerced.is_ok_and(|c| c.expr == BvExpr::constant(0, 8)));
    }
}
