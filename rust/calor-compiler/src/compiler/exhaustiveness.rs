//! Match checking: unreachable arms, duplicate constant arms, and
//! exhaustiveness by the shape of the matched type.
//!
//! Only unguarded arms count towards coverage. Targets whose shape is not
//! known (external types, unresolved expressions) are accepted as
//! exhaustive.

use crate::compiler::ast::LiteralValue;
use crate::compiler::binder::{
    BoundArm, BoundArmBody, BoundExpr, BoundExprKind, BoundMatch, BoundModule, BoundPattern, BoundStmt, TypeRegistry,
};
use crate::compiler::tokens::Span;
use crate::compiler::types::Type;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    #[error("non-exhaustive match: missing {}", .missing.join(", "))]
    NonExhaustive { missing: Vec<String>, in_expression: bool, span: Span },
    #[error("unreachable match arm: an earlier arm already matches everything")]
    Unreachable { span: Span, covered_by: Span },
    #[error("duplicate match arm '{pattern}'")]
    Duplicate { pattern: String, span: Span, first: Span },
}

impl PatternError {
    pub fn span(&self) -> Span {
        match self {
            PatternError::NonExhaustive { span, .. }
            | PatternError::Unreachable { span, .. }
            | PatternError::Duplicate { span, .. } => *span,
        }
    }
}

/// Check every match in every function of the module.
pub fn check(module: &BoundModule) -> Vec<PatternError> {
    let mut checker = Checker { registry: &module.registry, errors: Vec::new(), matches: 0 };
    for f in &module.functions {
        checker.stmts(&f.body);
    }
    debug!(matches = checker.matches, problems = checker.errors.len(), "checked matches");
    checker.errors
}

fn is_catch_all(p: &BoundPattern) -> bool {
    matches!(p, BoundPattern::Wildcard(_) | BoundPattern::Binding(..))
}

/// Key identifying a constant pattern for duplicate detection.
fn constant_key(p: &BoundPattern) -> Option<String> {
    match p {
        BoundPattern::Literal(v, _) => Some(v.to_string()),
        BoundPattern::None(_) => Some("None".into()),
        BoundPattern::Variant { owner, name, args, .. } if args.is_empty() => Some(match owner {
            Some(o) => format!("{}.{}", o, name),
            None => name.clone(),
        }),
        _ => None,
    }
}

struct Checker<'a> {
    registry: &'a TypeRegistry,
    errors: Vec<PatternError>,
    matches: usize,
}

impl Checker<'_> {
    fn check_match(&mut self, m: &BoundMatch) {
        self.matches += 1;
        let unguarded: Vec<&BoundArm> = m.arms.iter().filter(|a| a.guard.is_none()).collect();

        let mut catch_all: Option<Span> = None;
        let mut seen: HashMap<String, Span> = HashMap::new();
        for arm in &unguarded {
            let span = arm.pattern.span();
            if let Some(covered_by) = catch_all {
                self.errors.push(PatternError::Unreachable { span, covered_by });
                continue;
            }
            if is_catch_all(&arm.pattern) {
                catch_all = Some(span);
                continue;
            }
            if let Some(key) = constant_key(&arm.pattern) {
                match seen.get(&key) {
                    Some(first) => self.errors.push(PatternError::Duplicate { pattern: key, span, first: *first }),
                    None => {
                        seen.insert(key, span);
                    }
                }
            }
        }
        if catch_all.is_some() {
            return;
        }

        let missing = self.missing_cases(&m.target.ty, &unguarded);
        if !missing.is_empty() {
            self.errors.push(PatternError::NonExhaustive { missing, in_expression: m.is_expression, span: m.span });
        }
    }

    /// Cases not covered by `arms`, in a fixed order for the target shape.
    fn missing_cases(&self, ty: &Type, arms: &[&BoundArm]) -> Vec<String> {
        let has = |pred: &dyn Fn(&BoundPattern) -> bool| arms.iter().any(|a| pred(&a.pattern));
        let mut missing = Vec::new();
        match ty {
            Type::Option(_) => {
                if !has(&|p| matches!(p, BoundPattern::Some(..))) {
                    missing.push("Some(_)".to_string());
                }
                if !has(&|p| matches!(p, BoundPattern::None(_))) {
                    missing.push("None".to_string());
                }
            }
            Type::Result(..) => {
                if !has(&|p| matches!(p, BoundPattern::Ok(..))) {
                    missing.push("Ok(_)".to_string());
                }
                if !has(&|p| matches!(p, BoundPattern::Err(..))) {
                    missing.push("Err(_)".to_string());
                }
            }
            Type::Bool => {
                for value in [true, false] {
                    if !has(&|p| matches!(p, BoundPattern::Literal(LiteralValue::Bool(b), _) if *b == value)) {
                        missing.push(value.to_string());
                    }
                }
            }
            Type::Named(owner, _) => {
                if let Some(variants) = self.registry.sum_types.get(owner) {
                    for v in variants {
                        let covered = has(&|p| match p {
                            BoundPattern::Variant { owner: o, name, .. } => {
                                *name == v.name && o.as_deref().map_or(true, |o| o == owner)
                            }
                            _ => false,
                        });
                        if !covered {
                            missing.push(match v.payload {
                                Some(_) => format!("{}(_)", v.name),
                                None => v.name.clone(),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
        missing
    }

    fn stmts(&mut self, stmts: &[BoundStmt]) {
        for s in stmts {
            self.stmt(s);
        }
    }

    fn stmt(&mut self, stmt: &BoundStmt) {
        match stmt {
            BoundStmt::Bind { value, .. } | BoundStmt::Throw { value, .. } => self.expr(value),
            BoundStmt::Call { call, .. } => self.expr(call),
            BoundStmt::Assign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            BoundStmt::If { condition, then_body, else_ifs, else_body, .. } => {
                self.expr(condition);
                self.stmts(then_body);
                for (c, body) in else_ifs {
                    self.expr(c);
                    self.stmts(body);
                }
                if let Some(body) = else_body {
                    self.stmts(body);
                }
            }
            BoundStmt::For { from, to, step, body, .. } => {
                self.expr(from);
                self.expr(to);
                if let Some(s) = step {
                    self.expr(s);
                }
                self.stmts(body);
            }
            BoundStmt::ForEach { iterable, body, .. } => {
                self.expr(iterable);
                self.stmts(body);
            }
            BoundStmt::While { condition, body, .. } => {
                self.expr(condition);
                self.stmts(body);
            }
            BoundStmt::Match(m) => self.visit_match(m),
            BoundStmt::Try { body, catches, finally, .. } => {
                self.stmts(body);
                for c in catches {
                    self.stmts(&c.body);
                }
                if let Some(f) = finally {
                    self.stmts(f);
                }
            }
            BoundStmt::Return { value, .. } => {
                if let Some(v) = value {
                    self.expr(v);
                }
            }
        }
    }

    fn visit_match(&mut self, m: &BoundMatch) {
        self.check_match(m);
        self.expr(&m.target);
        for arm in &m.arms {
            if let Some(g) = &arm.guard {
                self.expr(g);
            }
            match &arm.body {
                BoundArmBody::Block(b) => self.stmts(b),
                BoundArmBody::Expr(e) => self.expr(e),
            }
        }
    }

    fn expr(&mut self, expr: &BoundExpr) {
        match &expr.kind {
            BoundExprKind::Match(m) => self.visit_match(m),
            BoundExprKind::Field(e, _)
            | BoundExprKind::Unary(_, e)
            | BoundExprKind::Some(e)
            | BoundExprKind::Ok(e)
            | BoundExprKind::Err(e)
            | BoundExprKind::Await(e) => self.expr(e),
            BoundExprKind::Index(a, b) | BoundExprKind::Binary(a, _, b) => {
                self.expr(a);
                self.expr(b);
            }
            BoundExprKind::Conditional(a, b, c) => {
                self.expr(a);
                self.expr(b);
                self.expr(c);
            }
            BoundExprKind::Call(call) => {
                if let Some(r) = &call.receiver {
                    self.expr(r);
                }
                for a in &call.args {
                    self.expr(a);
                }
            }
            BoundExprKind::New { args, .. } => {
                for a in args {
                    self.expr(a);
                }
            }
            BoundExprKind::Lambda { body, .. } => self.stmts(body),
            BoundExprKind::Quantifier { body, .. } => self.expr(body),
            BoundExprKind::IntLit(_)
            | BoundExprKind::FloatLit(_)
            | BoundExprKind::StrLit(_)
            | BoundExprKind::BoolLit(_)
            | BoundExprKind::Null
            | BoundExprKind::None
            | BoundExprKind::Variable(_)
            | BoundExprKind::VariantRef { .. }
            | BoundExprKind::StaticRef(_)
            | BoundExprKind::Error => {}
        }
    }
}
