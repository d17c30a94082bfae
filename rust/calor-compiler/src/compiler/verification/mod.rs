//! Static verification of function contracts.
//!
//! Preconditions (`§Q`) and postconditions (`§S`) are translated into
//! fixed-width bit-vector formulas and discharged by a pluggable solver.
//!
//! ```text
//!   BoundFunction (§Q, §S, straight-line body)
//!       │
//!       ▼
//!   translate.rs   — Translator, ContractContext
//!       │
//!       ▼
//!   bitvec.rs      — BvExpr
//!       │
//!       ▼
//!   smt_solver.rs  — SmtSolver  →  Z3ProcessSolver
//!       │                       →  BuiltinBvSolver
//!       ▼
//!   ContractOutcome::{Proven, Refuted, Unknown}
//! ```
//!
//! A postcondition is proven when `pre ∧ ¬post` is unsatisfiable with
//! `result` bound to the summarised function body. A satisfying model is
//! reported back as a counterexample.

pub mod bitvec;
pub mod smt_solver;
pub mod translate;

use crate::compiler::binder::{BoundFunction, BoundModule, BoundStmt};
use crate::compiler::scope::SymbolTable;
use crate::compiler::tokens::Span;
use bitvec::{BvExpr, BvValue};
use serde::Serialize;
use smt_solver::{SmtModel, SmtResult, SmtSolver};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use translate::{coerce, BvTerm, TermType, TranslateError, Translator};

// ── Result types ────────────────────────────────────────────────────

/// Input values that violate a contract, in parameter order, followed by
/// the resulting `result` when it could be computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Counterexample {
    pub values: Vec<(String, String)>,
}

impl Counterexample {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return write!(f, "any input");
        }
        let parts: Vec<String> = self.values.iter().map(|(n, v)| format!("{} = {}", n, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail")]
pub enum ContractOutcome {
    Proven,
    Refuted(Counterexample),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractResult {
    pub function: String,
    /// 1-based position among the function's postconditions.
    pub index: usize,
    pub outcome: ContractOutcome,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("postcondition {index} of '{function}' does not hold; counterexample: {counterexample}")]
    Refuted { function: String, index: usize, counterexample: Counterexample, span: Span },
    #[error("preconditions of '{function}' can never be satisfied together")]
    ContradictoryPreconditions { function: String, span: Span },
    #[error("postcondition {index} of '{function}' could not be decided: {reason}")]
    Unknown { function: String, index: usize, reason: String, span: Span },
    #[error("contract of '{function}' was not verified: {cause}")]
    Untranslatable { function: String, cause: TranslateError, span: Span },
}

impl ContractError {
    pub fn span(&self) -> Span {
        match self {
            ContractError::Refuted { span, .. }
            | ContractError::ContradictoryPreconditions { span, .. }
            | ContractError::Unknown { span, .. }
            | ContractError::Untranslatable { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub results: Vec<ContractResult>,
    #[serde(skip)]
    pub errors: Vec<ContractError>,
}

impl VerificationReport {
    pub fn proven(&self) -> usize {
        self.results.iter().filter(|r| r.outcome == ContractOutcome::Proven).count()
    }

    pub fn refuted(&self) -> usize {
        self.results.iter().filter(|r| matches!(r.outcome, ContractOutcome::Refuted(_))).count()
    }

    pub fn for_function<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ContractResult> + 'a {
        self.results.iter().filter(move |r| r.function == id)
    }
}

// ── Public entry point ──────────────────────────────────────────────

/// Verify the contracts of every function in `module`.
pub fn verify_module(module: &BoundModule, solver: &dyn SmtSolver) -> VerificationReport {
    let mut report = VerificationReport::default();
    for f in &module.functions {
        if f.preconditions.is_empty() && f.postconditions.is_empty() {
            continue;
        }
        verify_function(&module.symbols, f, solver, &mut report);
    }
    info!(
        solver = solver.solver_name(),
        contracts = report.results.len(),
        proven = report.proven(),
        refuted = report.refuted(),
        "verified contracts"
    );
    report
}

fn verify_function(symbols: &SymbolTable, f: &BoundFunction, solver: &dyn SmtSolver, report: &mut VerificationReport) {
    let mut t = Translator::new(symbols);
    let mut params = Vec::with_capacity(f.params.len());
    for p in &f.params {
        if t.declare_symbol(*p) {
            let name = symbols.name(*p);
            if let Some(term) = t.context().lookup(name) {
                params.push((name.to_string(), term.ty));
            }
        }
    }

    let mut pres = Vec::with_capacity(f.preconditions.len());
    let mut pre_failed = false;
    for pre in &f.preconditions {
        match t.translate_bool(pre) {
            Ok(e) => pres.push(e),
            Err(cause) => {
                pre_failed = true;
                report.errors.push(untranslatable(f, cause));
            }
        }
    }
    if !pre_failed && !pres.is_empty() && solver.check_sat(&pres).is_unsat() {
        report.errors.push(ContractError::ContradictoryPreconditions { function: f.name.clone(), span: f.span });
    }
    if f.postconditions.is_empty() {
        return;
    }

    let result = if f.result_symbol.is_some() { summarize_body(&mut t, f) } else { Err("function returns no value".into()) };
    if let Ok(term) = &result {
        t.context_mut().bind("result", term.clone());
    }

    for (i, post) in f.postconditions.iter().enumerate() {
        let index = i + 1;
        let outcome = if pre_failed {
            ContractOutcome::Unknown("a precondition could not be translated".into())
        } else {
            match t.translate_bool(post) {
                Ok(p) => check_postcondition(f, index, &pres, p, (&params, result.as_ref().ok()), solver, report),
                Err(TranslateError::UnknownVariable { name, span }) if name == "result" => {
                    let reason = result.as_ref().err().cloned().unwrap_or_default();
                    report.errors.push(ContractError::Unknown {
                        function: f.name.clone(),
                        index,
                        reason: reason.clone(),
                        span,
                    });
                    ContractOutcome::Unknown(reason)
                }
                Err(cause) => {
                    let reason = cause.to_string();
                    report.errors.push(untranslatable(f, cause));
                    ContractOutcome::Unknown(reason)
                }
            }
        };
        debug!(function = %f.id, index, ?outcome, "postcondition checked");
        report.results.push(ContractResult { function: f.id.clone(), index, outcome, span: post.span });
    }
}

fn untranslatable(f: &BoundFunction, cause: TranslateError) -> ContractError {
    let span = cause.span();
    ContractError::Untranslatable { function: f.name.clone(), cause, span }
}

fn check_postcondition(
    f: &BoundFunction,
    index: usize,
    pres: &[BvExpr],
    post: BvExpr,
    (params, result): (&[(String, TermType)], Option<&BvTerm>),
    solver: &dyn SmtSolver,
    report: &mut VerificationReport,
) -> ContractOutcome {
    let span = f.postconditions[index - 1].span;
    let mut query = pres.to_vec();
    query.push(BvExpr::not(post));
    let (answer, model) = solver.check_sat_with_model(&query);
    let reason = match answer {
        SmtResult::Unsat => return ContractOutcome::Proven,
        SmtResult::Sat => {
            let counterexample = model.map(|m| counterexample(params, &m, result)).unwrap_or_default();
            report.errors.push(ContractError::Refuted {
                function: f.name.clone(),
                index,
                counterexample: counterexample.clone(),
                span,
            });
            return ContractOutcome::Refuted(counterexample);
        }
        SmtResult::Timeout => "solver timed out".to_string(),
        SmtResult::Unknown(reason) => reason,
        SmtResult::Error(e) => format!("solver error: {}", e),
    };
    report.errors.push(ContractError::Unknown { function: f.name.clone(), index, reason: reason.clone(), span });
    ContractOutcome::Unknown(reason)
}

fn render(value: BvValue, ty: TermType) -> String {
    match (value, ty) {
        (BvValue::Bool(b), _) => b.to_string(),
        (v, TermType::Int { signed, .. }) => v.to_integer(signed).map(|n| n.to_string()).unwrap_or_default(),
        (v, TermType::Bool) => format!("{:?}", v),
    }
}

/// Model values for the parameters, in declaration order, plus the
/// value of `result` computed from the summarised body.
fn counterexample(params: &[(String, TermType)], model: &SmtModel, result: Option<&BvTerm>) -> Counterexample {
    let mut out = Counterexample::default();
    for (name, ty) in params {
        if let Some(value) = model.get(name) {
            out.values.push((name.clone(), render(value, *ty)));
        }
    }
    if let Some(term) = result {
        if let Ok(value) = term.expr.eval(&model.assignments) {
            out.values.push(("result".to_string(), render(value, term.ty)));
        }
    }
    out
}

// ── Body summaries ──────────────────────────────────────────────────

/// Express the function's return value as a single term. Supported bodies
/// are straight-line: `§B` bindings followed by `§R expr`, where any `§IF`
/// must return on every path.
fn summarize_body(t: &mut Translator<'_>, f: &BoundFunction) -> Result<BvTerm, String> {
    let Some(ret) = TermType::of(&f.return_type) else {
        return Err(format!("return type {} cannot be verified", f.return_type));
    };
    t.context_mut().push();
    let summary = summarize(t, ret, &[f.body.as_slice()]);
    t.context_mut().pop();
    match summary {
        Ok(Some(term)) => Ok(term),
        Ok(None) => Err("function body is not straight-line".into()),
        Err(e) => Err(format!("function body could not be translated: {}", e)),
    }
}

fn scoped<'s>(t: &mut Translator<'_>, ret: TermType, blocks: &[&'s [BoundStmt]]) -> Result<Option<BvTerm>, TranslateError> {
    t.context_mut().push();
    let summary = summarize(t, ret, blocks);
    t.context_mut().pop();
    summary
}

fn followed_by<'s>(body: &'s [BoundStmt], rest: &[&'s [BoundStmt]]) -> Vec<&'s [BoundStmt]> {
    let mut blocks = Vec::with_capacity(rest.len() + 1);
    blocks.push(body);
    blocks.extend_from_slice(rest);
    blocks
}

/// Summarise `blocks` run in sequence; `None` when some path does not
/// end in a supported return.
fn summarize<'s>(t: &mut Translator<'_>, ret: TermType, blocks: &[&'s [BoundStmt]]) -> Result<Option<BvTerm>, TranslateError> {
    let Some((&first, outer)) = blocks.split_first() else {
        return Ok(None);
    };
    for (i, stmt) in first.iter().enumerate() {
        match stmt {
            BoundStmt::Bind { symbol, value, span } => {
                let term = t.translate(value)?;
                let term = match TermType::of(&t.symbol_type(*symbol)) {
                    Some(tt) if tt != term.ty => coerce(term, tt, *span)?,
                    _ => term,
                };
                let name = t.symbol_name(*symbol);
                t.context_mut().bind(&name, term);
            }
            BoundStmt::Return { value: Some(value), span } => {
                let term = t.translate(value)?;
                return coerce(term, ret, *span).map(Some);
            }
            BoundStmt::If { condition, then_body, else_ifs, else_body, .. } => {
                let rest = followed_by(&first[i + 1..], outer);
                let fallback = match else_body {
                    Some(body) => scoped(t, ret, &followed_by(body, &rest))?,
                    None => scoped(t, ret, &rest)?,
                };
                let Some(mut acc) = fallback else {
                    return Ok(None);
                };
                let arms: Vec<_> = std::iter::once((condition, then_body)).chain(else_ifs.iter().map(|(c, b)| (c, b))).collect();
                for (cond, body) in arms.into_iter().rev() {
                    let c = t.translate_bool(cond)?;
                    let Some(branch) = scoped(t, ret, &followed_by(body, &rest))? else {
                        return Ok(None);
                    };
                    acc = BvTerm::new(BvExpr::Ite(Box::new(c), Box::new(branch.expr), Box::new(acc.expr)), ret);
                }
                return Ok(Some(acc));
            }
            _ => return Ok(None),
        }
    }
    summarize(t, ret, outer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::binder::bind;
    use crate::compiler::parser::parse;
    use smt_solver::BuiltinBvSolver;

    fn bound(src: &str) -> BoundModule {
        let out = parse(&format!("§M{{m1:T}} {} §/M{{m1}}", src));
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let bound = bind(&out.module.expect("module")).expect("bind");
        assert!(bound.errors.is_empty(), "{:?}", bound.errors);
        bound.module
    }

    fn verify(src: &str) -> VerificationReport {
        verify_module(&bound(src), &BuiltinBvSolver::new())
    }

    #[test]
    fn division_postcondition_is_refuted() {
        let report = verify("§F{f1:Div} §I{i32:a} §I{i32:b} §O{i32} §Q (b != 0) §S (result >= 0) §R (a / b) §/F{f1}");
        let [result] = report.results.as_slice() else { panic!("{:?}", report.results) };
        let ContractOutcome::Refuted(ce) = &result.outcome else { panic!("{:?}", result.outcome) };
        let a: i64 = ce.get("a").and_then(|v| v.parse().ok()).expect("a");
        let b: i64 = ce.get("b").and_then(|v| v.parse().ok()).expect("b");
        let r: i64 = ce.get("result").and_then(|v| v.parse().ok()).expect("result");
        assert_ne!(b, 0);
        assert_eq!(r, (a as i32).wrapping_div(b as i32) as i64);
        assert!(r < 0);
        assert!(matches!(&report.errors[..], [ContractError::Refuted { index: 1, .. }]));
    }

    #[test]
    fn byte_postcondition_is_proven_exhaustively() {
        let report = verify("§F{f1:Half} §I{u8:x} §O{u8} §S (result <= x) §R (x / 2) §/F{f1}");
        assert_eq!(report.results[0].outcome, ContractOutcome::Proven);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn branches_are_summarised() {
        let report = verify(
            "§F{f1:Abs} §I{i8:x} §O{i8} §S (result >= 0) \
             §IF{if1} (x < 0) §R (- x) §EL §R x §/IF{if1} §/F{f1}",
        );
        // -128 has no positive counterpart in eight bits.
        let ContractOutcome::Refuted(ce) = &report.results[0].outcome else { panic!("{:?}", report.results) };
        assert_eq!(ce.get("x"), Some("-128"));
    }

    #[test]
    fn if_without_else_continues_with_following_statements() {
        let report = verify(
            "§F{f1:Clamp} §I{u8:x} §O{u8} §S (result <= 10) \
             §IF{if1} (x > 10) §R 10 §/IF{if1} §B{y} x §R y §/F{f1}",
        );
        assert_eq!(report.results[0].outcome, ContractOutcome::Proven);
    }

    #[test]
    fn contradictory_preconditions_are_flagged() {
        let report = verify("§F{f1:F} §I{u8:x} §Q (x > 5) §Q (x < 3) §/F{f1}");
        assert!(matches!(&report.errors[..], [ContractError::ContradictoryPreconditions { .. }]));
    }

    #[test]
    fn loops_leave_result_unknown() {
        let report = verify(
            "§F{f1:Sum} §I{i32:n} §O{i32} §S (result >= 0) \
             §B{~s} 0 §L{l1:i} 0 n §SET{s} (s + i) §/L{l1} §R s §/F{f1}",
        );
        assert!(matches!(report.results[0].outcome, ContractOutcome::Unknown(_)));
        assert!(matches!(&report.errors[..], [ContractError::Unknown { .. }]));
    }

    #[test]
    fn untranslatable_contracts_are_reported_once() {
        let report = verify("§F{f1:F} §I{str:s} §O{i32} §Q (s != null) §S (result > 0) §R 1 §/F{f1}");
        assert!(matches!(&report.errors[..], [ContractError::Untranslatable { .. }]));
        assert!(matches!(report.results[0].outcome, ContractOutcome::Unknown(_)));
    }

    struct Fixed(SmtResult);

    impl SmtSolver for Fixed {
        fn check_sat_with_model(&self, _: &[BvExpr]) -> (SmtResult, Option<SmtModel>) {
            (self.0.clone(), None)
        }

        fn solver_name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn solver_timeout_is_unknown_not_success() {
        let m = bound("§F{f1:Id} §I{i32:a} §O{i32} §S (result == a) §R a §/F{f1}");
        let report = verify_module(&m, &Fixed(SmtResult::Timeout));
        assert_eq!(report.results[0].outcome, ContractOutcome::Unknown("solver timed out".into()));
        let report = verify_module(&m, &Fixed(SmtResult::Unsat));
        assert_eq!(report.proven(), 1);
    }
}
