//! Contract translation and verification through the public pipeline.

use calor_compiler::compiler::binder::{bind, BoundExprKind, BoundModule};
use calor_compiler::compiler::parser::parse;
use calor_compiler::compiler::verification::bitvec::{Assignment, BvCmp, BvExpr, BvOp, BvValue, Sort};
use calor_compiler::compiler::verification::smt_solver::{
    BuiltinBvSolver, SmtModel, SmtResult, SmtSolver, SmtSolverFactory, Z3ProcessSolver,
};
use calor_compiler::compiler::verification::translate::Translator;
use calor_compiler::compiler::verification::ContractOutcome;
use calor_compiler::diagnostics::Severity;
use calor_compiler::{compile_with_solver, CompileOptions, CompileOutput};
use std::sync::atomic::{AtomicUsize, Ordering};

fn bound(body: &str) -> BoundModule {
    let out = parse(&format!("§M{{m001:Test}} {} §/M{{m001}}", body));
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let bound = bind(&out.module.expect("module")).expect("bind");
    assert!(bound.errors.is_empty(), "{:?}", bound.errors);
    bound.module
}

fn verify_with(body: &str, solver: &dyn SmtSolver) -> CompileOutput {
    let src = format!("§M{{m001:Test}} {} §/M{{m001}}", body);
    compile_with_solver(&src, Some("contracts.calr"), &CompileOptions::default(), solver).expect("compiles")
}

// ── Scenario: a / b can be negative ──

#[test]
fn signed_division_postcondition_is_refuted() {
    let out = verify_with(
        "§F{f001:Div:pub} §I{i32:a} §I{i32:b} §O{i32} §Q (b != 0) §S (result >= 0) §R (a / b) §/F{f001}",
        &BuiltinBvSolver::new(),
    );
    let report = out.verification.expect("verified");
    let ContractOutcome::Refuted(ce) = &report.results[0].outcome else { panic!("{:?}", report.results) };
    let a: i32 = ce.get("a").and_then(|v| v.parse().ok()).expect("a");
    let b: i32 = ce.get("b").and_then(|v| v.parse().ok()).expect("b");
    assert_ne!(b, 0);
    assert!(a.wrapping_div(b) < 0, "a = {}, b = {}", a, b);

    let d = out.diagnostics.with_code("E0200").next().expect("refutation diagnostic");
    assert_eq!(d.severity, Severity::Error);
    assert!(d.message.contains("counterexample: a = "), "{}", d.message);
}

#[test]
fn fixed_postcondition_is_proven_on_bytes() {
    let out = verify_with(
        "§F{f001:Half:pub} §I{u8:x} §O{u8} §S (result <= x) §R (x / 2) §/F{f001}",
        &BuiltinBvSolver::new(),
    );
    let report = out.verification.expect("verified");
    assert_eq!(report.proven(), 1);
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
}

#[test]
fn contradictory_preconditions_warn() {
    let out = verify_with("§F{f001:F} §I{u8:x} §Q (x > 5) §Q (x < 3) §/F{f001}", &BuiltinBvSolver::new());
    let d = out.diagnostics.with_code("E0201").next().expect("contradiction");
    assert_eq!(d.severity, Severity::Warning);
}

// ── Width normalisation ──

#[test]
fn mixed_width_addition_is_thirty_two_bits() {
    let m = bound("§F{f001:F} §I{u8:a} §I{i32:b} §Q ((a + b) > 0) §/F{f001}");
    let f = &m.functions[0];
    let mut t = Translator::new(&m.symbols);
    for p in &f.params {
        assert!(t.declare_symbol(*p));
    }
    let BoundExprKind::Binary(sum, _, _) = &f.preconditions[0].kind else { panic!("binary") };
    let translated = t.translate(sum).expect("translates");
    assert_eq!(translated.width(), Some(32));

    let widened = BvExpr::binary(
        BvOp::Add,
        BvExpr::ZeroExtend(24, Box::new(BvExpr::var("a", Sort::BitVec(8)))),
        BvExpr::var("b", Sort::BitVec(32)),
    );
    assert_eq!(translated.expr, widened);

    // Same truth value for every byte and a spread of 32-bit values.
    let auto = BvExpr::compare(BvCmp::Sgt, translated.expr.clone(), BvExpr::constant(0, 32));
    let manual = BvExpr::compare(BvCmp::Sgt, widened, BvExpr::constant(0, 32));
    for a in 0..=255u64 {
        for b in [0i64, 1, -1, -200, -256, 1 << 20, i32::MIN as i64, i32::MAX as i64] {
            let env: Assignment = [
                ("a".to_string(), BvValue::bits(a, 8)),
                ("b".to_string(), BvValue::bits(b as u64, 32)),
            ]
            .into_iter()
            .collect();
            assert_eq!(auto.eval(&env), manual.eval(&env), "a = {}, b = {}", a, b);
        }
    }
}

#[test]
fn widened_formulas_agree_under_z3() {
    let Some(z3) = Z3ProcessSolver::new() else {
        eprintln!("z3 not installed; skipping");
        return;
    };
    let a = || BvExpr::var("a", Sort::BitVec(8));
    let b = || BvExpr::var("b", Sort::BitVec(32));
    let auto = BvExpr::binary(BvOp::Add, BvExpr::ZeroExtend(24, Box::new(a())), b());
    let manual = BvExpr::binary(BvOp::Add, b(), BvExpr::ZeroExtend(24, Box::new(a())));
    let differ = BvExpr::not(BvExpr::equals(auto, manual));
    assert_eq!(z3.check_sat(&[differ]), SmtResult::Unsat);
}

// ── Solver boundary ──

/// Answers every query with the same result and counts calls.
struct Scripted {
    answer: SmtResult,
    calls: AtomicUsize,
}

impl SmtSolver for Scripted {
    fn check_sat_with_model(&self, _assertions: &[BvExpr]) -> (SmtResult, Option<SmtModel>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer.clone(), None)
    }

    fn solver_name(&self) -> &str {
        "scripted"
    }
}

#[test]
fn timeout_is_unknown_and_not_retried() {
    let solver = Scripted { answer: SmtResult::Timeout, calls: AtomicUsize::new(0) };
    let out = verify_with("§F{f001:Id} §I{i32:a} §O{i32} §S (result == a) §R a §/F{f001}", &solver);
    let report = out.verification.expect("verified");
    assert!(matches!(report.results[0].outcome, ContractOutcome::Unknown(_)));
    assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
    let d = out.diagnostics.with_code("E0202").next().expect("unknown diagnostic");
    assert_eq!(d.severity, Severity::Info);
}

#[test]
fn untranslatable_contract_is_info() {
    let out = verify_with(
        "§F{f001:Len} §I{str:s} §O{i32} §Q (s != null) §S (result >= 0) §R 0 §/F{f001}",
        &BuiltinBvSolver::new(),
    );
    let d = out.diagnostics.with_code("E0203").next().expect("untranslatable");
    assert_eq!(d.severity, Severity::Info);
    assert!(!out.has_errors());
}

#[test]
fn factory_always_offers_builtin() {
    assert!(SmtSolverFactory::available_solvers().contains(&"builtin".to_string()));
    assert_eq!(SmtSolverFactory::create_builtin().solver_name(), "builtin");
}
