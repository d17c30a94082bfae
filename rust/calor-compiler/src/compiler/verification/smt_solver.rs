//! Solver backends for bit-vector contract queries.
//!
//! Every backend implements [`SmtSolver`]:
//!
//! - **`BuiltinBvSolver`** — bounded model search over the formula's free
//!   variables with exact two's-complement evaluation. Always available.
//! - **`Z3ProcessSolver`** — talks to a `z3` executable via SMT-LIB2 over
//!   stdin/stdout.
//!
//! Use [`SmtSolverFactory::create`] with a [`SolverChoice`] to pick one.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};

use super::bitvec::{boundary_values, full_domain, mask, symbol, Assignment, BvExpr, BvValue, EvalError, Sort};

// ── Results ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtResult {
    Sat,
    Unsat,
    Unknown(String),
    Timeout,
    Error(String),
}

impl SmtResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SmtResult::Sat)
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SmtResult::Unsat)
    }
}

impl fmt::Display for SmtResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtResult::Sat => write!(f, "sat"),
            SmtResult::Unsat => write!(f, "unsat"),
            SmtResult::Unknown(reason) => write!(f, "unknown ({})", reason),
            SmtResult::Timeout => write!(f, "timeout"),
            SmtResult::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// Satisfying assignment returned with a `Sat` answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SmtModel {
    pub assignments: BTreeMap<String, BvValue>,
}

impl SmtModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<BvValue> {
        self.assignments.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

// ── SmtSolver trait ─────────────────────────────────────────────────

/// A decision procedure for conjunctions of bit-vector formulas.
pub trait SmtSolver: Send + Sync {
    /// Check whether the conjunction of `assertions` is satisfiable.
    fn check_sat(&self, assertions: &[BvExpr]) -> SmtResult {
        self.check_sat_with_model(assertions).0
    }

    /// Like [`check_sat`](Self::check_sat), also returning a model when
    /// the answer is `Sat`.
    fn check_sat_with_model(&self, assertions: &[BvExpr]) -> (SmtResult, Option<SmtModel>);

    fn solver_name(&self) -> &str;
}

/// Which backend the verifier should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SolverChoice {
    /// Z3 when installed, otherwise the builtin solver.
    #[default]
    Auto,
    Z3,
    Builtin,
}

// ── SMT-LIB2 scripts ────────────────────────────────────────────────

fn logic_for(assertions: &[BvExpr]) -> &'static str {
    if assertions.iter().any(BvExpr::has_quantifier) {
        "ALL"
    } else if assertions.iter().any(BvExpr::has_array) {
        "QF_ABV"
    } else {
        "QF_BV"
    }
}

/// Generate a complete SMT-LIB2 script for `assertions`.
pub fn generate_smtlib2_script(assertions: &[BvExpr], timeout_ms: Option<u64>, get_model: bool) -> String {
    let mut script = String::new();
    if get_model {
        script.push_str("(set-option :produce-models true)\n");
    }
    if let Some(ms) = timeout_ms {
        script.push_str(&format!("(set-option :timeout {})\n", ms));
    }
    script.push_str(&format!("(set-logic {})\n", logic_for(assertions)));

    let mut seen = HashSet::new();
    for assertion in assertions {
        for (name, sort) in assertion.free_vars() {
            if seen.insert(name.clone()) {
                script.push_str(&format!("(declare-const {} {})\n", symbol(&name), sort));
            }
        }
    }
    for assertion in assertions {
        script.push_str(&format!("(assert {})\n", assertion.to_smtlib2()));
    }

    script.push_str("(check-sat)\n");
    if get_model {
        script.push_str("(get-model)\n");
    }
    script.push_str("(exit)\n");
    script
}

// ── BuiltinBvSolver ─────────────────────────────────────────────────

/// Bounded model search. A witness found during the search is a genuine
/// model. `Unsat` is only returned when every variable's full domain was
/// enumerated within the evaluation budget; anything else is `Unknown`.
pub struct BuiltinBvSolver {
    max_evaluations: u64,
}

impl BuiltinBvSolver {
    pub fn new() -> Self {
        Self { max_evaluations: 1 << 20 }
    }

    pub fn with_budget(max_evaluations: u64) -> Self {
        Self { max_evaluations: max_evaluations.max(1) }
    }

    /// Values tried for one variable, and whether they cover its domain.
    fn candidates(sort: &Sort, constants: &[i64]) -> (Vec<BvValue>, bool) {
        if let Some(all) = full_domain(sort) {
            return (all, true);
        }
        let width = sort.width().unwrap_or(64);
        let mut bits = boundary_values(width);
        for c in constants {
            for v in [c.wrapping_sub(1), *c, c.wrapping_add(1)] {
                let b = v as u64 & mask(width);
                if !bits.contains(&b) {
                    bits.push(b);
                }
            }
        }
        (bits.into_iter().map(|b| BvValue::bits(b, width)).collect(), false)
    }
}

impl Default for BuiltinBvSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for BuiltinBvSolver {
    fn check_sat_with_model(&self, assertions: &[BvExpr]) -> (SmtResult, Option<SmtModel>) {
        let formula = BvExpr::and(assertions.to_vec());
        let vars = formula.free_vars();
        if formula.has_array() || vars.iter().any(|(_, s)| matches!(s, Sort::Array { .. })) {
            return (SmtResult::Unknown("arrays are not supported by the builtin solver".into()), None);
        }

        let constants = formula.constants();
        let mut complete = true;
        let domains: Vec<Vec<BvValue>> = vars
            .iter()
            .map(|(_, sort)| {
                let (values, full) = Self::candidates(sort, &constants);
                complete &= full;
                values
            })
            .collect();
        let space = domains.iter().fold(1u64, |acc, d| acc.saturating_mul(d.len() as u64));
        complete &= space <= self.max_evaluations;

        let mut indices = vec![0usize; vars.len()];
        let mut env = Assignment::new();
        let mut evaluated = 0u64;
        let mut undecided = false;
        loop {
            for (i, (name, _)) in vars.iter().enumerate() {
                env.insert(name.clone(), domains[i][indices[i]]);
            }
            match formula.eval(&env).and_then(BvValue::as_bool) {
                Ok(true) => {
                    debug!(evaluated, "builtin solver found a model");
                    return (SmtResult::Sat, Some(SmtModel { assignments: env }));
                }
                Ok(false) => {}
                Err(EvalError::Undecided) => undecided = true,
                Err(e) => return (SmtResult::Error(e.to_string()), None),
            }
            evaluated += 1;
            if evaluated >= self.max_evaluations || !advance(&mut indices, &domains) {
                break;
            }
        }

        if complete && !undecided {
            (SmtResult::Unsat, None)
        } else {
            debug!(evaluated, "builtin solver search was not exhaustive");
            (SmtResult::Unknown("no model within the search bound".into()), None)
        }
    }

    fn solver_name(&self) -> &str {
        "builtin"
    }
}

/// Odometer step over the cartesian product; `false` once exhausted.
fn advance(indices: &mut [usize], domains: &[Vec<BvValue>]) -> bool {
    for i in (0..indices.len()).rev() {
        indices[i] += 1;
        if indices[i] < domains[i].len() {
            return true;
        }
        indices[i] = 0;
    }
    false
}

// ── Z3ProcessSolver ─────────────────────────────────────────────────

/// SMT solver that communicates with Z3 via SMT-LIB2 over stdin/stdout.
pub struct Z3ProcessSolver {
    /// Timeout for Z3 queries in milliseconds.
    timeout_ms: u64,
}

impl Z3ProcessSolver {
    /// Create a Z3 solver with a 5-second timeout, or `None` when `z3`
    /// is not on the path.
    pub fn new() -> Option<Self> {
        Self::with_timeout(5000)
    }

    pub fn with_timeout(timeout_ms: u64) -> Option<Self> {
        Self::is_available().then_some(Self { timeout_ms })
    }

    pub fn is_available() -> bool {
        Command::new("z3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    /// Run Z3 on `script`, returning the result and raw output.
    fn run_z3(&self, script: &str) -> (SmtResult, String) {
        // Z3's own soft timeout fires first; the process deadline is a
        // backstop for a hung solver.
        let deadline = Duration::from_millis(self.timeout_ms.saturating_add(1000));
        let mut command = Command::new("z3");
        command.arg("-in").arg("-smt2");
        match run_with_deadline(command, script, deadline) {
            Ok(Some(stdout)) => (parse_result(&stdout), stdout),
            Ok(None) => {
                warn!(timeout_ms = self.timeout_ms, "z3 did not answer before the deadline");
                (SmtResult::Timeout, String::new())
            }
            Err(e) => (SmtResult::Error(format!("z3: {}", e)), String::new()),
        }
    }
}

/// Feed `input` to `command` and collect its stdout. Stdout is drained on a
/// separate thread so a child writing more than the pipe buffer holds can
/// still exit. `Ok(None)` means the child was killed at the deadline.
fn run_with_deadline(mut command: Command, input: &str, deadline: Duration) -> std::io::Result<Option<String>> {
    let mut child = command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null()).spawn()?;

    let reader = child.stdout.take().map(|mut out| {
        std::thread::spawn(move || {
            let mut text = String::new();
            out.read_to_string(&mut text).map(|_| text)
        })
    });

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(input.as_bytes()) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
    }

    match child.wait_timeout(deadline)? {
        Some(_status) => match reader.map(|handle| handle.join()) {
            Some(Ok(text)) => text.map(Some),
            Some(Err(_)) => Err(std::io::Error::other("output reader panicked")),
            None => Ok(Some(String::new())),
        },
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Ok(None)
        }
    }
}

/// Extension trait for `std::process::Child` to support timeouts.
trait ChildExt {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<std::process::ExitStatus>>;
}

impl ChildExt for std::process::Child {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<std::process::ExitStatus>> {
        let start = std::time::Instant::now();
        loop {
            match self.try_wait()? {
                Some(status) => return Ok(Some(status)),
                None => {
                    if start.elapsed() >= timeout {
                        return Ok(None);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }
}

impl SmtSolver for Z3ProcessSolver {
    fn check_sat(&self, assertions: &[BvExpr]) -> SmtResult {
        let script = generate_smtlib2_script(assertions, Some(self.timeout_ms), false);
        self.run_z3(&script).0
    }

    fn check_sat_with_model(&self, assertions: &[BvExpr]) -> (SmtResult, Option<SmtModel>) {
        let script = generate_smtlib2_script(assertions, Some(self.timeout_ms), true);
        debug!(bytes = script.len(), "sending query to z3");
        let (result, output) = self.run_z3(&script);
        let model = if result.is_sat() { parse_model(&output) } else { None };
        (result, model)
    }

    fn solver_name(&self) -> &str {
        "z3"
    }
}

/// Parse the first line of Z3's output.
fn parse_result(output: &str) -> SmtResult {
    let first_line = output.lines().next().unwrap_or("").trim();
    match first_line {
        "sat" => SmtResult::Sat,
        "unsat" => SmtResult::Unsat,
        "unknown" => SmtResult::Unknown("z3 returned unknown".to_string()),
        "timeout" => SmtResult::Timeout,
        _ if first_line.starts_with("(error") => SmtResult::Error(first_line.to_string()),
        _ => SmtResult::Error(format!("unexpected z3 output: {}", first_line)),
    }
}

// ── Model parsing ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' | ')' => tokens.push(c.to_string()),
            c if c.is_whitespace() => {}
            '|' => {
                let mut atom = String::from("|");
                for d in chars.by_ref() {
                    atom.push(d);
                    if d == '|' {
                        break;
                    }
                }
                tokens.push(atom);
            }
            _ => {
                let mut atom = c.to_string();
                while let Some(&d) = chars.peek() {
                    if d == '(' || d == ')' || d.is_whitespace() {
                        break;
                    }
                    atom.push(d);
                    chars.next();
                }
                tokens.push(atom);
            }
        }
    }
    tokens
}

fn parse_sexprs(text: &str) -> Vec<SExpr> {
    let mut stack: Vec<Vec<SExpr>> = vec![Vec::new()];
    for token in tokenize(text) {
        match token.as_str() {
            "(" => stack.push(Vec::new()),
            ")" => {
                if stack.len() > 1 {
                    if let Some(list) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.push(SExpr::List(list));
                        }
                    }
                }
            }
            _ => {
                if let Some(top) = stack.last_mut() {
                    top.push(SExpr::Atom(token));
                }
            }
        }
    }
    stack.into_iter().next().unwrap_or_default()
}

/// Parse the `(get-model)` section of Z3's output. Array and function
/// definitions are skipped.
fn parse_model(output: &str) -> Option<SmtModel> {
    let body = output.split_once('\n').map_or("", |(_, rest)| rest);
    let mut model = SmtModel::new();
    let mut pending = parse_sexprs(body);
    while let Some(expr) = pending.pop() {
        let SExpr::List(items) = expr else { continue };
        if let Some((name, value)) = definition(&items) {
            model.assignments.insert(name, value);
        } else {
            pending.extend(items);
        }
    }
    (!model.is_empty()).then_some(model)
}

/// `(define-fun name () Sort value)` for a constant.
fn definition(items: &[SExpr]) -> Option<(String, BvValue)> {
    match items {
        [SExpr::Atom(head), SExpr::Atom(name), SExpr::List(args), _sort, value] if head == "define-fun" && args.is_empty() => {
            Some((name.trim_matches('|').to_string(), parse_value(value)?))
        }
        _ => None,
    }
}

fn parse_value(value: &SExpr) -> Option<BvValue> {
    match value {
        SExpr::Atom(a) if a == "true" => Some(BvValue::Bool(true)),
        SExpr::Atom(a) if a == "false" => Some(BvValue::Bool(false)),
        SExpr::Atom(a) => {
            if let Some(hex) = a.strip_prefix("#x") {
                let bits = u64::from_str_radix(hex, 16).ok()?;
                return Some(BvValue::bits(bits, (hex.len() * 4) as u32));
            }
            let bin = a.strip_prefix("#b")?;
            let bits = u64::from_str_radix(bin, 2).ok()?;
            Some(BvValue::bits(bits, bin.len() as u32))
        }
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Atom(u), SExpr::Atom(v), SExpr::Atom(w)] if u == "_" => {
                let bits = v.strip_prefix("bv")?.parse::<u64>().ok()?;
                Some(BvValue::bits(bits, w.parse().ok()?))
            }
            _ => None,
        },
    }
}

// ── SmtSolverFactory ────────────────────────────────────────────────

/// Factory for creating SMT solver instances.
pub struct SmtSolverFactory;

impl SmtSolverFactory {
    /// Create the solver named by `choice`. An explicit `Z3` request falls
    /// back to the builtin solver when Z3 is not installed.
    pub fn create(choice: SolverChoice, timeout_ms: u64) -> Box<dyn SmtSolver> {
        match choice {
            SolverChoice::Builtin => Self::create_builtin(),
            SolverChoice::Auto => Self::create_z3(timeout_ms).unwrap_or_else(Self::create_builtin),
            SolverChoice::Z3 => Self::create_z3(timeout_ms).unwrap_or_else(|| {
                warn!("z3 requested but not installed; using the builtin solver");
                Self::create_builtin()
            }),
        }
    }

    /// Create a Z3 solver, or `None` if Z3 is not installed.
    pub fn create_z3(timeout_ms: u64) -> Option<Box<dyn SmtSolver>> {
        Z3ProcessSolver::with_timeout(timeout_ms).map(|s| Box::new(s) as Box<dyn SmtSolver>)
    }

    /// Create the builtin solver (always available).
    pub fn create_builtin() -> Box<dyn SmtSolver> {
        Box::new(BuiltinBvSolver::new())
    }

    pub fn available_solvers() -> Vec<String> {
        let mut solvers = vec!["builtin".to_string()];
        if Z3ProcessSolver::is_available() {
            solvers.push("z3".to_string());
        }
        solvers
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::verification::bitvec::{to_signed, BvCmp, BvOp};
    use std::str::FromStr;

    fn bv(name: &str, width: u32) -> BvExpr {
        BvExpr::var(name, Sort::BitVec(width))
    }

    #[test]
    fn builtin_finds_division_counterexample() {
        let pre = BvExpr::not(BvExpr::equals(bv("b", 32), BvExpr::constant(0, 32)));
        let post = BvExpr::compare(BvCmp::Sge, BvExpr::binary(BvOp::SDiv, bv("a", 32), bv("b", 32)), BvExpr::constant(0, 32));
        let (result, model) = BuiltinBvSolver::new().check_sat_with_model(&[pre, BvExpr::not(post)]);
        assert_eq!(result, SmtResult::Sat);
        let model = model.expect("model");
        let (Some(BvValue::Bits { bits: a, .. }), Some(BvValue::Bits { bits: b, .. })) = (model.get("a"), model.get("b"))
        else {
            panic!("missing assignments: {:?}", model);
        };
        let (a, b) = (to_signed(a, 32), to_signed(b, 32));
        assert_ne!(b, 0);
        assert!(a.wrapping_div(b) < 0);
    }

    #[test]
    fn builtin_proves_small_domains_exhaustively() {
        let x = bv("x", 8);
        let f = BvExpr::and(vec![
            BvExpr::compare(BvCmp::Ugt, x.clone(), BvExpr::constant(200, 8)),
            BvExpr::compare(BvCmp::Ult, x, BvExpr::constant(100, 8)),
        ]);
        assert_eq!(BuiltinBvSolver::new().check_sat(&[f]), SmtResult::Unsat);
    }

    #[test]
    fn builtin_is_unknown_on_wide_unsat_queries() {
        let f = BvExpr::not(BvExpr::equals(bv("x", 32), bv("x", 32)));
        assert!(matches!(BuiltinBvSolver::new().check_sat(&[f]), SmtResult::Unknown(_)));
    }

    #[test]
    fn builtin_gives_up_on_arrays() {
        let array = BvExpr::var("xs", Sort::Array { index: 64, element: 32 });
        let f = BvExpr::equals(BvExpr::Select(Box::new(array), Box::new(bv("i", 64))), BvExpr::constant(1, 32));
        assert!(matches!(BuiltinBvSolver::new().check_sat(&[f]), SmtResult::Unknown(_)));
    }

    #[test]
    fn builtin_respects_budget() {
        let f = BvExpr::equals(bv("x", 8), BvExpr::constant(255, 8));
        let (result, _) = BuiltinBvSolver::with_budget(10).check_sat_with_model(&[f]);
        assert!(matches!(result, SmtResult::Unknown(_)));
    }

    #[test]
    fn script_declares_free_variables_once() {
        let a = bv("a", 32);
        let f1 = BvExpr::compare(BvCmp::Sgt, a.clone(), BvExpr::constant(0, 32));
        let f2 = BvExpr::compare(BvCmp::Slt, a, BvExpr::constant(9, 32));
        let script = generate_smtlib2_script(&[f1, f2], Some(100), true);
        assert!(script.contains("(set-logic QF_BV)"));
        assert_eq!(script.matches("(declare-const a (_ BitVec 32))").count(), 1);
        assert!(script.contains("(assert (bvsgt a (_ bv0 32)))"));
        assert!(script.contains("(get-model)"));
    }

    #[test]
    fn script_logic_follows_content() {
        let array = BvExpr::var("xs", Sort::Array { index: 64, element: 8 });
        let sel = BvExpr::equals(BvExpr::Select(Box::new(array), Box::new(bv("i", 64))), BvExpr::constant(0, 8));
        assert!(generate_smtlib2_script(&[sel], None, false).contains("(set-logic QF_ABV)"));
        let q = BvExpr::Forall(vec![("i!q0".into(), Sort::BitVec(8))], Box::new(BvExpr::Bool(true)));
        assert!(generate_smtlib2_script(&[q], None, false).contains("(set-logic ALL)"));
    }

    #[test]
    fn parses_multiline_z3_model() {
        let output = "sat\n(\n  (define-fun b () (_ BitVec 32)\n    #x00000002)\n  (define-fun a () (_ BitVec 32)\n    #xfffffffc)\n  (define-fun ok () Bool\n    false)\n)\n";
        let model = parse_model(output).expect("model");
        assert_eq!(model.get("a"), Some(BvValue::bits(0xfffffffc, 32)));
        assert_eq!(model.get("b"), Some(BvValue::bits(2, 32)));
        assert_eq!(model.get("ok"), Some(BvValue::Bool(false)));
    }

    #[test]
    fn parses_legacy_model_and_binary_literals() {
        let output = "sat\n(model\n  (define-fun |x y| () (_ BitVec 4) #b1010)\n  (define-fun z () (_ BitVec 16) (_ bv7 16))\n)";
        let model = parse_model(output).expect("model");
        assert_eq!(model.get("x y"), Some(BvValue::bits(10, 4)));
        assert_eq!(model.get("z"), Some(BvValue::bits(7, 16)));
    }

    #[test]
    fn result_line_parsing() {
        assert_eq!(parse_result("unsat\n"), SmtResult::Unsat);
        assert_eq!(parse_result("timeout"), SmtResult::Timeout);
        assert!(matches!(parse_result("(error \"line 1\")"), SmtResult::Error(_)));
    }

    #[test]
    fn solver_choice_parses_from_config_strings() {
        assert_eq!(SolverChoice::from_str("z3").ok(), Some(SolverChoice::Z3));
        assert_eq!(SolverChoice::from_str("builtin").ok(), Some(SolverChoice::Builtin));
        assert_eq!(SolverChoice::default().to_string(), "auto");
    }

    #[test]
    fn factory_builtin_always_works() {
        let solver = SmtSolverFactory::create(SolverChoice::Builtin, 1000);
        assert_eq!(solver.solver_name(), "builtin");
        assert!(SmtSolverFactory::available_solvers().contains(&"builtin".to_string()));
    }

    #[test]
    fn z3_agrees_with_builtin_when_installed() {
        let Some(z3) = Z3ProcessSolver::new() else {
            return;
        };
        let pre = BvExpr::not(BvExpr::equals(bv("b", 32), BvExpr::constant(0, 32)));
        let post = BvExpr::compare(BvCmp::Sge, BvExpr::binary(BvOp::SDiv, bv("a", 32), bv("b", 32)), BvExpr::constant(0, 32));
        let (result, model) = z3.check_sat_with_model(&[pre, BvExpr::not(post)]);
        assert_eq!(result, SmtResult::Sat);
        assert!(model.is_some_and(|m| m.get("a").is_some()));
    }

    #[cfg(unix)]
    #[test]
    fn large_child_output_is_drained_before_exit() {
        // Far more than a pipe buffer; the child only exits once it is read.
        let mut command = Command::new("sh");
        command.arg("-c").arg("cat >/dev/null; i=0; while [ $i -lt 4000 ]; do echo 'x_value () (_ BitVec 32) #x00000000'; i=$((i+1)); done");
        let out = run_with_deadline(command, "(check-sat)\n", Duration::from_secs(20)).expect("runs");
        let text = out.expect("finished before the deadline");
        assert_eq!(text.lines().count(), 4000);
    }

    #[cfg(unix)]
    #[test]
    fn hung_child_is_killed_at_deadline() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("sleep 5");
        let out = run_with_deadline(command, "", Duration::from_millis(100)).expect("runs");
        assert!(out.is_none());
    }
}
