//! Fixed-width bit-vector formulas.
//!
//! [`BvExpr`] is the solver-independent formula IR produced by the contract
//! translator. It renders to SMT-LIB2 for process solvers and can be
//! evaluated directly under an assignment with exact two's-complement
//! semantics, matching the SMT-LIB `FixedSizeBitVectors` theory including
//! its total definitions of division and remainder by zero.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use strum_macros::Display;
use thiserror::Error;

/// Index sort of every uninterpreted array.
pub const ARRAY_INDEX_WIDTH: u32 = 64;

/// Largest bit width for which a quantifier is evaluated by enumerating
/// its whole domain.
const ENUMERABLE_WIDTH: u32 = 8;

// ── Sorts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Sort {
    Bool,
    BitVec(u32),
    /// Array from `(_ BitVec index)` to `(_ BitVec element)`.
    Array { index: u32, element: u32 },
}

impl Sort {
    pub fn width(&self) -> Option<u32> {
        match self {
            Sort::BitVec(w) => Some(*w),
            _ => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::BitVec(w) => write!(f, "(_ BitVec {})", w),
            Sort::Array { index, element } => {
                write!(f, "(Array (_ BitVec {}) (_ BitVec {}))", index, element)
            }
        }
    }
}

// ── Operators ───────────────────────────────────────────────────────

/// Bit-vector operators producing a bit-vector of the operands' width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum BvOp {
    #[strum(serialize = "bvadd")]
    Add,
    #[strum(serialize = "bvsub")]
    Sub,
    #[strum(serialize = "bvmul")]
    Mul,
    #[strum(serialize = "bvsdiv")]
    SDiv,
    #[strum(serialize = "bvudiv")]
    UDiv,
    #[strum(serialize = "bvsrem")]
    SRem,
    #[strum(serialize = "bvurem")]
    URem,
    #[strum(serialize = "bvand")]
    And,
    #[strum(serialize = "bvor")]
    Or,
    #[strum(serialize = "bvxor")]
    Xor,
    #[strum(serialize = "bvshl")]
    Shl,
    #[strum(serialize = "bvlshr")]
    LShr,
    #[strum(serialize = "bvashr")]
    AShr,
}

/// Bit-vector comparisons producing a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum BvCmp {
    #[strum(serialize = "bvslt")]
    Slt,
    #[strum(serialize = "bvsle")]
    Sle,
    #[strum(serialize = "bvsgt")]
    Sgt,
    #[strum(serialize = "bvsge")]
    Sge,
    #[strum(serialize = "bvult")]
    Ult,
    #[strum(serialize = "bvule")]
    Ule,
    #[strum(serialize = "bvugt")]
    Ugt,
    #[strum(serialize = "bvuge")]
    Uge,
}

impl BvCmp {
    pub fn is_signed(self) -> bool {
        matches!(self, BvCmp::Slt | BvCmp::Sle | BvCmp::Sgt | BvCmp::Sge)
    }
}

// ── Formulas ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BvExpr {
    Bool(bool),
    /// Constant whose `bits` are already masked to `width`.
    Const { bits: u64, width: u32 },
    Var { name: String, sort: Sort },
    Not(Box<BvExpr>),
    And(Vec<BvExpr>),
    Or(Vec<BvExpr>),
    Xor(Box<BvExpr>, Box<BvExpr>),
    Implies(Box<BvExpr>, Box<BvExpr>),
    Eq(Box<BvExpr>, Box<BvExpr>),
    Ite(Box<BvExpr>, Box<BvExpr>, Box<BvExpr>),
    Binary(BvOp, Box<BvExpr>, Box<BvExpr>),
    Compare(BvCmp, Box<BvExpr>, Box<BvExpr>),
    Neg(Box<BvExpr>),
    BitNot(Box<BvExpr>),
    SignExtend(u32, Box<BvExpr>),
    ZeroExtend(u32, Box<BvExpr>),
    /// The low `n` bits.
    Extract(u32, Box<BvExpr>),
    Select(Box<BvExpr>, Box<BvExpr>),
    Forall(Vec<(String, Sort)>, Box<BvExpr>),
    Exists(Vec<(String, Sort)>, Box<BvExpr>),
}

pub fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Interpret the low `width` bits as a two's-complement integer.
pub fn to_signed(bits: u64, width: u32) -> i64 {
    if width >= 64 {
        return bits as i64;
    }
    let bits = bits & mask(width);
    if bits >> (width - 1) & 1 == 1 {
        (bits | !mask(width)) as i64
    } else {
        bits as i64
    }
}

impl BvExpr {
    /// Constant of `width` bits holding `value` truncated to that width.
    pub fn constant(value: i128, width: u32) -> BvExpr {
        BvExpr::Const { bits: (value as u64) & mask(width), width }
    }

    pub fn var(name: impl Into<String>, sort: Sort) -> BvExpr {
        BvExpr::Var { name: name.into(), sort }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(e: BvExpr) -> BvExpr {
        match e {
            BvExpr::Not(inner) => *inner,
            other => BvExpr::Not(Box::new(other)),
        }
    }

    pub fn and(mut parts: Vec<BvExpr>) -> BvExpr {
        match parts.len() {
            0 => BvExpr::Bool(true),
            1 => parts.remove(0),
            _ => BvExpr::And(parts),
        }
    }

    pub fn equals(a: BvExpr, b: BvExpr) -> BvExpr {
        BvExpr::Eq(Box::new(a), Box::new(b))
    }

    pub fn binary(op: BvOp, a: BvExpr, b: BvExpr) -> BvExpr {
        BvExpr::Binary(op, Box::new(a), Box::new(b))
    }

    pub fn compare(cmp: BvCmp, a: BvExpr, b: BvExpr) -> BvExpr {
        BvExpr::Compare(cmp, Box::new(a), Box::new(b))
    }

    pub fn sort(&self) -> Sort {
        match self {
            BvExpr::Bool(_)
            | BvExpr::Not(_)
            | BvExpr::And(_)
            | BvExpr::Or(_)
            | BvExpr::Xor(..)
            | BvExpr::Implies(..)
            | BvExpr::Eq(..)
            | BvExpr::Compare(..)
            | BvExpr::Forall(..)
            | BvExpr::Exists(..) => Sort::Bool,
            BvExpr::Const { width, .. } => Sort::BitVec(*width),
            BvExpr::Var { sort, .. } => sort.clone(),
            BvExpr::Ite(_, a, _) => a.sort(),
            BvExpr::Binary(_, a, _) | BvExpr::Neg(a) | BvExpr::BitNot(a) => a.sort(),
            BvExpr::SignExtend(k, a) | BvExpr::ZeroExtend(k, a) => {
                Sort::BitVec(a.sort().width().unwrap_or(0) + k)
            }
            BvExpr::Extract(n, _) => Sort::BitVec(*n),
            BvExpr::Select(array, _) => match array.sort() {
                Sort::Array { element, .. } => Sort::BitVec(element),
                other => other,
            },
        }
    }

    /// Width of a bit-vector term, `None` for booleans and arrays.
    pub fn width(&self) -> Option<u32> {
        self.sort().width()
    }

    pub fn has_quantifier(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= matches!(e, BvExpr::Forall(..) | BvExpr::Exists(..)));
        found
    }

    pub fn has_array(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= matches!(e, BvExpr::Select(..)));
        found
    }

    fn walk(&self, f: &mut dyn FnMut(&BvExpr)) {
        f(self);
        match self {
            BvExpr::Bool(_) | BvExpr::Const { .. } | BvExpr::Var { .. } => {}
            BvExpr::Not(a)
            | BvExpr::Neg(a)
            | BvExpr::BitNot(a)
            | BvExpr::SignExtend(_, a)
            | BvExpr::ZeroExtend(_, a)
            | BvExpr::Extract(_, a)
            | BvExpr::Forall(_, a)
            | BvExpr::Exists(_, a) => a.walk(f),
            BvExpr::And(parts) | BvExpr::Or(parts) => parts.iter().for_each(|p| p.walk(f)),
            BvExpr::Xor(a, b)
            | BvExpr::Implies(a, b)
            | BvExpr::Eq(a, b)
            | BvExpr::Binary(_, a, b)
            | BvExpr::Compare(_, a, b)
            | BvExpr::Select(a, b) => {
                a.walk(f);
                b.walk(f);
            }
            BvExpr::Ite(c, a, b) => {
                c.walk(f);
                a.walk(f);
                b.walk(f);
            }
        }
    }

    /// Free variables in first-occurrence order; quantifier-bound names
    /// are excluded inside their body.
    pub fn free_vars(&self) -> Vec<(String, Sort)> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_free(&mut Vec::new(), &mut seen, &mut out);
        out
    }

    fn collect_free(&self, bound: &mut Vec<String>, seen: &mut HashSet<String>, out: &mut Vec<(String, Sort)>) {
        match self {
            BvExpr::Var { name, sort } => {
                if !bound.contains(name) && seen.insert(name.clone()) {
                    out.push((name.clone(), sort.clone()));
                }
            }
            BvExpr::Forall(vars, body) | BvExpr::Exists(vars, body) => {
                let depth = bound.len();
                bound.extend(vars.iter().map(|(n, _)| n.clone()));
                body.collect_free(bound, seen, out);
                bound.truncate(depth);
            }
            BvExpr::Bool(_) | BvExpr::Const { .. } => {}
            BvExpr::Not(a)
            | BvExpr::Neg(a)
            | BvExpr::BitNot(a)
            | BvExpr::SignExtend(_, a)
            | BvExpr::ZeroExtend(_, a)
            | BvExpr::Extract(_, a) => a.collect_free(bound, seen, out),
            BvExpr::And(parts) | BvExpr::Or(parts) => {
                for p in parts {
                    p.collect_free(bound, seen, out);
                }
            }
            BvExpr::Xor(a, b)
            | BvExpr::Implies(a, b)
            | BvExpr::Eq(a, b)
            | BvExpr::Binary(_, a, b)
            | BvExpr::Compare(_, a, b)
            | BvExpr::Select(a, b) => {
                a.collect_free(bound, seen, out);
                b.collect_free(bound, seen, out);
            }
            BvExpr::Ite(c, a, b) => {
                c.collect_free(bound, seen, out);
                a.collect_free(bound, seen, out);
                b.collect_free(bound, seen, out);
            }
        }
    }

    /// Integer constants mentioned in the formula, as signed values.
    pub fn constants(&self) -> Vec<i64> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let BvExpr::Const { bits, width } = e {
                out.push(to_signed(*bits, *width));
            }
        });
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn to_smtlib2(&self) -> String {
        match self {
            BvExpr::Bool(b) => b.to_string(),
            BvExpr::Const { bits, width } => format!("(_ bv{} {})", bits, width),
            BvExpr::Var { name, .. } => symbol(name),
            BvExpr::Not(a) => format!("(not {})", a.to_smtlib2()),
            BvExpr::And(parts) => nary("and", parts, "true"),
            BvExpr::Or(parts) => nary("or", parts, "false"),
            BvExpr::Xor(a, b) => format!("(xor {} {})", a.to_smtlib2(), b.to_smtlib2()),
            BvExpr::Implies(a, b) => format!("(=> {} {})", a.to_smtlib2(), b.to_smtlib2()),
            BvExpr::Eq(a, b) => format!("(= {} {})", a.to_smtlib2(), b.to_smtlib2()),
            BvExpr::Ite(c, a, b) => format!("(ite {} {} {})", c.to_smtlib2(), a.to_smtlib2(), b.to_smtlib2()),
            BvExpr::Binary(op, a, b) => format!("({} {} {})", op, a.to_smtlib2(), b.to_smtlib2()),
            BvExpr::Compare(cmp, a, b) => format!("({} {} {})", cmp, a.to_smtlib2(), b.to_smtlib2()),
            BvExpr::Neg(a) => format!("(bvneg {})", a.to_smtlib2()),
            BvExpr::BitNot(a) => format!("(bvnot {})", a.to_smtlib2()),
            BvExpr::SignExtend(k, a) => format!("((_ sign_extend {}) {})", k, a.to_smtlib2()),
            BvExpr::ZeroExtend(k, a) => format!("((_ zero_extend {}) {})", k, a.to_smtlib2()),
            BvExpr::Extract(n, a) => format!("((_ extract {} 0) {})", n - 1, a.to_smtlib2()),
            BvExpr::Select(array, index) => format!("(select {} {})", array.to_smtlib2(), index.to_smtlib2()),
            BvExpr::Forall(vars, body) => quantified("forall", vars, body),
            BvExpr::Exists(vars, body) => quantified("exists", vars, body),
        }
    }
}

fn nary(op: &str, parts: &[BvExpr], empty: &str) -> String {
    match parts {
        [] => empty.to_string(),
        [single] => single.to_smtlib2(),
        _ => {
            let inner: Vec<String> = parts.iter().map(BvExpr::to_smtlib2).collect();
            format!("({} {})", op, inner.join(" "))
        }
    }
}

fn quantified(kw: &str, vars: &[(String, Sort)], body: &BvExpr) -> String {
    let decls: Vec<String> = vars.iter().map(|(n, s)| format!("({} {})", symbol(n), s)).collect();
    format!("({} ({}) {})", kw, decls.join(" "), body.to_smtlib2())
}

const RESERVED: &[&str] = &[
    "and", "or", "not", "xor", "ite", "let", "forall", "exists", "true", "false", "select", "store",
    "distinct", "assert", "par", "as", "_", "!",
];

/// Render `name` as an SMT-LIB2 symbol, quoting it when it is not a
/// simple symbol.
pub fn symbol(name: &str) -> String {
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c))
        && !RESERVED.contains(&name);
    if simple {
        name.to_string()
    } else {
        format!("|{}|", name.replace('|', "_"))
    }
}

// ── Evaluation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BvValue {
    Bool(bool),
    Bits { bits: u64, width: u32 },
}

impl BvValue {
    pub fn bits(bits: u64, width: u32) -> BvValue {
        BvValue::Bits { bits: bits & mask(width), width }
    }

    pub fn as_bool(self) -> Result<bool, EvalError> {
        match self {
            BvValue::Bool(b) => Ok(b),
            BvValue::Bits { .. } => Err(EvalError::SortMismatch("expected a boolean")),
        }
    }

    fn as_bits(self) -> Result<(u64, u32), EvalError> {
        match self {
            BvValue::Bits { bits, width } => Ok((bits, width)),
            BvValue::Bool(_) => Err(EvalError::SortMismatch("expected a bit-vector")),
        }
    }

    /// Integer value under the given signedness.
    pub fn to_integer(self, signed: bool) -> Option<i128> {
        match self {
            BvValue::Bits { bits, width } if signed => Some(to_signed(bits, width) as i128),
            BvValue::Bits { bits, .. } => Some(bits as i128),
            BvValue::Bool(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unbound variable '{0}'")]
    Unbound(String),
    #[error("sort mismatch: {0}")]
    SortMismatch(&'static str),
    #[error("arrays cannot be evaluated")]
    Array,
    /// A quantifier over a domain too large to enumerate had no decisive
    /// witness among the sampled values.
    #[error("quantifier could not be decided by sampling")]
    Undecided,
}

pub type Assignment = BTreeMap<String, BvValue>;

/// Sampled values tried for a bit-vector of `width` bits: small
/// magnitudes around zero plus the signed and unsigned extremes.
pub fn boundary_values(width: u32) -> Vec<u64> {
    let m = mask(width);
    let signed_max = m >> 1;
    let signed_min = signed_max.wrapping_add(1) & m;
    let mut out = Vec::new();
    for v in 0..=4i64 {
        for candidate in [v, -v] {
            out.push(candidate as u64 & m);
        }
    }
    for v in [7i64, 8, 10, 16, 100, 127, 128, 255, 256, -100, -128, -129] {
        out.push(v as u64 & m);
    }
    out.extend([signed_max, signed_max.wrapping_sub(1) & m, signed_min, signed_min.wrapping_add(1) & m, m]);
    let mut seen = HashSet::new();
    out.retain(|v| seen.insert(*v));
    out
}

/// Every value of `sort`, or `None` when the domain is too large.
pub fn full_domain(sort: &Sort) -> Option<Vec<BvValue>> {
    match sort {
        Sort::Bool => Some(vec![BvValue::Bool(false), BvValue::Bool(true)]),
        Sort::BitVec(w) if *w <= ENUMERABLE_WIDTH => Some((0..=mask(*w)).map(|b| BvValue::bits(b, *w)).collect()),
        _ => None,
    }
}

impl BvExpr {
    pub fn eval(&self, env: &Assignment) -> Result<BvValue, EvalError> {
        match self {
            BvExpr::Bool(b) => Ok(BvValue::Bool(*b)),
            BvExpr::Const { bits, width } => Ok(BvValue::bits(*bits, *width)),
            BvExpr::Var { name, sort } => {
                if matches!(sort, Sort::Array { .. }) {
                    return Err(EvalError::Array);
                }
                env.get(name).copied().ok_or_else(|| EvalError::Unbound(name.clone()))
            }
            BvExpr::Not(a) => Ok(BvValue::Bool(!a.eval(env)?.as_bool()?)),
            BvExpr::And(parts) => {
                for p in parts {
                    if !p.eval(env)?.as_bool()? {
                        return Ok(BvValue::Bool(false));
                    }
                }
                Ok(BvValue::Bool(true))
            }
            BvExpr::Or(parts) => {
                for p in parts {
                    if p.eval(env)?.as_bool()? {
                        return Ok(BvValue::Bool(true));
                    }
                }
                Ok(BvValue::Bool(false))
            }
            BvExpr::Xor(a, b) => Ok(BvValue::Bool(a.eval(env)?.as_bool()? != b.eval(env)?.as_bool()?)),
            BvExpr::Implies(a, b) => {
                if !a.eval(env)?.as_bool()? {
                    return Ok(BvValue::Bool(true));
                }
                Ok(BvValue::Bool(b.eval(env)?.as_bool()?))
            }
            BvExpr::Eq(a, b) => Ok(BvValue::Bool(a.eval(env)? == b.eval(env)?)),
            BvExpr::Ite(c, a, b) => {
                if c.eval(env)?.as_bool()? {
                    a.eval(env)
                } else {
                    b.eval(env)
                }
            }
            BvExpr::Binary(op, a, b) => {
                let (x, w) = a.eval(env)?.as_bits()?;
                let (y, _) = b.eval(env)?.as_bits()?;
                Ok(BvValue::bits(apply(*op, x, y, w), w))
            }
            BvExpr::Compare(cmp, a, b) => {
                let (x, w) = a.eval(env)?.as_bits()?;
                let (y, _) = b.eval(env)?.as_bits()?;
                let ord = if cmp.is_signed() { to_signed(x, w).cmp(&to_signed(y, w)) } else { x.cmp(&y) };
                let holds = match cmp {
                    BvCmp::Slt | BvCmp::Ult => ord.is_lt(),
                    BvCmp::Sle | BvCmp::Ule => ord.is_le(),
                    BvCmp::Sgt | BvCmp::Ugt => ord.is_gt(),
                    BvCmp::Sge | BvCmp::Uge => ord.is_ge(),
                };
                Ok(BvValue::Bool(holds))
            }
            BvExpr::Neg(a) => {
                let (x, w) = a.eval(env)?.as_bits()?;
                Ok(BvValue::bits(x.wrapping_neg(), w))
            }
            BvExpr::BitNot(a) => {
                let (x, w) = a.eval(env)?.as_bits()?;
                Ok(BvValue::bits(!x, w))
            }
            BvExpr::SignExtend(k, a) => {
                let (x, w) = a.eval(env)?.as_bits()?;
                Ok(BvValue::bits(to_signed(x, w) as u64, w + k))
            }
            BvExpr::ZeroExtend(k, a) => {
                let (x, w) = a.eval(env)?.as_bits()?;
                Ok(BvValue::bits(x, w + k))
            }
            BvExpr::Extract(n, a) => {
                let (x, _) = a.eval(env)?.as_bits()?;
                Ok(BvValue::bits(x, *n))
            }
            BvExpr::Select(..) => Err(EvalError::Array),
            BvExpr::Forall(vars, body) => eval_quantifier(true, vars, body, env),
            BvExpr::Exists(vars, body) => eval_quantifier(false, vars, body, env),
        }
    }
}

/// `forall` looks for a falsifying value, `exists` for a satisfying one.
/// Enumerable domains are decided exactly; sampled domains only decide
/// when a witness turns up.
fn eval_quantifier(universal: bool, vars: &[(String, Sort)], body: &BvExpr, env: &Assignment) -> Result<BvValue, EvalError> {
    let Some(((name, sort), rest)) = vars.split_first() else {
        return body.eval(env);
    };
    let (values, complete) = match full_domain(sort) {
        Some(values) => (values, true),
        None => match sort {
            Sort::BitVec(w) => (boundary_values(*w).into_iter().map(|b| BvValue::bits(b, *w)).collect(), false),
            _ => return Err(EvalError::Array),
        },
    };
    let mut undecided = false;
    let mut scoped = env.clone();
    for value in values {
        scoped.insert(name.clone(), value);
        match eval_quantifier(universal, rest, body, &scoped) {
            Ok(v) => {
                if v.as_bool()? != universal {
                    return Ok(BvValue::Bool(!universal));
                }
            }
            Err(EvalError::Undecided) => undecided = true,
            Err(e) => return Err(e),
        }
    }
    if complete && !undecided {
        Ok(BvValue::Bool(universal))
    } else {
        Err(EvalError::Undecided)
    }
}

fn apply(op: BvOp, x: u64, y: u64, w: u32) -> u64 {
    let m = mask(w);
    let neg = |v: u64| v.wrapping_neg() & m;
    let is_neg = |v: u64| v >> (w - 1) & 1 == 1;
    let udiv = |a: u64, b: u64| if b == 0 { m } else { a / b };
    let urem = |a: u64, b: u64| if b == 0 { a } else { a % b };
    match op {
        BvOp::Add => x.wrapping_add(y),
        BvOp::Sub => x.wrapping_sub(y),
        BvOp::Mul => x.wrapping_mul(y),
        BvOp::UDiv => udiv(x, y),
        BvOp::URem => urem(x, y),
        BvOp::SDiv => match (is_neg(x), is_neg(y)) {
            (false, false) => udiv(x, y),
            (true, false) => neg(udiv(neg(x), y)),
            (false, true) => neg(udiv(x, neg(y))),
            (true, true) => udiv(neg(x), neg(y)),
        },
        BvOp::SRem => match (is_neg(x), is_neg(y)) {
            (false, false) => urem(x, y),
            (true, false) => neg(urem(neg(x), y)),
            (false, true) => urem(x, neg(y)),
            (true, true) => neg(urem(neg(x), neg(y))),
        },
        BvOp::And => x & y,
        BvOp::Or => x | y,
        BvOp::Xor => x ^ y,
        BvOp::Shl => {
            if y >= u64::from(w) {
                0
            } else {
                x << y
            }
        }
        BvOp::LShr => {
            if y >= u64::from(w) {
                0
            } else {
                x >> y
            }
        }
        BvOp::AShr => {
            let shift = y.min(u64::from(w) - 1);
            (to_signed(x, w) >> shift) as u64
        }
    }
}
