//! Effect system.
//!
//! Three pieces live here:
//! - [`EffectSet`], an order-independent set of effects with an absorbing
//!   `Unknown` element;
//! - [`EffectsCatalog`], the table of effects for APIs outside the module,
//!   built in and overlaid by a project stub file;
//! - [`analyze`], which infers each function's effects from its bound body
//!   and compares them with what the author declared.

use crate::compiler::binder::{
    BoundArmBody, BoundExpr, BoundExprKind, BoundFunction, BoundModule, BoundStmt, CallTarget,
};
use crate::compiler::tokens::Span;
use crate::compiler::types::Type;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumString, EnumIter)]
pub enum EffectKind {
    IO,
    Nondeterminism,
    Mutation,
    Exception,
    Allocation,
}

/// Short effect codes and the effect each one names.
const EFFECT_CODES: &[(&str, EffectKind, &str)] = &[
    ("cw", EffectKind::IO, "console_write"),
    ("cr", EffectKind::IO, "console_read"),
    ("fr", EffectKind::IO, "filesystem_read"),
    ("fw", EffectKind::IO, "filesystem_write"),
    ("fd", EffectKind::IO, "filesystem_delete"),
    ("net", EffectKind::IO, "network"),
    ("db", EffectKind::IO, "database"),
    ("env", EffectKind::IO, "environment"),
    ("proc", EffectKind::IO, "process"),
    ("time", EffectKind::Nondeterminism, "time"),
    ("rand", EffectKind::Nondeterminism, "random"),
    ("mut", EffectKind::Mutation, "heap_write"),
    ("throw", EffectKind::Exception, "intentional"),
    ("alloc", EffectKind::Allocation, "heap"),
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub value: String,
}

impl Effect {
    pub fn new(kind: EffectKind, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }

    pub fn from_code(code: &str) -> Option<Effect> {
        EFFECT_CODES.iter().find(|(c, _, _)| *c == code).map(|(_, kind, value)| Effect::new(*kind, *value))
    }

    /// The short code for this effect, if it has one.
    pub fn code(&self) -> Option<&'static str> {
        EFFECT_CODES.iter().find(|(_, k, v)| *k == self.kind && *v == self.value).map(|(c, _, _)| *c)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{}", code),
            None => write!(f, "{}:{}", self.kind, self.value),
        }
    }
}

/// A set of effects. `Unknown` stands for "any effect at all" and absorbs
/// every union; the empty known set is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum EffectSet {
    Known(BTreeSet<Effect>),
    Unknown,
}

impl Default for EffectSet {
    fn default() -> Self {
        EffectSet::empty()
    }
}

impl EffectSet {
    pub fn empty() -> Self {
        EffectSet::Known(BTreeSet::new())
    }

    pub fn unknown() -> Self {
        EffectSet::Unknown
    }

    pub fn single(effect: Effect) -> Self {
        EffectSet::Known(BTreeSet::from([effect]))
    }

    /// Build a set from short codes, ignoring codes that name no effect.
    pub fn from_codes<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        EffectSet::Known(codes.into_iter().filter_map(Effect::from_code).collect())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EffectSet::Unknown)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EffectSet::Known(s) if s.is_empty())
    }

    pub fn union(&self, other: &EffectSet) -> EffectSet {
        match (self, other) {
            (EffectSet::Known(a), EffectSet::Known(b)) => EffectSet::Known(a.union(b).cloned().collect()),
            _ => EffectSet::Unknown,
        }
    }

    pub fn is_subset_of(&self, other: &EffectSet) -> bool {
        match (self, other) {
            (_, EffectSet::Unknown) => true,
            (EffectSet::Unknown, EffectSet::Known(_)) => false,
            (EffectSet::Known(a), EffectSet::Known(b)) => a.is_subset(b),
        }
    }

    /// Effects of `self` not covered by `other`. Removing from `Unknown`
    /// leaves `Unknown`; removing `Unknown` leaves nothing.
    pub fn except(&self, other: &EffectSet) -> EffectSet {
        match (self, other) {
            (EffectSet::Unknown, _) => EffectSet::Unknown,
            (EffectSet::Known(_), EffectSet::Unknown) => EffectSet::empty(),
            (EffectSet::Known(a), EffectSet::Known(b)) => EffectSet::Known(a.difference(b).cloned().collect()),
        }
    }

    pub fn contains(&self, effect: &Effect) -> bool {
        match self {
            EffectSet::Known(s) => s.contains(effect),
            EffectSet::Unknown => true,
        }
    }

    /// Whether any effect of `kind` may be present. `Unknown` may hold any.
    pub fn contains_kind(&self, kind: EffectKind) -> bool {
        match self {
            EffectSet::Known(s) => s.iter().any(|e| e.kind == kind),
            EffectSet::Unknown => true,
        }
    }

    /// Known effects in display order; empty for `Unknown`.
    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        let known = match self {
            EffectSet::Known(s) => Some(s.iter()),
            EffectSet::Unknown => None,
        };
        known.into_iter().flatten()
    }
}

impl fmt::Display for EffectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectSet::Unknown => write!(f, "unknown"),
            EffectSet::Known(s) if s.is_empty() => write!(f, "pure"),
            EffectSet::Known(s) => {
                let parts: Vec<String> = s.iter().map(Effect::to_string).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

// ── Catalog ──

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("invalid effect stub document: {0}")]
    InvalidDocument(String),
    #[error("malformed stub signature '{0}'")]
    MalformedSignature(String),
    #[error("effects for '{0}' must be an array of strings")]
    InvalidCodes(String),
    #[error("unknown effect code '{code}' in stub '{signature}'")]
    UnknownCode { signature: String, code: String },
}

/// `Namespace.Type::Method(ParamType,...)`, or `(*)` for any overload.
static SIGNATURE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_]\w*(\.[A-Za-z_]\w*)*::(\.ctor|[A-Za-z_]\w*)\((\*|[\w.\[\]?<>`, ]*)\)$").ok()
});

pub fn is_valid_signature(signature: &str) -> bool {
    SIGNATURE.as_ref().is_some_and(|re| re.is_match(signature))
}

/// Short receiver names expanded to their full names before lookup.
const RECEIVER_ALIASES: &[(&str, &str)] = &[
    ("Console", "System.Console"),
    ("File", "System.IO.File"),
    ("Directory", "System.IO.Directory"),
    ("Path", "System.IO.Path"),
    ("StreamReader", "System.IO.StreamReader"),
    ("StreamWriter", "System.IO.StreamWriter"),
    ("Math", "System.Math"),
    ("Convert", "System.Convert"),
    ("Environment", "System.Environment"),
    ("Process", "System.Diagnostics.Process"),
    ("Random", "System.Random"),
    ("DateTime", "System.DateTime"),
    ("Guid", "System.Guid"),
    ("HttpClient", "System.Net.Http.HttpClient"),
    ("List", "System.Collections.Generic.List"),
    ("Dictionary", "System.Collections.Generic.Dictionary"),
    ("HashSet", "System.Collections.Generic.HashSet"),
    ("StringBuilder", "System.Text.StringBuilder"),
    ("Thread", "System.Threading.Thread"),
    ("Task", "System.Threading.Tasks.Task"),
    ("String", "System.String"),
    ("Int32", "System.Int32"),
    ("Exception", "System.Exception"),
];

pub fn expand_receiver(receiver: &str) -> String {
    RECEIVER_ALIASES
        .iter()
        .find(|(short, _)| *short == receiver)
        .map_or_else(|| receiver.to_string(), |(_, full)| full.to_string())
}

/// Built-in entries, keyed by signature.
const BUILTIN_STUBS: &[(&str, &[&str])] = &[
    ("System.Console::WriteLine(*)", &["cw"]),
    ("System.Console::Write(*)", &["cw"]),
    ("System.Console::ReadLine(*)", &["cr"]),
    ("System.Console::Read(*)", &["cr"]),
    ("System.Console::ReadKey(*)", &["cr"]),
    ("System.IO.File::ReadAllText(*)", &["fr"]),
    ("System.IO.File::ReadAllLines(*)", &["fr"]),
    ("System.IO.File::ReadAllBytes(*)", &["fr"]),
    ("System.IO.File::Exists(*)", &["fr"]),
    ("System.IO.File::WriteAllText(*)", &["fw"]),
    ("System.IO.File::WriteAllLines(*)", &["fw"]),
    ("System.IO.File::AppendAllText(*)", &["fw"]),
    ("System.IO.File::Delete(*)", &["fd"]),
    ("System.IO.File::Copy(*)", &["fr", "fw"]),
    ("System.IO.File::Move(*)", &["fw", "fd"]),
    ("System.IO.Directory::CreateDirectory(*)", &["fw"]),
    ("System.IO.Directory::Delete(*)", &["fd"]),
    ("System.IO.Directory::Exists(*)", &["fr"]),
    ("System.IO.Directory::GetFiles(*)", &["fr"]),
    ("System.IO.Path::Combine(*)", &[]),
    ("System.IO.Path::GetFileName(*)", &[]),
    ("System.IO.StreamReader::.ctor(*)", &["fr"]),
    ("System.IO.StreamReader::ReadLine(*)", &["fr"]),
    ("System.IO.StreamWriter::.ctor(*)", &["fw"]),
    ("System.IO.StreamWriter::WriteLine(*)", &["fw"]),
    ("System.Net.Http.HttpClient::.ctor(*)", &["alloc"]),
    ("System.Net.Http.HttpClient::GetAsync(*)", &["net"]),
    ("System.Net.Http.HttpClient::GetStringAsync(*)", &["net"]),
    ("System.Net.Http.HttpClient::PostAsync(*)", &["net"]),
    ("System.Net.Http.HttpClient::SendAsync(*)", &["net"]),
    ("System.Environment::GetEnvironmentVariable(*)", &["env"]),
    ("System.Environment::SetEnvironmentVariable(*)", &["env"]),
    ("System.Environment::Exit(*)", &["proc"]),
    ("System.Diagnostics.Process::Start(*)", &["proc"]),
    ("System.DateTime::get_Now(*)", &["time"]),
    ("System.DateTime::get_UtcNow(*)", &["time"]),
    ("System.DateTime::get_Today(*)", &["time"]),
    ("System.Random::.ctor(*)", &[]),
    ("System.Random::Next(*)", &["rand"]),
    ("System.Random::NextDouble(*)", &["rand"]),
    ("System.Guid::NewGuid(*)", &["rand"]),
    ("System.Math::Abs(*)", &[]),
    ("System.Math::Max(*)", &[]),
    ("System.Math::Min(*)", &[]),
    ("System.Math::Sqrt(*)", &[]),
    ("System.Math::Pow(*)", &[]),
    ("System.Math::Floor(*)", &[]),
    ("System.Math::Ceiling(*)", &[]),
    ("System.Convert::ToInt32(*)", &["throw"]),
    ("System.Convert::ToString(*)", &[]),
    ("System.Int32::Parse(*)", &["throw"]),
    ("System.Int32::TryParse(*)", &[]),
    ("System.Int32::ToString(*)", &[]),
    ("System.String::Concat(*)", &[]),
    ("System.String::Format(*)", &[]),
    ("System.String::Join(*)", &[]),
    ("System.String::IsNullOrEmpty(*)", &[]),
    ("System.String::Substring(*)", &[]),
    ("System.String::Contains(*)", &[]),
    ("System.String::StartsWith(*)", &[]),
    ("System.String::ToUpper(*)", &[]),
    ("System.String::ToLower(*)", &[]),
    ("System.String::Trim(*)", &[]),
    ("System.String::Split(*)", &["alloc"]),
    ("System.Object::ToString(*)", &[]),
    ("System.Exception::.ctor(*)", &[]),
    ("System.ArgumentException::.ctor(*)", &[]),
    ("System.InvalidOperationException::.ctor(*)", &[]),
    ("System.Collections.Generic.List::.ctor(*)", &["alloc"]),
    ("System.Collections.Generic.List::Add(*)", &["mut"]),
    ("System.Collections.Generic.List::Remove(*)", &["mut"]),
    ("System.Collections.Generic.List::Clear(*)", &["mut"]),
    ("System.Collections.Generic.List::Contains(*)", &[]),
    ("System.Collections.Generic.Dictionary::.ctor(*)", &["alloc"]),
    ("System.Collections.Generic.Dictionary::Add(*)", &["mut"]),
    ("System.Collections.Generic.Dictionary::ContainsKey(*)", &[]),
    ("System.Collections.Generic.Dictionary::TryGetValue(*)", &[]),
    ("System.Collections.Generic.HashSet::.ctor(*)", &["alloc"]),
    ("System.Collections.Generic.HashSet::Add(*)", &["mut"]),
    ("System.Text.StringBuilder::.ctor(*)", &["alloc"]),
    ("System.Text.StringBuilder::Append(*)", &["mut"]),
    ("System.Text.StringBuilder::AppendLine(*)", &["mut"]),
    ("System.Text.StringBuilder::ToString(*)", &[]),
    ("System.Threading.Thread::Sleep(*)", &["time"]),
    ("System.Threading.Tasks.Task::Delay(*)", &["time"]),
];

/// Effects of APIs outside the module, keyed by signature.
#[derive(Debug, Clone, Default)]
pub struct EffectsCatalog {
    entries: HashMap<String, EffectSet>,
}

impl EffectsCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The catalog of well-known runtime APIs.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for (signature, codes) in BUILTIN_STUBS {
            catalog.insert(*signature, EffectSet::from_codes(codes.iter().copied()));
        }
        catalog
    }

    pub fn insert(&mut self, signature: impl Into<String>, effects: EffectSet) {
        self.entries.insert(signature.into(), effects);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay entries from a stub document of the form
    /// `{"stubs": {"Ns.Type::Method(T1,T2)": ["cw", ...]}}`. Malformed
    /// entries are skipped and reported; every valid entry is loaded.
    pub fn load_stubs(&mut self, json: &str) -> Vec<CatalogError> {
        let doc: serde_json::Value = match serde_json::from_str(json) {
            Ok(v) => v,
            Err(e) => return vec![CatalogError::InvalidDocument(e.to_string())],
        };
        let Some(stubs) = doc.get("stubs").and_then(serde_json::Value::as_object) else {
            return vec![CatalogError::InvalidDocument("missing 'stubs' object".into())];
        };
        let mut errors = Vec::new();
        let mut loaded = 0usize;
        for (signature, codes) in stubs {
            if !is_valid_signature(signature) {
                errors.push(CatalogError::MalformedSignature(signature.clone()));
                continue;
            }
            let Some(list) = codes.as_array() else {
                errors.push(CatalogError::InvalidCodes(signature.clone()));
                continue;
            };
            let mut effects = BTreeSet::new();
            let mut valid = true;
            for code in list {
                match code.as_str() {
                    Some(c) => match Effect::from_code(c) {
                        Some(effect) => {
                            effects.insert(effect);
                        }
                        None => {
                            errors.push(CatalogError::UnknownCode { signature: signature.clone(), code: c.to_string() });
                            valid = false;
                        }
                    },
                    None => {
                        errors.push(CatalogError::InvalidCodes(signature.clone()));
                        valid = false;
                        break;
                    }
                }
            }
            if valid {
                self.entries.insert(signature.clone(), EffectSet::Known(effects));
                loaded += 1;
            }
        }
        debug!(loaded, rejected = errors.len(), "loaded effect stubs");
        errors
    }

    /// Read and overlay a stub file.
    pub fn load_stub_file(&mut self, path: &Path) -> std::io::Result<Vec<CatalogError>> {
        let text = std::fs::read_to_string(path)?;
        Ok(self.load_stubs(&text))
    }

    /// Exact signature first, then the any-overload entry for the method.
    pub fn lookup(&self, signature: &str) -> Option<&EffectSet> {
        if let Some(found) = self.entries.get(signature) {
            return Some(found);
        }
        let (head, _) = signature.split_once('(')?;
        self.entries.get(&format!("{}(*)", head))
    }

    /// Look up a call of `method` on `receiver` with the given argument types.
    pub fn lookup_call(&self, receiver: &str, method: &str, args: &[Type]) -> Option<&EffectSet> {
        self.lookup(&call_signature(receiver, method, args))
    }
}

pub fn call_signature(receiver: &str, method: &str, args: &[Type]) -> String {
    let params: Vec<String> = args.iter().map(Type::target_name).collect();
    format!("{}::{}({})", expand_receiver(receiver), method, params.join(","))
}

// ── Analysis ──

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    #[error("'{function}' has undeclared effect '{code}'")]
    Undeclared { function: String, code: String, span: Span },
    #[error("'{function}' declares effect '{code}' but never performs it")]
    Unused { function: String, code: String, span: Span },
    #[error("effects of '{function}' are unknown: unresolved {}", .sources.join(", "))]
    UnknownEffects { function: String, sources: Vec<String>, span: Span },
    #[error("unknown effect code '{code}' declared on '{function}'")]
    UnknownCode { function: String, code: String, span: Span },
    #[error("effect catalog: {0}")]
    Catalog(CatalogError),
}

impl EffectError {
    pub fn span(&self) -> Span {
        match self {
            EffectError::Undeclared { span, .. }
            | EffectError::Unused { span, .. }
            | EffectError::UnknownEffects { span, .. }
            | EffectError::UnknownCode { span, .. } => *span,
            EffectError::Catalog(_) => Span::dummy(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EffectAnalysis {
    /// Inferred effects per function ID.
    pub effects: BTreeMap<String, EffectSet>,
    pub errors: Vec<EffectError>,
}

/// Effects observed in one function body.
#[derive(Debug, Default)]
struct Collector {
    effects: BTreeSet<Effect>,
    unknown: bool,
    unknown_sources: Vec<(String, Span)>,
    /// First site contributing each effect.
    sites: BTreeMap<Effect, Span>,
}

impl Collector {
    fn add(&mut self, set: &EffectSet, span: Span, source: impl FnOnce() -> String) {
        match set {
            EffectSet::Unknown => {
                self.unknown = true;
                let source = source();
                if !self.unknown_sources.iter().any(|(s, _)| *s == source) {
                    self.unknown_sources.push((source, span));
                }
            }
            EffectSet::Known(effects) => {
                for e in effects {
                    self.sites.entry(e.clone()).or_insert(span);
                    self.effects.insert(e.clone());
                }
            }
        }
    }

    fn to_set(&self) -> EffectSet {
        if self.unknown {
            EffectSet::Unknown
        } else {
            EffectSet::Known(self.effects.clone())
        }
    }
}

struct Inference<'a> {
    module: &'a BoundModule,
    catalog: &'a EffectsCatalog,
    memo: HashMap<String, EffectSet>,
    active: HashSet<String>,
    hit_cycle: bool,
}

impl<'a> Inference<'a> {
    fn function_effects(&mut self, f: &'a BoundFunction) -> Collector {
        self.active.insert(f.id.clone());
        let mut c = Collector::default();
        self.stmts(&f.body, &mut c);
        self.active.remove(&f.id);
        c
    }

    /// Effects a call to module function `id` contributes: its declaration
    /// when it has one, otherwise its inferred effects.
    fn callee_effects(&mut self, id: &str) -> EffectSet {
        let module = self.module;
        let Some(f) = module.function(id) else {
            return EffectSet::Unknown;
        };
        if let Some(codes) = &f.declared_effects {
            return EffectSet::from_codes(codes.iter().map(|(c, _)| c.as_str()));
        }
        if let Some(set) = self.memo.get(id) {
            return set.clone();
        }
        if self.active.contains(id) {
            self.hit_cycle = true;
            return EffectSet::empty();
        }
        let outer = std::mem::replace(&mut self.hit_cycle, false);
        let set = self.function_effects(f).to_set();
        // Results computed inside a cycle are partial.
        if !self.hit_cycle {
            self.memo.insert(id.to_string(), set.clone());
        }
        self.hit_cycle |= outer;
        set
    }

    fn stmts(&mut self, stmts: &'a [BoundStmt], c: &mut Collector) {
        for s in stmts {
            self.stmt(s, c);
        }
    }

    fn stmt(&mut self, stmt: &'a BoundStmt, c: &mut Collector) {
        match stmt {
            BoundStmt::Bind { value, .. } => self.expr(value, c),
            BoundStmt::Assign { target, value, span } => {
                if matches!(target.kind, BoundExprKind::Field(..) | BoundExprKind::Index(..)) {
                    let heap_write = EffectSet::from_codes(["mut"]);
                    c.add(&heap_write, *span, String::new);
                }
                self.expr(target, c);
                self.expr(value, c);
            }
            BoundStmt::If { condition, then_body, else_ifs, else_body, .. } => {
                self.expr(condition, c);
                self.stmts(then_body, c);
                for (cond, body) in else_ifs {
                    self.expr(cond, c);
                    self.stmts(body, c);
                }
                if let Some(body) = else_body {
                    self.stmts(body, c);
                }
            }
            BoundStmt::For { from, to, step, body, .. } => {
                self.expr(from, c);
                self.expr(to, c);
                if let Some(step) = step {
                    self.expr(step, c);
                }
                self.stmts(body, c);
            }
            BoundStmt::ForEach { iterable, body, .. } => {
                self.expr(iterable, c);
                self.stmts(body, c);
            }
            BoundStmt::While { condition, body, .. } => {
                self.expr(condition, c);
                self.stmts(body, c);
            }
            BoundStmt::Match(m) => {
                self.expr(&m.target, c);
                for arm in &m.arms {
                    if let Some(g) = &arm.guard {
                        self.expr(g, c);
                    }
                    match &arm.body {
                        BoundArmBody::Block(b) => self.stmts(b, c),
                        BoundArmBody::Expr(e) => self.expr(e, c),
                    }
                }
            }
            BoundStmt::Try { body, catches, finally, .. } => {
                self.stmts(body, c);
                for catch in catches {
                    self.stmts(&catch.body, c);
                }
                if let Some(f) = finally {
                    self.stmts(f, c);
                }
            }
            BoundStmt::Return { value, .. } => {
                if let Some(v) = value {
                    self.expr(v, c);
                }
            }
            BoundStmt::Throw { value, span } => {
                self.expr(value, c);
                c.add(&EffectSet::from_codes(["throw"]), *span, String::new);
            }
            BoundStmt::Call { call, .. } => self.expr(call, c),
        }
    }

    fn expr(&mut self, expr: &'a BoundExpr, c: &mut Collector) {
        match &expr.kind {
            BoundExprKind::IntLit(_)
            | BoundExprKind::FloatLit(_)
            | BoundExprKind::StrLit(_)
            | BoundExprKind::BoolLit(_)
            | BoundExprKind::Null
            | BoundExprKind::None
            | BoundExprKind::Variable(_)
            | BoundExprKind::VariantRef { .. }
            | BoundExprKind::Error => {}
            BoundExprKind::StaticRef(path) => {
                // Static properties are catalogued as getters.
                if let Some((receiver, prop)) = path.rsplit_once('.') {
                    let getter = format!("get_{}", prop);
                    if let Some(set) = self.catalog.lookup_call(receiver, &getter, &[]) {
                        c.add(set, expr.span, || path.clone());
                    }
                }
            }
            BoundExprKind::Field(base, _) => self.expr(base, c),
            BoundExprKind::Index(base, index) => {
                self.expr(base, c);
                self.expr(index, c);
            }
            BoundExprKind::Binary(l, _, r) => {
                self.expr(l, c);
                self.expr(r, c);
            }
            BoundExprKind::Unary(_, e)
            | BoundExprKind::Some(e)
            | BoundExprKind::Ok(e)
            | BoundExprKind::Err(e)
            | BoundExprKind::Await(e) => self.expr(e, c),
            BoundExprKind::Conditional(a, b, d) => {
                self.expr(a, c);
                self.expr(b, c);
                self.expr(d, c);
            }
            BoundExprKind::Call(call) => {
                if let Some(receiver) = &call.receiver {
                    self.expr(receiver, c);
                }
                for a in &call.args {
                    self.expr(a, c);
                }
                match &call.callee {
                    CallTarget::Function { id, .. } | CallTarget::Method { id, .. } => {
                        let set = self.callee_effects(id);
                        c.add(&set, expr.span, || call.target.clone());
                    }
                    CallTarget::External { receiver, method } => {
                        let arg_types: Vec<Type> = call.args.iter().map(|a| a.ty.clone()).collect();
                        let signature = call_signature(receiver, method, &arg_types);
                        match self.catalog.lookup(&signature) {
                            Some(set) => c.add(set, expr.span, || signature.clone()),
                            None => c.add(&EffectSet::Unknown, expr.span, || signature.clone()),
                        }
                    }
                    // Lambda bodies are counted where they are written.
                    CallTarget::Local(_) => {}
                    CallTarget::Unresolved => c.add(&EffectSet::Unknown, expr.span, || call.target.clone()),
                }
            }
            BoundExprKind::New { ty, class, args } => {
                for a in args {
                    self.expr(a, c);
                }
                if class.is_none() {
                    let signature = format!("{}::.ctor(*)", expand_receiver(&ty.receiver_name()));
                    match self.catalog.lookup(&signature) {
                        Some(set) => c.add(set, expr.span, || signature.clone()),
                        None => c.add(&EffectSet::Unknown, expr.span, || signature.clone()),
                    }
                }
            }
            BoundExprKind::Lambda { body, .. } => self.stmts(body, c),
            BoundExprKind::Match(m) => {
                self.expr(&m.target, c);
                for arm in &m.arms {
                    if let Some(g) = &arm.guard {
                        self.expr(g, c);
                    }
                    match &arm.body {
                        BoundArmBody::Block(b) => self.stmts(b, c),
                        BoundArmBody::Expr(e) => self.expr(e, c),
                    }
                }
            }
            BoundExprKind::Quantifier { body, .. } => self.expr(body, c),
        }
    }
}

/// Infer every function's effects and check them against declarations.
/// A function without an `§E` declaration is treated as declaring none.
pub fn analyze(module: &BoundModule, catalog: &EffectsCatalog) -> EffectAnalysis {
    let mut inference =
        Inference { module, catalog, memo: HashMap::new(), active: HashSet::new(), hit_cycle: false };
    let mut out = EffectAnalysis::default();

    for f in &module.functions {
        let collected = inference.function_effects(f);
        inference.hit_cycle = false;
        let inferred = collected.to_set();

        let mut declared = BTreeSet::new();
        for (code, span) in f.declared_effects.iter().flatten() {
            match Effect::from_code(code) {
                Some(e) => {
                    declared.insert(e);
                }
                None => out.errors.push(EffectError::UnknownCode {
                    function: f.name.clone(),
                    code: code.clone(),
                    span: *span,
                }),
            }
        }

        if inferred.is_unknown() {
            let sources: Vec<String> = collected.unknown_sources.iter().map(|(s, _)| s.clone()).collect();
            let span = collected.unknown_sources.first().map_or(f.span, |(_, s)| *s);
            warn!(function = %f.name, ?sources, "effects unknown");
            out.errors.push(EffectError::UnknownEffects { function: f.name.clone(), sources, span });
        } else {
            let missing = inferred.except(&EffectSet::Known(declared.clone()));
            for effect in missing.iter() {
                out.errors.push(EffectError::Undeclared {
                    function: f.name.clone(),
                    code: effect.to_string(),
                    span: collected.sites.get(effect).copied().unwrap_or(f.span),
                });
            }
            for (code, span) in f.declared_effects.iter().flatten() {
                if Effect::from_code(code).is_some_and(|e| !inferred.contains(&e)) {
                    out.errors.push(EffectError::Unused { function: f.name.clone(), code: code.clone(), span: *span });
                }
            }
        }
        debug!(function = %f.id, effects = %inferred, "inferred effects");
        out.effects.insert(f.id.clone(), inferred);
    }
    out
}
