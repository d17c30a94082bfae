//! Binder: resolves names against lexical scopes, assigns a type to every
//! expression and produces the bound tree consumed by the analyzers and by
//! the code generator.
//!
//! Unresolved references never stop binding. Each one is reported once and
//! replaced by a fresh error symbol whose type is [`Type::Error`], which the
//! later stages treat as "already reported".

use crate::compiler::ast::*;
use crate::compiler::fixit::suggest_name;
use crate::compiler::scope::{ScopeArena, ScopeError, ScopeId, Symbol, SymbolId, SymbolKind, SymbolTable};
use crate::compiler::tokens::Span;
use crate::compiler::types::Type;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("undefined name '{name}'")]
    UndefinedName { name: String, span: Span, suggestion: Option<String> },
    #[error("duplicate definition of '{name}'")]
    DuplicateDefinition { name: String, span: Span, previous: Span },
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch { context: String, expected: String, found: String, span: Span },
    #[error("cannot assign to immutable variable '{name}'")]
    ImmutableAssignment { name: String, span: Span },
    #[error("undefined function '{name}'")]
    UndefinedFunction { name: String, span: Span, suggestion: Option<String> },
}

impl BindError {
    pub fn span(&self) -> Span {
        match self {
            BindError::UndefinedName { span, .. }
            | BindError::DuplicateDefinition { span, .. }
            | BindError::TypeMismatch { span, .. }
            | BindError::ImmutableAssignment { span, .. }
            | BindError::UndefinedFunction { span, .. } => *span,
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            BindError::UndefinedName { suggestion, .. } | BindError::UndefinedFunction { suggestion, .. } => {
                suggestion.as_deref()
            }
            _ => None,
        }
    }
}

// ── Type registry ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantInfo {
    pub name: String,
    pub payload: Option<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodInfo {
    pub id: String,
    pub params: Vec<Type>,
    pub return_type: Type,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassInfo {
    /// Fields and properties.
    pub members: BTreeMap<String, Type>,
    pub methods: BTreeMap<String, MethodInfo>,
}

/// Types declared by the module.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeRegistry {
    /// Closed sum types (enums and unions), variants in declaration order.
    pub sum_types: BTreeMap<String, Vec<VariantInfo>>,
    pub classes: BTreeMap<String, ClassInfo>,
    pub interfaces: BTreeSet<String>,
}

impl TypeRegistry {
    /// Variants of `ty` when it names a closed sum type of this module.
    pub fn variants_of(&self, ty: &Type) -> Option<&[VariantInfo]> {
        match ty {
            Type::Named(name, _) => self.sum_types.get(name).map(Vec::as_slice),
            _ => None,
        }
    }

    pub fn variant(&self, owner: &str, name: &str) -> Option<&VariantInfo> {
        self.sum_types.get(owner)?.iter().find(|v| v.name == name)
    }

    /// The single sum type declaring `variant`, if exactly one does.
    pub fn unique_owner(&self, variant: &str) -> Option<&str> {
        let mut owners = self
            .sum_types
            .iter()
            .filter(|(_, vs)| vs.iter().any(|v| v.name == variant))
            .map(|(k, _)| k.as_str());
        match (owners.next(), owners.next()) {
            (Some(owner), None) => Some(owner),
            _ => None,
        }
    }
}

// ── Bound tree ──

#[derive(Debug, Clone, Serialize)]
pub struct BoundModule {
    pub id: String,
    pub name: String,
    pub usings: Vec<String>,
    /// Free functions, then class methods, in source order.
    pub functions: Vec<BoundFunction>,
    pub registry: TypeRegistry,
    pub symbols: SymbolTable,
}

impl BoundModule {
    pub fn function(&self, id: &str) -> Option<&BoundFunction> {
        self.functions.iter().find(|f| f.id == id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundFunction {
    pub id: String,
    pub name: String,
    /// Declaring class for methods.
    pub owner: Option<String>,
    pub visibility: Visibility,
    pub params: Vec<SymbolId>,
    pub return_type: Type,
    /// Author-declared effect codes; `None` when no `§E` tag was written.
    pub declared_effects: Option<Vec<(String, Span)>>,
    pub preconditions: Vec<BoundExpr>,
    pub postconditions: Vec<BoundExpr>,
    /// The `result` symbol visible inside postconditions.
    pub result_symbol: Option<SymbolId>,
    pub body: Vec<BoundStmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum BoundStmt {
    Bind { symbol: SymbolId, value: BoundExpr, span: Span },
    Assign { target: BoundExpr, value: BoundExpr, span: Span },
    If {
        condition: BoundExpr,
        then_body: Vec<BoundStmt>,
        else_ifs: Vec<(BoundExpr, Vec<BoundStmt>)>,
        else_body: Option<Vec<BoundStmt>>,
        span: Span,
    },
    For {
        var: SymbolId,
        from: BoundExpr,
        to: BoundExpr,
        step: Option<BoundExpr>,
        body: Vec<BoundStmt>,
        span: Span,
    },
    ForEach { var: SymbolId, iterable: BoundExpr, body: Vec<BoundStmt>, span: Span },
    While { condition: BoundExpr, body: Vec<BoundStmt>, span: Span },
    Match(BoundMatch),
    Try { body: Vec<BoundStmt>, catches: Vec<BoundCatch>, finally: Option<Vec<BoundStmt>>, span: Span },
    Return { value: Option<BoundExpr>, span: Span },
    Throw { value: BoundExpr, span: Span },
    Call { call: BoundExpr, span: Span },
}

impl BoundStmt {
    pub fn span(&self) -> Span {
        match self {
            BoundStmt::Bind { span, .. }
            | BoundStmt::Assign { span, .. }
            | BoundStmt::If { span, .. }
            | BoundStmt::For { span, .. }
            | BoundStmt::ForEach { span, .. }
            | BoundStmt::While { span, .. }
            | BoundStmt::Try { span, .. }
            | BoundStmt::Return { span, .. }
            | BoundStmt::Throw { span, .. }
            | BoundStmt::Call { span, .. } => *span,
            BoundStmt::Match(m) => m.span,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundCatch {
    pub exception_type: Option<Type>,
    pub var: Option<SymbolId>,
    pub body: Vec<BoundStmt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundMatch {
    pub id: String,
    pub target: Box<BoundExpr>,
    pub arms: Vec<BoundArm>,
    pub is_expression: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundArm {
    pub pattern: BoundPattern,
    pub guard: Option<BoundExpr>,
    pub body: BoundArmBody,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum BoundArmBody {
    Block(Vec<BoundStmt>),
    Expr(BoundExpr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BoundPattern {
    Wildcard(Span),
    Binding(SymbolId, Span),
    Literal(LiteralValue, Span),
    Some(Box<BoundPattern>, Span),
    None(Span),
    Ok(Box<BoundPattern>, Span),
    Err(Box<BoundPattern>, Span),
    /// `owner` is the declaring sum type when it could be determined.
    Variant { owner: Option<String>, name: String, args: Vec<BoundPattern>, span: Span },
}

impl BoundPattern {
    pub fn span(&self) -> Span {
        match self {
            BoundPattern::Wildcard(s)
            | BoundPattern::Binding(_, s)
            | BoundPattern::Literal(_, s)
            | BoundPattern::Some(_, s)
            | BoundPattern::None(s)
            | BoundPattern::Ok(_, s)
            | BoundPattern::Err(_, s) => *s,
            BoundPattern::Variant { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CallTarget {
    /// A module-level function.
    Function { symbol: SymbolId, id: String },
    /// A method declared on a module class.
    Method { class: String, id: String },
    /// Anything outside the module, e.g. `Console.WriteLine`. `receiver`
    /// is the type or namespace the method is looked up on.
    External { receiver: String, method: String },
    /// Invocation of a local function value.
    Local(SymbolId),
    Unresolved,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundCall {
    /// Callee as written.
    pub target: String,
    pub callee: CallTarget,
    /// Instance receiver for calls through a variable.
    pub receiver: Option<Box<BoundExpr>>,
    pub args: Vec<BoundExpr>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundExpr {
    pub kind: BoundExprKind,
    pub ty: Type,
    pub span: Span,
}

impl BoundExpr {
    pub fn new(kind: BoundExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    fn error(span: Span) -> Self {
        Self { kind: BoundExprKind::Error, ty: Type::Error, span }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum BoundExprKind {
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    BoolLit(bool),
    Null,
    Variable(SymbolId),
    /// Enum or union variant used as a value.
    VariantRef { owner: String, name: String },
    /// Qualified reference to something outside the module (`Math.PI`).
    StaticRef(String),
    Field(Box<BoundExpr>, String),
    Index(Box<BoundExpr>, Box<BoundExpr>),
    Binary(Box<BoundExpr>, BinOp, Box<BoundExpr>),
    Unary(UnaryOp, Box<BoundExpr>),
    Conditional(Box<BoundExpr>, Box<BoundExpr>, Box<BoundExpr>),
    Call(BoundCall),
    New { ty: Type, class: Option<String>, args: Vec<BoundExpr> },
    Some(Box<BoundExpr>),
    None,
    Ok(Box<BoundExpr>),
    Err(Box<BoundExpr>),
    Await(Box<BoundExpr>),
    Lambda { params: Vec<SymbolId>, body: Vec<BoundStmt> },
    Match(Box<BoundMatch>),
    Quantifier { kind: QuantifierKind, vars: Vec<SymbolId>, body: Box<BoundExpr> },
    Error,
}

/// Result type of a binary operation. Comparison and logical operators
/// yield `bool`; arithmetic yields the wider float when either side is a
/// float and otherwise the left operand's type; `??` yields the right
/// operand's type when the left is an option.
pub fn binary_result_type(op: BinOp, left: &Type, right: &Type) -> Type {
    if op.is_comparison() || op.is_logical() {
        return Type::Bool;
    }
    if op == BinOp::Coalesce {
        return match left {
            Type::Option(_) => right.clone(),
            _ => left.clone(),
        };
    }
    if op.is_arithmetic() {
        match (left, right) {
            (Type::Float { bits: a }, Type::Float { bits: b }) => return Type::Float { bits: (*a).max(*b) },
            (Type::Float { .. }, _) => return left.clone(),
            (_, Type::Float { .. }) => return right.clone(),
            _ => {}
        }
    }
    left.clone()
}

#[derive(Debug, Clone)]
pub struct BindOutput {
    pub module: BoundModule,
    pub errors: Vec<BindError>,
}

/// Bind a parsed module. `Err` only for internal scope-discipline faults.
pub fn bind(module: &Module) -> Result<BindOutput, ScopeError> {
    let mut binder = Binder::new();
    binder.declare_items(module);
    let mut functions = Vec::new();
    for f in module.functions() {
        functions.push(binder.bind_function(f, None));
    }
    for class in module.classes() {
        binder.enter_class(class);
        for m in &class.methods {
            functions.push(binder.bind_function(m, Some(&class.name)));
        }
        binder.exit_class();
    }
    if let Some(e) = binder.internal {
        return Err(e);
    }
    debug!(module = %module.id, functions = functions.len(), errors = binder.errors.len(), "bound module");
    Ok(BindOutput {
        module: BoundModule {
            id: module.id.clone(),
            name: module.name.clone(),
            usings: module.usings.clone(),
            functions,
            registry: binder.registry,
            symbols: binder.symbols,
        },
        errors: binder.errors,
    })
}

struct Binder {
    symbols: SymbolTable,
    scopes: ScopeArena,
    registry: TypeRegistry,
    errors: Vec<BindError>,
    return_types: Vec<Type>,
    class_scope: Option<(String, ScopeId)>,
    internal: Option<ScopeError>,
}

impl Binder {
    fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            scopes: ScopeArena::new(),
            registry: TypeRegistry::default(),
            errors: Vec::new(),
            return_types: Vec::new(),
            class_scope: None,
            internal: None,
        }
    }

    fn leave(&mut self, scope: ScopeId) {
        if let Err(e) = self.scopes.exit(scope) {
            self.internal.get_or_insert(e);
        }
    }

    /// Create a symbol and declare it in the current scope. The symbol is
    /// returned even when the name is already taken.
    fn declare(&mut self, name: &str, kind: SymbolKind, span: Span) -> SymbolId {
        let id = self.symbols.add(Symbol { name: name.to_string(), kind, span });
        if let Err(previous) = self.scopes.declare(name, id) {
            let previous = self.symbols.get(previous).map_or(span, |s| s.span);
            self.errors.push(BindError::DuplicateDefinition { name: name.to_string(), span, previous });
        }
        id
    }

    fn declare_var(&mut self, name: &str, ty: Type, mutable: bool, is_parameter: bool, span: Span) -> SymbolId {
        self.declare(name, SymbolKind::Variable { ty, mutable, is_parameter }, span)
    }

    fn mismatch(&mut self, context: &str, expected: &Type, found: &Type, span: Span) {
        self.errors.push(BindError::TypeMismatch {
            context: context.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
            span,
        });
    }

    /// Report a mismatch unless `value` fits `expected`. Integer and float
    /// literals fit any numeric type of their kind that can hold them.
    fn expect_assignable(&mut self, expected: &Type, value: &BoundExpr, context: &str) {
        if expected.accepts(&value.ty) || literal_fits(expected, value) {
            return;
        }
        self.mismatch(context, expected, &value.ty, value.span);
    }

    // ── Declarations ──

    fn declare_items(&mut self, module: &Module) {
        for item in &module.items {
            match item {
                Item::Function(f) => {
                    let kind = SymbolKind::Function {
                        id: f.id.clone(),
                        params: f.params.iter().map(|p| (p.name.clone(), p.ty.ty.clone())).collect(),
                        return_type: return_type_of(f),
                    };
                    self.declare(&f.name, kind, f.span);
                }
                Item::Class(c) => {
                    let ty = Type::Named(c.name.clone(), Vec::new());
                    self.declare(&c.name, SymbolKind::Type { ty }, c.span);
                    let mut info = ClassInfo::default();
                    for field in &c.fields {
                        info.members.insert(field.name.clone(), field.ty.ty.clone());
                    }
                    for prop in &c.properties {
                        info.members.insert(prop.name.clone(), prop.ty.ty.clone());
                    }
                    for m in &c.methods {
                        info.methods.insert(
                            m.name.clone(),
                            MethodInfo {
                                id: m.id.clone(),
                                params: m.params.iter().map(|p| p.ty.ty.clone()).collect(),
                                return_type: return_type_of(m),
                            },
                        );
                    }
                    self.registry.classes.insert(c.name.clone(), info);
                }
                Item::Interface(i) => {
                    let ty = Type::Named(i.name.clone(), Vec::new());
                    self.declare(&i.name, SymbolKind::Type { ty }, i.span);
                    self.registry.interfaces.insert(i.name.clone());
                }
                Item::Enum(e) => self.declare_sum_type(&e.name, &e.variants, e.span),
                Item::Union(u) => self.declare_sum_type(&u.name, &u.variants, u.span),
            }
        }
    }

    fn declare_sum_type(&mut self, name: &str, variants: &[VariantDef], span: Span) {
        let ty = Type::Named(name.to_string(), Vec::new());
        self.declare(name, SymbolKind::Type { ty }, span);
        let mut infos: Vec<VariantInfo> = Vec::new();
        for (i, v) in variants.iter().enumerate() {
            if let Some(prev) = variants[..i].iter().find(|o| o.name == v.name) {
                self.errors.push(BindError::DuplicateDefinition {
                    name: format!("{}.{}", name, v.name),
                    span: v.span,
                    previous: prev.span,
                });
                continue;
            }
            infos.push(VariantInfo { name: v.name.clone(), payload: v.payload.as_ref().map(|t| t.ty.clone()) });
        }
        self.registry.sum_types.insert(name.to_string(), infos);
    }

    fn enter_class(&mut self, class: &ClassDef) {
        let scope = self.scopes.enter();
        let this_ty = Type::Named(class.name.clone(), Vec::new());
        self.declare_var("this", this_ty, false, false, class.span);
        for field in &class.fields {
            self.declare_var(&field.name, field.ty.ty.clone(), true, false, field.span);
        }
        for prop in &class.properties {
            self.declare_var(&prop.name, prop.ty.ty.clone(), true, false, prop.span);
        }
        self.class_scope = Some((class.name.clone(), scope));
    }

    fn exit_class(&mut self) {
        if let Some((_, scope)) = self.class_scope.take() {
            self.leave(scope);
        }
    }

    // ── Functions ──

    fn bind_function(&mut self, f: &FunctionDef, owner: Option<&str>) -> BoundFunction {
        let scope = self.scopes.enter();
        let return_type = return_type_of(f);
        let params: Vec<SymbolId> =
            f.params.iter().map(|p| self.declare_var(&p.name, p.ty.ty.clone(), false, true, p.span)).collect();

        let preconditions = f.preconditions.iter().map(|e| self.bind_condition(e, "precondition")).collect();

        let post_scope = self.scopes.enter();
        let result_symbol =
            (return_type != Type::Void).then(|| self.declare_var("result", return_type.clone(), false, false, f.span));
        let postconditions = f.postconditions.iter().map(|e| self.bind_condition(e, "postcondition")).collect();
        self.leave(post_scope);

        self.return_types.push(return_type.clone());
        let body = self.bind_stmts(&f.body);
        self.return_types.pop();
        self.leave(scope);

        BoundFunction {
            id: f.id.clone(),
            name: f.name.clone(),
            owner: owner.map(str::to_string),
            visibility: f.visibility,
            params,
            return_type,
            declared_effects: f.effects.as_ref().map(|e| e.codes.clone()),
            preconditions,
            postconditions,
            result_symbol,
            body,
            span: f.span,
        }
    }

    // ── Statements ──

    fn bind_stmts(&mut self, stmts: &[Stmt]) -> Vec<BoundStmt> {
        stmts.iter().filter_map(|s| self.bind_stmt(s)).collect()
    }

    fn bind_block(&mut self, stmts: &[Stmt]) -> Vec<BoundStmt> {
        let scope = self.scopes.enter();
        let out = self.bind_stmts(stmts);
        self.leave(scope);
        out
    }

    fn bind_stmt(&mut self, stmt: &Stmt) -> Option<BoundStmt> {
        Some(match stmt {
            Stmt::Bind(b) => {
                let value = self.bind_expr(&b.value);
                let ty = match &b.ty {
                    Some(declared) => {
                        self.expect_assignable(&declared.ty, &value, &format!("binding of '{}'", b.name));
                        declared.ty.clone()
                    }
                    None => value.ty.clone(),
                };
                let symbol = self.declare_var(&b.name, ty, b.mutable, false, b.span);
                BoundStmt::Bind { symbol, value, span: b.span }
            }
            Stmt::Assign(a) => {
                let target = self.bind_expr(&a.target);
                let value = self.bind_expr(&a.value);
                if let BoundExprKind::Variable(id) = target.kind {
                    let immutable = self
                        .symbols
                        .get(id)
                        .filter(|s| matches!(s.kind, SymbolKind::Variable { mutable: false, .. }))
                        .map(|s| s.name.clone());
                    if let Some(name) = immutable {
                        self.errors.push(BindError::ImmutableAssignment { name, span: target.span });
                    }
                }
                self.expect_assignable(&target.ty, &value, "assignment");
                BoundStmt::Assign { target, value, span: a.span }
            }
            Stmt::If(i) => {
                let condition = self.bind_condition(&i.condition, "if condition");
                let then_body = self.bind_block(&i.then_body);
                let else_ifs = i
                    .else_ifs
                    .iter()
                    .map(|ei| (self.bind_condition(&ei.condition, "elseif condition"), self.bind_block(&ei.body)))
                    .collect();
                let else_body = i.else_body.as_ref().map(|b| self.bind_block(b));
                BoundStmt::If { condition, then_body, else_ifs, else_body, span: i.span }
            }
            Stmt::For(f) => {
                let from = self.bind_expr(&f.from);
                let to = self.bind_expr(&f.to);
                let step = f.step.as_ref().map(|s| self.bind_expr(s));
                for bound in [&from, &to].into_iter().chain(step.as_ref()) {
                    if !bound.ty.is_integer() && !bound.ty.is_indeterminate() {
                        self.mismatch("loop bound", &Type::i32(), &bound.ty, bound.span);
                    }
                }
                let var_ty = if from.ty.is_integer() { from.ty.clone() } else { Type::i32() };
                let scope = self.scopes.enter();
                let var = self.declare_var(&f.var, var_ty, false, false, f.span);
                let body = self.bind_stmts(&f.body);
                self.leave(scope);
                BoundStmt::For { var, from, to, step, body, span: f.span }
            }
            Stmt::ForEach(f) => {
                let iterable = self.bind_expr(&f.iterable);
                let elem = element_type(&iterable.ty);
                let scope = self.scopes.enter();
                let var = self.declare_var(&f.var, elem, false, false, f.span);
                let body = self.bind_stmts(&f.body);
                self.leave(scope);
                BoundStmt::ForEach { var, iterable, body, span: f.span }
            }
            Stmt::While(w) => {
                let condition = self.bind_condition(&w.condition, "while condition");
                let body = self.bind_block(&w.body);
                BoundStmt::While { condition, body, span: w.span }
            }
            Stmt::Match(m) => BoundStmt::Match(self.bind_match(m)),
            Stmt::Try(t) => {
                let body = self.bind_block(&t.body);
                let mut catches = Vec::new();
                for c in &t.catches {
                    let scope = self.scopes.enter();
                    let exception_type = c.exception_type.as_ref().map(|t| t.ty.clone());
                    let var = c.var.as_ref().map(|v| {
                        let ty = exception_type.clone().unwrap_or(Type::Object);
                        self.declare_var(v, ty, false, false, c.span)
                    });
                    let body = self.bind_stmts(&c.body);
                    self.leave(scope);
                    catches.push(BoundCatch { exception_type, var, body });
                }
                let finally = t.finally.as_ref().map(|b| self.bind_block(b));
                BoundStmt::Try { body, catches, finally, span: t.span }
            }
            Stmt::Return(r) => {
                let value = r.value.as_ref().map(|v| self.bind_expr(v));
                let expected = self.return_types.last().cloned().unwrap_or(Type::Unknown);
                match (&value, &expected) {
                    (Some(v), Type::Void) if v.ty != Type::Error => {
                        self.mismatch("return value", &Type::Void, &v.ty.clone(), v.span)
                    }
                    (Some(_), Type::Void) => {}
                    (Some(v), t) => self.expect_assignable(t, v, "return value"),
                    (None, Type::Void | Type::Unknown) => {}
                    (None, t) => self.mismatch("return value", &t.clone(), &Type::Void, r.span),
                }
                BoundStmt::Return { value, span: r.span }
            }
            Stmt::Throw(t) => BoundStmt::Throw { value: self.bind_expr(&t.value), span: t.span },
            Stmt::Call(c) => BoundStmt::Call { call: self.bind_call(c), span: c.span },
            Stmt::Error(_) => return None,
        })
    }

    fn bind_condition(&mut self, expr: &Expr, context: &str) -> BoundExpr {
        let bound = self.bind_expr(expr);
        if !Type::Bool.accepts(&bound.ty) {
            self.mismatch(context, &Type::Bool, &bound.ty, bound.span);
        }
        bound
    }

    // ── Match ──

    fn bind_match(&mut self, m: &MatchExpr) -> BoundMatch {
        let target = self.bind_expr(&m.target);
        let mut arms = Vec::new();
        for arm in &m.arms {
            let scope = self.scopes.enter();
            let pattern = self.bind_pattern(&arm.pattern, &target.ty);
            let guard = arm.guard.as_ref().map(|g| self.bind_condition(g, "match guard"));
            let body = match &arm.body {
                ArmBody::Block(stmts) => BoundArmBody::Block(self.bind_stmts(stmts)),
                ArmBody::Expr(e) => BoundArmBody::Expr(self.bind_expr(e)),
            };
            self.leave(scope);
            arms.push(BoundArm { pattern, guard, body, span: arm.span });
        }
        BoundMatch { id: m.id.clone(), target: Box::new(target), arms, is_expression: m.is_expression, span: m.span }
    }

    /// Owner of `name` when it is a variant usable against `expected`.
    fn variant_owner_for(&self, name: &str, expected: &Type) -> Option<String> {
        if let Some(variants) = self.registry.variants_of(expected) {
            let Type::Named(owner, _) = expected else { return None };
            return variants.iter().any(|v| v.name == name).then(|| owner.clone());
        }
        self.registry.unique_owner(name).map(str::to_string)
    }

    fn bind_pattern(&mut self, pattern: &Pattern, expected: &Type) -> BoundPattern {
        match pattern {
            Pattern::Wildcard(s) => BoundPattern::Wildcard(*s),
            Pattern::Binding(name, s) => match self.variant_owner_for(name, expected) {
                Some(owner) => BoundPattern::Variant { owner: Some(owner), name: name.clone(), args: Vec::new(), span: *s },
                None => BoundPattern::Binding(self.declare_var(name, expected.clone(), false, false, *s), *s),
            },
            Pattern::Literal(v, s) => BoundPattern::Literal(v.clone(), *s),
            Pattern::Some(inner, s) => {
                let inner_ty = match expected {
                    Type::Option(t) => (**t).clone(),
                    _ => Type::Unknown,
                };
                BoundPattern::Some(Box::new(self.bind_pattern(inner, &inner_ty)), *s)
            }
            Pattern::None(s) => BoundPattern::None(*s),
            Pattern::Ok(inner, s) => {
                let inner_ty = match expected {
                    Type::Result(ok, _) => (**ok).clone(),
                    _ => Type::Unknown,
                };
                BoundPattern::Ok(Box::new(self.bind_pattern(inner, &inner_ty)), *s)
            }
            Pattern::Err(inner, s) => {
                let inner_ty = match expected {
                    Type::Result(_, err) => (**err).clone(),
                    _ => Type::Unknown,
                };
                BoundPattern::Err(Box::new(self.bind_pattern(inner, &inner_ty)), *s)
            }
            Pattern::Variant { type_name, name, args, span } => {
                let owner = type_name.clone().or_else(|| self.variant_owner_for(name, expected));
                let mut payload = None;
                if let Some(owner) = &owner {
                    if self.registry.sum_types.contains_key(owner) {
                        match self.registry.variant(owner, name) {
                            Some(v) => payload = v.payload.clone(),
                            None => self.errors.push(BindError::UndefinedName {
                                name: format!("{}.{}", owner, name),
                                span: *span,
                                suggestion: self.registry.sum_types.get(owner).and_then(|vs| {
                                    let names: Vec<String> = vs.iter().map(|v| v.name.clone()).collect();
                                    suggest_name(name, &names)
                                }),
                            }),
                        }
                    }
                }
                let arg_ty = match (&payload, args.len()) {
                    (Some(t), 1) => t.clone(),
                    _ => Type::Unknown,
                };
                let args = args.iter().map(|a| self.bind_pattern(a, &arg_ty)).collect();
                BoundPattern::Variant { owner, name: name.clone(), args, span: *span }
            }
        }
    }

    // ── Expressions ──

    fn undefined_name(&mut self, name: &str, span: Span) -> BoundExpr {
        let suggestion = suggest_name(name, &self.scopes.visible_names());
        self.errors.push(BindError::UndefinedName { name: name.to_string(), span, suggestion });
        let id = self.symbols.add_error(name, span);
        BoundExpr::new(BoundExprKind::Variable(id), Type::Error, span)
    }

    fn bind_expr(&mut self, expr: &Expr) -> BoundExpr {
        match expr {
            Expr::IntLit(n, s) => {
                let ty = if i32::try_from(*n).is_ok() { Type::i32() } else { Type::int(64, true) };
                BoundExpr::new(BoundExprKind::IntLit(*n), ty, *s)
            }
            Expr::FloatLit(f, s) => BoundExpr::new(BoundExprKind::FloatLit(*f), Type::Float { bits: 64 }, *s),
            Expr::StringLit(v, s) => BoundExpr::new(BoundExprKind::StrLit(v.clone()), Type::Str, *s),
            Expr::BoolLit(b, s) => BoundExpr::new(BoundExprKind::BoolLit(*b), Type::Bool, *s),
            Expr::Null(s) => BoundExpr::new(BoundExprKind::Null, Type::Null, *s),
            Expr::Ident(name, s) => {
                if let Some(id) = self.scopes.lookup(name) {
                    return BoundExpr::new(BoundExprKind::Variable(id), self.symbols.ty(id), *s);
                }
                if let Some(owner) = self.registry.unique_owner(name).map(str::to_string) {
                    let ty = Type::Named(owner.clone(), Vec::new());
                    return BoundExpr::new(BoundExprKind::VariantRef { owner, name: name.clone() }, ty, *s);
                }
                self.undefined_name(name, *s)
            }
            Expr::FieldAccess(base, field, s) => self.bind_field_access(expr, base, field, *s),
            Expr::Index(base, index, s) => {
                let base = self.bind_expr(base);
                let index = self.bind_expr(index);
                if !index.ty.is_integer() && !index.ty.is_indeterminate() {
                    self.mismatch("index", &Type::i32(), &index.ty, index.span);
                }
                let ty = element_type(&base.ty);
                BoundExpr::new(BoundExprKind::Index(Box::new(base), Box::new(index)), ty, *s)
            }
            Expr::Binary(l, op, r, s) => {
                let l = self.bind_expr(l);
                let r = self.bind_expr(r);
                if op.is_logical() {
                    for side in [&l, &r] {
                        if !Type::Bool.accepts(&side.ty) {
                            self.mismatch(&format!("operand of '{}'", op), &Type::Bool, &side.ty, side.span);
                        }
                    }
                }
                let ty = binary_result_type(*op, &l.ty, &r.ty);
                BoundExpr::new(BoundExprKind::Binary(Box::new(l), *op, Box::new(r)), ty, *s)
            }
            Expr::Unary(op, inner, s) => {
                let inner = self.bind_expr(inner);
                let ty = match op {
                    UnaryOp::Not => {
                        if !Type::Bool.accepts(&inner.ty) {
                            self.mismatch("operand of '!'", &Type::Bool, &inner.ty, inner.span);
                        }
                        Type::Bool
                    }
                    UnaryOp::Neg | UnaryOp::BitNot => inner.ty.clone(),
                };
                BoundExpr::new(BoundExprKind::Unary(*op, Box::new(inner)), ty, *s)
            }
            Expr::Conditional(c, t, e, s) => {
                let c = self.bind_condition(c, "conditional");
                let t = self.bind_expr(t);
                let e = self.bind_expr(e);
                let ty = if t.ty.is_indeterminate() || t.ty == Type::Null { e.ty.clone() } else { t.ty.clone() };
                BoundExpr::new(BoundExprKind::Conditional(Box::new(c), Box::new(t), Box::new(e)), ty, *s)
            }
            Expr::Call(c) => self.bind_call(c),
            Expr::New(n) => {
                let args: Vec<BoundExpr> = n.args.iter().map(|a| self.bind_expr(a)).collect();
                let class = match &n.ty.ty {
                    Type::Named(name, _) if self.registry.classes.contains_key(name) => Some(name.clone()),
                    _ => None,
                };
                BoundExpr::new(BoundExprKind::New { ty: n.ty.ty.clone(), class, args }, n.ty.ty.clone(), n.span)
            }
            Expr::Some(inner, s) => {
                let inner = self.bind_expr(inner);
                let ty = Type::Option(Box::new(inner.ty.clone()));
                BoundExpr::new(BoundExprKind::Some(Box::new(inner)), ty, *s)
            }
            Expr::None(s) => BoundExpr::new(BoundExprKind::None, Type::Option(Box::new(Type::Unknown)), *s),
            Expr::Ok(inner, s) => {
                let inner = self.bind_expr(inner);
                let ty = Type::Result(Box::new(inner.ty.clone()), Box::new(Type::Unknown));
                BoundExpr::new(BoundExprKind::Ok(Box::new(inner)), ty, *s)
            }
            Expr::Err(inner, s) => {
                let inner = self.bind_expr(inner);
                let ty = Type::Result(Box::new(Type::Unknown), Box::new(inner.ty.clone()));
                BoundExpr::new(BoundExprKind::Err(Box::new(inner)), ty, *s)
            }
            Expr::Await(inner, s) => {
                let inner = self.bind_expr(inner);
                let ty = inner.ty.clone();
                BoundExpr::new(BoundExprKind::Await(Box::new(inner)), ty, *s)
            }
            Expr::Lambda(l) => {
                let scope = self.scopes.enter();
                let params: Vec<SymbolId> =
                    l.params.iter().map(|p| self.declare_var(&p.name, p.ty.ty.clone(), false, true, p.span)).collect();
                self.return_types.push(Type::Unknown);
                let body = self.bind_stmts(&l.body);
                self.return_types.pop();
                self.leave(scope);
                let ty = Type::Function(l.params.iter().map(|p| p.ty.ty.clone()).collect(), Box::new(Type::Unknown));
                BoundExpr::new(BoundExprKind::Lambda { params, body }, ty, l.span)
            }
            Expr::Match(m) => {
                let bound = self.bind_match(m);
                let ty = bound
                    .arms
                    .iter()
                    .filter_map(|a| match &a.body {
                        BoundArmBody::Expr(e) if !e.ty.is_indeterminate() => Some(e.ty.clone()),
                        _ => None,
                    })
                    .next()
                    .unwrap_or(Type::Unknown);
                BoundExpr::new(BoundExprKind::Match(Box::new(bound)), ty, m.span)
            }
            Expr::Quantifier(q) => {
                let scope = self.scopes.enter();
                let vars = q.vars.iter().map(|(name, t)| self.declare_var(name, t.ty.clone(), false, false, t.span)).collect();
                let body = self.bind_condition(&q.body, "quantifier body");
                self.leave(scope);
                BoundExpr::new(BoundExprKind::Quantifier { kind: q.kind, vars, body: Box::new(body) }, Type::Bool, q.span)
            }
            Expr::Error(s) => BoundExpr::error(*s),
        }
    }

    fn bind_field_access(&mut self, whole: &Expr, base: &Expr, field: &str, span: Span) -> BoundExpr {
        if let (Some(root), Some(path)) = (root_ident(base), dotted_path(base)) {
            if self.scopes.lookup(root).is_none() {
                if self.registry.sum_types.contains_key(&path) {
                    if self.registry.variant(&path, field).is_some() {
                        let ty = Type::Named(path.clone(), Vec::new());
                        return BoundExpr::new(BoundExprKind::VariantRef { owner: path, name: field.to_string() }, ty, span);
                    }
                    return self.undefined_name(&format!("{}.{}", path, field), span);
                }
                if self.registry.unique_owner(root).is_none() {
                    let full = dotted_path(whole).unwrap_or_else(|| format!("{}.{}", path, field));
                    return BoundExpr::new(BoundExprKind::StaticRef(full), Type::Unknown, span);
                }
            }
        }
        let base = self.bind_expr(base);
        let ty = self.member_type(&base.ty, field, span);
        BoundExpr::new(BoundExprKind::Field(Box::new(base), field.to_string()), ty, span)
    }

    fn member_type(&mut self, ty: &Type, member: &str, span: Span) -> Type {
        match ty {
            Type::Named(name, _) if self.registry.classes.contains_key(name) => {
                let found = self.registry.classes.get(name).and_then(|c| c.members.get(member)).cloned();
                match found {
                    Some(t) => t,
                    None => {
                        let candidates: Vec<String> = self
                            .registry
                            .classes
                            .get(name)
                            .map(|c| c.members.keys().cloned().collect())
                            .unwrap_or_default();
                        self.errors.push(BindError::UndefinedName {
                            name: format!("{}.{}", name, member),
                            span,
                            suggestion: suggest_name(member, &candidates),
                        });
                        Type::Error
                    }
                }
            }
            Type::Array(_) | Type::Str if member == "Length" || member == "Count" => Type::i32(),
            _ => Type::Unknown,
        }
    }

    // ── Calls ──

    fn bind_call(&mut self, call: &CallExpr) -> BoundExpr {
        let args: Vec<BoundExpr> = call.args.iter().map(|a| self.bind_expr(a)).collect();
        let (callee, receiver, ty) = match call.target.rsplit_once('.') {
            None => {
                let (callee, ty) = self.resolve_free_call(&call.target, &args, call.span);
                (callee, None, ty)
            }
            Some((recv, method)) => self.resolve_member_call(recv, method, &args, call.span),
        };
        let kind = BoundExprKind::Call(BoundCall { target: call.target.clone(), callee, receiver, args });
        BoundExpr::new(kind, ty, call.span)
    }

    fn resolve_free_call(&mut self, name: &str, args: &[BoundExpr], span: Span) -> (CallTarget, Type) {
        if let Some(id) = self.scopes.lookup(name) {
            let symbol = self.symbols.get(id).cloned();
            match symbol.map(|s| s.kind) {
                Some(SymbolKind::Function { id: fid, params, return_type }) => {
                    let param_types: Vec<Type> = params.into_iter().map(|(_, t)| t).collect();
                    self.check_args(name, &param_types, args, span);
                    return (CallTarget::Function { symbol: id, id: fid }, return_type);
                }
                Some(SymbolKind::Variable { ty: Type::Function(_, ret), .. }) => return (CallTarget::Local(id), *ret),
                Some(SymbolKind::Variable { ty, .. }) if ty.is_indeterminate() => {
                    return (CallTarget::Local(id), Type::Unknown)
                }
                _ => {}
            }
        }
        if let Some((class, _)) = &self.class_scope {
            let method = self.registry.classes.get(class).and_then(|c| c.methods.get(name)).cloned();
            if let Some(m) = method {
                let class = class.clone();
                self.check_args(name, &m.params, args, span);
                return (CallTarget::Method { class, id: m.id }, m.return_type);
            }
        }
        let candidates: Vec<String> = self
            .symbols
            .iter()
            .filter(|(_, s)| matches!(s.kind, SymbolKind::Function { .. }))
            .map(|(_, s)| s.name.clone())
            .collect();
        self.errors.push(BindError::UndefinedFunction {
            name: name.to_string(),
            span,
            suggestion: suggest_name(name, &candidates),
        });
        (CallTarget::Unresolved, Type::Error)
    }

    fn resolve_member_call(
        &mut self,
        recv: &str,
        method: &str,
        args: &[BoundExpr],
        span: Span,
    ) -> (CallTarget, Option<Box<BoundExpr>>, Type) {
        let root = recv.split('.').next().unwrap_or(recv);
        if self.scopes.lookup(root).is_some() {
            let receiver = self.bind_path(recv, span);
            if let Type::Named(class, _) = &receiver.ty {
                if let Some(info) = self.registry.classes.get(class) {
                    let class = class.clone();
                    return match info.methods.get(method).cloned() {
                        Some(m) => {
                            self.check_args(method, &m.params, args, span);
                            (CallTarget::Method { class, id: m.id }, Some(Box::new(receiver)), m.return_type)
                        }
                        None => {
                            self.errors.push(BindError::UndefinedFunction {
                                name: format!("{}.{}", class, method),
                                span,
                                suggestion: None,
                            });
                            (CallTarget::Unresolved, Some(Box::new(receiver)), Type::Error)
                        }
                    };
                }
            }
            let callee = CallTarget::External { receiver: receiver.ty.receiver_name(), method: method.to_string() };
            return (callee, Some(Box::new(receiver)), Type::Unknown);
        }
        if let Some(info) = self.registry.classes.get(recv) {
            return match info.methods.get(method).cloned() {
                Some(m) => {
                    self.check_args(method, &m.params, args, span);
                    (CallTarget::Method { class: recv.to_string(), id: m.id }, None, m.return_type)
                }
                None => {
                    let candidates: Vec<String> = info.methods.keys().cloned().collect();
                    self.errors.push(BindError::UndefinedFunction {
                        name: format!("{}.{}", recv, method),
                        span,
                        suggestion: suggest_name(method, &candidates),
                    });
                    (CallTarget::Unresolved, None, Type::Error)
                }
            };
        }
        let callee = CallTarget::External { receiver: recv.to_string(), method: method.to_string() };
        (callee, None, Type::Unknown)
    }

    /// Bind a dotted receiver path such as `this.items` whose root is in scope.
    fn bind_path(&mut self, path: &str, span: Span) -> BoundExpr {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or(path);
        let mut expr = match self.scopes.lookup(root) {
            Some(id) => BoundExpr::new(BoundExprKind::Variable(id), self.symbols.ty(id), span),
            None => self.undefined_name(root, span),
        };
        for seg in segments {
            let ty = self.member_type(&expr.ty, seg, span);
            expr = BoundExpr::new(BoundExprKind::Field(Box::new(expr), seg.to_string()), ty, span);
        }
        expr
    }

    fn check_args(&mut self, name: &str, params: &[Type], args: &[BoundExpr], span: Span) {
        if params.len() != args.len() {
            self.errors.push(BindError::TypeMismatch {
                context: format!("call to '{}'", name),
                expected: format!("{} argument(s)", params.len()),
                found: format!("{} argument(s)", args.len()),
                span,
            });
            return;
        }
        for (i, (param, arg)) in params.iter().zip(args).enumerate() {
            self.expect_assignable(param, arg, &format!("argument {} of '{}'", i + 1, name));
        }
    }
}

fn return_type_of(f: &FunctionDef) -> Type {
    f.return_type.as_ref().map(|t| t.ty.clone()).unwrap_or(Type::Void)
}

fn element_type(ty: &Type) -> Type {
    match ty {
        Type::Array(t) => (**t).clone(),
        Type::Named(name, args) if args.len() == 1 && matches!(name.as_str(), "List" | "IEnumerable" | "HashSet") => {
            args[0].clone()
        }
        Type::Str => Type::Char,
        Type::Error => Type::Error,
        _ => Type::Unknown,
    }
}

fn literal_fits(expected: &Type, value: &BoundExpr) -> bool {
    let literal = match &value.kind {
        BoundExprKind::IntLit(n) => Some(*n),
        BoundExprKind::Unary(UnaryOp::Neg, inner) => match inner.kind {
            BoundExprKind::IntLit(n) => n.checked_neg(),
            _ => None,
        },
        _ => None,
    };
    match (expected, literal, &value.kind) {
        (Type::Int { bits, signed }, Some(n), _) => {
            let bits = (*bits).min(64);
            if *signed {
                let min = if bits == 64 { i64::MIN } else { -(1i64 << (bits - 1)) };
                let max = if bits == 64 { i64::MAX } else { (1i64 << (bits - 1)) - 1 };
                (min..=max).contains(&n)
            } else {
                n >= 0 && (bits == 64 || n < (1i64 << bits))
            }
        }
        (Type::Float { .. }, _, BoundExprKind::FloatLit(_)) => true,
        _ => false,
    }
}

fn root_ident(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(n, _) => Some(n),
        Expr::FieldAccess(b, _, _) => root_ident(b),
        _ => None,
    }
}

fn dotted_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(n, _) => Some(n.clone()),
        Expr::FieldAccess(b, f, _) => dotted_path(b).map(|p| format!("{}.{}", p, f)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse;

    fn bind_src(src: &str) -> BindOutput {
        let out = parse(src);
        assert!(out.errors.is_empty(), "parse errors: {:?}", out.errors);
        bind(&out.module.expect("module")).expect("bind")
    }

    #[test]
    fn binds_params_and_locals() {
        let out = bind_src("§M{m1:T} §F{f1:Add} §I{i32:a} §I{i32:b} §O{i32} §B{s} (+ a b) §R s §/F{f1} §/M{m1}");
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let f = &out.module.functions[0];
        assert_eq!(f.params.len(), 2);
        let BoundStmt::Bind { value, .. } = &f.body[0] else { panic!("bind") };
        assert_eq!(value.ty, Type::i32());
    }

    #[test]
    fn undefined_name_gets_error_symbol_and_suggestion() {
        let out = bind_src("§M{m1:T} §F{f1:A} §I{i32:count} §O{i32} §R (+ cout 1) §/F{f1} §/M{m1}");
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(&out.errors[0], BindError::UndefinedName { name, suggestion: Some(s), .. } if name == "cout" && s == "count"));
        let BoundStmt::Return { value: Some(v), .. } = &out.module.functions[0].body[0] else { panic!("return") };
        let BoundExprKind::Binary(l, _, _) = &v.kind else { panic!("binary") };
        assert_eq!(l.ty, Type::Error);
        let BoundExprKind::Variable(id) = l.kind else { panic!("variable") };
        assert!(out.module.symbols.get(id).is_some_and(Symbol::is_error));
    }

    #[test]
    fn arithmetic_typing_rules() {
        let f64t = Type::Float { bits: 64 };
        assert_eq!(binary_result_type(BinOp::Add, &Type::i32(), &f64t), f64t);
        assert_eq!(binary_result_type(BinOp::Add, &Type::int(8, false), &Type::i32()), Type::int(8, false));
        assert_eq!(binary_result_type(BinOp::Lt, &Type::i32(), &Type::i32()), Type::Bool);
        assert_eq!(binary_result_type(BinOp::And, &Type::Bool, &Type::Bool), Type::Bool);
        assert_eq!(
            binary_result_type(BinOp::Coalesce, &Type::Option(Box::new(Type::Str)), &Type::Str),
            Type::Str
        );
    }

    #[test]
    fn immutable_assignment_reported() {
        let out = bind_src("§M{m1:T} §F{f1:A} §B{x} 1 §SET{x} 2 §B{~y} 1 §SET{y} 3 §/F{f1} §/M{m1}");
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(&out.errors[0], BindError::ImmutableAssignment { name, .. } if name == "x"));
    }

    #[test]
    fn bind_type_mismatch() {
        let out = bind_src("§M{m1:T} §F{f1:A} §B{bool:x} 1 §B{u8:y} 200 §B{u8:z} 300 §/F{f1} §/M{m1}");
        assert_eq!(out.errors.len(), 2, "{:?}", out.errors);
        assert!(out.errors.iter().all(|e| matches!(e, BindError::TypeMismatch { .. })));
    }

    #[test]
    fn non_boolean_condition() {
        let out = bind_src("§M{m1:T} §F{f1:A} §I{i32:x} §Q (+ x 1) §IF{i1} x §R §/IF{i1} §/F{f1} §/M{m1}");
        assert_eq!(out.errors.len(), 2);
    }

    #[test]
    fn scopes_end_with_their_block() {
        let out = bind_src(
            "§M{m1:T} §F{f1:A} §I{bool:c}
               §IF{i1} c §B{tmp} 1 §/IF{i1}
               §R tmp
             §/F{f1} §/M{m1}",
        );
        assert_eq!(out.errors.len(), 1, "{:?}", out.errors);
        assert!(matches!(&out.errors[0], BindError::UndefinedName { name, .. } if name == "tmp"));
    }

    #[test]
    fn calls_resolve_to_module_functions_and_externals() {
        let out = bind_src(
            "§M{m1:T}
             §F{f1:Helper} §I{i32:x} §O{i32} §R x §/F{f1}
             §F{f2:Main}
               §B{v} §C{Helper} §A 1 §/C
               §C{Console.WriteLine} §A v §/C
               §C{Hepler} §A 1 §/C
             §/F{f2}
             §/M{m1}",
        );
        let main = out.module.function("f2").expect("main");
        let BoundStmt::Bind { value, .. } = &main.body[0] else { panic!("bind") };
        assert!(matches!(&value.kind, BoundExprKind::Call(BoundCall { callee: CallTarget::Function { id, .. }, .. }) if id == "f1"));
        assert_eq!(value.ty, Type::i32());
        let BoundStmt::Call { call, .. } = &main.body[1] else { panic!("call") };
        assert!(matches!(&call.kind, BoundExprKind::Call(BoundCall { callee: CallTarget::External { receiver, method }, .. }) if receiver == "Console" && method == "WriteLine"));
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(&out.errors[0], BindError::UndefinedFunction { suggestion: Some(s), .. } if s == "Helper"));
    }

    #[test]
    fn variant_patterns_resolve_against_target_type() {
        let out = bind_src(
            "§M{m1:T}
             §EN{e1:Color} Red Green §/EN{e1}
             §F{f1:A} §I{Color:c}
               §W{w1} c §K Red → §R §K other → §R §/W{w1}
             §/F{f1}
             §/M{m1}",
        );
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let BoundStmt::Match(m) = &out.module.functions[0].body[0] else { panic!("match") };
        assert!(matches!(&m.arms[0].pattern, BoundPattern::Variant { owner: Some(o), .. } if o == "Color"));
        assert!(matches!(m.arms[1].pattern, BoundPattern::Binding(..)));
    }

    #[test]
    fn methods_see_class_members() {
        let out = bind_src(
            "§M{m1:T}
             §CL{c1:Counter:pub}
               §FLD{i32:count}
               §MT{mt1:Inc:pub} §SET{count} (+ count 1) §C{Reset} §/C §/MT{mt1}
               §MT{mt2:Reset:pub} §SET{this.count} 0 §/MT{mt2}
             §/CL{c1}
             §/M{m1}",
        );
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.module.functions.len(), 2);
        assert_eq!(out.module.functions[0].owner.as_deref(), Some("Counter"));
    }

    #[test]
    fn result_visible_only_in_postconditions() {
        let out = bind_src(
            "§M{m1:T} §F{f1:A} §I{i32:a} §O{i32} §Q (result > 0) §S (result >= a) §R a §/F{f1} §/M{m1}",
        );
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(&out.errors[0], BindError::UndefinedName { name, .. } if name == "result"));
        assert!(out.module.functions[0].result_symbol.is_some());
    }

    #[test]
    fn static_references_are_not_errors() {
        let out = bind_src("§M{m1:T} §F{f1:A} §O{f64} §R Math.PI §/F{f1} §/M{m1}");
        assert!(out.errors.is_empty(), "{:?}", out.errors);
    }
}
