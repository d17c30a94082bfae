use crate::compiler::tokens::Span;
use crate::compiler::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

/// A complete Calor module (one `.calr` file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub name: String,
    pub usings: Vec<String>,
    pub items: Vec<Item>,
    pub span: Span,
}

impl Module {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.items.iter().filter_map(|i| match i {
            Item::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.items.iter().filter_map(|i| match i {
            Item::Class(c) => Some(c),
            _ => None,
        })
    }

    /// Every function body in the module: free functions followed by
    /// class methods, in source order within each group.
    pub fn all_functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions().chain(self.classes().flat_map(|c| c.methods.iter()))
    }
}

/// Top-level items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    Function(FunctionDef),
    Class(ClassDef),
    Interface(InterfaceDef),
    Enum(EnumDef),
    Union(UnionDef),
}

impl Item {
    pub fn span(&self) -> Span {
        match self {
            Item::Function(f) => f.span,
            Item::Class(c) => c.span,
            Item::Interface(i) => i.span,
            Item::Enum(e) => e.span,
            Item::Union(u) => u.span,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Item::Function(f) => &f.id,
            Item::Class(c) => &c.id,
            Item::Interface(i) => &i.id,
            Item::Enum(e) => &e.id,
            Item::Union(u) => &u.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
pub enum Visibility {
    #[strum(serialize = "pub")]
    Public,
    #[default]
    #[strum(serialize = "pri")]
    Private,
    #[strum(serialize = "int")]
    Internal,
    #[strum(serialize = "pro")]
    Protected,
}

/// A type reference as written, plus its parsed form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub text: String,
    pub ty: Type,
    pub span: Span,
}

// ── Functions ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
    pub is_async: bool,
    pub params: Vec<Param>,
    pub return_type: Option<TypeRef>,
    /// `None` when no `§E` tag was written; an empty declaration is `Some`.
    pub effects: Option<EffectDecl>,
    pub preconditions: Vec<Expr>,
    pub postconditions: Vec<Expr>,
    pub breaking: Option<BreakingMarker>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl FunctionDef {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDecl {
    pub codes: Vec<(String, Span)>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakingMarker {
    pub reason: Option<String>,
    pub span: Span,
}

// ── Classes, interfaces, enums, unions ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
    pub fields: Vec<FieldDef>,
    pub properties: Vec<PropertyDef>,
    pub methods: Vec<FunctionDef>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub visibility: Visibility,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub ty: TypeRef,
    pub visibility: Visibility,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
    pub methods: Vec<FunctionDef>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
    pub variants: Vec<VariantDef>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDef {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
    pub variants: Vec<VariantDef>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: String,
    pub payload: Option<TypeRef>,
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Bind(BindStmt),
    Assign(AssignStmt),
    If(IfStmt),
    For(ForStmt),
    ForEach(ForEachStmt),
    While(WhileStmt),
    Match(MatchExpr),
    Try(TryStmt),
    Return(ReturnStmt),
    Throw(ThrowStmt),
    Call(CallExpr),
    /// Placeholder left behind by parser recovery.
    Error(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Bind(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::ForEach(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::Match(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Throw(s) => s.span,
            Stmt::Call(s) => s.span,
            Stmt::Error(s) => *s,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindStmt {
    pub name: String,
    pub mutable: bool,
    pub ty: Option<TypeRef>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignStmt {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStmt {
    pub id: String,
    pub condition: Expr,
    pub then_body: Vec<Stmt>,
    pub else_ifs: Vec<ElseIf>,
    pub else_body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElseIf {
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStmt {
    pub id: String,
    pub var: String,
    pub from: Expr,
    pub to: Expr,
    pub step: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForEachStmt {
    pub id: String,
    pub var: String,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStmt {
    pub id: String,
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryStmt {
    pub id: String,
    pub body: Vec<Stmt>,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub exception_type: Option<TypeRef>,
    pub var: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

// ── Match ──

/// A match construct; `is_expression` is fixed by where it was parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchExpr {
    pub id: String,
    pub target: Box<Expr>,
    pub arms: Vec<MatchArm>,
    pub is_expression: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: ArmBody,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArmBody {
    Block(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralValue {
    Int(i64),
    Str(String),
    Bool(bool),
    Null,
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Int(n) => write!(f, "{}", n),
            LiteralValue::Str(s) => write!(f, "\"{}\"", s),
            LiteralValue::Bool(b) => write!(f, "{}", b),
            LiteralValue::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard(Span),
    /// Bare identifier. Becomes a variant pattern when the name is a
    /// declared variant, otherwise binds the matched value.
    Binding(String, Span),
    Literal(LiteralValue, Span),
    Some(Box<Pattern>, Span),
    None(Span),
    Ok(Box<Pattern>, Span),
    Err(Box<Pattern>, Span),
    Variant { type_name: Option<String>, name: String, args: Vec<Pattern>, span: Span },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard(s)
            | Pattern::Binding(_, s)
            | Pattern::Literal(_, s)
            | Pattern::Some(_, s)
            | Pattern::None(s)
            | Pattern::Ok(_, s)
            | Pattern::Err(_, s) => *s,
            Pattern::Variant { span, .. } => *span,
        }
    }
}

// ── Expressions ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpr {
    /// Callee as written: `Name`, `Type.Method`, or `obj.Method`.
    pub target: String,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpr {
    pub ty: TypeRef,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaExpr {
    pub id: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantifierKind {
    Forall,
    Exists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantifierExpr {
    pub kind: QuantifierKind,
    pub vars: Vec<(String, TypeRef)>,
    pub body: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    IntLit(i64, Span),
    FloatLit(f64, Span),
    StringLit(String, Span),
    BoolLit(bool, Span),
    Null(Span),
    Ident(String, Span),
    FieldAccess(Box<Expr>, String, Span),
    Index(Box<Expr>, Box<Expr>, Span),
    Binary(Box<Expr>, BinOp, Box<Expr>, Span),
    Unary(UnaryOp, Box<Expr>, Span),
    /// `(? cond then else)`
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>, Span),
    Call(CallExpr),
    New(NewExpr),
    Some(Box<Expr>, Span),
    None(Span),
    Ok(Box<Expr>, Span),
    Err(Box<Expr>, Span),
    Lambda(LambdaExpr),
    Await(Box<Expr>, Span),
    Match(Box<MatchExpr>),
    Quantifier(QuantifierExpr),
    /// Placeholder left behind by parser recovery.
    Error(Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit(_, s)
            | Expr::FloatLit(_, s)
            | Expr::StringLit(_, s)
            | Expr::BoolLit(_, s)
            | Expr::Null(s)
            | Expr::Ident(_, s)
            | Expr::FieldAccess(_, _, s)
            | Expr::Index(_, _, s)
            | Expr::Binary(_, _, _, s)
            | Expr::Unary(_, _, s)
            | Expr::Conditional(_, _, _, s)
            | Expr::Some(_, s)
            | Expr::None(s)
            | Expr::Ok(_, s)
            | Expr::Err(_, s)
            | Expr::Await(_, s)
            | Expr::Error(s) => *s,
            Expr::Call(c) => c.span,
            Expr::New(n) => n.span,
            Expr::Lambda(l) => l.span,
            Expr::Match(m) => m.span,
            Expr::Quantifier(q) => q.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Coalesce,
    Implies,
}

impl BinOp {
    /// Binding power for the infix form; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Implies => 1,
            BinOp::Coalesce => 2,
            BinOp::Or => 3,
            BinOp::And => 4,
            BinOp::BitOr => 5,
            BinOp::BitXor => 6,
            BinOp::BitAnd => 7,
            BinOp::Eq | BinOp::NotEq => 8,
            BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => 9,
            BinOp::Shl | BinOp::Shr => 10,
            BinOp::Add | BinOp::Sub => 11,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 12,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        self == BinOp::Implies
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or | BinOp::Implies)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Coalesce => "??",
            BinOp::Implies => "=>",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::BitNot => write!(f, "~"),
        }
    }
}
