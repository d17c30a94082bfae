//! Symbols and lexical scopes shared by the binder and the analyzers.
//!
//! Symbols live in a flat arena addressed by [`SymbolId`]; scopes form a
//! parent-linked chain allocated as a stack, since a scope never outlives
//! the syntactic block that opened it.

use crate::compiler::tokens::Span;
use crate::compiler::types::Type;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SymbolKind {
    Variable { ty: Type, mutable: bool, is_parameter: bool },
    Function { id: String, params: Vec<(String, Type)>, return_type: Type },
    /// A class, enum, union, or interface declared in the module.
    Type { ty: Type },
    /// Placeholder for an unresolved reference.
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
}

impl Symbol {
    pub fn ty(&self) -> Type {
        match &self.kind {
            SymbolKind::Variable { ty, .. } | SymbolKind::Type { ty } => ty.clone(),
            SymbolKind::Function { params, return_type, .. } => {
                Type::Function(params.iter().map(|(_, t)| t.clone()).collect(), Box::new(return_type.clone()))
            }
            SymbolKind::Error => Type::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, SymbolKind::Error)
    }

    pub fn is_mutable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable { mutable: true, .. })
    }
}

/// Arena of every symbol created during one binding pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId((self.symbols.len() - 1) as u32)
    }

    /// Create a fresh error sentinel standing in for an unresolved `name`.
    pub fn add_error(&mut self, name: &str, span: Span) -> SymbolId {
        self.add(Symbol { name: name.to_string(), kind: SymbolKind::Error, span })
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)
    }

    pub fn name(&self, id: SymbolId) -> &str {
        self.get(id).map(|s| s.name.as_str()).unwrap_or("<unknown>")
    }

    pub fn ty(&self, id: SymbolId) -> Type {
        self.get(id).map(Symbol::ty).unwrap_or(Type::Error)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId(i as u32), s))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeError {
    #[error("scope stack underflow: exit without a matching enter")]
    Underflow,
    #[error("scope {0:?} exited out of order")]
    OutOfOrder(ScopeId),
}

#[derive(Debug, Clone)]
struct Scope {
    parent: Option<ScopeId>,
    names: HashMap<String, SymbolId>,
}

/// Stack-allocated scope chain. `ScopeId`s are only valid while their
/// scope is live.
#[derive(Debug, Clone)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeArena {
    /// An arena holding only the module-level root scope.
    pub fn new() -> Self {
        Self { scopes: vec![Scope { parent: None, names: HashMap::new() }] }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current(&self) -> ScopeId {
        ScopeId((self.scopes.len() - 1) as u32)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Open a child of the current scope.
    pub fn enter(&mut self) -> ScopeId {
        let parent = Some(self.current());
        self.scopes.push(Scope { parent, names: HashMap::new() });
        self.current()
    }

    /// Close `scope`, which must be the innermost live scope.
    pub fn exit(&mut self, scope: ScopeId) -> Result<(), ScopeError> {
        if self.scopes.len() <= 1 {
            return Err(ScopeError::Underflow);
        }
        if scope != self.current() {
            return Err(ScopeError::OutOfOrder(scope));
        }
        self.scopes.pop();
        Ok(())
    }

    /// Declare `name` in the current scope. First declaration wins: on a
    /// redeclaration the existing symbol is returned as the error.
    pub fn declare(&mut self, name: &str, symbol: SymbolId) -> Result<(), SymbolId> {
        let idx = self.scopes.len() - 1;
        let scope = &mut self.scopes[idx];
        if let Some(existing) = scope.names.get(name) {
            return Err(*existing);
        }
        scope.names.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Resolve `name` walking outward from the current scope.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut cursor = Some(self.current());
        while let Some(ScopeId(i)) = cursor {
            let scope = self.scopes.get(i as usize)?;
            if let Some(id) = scope.names.get(name) {
                return Some(*id);
            }
            cursor = scope.parent;
        }
        None
    }

    pub fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        self.scopes.last().and_then(|s| s.names.get(name).copied())
    }

    /// Every name visible from the current scope, sorted. Used for
    /// "did you mean" suggestions.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.iter().flat_map(|s| s.names.keys().cloned()).collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(table: &mut SymbolTable, name: &str) -> SymbolId {
        table.add(Symbol {
            name: name.into(),
            kind: SymbolKind::Variable { ty: Type::i32(), mutable: false, is_parameter: false },
            span: Span::dummy(),
        })
    }

    #[test]
    fn lookup_walks_parents_and_shadows() {
        let mut table = SymbolTable::new();
        let mut scopes = ScopeArena::new();
        let outer = var(&mut table, "x");
        assert!(scopes.declare("x", outer).is_ok());
        let inner_scope = scopes.enter();
        let inner = var(&mut table, "x");
        assert!(scopes.declare("x", inner).is_ok());
        assert_eq!(scopes.lookup("x"), Some(inner));
        assert!(scopes.exit(inner_scope).is_ok());
        assert_eq!(scopes.lookup("x"), Some(outer));
    }

    #[test]
    fn first_declaration_wins() {
        let mut table = SymbolTable::new();
        let mut scopes = ScopeArena::new();
        let a = var(&mut table, "a");
        let b = var(&mut table, "a");
        assert!(scopes.declare("a", a).is_ok());
        assert_eq!(scopes.declare("a", b), Err(a));
        assert_eq!(scopes.lookup("a"), Some(a));
    }

    #[test]
    fn exited_names_are_gone() {
        let mut table = SymbolTable::new();
        let mut scopes = ScopeArena::new();
        let s = scopes.enter();
        let t = var(&mut table, "tmp");
        assert!(scopes.declare("tmp", t).is_ok());
        assert!(scopes.exit(s).is_ok());
        assert_eq!(scopes.lookup("tmp"), None);
    }

    #[test]
    fn exit_errors() {
        let mut scopes = ScopeArena::new();
        assert_eq!(scopes.exit(ScopeId(0)), Err(ScopeError::Underflow));
        let a = scopes.enter();
        let _b = scopes.enter();
        assert_eq!(scopes.exit(a), Err(ScopeError::OutOfOrder(a)));
    }

    #[test]
    fn error_symbols_are_distinct() {
        let mut table = SymbolTable::new();
        let e1 = table.add_error("nope", Span::dummy());
        let e2 = table.add_error("nope", Span::dummy());
        assert_ne!(e1, e2);
        assert!(table.get(e1).is_some_and(Symbol::is_error));
        assert_eq!(table.ty(e1), Type::Error);
    }
}
