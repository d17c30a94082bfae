//! Public API comparison between two versions of a module.
//!
//! The public surface is every `pub` function plus the `pub` methods of
//! `pub` classes, keyed by stable ID so that renames are tracked as
//! changes rather than as a removal and an addition.

use crate::compiler::ast::{FunctionDef, Module, Visibility};
use crate::compiler::tokens::Span;
use crate::compiler::types::Type;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BreakingChangeReport {
    pub breaking_changes: Vec<String>,
    pub added_functions: Vec<String>,
    pub removed_functions: Vec<String>,
    pub has_breaking_changes: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("breaking change to public function '{name}' without a §BREAKING marker: {}", .changes.join("; "))]
    UndeclaredBreaking { id: String, name: String, changes: Vec<String>, span: Span },
    #[error("public function '{name}' ({id}) was removed")]
    Removed { id: String, name: String, span: Span },
    #[error("declared breaking change to '{name}': {}", .changes.join("; "))]
    DeclaredBreaking { id: String, name: String, changes: Vec<String>, span: Span },
}

impl ApiError {
    pub fn span(&self) -> Span {
        match self {
            ApiError::UndeclaredBreaking { span, .. }
            | ApiError::Removed { span, .. }
            | ApiError::DeclaredBreaking { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiComparison {
    pub report: BreakingChangeReport,
    pub errors: Vec<ApiError>,
}

/// Functions with their effective visibility: a method is only as visible
/// as its class.
fn surface(module: &Module) -> Vec<(&FunctionDef, bool)> {
    let mut out: Vec<(&FunctionDef, bool)> = module.functions().map(|f| (f, f.is_public())).collect();
    for class in module.classes() {
        let class_public = class.visibility == Visibility::Public;
        out.extend(class.methods.iter().map(|m| (m, class_public && m.is_public())));
    }
    out
}

fn return_type(f: &FunctionDef) -> Type {
    f.return_type.as_ref().map_or(Type::Void, |t| t.ty.clone())
}

/// Describe each signature difference between two versions of a function.
fn signature_changes(old: &FunctionDef, new: &FunctionDef, new_public: bool) -> Vec<String> {
    let mut changes = Vec::new();
    if !new_public {
        changes.push(if new.is_public() {
            "no longer public: declaring class is not public".to_string()
        } else {
            format!("visibility narrowed from pub to {}", new.visibility)
        });
    }
    if old.params.len() != new.params.len() {
        changes.push(format!("parameter count changed from {} to {}", old.params.len(), new.params.len()));
    }
    for (i, (a, b)) in old.params.iter().zip(&new.params).enumerate() {
        if a.ty.ty != b.ty.ty {
            changes.push(format!("parameter {} type changed from {} to {}", i + 1, a.ty.ty, b.ty.ty));
        }
        if a.name != b.name {
            changes.push(format!("parameter {} renamed from {} to {}", i + 1, a.name, b.name));
        }
    }
    let (old_ret, new_ret) = (return_type(old), return_type(new));
    if old_ret != new_ret {
        changes.push(format!("return type changed from {} to {}", old_ret, new_ret));
    }
    if new.preconditions.len() > old.preconditions.len() {
        changes.push(format!(
            "preconditions increased from {} to {}",
            old.preconditions.len(),
            new.preconditions.len()
        ));
    }
    changes
}

/// Compare the public surface of `old` against `new`.
pub fn compare(old: &Module, new: &Module) -> ApiComparison {
    let old_public: Vec<&FunctionDef> = surface(old).into_iter().filter(|(_, p)| *p).map(|(f, _)| f).collect();
    let old_by_id: HashMap<&str, &FunctionDef> = old_public.iter().map(|f| (f.id.as_str(), *f)).collect();
    let new_all = surface(new);
    let new_by_id: HashMap<&str, &FunctionDef> = new_all.iter().map(|(f, _)| (f.id.as_str(), *f)).collect();

    let mut out = ApiComparison::default();
    for (f, public) in &new_all {
        let label = format!("{} ({})", f.id, f.name);
        let Some(old_f) = old_by_id.get(f.id.as_str()) else {
            if *public {
                out.report.added_functions.push(label);
            }
            continue;
        };
        let changes = signature_changes(old_f, f, *public);
        if changes.is_empty() {
            continue;
        }
        out.report.breaking_changes.extend(changes.iter().map(|c| format!("{}: {}", label, c)));
        let (id, name, span) = (f.id.clone(), f.name.clone(), f.span);
        out.errors.push(match &f.breaking {
            Some(_) => ApiError::DeclaredBreaking { id, name, changes, span },
            None => ApiError::UndeclaredBreaking { id, name, changes, span },
        });
    }

    for f in &old_public {
        if !new_by_id.contains_key(f.id.as_str()) {
            out.report.removed_functions.push(format!("{} ({})", f.id, f.name));
            out.errors.push(ApiError::Removed { id: f.id.clone(), name: f.name.clone(), span: f.span });
        }
    }

    out.report.has_breaking_changes =
        !out.report.breaking_changes.is_empty() || !out.report.removed_functions.is_empty();
    info!(
        added = out.report.added_functions.len(),
        removed = out.report.removed_functions.len(),
        changed = out.report.breaking_changes.len(),
        "compared public API"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse;

    fn module(body: &str) -> Module {
        let out = parse(&format!("§M{{m1:Api}} {} §/M{{m1}}", body));
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        out.module.expect("module")
    }

    #[test]
    fn identical_modules_have_no_changes() {
        let m = module("§F{f1:Add:pub} §I{i32:a} §O{i32} §R a §/F{f1}");
        let cmp = compare(&m, &m);
        assert!(!cmp.report.has_breaking_changes);
        assert!(cmp.errors.is_empty());
    }

    #[test]
    fn removal_is_always_breaking() {
        let old = module("§F{f1:Add:pub} §/F{f1} §F{f2:Sub:pub} §BREAKING §/F{f2}");
        let new = module("§F{f2:Sub:pub} §BREAKING §/F{f2}");
        let cmp = compare(&old, &new);
        assert_eq!(cmp.report.removed_functions, vec!["f1 (Add)"]);
        assert!(cmp.report.has_breaking_changes);
        assert!(matches!(&cmp.errors[..], [ApiError::Removed { id, .. }] if id == "f1"));
    }

    #[test]
    fn signature_changes_are_named() {
        let old = module("§F{f1:Add:pub} §I{i32:a} §I{i32:b} §O{i32} §R a §/F{f1}");
        let new = module("§F{f1:Add:pub} §I{i64:a} §I{i32:c} §O{i64} §Q (a > 0) §R a §/F{f1}");
        let cmp = compare(&old, &new);
        assert_eq!(
            cmp.report.breaking_changes,
            vec![
                "f1 (Add): parameter 1 type changed from i32 to i64",
                "f1 (Add): parameter 2 renamed from b to c",
                "f1 (Add): return type changed from i32 to i64",
                "f1 (Add): preconditions increased from 0 to 1",
            ]
        );
        assert!(matches!(&cmp.errors[..], [ApiError::UndeclaredBreaking { changes, .. }] if changes.len() == 4));
    }

    #[test]
    fn marker_records_without_escalating() {
        let old = module("§F{f1:Add:pub} §I{i32:a} §/F{f1}");
        let new = module("§F{f1:Add:pub} §BREAKING{dropped arg} §/F{f1}");
        let cmp = compare(&old, &new);
        assert!(cmp.report.has_breaking_changes);
        assert!(matches!(&cmp.errors[..], [ApiError::DeclaredBreaking { .. }]));
    }

    #[test]
    fn narrowing_and_additions() {
        let old = module("§F{f1:A:pub} §/F{f1} §CL{c1:K:pub} §MT{mt1:Run:pub} §/MT{mt1} §/CL{c1}");
        let new = module(
            "§F{f1:A} §/F{f1} §F{f2:B:pub} §/F{f2} §CL{c1:K} §MT{mt1:Run:pub} §/MT{mt1} §/CL{c1}",
        );
        let cmp = compare(&old, &new);
        assert_eq!(cmp.report.added_functions, vec!["f2 (B)"]);
        assert_eq!(cmp.report.breaking_changes.len(), 2);
        assert!(cmp.report.breaking_changes[0].contains("visibility narrowed from pub to pri"));
        assert!(cmp.report.breaking_changes[1].starts_with("mt1 (Run): no longer public"));
        assert!(cmp.report.removed_functions.is_empty());
    }

    #[test]
    fn report_serializes_with_pascal_case_keys() {
        let json = serde_json::to_value(BreakingChangeReport::default()).expect("json");
        assert!(json.get("BreakingChanges").is_some());
        assert_eq!(json["HasBreakingChanges"], serde_json::Value::Bool(false));
    }
}
