//! Breaking-change detection between two versions of a module.

use calor_compiler::check_api_compat;
use calor_compiler::diagnostics::Severity;

fn module(body: &str) -> String {
    format!("§M{{m001:Lib}} {} §/M{{m001}}", body)
}

#[test]
fn removing_public_function_is_breaking() {
    let old = module("§F{f001:Add:pub} §I{i32:a} §O{i32} §R a §/F{f001} §F{f002:Sub:pub} §/F{f002}");
    let new = module("§F{f002:Sub:pub} §/F{f002}");
    let out = check_api_compat(&old, &new, Some("lib.calr"));
    assert_eq!(out.report.removed_functions, vec!["f001 (Add)"]);
    assert!(out.report.has_breaking_changes);
    let d = out.diagnostics.with_code("E0501").next().expect("removal diagnostic");
    assert_eq!(d.severity, Severity::Error);
}

#[test]
fn removing_private_function_is_not_breaking() {
    let old = module("§F{f001:Helper} §/F{f001} §F{f002:Run:pub} §/F{f002}");
    let new = module("§F{f002:Run:pub} §/F{f002}");
    let out = check_api_compat(&old, &new, None);
    assert!(out.report.removed_functions.is_empty());
    assert!(!out.report.has_breaking_changes);
    assert!(out.diagnostics.is_empty());
}

#[test]
fn renaming_keeps_identity_by_stable_id() {
    let old = module("§F{f001:Add:pub} §I{i32:a} §O{i32} §R a §/F{f001}");
    let new = module("§F{f001:Plus:pub} §I{i32:a} §O{i32} §R a §/F{f001}");
    let out = check_api_compat(&old, &new, None);
    assert!(out.report.removed_functions.is_empty());
    assert!(out.report.added_functions.is_empty());
}

#[test]
fn undeclared_signature_change_is_an_error() {
    let old = module("§F{f001:Add:pub} §I{i32:a} §O{i32} §R a §/F{f001}");
    let new = module("§F{f001:Add:pub} §I{i64:a} §O{i32} §R 0 §/F{f001}");
    let out = check_api_compat(&old, &new, None);
    assert_eq!(out.report.breaking_changes, vec!["f001 (Add): parameter 1 type changed from i32 to i64"]);
    let d = out.diagnostics.with_code("E0500").next().expect("breaking diagnostic");
    assert_eq!(d.severity, Severity::Error);
    assert!(d.suggestions.iter().any(|s| s.contains("§BREAKING")));
}

#[test]
fn breaking_marker_downgrades_to_info() {
    let old = module("§F{f001:Add:pub} §I{i32:a} §O{i32} §R a §/F{f001}");
    let new = module("§F{f001:Add:pub} §BREAKING{widened} §I{i64:a} §O{i32} §R 0 §/F{f001}");
    let out = check_api_compat(&old, &new, None);
    assert!(out.report.has_breaking_changes);
    assert!(!out.diagnostics.has_errors());
    assert_eq!(out.diagnostics.with_code("E0502").count(), 1);
}

#[test]
fn additions_are_reported_but_not_breaking() {
    let old = module("§F{f001:Add:pub} §/F{f001}");
    let new = module("§F{f001:Add:pub} §/F{f001} §F{f002:Mul:pub} §/F{f002}");
    let out = check_api_compat(&old, &new, None);
    assert_eq!(out.report.added_functions, vec!["f002 (Mul)"]);
    assert!(!out.report.has_breaking_changes);
}

#[test]
fn report_serializes_for_tooling() {
    let old = module("§F{f001:Add:pub} §/F{f001}");
    let out = check_api_compat(&old, &module(""), None);
    let json = serde_json::to_value(&out.report).expect("json");
    assert_eq!(json["RemovedFunctions"][0], "f001 (Add)");
    assert_eq!(json["HasBreakingChanges"], true);
}
