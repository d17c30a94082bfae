//! End-to-end checks of the compile pipeline: each case compiles a small
//! module and inspects the diagnostics it produced.

use calor_compiler::compiler::binder::BoundStmt;
use calor_compiler::compiler::fixit::FixitKind;
use calor_compiler::diagnostics::{Diagnostic, Severity};
use calor_compiler::{compile, CompileOptions, CompileOutput};

fn options() -> CompileOptions {
    CompileOptions { verify_contracts: false, ..CompileOptions::default() }
}

fn module(body: &str) -> String {
    format!("§M{{m001:Test}}\n{}\n§/M{{m001}}\n", body.trim())
}

fn run(code: &str) -> CompileOutput {
    match compile(&module(code), Some("test.calr"), &options()) {
        Ok(out) => out,
        Err(err) => panic!("hard failure\n--- source ---\n{}\n--- error ---\n{}", code, err),
    }
}

fn assert_ok(id: &str, code: &str) {
    let out = run(code);
    let problems: Vec<&Diagnostic> = out.diagnostics.iter().collect();
    assert!(problems.is_empty(), "case '{}' produced diagnostics\n--- source ---\n{}\n--- diagnostics ---\n{:#?}", id, code, problems);
}

/// Exactly one diagnostic with `code`, whose message contains `expect`.
fn assert_diag(id: &str, code: &str, expect_code: &str, expect: &str) -> Diagnostic {
    let out = run(code);
    let matching: Vec<&Diagnostic> = out.diagnostics.with_code(expect_code).collect();
    assert_eq!(
        matching.len(),
        1,
        "case '{}' expected one {}\n--- source ---\n{}\n--- diagnostics ---\n{:#?}",
        id,
        expect_code,
        code,
        out.diagnostics.iter().collect::<Vec<_>>()
    );
    let d = matching[0].clone();
    assert!(
        d.message.to_lowercase().contains(&expect.to_lowercase()),
        "case '{}' message mismatch\nexpected substring: {}\nactual: {}",
        id,
        expect,
        d.message
    );
    d
}

// ── Clean programs ──

#[test]
fn clean_arithmetic_function() {
    assert_ok(
        "clean_arithmetic_function",
        r#"
§F{f001:Add:pub} §I{i32:a} §I{i32:b} §O{i32}
  §R (a + b)
§/F{f001}
"#,
    );
}

#[test]
fn clean_declared_console_write() {
    assert_ok(
        "clean_declared_console_write",
        r#"
§F{f001:Greet:pub} §I{str:name} §E{cw}
  §C{Console.WriteLine} §A name §/C
§/F{f001}
"#,
    );
}

#[test]
fn clean_exhaustive_enum_match() {
    assert_ok(
        "clean_exhaustive_enum_match",
        r#"
§EN{e001:Color} Red Green Blue §/EN{e001}
§F{f001:Code} §I{Color:c} §O{i32}
  §W{w001} c
    §K Red → §R 1
    §K Green → §R 2
    §K Blue → §R 3
  §/W{w001}
§/F{f001}
"#,
    );
}

// ── Tag matching ──

#[test]
fn mismatched_closing_id_suggests_opening_id() {
    let code = "§F{f001:Main} §/F{f002}";
    let d = assert_diag("mismatched_closing_id", code, "E0012", "closing tag §/F has ID 'f002'");
    assert_eq!(d.severity, Severity::Error);
    let fix = d.fixit.expect("fix-it attached");
    assert_eq!(fix.kind, FixitKind::Replace);
    assert_eq!(fix.replacement, "f001");
    let source = module(code);
    assert!(fix.apply(&source).contains("§F{f001:Main} §/F{f001}"));
}

#[test]
fn mismatch_is_reported_once_per_construct() {
    let out = run(
        r#"
§F{f001:A} §IF{if01} true §R §/IF{if02} §/F{f001}
§F{f002:B} §/F{f002}
"#,
    );
    assert_eq!(out.diagnostics.with_code("E0012").count(), 1);
    assert_eq!(out.module.expect("module").functions.len(), 2);
}

// ── Binding ──

#[test]
fn duplicate_parameter_keeps_both_entries() {
    let code = "§F{f001:F} §I{i32:a} §I{i32:a} §/F{f001}";
    let d = assert_diag("duplicate_parameter", code, "E0101", "duplicate definition of 'a'");
    assert_eq!(d.span.line, 2);
    assert!(d.suggestions.iter().any(|s| s.contains("first defined at line 2")), "{:?}", d.suggestions);
    let out = run(code);
    assert_eq!(out.module.expect("module").functions[0].params.len(), 2);
}

#[test]
fn undefined_name_suggests_close_match() {
    let d = assert_diag(
        "undefined_name",
        "§F{f001:F} §I{i32:count} §O{i32} §R (count + cuont) §/F{f001}",
        "E0100",
        "undefined name 'cuont'",
    );
    assert!(d.suggestions.iter().any(|s| s.contains("'count'")), "{:?}", d.suggestions);
}

#[test]
fn analysis_continues_after_binding_errors() {
    let out = run(
        r#"
§F{f001:F} §I{?i32:x}
  §B{y} missing
  §W{w001} x §K Some(_) → §R §/W{w001}
§/F{f001}
"#,
    );
    assert_eq!(out.diagnostics.with_code("E0100").count(), 1);
    assert_eq!(out.diagnostics.with_code("E0400").count(), 1);
}

// ── Effects ──

#[test]
fn undeclared_console_write_is_one_warning() {
    let d = assert_diag(
        "undeclared_console_write",
        "§F{f001:Main} §C{Console.WriteLine} §A \"hi\" §/C §/F{f001}",
        "E0300",
        "undeclared effect 'cw'",
    );
    assert_eq!(d.severity, Severity::Warning);
}

#[test]
fn undefined_callee_makes_effects_unknown() {
    let out = run("§F{f001:F} §C{Missing} §/C §/F{f001}");
    assert_eq!(out.diagnostics.with_code("E0104").count(), 1);
    let d = out.diagnostics.with_code("E0302").next().expect("unknown effects warning");
    assert_eq!(d.severity, Severity::Warning);
    assert!(out.effects["f001"].is_unknown());
}

#[test]
fn effects_are_exposed_per_function() {
    let out = run(
        r#"
§F{f001:Log} §E{cw} §C{Console.WriteLine} §A 1 §/C §/F{f001}
§F{f002:Pure} §I{i32:x} §O{i32} §R (x * 2) §/F{f002}
"#,
    );
    assert_eq!(out.effects["f001"].to_string(), "cw");
    assert!(out.effects["f002"].is_empty());
}

// ── Patterns ──

#[test]
fn option_with_only_some_is_missing_none() {
    let d = assert_diag(
        "option_only_some",
        "§F{f001:F} §I{?i32:x} §W{w001} x §K Some(_) → §R §/W{w001} §/F{f001}",
        "E0400",
        "missing None",
    );
    assert_eq!(d.severity, Severity::Warning);
    assert_ok(
        "option_some_and_none",
        "§F{f001:F} §I{?i32:x} §W{w001} x §K Some(_) → §R §K None → §R §/W{w001} §/F{f001}",
    );
}

#[test]
fn non_exhaustive_match_expression_is_an_error() {
    let d = assert_diag(
        "match_expression",
        "§F{f001:F} §I{bool:b} §O{i32} §R §W{w001} b §K true → 1 §/W{w001} §/F{f001}",
        "E0400",
        "missing false",
    );
    assert_eq!(d.severity, Severity::Error);
}

#[test]
fn arms_after_wildcard_are_unreachable() {
    for later in ["1", "Some(_)", "_", "other"] {
        let code = format!("§F{{f001:F}} §I{{i32:x}} §W{{w001}} x §K _ → §R §K {} → §R §/W{{w001}} §/F{{f001}}", later);
        let d = assert_diag("unreachable_arm", &code, "E0401", "unreachable match arm");
        assert_eq!(d.severity, Severity::Warning);
    }
}

// ── Loop bodies and statements ──

#[test]
fn statement_shapes_survive_binding() {
    let out = run(
        r#"
§F{f001:Loop} §I{i32:n} §O{i32}
  §B{~total} 0
  §L{l001:i} 0 n §SET{total} (total + i) §/L{l001}
  §WH{wh01} (total > 100) §SET{total} (total - 1) §/WH{wh01}
  §R total
§/F{f001}
"#,
    );
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    let m = out.module.expect("module");
    assert!(matches!(m.functions[0].body.last(), Some(BoundStmt::Return { .. })));
}

// ── Rendering ──

#[test]
fn rendered_diagnostic_points_at_source() {
    let code = "§F{f001:F} §O{i32} §R nope §/F{f001}";
    let source = module(code);
    let out = compile(&source, Some("demo.calr"), &options()).expect("compiles");
    let rendered = out.diagnostics.render_plain(&source);
    assert!(rendered.contains("error[E0100]: undefined name 'nope'"), "{}", rendered);
    assert!(rendered.contains("--> demo.calr:2:"), "{}", rendered);
    assert!(rendered.contains("^^^^"), "{}", rendered);
}

#[test]
fn diagnostics_serialize_for_tooling() {
    let out = run("§F{f001:Main} §C{Console.WriteLine} §A 1 §/C §/F{f001}");
    let json = serde_json::to_value(out.diagnostics.iter().collect::<Vec<_>>()).expect("json");
    assert_eq!(json[0]["code"], "E0300");
    assert_eq!(json[0]["severity"], "Warning");
    assert_eq!(json[0]["filePath"], "test.calr");
    assert!(json[0]["span"]["line"].as_u64().is_some());
}
