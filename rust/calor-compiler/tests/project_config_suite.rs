//! `calor.toml` discovery and its effect on compilation.

use calor_compiler::compiler::effects::EffectSet;
use calor_compiler::compiler::verification::smt_solver::SolverChoice;
use calor_compiler::config::ProjectConfig;
use calor_compiler::{compile, CompileError, CompileOptions};
use std::path::PathBuf;

struct TempProject {
    root: PathBuf,
}

impl TempProject {
    fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("calor-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(root.join("src")).expect("create project");
        Self { root }
    }

    fn write(&self, rel: &str, text: &str) {
        std::fs::write(self.root.join(rel), text).expect("write file");
    }
}

impl Drop for TempProject {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

#[test]
fn stubs_are_resolved_relative_to_project_root() {
    let project = TempProject::new("stubs");
    project.write(
        "calor.toml",
        "[effects]\nstubs = \"effects.json\"\n\n[verification]\nsolver = \"builtin\"\n",
    );
    project.write("effects.json", r#"{"stubs": {"Acme.Clock::Now(*)": ["time"]}}"#);

    let options = CompileOptions::discover(&project.root.join("src")).expect("options");
    assert_eq!(options.solver, SolverChoice::Builtin);
    assert!(options.catalog_errors.is_empty());

    let src = "§M{m1:T} §F{f1:Stamp} §E{time} §C{Acme.Clock.Now} §/C §/F{f1} §/M{m1}";
    let out = compile(src, Some("src/stamp.calr"), &options).expect("compiles");
    assert_eq!(out.effects["f1"], EffectSet::from_codes(["time"]));
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
}

#[test]
fn missing_config_means_defaults() {
    let project = TempProject::new("defaults");
    let options = CompileOptions::discover(&project.root).expect("options");
    assert!(options.verify_contracts);
    assert!(options.check_effects);
}

#[test]
fn malformed_config_is_a_hard_error() {
    let project = TempProject::new("broken");
    project.write("calor.toml", "[verification\nenabled = ");
    let err = CompileOptions::discover(&project.root).unwrap_err();
    assert!(matches!(err, CompileError::Config(_)), "{}", err);
}

#[test]
fn disabled_verification_skips_the_solver() {
    let config = ProjectConfig::parse("[verification]\nenabled = false").expect("parses");
    let options = CompileOptions::from_config(std::path::Path::new("."), &config).expect("options");
    let src = "§M{m1:T} §F{f1:Div} §I{i32:a} §I{i32:b} §O{i32} §S (result >= 0) §R (a / b) §/F{f1} §/M{m1}";
    let out = compile(src, None, &options).expect("compiles");
    assert!(out.verification.is_none());
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
}
