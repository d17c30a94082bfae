//! Calor Compiler
//!
//! Front end for the tag-based Calor language: turns `.calr` source into a
//! bound, checked tree with per-function effect sets, and reports every
//! problem it finds as a [`diagnostics::Diagnostic`].

pub mod compiler;
pub mod config;
pub mod diagnostics;

use compiler::api_compat::{self, BreakingChangeReport};
use compiler::binder::{self, BoundModule};
use compiler::effects::{self, CatalogError, EffectSet, EffectsCatalog};
use compiler::exhaustiveness;
use compiler::parser;
use compiler::verification::smt_solver::{SmtSolver, SmtSolverFactory, SolverChoice};
use compiler::verification::{self, VerificationReport};
use config::{ConfigError, ProjectConfig};
use diagnostics::DiagnosticBag;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

// ── Compile options ─────────────────────────────────────────────────

/// Options controlling the analysis passes of the compile pipeline.
///
/// The catalog is shared read-only, so one `CompileOptions` can be cloned
/// into many concurrent compilations.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Effects of external APIs. Default: the builtin catalog.
    pub catalog: Arc<EffectsCatalog>,
    /// Problems found while loading the stub overlay, reported as
    /// diagnostics by every compilation.
    pub catalog_errors: Vec<CatalogError>,
    /// Run effect inference and checking. Default: `true`.
    pub check_effects: bool,
    /// Run match coverage checking. Default: `true`.
    pub check_exhaustiveness: bool,
    /// Verify contracts. Default: `true`.
    pub verify_contracts: bool,
    pub solver: SolverChoice,
    pub solver_timeout_ms: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            catalog: Arc::new(EffectsCatalog::builtin()),
            catalog_errors: Vec::new(),
            check_effects: true,
            check_exhaustiveness: true,
            verify_contracts: true,
            solver: SolverChoice::Auto,
            solver_timeout_ms: 5000,
        }
    }
}

impl CompileOptions {
    /// Build options from a parsed `calor.toml`. The stub path is resolved
    /// relative to `project_root`.
    pub fn from_config(project_root: &Path, config: &ProjectConfig) -> Result<Self, CompileError> {
        let mut catalog = EffectsCatalog::builtin();
        let mut catalog_errors = Vec::new();
        if let Some(stubs) = &config.effects.stubs {
            let path = project_root.join(stubs);
            catalog_errors = catalog
                .load_stub_file(&path)
                .map_err(|source| CompileError::Catalog { path: path.clone(), source })?;
            info!(path = %path.display(), entries = catalog.len(), rejected = catalog_errors.len(), "loaded effect stubs");
        }
        Ok(Self {
            catalog: Arc::new(catalog),
            catalog_errors,
            check_effects: config.analysis.effects,
            check_exhaustiveness: config.analysis.exhaustiveness,
            verify_contracts: config.verification.enabled,
            solver: config.verification.solver,
            solver_timeout_ms: config.verification.timeout_ms,
        })
    }

    /// Look for `calor.toml` from `start` upwards; defaults when none exists.
    pub fn discover(start: &Path) -> Result<Self, CompileError> {
        match ProjectConfig::discover(start)? {
            Some((root, config)) => Self::from_config(&root, &config),
            None => Ok(Self::default()),
        }
    }
}

// ── Errors and output ───────────────────────────────────────────────

/// Hard failures. Problems in the user's program are never reported this
/// way; they become diagnostics on [`CompileOutput`].
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("internal compiler error: {0}")]
    Internal(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot read effect stubs '{}': {source}", .path.display())]
    Catalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything one compilation produced.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// `None` when the source has no module header to recover from.
    pub module: Option<BoundModule>,
    /// Inferred effects per function ID.
    pub effects: BTreeMap<String, EffectSet>,
    pub diagnostics: DiagnosticBag,
    /// `None` when verification was disabled or skipped.
    pub verification: Option<VerificationReport>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Result of comparing two versions of a module's public API.
#[derive(Debug, Clone)]
pub struct ApiCheckOutput {
    pub report: BreakingChangeReport,
    pub diagnostics: DiagnosticBag,
}

// ── Pipeline ────────────────────────────────────────────────────────

/// Compile `source`, picking the contract solver from `options`.
pub fn compile(source: &str, file_path: Option<&str>, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    if options.verify_contracts {
        let solver = SmtSolverFactory::create(options.solver, options.solver_timeout_ms);
        compile_with_solver(source, file_path, options, solver.as_ref())
    } else {
        run_pipeline(source, file_path, options, None)
    }
}

/// Compile `source`, verifying contracts with the given solver.
pub fn compile_with_solver(
    source: &str,
    file_path: Option<&str>,
    options: &CompileOptions,
    solver: &dyn SmtSolver,
) -> Result<CompileOutput, CompileError> {
    run_pipeline(source, file_path, options, Some(solver))
}

fn run_pipeline(
    source: &str,
    file_path: Option<&str>,
    options: &CompileOptions,
    solver: Option<&dyn SmtSolver>,
) -> Result<CompileOutput, CompileError> {
    let mut bag = DiagnosticBag::new(file_path);
    bag.extend(
        options
            .catalog_errors
            .iter()
            .map(|e| diagnostics::format_effect_error(&effects::EffectError::Catalog(e.clone()))),
    );

    // 1. Lex + parse
    let parsed = parser::parse(source);
    bag.extend(parsed.lex_errors.iter().map(diagnostics::format_lex_error));
    bag.extend(parsed.errors.iter().map(diagnostics::format_parse_error));
    let Some(module) = parsed.module else {
        debug!(file = ?file_path, "no module header; stopping after parse");
        bag.sort();
        return Ok(CompileOutput { module: None, effects: BTreeMap::new(), diagnostics: bag, verification: None });
    };

    // 2. Bind
    let bound = binder::bind(&module).map_err(|e| CompileError::Internal(e.to_string()))?;
    bag.extend(bound.errors.iter().map(diagnostics::format_bind_error));
    let front_end_clean = !bag.has_errors();
    let module = bound.module;

    // 3. Effects
    let mut inferred = BTreeMap::new();
    if options.check_effects {
        let analysis = effects::analyze(&module, &options.catalog);
        bag.extend(analysis.errors.iter().map(diagnostics::format_effect_error));
        inferred = analysis.effects;
    }

    // 4. Match coverage
    if options.check_exhaustiveness {
        bag.extend(exhaustiveness::check(&module).iter().map(diagnostics::format_pattern_error));
    }

    // 5. Contracts, only over a tree without placeholder symbols
    let verification = match solver {
        Some(solver) if front_end_clean => {
            let report = verification::verify_module(&module, solver);
            bag.extend(report.errors.iter().map(diagnostics::format_contract_error));
            Some(report)
        }
        Some(_) => {
            debug!(module = %module.id, "skipping contract verification after front-end errors");
            None
        }
        None => None,
    };

    bag.sort();
    info!(
        module = %module.id,
        functions = module.functions.len(),
        diagnostics = bag.len(),
        errors = bag.count(diagnostics::Severity::Error),
        "compiled module"
    );
    Ok(CompileOutput { module: Some(module), effects: inferred, diagnostics: bag, verification })
}

/// Compare the public API of two versions of a module.
pub fn check_api_compat(old_source: &str, new_source: &str, file_path: Option<&str>) -> ApiCheckOutput {
    let mut bag = DiagnosticBag::new(file_path);
    let old = parser::parse(old_source);
    let new = parser::parse(new_source);
    for parsed in [&old, &new] {
        bag.extend(parsed.lex_errors.iter().map(diagnostics::format_lex_error));
        bag.extend(parsed.errors.iter().map(diagnostics::format_parse_error));
    }
    let report = match (&old.module, &new.module) {
        (Some(old_module), Some(new_module)) => {
            let comparison = api_compat::compare(old_module, new_module);
            bag.extend(comparison.errors.iter().map(diagnostics::format_api_error));
            comparison.report
        }
        _ => BreakingChangeReport::default(),
    };
    ApiCheckOutput { report, diagnostics: bag }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiler::verification::smt_solver::BuiltinBvSolver;

    fn no_verify() -> CompileOptions {
        CompileOptions { verify_contracts: false, ..CompileOptions::default() }
    }

    #[test]
    fn test_compile_simple() {
        let src = "§M{m001:Calc} §F{f001:Add:pub} §I{i32:a} §I{i32:b} §O{i32} §R (a + b) §/F{f001} §/M{m001}";
        let out = compile(src, Some("calc.calr"), &no_verify()).unwrap();
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        let module = out.module.unwrap();
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].name, "Add");
        assert_eq!(out.effects.get("f001"), Some(&EffectSet::empty()));
        assert!(out.verification.is_none());
    }

    #[test]
    fn test_missing_header_returns_no_module() {
        let out = compile("§F{f1:A} §/F{f1}", None, &no_verify()).unwrap();
        assert!(out.module.is_none());
        assert!(out.has_errors());
    }

    #[test]
    fn test_diagnostics_carry_file_path() {
        let src = "§M{m1:T} §F{f1:A} §R y §/F{f1} §/M{m1}";
        let out = compile(src, Some("a.calr"), &no_verify()).unwrap();
        let d = out.diagnostics.with_code("E0100").next().expect("undefined name");
        assert_eq!(d.file_path.as_deref(), Some("a.calr"));
    }

    #[test]
    fn test_verification_skipped_after_binding_errors() {
        let src = "§M{m1:T} §F{f1:A} §I{i32:a} §O{i32} §S (result > 0) §R zz §/F{f1} §/M{m1}";
        let out = compile_with_solver(src, None, &CompileOptions::default(), &BuiltinBvSolver::new()).unwrap();
        assert!(out.verification.is_none());
        assert!(out.has_errors());
    }

    #[test]
    fn test_analyses_can_be_disabled() {
        let src = "§M{m1:T} §F{f1:Main} §C{Console.WriteLine} §A \"hi\" §/C §/F{f1} §/M{m1}";
        let options = CompileOptions { check_effects: false, ..no_verify() };
        let out = compile(src, None, &options).unwrap();
        assert!(out.diagnostics.is_empty());
        assert!(out.effects.is_empty());
    }

    #[test]
    fn test_catalog_errors_become_warnings() {
        let mut catalog = EffectsCatalog::builtin();
        let catalog_errors = catalog.load_stubs(r#"{"stubs": {"not a signature": ["cw"]}}"#);
        let options = CompileOptions { catalog: Arc::new(catalog), catalog_errors, ..no_verify() };
        let out = compile("§M{m1:T} §/M{m1}", None, &options).unwrap();
        let d = out.diagnostics.with_code("E0304").next().expect("catalog diagnostic");
        assert_eq!(d.severity, diagnostics::Severity::Warning);
    }

    #[test]
    fn test_from_config_missing_stub_file_is_hard_error() {
        let config = ProjectConfig::parse("[effects]\nstubs = \"does-not-exist.json\"").unwrap();
        let err = CompileOptions::from_config(Path::new("/nonexistent-root"), &config).unwrap_err();
        assert!(matches!(err, CompileError::Catalog { .. }));
    }

    #[test]
    fn test_from_config_copies_sections() {
        let config =
            ProjectConfig::parse("[verification]\nenabled = false\nsolver = \"builtin\"\n[analysis]\nexhaustiveness = false")
                .unwrap();
        let options = CompileOptions::from_config(Path::new("."), &config).unwrap();
        assert!(!options.verify_contracts);
        assert!(!options.check_exhaustiveness);
        assert!(options.check_effects);
        assert_eq!(options.solver, SolverChoice::Builtin);
    }

    #[test]
    fn test_check_api_compat_reports_parse_errors() {
        let out = check_api_compat("§M{m1:T} §/M{m1}", "§M{m1:T} §F{f1:A} §/M{m1}", None);
        assert!(out.diagnostics.has_errors());
        assert!(!out.report.has_breaking_changes);
    }
}
