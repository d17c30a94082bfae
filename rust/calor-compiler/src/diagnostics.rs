//! Diagnostic records with stable codes, source snippets and suggestions.
//!
//! Every stage reports into a [`DiagnosticBag`]; nothing here aborts a
//! compilation.

use crate::compiler::api_compat::ApiError;
use crate::compiler::binder::BindError;
use crate::compiler::effects::EffectError;
use crate::compiler::error_codes;
use crate::compiler::exhaustiveness::PatternError;
use crate::compiler::fixit::FixitHint;
use crate::compiler::lexer::LexError;
use crate::compiler::parser::ParseError;
use crate::compiler::tokens::Span;
use crate::compiler::verification::ContractError;
use serde::Serialize;
use strum_macros::{Display, EnumString};

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Source location in the shape tooling consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagnosticSpan {
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl From<Span> for DiagnosticSpan {
    fn from(span: Span) -> Self {
        Self { line: span.line, column: span.col, length: span.len() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub span: DiagnosticSpan,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixit: Option<FixitHint>,
}

impl Diagnostic {
    pub fn new(code: &str, severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            span: span.into(),
            severity,
            file_path: None,
            suggestions: Vec::new(),
            fixit: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_fixit(mut self, fixit: FixitHint) -> Self {
        self.suggestions.push(fixit.message.clone());
        self.fixit = Some(fixit);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn location(&self) -> Option<String> {
        let file = self.file_path.as_deref().unwrap_or("<input>");
        match (self.span.line, self.span.column) {
            (0, _) => self.file_path.clone(),
            (line, 0) => Some(format!("{}:{}", file, line)),
            (line, col) => Some(format!("{}:{}:{}", file, line, col)),
        }
    }

    fn snippet(&self, source: &str) -> Option<(String, String)> {
        let text = get_source_line(source, self.span.line)?;
        let remaining = text.chars().count().saturating_sub(self.span.column.saturating_sub(1));
        let underline = make_underline(self.span.column, self.span.length.min(remaining));
        Some((text, underline))
    }

    /// Render with ANSI colors for terminal
    pub fn render_ansi(&self, source: &str) -> String {
        let mut out = String::new();

        // Header: error[E0100]: message
        let severity_label = match self.severity {
            Severity::Error => red("error"),
            Severity::Warning => yellow("warning"),
            Severity::Info => cyan("info"),
        };
        out.push_str(&format!("{}[{}]: {}\n", severity_label, bold(&self.code), bold(&self.message)));

        if let Some(loc) = self.location() {
            out.push_str(&format!("  {} {}\n", cyan("-->"), loc));
        }

        if let Some((line_text, underline)) = self.snippet(source) {
            out.push_str(&format!("   {}\n", cyan("|")));
            out.push_str(&format!("{:>3} {} {}\n", cyan(&self.span.line.to_string()), cyan("|"), line_text));
            let marker = match self.severity {
                Severity::Error => red(&underline),
                Severity::Warning => yellow(&underline),
                Severity::Info => cyan(&underline),
            };
            out.push_str(&format!("   {} {}\n", cyan("|"), marker));
        }

        if !self.suggestions.is_empty() {
            out.push_str(&format!("   {}\n", cyan("|")));
            for suggestion in &self.suggestions {
                out.push_str(&format!("   {} {}: {}\n", cyan("="), cyan("help"), suggestion));
            }
        }

        out
    }

    /// Render without colors (for editors, tests)
    pub fn render_plain(&self, source: &str) -> String {
        let mut out = String::new();

        out.push_str(&format!("{}[{}]: {}\n", self.severity, self.code, self.message));

        if let Some(loc) = self.location() {
            out.push_str(&format!("  --> {}\n", loc));
        }

        if let Some((line_text, underline)) = self.snippet(source) {
            out.push_str("   |\n");
            out.push_str(&format!("{:>3} | {}\n", self.span.line, line_text));
            out.push_str(&format!("   | {}\n", underline));
        }

        if !self.suggestions.is_empty() {
            out.push_str("   |\n");
            for suggestion in &self.suggestions {
                out.push_str(&format!("   = help: {}\n", suggestion));
            }
        }

        out
    }
}

// ANSI color helpers
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

fn yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}

fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

fn get_source_line(source: &str, line: usize) -> Option<String> {
    if line == 0 {
        return None;
    }
    source.lines().nth(line - 1).map(|s| s.to_string())
}

fn make_underline(col: usize, len: usize) -> String {
    format!("{}{}", " ".repeat(col.saturating_sub(1)), "^".repeat(len.max(1)))
}

// ── Sink ───────────────────────────────────────────────────────────

/// Collects diagnostics from every stage of one compilation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    file_path: Option<String>,
}

impl DiagnosticBag {
    pub fn new(file_path: Option<&str>) -> Self {
        Self { diagnostics: Vec::new(), file_path: file_path.map(str::to_string) }
    }

    /// Add a diagnostic, tagging it with this bag's file path.
    pub fn push(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.file_path.is_none() {
            diagnostic.file_path = self.file_path.clone();
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }

    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    /// Order by source position; stable for diagnostics at the same spot.
    pub fn sort(&mut self) {
        self.diagnostics.sort_by_key(|d| (d.span.line, d.span.column));
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn render_plain(&self, source: &str) -> String {
        self.diagnostics.iter().map(|d| d.render_plain(source)).collect::<Vec<_>>().join("\n")
    }
}

// ── Conversions from stage errors ──────────────────────────────────

pub fn format_lex_error(error: &LexError) -> Diagnostic {
    Diagnostic::new(error_codes::lex_code(error), Severity::Error, error.to_string(), error.span())
}

pub fn format_parse_error(error: &ParseError) -> Diagnostic {
    let d = Diagnostic::new(error_codes::parse_code(error), Severity::Error, error.to_string(), error.span());
    match error {
        ParseError::MismatchedId { fix, .. } => d.with_fixit(fix.clone()),
        ParseError::Unclosed { expected, .. } => d.with_suggestion(format!("add {}", expected)),
        _ => d,
    }
}

pub fn format_bind_error(error: &BindError) -> Diagnostic {
    let mut d = Diagnostic::new(error_codes::bind_code(error), Severity::Error, error.to_string(), error.span());
    if let Some(name) = error.suggestion() {
        d = d.with_suggestion(format!("did you mean '{}'?", name));
    }
    if let BindError::DuplicateDefinition { previous, .. } = error {
        d = d.with_suggestion(format!("first defined at line {}", previous.line));
    }
    d
}

pub fn format_effect_error(error: &EffectError) -> Diagnostic {
    let severity = match error {
        EffectError::Unused { .. } => Severity::Info,
        EffectError::Undeclared { .. }
        | EffectError::UnknownEffects { .. }
        | EffectError::UnknownCode { .. }
        | EffectError::Catalog(_) => Severity::Warning,
    };
    let d = Diagnostic::new(error_codes::effect_code(error), severity, error.to_string(), error.span());
    match error {
        EffectError::Undeclared { code, .. } => d.with_suggestion(format!("add '{}' to the function's §E list", code)),
        EffectError::UnknownEffects { .. } => d.with_suggestion("add the signatures to the effect stub file"),
        _ => d,
    }
}

pub fn format_pattern_error(error: &PatternError) -> Diagnostic {
    let severity = match error {
        PatternError::NonExhaustive { in_expression: true, .. } => Severity::Error,
        _ => Severity::Warning,
    };
    let d = Diagnostic::new(error_codes::pattern_code(error), severity, error.to_string(), error.span());
    match error {
        PatternError::Unreachable { covered_by, .. } => {
            d.with_suggestion(format!("the arm at line {} matches every value", covered_by.line))
        }
        PatternError::Duplicate { first, .. } => d.with_suggestion(format!("first tested at line {}", first.line)),
        PatternError::NonExhaustive { .. } => d,
    }
}

pub fn format_contract_error(error: &ContractError) -> Diagnostic {
    let severity = match error {
        ContractError::Refuted { .. } => Severity::Error,
        ContractError::ContradictoryPreconditions { .. } => Severity::Warning,
        ContractError::Unknown { .. } | ContractError::Untranslatable { .. } => Severity::Info,
    };
    Diagnostic::new(error_codes::contract_code(error), severity, error.to_string(), error.span())
}

pub fn format_api_error(error: &ApiError) -> Diagnostic {
    let severity = match error {
        ApiError::DeclaredBreaking { .. } => Severity::Info,
        ApiError::UndeclaredBreaking { .. } | ApiError::Removed { .. } => Severity::Error,
    };
    let d = Diagnostic::new(error_codes::api_code(error), severity, error.to_string(), error.span());
    match error {
        ApiError::UndeclaredBreaking { .. } => d.with_suggestion("add a §BREAKING marker or revert the change"),
        _ => d,
    }
}
