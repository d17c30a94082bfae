//! Stable error codes for every diagnostic the front end produces.
//!
//! Code ranges:
//!   E0001–E0009  Lex errors
//!   E0010–E0099  Parse errors
//!   E0100–E0199  Binding errors
//!   E0200–E0299  Contract verification
//!   E0300–E0399  Effects
//!   E0400–E0499  Pattern coverage
//!   E0500–E0599  API strictness
//!   E0900–E0999  Hard compile failures

use crate::compiler::api_compat::ApiError;
use crate::compiler::binder::BindError;
use crate::compiler::effects::EffectError;
use crate::compiler::exhaustiveness::PatternError;
use crate::compiler::lexer::LexError;
use crate::compiler::parser::ParseError;
use crate::compiler::verification::ContractError;
use crate::CompileError;

// ── Lex error codes (E0001–E0009) ──────────────────────────────────

pub fn lex_code(e: &LexError) -> &'static str {
    match e {
        LexError::UnexpectedChar { .. } => "E0001",
        LexError::UnterminatedString { .. } => "E0002",
        LexError::InvalidEscape { .. } => "E0003",
        LexError::MalformedLiteral { .. } => "E0004",
        LexError::UnterminatedAttributes { .. } => "E0005",
    }
}

// ── Parse error codes (E0010–E0099) ────────────────────────────────

pub fn parse_code(e: &ParseError) -> &'static str {
    match e {
        ParseError::Unexpected { .. } => "E0010",
        ParseError::UnexpectedEof { .. } => "E0011",
        ParseError::MismatchedId { .. } => "E0012",
        ParseError::Unclosed { .. } => "E0013",
        ParseError::MissingAttribute { .. } => "E0014",
        ParseError::InvalidType { .. } => "E0015",
        ParseError::InvalidAttribute { .. } => "E0016",
    }
}

// ── Binding error codes (E0100–E0199) ──────────────────────────────

pub fn bind_code(e: &BindError) -> &'static str {
    match e {
        BindError::UndefinedName { .. } => "E0100",
        BindError::DuplicateDefinition { .. } => "E0101",
        BindError::TypeMismatch { .. } => "E0102",
        BindError::ImmutableAssignment { .. } => "E0103",
        BindError::UndefinedFunction { .. } => "E0104",
    }
}

// ── Contract codes (E0200–E0299) ───────────────────────────────────

pub fn contract_code(e: &ContractError) -> &'static str {
    match e {
        ContractError::Refuted { .. } => "E0200",
        ContractError::ContradictoryPreconditions { .. } => "E0201",
        ContractError::Unknown { .. } => "E0202",
        ContractError::Untranslatable { .. } => "E0203",
    }
}

// ── Effect codes (E0300–E0399) ─────────────────────────────────────

pub fn effect_code(e: &EffectError) -> &'static str {
    match e {
        EffectError::Undeclared { .. } => "E0300",
        EffectError::Unused { .. } => "E0301",
        EffectError::UnknownEffects { .. } => "E0302",
        EffectError::UnknownCode { .. } => "E0303",
        EffectError::Catalog(_) => "E0304",
    }
}

// ── Pattern codes (E0400–E0499) ────────────────────────────────────

pub fn pattern_code(e: &PatternError) -> &'static str {
    match e {
        PatternError::NonExhaustive { .. } => "E0400",
        PatternError::Unreachable { .. } => "E0401",
        PatternError::Duplicate { .. } => "E0402",
    }
}

// ── API strictness codes (E0500–E0599) ─────────────────────────────

pub fn api_code(e: &ApiError) -> &'static str {
    match e {
        ApiError::UndeclaredBreaking { .. } => "E0500",
        ApiError::Removed { .. } => "E0501",
        ApiError::DeclaredBreaking { .. } => "E0502",
    }
}

/// Stable code for a hard failure.
pub fn error_code(error: &CompileError) -> &'static str {
    match error {
        CompileError::Internal(_) => "E0900",
        CompileError::Config(_) => "E0901",
        CompileError::Catalog { .. } => "E0902",
    }
}

/// Return a short documentation string for the given error code.
pub fn error_doc(code: &str) -> &'static str {
    match code {
        // Lex
        "E0001" => "A character that cannot start any token was found. Only tags, identifiers, literals and operators are allowed outside strings.",
        "E0002" => "A string literal was opened but never closed before the end of the line.",
        "E0003" => "A backslash escape inside a string is not one of \\n, \\t, \\r, \\0, \\\\, \\\" or \\u{XXXX}.",
        "E0004" => "A numeric or typed literal (INT:, FLOAT:, BOOL:, STR:) could not be decoded or is out of range.",
        "E0005" => "An attribute block '{...}' after a tag was never closed.",

        // Parse
        "E0010" => "The parser found a token it did not expect at this position.",
        "E0011" => "The input ended while a construct was still open.",
        "E0012" => "A closing tag carries a different stable ID than its opening tag. The fix-it renames the closing ID.",
        "E0013" => "A structure was opened but its closing tag was never found.",
        "E0014" => "A tag is missing a required attribute such as its stable ID or name.",
        "E0015" => "A type annotation could not be parsed.",
        "E0016" => "An attribute value is not valid for this tag, for example an unknown visibility.",

        // Binding
        "E0100" => "A name was used that is not declared in any enclosing scope.",
        "E0101" => "A name was declared twice in the same scope. Both declarations are kept; only the first is reachable by name.",
        "E0102" => "An expression's type does not match what its context requires.",
        "E0103" => "A variable declared without '~' was assigned after its initial binding.",
        "E0104" => "An unqualified call names a function that is not declared in the module.",

        // Contracts
        "E0200" => "A postcondition does not hold for some input satisfying the preconditions. The counterexample is attached.",
        "E0201" => "The preconditions can never all be true at once, so the function can never be called.",
        "E0202" => "The solver could not decide a postcondition, or the function body could not be summarised.",
        "E0203" => "A contract uses a construct or type that has no bit-vector translation, so it was not verified.",

        // Effects
        "E0300" => "A function performs an effect that its §E declaration does not list.",
        "E0301" => "A function declares an effect that its body never performs.",
        "E0302" => "A function calls external code with no catalog entry, so its effects are unknown.",
        "E0303" => "An effect declaration uses a code that is not in the effect table.",
        "E0304" => "An entry of the effect stub file could not be loaded. Other entries are still used.",

        // Patterns
        "E0400" => "A match does not cover every possible value of its target. Error in expression position, warning in statement position.",
        "E0401" => "A match arm can never be reached because an earlier unguarded arm matches everything.",
        "E0402" => "Two match arms test the same constant or variant.",

        // API
        "E0500" => "The signature of a public function changed without a §BREAKING marker.",
        "E0501" => "A public function present in the previous version no longer exists.",
        "E0502" => "A breaking change was made and acknowledged with a §BREAKING marker.",

        // Hard failures
        "E0900" => "The compiler hit an internal invariant violation. This is a compiler defect.",
        "E0901" => "The project configuration could not be read or parsed.",
        "E0902" => "The effect stub file could not be read.",

        _ => "Unknown error code.",
    }
}

/// Return all registered error codes with their short description.
pub fn all_error_codes() -> Vec<(&'static str, &'static str)> {
    let codes = [
        "E0001", "E0002", "E0003", "E0004", "E0005", "E0010", "E0011", "E0012", "E0013", "E0014",
        "E0015", "E0016", "E0100", "E0101", "E0102", "E0103", "E0104", "E0200", "E0201", "E0202",
        "E0203", "E0300", "E0301", "E0302", "E0303", "E0304", "E0400", "E0401", "E0402", "E0500",
        "E0501", "E0502", "E0900", "E0901", "E0902",
    ];
    codes.iter().map(|&c| (c, error_doc(c))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::effects::CatalogError;
    use crate::compiler::fixit::closing_id_fix;
    use crate::compiler::tokens::Span;
    use crate::config::ConfigError;

    fn sp() -> Span {
        Span::new(0, 1, 1, 1)
    }

    #[test]
    fn test_lex_codes() {
        assert_eq!(lex_code(&LexError::UnexpectedChar { ch: '@', span: sp() }), "E0001");
        assert_eq!(lex_code(&LexError::UnterminatedString { span: sp() }), "E0002");
        assert_eq!(lex_code(&LexError::InvalidEscape { ch: 'q', span: sp() }), "E0003");
        assert_eq!(lex_code(&LexError::MalformedLiteral { text: "INT:x".into(), span: sp() }), "E0004");
        assert_eq!(lex_code(&LexError::UnterminatedAttributes { span: sp() }), "E0005");
    }

    #[test]
    fn test_parse_codes() {
        let e = ParseError::Unexpected { found: "x".into(), expected: "y".into(), span: sp() };
        assert_eq!(parse_code(&e), "E0010");
        let e = ParseError::MismatchedId {
            tag: "F".into(),
            open_id: "f001".into(),
            close_id: "f002".into(),
            span: sp(),
            fix: closing_id_fix("f001", "f002", sp()),
        };
        assert_eq!(parse_code(&e), "E0012");
        let e = ParseError::InvalidAttribute { tag: "F".into(), what: "visibility".into(), value: "x".into(), span: sp() };
        assert_eq!(parse_code(&e), "E0016");
    }

    #[test]
    fn test_bind_codes() {
        let e = BindError::DuplicateDefinition { name: "a".into(), span: sp(), previous: sp() };
        assert_eq!(bind_code(&e), "E0101");
        let e = BindError::UndefinedFunction { name: "g".into(), span: sp(), suggestion: None };
        assert_eq!(bind_code(&e), "E0104");
    }

    #[test]
    fn test_effect_and_pattern_codes() {
        let e = EffectError::Undeclared { function: "f".into(), code: "cw".into(), span: sp() };
        assert_eq!(effect_code(&e), "E0300");
        let e = EffectError::Catalog(CatalogError::MalformedSignature("nope".into()));
        assert_eq!(effect_code(&e), "E0304");
        let e = PatternError::NonExhaustive { missing: vec!["None".into()], in_expression: true, span: sp() };
        assert_eq!(pattern_code(&e), "E0400");
        let e = PatternError::Unreachable { span: sp(), covered_by: sp() };
        assert_eq!(pattern_code(&e), "E0401");
    }

    #[test]
    fn test_api_codes() {
        let e = ApiError::Removed { id: "f001".into(), name: "Add".into(), span: sp() };
        assert_eq!(api_code(&e), "E0501");
    }

    #[test]
    fn test_compile_error_codes() {
        assert_eq!(error_code(&CompileError::Internal("scope underflow".into())), "E0900");
        assert_eq!(error_code(&CompileError::Config(ConfigError::NotFound("calor.toml".into()))), "E0901");
    }

    #[test]
    fn test_error_doc_unknown_code() {
        assert_eq!(error_doc("E9999"), "Unknown error code.");
    }

    #[test]
    fn test_all_error_codes_documented_and_unique() {
        let codes = all_error_codes();
        for (code, doc) in &codes {
            assert_ne!(*doc, "Unknown error code.", "{} has no documentation", code);
        }
        let mut seen: Vec<&str> = codes.iter().map(|(c, _)| *c).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), codes.len());
    }
}
