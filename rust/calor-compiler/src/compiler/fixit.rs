//! Fix-it hints: concrete replacement/insertion/deletion edits attached
//! to diagnostics, plus the fuzzy name matching behind "did you mean".

use crate::compiler::tokens::Span;
use serde::Serialize;

// ── Public types ───────────────────────────────────────────────────

/// The kind of source edit a fix-it represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FixitKind {
    /// Replace the text at `span` with `replacement`.
    Replace,
    /// Insert `replacement` *before* the position indicated by `span`.
    Insert,
    /// Delete the text at `span` (replacement is empty).
    Delete,
}

/// A concrete, machine-applicable fix-it hint attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixitHint {
    /// Human-readable explanation, e.g. "Did you mean 'Foo'?"
    pub message: String,
    /// Location in the original source the hint applies to.
    pub span: Span,
    /// The replacement text (empty for `Delete`).
    pub replacement: String,
    /// Whether this is a replace, insert, or delete.
    pub kind: FixitKind,
}

impl FixitHint {
    pub fn replace(message: impl Into<String>, span: Span, replacement: impl Into<String>) -> Self {
        Self { message: message.into(), span, replacement: replacement.into(), kind: FixitKind::Replace }
    }

    pub fn insert(message: impl Into<String>, span: Span, text: impl Into<String>) -> Self {
        Self { message: message.into(), span, replacement: text.into(), kind: FixitKind::Insert }
    }

    pub fn delete(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span, replacement: String::new(), kind: FixitKind::Delete }
    }

    /// Apply this edit to `source`, returning the edited text. Spans that
    /// fall outside the source or off a char boundary leave it unchanged.
    pub fn apply(&self, source: &str) -> String {
        let (start, end) = (self.span.start, self.span.end);
        if end > source.len() || start > end || !source.is_char_boundary(start) || !source.is_char_boundary(end) {
            return source.to_string();
        }
        match self.kind {
            FixitKind::Insert => format!("{}{}{}", &source[..start], self.replacement, &source[start..]),
            FixitKind::Replace | FixitKind::Delete => {
                format!("{}{}{}", &source[..start], self.replacement, &source[end..])
            }
        }
    }
}

// ── Levenshtein distance ───────────────────────────────────────────

/// Classic Levenshtein (edit) distance between two strings.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }
    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];
    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

// ── Name matching ──────────────────────────────────────────────────

/// Find the best fuzzy match for `name` among `candidates` with edit
/// distance ≤ `max_dist`. Ties resolve to the first candidate.
fn best_match<'a>(name: &str, candidates: &'a [String], max_dist: usize) -> Option<&'a str> {
    candidates
        .iter()
        .filter(|c| c.as_str() != name)
        .filter_map(|c| {
            let d = levenshtein(name, c);
            if d > 0 && d <= max_dist {
                Some((d, c.as_str()))
            } else {
                None
            }
        })
        .min_by_key(|(d, _)| *d)
        .map(|(_, s)| s)
}

/// Check for a case-only mismatch (e.g. "foo" vs "Foo") among candidates.
fn case_match<'a>(name: &str, candidates: &'a [String]) -> Option<&'a str> {
    let lower = name.to_lowercase();
    candidates
        .iter()
        .find(|c| c.to_lowercase() == lower && c.as_str() != name)
        .map(|c| c.as_str())
}

/// Suggest a replacement for a misspelled `name`. Case-only mismatches
/// win; otherwise the allowed distance scales with the name length.
pub fn suggest_name(name: &str, candidates: &[String]) -> Option<String> {
    if let Some(c) = case_match(name, candidates) {
        return Some(c.to_string());
    }
    let max_dist = match name.chars().count() {
        0..=2 => 1,
        3..=5 => 2,
        _ => 3,
    };
    best_match(name, candidates, max_dist).map(str::to_string)
}

/// Hint for a closing tag whose ID disagrees with its opening tag.
pub fn closing_id_fix(open_id: &str, close_id: &str, close_id_span: Span) -> FixitHint {
    if close_id.is_empty() {
        FixitHint::insert(format!("add the closing ID '{}'", open_id), close_id_span, open_id)
    } else {
        FixitHint::replace(
            format!("change closing ID '{}' to '{}'", close_id, open_id),
            close_id_span,
            open_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_suggest_name_prefers_case_match() {
        let cands = vec!["Count".to_string(), "cound".to_string()];
        assert_eq!(suggest_name("count", &cands).as_deref(), Some("Count"));
    }

    #[test]
    fn test_suggest_name_distance_bound() {
        let cands = vec!["total".to_string(), "index".to_string()];
        assert_eq!(suggest_name("totl", &cands).as_deref(), Some("total"));
        assert_eq!(suggest_name("zzz", &cands), None);
    }

    #[test]
    fn test_apply_replace_and_insert() {
        let src = "§/F{f002}";
        let at = src.find("f002").unwrap_or(0);
        let fix = closing_id_fix("f001", "f002", Span::new(at, at + 4, 1, 5));
        assert_eq!(fix.kind, FixitKind::Replace);
        assert_eq!(fix.apply(src), "§/F{f001}");

        let ins = FixitHint::insert("add", Span::new(0, 0, 1, 1), "x");
        assert_eq!(ins.apply("yz"), "xyz");
        let del = FixitHint::delete("drop", Span::new(0, 1, 1, 1));
        assert_eq!(del.apply("yz"), "z");
    }
}
