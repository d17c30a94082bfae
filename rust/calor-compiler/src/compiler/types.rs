//! Semantic types and the parser for type references written in tag
//! attributes (`§I{i32:a}`, `§O{Result<i32,str>}`).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int { bits: u32, signed: bool },
    Float { bits: u32 },
    Bool,
    Str,
    Char,
    Void,
    Object,
    Null,
    Option(Box<Type>),
    Result(Box<Type>, Box<Type>),
    Array(Box<Type>),
    /// Class, enum, union, interface, or an external type.
    Named(String, Vec<Type>),
    Function(Vec<Type>, Box<Type>),
    /// Not inferable (external calls, untyped lambdas).
    Unknown,
    /// Produced by error recovery; never reported twice.
    Error,
}

impl Type {
    pub const fn int(bits: u32, signed: bool) -> Type {
        Type::Int { bits, signed }
    }

    pub const fn i32() -> Type {
        Type::Int { bits: 32, signed: true }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float { .. })
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// `Unknown` and `Error` are compatible with everything.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Type::Unknown | Type::Error)
    }

    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Type::Int { bits, .. } | Type::Float { bits } => Some(*bits),
            Type::Bool => Some(1),
            _ => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Int { signed: true, .. } | Type::Float { .. })
    }

    /// Loose assignability used by the binder: identical types, anything
    /// against an indeterminate type, integer widening, and `null` into
    /// options and reference types.
    pub fn accepts(&self, other: &Type) -> bool {
        if self == other || self.is_indeterminate() || other.is_indeterminate() {
            return true;
        }
        match (self, other) {
            (Type::Int { bits: a, .. }, Type::Int { bits: b, .. }) => a >= b,
            (Type::Float { .. }, Type::Int { .. }) => true,
            (Type::Float { bits: a }, Type::Float { bits: b }) => a >= b,
            (Type::Option(_) | Type::Str | Type::Object | Type::Named(..) | Type::Array(_), Type::Null) => true,
            (Type::Option(a), Type::Option(b)) => a.accepts(b),
            (Type::Option(inner), other) => inner.accepts(other),
            (Type::Result(a_ok, a_err), Type::Result(b_ok, b_err)) => a_ok.accepts(b_ok) && a_err.accepts(b_err),
            (Type::Array(a), Type::Array(b)) => a.accepts(b),
            (Type::Object, _) => true,
            _ => false,
        }
    }

    /// Name of the type as the target runtime spells it; used to build
    /// effect-catalog signatures.
    pub fn target_name(&self) -> String {
        match self {
            Type::Int { bits: 8, signed: true } => "System.SByte".into(),
            Type::Int { bits: 8, signed: false } => "System.Byte".into(),
            Type::Int { bits: 16, signed: true } => "System.Int16".into(),
            Type::Int { bits: 16, signed: false } => "System.UInt16".into(),
            Type::Int { bits: 32, signed: false } => "System.UInt32".into(),
            Type::Int { bits: 64, signed: true } => "System.Int64".into(),
            Type::Int { bits: 64, signed: false } => "System.UInt64".into(),
            Type::Int { .. } => "System.Int32".into(),
            Type::Float { bits: 32 } => "System.Single".into(),
            Type::Float { .. } => "System.Double".into(),
            Type::Bool => "System.Boolean".into(),
            Type::Str => "System.String".into(),
            Type::Char => "System.Char".into(),
            Type::Void => "System.Void".into(),
            Type::Option(inner) => format!("{}?", inner.target_name()),
            Type::Array(inner) => format!("{}[]", inner.target_name()),
            Type::Named(name, _) => name.clone(),
            _ => "System.Object".into(),
        }
    }

    /// Receiver name used to look up members of this type in the effects
    /// catalog. Sequences are looked up as lists.
    pub fn receiver_name(&self) -> String {
        match self {
            Type::Named(name, _) => name.clone(),
            Type::Array(_) => "List".into(),
            other => other.target_name(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int { bits, signed } => write!(f, "{}{}", if *signed { 'i' } else { 'u' }, bits),
            Type::Float { bits } => write!(f, "f{}", bits),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::Char => write!(f, "char"),
            Type::Void => write!(f, "void"),
            Type::Object => write!(f, "object"),
            Type::Null => write!(f, "null"),
            Type::Option(inner) => write!(f, "?{}", inner),
            Type::Result(ok, err) => write!(f, "Result<{},{}>", ok, err),
            Type::Array(inner) => write!(f, "{}[]", inner),
            Type::Named(name, args) if args.is_empty() => write!(f, "{}", name),
            Type::Named(name, args) => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}<{}>", name, args.join(","))
            }
            Type::Function(params, ret) => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "fn({}) -> {}", params.join(","), ret)
            }
            Type::Unknown => write!(f, "?unknown"),
            Type::Error => write!(f, "<error>"),
        }
    }
}

/// Parse a type reference. Returns `None` for malformed text.
pub fn parse_type(text: &str) -> Option<Type> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(inner) = text.strip_prefix('?') {
        return Some(Type::Option(Box::new(parse_type(inner)?)));
    }
    if let Some(inner) = text.strip_suffix("[]") {
        return Some(Type::Array(Box::new(parse_type(inner)?)));
    }
    if let Some(open) = text.find('<') {
        let inner = text.strip_suffix('>')?.get(open + 1..)?;
        let name = &text[..open];
        let args = split_generic_args(inner)?
            .into_iter()
            .map(parse_type)
            .collect::<Option<Vec<_>>>()?;
        return match (name, args.as_slice()) {
            ("Option", [t]) => Some(Type::Option(Box::new(t.clone()))),
            ("Result", [ok, err]) => Some(Type::Result(Box::new(ok.clone()), Box::new(err.clone()))),
            ("List" | "Array", [t]) => Some(Type::Array(Box::new(t.clone()))),
            ("Option" | "Result" | "List" | "Array", _) => None,
            _ if is_type_name(name) => Some(Type::Named(name.to_string(), args)),
            _ => None,
        };
    }
    let ty = match text {
        "i8" | "sbyte" => Type::int(8, true),
        "i16" | "short" => Type::int(16, true),
        "i32" | "int" => Type::int(32, true),
        "i64" | "long" => Type::int(64, true),
        "u8" | "byte" => Type::int(8, false),
        "u16" | "ushort" => Type::int(16, false),
        "u32" | "uint" => Type::int(32, false),
        "u64" | "ulong" => Type::int(64, false),
        "f32" | "float" => Type::Float { bits: 32 },
        "f64" | "double" => Type::Float { bits: 64 },
        "bool" => Type::Bool,
        "str" | "string" => Type::Str,
        "char" => Type::Char,
        "void" => Type::Void,
        "object" => Type::Object,
        name if is_type_name(name) => Type::Named(name.to_string(), Vec::new()),
        _ => return None,
    };
    Some(ty)
}

fn is_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Split `A,B<C,D>,E` on top-level commas.
fn split_generic_args(inner: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut last = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&inner[last..i]);
                last = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return None;
        }
    }
    parts.push(&inner[last..]);
    if depth != 0 || parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitives_and_aliases() {
        assert_eq!(parse_type("i32"), Some(Type::i32()));
        assert_eq!(parse_type("int"), Some(Type::i32()));
        assert_eq!(parse_type("byte"), Some(Type::int(8, false)));
        assert_eq!(parse_type("string"), Some(Type::Str));
    }

    #[test]
    fn parses_compound_types() {
        assert_eq!(parse_type("?i32"), Some(Type::Option(Box::new(Type::i32()))));
        assert_eq!(
            parse_type("Result<i32,str>"),
            Some(Type::Result(Box::new(Type::i32()), Box::new(Type::Str)))
        );
        assert_eq!(parse_type("u8[]"), Some(Type::Array(Box::new(Type::int(8, false)))));
        assert_eq!(
            parse_type("Map<str,List<i64>>"),
            Some(Type::Named(
                "Map".into(),
                vec![Type::Str, Type::Array(Box::new(Type::int(64, true)))]
            ))
        );
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_type(""), None);
        assert_eq!(parse_type("Result<i32>"), None);
        assert_eq!(parse_type("List<i32"), None);
        assert_eq!(parse_type("9abc"), None);
    }

    #[test]
    fn integer_widening_is_accepted() {
        assert!(Type::int(64, true).accepts(&Type::i32()));
        assert!(!Type::int(8, true).accepts(&Type::i32()));
        assert!(Type::Option(Box::new(Type::Str)).accepts(&Type::Null));
        assert!(!Type::Bool.accepts(&Type::i32()));
    }

    #[test]
    fn target_names() {
        assert_eq!(Type::Str.target_name(), "System.String");
        assert_eq!(Type::i32().target_name(), "System.Int32");
    }
}
