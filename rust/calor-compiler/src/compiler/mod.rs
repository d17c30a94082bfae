//! Front-end stages: lexing, parsing, binding and the analysis passes
//! that run over the bound tree.

pub mod api_compat;
pub mod ast;
pub mod binder;
pub mod effects;
pub mod error_codes;
pub mod exhaustiveness;
pub mod fixit;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod tokens;
pub mod types;
pub mod verification;
