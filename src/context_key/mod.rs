//! Context-key ("when clause") expressions
//!
//! A small boolean language evaluated against the current UI context:
//!
//! ```text
//! "editorTextFocus && !editorReadonly"
//! "resourceExtname =~ /\\.rs$/ || config.editor.mode == vim"
//! "count >= 2 && item in selectedItems"
//! ```
//!
//! # Pipeline
//!
//! ```text
//! &str → scanner::scan → Vec<Token> → Parser → Expr (normalized) → evaluate(&Context)
//! ```
//!
//! Parsed expressions are always in normal form (see [`normalize`]), so two
//! equivalent spellings usually serialize identically.

mod expr;
mod normalize;
mod parser;
pub mod scanner;

use std::collections::HashMap;

use serde_json::{Map, Value};

pub use expr::{Expr, Literal, Operand, RegexLiteral, UnquotableLiteral};
pub use normalize::{
    expressions_equal_with_constant_substitution, implies, ConstantTable, TooComplex, MAX_TERMS,
};
pub use parser::{parse_to_string, ParseError, Parser};
pub use scanner::{LexError, LexingError, Token, TokenKind};

/// Read access to context values during evaluation
pub trait Context {
    fn get_value(&self, key: &str) -> Option<&Value>;
}

impl Context for HashMap<String, Value> {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl Context for Map<String, Value> {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl<C: Context + ?Sized> Context for &C {
    fn get_value(&self, key: &str) -> Option<&Value> {
        (**self).get_value(key)
    }
}
