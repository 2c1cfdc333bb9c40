//! Context-key expression AST
//!
//! Expressions are built through the normalizing constructors in
//! [`super::normalize`] (or by the parser, which uses them), so every `And`/`Or`
//! node is flat, sorted, de-duplicated and has at least two children.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use thiserror::Error;

use super::scanner::is_word_char;
use super::Context;

/// Right-hand side of `==` / `!=`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub value: String,
    /// Written with quotes; forced on when the text cannot be written bare
    pub quoted: bool,
}

/// A literal that no quoting style can write back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value {0:?} contains both ' and \" and cannot be quoted")]
pub struct UnquotableLiteral(pub String);

impl Literal {
    pub fn new(value: impl Into<String>, quoted: bool) -> Result<Self, UnquotableLiteral> {
        let value = value.into();
        if value.contains('\'') && value.contains('"') {
            return Err(UnquotableLiteral(value));
        }
        let quoted = quoted || needs_quotes(&value);
        Ok(Self { value, quoted })
    }

    pub fn bare(value: impl Into<String>) -> Result<Self, UnquotableLiteral> {
        Self::new(value, false)
    }

    pub fn quoted(value: impl Into<String>) -> Result<Self, UnquotableLiteral> {
        Self::new(value, true)
    }

    /// `''`, the value of a comparison with nothing on its right
    pub fn empty() -> Self {
        Self {
            value: String::new(),
            quoted: true,
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then(self.quoted.cmp(&other.quoted))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write_quoted(f, &self.value)
        } else {
            f.write_str(&self.value)
        }
    }
}

/// Right-hand side of an ordering comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    /// Non-numeric operand; `>` and `>=` against it are always false and
    /// `<`, `<=` are their complements
    Text(String),
}

impl Operand {
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Operand::Number(n),
            _ => Operand::Text(value.to_string()),
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Operand::Number(a), Operand::Number(b)) => a.total_cmp(b),
            (Operand::Number(_), Operand::Text(_)) => Ordering::Less,
            (Operand::Text(_), Operand::Number(_)) => Ordering::Greater,
            (Operand::Text(a), Operand::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(n) => write!(f, "{}", n),
            Operand::Text(s) if needs_quotes(s) => write_quoted(f, s),
            Operand::Text(s) => f.write_str(s),
        }
    }
}

/// A compiled `=~` pattern with normalized flags
#[derive(Debug, Clone)]
pub struct RegexLiteral {
    source: String,
    flags: String,
    regex: Regex,
}

impl RegexLiteral {
    /// Compile `source` with JS-style `flags`.
    ///
    /// Flags are case-insensitive and de-duplicated; only `i`, `m` and `s`
    /// affect matching and survive normalization, in that order.
    pub fn new(source: &str, flags: &str) -> Result<Self, regex::Error> {
        let flags = normalize_regex_flags(flags);
        let regex = RegexBuilder::new(&source.replace("\\/", "/"))
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()?;
        Ok(Self {
            source: source.to_string(),
            flags,
            regex,
        })
    }

    /// Parse a `/source/flags` literal as produced by the scanner
    pub fn from_literal(lexeme: &str) -> Option<Result<Self, regex::Error>> {
        let body = lexeme.strip_prefix('/')?;
        let last_slash = body.rfind('/')?;
        Some(Self::new(&body[..last_slash], &body[last_slash + 1..]))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

impl PartialEq for RegexLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for RegexLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

pub(crate) fn normalize_regex_flags(flags: &str) -> String {
    let lower = flags.to_ascii_lowercase();
    ['i', 'm', 's']
        .into_iter()
        .filter(|flag| lower.contains(*flag))
        .collect()
}

/// A context-key expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    False,
    True,
    Has(String),
    Equals(String, Literal),
    NotEquals(String, Literal),
    Greater(String, Operand),
    GreaterEquals(String, Operand),
    Smaller(String, Operand),
    SmallerEquals(String, Operand),
    Regex(String, RegexLiteral),
    /// `key in list_key`
    In(String, String),
    /// `key not in list_key`
    NotIn(String, String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Canonical type rank used to sort `And`/`Or` children
    fn rank(&self) -> u8 {
        match self {
            Expr::False => 0,
            Expr::True => 1,
            Expr::Has(_) => 2,
            Expr::Not(inner) if matches!(**inner, Expr::Has(_)) => 3,
            Expr::Equals(..) => 4,
            Expr::NotEquals(..) => 5,
            Expr::And(_) => 6,
            Expr::Regex(..) => 7,
            Expr::Not(_) => 8,
            Expr::Or(_) => 9,
            Expr::In(..) => 10,
            Expr::NotIn(..) => 11,
            Expr::Greater(..) => 12,
            Expr::GreaterEquals(..) => 13,
            Expr::Smaller(..) => 14,
            Expr::SmallerEquals(..) => 15,
        }
    }

    /// Total order used for stable serialization and de-duplication
    pub fn compare(&self, other: &Expr) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Expr::False, Expr::False) | (Expr::True, Expr::True) => Ordering::Equal,
            (Expr::Has(a), Expr::Has(b)) => a.cmp(b),
            (Expr::Equals(ka, va), Expr::Equals(kb, vb))
            | (Expr::NotEquals(ka, va), Expr::NotEquals(kb, vb)) => {
                ka.cmp(kb).then_with(|| va.cmp(vb))
            }
            (Expr::Greater(ka, va), Expr::Greater(kb, vb))
            | (Expr::GreaterEquals(ka, va), Expr::GreaterEquals(kb, vb))
            | (Expr::Smaller(ka, va), Expr::Smaller(kb, vb))
            | (Expr::SmallerEquals(ka, va), Expr::SmallerEquals(kb, vb)) => {
                ka.cmp(kb).then_with(|| va.cmp(vb))
            }
            (Expr::Regex(ka, ra), Expr::Regex(kb, rb)) => ka
                .cmp(kb)
                .then_with(|| ra.source.cmp(&rb.source))
                .then_with(|| ra.flags.cmp(&rb.flags)),
            (Expr::In(ka, la), Expr::In(kb, lb)) | (Expr::NotIn(ka, la), Expr::NotIn(kb, lb)) => {
                ka.cmp(kb).then_with(|| la.cmp(lb))
            }
            (Expr::Not(a), Expr::Not(b)) => a.compare(b),
            (Expr::And(a), Expr::And(b)) | (Expr::Or(a), Expr::Or(b)) => a
                .len()
                .cmp(&b.len())
                .then_with(|| {
                    a.iter()
                        .zip(b)
                        .map(|(x, y)| x.compare(y))
                        .find(|o| *o != Ordering::Equal)
                        .unwrap_or(Ordering::Equal)
                }),
            _ => Ordering::Equal,
        }
    }

    /// Evaluate against a context; never fails, missing keys are undefined
    pub fn evaluate<C: Context + ?Sized>(&self, context: &C) -> bool {
        match self {
            Expr::False => false,
            Expr::True => true,
            Expr::Has(key) => is_truthy(context.get_value(key)),
            Expr::Equals(key, literal) => loose_eq(context.get_value(key), &literal.value),
            Expr::NotEquals(key, literal) => !loose_eq(context.get_value(key), &literal.value),
            Expr::Greater(key, operand) => {
                compare_number(context.get_value(key), operand, |a, b| a > b)
            }
            Expr::GreaterEquals(key, operand) => {
                compare_number(context.get_value(key), operand, |a, b| a >= b)
            }
            Expr::Smaller(key, operand) => {
                !compare_number(context.get_value(key), operand, |a, b| a >= b)
            }
            Expr::SmallerEquals(key, operand) => {
                !compare_number(context.get_value(key), operand, |a, b| a > b)
            }
            Expr::Regex(key, regex) => match context.get_value(key).and_then(value_as_text) {
                Some(text) => regex.is_match(&text),
                None => false,
            },
            Expr::In(key, list_key) => {
                is_in(context.get_value(key), context.get_value(list_key))
            }
            Expr::NotIn(key, list_key) => {
                !is_in(context.get_value(key), context.get_value(list_key))
            }
            Expr::Not(inner) => !inner.evaluate(context),
            Expr::And(items) => items.iter().all(|e| e.evaluate(context)),
            Expr::Or(items) => items.iter().any(|e| e.evaluate(context)),
        }
    }

    /// Canonical text form; parsing it yields an equal expression
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// All context keys this expression reads
    pub fn keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, keys: &mut BTreeSet<String>) {
        match self {
            Expr::False | Expr::True => {}
            Expr::Has(key)
            | Expr::Equals(key, _)
            | Expr::NotEquals(key, _)
            | Expr::Greater(key, _)
            | Expr::GreaterEquals(key, _)
            | Expr::Smaller(key, _)
            | Expr::SmallerEquals(key, _)
            | Expr::Regex(key, _) => {
                keys.insert(key.clone());
            }
            Expr::In(key, list_key) | Expr::NotIn(key, list_key) => {
                keys.insert(key.clone());
                keys.insert(list_key.clone());
            }
            Expr::Not(inner) => inner.collect_keys(keys),
            Expr::And(items) | Expr::Or(items) => {
                for item in items {
                    item.collect_keys(keys);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::False => f.write_str("false"),
            Expr::True => f.write_str("true"),
            Expr::Has(key) => f.write_str(key),
            Expr::Equals(key, literal) => write!(f, "{} == {}", key, literal),
            Expr::NotEquals(key, literal) => write!(f, "{} != {}", key, literal),
            Expr::Greater(key, operand) => write!(f, "{} > {}", key, operand),
            Expr::GreaterEquals(key, operand) => write!(f, "{} >= {}", key, operand),
            Expr::Smaller(key, operand) => write!(f, "{} < {}", key, operand),
            Expr::SmallerEquals(key, operand) => write!(f, "{} <= {}", key, operand),
            Expr::Regex(key, regex) => write!(f, "{} =~ {}", key, regex),
            Expr::In(key, list_key) => {
                write!(f, "{} in ", key)?;
                write_word(f, list_key)
            }
            Expr::NotIn(key, list_key) => {
                write!(f, "{} not in ", key)?;
                write_word(f, list_key)
            }
            Expr::Not(inner) => match **inner {
                Expr::Has(ref key) => write!(f, "!{}", key),
                ref other => write!(f, "!({})", other),
            },
            Expr::And(items) => write_joined(f, items, " && "),
            Expr::Or(items) => write_joined(f, items, " || "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Expr], separator: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        // Or inside And only exists in hand-built trees
        if separator == " && " && matches!(item, Expr::Or(_)) {
            write!(f, "({})", item)?;
        } else {
            write!(f, "{}", item)?;
        }
    }
    Ok(())
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    if needs_quotes(word) {
        write_quoted(f, word)
    } else {
        f.write_str(word)
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let quote = if value.contains('\'') { '"' } else { '\'' };
    write!(f, "{quote}{value}{quote}")
}

/// Whether `value` must be quoted to scan back as a single bare word
pub(crate) fn needs_quotes(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        None => true,
        Some(first) if first == '/' || first == '<' || first == '>' || !is_word_char(first) => true,
        Some(_) => {
            !value.chars().all(is_word_char)
                || matches!(value, "true" | "false" | "in" | "not")
        }
    }
}

// ============================================================================
// Value semantics
// ============================================================================

/// JS-style truthiness: absent, null, false, 0, NaN and "" are falsy
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Loose equality between a context value and a literal's text
pub(crate) fn loose_eq(value: Option<&Value>, literal: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == literal,
        Some(Value::Number(n)) => match (n.as_f64(), literal.trim().parse::<f64>()) {
            (Some(a), Ok(b)) => a == b,
            _ => false,
        },
        Some(Value::Bool(b)) => literal == if *b { "true" } else { "false" },
        None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}

fn value_as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn compare_number(value: Option<&Value>, operand: &Operand, op: impl Fn(f64, f64) -> bool) -> bool {
    match (value_as_number(value), operand) {
        (Some(a), Operand::Number(b)) => op(a, *b),
        _ => false,
    }
}

fn is_in(item: Option<&Value>, source: Option<&Value>) -> bool {
    match (item, source) {
        (Some(item), Some(Value::Array(list))) => list.iter().any(|v| v == item),
        (Some(Value::String(item)), Some(Value::Object(map))) => map.contains_key(item),
        _ => false,
    }
}
