//! Normalizing constructors and boolean algebra over [`Expr`]
//!
//! Every compound expression is kept as the disjunction of its prime
//! implicants: `And` children are single tests, `Or` children are tests or
//! `And`s, constants are folded away and children are sorted with
//! [`Expr::compare`]. Two expressions that are true for the same combinations
//! of tests normalize to the same tree.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::convert::Infallible;

use thiserror::Error;

use super::expr::{Expr, Literal, Operand, RegexLiteral};

impl Expr {
    pub fn has(key: impl Into<String>) -> Expr {
        Expr::Has(key.into())
    }

    /// `key == value`; an unquoted `true`/`false` becomes a truthiness test
    pub fn equals(key: impl Into<String>, value: Literal) -> Expr {
        let key = key.into();
        match (value.quoted, value.value.as_str()) {
            (false, "true") => Expr::Has(key),
            (false, "false") => Expr::Not(Box::new(Expr::Has(key))),
            _ => Expr::Equals(key, value),
        }
    }

    /// `key != value`; mirror image of [`Expr::equals`]
    pub fn not_equals(key: impl Into<String>, value: Literal) -> Expr {
        let key = key.into();
        match (value.quoted, value.value.as_str()) {
            (false, "true") => Expr::Not(Box::new(Expr::Has(key))),
            (false, "false") => Expr::Has(key),
            _ => Expr::NotEquals(key, value),
        }
    }

    pub fn greater(key: impl Into<String>, value: Operand) -> Expr {
        Expr::Greater(key.into(), value)
    }

    pub fn greater_equals(key: impl Into<String>, value: Operand) -> Expr {
        Expr::GreaterEquals(key.into(), value)
    }

    pub fn smaller(key: impl Into<String>, value: Operand) -> Expr {
        Expr::Smaller(key.into(), value)
    }

    pub fn smaller_equals(key: impl Into<String>, value: Operand) -> Expr {
        Expr::SmallerEquals(key.into(), value)
    }

    pub fn regex(key: impl Into<String>, regex: RegexLiteral) -> Expr {
        Expr::Regex(key.into(), regex)
    }

    pub fn in_list(key: impl Into<String>, list_key: impl Into<String>) -> Expr {
        Expr::In(key.into(), list_key.into())
    }

    pub fn not_in_list(key: impl Into<String>, list_key: impl Into<String>) -> Expr {
        Expr::NotIn(key.into(), list_key.into())
    }

    /// Logical negation, normalized
    pub fn not(expr: Expr) -> Expr {
        expr.negate()
    }

    /// Normalized conjunction; the empty conjunction is `true`
    pub fn and(items: impl IntoIterator<Item = Expr>) -> Expr {
        unbounded(conjunction(items, &Unbounded))
    }

    /// Normalized disjunction; the empty disjunction is `false`
    pub fn or(items: impl IntoIterator<Item = Expr>) -> Expr {
        unbounded(disjunction(items, &Unbounded))
    }

    /// De Morgan negation with complement operators
    pub fn negate(&self) -> Expr {
        unbounded(negation(self, &Unbounded))
    }

    /// [`Expr::and`] that gives up past [`MAX_TERMS`] terms
    pub fn try_and(items: impl IntoIterator<Item = Expr>) -> Result<Expr, TooComplex> {
        conjunction(items, &Capped(MAX_TERMS))
    }

    /// [`Expr::or`] that gives up past [`MAX_TERMS`] terms
    pub fn try_or(items: impl IntoIterator<Item = Expr>) -> Result<Expr, TooComplex> {
        disjunction(items, &Capped(MAX_TERMS))
    }

    /// [`Expr::negate`] that gives up past [`MAX_TERMS`] terms
    pub fn try_negate(&self) -> Result<Expr, TooComplex> {
        negation(self, &Capped(MAX_TERMS))
    }

    /// Complement of a single test; `None` for compound trees
    fn complement_atom(&self) -> Option<Expr> {
        Some(match self {
            Expr::False => Expr::True,
            Expr::True => Expr::False,
            Expr::Has(_) | Expr::Regex(..) => Expr::Not(Box::new(self.clone())),
            Expr::Equals(key, value) => Expr::NotEquals(key.clone(), value.clone()),
            Expr::NotEquals(key, value) => Expr::Equals(key.clone(), value.clone()),
            Expr::Greater(key, value) => Expr::SmallerEquals(key.clone(), value.clone()),
            Expr::GreaterEquals(key, value) => Expr::Smaller(key.clone(), value.clone()),
            Expr::Smaller(key, value) => Expr::GreaterEquals(key.clone(), value.clone()),
            Expr::SmallerEquals(key, value) => Expr::Greater(key.clone(), value.clone()),
            Expr::In(key, list_key) => Expr::NotIn(key.clone(), list_key.clone()),
            Expr::NotIn(key, list_key) => Expr::In(key.clone(), list_key.clone()),
            Expr::Not(inner) => match **inner {
                Expr::And(_) | Expr::Or(_) | Expr::Not(_) => return None,
                _ => (**inner).clone(),
            },
            Expr::And(_) | Expr::Or(_) => return None,
        })
    }

    /// Replace constant keys by their values and renormalize
    pub fn substitute_constants(&self, constants: &ConstantTable) -> Expr {
        match self {
            Expr::Has(key) => match constants.get(key) {
                Some(value) => Expr::from_bool(value),
                None => self.clone(),
            },
            Expr::Equals(key, literal) => match constants.get(key) {
                Some(value) => Expr::from_bool(literal.value == bool_text(value)),
                None => self.clone(),
            },
            Expr::NotEquals(key, literal) => match constants.get(key) {
                Some(value) => Expr::from_bool(literal.value != bool_text(value)),
                None => self.clone(),
            },
            Expr::Not(inner) => inner.substitute_constants(constants).negate(),
            Expr::And(items) => Expr::and(items.iter().map(|e| e.substitute_constants(constants))),
            Expr::Or(items) => Expr::or(items.iter().map(|e| e.substitute_constants(constants))),
            _ => self.clone(),
        }
    }

    fn from_bool(value: bool) -> Expr {
        if value {
            Expr::True
        } else {
            Expr::False
        }
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

// ============================================================================
// Sum-of-products machinery
// ============================================================================

/// Most product terms a parsed expression may expand to
pub const MAX_TERMS: usize = 256;

/// Returned when normalization would exceed [`MAX_TERMS`] terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expression expands to more than {limit} terms")]
pub struct TooComplex {
    pub limit: usize,
}

/// Bound on the number of terms normalization may hold at once
trait Budget {
    type Error;
    fn check(&self, terms: usize) -> Result<(), Self::Error>;
}

struct Unbounded;

impl Budget for Unbounded {
    type Error = Infallible;

    fn check(&self, _terms: usize) -> Result<(), Infallible> {
        Ok(())
    }
}

struct Capped(usize);

impl Budget for Capped {
    type Error = TooComplex;

    fn check(&self, terms: usize) -> Result<(), TooComplex> {
        if terms > self.0 {
            return Err(TooComplex { limit: self.0 });
        }
        Ok(())
    }
}

fn unbounded(result: Result<Expr, Infallible>) -> Expr {
    match result {
        Ok(expr) => expr,
        Err(never) => match never {},
    }
}

/// Conjunction of tests, sorted with [`Expr::compare`], no duplicates, no `x && !x`
type Term = Vec<Expr>;

fn conjunction<B: Budget>(
    items: impl IntoIterator<Item = Expr>,
    budget: &B,
) -> Result<Expr, B::Error> {
    let mut terms = vec![Term::new()];
    for item in items {
        terms = product(&terms, &sum_of_products(&item, budget)?, budget)?;
    }
    canonical(terms, budget)
}

fn disjunction<B: Budget>(
    items: impl IntoIterator<Item = Expr>,
    budget: &B,
) -> Result<Expr, B::Error> {
    let mut terms = Vec::new();
    for item in items {
        for term in sum_of_products(&item, budget)? {
            insert_term(&mut terms, term);
        }
        budget.check(terms.len())?;
    }
    canonical(terms, budget)
}

fn negation<B: Budget>(expr: &Expr, budget: &B) -> Result<Expr, B::Error> {
    if let Some(atom) = expr.complement_atom() {
        return Ok(atom);
    }
    let terms = sum_of_products(expr, budget)?;
    canonical(complement(&terms, budget)?, budget)
}

/// Absorbed sum of products for any tree, normalized or hand-built
fn sum_of_products<B: Budget>(expr: &Expr, budget: &B) -> Result<Vec<Term>, B::Error> {
    match expr {
        Expr::True => Ok(vec![Term::new()]),
        Expr::False => Ok(Vec::new()),
        Expr::And(items) => {
            let mut terms = vec![Term::new()];
            for item in items {
                terms = product(&terms, &sum_of_products(item, budget)?, budget)?;
            }
            Ok(terms)
        }
        Expr::Or(items) => {
            let mut terms = Vec::new();
            for item in items {
                for term in sum_of_products(item, budget)? {
                    insert_term(&mut terms, term);
                }
                budget.check(terms.len())?;
            }
            Ok(terms)
        }
        Expr::Not(inner) => complement(&sum_of_products(inner, budget)?, budget),
        atom => Ok(vec![vec![atom.clone()]]),
    }
}

/// `!(t1 || t2 || ...)` as `(!a || !b) && (!c || ...) && ...`, multiplied out
fn complement<B: Budget>(terms: &[Term], budget: &B) -> Result<Vec<Term>, B::Error> {
    let mut result = vec![Term::new()];
    for term in terms {
        let clause: Vec<Term> = term
            .iter()
            .filter_map(Expr::complement_atom)
            .map(|atom| vec![atom])
            .collect();
        result = product(&result, &clause, budget)?;
    }
    Ok(result)
}

fn product<B: Budget>(left: &[Term], right: &[Term], budget: &B) -> Result<Vec<Term>, B::Error> {
    let mut terms = Vec::new();
    for a in left {
        for b in right {
            if let Some(term) = merge(a, b) {
                insert_term(&mut terms, term);
                budget.check(terms.len())?;
            }
        }
    }
    Ok(terms)
}

/// `a && b`, or `None` when it contains a test and its complement
fn merge(a: &[Expr], b: &[Expr]) -> Option<Term> {
    let mut term: Term = a.iter().chain(b).cloned().collect();
    term.sort_by(Expr::compare);
    term.dedup_by(|x, y| x.compare(y) == Ordering::Equal);
    let contradictory = term
        .iter()
        .any(|atom| atom.complement_atom().is_some_and(|c| contains(&term, &c)));
    (!contradictory).then_some(term)
}

fn contains(term: &[Expr], atom: &Expr) -> bool {
    term.binary_search_by(|x| x.compare(atom)).is_ok()
}

fn is_subset(small: &[Expr], large: &[Expr]) -> bool {
    small.len() <= large.len() && small.iter().all(|atom| contains(large, atom))
}

/// Add `term` unless an existing term absorbs it; drop the terms it absorbs
fn insert_term(terms: &mut Vec<Term>, term: Term) -> bool {
    if terms.iter().any(|existing| is_subset(existing, &term)) {
        return false;
    }
    terms.retain(|existing| !is_subset(&term, existing));
    terms.push(term);
    true
}

/// Consensus of two terms opposed on exactly one test
fn consensus(a: &[Expr], b: &[Expr]) -> Option<Term> {
    let mut opposed = a
        .iter()
        .filter_map(|atom| atom.complement_atom().map(|c| (atom, c)))
        .filter(|(_, c)| contains(b, c));
    let (atom, negated) = opposed.next()?;
    if opposed.next().is_some() {
        return None;
    }
    let mut term: Term = a
        .iter()
        .filter(|x| *x != atom)
        .chain(b.iter().filter(|x| **x != negated))
        .cloned()
        .collect();
    term.sort_by(Expr::compare);
    term.dedup_by(|x, y| x.compare(y) == Ordering::Equal);
    Some(term)
}

/// Close `terms` under consensus so that exactly the prime implicants remain,
/// then build the sorted `Or` of `And`s.
///
/// The set of prime implicants depends only on which tests make the
/// expression true, so equivalent inputs (and a double negation) produce
/// identical trees.
fn canonical<B: Budget>(mut terms: Vec<Term>, budget: &B) -> Result<Expr, B::Error> {
    'closure: loop {
        for i in 0..terms.len() {
            for j in (i + 1)..terms.len() {
                if let Some(term) = consensus(&terms[i], &terms[j]) {
                    if insert_term(&mut terms, term) {
                        budget.check(terms.len())?;
                        continue 'closure;
                    }
                }
            }
        }
        break;
    }

    let mut items: Vec<Expr> = terms
        .into_iter()
        .map(|mut term| match term.len() {
            0 => Expr::True,
            1 => term.remove(0),
            _ => Expr::And(term),
        })
        .collect();
    if items.contains(&Expr::True) {
        return Ok(Expr::True);
    }
    items.sort_by(Expr::compare);
    Ok(match items.len() {
        0 => Expr::False,
        1 => items.remove(0),
        _ => Expr::Or(items),
    })
}

/// Conservative implication check: `true` only if `p` implies `q` for every context
pub fn implies(p: &Expr, q: &Expr) -> bool {
    if matches!(p, Expr::False) || matches!(q, Expr::True) {
        return true;
    }
    match (p, q) {
        (Expr::Or(ps), _) => ps.iter().all(|x| implies(x, q)),
        (_, Expr::Or(qs)) => qs.iter().any(|y| implies(p, y)),
        (_, Expr::And(qs)) => qs.iter().all(|y| implies(p, y)),
        (Expr::And(ps), _) => ps.iter().any(|x| implies(x, q)),
        _ => p == q,
    }
}

/// Named boolean constants known at resolver construction time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantTable {
    values: HashMap<String, bool>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: bool) {
        self.values.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: bool) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.values.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Compare two optional expressions after constant substitution
pub fn expressions_equal_with_constant_substitution(
    a: Option<&Expr>,
    b: Option<&Expr>,
    constants: &ConstantTable,
) -> bool {
    let a = a.map(|e| e.substitute_constants(constants));
    let b = b.map(|e| e.substitute_constants(constants));
    a == b
}
