//! Core Datalog data structures
//!
//! This module defines the abstract syntax of the IR:
//! - Terms (variables and constants)
//! - Atoms (predicate symbols applied to terms)
//! - Premises (positive, negated, equality, inequality)
//! - Clauses (facts and rules) and programs
//! - Substitutions (variable bindings)
//!
//! Design principles:
//! - Closed sum types, matched exhaustively at every evaluation site
//! - Arc-based names for cheap cloning and sharing across threads
//! - Parsed programs are immutable

use super::diagnostics::Span;
use crate::types::Constant;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Prefix reserved for anonymous variables; the parser never produces it
/// from user text.
const ANONYMOUS_PREFIX: &str = "_#";

/// A placeholder bound during evaluation, scoped to one clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(Arc<str>);

impl Variable {
    /// Create a named variable
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Variable(name.into())
    }

    /// Create the `index`-th anonymous variable of a clause
    pub fn anonymous(index: usize) -> Self {
        Variable(Arc::from(format!("{}{}", ANONYMOUS_PREFIX, index)))
    }

    /// Variable name
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether this variable stands for a `_` wildcard
    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with(ANONYMOUS_PREFIX)
    }
}

impl Borrow<str> for Variable {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            write!(f, "_")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A relation name together with its arity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredicateSymbol {
    /// Predicate name
    pub name: Arc<str>,
    /// Number of arguments
    pub arity: usize,
}

impl PredicateSymbol {
    /// Create a predicate symbol
    pub fn new(name: impl Into<Arc<str>>, arity: usize) -> Self {
        PredicateSymbol {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for PredicateSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A term in Datalog (constant or variable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// Constant value
    Constant(Constant),
    /// Variable (e.g., X, User)
    Variable(Variable),
}

impl Term {
    /// Create a variable term
    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Term::Variable(Variable::new(name))
    }

    /// Create a constant term
    pub fn constant(text: impl Into<Arc<str>>) -> Self {
        Term::Constant(Constant::new(text))
    }

    /// Check if term is a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Check if term is a constant
    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    /// Get variable if this is a variable
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(var) => Some(var),
            Term::Constant(_) => None,
        }
    }

    /// Get constant value if this is a constant
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Term::Constant(value) => Some(value),
            Term::Variable(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(value) => write!(f, "{}", value),
            Term::Variable(var) => write!(f, "{}", var),
        }
    }
}

/// An atom in Datalog (predicate applied to terms)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom {
    /// Predicate symbol; its arity always equals `terms.len()`
    pub predicate: PredicateSymbol,
    /// Terms (arguments)
    pub terms: Vec<Term>,
}

impl Atom {
    /// Create a new atom; the arity is taken from the number of terms
    pub fn new(predicate: impl Into<Arc<str>>, terms: Vec<Term>) -> Self {
        Atom {
            predicate: PredicateSymbol::new(predicate, terms.len()),
            terms,
        }
    }

    /// Create a nullary atom
    pub fn nullary(predicate: impl Into<Arc<str>>) -> Self {
        Atom::new(predicate, Vec::new())
    }

    /// Create a ground atom from a predicate symbol and constants
    pub fn ground(predicate: PredicateSymbol, values: &[Constant]) -> Self {
        Atom {
            predicate,
            terms: values.iter().cloned().map(Term::Constant).collect(),
        }
    }

    /// Get the arity (number of terms)
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Variables of this atom, in order of appearance (with repetitions)
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.terms.iter().filter_map(Term::as_variable)
    }

    /// Check if atom is ground (no variables)
    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(Term::is_constant)
    }

    /// Constants of a ground atom; `None` if any term is a variable
    pub fn to_tuple(&self) -> Option<Vec<Constant>> {
        self.terms.iter().map(|t| t.as_constant().cloned()).collect()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.predicate.name)?;
        if self.terms.is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", term)?;
        }
        write!(f, ")")
    }
}

/// A condition in a clause body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Premise {
    /// `A`
    Positive(Atom),
    /// `not A`
    Negated(Atom),
    /// `t1 = t2`
    Equality(Term, Term),
    /// `t1 != t2`
    Inequality(Term, Term),
}

impl Premise {
    /// The atom of a positive or negated premise
    pub fn atom(&self) -> Option<&Atom> {
        match self {
            Premise::Positive(atom) | Premise::Negated(atom) => Some(atom),
            Premise::Equality(..) | Premise::Inequality(..) => None,
        }
    }

    /// Variables of the premise, in order of appearance
    pub fn variables(&self) -> Vec<&Variable> {
        match self {
            Premise::Positive(atom) | Premise::Negated(atom) => atom.variables().collect(),
            Premise::Equality(left, right) | Premise::Inequality(left, right) => {
                [left, right].into_iter().filter_map(Term::as_variable).collect()
            }
        }
    }
}

impl fmt::Display for Premise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Premise::Positive(atom) => write!(f, "{}", atom),
            Premise::Negated(atom) => write!(f, "not {}", atom),
            Premise::Equality(left, right) => write!(f, "{} = {}", left, right),
            Premise::Inequality(left, right) => write!(f, "{} != {}", left, right),
        }
    }
}

/// A fact (empty body) or a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Head of the clause
    pub head: Atom,
    /// Body premises in textual order
    pub body: Vec<Premise>,
    /// Location of the clause in its source text
    pub span: Span,
}

impl Clause {
    /// Create a new rule
    pub fn rule(head: Atom, body: Vec<Premise>) -> Self {
        Clause {
            head,
            body,
            span: Span::default(),
        }
    }

    /// Create a fact (clause with empty body)
    pub fn fact(head: Atom) -> Self {
        Clause::rule(head, Vec::new())
    }

    /// Check if this is a fact (empty body)
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// Variables bound by positive premises
    pub fn positive_variables(&self) -> BTreeSet<&Variable> {
        self.body
            .iter()
            .filter_map(|premise| match premise {
                Premise::Positive(atom) => Some(atom.variables()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// First variable that breaks range restriction, if any
    ///
    /// Every variable of the head and of a comparison, and every named
    /// variable of a negated atom, must occur in a positive atom. `_` is
    /// only allowed in body atoms.
    pub fn unbound_variable(&self) -> Option<&Variable> {
        let bound = self.positive_variables();
        let head = self
            .head
            .variables()
            .find(|v| v.is_anonymous() || !bound.contains(v));
        head.or_else(|| {
            self.body.iter().find_map(|premise| match premise {
                Premise::Positive(_) => None,
                Premise::Negated(atom) => atom
                    .variables()
                    .find(|v| !v.is_anonymous() && !bound.contains(v)),
                Premise::Equality(..) | Premise::Inequality(..) => premise
                    .variables()
                    .into_iter()
                    .find(|v| v.is_anonymous() || !bound.contains(v)),
            })
        })
    }

    /// Check if the rule is range restricted
    pub fn is_safe(&self) -> bool {
        self.unbound_variable().is_none()
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            write!(f, " :- ")?;
            for (i, premise) in self.body.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", premise)?;
            }
        }
        write!(f, ".")
    }
}

/// A query clause `A?` embedded in a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// The queried atom
    pub atom: Atom,
    /// Location of the query in its source text
    pub span: Span,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?", self.atom)
    }
}

/// A parsed program: clauses plus embedded queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Facts and rules in textual order
    pub clauses: Vec<Clause>,
    /// Query clauses in textual order
    pub queries: Vec<Query>,
}

impl Program {
    /// Create a program from clauses
    pub fn new(clauses: Vec<Clause>) -> Self {
        Program {
            clauses,
            queries: Vec::new(),
        }
    }

    /// Fact clauses
    pub fn facts(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.is_fact())
    }

    /// Rule clauses
    pub fn rules(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| !c.is_fact())
    }

    /// Every predicate symbol mentioned by a clause or query
    pub fn predicates(&self) -> BTreeSet<&PredicateSymbol> {
        let clause_atoms = self.clauses.iter().flat_map(|clause| {
            std::iter::once(&clause.head).chain(clause.body.iter().filter_map(Premise::atom))
        });
        clause_atoms
            .chain(self.queries.iter().map(|q| &q.atom))
            .map(|atom| &atom.predicate)
            .collect()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for clause in &self.clauses {
            writeln!(f, "{}", clause)?;
        }
        for query in &self.queries {
            writeln!(f, "{}", query)?;
        }
        Ok(())
    }
}

/// Variable substitution (ground bindings)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Substitution {
    bindings: BTreeMap<Variable, Constant>,
}

impl Substitution {
    /// Create an empty substitution
    pub fn new() -> Self {
        Substitution {
            bindings: BTreeMap::new(),
        }
    }

    /// Bind a variable; returns false if it is already bound to another value
    pub fn bind(&mut self, variable: Variable, value: Constant) -> bool {
        match self.bindings.get(&variable) {
            Some(existing) => *existing == value,
            None => {
                self.bindings.insert(variable, value);
                true
            }
        }
    }

    /// Get binding for a variable
    pub fn get(&self, variable: &str) -> Option<&Constant> {
        self.bindings.get(variable)
    }

    /// Check if variable is bound
    pub fn contains(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    /// Apply substitution to a term
    pub fn apply_to_term(&self, term: &Term) -> Term {
        match term {
            Term::Variable(var) => match self.bindings.get(var) {
                Some(value) => Term::Constant(value.clone()),
                None => term.clone(),
            },
            Term::Constant(_) => term.clone(),
        }
    }

    /// Apply substitution to an atom
    pub fn apply(&self, atom: &Atom) -> Atom {
        Atom {
            predicate: atom.predicate.clone(),
            terms: atom.terms.iter().map(|t| self.apply_to_term(t)).collect(),
        }
    }

    /// Iterate over bindings in variable order
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Constant)> {
        self.bindings.iter()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if substitution is empty
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, val)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", var, val)?;
        }
        write!(f, "}}")
    }
}
