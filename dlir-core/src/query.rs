//! Query answering over a saturated fact store

use crate::datalog::evaluation::EvaluationStats;
use crate::datalog::stratification::Stratification;
use crate::datalog::types::{Atom, PredicateSymbol, Program, Query, Substitution, Variable};
use crate::datalog::unification::unify_atom_with_tuple;
use crate::error::Result;
use crate::facts::{FactStore, Relation};
use crate::parser::parse_query;
use crate::types::Constant;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Answer to a query atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    /// Answer for a ground atom
    Holds(bool),
    /// Every substitution of the atom's variables that yields a fact,
    /// without duplicates, sorted by the values of the variables in the
    /// order they first appear in the atom
    Bindings(Vec<Substitution>),
}

impl Answer {
    /// True for a ground atom that holds or a non-empty binding set
    pub fn is_true(&self) -> bool {
        match self {
            Answer::Holds(holds) => *holds,
            Answer::Bindings(bindings) => !bindings.is_empty(),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Holds(holds) => write!(f, "{}", holds),
            Answer::Bindings(bindings) if bindings.is_empty() => write!(f, "no"),
            Answer::Bindings(bindings) => {
                for (i, sub) in bindings.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", sub)?;
                }
                Ok(())
            }
        }
    }
}

/// Answer `atom` against `store`
///
/// Unknown predicates and arities that match no relation give `false` or
/// an empty binding set.
pub fn holds(store: &FactStore, atom: &Atom) -> Answer {
    if let Some(tuple) = atom.to_tuple() {
        return Answer::Holds(store.contains(&atom.predicate, &tuple));
    }

    let mut order: Vec<&Variable> = Vec::new();
    for var in atom.variables().filter(|v| !v.is_anonymous()) {
        if !order.contains(&var) {
            order.push(var);
        }
    }

    let bindings: BTreeMap<Vec<Constant>, Substitution> = store
        .relation(&atom.predicate)
        .into_iter()
        .flat_map(|relation| relation.iter())
        .filter_map(|tuple| unify_atom_with_tuple(atom, tuple))
        .map(|sub| {
            let key = order
                .iter()
                .filter_map(|var| sub.get(var.name()).cloned())
                .collect();
            (key, sub)
        })
        .collect();
    Answer::Bindings(bindings.into_values().collect())
}

/// The result of evaluating a program: an immutable, saturated fact store
#[derive(Debug, Clone)]
pub struct Model {
    facts: FactStore,
    program: Arc<Program>,
    stratification: Arc<Stratification>,
    stats: EvaluationStats,
}

impl Model {
    pub(crate) fn new(
        facts: FactStore,
        program: Arc<Program>,
        stratification: Arc<Stratification>,
        stats: EvaluationStats,
    ) -> Self {
        Model {
            facts,
            program,
            stratification,
            stats,
        }
    }

    /// Answer an atom
    pub fn holds(&self, atom: &Atom) -> Answer {
        holds(&self.facts, atom)
    }

    /// Parse and answer an atom written as text, e.g. `access(alice, X)?`
    pub fn query(&self, text: &str) -> Result<Answer> {
        let atom = parse_query(text)?;
        Ok(self.holds(&atom))
    }

    /// Check whether a ground atom is in the model
    pub fn contains(&self, atom: &Atom) -> bool {
        self.facts.contains_atom(atom)
    }

    /// Answers to the query clauses of the program, in textual order
    pub fn answer_queries(&self) -> Vec<(&Query, Answer)> {
        self.program
            .queries
            .iter()
            .map(|query| (query, self.holds(&query.atom)))
            .collect()
    }

    /// Relations with the given predicate name
    pub fn relation<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (&'a PredicateSymbol, &'a Relation)> + 'a {
        self.facts.relations_named(name)
    }

    /// Read-only view of the fact store
    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    /// Take ownership of the fact store
    pub fn into_facts(self) -> FactStore {
        self.facts
    }

    /// Number of facts
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Check if the model has no facts
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Counters of the evaluation that produced this model
    pub fn stats(&self) -> &EvaluationStats {
        &self.stats
    }

    /// Strata used for the evaluation
    pub fn stratification(&self) -> &Stratification {
        &self.stratification
    }

    /// The evaluated program
    pub fn program(&self) -> &Program {
        &self.program
    }
}
