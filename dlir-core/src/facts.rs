//! Fact storage keyed by predicate symbol
//!
//! A [`FactStore`] maps every predicate symbol to a [`Relation`]: a
//! duplicate-free set of ground tuples with a first-column index used by
//! joins. Stores only grow; evaluation never removes a fact.

use crate::datalog::types::{Atom, PredicateSymbol};
use crate::types::Constant;
use ahash::RandomState;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A ground argument tuple
pub type Tuple = Arc<[Constant]>;

/// The set of ground tuples of one predicate
#[derive(Debug, Clone, Default)]
pub struct Relation {
    /// Tuples in insertion order
    tuples: Vec<Tuple>,
    /// Membership index
    members: HashSet<Tuple, RandomState>,
    /// Positions in `tuples` grouped by first argument
    by_first_arg: HashMap<Constant, Vec<usize>, RandomState>,
}

impl Relation {
    /// Create an empty relation
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tuple; returns false if it was already present
    pub fn insert(&mut self, tuple: Tuple) -> bool {
        if self.members.contains(&tuple) {
            return false;
        }

        if let Some(first) = tuple.first() {
            self.by_first_arg
                .entry(first.clone())
                .or_default()
                .push(self.tuples.len());
        }
        self.members.insert(tuple.clone());
        self.tuples.push(tuple);
        true
    }

    /// Membership test
    pub fn contains(&self, tuple: &[Constant]) -> bool {
        self.members.contains(tuple)
    }

    /// Tuples that may match a pattern whose first argument is `first`
    ///
    /// With `None` every tuple is a candidate.
    pub fn candidates(&self, first: Option<&Constant>) -> impl Iterator<Item = &Tuple> {
        let (scan, indexed) = match first {
            Some(value) => (
                None,
                Some(self.by_first_arg.get(value).map_or(&[][..], Vec::as_slice)),
            ),
            None => (Some(self.tuples.iter()), None),
        };

        scan.into_iter().flatten().chain(
            indexed
                .into_iter()
                .flat_map(move |positions| positions.iter().map(move |&i| &self.tuples[i])),
        )
    }

    /// Iterate over tuples in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter()
    }

    /// Tuples in sorted order
    pub fn sorted(&self) -> Vec<&Tuple> {
        let mut tuples: Vec<&Tuple> = self.tuples.iter().collect();
        tuples.sort();
        tuples
    }

    /// Number of tuples
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    /// Check if relation is empty
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

/// Ground atoms grouped by predicate symbol
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    relations: HashMap<PredicateSymbol, Relation, RandomState>,
    len: usize,
}

impl FactStore {
    /// Create a new fact store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tuple to the relation of `predicate`; returns false if present
    pub fn insert(&mut self, predicate: &PredicateSymbol, tuple: Tuple) -> bool {
        debug_assert_eq!(predicate.arity, tuple.len());

        let added = self
            .relations
            .entry(predicate.clone())
            .or_default()
            .insert(tuple);
        if added {
            self.len += 1;
        }
        added
    }

    /// Add a ground atom; non-ground atoms are ignored and return false
    pub fn add_fact(&mut self, atom: &Atom) -> bool {
        match atom.to_tuple() {
            Some(values) => self.insert(&atom.predicate, Arc::from(values)),
            None => false,
        }
    }

    /// Check whether a tuple of `predicate` is present
    pub fn contains(&self, predicate: &PredicateSymbol, tuple: &[Constant]) -> bool {
        self.relations
            .get(predicate)
            .is_some_and(|relation| relation.contains(tuple))
    }

    /// Check whether a ground atom is present
    pub fn contains_atom(&self, atom: &Atom) -> bool {
        atom.to_tuple()
            .is_some_and(|values| self.contains(&atom.predicate, &values))
    }

    /// Relation of a predicate symbol
    pub fn relation(&self, predicate: &PredicateSymbol) -> Option<&Relation> {
        self.relations.get(predicate)
    }

    /// Relations whose predicate has the given name, for any arity
    pub fn relations_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (&'a PredicateSymbol, &'a Relation)> + 'a {
        self.relations
            .iter()
            .filter(move |(symbol, _)| symbol.name.as_ref() == name)
    }

    /// Copy every tuple of `predicate` from `other`; returns the number added
    pub fn copy_relation(&mut self, other: &FactStore, predicate: &PredicateSymbol) -> usize {
        let Some(source) = other.relation(predicate) else {
            return 0;
        };
        source
            .iter()
            .filter(|tuple| self.insert(predicate, Arc::clone(*tuple)))
            .count()
    }

    /// Add every fact of `other`; returns the number added
    pub fn extend(&mut self, other: &FactStore) -> usize {
        other
            .relations
            .keys()
            .map(|predicate| self.copy_relation(other, predicate))
            .sum()
    }

    /// Predicate symbols with at least one fact, sorted
    pub fn predicates(&self) -> Vec<&PredicateSymbol> {
        let mut predicates: Vec<_> = self
            .relations
            .iter()
            .filter(|(_, relation)| !relation.is_empty())
            .map(|(symbol, _)| symbol)
            .collect();
        predicates.sort();
        predicates
    }

    /// All facts as ground atoms, sorted by predicate then arguments
    pub fn facts(&self) -> Vec<Atom> {
        self.predicates()
            .into_iter()
            .flat_map(|symbol| {
                self.relations[symbol]
                    .sorted()
                    .into_iter()
                    .map(move |tuple| Atom::ground(symbol.clone(), tuple))
            })
            .collect()
    }

    /// Get fact count
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for FactStore {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self.relations.iter().all(|(symbol, relation)| {
                relation.iter().all(|tuple| other.contains(symbol, tuple))
            })
    }
}

impl Eq for FactStore {}

impl fmt::Display for FactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fact in self.facts() {
            writeln!(f, "{}.", fact)?;
        }
        Ok(())
    }
}
