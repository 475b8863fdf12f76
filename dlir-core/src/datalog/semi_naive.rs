//! Compiled rule plans for semi-naive evaluation
//!
//! A [`RulePlan`] is a rule compiled against the stratum it runs in:
//! variables are numbered, positive atoms become joins in textual order and
//! filter premises are scheduled right after the join that binds their last
//! variable. Applying a plan reads a fact store and returns the head tuples
//! it derives; it never writes, so plans of one pass can run in parallel.

use super::types::{Atom, Clause, Premise, PredicateSymbol, Term, Variable};
use super::unification::{extend_bindings, ground, matches, Bindings, Slot};
use crate::facts::{FactStore, Tuple};
use crate::types::Constant;
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;
use std::sync::Arc;

/// An atom whose terms have been compiled to slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledAtom {
    /// Predicate of the atom
    pub predicate: PredicateSymbol,
    /// One slot per argument
    pub slots: Vec<Slot>,
}

impl CompiledAtom {
    fn first_value<'a>(&'a self, bindings: &'a Bindings) -> Option<&'a Constant> {
        self.slots.first().and_then(|slot| slot.resolve(bindings))
    }
}

/// One step of a rule body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Join with the relation of a positive atom
    Join(CompiledAtom),
    /// Drop bindings whose instantiation of a negated atom is present
    Exclude(CompiledAtom),
    /// Keep bindings where both sides are the same constant
    Equal(Slot, Slot),
    /// Keep bindings where the sides differ
    NotEqual(Slot, Slot),
}

#[derive(Default)]
struct VariableTable<'c> {
    numbers: AHashMap<&'c Variable, usize>,
}

impl<'c> VariableTable<'c> {
    fn slot(&mut self, term: &'c Term) -> Slot {
        match term {
            Term::Constant(value) => Slot::Constant(value.clone()),
            Term::Variable(var) if var.is_anonymous() => Slot::Anonymous,
            Term::Variable(var) => {
                let next = self.numbers.len();
                Slot::Variable(*self.numbers.entry(var).or_insert(next))
            }
        }
    }

    fn atom(&mut self, atom: &'c Atom) -> CompiledAtom {
        CompiledAtom {
            predicate: atom.predicate.clone(),
            slots: atom.terms.iter().map(|t| self.slot(t)).collect(),
        }
    }
}

/// A rule compiled for evaluation
#[derive(Debug, Clone)]
pub struct RulePlan {
    head: CompiledAtom,
    steps: Vec<Step>,
    variables: usize,
    recursive_steps: Vec<usize>,
}

impl RulePlan {
    /// Compile a rule for evaluation
    ///
    /// `derived` holds the head predicates of the rules evaluated together
    /// with this one; joins over them are the delta positions of
    /// semi-naive passes.
    pub fn compile(clause: &Clause, derived: &BTreeSet<&PredicateSymbol>) -> Self {
        let mut table = VariableTable::default();
        let mut steps = Vec::with_capacity(clause.body.len());
        let mut bound: AHashSet<&Variable> = AHashSet::new();
        let mut pending: Vec<&Premise> = Vec::new();

        for premise in &clause.body {
            match premise {
                Premise::Positive(atom) => {
                    steps.push(Step::Join(table.atom(atom)));
                    bound.extend(atom.variables());
                }
                _ => pending.push(premise),
            }

            let (ready, waiting): (Vec<&Premise>, Vec<&Premise>) =
                pending.into_iter().partition(|p| {
                    p.variables()
                        .into_iter()
                        .all(|v| v.is_anonymous() || bound.contains(v))
                });
            steps.extend(ready.into_iter().map(|p| Self::filter(&mut table, p)));
            pending = waiting;
        }
        steps.extend(pending.into_iter().map(|p| Self::filter(&mut table, p)));

        let head = table.atom(&clause.head);
        let recursive_steps = steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| match step {
                Step::Join(atom) if derived.contains(&atom.predicate) => Some(i),
                _ => None,
            })
            .collect();

        RulePlan {
            head,
            steps,
            variables: table.numbers.len(),
            recursive_steps,
        }
    }

    fn filter<'c>(table: &mut VariableTable<'c>, premise: &'c Premise) -> Step {
        match premise {
            Premise::Negated(atom) => Step::Exclude(table.atom(atom)),
            Premise::Equality(left, right) => Step::Equal(table.slot(left), table.slot(right)),
            Premise::Inequality(left, right) => {
                Step::NotEqual(table.slot(left), table.slot(right))
            }
            Premise::Positive(atom) => Step::Join(table.atom(atom)),
        }
    }

    /// Predicate of the rule head
    pub fn head(&self) -> &PredicateSymbol {
        &self.head.predicate
    }

    /// Body steps in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Positions of joins over predicates derived in the rule's own stratum
    pub fn recursive_steps(&self) -> &[usize] {
        &self.recursive_steps
    }

    /// Derive head tuples from `total`
    ///
    /// With `delta = Some((facts, step))` the join at position `step` reads
    /// `facts` instead of `total`, which restricts the result to derivations
    /// that use at least one fact of the previous pass.
    pub fn apply(&self, total: &FactStore, delta: Option<(&FactStore, usize)>) -> Vec<Tuple> {
        let mut frontier: Vec<Bindings> = vec![vec![None; self.variables]];

        for (position, step) in self.steps.iter().enumerate() {
            if frontier.is_empty() {
                break;
            }

            frontier = match step {
                Step::Join(atom) => {
                    let source = match delta {
                        Some((facts, at)) if at == position => facts,
                        _ => total,
                    };
                    let Some(relation) = source.relation(&atom.predicate) else {
                        return Vec::new();
                    };
                    frontier
                        .iter()
                        .flat_map(|bindings| {
                            relation
                                .candidates(atom.first_value(bindings))
                                .filter_map(move |tuple| {
                                    extend_bindings(&atom.slots, tuple, bindings)
                                })
                        })
                        .collect()
                }
                Step::Exclude(atom) => {
                    frontier.retain(|bindings| !Self::excluded(total, atom, bindings));
                    frontier
                }
                Step::Equal(left, right) => {
                    frontier.retain(|bindings| {
                        matches!(
                            (left.resolve(bindings), right.resolve(bindings)),
                            (Some(l), Some(r)) if l == r
                        )
                    });
                    frontier
                }
                Step::NotEqual(left, right) => {
                    frontier.retain(|bindings| {
                        matches!(
                            (left.resolve(bindings), right.resolve(bindings)),
                            (Some(l), Some(r)) if l != r
                        )
                    });
                    frontier
                }
            };
        }

        frontier
            .iter()
            .filter_map(|bindings| ground(&self.head.slots, bindings))
            .map(Arc::from)
            .collect()
    }

    fn excluded(total: &FactStore, atom: &CompiledAtom, bindings: &Bindings) -> bool {
        let Some(relation) = total.relation(&atom.predicate) else {
            return false;
        };
        match ground(&atom.slots, bindings) {
            Some(tuple) => relation.contains(&tuple),
            None => relation
                .candidates(atom.first_value(bindings))
                .any(|tuple| matches(&atom.slots, tuple, bindings)),
        }
    }
}
