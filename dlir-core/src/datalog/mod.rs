//! Datalog IR and evaluation
//!
//! - **types**: abstract syntax (variables, predicate symbols, terms, atoms,
//!   premises, clauses, programs, substitutions)
//! - **stratification**: dependency graph, SCCs and strata
//! - **semi_naive**: rules compiled to join plans
//! - **evaluation**: stratified fixpoint computation with budgets
//! - **unification**: matching compiled atoms against stored tuples
//! - **diagnostics**: source spans and error rendering
//!
//! Evaluation is bottom-up: every stratum is saturated before the next one
//! starts, so negation only ever reads relations that are already final.

pub mod diagnostics;
pub mod evaluation;
pub mod semi_naive;
pub mod stratification;
pub mod types;
pub mod unification;

pub use diagnostics::{Diagnostic, Span};
pub use evaluation::{CancellationToken, Evaluation, EvaluationStats, Evaluator};
pub use semi_naive::{RulePlan, Step};
pub use stratification::{stratify, DependencyGraph, Polarity, Stratification, Stratum};
pub use types::{
    Atom, Clause, Premise, PredicateSymbol, Program, Query, Substitution, Term, Variable,
};
pub use unification::unify_atom_with_tuple;
