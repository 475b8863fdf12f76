//! DLIR Core - Datalog IR and stratified evaluation for ReBAC policies
//!
//! Policies are written as Datalog clauses. This crate parses them into an
//! intermediate representation, stratifies the predicates so that negation
//! is well defined, computes the least fixpoint and answers queries against
//! the result.
//!
//! ```
//! use dlir_core::{Engine, EngineConfig};
//!
//! let engine = Engine::from_source(
//!     "owner_of(alice, r1).\naccess(U, R) :- owner_of(U, R).",
//!     EngineConfig::default(),
//! )?;
//! let model = engine.evaluate()?;
//! assert!(model.query("access(alice, r1)")?.is_true());
//! # Ok::<(), dlir_core::DlirError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod datalog;
pub mod engine;
pub mod error;
pub mod facts;
pub mod parser;
pub mod policy;
pub mod query;
pub mod types;

pub use datalog::{
    Atom, CancellationToken, Clause, Diagnostic, EvaluationStats, Premise, PredicateSymbol,
    Program, Span, Stratification, Substitution, Term, Variable,
};
pub use engine::{Engine, EngineConfig, EvaluationStrategy};
pub use error::{Budget, DlirError, Result};
pub use facts::{FactStore, Relation, Tuple};
pub use parser::{parse_program, parse_query};
pub use policy::RebacPolicy;
pub use query::{holds, Answer, Model};
pub use types::Constant;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
