//! Evaluation engine: a program, its stratification and a configuration

use crate::datalog::diagnostics::Span;
use crate::datalog::evaluation::{CancellationToken, Evaluator};
use crate::datalog::stratification::{stratify, Stratification};
use crate::datalog::types::{Premise, Program};
use crate::error::{DlirError, Result};
use crate::facts::FactStore;
use crate::parser::parse_program;
use crate::policy::RebacPolicy;
use crate::query::Model;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fixpoint strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStrategy {
    /// Re-run rules only against facts derived in the previous pass
    #[default]
    SemiNaive,
    /// Re-run every rule against the whole store on every pass
    Naive,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Fixpoint strategy
    pub strategy: EvaluationStrategy,
    /// Run the rule applications of a pass on the rayon pool
    pub parallel: bool,
    /// Wall-clock budget in milliseconds
    pub timeout_ms: Option<u64>,
    /// Maximum number of facts in the store
    pub max_facts: Option<usize>,
    /// Maximum number of fixpoint passes over all strata
    pub max_passes: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            strategy: EvaluationStrategy::SemiNaive,
            parallel: true,
            timeout_ms: None,
            max_facts: None,
            max_passes: None,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DlirError::ConfigError(e.to_string()))
    }

    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Wall-clock budget, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// A stratified program ready for evaluation
///
/// Cloning is cheap; clones share the program and stratification but each
/// evaluation builds its own fact store, so engines can be evaluated from
/// several threads at once.
#[derive(Debug, Clone)]
pub struct Engine {
    program: Arc<Program>,
    stratification: Arc<Stratification>,
    config: Arc<EngineConfig>,
    cancel: CancellationToken,
}

impl Engine {
    /// Create an engine with the default configuration
    pub fn new(program: Program) -> Result<Self> {
        Self::with_config(program, EngineConfig::default())
    }

    /// Create an engine with the given configuration
    ///
    /// Fails if a predicate name is used with two arities, a rule is not
    /// range restricted or the program is not stratifiable.
    pub fn with_config(program: Program, config: EngineConfig) -> Result<Self> {
        check_arities(&program)?;
        for clause in &program.clauses {
            if let Some(variable) = clause.unbound_variable() {
                return Err(DlirError::UnsafeRuleError {
                    variable: variable.to_string(),
                    clause: clause.to_string(),
                    span: clause.span,
                });
            }
        }

        let stratification = stratify(&program)?;
        debug!(
            clauses = program.clauses.len(),
            strata = stratification.len(),
            "engine ready"
        );

        Ok(Engine {
            program: Arc::new(program),
            stratification: Arc::new(stratification),
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        })
    }

    /// Parse program text and build an engine
    pub fn from_source(source: &str, config: EngineConfig) -> Result<Self> {
        Self::with_config(parse_program(source)?, config)
    }

    /// Compile a ReBAC policy and build an engine
    pub fn from_policy(policy: &RebacPolicy, config: EngineConfig) -> Result<Self> {
        Self::with_config(policy.compile()?, config)
    }

    /// Token that aborts evaluations of this engine and its clones
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The program
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The stratification of the program
    pub fn stratification(&self) -> &Stratification {
        &self.stratification
    }

    /// The configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate the program to its least fixpoint
    #[instrument(skip(self), fields(clauses = self.program.clauses.len()))]
    pub fn evaluate(&self) -> Result<Model> {
        self.run(None)
    }

    /// Evaluate with additional base facts
    ///
    /// Facts of predicates the program never mentions are carried into the
    /// model unchanged. A base relation whose name the program uses with a
    /// different arity is an `ArityMismatchError`.
    #[instrument(skip(self, base), fields(clauses = self.program.clauses.len(), base_facts = base.len()))]
    pub fn evaluate_with(&self, base: &FactStore) -> Result<Model> {
        let arities: AHashMap<&str, usize> = self
            .program
            .predicates()
            .into_iter()
            .map(|symbol| (symbol.name.as_ref(), symbol.arity))
            .collect();
        for symbol in base.predicates() {
            match arities.get(symbol.name.as_ref()) {
                Some(&expected) if expected != symbol.arity => {
                    return Err(DlirError::ArityMismatchError {
                        predicate: symbol.name.to_string(),
                        expected,
                        found: symbol.arity,
                        span: Span::default(),
                    });
                }
                _ => {}
            }
        }

        self.run(Some(base))
    }

    fn run(&self, base: Option<&FactStore>) -> Result<Model> {
        let mut evaluator = Evaluator::new(&self.program, &self.stratification, &self.config)
            .with_cancellation(&self.cancel);
        if let Some(base) = base {
            evaluator = evaluator.with_base_facts(base);
        }
        let evaluation = evaluator.evaluate()?;

        Ok(Model::new(
            evaluation.facts,
            Arc::clone(&self.program),
            Arc::clone(&self.stratification),
            evaluation.stats,
        ))
    }
}

/// Every predicate name keeps the arity of its first use, in clause order
/// and then query order
fn check_arities(program: &Program) -> Result<()> {
    let mut arities: AHashMap<&str, usize> = AHashMap::new();
    let clause_atoms = program.clauses.iter().flat_map(|clause| {
        std::iter::once(&clause.head)
            .chain(clause.body.iter().filter_map(Premise::atom))
            .map(move |atom| (atom, clause.span))
    });
    let query_atoms = program.queries.iter().map(|query| (&query.atom, query.span));

    for (atom, span) in clause_atoms.chain(query_atoms) {
        let found = atom.terms.len();
        let expected = *arities.entry(atom.predicate.name.as_ref()).or_insert(found);
        if expected != found || atom.predicate.arity != found {
            return Err(DlirError::ArityMismatchError {
                predicate: atom.predicate.name.to_string(),
                expected,
                found,
                span,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datalog::types::{Atom, Clause, PredicateSymbol, Term, Variable};
    use crate::types::Constant;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.strategy, EvaluationStrategy::SemiNaive);
        assert!(config.parallel);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let config = EngineConfig::from_toml_str(
            "strategy = \"naive\"\nparallel = false\ntimeout_ms = 250\nmax_facts = 1000\n",
        )
        .unwrap();

        assert_eq!(config.strategy, EvaluationStrategy::Naive);
        assert!(!config.parallel);
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_facts, Some(1000));
        assert_eq!(config.max_passes, None);
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let err = EngineConfig::from_toml_str("paralel = true").unwrap_err();
        assert!(matches!(err, DlirError::ConfigError(_)));
    }

    #[test]
    fn test_config_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_passes = 10").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_passes, Some(10));
        assert!(config.parallel);
    }

    #[test]
    fn test_engine_evaluates() {
        let engine = Engine::from_source(
            "user(alice).\nowner_of(alice, r1).\naccess(U, R) :- user(U), owner_of(U, R).",
            EngineConfig::default(),
        )
        .unwrap();
        let model = engine.evaluate().unwrap();

        assert!(model.query("access(alice, r1)").unwrap().is_true());
        assert!(!model.query("access(bob, r1)").unwrap().is_true());
        assert_eq!(model.stratification().len(), 1);
    }

    #[test]
    fn test_engine_rejects_unsafe_program() {
        let clause = Clause::rule(
            Atom::new("p", vec![Term::var("X")]),
            vec![Premise::Positive(Atom::new("q", vec![Term::var("Y")]))],
        );
        let err = Engine::new(Program::new(vec![clause])).unwrap_err();
        assert!(matches!(err, DlirError::UnsafeRuleError { ref variable, .. } if variable == "X"));
    }

    #[test]
    fn test_engine_rejects_wildcard_comparison() {
        let clause = Clause::rule(
            Atom::new("p", vec![Term::var("X")]),
            vec![
                Premise::Positive(Atom::new("q", vec![Term::var("X")])),
                Premise::Inequality(Term::var("X"), Term::Variable(Variable::anonymous(0))),
            ],
        );
        let err = Engine::new(Program::new(vec![clause])).unwrap_err();
        assert!(matches!(err, DlirError::UnsafeRuleError { ref variable, .. } if variable == "_"));
    }

    #[test]
    fn test_engine_rejects_mixed_arities() {
        let program = Program::new(vec![
            Clause::fact(Atom::new("p", vec![Term::constant("a")])),
            Clause::fact(Atom::new("p", vec![Term::constant("a"), Term::constant("b")])),
        ]);

        let err = Engine::new(program).unwrap_err();
        assert!(matches!(
            err,
            DlirError::ArityMismatchError { ref predicate, expected: 1, found: 2, .. } if predicate == "p"
        ));
    }

    #[test]
    fn test_base_facts_must_match_program_arities() {
        let engine = Engine::from_source("p(a).\nq(X) :- p(X).", EngineConfig::default()).unwrap();

        let mut base = FactStore::new();
        base.insert(
            &PredicateSymbol::new("p", 2),
            vec![Constant::new("b"), Constant::new("c")].into(),
        );
        let err = engine.evaluate_with(&base).unwrap_err();
        assert!(matches!(
            err,
            DlirError::ArityMismatchError { expected: 1, found: 2, .. }
        ));

        let mut base = FactStore::new();
        base.insert(&PredicateSymbol::new("p", 1), vec![Constant::new("b")].into());
        let model = engine.evaluate_with(&base).unwrap();
        assert!(model.query("q(b)").unwrap().is_true());
        assert_eq!(model.len(), 4);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let engine = Engine::from_source("p(a).", EngineConfig::default()).unwrap();
        let clone = engine.clone();
        engine.cancellation_token().cancel();

        assert!(matches!(clone.evaluate(), Err(DlirError::Cancelled)));
    }
}
