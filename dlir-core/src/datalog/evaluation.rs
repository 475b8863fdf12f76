//! Stratified fixpoint evaluation
//!
//! Strata run in order. Within a stratum the first pass applies every rule
//! to the whole store; later passes either re-run every rule (naive) or run
//! each rule once per recursive join restricted to the facts derived in the
//! previous pass (semi-naive). A stratum is saturated when a pass adds
//! nothing. Rule applications of one pass read the same snapshot and may run
//! on the rayon pool.

use super::semi_naive::RulePlan;
use super::stratification::Stratification;
use super::types::{Clause, PredicateSymbol, Program};
use crate::engine::{EngineConfig, EvaluationStrategy};
use crate::error::{Budget, DlirError, Result};
use crate::facts::{FactStore, Tuple};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Shared flag used to abort an evaluation from another thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every evaluation holding this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters collected during one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStats {
    /// Number of strata evaluated
    pub strata: usize,
    /// Fixpoint passes over all strata
    pub passes: usize,
    /// Rule plan applications over all passes
    pub rule_applications: usize,
    /// Facts added by rules
    pub derived_facts: usize,
    /// Facts in the final store
    pub total_facts: usize,
    /// Wall-clock time in microseconds
    pub elapsed_us: u64,
}

/// Saturated store together with its statistics
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// All base and derived facts
    pub facts: FactStore,
    /// Evaluation counters
    pub stats: EvaluationStats,
}

struct BudgetTracker<'a> {
    start: Instant,
    config: &'a EngineConfig,
    cancel: Option<&'a CancellationToken>,
}

impl BudgetTracker<'_> {
    fn check(&self, facts: usize, passes: usize) -> Result<()> {
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            warn!(facts, passes, "evaluation cancelled");
            return Err(DlirError::Cancelled);
        }

        let exceeded = if let Some(limit_ms) = self.config.timeout_ms.filter(|&limit| {
            self.start.elapsed().as_millis() >= u128::from(limit)
        }) {
            Some(Budget::Time { limit_ms })
        } else if let Some(limit) = self.config.max_facts.filter(|&limit| facts > limit) {
            Some(Budget::Facts { limit })
        } else {
            self.config
                .max_passes
                .filter(|&limit| passes >= limit)
                .map(|limit| Budget::Passes { limit })
        };

        match exceeded {
            Some(budget) => {
                warn!(facts, passes, %budget, "evaluation aborted");
                Err(DlirError::BudgetExceeded(budget))
            }
            None => Ok(()),
        }
    }
}

/// Evaluator for one program under one stratification
pub struct Evaluator<'a> {
    program: &'a Program,
    stratification: &'a Stratification,
    config: &'a EngineConfig,
    base: Option<&'a FactStore>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator; `stratification` must be the one of `program`
    pub fn new(
        program: &'a Program,
        stratification: &'a Stratification,
        config: &'a EngineConfig,
    ) -> Self {
        Evaluator {
            program,
            stratification,
            config,
            base: None,
            cancel: None,
        }
    }

    /// Add base facts that are not written in the program
    pub fn with_base_facts(mut self, base: &'a FactStore) -> Self {
        self.base = Some(base);
        self
    }

    /// Abort the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Compute the least fixpoint of the program
    pub fn evaluate(&self) -> Result<Evaluation> {
        let budget = BudgetTracker {
            start: Instant::now(),
            config: self.config,
            cancel: self.cancel,
        };
        let strata = self.stratification.strata();
        let mut stats = EvaluationStats::default();
        let mut total = FactStore::new();

        let mut facts_by_stratum: Vec<Vec<&Clause>> = vec![Vec::new(); strata.len()];
        let mut rules_by_stratum: Vec<Vec<&Clause>> = vec![Vec::new(); strata.len()];
        for clause in &self.program.clauses {
            if let Some(level) = self.stratification.level(&clause.head.predicate) {
                if clause.is_fact() {
                    facts_by_stratum[level].push(clause);
                } else {
                    rules_by_stratum[level].push(clause);
                }
            }
        }

        for (level, stratum) in strata.iter().enumerate() {
            budget.check(total.len(), stats.passes)?;

            for clause in &facts_by_stratum[level] {
                total.add_fact(&clause.head);
            }
            if let Some(base) = self.base {
                for predicate in &stratum.predicates {
                    total.copy_relation(base, predicate);
                }
            }

            let derived: BTreeSet<&PredicateSymbol> = rules_by_stratum[level]
                .iter()
                .map(|clause| &clause.head.predicate)
                .collect();
            let plans: Vec<RulePlan> = rules_by_stratum[level]
                .iter()
                .map(|clause| RulePlan::compile(clause, &derived))
                .collect();
            let passes = self.saturate(&plans, &mut total, &mut stats, &budget)?;

            debug!(
                stratum = level,
                predicates = stratum.predicates.len(),
                rules = plans.len(),
                recursive = stratum.recursive,
                passes,
                facts = total.len(),
                "stratum saturated"
            );
        }

        if let Some(base) = self.base {
            for predicate in base.predicates() {
                if self.stratification.level(predicate).is_none() {
                    total.copy_relation(base, predicate);
                }
            }
        }

        stats.strata = strata.len();
        stats.total_facts = total.len();
        stats.elapsed_us = u64::try_from(budget.start.elapsed().as_micros()).unwrap_or(u64::MAX);

        info!(
            strata = stats.strata,
            passes = stats.passes,
            derived = stats.derived_facts,
            facts = stats.total_facts,
            elapsed_us = stats.elapsed_us,
            "evaluation complete"
        );

        Ok(Evaluation {
            facts: total,
            stats,
        })
    }

    /// Run the plans of one stratum to a fixpoint; returns the pass count
    fn saturate(
        &self,
        plans: &[RulePlan],
        total: &mut FactStore,
        stats: &mut EvaluationStats,
        budget: &BudgetTracker<'_>,
    ) -> Result<usize> {
        let mut delta: Option<FactStore> = None;
        let mut passes = 0;

        loop {
            let jobs: Vec<(usize, Option<usize>)> = match (&delta, self.config.strategy) {
                (Some(_), EvaluationStrategy::SemiNaive) => plans
                    .iter()
                    .enumerate()
                    .flat_map(|(i, plan)| {
                        plan.recursive_steps().iter().map(move |&step| (i, Some(step)))
                    })
                    .collect(),
                _ => (0..plans.len()).map(|i| (i, None)).collect(),
            };
            if jobs.is_empty() {
                break;
            }

            budget.check(total.len(), stats.passes)?;
            passes += 1;
            stats.passes += 1;
            stats.rule_applications += jobs.len();

            let snapshot: &FactStore = total;
            let run = |&(i, step): &(usize, Option<usize>)| -> (usize, Vec<Tuple>) {
                let restricted = step.and_then(|s| delta.as_ref().map(|facts| (facts, s)));
                (i, plans[i].apply(snapshot, restricted))
            };
            let derived: Vec<(usize, Vec<Tuple>)> = if self.config.parallel {
                jobs.par_iter().map(run).collect()
            } else {
                jobs.iter().map(run).collect()
            };

            let mut next = FactStore::new();
            for (i, tuples) in derived {
                let head = plans[i].head();
                for tuple in tuples {
                    if total.insert(head, Arc::clone(&tuple)) {
                        next.insert(head, tuple);
                    }
                }
            }

            trace!(pass = passes, jobs = jobs.len(), new_facts = next.len(), "pass complete");
            stats.derived_facts += next.len();

            if next.is_empty() {
                break;
            }
            delta = Some(next);
        }

        Ok(passes)
    }
}
