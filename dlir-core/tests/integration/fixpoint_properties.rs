//! Property tests for the fixpoint
//!
//! Random edge sets are evaluated under a fixed rule set that uses
//! recursion, negation and comparisons.

use super::{evaluate, evaluate_with_config};
use dlir_core::{Engine, EngineConfig, EvaluationStrategy};
use proptest::prelude::*;

const RULES: &[&str] = &[
    "tc(X, Y) :- edge(X, Y).",
    "tc(X, Z) :- tc(X, Y), edge(Y, Z).",
    "node(X) :- edge(X, _).",
    "node(Y) :- edge(_, Y).",
    "unreachable(X, Y) :- node(X), node(Y), not tc(X, Y).",
    "cyclic(X) :- tc(X, Y), X = Y.",
    "open(X) :- node(X), not marked(X), X != n0.",
];

fn clauses() -> impl Strategy<Value = Vec<String>> {
    (
        prop::collection::vec((0u8..6, 0u8..6), 0..15),
        prop::collection::vec(0u8..6, 0..3),
    )
        .prop_map(|(edges, marked)| {
            let mut clauses: Vec<String> = edges
                .iter()
                .map(|(a, b)| format!("edge(n{}, n{}).", a, b))
                .collect();
            clauses.extend(marked.iter().map(|m| format!("marked(n{}).", m)));
            clauses.extend(RULES.iter().map(|r| r.to_string()));
            clauses
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn clause_order_does_not_matter(
        (original, shuffled) in clauses().prop_flat_map(|c| (Just(c.clone()), Just(c).prop_shuffle()))
    ) {
        let a = evaluate(&original.join("\n"));
        let b = evaluate(&shuffled.join("\n"));
        prop_assert_eq!(a.facts(), b.facts());
    }

    #[test]
    fn naive_and_semi_naive_agree(clauses in clauses()) {
        let source = clauses.join("\n");
        let naive = EngineConfig {
            strategy: EvaluationStrategy::Naive,
            parallel: false,
            ..EngineConfig::default()
        };

        let a = evaluate(&source);
        let b = evaluate_with_config(&source, naive);
        prop_assert_eq!(a.facts(), b.facts());
    }

    #[test]
    fn fixpoint_is_idempotent(clauses in clauses()) {
        let source = clauses.join("\n");
        let model = evaluate(&source);

        let engine = Engine::from_source(&source, EngineConfig::default()).unwrap();
        let again = engine.evaluate_with(model.facts()).unwrap();
        prop_assert_eq!(again.facts(), model.facts());

        let reparsed = format!("{}\n{}", model.facts(), RULES.join("\n"));
        let from_text = evaluate(&reparsed);
        prop_assert_eq!(from_text.facts(), model.facts());
        prop_assert_eq!(from_text.stats().derived_facts, 0);
    }

    #[test]
    fn negation_never_contradicts_closure(clauses in clauses()) {
        let model = evaluate(&clauses.join("\n"));

        for (_, relation) in model.relation("unreachable") {
            for tuple in relation.iter() {
                let query = format!("tc({}, {})", tuple[0], tuple[1]);
                prop_assert!(!model.query(&query).unwrap().is_true());
            }
        }
    }
}
