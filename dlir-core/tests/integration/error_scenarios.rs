//! Error handling tests
//!
//! Tests that invalid input is rejected before evaluation and that
//! evaluation budgets abort a run:
//! - Syntax errors with positions
//! - Arity mismatches
//! - Unsafe rules
//! - Negative cycles
//! - Budgets and cancellation

use dlir_core::{Budget, Diagnostic, DlirError, Engine, EngineConfig};

fn build(source: &str) -> Result<Engine, DlirError> {
    super::init_tracing();
    Engine::from_source(source, EngineConfig::default())
}

#[test]
fn test_syntax_error_reports_position() {
    let source = "user(alice).\naccess(X) :- user(X)\nuser(bob).";
    let err = build(source).unwrap_err();

    match &err {
        DlirError::SyntaxError { token, span, .. } => {
            assert_eq!(token, "'user'");
            assert_eq!(span.line, 3);
            assert_eq!(span.column, 1);
        }
        other => panic!("expected syntax error, got {:?}", other),
    }

    let rendered = Diagnostic::from_error(&err).format(Some(source));
    assert!(rendered.starts_with("error: Syntax error at 3:1"));
    assert!(rendered.contains("   3 | user(bob)."));
    assert!(rendered.contains("     | ^^^^"));
}

#[test]
fn test_arity_mismatch_names_predicate() {
    let err = build("owner_of(alice, r1).\naccess(X) :- owner_of(X).").unwrap_err();
    assert!(matches!(
        err,
        DlirError::ArityMismatchError { ref predicate, expected: 2, found: 1, .. } if predicate == "owner_of"
    ));
}

#[test]
fn test_unsafe_rule_is_rejected_before_evaluation() {
    let err = build("q(a).\np(X) :- q(Y).").unwrap_err();

    match err {
        DlirError::UnsafeRuleError { variable, clause, .. } => {
            assert_eq!(variable, "X");
            assert_eq!(clause, "p(X) :- q(Y).");
        }
        other => panic!("expected unsafe rule, got {:?}", other),
    }
}

#[test]
fn test_negative_cycle_is_fatal() {
    let err = build("d(a).\np(X) :- d(X), not q(X).\nq(X) :- d(X), not p(X).").unwrap_err();

    match &err {
        DlirError::NonStratifiableError { cycle } => assert_eq!(cycle, &["p", "q"]),
        other => panic!("expected non-stratifiable, got {:?}", other),
    }
    assert!(err.to_string().contains("p, q"));
}

#[test]
fn test_negative_cycle_through_positive_edges() {
    let err = build(
        "d(a).\na(X) :- d(X), b(X).\nb(X) :- d(X), c(X).\nc(X) :- d(X), not a(X).",
    )
    .unwrap_err();

    match err {
        DlirError::NonStratifiableError { cycle } => assert_eq!(cycle, vec!["a", "b", "c"]),
        other => panic!("expected non-stratifiable, got {:?}", other),
    }
}

#[test]
fn test_fact_budget_discards_partial_result() {
    let mut source = String::new();
    for i in 0..30 {
        source.push_str(&format!("edge(n{}, n{}).\n", i, i + 1));
    }
    source.push_str("tc(X, Y) :- edge(X, Y).\ntc(X, Z) :- tc(X, Y), edge(Y, Z).\n");

    let config = EngineConfig {
        max_facts: Some(100),
        ..EngineConfig::default()
    };
    let err = Engine::from_source(&source, config).unwrap().evaluate().unwrap_err();
    assert!(matches!(err, DlirError::BudgetExceeded(Budget::Facts { limit: 100 })));
}

#[test]
fn test_time_budget() {
    let mut source = String::new();
    for i in 0..200 {
        source.push_str(&format!("edge(n{}, n{}).\n", i, (i + 1) % 200));
    }
    source.push_str("tc(X, Y) :- edge(X, Y).\ntc(X, Z) :- tc(X, Y), tc(Y, Z).\n");

    let config = EngineConfig {
        timeout_ms: Some(0),
        parallel: false,
        ..EngineConfig::default()
    };
    let result = Engine::from_source(&source, config).unwrap().evaluate();
    assert!(matches!(
        result,
        Err(DlirError::BudgetExceeded(Budget::Time { limit_ms: 0 }))
    ));
}

#[test]
fn test_cancelled_before_start() {
    let engine = build("p(a).\nq(X) :- p(X).").unwrap();
    let token = engine.cancellation_token();
    token.cancel();

    assert!(token.is_cancelled());
    assert!(matches!(engine.evaluate(), Err(DlirError::Cancelled)));
}

#[test]
fn test_malformed_query_text() {
    let model = build("p(a).").unwrap().evaluate().unwrap();
    assert!(matches!(model.query("p(a"), Err(DlirError::SyntaxError { .. })));
}

#[test]
fn test_config_error() {
    let err = EngineConfig::from_toml_str("strategy = \"magic\"").unwrap_err();
    assert!(matches!(err, DlirError::ConfigError(_)));
}
