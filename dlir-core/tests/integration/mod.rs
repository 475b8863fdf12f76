//! Integration test modules for DLIR
//!
//! - ReBAC scenarios
//! - Error scenarios
//! - Fixpoint properties

pub mod error_scenarios;
pub mod fixpoint_properties;
pub mod rebac_scenarios;

use dlir_core::{Engine, EngineConfig, Model};
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test output; only the first call installs it
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dlir_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Evaluate program text with the default configuration
pub fn evaluate(source: &str) -> Model {
    evaluate_with_config(source, EngineConfig::default())
}

/// Evaluate program text with a given configuration
pub fn evaluate_with_config(source: &str, config: EngineConfig) -> Model {
    init_tracing();
    Engine::from_source(source, config)
        .expect("program should be valid")
        .evaluate()
        .expect("evaluation should succeed")
}

/// Answer a query given as text
pub fn ask(model: &Model, query: &str) -> bool {
    model.query(query).expect("query should parse").is_true()
}
