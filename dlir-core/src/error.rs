//! Error types for DLIR

use crate::datalog::diagnostics::Span;
use std::fmt;
use thiserror::Error;

/// Main error type for DLIR operations
#[derive(Error, Debug)]
pub enum DlirError {
    /// Malformed clause text
    #[error("Syntax error at {span}: {message}, found {token}")]
    SyntaxError {
        /// What the parser expected
        message: String,
        /// The offending token as it appears in the input
        token: String,
        /// Where the offending token starts
        span: Span,
    },

    /// A predicate symbol used with two different argument counts
    #[error(
        "Arity mismatch at {span}: predicate '{predicate}' was first used with {expected} argument(s), here with {found}"
    )]
    ArityMismatchError {
        /// Predicate name
        predicate: String,
        /// Arity fixed by the first use
        expected: usize,
        /// Arity of the offending use
        found: usize,
        /// Location of the offending atom
        span: Span,
    },

    /// A variable that is not bound by any positive premise
    #[error("Unsafe rule at {span}: variable '{variable}' is not bound by a positive premise in `{clause}`")]
    UnsafeRuleError {
        /// The unbound variable
        variable: String,
        /// The clause, as text
        clause: String,
        /// Location of the variable occurrence
        span: Span,
    },

    /// Negative dependency cycle between predicates
    #[error("Program is not stratifiable: negative dependency cycle through {}", .cycle.join(", "))]
    NonStratifiableError {
        /// Predicates on the cycle, sorted by name
        cycle: Vec<String>,
    },

    /// Evaluation aborted by a configured budget
    #[error("Evaluation aborted: {0}")]
    BudgetExceeded(Budget),

    /// Evaluation aborted through a cancellation token
    #[error("Evaluation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl DlirError {
    /// Source location of the error, if it refers to a piece of input text
    pub fn span(&self) -> Option<Span> {
        match self {
            DlirError::SyntaxError { span, .. }
            | DlirError::ArityMismatchError { span, .. }
            | DlirError::UnsafeRuleError { span, .. } => Some(*span),
            _ => None,
        }
    }
}

/// The resource limit that stopped an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Wall-clock limit
    Time {
        /// Limit in milliseconds
        limit_ms: u64,
    },
    /// Maximum number of facts in the store
    Facts {
        /// Largest allowed store size
        limit: usize,
    },
    /// Maximum number of fixpoint passes over all strata
    Passes {
        /// Largest allowed pass count
        limit: usize,
    },
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Time { limit_ms } => write!(f, "time limit of {}ms exceeded", limit_ms),
            Budget::Facts { limit } => write!(f, "fact limit of {} exceeded", limit),
            Budget::Passes { limit } => write!(f, "pass limit of {} exceeded", limit),
        }
    }
}

/// Result type alias for DLIR operations
pub type Result<T> = std::result::Result<T, DlirError>;
