//! ReBAC policy documents
//!
//! A policy carries its rules in four text fields. All four are parsed as a
//! single program, so a predicate defined in one field can be used in any
//! other.

use crate::datalog::types::Program;
use crate::error::Result;
use crate::parser::parse_program;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A relationship-based access control policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebacPolicy {
    /// Subject facts and rules, e.g. `user(alice).`
    pub datalog_subsets: String,
    /// Object facts and rules, e.g. `resource(r1).`
    pub datalog_objects: String,
    /// Relationship facts and rules, e.g. `owner_of(alice, r1).`
    pub datalog_relationships: String,
    /// Action rules, typically defining `access`
    pub datalog_actions: String,
}

impl RebacPolicy {
    /// Parse a policy from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a policy from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The four fields joined in declaration order
    ///
    /// Error positions reported by [`RebacPolicy::compile`] refer to this
    /// text.
    pub fn source(&self) -> String {
        [
            self.datalog_subsets.as_str(),
            self.datalog_objects.as_str(),
            self.datalog_relationships.as_str(),
            self.datalog_actions.as_str(),
        ]
        .join("\n")
    }

    /// Parse the policy as one program
    pub fn compile(&self) -> Result<Program> {
        let program = parse_program(&self.source())?;
        debug!(clauses = program.clauses.len(), "compiled policy");
        Ok(program)
    }
}
