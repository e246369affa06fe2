//! Schema verification report types.
//!
//! Before an action group is registered, its API schema is checked; the
//! outcome is a `VerificationReport`. Only a passing report lets the agent
//! step continue.

use serde::{Deserialize, Serialize};

/// The result of running every check against a document or payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// True only if all checks passed.
    pub passed: bool,
    /// All failures collected during this run. Empty on pass.
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    pub fn from_failures(failures: Vec<VerificationFailure>) -> Self {
        Self {
            passed: failures.is_empty(),
            failures,
        }
    }

    /// One line per failure, joined with `; `.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFailure {
    /// Identifier of the check that failed.
    pub rule_id: String,
    /// Human-readable explanation.
    pub message: String,
}
