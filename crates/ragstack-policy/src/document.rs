//! Identity-policy documents.
//!
//! A `PolicyDocument` serializes to the provider's JSON policy language
//! (PascalCase keys, `Version = "2012-10-17"`). Documents are built from
//! typed grants, never from hand-written JSON strings.

use serde::{Deserialize, Serialize};
use tracing::warn;

use ragstack_contracts::error::{ProvisionError, ProvisionResult};

/// The only policy-language version the provider accepts for new documents.
pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Who a trust statement lets assume the role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "Service")]
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    /// Absent on trust policies, required on permission policies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
}

impl Statement {
    /// An `Allow` statement over `actions` on `resources`.
    pub fn allow<A, R>(sid: &str, actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            sid: Some(sid.to_string()),
            effect: Effect::Allow,
            principal: None,
            action: actions.into_iter().map(Into::into).collect(),
            resource: resources.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    /// Serialize to the JSON text the identity service expects.
    pub fn to_json(&self) -> ProvisionResult<String> {
        serde_json::to_string(self).map_err(|e| ProvisionError::ConfigError {
            reason: format!("failed to serialize policy document: {e}"),
        })
    }

    /// Check that a permission policy grants narrowly.
    ///
    /// Rejects documents with no statements, statements without actions or
    /// resources, and `Allow` statements on a bare `*` action or resource.
    pub fn validate_permissions(&self) -> ProvisionResult<()> {
        if self.statement.is_empty() {
            return Err(ProvisionError::ConfigError {
                reason: "policy document has no statements".to_string(),
            });
        }
        for (i, stmt) in self.statement.iter().enumerate() {
            let sid = stmt.sid.clone().unwrap_or_else(|| format!("#{i}"));
            if stmt.action.is_empty() || stmt.resource.is_empty() {
                return Err(ProvisionError::ConfigError {
                    reason: format!("statement '{sid}' must name at least one action and resource"),
                });
            }
            if stmt.effect == Effect::Allow
                && (stmt.action.iter().any(|a| a == "*") || stmt.resource.iter().any(|r| r == "*"))
            {
                warn!(sid = %sid, "rejecting unrestricted allow statement");
                return Err(ProvisionError::ConfigError {
                    reason: format!("statement '{sid}' allows '*'; grants must be scoped"),
                });
            }
        }
        Ok(())
    }
}
