//! Run identifiers and deterministic resource naming.
//!
//! Every resource name is a pure function of a name prefix and a run id, so
//! re-running with the same run id targets the same resources and tests can
//! predict every name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, ProvisionResult};

/// Longest run id accepted. Keeps collection-scoped policy names within the
/// provider's 32 character limit.
pub const MAX_RUN_ID_LEN: usize = 12;

/// Longest name prefix accepted, for the same reason.
pub const MAX_PREFIX_LEN: usize = 10;

/// Identifies one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Validate and wrap a caller-supplied run id.
    ///
    /// Must be 1..=12 characters of lowercase ASCII letters, digits or `-`,
    /// not starting or ending with `-`.
    pub fn parse(value: impl Into<String>) -> ProvisionResult<Self> {
        let value = value.into();
        validate_segment("run id", &value, MAX_RUN_ID_LEN)?;
        Ok(Self(value))
    }

    /// Generate a fresh run id from a random UUID.
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self(simple[..8].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which managed service assumes a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RolePurpose {
    /// Assumed by the knowledge-base service to embed and index documents.
    KnowledgeBase,
    /// Assumed by the agent service to invoke models and retrieve.
    Agent,
    /// Assumed by the function-execution service running action handlers.
    ActionFunction,
}

impl RolePurpose {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::KnowledgeBase => "kb",
            Self::Agent => "agent",
            Self::ActionFunction => "action",
        }
    }
}

/// All provider-side names used by one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNames {
    prefix: String,
    run_id: RunId,
}

impl ResourceNames {
    pub fn for_run(prefix: &str, run_id: &RunId) -> ProvisionResult<Self> {
        validate_segment("name prefix", prefix, MAX_PREFIX_LEN)?;
        Ok(Self {
            prefix: prefix.to_string(),
            run_id: run_id.clone(),
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    fn join(&self, part: &str) -> String {
        format!("{}-{}-{}", self.prefix, part, self.run_id)
    }

    pub fn collection(&self) -> String {
        format!("{}-{}", self.prefix, self.run_id)
    }

    pub fn index(&self) -> String {
        self.join("index")
    }

    pub fn encryption_policy(&self) -> String {
        self.join("enc")
    }

    pub fn network_policy(&self) -> String {
        self.join("net")
    }

    pub fn access_policy(&self) -> String {
        self.join("access")
    }

    pub fn knowledge_base(&self) -> String {
        self.join("kb")
    }

    pub fn data_source(&self) -> String {
        self.join("kb-ds")
    }

    pub fn agent(&self) -> String {
        self.join("agent")
    }

    pub fn function(&self) -> String {
        self.join("action-fn")
    }

    pub fn role(&self, purpose: RolePurpose) -> String {
        self.join(&format!("{}-role", purpose.slug()))
    }

    /// Name of the permission policy carrying one grant of one role.
    pub fn policy(&self, purpose: RolePurpose, grant: &str) -> String {
        self.join(&format!("{}-{}", purpose.slug(), grant))
    }
}

fn validate_segment(what: &str, value: &str, max_len: usize) -> ProvisionResult<()> {
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if value.is_empty()
        || value.len() > max_len
        || !valid_chars
        || value.starts_with('-')
        || value.ends_with('-')
    {
        return Err(ProvisionError::ConfigError {
            reason: format!(
                "{what} '{value}' must be 1..={max_len} lowercase letters, digits or inner hyphens"
            ),
        });
    }
    Ok(())
}
