//! Resource records written to the provisioning ledger.
//!
//! The provider is the only store of truth, and it can only be queried by
//! the identifiers returned at creation time. One `ResourceRecord` per
//! resource touched keeps those identifiers even when a run fails halfway.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Bucket,
    Object,
    Role,
    Policy,
    SecurityPolicy,
    AccessPolicy,
    Collection,
    Index,
    KnowledgeBase,
    DataSource,
    IngestionJob,
    Function,
    FunctionPermission,
    Agent,
    ActionGroup,
    KnowledgeBaseAssociation,
    AgentAlias,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bucket => "bucket",
            Self::Object => "object",
            Self::Role => "role",
            Self::Policy => "policy",
            Self::SecurityPolicy => "security-policy",
            Self::AccessPolicy => "access-policy",
            Self::Collection => "collection",
            Self::Index => "index",
            Self::KnowledgeBase => "knowledge-base",
            Self::DataSource => "data-source",
            Self::IngestionJob => "ingestion-job",
            Self::Function => "function",
            Self::FunctionPermission => "function-permission",
            Self::Agent => "agent",
            Self::ActionGroup => "action-group",
            Self::KnowledgeBaseAssociation => "knowledge-base-association",
            Self::AgentAlias => "agent-alias",
        };
        f.write_str(s)
    }
}

/// Whether this run created the resource or found it already in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Created,
    Reused,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Reused => "reused",
        }
    }
}

/// One resource touched by a provisioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    /// Provider-side name.
    pub name: String,
    /// Id or ARN returned by the provider, as available.
    pub identifier: String,
    pub disposition: Disposition,
    pub timestamp: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(
        kind: ResourceKind,
        name: impl Into<String>,
        identifier: impl Into<String>,
        disposition: Disposition,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            identifier: identifier.into(),
            disposition,
            timestamp: Utc::now(),
        }
    }
}
