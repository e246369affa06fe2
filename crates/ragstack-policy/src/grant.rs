//! Least-privilege grants and role trust policies.
//!
//! Each `Grant` becomes one named permission policy attached to a role,
//! except `Managed`, which attaches a provider-managed policy by ARN.

use serde::{Deserialize, Serialize};

use ragstack_contracts::naming::RolePurpose;

use crate::document::{Effect, PolicyDocument, Principal, Statement};

/// Service principal of the knowledge-base and agent service.
pub const AGENT_SERVICE_PRINCIPAL: &str = "bedrock.amazonaws.com";

/// Service principal of the function-execution service.
pub const FUNCTION_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";

/// One permission a role needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Grant {
    /// Invoke the listed foundation models.
    ModelInvoke { model_arns: Vec<String> },
    /// List a bucket and read its objects.
    StorageRead { bucket_arn: String },
    /// Call the data-plane API of one vector collection.
    VectorRetrieve { collection_arn: String },
    /// Query one knowledge base.
    KnowledgeRetrieve { knowledge_base_arn: String },
    /// Read a single object, such as an API schema.
    SchemaRead { object_arn: String },
    /// Attach a provider-managed policy.
    Managed { policy_arn: String },
}

impl Grant {
    /// Short name used in the permission policy's name.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::ModelInvoke { .. } => "model",
            Self::StorageRead { .. } => "s3",
            Self::VectorRetrieve { .. } => "aoss",
            Self::KnowledgeRetrieve { .. } => "retrieve",
            Self::SchemaRead { .. } => "schema",
            Self::Managed { .. } => "managed",
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::ModelInvoke { model_arns } => {
                format!("Invoke {} foundation model(s)", model_arns.len())
            }
            Self::StorageRead { bucket_arn } => format!("Read objects in {bucket_arn}"),
            Self::VectorRetrieve { collection_arn } => format!("Query collection {collection_arn}"),
            Self::KnowledgeRetrieve { knowledge_base_arn } => {
                format!("Retrieve from {knowledge_base_arn}")
            }
            Self::SchemaRead { object_arn } => format!("Read {object_arn}"),
            Self::Managed { policy_arn } => format!("Managed policy {policy_arn}"),
        }
    }

    /// The permission document for this grant. `None` for `Managed`.
    pub fn document(&self) -> Option<PolicyDocument> {
        let statement = match self {
            Self::ModelInvoke { model_arns } => Statement::allow(
                "InvokeFoundationModel",
                ["bedrock:InvokeModel"],
                model_arns.clone(),
            ),
            Self::StorageRead { bucket_arn } => Statement::allow(
                "ReadDocuments",
                ["s3:GetObject", "s3:ListBucket"],
                [bucket_arn.clone(), format!("{bucket_arn}/*")],
            ),
            Self::VectorRetrieve { collection_arn } => Statement::allow(
                "AccessCollection",
                ["aoss:APIAccessAll"],
                [collection_arn.clone()],
            ),
            Self::KnowledgeRetrieve { knowledge_base_arn } => Statement::allow(
                "QueryKnowledgeBase",
                ["bedrock:Retrieve"],
                [knowledge_base_arn.clone()],
            ),
            Self::SchemaRead { object_arn } => {
                Statement::allow("ReadApiSchema", ["s3:GetObject"], [object_arn.clone()])
            }
            Self::Managed { .. } => return None,
        };
        Some(PolicyDocument::new(vec![statement]))
    }

    pub fn managed_arn(&self) -> Option<&str> {
        match self {
            Self::Managed { policy_arn } => Some(policy_arn),
            _ => None,
        }
    }
}

/// The service principal allowed to assume a role of this purpose.
pub fn service_principal(purpose: RolePurpose) -> &'static str {
    match purpose {
        RolePurpose::KnowledgeBase | RolePurpose::Agent => AGENT_SERVICE_PRINCIPAL,
        RolePurpose::ActionFunction => FUNCTION_SERVICE_PRINCIPAL,
    }
}

/// Trust policy letting the purpose's service assume the role.
pub fn trust_policy(purpose: RolePurpose) -> PolicyDocument {
    PolicyDocument::new(vec![Statement {
        sid: None,
        effect: Effect::Allow,
        principal: Some(Principal {
            service: service_principal(purpose).to_string(),
        }),
        action: vec!["sts:AssumeRole".to_string()],
        resource: vec![],
    }])
}
