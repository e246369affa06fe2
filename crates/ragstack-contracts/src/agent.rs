//! Agent, action-group and alias types.
//!
//! An agent's behavior is configured, not coded: instruction text, prompt
//! templates and an action group schema are handed to the provider as-is.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Creating,
    Preparing,
    Prepared,
    NotPrepared,
    Deleting,
    Failed,
    Versioning,
    Updating,
}

impl AgentStatus {
    /// True while the provider is still working on the agent.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::Preparing | Self::Versioning | Self::Updating | Self::Deleting
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Preparing => "PREPARING",
            Self::Prepared => "PREPARED",
            Self::NotPrepared => "NOT_PREPARED",
            Self::Deleting => "DELETING",
            Self::Failed => "FAILED",
            Self::Versioning => "VERSIONING",
            Self::Updating => "UPDATING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub status: AgentStatus,
}

/// Short listing entry returned by the provider's agent listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
}

// ── Prompt overrides ─────────────────────────────────────────────────────────

/// Which stage of the agent's turn a template replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromptType {
    PreProcessing,
    Orchestration,
    PostProcessing,
    KnowledgeBaseResponseGeneration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideMode {
    Default,
    Overridden,
}

/// Model sampling settings attached to one prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    pub maximum_length: u32,
    pub stop_sequences: Vec<String>,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            maximum_length: 2048,
            stop_sequences: vec!["Human:".to_string()],
            temperature: 0.0,
            top_k: 1,
            top_p: 1.0,
        }
    }
}

/// One replacement prompt template.
///
/// `base_template` is opaque: placeholders such as `$question$` are resolved
/// by the provider at invocation time, never by ragstack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOverride {
    pub prompt_type: PromptType,
    pub base_template: String,
    pub inference: InferenceSettings,
    pub creation_mode: OverrideMode,
    pub parser_mode: OverrideMode,
    pub enabled: bool,
}

/// The full prompt-override configuration of an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptOverrides {
    /// Function that parses model output when a template's parser mode is
    /// `OVERRIDDEN`.
    pub parser_function_arn: Option<String>,
    pub prompts: Vec<PromptOverride>,
}

impl PromptOverrides {
    pub fn template(&self, prompt_type: PromptType) -> Option<&PromptOverride> {
        self.prompts.iter().find(|p| p.prompt_type == prompt_type)
    }
}

/// Everything the provider needs to create an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub role_arn: String,
    pub foundation_model: String,
    pub instruction: String,
    pub idle_session_ttl_secs: u32,
    pub prompt_overrides: PromptOverrides,
}

// ── Action group ─────────────────────────────────────────────────────────────

/// An OpenAPI document describing the operations of an action group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSchema {
    pub document: Value,
}

impl ApiSchema {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    /// The password-reset API the bundled action handler implements.
    pub fn password_reset() -> Self {
        Self::new(json!({
            "openapi": "3.0.0",
            "info": {
                "title": "Password Reset API",
                "description": "Resets a user's password and issues a temporary one",
                "version": "1.0.0"
            },
            "paths": {
                "/reset": {
                    "post": {
                        "summary": "Reset user password",
                        "description": "Reset the password of the account registered to an email address",
                        "operationId": "reset",
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ResetRequest" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Password reset successfully",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ResetResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "ResetRequest": {
                        "type": "object",
                        "required": ["email"],
                        "properties": { "email": { "type": "string" } }
                    },
                    "ResetResponse": {
                        "type": "object",
                        "required": ["message"],
                        "properties": { "message": { "type": "string" } }
                    },
                    "TempRequest": {
                        "type": "object",
                        "properties": { "email": { "type": "string" } }
                    },
                    "TempResponse": {
                        "type": "object",
                        "properties": { "tempPassword": { "type": "string" } }
                    }
                }
            }
        }))
    }

    /// Serialize the document as the JSON payload the provider expects.
    pub fn payload(&self) -> String {
        self.document.to_string()
    }

    /// Look up a schema under `components.schemas`.
    pub fn component(&self, name: &str) -> Option<&Value> {
        self.document
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.get(name))
    }
}

/// Binds a function-execution resource to an API schema on an agent draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionGroupDefinition {
    pub agent_id: String,
    pub agent_version: String,
    pub name: String,
    pub description: String,
    pub function_arn: String,
    pub api_schema: ApiSchema,
}

/// A stable name pointing at a prepared agent version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAlias {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub agent_id: String,
}

// ── Function resource ────────────────────────────────────────────────────────

/// A function-execution resource to create from a packaged archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRequest {
    pub name: String,
    pub role_arn: String,
    pub runtime: String,
    pub handler: String,
    pub timeout_secs: u32,
    /// Zip archive of the handler code.
    #[serde(skip)]
    pub archive: Vec<u8>,
}

/// A resource-based permission granting a service principal invoke rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokePermission {
    pub function_name: String,
    pub statement_id: String,
    pub principal: String,
    pub source_arn: String,
}
