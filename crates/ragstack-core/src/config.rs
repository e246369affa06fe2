//! Stack configuration: TOML file, environment overlay, and defaults.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file named by
//! `RAGSTACK_CONFIG` (if any), then individual environment variables.
//! Required values that are still missing surface as `ConfigurationMissing`
//! only when a step actually needs them.
//!
//! ```toml
//! region = "us-west-2"
//! name_prefix = "docs"
//!
//! [knowledge_base]
//! embedding_model = "amazon.titan-embed-text-v1"
//!
//! [knowledge_base.chunking]
//! max_tokens = 300
//! overlap_percentage = 10
//!
//! [timing]
//! collection_max_polls = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ragstack_contracts::{
    error::{ProvisionError, ProvisionResult},
    naming::{ResourceNames, RunId},
    resource::{ChunkingPolicy, IndexSchema},
};

use crate::poll::PollPolicy;
use crate::retry::RetryPolicy;

pub const ENV_CONFIG_FILE: &str = "RAGSTACK_CONFIG";
pub const ENV_ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
pub const ENV_REGION: &str = "REGION_NAME";
pub const ENV_REGION_FALLBACK: &str = "AWS_REGION";
pub const ENV_BUCKET: &str = "RAGSTACK_BUCKET";
pub const ENV_RUN_ID: &str = "RAGSTACK_RUN_ID";
pub const ENV_DOCUMENTS_DIR: &str = "RAGSTACK_DOCUMENTS_DIR";
pub const ENV_LEDGER_PATH: &str = "RAGSTACK_LEDGER_PATH";
pub const ENV_GENERATION_MODEL: &str = "RAGSTACK_GENERATION_MODEL";
pub const ENV_KNOWLEDGE_BASE_ID: &str = "KNOWLEDGE_BASE_ID";
pub const ENV_AGENT_ID: &str = "BEDROCK_AGENT_ID";
pub const ENV_AGENT_ALIAS_ID: &str = "BEDROCK_AGENT_ALIAS_ID";

// ── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseSettings {
    pub embedding_model: String,
    pub description: String,
    pub index: IndexSchema,
    pub chunking: ChunkingPolicy,
}

impl Default for KnowledgeBaseSettings {
    fn default() -> Self {
        Self {
            embedding_model: "amazon.titan-embed-text-v1".to_string(),
            description: "Answers questions from the uploaded document set".to_string(),
            index: IndexSchema::default(),
            chunking: ChunkingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub foundation_model: String,
    pub description: String,
    /// Overrides the built-in instruction when set.
    pub instruction: Option<String>,
    pub idle_session_ttl_secs: u32,
    pub alias_name: String,
    pub action_group_name: String,
    pub function_runtime: String,
    pub function_handler: String,
    pub function_timeout_secs: u32,
    /// Handler source file to package. The bundled handler is used when unset.
    pub function_source: Option<PathBuf>,
    /// Function that parses model output for overridden prompt templates.
    pub parser_function_arn: Option<String>,
    /// Model used by knowledge-base-only queries.
    pub generation_model: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            foundation_model: "anthropic.claude-v2".to_string(),
            description: "Answers questions from the knowledge base and resets passwords"
                .to_string(),
            instruction: None,
            idle_session_ttl_secs: 1800,
            alias_name: "latest".to_string(),
            action_group_name: "PasswordResetActionGroup".to_string(),
            function_runtime: "nodejs18.x".to_string(),
            function_handler: "index.handler".to_string(),
            function_timeout_secs: 30,
            function_source: None,
            parser_function_arn: None,
            generation_model: "anthropic.claude-v2".to_string(),
        }
    }
}

/// Poll intervals, attempt caps, retry bounds and settle delays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub collection_poll_secs: u64,
    pub collection_max_polls: u32,
    pub knowledge_base_poll_secs: u64,
    pub knowledge_base_max_polls: u32,
    pub ingestion_poll_secs: u64,
    pub ingestion_max_polls: u32,
    pub agent_poll_secs: u64,
    pub agent_max_polls: u32,
    pub retry_max_attempts: u32,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Wait after creating roles, for identity propagation.
    pub role_settle_secs: u64,
    /// Wait after granting collection access, for the access rules to apply.
    pub access_policy_settle_secs: u64,
    /// Wait after creating the index, before the knowledge base uses it.
    pub index_settle_secs: u64,
    /// Wait between data source creation and ingestion start.
    pub ingestion_start_delay_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            collection_poll_secs: 10,
            collection_max_polls: 90,
            knowledge_base_poll_secs: 10,
            knowledge_base_max_polls: 60,
            ingestion_poll_secs: 30,
            ingestion_max_polls: 120,
            agent_poll_secs: 5,
            agent_max_polls: 60,
            retry_max_attempts: 7,
            retry_min_delay_ms: 1000,
            retry_max_delay_ms: 2000,
            role_settle_secs: 15,
            access_policy_settle_secs: 60,
            index_settle_secs: 60,
            ingestion_start_delay_secs: 30,
        }
    }
}

impl TimingSettings {
    /// No waiting anywhere. Caps are kept so runaway polls still stop.
    pub fn immediate() -> Self {
        Self {
            collection_poll_secs: 0,
            knowledge_base_poll_secs: 0,
            ingestion_poll_secs: 0,
            agent_poll_secs: 0,
            retry_min_delay_ms: 0,
            retry_max_delay_ms: 0,
            role_settle_secs: 0,
            access_policy_settle_secs: 0,
            index_settle_secs: 0,
            ingestion_start_delay_secs: 0,
            ..Self::default()
        }
    }

    pub fn collection_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.collection_poll_secs),
            self.collection_max_polls,
        )
    }

    pub fn knowledge_base_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.knowledge_base_poll_secs),
            self.knowledge_base_max_polls,
        )
    }

    pub fn ingestion_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.ingestion_poll_secs),
            self.ingestion_max_polls,
        )
    }

    pub fn agent_poll(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_secs(self.agent_poll_secs), self.agent_max_polls)
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            min_delay: Duration::from_millis(self.retry_min_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Identifiers of an already-provisioned stack, used by the query path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub knowledge_base_id: Option<String>,
    pub agent_id: Option<String>,
    pub agent_alias_id: Option<String>,
}

// ── StackConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub account_id: Option<String>,
    pub region: String,
    /// Derived from the prefix, run id, region and account when unset.
    pub bucket_name: Option<String>,
    /// Generated once per run when unset.
    pub run_id: Option<String>,
    pub name_prefix: String,
    /// Local directory whose files are uploaded as knowledge-base documents.
    pub documents_dir: PathBuf,
    /// Bucket key prefix for uploaded documents; also the data source's
    /// inclusion prefix.
    pub data_prefix: String,
    /// Where to write the resource ledger after a run, if anywhere.
    pub ledger_path: Option<PathBuf>,
    pub knowledge_base: KnowledgeBaseSettings,
    pub agent: AgentSettings,
    pub timing: TimingSettings,
    pub runtime: RuntimeSettings,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            region: "us-east-1".to_string(),
            bucket_name: None,
            run_id: None,
            name_prefix: "ragstack".to_string(),
            documents_dir: PathBuf::from("data"),
            data_prefix: "data/".to_string(),
            ledger_path: None,
            knowledge_base: KnowledgeBaseSettings::default(),
            agent: AgentSettings::default(),
            timing: TimingSettings::default(),
            runtime: RuntimeSettings::default(),
        }
    }
}

impl StackConfig {
    /// Parse `s` as TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> ProvisionResult<Self> {
        toml::from_str(s).map_err(|e| ProvisionError::ConfigError {
            reason: format!("failed to parse config TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> ProvisionResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ProvisionError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Defaults, then `RAGSTACK_CONFIG`, then the process environment.
    pub fn from_env() -> ProvisionResult<Self> {
        let mut config = match std::env::var(ENV_CONFIG_FILE) {
            Ok(path) if !path.trim().is_empty() => {
                debug!(path = %path, "loading config file");
                Self::from_file(Path::new(&path))?
            }
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Configuration for the simulated provider: a fixed account and no
    /// waiting.
    pub fn simulated() -> Self {
        Self {
            account_id: Some("123456789012".to_string()),
            timing: TimingSettings::immediate(),
            ..Self::default()
        }
    }

    /// Overlay environment values read through `lookup`. Empty values are
    /// ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ACCOUNT_ID) {
            self.account_id = Some(v);
        }
        if let Some(v) = get(ENV_REGION).or_else(|| get(ENV_REGION_FALLBACK)) {
            self.region = v;
        }
        if let Some(v) = get(ENV_BUCKET) {
            self.bucket_name = Some(v);
        }
        if let Some(v) = get(ENV_RUN_ID) {
            self.run_id = Some(v);
        }
        if let Some(v) = get(ENV_DOCUMENTS_DIR) {
            self.documents_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_LEDGER_PATH) {
            self.ledger_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_GENERATION_MODEL) {
            self.agent.generation_model = v;
        }
        if let Some(v) = get(ENV_KNOWLEDGE_BASE_ID) {
            self.runtime.knowledge_base_id = Some(v);
        }
        if let Some(v) = get(ENV_AGENT_ID) {
            self.runtime.agent_id = Some(v);
        }
        if let Some(v) = get(ENV_AGENT_ALIAS_ID) {
            self.runtime.agent_alias_id = Some(v);
        }
    }

    /// Check values that are wrong regardless of which step runs.
    pub fn validate(&self) -> ProvisionResult<()> {
        if self.region.trim().is_empty() {
            return Err(ProvisionError::ConfigError {
                reason: "region must not be empty".to_string(),
            });
        }
        self.knowledge_base.index.validate()?;
        self.knowledge_base.chunking.validate()?;
        if self.timing.retry_min_delay_ms > self.timing.retry_max_delay_ms {
            return Err(ProvisionError::ConfigError {
                reason: format!(
                    "retry_min_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                    self.timing.retry_min_delay_ms, self.timing.retry_max_delay_ms
                ),
            });
        }
        Ok(())
    }

    /// The configured run id, or a freshly generated one.
    pub fn resolve_run_id(&self) -> ProvisionResult<RunId> {
        match &self.run_id {
            Some(id) => RunId::parse(id.as_str()),
            None => Ok(RunId::generate()),
        }
    }

    pub fn resource_names(&self, run_id: &RunId) -> ProvisionResult<ResourceNames> {
        ResourceNames::for_run(&self.name_prefix, run_id)
    }

    /// The configured bucket, or `<prefix>-kb-<run>-<region>-<account>`.
    pub fn bucket_name(&self, run_id: &RunId) -> ProvisionResult<String> {
        if let Some(name) = &self.bucket_name {
            return Ok(name.clone());
        }
        let account = self.require_account_id()?;
        Ok(format!(
            "{}-kb-{}-{}-{}",
            self.name_prefix, run_id, self.region, account
        ))
    }

    pub fn require_account_id(&self) -> ProvisionResult<&str> {
        require(&self.account_id, ENV_ACCOUNT_ID)
    }

    pub fn require_knowledge_base_id(&self) -> ProvisionResult<&str> {
        require(&self.runtime.knowledge_base_id, ENV_KNOWLEDGE_BASE_ID)
    }

    pub fn require_agent_id(&self) -> ProvisionResult<&str> {
        require(&self.runtime.agent_id, ENV_AGENT_ID)
    }

    pub fn require_agent_alias_id(&self) -> ProvisionResult<&str> {
        require(&self.runtime.agent_alias_id, ENV_AGENT_ALIAS_ID)
    }
}

fn require<'a>(value: &'a Option<String>, key: &str) -> ProvisionResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| ProvisionError::ConfigurationMissing {
            key: key.to_string(),
        })
}
