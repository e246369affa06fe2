//! Provider ports and the trusted sinks of the provisioning pipeline.
//!
//! Every managed service the pipeline touches is reached through one of
//! these traits:
//!
//! - `ObjectStore`: buckets and objects
//! - `IdentityService`: execution roles and permission policies
//! - `VectorStore`: collections, their security policies, indexes
//! - `KnowledgeBaseService`: knowledge bases, data sources, ingestion jobs
//! - `FunctionService`: action-handler functions
//! - `AgentService`: agents, action groups, aliases
//! - `AgentRuntime`: the query path
//!
//! plus the local collaborators the provisioner drives:
//!
//! - `ResourceLedger`: records every resource a run touches
//! - `SchemaVerifier`: checks an action group's API schema before upload
//! - `Sleeper`: the only way the pipeline waits
//!
//! Implementations translate provider errors with
//! [`ProviderFault::classify`](ragstack_contracts::error::ProviderFault::classify)
//! so the provisioner can tell "already exists" from "try again" from "abort".

use std::time::Duration;

use serde_json::Value;

use ragstack_contracts::{
    agent::{
        ActionGroupDefinition, AgentAlias, AgentDefinition, AgentRecord, AgentStatus,
        AgentSummary, ApiSchema, FunctionRequest, InvokePermission,
    },
    error::ProvisionResult,
    invocation::{GroundedAnswer, InvocationEvent, InvocationRequest},
    record::ResourceRecord,
    resource::{
        DataSource, DataSourceRequest, ExecutionRole, IngestionJob, KnowledgeBase,
        KnowledgeBaseRequest, SecurityPolicyKind, VectorCollection,
    },
    verify::VerificationReport,
};

/// Streamed response of one agent invocation.
///
/// An `Err` item aborts the invocation; no partial reply is returned.
pub type EventStream = Box<dyn Iterator<Item = ProvisionResult<InvocationEvent>> + Send>;

pub trait ObjectStore: Send + Sync {
    fn bucket_exists(&self, bucket: &str) -> ProvisionResult<bool>;

    /// Create `bucket` in `region`. Returns `AlreadyExists` if it is taken.
    fn create_bucket(&self, bucket: &str, region: &str) -> ProvisionResult<()>;

    /// Write `body` to `key`, replacing any existing object.
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> ProvisionResult<()>;
}

pub trait IdentityService: Send + Sync {
    /// Create a role trusted by the principal in `trust_policy` (JSON text).
    fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> ProvisionResult<ExecutionRole>;

    /// Fetch an existing role by name. `NotFound` if absent.
    fn get_role(&self, name: &str) -> ProvisionResult<ExecutionRole>;

    /// Create a customer-managed policy and return its ARN.
    fn create_policy(&self, name: &str, document: &str, description: &str)
        -> ProvisionResult<String>;

    /// ARN of the customer-managed policy called `name`, if any.
    fn find_policy(&self, name: &str) -> ProvisionResult<Option<String>>;

    /// Attach a policy to a role. Attaching twice is not an error.
    fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> ProvisionResult<()>;
}

pub trait VectorStore: Send + Sync {
    fn create_security_policy(
        &self,
        kind: SecurityPolicyKind,
        name: &str,
        policy: &str,
    ) -> ProvisionResult<()>;

    fn create_access_policy(&self, name: &str, policy: &str) -> ProvisionResult<()>;

    fn find_collection(&self, name: &str) -> ProvisionResult<Option<VectorCollection>>;

    /// Start creating a vector-search collection. The returned snapshot is
    /// normally `CREATING`.
    fn create_collection(&self, name: &str) -> ProvisionResult<VectorCollection>;

    fn get_collection(&self, id: &str) -> ProvisionResult<VectorCollection>;

    /// Create `index` on the collection reachable at `host` with the given
    /// settings and mappings body.
    fn create_index(&self, host: &str, index: &str, body: &Value) -> ProvisionResult<()>;
}

pub trait KnowledgeBaseService: Send + Sync {
    fn find_knowledge_base(&self, name: &str) -> ProvisionResult<Option<KnowledgeBase>>;

    fn create_knowledge_base(&self, request: &KnowledgeBaseRequest)
        -> ProvisionResult<KnowledgeBase>;

    /// Fetch a knowledge base by id. `NotFound` if absent.
    fn get_knowledge_base(&self, id: &str) -> ProvisionResult<KnowledgeBase>;

    fn find_data_source(
        &self,
        knowledge_base_id: &str,
        name: &str,
    ) -> ProvisionResult<Option<DataSource>>;

    fn create_data_source(&self, request: &DataSourceRequest) -> ProvisionResult<DataSource>;

    fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> ProvisionResult<IngestionJob>;

    fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        job_id: &str,
    ) -> ProvisionResult<IngestionJob>;
}

pub trait FunctionService: Send + Sync {
    /// Create the function and return its ARN.
    fn create_function(&self, request: &FunctionRequest) -> ProvisionResult<String>;

    /// ARN of the function called `name`, if any.
    fn find_function(&self, name: &str) -> ProvisionResult<Option<String>>;

    /// Add a resource-based invoke permission. A duplicate statement id
    /// yields `AlreadyExists`.
    fn add_permission(&self, permission: &InvokePermission) -> ProvisionResult<()>;
}

pub trait AgentService: Send + Sync {
    fn find_agent(&self, name: &str) -> ProvisionResult<Option<AgentRecord>>;

    fn create_agent(&self, definition: &AgentDefinition) -> ProvisionResult<AgentRecord>;

    fn get_agent(&self, agent_id: &str) -> ProvisionResult<AgentRecord>;

    /// Create an action group on an agent draft and return its id.
    fn create_action_group(&self, definition: &ActionGroupDefinition) -> ProvisionResult<String>;

    /// Id of the action group called `name` on the given agent version, if any.
    fn find_action_group(
        &self,
        agent_id: &str,
        agent_version: &str,
        name: &str,
    ) -> ProvisionResult<Option<String>>;

    fn associate_knowledge_base(
        &self,
        agent_id: &str,
        agent_version: &str,
        knowledge_base_id: &str,
        description: &str,
    ) -> ProvisionResult<()>;

    /// Start preparing the agent's draft. Returns the status reported by the
    /// provider, normally `PREPARING`.
    fn prepare_agent(&self, agent_id: &str) -> ProvisionResult<AgentStatus>;

    fn find_agent_alias(&self, agent_id: &str, name: &str) -> ProvisionResult<Option<AgentAlias>>;

    fn create_agent_alias(&self, agent_id: &str, name: &str) -> ProvisionResult<AgentAlias>;

    fn list_agents(&self) -> ProvisionResult<Vec<AgentSummary>>;
}

pub trait AgentRuntime: Send + Sync {
    /// Run one agent turn and return its event stream.
    fn invoke_agent(&self, request: &InvocationRequest) -> ProvisionResult<EventStream>;

    /// Answer `question` from a knowledge base alone, with citations.
    fn retrieve_and_generate(
        &self,
        knowledge_base_id: &str,
        model_arn: &str,
        question: &str,
    ) -> ProvisionResult<GroundedAnswer>;
}

/// The resource ledger: one record per resource a run creates or reuses.
///
/// A failed write aborts the run. Records are never modified or deleted.
pub trait ResourceLedger: Send + Sync {
    fn record(&self, record: &ResourceRecord) -> ProvisionResult<()>;

    /// Mark the run as finished, successfully or not.
    fn finalize(&self, run_id: &str) -> ProvisionResult<()>;
}

/// Checks an action group's API schema before it is registered.
pub trait SchemaVerifier: Send + Sync {
    fn verify_api_schema(&self, schema: &ApiSchema) -> ProvisionResult<VerificationReport>;
}

/// Suspends the calling thread between polls and retries.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps for real. Zero durations return immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
