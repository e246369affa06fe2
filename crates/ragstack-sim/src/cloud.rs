//! The simulated cloud: one in-process implementation of every provider port.
//!
//! State lives behind `Arc<Mutex<_>>`, so clones handed to the provisioner
//! and kept by a test observe the same resources. Errors are produced the
//! way a real binding would produce them: a provider error code wrapped in
//! a [`ProviderFault`] and classified.
//!
//! A [`SimScript`] scripts the parts a real provider decides on its own:
//! the status sequence of collections, knowledge bases and ingestion jobs,
//! failure reasons, and transient failures per operation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::debug;

use ragstack_contracts::{
    agent::{
        ActionGroupDefinition, AgentAlias, AgentDefinition, AgentRecord, AgentStatus,
        AgentSummary, ApiSchema, FunctionRequest, InvokePermission,
    },
    error::{ProviderFault, ProvisionError, ProvisionResult},
    resource::{
        ChunkingPolicy, CollectionStatus, DataSource, DataSourceRequest, ExecutionRole,
        IngestionJob, IngestionStatistics, IngestionStatus, KnowledgeBase, KnowledgeBaseRequest,
        KnowledgeBaseStatus, SecurityPolicyKind, VectorCollection,
    },
};
use ragstack_core::{
    traits::{
        AgentService, FunctionService, IdentityService, KnowledgeBaseService, ObjectStore,
        VectorStore,
    },
    Providers,
};

use crate::retrieval::{chunk_document, Passage};

// ── Script ───────────────────────────────────────────────────────────────────

/// Provider-side behavior a test wants to pin down.
#[derive(Debug, Clone, Default)]
pub struct SimScript {
    /// Reported by successive `get_collection` calls. The last entry sticks;
    /// empty means `ACTIVE` right away.
    pub collection_statuses: Vec<CollectionStatus>,
    /// The first entry is returned by `create_knowledge_base`, the rest by
    /// successive `get_knowledge_base` calls. The last entry sticks; empty
    /// means `ACTIVE` right away.
    pub knowledge_base_statuses: Vec<KnowledgeBaseStatus>,
    /// The first entry is returned by `start_ingestion_job`, the rest by
    /// successive `get_ingestion_job` calls. The last entry sticks; empty
    /// means `STARTING` then `COMPLETE`.
    pub ingestion_statuses: Vec<IngestionStatus>,
    /// Attached to jobs that end `FAILED` or `STOPPED`.
    pub ingestion_failure_reasons: Vec<String>,
    /// Operation name to the number of throttling errors it returns before
    /// succeeding.
    pub transient_failures: BTreeMap<String, u32>,
    /// End every invocation stream with an error after this many events.
    pub stream_error_after: Option<usize>,
}

// ── State ────────────────────────────────────────────────────────────────────

pub(crate) struct AgentEntry {
    pub(crate) record: AgentRecord,
    pub(crate) instruction: String,
    pub(crate) action_groups: Vec<ActionGroupDefinition>,
    /// Action group name to id.
    pub(crate) action_group_ids: BTreeMap<String, String>,
    pub(crate) knowledge_bases: Vec<String>,
}

pub(crate) struct SimState {
    pub(crate) account_id: String,
    pub(crate) region: String,
    collection_statuses: VecDeque<CollectionStatus>,
    knowledge_base_statuses: VecDeque<KnowledgeBaseStatus>,
    ingestion_statuses: VecDeque<IngestionStatus>,
    ingestion_failure_reasons: Vec<String>,
    transient_failures: BTreeMap<String, u32>,
    pub(crate) stream_error_after: Option<usize>,
    calls: Vec<String>,
    next_id: u64,
    buckets: BTreeMap<String, String>,
    objects: BTreeMap<(String, String), Vec<u8>>,
    roles: BTreeMap<String, ExecutionRole>,
    policies: BTreeMap<String, String>,
    attachments: BTreeSet<(String, String)>,
    security_policies: BTreeMap<String, String>,
    access_policies: BTreeMap<String, String>,
    collections: Vec<VectorCollection>,
    indexes: BTreeMap<String, Value>,
    knowledge_bases: Vec<KnowledgeBase>,
    data_sources: Vec<DataSource>,
    jobs: Vec<IngestionJob>,
    pub(crate) passages: BTreeMap<String, Vec<Passage>>,
    functions: BTreeMap<String, String>,
    permissions: BTreeSet<(String, String)>,
    pub(crate) agents: Vec<AgentEntry>,
    pub(crate) aliases: Vec<AgentAlias>,
}

impl SimState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:08}", self.next_id)
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{service}:{}:{}:{resource}", self.region, self.account_id)
    }

    pub(crate) fn agent(&self, agent_id: &str) -> Option<&AgentEntry> {
        self.agents.iter().find(|a| a.record.id == agent_id)
    }

    fn agent_mut(&mut self, agent_id: &str) -> Option<&mut AgentEntry> {
        self.agents.iter_mut().find(|a| a.record.id == agent_id)
    }

    pub(crate) fn knowledge_base(&self, id: &str) -> Option<&KnowledgeBase> {
        self.knowledge_bases.iter().find(|kb| kb.id == id)
    }

    /// Chunk every object under the data source's prefixes into the
    /// knowledge base's passage list.
    fn index_data_source(&mut self, data_source_id: &str) -> IngestionStatistics {
        let Some(ds) = self.data_sources.iter().find(|d| d.id == data_source_id).cloned() else {
            return IngestionStatistics::default();
        };
        let bucket = ds.bucket_arn.trim_start_matches("arn:aws:s3:::").to_string();

        let mut stats = IngestionStatistics::default();
        let mut indexed = Vec::new();
        for ((b, key), body) in &self.objects {
            if *b != bucket || !ds.inclusion_prefixes.iter().any(|p| key.starts_with(p.as_str())) {
                continue;
            }
            stats.documents_scanned += 1;
            match std::str::from_utf8(body) {
                Ok(text) => {
                    let source_uri = format!("s3://{bucket}/{key}");
                    indexed.extend(chunk_document(text, &ds.chunking).into_iter().map(|text| Passage {
                        source_uri: source_uri.clone(),
                        text,
                    }));
                    stats.documents_indexed += 1;
                }
                Err(_) => stats.documents_failed += 1,
            }
        }

        self.passages.insert(ds.knowledge_base_id.clone(), indexed);
        stats
    }

    fn advance_job(&mut self, job_id: &str, status: IngestionStatus) -> ProvisionResult<IngestionJob> {
        let (data_source_id, previous) = {
            let job = self
                .jobs
                .iter()
                .find(|j| j.id == job_id)
                .ok_or_else(|| not_found("get_ingestion_job", "ingestion job", job_id))?;
            (job.data_source_id.clone(), job.status)
        };

        let statistics = if status == IngestionStatus::Complete && previous != IngestionStatus::Complete {
            Some(self.index_data_source(&data_source_id))
        } else {
            None
        };
        let reasons = self.ingestion_failure_reasons.clone();

        let job = self
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| not_found("get_ingestion_job", "ingestion job", job_id))?;
        job.status = status;
        if let Some(statistics) = statistics {
            job.statistics = statistics;
        }
        if matches!(status, IngestionStatus::Failed | IngestionStatus::Stopped) {
            job.failure_reasons = reasons;
        }
        Ok(job.clone())
    }
}

/// Pop the next scripted status; the last one sticks.
fn next_status<T: Copy>(queue: &mut VecDeque<T>, default: T) -> T {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or(default)
    } else {
        queue.front().copied().unwrap_or(default)
    }
}

fn fault(code: &str, message: impl Into<String>, op: &str, resource: &str, name: &str) -> ProvisionError {
    ProviderFault::new(code, message).classify(op, resource, name)
}

fn not_found(op: &str, resource: &str, name: &str) -> ProvisionError {
    fault("ResourceNotFoundException", format!("{resource} {name} does not exist"), op, resource, name)
}

fn conflict(op: &str, resource: &str, name: &str) -> ProvisionError {
    fault("ConflictException", format!("{resource} {name} already exists"), op, resource, name)
}

fn invalid(op: &str, message: impl Into<String>) -> ProvisionError {
    fault("ValidationException", message, op, "", "")
}

// ── SimulatedCloud ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SimulatedCloud {
    pub(crate) state: Arc<Mutex<SimState>>,
}

impl SimulatedCloud {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self::with_script(account_id, region, SimScript::default())
    }

    pub fn with_script(
        account_id: impl Into<String>,
        region: impl Into<String>,
        script: SimScript,
    ) -> Self {
        let state = SimState {
            account_id: account_id.into(),
            region: region.into(),
            collection_statuses: script.collection_statuses.into(),
            knowledge_base_statuses: script.knowledge_base_statuses.into(),
            ingestion_statuses: script.ingestion_statuses.into(),
            ingestion_failure_reasons: script.ingestion_failure_reasons,
            transient_failures: script.transient_failures,
            stream_error_after: script.stream_error_after,
            calls: Vec::new(),
            next_id: 0,
            buckets: BTreeMap::new(),
            objects: BTreeMap::new(),
            roles: BTreeMap::new(),
            policies: BTreeMap::new(),
            attachments: BTreeSet::new(),
            security_policies: BTreeMap::new(),
            access_policies: BTreeMap::new(),
            collections: Vec::new(),
            indexes: BTreeMap::new(),
            knowledge_bases: Vec::new(),
            data_sources: Vec::new(),
            jobs: Vec::new(),
            passages: BTreeMap::new(),
            functions: BTreeMap::new(),
            permissions: BTreeSet::new(),
            agents: Vec::new(),
            aliases: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Every port backed by this cloud.
    pub fn providers(&self) -> Providers {
        Providers {
            objects: Arc::new(self.clone()),
            identity: Arc::new(self.clone()),
            vectors: Arc::new(self.clone()),
            knowledge: Arc::new(self.clone()),
            functions: Arc::new(self.clone()),
            agents: Arc::new(self.clone()),
        }
    }

    /// How many times `op` was called, including calls that failed.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn call_count(&self, op: &str) -> usize {
        let state = self.state.lock().expect("sim state lock poisoned");
        state.calls.iter().filter(|c| *c == op).count()
    }

    /// Contents of `bucket/key`, if stored.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().expect("sim state lock poisoned");
        state.objects.get(&(bucket.to_string(), key.to_string())).cloned()
    }

    /// Number of passages indexed for a knowledge base.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn passage_count(&self, knowledge_base_id: &str) -> usize {
        let state = self.state.lock().expect("sim state lock poisoned");
        state.passages.get(knowledge_base_id).map_or(0, Vec::len)
    }

    // ── Seeding ──────────────────────────────────────────────────────────────

    /// Register an active knowledge base with id `id` and index `documents`
    /// (source URI, text) into it.
    pub fn seed_knowledge_base(
        &self,
        id: &str,
        name: &str,
        documents: &[(String, String)],
        chunking: &ChunkingPolicy,
    ) -> ProvisionResult<KnowledgeBase> {
        let mut state = self.lock()?;
        let kb = KnowledgeBase {
            id: id.to_string(),
            arn: state.arn("bedrock", &format!("knowledge-base/{id}")),
            name: name.to_string(),
            embedding_model_arn: format!(
                "arn:aws:bedrock:{}::foundation-model/amazon.titan-embed-text-v1",
                state.region
            ),
            status: KnowledgeBaseStatus::Active,
        };
        state.knowledge_bases.retain(|k| k.id != id);
        state.knowledge_bases.push(kb.clone());

        let passages = documents
            .iter()
            .flat_map(|(uri, text)| {
                chunk_document(text, chunking).into_iter().map(move |chunk| Passage {
                    source_uri: uri.clone(),
                    text: chunk,
                })
            })
            .collect();
        state.passages.insert(id.to_string(), passages);
        debug!(knowledge_base_id = %id, documents = documents.len(), "seeded knowledge base");
        Ok(kb)
    }

    /// Register a prepared agent with the password-reset action group and an
    /// alias, optionally associated with a knowledge base.
    pub fn seed_prepared_agent(
        &self,
        agent_id: &str,
        name: &str,
        alias_id: &str,
        knowledge_base_id: Option<&str>,
    ) -> ProvisionResult<AgentAlias> {
        let mut state = self.lock()?;
        let function_name = format!("{name}-action-fn");
        let function_arn = state.arn("lambda", &format!("function:{function_name}"));
        state.functions.insert(function_name, function_arn.clone());

        let record = AgentRecord {
            id: agent_id.to_string(),
            arn: state.arn("bedrock", &format!("agent/{agent_id}")),
            name: name.to_string(),
            status: AgentStatus::Prepared,
        };
        let action_group = ActionGroupDefinition {
            agent_id: agent_id.to_string(),
            agent_version: "DRAFT".to_string(),
            name: "PasswordResetActionGroup".to_string(),
            description: "Resets a user's password".to_string(),
            function_arn,
            api_schema: ApiSchema::password_reset(),
        };
        state.agents.retain(|a| a.record.id != agent_id);
        state.agents.push(AgentEntry {
            record,
            instruction: String::new(),
            action_group_ids: BTreeMap::from([(action_group.name.clone(), "AGRPDEMO".to_string())]),
            action_groups: vec![action_group],
            knowledge_bases: knowledge_base_id.into_iter().map(str::to_string).collect(),
        });

        let alias = AgentAlias {
            id: alias_id.to_string(),
            arn: state.arn("bedrock", &format!("agent-alias/{agent_id}/{alias_id}")),
            name: "latest".to_string(),
            agent_id: agent_id.to_string(),
        };
        state.aliases.retain(|a| !(a.agent_id == agent_id && a.id == alias_id));
        state.aliases.push(alias.clone());
        debug!(agent_id = %agent_id, alias_id = %alias_id, "seeded prepared agent");
        Ok(alias)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    pub(crate) fn lock(&self) -> ProvisionResult<MutexGuard<'_, SimState>> {
        self.state
            .lock()
            .map_err(|e| ProvisionError::fatal("simulated provider", format!("state lock poisoned: {e}")))
    }

    /// Record the call and apply any scripted throttling.
    pub(crate) fn enter(&self, op: &str) -> ProvisionResult<MutexGuard<'_, SimState>> {
        let mut state = self.lock()?;
        state.calls.push(op.to_string());
        if let Some(remaining) = state.transient_failures.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!(operation = %op, remaining = *remaining, "scripted throttling");
                return Err(fault("ThrottlingException", "Rate exceeded", op, "", ""));
            }
        }
        Ok(state)
    }
}

// ── ObjectStore ──────────────────────────────────────────────────────────────

impl ObjectStore for SimulatedCloud {
    fn bucket_exists(&self, bucket: &str) -> ProvisionResult<bool> {
        let state = self.enter("bucket_exists")?;
        Ok(state.buckets.contains_key(bucket))
    }

    fn create_bucket(&self, bucket: &str, region: &str) -> ProvisionResult<()> {
        const OP: &str = "create_bucket";
        let mut state = self.enter(OP)?;
        if state.buckets.contains_key(bucket) {
            return Err(fault("BucketAlreadyOwnedByYou", "bucket exists", OP, "bucket", bucket));
        }
        state.buckets.insert(bucket.to_string(), region.to_string());
        Ok(())
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> ProvisionResult<()> {
        const OP: &str = "put_object";
        let mut state = self.enter(OP)?;
        if !state.buckets.contains_key(bucket) {
            return Err(fault("NoSuchBucket", "bucket does not exist", OP, "bucket", bucket));
        }
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
        Ok(())
    }
}

// ── IdentityService ──────────────────────────────────────────────────────────

impl IdentityService for SimulatedCloud {
    fn create_role(&self, name: &str, trust_policy: &str, _description: &str) -> ProvisionResult<ExecutionRole> {
        const OP: &str = "create_role";
        let mut state = self.enter(OP)?;
        if state.roles.contains_key(name) {
            return Err(fault("EntityAlreadyExists", "role exists", OP, "role", name));
        }
        if serde_json::from_str::<Value>(trust_policy).is_err() {
            return Err(fault("MalformedPolicyDocument", "trust policy is not JSON", OP, "role", name));
        }
        let role = ExecutionRole {
            name: name.to_string(),
            arn: format!("arn:aws:iam::{}:role/{name}", state.account_id),
        };
        state.roles.insert(name.to_string(), role.clone());
        Ok(role)
    }

    fn get_role(&self, name: &str) -> ProvisionResult<ExecutionRole> {
        const OP: &str = "get_role";
        let state = self.enter(OP)?;
        state
            .roles
            .get(name)
            .cloned()
            .ok_or_else(|| fault("NoSuchEntity", "role not found", OP, "role", name))
    }

    fn create_policy(&self, name: &str, document: &str, _description: &str) -> ProvisionResult<String> {
        const OP: &str = "create_policy";
        let mut state = self.enter(OP)?;
        if state.policies.contains_key(name) {
            return Err(fault("EntityAlreadyExists", "policy exists", OP, "policy", name));
        }
        if serde_json::from_str::<Value>(document).is_err() {
            return Err(fault("MalformedPolicyDocument", "policy is not JSON", OP, "policy", name));
        }
        let arn = format!("arn:aws:iam::{}:policy/{name}", state.account_id);
        state.policies.insert(name.to_string(), arn.clone());
        Ok(arn)
    }

    fn find_policy(&self, name: &str) -> ProvisionResult<Option<String>> {
        let state = self.enter("find_policy")?;
        Ok(state.policies.get(name).cloned())
    }

    fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> ProvisionResult<()> {
        const OP: &str = "attach_role_policy";
        let mut state = self.enter(OP)?;
        if !state.roles.contains_key(role_name) {
            return Err(fault("NoSuchEntity", "role not found", OP, "role", role_name));
        }
        let managed = policy_arn.starts_with("arn:aws:iam::aws:policy/");
        if !managed && !state.policies.values().any(|a| a == policy_arn) {
            return Err(fault("NoSuchEntity", "policy not found", OP, "policy", policy_arn));
        }
        state
            .attachments
            .insert((role_name.to_string(), policy_arn.to_string()));
        Ok(())
    }
}

// ── VectorStore ──────────────────────────────────────────────────────────────

impl VectorStore for SimulatedCloud {
    fn create_security_policy(
        &self,
        kind: SecurityPolicyKind,
        name: &str,
        policy: &str,
    ) -> ProvisionResult<()> {
        const OP: &str = "create_security_policy";
        let mut state = self.enter(OP)?;
        let key = format!("{}/{name}", kind.as_str());
        if state.security_policies.contains_key(&key) {
            return Err(conflict(OP, "security policy", name));
        }
        state.security_policies.insert(key, policy.to_string());
        Ok(())
    }

    fn create_access_policy(&self, name: &str, policy: &str) -> ProvisionResult<()> {
        const OP: &str = "create_access_policy";
        let mut state = self.enter(OP)?;
        if state.access_policies.contains_key(name) {
            return Err(conflict(OP, "access policy", name));
        }
        state.access_policies.insert(name.to_string(), policy.to_string());
        Ok(())
    }

    fn find_collection(&self, name: &str) -> ProvisionResult<Option<VectorCollection>> {
        let state = self.enter("find_collection")?;
        Ok(state.collections.iter().find(|c| c.name == name).cloned())
    }

    fn create_collection(&self, name: &str) -> ProvisionResult<VectorCollection> {
        const OP: &str = "create_collection";
        let mut state = self.enter(OP)?;
        if state.collections.iter().any(|c| c.name == name) {
            return Err(conflict(OP, "collection", name));
        }
        if !state.security_policies.keys().any(|k| k.starts_with("encryption/")) {
            return Err(invalid(OP, "no matching encryption policy found for the collection"));
        }
        let id = state.id("col").to_lowercase();
        let collection = VectorCollection {
            arn: state.arn("aoss", &format!("collection/{id}")),
            id,
            name: name.to_string(),
            status: CollectionStatus::Creating,
            endpoint: None,
        };
        state.collections.push(collection.clone());
        Ok(collection)
    }

    fn get_collection(&self, id: &str) -> ProvisionResult<VectorCollection> {
        const OP: &str = "get_collection";
        let mut state = self.enter(OP)?;
        let status = next_status(&mut state.collection_statuses, CollectionStatus::Active);
        let region = state.region.clone();
        let collection = state
            .collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found(OP, "collection", id))?;
        collection.status = status;
        if status == CollectionStatus::Active {
            collection.endpoint = Some(format!("https://{id}.{region}.aoss.amazonaws.com"));
        }
        Ok(collection.clone())
    }

    fn create_index(&self, host: &str, index: &str, body: &Value) -> ProvisionResult<()> {
        const OP: &str = "create_index";
        let mut state = self.enter(OP)?;
        let region = state.region.clone();
        let collection = state
            .collections
            .iter()
            .find(|c| c.host(&region) == host)
            .ok_or_else(|| not_found(OP, "collection", host))?;
        if collection.status != CollectionStatus::Active {
            return Err(invalid(OP, format!("collection is {}", collection.status.as_str())));
        }
        if body.pointer("/mappings/properties").is_none() {
            return Err(invalid(OP, "index body has no mappings"));
        }
        let key = format!("{host}/{index}");
        if state.indexes.contains_key(&key) {
            return Err(fault(
                "resource_already_exists_exception",
                format!("index [{index}] already exists"),
                OP,
                "index",
                index,
            ));
        }
        state.indexes.insert(key, body.clone());
        Ok(())
    }
}

// ── KnowledgeBaseService ─────────────────────────────────────────────────────

impl KnowledgeBaseService for SimulatedCloud {
    fn find_knowledge_base(&self, name: &str) -> ProvisionResult<Option<KnowledgeBase>> {
        let state = self.enter("find_knowledge_base")?;
        Ok(state.knowledge_bases.iter().find(|kb| kb.name == name).cloned())
    }

    fn create_knowledge_base(&self, request: &KnowledgeBaseRequest) -> ProvisionResult<KnowledgeBase> {
        const OP: &str = "create_knowledge_base";
        let mut state = self.enter(OP)?;
        if state.knowledge_bases.iter().any(|kb| kb.name == request.name) {
            return Err(conflict(OP, "knowledge base", &request.name));
        }
        if !state.roles.values().any(|r| r.arn == request.role_arn) {
            return Err(invalid(OP, format!("role {} cannot be assumed", request.role_arn)));
        }
        let region = state.region.clone();
        let collection = state
            .collections
            .iter()
            .find(|c| c.arn == request.collection_arn)
            .ok_or_else(|| not_found(OP, "collection", &request.collection_arn))?;
        let index_key = format!("{}/{}", collection.host(&region), request.index_name);
        if !state.indexes.contains_key(&index_key) {
            return Err(invalid(OP, format!("no such index [{}]", request.index_name)));
        }

        let id = state.id("KB");
        let status = next_status(&mut state.knowledge_base_statuses, KnowledgeBaseStatus::Active);
        let kb = KnowledgeBase {
            arn: state.arn("bedrock", &format!("knowledge-base/{id}")),
            id,
            name: request.name.clone(),
            embedding_model_arn: request.embedding_model_arn.clone(),
            status,
        };
        state.knowledge_bases.push(kb.clone());
        Ok(kb)
    }

    fn get_knowledge_base(&self, id: &str) -> ProvisionResult<KnowledgeBase> {
        const OP: &str = "get_knowledge_base";
        let mut state = self.enter(OP)?;
        let status = next_status(&mut state.knowledge_base_statuses, KnowledgeBaseStatus::Active);
        let kb = state
            .knowledge_bases
            .iter_mut()
            .find(|kb| kb.id == id)
            .ok_or_else(|| not_found(OP, "knowledge base", id))?;
        kb.status = status;
        Ok(kb.clone())
    }

    fn find_data_source(&self, knowledge_base_id: &str, name: &str) -> ProvisionResult<Option<DataSource>> {
        let state = self.enter("find_data_source")?;
        Ok(state
            .data_sources
            .iter()
            .find(|ds| ds.knowledge_base_id == knowledge_base_id && ds.name == name)
            .cloned())
    }

    fn create_data_source(&self, request: &DataSourceRequest) -> ProvisionResult<DataSource> {
        const OP: &str = "create_data_source";
        let mut state = self.enter(OP)?;
        if state.knowledge_base(&request.knowledge_base_id).is_none() {
            return Err(not_found(OP, "knowledge base", &request.knowledge_base_id));
        }
        let bucket = request.bucket_arn.trim_start_matches("arn:aws:s3:::");
        if !state.buckets.contains_key(bucket) {
            return Err(invalid(OP, format!("bucket {bucket} does not exist")));
        }
        if state
            .data_sources
            .iter()
            .any(|ds| ds.knowledge_base_id == request.knowledge_base_id && ds.name == request.name)
        {
            return Err(conflict(OP, "data source", &request.name));
        }

        let ds = DataSource {
            id: state.id("DS"),
            knowledge_base_id: request.knowledge_base_id.clone(),
            name: request.name.clone(),
            bucket_arn: request.bucket_arn.clone(),
            inclusion_prefixes: request.inclusion_prefixes.clone(),
            chunking: request.chunking.clone(),
        };
        state.data_sources.push(ds.clone());
        Ok(ds)
    }

    fn start_ingestion_job(&self, knowledge_base_id: &str, data_source_id: &str) -> ProvisionResult<IngestionJob> {
        const OP: &str = "start_ingestion_job";
        let mut state = self.enter(OP)?;
        if !state
            .data_sources
            .iter()
            .any(|ds| ds.id == data_source_id && ds.knowledge_base_id == knowledge_base_id)
        {
            return Err(not_found(OP, "data source", data_source_id));
        }

        let status = next_status(&mut state.ingestion_statuses, IngestionStatus::Starting);
        let job = IngestionJob {
            id: state.id("JOB"),
            knowledge_base_id: knowledge_base_id.to_string(),
            data_source_id: data_source_id.to_string(),
            status: IngestionStatus::Starting,
            statistics: IngestionStatistics::default(),
            failure_reasons: Vec::new(),
        };
        let job_id = job.id.clone();
        state.jobs.push(job);
        state.advance_job(&job_id, status)
    }

    fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        job_id: &str,
    ) -> ProvisionResult<IngestionJob> {
        const OP: &str = "get_ingestion_job";
        let mut state = self.enter(OP)?;
        let belongs = state.jobs.iter().any(|j| {
            j.id == job_id && j.knowledge_base_id == knowledge_base_id && j.data_source_id == data_source_id
        });
        if !belongs {
            return Err(not_found(OP, "ingestion job", job_id));
        }
        let status = next_status(&mut state.ingestion_statuses, IngestionStatus::Complete);
        state.advance_job(job_id, status)
    }
}

// ── FunctionService ──────────────────────────────────────────────────────────

impl FunctionService for SimulatedCloud {
    fn create_function(&self, request: &FunctionRequest) -> ProvisionResult<String> {
        const OP: &str = "create_function";
        let mut state = self.enter(OP)?;
        if state.functions.contains_key(&request.name) {
            return Err(fault("ResourceConflictException", "function exists", OP, "function", &request.name));
        }
        if !state.roles.values().any(|r| r.arn == request.role_arn) {
            return Err(fault(
                "InvalidParameterValueException",
                "The role defined for the function cannot be assumed by Lambda.",
                OP,
                "function",
                &request.name,
            ));
        }
        if request.archive.is_empty() {
            return Err(fault("InvalidParameterValueException", "empty deployment package", OP, "function", &request.name));
        }
        let arn = state.arn("lambda", &format!("function:{}", request.name));
        state.functions.insert(request.name.clone(), arn.clone());
        Ok(arn)
    }

    fn find_function(&self, name: &str) -> ProvisionResult<Option<String>> {
        let state = self.enter("find_function")?;
        Ok(state.functions.get(name).cloned())
    }

    fn add_permission(&self, permission: &InvokePermission) -> ProvisionResult<()> {
        const OP: &str = "add_permission";
        let mut state = self.enter(OP)?;
        if !state.functions.contains_key(&permission.function_name) {
            return Err(not_found(OP, "function", &permission.function_name));
        }
        let key = (permission.function_name.clone(), permission.statement_id.clone());
        if state.permissions.contains(&key) {
            return Err(fault(
                "ResourceConflictException",
                "statement id already exists",
                OP,
                "permission",
                &permission.statement_id,
            ));
        }
        state.permissions.insert(key);
        Ok(())
    }
}

// ── AgentService ─────────────────────────────────────────────────────────────

impl AgentService for SimulatedCloud {
    fn find_agent(&self, name: &str) -> ProvisionResult<Option<AgentRecord>> {
        let state = self.enter("find_agent")?;
        Ok(state
            .agents
            .iter()
            .find(|a| a.record.name == name)
            .map(|a| a.record.clone()))
    }

    fn create_agent(&self, definition: &AgentDefinition) -> ProvisionResult<AgentRecord> {
        const OP: &str = "create_agent";
        let mut state = self.enter(OP)?;
        if state.agents.iter().any(|a| a.record.name == definition.name) {
            return Err(conflict(OP, "agent", &definition.name));
        }
        if !state.roles.values().any(|r| r.arn == definition.role_arn) {
            return Err(invalid(OP, format!("role {} cannot be assumed", definition.role_arn)));
        }
        let id = state.id("AG");
        let record = AgentRecord {
            arn: state.arn("bedrock", &format!("agent/{id}")),
            id,
            name: definition.name.clone(),
            status: AgentStatus::Creating,
        };
        state.agents.push(AgentEntry {
            record: record.clone(),
            instruction: definition.instruction.clone(),
            action_groups: Vec::new(),
            action_group_ids: BTreeMap::new(),
            knowledge_bases: Vec::new(),
        });
        Ok(record)
    }

    fn get_agent(&self, agent_id: &str) -> ProvisionResult<AgentRecord> {
        const OP: &str = "get_agent";
        let mut state = self.enter(OP)?;
        let entry = state
            .agent_mut(agent_id)
            .ok_or_else(|| not_found(OP, "agent", agent_id))?;
        entry.record.status = match entry.record.status {
            AgentStatus::Creating => AgentStatus::NotPrepared,
            AgentStatus::Preparing => AgentStatus::Prepared,
            other => other,
        };
        Ok(entry.record.clone())
    }

    fn create_action_group(&self, definition: &ActionGroupDefinition) -> ProvisionResult<String> {
        const OP: &str = "create_action_group";
        let mut state = self.enter(OP)?;
        if !state.functions.values().any(|arn| *arn == definition.function_arn) {
            return Err(not_found(OP, "function", &definition.function_arn));
        }
        let id = state.id("AGRP");
        let entry = state
            .agent_mut(&definition.agent_id)
            .ok_or_else(|| not_found(OP, "agent", &definition.agent_id))?;
        if entry.action_groups.iter().any(|g| g.name == definition.name) {
            return Err(conflict(OP, "action group", &definition.name));
        }
        entry.action_groups.push(definition.clone());
        entry.action_group_ids.insert(definition.name.clone(), id.clone());
        if entry.record.status == AgentStatus::Prepared {
            entry.record.status = AgentStatus::NotPrepared;
        }
        Ok(id)
    }

    fn find_action_group(
        &self,
        agent_id: &str,
        _agent_version: &str,
        name: &str,
    ) -> ProvisionResult<Option<String>> {
        const OP: &str = "find_action_group";
        let state = self.enter(OP)?;
        let entry = state
            .agent(agent_id)
            .ok_or_else(|| not_found(OP, "agent", agent_id))?;
        Ok(entry.action_group_ids.get(name).cloned())
    }

    fn associate_knowledge_base(
        &self,
        agent_id: &str,
        _agent_version: &str,
        knowledge_base_id: &str,
        _description: &str,
    ) -> ProvisionResult<()> {
        const OP: &str = "associate_knowledge_base";
        let mut state = self.enter(OP)?;
        if state.knowledge_base(knowledge_base_id).is_none() {
            return Err(not_found(OP, "knowledge base", knowledge_base_id));
        }
        let entry = state
            .agent_mut(agent_id)
            .ok_or_else(|| not_found(OP, "agent", agent_id))?;
        if entry.knowledge_bases.iter().any(|k| k == knowledge_base_id) {
            return Err(conflict(OP, "knowledge base association", knowledge_base_id));
        }
        entry.knowledge_bases.push(knowledge_base_id.to_string());
        Ok(())
    }

    fn prepare_agent(&self, agent_id: &str) -> ProvisionResult<AgentStatus> {
        const OP: &str = "prepare_agent";
        let mut state = self.enter(OP)?;
        let entry = state
            .agent_mut(agent_id)
            .ok_or_else(|| not_found(OP, "agent", agent_id))?;
        if entry.record.status.is_transitional() {
            return Err(invalid(
                OP,
                format!("agent is {}", entry.record.status.as_str()),
            ));
        }
        entry.record.status = AgentStatus::Preparing;
        Ok(AgentStatus::Preparing)
    }

    fn find_agent_alias(&self, agent_id: &str, name: &str) -> ProvisionResult<Option<AgentAlias>> {
        let state = self.enter("find_agent_alias")?;
        Ok(state
            .aliases
            .iter()
            .find(|a| a.agent_id == agent_id && a.name == name)
            .cloned())
    }

    fn create_agent_alias(&self, agent_id: &str, name: &str) -> ProvisionResult<AgentAlias> {
        const OP: &str = "create_agent_alias";
        let mut state = self.enter(OP)?;
        match state.agent(agent_id) {
            None => return Err(not_found(OP, "agent", agent_id)),
            Some(entry) if entry.record.status != AgentStatus::Prepared => {
                return Err(invalid(OP, "agent has no prepared version"));
            }
            Some(_) => {}
        }
        if state.aliases.iter().any(|a| a.agent_id == agent_id && a.name == name) {
            return Err(conflict(OP, "agent alias", name));
        }
        let id = state.id("AL");
        let alias = AgentAlias {
            arn: state.arn("bedrock", &format!("agent-alias/{agent_id}/{id}")),
            id,
            name: name.to_string(),
            agent_id: agent_id.to_string(),
        };
        state.aliases.push(alias.clone());
        Ok(alias)
    }

    fn list_agents(&self) -> ProvisionResult<Vec<AgentSummary>> {
        let state = self.enter("list_agents")?;
        Ok(state
            .agents
            .iter()
            .map(|a| AgentSummary {
                id: a.record.id.clone(),
                name: a.record.name.clone(),
                status: a.record.status,
            })
            .collect())
    }
}
