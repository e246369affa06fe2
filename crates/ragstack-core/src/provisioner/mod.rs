//! The provisioning orchestrator.
//!
//! `Provisioner::run` drives the whole stack into existence, in order:
//!
//!   Bucket → KB role → Collection → Index → Documents → Knowledge base
//!     → Data source → Ingestion → Agent role → Agent → Prepare → Alias
//!
//! Each step reuses what already exists, so re-running with the same run id
//! converges instead of duplicating. No creation call is issued until the
//! resource it depends on has left its transitional status. Every resource
//! touched is written to the ledger, which is finalized whether the run
//! succeeds or not.

mod agent;
mod bucket;
mod collection;
mod index;
mod ingestion;
mod knowledge_base;
mod role;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use ragstack_contracts::{
    agent::ApiSchema,
    arn,
    error::ProvisionResult,
    naming::{ResourceNames, RolePurpose, RunId},
    record::{Disposition, ResourceKind, ResourceRecord},
};
use ragstack_policy::Grant;

use crate::config::StackConfig;
use crate::prompts::{default_prompt_overrides, DEFAULT_INSTRUCTION};
use crate::traits::{
    AgentService, FunctionService, IdentityService, KnowledgeBaseService, ObjectStore,
    ResourceLedger, SchemaVerifier, Sleeper, VectorStore,
};

/// Handles to every provider the pipeline calls.
#[derive(Clone)]
pub struct Providers {
    pub objects: Arc<dyn ObjectStore>,
    pub identity: Arc<dyn IdentityService>,
    pub vectors: Arc<dyn VectorStore>,
    pub knowledge: Arc<dyn KnowledgeBaseService>,
    pub functions: Arc<dyn FunctionService>,
    pub agents: Arc<dyn AgentService>,
}

/// Identifiers of a provisioned stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutputs {
    pub run_id: String,
    pub bucket: String,
    pub collection_endpoint: String,
    pub knowledge_base_id: String,
    pub knowledge_base_arn: String,
    pub data_source_id: String,
    pub ingestion_job_id: String,
    pub agent_id: String,
    pub agent_alias_id: String,
}

pub struct Provisioner {
    providers: Providers,
    ledger: Box<dyn ResourceLedger>,
    verifier: Box<dyn SchemaVerifier>,
    sleeper: Box<dyn Sleeper>,
    config: StackConfig,
    run_id: RunId,
    names: ResourceNames,
}

impl Provisioner {
    /// Validate `config`, fix the run id, and derive every resource name.
    pub fn new(
        providers: Providers,
        ledger: Box<dyn ResourceLedger>,
        verifier: Box<dyn SchemaVerifier>,
        sleeper: Box<dyn Sleeper>,
        config: StackConfig,
    ) -> ProvisionResult<Self> {
        config.validate()?;
        let run_id = config.resolve_run_id()?;
        let names = config.resource_names(&run_id)?;
        Ok(Self {
            providers,
            ledger,
            verifier,
            sleeper,
            config,
            run_id,
            names,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    /// Provision the full stack.
    ///
    /// The ledger is finalized on both paths. On failure the step error is
    /// returned even if finalizing also fails.
    pub fn run(&self) -> ProvisionResult<StackOutputs> {
        info!(run_id = %self.run_id, region = %self.config.region, "provisioning started");

        let result = self.run_steps();
        let finalized = self.ledger.finalize(self.run_id.as_str());

        match result {
            Ok(outputs) => {
                finalized?;
                info!(
                    run_id = %self.run_id,
                    knowledge_base_id = %outputs.knowledge_base_id,
                    agent_id = %outputs.agent_id,
                    agent_alias_id = %outputs.agent_alias_id,
                    "provisioning complete"
                );
                Ok(outputs)
            }
            Err(e) => {
                if let Err(ledger_err) = finalized {
                    warn!(run_id = %self.run_id, error = %ledger_err, "ledger finalize failed");
                }
                error!(run_id = %self.run_id, error = %e, "provisioning failed");
                Err(e)
            }
        }
    }

    fn run_steps(&self) -> ProvisionResult<StackOutputs> {
        let region = self.config.region.clone();

        // ── Storage and knowledge-base identity ──────────────────────────────
        let bucket = self.ensure_bucket()?;
        let bucket_arn = arn::bucket(&bucket);
        let embedding_model_arn =
            arn::foundation_model(&region, &self.config.knowledge_base.embedding_model);

        let kb_role = self.ensure_role(
            RolePurpose::KnowledgeBase,
            &[
                Grant::ModelInvoke {
                    model_arns: vec![embedding_model_arn.clone()],
                },
                Grant::StorageRead {
                    bucket_arn: bucket_arn.clone(),
                },
            ],
        )?;
        self.settle("role propagation", self.config.timing.role_settle_secs);

        // ── Vector store ─────────────────────────────────────────────────────
        let collection = self.ensure_collection(&self.names.collection(), &kb_role.arn)?;
        self.grant(
            &kb_role,
            RolePurpose::KnowledgeBase,
            &Grant::VectorRetrieve {
                collection_arn: collection.arn.clone(),
            },
        )?;
        self.settle("collection access rules", self.config.timing.access_policy_settle_secs);

        let index_name = self.names.index();
        self.create_vector_index(&collection, &index_name)?;
        self.settle("index availability", self.config.timing.index_settle_secs);

        // ── Knowledge base and ingestion ─────────────────────────────────────
        self.upload_documents(&bucket)?;

        let kb = self.create_knowledge_base(
            &collection.arn,
            &index_name,
            &kb_role.arn,
            &embedding_model_arn,
        )?;
        let data_source = self.create_data_source(
            &kb.id,
            &bucket_arn,
            &self.config.data_prefix,
            &self.config.knowledge_base.chunking,
        )?;
        let job = self.run_ingestion(&kb.id, &data_source.id)?;

        // ── Agent ────────────────────────────────────────────────────────────
        let schema = ApiSchema::password_reset();
        let schema_arn = self.upload_api_schema(&bucket, &schema)?;

        let agent_role = self.ensure_role(
            RolePurpose::Agent,
            &[
                Grant::ModelInvoke {
                    model_arns: vec![arn::foundation_model(&region, "*")],
                },
                Grant::SchemaRead {
                    object_arn: schema_arn,
                },
                Grant::KnowledgeRetrieve {
                    knowledge_base_arn: kb.arn.clone(),
                },
            ],
        )?;
        self.settle("role propagation", self.config.timing.role_settle_secs);

        let instruction = self
            .config
            .agent
            .instruction
            .clone()
            .unwrap_or_else(|| DEFAULT_INSTRUCTION.trim().to_string());
        let overrides = default_prompt_overrides(self.config.agent.parser_function_arn.clone());

        let agent_id =
            self.create_agent(&agent_role.arn, &instruction, &overrides, &kb.id, &schema)?;
        let alias = self.prepare_and_alias(&agent_id)?;

        Ok(StackOutputs {
            run_id: self.run_id.to_string(),
            bucket,
            collection_endpoint: collection.host(&region),
            knowledge_base_id: kb.id,
            knowledge_base_arn: kb.arn,
            data_source_id: data_source.id,
            ingestion_job_id: job.id,
            agent_id,
            agent_alias_id: alias.id,
        })
    }

    // ── Shared helpers ───────────────────────────────────────────────────────

    fn record(
        &self,
        kind: ResourceKind,
        name: &str,
        identifier: &str,
        disposition: Disposition,
    ) -> ProvisionResult<()> {
        debug!(
            run_id = %self.run_id,
            kind = %kind,
            name = %name,
            disposition = ?disposition,
            "recording resource"
        );
        self.ledger
            .record(&ResourceRecord::new(kind, name, identifier, disposition))
    }

    /// Wait out a propagation delay the provider gives no status for.
    fn settle(&self, what: &str, secs: u64) {
        if secs > 0 {
            debug!(wait_secs = secs, "waiting for {}", what);
        }
        self.sleeper.sleep(Duration::from_secs(secs));
    }
}
