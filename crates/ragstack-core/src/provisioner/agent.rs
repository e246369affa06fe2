//! Agent provisioner: agent, action group, knowledge-base association,
//! preparation and alias.

use tracing::{debug, info};

use ragstack_contracts::{
    agent::{
        ActionGroupDefinition, AgentAlias, AgentDefinition, AgentRecord, AgentStatus, ApiSchema,
        FunctionRequest, InvokePermission, PromptOverrides,
    },
    arn,
    error::{ProvisionError, ProvisionResult},
    naming::RolePurpose,
    record::{Disposition, ResourceKind},
};
use ragstack_policy::{grant::AGENT_SERVICE_PRINCIPAL, Grant};

use crate::package::FunctionPackage;
use crate::poll::{poll_until, PollState};
use crate::prompts::{BUNDLED_HANDLER, BUNDLED_HANDLER_NAME};
use crate::retry::retry_transient;

use super::collection::tolerate_existing;
use super::Provisioner;

/// Agent version that action groups and associations are attached to.
pub const DRAFT_VERSION: &str = "DRAFT";

/// Statement id of the permission letting the agent call the handler.
pub const INVOKE_STATEMENT_ID: &str = "allow_bedrock";

impl Provisioner {
    /// Create the agent with its action group and knowledge base, and return
    /// its id. The agent is left unprepared.
    pub fn create_agent(
        &self,
        role_arn: &str,
        instruction: &str,
        prompt_overrides: &PromptOverrides,
        knowledge_base_id: &str,
        api_schema: &ApiSchema,
    ) -> ProvisionResult<String> {
        let name = self.names.agent();
        let agents = &self.providers.agents;
        let settings = &self.config.agent;

        let (agent, disposition) = match agents.find_agent(&name)? {
            Some(existing) => (existing, Disposition::Reused),
            None => {
                let definition = AgentDefinition {
                    name: name.clone(),
                    description: settings.description.clone(),
                    role_arn: role_arn.to_string(),
                    foundation_model: settings.foundation_model.clone(),
                    instruction: instruction.to_string(),
                    idle_session_ttl_secs: settings.idle_session_ttl_secs,
                    prompt_overrides: prompt_overrides.clone(),
                };
                let retry = self.config.timing.retry();
                let created = retry_transient("create_agent", &retry, &*self.sleeper, |_| {
                    agents.create_agent(&definition)
                })?;
                (created, Disposition::Created)
            }
        };
        self.record(ResourceKind::Agent, &name, &agent.arn, disposition)?;
        info!(agent = %name, id = %agent.id, disposition = ?disposition, "agent ready");

        let agent = self.wait_for_agent(&agent.id, false)?;

        self.provision_action_group(&agent, api_schema)?;

        let associated = agents.associate_knowledge_base(
            &agent.id,
            DRAFT_VERSION,
            knowledge_base_id,
            &self.config.knowledge_base.description,
        );
        let disposition = tolerate_existing(associated)?;
        self.record(
            ResourceKind::KnowledgeBaseAssociation,
            &format!("{}/{}", agent.id, knowledge_base_id),
            knowledge_base_id,
            disposition,
        )?;

        Ok(agent.id)
    }

    /// Package and create the handler function, let the agent invoke it, and
    /// register the action group on the agent's draft.
    fn provision_action_group(&self, agent: &AgentRecord, schema: &ApiSchema) -> ProvisionResult<()> {
        let settings = &self.config.agent;
        let functions = &self.providers.functions;

        let report = self.verifier.verify_api_schema(schema)?;
        if !report.passed {
            return Err(ProvisionError::SchemaValidation {
                reason: report.summary(),
            });
        }

        let function_role = self.ensure_role(
            RolePurpose::ActionFunction,
            &[Grant::Managed {
                policy_arn: arn::FUNCTION_BASIC_EXECUTION_POLICY.to_string(),
            }],
        )?;
        self.settle("role propagation", self.config.timing.role_settle_secs);

        let function_name = self.names.function();
        let (function_arn, disposition) = match functions.find_function(&function_name)? {
            Some(existing) => (existing, Disposition::Reused),
            None => {
                let package = match &settings.function_source {
                    Some(path) => FunctionPackage::from_file(path)?,
                    None => FunctionPackage::from_source(BUNDLED_HANDLER_NAME, BUNDLED_HANDLER)?,
                };
                let request = FunctionRequest {
                    name: function_name.clone(),
                    role_arn: function_role.arn.clone(),
                    runtime: settings.function_runtime.clone(),
                    handler: settings.function_handler.clone(),
                    timeout_secs: settings.function_timeout_secs,
                    archive: package.archive,
                };
                let retry = self.config.timing.retry();
                let created = retry_transient("create_function", &retry, &*self.sleeper, |_| {
                    functions.create_function(&request)
                })?;
                (created, Disposition::Created)
            }
        };
        self.record(ResourceKind::Function, &function_name, &function_arn, disposition)?;

        let permission = InvokePermission {
            function_name: function_name.clone(),
            statement_id: INVOKE_STATEMENT_ID.to_string(),
            principal: AGENT_SERVICE_PRINCIPAL.to_string(),
            source_arn: agent.arn.clone(),
        };
        let disposition = tolerate_existing(functions.add_permission(&permission))?;
        self.record(
            ResourceKind::FunctionPermission,
            INVOKE_STATEMENT_ID,
            &function_arn,
            disposition,
        )?;

        let definition = ActionGroupDefinition {
            agent_id: agent.id.clone(),
            agent_version: DRAFT_VERSION.to_string(),
            name: settings.action_group_name.clone(),
            description: "Resets a user's password".to_string(),
            function_arn: function_arn.clone(),
            api_schema: schema.clone(),
        };
        let agents = &self.providers.agents;
        let existing = agents.find_action_group(&agent.id, DRAFT_VERSION, &definition.name)?;
        let (group_id, disposition) = match existing {
            Some(id) => (id, Disposition::Reused),
            None => match agents.create_action_group(&definition) {
                Ok(id) => (id, Disposition::Created),
                Err(e) if e.is_already_exists() => {
                    let id = agents
                        .find_action_group(&agent.id, DRAFT_VERSION, &definition.name)?
                        .ok_or_else(|| ProvisionError::NotFound {
                            resource: "action group".to_string(),
                            name: definition.name.clone(),
                        })?;
                    (id, Disposition::Reused)
                }
                Err(e) => return Err(e),
            },
        };
        info!(action_group = %definition.name, function = %function_name, disposition = ?disposition, "action group ready");
        self.record(ResourceKind::ActionGroup, &definition.name, &group_id, disposition)
    }

    /// Prepare the agent, wait for `PREPARED`, and point the alias at it.
    pub fn prepare_and_alias(&self, agent_id: &str) -> ProvisionResult<AgentAlias> {
        let agents = &self.providers.agents;

        let status = agents.prepare_agent(agent_id)?;
        debug!(agent_id = %agent_id, status = status.as_str(), "prepare requested");
        self.wait_for_agent(agent_id, true)?;

        let alias_name = &self.config.agent.alias_name;
        let (alias, disposition) = match agents.find_agent_alias(agent_id, alias_name)? {
            Some(existing) => (existing, Disposition::Reused),
            None => (agents.create_agent_alias(agent_id, alias_name)?, Disposition::Created),
        };
        info!(agent_id = %agent_id, alias = %alias.name, alias_id = %alias.id, "agent alias ready");
        self.record(ResourceKind::AgentAlias, &alias.name, &alias.arn, disposition)?;
        Ok(alias)
    }

    /// Poll the agent until it settles. With `require_prepared`, only
    /// `PREPARED` ends the wait; otherwise any non-transitional status does.
    fn wait_for_agent(&self, agent_id: &str, require_prepared: bool) -> ProvisionResult<AgentRecord> {
        let resource = format!("agent '{agent_id}'");
        let policy = self.config.timing.agent_poll();

        poll_until(&resource, &policy, &*self.sleeper, || {
            let agent = self.providers.agents.get_agent(agent_id)?;
            match agent.status {
                AgentStatus::Failed => Err(ProvisionError::fatal(
                    "provision agent",
                    format!("agent '{}' entered FAILED", agent.name),
                )),
                AgentStatus::Prepared => Ok(PollState::Ready(agent)),
                status if status.is_transitional() => {
                    Ok(PollState::Pending(status.as_str().to_string()))
                }
                status if require_prepared => Ok(PollState::Pending(status.as_str().to_string())),
                _ => Ok(PollState::Ready(agent)),
            }
        })
    }
}
