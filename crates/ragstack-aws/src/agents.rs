//! Action-handler functions and agents.

use aws_sdk_bedrockagent::types::{
    ActionGroupExecutor, Agent as SdkAgent, AgentAlias as SdkAgentAlias,
    ApiSchema as SdkApiSchema, CreationMode, InferenceConfiguration, KnowledgeBaseState,
    PromptConfiguration, PromptOverrideConfiguration, PromptState,
    PromptType as SdkPromptType,
};
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{FunctionCode, Runtime};
use tracing::debug;

use ragstack_contracts::{
    agent::{
        ActionGroupDefinition, AgentAlias, AgentDefinition, AgentRecord, AgentStatus,
        AgentSummary, FunctionRequest, InvokePermission, PromptOverride, PromptOverrides,
    },
    error::ProvisionResult,
};
use ragstack_core::traits::{AgentService, FunctionService};

use crate::client::AwsCloud;
use crate::error::{built, classify, missing_field, parse_status, wire_name};

fn agent_record(op: &str, agent: &SdkAgent) -> ProvisionResult<AgentRecord> {
    Ok(AgentRecord {
        id: agent.agent_id().to_string(),
        arn: agent.agent_arn().to_string(),
        name: agent.agent_name().to_string(),
        status: parse_status(op, agent.agent_status().as_str())?,
    })
}

fn agent_alias(alias: &SdkAgentAlias) -> AgentAlias {
    AgentAlias {
        id: alias.agent_alias_id().to_string(),
        arn: alias.agent_alias_arn().to_string(),
        name: alias.agent_alias_name().to_string(),
        agent_id: alias.agent_id().to_string(),
    }
}

fn prompt_configuration(prompt: &PromptOverride) -> PromptConfiguration {
    let inference = &prompt.inference;
    PromptConfiguration::builder()
        .prompt_type(SdkPromptType::from(wire_name(&prompt.prompt_type).as_str()))
        .prompt_creation_mode(CreationMode::from(wire_name(&prompt.creation_mode).as_str()))
        .parser_mode(CreationMode::from(wire_name(&prompt.parser_mode).as_str()))
        .prompt_state(if prompt.enabled {
            PromptState::Enabled
        } else {
            PromptState::Disabled
        })
        .base_prompt_template(&prompt.base_template)
        .inference_configuration(
            InferenceConfiguration::builder()
                .maximum_length(inference.maximum_length as i32)
                .set_stop_sequences(Some(inference.stop_sequences.clone()))
                .temperature(inference.temperature)
                .top_k(inference.top_k as i32)
                .top_p(inference.top_p)
                .build(),
        )
        .build()
}

/// Prompt overrides as sent to the provider. `None` when there are none.
pub fn prompt_override_configuration(
    op: &str,
    overrides: &PromptOverrides,
) -> ProvisionResult<Option<PromptOverrideConfiguration>> {
    if overrides.prompts.is_empty() {
        return Ok(None);
    }
    let configuration = PromptOverrideConfiguration::builder()
        .set_prompt_configurations(Some(
            overrides.prompts.iter().map(prompt_configuration).collect(),
        ))
        .set_override_lambda(overrides.parser_function_arn.clone())
        .build();
    built(op, configuration).map(Some)
}

// ── FunctionService ──────────────────────────────────────────────────────────

impl FunctionService for AwsCloud {
    fn create_function(&self, request: &FunctionRequest) -> ProvisionResult<String> {
        const OP: &str = "create_function";
        let output = self
            .block_on(
                self.lambda
                    .create_function()
                    .function_name(&request.name)
                    .role(&request.role_arn)
                    .runtime(Runtime::from(request.runtime.as_str()))
                    .handler(&request.handler)
                    .timeout(request.timeout_secs as i32)
                    .code(
                        FunctionCode::builder()
                            .zip_file(Blob::new(request.archive.clone()))
                            .build(),
                    )
                    .send(),
            )
            .map_err(|e| classify(e, OP, "function", &request.name))?;
        output
            .function_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field(OP, "function ARN"))
    }

    fn find_function(&self, name: &str) -> ProvisionResult<Option<String>> {
        const OP: &str = "get_function";
        match self.block_on(self.lambda.get_function().function_name(name).send()) {
            Ok(output) => Ok(output
                .configuration()
                .and_then(|c| c.function_arn())
                .map(str::to_string)),
            Err(e) => {
                let err = classify(e, OP, "function", name);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn add_permission(&self, permission: &InvokePermission) -> ProvisionResult<()> {
        self.block_on(
            self.lambda
                .add_permission()
                .function_name(&permission.function_name)
                .statement_id(&permission.statement_id)
                .action("lambda:InvokeFunction")
                .principal(&permission.principal)
                .source_arn(&permission.source_arn)
                .send(),
        )
        .map_err(|e| classify(e, "add_permission", "statement", &permission.statement_id))?;
        Ok(())
    }
}

// ── AgentService ─────────────────────────────────────────────────────────────

impl AgentService for AwsCloud {
    fn find_agent(&self, name: &str) -> ProvisionResult<Option<AgentRecord>> {
        let found = self
            .list_agents()?
            .into_iter()
            .find(|summary| summary.name == name);
        match found {
            Some(summary) => self.get_agent(&summary.id).map(Some),
            None => Ok(None),
        }
    }

    fn create_agent(&self, definition: &AgentDefinition) -> ProvisionResult<AgentRecord> {
        const OP: &str = "create_agent";
        let overrides = prompt_override_configuration(OP, &definition.prompt_overrides)?;
        let output = self
            .block_on(
                self.bedrock
                    .create_agent()
                    .agent_name(&definition.name)
                    .description(&definition.description)
                    .agent_resource_role_arn(&definition.role_arn)
                    .foundation_model(&definition.foundation_model)
                    .instruction(&definition.instruction)
                    .idle_session_ttl_in_seconds(definition.idle_session_ttl_secs as i32)
                    .set_prompt_override_configuration(overrides)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "agent", &definition.name))?;
        let agent = output.agent().ok_or_else(|| missing_field(OP, "agent"))?;
        agent_record(OP, agent)
    }

    fn get_agent(&self, agent_id: &str) -> ProvisionResult<AgentRecord> {
        const OP: &str = "get_agent";
        let output = self
            .block_on(self.bedrock.get_agent().agent_id(agent_id).send())
            .map_err(|e| classify(e, OP, "agent", agent_id))?;
        let agent = output.agent().ok_or_else(|| missing_field(OP, "agent"))?;
        agent_record(OP, agent)
    }

    fn create_action_group(&self, definition: &ActionGroupDefinition) -> ProvisionResult<String> {
        const OP: &str = "create_agent_action_group";
        let output = self
            .block_on(
                self.bedrock
                    .create_agent_action_group()
                    .agent_id(&definition.agent_id)
                    .agent_version(&definition.agent_version)
                    .action_group_name(&definition.name)
                    .description(&definition.description)
                    .action_group_executor(ActionGroupExecutor::Lambda(
                        definition.function_arn.clone(),
                    ))
                    .api_schema(SdkApiSchema::Payload(definition.api_schema.payload()))
                    .send(),
            )
            .map_err(|e| classify(e, OP, "action group", &definition.name))?;
        let group = output
            .agent_action_group()
            .ok_or_else(|| missing_field(OP, "action group"))?;
        Ok(group.action_group_id().to_string())
    }

    fn find_action_group(
        &self,
        agent_id: &str,
        agent_version: &str,
        name: &str,
    ) -> ProvisionResult<Option<String>> {
        const OP: &str = "list_agent_action_groups";
        let output = self
            .block_on(
                self.bedrock
                    .list_agent_action_groups()
                    .agent_id(agent_id)
                    .agent_version(agent_version)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "agent", agent_id))?;
        Ok(output
            .action_group_summaries()
            .iter()
            .find(|g| g.action_group_name() == name)
            .map(|g| g.action_group_id().to_string()))
    }

    fn associate_knowledge_base(
        &self,
        agent_id: &str,
        agent_version: &str,
        knowledge_base_id: &str,
        description: &str,
    ) -> ProvisionResult<()> {
        self.block_on(
            self.bedrock
                .associate_agent_knowledge_base()
                .agent_id(agent_id)
                .agent_version(agent_version)
                .knowledge_base_id(knowledge_base_id)
                .description(description)
                .knowledge_base_state(KnowledgeBaseState::Enabled)
                .send(),
        )
        .map_err(|e| {
            classify(e, "associate_agent_knowledge_base", "association", knowledge_base_id)
        })?;
        Ok(())
    }

    fn prepare_agent(&self, agent_id: &str) -> ProvisionResult<AgentStatus> {
        const OP: &str = "prepare_agent";
        let output = self
            .block_on(self.bedrock.prepare_agent().agent_id(agent_id).send())
            .map_err(|e| classify(e, OP, "agent", agent_id))?;
        parse_status(OP, output.agent_status().as_str())
    }

    fn find_agent_alias(&self, agent_id: &str, name: &str) -> ProvisionResult<Option<AgentAlias>> {
        const OP: &str = "list_agent_aliases";
        let output = self
            .block_on(self.bedrock.list_agent_aliases().agent_id(agent_id).send())
            .map_err(|e| classify(e, OP, "agent alias", name))?;
        let Some(summary) = output
            .agent_alias_summaries()
            .iter()
            .find(|a| a.agent_alias_name() == name)
        else {
            return Ok(None);
        };

        const GET: &str = "get_agent_alias";
        let detail = self
            .block_on(
                self.bedrock
                    .get_agent_alias()
                    .agent_id(agent_id)
                    .agent_alias_id(summary.agent_alias_id())
                    .send(),
            )
            .map_err(|e| classify(e, GET, "agent alias", name))?;
        let alias = detail
            .agent_alias()
            .ok_or_else(|| missing_field(GET, "agent alias"))?;
        Ok(Some(agent_alias(alias)))
    }

    fn create_agent_alias(&self, agent_id: &str, name: &str) -> ProvisionResult<AgentAlias> {
        const OP: &str = "create_agent_alias";
        let output = self
            .block_on(
                self.bedrock
                    .create_agent_alias()
                    .agent_id(agent_id)
                    .agent_alias_name(name)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "agent alias", name))?;
        let alias = output
            .agent_alias()
            .ok_or_else(|| missing_field(OP, "agent alias"))?;
        debug!(agent_id = %agent_id, alias_id = %alias.agent_alias_id(), "alias created");
        Ok(agent_alias(alias))
    }

    fn list_agents(&self) -> ProvisionResult<Vec<AgentSummary>> {
        const OP: &str = "list_agents";
        let mut agents = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .block_on(self.bedrock.list_agents().set_next_token(next_token.take()).send())
                .map_err(|e| classify(e, OP, "agent", ""))?;
            for summary in page.agent_summaries() {
                agents.push(AgentSummary {
                    id: summary.agent_id().to_string(),
                    name: summary.agent_name().to_string(),
                    status: parse_status(OP, summary.agent_status().as_str())?,
                });
            }
            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(agents),
            }
        }
    }
}
