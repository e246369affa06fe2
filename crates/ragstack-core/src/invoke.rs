//! The query path: agent invocation and knowledge-base-only answers.
//!
//! `collect_reply` is the event-stream demultiplexer. Trace events are kept
//! in arrival order. Chunk bytes are concatenated in arrival order and
//! decoded once at the end, so a multi-byte character split across two
//! chunks still decodes.

use tracing::{debug, info};

use ragstack_contracts::{
    agent::{AgentStatus, AgentSummary},
    error::{ProvisionError, ProvisionResult},
    invocation::{AgentReply, GroundedAnswer, InvocationEvent, InvocationRequest},
};

use crate::traits::{AgentRuntime, AgentService};

/// Drain an invocation stream into one reply.
///
/// The first stream error aborts; nothing collected so far is returned.
pub fn collect_reply<I>(events: I) -> ProvisionResult<AgentReply>
where
    I: IntoIterator<Item = ProvisionResult<InvocationEvent>>,
{
    let mut bytes = Vec::new();
    let mut traces = Vec::new();

    for event in events {
        match event? {
            InvocationEvent::Trace(trace) => traces.push(trace),
            InvocationEvent::Chunk { bytes: chunk } => bytes.extend_from_slice(&chunk),
        }
    }

    let answer = String::from_utf8(bytes).map_err(|e| {
        ProvisionError::fatal("invoke agent", format!("response is not valid UTF-8: {e}"))
    })?;

    Ok(AgentReply { answer, traces })
}

/// Run one agent turn with tracing enabled.
pub fn invoke_agent(
    runtime: &dyn AgentRuntime,
    agent_id: &str,
    alias_id: &str,
    session_id: &str,
    prompt: &str,
) -> ProvisionResult<AgentReply> {
    let request = InvocationRequest {
        agent_id: agent_id.to_string(),
        alias_id: alias_id.to_string(),
        session_id: session_id.to_string(),
        prompt: prompt.to_string(),
        enable_trace: true,
    };

    debug!(agent_id = %agent_id, alias_id = %alias_id, session_id = %session_id, "invoking agent");
    let stream = runtime.invoke_agent(&request)?;
    let reply = collect_reply(stream)?;

    info!(
        agent_id = %agent_id,
        session_id = %session_id,
        trace_events = reply.traces.len(),
        answer_bytes = reply.answer.len(),
        "agent turn complete"
    );
    Ok(reply)
}

/// Answer `question` from the knowledge base alone.
pub fn ask_knowledge_base(
    runtime: &dyn AgentRuntime,
    knowledge_base_id: &str,
    model_arn: &str,
    question: &str,
) -> ProvisionResult<GroundedAnswer> {
    if question.trim().is_empty() {
        return Err(ProvisionError::ConfigError {
            reason: "question must not be empty".to_string(),
        });
    }
    let answer = runtime.retrieve_and_generate(knowledge_base_id, model_arn, question)?;
    info!(
        knowledge_base_id = %knowledge_base_id,
        citations = answer.citations.len(),
        "knowledge base answered"
    );
    Ok(answer)
}

/// Agents ready to be invoked.
pub fn prepared_agents(agents: &dyn AgentService) -> ProvisionResult<Vec<AgentSummary>> {
    Ok(agents
        .list_agents()?
        .into_iter()
        .filter(|a| a.status == AgentStatus::Prepared)
        .collect())
}
