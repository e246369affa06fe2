//! Query path of the simulated cloud.
//!
//! An agent turn is routed one of two ways. A prompt asking about a password
//! that names an email address goes to the agent's action group; anything
//! else is answered from the associated knowledge bases. The answer is
//! streamed back in small byte chunks with trace events around it, the way
//! the managed runtime interleaves them.

use serde_json::{json, Value};
use tracing::debug;

use ragstack_contracts::{
    agent::{ActionGroupDefinition, AgentStatus},
    error::{ProviderFault, ProvisionError, ProvisionResult},
    invocation::{Citation, GroundedAnswer, InvocationEvent, InvocationRequest, TraceEvent},
};
use ragstack_core::traits::{AgentRuntime, EventStream};

use crate::cloud::SimulatedCloud;
use crate::handler::invoke_action;
use crate::retrieval::{top_passages, Passage};

/// Bytes per streamed chunk. Small enough to split multi-byte characters.
pub const CHUNK_BYTES: usize = 16;

/// Passages retrieved per question.
pub const RETRIEVAL_LIMIT: usize = 3;

pub const NO_ANSWER: &str = "Sorry, I could not find an answer to that question.";

fn error(code: &str, message: impl Into<String>, op: &str, resource: &str, name: &str) -> ProvisionError {
    ProviderFault::new(code, message).classify(op, resource, name)
}

/// What the orchestration step decided to do with a prompt.
enum Route<'a> {
    Action { group: &'a ActionGroupDefinition, email: String },
    Knowledge,
}

fn route<'a>(prompt: &str, groups: &'a [ActionGroupDefinition]) -> Route<'a> {
    if !prompt.to_lowercase().contains("password") {
        return Route::Knowledge;
    }
    let email = prompt
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation() && c != '@'))
        .find(|w| w.contains('@'));
    match (email, groups.first()) {
        (Some(email), Some(group)) => Route::Action {
            group,
            email: email.to_string(),
        },
        _ => Route::Knowledge,
    }
}

fn compose_answer(hits: &[&Passage]) -> String {
    if hits.is_empty() {
        return NO_ANSWER.to_string();
    }
    hits.iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn references(hits: &[&Passage]) -> Value {
    Value::Array(
        hits.iter()
            .map(|p| {
                json!({
                    "content": { "text": p.text },
                    "location": { "s3Location": { "uri": p.source_uri } },
                })
            })
            .collect(),
    )
}

impl AgentRuntime for SimulatedCloud {
    fn invoke_agent(&self, request: &InvocationRequest) -> ProvisionResult<EventStream> {
        const OP: &str = "invoke_agent";
        if request.prompt.trim().is_empty() {
            return Err(error("ValidationException", "input text must not be empty", OP, "", ""));
        }

        let (instruction, groups, passages, stream_error_after) = {
            let state = self.enter(OP)?;
            let alias_known = state
                .aliases
                .iter()
                .any(|a| a.id == request.alias_id && a.agent_id == request.agent_id);
            if !alias_known {
                return Err(error(
                    "ResourceNotFoundException",
                    "alias not found",
                    OP,
                    "agent alias",
                    &request.alias_id,
                ));
            }
            let entry = state.agent(&request.agent_id).ok_or_else(|| {
                error("ResourceNotFoundException", "agent not found", OP, "agent", &request.agent_id)
            })?;
            if entry.record.status != AgentStatus::Prepared {
                return Err(error(
                    "ValidationException",
                    format!("agent is {}", entry.record.status.as_str()),
                    OP,
                    "agent",
                    &request.agent_id,
                ));
            }
            let passages: Vec<(String, Vec<Passage>)> = entry
                .knowledge_bases
                .iter()
                .map(|kb| (kb.clone(), state.passages.get(kb).cloned().unwrap_or_default()))
                .collect();
            (
                entry.instruction.clone(),
                entry.action_groups.clone(),
                passages,
                state.stream_error_after,
            )
        };

        let mut traces = vec![json!({
            "preProcessingTrace": {
                "modelInvocationInput": { "text": request.prompt, "instruction": instruction },
                "parsedResponse": { "isValid": true },
            }
        })];

        let answer = match route(&request.prompt, &groups) {
            Route::Action { group, email } => {
                let response = invoke_action(&group.api_schema, "/reset", "post", &json!({ "email": email }))?;
                traces.push(json!({
                    "orchestrationTrace": {
                        "invocationInput": {
                            "actionGroupInvocationInput": {
                                "actionGroupName": group.name,
                                "apiPath": "/reset",
                                "verb": "post",
                            }
                        },
                        "observation": { "actionGroupInvocationOutput": { "text": response.to_string() } },
                    }
                }));
                response
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            }
            Route::Knowledge => {
                let mut answer = NO_ANSWER.to_string();
                for (kb_id, kb_passages) in &passages {
                    let hits = top_passages(kb_passages, &request.prompt, RETRIEVAL_LIMIT);
                    traces.push(json!({
                        "orchestrationTrace": {
                            "invocationInput": {
                                "knowledgeBaseLookupInput": { "knowledgeBaseId": kb_id, "text": request.prompt }
                            },
                            "observation": {
                                "knowledgeBaseLookupOutput": { "retrievedReferences": references(&hits) }
                            },
                        }
                    }));
                    if !hits.is_empty() {
                        answer = compose_answer(&hits);
                        break;
                    }
                }
                answer
            }
        };

        traces.push(json!({
            "postProcessingTrace": { "modelInvocationOutput": { "parsedResponse": { "text": answer } } }
        }));

        let mut events: Vec<ProvisionResult<InvocationEvent>> = Vec::new();
        if request.enable_trace {
            events.extend(traces.into_iter().map(|trace| {
                Ok(InvocationEvent::Trace(TraceEvent {
                    session_id: request.session_id.clone(),
                    trace,
                }))
            }));
        }
        // Keep the post-processing trace after the answer.
        let post = if request.enable_trace { events.pop() } else { None };
        events.extend(answer.as_bytes().chunks(CHUNK_BYTES).map(|c| {
            Ok(InvocationEvent::Chunk {
                bytes: c.to_vec(),
            })
        }));
        events.extend(post);

        if let Some(limit) = stream_error_after {
            events.truncate(limit);
            events.push(Err(error(
                "ModelStreamErrorException",
                "event stream interrupted",
                OP,
                "",
                "",
            )));
        }

        debug!(
            agent_id = %request.agent_id,
            session_id = %request.session_id,
            events = events.len(),
            "simulated invocation"
        );
        Ok(Box::new(events.into_iter()))
    }

    fn retrieve_and_generate(
        &self,
        knowledge_base_id: &str,
        model_arn: &str,
        question: &str,
    ) -> ProvisionResult<GroundedAnswer> {
        const OP: &str = "retrieve_and_generate";
        let state = self.enter(OP)?;
        if !model_arn.contains(":foundation-model/") {
            return Err(error(
                "ValidationException",
                format!("{model_arn} is not a foundation model"),
                OP,
                "",
                "",
            ));
        }
        if state.knowledge_base(knowledge_base_id).is_none() {
            return Err(error(
                "ResourceNotFoundException",
                "knowledge base not found",
                OP,
                "knowledge base",
                knowledge_base_id,
            ));
        }

        let passages = state
            .passages
            .get(knowledge_base_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let hits = top_passages(passages, question, RETRIEVAL_LIMIT);
        Ok(GroundedAnswer {
            text: compose_answer(&hits),
            citations: hits
                .iter()
                .map(|p| Citation {
                    excerpt: p.text.clone(),
                    source_uri: p.source_uri.clone(),
                })
                .collect(),
        })
    }
}
