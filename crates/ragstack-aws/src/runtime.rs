//! Query path: agent turns and knowledge-base answers.

use aws_sdk_bedrockagentruntime::types::{
    Citation as SdkCitation, KnowledgeBaseRetrieveAndGenerateConfiguration,
    ResponseStream, RetrieveAndGenerateConfiguration, RetrieveAndGenerateInput,
    RetrieveAndGenerateType,
};
use serde_json::Value;
use tracing::{debug, warn};

use ragstack_contracts::{
    error::ProvisionResult,
    invocation::{Citation, GroundedAnswer, InvocationEvent, InvocationRequest, TraceEvent},
};
use ragstack_core::traits::{AgentRuntime, EventStream};

use crate::client::AwsCloud;
use crate::error::{built, classify};

/// One citation per retrieved reference, in the order the provider cites them.
fn citations(cited: &[SdkCitation]) -> Vec<Citation> {
    cited
        .iter()
        .flat_map(|c| c.retrieved_references())
        .map(|reference| Citation {
            excerpt: reference
                .content()
                .map(|c| c.text().to_string())
                .unwrap_or_default(),
            source_uri: reference
                .location()
                .and_then(|l| l.s3_location())
                .and_then(|s3| s3.uri())
                .unwrap_or_default()
                .to_string(),
        })
        .collect()
}

impl AgentRuntime for AwsCloud {
    /// The stream is drained before returning. A failure part-way through
    /// ends the stream with an error item after the events already received.
    fn invoke_agent(&self, request: &InvocationRequest) -> ProvisionResult<EventStream> {
        const OP: &str = "invoke_agent";
        let events = self.block_on(async {
            let mut output = self
                .bedrock_runtime
                .invoke_agent()
                .agent_id(&request.agent_id)
                .agent_alias_id(&request.alias_id)
                .session_id(&request.session_id)
                .input_text(&request.prompt)
                .enable_trace(request.enable_trace)
                .send()
                .await
                .map_err(|e| classify(e, OP, "agent alias", &request.alias_id))?;

            let mut events: Vec<ProvisionResult<InvocationEvent>> = Vec::new();
            loop {
                match output.completion.recv().await {
                    Ok(Some(ResponseStream::Chunk(part))) => {
                        let bytes = part.bytes().map(|b| b.as_ref().to_vec()).unwrap_or_default();
                        events.push(Ok(InvocationEvent::Chunk { bytes }));
                    }
                    Ok(Some(ResponseStream::Trace(part))) => {
                        // Trace shapes are not serializable; keep their rendering.
                        let trace = part
                            .trace()
                            .map(|t| Value::String(format!("{t:?}")))
                            .unwrap_or(Value::Null);
                        events.push(Ok(InvocationEvent::Trace(TraceEvent {
                            session_id: part
                                .session_id()
                                .unwrap_or(&request.session_id)
                                .to_string(),
                            trace,
                        })));
                    }
                    Ok(Some(other)) => debug!(event = ?other, "skipping stream event"),
                    Ok(None) => break,
                    Err(e) => {
                        let err = classify(e, OP, "agent alias", &request.alias_id);
                        warn!(error = %err, received = events.len(), "agent stream failed");
                        events.push(Err(err));
                        break;
                    }
                }
            }
            Ok::<_, ragstack_contracts::error::ProvisionError>(events)
        })?;
        Ok(Box::new(events.into_iter()))
    }

    fn retrieve_and_generate(
        &self,
        knowledge_base_id: &str,
        model_arn: &str,
        question: &str,
    ) -> ProvisionResult<GroundedAnswer> {
        const OP: &str = "retrieve_and_generate";
        let input = built(OP, RetrieveAndGenerateInput::builder().text(question).build())?;
        let knowledge_base = built(
            OP,
            KnowledgeBaseRetrieveAndGenerateConfiguration::builder()
                .knowledge_base_id(knowledge_base_id)
                .model_arn(model_arn)
                .build(),
        )?;
        let configuration = built(
            OP,
            RetrieveAndGenerateConfiguration::builder()
                .r#type(RetrieveAndGenerateType::KnowledgeBase)
                .knowledge_base_configuration(knowledge_base)
                .build(),
        )?;

        let output = self
            .block_on(
                self.bedrock_runtime
                    .retrieve_and_generate()
                    .input(input)
                    .retrieve_and_generate_configuration(configuration)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "knowledge base", knowledge_base_id))?;

        Ok(GroundedAnswer {
            text: output
                .output()
                .map(|o| o.text().to_string())
                .unwrap_or_default(),
            citations: citations(output.citations()),
        })
    }
}
