//! # ragstack-aws
//!
//! The provider ports backed by a real AWS account: S3, IAM, OpenSearch
//! Serverless, Lambda and the Bedrock agent and agent-runtime APIs.
//!
//! Credentials and region come from the SDK's default provider chain. Every
//! SDK failure is mapped onto the provisioning error taxonomy by error code,
//! so the orchestrator's retry and fetch-on-conflict behavior is the same
//! here as against the simulator.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ragstack_aws::AwsCloud;
//!
//! let cloud = AwsCloud::connect("123456789012", "us-east-1")?;
//! let provisioner = Provisioner::new(cloud.providers(), ledger, verifier, sleeper, config)?;
//! let outputs = provisioner.run()?;
//! ```

pub mod agents;
pub mod client;
pub mod error;
pub mod knowledge;
pub mod runtime;
pub mod storage;
pub mod vectors;

pub use client::AwsCloud;

#[cfg(test)]
mod tests {
    use aws_sdk_bedrockagent::types::{ChunkingStrategy as SdkChunkingStrategy, PromptType as SdkPromptType};
    use aws_sdk_s3::error::SdkError;
    use aws_smithy_types::error::ErrorMetadata;

    use ragstack_contracts::{
        agent::{AgentStatus, InferenceSettings, OverrideMode, PromptOverride, PromptOverrides, PromptType},
        error::ProvisionError,
        resource::{ChunkingPolicy, ChunkingStrategy, IngestionStatus},
    };

    use crate::agents::prompt_override_configuration;
    use crate::error::{classify, parse_status, wire_name};
    use crate::knowledge::chunking_configuration;
    use crate::storage::location_constraint;
    use crate::vectors::index_fault;

    fn service_error(code: &str, message: &str) -> SdkError<ErrorMetadata, ()> {
        SdkError::service_error(ErrorMetadata::builder().code(code).message(message).build(), ())
    }

    fn orchestration_prompt() -> PromptOverride {
        PromptOverride {
            prompt_type: PromptType::Orchestration,
            base_template: "$instruction$ $question$".to_string(),
            inference: InferenceSettings::default(),
            creation_mode: OverrideMode::Overridden,
            parser_mode: OverrideMode::Default,
            enabled: true,
        }
    }

    #[test]
    fn test_throttled_call_is_transient() {
        let err = classify(service_error("ThrottlingException", "slow down"), "create_role", "role", "kb-role");
        assert!(err.is_transient());
    }

    #[test]
    fn test_duplicate_entity_is_already_exists() {
        let err = classify(
            service_error("EntityAlreadyExists", "Role with name kb-role already exists."),
            "create_role",
            "role",
            "kb-role",
        );
        match err {
            ProvisionError::AlreadyExists { resource, name } => {
                assert_eq!(resource, "role");
                assert_eq!(name, "kb-role");
            }
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[test]
    fn test_access_denied_is_fatal() {
        let err = classify(service_error("AccessDenied", "not allowed"), "create_policy", "policy", "p");
        assert!(matches!(err, ProvisionError::Fatal { ref operation, .. } if operation == "create_policy"));
    }

    #[test]
    fn test_missing_entity_is_not_found() {
        let err = classify(service_error("NoSuchEntity", "gone"), "get_policy", "policy", "p");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = classify(SdkError::<ErrorMetadata, ()>::timeout_error("deadline"), "head_bucket", "bucket", "docs");
        assert!(err.is_transient());
    }

    #[test]
    fn test_index_fault_reads_engine_error_type() {
        let body = r#"{"error":{"type":"resource_already_exists_exception","reason":"index [kb-index] already exists"},"status":400}"#;
        let fault = index_fault(400, body);
        assert_eq!(fault.code, "resource_already_exists_exception");
        assert_eq!(fault.message, "index [kb-index] already exists");
        assert!(fault.classify("create_index", "index", "kb-index").is_already_exists());
    }

    #[test]
    fn test_index_fault_without_body_uses_status() {
        assert!(index_fault(429, "").classify("create_index", "index", "i").is_transient());
        assert!(index_fault(503, "upstream").classify("create_index", "index", "i").is_transient());

        let forbidden = index_fault(403, "Forbidden");
        assert_eq!(forbidden.code, "Http403");
        assert!(matches!(
            forbidden.classify("create_index", "index", "i"),
            ProvisionError::Fatal { .. }
        ));
    }

    #[test]
    fn test_us_east_1_bucket_has_no_location_constraint() {
        assert!(location_constraint("us-east-1").is_none());

        let config = location_constraint("eu-west-1").unwrap();
        assert_eq!(config.location_constraint().map(|c| c.as_str()), Some("eu-west-1"));
    }

    #[test]
    fn test_parse_status() {
        let status: AgentStatus = parse_status("get_agent", "NOT_PREPARED").unwrap();
        assert_eq!(status, AgentStatus::NotPrepared);

        let job: IngestionStatus = parse_status("get_ingestion_job", "COMPLETE").unwrap();
        assert!(job.is_success());

        let unknown = parse_status::<AgentStatus>("get_agent", "SLEEPING").unwrap_err();
        assert!(unknown.to_string().contains("SLEEPING"));
    }

    #[test]
    fn test_wire_name_matches_provider_spelling() {
        assert_eq!(wire_name(&PromptType::PreProcessing), "PRE_PROCESSING");
        assert_eq!(
            wire_name(&PromptType::KnowledgeBaseResponseGeneration),
            "KNOWLEDGE_BASE_RESPONSE_GENERATION"
        );
        assert_eq!(wire_name(&OverrideMode::Overridden), "OVERRIDDEN");
    }

    #[test]
    fn test_fixed_size_chunking_configuration() {
        let config = chunking_configuration("create_data_source", &ChunkingPolicy::default()).unwrap();
        assert_eq!(config.chunking_strategy(), &SdkChunkingStrategy::FixedSize);
        let fixed = config.fixed_size_chunking_configuration().unwrap();
        assert_eq!(fixed.max_tokens(), 512);
        assert_eq!(fixed.overlap_percentage(), 20);
    }

    #[test]
    fn test_no_chunking_configuration() {
        let policy = ChunkingPolicy {
            strategy: ChunkingStrategy::None,
            ..ChunkingPolicy::default()
        };
        let config = chunking_configuration("create_data_source", &policy).unwrap();
        assert_eq!(config.chunking_strategy(), &SdkChunkingStrategy::None);
        assert!(config.fixed_size_chunking_configuration().is_none());
    }

    #[test]
    fn test_prompt_overrides_carry_parser_function() {
        assert!(prompt_override_configuration("create_agent", &PromptOverrides::default())
            .unwrap()
            .is_none());

        let overrides = PromptOverrides {
            parser_function_arn: Some("arn:aws:lambda:us-east-1:123456789012:function:parser".to_string()),
            prompts: vec![orchestration_prompt()],
        };
        let config = prompt_override_configuration("create_agent", &overrides)
            .unwrap()
            .unwrap();
        assert_eq!(
            config.override_lambda(),
            Some("arn:aws:lambda:us-east-1:123456789012:function:parser")
        );
        let prompts = config.prompt_configurations();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_type(), Some(&SdkPromptType::Orchestration));
        assert_eq!(prompts[0].base_prompt_template(), Some("$instruction$ $question$"));
    }
}
