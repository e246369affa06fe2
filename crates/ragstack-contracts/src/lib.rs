//! # ragstack-contracts
//!
//! Shared types and error taxonomy for the ragstack provisioning pipeline.
//!
//! Every crate in the workspace imports from here. Nothing in this crate
//! talks to a provider; it only defines the shapes that cross the ports.

pub mod agent;
pub mod arn;
pub mod error;
pub mod invocation;
pub mod naming;
pub mod record;
pub mod resource;
pub mod verify;

#[cfg(test)]
mod tests {
    use super::*;
    use agent::{AgentStatus, ApiSchema, PromptOverrides, PromptType};
    use error::{ProviderFault, ProvisionError};
    use invocation::{InvocationEvent, TraceEvent};
    use naming::{ResourceNames, RolePurpose, RunId};
    use record::{Disposition, ResourceKind, ResourceRecord};
    use resource::{
        ChunkingPolicy, ChunkingStrategy, CollectionStatus, IndexSchema, IngestionStatus,
        VectorCollection,
    };

    // ── ProvisionError display messages ──────────────────────────────────────

    #[test]
    fn error_timeout_display_names_resource_and_status() {
        let err = ProvisionError::ProvisioningTimeout {
            resource: "collection 'docs-a1'".to_string(),
            attempts: 90,
            last_status: "CREATING".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("docs-a1"));
        assert!(msg.contains("90 status checks"));
        assert!(msg.contains("CREATING"));
    }

    #[test]
    fn error_terminal_job_failure_display() {
        let err = ProvisionError::TerminalJobFailure {
            job_id: "job-1".to_string(),
            status: "FAILED".to_string(),
            reasons: "embedding model throttled".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("job-1"));
        assert!(msg.contains("FAILED"));
        assert!(msg.contains("embedding model throttled"));
    }

    #[test]
    fn error_configuration_missing_display() {
        let err = ProvisionError::ConfigurationMissing {
            key: "AWS_ACCOUNT_ID".to_string(),
        };
        assert!(err.to_string().contains("AWS_ACCOUNT_ID"));
    }

    #[test]
    fn error_predicates() {
        assert!(ProvisionError::TransientProvider {
            operation: "op".to_string(),
            reason: "slow".to_string(),
        }
        .is_transient());
        assert!(ProvisionError::fatal("op", "bad").to_string().contains("op failed"));
        assert!(!ProvisionError::fatal("op", "bad").is_transient());
        assert!(ProvisionError::AlreadyExists {
            resource: "role".to_string(),
            name: "r".to_string(),
        }
        .is_already_exists());
        assert!(ProvisionError::NotFound {
            resource: "role".to_string(),
            name: "r".to_string(),
        }
        .is_not_found());
    }

    // ── ProviderFault classification ─────────────────────────────────────────

    #[test]
    fn fault_conflict_codes_classify_as_already_exists() {
        for code in [
            "EntityAlreadyExists",
            "ConflictException",
            "BucketAlreadyOwnedByYou",
            "resource_already_exists_exception",
        ] {
            let err = ProviderFault::new(code, "exists").classify("create", "thing", "n");
            assert!(err.is_already_exists(), "{code} should be already-exists");
        }
    }

    #[test]
    fn fault_missing_codes_classify_as_not_found() {
        for code in ["NoSuchEntity", "NoSuchBucket", "ResourceNotFoundException"] {
            let err = ProviderFault::new(code, "gone").classify("get", "thing", "n");
            assert!(err.is_not_found(), "{code} should be not-found");
        }
    }

    #[test]
    fn fault_throttling_is_transient() {
        let err = ProviderFault::new("ThrottlingException", "rate exceeded")
            .classify("create_knowledge_base", "knowledge base", "kb");
        assert!(err.is_transient());
        assert!(err.to_string().contains("create_knowledge_base"));
    }

    #[test]
    fn fault_role_propagation_validation_is_transient() {
        let err = ProviderFault::new(
            "ValidationException",
            "The provided role cannot be assumed by the service",
        )
        .classify("create_knowledge_base", "knowledge base", "kb");
        assert!(err.is_transient());
    }

    #[test]
    fn fault_other_validation_is_fatal() {
        let err = ProviderFault::new("ValidationException", "name too long")
            .classify("create_collection", "collection", "c");
        assert!(matches!(err, ProvisionError::Fatal { .. }));
        assert!(err.to_string().contains("name too long"));
    }

    #[test]
    fn fault_unknown_code_is_fatal() {
        let err = ProviderFault::new("AccessDenied", "nope").classify("put_object", "object", "k");
        assert!(matches!(err, ProvisionError::Fatal { .. }));
    }

    // ── Resource types ───────────────────────────────────────────────────────

    #[test]
    fn collection_status_transitional() {
        assert!(CollectionStatus::Creating.is_transitional());
        assert!(CollectionStatus::Deleting.is_transitional());
        assert!(!CollectionStatus::Active.is_transitional());
        assert!(!CollectionStatus::Failed.is_transitional());
    }

    #[test]
    fn collection_status_serializes_screaming_case() {
        let json = serde_json::to_string(&CollectionStatus::Active).unwrap();
        assert_eq!(json, "\"ACTIVE\"");
    }

    #[test]
    fn collection_host_strips_scheme() {
        let mut collection = VectorCollection {
            id: "abc123".to_string(),
            name: "docs-a1".to_string(),
            arn: "arn:aws:aoss:us-east-1:111122223333:collection/abc123".to_string(),
            status: CollectionStatus::Active,
            endpoint: Some("https://abc123.us-east-1.aoss.amazonaws.com".to_string()),
        };
        assert_eq!(collection.host("us-east-1"), "abc123.us-east-1.aoss.amazonaws.com");

        collection.endpoint = None;
        assert_eq!(collection.host("eu-west-1"), "abc123.eu-west-1.aoss.amazonaws.com");
    }

    #[test]
    fn index_schema_default_body() {
        let body = IndexSchema::default().to_request_body();
        assert_eq!(body["settings"]["index.knn"], "true");
        let vector = &body["mappings"]["properties"]["vector_field"];
        assert_eq!(vector["type"], "knn_vector");
        assert_eq!(vector["dimension"], 1536);
        assert_eq!(vector["method"]["name"], "hnsw");
        assert_eq!(vector["method"]["engine"], "faiss");
        assert_eq!(vector["method"]["space_type"], "l2");
        assert_eq!(body["mappings"]["properties"]["text"]["type"], "text");
        assert_eq!(body["mappings"]["properties"]["text-metadata"]["type"], "text");
    }

    #[test]
    fn index_schema_rejects_zero_dimension_and_duplicate_fields() {
        let mut schema = IndexSchema {
            dimension: 0,
            ..IndexSchema::default()
        };
        assert!(schema.validate().is_err());

        schema.dimension = 1024;
        assert!(schema.validate().is_ok());

        schema.text_field = schema.vector_field.clone();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn chunking_policy_defaults_and_bounds() {
        let policy = ChunkingPolicy::default();
        assert_eq!(policy.strategy, ChunkingStrategy::FixedSize);
        assert_eq!(policy.max_tokens, 512);
        assert_eq!(policy.overlap_percentage, 20);
        assert!(policy.validate().is_ok());

        let no_overlap = ChunkingPolicy {
            overlap_percentage: 0,
            ..ChunkingPolicy::default()
        };
        assert!(no_overlap.validate().is_err());

        let full_overlap = ChunkingPolicy {
            overlap_percentage: 100,
            ..ChunkingPolicy::default()
        };
        assert!(full_overlap.validate().is_err());

        let unchunked = ChunkingPolicy {
            strategy: ChunkingStrategy::None,
            max_tokens: 0,
            overlap_percentage: 0,
        };
        assert!(unchunked.validate().is_ok());
    }

    #[test]
    fn ingestion_status_terminals() {
        assert!(IngestionStatus::Complete.is_terminal());
        assert!(IngestionStatus::Complete.is_success());
        assert!(IngestionStatus::Failed.is_terminal());
        assert!(!IngestionStatus::Failed.is_success());
        assert!(IngestionStatus::Stopped.is_terminal());
        assert!(!IngestionStatus::Stopping.is_terminal());
        assert!(!IngestionStatus::InProgress.is_terminal());
        assert_eq!(IngestionStatus::InProgress.as_str(), "IN_PROGRESS");
    }

    #[test]
    fn agent_status_transitional() {
        assert!(AgentStatus::Preparing.is_transitional());
        assert!(AgentStatus::Creating.is_transitional());
        assert!(!AgentStatus::Prepared.is_transitional());
        assert!(!AgentStatus::NotPrepared.is_transitional());
        assert_eq!(AgentStatus::NotPrepared.as_str(), "NOT_PREPARED");
    }

    // ── Naming ───────────────────────────────────────────────────────────────

    #[test]
    fn run_id_validation() {
        assert!(RunId::parse("a1b2").is_ok());
        assert!(RunId::parse("run-7").is_ok());
        assert!(RunId::parse("").is_err());
        assert!(RunId::parse("Upper").is_err());
        assert!(RunId::parse("-lead").is_err());
        assert!(RunId::parse("trail-").is_err());
        assert!(RunId::parse("waytoolongrunid").is_err());
    }

    #[test]
    fn run_id_generate_is_valid_and_unique() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
        assert!(RunId::parse(a.as_str()).is_ok());
    }

    #[test]
    fn resource_names_are_deterministic() {
        let run = RunId::parse("a1b2").unwrap();
        let names = ResourceNames::for_run("docs", &run).unwrap();
        assert_eq!(names.collection(), "docs-a1b2");
        assert_eq!(names.index(), "docs-index-a1b2");
        assert_eq!(names.knowledge_base(), "docs-kb-a1b2");
        assert_eq!(names.data_source(), "docs-kb-ds-a1b2");
        assert_eq!(names.role(RolePurpose::Agent), "docs-agent-role-a1b2");
        assert_eq!(
            names.policy(RolePurpose::KnowledgeBase, "model"),
            "docs-kb-model-a1b2"
        );
        assert_eq!(names, ResourceNames::for_run("docs", &run).unwrap());
    }

    #[test]
    fn collection_scoped_names_fit_provider_limit() {
        let run = RunId::parse("abcdefghijkl").unwrap();
        let names = ResourceNames::for_run("abcdefghij", &run).unwrap();
        for name in [
            names.collection(),
            names.encryption_policy(),
            names.network_policy(),
            names.access_policy(),
        ] {
            assert!(name.len() <= 32, "{name} exceeds 32 characters");
        }
    }

    // ── Agent types ──────────────────────────────────────────────────────────

    #[test]
    fn password_reset_schema_shape() {
        let schema = ApiSchema::password_reset();
        assert_eq!(schema.document["openapi"], "3.0.0");
        assert_eq!(schema.document["paths"]["/reset"]["post"]["operationId"], "reset");
        let request = schema.component("ResetRequest").unwrap();
        assert_eq!(request["required"][0], "email");
        assert!(schema.component("Missing").is_none());

        let reparsed: serde_json::Value = serde_json::from_str(&schema.payload()).unwrap();
        assert_eq!(reparsed, schema.document);
    }

    #[test]
    fn prompt_overrides_lookup_by_type() {
        let overrides = PromptOverrides::default();
        assert!(overrides.template(PromptType::Orchestration).is_none());
    }

    // ── Invocation events and records ────────────────────────────────────────

    #[test]
    fn invocation_event_is_tagged() {
        let event = InvocationEvent::Trace(TraceEvent {
            session_id: "s".to_string(),
            trace: serde_json::json!({"step": 1}),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "trace");

        let chunk = serde_json::to_value(InvocationEvent::Chunk { bytes: vec![104] }).unwrap();
        assert_eq!(chunk["kind"], "chunk");
    }

    #[test]
    fn resource_record_serializes_kebab_kind() {
        let record = ResourceRecord::new(
            ResourceKind::KnowledgeBase,
            "docs-kb-a1b2",
            "KB123",
            Disposition::Created,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "knowledge-base");
        assert_eq!(json["disposition"], "created");
        assert_eq!(ResourceKind::AgentAlias.to_string(), "agent-alias");
    }
}
