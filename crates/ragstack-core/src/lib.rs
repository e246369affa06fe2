//! # ragstack-core
//!
//! The provisioning state machine for a retrieval-augmented-generation stack,
//! and the query path over it.
//!
//! This crate provides:
//! - The provider ports (`ObjectStore`, `VectorStore`, `AgentService`, ...)
//!   and the `ResourceLedger`, `SchemaVerifier` and `Sleeper` seams
//! - `poll_until` and `retry_transient`, the only two places the pipeline waits
//! - `StackConfig`, loaded from TOML and the environment
//! - The `Provisioner` that drives every step in dependency order
//! - `invoke_agent`, `ask_knowledge_base` and `prepared_agents`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ragstack_core::{Provisioner, Providers, StackConfig, traits::ThreadSleeper};
//!
//! let provisioner = Provisioner::new(providers, ledger, verifier, Box::new(ThreadSleeper), config)?;
//! let outputs = provisioner.run()?;
//! ```

pub mod config;
pub mod invoke;
pub mod package;
pub mod poll;
pub mod prompts;
pub mod provisioner;
pub mod retry;
pub mod traits;

pub use config::StackConfig;
pub use provisioner::{Providers, Provisioner, StackOutputs};

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use ragstack_contracts::{
        agent::PromptType,
        error::{ProvisionError, ProvisionResult},
        invocation::{InvocationEvent, TraceEvent},
    };

    use crate::config::StackConfig;
    use crate::invoke::collect_reply;
    use crate::package::FunctionPackage;
    use crate::poll::{poll_until, PollPolicy, PollState};
    use crate::prompts::default_prompt_overrides;
    use crate::retry::{retry_transient, RetryPolicy};
    use crate::traits::Sleeper;

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// A sleeper that records requested durations instead of sleeping.
    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Arc<Mutex<Vec<Duration>>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn transient() -> ProvisionError {
        ProvisionError::TransientProvider {
            operation: "test".to_string(),
            reason: "throttled".to_string(),
        }
    }

    fn trace(step: u32) -> InvocationEvent {
        InvocationEvent::Trace(TraceEvent {
            session_id: "s-1".to_string(),
            trace: serde_json::json!({ "step": step }),
        })
    }

    fn chunk(bytes: &[u8]) -> ProvisionResult<InvocationEvent> {
        Ok(InvocationEvent::Chunk {
            bytes: bytes.to_vec(),
        })
    }

    // ── poll_until ───────────────────────────────────────────────────────────

    /// The status check stops being called the moment it reports Ready.
    #[test]
    fn test_poll_returns_on_first_terminal() {
        let sleeper = RecordingSleeper::default();
        let mut script = vec!["CREATING", "CREATING", "ACTIVE", "ACTIVE"].into_iter();
        let mut calls = 0;

        let policy = PollPolicy::new(Duration::from_secs(5), 10);
        let result = poll_until("collection", &policy, &sleeper, || {
            calls += 1;
            match script.next() {
                Some("ACTIVE") => Ok(PollState::Ready(calls)),
                Some(s) => Ok(PollState::Pending(s.to_string())),
                None => panic!("check called after terminal status"),
            }
        })
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls, 3);
        // Sleeps happen only between checks.
        assert_eq!(*sleeper.sleeps.lock().unwrap(), vec![Duration::from_secs(5); 2]);
    }

    #[test]
    fn test_poll_times_out_after_cap() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let policy = PollPolicy::new(Duration::from_secs(1), 4);
        let result: ProvisionResult<()> = poll_until("ingestion job 'j1'", &policy, &sleeper, || {
            calls += 1;
            Ok(PollState::Pending("IN_PROGRESS".to_string()))
        });

        assert_eq!(calls, 4);
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 3);
        match result {
            Err(ProvisionError::ProvisioningTimeout {
                resource,
                attempts,
                last_status,
            }) => {
                assert_eq!(resource, "ingestion job 'j1'");
                assert_eq!(attempts, 4);
                assert_eq!(last_status, "IN_PROGRESS");
            }
            other => panic!("expected ProvisioningTimeout, got {:?}", other),
        }
    }

    #[test]
    fn test_poll_tolerates_transient_errors() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let policy = PollPolicy::new(Duration::ZERO, 5);
        let result = poll_until("agent", &policy, &sleeper, || {
            calls += 1;
            if calls < 3 {
                Err(transient())
            } else {
                Ok(PollState::Ready("PREPARED"))
            }
        })
        .unwrap();

        assert_eq!(result, "PREPARED");
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_poll_propagates_fatal_errors_immediately() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let policy = PollPolicy::new(Duration::ZERO, 5);
        let result: ProvisionResult<()> = poll_until("collection", &policy, &sleeper, || {
            calls += 1;
            Err(ProvisionError::fatal("get_collection", "access denied"))
        });

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(ProvisionError::Fatal { .. })));
    }

    #[test]
    fn test_poll_zero_cap_still_checks_once() {
        let sleeper = RecordingSleeper::default();
        let policy = PollPolicy::new(Duration::ZERO, 0);
        let result = poll_until("x", &policy, &sleeper, || Ok(PollState::Ready(7))).unwrap();
        assert_eq!(result, 7);
    }

    // ── retry_transient ──────────────────────────────────────────────────────

    #[test]
    fn test_retry_succeeds_after_transient_failures() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 7,
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(2000),
        };

        let result = retry_transient("create_knowledge_base", &policy, &sleeper, |attempt| {
            if attempt < 3 {
                Err(transient())
            } else {
                Ok(attempt)
            }
        })
        .unwrap();

        assert_eq!(result, 3);
        let sleeps = sleeper.sleeps.lock().unwrap();
        assert_eq!(sleeps.len(), 2);
        for delay in sleeps.iter() {
            assert!(*delay >= Duration::from_millis(1000) && *delay <= Duration::from_millis(2000));
        }
    }

    #[test]
    fn test_retry_does_not_retry_non_transient() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let result: ProvisionResult<()> =
            retry_transient("create_data_source", &RetryPolicy::default(), &sleeper, |_| {
                calls += 1;
                Err(ProvisionError::fatal("create_data_source", "bad bucket"))
            });

        assert_eq!(calls, 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
        assert!(matches!(result, Err(ProvisionError::Fatal { .. })));
    }

    /// When the budget is spent, the last attempt's error comes back.
    #[test]
    fn test_retry_returns_last_error_when_exhausted() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };

        let result: ProvisionResult<()> = retry_transient("op", &policy, &sleeper, |attempt| {
            Err(ProvisionError::TransientProvider {
                operation: "op".to_string(),
                reason: format!("attempt {attempt}"),
            })
        });

        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 2);
        match result {
            Err(ProvisionError::TransientProvider { reason, .. }) => assert_eq!(reason, "attempt 3"),
            other => panic!("expected TransientProvider, got {:?}", other),
        }
    }

    #[test]
    fn test_jittered_delay_stays_in_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..200 {
            let d = policy.jittered_delay();
            assert!(d >= policy.min_delay && d <= policy.max_delay);
        }
        let fixed = RetryPolicy {
            max_attempts: 1,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
        };
        assert_eq!(fixed.jittered_delay(), Duration::from_millis(50));
    }

    // ── collect_reply ────────────────────────────────────────────────────────

    #[test]
    fn test_demux_preserves_trace_order_and_concatenates_chunks() {
        let events = vec![
            Ok(trace(1)),
            chunk(b"Your password "),
            Ok(trace(2)),
            chunk(b"has been "),
            Ok(trace(3)),
            chunk(b"reset."),
        ];

        let reply = collect_reply(events).unwrap();
        assert_eq!(reply.answer, "Your password has been reset.");
        let steps: Vec<u64> = reply
            .traces
            .iter()
            .map(|t| t.trace["step"].as_u64().unwrap())
            .collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    /// A multi-byte character split across chunk boundaries decodes intact.
    #[test]
    fn test_demux_decodes_split_utf8() {
        let text = "naïve café ✓".as_bytes();
        let events: Vec<_> = text.chunks(3).map(chunk).collect();
        let reply = collect_reply(events).unwrap();
        assert_eq!(reply.answer, "naïve café ✓");
        assert!(reply.traces.is_empty());
    }

    #[test]
    fn test_demux_aborts_on_stream_error() {
        let events = vec![
            chunk(b"partial"),
            Err(ProvisionError::fatal("invoke agent", "stream reset")),
            chunk(b"never read"),
        ];
        match collect_reply(events) {
            Err(ProvisionError::Fatal { reason, .. }) => assert!(reason.contains("stream reset")),
            other => panic!("expected Fatal, got {:?}", other),
        }
    }

    #[test]
    fn test_demux_rejects_invalid_utf8() {
        let events = vec![chunk(&[0xff, 0xfe])];
        assert!(collect_reply(events).is_err());
    }

    #[test]
    fn test_demux_empty_stream_is_empty_reply() {
        let reply = collect_reply(Vec::new()).unwrap();
        assert!(reply.answer.is_empty());
        assert!(reply.traces.is_empty());
    }

    // ── StackConfig ──────────────────────────────────────────────────────────

    #[test]
    fn test_config_defaults() {
        let config = StackConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.data_prefix, "data/");
        assert_eq!(config.agent.foundation_model, "anthropic.claude-v2");
        assert_eq!(config.agent.idle_session_ttl_secs, 1800);
        assert_eq!(config.agent.alias_name, "latest");
        assert_eq!(config.timing.collection_max_polls, 90);
        assert_eq!(config.timing.retry().max_attempts, 7);
        assert_eq!(config.knowledge_base.chunking.max_tokens, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml_merges_with_defaults() {
        let toml = r#"
            region = "eu-west-1"
            name_prefix = "docs"

            [knowledge_base.chunking]
            max_tokens = 300
            overlap_percentage = 10

            [timing]
            collection_max_polls = 3
        "#;

        let config = StackConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.name_prefix, "docs");
        assert_eq!(config.knowledge_base.chunking.max_tokens, 300);
        assert_eq!(config.knowledge_base.chunking.overlap_percentage, 10);
        assert_eq!(config.timing.collection_max_polls, 3);
        // Untouched keys keep their defaults.
        assert_eq!(config.timing.ingestion_max_polls, 120);
        assert_eq!(config.knowledge_base.index.dimension, 1536);
    }

    #[test]
    fn test_config_toml_parse_error() {
        match StackConfig::from_toml_str("region = [[[") {
            Err(ProvisionError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse config TOML"), "got: {reason}");
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.toml");
        std::fs::write(&path, "account_id = \"999988887777\"\n").unwrap();

        let config = StackConfig::from_file(&path).unwrap();
        assert_eq!(config.require_account_id().unwrap(), "999988887777");

        assert!(StackConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_env_overlay_wins_and_ignores_empty_values() {
        let mut config = StackConfig::from_toml_str("region = \"eu-west-1\"").unwrap();
        config.apply_env(|key| match key {
            "AWS_ACCOUNT_ID" => Some("111122223333".to_string()),
            "REGION_NAME" => Some("ap-south-1".to_string()),
            "BEDROCK_AGENT_ID" => Some("AGENT1".to_string()),
            "KNOWLEDGE_BASE_ID" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.region, "ap-south-1");
        assert_eq!(config.require_account_id().unwrap(), "111122223333");
        assert_eq!(config.require_agent_id().unwrap(), "AGENT1");
        assert!(config.runtime.knowledge_base_id.is_none());
    }

    #[test]
    fn test_region_fallback_variable() {
        let mut config = StackConfig::default();
        config.apply_env(|key| (key == "AWS_REGION").then(|| "us-west-2".to_string()));
        assert_eq!(config.region, "us-west-2");
    }

    #[test]
    fn test_missing_required_values_name_the_variable() {
        let config = StackConfig::default();
        for (result, key) in [
            (config.require_account_id(), "AWS_ACCOUNT_ID"),
            (config.require_knowledge_base_id(), "KNOWLEDGE_BASE_ID"),
            (config.require_agent_id(), "BEDROCK_AGENT_ID"),
            (config.require_agent_alias_id(), "BEDROCK_AGENT_ALIAS_ID"),
        ] {
            match result {
                Err(ProvisionError::ConfigurationMissing { key: k }) => assert_eq!(k, key),
                other => panic!("expected ConfigurationMissing({key}), got {:?}", other),
            }
        }
    }

    #[test]
    fn test_bucket_name_is_derived_from_run() {
        let config = StackConfig::simulated();
        let run = config.resolve_run_id().unwrap();
        let bucket = config.bucket_name(&run).unwrap();
        assert_eq!(bucket, format!("ragstack-kb-{run}-us-east-1-123456789012"));

        let explicit = StackConfig {
            bucket_name: Some("my-docs".to_string()),
            ..StackConfig::default()
        };
        assert_eq!(explicit.bucket_name(&run).unwrap(), "my-docs");

        // Without an account id the derived name cannot be built.
        assert!(StackConfig::default().bucket_name(&run).is_err());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut config = StackConfig::default();
        config.knowledge_base.chunking.overlap_percentage = 0;
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.timing.retry_min_delay_ms = 5000;
        assert!(config.validate().is_err());

        let config = StackConfig {
            run_id: Some("Not Valid".to_string()),
            ..StackConfig::default()
        };
        assert!(config.resolve_run_id().is_err());
    }

    // ── FunctionPackage ──────────────────────────────────────────────────────

    #[test]
    fn test_package_from_source_is_readable_zip() {
        let package = FunctionPackage::from_source("index.mjs", b"export const handler = 1;").unwrap();
        assert_eq!(package.entry_name, "index.mjs");

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(package.archive)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_name("index.mjs").unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "export const handler = 1;");
    }

    #[test]
    fn test_package_from_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handler.py");
        std::fs::write(&path, "def handler(event, ctx): pass\n").unwrap();

        let package = FunctionPackage::from_file(&path).unwrap();
        assert_eq!(package.entry_name, "handler.py");
        assert!(FunctionPackage::from_file(&dir.path().join("missing.py")).is_err());
        assert!(FunctionPackage::from_source("../escape.js", b"").is_err());
    }

    // ── Prompt overrides ─────────────────────────────────────────────────────

    #[test]
    fn test_default_overrides_cover_three_stages() {
        use ragstack_contracts::agent::OverrideMode;

        let overrides = default_prompt_overrides(None);
        assert_eq!(overrides.prompts.len(), 3);
        let orchestration = overrides.template(PromptType::Orchestration).unwrap();
        assert!(orchestration.base_template.contains("$question$"));
        assert!(orchestration.base_template.contains("$instruction$"));
        assert_eq!(orchestration.creation_mode, OverrideMode::Overridden);
        assert_eq!(orchestration.parser_mode, OverrideMode::Default);
        assert_eq!(orchestration.inference.maximum_length, 2048);
        assert_eq!(orchestration.inference.stop_sequences, vec!["Human:".to_string()]);

        let post = overrides.template(PromptType::PostProcessing).unwrap();
        assert!(post.base_template.contains("$latest_response$"));
        assert!(post.base_template.contains("$responses$"));

        let with_parser = default_prompt_overrides(Some("arn:parser".to_string()));
        assert!(with_parser
            .prompts
            .iter()
            .all(|p| p.parser_mode == OverrideMode::Overridden));
    }
}
