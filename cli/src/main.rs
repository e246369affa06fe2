//! ragstack command line.
//!
//! Provisions the retrieval-augmented-generation stack and runs the query
//! path against it. Commands talk to AWS through the default credential
//! chain; `--simulate` runs them against the in-process provider instead,
//! seeded with a demo stack. Configuration comes from the environment and an
//! optional TOML file named by `RAGSTACK_CONFIG`.
//!
//! Usage:
//!   ragstack provision
//!   ragstack ask "Reset the password for ana@example.com"
//!   ragstack query "How often do passwords expire?"
//!   ragstack --simulate agents

use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ragstack_aws::AwsCloud;
use ragstack_contracts::{arn, error::ProvisionResult, invocation::Citation};
use ragstack_core::{
    config::TimingSettings,
    invoke::{ask_knowledge_base, invoke_agent, prepared_agents},
    traits::{AgentRuntime, AgentService, ThreadSleeper},
    Providers, Provisioner, StackConfig,
};
use ragstack_ledger::{compare_runs, InMemoryLedger, LedgerLog};
use ragstack_sim::{seed_demo_stack, SimulatedCloud};
use ragstack_verify::engine::OpenApiVerifier;

// ── CLI definition ───────────────────────────────────────────────────────────

/// Provision a knowledge base and agent, then ask them questions.
#[derive(Parser)]
#[command(
    name = "ragstack",
    about = "Provision and query a retrieval-augmented-generation stack",
    long_about = "Creates storage, roles, a vector collection and index, a knowledge base\n\
                  with its data source and ingestion job, and an agent with an action\n\
                  group and alias. Then answers questions through the agent or the\n\
                  knowledge base directly."
)]
struct Cli {
    /// Run against the in-process simulated provider instead of AWS.
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision the full stack, reusing whatever already exists.
    Provision,
    /// Run one agent turn (needs BEDROCK_AGENT_ID and BEDROCK_AGENT_ALIAS_ID).
    Ask { prompt: String },
    /// Answer from the knowledge base alone, with citations (needs KNOWLEDGE_BASE_ID).
    Query { question: String },
    /// List agents that are prepared and ready to invoke.
    Agents,
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() {
    // RUST_LOG=debug for per-call detail.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let simulate = cli.simulate;

    let result = match cli.command {
        Command::Provision => provision(simulate),
        Command::Ask { prompt } => ask(simulate, &prompt),
        Command::Query { question } => query(simulate, &question),
        Command::Agents => agents(simulate),
    };

    if let Err(e) = result {
        eprintln!("ragstack error: {}", e);
        std::process::exit(1);
    }
}

// ── Backend ──────────────────────────────────────────────────────────────────

/// The provider every command runs against.
enum Backend {
    Aws(AwsCloud),
    Simulated(SimulatedCloud),
}

impl Backend {
    /// Connect to AWS, or build a simulator. `seed` fills the simulator
    /// with a ready demo stack for the query commands.
    fn open(simulate: bool, config: &StackConfig, seed: bool) -> ProvisionResult<Self> {
        let account = config.require_account_id()?;
        if !simulate {
            return Ok(Self::Aws(AwsCloud::connect(account, config.region.clone())?));
        }
        let cloud = SimulatedCloud::new(account, config.region.clone());
        if seed {
            seed_demo_stack(&cloud, config)?;
        }
        Ok(Self::Simulated(cloud))
    }

    fn providers(&self) -> Providers {
        match self {
            Self::Aws(cloud) => cloud.providers(),
            Self::Simulated(cloud) => cloud.providers(),
        }
    }

    fn runtime(&self) -> &dyn AgentRuntime {
        match self {
            Self::Aws(cloud) => cloud,
            Self::Simulated(cloud) => cloud,
        }
    }

    fn agents(&self) -> &dyn AgentService {
        match self {
            Self::Aws(cloud) => cloud,
            Self::Simulated(cloud) => cloud,
        }
    }
}

/// The simulator finishes every lifecycle instantly. Real providers keep
/// the configured poll intervals.
fn timing_for(simulate: bool, configured: TimingSettings) -> TimingSettings {
    if simulate {
        TimingSettings::immediate()
    } else {
        configured
    }
}

fn load_config(simulate: bool) -> ProvisionResult<StackConfig> {
    let mut config = StackConfig::from_env()?;
    config.validate()?;
    config.timing = timing_for(simulate, config.timing);
    Ok(config)
}

/// Numbered source list with the passage each source contributed.
fn format_citations(citations: &[Citation]) -> String {
    let mut out = String::new();
    for (i, citation) in citations.iter().enumerate() {
        out.push_str(&format!("  [{}] {}\n", i + 1, citation.source_uri));
        let excerpt = citation.excerpt.trim();
        if !excerpt.is_empty() {
            out.push_str(&format!("      \"{}\"\n", excerpt));
        }
    }
    out
}

/// The ledger a previous run left at `path`, if any.
fn previous_run(path: &Path) -> Option<LedgerLog> {
    if !path.exists() {
        return None;
    }
    match LedgerLog::load(path) {
        Ok(log) => Some(log),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "previous ledger unreadable, skipping comparison");
            None
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn provision(simulate: bool) -> ProvisionResult<()> {
    let mut config = load_config(simulate)?;
    let backend = Backend::open(simulate, &config, false)?;

    // The ledger is keyed by run id, so fix it before the provisioner does.
    let run_id = config.resolve_run_id()?;
    config.run_id = Some(run_id.to_string());

    let ledger_path = config.ledger_path.clone();
    let previous = ledger_path.as_deref().and_then(previous_run);

    let mut ledger = InMemoryLedger::new(run_id.as_str());
    if let Some(path) = &ledger_path {
        ledger = ledger.with_export_path(path.clone());
    }

    let provisioner = Provisioner::new(
        backend.providers(),
        Box::new(ledger.clone()),
        Box::new(OpenApiVerifier::new()),
        Box::new(ThreadSleeper),
        config,
    )?;
    let outputs = provisioner.run()?;

    info!(
        run_id = %outputs.run_id,
        records = ledger.records().len(),
        intact = ledger.verify_integrity(),
        "ledger closed"
    );
    if let Some(previous) = previous {
        let drifts = compare_runs(&previous, &ledger.export_log());
        for drift in &drifts {
            warn!(previous_run = %previous.run_id, "{}", drift);
        }
        info!(previous_run = %previous.run_id, drifts = drifts.len(), "compared with previous run");
    }

    println!("run id:            {}", outputs.run_id);
    println!("bucket:            {}", outputs.bucket);
    println!("collection:        {}", outputs.collection_endpoint);
    println!("knowledge base:    {} ({})", outputs.knowledge_base_id, outputs.knowledge_base_arn);
    println!("data source:       {}", outputs.data_source_id);
    println!("ingestion job:     {}", outputs.ingestion_job_id);
    println!("agent:             {}", outputs.agent_id);
    println!("agent alias:       {}", outputs.agent_alias_id);
    Ok(())
}

fn ask(simulate: bool, prompt: &str) -> ProvisionResult<()> {
    let config = load_config(simulate)?;
    let agent_id = config.require_agent_id()?.to_string();
    let alias_id = config.require_agent_alias_id()?.to_string();

    let backend = Backend::open(simulate, &config, true)?;

    let session_id = Uuid::new_v4().to_string();
    debug!(session_id = %session_id, "new session");
    let reply = invoke_agent(backend.runtime(), &agent_id, &alias_id, &session_id, prompt)?;

    for trace in &reply.traces {
        debug!(session_id = %trace.session_id, trace = %trace.trace, "trace");
    }
    println!("{}", reply.answer);
    Ok(())
}

fn query(simulate: bool, question: &str) -> ProvisionResult<()> {
    let config = load_config(simulate)?;
    let knowledge_base_id = config.require_knowledge_base_id()?.to_string();

    let backend = Backend::open(simulate, &config, true)?;

    let model_arn = arn::foundation_model(&config.region, &config.agent.generation_model);
    let answer = ask_knowledge_base(backend.runtime(), &knowledge_base_id, &model_arn, question)?;

    println!("{}", answer.text);
    if !answer.citations.is_empty() {
        println!();
        println!("Sources:");
        print!("{}", format_citations(&answer.citations));
    }
    Ok(())
}

fn agents(simulate: bool) -> ProvisionResult<()> {
    let config = load_config(simulate)?;
    let backend = Backend::open(simulate, &config, true)?;

    let agents = prepared_agents(backend.agents())?;
    if agents.is_empty() {
        println!("No prepared agents.");
    }
    for agent in agents {
        println!("{}  {}  {}", agent.id, agent.name, agent.status.as_str());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_simulate_flag_is_global() {
        let cli = Cli::try_parse_from(["ragstack", "query", "q", "--simulate"]).unwrap();
        assert!(cli.simulate);
        assert!(matches!(cli.command, Command::Query { .. }));

        let cli = Cli::try_parse_from(["ragstack", "provision"]).unwrap();
        assert!(!cli.simulate);
    }

    #[test]
    fn test_real_provider_keeps_configured_timing() {
        let configured = TimingSettings::default();
        let timing = timing_for(false, configured.clone());
        assert_eq!(timing.collection_poll_secs, configured.collection_poll_secs);
        assert_eq!(timing.knowledge_base_poll_secs, configured.knowledge_base_poll_secs);
        assert!(timing.collection_poll_secs > 0);
    }

    #[test]
    fn test_simulator_polls_immediately() {
        let timing = timing_for(true, TimingSettings::default());
        assert_eq!(timing.collection_poll_secs, 0);
        assert_eq!(timing.knowledge_base_poll_secs, 0);
    }

    #[test]
    fn test_citations_show_excerpts() {
        let citations = vec![
            Citation {
                excerpt: "Passwords expire every 90 days.".to_string(),
                source_uri: "s3://docs/policy.txt".to_string(),
            },
            Citation {
                excerpt: "  ".to_string(),
                source_uri: "s3://docs/faq.txt".to_string(),
            },
        ];
        let text = format_citations(&citations);
        assert_eq!(
            text,
            "  [1] s3://docs/policy.txt\n      \"Passwords expire every 90 days.\"\n  [2] s3://docs/faq.txt\n"
        );
    }

    #[test]
    fn test_missing_previous_ledger_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(previous_run(&dir.path().join("ledger.json")).is_none());

        let junk = dir.path().join("junk.json");
        std::fs::write(&junk, "not a ledger").unwrap();
        assert!(previous_run(&junk).is_none());
    }
}
