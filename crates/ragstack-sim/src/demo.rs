//! A ready-made stack for exercising the query path without provisioning.

use std::path::Path;

use tracing::{info, warn};

use ragstack_contracts::error::ProvisionResult;
use ragstack_core::StackConfig;

use crate::cloud::SimulatedCloud;

/// Documents indexed when the configured documents directory is missing.
pub const DEMO_DOCUMENTS: &[(&str, &str)] = &[
    (
        "passwords.txt",
        "Passwords expire every 90 days. A forgotten password can be reset from the \
         self-service portal or by asking the support agent with your account email.",
    ),
    (
        "billing.txt",
        "Invoices are emailed on the first business day of each month. Billing questions \
         go to the finance team.",
    ),
    (
        "onboarding.txt",
        "New employees receive laptop access on their first day. The onboarding checklist \
         lives in the portal.",
    ),
];

/// Identifiers of a seeded stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoStack {
    pub knowledge_base_id: String,
    pub agent_id: String,
    pub agent_alias_id: String,
}

/// Seed `cloud` with one knowledge base and one prepared agent.
///
/// Ids come from `config.runtime` where set. Documents are read from
/// `config.documents_dir`, falling back to [`DEMO_DOCUMENTS`].
pub fn seed_demo_stack(cloud: &SimulatedCloud, config: &StackConfig) -> ProvisionResult<DemoStack> {
    let runtime = &config.runtime;
    let stack = DemoStack {
        knowledge_base_id: runtime.knowledge_base_id.clone().unwrap_or_else(|| "KBDEMO0001".to_string()),
        agent_id: runtime.agent_id.clone().unwrap_or_else(|| "AGDEMO0001".to_string()),
        agent_alias_id: runtime.agent_alias_id.clone().unwrap_or_else(|| "ALDEMO0001".to_string()),
    };

    let bucket = config.bucket_name.clone().unwrap_or_else(|| "ragstack-demo".to_string());
    let documents: Vec<(String, String)> = read_documents(&config.documents_dir)
        .into_iter()
        .map(|(file, text)| (format!("s3://{bucket}/{}{file}", config.data_prefix), text))
        .collect();

    let kb_name = format!("{}-kb-demo", config.name_prefix);
    cloud.seed_knowledge_base(
        &stack.knowledge_base_id,
        &kb_name,
        &documents,
        &config.knowledge_base.chunking,
    )?;
    cloud.seed_prepared_agent(
        &stack.agent_id,
        &format!("{}-agent-demo", config.name_prefix),
        &stack.agent_alias_id,
        Some(&stack.knowledge_base_id),
    )?;

    info!(
        knowledge_base_id = %stack.knowledge_base_id,
        agent_id = %stack.agent_id,
        documents = documents.len(),
        "demo stack seeded"
    );
    Ok(stack)
}

fn read_documents(dir: &Path) -> Vec<(String, String)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            warn!(dir = %dir.display(), "documents directory not readable, using built-in documents");
            return builtin();
        }
    };

    let mut docs: Vec<(String, String)> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            let text = std::fs::read_to_string(&p).ok()?;
            Some((name, text))
        })
        .collect();
    docs.sort();

    if docs.is_empty() {
        builtin()
    } else {
        docs
    }
}

fn builtin() -> Vec<(String, String)> {
    DEMO_DOCUMENTS
        .iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect()
}
