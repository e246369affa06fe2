//! Connection to one AWS account and region.

use std::future::Future;
use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::SharedCredentialsProvider;
use tokio::runtime::Runtime;
use tracing::info;

use ragstack_contracts::error::{ProvisionError, ProvisionResult};
use ragstack_core::Providers;

/// SDK clients for every service the pipeline touches.
///
/// The provider ports are synchronous, so each call is driven to completion
/// on a private runtime. Must not be used from inside another async runtime.
#[derive(Clone)]
pub struct AwsCloud {
    pub(crate) runtime: Arc<Runtime>,
    pub(crate) account_id: String,
    pub(crate) region: String,
    pub(crate) s3: aws_sdk_s3::Client,
    pub(crate) iam: aws_sdk_iam::Client,
    pub(crate) aoss: aws_sdk_opensearchserverless::Client,
    pub(crate) bedrock: aws_sdk_bedrockagent::Client,
    pub(crate) bedrock_runtime: aws_sdk_bedrockagentruntime::Client,
    pub(crate) lambda: aws_sdk_lambda::Client,
    /// Index requests go straight to the collection endpoint.
    pub(crate) http: reqwest::Client,
    pub(crate) credentials: Option<SharedCredentialsProvider>,
}

impl AwsCloud {
    /// Load credentials from the default chain and build every client for
    /// `region`.
    pub fn connect(account_id: impl Into<String>, region: impl Into<String>) -> ProvisionResult<Self> {
        let account_id = account_id.into();
        let region = region.into();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProvisionError::fatal("connect", format!("failed to start runtime: {e}")))?;

        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.clone()))
                .load(),
        );

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config).build();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ProvisionError::fatal("connect", format!("failed to build HTTP client: {e}")))?;

        info!(account_id = %account_id, region = %region, "AWS clients ready");
        Ok(Self {
            runtime: Arc::new(runtime),
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            iam: aws_sdk_iam::Client::new(&sdk_config),
            aoss: aws_sdk_opensearchserverless::Client::new(&sdk_config),
            bedrock: aws_sdk_bedrockagent::Client::new(&sdk_config),
            bedrock_runtime: aws_sdk_bedrockagentruntime::Client::new(&sdk_config),
            lambda: aws_sdk_lambda::Client::new(&sdk_config),
            http,
            credentials: sdk_config.credentials_provider(),
            account_id,
            region,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Every port backed by this account.
    pub fn providers(&self) -> Providers {
        Providers {
            objects: Arc::new(self.clone()),
            identity: Arc::new(self.clone()),
            vectors: Arc::new(self.clone()),
            knowledge: Arc::new(self.clone()),
            functions: Arc::new(self.clone()),
            agents: Arc::new(self.clone()),
        }
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
