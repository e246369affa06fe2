//! Vector collections and their indexes.
//!
//! Collections, security policies and access policies go through the
//! OpenSearch Serverless control plane. Indexes live on the collection's own
//! endpoint, which has no SDK: the request is SigV4-signed for the `aoss`
//! service and sent directly.

use std::time::SystemTime;

use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_opensearchserverless::types::{
    AccessPolicyType, CollectionDetail, CollectionType, SecurityPolicyType,
};
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;
use serde_json::Value;
use tracing::debug;

use ragstack_contracts::{
    error::{ProviderFault, ProvisionError, ProvisionResult},
    resource::{CollectionStatus, SecurityPolicyKind, VectorCollection},
};
use ragstack_core::traits::VectorStore;

use crate::client::AwsCloud;
use crate::error::{classify, missing_field, parse_status};

/// Signing name of OpenSearch Serverless.
const SIGNING_SERVICE: &str = "aoss";

fn collection(op: &str, detail: &CollectionDetail) -> ProvisionResult<VectorCollection> {
    let status = match detail.status() {
        Some(status) => parse_status(op, status.as_str())?,
        None => CollectionStatus::Creating,
    };
    Ok(VectorCollection {
        id: detail.id().ok_or_else(|| missing_field(op, "collection id"))?.to_string(),
        name: detail.name().unwrap_or_default().to_string(),
        arn: detail.arn().unwrap_or_default().to_string(),
        status,
        endpoint: detail.collection_endpoint().map(str::to_string),
    })
}

/// Map an index API error response onto a provider fault.
///
/// The engine reports errors as `{"error": {"type": ..., "reason": ...}}`.
/// Throttling and gateway failures carry no such body.
pub fn index_fault(status: u16, body: &str) -> ProviderFault {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().map(|v| &v["error"]);
    let code = error.and_then(|e| e["type"].as_str());
    let reason = error
        .and_then(|e| e["reason"].as_str())
        .unwrap_or(body)
        .to_string();

    match (status, code) {
        (_, Some(code)) => ProviderFault::new(code, reason),
        (429, None) => ProviderFault::new("TooManyRequestsException", reason),
        (500..=599, None) => ProviderFault::new("ServiceUnavailable", reason),
        (status, None) => ProviderFault::new(format!("Http{status}"), reason),
    }
}

impl AwsCloud {
    /// PUT `body` to `url`, signed with the default credentials.
    async fn signed_put(&self, url: &str, body: Vec<u8>) -> ProvisionResult<(u16, String)> {
        const OP: &str = "create_index";
        let provider = self
            .credentials
            .as_ref()
            .ok_or_else(|| ProvisionError::ConfigurationMissing {
                key: "AWS credentials".to_string(),
            })?;
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| ProvisionError::fatal(OP, format!("no credentials: {e}")))?;
        let identity = credentials.into();

        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SIGNING_SERVICE)
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .map_err(|e| ProvisionError::fatal(OP, format!("signing parameters: {e}")))?
            .into();

        let headers = [("content-type", "application/json")];
        let signable = SignableRequest::new(
            "PUT",
            url,
            headers.iter().copied(),
            SignableBody::Bytes(&body),
        )
        .map_err(|e| ProvisionError::fatal(OP, format!("unsignable request: {e}")))?;
        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| ProvisionError::fatal(OP, format!("signing failed: {e}")))?
            .into_parts();

        let mut request = self.http.put(url).body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        for (name, value) in instructions.headers() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ProvisionError::TransientProvider {
                    operation: OP.to_string(),
                    reason: e.to_string(),
                }
            } else {
                ProvisionError::fatal(OP, e.to_string())
            }
        })?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ProvisionError::fatal(OP, format!("unreadable response: {e}")))?;
        Ok((status, text))
    }
}

impl VectorStore for AwsCloud {
    fn create_security_policy(
        &self,
        kind: SecurityPolicyKind,
        name: &str,
        policy: &str,
    ) -> ProvisionResult<()> {
        let policy_type = match kind {
            SecurityPolicyKind::Encryption => SecurityPolicyType::Encryption,
            SecurityPolicyKind::Network => SecurityPolicyType::Network,
        };
        self.block_on(
            self.aoss
                .create_security_policy()
                .name(name)
                .policy(policy)
                .r#type(policy_type)
                .send(),
        )
        .map_err(|e| classify(e, "create_security_policy", "security policy", name))?;
        Ok(())
    }

    fn create_access_policy(&self, name: &str, policy: &str) -> ProvisionResult<()> {
        self.block_on(
            self.aoss
                .create_access_policy()
                .name(name)
                .policy(policy)
                .r#type(AccessPolicyType::Data)
                .send(),
        )
        .map_err(|e| classify(e, "create_access_policy", "access policy", name))?;
        Ok(())
    }

    fn find_collection(&self, name: &str) -> ProvisionResult<Option<VectorCollection>> {
        const OP: &str = "batch_get_collection";
        let output = self
            .block_on(self.aoss.batch_get_collection().names(name).send())
            .map_err(|e| classify(e, OP, "collection", name))?;
        output
            .collection_details()
            .first()
            .map(|detail| collection(OP, detail))
            .transpose()
    }

    fn create_collection(&self, name: &str) -> ProvisionResult<VectorCollection> {
        const OP: &str = "create_collection";
        let output = self
            .block_on(
                self.aoss
                    .create_collection()
                    .name(name)
                    .r#type(CollectionType::Vectorsearch)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "collection", name))?;
        let detail = output
            .create_collection_detail()
            .ok_or_else(|| missing_field(OP, "collection detail"))?;
        let status = match detail.status() {
            Some(status) => parse_status(OP, status.as_str())?,
            None => CollectionStatus::Creating,
        };
        Ok(VectorCollection {
            id: detail.id().ok_or_else(|| missing_field(OP, "collection id"))?.to_string(),
            name: detail.name().unwrap_or(name).to_string(),
            arn: detail.arn().unwrap_or_default().to_string(),
            status,
            endpoint: None,
        })
    }

    fn get_collection(&self, id: &str) -> ProvisionResult<VectorCollection> {
        const OP: &str = "batch_get_collection";
        let output = self
            .block_on(self.aoss.batch_get_collection().ids(id).send())
            .map_err(|e| classify(e, OP, "collection", id))?;
        match output.collection_details().first() {
            Some(detail) => collection(OP, detail),
            None => Err(ProvisionError::NotFound {
                resource: "collection".to_string(),
                name: id.to_string(),
            }),
        }
    }

    fn create_index(&self, host: &str, index: &str, body: &Value) -> ProvisionResult<()> {
        const OP: &str = "create_index";
        let url = format!("https://{host}/{index}");
        let payload = serde_json::to_vec(body)
            .map_err(|e| ProvisionError::fatal(OP, format!("index body: {e}")))?;

        let (status, text) = self.block_on(self.signed_put(&url, payload))?;
        if (200..300).contains(&status) {
            debug!(url = %url, status, "index created");
            return Ok(());
        }
        Err(index_fault(status, &text).classify(OP, "index", index))
    }
}
