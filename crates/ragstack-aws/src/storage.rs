//! Object storage and identity.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use tracing::debug;

use ragstack_contracts::{arn, error::ProvisionResult, resource::ExecutionRole};
use ragstack_core::traits::{IdentityService, ObjectStore};

use crate::client::AwsCloud;
use crate::error::{classify, missing_field};

/// Buckets in `us-east-1` must be created without a location constraint.
pub fn location_constraint(region: &str) -> Option<CreateBucketConfiguration> {
    (region != "us-east-1").then(|| {
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build()
    })
}

// ── ObjectStore ──────────────────────────────────────────────────────────────

impl ObjectStore for AwsCloud {
    fn bucket_exists(&self, bucket: &str) -> ProvisionResult<bool> {
        const OP: &str = "head_bucket";
        let result = self.block_on(self.s3.head_bucket().bucket(bucket).send());
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => {
                let err = classify(e, OP, "bucket", bucket);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn create_bucket(&self, bucket: &str, region: &str) -> ProvisionResult<()> {
        self.block_on(
            self.s3
                .create_bucket()
                .bucket(bucket)
                .set_create_bucket_configuration(location_constraint(region))
                .send(),
        )
        .map_err(|e| classify(e, "create_bucket", "bucket", bucket))?;
        debug!(bucket = %bucket, region = %region, "bucket created");
        Ok(())
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> ProvisionResult<()> {
        self.block_on(
            self.s3
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body.to_vec()))
                .send(),
        )
        .map_err(|e| classify(e, "put_object", "object", key))?;
        Ok(())
    }
}

// ── IdentityService ──────────────────────────────────────────────────────────

impl IdentityService for AwsCloud {
    fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> ProvisionResult<ExecutionRole> {
        const OP: &str = "create_role";
        let output = self
            .block_on(
                self.iam
                    .create_role()
                    .role_name(name)
                    .assume_role_policy_document(trust_policy)
                    .description(description)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "role", name))?;
        let role = output.role().ok_or_else(|| missing_field(OP, "role"))?;
        Ok(ExecutionRole {
            name: role.role_name().to_string(),
            arn: role.arn().to_string(),
        })
    }

    fn get_role(&self, name: &str) -> ProvisionResult<ExecutionRole> {
        const OP: &str = "get_role";
        let output = self
            .block_on(self.iam.get_role().role_name(name).send())
            .map_err(|e| classify(e, OP, "role", name))?;
        let role = output.role().ok_or_else(|| missing_field(OP, "role"))?;
        Ok(ExecutionRole {
            name: role.role_name().to_string(),
            arn: role.arn().to_string(),
        })
    }

    fn create_policy(&self, name: &str, document: &str, description: &str) -> ProvisionResult<String> {
        const OP: &str = "create_policy";
        let output = self
            .block_on(
                self.iam
                    .create_policy()
                    .policy_name(name)
                    .policy_document(document)
                    .description(description)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "policy", name))?;
        output
            .policy()
            .and_then(|p| p.arn())
            .map(str::to_string)
            .ok_or_else(|| missing_field(OP, "policy ARN"))
    }

    /// Customer-managed policy ARNs are derived from the account and name.
    fn find_policy(&self, name: &str) -> ProvisionResult<Option<String>> {
        const OP: &str = "get_policy";
        let policy_arn = arn::policy(&self.account_id, name);
        match self.block_on(self.iam.get_policy().policy_arn(&policy_arn).send()) {
            Ok(_) => Ok(Some(policy_arn)),
            Err(e) => {
                let err = classify(e, OP, "policy", name);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> ProvisionResult<()> {
        self.block_on(
            self.iam
                .attach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send(),
        )
        .map_err(|e| classify(e, "attach_role_policy", "role", role_name))?;
        Ok(())
    }
}
