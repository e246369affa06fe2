//! Execution roles and their permission policies.

use tracing::{debug, info};

use ragstack_contracts::{
    error::{ProvisionError, ProvisionResult},
    naming::RolePurpose,
    record::{Disposition, ResourceKind},
    resource::ExecutionRole,
};
use ragstack_policy::{trust_policy, Grant};

use super::Provisioner;

impl Provisioner {
    /// Create (or fetch) the role for `purpose` and attach every grant.
    ///
    /// Calling this twice with the same run id returns the same role.
    pub fn ensure_role(
        &self,
        purpose: RolePurpose,
        grants: &[Grant],
    ) -> ProvisionResult<ExecutionRole> {
        let name = self.names.role(purpose);
        let trust = trust_policy(purpose).to_json()?;
        let identity = &self.providers.identity;

        let description = format!("ragstack {} execution role", purpose.slug());
        let (role, disposition) = match identity.create_role(&name, &trust, &description) {
            Ok(role) => (role, Disposition::Created),
            Err(e) if e.is_already_exists() => {
                debug!(role = %name, "role exists, fetching");
                (identity.get_role(&name)?, Disposition::Reused)
            }
            Err(e) => return Err(e),
        };
        self.record(ResourceKind::Role, &role.name, &role.arn, disposition)?;

        for grant in grants {
            self.grant(&role, purpose, grant)?;
        }

        info!(role = %role.name, grants = grants.len(), disposition = ?disposition, "role ready");
        Ok(role)
    }

    /// Attach one more grant to an existing role.
    pub fn grant(
        &self,
        role: &ExecutionRole,
        purpose: RolePurpose,
        grant: &Grant,
    ) -> ProvisionResult<()> {
        let identity = &self.providers.identity;

        let policy_arn = match (grant.document(), grant.managed_arn()) {
            (Some(document), _) => {
                document.validate_permissions()?;
                let policy_name = self.names.policy(purpose, grant.slug());
                let json = document.to_json()?;
                let (policy_arn, disposition) =
                    match identity.create_policy(&policy_name, &json, &grant.description()) {
                        Ok(arn) => (arn, Disposition::Created),
                        Err(e) if e.is_already_exists() => {
                            let arn = identity.find_policy(&policy_name)?.ok_or_else(|| {
                                ProvisionError::NotFound {
                                    resource: "policy".to_string(),
                                    name: policy_name.clone(),
                                }
                            })?;
                            (arn, Disposition::Reused)
                        }
                        Err(e) => return Err(e),
                    };
                self.record(ResourceKind::Policy, &policy_name, &policy_arn, disposition)?;
                policy_arn
            }
            (None, Some(managed)) => managed.to_string(),
            (None, None) => {
                return Err(ProvisionError::fatal(
                    "grant",
                    format!("grant '{}' has neither a document nor a managed policy", grant.slug()),
                ))
            }
        };

        identity.attach_role_policy(&role.name, &policy_arn)?;
        debug!(role = %role.name, policy = %policy_arn, "policy attached");
        Ok(())
    }
}
