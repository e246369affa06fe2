//! Vector collection provisioner.

use tracing::{debug, info};

use ragstack_contracts::{
    arn,
    error::{ProvisionError, ProvisionResult},
    record::{Disposition, ResourceKind},
    resource::{CollectionStatus, SecurityPolicyKind, VectorCollection},
};
use ragstack_policy::collection::{
    data_access_policy, encryption_policy, network_policy, to_json,
};

use crate::poll::{poll_until, PollState};

use super::Provisioner;

impl Provisioner {
    /// Create the collection's security policies and the collection itself,
    /// then wait until it is no longer transitional.
    ///
    /// `role_arn` is granted data access alongside the account root.
    pub fn ensure_collection(&self, name: &str, role_arn: &str) -> ProvisionResult<VectorCollection> {
        let account = self.config.require_account_id()?;
        let vectors = &self.providers.vectors;

        self.ensure_security_policy(
            SecurityPolicyKind::Encryption,
            &self.names.encryption_policy(),
            &to_json(&encryption_policy(name))?,
        )?;
        self.ensure_security_policy(
            SecurityPolicyKind::Network,
            &self.names.network_policy(),
            &to_json(&network_policy(name))?,
        )?;

        let principals = vec![arn::account_root(account), role_arn.to_string()];
        let access_name = self.names.access_policy();
        let access = to_json(&data_access_policy(name, &principals)?)?;
        let disposition = tolerate_existing(vectors.create_access_policy(&access_name, &access))?;
        self.record(ResourceKind::AccessPolicy, &access_name, &access_name, disposition)?;

        let (collection, disposition) = match vectors.find_collection(name)? {
            Some(existing) => (existing, Disposition::Reused),
            None => match vectors.create_collection(name) {
                Ok(created) => (created, Disposition::Created),
                Err(e) if e.is_already_exists() => {
                    let existing = vectors.find_collection(name)?.ok_or_else(|| {
                        ProvisionError::NotFound {
                            resource: "collection".to_string(),
                            name: name.to_string(),
                        }
                    })?;
                    (existing, Disposition::Reused)
                }
                Err(e) => return Err(e),
            },
        };
        self.record(ResourceKind::Collection, name, &collection.arn, disposition)?;
        info!(collection = %name, id = %collection.id, disposition = ?disposition, "waiting for collection");

        let collection = self.wait_for_collection(&collection)?;
        info!(collection = %name, host = %collection.host(&self.config.region), "collection active");
        Ok(collection)
    }

    fn wait_for_collection(&self, collection: &VectorCollection) -> ProvisionResult<VectorCollection> {
        let resource = format!("collection '{}'", collection.name);
        let policy = self.config.timing.collection_poll();

        poll_until(&resource, &policy, &*self.sleeper, || {
            let current = self.providers.vectors.get_collection(&collection.id)?;
            match current.status {
                CollectionStatus::Active => Ok(PollState::Ready(current)),
                CollectionStatus::Failed => Err(ProvisionError::fatal(
                    "create collection",
                    format!("collection '{}' entered FAILED", current.name),
                )),
                status => Ok(PollState::Pending(status.as_str().to_string())),
            }
        })
    }

    fn ensure_security_policy(
        &self,
        kind: SecurityPolicyKind,
        name: &str,
        policy: &str,
    ) -> ProvisionResult<()> {
        let result = self.providers.vectors.create_security_policy(kind, name, policy);
        let disposition = tolerate_existing(result)?;
        debug!(kind = kind.as_str(), policy = %name, disposition = ?disposition, "security policy ready");
        self.record(ResourceKind::SecurityPolicy, name, name, disposition)
    }
}

/// `Created` on success, `Reused` on `AlreadyExists`, the error otherwise.
pub(super) fn tolerate_existing(result: ProvisionResult<()>) -> ProvisionResult<Disposition> {
    match result {
        Ok(()) => Ok(Disposition::Created),
        Err(e) if e.is_already_exists() => Ok(Disposition::Reused),
        Err(e) => Err(e),
    }
}
