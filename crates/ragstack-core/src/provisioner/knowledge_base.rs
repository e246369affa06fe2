//! Knowledge base and data source registrar.
//!
//! Both calls run inside the jittered retry loop: right after the execution
//! role is created the service often rejects it as not assumable yet, and
//! that rejection clears on its own. A data source is only attached once the
//! knowledge base reports `ACTIVE`.

use tracing::info;

use ragstack_contracts::{
    error::{ProvisionError, ProvisionResult},
    record::{Disposition, ResourceKind},
    resource::{
        ChunkingPolicy, DataSource, DataSourceRequest, KnowledgeBase, KnowledgeBaseRequest,
        KnowledgeBaseStatus,
    },
};

use crate::poll::{poll_until, PollState};
use crate::retry::retry_transient;

use super::Provisioner;

impl Provisioner {
    /// Register the knowledge base over `index_name` in the collection.
    pub fn create_knowledge_base(
        &self,
        collection_arn: &str,
        index_name: &str,
        role_arn: &str,
        embedding_model_arn: &str,
    ) -> ProvisionResult<KnowledgeBase> {
        let name = self.names.knowledge_base();
        let service = &self.providers.knowledge;

        if let Some(existing) = service.find_knowledge_base(&name)? {
            info!(knowledge_base = %name, id = %existing.id, "knowledge base exists");
            self.record(ResourceKind::KnowledgeBase, &name, &existing.arn, Disposition::Reused)?;
            return Ok(existing);
        }

        let index = &self.config.knowledge_base.index;
        let request = KnowledgeBaseRequest {
            name: name.clone(),
            description: self.config.knowledge_base.description.clone(),
            role_arn: role_arn.to_string(),
            embedding_model_arn: embedding_model_arn.to_string(),
            collection_arn: collection_arn.to_string(),
            index_name: index_name.to_string(),
            vector_field: index.vector_field.clone(),
            text_field: index.text_field.clone(),
            metadata_field: index.metadata_field.clone(),
        };

        let retry = self.config.timing.retry();
        let created = retry_transient("create_knowledge_base", &retry, &*self.sleeper, |_| {
            service.create_knowledge_base(&request)
        });

        let (kb, disposition) = match created {
            Ok(kb) => (kb, Disposition::Created),
            Err(e) if e.is_already_exists() => {
                let kb = service
                    .find_knowledge_base(&name)?
                    .ok_or_else(|| not_found("knowledge base", &name))?;
                (kb, Disposition::Reused)
            }
            Err(e) => return Err(e),
        };

        info!(knowledge_base = %name, id = %kb.id, disposition = ?disposition, "knowledge base registered");
        self.record(ResourceKind::KnowledgeBase, &name, &kb.arn, disposition)?;
        self.wait_for_knowledge_base(kb)
    }

    /// Poll until the knowledge base is `ACTIVE`. `FAILED` and `DELETING`
    /// abort the run.
    pub fn wait_for_knowledge_base(&self, kb: KnowledgeBase) -> ProvisionResult<KnowledgeBase> {
        if kb.status == KnowledgeBaseStatus::Active {
            return Ok(kb);
        }

        let service = &self.providers.knowledge;
        let resource = format!("knowledge base '{}'", kb.name);
        let policy = self.config.timing.knowledge_base_poll();
        let ready = poll_until(&resource, &policy, &*self.sleeper, || {
            let current = service.get_knowledge_base(&kb.id)?;
            match current.status {
                KnowledgeBaseStatus::Active => Ok(PollState::Ready(current)),
                KnowledgeBaseStatus::Failed | KnowledgeBaseStatus::Deleting => {
                    Err(ProvisionError::fatal(
                        "wait_for_knowledge_base",
                        format!("knowledge base '{}' is {}", current.id, current.status.as_str()),
                    ))
                }
                status => Ok(PollState::Pending(status.as_str().to_string())),
            }
        })?;

        info!(knowledge_base = %ready.name, id = %ready.id, "knowledge base active");
        Ok(ready)
    }

    /// Register the bucket prefix as the knowledge base's data source.
    pub fn create_data_source(
        &self,
        knowledge_base_id: &str,
        bucket_arn: &str,
        prefix: &str,
        chunking: &ChunkingPolicy,
    ) -> ProvisionResult<DataSource> {
        chunking.validate()?;

        let name = self.names.data_source();
        let service = &self.providers.knowledge;

        if let Some(existing) = service.find_data_source(knowledge_base_id, &name)? {
            info!(data_source = %name, id = %existing.id, "data source exists");
            self.record(ResourceKind::DataSource, &name, &existing.id, Disposition::Reused)?;
            return Ok(existing);
        }

        let request = DataSourceRequest {
            knowledge_base_id: knowledge_base_id.to_string(),
            name: name.clone(),
            description: format!("Documents under {prefix}"),
            bucket_arn: bucket_arn.to_string(),
            inclusion_prefixes: vec![prefix.to_string()],
            chunking: chunking.clone(),
        };

        let retry = self.config.timing.retry();
        let created = retry_transient("create_data_source", &retry, &*self.sleeper, |_| {
            service.create_data_source(&request)
        });

        let (data_source, disposition) = match created {
            Ok(ds) => (ds, Disposition::Created),
            Err(e) if e.is_already_exists() => {
                let ds = service
                    .find_data_source(knowledge_base_id, &name)?
                    .ok_or_else(|| not_found("data source", &name))?;
                (ds, Disposition::Reused)
            }
            Err(e) => return Err(e),
        };

        info!(
            data_source = %name,
            id = %data_source.id,
            max_tokens = chunking.max_tokens,
            overlap = chunking.overlap_percentage,
            "data source ready"
        );
        self.record(ResourceKind::DataSource, &name, &data_source.id, disposition)?;
        Ok(data_source)
    }
}

fn not_found(resource: &str, name: &str) -> ProvisionError {
    ProvisionError::NotFound {
        resource: resource.to_string(),
        name: name.to_string(),
    }
}
