//! Vector index creator.

use tracing::info;

use ragstack_contracts::{
    error::{ProvisionError, ProvisionResult},
    record::ResourceKind,
    resource::VectorCollection,
};

use super::collection::tolerate_existing;
use super::Provisioner;

impl Provisioner {
    /// Create the k-NN index the knowledge base writes into.
    ///
    /// The collection must already be active.
    pub fn create_vector_index(
        &self,
        collection: &VectorCollection,
        index_name: &str,
    ) -> ProvisionResult<()> {
        if collection.status.is_transitional() {
            return Err(ProvisionError::fatal(
                "create index",
                format!(
                    "collection '{}' is still {}",
                    collection.name,
                    collection.status.as_str()
                ),
            ));
        }

        let schema = &self.config.knowledge_base.index;
        let host = collection.host(&self.config.region);
        let body = schema.to_request_body();

        let disposition =
            tolerate_existing(self.providers.vectors.create_index(&host, index_name, &body))?;
        info!(
            index = %index_name,
            host = %host,
            dimension = schema.dimension,
            disposition = ?disposition,
            "vector index ready"
        );
        self.record(ResourceKind::Index, index_name, &format!("{host}/{index_name}"), disposition)
    }
}
