//! Knowledge bases, data sources and ingestion jobs.

use aws_sdk_bedrockagent::types::{
    ChunkingConfiguration, ChunkingStrategy as SdkChunkingStrategy, DataSourceConfiguration,
    DataSourceType, FixedSizeChunkingConfiguration, IngestionJob as SdkIngestionJob,
    KnowledgeBase as SdkKnowledgeBase, KnowledgeBaseConfiguration, KnowledgeBaseStorageType,
    KnowledgeBaseType, OpenSearchServerlessConfiguration, OpenSearchServerlessFieldMapping,
    S3DataSourceConfiguration, StorageConfiguration, VectorIngestionConfiguration,
    VectorKnowledgeBaseConfiguration,
};

use ragstack_contracts::{
    error::ProvisionResult,
    resource::{
        ChunkingPolicy, ChunkingStrategy, DataSource, DataSourceRequest, IngestionJob,
        IngestionStatistics, KnowledgeBase, KnowledgeBaseRequest,
    },
};
use ragstack_core::traits::KnowledgeBaseService;

use crate::client::AwsCloud;
use crate::error::{built, classify, missing_field, parse_status};

fn knowledge_base(op: &str, kb: &SdkKnowledgeBase) -> ProvisionResult<KnowledgeBase> {
    let embedding_model_arn = kb
        .knowledge_base_configuration()
        .and_then(|c| c.vector_knowledge_base_configuration())
        .map(|v| v.embedding_model_arn().to_string())
        .unwrap_or_default();
    Ok(KnowledgeBase {
        id: kb.knowledge_base_id().to_string(),
        arn: kb.knowledge_base_arn().to_string(),
        name: kb.name().to_string(),
        embedding_model_arn,
        status: parse_status(op, kb.status().as_str())?,
    })
}

fn ingestion_job(op: &str, job: &SdkIngestionJob) -> ProvisionResult<IngestionJob> {
    let statistics = job
        .statistics()
        .map(|s| IngestionStatistics {
            documents_scanned: s.number_of_documents_scanned().max(0) as u64,
            documents_indexed: (s.number_of_new_documents_indexed()
                + s.number_of_modified_documents_indexed())
            .max(0) as u64,
            documents_failed: s.number_of_documents_failed().max(0) as u64,
        })
        .unwrap_or_default();
    Ok(IngestionJob {
        id: job.ingestion_job_id().to_string(),
        knowledge_base_id: job.knowledge_base_id().to_string(),
        data_source_id: job.data_source_id().to_string(),
        status: parse_status(op, job.status().as_str())?,
        statistics,
        failure_reasons: job.failure_reasons().to_vec(),
    })
}

/// The chunking configuration sent for a data source.
pub fn chunking_configuration(
    op: &str,
    policy: &ChunkingPolicy,
) -> ProvisionResult<ChunkingConfiguration> {
    let configuration = match policy.strategy {
        ChunkingStrategy::FixedSize => {
            let fixed = built(
                op,
                FixedSizeChunkingConfiguration::builder()
                    .max_tokens(policy.max_tokens as i32)
                    .overlap_percentage(i32::from(policy.overlap_percentage))
                    .build(),
            )?;
            ChunkingConfiguration::builder()
                .chunking_strategy(SdkChunkingStrategy::FixedSize)
                .fixed_size_chunking_configuration(fixed)
        }
        ChunkingStrategy::None => {
            ChunkingConfiguration::builder().chunking_strategy(SdkChunkingStrategy::None)
        }
    };
    built(op, configuration.build())
}

impl KnowledgeBaseService for AwsCloud {
    fn find_knowledge_base(&self, name: &str) -> ProvisionResult<Option<KnowledgeBase>> {
        const OP: &str = "list_knowledge_bases";
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .block_on(
                    self.bedrock
                        .list_knowledge_bases()
                        .set_next_token(next_token.take())
                        .send(),
                )
                .map_err(|e| classify(e, OP, "knowledge base", name))?;
            if let Some(summary) = page.knowledge_base_summaries().iter().find(|s| s.name() == name) {
                return self.get_knowledge_base(summary.knowledge_base_id()).map(Some);
            }
            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    fn create_knowledge_base(&self, request: &KnowledgeBaseRequest) -> ProvisionResult<KnowledgeBase> {
        const OP: &str = "create_knowledge_base";
        let vector = built(
            OP,
            VectorKnowledgeBaseConfiguration::builder()
                .embedding_model_arn(&request.embedding_model_arn)
                .build(),
        )?;
        let configuration = built(
            OP,
            KnowledgeBaseConfiguration::builder()
                .r#type(KnowledgeBaseType::Vector)
                .vector_knowledge_base_configuration(vector)
                .build(),
        )?;
        let field_mapping = built(
            OP,
            OpenSearchServerlessFieldMapping::builder()
                .vector_field(&request.vector_field)
                .text_field(&request.text_field)
                .metadata_field(&request.metadata_field)
                .build(),
        )?;
        let collection = built(
            OP,
            OpenSearchServerlessConfiguration::builder()
                .collection_arn(&request.collection_arn)
                .vector_index_name(&request.index_name)
                .field_mapping(field_mapping)
                .build(),
        )?;
        let storage = built(
            OP,
            StorageConfiguration::builder()
                .r#type(KnowledgeBaseStorageType::OpensearchServerless)
                .opensearch_serverless_configuration(collection)
                .build(),
        )?;

        let output = self
            .block_on(
                self.bedrock
                    .create_knowledge_base()
                    .name(&request.name)
                    .description(&request.description)
                    .role_arn(&request.role_arn)
                    .knowledge_base_configuration(configuration)
                    .storage_configuration(storage)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "knowledge base", &request.name))?;
        let kb = output
            .knowledge_base()
            .ok_or_else(|| missing_field(OP, "knowledge base"))?;
        knowledge_base(OP, kb)
    }

    fn get_knowledge_base(&self, id: &str) -> ProvisionResult<KnowledgeBase> {
        const OP: &str = "get_knowledge_base";
        let output = self
            .block_on(self.bedrock.get_knowledge_base().knowledge_base_id(id).send())
            .map_err(|e| classify(e, OP, "knowledge base", id))?;
        let kb = output
            .knowledge_base()
            .ok_or_else(|| missing_field(OP, "knowledge base"))?;
        knowledge_base(OP, kb)
    }

    fn find_data_source(&self, knowledge_base_id: &str, name: &str) -> ProvisionResult<Option<DataSource>> {
        const OP: &str = "list_data_sources";
        let output = self
            .block_on(
                self.bedrock
                    .list_data_sources()
                    .knowledge_base_id(knowledge_base_id)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "data source", name))?;
        let Some(summary) = output.data_source_summaries().iter().find(|s| s.name() == name) else {
            return Ok(None);
        };

        const GET: &str = "get_data_source";
        let detail = self
            .block_on(
                self.bedrock
                    .get_data_source()
                    .knowledge_base_id(knowledge_base_id)
                    .data_source_id(summary.data_source_id())
                    .send(),
            )
            .map_err(|e| classify(e, GET, "data source", name))?;
        let source = detail
            .data_source()
            .ok_or_else(|| missing_field(GET, "data source"))?;
        let s3 = source
            .data_source_configuration()
            .and_then(|c| c.s3_configuration());
        let chunking = source
            .vector_ingestion_configuration()
            .and_then(|v| v.chunking_configuration())
            .map(|c| match c.fixed_size_chunking_configuration() {
                Some(fixed) => ChunkingPolicy {
                    strategy: ChunkingStrategy::FixedSize,
                    max_tokens: fixed.max_tokens().max(0) as u32,
                    overlap_percentage: fixed.overlap_percentage().clamp(0, 99) as u8,
                },
                None => ChunkingPolicy {
                    strategy: ChunkingStrategy::None,
                    ..ChunkingPolicy::default()
                },
            })
            .unwrap_or_default();

        Ok(Some(DataSource {
            id: source.data_source_id().to_string(),
            knowledge_base_id: source.knowledge_base_id().to_string(),
            name: source.name().to_string(),
            bucket_arn: s3.map(|s| s.bucket_arn().to_string()).unwrap_or_default(),
            inclusion_prefixes: s3.map(|s| s.inclusion_prefixes().to_vec()).unwrap_or_default(),
            chunking,
        }))
    }

    fn create_data_source(&self, request: &DataSourceRequest) -> ProvisionResult<DataSource> {
        const OP: &str = "create_data_source";
        let s3 = built(
            OP,
            S3DataSourceConfiguration::builder()
                .bucket_arn(&request.bucket_arn)
                .set_inclusion_prefixes(Some(request.inclusion_prefixes.clone()))
                .build(),
        )?;
        let configuration = built(
            OP,
            DataSourceConfiguration::builder()
                .r#type(DataSourceType::S3)
                .s3_configuration(s3)
                .build(),
        )?;
        let ingestion = VectorIngestionConfiguration::builder()
            .chunking_configuration(chunking_configuration(OP, &request.chunking)?)
            .build();

        let output = self
            .block_on(
                self.bedrock
                    .create_data_source()
                    .knowledge_base_id(&request.knowledge_base_id)
                    .name(&request.name)
                    .description(&request.description)
                    .data_source_configuration(configuration)
                    .vector_ingestion_configuration(ingestion)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "data source", &request.name))?;
        let source = output
            .data_source()
            .ok_or_else(|| missing_field(OP, "data source"))?;
        Ok(DataSource {
            id: source.data_source_id().to_string(),
            knowledge_base_id: request.knowledge_base_id.clone(),
            name: request.name.clone(),
            bucket_arn: request.bucket_arn.clone(),
            inclusion_prefixes: request.inclusion_prefixes.clone(),
            chunking: request.chunking.clone(),
        })
    }

    fn start_ingestion_job(&self, knowledge_base_id: &str, data_source_id: &str) -> ProvisionResult<IngestionJob> {
        const OP: &str = "start_ingestion_job";
        let output = self
            .block_on(
                self.bedrock
                    .start_ingestion_job()
                    .knowledge_base_id(knowledge_base_id)
                    .data_source_id(data_source_id)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "data source", data_source_id))?;
        let job = output
            .ingestion_job()
            .ok_or_else(|| missing_field(OP, "ingestion job"))?;
        ingestion_job(OP, job)
    }

    fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        job_id: &str,
    ) -> ProvisionResult<IngestionJob> {
        const OP: &str = "get_ingestion_job";
        let output = self
            .block_on(
                self.bedrock
                    .get_ingestion_job()
                    .knowledge_base_id(knowledge_base_id)
                    .data_source_id(data_source_id)
                    .ingestion_job_id(job_id)
                    .send(),
            )
            .map_err(|e| classify(e, OP, "ingestion job", job_id))?;
        let job = output
            .ingestion_job()
            .ok_or_else(|| missing_field(OP, "ingestion job"))?;
        ingestion_job(OP, job)
    }
}
