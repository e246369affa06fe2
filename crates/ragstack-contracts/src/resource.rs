//! Remote resource types for the storage, identity, vector-search and
//! knowledge-base services.
//!
//! All of these are snapshots of provider-side state. ragstack owns none of
//! it: every value is re-fetched from the provider when it matters.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ProvisionError, ProvisionResult};

/// An identity with an attached policy set, assumed by a managed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRole {
    pub name: String,
    pub arn: String,
}

// ── Vector collection ────────────────────────────────────────────────────────

/// Lifecycle status of a vector-search collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    Creating,
    Active,
    Deleting,
    Failed,
}

impl CollectionStatus {
    /// True while the provider is still working on the collection.
    ///
    /// Index creation must not be attempted in a transitional state.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Creating | Self::Deleting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Deleting => "DELETING",
            Self::Failed => "FAILED",
        }
    }
}

/// A managed vector-search namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorCollection {
    pub id: String,
    pub name: String,
    pub arn: String,
    pub status: CollectionStatus,
    /// The collection endpoint URL, once the provider reports one.
    pub endpoint: Option<String>,
}

impl VectorCollection {
    /// Host name used for index-level requests against this collection.
    ///
    /// Prefers the reported endpoint (scheme stripped); falls back to the
    /// provider's `<id>.<region>.aoss.amazonaws.com` convention.
    pub fn host(&self, region: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string(),
            None => format!("{}.{}.aoss.amazonaws.com", self.id, region),
        }
    }
}

// ── Vector index ─────────────────────────────────────────────────────────────

/// k-NN method parameters of the vector field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnMethod {
    pub name: String,
    pub engine: String,
    pub space_type: String,
    pub ef_construction: u32,
    pub m: u32,
}

impl Default for KnnMethod {
    fn default() -> Self {
        Self {
            name: "hnsw".to_string(),
            engine: "faiss".to_string(),
            space_type: "l2".to_string(),
            ef_construction: 512,
            m: 16,
        }
    }
}

/// Field schema of the vector index backing a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSchema {
    pub vector_field: String,
    /// Must equal the embedding model's output dimensionality.
    pub dimension: u32,
    pub method: KnnMethod,
    pub text_field: String,
    pub metadata_field: String,
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self {
            vector_field: "vector_field".to_string(),
            dimension: 1536,
            method: KnnMethod::default(),
            text_field: "text".to_string(),
            metadata_field: "text-metadata".to_string(),
        }
    }
}

impl IndexSchema {
    /// Render the index-creation request body.
    pub fn to_request_body(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            self.vector_field.clone(),
            json!({
                "type": "knn_vector",
                "dimension": self.dimension,
                "method": {
                    "name": self.method.name,
                    "engine": self.method.engine,
                    "space_type": self.method.space_type,
                    "parameters": {
                        "ef_construction": self.method.ef_construction,
                        "m": self.method.m
                    }
                }
            }),
        );
        properties.insert(self.text_field.clone(), json!({ "type": "text" }));
        properties.insert(self.metadata_field.clone(), json!({ "type": "text" }));

        json!({
            "settings": {
                "index.knn": "true"
            },
            "mappings": {
                "properties": Value::Object(properties)
            }
        })
    }

    pub fn validate(&self) -> ProvisionResult<()> {
        if self.dimension == 0 {
            return Err(ProvisionError::ConfigError {
                reason: "index dimension must be greater than zero".to_string(),
            });
        }
        let fields = [&self.vector_field, &self.text_field, &self.metadata_field];
        if fields.iter().any(|f| f.is_empty()) {
            return Err(ProvisionError::ConfigError {
                reason: "index field names must not be empty".to_string(),
            });
        }
        if self.vector_field == self.text_field
            || self.vector_field == self.metadata_field
            || self.text_field == self.metadata_field
        {
            return Err(ProvisionError::ConfigError {
                reason: "index field names must be distinct".to_string(),
            });
        }
        Ok(())
    }
}

// ── Knowledge base & data source ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnowledgeBaseStatus {
    Creating,
    Active,
    Deleting,
    Updating,
    Failed,
}

impl KnowledgeBaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Deleting => "DELETING",
            Self::Updating => "UPDATING",
            Self::Failed => "FAILED",
        }
    }
}

/// A managed binding between a vector index and an embedding model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub embedding_model_arn: String,
    pub status: KnowledgeBaseStatus,
}

/// Everything the provider needs to register a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseRequest {
    pub name: String,
    pub description: String,
    pub role_arn: String,
    pub embedding_model_arn: String,
    pub collection_arn: String,
    pub index_name: String,
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkingStrategy {
    FixedSize,
    None,
}

/// How the ingestion job splits source documents before embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingPolicy {
    pub strategy: ChunkingStrategy,
    pub max_tokens: u32,
    /// Percentage of each chunk repeated at the start of the next.
    pub overlap_percentage: u8,
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::FixedSize,
            max_tokens: 512,
            overlap_percentage: 20,
        }
    }
}

impl ChunkingPolicy {
    pub fn validate(&self) -> ProvisionResult<()> {
        if self.strategy == ChunkingStrategy::None {
            return Ok(());
        }
        if self.max_tokens == 0 {
            return Err(ProvisionError::ConfigError {
                reason: "chunking max_tokens must be greater than zero".to_string(),
            });
        }
        if !(1..=99).contains(&self.overlap_percentage) {
            return Err(ProvisionError::ConfigError {
                reason: format!(
                    "chunking overlap_percentage must be within 1..=99, got {}",
                    self.overlap_percentage
                ),
            });
        }
        Ok(())
    }
}

/// An ingestion source registered against a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub knowledge_base_id: String,
    pub name: String,
    pub bucket_arn: String,
    pub inclusion_prefixes: Vec<String>,
    pub chunking: ChunkingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceRequest {
    pub knowledge_base_id: String,
    pub name: String,
    pub description: String,
    pub bucket_arn: String,
    pub inclusion_prefixes: Vec<String>,
    pub chunking: ChunkingPolicy,
}

// ── Ingestion job ────────────────────────────────────────────────────────────

/// Status of an ingestion job.
///
/// `COMPLETE` is the only success terminal. `FAILED` and `STOPPED` are error
/// terminals. Everything else means "poll again".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
    Stopping,
    Stopped,
}

impl IngestionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Stopped)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::InProgress => "IN_PROGRESS",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionStatistics {
    pub documents_scanned: u64,
    pub documents_indexed: u64,
    pub documents_failed: u64,
}

/// One run of the chunk-embed-write process for a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: String,
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub status: IngestionStatus,
    pub statistics: IngestionStatistics,
    #[serde(default)]
    pub failure_reasons: Vec<String>,
}

// ── Collection security policies ─────────────────────────────────────────────

/// The two kinds of collection-scoped security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityPolicyKind {
    Encryption,
    Network,
}

impl SecurityPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encryption => "encryption",
            Self::Network => "network",
        }
    }
}
