//! Collection-scoped security policies of the vector-search service.
//!
//! These use the vector-search service's own policy language, not the
//! identity-policy language in [`crate::document`]: a list of rules keyed by
//! `ResourceType`, each naming `collection/<name>` or `index/<name>/*`.

use serde::{Deserialize, Serialize};

use ragstack_contracts::error::{ProvisionError, ProvisionResult};

/// Data-plane permissions granted on the collection itself.
pub const COLLECTION_PERMISSIONS: [&str; 4] = [
    "aoss:CreateCollectionItems",
    "aoss:DeleteCollectionItems",
    "aoss:UpdateCollectionItems",
    "aoss:DescribeCollectionItems",
];

/// Data-plane permissions granted on every index in the collection.
pub const INDEX_PERMISSIONS: [&str; 6] = [
    "aoss:CreateIndex",
    "aoss:DeleteIndex",
    "aoss:UpdateIndex",
    "aoss:DescribeIndex",
    "aoss:ReadDocument",
    "aoss:WriteDocument",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectionRule {
    pub resource_type: String,
    pub resource: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission: Vec<String>,
}

impl CollectionRule {
    fn collection(name: &str) -> Self {
        Self {
            resource_type: "collection".to_string(),
            resource: vec![format!("collection/{name}")],
            permission: vec![],
        }
    }

    fn dashboard(name: &str) -> Self {
        Self {
            resource_type: "dashboard".to_string(),
            resource: vec![format!("collection/{name}")],
            permission: vec![],
        }
    }

    fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permission = permissions.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// Encrypts the collection with a service-owned key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionPolicy {
    #[serde(rename = "Rules")]
    pub rules: Vec<CollectionRule>,
    #[serde(rename = "AWSOwnedKey")]
    pub service_owned_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkRule {
    pub rules: Vec<CollectionRule>,
    pub allow_from_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessRule {
    pub rules: Vec<CollectionRule>,
    pub principal: Vec<String>,
    pub description: String,
}

pub fn encryption_policy(collection: &str) -> EncryptionPolicy {
    EncryptionPolicy {
        rules: vec![CollectionRule::collection(collection)],
        service_owned_key: true,
    }
}

/// Public endpoint access to the collection and its dashboard.
pub fn network_policy(collection: &str) -> Vec<NetworkRule> {
    vec![NetworkRule {
        rules: vec![
            CollectionRule::collection(collection),
            CollectionRule::dashboard(collection),
        ],
        allow_from_public: true,
    }]
}

/// Grants the listed principals collection and index permissions.
///
/// Fails if `principals` is empty: an access policy nobody can use would
/// leave the knowledge base unable to write its index.
pub fn data_access_policy(collection: &str, principals: &[String]) -> ProvisionResult<Vec<AccessRule>> {
    if principals.is_empty() {
        return Err(ProvisionError::ConfigError {
            reason: format!("data access policy for '{collection}' needs at least one principal"),
        });
    }
    let index_rule = CollectionRule {
        resource_type: "index".to_string(),
        resource: vec![format!("index/{collection}/*")],
        permission: vec![],
    };
    Ok(vec![AccessRule {
        rules: vec![
            CollectionRule::collection(collection).with_permissions(&COLLECTION_PERMISSIONS),
            index_rule.with_permissions(&INDEX_PERMISSIONS),
        ],
        principal: principals.to_vec(),
        description: format!("data access for {collection}"),
    }])
}

/// Serialize any collection policy to the JSON text the service expects.
pub fn to_json<T: Serialize>(policy: &T) -> ProvisionResult<String> {
    serde_json::to_string(policy).map_err(|e| ProvisionError::ConfigError {
        reason: format!("failed to serialize collection policy: {e}"),
    })
}
