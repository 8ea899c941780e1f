use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug)]
pub enum VectorBackendError {
    /// The service could not be reached at all.
    Unavailable(String),
    CollectionNotFound(String),
    RequestError(String),
    ResponseError { status: u16, body: String },
    ParseError(String),
}

impl std::fmt::Display for VectorBackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorBackendError::Unavailable(msg) => write!(f, "Vector backend unavailable: {}", msg),
            VectorBackendError::CollectionNotFound(name) => {
                write!(f, "Collection not found: {}", name)
            }
            VectorBackendError::RequestError(msg) => write!(f, "Request error: {}", msg),
            VectorBackendError::ResponseError { status, body } => {
                write!(f, "Vector backend returned {}: {}", status, body)
            }
            VectorBackendError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for VectorBackendError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    #[default]
    #[serde(rename = "l2")]
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub id: String,
    pub name: String,
}

/// Equal-length parallel arrays, one entry per record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertRecords {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<HashMap<String, String>>,
    pub embeddings: Vec<Vec<f32>>,
}

/// Nearest neighbours for a single query embedding, closest first.
/// Metadata values are whatever the backend returned, untyped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryHits {
    pub ids: Vec<String>,
    pub documents: Vec<Option<String>>,
    pub metadatas: Vec<Option<serde_json::Map<String, serde_json::Value>>>,
    pub distances: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteFilter {
    Ids(Vec<String>),
    MetadataEquals { key: String, value: String },
}

#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn heartbeat(&self) -> Result<(), VectorBackendError>;

    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionHandle, VectorBackendError>;

    /// Inserts records, replacing any whose id is already stored.
    async fn upsert(
        &self,
        collection: &CollectionHandle,
        records: UpsertRecords,
    ) -> Result<(), VectorBackendError>;

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<QueryHits, VectorBackendError>;

    async fn delete(
        &self,
        collection: &CollectionHandle,
        filter: DeleteFilter,
    ) -> Result<(), VectorBackendError>;

    async fn count(&self, collection: &CollectionHandle) -> Result<u64, VectorBackendError>;

    async fn delete_collection(&self, name: &str) -> Result<(), VectorBackendError>;
}
