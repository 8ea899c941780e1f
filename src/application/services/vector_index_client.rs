use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::ports::vector_backend::{
    CollectionHandle, DeleteFilter, DistanceMetric, UpsertRecords, VectorBackend, VectorBackendError,
};
use crate::domain::entities::{DocumentChunk, SearchResult};
use crate::domain::value_objects::chunk_id::{DOCUMENT_ID_KEY, encode_document_id};
use crate::domain::value_objects::{ChunkId, ChunkMetadata};

#[derive(Debug)]
pub enum VectorIndexError {
    LengthMismatch { chunks: usize, embeddings: usize },
    NoCollection,
    InvalidInput(String),
    Unavailable(String),
    BackendError(String),
    ParseError(String),
}

impl std::fmt::Display for VectorIndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorIndexError::LengthMismatch { chunks, embeddings } => write!(
                f,
                "Chunks and embeddings length mismatch: {} vs {}",
                chunks, embeddings
            ),
            VectorIndexError::NoCollection => write!(f, "No collection selected"),
            VectorIndexError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            VectorIndexError::Unavailable(msg) => write!(f, "Vector index unavailable: {}", msg),
            VectorIndexError::BackendError(msg) => write!(f, "Vector index error: {}", msg),
            VectorIndexError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for VectorIndexError {}

fn backend_error(context: &'static str) -> impl FnOnce(VectorBackendError) -> VectorIndexError {
    move |error| match error {
        VectorBackendError::Unavailable(msg) => {
            VectorIndexError::Unavailable(format!("{}: {}", context, msg))
        }
        other => VectorIndexError::BackendError(format!("{}: {}", context, other)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: u64,
}

/// One session against a vector backend. Chunk operations target the
/// collection picked by the last [`ensure_collection`](Self::ensure_collection).
pub struct VectorIndexClient {
    backend: Arc<dyn VectorBackend>,
    collection: RwLock<Option<CollectionHandle>>,
}

impl VectorIndexClient {
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            backend,
            collection: RwLock::new(None),
        }
    }

    /// Checks the backend is reachable, then selects `collection_name`.
    pub async fn connect(
        backend: Arc<dyn VectorBackend>,
        collection_name: &str,
    ) -> Result<Self, VectorIndexError> {
        backend
            .heartbeat()
            .await
            .map_err(|e| VectorIndexError::Unavailable(format!("failed to connect: {}", e)))?;

        let client = Self::new(backend);
        client.ensure_collection(collection_name).await?;
        Ok(client)
    }

    pub async fn ensure_collection(&self, name: &str) -> Result<CollectionHandle, VectorIndexError> {
        let handle = self
            .backend
            .get_or_create_collection(name, DistanceMetric::L2)
            .await
            .map_err(|e| match e {
                VectorBackendError::Unavailable(msg) => VectorIndexError::Unavailable(format!(
                    "failed to ensure collection {}: {}",
                    name, msg
                )),
                other => VectorIndexError::BackendError(format!(
                    "failed to ensure collection {}: {}",
                    name, other
                )),
            })?;

        tracing::info!(collection = %handle.name, collection_id = %handle.id, "collection ready");
        *self.collection.write().await = Some(handle.clone());
        Ok(handle)
    }

    async fn session(&self) -> Result<CollectionHandle, VectorIndexError> {
        self.collection
            .read()
            .await
            .clone()
            .ok_or(VectorIndexError::NoCollection)
    }

    pub async fn add_chunks(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorIndexError> {
        if chunks.len() != embeddings.len() {
            return Err(VectorIndexError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let collection = self.session().await?;

        let records = UpsertRecords {
            ids: chunks.iter().map(|c| c.id().encode()).collect(),
            documents: chunks.iter().map(|c| c.content().to_string()).collect(),
            metadatas: chunks.iter().map(DocumentChunk::backend_metadata).collect(),
            embeddings: embeddings.to_vec(),
        };

        self.backend
            .upsert(&collection, records)
            .await
            .map_err(backend_error("failed to upsert chunks into collection"))?;

        tracing::debug!(collection = %collection.name, count = chunks.len(), "chunks upserted");
        Ok(())
    }

    /// Nearest chunks first. An empty collection yields an empty list.
    pub async fn search_similar(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let collection = self.session().await?;
        let hits = self
            .backend
            .query(&collection, query_embedding, limit)
            .await
            .map_err(backend_error("failed to query collection"))?;

        let mut results = Vec::with_capacity(hits.ids.len());
        let rows = hits
            .ids
            .into_iter()
            .zip(hits.documents)
            .zip(hits.metadatas)
            .zip(hits.distances);

        for (((id, document), metadata), distance) in rows {
            results.push(to_search_result(id, document, metadata, distance)?);
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    pub async fn delete_chunks(&self, chunk_ids: &[String]) -> Result<(), VectorIndexError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        let collection = self.session().await?;
        self.backend
            .delete(&collection, DeleteFilter::Ids(chunk_ids.to_vec()))
            .await
            .map_err(backend_error("failed to delete chunks"))?;

        tracing::debug!(collection = %collection.name, count = chunk_ids.len(), "chunks deleted");
        Ok(())
    }

    pub async fn delete_by_document_id(&self, document_id: i64) -> Result<(), VectorIndexError> {
        let collection = self.session().await?;
        let filter = DeleteFilter::MetadataEquals {
            key: DOCUMENT_ID_KEY.to_string(),
            value: encode_document_id(document_id),
        };

        self.backend
            .delete(&collection, filter)
            .await
            .map_err(backend_error("failed to delete chunks by document id"))?;

        tracing::info!(collection = %collection.name, document_id, "document chunks deleted");
        Ok(())
    }

    pub async fn collection_info(&self) -> Result<CollectionInfo, VectorIndexError> {
        let collection = self.session().await?;
        let count = self
            .backend
            .count(&collection)
            .await
            .map_err(backend_error("failed to get collection count"))?;

        Ok(CollectionInfo {
            name: collection.name,
            count,
        })
    }

    /// Drops a collection; dropping the session collection ends the session.
    pub async fn delete_collection(&self, name: &str) -> Result<(), VectorIndexError> {
        self.backend
            .delete_collection(name)
            .await
            .map_err(backend_error("failed to delete collection"))?;

        let mut session = self.collection.write().await;
        if session.as_ref().is_some_and(|c| c.name == name) {
            *session = None;
        }

        tracing::info!(collection = name, "collection deleted");
        Ok(())
    }
}

/// Backend metadata is untyped; scalars are kept as strings, anything else is
/// dropped.
fn metadata_value_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_search_result(
    id: String,
    document: Option<String>,
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
    distance: f32,
) -> Result<SearchResult, VectorIndexError> {
    let Some(content) = document else {
        return Err(VectorIndexError::ParseError(format!(
            "search hit {} has no document text",
            id
        )));
    };
    if !distance.is_finite() {
        return Err(VectorIndexError::ParseError(format!(
            "search hit {} has distance {}",
            id, distance
        )));
    }

    let mut identity = HashMap::new();
    let mut residual = HashMap::new();

    for (key, value) in metadata.unwrap_or_default() {
        let Some(value) = metadata_value_to_string(value) else {
            continue;
        };
        if ChunkMetadata::is_reserved_key(&key) {
            identity.insert(key, value);
        } else {
            residual.insert(key, value);
        }
    }

    // Hits written without identity fields still carry them in the id.
    let chunk_id = if identity.is_empty() {
        id.parse::<ChunkId>()
    } else {
        ChunkId::from_metadata(&identity)
    }
    .map_err(|e| VectorIndexError::ParseError(format!("search hit {}: {}", id, e)))?;

    Ok(SearchResult {
        id,
        content,
        document_id: chunk_id.document_id,
        chunk_index: chunk_id.chunk_index,
        score: SearchResult::score_from_distance(distance),
        metadata: residual,
    })
}
