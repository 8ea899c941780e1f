use std::sync::Arc;

use crate::application::ports::VectorBackend;
use crate::application::services::vector_index_client::{
    CollectionInfo, VectorIndexClient, VectorIndexError,
};
use crate::domain::entities::{DocumentChunk, SearchResult};
use crate::domain::value_objects::ChunkMetadata;

pub use crate::domain::value_objects::{decode_chunk_id, encode_chunk_id};

pub const DEFAULT_COLLECTION_NAME: &str = "document_chunks";

/// Turns a document's text chunks and their embeddings into index entries.
pub struct ChunkIndexService {
    client: Arc<VectorIndexClient>,
}

impl ChunkIndexService {
    pub fn new(client: Arc<VectorIndexClient>) -> Self {
        Self { client }
    }

    pub async fn connect(
        backend: Arc<dyn VectorBackend>,
        collection_name: &str,
    ) -> Result<Self, VectorIndexError> {
        let client = VectorIndexClient::connect(backend, collection_name).await?;
        Ok(Self::new(Arc::new(client)))
    }

    pub async fn store_document_chunks(
        &self,
        document_id: i64,
        chunks: &[String],
        embeddings: &[Vec<f32>],
        metadata: &ChunkMetadata,
    ) -> Result<(), VectorIndexError> {
        if chunks.len() != embeddings.len() {
            return Err(VectorIndexError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let document_chunks = chunks
            .iter()
            .enumerate()
            .map(|(index, content)| {
                let chunk_index = u32::try_from(index).map_err(|_| {
                    VectorIndexError::InvalidInput(format!("chunk index {} out of range", index))
                })?;
                Ok(DocumentChunk::new(
                    document_id,
                    chunk_index,
                    content.clone(),
                    metadata.clone(),
                ))
            })
            .collect::<Result<Vec<_>, VectorIndexError>>()?;

        // Re-indexing may produce fewer chunks than last time.
        self.client.delete_by_document_id(document_id).await?;
        self.client.add_chunks(&document_chunks, embeddings).await?;

        tracing::info!(document_id, chunks = chunks.len(), "document chunks indexed");
        Ok(())
    }

    pub async fn search_relevant_chunks(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.client.search_similar(query_embedding, limit).await
    }

    pub async fn delete_document_chunks(&self, document_id: i64) -> Result<(), VectorIndexError> {
        self.client.delete_by_document_id(document_id).await
    }

    pub async fn stats(&self) -> Result<CollectionInfo, VectorIndexError> {
        self.client.collection_info().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::vector_index::InMemoryVectorBackend;

    async fn service() -> (Arc<InMemoryVectorBackend>, ChunkIndexService) {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let service = ChunkIndexService::connect(backend.clone(), DEFAULT_COLLECTION_NAME)
            .await
            .unwrap();
        (backend, service)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_length_mismatch_writes_nothing() {
        let (backend, service) = service().await;

        let result = service
            .store_document_chunks(1, &texts(&["a", "b"]), &[vec![0.1]], &ChunkMetadata::new())
            .await;

        assert!(matches!(result, Err(VectorIndexError::LengthMismatch { .. })));
        assert_eq!(backend.write_calls(), 0);
        assert_eq!(service.stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_store_assigns_ids_and_clones_metadata() {
        let (_backend, service) = service().await;
        let mut metadata = ChunkMetadata::new();
        metadata.set_filename("report.pdf");

        service
            .store_document_chunks(
                42,
                &texts(&["first", "second", "third"]),
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
                &metadata,
            )
            .await
            .unwrap();

        let results = service.search_relevant_chunks(&[1.0, 0.0], 3).await.unwrap();
        let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        ids.sort();

        assert_eq!(ids, vec!["doc_42_chunk_0", "doc_42_chunk_1", "doc_42_chunk_2"]);
        for result in &results {
            assert_eq!(result.document_id, 42);
            assert_eq!(
                result.metadata.get("filename").map(String::as_str),
                Some("report.pdf")
            );
            assert_eq!(
                decode_chunk_id(&result.id).unwrap(),
                (42, result.chunk_index)
            );
        }
        assert_eq!(results[0].content, "first");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_without_matches_is_empty() {
        let (_backend, service) = service().await;

        assert!(
            service
                .search_relevant_chunks(&[0.3, 0.4], 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_delete_document_chunks_only_touches_that_document() {
        let (_backend, service) = service().await;
        let metadata = ChunkMetadata::new();
        service
            .store_document_chunks(1, &texts(&["a", "b"]), &[vec![0.1], vec![0.2]], &metadata)
            .await
            .unwrap();
        service
            .store_document_chunks(2, &texts(&["c"]), &[vec![0.3]], &metadata)
            .await
            .unwrap();

        service.delete_document_chunks(1).await.unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.name, DEFAULT_COLLECTION_NAME);
        assert_eq!(stats.count, 1);
        let remaining = service.search_relevant_chunks(&[0.0], 5).await.unwrap();
        assert_eq!(remaining[0].id, encode_chunk_id(2, 0));
    }

    #[tokio::test]
    async fn test_storing_again_replaces_all_chunks_of_document() {
        let (_backend, service) = service().await;
        let metadata = ChunkMetadata::new().with_property("version", "1");
        service
            .store_document_chunks(
                5,
                &texts(&["old a", "old b", "old c"]),
                &[vec![0.5], vec![0.6], vec![0.7]],
                &metadata,
            )
            .await
            .unwrap();
        service
            .store_document_chunks(6, &texts(&["other"]), &[vec![0.9]], &metadata)
            .await
            .unwrap();

        let metadata = ChunkMetadata::new().with_property("version", "2");
        service
            .store_document_chunks(5, &texts(&["new"]), &[vec![0.5]], &metadata)
            .await
            .unwrap();

        assert_eq!(service.stats().await.unwrap().count, 2);
        let results = service.search_relevant_chunks(&[0.5], 5).await.unwrap();
        let document_five: Vec<_> = results.iter().filter(|r| r.document_id == 5).collect();
        assert_eq!(document_five.len(), 1);
        assert_eq!(document_five[0].content, "new");
        assert_eq!(
            document_five[0].metadata.get("version").map(String::as_str),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_chroma_reindex_clears_then_upserts() {
        use crate::infrastructure::vector_index::{ChromaBackend, ChromaConfig};
        use httpmock::prelude::*;
        use serde_json::json;

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/heartbeat");
                then.status(200).json_body(json!({ "nanosecond heartbeat": 1 }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/collections");
                then.status(200)
                    .json_body(json!({ "id": "c0ffee", "name": DEFAULT_COLLECTION_NAME }));
            })
            .await;
        let clear = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/collections/c0ffee/delete")
                    .json_body(json!({ "where": { "document_id": "5" } }));
                then.status(200).json_body(json!([]));
            })
            .await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/collections/c0ffee/upsert")
                    .json_body(json!({
                        "ids": ["doc_5_chunk_0"],
                        "embeddings": [[0.5]],
                        "metadatas": [{ "document_id": "5", "chunk_index": "0" }],
                        "documents": ["new"]
                    }));
                then.status(200).json_body(json!(true));
            })
            .await;

        let backend = ChromaBackend::new(ChromaConfig {
            base_url: server.base_url(),
            timeout_secs: 5,
        })
        .unwrap();
        let service = ChunkIndexService::connect(Arc::new(backend), DEFAULT_COLLECTION_NAME)
            .await
            .unwrap();

        service
            .store_document_chunks(5, &texts(&["new"]), &[vec![0.5]], &ChunkMetadata::new())
            .await
            .unwrap();

        clear.assert_async().await;
        upsert.assert_async().await;
    }
}
