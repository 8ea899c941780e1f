pub mod chunk_index_service;
pub mod document_store;
pub mod vector_index_client;

pub use chunk_index_service::ChunkIndexService;
pub use document_store::{DocumentStore, DocumentStoreError, RecoveryReport};
pub use vector_index_client::{CollectionInfo, VectorIndexClient, VectorIndexError};
