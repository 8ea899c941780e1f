use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::value_objects::{ChunkId, ChunkMetadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    id: ChunkId,
    content: String,
    metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(document_id: i64, chunk_index: u32, content: String, metadata: ChunkMetadata) -> Self {
        Self {
            id: ChunkId::new(document_id, chunk_index),
            content,
            metadata,
        }
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn document_id(&self) -> i64 {
        self.id.document_id
    }

    pub fn chunk_index(&self) -> u32 {
        self.id.chunk_index
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }

    /// Flat metadata as the vector backend stores it, identity fields included.
    pub fn backend_metadata(&self) -> HashMap<String, String> {
        let mut flattened = self.metadata.properties().clone();
        flattened.extend(self.id.metadata_fields());
        flattened
    }
}
