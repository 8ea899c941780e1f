use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::chunk_id::{CHUNK_INDEX_KEY, DOCUMENT_ID_KEY};

/// Free-form string properties copied onto every chunk of a document.
///
/// `document_id` and `chunk_index` are reserved: the index layer writes them
/// itself, so they are never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    properties: HashMap<String, String>,
}

impl ChunkMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reserved_key(key: &str) -> bool {
        key == DOCUMENT_ID_KEY || key == CHUNK_INDEX_KEY
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Returns `false` and stores nothing when `key` is reserved.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if Self::is_reserved_key(&key) {
            return false;
        }
        self.properties.insert(key, value.into());
        true
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.set_property("filename", filename);
    }

    pub fn get_filename(&self) -> Option<&str> {
        self.get_property("filename")
    }
}

impl From<HashMap<String, String>> for ChunkMetadata {
    fn from(properties: HashMap<String, String>) -> Self {
        let mut metadata = Self::new();
        for (key, value) in properties {
            metadata.set_property(key, value);
        }
        metadata
    }
}

impl From<ChunkMetadata> for HashMap<String, String> {
    fn from(metadata: ChunkMetadata) -> Self {
        metadata.properties
    }
}
