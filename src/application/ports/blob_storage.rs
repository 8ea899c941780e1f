use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::domain::value_objects::ContentHash;

#[derive(Debug)]
pub enum BlobStorageError {
    NotFound(String),
    InvalidName(String),
    InvalidPath(String),
    IoError(String),
}

impl std::fmt::Display for BlobStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobStorageError::NotFound(path) => write!(f, "Blob not found: {}", path),
            BlobStorageError::InvalidName(name) => write!(f, "Invalid file name: {:?}", name),
            BlobStorageError::InvalidPath(path) => write!(f, "Invalid path: {}", path),
            BlobStorageError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for BlobStorageError {}

/// Result of a completed upload: where it landed and what it hashed to.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub path: String,
    pub hash: ContentHash,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlobEntry {
    pub path: String,
    pub modified_at: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Streams `content` to disk, hashing exactly the bytes written.
    async fn save(
        &self,
        file_name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<StoredBlob, BlobStorageError>;

    async fn delete(&self, path: &str) -> Result<(), BlobStorageError>;

    async fn exists(&self, path: &str) -> Result<bool, BlobStorageError>;

    /// Published blobs only, never in-flight temp files.
    async fn list_blobs(&self) -> Result<Vec<BlobEntry>, BlobStorageError>;

    /// Removes leftover temp files older than `grace`; returns how many.
    async fn sweep_temp_files(&self, grace: Duration) -> Result<usize, BlobStorageError>;
}
